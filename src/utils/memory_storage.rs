//! In-memory storage implementation for testing

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::inventory::valuation::refresh_sub_ledger;
use crate::inventory::VoucherOutput;
use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct State {
    accounts: Vec<Account>,
    sub_ledgers: Vec<InventorySubLedger>,
    transactions: Vec<Transaction>,
    movements: Vec<InventoryMovement>,
    revisions: HashMap<String, u64>,
}

impl State {
    fn revision(&self, key: &str) -> u64 {
        self.revisions.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: String) {
        *self.revisions.entry(key).or_insert(0) += 1;
    }
}

/// In-memory storage implementation for testing and development.
///
/// Clones share the same state, and the whole state sits behind a single
/// lock so commits are atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<State>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".to_string()))
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> LedgerResult<()> {
        *self.write()? = State::default();
        Ok(())
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()> {
        let mut state = self.write()?;
        match state.accounts.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => *existing = account.clone(),
            None => state.accounts.push(account.clone()),
        }
        state.bump(account_key(&account.id));
        Ok(())
    }

    async fn get_account(&self, account_id: &str) -> LedgerResult<Option<Account>> {
        Ok(self
            .read()?
            .accounts
            .iter()
            .find(|a| a.id == account_id)
            .cloned())
    }

    async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>> {
        Ok(self
            .read()?
            .accounts
            .iter()
            .filter(|account| account_type.is_none_or(|t| account.account_type == t))
            .cloned()
            .collect())
    }

    async fn delete_account(&mut self, account_id: &str) -> LedgerResult<()> {
        let mut state = self.write()?;
        let before = state.accounts.len();
        state.accounts.retain(|a| a.id != account_id);
        if state.accounts.len() == before {
            return Err(LedgerError::AccountNotFound(account_id.to_string()));
        }
        state.bump(account_key(account_id));
        Ok(())
    }

    async fn save_sub_ledger(&mut self, sub_ledger: &InventorySubLedger) -> LedgerResult<()> {
        let mut state = self.write()?;
        match state.sub_ledgers.iter_mut().find(|s| s.id == sub_ledger.id) {
            Some(existing) => *existing = sub_ledger.clone(),
            None => state.sub_ledgers.push(sub_ledger.clone()),
        }
        state.bump(sub_ledger_key(&sub_ledger.id));
        Ok(())
    }

    async fn get_sub_ledger(
        &self,
        sub_ledger_id: &str,
    ) -> LedgerResult<Option<InventorySubLedger>> {
        Ok(self
            .read()?
            .sub_ledgers
            .iter()
            .find(|s| s.id == sub_ledger_id)
            .cloned())
    }

    async fn list_sub_ledgers(
        &self,
        inventory_gl_account_id: Option<&str>,
    ) -> LedgerResult<Vec<InventorySubLedger>> {
        Ok(self
            .read()?
            .sub_ledgers
            .iter()
            .filter(|s| inventory_gl_account_id.is_none_or(|gl| s.inventory_gl_account_id == gl))
            .cloned()
            .collect())
    }

    async fn delete_sub_ledger(&mut self, sub_ledger_id: &str) -> LedgerResult<()> {
        let mut state = self.write()?;
        let before = state.sub_ledgers.len();
        state.sub_ledgers.retain(|s| s.id != sub_ledger_id);
        if state.sub_ledgers.len() == before {
            return Err(LedgerError::SubLedgerNotFound(sub_ledger_id.to_string()));
        }
        state.bump(sub_ledger_key(sub_ledger_id));
        Ok(())
    }

    async fn get_transaction(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>> {
        Ok(self
            .read()?
            .transactions
            .iter()
            .find(|t| t.id == transaction_id)
            .cloned())
    }

    async fn get_transactions(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>> {
        Ok(self
            .read()?
            .transactions
            .iter()
            .filter(|t| start_date.is_none_or(|start| t.date >= start))
            .filter(|t| end_date.is_none_or(|end| t.date <= end))
            .cloned()
            .collect())
    }

    async fn get_movements(
        &self,
        sub_ledger_id: Option<&str>,
    ) -> LedgerResult<Vec<InventoryMovement>> {
        Ok(self
            .read()?
            .movements
            .iter()
            .filter(|m| sub_ledger_id.is_none_or(|id| m.sub_ledger_id == id))
            .cloned()
            .collect())
    }

    async fn snapshot(&self) -> LedgerResult<LedgerSnapshot> {
        let state = self.read()?;
        Ok(LedgerSnapshot {
            accounts: state.accounts.clone(),
            transactions: state.transactions.clone(),
            sub_ledgers: state.sub_ledgers.clone(),
            movements: state.movements.clone(),
            revisions: state.revisions.clone(),
        })
    }

    async fn commit_posting(
        &mut self,
        posting: &VoucherOutput,
        expected: &HashMap<String, u64>,
    ) -> LedgerResult<()> {
        let mut state = self.write()?;
        let transaction = &posting.transaction;

        // every check runs before the first write
        for (key, revision) in expected {
            if state.revision(key) != *revision {
                return Err(LedgerError::ConcurrentModification(key.clone()));
            }
        }
        if state.transactions.iter().any(|t| t.id == transaction.id) {
            return Err(LedgerError::InvalidTransaction(format!(
                "Transaction '{}' is already posted",
                transaction.id
            )));
        }
        if state.transactions.iter().any(|t| {
            t.voucher_no == transaction.voucher_no && t.company_id == transaction.company_id
        }) {
            return Err(LedgerError::InvalidTransaction(format!(
                "Voucher number '{}' is already in use",
                transaction.voucher_no
            )));
        }
        for entry in &transaction.entries {
            if !state.accounts.iter().any(|a| a.id == entry.account_id) {
                return Err(LedgerError::AccountNotFound(entry.account_id.clone()));
            }
        }
        for movement in &posting.movements {
            if !state.sub_ledgers.iter().any(|s| s.id == movement.sub_ledger_id) {
                return Err(LedgerError::SubLedgerNotFound(movement.sub_ledger_id.clone()));
            }
        }

        let now = chrono::Utc::now().naive_utc();
        let mut touched = Vec::new();
        for entry in &transaction.entries {
            if let Some(account) = state.accounts.iter_mut().find(|a| a.id == entry.account_id) {
                account.apply_entry(entry.entry_type, &entry.amount);
                account.updated_at = now;
            }
            touched.push(account_key(&entry.account_id));
        }

        state.transactions.push(transaction.clone());
        state.movements.extend(posting.movements.iter().cloned());

        let State {
            sub_ledgers,
            movements,
            ..
        } = &mut *state;
        for sub_ledger in sub_ledgers
            .iter_mut()
            .filter(|s| posting.movements.iter().any(|m| m.sub_ledger_id == s.id))
        {
            *sub_ledger = refresh_sub_ledger(sub_ledger, movements);
            touched.push(sub_ledger_key(&sub_ledger.id));
        }

        touched.sort();
        touched.dedup();
        for key in touched {
            state.bump(key);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn gl(id: &str) -> Account {
        Account::new(
            id.to_string(),
            id.to_string(),
            id.to_string(),
            AccountType::Asset,
            AccountLevel::Gl,
            None,
        )
    }

    fn posting(voucher_no: &str, debit: &str, credit: &str) -> VoucherOutput {
        let mut transaction = Transaction::new(
            voucher_no.to_string(),
            voucher_no.to_string(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            VoucherType::Journal,
            String::new(),
        );
        transaction.add_entry(Entry::debit(debit.to_string(), BigDecimal::from(10), None));
        transaction.add_entry(Entry::credit(credit.to_string(), BigDecimal::from(10), None));
        VoucherOutput {
            transaction,
            movements: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_accounts_keep_insertion_order() {
        let mut storage = MemoryStorage::new();
        for id in ["b", "a", "c"] {
            storage.save_account(&gl(id)).await.unwrap();
        }

        let ids: Vec<String> = storage
            .list_accounts(None)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_commit_applies_entries_and_bumps_revisions() {
        let mut storage = MemoryStorage::new();
        storage.save_account(&gl("cash")).await.unwrap();
        storage.save_account(&gl("bank")).await.unwrap();

        let snapshot = storage.snapshot().await.unwrap();
        let output = posting("JO-0001", "cash", "bank");
        storage
            .commit_posting(&output, &snapshot.revisions_for(&output))
            .await
            .unwrap();

        let cash = storage.get_account("cash").await.unwrap().unwrap();
        assert_eq!(cash.balance, BigDecimal::from(10));
        let after = storage.snapshot().await.unwrap();
        assert_eq!(after.revision("account:cash"), snapshot.revision("account:cash") + 1);
    }

    #[tokio::test]
    async fn test_stale_commit_is_rejected_without_writes() {
        let mut storage = MemoryStorage::new();
        for id in ["cash", "bank", "rent", "fees"] {
            storage.save_account(&gl(id)).await.unwrap();
        }

        let stale = storage.snapshot().await.unwrap();
        let first = posting("JO-0001", "cash", "bank");
        storage
            .commit_posting(&first, &stale.revisions_for(&first))
            .await
            .unwrap();

        // shares "cash" with the first posting
        let second = posting("JO-0002", "rent", "cash");
        match storage.commit_posting(&second, &stale.revisions_for(&second)).await {
            Err(LedgerError::ConcurrentModification(key)) => assert_eq!(key, "account:cash"),
            other => panic!("expected concurrent modification, got {:?}", other),
        }
        assert_eq!(storage.get_transactions(None, None).await.unwrap().len(), 1);
        let rent = storage.get_account("rent").await.unwrap().unwrap();
        assert_eq!(rent.balance, BigDecimal::from(0));

        // disjoint from the first posting, so the stale snapshot still holds
        let third = posting("JO-0003", "rent", "fees");
        assert!(storage
            .commit_posting(&third, &stale.revisions_for(&third))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_voucher_number_is_claimed_once_across_stale_snapshots() {
        let mut storage = MemoryStorage::new();
        for id in ["cash", "bank", "rent", "fees"] {
            storage.save_account(&gl(id)).await.unwrap();
        }

        let stale = storage.snapshot().await.unwrap();
        let first = posting("JO-0001", "cash", "bank");
        let mut second = posting("JO-0001", "rent", "fees");
        second.transaction.id = "other".to_string();

        let mut writer = storage.clone();
        storage
            .commit_posting(&first, &stale.revisions_for(&first))
            .await
            .unwrap();
        // no account in common, so only the voucher number can stop it
        assert!(matches!(
            writer
                .commit_posting(&second, &stale.revisions_for(&second))
                .await,
            Err(LedgerError::InvalidTransaction(_))
        ));

        let transactions = storage.get_transactions(None, None).await.unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].id, "JO-0001");
        let rent = storage.get_account("rent").await.unwrap().unwrap();
        assert_eq!(rent.balance, BigDecimal::from(0));
    }
}
