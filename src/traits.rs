//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::inventory::VoucherOutput;
use crate::types::*;

/// Revision key of an account
pub fn account_key(account_id: &str) -> String {
    format!("account:{}", account_id)
}

/// Revision key of an inventory sub-ledger
pub fn sub_ledger_key(sub_ledger_id: &str) -> String {
    format!("sub_ledger:{}", sub_ledger_id)
}

/// Point-in-time copy of everything the engine reads.
///
/// Transactions and movements are kept in insertion order; that order breaks
/// ties between same-date entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
    pub sub_ledgers: Vec<InventorySubLedger>,
    pub movements: Vec<InventoryMovement>,
    /// Revision per account/sub-ledger key, bumped on every commit touching it
    pub revisions: HashMap<String, u64>,
}

impl LedgerSnapshot {
    /// Revision of a key; keys never committed are at revision 0
    pub fn revision(&self, key: &str) -> u64 {
        self.revisions.get(key).copied().unwrap_or(0)
    }

    pub fn account(&self, account_id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == account_id)
    }

    pub fn sub_ledger(&self, sub_ledger_id: &str) -> Option<&InventorySubLedger> {
        self.sub_ledgers.iter().find(|s| s.id == sub_ledger_id)
    }

    /// Revisions of every account and sub-ledger a posting touches
    pub fn revisions_for(&self, output: &VoucherOutput) -> HashMap<String, u64> {
        output
            .transaction
            .entries
            .iter()
            .map(|e| account_key(&e.account_id))
            .chain(output.movements.iter().map(|m| sub_ledger_key(&m.sub_ledger_id)))
            .map(|key| {
                let revision = self.revision(&key);
                (key, revision)
            })
            .collect()
    }
}

/// Storage abstraction for the engine
///
/// The engine never owns persistence: it reads snapshots and hands back
/// complete postings. Implementations must make `commit_posting` atomic.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Save an account to storage
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Get an account by ID
    async fn get_account(&self, account_id: &str) -> LedgerResult<Option<Account>>;

    /// List all accounts, optionally filtered by type
    async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>>;

    /// Delete an account
    async fn delete_account(&mut self, account_id: &str) -> LedgerResult<()>;

    /// Save an inventory sub-ledger
    async fn save_sub_ledger(&mut self, sub_ledger: &InventorySubLedger) -> LedgerResult<()>;

    /// Get a sub-ledger by ID
    async fn get_sub_ledger(&self, sub_ledger_id: &str)
        -> LedgerResult<Option<InventorySubLedger>>;

    /// List sub-ledgers, optionally only those under one inventory GL
    async fn list_sub_ledgers(
        &self,
        inventory_gl_account_id: Option<&str>,
    ) -> LedgerResult<Vec<InventorySubLedger>>;

    /// Delete a sub-ledger
    async fn delete_sub_ledger(&mut self, sub_ledger_id: &str) -> LedgerResult<()>;

    /// Get a transaction by ID
    async fn get_transaction(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>>;

    /// List transactions within a date range, in insertion order
    async fn get_transactions(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>>;

    /// List movements, optionally for one sub-ledger, in insertion order
    async fn get_movements(&self, sub_ledger_id: Option<&str>)
        -> LedgerResult<Vec<InventoryMovement>>;

    /// Consistent point-in-time copy of the whole ledger
    async fn snapshot(&self) -> LedgerResult<LedgerSnapshot>;

    /// Atomically persist a voucher and its movements.
    ///
    /// Applies entries to account balances and refreshes touched sub-ledgers.
    /// Fails with [`LedgerError::ConcurrentModification`] without writing
    /// anything when a key in `expected` has moved past the given revision.
    async fn commit_posting(
        &mut self,
        posting: &VoucherOutput,
        expected: &HashMap<String, u64>,
    ) -> LedgerResult<()>;
}

/// Trait for implementing custom account validation rules
pub trait AccountValidator: Send + Sync {
    /// Validate an account before saving
    fn validate_account(&self, account: &Account) -> LedgerResult<()>;

    /// Validate account deletion
    fn validate_account_deletion(&self, account: &Account, has_postings: bool)
        -> LedgerResult<()>;
}

/// Trait for implementing custom transaction validation rules
pub trait TransactionValidator: Send + Sync {
    /// Validate a transaction before posting
    fn validate_transaction(&self, transaction: &Transaction) -> LedgerResult<()>;

    /// Validate that all referenced accounts exist and accept postings
    fn validate_account_references(
        &self,
        transaction: &Transaction,
        chart: &[Account],
    ) -> LedgerResult<()>;
}

/// Resolves the cost of goods sold account paired with an inventory GL
pub trait CogsMapping: Send + Sync {
    fn cogs_account<'a>(&self, inventory_gl: &Account, chart: &'a [Account])
        -> Option<&'a Account>;
}

/// Default account validator with basic rules
pub struct DefaultAccountValidator;

impl AccountValidator for DefaultAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        if account.id.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account ID cannot be empty".to_string(),
            ));
        }

        if account.code.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account code cannot be empty".to_string(),
            ));
        }

        if account.name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_account_deletion(
        &self,
        account: &Account,
        has_postings: bool,
    ) -> LedgerResult<()> {
        if account.is_locked {
            return Err(LedgerError::Validation(format!(
                "Account '{}' is a locked system account",
                account.code
            )));
        }

        if has_postings {
            return Err(LedgerError::Validation(format!(
                "Account '{}' has postings and cannot be deleted",
                account.code
            )));
        }

        Ok(())
    }
}
