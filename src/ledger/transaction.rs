//! Voucher validation, building and persistence

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::config::EngineConfig;
use crate::inventory::{JournalVoucher, VoucherOutput};
use crate::ledger::account::find_account;
use crate::traits::*;
use crate::types::*;

/// Enforces debit = credit and postable account references
#[derive(Debug, Clone)]
pub struct DoubleEntryValidator {
    tolerance: BigDecimal,
}

impl Default for DoubleEntryValidator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl DoubleEntryValidator {
    pub fn new(tolerance: BigDecimal) -> Self {
        Self { tolerance }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.tolerance.clone())
    }

    /// Check that a set of entries is a valid double-entry posting
    pub fn validate(&self, entries: &[Entry]) -> LedgerResult<()> {
        if entries.is_empty() {
            return Err(LedgerError::InvalidTransaction(
                "Transaction must have at least one entry".to_string(),
            ));
        }

        if entries.iter().any(|e| e.amount <= BigDecimal::from(0)) {
            return Err(LedgerError::InvalidTransaction(
                "Entry amounts must be positive".to_string(),
            ));
        }

        let debits: BigDecimal = entries.iter().map(Entry::debit_amount).sum();
        let credits: BigDecimal = entries.iter().map(Entry::credit_amount).sum();
        if (&debits - &credits).abs() > self.tolerance {
            return Err(LedgerError::UnbalancedTransaction { debits, credits });
        }

        if entries.len() < 2 {
            return Err(LedgerError::InvalidTransaction(
                "Transaction must have at least two entries for double-entry bookkeeping"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Check that every entry points at an existing, unlocked GL account
    pub fn validate_entry_accounts(
        &self,
        entries: &[Entry],
        chart: &[Account],
    ) -> LedgerResult<()> {
        for entry in entries {
            let invalid = |reason: &str| LedgerError::InvalidAccountReference {
                account_id: entry.account_id.clone(),
                reason: reason.to_string(),
            };

            let account = find_account(chart, &entry.account_id)
                .ok_or_else(|| invalid("account does not exist"))?;
            if account.level != AccountLevel::Gl {
                return Err(invalid("only GL accounts accept postings"));
            }
            if account.is_locked {
                return Err(invalid("account is a locked system account"));
            }
        }

        Ok(())
    }
}

impl TransactionValidator for DoubleEntryValidator {
    fn validate_transaction(&self, transaction: &Transaction) -> LedgerResult<()> {
        if transaction.voucher_no.trim().is_empty() {
            return Err(LedgerError::InvalidTransaction(
                "Voucher number cannot be empty".to_string(),
            ));
        }

        self.validate(&transaction.entries)?;

        for line in &transaction.item_lines {
            if line.quantity <= BigDecimal::from(0) {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Item '{}' must have a positive quantity",
                    line.item_name
                )));
            }
            if line.rate < BigDecimal::from(0) {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Item '{}' cannot have a negative rate",
                    line.item_name
                )));
            }
        }

        Ok(())
    }

    fn validate_account_references(
        &self,
        transaction: &Transaction,
        chart: &[Account],
    ) -> LedgerResult<()> {
        self.validate_entry_accounts(&transaction.entries, chart)
    }
}

/// Validates and persists generated vouchers
pub struct TransactionManager<S: LedgerStorage> {
    pub(crate) storage: S,
    validator: Box<dyn TransactionValidator>,
}

impl<S: LedgerStorage> TransactionManager<S> {
    /// Create a new transaction manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DoubleEntryValidator::default()),
        }
    }

    /// Create a new transaction manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn TransactionValidator>) -> Self {
        Self { storage, validator }
    }

    /// Validate a voucher against the snapshot it was built from and commit it.
    ///
    /// Every check runs before the storage is touched, so a rejected voucher
    /// leaves no trace.
    pub async fn record(
        &mut self,
        posting: &VoucherOutput,
        snapshot: &LedgerSnapshot,
    ) -> LedgerResult<()> {
        let transaction = &posting.transaction;

        self.validator.validate_transaction(transaction)?;
        self.validator
            .validate_account_references(transaction, &snapshot.accounts)?;

        if snapshot.transactions.iter().any(|t| {
            t.voucher_no == transaction.voucher_no && t.company_id == transaction.company_id
        }) {
            return Err(LedgerError::InvalidTransaction(format!(
                "Voucher number '{}' is already in use",
                transaction.voucher_no
            )));
        }

        let expected = snapshot.revisions_for(posting);
        self.storage.commit_posting(posting, &expected).await
    }

    /// Get a transaction by ID
    pub async fn get_transaction(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>> {
        self.storage.get_transaction(transaction_id).await
    }

    /// Get all transactions within a date range
    pub async fn get_transactions(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>> {
        self.storage.get_transactions(start_date, end_date).await
    }
}

/// Transaction builder for creating vouchers entry by entry
#[derive(Debug)]
pub struct TransactionBuilder {
    transaction: Transaction,
}

impl TransactionBuilder {
    /// Create a new builder; the transaction id is generated
    pub fn new(
        voucher_no: String,
        date: NaiveDate,
        voucher_type: VoucherType,
        description: String,
    ) -> Self {
        Self {
            transaction: Transaction::new(
                uuid::Uuid::new_v4().to_string(),
                voucher_no,
                date,
                voucher_type,
                description,
            ),
        }
    }

    /// Set the reference for the transaction
    pub fn reference(mut self, reference: String) -> Self {
        self.transaction.reference = Some(reference);
        self
    }

    /// Set the owning company
    pub fn company(mut self, company_id: Option<String>) -> Self {
        self.transaction.company_id = company_id;
        self
    }

    /// Mark the transaction as compensating another one
    pub fn reverses(mut self, transaction_id: String) -> Self {
        self.transaction.reverses = Some(transaction_id);
        self
    }

    /// Add a debit entry
    pub fn debit(
        mut self,
        account_id: String,
        amount: BigDecimal,
        description: Option<String>,
    ) -> Self {
        self.transaction
            .add_entry(Entry::debit(account_id, amount, description));
        self
    }

    /// Add a credit entry
    pub fn credit(
        mut self,
        account_id: String,
        amount: BigDecimal,
        description: Option<String>,
    ) -> Self {
        self.transaction
            .add_entry(Entry::credit(account_id, amount, description));
        self
    }

    /// Add a custom entry
    pub fn entry(mut self, entry: Entry) -> Self {
        self.transaction.add_entry(entry);
        self
    }

    /// Add an inventory line
    pub fn item_line(mut self, line: ItemLine) -> Self {
        self.transaction.item_lines.push(line);
        self
    }

    /// Id the transaction will be stored under
    pub fn id(&self) -> &str {
        &self.transaction.id
    }

    /// Build the transaction, validating with the default tolerance
    pub fn build(self) -> LedgerResult<Transaction> {
        self.build_with(&DoubleEntryValidator::default())
    }

    /// Build the transaction with a specific validator
    pub fn build_with(self, validator: &DoubleEntryValidator) -> LedgerResult<Transaction> {
        validator.validate_transaction(&self.transaction)?;
        Ok(self.transaction)
    }
}

/// Next voucher number for a type, e.g. `SA-0001`.
///
/// One past the highest number already carrying the type's prefix, so gaps
/// left by hand-numbered vouchers are never reissued.
pub fn next_voucher_no(voucher_type: VoucherType, transactions: &[Transaction]) -> String {
    let prefix = format!("{}-", voucher_type.prefix());
    let highest = transactions
        .iter()
        .filter_map(|t| t.voucher_no.strip_prefix(&prefix))
        .filter_map(|number| number.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{:04}", prefix, highest + 1)
}

/// Common non-inventory voucher patterns
pub mod patterns {
    use super::*;

    /// Cash received from a customer: Dr cash, Cr receivable
    pub fn create_receipt(
        voucher_no: String,
        date: NaiveDate,
        description: String,
        cash_account_id: String,
        receivable_account_id: String,
        amount: BigDecimal,
    ) -> LedgerResult<JournalVoucher> {
        JournalVoucher::new(
            VoucherType::Receipt,
            voucher_no,
            date,
            description,
            vec![
                Entry::debit(cash_account_id, amount.clone(), None),
                Entry::credit(receivable_account_id, amount, None),
            ],
        )
    }

    /// Cash paid to a supplier: Dr payable, Cr cash
    pub fn create_payment(
        voucher_no: String,
        date: NaiveDate,
        description: String,
        payable_account_id: String,
        cash_account_id: String,
        amount: BigDecimal,
    ) -> LedgerResult<JournalVoucher> {
        JournalVoucher::new(
            VoucherType::Payment,
            voucher_no,
            date,
            description,
            vec![
                Entry::debit(payable_account_id, amount.clone(), None),
                Entry::credit(cash_account_id, amount, None),
            ],
        )
    }

    /// Expense paid in cash: Dr expense, Cr cash
    pub fn create_expense_payment(
        voucher_no: String,
        date: NaiveDate,
        description: String,
        expense_account_id: String,
        cash_account_id: String,
        amount: BigDecimal,
    ) -> LedgerResult<JournalVoucher> {
        JournalVoucher::new(
            VoucherType::Payment,
            voucher_no,
            date,
            description,
            vec![
                Entry::debit(expense_account_id, amount.clone(), None),
                Entry::credit(cash_account_id, amount, None),
            ],
        )
    }

    /// Owner investment: Dr cash, Cr capital
    pub fn create_owner_investment(
        voucher_no: String,
        date: NaiveDate,
        description: String,
        cash_account_id: String,
        equity_account_id: String,
        amount: BigDecimal,
    ) -> LedgerResult<JournalVoucher> {
        JournalVoucher::new(
            VoucherType::Journal,
            voucher_no,
            date,
            description,
            vec![
                Entry::debit(
                    cash_account_id,
                    amount.clone(),
                    Some("Cash invested by owner".to_string()),
                ),
                Entry::credit(
                    equity_account_id,
                    amount,
                    Some("Owner's equity contribution".to_string()),
                ),
            ],
        )
    }
}
