//! Validation utilities

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::ledger::account::find_account;
use crate::ledger::transaction::DoubleEntryValidator;
use crate::traits::*;
use crate::types::*;

/// Parse an ISO-8601 calendar date (`YYYY-MM-DD`)
pub fn parse_iso_date(value: &str) -> LedgerResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| LedgerError::InvalidDate(format!("'{}': {}", value, e)))
}

/// Parse an optional date range; a missing bound stays open
pub fn parse_date_range(
    start: Option<&str>,
    end: Option<&str>,
) -> LedgerResult<(NaiveDate, NaiveDate)> {
    let start = start.map(parse_iso_date).transpose()?.unwrap_or(NaiveDate::MIN);
    let end = end.map(parse_iso_date).transpose()?.unwrap_or(NaiveDate::MAX);
    Ok((start, end))
}

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal) -> LedgerResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(LedgerError::Validation(
            "Amount must be positive".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate that an account code is valid
pub fn validate_account_code(code: &str) -> LedgerResult<()> {
    if code.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account code cannot be empty".to_string(),
        ));
    }

    if code.len() > 20 {
        return Err(LedgerError::Validation(
            "Account code cannot exceed 20 characters".to_string(),
        ));
    }

    if !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(LedgerError::Validation(format!(
            "Account code '{}' must be numeric",
            code
        )));
    }

    Ok(())
}

/// Validate that an account name is valid
pub fn validate_account_name(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account name cannot be empty".to_string(),
        ));
    }

    if name.len() > 100 {
        return Err(LedgerError::Validation(
            "Account name cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that a voucher description is valid
pub fn validate_voucher_description(description: &str) -> LedgerResult<()> {
    if description.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Voucher description cannot be empty".to_string(),
        ));
    }

    if description.len() > 500 {
        return Err(LedgerError::Validation(
            "Voucher description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a new sub-ledger against the chart it will live in
pub fn validate_sub_ledger(sub_ledger: &InventorySubLedger, chart: &[Account]) -> LedgerResult<()> {
    if sub_ledger.id.trim().is_empty() || sub_ledger.item_code.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Sub-ledger id and item code cannot be empty".to_string(),
        ));
    }

    if sub_ledger.item_name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Item name cannot be empty".to_string(),
        ));
    }

    if sub_ledger.opening_quantity < BigDecimal::from(0)
        || sub_ledger.opening_rate < BigDecimal::from(0)
    {
        return Err(LedgerError::Validation(format!(
            "Opening stock of '{}' cannot be negative",
            sub_ledger.item_code
        )));
    }

    match find_account(chart, &sub_ledger.inventory_gl_account_id) {
        Some(gl) if gl.is_inventory_gl && gl.level == AccountLevel::Gl => Ok(()),
        Some(_) => Err(LedgerError::InvalidAccountReference {
            account_id: sub_ledger.inventory_gl_account_id.clone(),
            reason: "sub-ledgers must belong to an inventory GL account".to_string(),
        }),
        None => Err(LedgerError::AccountNotFound(
            sub_ledger.inventory_gl_account_id.clone(),
        )),
    }
}

/// Enhanced transaction validator with detailed checks
pub struct EnhancedTransactionValidator {
    inner: DoubleEntryValidator,
}

impl EnhancedTransactionValidator {
    pub fn new(inner: DoubleEntryValidator) -> Self {
        Self { inner }
    }
}

impl Default for EnhancedTransactionValidator {
    fn default() -> Self {
        Self::new(DoubleEntryValidator::default())
    }
}

impl TransactionValidator for EnhancedTransactionValidator {
    fn validate_transaction(&self, transaction: &Transaction) -> LedgerResult<()> {
        self.inner.validate_transaction(transaction)?;
        validate_voucher_description(&transaction.description)?;

        for entry in &transaction.entries {
            validate_positive_amount(&entry.amount)?;
        }

        // inventory vouchers must carry the lines their stock movements came from
        if matches!(
            transaction.voucher_type,
            VoucherType::Sales | VoucherType::Purchase
        ) && transaction.item_lines.is_empty()
        {
            return Err(LedgerError::Validation(format!(
                "{:?} voucher '{}' has no item lines",
                transaction.voucher_type, transaction.voucher_no
            )));
        }

        Ok(())
    }

    fn validate_account_references(
        &self,
        transaction: &Transaction,
        chart: &[Account],
    ) -> LedgerResult<()> {
        self.inner.validate_account_references(transaction, chart)
    }
}

/// Enhanced account validator with detailed checks
pub struct EnhancedAccountValidator;

impl AccountValidator for EnhancedAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        DefaultAccountValidator.validate_account(account)?;
        validate_account_code(&account.code)?;
        validate_account_name(&account.name)?;

        if account.is_locked && account.level != AccountLevel::Gl {
            return Err(LedgerError::Validation(format!(
                "Only GL accounts can be locked, '{}' is not",
                account.code
            )));
        }

        Ok(())
    }

    fn validate_account_deletion(
        &self,
        account: &Account,
        has_postings: bool,
    ) -> LedgerResult<()> {
        DefaultAccountValidator.validate_account_deletion(account, has_postings)?;

        if account.opening_balance != BigDecimal::from(0) {
            return Err(LedgerError::Validation(format!(
                "Account '{}' carries an opening balance",
                account.code
            )));
        }

        Ok(())
    }
}
