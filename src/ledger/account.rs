//! Account management and chart-of-accounts lookups

use bigdecimal::BigDecimal;
use std::collections::HashMap;

use crate::config::ChartConventions;
use crate::traits::*;
use crate::types::*;

/// Account manager for handling chart of accounts operations
pub struct AccountManager<S: LedgerStorage> {
    pub(crate) storage: S,
    validator: Box<dyn AccountValidator>,
}

impl<S: LedgerStorage> AccountManager<S> {
    /// Create a new account manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultAccountValidator),
        }
    }

    /// Create a new account manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn AccountValidator>) -> Self {
        Self { storage, validator }
    }

    /// Add an account to the chart
    pub async fn create_account(&mut self, account: Account) -> LedgerResult<Account> {
        self.validator.validate_account(&account)?;

        let chart = self.storage.list_accounts(None).await?;

        if chart.iter().any(|a| a.id == account.id) {
            return Err(LedgerError::Validation(format!(
                "Account with ID '{}' already exists",
                account.id
            )));
        }

        if chart
            .iter()
            .any(|a| a.code == account.code && a.company_id == account.company_id)
        {
            return Err(LedgerError::Validation(format!(
                "Account code '{}' is already in use",
                account.code
            )));
        }

        if let Some(ref parent_id) = account.parent_id {
            let parent = find_account(&chart, parent_id).ok_or_else(|| {
                LedgerError::Validation(format!("Parent account '{}' does not exist", parent_id))
            })?;
            if parent.level.depth() >= account.level.depth() {
                return Err(LedgerError::Validation(format!(
                    "Account '{}' must sit below its parent '{}' in the chart",
                    account.code, parent.code
                )));
            }
        }

        if account.is_inventory_gl
            && (account.level != AccountLevel::Gl || account.account_type != AccountType::Asset)
        {
            return Err(LedgerError::Validation(format!(
                "Inventory account '{}' must be an asset GL",
                account.code
            )));
        }

        if account.is_cogs_gl
            && (account.level != AccountLevel::Gl || account.account_type != AccountType::Expense)
        {
            return Err(LedgerError::Validation(format!(
                "Cost of sales account '{}' must be an expense GL",
                account.code
            )));
        }

        self.storage.save_account(&account).await?;
        tracing::debug!(account_id = %account.id, code = %account.code, "account created");

        Ok(account)
    }

    /// Get an account by ID
    pub async fn get_account(&self, account_id: &str) -> LedgerResult<Option<Account>> {
        self.storage.get_account(account_id).await
    }

    /// Get an account by ID, returning an error if not found
    pub async fn get_account_required(&self, account_id: &str) -> LedgerResult<Account> {
        self.storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    /// List all accounts
    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(None).await
    }

    /// List accounts by type
    pub async fn list_accounts_by_type(
        &self,
        account_type: AccountType,
    ) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(Some(account_type)).await
    }

    /// Delete an account that has no children and no postings
    pub async fn delete_account(&mut self, account_id: &str) -> LedgerResult<()> {
        let account = self.get_account_required(account_id).await?;

        let chart = self.storage.list_accounts(None).await?;
        if !child_accounts(&chart, account_id).is_empty() {
            return Err(LedgerError::Validation(format!(
                "Account '{}' still has child accounts",
                account.code
            )));
        }

        let has_postings = self
            .storage
            .get_transactions(None, None)
            .await?
            .iter()
            .any(|t| t.affects_account(account_id));
        self.validator
            .validate_account_deletion(&account, has_postings)?;

        self.storage.delete_account(account_id).await
    }

    /// Running ledger balance of an account
    pub async fn get_balance(&self, account_id: &str) -> LedgerResult<BigDecimal> {
        Ok(self.get_account_required(account_id).await?.balance)
    }
}

/// Find an account by id
pub fn find_account<'a>(chart: &'a [Account], account_id: &str) -> Option<&'a Account> {
    chart.iter().find(|a| a.id == account_id)
}

/// Find an account by chart code
pub fn find_by_code<'a>(chart: &'a [Account], code: &str) -> Option<&'a Account> {
    chart.iter().find(|a| a.code == code)
}

/// Direct children of an account
pub fn child_accounts<'a>(chart: &'a [Account], parent_id: &str) -> Vec<&'a Account> {
    chart
        .iter()
        .filter(|a| a.parent_id.as_deref() == Some(parent_id))
        .collect()
}

/// Inventory GL accounts, sorted by name
pub fn inventory_gl_accounts(chart: &[Account]) -> Vec<&Account> {
    let mut accounts: Vec<&Account> = chart
        .iter()
        .filter(|a| a.is_inventory_gl && a.level == AccountLevel::Gl)
        .collect();
    accounts.sort_by_key(|a| a.name.to_lowercase());
    accounts
}

/// GL accounts under the group with the given code, sorted by name.
///
/// Used to offer receivable and payable accounts on sales and purchase vouchers.
pub fn gl_accounts_in_group<'a>(chart: &'a [Account], group_code: &str) -> Vec<&'a Account> {
    let Some(group) = chart
        .iter()
        .find(|a| a.level == AccountLevel::Group && a.code == group_code)
    else {
        return Vec::new();
    };
    let mut accounts: Vec<&Account> = child_accounts(chart, &group.id)
        .into_iter()
        .filter(|a| a.level == AccountLevel::Gl)
        .collect();
    accounts.sort_by_key(|a| a.name.to_lowercase());
    accounts
}

/// Pairs an inventory GL with the COGS GL sharing its trailing code digits:
/// `30001` maps to `180001` under the default conventions.
#[derive(Debug, Clone)]
pub struct CodeSuffixCogsMapping {
    prefix: String,
    suffix_len: usize,
}

impl CodeSuffixCogsMapping {
    pub fn new(prefix: String, suffix_len: usize) -> Self {
        Self { prefix, suffix_len }
    }

    pub fn from_conventions(conventions: &ChartConventions) -> Self {
        Self::new(
            conventions.cogs_code_prefix.clone(),
            conventions.cogs_suffix_len,
        )
    }

    /// COGS code an inventory code maps to, if the code is long enough
    pub fn cogs_code(&self, inventory_code: &str) -> Option<String> {
        let split = inventory_code.len().checked_sub(self.suffix_len)?;
        let suffix = inventory_code.get(split..)?;
        Some(format!("{}{}", self.prefix, suffix))
    }
}

impl Default for CodeSuffixCogsMapping {
    fn default() -> Self {
        Self::from_conventions(&ChartConventions::default())
    }
}

impl CogsMapping for CodeSuffixCogsMapping {
    fn cogs_account<'a>(
        &self,
        inventory_gl: &Account,
        chart: &'a [Account],
    ) -> Option<&'a Account> {
        let code = self.cogs_code(&inventory_gl.code)?;
        find_by_code(chart, &code).filter(|a| a.is_cogs_gl)
    }
}

/// Explicit inventory GL id to COGS GL id table
#[derive(Debug, Clone, Default)]
pub struct TableCogsMapping {
    pairs: HashMap<String, String>,
}

impl TableCogsMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map an inventory GL to a COGS GL
    pub fn pair(mut self, inventory_gl_id: String, cogs_gl_id: String) -> Self {
        self.pairs.insert(inventory_gl_id, cogs_gl_id);
        self
    }
}

impl CogsMapping for TableCogsMapping {
    fn cogs_account<'a>(
        &self,
        inventory_gl: &Account,
        chart: &'a [Account],
    ) -> Option<&'a Account> {
        let cogs_id = self.pairs.get(&inventory_gl.id)?;
        find_account(chart, cogs_id).filter(|a| a.is_cogs_gl)
    }
}

/// Utility functions for working with accounts
pub mod utils {
    use super::*;

    /// Create a standard chart of accounts for a small trading business.
    ///
    /// Returns the created accounts keyed by a short name.
    pub async fn create_standard_chart<S: LedgerStorage>(
        account_manager: &mut AccountManager<S>,
        conventions: &ChartConventions,
    ) -> LedgerResult<HashMap<String, Account>> {
        use AccountLevel::*;
        use AccountType::*;

        let cogs_gl = |suffix: &str| format!("{}{}", conventions.cogs_code_prefix, suffix);

        // (key, code, name, type, level, parent key)
        let layout: Vec<(&str, String, &str, AccountType, AccountLevel, Option<&str>)> = vec![
            ("assets", "1".into(), "Assets", Asset, Main, None),
            ("liabilities", "2".into(), "Liabilities", Liability, Main, None),
            ("equity", "3".into(), "Equity", Equity, Main, None),
            ("income", "4".into(), "Income", Income, Main, None),
            ("expenses", "5".into(), "Expenses", Expense, Main, None),
            (
                "cash_group",
                conventions.cash_group_code.clone(),
                "Cash and Bank",
                Asset,
                Group,
                Some("assets"),
            ),
            (
                "receivable_group",
                conventions.receivable_group_code.clone(),
                "Accounts Receivable",
                Asset,
                Group,
                Some("assets"),
            ),
            ("inventory_group", "30000".into(), "Inventory", Asset, Group, Some("assets")),
            (
                "payable_group",
                conventions.payable_group_code.clone(),
                "Accounts Payable",
                Liability,
                Group,
                Some("liabilities"),
            ),
            ("capital_group", "120000".into(), "Share Capital", Equity, Group, Some("equity")),
            (
                "retained_earnings_group",
                conventions.retained_earnings_group_code.clone(),
                "Retained Earnings",
                Equity,
                Group,
                Some("equity"),
            ),
            ("revenue_group", "160000".into(), "Revenue", Income, Group, Some("income")),
            (
                "cost_of_sales_group",
                format!("{}00", conventions.cogs_code_prefix),
                "Cost of Sales",
                Expense,
                Group,
                Some("expenses"),
            ),
            (
                "operating_expense_group",
                "190000".into(),
                "Operating Expenses",
                Expense,
                Group,
                Some("expenses"),
            ),
            ("cash", "10001".into(), "Cash in Hand", Asset, Gl, Some("cash_group")),
            ("bank", "10002".into(), "Bank Account", Asset, Gl, Some("cash_group")),
            (
                "trade_receivable",
                "20001".into(),
                "Trade Receivables",
                Asset,
                Gl,
                Some("receivable_group"),
            ),
            (
                "finished_goods",
                "30001".into(),
                "Finished Goods",
                Asset,
                Gl,
                Some("inventory_group"),
            ),
            ("raw_materials", "30002".into(), "Raw Materials", Asset, Gl, Some("inventory_group")),
            (
                "trade_payable",
                "70001".into(),
                "Trade Payables",
                Liability,
                Gl,
                Some("payable_group"),
            ),
            (
                "owners_capital",
                "120001".into(),
                "Owner's Capital",
                Equity,
                Gl,
                Some("capital_group"),
            ),
            (
                "retained_earnings",
                "130001".into(),
                "Retained Earnings",
                Equity,
                Gl,
                Some("retained_earnings_group"),
            ),
            ("sales_revenue", "160001".into(), "Sales Revenue", Income, Gl, Some("revenue_group")),
            (
                "cogs_finished_goods",
                cogs_gl("01"),
                "Cost of Sales - Finished Goods",
                Expense,
                Gl,
                Some("cost_of_sales_group"),
            ),
            (
                "cogs_raw_materials",
                cogs_gl("02"),
                "Cost of Sales - Raw Materials",
                Expense,
                Gl,
                Some("cost_of_sales_group"),
            ),
            (
                "rent_expense",
                "190001".into(),
                "Rent Expense",
                Expense,
                Gl,
                Some("operating_expense_group"),
            ),
        ];

        let mut accounts: HashMap<String, Account> = HashMap::new();

        for (key, code, name, account_type, level, parent) in layout {
            let parent_id = match parent {
                Some(parent_key) => Some(
                    accounts
                        .get(parent_key)
                        .map(|a| a.id.clone())
                        .ok_or_else(|| LedgerError::AccountNotFound(parent_key.to_string()))?,
                ),
                None => None,
            };

            let mut account = Account::new(
                code.clone(),
                code,
                name.to_string(),
                account_type,
                level,
                parent_id,
            );
            match key {
                "finished_goods" | "raw_materials" => account = account.inventory_gl(),
                "cogs_finished_goods" | "cogs_raw_materials" => account = account.cogs_gl(),
                // closed into by year-end processing only
                "retained_earnings" => account = account.locked(),
                _ => {}
            }

            let created = account_manager.create_account(account).await?;
            accounts.insert(key.to_string(), created);
        }

        Ok(accounts)
    }
}
