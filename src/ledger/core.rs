//! Main ledger orchestrator that coordinates accounts, stock and vouchers

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::inventory::{self, VoucherGenerator, VoucherOutput, VoucherRequest};
use crate::ledger::account::CodeSuffixCogsMapping;
use crate::ledger::balance::{self, AccountStatement, AccountWithTotals, TrialBalance};
use crate::ledger::transaction::{next_voucher_no, DoubleEntryValidator};
use crate::ledger::{AccountManager, TransactionManager};
use crate::reconciliation::{self, SyncReport};
use crate::reporting::{self, BalanceSheet, CashFlowStatement, FinancialSummary, IncomeStatement};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_sub_ledger;

/// Engine context: storage, configuration and the COGS mapping of one chart.
///
/// Every posting reads a snapshot, builds the voucher against it and commits
/// it with the revisions it read. A commit that lost a race fails with
/// [`LedgerError::ConcurrentModification`]; retrying is up to the caller.
pub struct Ledger<S: LedgerStorage> {
    account_manager: AccountManager<S>,
    transaction_manager: TransactionManager<S>,
    config: EngineConfig,
    cogs_mapping: Box<dyn CogsMapping>,
}

impl<S: LedgerStorage + Clone> Ledger<S> {
    /// Create a new ledger with the given storage backend
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, EngineConfig::default())
    }

    /// Create a new ledger with explicit configuration
    pub fn with_config(storage: S, config: EngineConfig) -> Self {
        let transaction_validator = Box::new(DoubleEntryValidator::from_config(&config));
        Self::with_validators(
            storage,
            config,
            Box::new(DefaultAccountValidator),
            transaction_validator,
        )
    }

    /// Create a new ledger with custom validators
    pub fn with_validators(
        storage: S,
        config: EngineConfig,
        account_validator: Box<dyn AccountValidator>,
        transaction_validator: Box<dyn TransactionValidator>,
    ) -> Self {
        let cogs_mapping = Box::new(CodeSuffixCogsMapping::from_conventions(&config.conventions));
        Self {
            account_manager: AccountManager::with_validator(storage.clone(), account_validator),
            transaction_manager: TransactionManager::with_validator(storage, transaction_validator),
            config,
            cogs_mapping,
        }
    }

    /// Replace the inventory GL to COGS GL mapping
    pub fn with_cogs_mapping(mut self, cogs_mapping: Box<dyn CogsMapping>) -> Self {
        self.cogs_mapping = cogs_mapping;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn snapshot(&self) -> LedgerResult<LedgerSnapshot> {
        self.transaction_manager.storage.snapshot().await
    }

    // Account operations
    /// Create a new account
    pub async fn create_account(&mut self, account: Account) -> LedgerResult<Account> {
        self.account_manager.create_account(account).await
    }

    /// Get an account by ID
    pub async fn get_account(&self, account_id: &str) -> LedgerResult<Option<Account>> {
        self.account_manager.get_account(account_id).await
    }

    /// List all accounts
    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.account_manager.list_accounts().await
    }

    /// List accounts by type
    pub async fn list_accounts_by_type(
        &self,
        account_type: AccountType,
    ) -> LedgerResult<Vec<Account>> {
        self.account_manager
            .list_accounts_by_type(account_type)
            .await
    }

    /// Delete an account
    pub async fn delete_account(&mut self, account_id: &str) -> LedgerResult<()> {
        self.account_manager.delete_account(account_id).await
    }

    /// Running ledger balance of an account (debit-positive)
    pub async fn get_account_balance(&self, account_id: &str) -> LedgerResult<BigDecimal> {
        self.account_manager.get_balance(account_id).await
    }

    /// Setup a standard chart of accounts for a small trading business
    pub async fn setup_standard_chart_of_accounts(
        &mut self,
    ) -> LedgerResult<HashMap<String, Account>> {
        crate::ledger::account::utils::create_standard_chart(
            &mut self.account_manager,
            &self.config.conventions,
        )
        .await
    }

    // Sub-ledger operations
    /// Register a stock item under an inventory GL
    pub async fn create_sub_ledger(
        &mut self,
        sub_ledger: InventorySubLedger,
    ) -> LedgerResult<InventorySubLedger> {
        let snapshot = self.snapshot().await?;
        validate_sub_ledger(&sub_ledger, &snapshot.accounts)?;

        if snapshot.sub_ledgers.iter().any(|s| {
            s.id == sub_ledger.id
                || (s.item_code == sub_ledger.item_code && s.company_id == sub_ledger.company_id)
        }) {
            return Err(LedgerError::Validation(format!(
                "Sub-ledger '{}' ({}) already exists",
                sub_ledger.id, sub_ledger.item_code
            )));
        }

        self.transaction_manager
            .storage
            .save_sub_ledger(&sub_ledger)
            .await?;
        tracing::debug!(
            sub_ledger_id = %sub_ledger.id,
            inventory_gl_account_id = %sub_ledger.inventory_gl_account_id,
            "sub-ledger created"
        );

        Ok(sub_ledger)
    }

    pub async fn get_sub_ledger(
        &self,
        sub_ledger_id: &str,
    ) -> LedgerResult<Option<InventorySubLedger>> {
        self.transaction_manager
            .storage
            .get_sub_ledger(sub_ledger_id)
            .await
    }

    pub async fn list_sub_ledgers(
        &self,
        inventory_gl_account_id: Option<&str>,
    ) -> LedgerResult<Vec<InventorySubLedger>> {
        self.transaction_manager
            .storage
            .list_sub_ledgers(inventory_gl_account_id)
            .await
    }

    /// Delete a sub-ledger that never moved stock
    pub async fn delete_sub_ledger(&mut self, sub_ledger_id: &str) -> LedgerResult<()> {
        let movements = self
            .transaction_manager
            .storage
            .get_movements(Some(sub_ledger_id))
            .await?;
        if !inventory::can_delete_sub_ledger(sub_ledger_id, &movements) {
            return Err(LedgerError::Validation(format!(
                "Sub-ledger '{}' has stock movements and cannot be deleted",
                sub_ledger_id
            )));
        }

        self.transaction_manager
            .storage
            .delete_sub_ledger(sub_ledger_id)
            .await
    }

    // Voucher operations
    /// Build, validate and atomically commit a voucher
    pub async fn post_voucher(&mut self, request: VoucherRequest) -> LedgerResult<VoucherOutput> {
        let snapshot = self.snapshot().await?;

        let result = self.build_posting(&request, &snapshot);
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(
                    voucher_no = %request.voucher_no(),
                    voucher_type = ?request.voucher_type(),
                    error = %e,
                    "voucher rejected"
                );
                return Err(e);
            }
        };

        self.commit(output, &snapshot).await
    }

    fn build_posting(
        &self,
        request: &VoucherRequest,
        snapshot: &LedgerSnapshot,
    ) -> LedgerResult<VoucherOutput> {
        if let VoucherRequest::Sales(sales) = request {
            reconciliation::check_sales_sufficiency(
                &sales.items,
                &snapshot.sub_ledgers,
                &snapshot.movements,
            )?;
        }

        VoucherGenerator::new(&self.config, &*self.cogs_mapping).generate(request, snapshot)
    }

    async fn commit(
        &mut self,
        output: VoucherOutput,
        snapshot: &LedgerSnapshot,
    ) -> LedgerResult<VoucherOutput> {
        let transaction = &output.transaction;
        match self.transaction_manager.record(&output, snapshot).await {
            Ok(()) => {
                tracing::info!(
                    transaction_id = %transaction.id,
                    voucher_no = %transaction.voucher_no,
                    voucher_type = ?transaction.voucher_type,
                    amount = %transaction.total_debits(),
                    movements = output.movements.len(),
                    "voucher posted"
                );
                Ok(output)
            }
            Err(e) => {
                tracing::warn!(
                    voucher_no = %transaction.voucher_no,
                    error = %e,
                    "voucher rejected"
                );
                Err(e)
            }
        }
    }

    /// Post the compensating voucher of a committed one
    pub async fn reverse_voucher(
        &mut self,
        transaction_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<VoucherOutput> {
        let snapshot = self.snapshot().await?;

        let original = snapshot
            .transactions
            .iter()
            .find(|t| t.id == transaction_id)
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.to_string()))?;

        if snapshot
            .transactions
            .iter()
            .any(|t| t.reverses.as_deref() == Some(transaction_id))
        {
            return Err(LedgerError::InvalidTransaction(format!(
                "Voucher '{}' has already been reversed",
                original.voucher_no
            )));
        }

        let voucher_no = next_voucher_no(original.voucher_type, &snapshot.transactions);
        let output = VoucherGenerator::new(&self.config, &*self.cogs_mapping)
            .reverse_voucher(original, &snapshot.movements, voucher_no, date)?;

        // undoing a purchase takes stock out again
        reconciliation::check_outward_sufficiency(
            &output.movements,
            &snapshot.sub_ledgers,
            &snapshot.movements,
        )?;

        self.commit(output, &snapshot).await
    }

    /// Next free voucher number for a type
    pub async fn next_voucher_no(&self, voucher_type: VoucherType) -> LedgerResult<String> {
        let transactions = self.transaction_manager.get_transactions(None, None).await?;
        Ok(next_voucher_no(voucher_type, &transactions))
    }

    /// Get a transaction by ID
    pub async fn get_transaction(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>> {
        self.transaction_manager
            .get_transaction(transaction_id)
            .await
    }

    /// Get all transactions within a date range
    pub async fn get_transactions(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>> {
        self.transaction_manager
            .get_transactions(start_date, end_date)
            .await
    }

    // Balance and reporting operations
    /// Opening, period and closing totals per account; open bounds are unbounded
    pub async fn compute_balances(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<AccountWithTotals>> {
        let snapshot = self.snapshot().await?;
        Ok(balance::compute_balances(
            &snapshot.accounts,
            &snapshot.transactions,
            start_date.unwrap_or(NaiveDate::MIN),
            end_date.unwrap_or(NaiveDate::MAX),
        ))
    }

    pub async fn account_statement(
        &self,
        account_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<AccountStatement> {
        let snapshot = self.snapshot().await?;
        let account = snapshot
            .account(account_id)
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
        Ok(balance::account_statement(
            account,
            &snapshot.transactions,
            start_date,
            end_date,
        ))
    }

    /// Get trial balance as of a specific date
    pub async fn trial_balance(&self, as_of_date: NaiveDate) -> LedgerResult<TrialBalance> {
        let rows = self.compute_balances(None, Some(as_of_date)).await?;
        Ok(balance::trial_balance(&rows, &self.config.tolerance))
    }

    pub async fn income_statement(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<IncomeStatement> {
        let rows = self
            .compute_balances(Some(start_date), Some(end_date))
            .await?;
        Ok(reporting::income_statement(&rows, start_date, end_date))
    }

    pub async fn balance_sheet(&self, as_of_date: NaiveDate) -> LedgerResult<BalanceSheet> {
        let rows = self.compute_balances(None, Some(as_of_date)).await?;
        Ok(reporting::balance_sheet(&rows, as_of_date, &self.config))
    }

    /// Cash movement over the period, explained by group balance changes
    pub async fn cash_flow(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<CashFlowStatement> {
        let rows = self
            .compute_balances(Some(start_date), Some(end_date))
            .await?;
        Ok(reporting::cash_flow(
            &rows,
            start_date,
            end_date,
            &self.config.conventions,
        ))
    }

    /// Dashboard figures over everything posted up to `as_of_date`
    pub async fn financial_summary(
        &self,
        as_of_date: Option<NaiveDate>,
    ) -> LedgerResult<FinancialSummary> {
        let rows = self.compute_balances(None, as_of_date).await?;
        Ok(reporting::financial_summary(&rows, &self.config.conventions))
    }

    pub async fn sub_ledger_balance(
        &self,
        sub_ledger_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<inventory::SubLedgerBalance> {
        let snapshot = self.snapshot().await?;
        let sub_ledger = snapshot
            .sub_ledger(sub_ledger_id)
            .ok_or_else(|| LedgerError::SubLedgerNotFound(sub_ledger_id.to_string()))?;
        Ok(inventory::sub_ledger_balance(
            sub_ledger,
            &snapshot.movements,
            start_date.unwrap_or(NaiveDate::MIN),
            end_date.unwrap_or(NaiveDate::MAX),
        ))
    }

    /// Weighted-average unit cost of an item as of a date
    pub async fn weighted_average_cost(
        &self,
        sub_ledger_id: &str,
        as_of_date: NaiveDate,
    ) -> LedgerResult<BigDecimal> {
        let snapshot = self.snapshot().await?;
        let sub_ledger = snapshot
            .sub_ledger(sub_ledger_id)
            .ok_or_else(|| LedgerError::SubLedgerNotFound(sub_ledger_id.to_string()))?;
        Ok(inventory::weighted_average_cost(
            sub_ledger,
            &snapshot.movements,
            as_of_date,
        ))
    }

    pub async fn inventory_report(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<Vec<inventory::InventoryReportRow>> {
        let snapshot = self.snapshot().await?;
        Ok(inventory::inventory_report(
            &snapshot.sub_ledgers,
            &snapshot.movements,
            start_date,
            end_date,
        ))
    }

    pub async fn audit_trail(
        &self,
        sub_ledger_id: &str,
    ) -> LedgerResult<Vec<inventory::AuditTrailLine>> {
        let snapshot = self.snapshot().await?;
        Ok(inventory::audit_trail(
            sub_ledger_id,
            &snapshot.movements,
            &snapshot.transactions,
        ))
    }

    /// Whether `quantity` units of an item are in stock right now
    pub async fn check_sufficiency(
        &self,
        sub_ledger_id: &str,
        quantity: &BigDecimal,
    ) -> LedgerResult<bool> {
        let snapshot = self.snapshot().await?;
        let sub_ledger = snapshot
            .sub_ledger(sub_ledger_id)
            .ok_or_else(|| LedgerError::SubLedgerNotFound(sub_ledger_id.to_string()))?;
        Ok(reconciliation::check_sufficiency(
            sub_ledger,
            quantity,
            &snapshot.movements,
        ))
    }

    /// GL/sub-ledger agreement for every inventory GL
    pub async fn check_inventory_sync(&self) -> LedgerResult<Vec<SyncReport>> {
        let snapshot = self.snapshot().await?;
        Ok(reconciliation::check_all_gl_sync(
            &snapshot.accounts,
            &snapshot.sub_ledgers,
            &snapshot.movements,
            &self.config.tolerance,
        ))
    }

    /// Validate the integrity of the ledger
    pub async fn validate_integrity(
        &self,
        as_of_date: NaiveDate,
    ) -> LedgerResult<LedgerIntegrityReport> {
        let snapshot = self.snapshot().await?;
        let rows = balance::compute_balances(
            &snapshot.accounts,
            &snapshot.transactions,
            NaiveDate::MIN,
            as_of_date,
        );
        let trial_balance = balance::trial_balance(&rows, &self.config.tolerance);
        let balance_sheet = reporting::balance_sheet(&rows, as_of_date, &self.config);

        let mut issues = Vec::new();

        // Check if trial balance is balanced
        if !trial_balance.is_balanced {
            issues.push(format!(
                "Trial balance is not balanced: debits = {}, credits = {}",
                trial_balance.total_debits, trial_balance.total_credits
            ));
        }

        let total_liabilities_equity =
            &balance_sheet.total_liabilities + &balance_sheet.total_equity;

        // Check if balance sheet is balanced
        if !balance_sheet.is_balanced {
            issues.push(format!(
                "Balance sheet is not balanced: assets = {}, liabilities + equity = {}",
                balance_sheet.total_assets, total_liabilities_equity
            ));
        }

        // Running balances must match a full replay
        let replayed = balance::compute_balances(
            &snapshot.accounts,
            &snapshot.transactions,
            NaiveDate::MIN,
            NaiveDate::MAX,
        );
        for account in snapshot.accounts.iter().filter(|a| a.level == AccountLevel::Gl) {
            if let Some(row) = replayed.iter().find(|r| r.account_id == account.id) {
                if !self
                    .config
                    .within_tolerance(&row.closing_balance, &account.balance)
                {
                    issues.push(format!(
                        "Account '{}' running balance {} differs from replayed balance {}",
                        account.code, account.balance, row.closing_balance
                    ));
                }
            }
        }

        let sync_reports = reconciliation::check_all_gl_sync(
            &snapshot.accounts,
            &snapshot.sub_ledgers,
            &snapshot.movements,
            &self.config.tolerance,
        );
        for report in sync_reports.iter().filter(|r| !r.is_synced) {
            issues.push(format!(
                "Inventory GL '{}' differs from its sub-ledgers by {}",
                report.gl_account_id, report.variance
            ));
        }

        for sub_ledger in &snapshot.sub_ledgers {
            if let Some((date, quantity)) =
                inventory::negative_stock_points(sub_ledger, &snapshot.movements).first()
            {
                issues.push(format!(
                    "Sub-ledger '{}' went negative ({}) on {}",
                    sub_ledger.item_code, quantity, date
                ));
            }
        }

        Ok(LedgerIntegrityReport {
            as_of_date,
            is_valid: issues.is_empty(),
            issues,
            trial_balance_total_debits: trial_balance.total_debits,
            trial_balance_total_credits: trial_balance.total_credits,
            balance_sheet_total_assets: balance_sheet.total_assets,
            balance_sheet_total_liabilities_equity: total_liabilities_equity,
            sync_reports,
        })
    }
}

/// Report on ledger integrity and validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerIntegrityReport {
    pub as_of_date: NaiveDate,
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub trial_balance_total_debits: BigDecimal,
    pub trial_balance_total_credits: BigDecimal,
    pub balance_sheet_total_assets: BigDecimal,
    pub balance_sheet_total_liabilities_equity: BigDecimal,
    pub sync_reports: Vec<SyncReport>,
}
