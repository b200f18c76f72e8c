//! Presentation-side balances
//!
//! Ledger balances are debit-positive for every account type. Reports show
//! assets as-is and every other type negated so that liabilities, equity and
//! income read positive in their natural state. Nothing in this module feeds
//! back into ledger arithmetic.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{ChartConventions, EngineConfig};
use crate::ledger::balance::AccountWithTotals;
use crate::types::*;

/// Natural-sign balance for presentation
pub fn display_balance(account_type: AccountType, ledger_balance: &BigDecimal) -> BigDecimal {
    match account_type {
        AccountType::Asset => ledger_balance.clone(),
        _ => -ledger_balance.clone(),
    }
}

/// Both operands are already sign-flipped, so profit is their sum
pub fn net_profit_for_display(
    displayed_income: &BigDecimal,
    displayed_expense: &BigDecimal,
) -> BigDecimal {
    displayed_income + displayed_expense
}

/// One account as presented in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayRow {
    pub account_id: String,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub level: AccountLevel,
    pub amount: BigDecimal,
}

impl DisplayRow {
    fn closing(row: &AccountWithTotals) -> Self {
        Self::with_amount(row, display_balance(row.account_type, &row.closing_balance))
    }

    fn with_amount(row: &AccountWithTotals, amount: BigDecimal) -> Self {
        Self {
            account_id: row.account_id.clone(),
            code: row.code.clone(),
            name: row.name.clone(),
            account_type: row.account_type,
            level: row.level,
            amount,
        }
    }
}

fn gl_rows(
    rows: &[AccountWithTotals],
    account_type: AccountType,
) -> impl Iterator<Item = &AccountWithTotals> {
    rows.iter()
        .filter(move |r| r.level == AccountLevel::Gl && r.account_type == account_type)
}

fn displayed_total<F>(
    rows: &[AccountWithTotals],
    account_type: AccountType,
    amount: F,
) -> BigDecimal
where
    F: Fn(&AccountWithTotals) -> BigDecimal,
{
    gl_rows(rows, account_type)
        .map(|r| display_balance(account_type, &amount(r)))
        .sum()
}

/// Net profit over the closing balances of the rows
pub fn net_profit(rows: &[AccountWithTotals]) -> BigDecimal {
    let closing = |r: &AccountWithTotals| r.closing_balance.clone();
    net_profit_for_display(
        &displayed_total(rows, AccountType::Income, closing),
        &displayed_total(rows, AccountType::Expense, closing),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub income: Vec<DisplayRow>,
    pub expenses: Vec<DisplayRow>,
    pub total_income: BigDecimal,
    /// Displayed sign: normally negative
    pub total_expenses: BigDecimal,
    pub net_profit: BigDecimal,
}

/// Income statement from the period activity of `rows`
pub fn income_statement(
    rows: &[AccountWithTotals],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> IncomeStatement {
    let activity = |r: &AccountWithTotals| &r.debit - &r.credit;
    let period_rows = |account_type: AccountType| -> Vec<DisplayRow> {
        gl_rows(rows, account_type)
            .map(|r| DisplayRow::with_amount(r, display_balance(account_type, &activity(r))))
            .collect()
    };

    let total_income = displayed_total(rows, AccountType::Income, activity);
    let total_expenses = displayed_total(rows, AccountType::Expense, activity);
    let net_profit = net_profit_for_display(&total_income, &total_expenses);

    IncomeStatement {
        start_date,
        end_date,
        income: period_rows(AccountType::Income),
        expenses: period_rows(AccountType::Expense),
        total_income,
        total_expenses,
        net_profit,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub as_of_date: NaiveDate,
    pub assets: Vec<DisplayRow>,
    pub liabilities: Vec<DisplayRow>,
    pub equity: Vec<DisplayRow>,
    pub total_assets: BigDecimal,
    pub total_liabilities: BigDecimal,
    /// Includes net profit not yet closed to retained earnings
    pub total_equity: BigDecimal,
    pub is_balanced: bool,
}

/// Group-level balance sheet from closing balances.
///
/// The retained earnings group shows its own balance plus current net profit.
pub fn balance_sheet(
    rows: &[AccountWithTotals],
    as_of_date: NaiveDate,
    config: &EngineConfig,
) -> BalanceSheet {
    let closing = |r: &AccountWithTotals| r.closing_balance.clone();
    let profit = net_profit(rows);
    let retained_earnings_code = &config.conventions.retained_earnings_group_code;

    let groups = |account_type: AccountType| -> Vec<DisplayRow> {
        rows.iter()
            .filter(|r| r.level == AccountLevel::Group && r.account_type == account_type)
            .map(|r| {
                if r.code == *retained_earnings_code {
                    let own = display_balance(r.account_type, &r.closing_balance);
                    DisplayRow::with_amount(r, own + &profit)
                } else {
                    DisplayRow::closing(r)
                }
            })
            .collect()
    };

    let assets = groups(AccountType::Asset);
    let liabilities = groups(AccountType::Liability);
    let mut equity = groups(AccountType::Equity);

    if !rows.iter().any(|r| r.code == *retained_earnings_code) && profit != BigDecimal::from(0) {
        equity.push(DisplayRow {
            account_id: "net_income".to_string(),
            code: String::new(),
            name: "Net Income".to_string(),
            account_type: AccountType::Equity,
            level: AccountLevel::Group,
            amount: profit.clone(),
        });
    }

    let total_assets = displayed_total(rows, AccountType::Asset, closing);
    let total_liabilities = displayed_total(rows, AccountType::Liability, closing);
    let total_equity = displayed_total(rows, AccountType::Equity, closing) + &profit;
    let is_balanced = config.within_tolerance(&total_assets, &(&total_liabilities + &total_equity));

    BalanceSheet {
        as_of_date,
        assets,
        liabilities,
        equity,
        total_assets,
        total_liabilities,
        total_equity,
        is_balanced,
    }
}

/// Dashboard figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub cash_balance: BigDecimal,
    pub receivables: BigDecimal,
    pub payables: BigDecimal,
    pub net_income: BigDecimal,
    pub total_assets: BigDecimal,
    pub total_liabilities: BigDecimal,
    pub total_equity: BigDecimal,
}

fn group_row<'a>(rows: &'a [AccountWithTotals], code: &str) -> Option<&'a AccountWithTotals> {
    rows.iter()
        .find(|r| r.level == AccountLevel::Group && r.code == code)
}

fn group_amount(rows: &[AccountWithTotals], code: &str) -> BigDecimal {
    group_row(rows, code)
        .map(|r| display_balance(r.account_type, &r.closing_balance))
        .unwrap_or_else(|| BigDecimal::from(0))
}

pub fn financial_summary(
    rows: &[AccountWithTotals],
    conventions: &ChartConventions,
) -> FinancialSummary {
    let closing = |r: &AccountWithTotals| r.closing_balance.clone();
    let net_income = net_profit(rows);

    FinancialSummary {
        cash_balance: group_amount(rows, &conventions.cash_group_code),
        receivables: group_amount(rows, &conventions.receivable_group_code),
        payables: group_amount(rows, &conventions.payable_group_code),
        total_assets: displayed_total(rows, AccountType::Asset, closing),
        total_liabilities: displayed_total(rows, AccountType::Liability, closing),
        total_equity: displayed_total(rows, AccountType::Equity, closing) + &net_income,
        net_income,
    }
}

/// One group's contribution to a cash flow section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowItem {
    pub account_id: String,
    pub code: String,
    pub description: String,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub net_profit: BigDecimal,
    pub operating_activities: Vec<CashFlowItem>,
    pub investing_activities: Vec<CashFlowItem>,
    pub financing_activities: Vec<CashFlowItem>,
    /// Net profit plus the operating adjustments
    pub net_operating_cash_flow: BigDecimal,
    pub net_investing_cash_flow: BigDecimal,
    pub net_financing_cash_flow: BigDecimal,
    pub net_cash_flow: BigDecimal,
    pub opening_cash: BigDecimal,
    pub closing_cash: BigDecimal,
}

/// Cash effect of each listed group's movement over the period.
///
/// Balances are debit-positive, so a group that grew absorbed cash and one
/// that shrank released it: the effect is the negated change for every
/// account type. Groups that did not move are left out.
fn cash_flow_items(rows: &[AccountWithTotals], codes: &[String]) -> Vec<CashFlowItem> {
    codes
        .iter()
        .filter_map(|code| group_row(rows, code))
        .filter_map(|r| {
            let amount = &r.opening_balance - &r.closing_balance;
            (amount != BigDecimal::from(0)).then(|| CashFlowItem {
                account_id: r.account_id.clone(),
                code: r.code.clone(),
                description: r.name.clone(),
                amount,
            })
        })
        .collect()
}

fn items_total(items: &[CashFlowItem]) -> BigDecimal {
    items.iter().map(|i| i.amount.clone()).sum()
}

/// Indirect-method cash flow from the period rows of `[start_date, end_date]`
pub fn cash_flow(
    rows: &[AccountWithTotals],
    start_date: NaiveDate,
    end_date: NaiveDate,
    conventions: &ChartConventions,
) -> CashFlowStatement {
    let net_profit = income_statement(rows, start_date, end_date).net_profit;

    let operating_activities = cash_flow_items(rows, &conventions.operating_group_codes);
    let investing_activities = cash_flow_items(rows, &conventions.investing_group_codes);
    let financing_activities = cash_flow_items(rows, &conventions.financing_group_codes);

    let net_operating_cash_flow = &net_profit + items_total(&operating_activities);
    let net_investing_cash_flow = items_total(&investing_activities);
    let net_financing_cash_flow = items_total(&financing_activities);
    let net_cash_flow =
        &net_operating_cash_flow + &net_investing_cash_flow + &net_financing_cash_flow;

    let cash = group_row(rows, &conventions.cash_group_code);
    let (opening_cash, closing_cash) = match cash {
        Some(r) => (
            display_balance(r.account_type, &r.opening_balance),
            display_balance(r.account_type, &r.closing_balance),
        ),
        None => (BigDecimal::from(0), BigDecimal::from(0)),
    };

    if net_cash_flow != &closing_cash - &opening_cash {
        tracing::warn!(
            %net_cash_flow,
            %opening_cash,
            %closing_cash,
            "cash flow sections do not explain the change in cash"
        );
    }

    CashFlowStatement {
        start_date,
        end_date,
        net_profit,
        operating_activities,
        investing_activities,
        financing_activities,
        net_operating_cash_flow,
        net_investing_cash_flow,
        net_financing_cash_flow,
        net_cash_flow,
        opening_cash,
        closing_cash,
    }
}
