//! Balance replay over date ranges
//!
//! Balances are debit-positive for every account type. Entries touching an
//! account are replayed by voucher date; same-date entries keep the order in
//! which they were posted.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::*;

/// Opening, period and closing figures of one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountWithTotals {
    pub account_id: String,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub level: AccountLevel,
    pub parent_id: Option<String>,
    pub opening_balance: BigDecimal,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    pub closing_balance: BigDecimal,
}

impl AccountWithTotals {
    fn empty(account: &Account) -> Self {
        Self {
            account_id: account.id.clone(),
            code: account.code.clone(),
            name: account.name.clone(),
            account_type: account.account_type,
            level: account.level,
            parent_id: account.parent_id.clone(),
            opening_balance: BigDecimal::from(0),
            debit: BigDecimal::from(0),
            credit: BigDecimal::from(0),
            closing_balance: BigDecimal::from(0),
        }
    }

    fn absorb(&mut self, other: &AccountWithTotals) {
        self.opening_balance += &other.opening_balance;
        self.debit += &other.debit;
        self.credit += &other.credit;
        self.closing_balance += &other.closing_balance;
    }
}

/// Entries of one account in replay order
fn ordered_entries<'a>(
    account_id: &str,
    transactions: &'a [Transaction],
) -> Vec<(&'a Transaction, &'a Entry)> {
    let mut entries: Vec<(&Transaction, &Entry)> = transactions
        .iter()
        .flat_map(|t| t.entries.iter().map(move |e| (t, e)))
        .filter(|(_, e)| e.account_id == account_id)
        .collect();
    // sort_by_key is stable, insertion order survives for equal dates
    entries.sort_by_key(|(t, _)| t.date);
    entries
}

fn gl_totals(
    account: &Account,
    transactions: &[Transaction],
    start: NaiveDate,
    end: NaiveDate,
) -> AccountWithTotals {
    let mut row = AccountWithTotals::empty(account);
    row.opening_balance = account.opening_balance.clone();

    for (transaction, entry) in ordered_entries(&account.id, transactions) {
        if transaction.date < start {
            row.opening_balance += entry.signed_amount();
        } else if transaction.date <= end {
            row.debit += entry.debit_amount();
            row.credit += entry.credit_amount();
        }
    }

    row.closing_balance = &row.opening_balance + &row.debit - &row.credit;
    row
}

/// Totals for every account in chart order.
///
/// GL rows are replayed from the vouchers. GROUP rows are the sum of their
/// children and MAIN rows the sum of theirs.
pub fn compute_balances(
    accounts: &[Account],
    transactions: &[Transaction],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<AccountWithTotals> {
    let mut rows: HashMap<&str, AccountWithTotals> = accounts
        .iter()
        .filter(|a| a.level == AccountLevel::Gl)
        .map(|a| (a.id.as_str(), gl_totals(a, transactions, start, end)))
        .collect();

    // parents sit at a smaller depth than their children
    for level in [AccountLevel::Group, AccountLevel::Main] {
        for account in accounts.iter().filter(|a| a.level == level) {
            let mut row = AccountWithTotals::empty(account);
            for child in accounts
                .iter()
                .filter(|c| c.parent_id.as_deref() == Some(account.id.as_str()))
            {
                if let Some(child_row) = rows.get(child.id.as_str()) {
                    row.absorb(child_row);
                }
            }
            rows.insert(account.id.as_str(), row);
        }
    }

    tracing::debug!(accounts = accounts.len(), %start, %end, "computed balances");

    accounts
        .iter()
        .filter_map(|a| rows.remove(a.id.as_str()))
        .collect()
}

/// One posting in an account statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLine {
    pub date: NaiveDate,
    pub transaction_id: String,
    pub voucher_no: String,
    pub voucher_type: VoucherType,
    pub description: String,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    pub running_balance: BigDecimal,
}

/// Postings to one account over a period with a running balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStatement {
    pub account_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub opening_balance: BigDecimal,
    pub lines: Vec<StatementLine>,
    pub closing_balance: BigDecimal,
}

pub fn account_statement(
    account: &Account,
    transactions: &[Transaction],
    start: NaiveDate,
    end: NaiveDate,
) -> AccountStatement {
    let mut opening_balance = account.opening_balance.clone();
    let mut lines = Vec::new();

    for (transaction, entry) in ordered_entries(&account.id, transactions) {
        if transaction.date < start {
            opening_balance += entry.signed_amount();
            continue;
        }
        if transaction.date > end {
            break;
        }

        let previous = lines
            .last()
            .map(|l: &StatementLine| l.running_balance.clone())
            .unwrap_or_else(|| opening_balance.clone());
        lines.push(StatementLine {
            date: transaction.date,
            transaction_id: transaction.id.clone(),
            voucher_no: transaction.voucher_no.clone(),
            voucher_type: transaction.voucher_type,
            description: entry
                .description
                .clone()
                .unwrap_or_else(|| transaction.description.clone()),
            debit: entry.debit_amount(),
            credit: entry.credit_amount(),
            running_balance: previous + entry.signed_amount(),
        });
    }

    let closing_balance = lines
        .last()
        .map(|l| l.running_balance.clone())
        .unwrap_or_else(|| opening_balance.clone());

    AccountStatement {
        account_id: account.id.clone(),
        start_date: start,
        end_date: end,
        opening_balance,
        lines,
        closing_balance,
    }
}

/// GL closing balances split into debit and credit columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub rows: Vec<TrialBalanceRow>,
    pub total_debits: BigDecimal,
    pub total_credits: BigDecimal,
    pub is_balanced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_id: String,
    pub code: String,
    pub name: String,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
}

pub fn trial_balance(rows: &[AccountWithTotals], tolerance: &BigDecimal) -> TrialBalance {
    let zero = BigDecimal::from(0);
    let rows: Vec<TrialBalanceRow> = rows
        .iter()
        .filter(|r| r.level == AccountLevel::Gl && r.closing_balance != zero)
        .map(|r| TrialBalanceRow {
            account_id: r.account_id.clone(),
            code: r.code.clone(),
            name: r.name.clone(),
            debit: if r.closing_balance > zero {
                r.closing_balance.clone()
            } else {
                zero.clone()
            },
            credit: if r.closing_balance < zero {
                r.closing_balance.abs()
            } else {
                zero.clone()
            },
        })
        .collect();

    let total_debits: BigDecimal = rows.iter().map(|r| &r.debit).sum();
    let total_credits: BigDecimal = rows.iter().map(|r| &r.credit).sum();
    let is_balanced = (&total_debits - &total_credits).abs() <= *tolerance;

    TrialBalance {
        rows,
        total_debits,
        total_credits,
        is_balanced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn account(
        id: &str,
        account_type: AccountType,
        level: AccountLevel,
        parent: Option<&str>,
    ) -> Account {
        Account::new(
            id.to_string(),
            id.to_string(),
            id.to_string(),
            account_type,
            level,
            parent.map(str::to_string),
        )
    }

    fn chart() -> Vec<Account> {
        vec![
            account("1", AccountType::Asset, AccountLevel::Main, None),
            account("10000", AccountType::Asset, AccountLevel::Group, Some("1")),
            account("10001", AccountType::Asset, AccountLevel::Gl, Some("10000"))
                .with_opening_balance(BigDecimal::from(100)),
            account("10002", AccountType::Asset, AccountLevel::Gl, Some("10000")),
            account("160001", AccountType::Income, AccountLevel::Gl, None),
        ]
    }

    fn voucher(no: &str, day: u32, debit: &str, credit: &str, amount: i64) -> Transaction {
        let mut transaction = Transaction::new(
            no.to_string(),
            no.to_string(),
            date(day),
            VoucherType::Journal,
            no.to_string(),
        );
        transaction.add_entry(Entry::debit(debit.to_string(), BigDecimal::from(amount), None));
        transaction.add_entry(Entry::credit(credit.to_string(), BigDecimal::from(amount), None));
        transaction
    }

    fn row<'a>(rows: &'a [AccountWithTotals], id: &str) -> &'a AccountWithTotals {
        rows.iter().find(|r| r.account_id == id).unwrap()
    }

    #[test]
    fn test_opening_period_and_closing() {
        let transactions = vec![
            voucher("JO-0001", 1, "10001", "160001", 50),
            voucher("JO-0002", 10, "10001", "160001", 30),
            voucher("JO-0003", 20, "10002", "10001", 20),
        ];
        let rows = compute_balances(&chart(), &transactions, date(5), date(31));

        let cash = row(&rows, "10001");
        assert_eq!(cash.opening_balance, BigDecimal::from(150));
        assert_eq!(cash.debit, BigDecimal::from(30));
        assert_eq!(cash.credit, BigDecimal::from(20));
        assert_eq!(cash.closing_balance, BigDecimal::from(160));

        let income = row(&rows, "160001");
        assert_eq!(income.closing_balance, BigDecimal::from(-80));
    }

    #[test]
    fn test_group_and_main_roll_up() {
        let transactions = vec![
            voucher("JO-0001", 1, "10001", "160001", 50),
            voucher("JO-0002", 2, "10002", "160001", 25),
        ];
        let rows = compute_balances(&chart(), &transactions, date(1), date(31));

        assert_eq!(row(&rows, "10000").closing_balance, BigDecimal::from(175));
        assert_eq!(row(&rows, "1").closing_balance, BigDecimal::from(175));
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].account_id, "1");
    }

    #[test]
    fn test_empty_range_keeps_opening() {
        let transactions = vec![voucher("JO-0001", 10, "10001", "160001", 50)];
        let rows = compute_balances(&chart(), &transactions, date(20), date(5));

        let cash = row(&rows, "10001");
        assert_eq!(cash.opening_balance, cash.closing_balance);
    }

    #[test]
    fn test_statement_running_balance() {
        let transactions = vec![
            voucher("JO-0002", 3, "10001", "160001", 30),
            voucher("JO-0001", 3, "160001", "10001", 10),
            voucher("JO-0003", 1, "10001", "160001", 5),
        ];
        let statement = account_statement(&chart()[2], &transactions, date(2), date(31));

        assert_eq!(statement.opening_balance, BigDecimal::from(105));
        let voucher_nos: Vec<&str> =
            statement.lines.iter().map(|l| l.voucher_no.as_str()).collect();
        assert_eq!(voucher_nos, vec!["JO-0002", "JO-0001"]);
        assert_eq!(statement.lines[0].running_balance, BigDecimal::from(135));
        assert_eq!(statement.closing_balance, BigDecimal::from(125));
    }

    #[test]
    fn test_trial_balance() {
        let transactions = vec![voucher("JO-0001", 1, "10001", "160001", 50)];
        let mut accounts = chart();
        accounts[2].opening_balance = BigDecimal::from(0);
        let rows = compute_balances(&accounts, &transactions, date(1), date(31));

        let trial = trial_balance(&rows, &BigDecimal::new(1.into(), 2));
        assert!(trial.is_balanced);
        assert_eq!(trial.total_debits, BigDecimal::from(50));
        assert_eq!(trial.total_credits, BigDecimal::from(50));
        assert_eq!(trial.rows.len(), 2);
    }
}
