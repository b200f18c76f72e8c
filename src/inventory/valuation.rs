//! Weighted-average costing and sub-ledger balances
//!
//! Every figure here is replayed from the movement history; the cached
//! `quantity`/`rate` on a sub-ledger is never read.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::max;

use crate::types::*;

/// Quantity and value of one sub-ledger over a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubLedgerBalance {
    /// Closing quantity
    pub quantity: BigDecimal,
    /// Closing value at cost
    pub value: BigDecimal,
    pub opening_quantity: BigDecimal,
    pub opening_value: BigDecimal,
    /// Stock received in the period
    pub debit_quantity: BigDecimal,
    pub debit_amount: BigDecimal,
    /// Stock issued in the period, at cost
    pub credit_quantity: BigDecimal,
    pub credit_amount: BigDecimal,
}

fn own_movements<'a>(
    sub_ledger: &'a InventorySubLedger,
    movements: &'a [InventoryMovement],
) -> impl Iterator<Item = &'a InventoryMovement> {
    movements
        .iter()
        .filter(move |m| m.sub_ledger_id == sub_ledger.id)
}

/// Weighted-average unit cost as of a date.
///
/// Opening stock plus every receipt dated on or before `as_of`; issues do not
/// move the average. Returns zero when there is nothing to average.
pub fn weighted_average_cost(
    sub_ledger: &InventorySubLedger,
    movements: &[InventoryMovement],
    as_of: NaiveDate,
) -> BigDecimal {
    let (quantity, value) = own_movements(sub_ledger, movements)
        .filter(|m| m.movement_type == MovementType::In && m.date <= as_of)
        .fold(
            (sub_ledger.opening_quantity.clone(), sub_ledger.opening_value()),
            |(quantity, value), m| (quantity + &m.quantity, value + &m.amount),
        );

    if quantity == BigDecimal::from(0) {
        return BigDecimal::from(0);
    }

    let rate = value / quantity;
    tracing::trace!(sub_ledger_id = %sub_ledger.id, %as_of, %rate, "weighted average cost");
    rate
}

/// Opening, period and closing stock for `[start, end]`.
///
/// Opening and closing figures are floored at zero.
pub fn sub_ledger_balance(
    sub_ledger: &InventorySubLedger,
    movements: &[InventoryMovement],
    start: NaiveDate,
    end: NaiveDate,
) -> SubLedgerBalance {
    let zero = BigDecimal::from(0);

    let mut opening_quantity = sub_ledger.opening_quantity.clone();
    let mut opening_value = sub_ledger.opening_value();
    let mut debit_quantity = zero.clone();
    let mut debit_amount = zero.clone();
    let mut credit_quantity = zero.clone();
    let mut credit_amount = zero.clone();

    for m in own_movements(sub_ledger, movements) {
        if m.date < start {
            match m.movement_type {
                MovementType::In => {
                    opening_quantity += &m.quantity;
                    opening_value += &m.amount;
                }
                MovementType::Out => {
                    opening_quantity -= &m.quantity;
                    opening_value -= m.cost_value();
                }
            }
        } else if m.date <= end {
            match m.movement_type {
                MovementType::In => {
                    debit_quantity += &m.quantity;
                    debit_amount += &m.amount;
                }
                MovementType::Out => {
                    credit_quantity += &m.quantity;
                    credit_amount += m.cost_value();
                }
            }
        }
    }

    let opening_quantity = max(opening_quantity, zero.clone());
    let opening_value = max(opening_value, zero.clone());
    let quantity = max(&opening_quantity + &debit_quantity - &credit_quantity, zero.clone());
    let value = max(&opening_value + &debit_amount - &credit_amount, zero);

    SubLedgerBalance {
        quantity,
        value,
        opening_quantity,
        opening_value,
        debit_quantity,
        debit_amount,
        credit_quantity,
        credit_amount,
    }
}

/// Balance over the whole movement history
pub fn current_balance(
    sub_ledger: &InventorySubLedger,
    movements: &[InventoryMovement],
) -> SubLedgerBalance {
    sub_ledger_balance(sub_ledger, movements, NaiveDate::MIN, NaiveDate::MAX)
}

/// Copy of the sub-ledger with `quantity` and `rate` recomputed from history
pub fn refresh_sub_ledger(
    sub_ledger: &InventorySubLedger,
    movements: &[InventoryMovement],
) -> InventorySubLedger {
    let balance = current_balance(sub_ledger, movements);
    let mut refreshed = sub_ledger.clone();
    refreshed.rate = if balance.quantity > BigDecimal::from(0) {
        &balance.value / &balance.quantity
    } else {
        BigDecimal::from(0)
    };
    refreshed.quantity = balance.quantity;
    refreshed.updated_at = chrono::Utc::now().naive_utc();
    refreshed
}

/// Stock report row for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryReportRow {
    pub sub_ledger_id: String,
    pub item_name: String,
    pub item_code: String,
    pub inventory_gl_account_id: String,
    pub balance: SubLedgerBalance,
    /// Closing value over closing quantity
    pub average_rate: BigDecimal,
}

/// Stock report for `[start, end]`, one row per sub-ledger
pub fn inventory_report(
    sub_ledgers: &[InventorySubLedger],
    movements: &[InventoryMovement],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<InventoryReportRow> {
    sub_ledgers
        .iter()
        .map(|sub_ledger| {
            let balance = sub_ledger_balance(sub_ledger, movements, start, end);
            let average_rate = if balance.quantity > BigDecimal::from(0) {
                &balance.value / &balance.quantity
            } else {
                BigDecimal::from(0)
            };
            InventoryReportRow {
                sub_ledger_id: sub_ledger.id.clone(),
                item_name: sub_ledger.item_name.clone(),
                item_code: sub_ledger.item_code.clone(),
                inventory_gl_account_id: sub_ledger.inventory_gl_account_id.clone(),
                balance,
                average_rate,
            }
        })
        .collect()
}

/// One line of a sub-ledger's movement history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrailLine {
    pub date: NaiveDate,
    pub voucher_no: Option<String>,
    pub voucher_type: Option<VoucherType>,
    pub movement_type: MovementType,
    pub quantity: BigDecimal,
    pub rate: BigDecimal,
    pub amount: BigDecimal,
}

/// Date-ordered movement history of a sub-ledger, joined with its vouchers
pub fn audit_trail(
    sub_ledger_id: &str,
    movements: &[InventoryMovement],
    transactions: &[Transaction],
) -> Vec<AuditTrailLine> {
    let mut lines: Vec<AuditTrailLine> = movements
        .iter()
        .filter(|m| m.sub_ledger_id == sub_ledger_id)
        .map(|m| {
            let voucher = transactions.iter().find(|t| t.id == m.voucher_id);
            AuditTrailLine {
                date: m.date,
                voucher_no: voucher.map(|t| t.voucher_no.clone()),
                voucher_type: voucher.map(|t| t.voucher_type),
                movement_type: m.movement_type,
                quantity: m.quantity.clone(),
                rate: m.rate.clone(),
                amount: m.amount.clone(),
            }
        })
        .collect();
    // stable: same-date movements keep insertion order
    lines.sort_by_key(|l| l.date);
    lines
}

/// Dates at which the replayed running quantity dropped below zero
pub fn negative_stock_points(
    sub_ledger: &InventorySubLedger,
    movements: &[InventoryMovement],
) -> Vec<(NaiveDate, BigDecimal)> {
    let mut ordered: Vec<&InventoryMovement> = own_movements(sub_ledger, movements).collect();
    ordered.sort_by_key(|m| m.date);

    let mut running = sub_ledger.opening_quantity.clone();
    let mut points = Vec::new();
    for m in ordered {
        match m.movement_type {
            MovementType::In => running += &m.quantity,
            MovementType::Out => running -= &m.quantity,
        }
        if running < BigDecimal::from(0) {
            points.push((m.date, running.clone()));
        }
    }
    points
}

/// A sub-ledger can only be deleted before it has any history
pub fn can_delete_sub_ledger(sub_ledger_id: &str, movements: &[InventoryMovement]) -> bool {
    !movements.iter().any(|m| m.sub_ledger_id == sub_ledger_id)
}
