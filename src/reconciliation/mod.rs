//! Stock sufficiency and GL/sub-ledger reconciliation
//!
//! Sufficiency checks gate postings. GL sync checks are diagnostics: they
//! report drift and never block.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::inventory::valuation::{current_balance, sub_ledger_balance};
use crate::inventory::VoucherItem;
use crate::ledger::account::inventory_gl_accounts;
use crate::types::*;

/// Whether `requested` units can leave the sub-ledger given its full history
pub fn check_sufficiency(
    sub_ledger: &InventorySubLedger,
    requested: &BigDecimal,
    movements: &[InventoryMovement],
) -> bool {
    requested <= &current_balance(sub_ledger, movements).quantity
}

/// Aggregate requested quantity per sub-ledger and fail on the first shortfall.
///
/// Two lines drawing on the same item are checked against the combined
/// quantity, so the whole voucher is rejected rather than a single line.
pub fn check_sales_sufficiency(
    items: &[VoucherItem],
    sub_ledgers: &[InventorySubLedger],
    movements: &[InventoryMovement],
) -> LedgerResult<()> {
    let mut requested: Vec<(&str, BigDecimal)> = Vec::new();
    for item in items {
        match requested.iter_mut().find(|(id, _)| *id == item.sub_ledger_id) {
            Some((_, quantity)) => *quantity += &item.quantity,
            None => requested.push((item.sub_ledger_id.as_str(), item.quantity.clone())),
        }
    }

    check_requested(&requested, sub_ledgers, movements)
}

/// Same as [`check_sales_sufficiency`] for the outward movements of a posting
pub fn check_outward_sufficiency(
    outward: &[InventoryMovement],
    sub_ledgers: &[InventorySubLedger],
    movements: &[InventoryMovement],
) -> LedgerResult<()> {
    let mut requested: Vec<(&str, BigDecimal)> = Vec::new();
    for m in outward.iter().filter(|m| m.movement_type == MovementType::Out) {
        match requested.iter_mut().find(|(id, _)| *id == m.sub_ledger_id) {
            Some((_, quantity)) => *quantity += &m.quantity,
            None => requested.push((m.sub_ledger_id.as_str(), m.quantity.clone())),
        }
    }

    check_requested(&requested, sub_ledgers, movements)
}

fn check_requested(
    requested: &[(&str, BigDecimal)],
    sub_ledgers: &[InventorySubLedger],
    movements: &[InventoryMovement],
) -> LedgerResult<()> {
    for (sub_ledger_id, quantity) in requested {
        let sub_ledger = sub_ledgers
            .iter()
            .find(|s| s.id == *sub_ledger_id)
            .ok_or_else(|| LedgerError::SubLedgerNotFound(sub_ledger_id.to_string()))?;

        if !check_sufficiency(sub_ledger, quantity, movements) {
            let available = current_balance(sub_ledger, movements).quantity;
            return Err(LedgerError::InsufficientInventory {
                sub_ledger_id: sub_ledger_id.to_string(),
                requested: quantity.clone(),
                available,
            });
        }
    }

    Ok(())
}

/// Agreement between an inventory GL and the sub-ledgers under it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub gl_account_id: String,
    pub is_synced: bool,
    pub gl_balance: BigDecimal,
    pub sub_ledger_total: BigDecimal,
    /// GL balance minus sub-ledger total
    pub variance: BigDecimal,
}

impl SyncReport {
    /// Escalate drift to an error
    pub fn into_result(self) -> LedgerResult<Self> {
        if self.is_synced {
            Ok(self)
        } else {
            Err(LedgerError::SyncVarianceDetected {
                gl_account_id: self.gl_account_id,
                variance: self.variance,
            })
        }
    }
}

/// Compare one GL balance with the closing value of its sub-ledgers.
///
/// Synced while the variance stays strictly below `tolerance`.
pub fn check_gl_sync(
    gl_account_id: &str,
    gl_balance: &BigDecimal,
    sub_ledgers: &[InventorySubLedger],
    movements: &[InventoryMovement],
    tolerance: &BigDecimal,
) -> SyncReport {
    let sub_ledger_total: BigDecimal = sub_ledgers
        .iter()
        .filter(|s| s.inventory_gl_account_id == gl_account_id)
        .map(|s| current_balance(s, movements).value)
        .sum();

    sync_report(gl_account_id, gl_balance, sub_ledger_total, tolerance)
}

fn sync_report(
    gl_account_id: &str,
    gl_balance: &BigDecimal,
    sub_ledger_total: BigDecimal,
    tolerance: &BigDecimal,
) -> SyncReport {
    let variance = gl_balance - &sub_ledger_total;
    let is_synced = variance.abs() < *tolerance;

    SyncReport {
        gl_account_id: gl_account_id.to_string(),
        is_synced,
        gl_balance: gl_balance.clone(),
        sub_ledger_total,
        variance,
    }
}

/// Sync report for every inventory GL in the chart, using running balances
pub fn check_all_gl_sync(
    chart: &[Account],
    sub_ledgers: &[InventorySubLedger],
    movements: &[InventoryMovement],
    tolerance: &BigDecimal,
) -> Vec<SyncReport> {
    let totals = sub_ledger_totals_by_gl(sub_ledgers, movements, NaiveDate::MIN, NaiveDate::MAX);

    inventory_gl_accounts(chart)
        .into_iter()
        .map(|gl| {
            let total = totals
                .get(&gl.id)
                .cloned()
                .unwrap_or_else(|| BigDecimal::from(0));
            let report = sync_report(&gl.id, &gl.balance, total, tolerance);
            if !report.is_synced {
                tracing::warn!(
                    gl_account_id = %report.gl_account_id,
                    gl_balance = %report.gl_balance,
                    sub_ledger_total = %report.sub_ledger_total,
                    variance = %report.variance,
                    "inventory GL out of sync with sub-ledgers"
                );
            }
            report
        })
        .collect()
}

/// Closing stock value per inventory GL over a period
pub fn sub_ledger_totals_by_gl(
    sub_ledgers: &[InventorySubLedger],
    movements: &[InventoryMovement],
    start: NaiveDate,
    end: NaiveDate,
) -> HashMap<String, BigDecimal> {
    let mut totals: HashMap<String, BigDecimal> = HashMap::new();
    for sub_ledger in sub_ledgers {
        let value = sub_ledger_balance(sub_ledger, movements, start, end).value;
        *totals
            .entry(sub_ledger.inventory_gl_account_id.clone())
            .or_insert_with(|| BigDecimal::from(0)) += value;
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn sub_ledger(id: &str, gl: &str) -> InventorySubLedger {
        InventorySubLedger::new(
            id.to_string(),
            id.to_string(),
            id.to_string(),
            gl.to_string(),
            BigDecimal::from(0),
            BigDecimal::from(0),
        )
    }

    fn stock() -> (Vec<InventorySubLedger>, Vec<InventoryMovement>) {
        let sub_ledgers = vec![sub_ledger("widget", "30001"), sub_ledger("gadget", "30001")];
        let movements = vec![
            InventoryMovement::inward(
                "widget".to_string(),
                "pu-1".to_string(),
                BigDecimal::from(10),
                BigDecimal::from(100),
                date(1),
            ),
            InventoryMovement::inward(
                "gadget".to_string(),
                "pu-1".to_string(),
                BigDecimal::from(2),
                BigDecimal::from(50),
                date(1),
            ),
        ];
        (sub_ledgers, movements)
    }

    fn item(sub_ledger_id: &str, quantity: i64) -> VoucherItem {
        VoucherItem::new(
            sub_ledger_id.to_string(),
            "30001".to_string(),
            BigDecimal::from(quantity),
            BigDecimal::from(1),
        )
    }

    #[test]
    fn test_sufficiency() {
        let (sub_ledgers, movements) = stock();
        assert!(check_sufficiency(&sub_ledgers[0], &BigDecimal::from(10), &movements));
        assert!(!check_sufficiency(&sub_ledgers[0], &BigDecimal::from(11), &movements));
    }

    #[test]
    fn test_sales_sufficiency_aggregates_lines() {
        let (sub_ledgers, movements) = stock();
        assert!(check_sales_sufficiency(&[item("widget", 6)], &sub_ledgers, &movements).is_ok());

        match check_sales_sufficiency(
            &[item("widget", 6), item("widget", 6)],
            &sub_ledgers,
            &movements,
        ) {
            Err(LedgerError::InsufficientInventory {
                sub_ledger_id,
                requested,
                available,
            }) => {
                assert_eq!(sub_ledger_id, "widget");
                assert_eq!(requested, BigDecimal::from(12));
                assert_eq!(available, BigDecimal::from(10));
            }
            other => panic!("expected insufficient inventory, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_sub_ledger() {
        let (sub_ledgers, movements) = stock();
        assert!(matches!(
            check_sales_sufficiency(&[item("ghost", 1)], &sub_ledgers, &movements),
            Err(LedgerError::SubLedgerNotFound(_))
        ));
    }

    fn cent() -> BigDecimal {
        BigDecimal::new(1.into(), 2)
    }

    #[test]
    fn test_gl_sync() {
        let (sub_ledgers, movements) = stock();

        let gl_balance = BigDecimal::from(1100);
        let report = check_gl_sync("30001", &gl_balance, &sub_ledgers, &movements, &cent());
        assert!(report.is_synced);
        assert_eq!(report.sub_ledger_total, BigDecimal::from(1100));
        assert!(report.into_result().is_ok());

        let gl_balance = BigDecimal::from(1200);
        let report = check_gl_sync("30001", &gl_balance, &sub_ledgers, &movements, &cent());
        assert!(!report.is_synced);
        assert_eq!(report.variance, BigDecimal::from(100));
        assert!(matches!(
            report.into_result(),
            Err(LedgerError::SyncVarianceDetected { .. })
        ));
    }

    #[test]
    fn test_gl_sync_threshold_follows_tolerance() {
        let (sub_ledgers, movements) = stock();
        let gl_balance = BigDecimal::from(1101);

        let strict = check_gl_sync("30001", &gl_balance, &sub_ledgers, &movements, &cent());
        assert!(!strict.is_synced);

        let loose = BigDecimal::from(5);
        let report = check_gl_sync("30001", &gl_balance, &sub_ledgers, &movements, &loose);
        assert!(report.is_synced);
        assert_eq!(report.variance, BigDecimal::from(1));

        // a variance equal to the tolerance is already drift
        let one = BigDecimal::from(1);
        let exact = check_gl_sync("30001", &gl_balance, &sub_ledgers, &movements, &one);
        assert!(!exact.is_synced);
    }

    #[test]
    fn test_check_all_gl_sync_uses_running_balance() {
        let (sub_ledgers, movements) = stock();
        let mut gl = Account::new(
            "30001".to_string(),
            "30001".to_string(),
            "Finished Goods".to_string(),
            AccountType::Asset,
            AccountLevel::Gl,
            None,
        )
        .inventory_gl();
        gl.balance = BigDecimal::from(1100);
        let mut empty = Account::new(
            "30002".to_string(),
            "30002".to_string(),
            "Raw Materials".to_string(),
            AccountType::Asset,
            AccountLevel::Gl,
            None,
        )
        .inventory_gl();
        empty.balance = BigDecimal::from(40);

        let reports = check_all_gl_sync(&[gl, empty], &sub_ledgers, &movements, &cent());
        assert_eq!(reports.len(), 2);
        let finished = reports.iter().find(|r| r.gl_account_id == "30001").unwrap();
        assert!(finished.is_synced);
        // no sub-ledger at all counts as a zero total
        let raw = reports.iter().find(|r| r.gl_account_id == "30002").unwrap();
        assert!(!raw.is_synced);
        assert_eq!(raw.sub_ledger_total, BigDecimal::from(0));

        let totals = sub_ledger_totals_by_gl(&sub_ledgers, &movements, date(1), date(31));
        assert_eq!(totals.get("30001"), Some(&BigDecimal::from(1100)));
    }
}
