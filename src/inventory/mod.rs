//! Perpetual inventory: weighted-average valuation and stock-carrying vouchers

pub mod valuation;
pub mod voucher;

pub use valuation::{
    audit_trail, can_delete_sub_ledger, current_balance, inventory_report, negative_stock_points,
    refresh_sub_ledger, sub_ledger_balance, weighted_average_cost, AuditTrailLine,
    InventoryReportRow, SubLedgerBalance,
};
pub use voucher::{
    JournalVoucher, PurchaseVoucher, SalesVoucher, VoucherGenerator, VoucherItem, VoucherOutput,
    VoucherRequest,
};
