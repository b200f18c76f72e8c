//! # Accounting Engine
//!
//! A double-entry accounting and perpetual inventory engine for small
//! trading businesses.
//!
//! ## Features
//!
//! - **Double-entry bookkeeping**: every voucher balances before it is committed
//! - **Chart of accounts**: MAIN / GROUP / GL hierarchy with inventory and COGS flags
//! - **Weighted-average costing**: cost of sales posted automatically on every sale
//! - **Reconciliation**: stock sufficiency before posting, GL/sub-ledger sync diagnostics
//! - **Reporting**: period balances, statements, trial balance, cash flow and display-signed
//!   summaries
//! - **Storage abstraction**: snapshots in, atomic postings out, optimistic revisions
//!
//! ## Quick Start
//!
//! ```rust
//! use accounting_engine::{
//!     InventorySubLedger, Ledger, MemoryStorage, PurchaseVoucher, VoucherItem,
//! };
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! # #[tokio::main]
//! # async fn main() -> accounting_engine::LedgerResult<()> {
//! let mut ledger = Ledger::new(MemoryStorage::new());
//! ledger.setup_standard_chart_of_accounts().await?;
//! ledger
//!     .create_sub_ledger(InventorySubLedger::new(
//!         "widget".to_string(),
//!         "Widget".to_string(),
//!         "W-1".to_string(),
//!         "30001".to_string(),
//!         BigDecimal::from(0),
//!         BigDecimal::from(0),
//!     ))
//!     .await?;
//!
//! let purchase = PurchaseVoucher::new(
//!     "PU-0001".to_string(),
//!     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     "Opening stock".to_string(),
//!     "70001".to_string(),
//!     vec![VoucherItem::new(
//!         "widget".to_string(),
//!         "30001".to_string(),
//!         BigDecimal::from(10),
//!         BigDecimal::from(100),
//!     )],
//! )?;
//! ledger.post_voucher(purchase.into()).await?;
//!
//! assert_eq!(ledger.get_account_balance("30001").await?, BigDecimal::from(1000));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod inventory;
pub mod ledger;
pub mod reconciliation;
pub mod reporting;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::{ChartConventions, EngineConfig};
pub use inventory::{
    JournalVoucher, PurchaseVoucher, SalesVoucher, SubLedgerBalance, VoucherGenerator,
    VoucherItem, VoucherOutput, VoucherRequest,
};
pub use ledger::{
    AccountManager, AccountWithTotals, CodeSuffixCogsMapping, DoubleEntryValidator, Ledger,
    LedgerIntegrityReport, TableCogsMapping, TransactionBuilder, TransactionManager,
};
pub use reconciliation::SyncReport;
pub use reporting::{
    display_balance, net_profit_for_display, CashFlowStatement, FinancialSummary,
};
pub use traits::*;
pub use types::*;
pub use utils::MemoryStorage;

// Re-export voucher patterns for convenience
pub use ledger::transaction::patterns;
