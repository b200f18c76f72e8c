//! Integration tests for accounting-engine

use accounting_engine::{
    patterns,
    utils::{EnhancedAccountValidator, EnhancedTransactionValidator, MemoryStorage},
    Account, AccountLevel, AccountType, CodeSuffixCogsMapping, EngineConfig, Entry, EntryType,
    InventorySubLedger, JournalVoucher, Ledger, LedgerError, LedgerStorage, MovementType,
    PurchaseVoucher, SalesVoucher, TableCogsMapping, VoucherGenerator, VoucherItem,
    VoucherOutput, VoucherType,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

async fn trading_ledger(storage: MemoryStorage) -> Ledger<MemoryStorage> {
    init_tracing();
    let mut ledger = Ledger::new(storage);
    ledger.setup_standard_chart_of_accounts().await.unwrap();
    ledger
        .create_sub_ledger(InventorySubLedger::new(
            "widget".to_string(),
            "Widget".to_string(),
            "W-1".to_string(),
            "30001".to_string(),
            BigDecimal::from(0),
            BigDecimal::from(0),
        ))
        .await
        .unwrap();
    ledger
}

fn purchase(voucher_no: &str, day: u32, quantity: i64, rate: i64) -> PurchaseVoucher {
    PurchaseVoucher::new(
        voucher_no.to_string(),
        date(day),
        "Stock purchase".to_string(),
        "70001".to_string(),
        vec![VoucherItem::new(
            "widget".to_string(),
            "30001".to_string(),
            BigDecimal::from(quantity),
            BigDecimal::from(rate),
        )],
    )
    .unwrap()
}

fn sale(voucher_no: &str, day: u32, quantities: &[i64], price: i64) -> SalesVoucher {
    SalesVoucher::new(
        voucher_no.to_string(),
        date(day),
        "Widget sale".to_string(),
        "20001".to_string(),
        "160001".to_string(),
        quantities
            .iter()
            .map(|q| {
                VoucherItem::new(
                    "widget".to_string(),
                    "30001".to_string(),
                    BigDecimal::from(*q),
                    BigDecimal::from(price),
                )
            })
            .collect(),
    )
    .unwrap()
}

fn amount_for(output: &VoucherOutput, account_id: &str, entry_type: EntryType) -> BigDecimal {
    output
        .transaction
        .entries
        .iter()
        .filter(|e| e.account_id == account_id && e.entry_type == entry_type)
        .map(|e| e.amount.clone())
        .sum()
}

#[tokio::test]
async fn test_complete_trading_workflow() {
    let mut ledger = trading_ledger(MemoryStorage::new()).await;

    // Record initial investment
    let investment = patterns::create_owner_investment(
        "JO-0001".to_string(),
        date(1),
        "Initial investment".to_string(),
        "10001".to_string(),
        "120001".to_string(),
        BigDecimal::from(100000),
    )
    .unwrap();
    ledger.post_voucher(investment.into()).await.unwrap();

    ledger
        .post_voucher(purchase("PU-0001", 2, 10, 100).into())
        .await
        .unwrap();
    ledger
        .post_voucher(purchase("PU-0002", 3, 10, 120).into())
        .await
        .unwrap();
    assert_eq!(
        ledger.weighted_average_cost("widget", date(4)).await.unwrap(),
        BigDecimal::from(110)
    );

    let output = ledger
        .post_voucher(sale("SA-0001", 4, &[5], 1000).into())
        .await
        .unwrap();

    // Dr Receivable 5000, Cr Revenue 5000, Dr COGS 550, Cr Inventory 550
    assert_eq!(amount_for(&output, "20001", EntryType::Debit), BigDecimal::from(5000));
    assert_eq!(amount_for(&output, "160001", EntryType::Credit), BigDecimal::from(5000));
    assert_eq!(amount_for(&output, "180001", EntryType::Debit), BigDecimal::from(550));
    assert_eq!(amount_for(&output, "30001", EntryType::Credit), BigDecimal::from(550));
    assert_eq!(output.transaction.total_debits(), BigDecimal::from(5550));
    assert_eq!(output.transaction.total_credits(), BigDecimal::from(5550));

    let widget = ledger.sub_ledger_balance("widget", None, None).await.unwrap();
    assert_eq!(widget.quantity, BigDecimal::from(15));
    assert_eq!(widget.value, BigDecimal::from(1650));
    assert_eq!(
        ledger.get_account_balance("30001").await.unwrap(),
        BigDecimal::from(1650)
    );

    let sync = ledger.check_inventory_sync().await.unwrap();
    assert_eq!(sync.len(), 2);
    assert!(sync.iter().all(|r| r.is_synced));

    let summary = ledger.financial_summary(None).await.unwrap();
    assert_eq!(summary.cash_balance, BigDecimal::from(100000));
    assert_eq!(summary.receivables, BigDecimal::from(5000));
    assert_eq!(summary.payables, BigDecimal::from(2200));
    assert_eq!(summary.net_income, BigDecimal::from(4450));
    assert_eq!(summary.total_assets, BigDecimal::from(106650));
    assert_eq!(summary.total_equity, BigDecimal::from(104450));

    let statement = ledger.income_statement(date(1), date(31)).await.unwrap();
    assert_eq!(statement.total_income, BigDecimal::from(5000));
    assert_eq!(statement.net_profit, BigDecimal::from(4450));

    // receivables -5000, inventory -1650, payables +2200 offset the profit
    let cash_flow = ledger.cash_flow(date(1), date(31)).await.unwrap();
    assert_eq!(cash_flow.operating_activities.len(), 3);
    assert_eq!(cash_flow.net_operating_cash_flow, BigDecimal::from(0));
    assert_eq!(cash_flow.net_financing_cash_flow, BigDecimal::from(100000));
    assert_eq!(cash_flow.opening_cash, BigDecimal::from(0));
    assert_eq!(cash_flow.closing_cash, BigDecimal::from(100000));
    assert_eq!(
        cash_flow.net_cash_flow,
        &cash_flow.closing_cash - &cash_flow.opening_cash
    );

    let trial_balance = ledger.trial_balance(date(31)).await.unwrap();
    assert!(trial_balance.is_balanced);

    let balance_sheet = ledger.balance_sheet(date(31)).await.unwrap();
    assert!(balance_sheet.is_balanced);
    assert_eq!(balance_sheet.total_assets, BigDecimal::from(106650));

    let integrity_report = ledger.validate_integrity(date(31)).await.unwrap();
    assert!(integrity_report.is_valid, "{:?}", integrity_report.issues);
}

#[tokio::test]
async fn test_balances_over_a_period() {
    let mut ledger = trading_ledger(MemoryStorage::new()).await;
    ledger
        .post_voucher(purchase("PU-0001", 2, 10, 100).into())
        .await
        .unwrap();
    ledger
        .post_voucher(purchase("PU-0002", 20, 5, 100).into())
        .await
        .unwrap();

    let rows = ledger
        .compute_balances(Some(date(10)), Some(date(31)))
        .await
        .unwrap();
    let inventory = rows.iter().find(|r| r.account_id == "30001").unwrap();
    assert_eq!(inventory.opening_balance, BigDecimal::from(1000));
    assert_eq!(inventory.debit, BigDecimal::from(500));
    assert_eq!(inventory.closing_balance, BigDecimal::from(1500));

    let group = rows.iter().find(|r| r.account_id == "30000").unwrap();
    assert_eq!(group.closing_balance, BigDecimal::from(1500));

    let statement = ledger
        .account_statement("70001", date(1), date(31))
        .await
        .unwrap();
    assert_eq!(statement.lines.len(), 2);
    assert_eq!(statement.closing_balance, BigDecimal::from(-1500));
}

#[tokio::test]
async fn test_oversized_sale_leaves_no_trace() {
    let mut ledger = trading_ledger(MemoryStorage::new()).await;
    ledger
        .post_voucher(purchase("PU-0001", 1, 10, 100).into())
        .await
        .unwrap();

    match ledger.post_voucher(sale("SA-0001", 2, &[11], 500).into()).await {
        Err(LedgerError::InsufficientInventory {
            sub_ledger_id,
            requested,
            available,
        }) => {
            assert_eq!(sub_ledger_id, "widget");
            assert_eq!(requested, BigDecimal::from(11));
            assert_eq!(available, BigDecimal::from(10));
        }
        other => panic!("expected insufficient inventory, got {:?}", other),
    }

    // two lines that fit alone but not together
    assert!(matches!(
        ledger.post_voucher(sale("SA-0001", 2, &[6, 6], 500).into()).await,
        Err(LedgerError::InsufficientInventory { .. })
    ));

    assert!(!ledger
        .check_sufficiency("widget", &BigDecimal::from(11))
        .await
        .unwrap());
    assert_eq!(ledger.get_transactions(None, None).await.unwrap().len(), 1);
    assert_eq!(ledger.audit_trail("widget").await.unwrap().len(), 1);
    assert_eq!(
        ledger.get_account_balance("20001").await.unwrap(),
        BigDecimal::from(0)
    );
}

#[tokio::test]
async fn test_missing_cogs_mapping_is_rejected() {
    let storage = MemoryStorage::new();
    let mut ledger = trading_ledger(storage)
        .await
        .with_cogs_mapping(Box::new(TableCogsMapping::new()));

    ledger
        .post_voucher(purchase("PU-0001", 1, 10, 100).into())
        .await
        .unwrap();

    match ledger.post_voucher(sale("SA-0001", 2, &[1], 500).into()).await {
        Err(LedgerError::MissingCogsMapping {
            inventory_gl_account_id,
        }) => assert_eq!(inventory_gl_account_id, "30001"),
        other => panic!("expected missing COGS mapping, got {:?}", other),
    }
    assert_eq!(ledger.get_transactions(None, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_back_dated_sale_uses_cost_known_at_its_date() {
    let mut ledger = trading_ledger(MemoryStorage::new()).await;
    ledger
        .post_voucher(purchase("PU-0001", 1, 10, 100).into())
        .await
        .unwrap();
    ledger
        .post_voucher(purchase("PU-0002", 10, 10, 200).into())
        .await
        .unwrap();

    let output = ledger
        .post_voucher(sale("SA-0001", 5, &[5], 300).into())
        .await
        .unwrap();
    assert_eq!(output.cost_of_sales(), BigDecimal::from(500));

    let trail = ledger.audit_trail("widget").await.unwrap();
    let voucher_nos: Vec<&str> = trail
        .iter()
        .map(|l| l.voucher_no.as_deref().unwrap())
        .collect();
    assert_eq!(voucher_nos, vec!["PU-0001", "SA-0001", "PU-0002"]);
}

#[tokio::test]
async fn test_sale_after_cheaper_restock_stays_within_stock_value() {
    let mut ledger = trading_ledger(MemoryStorage::new()).await;
    ledger
        .post_voucher(purchase("PU-0001", 1, 10, 200).into())
        .await
        .unwrap();
    ledger
        .post_voucher(sale("SA-0001", 2, &[9], 300).into())
        .await
        .unwrap();
    ledger
        .post_voucher(purchase("PU-0002", 3, 10, 100).into())
        .await
        .unwrap();

    // the running average of 150 would cost 1500 against 1200 on hand
    let output = ledger
        .post_voucher(sale("SA-0002", 4, &[10], 300).into())
        .await
        .unwrap();
    assert_eq!(output.cost_of_sales(), BigDecimal::from(1200));
    assert_eq!(amount_for(&output, "180001", EntryType::Debit), BigDecimal::from(1200));

    assert_eq!(
        ledger.get_account_balance("30001").await.unwrap(),
        BigDecimal::from(0)
    );
    let widget = ledger.sub_ledger_balance("widget", None, None).await.unwrap();
    assert_eq!(widget.quantity, BigDecimal::from(1));
    assert_eq!(widget.value, BigDecimal::from(0));

    let sync = ledger.check_inventory_sync().await.unwrap();
    assert!(sync.iter().all(|r| r.is_synced), "{:?}", sync);
    let integrity_report = ledger.validate_integrity(date(31)).await.unwrap();
    assert!(integrity_report.is_valid, "{:?}", integrity_report.issues);
}

#[tokio::test]
async fn test_reversal_restores_stock_and_balances() {
    let mut ledger = trading_ledger(MemoryStorage::new()).await;
    ledger
        .post_voucher(purchase("PU-0001", 1, 10, 100).into())
        .await
        .unwrap();
    let original = ledger
        .post_voucher(sale("SA-0001", 2, &[4], 250).into())
        .await
        .unwrap();

    let reversal = ledger
        .reverse_voucher(&original.transaction.id, date(3))
        .await
        .unwrap();
    assert_eq!(reversal.transaction.voucher_no, "SA-0002");
    assert_eq!(reversal.transaction.voucher_type, VoucherType::Sales);
    assert_eq!(reversal.movements[0].movement_type, MovementType::In);

    assert_eq!(
        ledger.get_account_balance("20001").await.unwrap(),
        BigDecimal::from(0)
    );
    assert_eq!(
        ledger.get_account_balance("30001").await.unwrap(),
        BigDecimal::from(1000)
    );
    let widget = ledger.get_sub_ledger("widget").await.unwrap().unwrap();
    assert_eq!(widget.quantity, BigDecimal::from(10));

    // the original stays untouched and cannot be reversed twice
    let stored = ledger
        .get_transaction(&original.transaction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, original.transaction);
    assert!(matches!(
        ledger.reverse_voucher(&original.transaction.id, date(4)).await,
        Err(LedgerError::InvalidTransaction(_))
    ));
    assert!(matches!(
        ledger.reverse_voucher(&reversal.transaction.id, date(4)).await,
        Err(LedgerError::InvalidTransaction(_))
    ));
    assert!(matches!(
        ledger.reverse_voucher("missing", date(4)).await,
        Err(LedgerError::TransactionNotFound(_))
    ));

    let integrity_report = ledger.validate_integrity(date(31)).await.unwrap();
    assert!(integrity_report.is_valid, "{:?}", integrity_report.issues);
}

#[tokio::test]
async fn test_reversal_numbering_skips_past_gaps() {
    let mut ledger = trading_ledger(MemoryStorage::new()).await;
    let first = ledger
        .post_voucher(purchase("PU-0001", 1, 10, 100).into())
        .await
        .unwrap();
    ledger
        .post_voucher(purchase("PU-0003", 2, 5, 100).into())
        .await
        .unwrap();

    let reversal = ledger
        .reverse_voucher(&first.transaction.id, date(3))
        .await
        .unwrap();
    assert_eq!(reversal.transaction.voucher_no, "PU-0004");
    assert_eq!(
        ledger.next_voucher_no(VoucherType::Purchase).await.unwrap(),
        "PU-0005"
    );
    assert_eq!(
        ledger.get_account_balance("30001").await.unwrap(),
        BigDecimal::from(500)
    );
}

#[tokio::test]
async fn test_purchase_reversal_needs_stock_on_hand() {
    let mut ledger = trading_ledger(MemoryStorage::new()).await;
    let receipt = ledger
        .post_voucher(purchase("PU-0001", 1, 10, 100).into())
        .await
        .unwrap();
    ledger
        .post_voucher(sale("SA-0001", 2, &[8], 250).into())
        .await
        .unwrap();

    assert!(matches!(
        ledger.reverse_voucher(&receipt.transaction.id, date(3)).await,
        Err(LedgerError::InsufficientInventory { .. })
    ));
}

#[tokio::test]
async fn test_stale_posting_is_rejected() {
    let storage = MemoryStorage::new();
    let mut ledger = trading_ledger(storage.clone()).await;
    ledger
        .post_voucher(purchase("PU-0001", 1, 10, 100).into())
        .await
        .unwrap();

    let config = EngineConfig::default();
    let mapping = CodeSuffixCogsMapping::default();
    let stale = storage.snapshot().await.unwrap();
    let stale_sale = VoucherGenerator::new(&config, &mapping)
        .generate(&sale("SA-0002", 3, &[8], 250).into(), &stale)
        .unwrap();

    // another caller sells from the same sub-ledger first
    ledger
        .post_voucher(sale("SA-0001", 2, &[8], 250).into())
        .await
        .unwrap();

    let mut writer = storage.clone();
    assert!(matches!(
        writer
            .commit_posting(&stale_sale, &stale.revisions_for(&stale_sale))
            .await,
        Err(LedgerError::ConcurrentModification(_))
    ));
    let widget = ledger.get_sub_ledger("widget").await.unwrap().unwrap();
    assert_eq!(widget.quantity, BigDecimal::from(2));
}

#[tokio::test]
async fn test_transaction_validation() {
    let mut ledger = Ledger::with_validators(
        MemoryStorage::new(),
        EngineConfig::default(),
        Box::new(EnhancedAccountValidator),
        Box::new(EnhancedTransactionValidator::default()),
    );
    ledger.setup_standard_chart_of_accounts().await.unwrap();

    let journal = |voucher_no: &str, description: &str, debit: &str, credit: &str| {
        JournalVoucher::new(
            VoucherType::Journal,
            voucher_no.to_string(),
            date(1),
            description.to_string(),
            vec![
                Entry::debit(debit.to_string(), BigDecimal::from(100), None),
                Entry::credit(credit.to_string(), BigDecimal::from(100), None),
            ],
        )
        .unwrap()
    };

    // Test empty description
    assert!(matches!(
        ledger
            .post_voucher(journal("JO-0001", "", "10001", "120001").into())
            .await,
        Err(LedgerError::Validation(_))
    ));

    // Test locked and non-GL accounts
    assert!(matches!(
        ledger
            .post_voucher(journal("JO-0001", "Close", "10001", "130001").into())
            .await,
        Err(LedgerError::InvalidAccountReference { .. })
    ));
    assert!(matches!(
        ledger
            .post_voucher(journal("JO-0001", "Group", "10000", "120001").into())
            .await,
        Err(LedgerError::InvalidAccountReference { .. })
    ));

    // Test unbalanced voucher
    assert!(matches!(
        JournalVoucher::new(
            VoucherType::Journal,
            "JO-0001".to_string(),
            date(1),
            "Unbalanced".to_string(),
            vec![
                Entry::debit("10001".to_string(), BigDecimal::from(100), None),
                Entry::credit("120001".to_string(), BigDecimal::from(90), None),
            ],
        ),
        Err(LedgerError::UnbalancedTransaction { .. })
    ));

    // Test duplicate voucher number
    ledger
        .post_voucher(journal("JO-0001", "Capital", "10001", "120001").into())
        .await
        .unwrap();
    assert!(matches!(
        ledger
            .post_voucher(journal("JO-0001", "Capital again", "10001", "120001").into())
            .await,
        Err(LedgerError::InvalidTransaction(_))
    ));
    assert_eq!(
        ledger.next_voucher_no(VoucherType::Journal).await.unwrap(),
        "JO-0002"
    );

    // Test account rules
    let bad_code = Account::new(
        "petty".to_string(),
        "PC-1".to_string(),
        "Petty Cash".to_string(),
        AccountType::Asset,
        AccountLevel::Gl,
        Some("10000".to_string()),
    );
    assert!(matches!(
        ledger.create_account(bad_code).await,
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        ledger.delete_account("10001").await,
        Err(LedgerError::Validation(_))
    ));
    assert!(ledger.delete_account("10002").await.is_ok());
}

#[tokio::test]
async fn test_sub_ledger_lifecycle() {
    let mut ledger = trading_ledger(MemoryStorage::new()).await;
    ledger
        .create_sub_ledger(InventorySubLedger::new(
            "bolt".to_string(),
            "Bolt".to_string(),
            "B-1".to_string(),
            "30002".to_string(),
            BigDecimal::from(100),
            BigDecimal::from(2),
        ))
        .await
        .unwrap();

    // item codes are unique
    assert!(ledger
        .create_sub_ledger(InventorySubLedger::new(
            "bolt-2".to_string(),
            "Bolt".to_string(),
            "B-1".to_string(),
            "30002".to_string(),
            BigDecimal::from(0),
            BigDecimal::from(0),
        ))
        .await
        .is_err());

    assert_eq!(ledger.list_sub_ledgers(Some("30002")).await.unwrap().len(), 1);
    assert_eq!(ledger.list_sub_ledgers(None).await.unwrap().len(), 2);

    let report = ledger.inventory_report(date(1), date(31)).await.unwrap();
    let bolt = report.iter().find(|r| r.sub_ledger_id == "bolt").unwrap();
    assert_eq!(bolt.balance.value, BigDecimal::from(200));
    assert_eq!(bolt.average_rate, BigDecimal::from(2));

    ledger
        .post_voucher(purchase("PU-0001", 1, 1, 100).into())
        .await
        .unwrap();
    assert!(matches!(
        ledger.delete_sub_ledger("widget").await,
        Err(LedgerError::Validation(_))
    ));
    assert!(ledger.delete_sub_ledger("bolt").await.is_ok());
}

#[tokio::test]
async fn test_config_from_environment() {
    std::env::set_var("LEDGER_CONVENTIONS__COGS_CODE_PREFIX", "5100");
    let config = EngineConfig::from_env().unwrap();
    std::env::remove_var("LEDGER_CONVENTIONS__COGS_CODE_PREFIX");

    assert_eq!(config.conventions.cogs_code_prefix, "5100");
    assert_eq!(config.conventions.cogs_suffix_len, 2);
    assert_eq!(config.money_scale, 2);
}
