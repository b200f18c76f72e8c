//! A day of trading: capital, stock purchases, a sale and the reports

use accounting_engine::ledger::gl_accounts_in_group;
use accounting_engine::utils::MemoryStorage;
use accounting_engine::{
    display_balance, patterns, ChartConventions, InventorySubLedger, Ledger, PurchaseVoucher,
    SalesVoucher, VoucherItem,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    println!("🧾 Accounting Engine - Trading Day Example\n");

    let mut ledger = Ledger::new(MemoryStorage::new());

    // 1. Chart of accounts and one stock item
    println!("📊 Setting up Chart of Accounts...");
    let accounts = ledger.setup_standard_chart_of_accounts().await?;
    println!("  ✓ Created {} accounts", accounts.len());

    let finished_goods = accounts["finished_goods"].id.clone();
    ledger
        .create_sub_ledger(InventorySubLedger::new(
            "widget".to_string(),
            "Widget".to_string(),
            "W-1".to_string(),
            finished_goods.clone(),
            BigDecimal::from(0),
            BigDecimal::from(0),
        ))
        .await?;
    println!("  ✓ Created sub-ledger: Widget under {}\n", finished_goods);

    let day = |d: u32| NaiveDate::from_ymd_opt(2024, 1, d).ok_or("invalid date");

    // 2. Vouchers
    println!("💰 Posting Vouchers...\n");
    let investment = patterns::create_owner_investment(
        "JO-0001".to_string(),
        day(1)?,
        "Initial owner investment".to_string(),
        accounts["cash"].id.clone(),
        accounts["owners_capital"].id.clone(),
        BigDecimal::from(100000),
    )?;
    ledger.post_voucher(investment.into()).await?;
    println!("  ✓ Owner investment of 100000");

    for (voucher_no, date, rate) in [("PU-0001", day(2)?, 100), ("PU-0002", day(3)?, 120)] {
        let purchase = PurchaseVoucher::new(
            voucher_no.to_string(),
            date,
            "Widget restock".to_string(),
            accounts["trade_payable"].id.clone(),
            vec![VoucherItem::new(
                "widget".to_string(),
                finished_goods.clone(),
                BigDecimal::from(10),
                BigDecimal::from(rate),
            )],
        )?;
        ledger.post_voucher(purchase.into()).await?;
        println!("  ✓ {}: 10 widgets at {}", voucher_no, rate);
    }

    // any receivable GL will do for the customer
    let chart = ledger.list_accounts().await?;
    let conventions = ChartConventions::default();
    let receivable = gl_accounts_in_group(&chart, &conventions.receivable_group_code)
        .first()
        .map(|a| a.id.clone())
        .ok_or("no receivable account in the chart")?;

    let sale = SalesVoucher::new(
        ledger.next_voucher_no(accounting_engine::VoucherType::Sales).await?,
        day(4)?,
        "Widgets to a retail customer".to_string(),
        receivable,
        accounts["sales_revenue"].id.clone(),
        vec![VoucherItem::new(
            "widget".to_string(),
            finished_goods.clone(),
            BigDecimal::from(5),
            BigDecimal::from(1000),
        )],
    )?;
    let output = ledger.post_voucher(sale.into()).await?;
    println!(
        "  ✓ {}: 5 widgets at 1000, cost of sales {}",
        output.transaction.voucher_no,
        output.cost_of_sales()
    );

    // 3. Stock position
    println!("\n📦 Stock Position...");
    for row in ledger.inventory_report(day(1)?, day(31)?).await? {
        println!(
            "  {} ({}): qty {} value {} avg {}",
            row.item_name,
            row.item_code,
            row.balance.quantity,
            row.balance.value,
            row.average_rate.round(2)
        );
    }
    for report in ledger.check_inventory_sync().await? {
        let status = if report.is_synced { "✓" } else { "✗" };
        println!(
            "  {} GL {}: ledger {} / sub-ledgers {}",
            status, report.gl_account_id, report.gl_balance, report.sub_ledger_total
        );
    }

    // 4. Reports
    println!("\n📈 Trial Balance as of {}...", day(31)?);
    let trial_balance = ledger.trial_balance(day(31)?).await?;
    for row in &trial_balance.rows {
        println!("  {:<32} {:>12} {:>12}", row.name, row.debit, row.credit);
    }
    println!(
        "  {:<32} {:>12} {:>12}  balanced: {}",
        "Total",
        trial_balance.total_debits,
        trial_balance.total_credits,
        trial_balance.is_balanced
    );

    let income_statement = ledger.income_statement(day(1)?, day(31)?).await?;
    println!("\n📋 Income Statement...");
    for row in income_statement.income.iter().chain(&income_statement.expenses) {
        println!("  {:<32} {:>12}", row.name, row.amount);
    }
    println!("  {:<32} {:>12}", "Net Profit", income_statement.net_profit);

    let balance_sheet = ledger.balance_sheet(day(31)?).await?;
    println!("\n🏦 Balance Sheet...");
    println!("  Total Assets:        {}", balance_sheet.total_assets);
    println!("  Total Liabilities:   {}", balance_sheet.total_liabilities);
    println!("  Total Equity:        {}", balance_sheet.total_equity);
    println!("  Balanced:            {}", balance_sheet.is_balanced);

    let cash_flow = ledger.cash_flow(day(1)?, day(31)?).await?;
    println!("\n💵 Cash Flow...");
    println!("  {:<32} {:>12}", "Net Profit", cash_flow.net_profit);
    for item in cash_flow
        .operating_activities
        .iter()
        .chain(&cash_flow.investing_activities)
        .chain(&cash_flow.financing_activities)
    {
        println!("  {:<32} {:>12}", item.description, item.amount);
    }
    println!(
        "  {:<32} {:>12}  ({} -> {})",
        "Net Change in Cash",
        cash_flow.net_cash_flow,
        cash_flow.opening_cash,
        cash_flow.closing_cash
    );

    let payables = ledger.get_account_balance(&accounts["trade_payable"].id).await?;
    println!(
        "\n  Trade payables owed: {}",
        display_balance(accounts["trade_payable"].account_type, &payables)
    );

    let integrity_report = ledger.validate_integrity(day(31)?).await?;
    let status = if integrity_report.is_valid { "✓ valid" } else { "✗ issues found" };
    println!("\n🔍 Integrity check: {}", status);
    for issue in &integrity_report.issues {
        println!("  - {}", issue);
    }

    Ok(())
}
