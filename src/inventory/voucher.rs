//! Voucher requests and their expansion into journal entries and stock movements

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::{max, min};
use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::inventory::valuation::{current_balance, sub_ledger_balance, weighted_average_cost};
use crate::ledger::account::find_account;
use crate::ledger::transaction::{DoubleEntryValidator, TransactionBuilder};
use crate::traits::{CogsMapping, LedgerSnapshot};
use crate::types::*;

/// One inventory line of a sales or purchase request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherItem {
    pub sub_ledger_id: String,
    pub inventory_gl_account_id: String,
    pub quantity: BigDecimal,
    /// Selling price on sales, unit cost on purchases
    pub rate: BigDecimal,
}

impl VoucherItem {
    pub fn new(
        sub_ledger_id: String,
        inventory_gl_account_id: String,
        quantity: BigDecimal,
        rate: BigDecimal,
    ) -> Self {
        Self {
            sub_ledger_id,
            inventory_gl_account_id,
            quantity,
            rate,
        }
    }

    pub fn amount(&self) -> BigDecimal {
        &self.quantity * &self.rate
    }
}

fn validate_header(voucher_no: &str, items: &[VoucherItem]) -> LedgerResult<()> {
    if voucher_no.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Voucher number cannot be empty".to_string(),
        ));
    }

    if items.is_empty() {
        return Err(LedgerError::Validation(
            "Voucher must have at least one item".to_string(),
        ));
    }

    for item in items {
        if item.quantity <= BigDecimal::from(0) {
            return Err(LedgerError::Validation(format!(
                "Quantity for sub-ledger '{}' must be positive",
                item.sub_ledger_id
            )));
        }
    }

    Ok(())
}

/// Sale of stocked items on credit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesVoucher {
    pub voucher_no: String,
    pub date: NaiveDate,
    pub description: String,
    pub company_id: Option<String>,
    pub receivable_account_id: String,
    pub revenue_account_id: String,
    pub items: Vec<VoucherItem>,
}

impl SalesVoucher {
    pub fn new(
        voucher_no: String,
        date: NaiveDate,
        description: String,
        receivable_account_id: String,
        revenue_account_id: String,
        items: Vec<VoucherItem>,
    ) -> LedgerResult<Self> {
        validate_header(&voucher_no, &items)?;

        if let Some(item) = items.iter().find(|i| i.rate <= BigDecimal::from(0)) {
            return Err(LedgerError::Validation(format!(
                "Selling rate for sub-ledger '{}' must be positive",
                item.sub_ledger_id
            )));
        }

        if receivable_account_id == revenue_account_id {
            return Err(LedgerError::Validation(
                "Receivable and revenue accounts must differ".to_string(),
            ));
        }

        Ok(Self {
            voucher_no,
            date,
            description,
            company_id: None,
            receivable_account_id,
            revenue_account_id,
            items,
        })
    }

    pub fn with_company(mut self, company_id: String) -> Self {
        self.company_id = Some(company_id);
        self
    }
}

/// Purchase of stocked items on credit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseVoucher {
    pub voucher_no: String,
    pub date: NaiveDate,
    pub description: String,
    pub company_id: Option<String>,
    pub payable_account_id: String,
    pub items: Vec<VoucherItem>,
}

impl PurchaseVoucher {
    pub fn new(
        voucher_no: String,
        date: NaiveDate,
        description: String,
        payable_account_id: String,
        items: Vec<VoucherItem>,
    ) -> LedgerResult<Self> {
        validate_header(&voucher_no, &items)?;

        if let Some(item) = items.iter().find(|i| i.rate <= BigDecimal::from(0)) {
            return Err(LedgerError::Validation(format!(
                "Purchase rate for sub-ledger '{}' must be positive",
                item.sub_ledger_id
            )));
        }

        Ok(Self {
            voucher_no,
            date,
            description,
            company_id: None,
            payable_account_id,
            items,
        })
    }

    pub fn with_company(mut self, company_id: String) -> Self {
        self.company_id = Some(company_id);
        self
    }
}

/// Free-form voucher with caller-supplied entries and no stock effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalVoucher {
    pub voucher_type: VoucherType,
    pub voucher_no: String,
    pub date: NaiveDate,
    pub description: String,
    pub company_id: Option<String>,
    pub entries: Vec<Entry>,
}

impl JournalVoucher {
    pub fn new(
        voucher_type: VoucherType,
        voucher_no: String,
        date: NaiveDate,
        description: String,
        entries: Vec<Entry>,
    ) -> LedgerResult<Self> {
        if matches!(voucher_type, VoucherType::Sales | VoucherType::Purchase) {
            return Err(LedgerError::Validation(format!(
                "{:?} vouchers carry stock and must be built from item lines",
                voucher_type
            )));
        }

        if voucher_no.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Voucher number cannot be empty".to_string(),
            ));
        }

        DoubleEntryValidator::default().validate(&entries)?;

        Ok(Self {
            voucher_type,
            voucher_no,
            date,
            description,
            company_id: None,
            entries,
        })
    }

    pub fn with_company(mut self, company_id: String) -> Self {
        self.company_id = Some(company_id);
        self
    }
}

/// Any voucher the engine can post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VoucherRequest {
    Sales(SalesVoucher),
    Purchase(PurchaseVoucher),
    Journal(JournalVoucher),
}

impl VoucherRequest {
    pub fn voucher_no(&self) -> &str {
        match self {
            VoucherRequest::Sales(v) => &v.voucher_no,
            VoucherRequest::Purchase(v) => &v.voucher_no,
            VoucherRequest::Journal(v) => &v.voucher_no,
        }
    }

    pub fn voucher_type(&self) -> VoucherType {
        match self {
            VoucherRequest::Sales(_) => VoucherType::Sales,
            VoucherRequest::Purchase(_) => VoucherType::Purchase,
            VoucherRequest::Journal(v) => v.voucher_type,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            VoucherRequest::Sales(v) => v.date,
            VoucherRequest::Purchase(v) => v.date,
            VoucherRequest::Journal(v) => v.date,
        }
    }
}

impl From<SalesVoucher> for VoucherRequest {
    fn from(voucher: SalesVoucher) -> Self {
        VoucherRequest::Sales(voucher)
    }
}

impl From<PurchaseVoucher> for VoucherRequest {
    fn from(voucher: PurchaseVoucher) -> Self {
        VoucherRequest::Purchase(voucher)
    }
}

impl From<JournalVoucher> for VoucherRequest {
    fn from(voucher: JournalVoucher) -> Self {
        VoucherRequest::Journal(voucher)
    }
}

/// A fully expanded voucher, ready to commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherOutput {
    pub transaction: Transaction,
    pub movements: Vec<InventoryMovement>,
}

impl VoucherOutput {
    /// Total cost of goods sold carried by the outward movements
    pub fn cost_of_sales(&self) -> BigDecimal {
        self.movements
            .iter()
            .filter(|m| m.movement_type == MovementType::Out)
            .map(|m| m.cost_value())
            .sum()
    }
}

/// Expands voucher requests against a ledger snapshot
pub struct VoucherGenerator<'a> {
    config: &'a EngineConfig,
    cogs_mapping: &'a dyn CogsMapping,
}

impl<'a> VoucherGenerator<'a> {
    pub fn new(config: &'a EngineConfig, cogs_mapping: &'a dyn CogsMapping) -> Self {
        Self {
            config,
            cogs_mapping,
        }
    }

    fn validator(&self) -> DoubleEntryValidator {
        DoubleEntryValidator::from_config(self.config)
    }

    pub fn generate(
        &self,
        request: &VoucherRequest,
        snapshot: &LedgerSnapshot,
    ) -> LedgerResult<VoucherOutput> {
        match request {
            VoucherRequest::Sales(v) => self.create_sales_voucher(v, snapshot),
            VoucherRequest::Purchase(v) => self.create_purchase_voucher(v, snapshot),
            VoucherRequest::Journal(v) => self.create_journal_voucher(v),
        }
    }

    /// Sub-ledger of an item, checked against the item's inventory GL
    fn resolve_item<'s>(
        &self,
        item: &VoucherItem,
        snapshot: &'s LedgerSnapshot,
    ) -> LedgerResult<(&'s InventorySubLedger, &'s Account)> {
        let sub_ledger = snapshot
            .sub_ledger(&item.sub_ledger_id)
            .ok_or_else(|| LedgerError::SubLedgerNotFound(item.sub_ledger_id.clone()))?;

        if sub_ledger.inventory_gl_account_id != item.inventory_gl_account_id {
            return Err(LedgerError::Validation(format!(
                "Sub-ledger '{}' belongs to inventory GL '{}', not '{}'",
                sub_ledger.id, sub_ledger.inventory_gl_account_id, item.inventory_gl_account_id
            )));
        }

        let inventory_gl = find_account(&snapshot.accounts, &item.inventory_gl_account_id)
            .filter(|a| a.is_inventory_gl)
            .ok_or_else(|| LedgerError::InvalidAccountReference {
                account_id: item.inventory_gl_account_id.clone(),
                reason: "not an inventory GL account".to_string(),
            })?;

        Ok((sub_ledger, inventory_gl))
    }

    /// Dr receivable / Cr revenue at selling price, then Dr COGS / Cr inventory
    /// at weighted-average cost for every line that carries a cost.
    ///
    /// A line never takes more value than the sub-ledger holds on the sale
    /// date, less what earlier lines of the same voucher already took.
    pub fn create_sales_voucher(
        &self,
        request: &SalesVoucher,
        snapshot: &LedgerSnapshot,
    ) -> LedgerResult<VoucherOutput> {
        let sales_amount = self
            .config
            .round_money(&request.items.iter().map(VoucherItem::amount).sum());

        let mut builder = TransactionBuilder::new(
            request.voucher_no.clone(),
            request.date,
            VoucherType::Sales,
            request.description.clone(),
        )
        .company(request.company_id.clone())
        .debit(
            request.receivable_account_id.clone(),
            sales_amount.clone(),
            Some("Sales receivable".to_string()),
        )
        .credit(
            request.revenue_account_id.clone(),
            sales_amount,
            Some("Sales revenue".to_string()),
        );
        let voucher_id = builder.id().to_string();

        let zero = BigDecimal::from(0);
        let mut movements = Vec::with_capacity(request.items.len());
        let mut total_cost = zero.clone();
        let mut taken: HashMap<&str, BigDecimal> = HashMap::new();

        for item in &request.items {
            let (sub_ledger, inventory_gl) = self.resolve_item(item, snapshot)?;
            let cogs_gl = self
                .cogs_mapping
                .cogs_account(inventory_gl, &snapshot.accounts)
                .ok_or_else(|| LedgerError::MissingCogsMapping {
                    inventory_gl_account_id: inventory_gl.id.clone(),
                })?;

            let average_cost = weighted_average_cost(sub_ledger, &snapshot.movements, request.date);
            let costed = self.config.round_money(&(&item.quantity * &average_cost));

            let on_date =
                sub_ledger_balance(sub_ledger, &snapshot.movements, NaiveDate::MIN, request.date);
            let already_taken = taken.entry(sub_ledger.id.as_str()).or_insert_with(|| zero.clone());
            let available = min(
                on_date.value,
                current_balance(sub_ledger, &snapshot.movements).value,
            ) - &*already_taken;
            let cost = min(costed.clone(), max(available, zero.clone()));
            *already_taken += &cost;
            let cost_rate = self.config.round_rate(&(&cost / &item.quantity));

            if cost < costed {
                tracing::debug!(
                    sub_ledger_id = %sub_ledger.id,
                    %costed,
                    %cost,
                    "sales cost capped at stock value on hand"
                );
            }
            tracing::debug!(
                sub_ledger_id = %sub_ledger.id,
                quantity = %item.quantity,
                %average_cost,
                %cost,
                "costing sales line"
            );

            if cost > zero {
                builder = builder
                    .debit(
                        cogs_gl.id.clone(),
                        cost.clone(),
                        Some(format!("Cost of {}", sub_ledger.item_name)),
                    )
                    .credit(
                        inventory_gl.id.clone(),
                        cost.clone(),
                        Some(format!("Issue of {}", sub_ledger.item_name)),
                    );
            }

            builder = builder.item_line(ItemLine {
                sub_ledger_id: sub_ledger.id.clone(),
                inventory_gl_account_id: inventory_gl.id.clone(),
                item_name: sub_ledger.item_name.clone(),
                quantity: item.quantity.clone(),
                rate: item.rate.clone(),
            });

            movements.push(
                InventoryMovement::outward(
                    sub_ledger.id.clone(),
                    voucher_id.clone(),
                    item.quantity.clone(),
                    cost_rate,
                    cost.clone(),
                    request.date,
                )
                .with_reference(request.voucher_no.clone()),
            );
            total_cost += cost;
        }

        let transaction = builder
            .reference(format!("COGS: {}", total_cost.with_scale(self.config.money_scale)))
            .build_with(&self.validator())?;

        Ok(VoucherOutput {
            transaction,
            movements,
        })
    }

    /// Dr each inventory GL at cost, Cr payable for the total
    pub fn create_purchase_voucher(
        &self,
        request: &PurchaseVoucher,
        snapshot: &LedgerSnapshot,
    ) -> LedgerResult<VoucherOutput> {
        let mut builder = TransactionBuilder::new(
            request.voucher_no.clone(),
            request.date,
            VoucherType::Purchase,
            request.description.clone(),
        )
        .company(request.company_id.clone());
        let voucher_id = builder.id().to_string();

        let mut movements = Vec::with_capacity(request.items.len());
        let mut total = BigDecimal::from(0);

        for item in &request.items {
            let (sub_ledger, inventory_gl) = self.resolve_item(item, snapshot)?;
            let amount = self.config.round_money(&item.amount());

            builder = builder
                .debit(
                    inventory_gl.id.clone(),
                    amount.clone(),
                    Some(format!("Receipt of {}", sub_ledger.item_name)),
                )
                .item_line(ItemLine {
                    sub_ledger_id: sub_ledger.id.clone(),
                    inventory_gl_account_id: inventory_gl.id.clone(),
                    item_name: sub_ledger.item_name.clone(),
                    quantity: item.quantity.clone(),
                    rate: item.rate.clone(),
                });

            // stock is valued at what was posted to the GL
            movements.push(InventoryMovement {
                amount: amount.clone(),
                ..InventoryMovement::inward(
                    sub_ledger.id.clone(),
                    voucher_id.clone(),
                    item.quantity.clone(),
                    item.rate.clone(),
                    request.date,
                )
                .with_reference(request.voucher_no.clone())
            });
            total += amount;
        }

        let transaction = builder
            .credit(
                request.payable_account_id.clone(),
                total,
                Some("Purchase payable".to_string()),
            )
            .build_with(&self.validator())?;

        Ok(VoucherOutput {
            transaction,
            movements,
        })
    }

    pub fn create_journal_voucher(&self, request: &JournalVoucher) -> LedgerResult<VoucherOutput> {
        let transaction = request
            .entries
            .iter()
            .cloned()
            .fold(
                TransactionBuilder::new(
                    request.voucher_no.clone(),
                    request.date,
                    request.voucher_type,
                    request.description.clone(),
                )
                .company(request.company_id.clone()),
                TransactionBuilder::entry,
            )
            .build_with(&self.validator())?;

        Ok(VoucherOutput {
            transaction,
            movements: Vec::new(),
        })
    }

    /// Compensating voucher: every entry flipped and every stock movement
    /// undone at the value it originally carried.
    pub fn reverse_voucher(
        &self,
        original: &Transaction,
        original_movements: &[InventoryMovement],
        voucher_no: String,
        date: NaiveDate,
    ) -> LedgerResult<VoucherOutput> {
        if original.reverses.is_some() {
            return Err(LedgerError::InvalidTransaction(format!(
                "Voucher '{}' is itself a reversal",
                original.voucher_no
            )));
        }

        let mut builder = TransactionBuilder::new(
            voucher_no.clone(),
            date,
            original.voucher_type,
            format!("Reversal of {}", original.voucher_no),
        )
        .company(original.company_id.clone())
        .reverses(original.id.clone())
        .reference(original.voucher_no.clone());
        for entry in &original.entries {
            builder = builder.entry(entry.reversed());
        }
        for line in &original.item_lines {
            builder = builder.item_line(line.clone());
        }
        let voucher_id = builder.id().to_string();

        let movements = original_movements
            .iter()
            .filter(|m| m.voucher_id == original.id)
            .map(|m| {
                let undone = match m.movement_type {
                    MovementType::In => InventoryMovement::outward(
                        m.sub_ledger_id.clone(),
                        voucher_id.clone(),
                        m.quantity.clone(),
                        m.rate.clone(),
                        m.amount.clone(),
                        date,
                    ),
                    MovementType::Out => InventoryMovement {
                        amount: m.cost_value().clone(),
                        ..InventoryMovement::inward(
                            m.sub_ledger_id.clone(),
                            voucher_id.clone(),
                            m.quantity.clone(),
                            m.rate.clone(),
                            date,
                        )
                    },
                };
                undone.with_reference(voucher_no.clone())
            })
            .collect();

        let transaction = builder.build_with(&self.validator())?;

        Ok(VoucherOutput {
            transaction,
            movements,
        })
    }
}
