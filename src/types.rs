//! Core types and data structures for the accounting engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Account types following standard accounting principles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Assets - what the business owns (Cash, Inventory, Receivables, etc.)
    Asset,
    /// Liabilities - what the business owes (Payables, Loans, etc.)
    Liability,
    /// Equity - owner's interest in the business (Capital, Retained Earnings, etc.)
    Equity,
    /// Income/Revenue - money earned by the business
    Income,
    /// Expenses - costs incurred by the business, including cost of sales
    Expense,
}

/// Position of an account in the three-level chart of accounts.
///
/// Only `Gl` accounts receive postings; `Group` and `Main` rows are roll-ups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccountLevel {
    Main,
    Group,
    Gl,
}

impl AccountLevel {
    /// Depth in the tree, `Main` being 1
    pub fn depth(&self) -> u8 {
        match self {
            AccountLevel::Main => 1,
            AccountLevel::Group => 2,
            AccountLevel::Gl => 3,
        }
    }
}

/// Types of entries in double-entry bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    /// The other side of the ledger
    pub fn opposite(&self) -> Self {
        match self {
            EntryType::Debit => EntryType::Credit,
            EntryType::Credit => EntryType::Debit,
        }
    }
}

/// Chart of accounts node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account
    pub id: String,
    /// Owning company, if the chart is shared across companies
    pub company_id: Option<String>,
    /// Chart code, unique within a company (e.g. "30001")
    pub code: String,
    /// Human-readable account name
    pub name: String,
    /// Type of account (Asset, Liability, etc.)
    pub account_type: AccountType,
    /// Level in the chart tree
    pub level: AccountLevel,
    /// Optional parent account for hierarchical chart of accounts
    pub parent_id: Option<String>,
    /// Base balance carried into the ledger before any voucher
    pub opening_balance: BigDecimal,
    /// Running ledger balance (debit-positive)
    pub balance: BigDecimal,
    /// Controlling account for inventory sub-ledgers
    pub is_inventory_gl: bool,
    /// Cost of goods sold account paired with an inventory GL
    pub is_cogs_gl: bool,
    /// System account: cannot be deleted or posted to
    pub is_locked: bool,
    /// Additional metadata
    pub metadata: HashMap<String, String>,
    /// When the account was created
    pub created_at: NaiveDateTime,
    /// When the account was last updated
    pub updated_at: NaiveDateTime,
}

impl Account {
    /// Create a new account with a zero opening balance
    pub fn new(
        id: String,
        code: String,
        name: String,
        account_type: AccountType,
        level: AccountLevel,
        parent_id: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            company_id: None,
            code,
            name,
            account_type,
            level,
            parent_id,
            opening_balance: BigDecimal::from(0),
            balance: BigDecimal::from(0),
            is_inventory_gl: false,
            is_cogs_gl: false,
            is_locked: false,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the base balance; the running balance starts from it
    pub fn with_opening_balance(mut self, amount: BigDecimal) -> Self {
        self.balance = amount.clone();
        self.opening_balance = amount;
        self
    }

    /// Mark the account as an inventory control account
    pub fn inventory_gl(mut self) -> Self {
        self.is_inventory_gl = true;
        self
    }

    /// Mark the account as a cost of goods sold account
    pub fn cogs_gl(mut self) -> Self {
        self.is_cogs_gl = true;
        self
    }

    /// Mark the account as a locked system account
    pub fn locked(mut self) -> Self {
        self.is_locked = true;
        self
    }

    /// Whether journal entries may be posted to this account
    pub fn is_postable(&self) -> bool {
        self.level == AccountLevel::Gl && !self.is_locked
    }

    /// Update the running balance based on an entry.
    ///
    /// The ledger keeps every account debit-positive; presentation signs are
    /// applied by [`crate::reporting::display_balance`].
    pub fn apply_entry(&mut self, entry_type: EntryType, amount: &BigDecimal) {
        match entry_type {
            EntryType::Debit => self.balance += amount,
            EntryType::Credit => self.balance -= amount,
        }
        self.updated_at = chrono::Utc::now().naive_utc();
    }
}

/// Individual entry within a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Account being affected
    pub account_id: String,
    /// Type of entry (Debit or Credit)
    pub entry_type: EntryType,
    /// Amount of the entry
    pub amount: BigDecimal,
    /// Optional description for this specific entry
    pub description: Option<String>,
}

impl Entry {
    /// Create a new entry
    pub fn new(
        account_id: String,
        entry_type: EntryType,
        amount: BigDecimal,
        description: Option<String>,
    ) -> Self {
        Self {
            account_id,
            entry_type,
            amount,
            description,
        }
    }

    /// Create a debit entry
    pub fn debit(account_id: String, amount: BigDecimal, description: Option<String>) -> Self {
        Self::new(account_id, EntryType::Debit, amount, description)
    }

    /// Create a credit entry
    pub fn credit(account_id: String, amount: BigDecimal, description: Option<String>) -> Self {
        Self::new(account_id, EntryType::Credit, amount, description)
    }

    /// Debit column of the entry (zero for credits)
    pub fn debit_amount(&self) -> BigDecimal {
        match self.entry_type {
            EntryType::Debit => self.amount.clone(),
            EntryType::Credit => BigDecimal::from(0),
        }
    }

    /// Credit column of the entry (zero for debits)
    pub fn credit_amount(&self) -> BigDecimal {
        match self.entry_type {
            EntryType::Debit => BigDecimal::from(0),
            EntryType::Credit => self.amount.clone(),
        }
    }

    /// Effect on a debit-positive balance
    pub fn signed_amount(&self) -> BigDecimal {
        match self.entry_type {
            EntryType::Debit => self.amount.clone(),
            EntryType::Credit => -self.amount.clone(),
        }
    }

    /// The same entry on the opposite side
    pub fn reversed(&self) -> Self {
        Self {
            account_id: self.account_id.clone(),
            entry_type: self.entry_type.opposite(),
            amount: self.amount.clone(),
            description: self.description.clone(),
        }
    }
}

/// Kind of voucher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoucherType {
    Sales,
    Purchase,
    Journal,
    Receipt,
    Payment,
}

impl VoucherType {
    /// Two-letter voucher number prefix ("SA", "PU", ...)
    pub fn prefix(&self) -> &'static str {
        match self {
            VoucherType::Sales => "SA",
            VoucherType::Purchase => "PU",
            VoucherType::Journal => "JO",
            VoucherType::Receipt => "RE",
            VoucherType::Payment => "PA",
        }
    }
}

/// Inventory line carried by a sales or purchase voucher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemLine {
    pub sub_ledger_id: String,
    pub inventory_gl_account_id: String,
    pub item_name: String,
    pub quantity: BigDecimal,
    /// Selling rate on sales, cost rate on purchases
    pub rate: BigDecimal,
}

impl ItemLine {
    /// Quantity times rate
    pub fn line_amount(&self) -> BigDecimal {
        &self.quantity * &self.rate
    }
}

/// A voucher: balanced journal entries plus optional inventory lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier for the transaction
    pub id: String,
    /// Owning company
    pub company_id: Option<String>,
    /// Human-facing voucher number, unique per company
    pub voucher_no: String,
    /// Date when the transaction occurred
    pub date: NaiveDate,
    /// Kind of voucher
    pub voucher_type: VoucherType,
    /// Description of the transaction
    pub description: String,
    /// Optional reference (invoice number, COGS note, etc.)
    pub reference: Option<String>,
    /// List of entries that make up this transaction
    pub entries: Vec<Entry>,
    /// Inventory lines for sales and purchase vouchers
    pub item_lines: Vec<ItemLine>,
    /// Id of the voucher this one compensates, if any
    pub reverses: Option<String>,
    /// Additional metadata
    pub metadata: HashMap<String, String>,
    /// When the transaction was created
    pub created_at: NaiveDateTime,
    /// When the transaction was last updated
    pub updated_at: NaiveDateTime,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(
        id: String,
        voucher_no: String,
        date: NaiveDate,
        voucher_type: VoucherType,
        description: String,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            company_id: None,
            voucher_no,
            date,
            voucher_type,
            description,
            reference: None,
            entries: Vec::new(),
            item_lines: Vec::new(),
            reverses: None,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add an entry to the transaction
    pub fn add_entry(&mut self, entry: Entry) {
        self.entries.push(entry);
        self.updated_at = chrono::Utc::now().naive_utc();
    }

    /// Calculate total debits
    pub fn total_debits(&self) -> BigDecimal {
        self.entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Debit)
            .map(|e| &e.amount)
            .sum()
    }

    /// Calculate total credits
    pub fn total_credits(&self) -> BigDecimal {
        self.entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Credit)
            .map(|e| &e.amount)
            .sum()
    }

    /// Whether any entry touches the given account
    pub fn affects_account(&self, account_id: &str) -> bool {
        self.entries.iter().any(|e| e.account_id == account_id)
    }
}

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    In,
    Out,
}

/// One stock-keeping unit under one inventory GL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySubLedger {
    pub id: String,
    pub company_id: Option<String>,
    pub item_name: String,
    /// Unique item code
    pub item_code: String,
    /// Controlling inventory GL account
    pub inventory_gl_account_id: String,
    /// Base quantity before any movement
    pub opening_quantity: BigDecimal,
    /// Base unit cost before any movement
    pub opening_rate: BigDecimal,
    /// Current quantity, refreshed from movements after each commit
    pub quantity: BigDecimal,
    /// Current average unit cost, refreshed from movements after each commit
    pub rate: BigDecimal,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl InventorySubLedger {
    /// Create a sub-ledger with its opening stock
    pub fn new(
        id: String,
        item_name: String,
        item_code: String,
        inventory_gl_account_id: String,
        opening_quantity: BigDecimal,
        opening_rate: BigDecimal,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            company_id: None,
            item_name,
            item_code,
            inventory_gl_account_id,
            quantity: opening_quantity.clone(),
            rate: opening_rate.clone(),
            opening_quantity,
            opening_rate,
            created_at: now,
            updated_at: now,
        }
    }

    /// Opening quantity times opening rate
    pub fn opening_value(&self) -> BigDecimal {
        &self.opening_quantity * &self.opening_rate
    }
}

/// Append-only stock movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: String,
    pub sub_ledger_id: String,
    /// Transaction that produced the movement
    pub voucher_id: String,
    pub movement_type: MovementType,
    pub quantity: BigDecimal,
    pub rate: BigDecimal,
    /// Quantity times rate at movement time
    pub amount: BigDecimal,
    /// Cost assigned at sale time (Out only)
    pub cos_amount: Option<BigDecimal>,
    pub date: NaiveDate,
    /// Voucher number, for audit trails
    pub reference: Option<String>,
}

impl InventoryMovement {
    /// Stock received at the given rate
    pub fn inward(
        sub_ledger_id: String,
        voucher_id: String,
        quantity: BigDecimal,
        rate: BigDecimal,
        date: NaiveDate,
    ) -> Self {
        let amount = &quantity * &rate;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sub_ledger_id,
            voucher_id,
            movement_type: MovementType::In,
            quantity,
            rate,
            amount,
            cos_amount: None,
            date,
            reference: None,
        }
    }

    /// Stock issued at a given total cost
    pub fn outward(
        sub_ledger_id: String,
        voucher_id: String,
        quantity: BigDecimal,
        rate: BigDecimal,
        cost: BigDecimal,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sub_ledger_id,
            voucher_id,
            movement_type: MovementType::Out,
            quantity,
            rate,
            amount: cost.clone(),
            cos_amount: Some(cost),
            date,
            reference: None,
        }
    }

    /// Attach the originating voucher number
    pub fn with_reference(mut self, reference: String) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Value that leaves or enters stock: `cos_amount` when present, else `amount`
    pub fn cost_value(&self) -> &BigDecimal {
        self.cos_amount.as_ref().unwrap_or(&self.amount)
    }
}

/// Errors that can occur in the accounting engine
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Transaction is not balanced: debits = {debits}, credits = {credits}")]
    UnbalancedTransaction {
        debits: BigDecimal,
        credits: BigDecimal,
    },
    #[error("Invalid account reference '{account_id}': {reason}")]
    InvalidAccountReference { account_id: String, reason: String },
    #[error(
        "Insufficient inventory in sub-ledger '{sub_ledger_id}': requested {requested}, available {available}"
    )]
    InsufficientInventory {
        sub_ledger_id: String,
        requested: BigDecimal,
        available: BigDecimal,
    },
    #[error("Inventory GL '{gl_account_id}' is out of sync with its sub-ledgers by {variance}")]
    SyncVarianceDetected {
        gl_account_id: String,
        variance: BigDecimal,
    },
    #[error("No cost of goods sold account is mapped to inventory GL '{inventory_gl_account_id}'")]
    MissingCogsMapping { inventory_gl_account_id: String },
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Sub-ledger not found: {0}")]
    SubLedgerNotFound(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Concurrent modification of '{0}', retry against a fresh snapshot")]
    ConcurrentModification(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
