//! Engine configuration

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::{LedgerError, LedgerResult};

/// Chart-of-accounts conventions the engine relies on.
///
/// Codes follow the small-business chart the engine ships with: inventory GLs
/// `300NN` pair with cost of sales GLs `1800NN`, and the dashboard and cash
/// flow groups are identified by their group code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConventions {
    /// Code prefix of cost of goods sold GL accounts
    #[serde(default = "default_cogs_code_prefix")]
    pub cogs_code_prefix: String,
    /// Number of trailing code digits shared by an inventory GL and its COGS GL
    #[serde(default = "default_cogs_suffix_len")]
    pub cogs_suffix_len: usize,
    #[serde(default = "default_cash_group_code")]
    pub cash_group_code: String,
    #[serde(default = "default_receivable_group_code")]
    pub receivable_group_code: String,
    #[serde(default = "default_payable_group_code")]
    pub payable_group_code: String,
    #[serde(default = "default_retained_earnings_group_code")]
    pub retained_earnings_group_code: String,
    /// Working-capital groups whose movement adjusts net profit
    #[serde(default = "default_operating_group_codes")]
    pub operating_group_codes: Vec<String>,
    #[serde(default = "default_investing_group_codes")]
    pub investing_group_codes: Vec<String>,
    #[serde(default = "default_financing_group_codes")]
    pub financing_group_codes: Vec<String>,
}

fn default_cogs_code_prefix() -> String {
    "1800".to_string()
}

fn default_cogs_suffix_len() -> usize {
    2
}

fn default_cash_group_code() -> String {
    "10000".to_string()
}

fn default_receivable_group_code() -> String {
    "20000".to_string()
}

fn default_payable_group_code() -> String {
    "70000".to_string()
}

fn default_retained_earnings_group_code() -> String {
    "130000".to_string()
}

fn codes(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

fn default_operating_group_codes() -> Vec<String> {
    codes(&["20000", "30000", "50000", "60000", "70000", "80000", "100000", "110000"])
}

fn default_investing_group_codes() -> Vec<String> {
    codes(&["40000"])
}

fn default_financing_group_codes() -> Vec<String> {
    codes(&["90000", "120000", "150000"])
}

impl Default for ChartConventions {
    fn default() -> Self {
        Self {
            cogs_code_prefix: default_cogs_code_prefix(),
            cogs_suffix_len: default_cogs_suffix_len(),
            cash_group_code: default_cash_group_code(),
            receivable_group_code: default_receivable_group_code(),
            payable_group_code: default_payable_group_code(),
            retained_earnings_group_code: default_retained_earnings_group_code(),
            operating_group_codes: default_operating_group_codes(),
            investing_group_codes: default_investing_group_codes(),
            financing_group_codes: default_financing_group_codes(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Largest debit/credit difference accepted on a voucher. A GL/sub-ledger
    /// variance is reported as synced only while strictly below it.
    #[serde(default = "default_tolerance")]
    pub tolerance: BigDecimal,
    /// Decimal places kept on posted amounts
    #[serde(default = "default_money_scale")]
    pub money_scale: i64,
    /// Decimal places kept on unit costs
    #[serde(default = "default_rate_scale")]
    pub rate_scale: i64,
    #[serde(default)]
    pub conventions: ChartConventions,
}

fn default_tolerance() -> BigDecimal {
    BigDecimal::new(1.into(), 2)
}

fn default_money_scale() -> i64 {
    2
}

fn default_rate_scale() -> i64 {
    6
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            money_scale: default_money_scale(),
            rate_scale: default_rate_scale(),
            conventions: ChartConventions::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from `LEDGER_*` environment variables.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `LEDGER_CONVENTIONS__COGS_CODE_PREFIX=5100`.
    pub fn from_env() -> LedgerResult<Self> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("LEDGER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// Round a posted amount to the money scale
    pub fn round_money(&self, amount: &BigDecimal) -> BigDecimal {
        amount.round(self.money_scale)
    }

    /// Round a unit cost to the rate scale
    pub fn round_rate(&self, rate: &BigDecimal) -> BigDecimal {
        rate.round(self.rate_scale)
    }

    /// `|a - b| <= tolerance`
    pub fn within_tolerance(&self, a: &BigDecimal, b: &BigDecimal) -> bool {
        (a - b).abs() <= self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.tolerance, BigDecimal::from_str("0.01").unwrap());
        assert_eq!(config.money_scale, 2);
        assert_eq!(config.conventions.cogs_code_prefix, "1800");
        assert_eq!(config.conventions.cogs_suffix_len, 2);
    }

    #[test]
    fn test_rounding_and_tolerance() {
        let config = EngineConfig::default();
        let third = BigDecimal::from(100) / BigDecimal::from(3);

        assert_eq!(
            config.round_money(&third),
            BigDecimal::from_str("33.33").unwrap()
        );
        assert!(config.within_tolerance(
            &BigDecimal::from_str("100.004").unwrap(),
            &BigDecimal::from(100)
        ));
        assert!(!config.within_tolerance(
            &BigDecimal::from_str("100.02").unwrap(),
            &BigDecimal::from(100)
        ));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let json = r#"{"money_scale": 3, "conventions": {"cogs_code_prefix": "5100"}}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.money_scale, 3);
        assert_eq!(config.rate_scale, 6);
        assert_eq!(config.conventions.cogs_code_prefix, "5100");
        assert_eq!(config.conventions.payable_group_code, "70000");
        assert_eq!(config.conventions.investing_group_codes, vec!["40000"]);
    }
}
