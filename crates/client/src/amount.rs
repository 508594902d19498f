//! Native-unit amounts as typed by users and shown back to them.

use ethers::types::U256;
use ethers::utils::{format_ether, parse_ether};

use crate::error::ChainError;

/// Parse a decimal native-unit string ("0.01") into wei. Empty and zero
/// amounts are rejected.
pub fn parse_native(input: &str) -> Result<U256, ChainError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ChainError::validation("amount is required"));
    }
    let amount = parse_ether(input)
        .map_err(|e| ChainError::validation(format!("invalid amount {input:?}: {e}")))?;
    if amount.is_zero() {
        return Err(ChainError::validation("amount must be greater than zero"));
    }
    Ok(amount)
}

/// Format wei as a decimal native-unit string without trailing zeros.
pub fn format_native(amount: U256) -> String {
    let formatted = format_ether(amount);
    match formatted.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{whole}.0")
            } else {
                format!("{whole}.{fraction}")
            }
        }
        None => format!("{formatted}.0"),
    }
}

/// Serde adapter storing wei amounts as decimal native-unit strings.
pub mod serde_native {
    use ethers::types::U256;
    use ethers::utils::parse_ether;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_native(*amount))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_ether(raw.trim()).map_err(de::Error::custom)
    }
}

/// One point of the simulated bonding-curve chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub native: f64,
    pub price: f64,
}

const PREVIEW_POINTS: usize = 20;
const PREVIEW_STEP: f64 = 0.5;
const PREVIEW_INITIAL_PRICE: f64 = 1.0;

/// Simulated buy price against native units injected. Illustrative only;
/// the real curve lives on chain.
pub fn curve_preview() -> Vec<CurvePoint> {
    (1..=PREVIEW_POINTS)
        .map(|step| {
            let native = step as f64 * PREVIEW_STEP;
            CurvePoint {
                native,
                price: PREVIEW_INITIAL_PRICE * native,
            }
        })
        .collect()
}
