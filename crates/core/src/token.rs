use std::fmt::{self, Display};

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An ERC-20 token the pipeline moves around, identified by address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub address: Address,
    /// Precision used to turn human amounts into base units
    pub decimals: u8,
}

impl TokenDescriptor {
    pub fn new(symbol: &str, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            address,
            decimals,
        }
    }

    pub fn to_base_units(&self, amount: Decimal) -> Result<U256, AmountError> {
        to_base_units(amount, self.decimals)
    }

    pub fn format_base_units(&self, value: U256) -> String {
        format_base_units(value, self.decimals)
    }
}

impl Display for TokenDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.address)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount {0} is negative")]
    Negative(Decimal),
    #[error("amount {amount} does not fit into 256 bits at {decimals} decimals")]
    Overflow { amount: Decimal, decimals: u8 },
}

/// Converts a human amount into base units, `trunc(amount * 10^decimals)`.
///
/// Digits below the token's precision are dropped, never rounded.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<U256, AmountError> {
    if amount < Decimal::ZERO {
        return Err(AmountError::Negative(amount));
    }

    let overflow = || AmountError::Overflow { amount, decimals };
    let mantissa = U256::from(amount.mantissa().unsigned_abs());
    let scale = amount.scale();
    let decimals_u32 = u32::from(decimals);
    let ten = U256::from(10u8);

    if scale <= decimals_u32 {
        let factor = ten
            .checked_pow(U256::from(decimals_u32 - scale))
            .ok_or_else(overflow)?;
        mantissa.checked_mul(factor).ok_or_else(overflow)
    } else {
        // scale is at most 28, this cannot overflow
        let divisor = ten.pow(U256::from(scale - decimals_u32));
        Ok(mantissa / divisor)
    }
}

/// Renders base units as a human readable decimal string, for logs.
pub fn format_base_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return digits;
    }

    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (int, frac) = padded.split_at(padded.len() - decimals);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        int.to_string()
    } else {
        format!("{int}.{frac}")
    }
}
