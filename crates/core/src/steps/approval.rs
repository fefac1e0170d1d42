use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use super::{StepError, ensure_success};
use crate::{
    ledger::{Ledger, TxReceipt},
    token::TokenDescriptor,
};

/// A confirmed approval and the base-unit amount it granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allowance {
    pub receipt: TxReceipt,
    pub amount: U256,
}

/// Allows `spender` to move `amount` (human units) of `token` out of the wallet.
pub async fn approve<L: Ledger>(
    ledger: &L,
    token: &TokenDescriptor,
    spender: Address,
    amount: Decimal,
) -> Result<Allowance, StepError> {
    let amount = token
        .to_base_units(amount)
        .map_err(|e| StepError::Approval {
            token: token.address,
            spender,
            reason: e.into(),
        })?;

    let receipt = approve_base_units(ledger, token, spender, amount).await?;
    Ok(Allowance { receipt, amount })
}

/// Same as [`approve`], with an amount already in base units.
#[instrument(skip_all, fields(token = %token.symbol, %spender, %amount))]
pub async fn approve_base_units<L: Ledger>(
    ledger: &L,
    token: &TokenDescriptor,
    spender: Address,
    amount: U256,
) -> Result<TxReceipt, StepError> {
    info!(
        human = %token.format_base_units(amount),
        "approving {} for spender", token.symbol
    );

    let receipt = ledger
        .approve(token.address, spender, amount)
        .await
        .and_then(ensure_success)
        .map_err(|reason| StepError::Approval {
            token: token.address,
            spender,
            reason,
        })?;

    info!(tx = %receipt.hash, "approval confirmed");
    Ok(receipt)
}
