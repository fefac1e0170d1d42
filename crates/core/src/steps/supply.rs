use alloy::primitives::{Address, U256};
use tracing::{info, instrument};

use super::{StepError, ensure_success};
use crate::{
    ledger::{Ledger, TxReceipt},
    token::TokenDescriptor,
};

/// Deposits `amount` base units of `token` into the lending pool for `on_behalf_of`.
///
/// Needs a prior approval of at least `amount` for `lending_pool`, which is not
/// checked here.
#[instrument(skip_all, fields(%lending_pool, token = %token.symbol, %amount, %on_behalf_of))]
pub async fn supply<L: Ledger>(
    ledger: &L,
    lending_pool: Address,
    token: &TokenDescriptor,
    amount: U256,
    on_behalf_of: Address,
    referral_code: u16,
) -> Result<TxReceipt, StepError> {
    let receipt = ledger
        .supply(lending_pool, token.address, amount, on_behalf_of, referral_code)
        .await
        .and_then(ensure_success)
        .map_err(|reason| StepError::Supply {
            lending_pool,
            amount,
            reason,
        })?;

    info!(tx = %receipt.hash, "supply confirmed");
    Ok(receipt)
}
