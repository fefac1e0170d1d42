use alloy::primitives::{Address, U256, aliases::U160};
use tracing::{info, instrument, warn};

use super::{StepError, ensure_success, pool::PoolDescriptor};
use crate::{
    ledger::{Ledger, TxReceipt},
    token::TokenDescriptor,
};

/// Arguments of a single-hop exact-input swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapParameters {
    pub token_in: Address,
    pub token_out: Address,
    pub fee: u32,
    pub recipient: Address,
    pub amount_in: U256,
    pub amount_out_minimum: U256,
    /// `sqrtPriceLimitX96`, zero disables the limit
    pub price_limit: U160,
}

impl SwapParameters {
    /// Sells exactly `amount_in` of `token_in` through `pool` at whatever price it quotes.
    ///
    /// Neither a minimum output nor a price limit is set, so the swap is fully
    /// exposed to slippage.
    pub fn exact_input(
        pool: &PoolDescriptor,
        token_in: &TokenDescriptor,
        token_out: &TokenDescriptor,
        recipient: Address,
        amount_in: U256,
    ) -> Self {
        Self {
            token_in: token_in.address,
            token_out: token_out.address,
            fee: pool.fee,
            recipient,
            amount_in,
            amount_out_minimum: U256::ZERO,
            price_limit: U160::ZERO,
        }
    }
}

#[instrument(skip_all, fields(%router, token_in = %params.token_in, token_out = %params.token_out, amount_in = %params.amount_in))]
pub async fn execute_swap<L: Ledger>(
    ledger: &L,
    router: Address,
    params: SwapParameters,
) -> Result<TxReceipt, StepError> {
    if params.amount_out_minimum.is_zero() {
        warn!("swapping without minimum output protection");
    }

    let receipt = ledger
        .exact_input_single(router, params)
        .await
        .and_then(ensure_success)
        .map_err(|reason| StepError::SwapExecution { router, reason })?;

    info!(tx = %receipt.hash, "swap confirmed");
    Ok(receipt)
}
