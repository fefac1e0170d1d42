use std::fmt::{self, Display};

use alloy::primitives::Address;
use tracing::{info, instrument};

use super::StepError;
use crate::{ledger::Ledger, token::TokenDescriptor};

/// A resolved liquidity pool. Only valid for the run that resolved it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolDescriptor {
    pub address: Address,
    /// Tokens in the pool's own order (lower address first), not the caller's
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
}

impl Display for PoolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}/{}, fee {})",
            self.address, self.token0, self.token1, self.fee
        )
    }
}

/// Looks up the pool for an unordered token pair at `fee` and reads its metadata.
#[instrument(skip_all, fields(%factory, token_a = %token_a.symbol, token_b = %token_b.symbol, %fee))]
pub async fn resolve_pool<L: Ledger>(
    ledger: &L,
    factory: Address,
    token_a: &TokenDescriptor,
    token_b: &TokenDescriptor,
    fee: u32,
) -> Result<PoolDescriptor, StepError> {
    let address = ledger
        .get_pool(factory, token_a.address, token_b.address, fee)
        .await
        .map_err(|reason| StepError::Query { reason })?;

    if address.is_zero() {
        return Err(StepError::PoolNotFound {
            token_a: token_a.address,
            token_b: token_b.address,
            fee,
        });
    }

    let (token0, token1, pool_fee) = ledger
        .pool_metadata(address)
        .await
        .map_err(|reason| StepError::Query { reason })?;

    let pool = PoolDescriptor {
        address,
        token0,
        token1,
        fee: pool_fee,
    };
    info!(%pool, "resolved pool");

    Ok(pool)
}
