use alloy::primitives::{Address, U256};
use tracing::{info, instrument};

use super::StepError;
use crate::{ledger::Ledger, token::TokenDescriptor};

/// Current balance of `owner` in base units. Zero is a valid balance.
#[instrument(skip_all, fields(token = %token.symbol, %owner))]
pub async fn read_balance<L: Ledger>(
    ledger: &L,
    token: &TokenDescriptor,
    owner: Address,
) -> Result<U256, StepError> {
    let balance = ledger
        .balance_of(token.address, owner)
        .await
        .map_err(|reason| StepError::Query { reason })?;

    info!(
        %balance,
        human = %token.format_base_units(balance),
        "read {} balance", token.symbol
    );
    Ok(balance)
}
