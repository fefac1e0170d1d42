//! The individual on-chain operations the pipeline is built from.
//!
//! Each step wraps one [`Ledger`](crate::ledger::Ledger) interaction and maps
//! its failure into a [`StepError`] tagged with the step that produced it.
use alloy::primitives::{Address, U256};
use color_eyre::eyre::{self, eyre};
use thiserror::Error;

use crate::ledger::TxReceipt;

pub mod approval;
pub mod balance;
pub mod pool;
pub mod supply;
pub mod swap;

#[derive(Debug, Error)]
pub enum StepError {
    #[error("approval of {token} for spender {spender} failed: {reason:#}")]
    Approval {
        token: Address,
        spender: Address,
        reason: eyre::Report,
    },

    #[error("no pool for {token_a}/{token_b} at fee tier {fee}")]
    PoolNotFound {
        token_a: Address,
        token_b: Address,
        fee: u32,
    },

    #[error("swap through router {router} failed: {reason:#}")]
    SwapExecution { router: Address, reason: eyre::Report },

    #[error("chain query failed: {reason:#}")]
    Query { reason: eyre::Report },

    #[error("supply of {amount} base units to {lending_pool} failed: {reason:#}")]
    Supply {
        lending_pool: Address,
        amount: U256,
        reason: eyre::Report,
    },
}

impl StepError {
    /// Whether the error ends the run. Only a failed deposit does not.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Supply { .. })
    }
}

/// Turns a mined but reverted transaction into an error.
fn ensure_success(receipt: TxReceipt) -> eyre::Result<TxReceipt> {
    if receipt.status {
        Ok(receipt)
    } else {
        Err(eyre!("transaction {} reverted", receipt.hash))
    }
}
