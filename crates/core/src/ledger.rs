use std::fmt::{self, Display};

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use color_eyre::eyre;

use crate::steps::swap::SwapParameters;

/// Confirmation record of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub hash: TxHash,
    /// `false` when the transaction was mined but reverted
    pub status: bool,
}

impl TxReceipt {
    pub fn succeeded(hash: TxHash) -> Self {
        Self { hash, status: true }
    }

    pub fn reverted(hash: TxHash) -> Self {
        Self {
            hash,
            status: false,
        }
    }
}

impl Display for TxReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.status { "success" } else { "reverted" };
        write!(f, "{} ({status})", self.hash)
    }
}

/// Everything the pipeline needs from the chain, one method per contract call.
///
/// Mutating calls resolve only once the transaction is mined. They do not
/// time out, and a returned receipt may still carry a reverted status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Address of the signing wallet.
    fn wallet_address(&self) -> Address;

    /// ERC-20 `approve(spender, amount)` on `token`.
    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> eyre::Result<TxReceipt>;

    /// Factory `getPool`. Returns the zero address if no pool exists.
    async fn get_pool(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> eyre::Result<Address>;

    /// Pool `token0()`, `token1()` and `fee()`.
    async fn pool_metadata(&self, pool: Address) -> eyre::Result<(Address, Address, u32)>;

    /// Router `exactInputSingle(params)`.
    async fn exact_input_single(
        &self,
        router: Address,
        params: SwapParameters,
    ) -> eyre::Result<TxReceipt>;

    /// ERC-20 `balanceOf(owner)` on `token`.
    async fn balance_of(&self, token: Address, owner: Address) -> eyre::Result<U256>;

    /// Lending pool `supply(asset, amount, onBehalfOf, referralCode)`.
    async fn supply(
        &self,
        lending_pool: Address,
        asset: Address,
        amount: U256,
        on_behalf_of: Address,
        referral_code: u16,
    ) -> eyre::Result<TxReceipt>;
}
