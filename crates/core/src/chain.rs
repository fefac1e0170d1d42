use std::fmt;

use alloy::{
    network::{Ethereum, EthereumWallet, ReceiptResponse as _},
    primitives::{Address, U256, aliases::U24},
    providers::{DynProvider, PendingTransactionBuilder, Provider as _, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use color_eyre::eyre::{self, Context as _};
use tracing::{debug, info, instrument};

use crate::{
    config::Secrets,
    contracts::{IERC20, ILendingPool, IUniswapV3Factory, IUniswapV3Pool, IV3SwapRouter},
    ledger::{Ledger, TxReceipt},
    steps::swap::SwapParameters,
};

/// [`Ledger`] backed by an HTTP JSON-RPC node and a local private key.
#[derive(Clone)]
pub struct EvmChain {
    provider: DynProvider,
    wallet_address: Address,
}

impl EvmChain {
    pub fn new(rpc_url: &str, private_key: &str) -> eyre::Result<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .wrap_err("failed to parse private key")?;
        let wallet_address = signer.address();
        let wallet = EthereumWallet::new(signer);

        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(rpc_url.parse().wrap_err("failed to parse RPC URL")?)
            .erased();

        Ok(Self {
            provider,
            wallet_address,
        })
    }

    pub fn from_secrets(secrets: &Secrets) -> eyre::Result<Self> {
        Self::new(&secrets.rpc_url, secrets.private_key())
    }
}

impl fmt::Debug for EvmChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmChain")
            .field("wallet_address", &self.wallet_address)
            .finish_non_exhaustive()
    }
}

/// Waits for a sent transaction to be mined. There is no timeout.
async fn confirm(
    pending: PendingTransactionBuilder<Ethereum>,
    kind: &'static str,
) -> eyre::Result<TxReceipt> {
    info!(tx = %pending.tx_hash(), "{kind} transaction sent");

    let receipt = pending
        .get_receipt()
        .await
        .wrap_err_with(|| format!("failed to confirm {kind} transaction"))?;

    let receipt = TxReceipt {
        hash: receipt.transaction_hash,
        status: receipt.status(),
    };
    info!(tx = %receipt, "{kind} transaction confirmed");

    Ok(receipt)
}

#[async_trait]
impl Ledger for EvmChain {
    fn wallet_address(&self) -> Address {
        self.wallet_address
    }

    #[instrument(skip(self))]
    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> eyre::Result<TxReceipt> {
        let token = IERC20::new(token, self.provider.clone());
        let pending = token
            .approve(spender, amount)
            .send()
            .await
            .wrap_err("failed to submit approval")?;

        confirm(pending, "approval").await
    }

    #[instrument(skip(self))]
    async fn get_pool(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> eyre::Result<Address> {
        let factory = IUniswapV3Factory::new(factory, self.provider.clone());
        let pool = factory
            .getPool(token_a, token_b, U24::from(fee))
            .call()
            .await
            .wrap_err("getPool call failed")?;

        debug!(%pool, "factory returned pool");
        Ok(pool)
    }

    #[instrument(skip(self))]
    async fn pool_metadata(&self, pool: Address) -> eyre::Result<(Address, Address, u32)> {
        let pool = IUniswapV3Pool::new(pool, self.provider.clone());

        let token0 = pool.token0().call().await.wrap_err("token0 call failed")?;
        let token1 = pool.token1().call().await.wrap_err("token1 call failed")?;
        let fee: U24 = pool.fee().call().await.wrap_err("fee call failed")?;

        Ok((token0, token1, fee.to::<u32>()))
    }

    #[instrument(skip(self, params))]
    async fn exact_input_single(
        &self,
        router: Address,
        params: SwapParameters,
    ) -> eyre::Result<TxReceipt> {
        let router = IV3SwapRouter::new(router, self.provider.clone());
        let params = IV3SwapRouter::ExactInputSingleParams {
            tokenIn: params.token_in,
            tokenOut: params.token_out,
            fee: U24::from(params.fee),
            recipient: params.recipient,
            amountIn: params.amount_in,
            amountOutMinimum: params.amount_out_minimum,
            sqrtPriceLimitX96: params.price_limit,
        };

        let pending = router
            .exactInputSingle(params)
            .send()
            .await
            .wrap_err("failed to submit swap")?;

        confirm(pending, "swap").await
    }

    #[instrument(skip(self))]
    async fn balance_of(&self, token: Address, owner: Address) -> eyre::Result<U256> {
        let token = IERC20::new(token, self.provider.clone());
        let balance: U256 = token
            .balanceOf(owner)
            .call()
            .await
            .wrap_err("balanceOf call failed")?;

        Ok(balance)
    }

    #[instrument(skip(self))]
    async fn supply(
        &self,
        lending_pool: Address,
        asset: Address,
        amount: U256,
        on_behalf_of: Address,
        referral_code: u16,
    ) -> eyre::Result<TxReceipt> {
        let pool = ILendingPool::new(lending_pool, self.provider.clone());
        let pending = pool
            .supply(asset, amount, on_behalf_of, referral_code)
            .send()
            .await
            .wrap_err("failed to submit supply")?;

        confirm(pending, "supply").await
    }
}
