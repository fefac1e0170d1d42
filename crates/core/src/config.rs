use std::fmt;

use alloy::primitives::{Address, address};
use color_eyre::eyre::{self, Context as _, ensure};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::token::TokenDescriptor;

pub const CONFIG_FILE: &str = "yieldhop.yaml";
pub const ENV_PREFIX: &str = "YIELDHOP_";

/// Uniswap v3 fee tiers, in hundredths of a bip
pub const FEE_TIERS: [u32; 4] = [100, 500, 3000, 10_000];

// U256 holds 10^77 but not 10^78
const MAX_DECIMALS: u8 = 77;

/// Immutable deployment constants for one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Token spent on the swap
    pub input_token: TokenDescriptor,

    /// Token received from the swap and supplied to the lending pool
    pub output_token: TokenDescriptor,

    pub contracts: Contracts,

    /// Fee tier of the pool to swap through
    pub fee_tier: u32,

    /// Referral code passed along with `supply`
    pub referral_code: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contracts {
    /// Uniswap v3 factory
    pub factory: Address,

    /// Uniswap SwapRouter02
    pub router: Address,

    /// Lending pool receiving the swapped tokens
    pub lending_pool: Address,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_token: TokenDescriptor::new(
                "USDC",
                address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eb48"),
                6,
            ),
            output_token: TokenDescriptor::new(
                "LINK",
                address!("0x514910771AF9Ca656af840dff83E8264EcF986CA"),
                18,
            ),
            contracts: Contracts {
                factory: address!("0x1F98431c8aD98523631AE4a59f267346ea31F984"),
                router: address!("0x68b3465833fb72A70ecDF485E0e4C7bD8665Fc45"),
                lending_pool: address!("0x7B3c02F537f43a3a9DC5A93A4A50f1E68AA9E7F0"),
            },
            fee_tier: 3000,
            referral_code: 0,
        }
    }
}

impl PipelineConfig {
    /// Built-in defaults, overridden by `yieldhop.yaml`, overridden by `YIELDHOP_*` env vars.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Yaml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load() -> eyre::Result<Self> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> eyre::Result<Self> {
        let config: Self = figment
            .extract()
            .wrap_err("failed to read pipeline configuration")?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        ensure!(
            self.input_token.address != self.output_token.address,
            "input and output token must differ, both are {}",
            self.input_token.address
        );
        ensure!(
            FEE_TIERS.contains(&self.fee_tier),
            "unsupported fee tier {}, expected one of {FEE_TIERS:?}",
            self.fee_tier
        );
        for token in [&self.input_token, &self.output_token] {
            ensure!(
                token.decimals <= MAX_DECIMALS,
                "{token} has {} decimals, at most {MAX_DECIMALS} are supported",
                token.decimals
            );
        }

        Ok(())
    }
}

/// Node endpoint and signing key, read from `RPC_URL` and `PRIVATE_KEY`.
#[derive(Clone, Deserialize)]
pub struct Secrets {
    pub rpc_url: String,
    private_key: String,
}

impl Secrets {
    pub fn from_env() -> eyre::Result<Self> {
        Figment::from(Env::raw().only(&["RPC_URL", "PRIVATE_KEY"]))
            .extract()
            .wrap_err("RPC_URL and PRIVATE_KEY must be set")
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &"<redacted>")
            .finish()
    }
}
