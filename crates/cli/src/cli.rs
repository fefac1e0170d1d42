use std::str::FromStr as _;

use clap::Parser;
use color_eyre::eyre;
use rust_decimal::Decimal;
use tracing::info;
use yieldhop_core::{
    chain::EvmChain,
    config::{PipelineConfig, Secrets},
    ledger::Ledger as _,
    pipeline::{Outcome, Pipeline},
};

/// Swap the input token for the output token, then supply the proceeds to the lending pool.
#[derive(Parser, Debug)]
#[command(name = "yieldhop", about)]
pub(crate) struct Cli {
    /// Amount of the input token to swap, in whole units (e.g. 1.5)
    #[arg(default_value = "1", value_parser = parse_amount)]
    amount: Decimal,
}

impl Cli {
    pub(crate) async fn run(self, config: PipelineConfig, secrets: Secrets) -> eyre::Result<Outcome> {
        let chain = EvmChain::from_secrets(&secrets)?;

        info!(
            wallet = %chain.wallet_address(),
            amount = %self.amount,
            input = %config.input_token,
            output = %config.output_token,
            "starting pipeline"
        );

        let pipeline = Pipeline::new(chain, config);
        Ok(pipeline.run(self.amount).await)
    }
}

fn parse_amount(s: &str) -> Result<Decimal, String> {
    let amount = Decimal::from_str(s).map_err(|e| format!("invalid amount {s:?}: {e}"))?;
    if amount <= Decimal::ZERO {
        return Err(format!("amount must be positive, got {amount}"));
    }
    Ok(amount)
}
