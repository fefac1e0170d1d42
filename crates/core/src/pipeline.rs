//! Swap-then-supply pipeline.
//!
//! A run walks a fixed sequence of stages, each awaiting its on-chain
//! confirmation before the next starts:
//!
//! ```text
//! Idle -> ApprovingSwap -> ResolvingPool -> Swapping -> ReadingBalance
//!      -> ApprovingSupply -> Supplying -> Done
//! ```
//!
//! A failure before `Supplying` ends the run in `Failed`. A failure while
//! supplying is logged and the run still ends in `Done`, leaving the swapped
//! tokens in the wallet. Nothing is retried and nothing is rolled back.
use std::fmt::{self, Display};

use alloy::primitives::U256;
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

use crate::{
    config::PipelineConfig,
    ledger::{Ledger, TxReceipt},
    steps::{
        StepError, approval, balance,
        pool::{self, PoolDescriptor},
        supply,
        swap::{self, SwapParameters},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    ApprovingSwap,
    ResolvingPool,
    Swapping,
    ReadingBalance,
    ApprovingSupply,
    Supplying,
    Done,
    Failed,
}

impl Stage {
    /// Stage entered once the current one succeeded.
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::ApprovingSwap,
            Self::ApprovingSwap => Self::ResolvingPool,
            Self::ResolvingPool => Self::Swapping,
            Self::Swapping => Self::ReadingBalance,
            Self::ReadingBalance => Self::ApprovingSupply,
            Self::ApprovingSupply => Self::Supplying,
            Self::Supplying | Self::Done => Self::Done,
            Self::Failed => Self::Failed,
        }
    }

    /// Stage entered once the current one failed with `error`.
    pub fn on_error(self, error: &StepError) -> Self {
        match self {
            Self::Done | Self::Failed => self,
            _ if error.is_fatal() => Self::Failed,
            _ => self.next(),
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ApprovingSwap => "approving(swap)",
            Self::ResolvingPool => "resolving-pool",
            Self::Swapping => "swapping",
            Self::ReadingBalance => "reading-balance",
            Self::ApprovingSupply => "approving(supply)",
            Self::Supplying => "supplying",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a completed run did. The deposit may still have failed.
#[derive(Debug)]
pub struct RunSummary {
    pub pool: PoolDescriptor,
    pub swap: TxReceipt,
    /// Output token balance after the swap, in base units
    pub output_balance: U256,
    pub supply: Result<TxReceipt, StepError>,
}

#[derive(Debug)]
pub enum Outcome {
    Done(RunSummary),
    Failed {
        /// Stage that failed
        stage: Stage,
        error: StepError,
    },
}

impl Outcome {
    /// Terminal stage of the run.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Done(_) => Stage::Done,
            Self::Failed { .. } => Stage::Failed,
        }
    }
}

/// Runs swap-then-supply cycles against one [`Ledger`].
///
/// Runs share the wallet's nonce sequence, so only one may be in flight at a
/// time.
#[derive(Debug)]
pub struct Pipeline<L> {
    ledger: L,
    config: PipelineConfig,
}

impl<L: Ledger> Pipeline<L> {
    pub fn new(ledger: L, config: PipelineConfig) -> Self {
        Self { ledger, config }
    }

    /// Swaps `amount` of the input token and supplies everything received.
    ///
    /// Every call is an independent cycle, nothing is cached between runs.
    #[instrument(
        name = "pipeline",
        skip(self),
        fields(
            input = %self.config.input_token.symbol,
            output = %self.config.output_token.symbol,
        )
    )]
    pub async fn run(&self, amount: Decimal) -> Outcome {
        let mut stage = Stage::Idle;

        match self.drive(amount, &mut stage).await {
            Ok(summary) => {
                info!(
                    swap_tx = %summary.swap.hash,
                    supplied = summary.supply.is_ok(),
                    "pipeline completed"
                );
                Outcome::Done(summary)
            }
            Err(error) => {
                let terminal = stage.on_error(&error);
                error!(%stage, to = %terminal, %error, "pipeline aborted");
                Outcome::Failed { stage, error }
            }
        }
    }

    async fn drive(&self, amount: Decimal, stage: &mut Stage) -> Result<RunSummary, StepError> {
        let PipelineConfig {
            input_token,
            output_token,
            contracts,
            fee_tier,
            referral_code,
        } = &self.config;
        let wallet = self.ledger.wallet_address();

        advance(stage);
        let amount_in = approval::approve(&self.ledger, input_token, contracts.router, amount)
            .await?
            .amount;

        advance(stage);
        let pool = pool::resolve_pool(
            &self.ledger,
            contracts.factory,
            input_token,
            output_token,
            *fee_tier,
        )
        .await?;

        advance(stage);
        let params = SwapParameters::exact_input(&pool, input_token, output_token, wallet, amount_in);
        let swap = swap::execute_swap(&self.ledger, contracts.router, params).await?;

        advance(stage);
        let output_balance = balance::read_balance(&self.ledger, output_token, wallet).await?;
        if output_balance.is_zero() {
            warn!("no {} received from the swap", output_token.symbol);
        }

        advance(stage);
        approval::approve_base_units(
            &self.ledger,
            output_token,
            contracts.lending_pool,
            output_balance,
        )
        .await?;

        advance(stage);
        let supply = supply::supply(
            &self.ledger,
            contracts.lending_pool,
            output_token,
            output_balance,
            wallet,
            *referral_code,
        )
        .await;

        match &supply {
            Ok(_) => advance(stage),
            Err(error) => {
                let next = stage.on_error(error);
                error!(
                    %stage,
                    to = %next,
                    %error,
                    unsupplied = %output_token.format_base_units(output_balance),
                    "supply failed, {} stays in the wallet", output_token.symbol
                );
                *stage = next;
            }
        }

        Ok(RunSummary {
            pool,
            swap,
            output_balance,
            supply,
        })
    }
}

fn advance(stage: &mut Stage) {
    let next = stage.next();
    info!(from = %stage, to = %next, "stage transition");
    *stage = next;
}

#[cfg(test)]
mod tests {
    use std::{
        str::FromStr as _,
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
    };

    use alloy::primitives::{Address, aliases::U160};
    use color_eyre::eyre::eyre;
    use mockall::Sequence;

    use super::*;
    use crate::{
        ledger::MockLedger,
        test_fixtures::{POOL, WALLET, config, link, ok_receipt, tx, usdc},
    };

    const RECEIVED: u64 = 4_321_000_000_000_000;

    fn ledger_with_wallet() -> MockLedger {
        let mut ledger = MockLedger::new();
        ledger.expect_wallet_address().return_const(WALLET);
        ledger
    }

    /// Expectations for a run that succeeds up to and including the supply approval.
    fn expect_through_supply_approval(ledger: &mut MockLedger, received: U256) {
        let (usdc_addr, link_addr) = (usdc().address, link().address);
        let lending_pool = config().contracts.lending_pool;

        ledger
            .expect_approve()
            .withf(move |t, _, _| *t == usdc_addr)
            .returning(|_, _, _| Ok(ok_receipt(1)));
        ledger
            .expect_get_pool()
            .returning(|_, _, _, _| Ok(POOL));
        ledger
            .expect_pool_metadata()
            .returning(move |_| Ok((link_addr, usdc_addr, 3000)));
        ledger
            .expect_exact_input_single()
            .returning(|_, _| Ok(ok_receipt(2)));
        ledger
            .expect_balance_of()
            .returning(move |_, _| Ok(received));
        ledger
            .expect_approve()
            .withf(move |t, s, _| *t == link_addr && *s == lending_pool)
            .returning(|_, _, _| Ok(ok_receipt(3)));
    }

    #[test]
    fn happy_path_transitions() {
        let mut stage = Stage::Idle;
        let mut seen = vec![stage];
        while stage != Stage::Done {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(stage.next(), Stage::Done);

        assert_eq!(
            seen,
            vec![
                Stage::Idle,
                Stage::ApprovingSwap,
                Stage::ResolvingPool,
                Stage::Swapping,
                Stage::ReadingBalance,
                Stage::ApprovingSupply,
                Stage::Supplying,
                Stage::Done,
            ]
        );
    }

    #[test]
    fn failure_transitions() {
        let fatal = StepError::Query {
            reason: eyre!("boom"),
        };
        for stage in [
            Stage::ApprovingSwap,
            Stage::ResolvingPool,
            Stage::Swapping,
            Stage::ReadingBalance,
            Stage::ApprovingSupply,
        ] {
            assert_eq!(stage.on_error(&fatal), Stage::Failed, "{stage}");
        }

        let supply = StepError::Supply {
            lending_pool: Address::ZERO,
            amount: U256::from(1u8),
            reason: eyre!("reverted"),
        };
        assert_eq!(Stage::Supplying.on_error(&supply), Stage::Done);
        assert_eq!(Stage::Done.on_error(&fatal), Stage::Done);
        assert_eq!(Stage::Failed.on_error(&supply), Stage::Failed);
    }

    #[test]
    fn stage_table_follows_error_severity() {
        let errors = [
            StepError::Approval {
                token: Address::ZERO,
                spender: Address::ZERO,
                reason: eyre!("nonce too low"),
            },
            StepError::PoolNotFound {
                token_a: Address::ZERO,
                token_b: Address::ZERO,
                fee: 500,
            },
            StepError::SwapExecution {
                router: Address::ZERO,
                reason: eyre!("STF"),
            },
            StepError::Query {
                reason: eyre!("header not found"),
            },
            StepError::Supply {
                lending_pool: Address::ZERO,
                amount: U256::ZERO,
                reason: eyre!("INVALID_AMOUNT"),
            },
        ];

        for error in &errors {
            let expected = if error.is_fatal() {
                Stage::Failed
            } else {
                Stage::Done
            };
            assert_eq!(Stage::Supplying.on_error(error), expected, "{error}");
        }
    }

    #[tokio::test]
    async fn one_usdc_end_to_end() {
        let cfg = config();
        let (usdc_addr, link_addr) = (usdc().address, link().address);
        let (router, factory, lending_pool) = (
            cfg.contracts.router,
            cfg.contracts.factory,
            cfg.contracts.lending_pool,
        );
        let received = U256::from(RECEIVED);

        let mut seq = Sequence::new();
        let mut ledger = ledger_with_wallet();
        ledger
            .expect_approve()
            .withf(move |t, s, a| {
                *t == usdc_addr && *s == router && *a == U256::from(1_000_000u64)
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(ok_receipt(1)));
        ledger
            .expect_get_pool()
            .withf(move |f, a, b, fee| {
                *f == factory && *a == usdc_addr && *b == link_addr && *fee == 3000
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(POOL));
        ledger
            .expect_pool_metadata()
            .withf(|p| *p == POOL)
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok((link_addr, usdc_addr, 3000)));
        ledger
            .expect_exact_input_single()
            .withf(move |r, p| {
                *r == router
                    && p.token_in == usdc_addr
                    && p.token_out == link_addr
                    && p.fee == 3000
                    && p.recipient == WALLET
                    && p.amount_in == U256::from(1_000_000u64)
                    && p.amount_out_minimum.is_zero()
                    && p.price_limit == U160::ZERO
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ok_receipt(2)));
        ledger
            .expect_balance_of()
            .withf(move |t, o| *t == link_addr && *o == WALLET)
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _| Ok(received));
        ledger
            .expect_approve()
            .withf(move |t, s, a| *t == link_addr && *s == lending_pool && *a == received)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(ok_receipt(3)));
        ledger
            .expect_supply()
            .withf(move |p, a, amt, o, r| {
                *p == lending_pool && *a == link_addr && *amt == received && *o == WALLET && *r == 0
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _, _| Ok(ok_receipt(4)));

        let pipeline = Pipeline::new(ledger, cfg);
        let outcome = pipeline.run(Decimal::ONE).await;

        assert_eq!(outcome.stage(), Stage::Done);
        let Outcome::Done(summary) = outcome else {
            panic!("expected a completed run");
        };
        assert_eq!(summary.pool.address, POOL);
        assert_eq!(summary.swap.hash, tx(2));
        assert_eq!(summary.output_balance, received);
        assert_eq!(summary.supply.unwrap().hash, tx(4));
    }

    #[tokio::test]
    async fn swaps_exactly_the_approved_amount() {
        let (usdc_addr, link_addr) = (usdc().address, link().address);

        let mut ledger = ledger_with_wallet();
        ledger
            .expect_approve()
            .withf(move |t, _, a| *t == usdc_addr && *a == U256::from(1_234_567u64))
            .times(1)
            .returning(|_, _, _| Ok(ok_receipt(1)));
        ledger
            .expect_get_pool()
            .returning(|_, _, _, _| Ok(POOL));
        ledger
            .expect_pool_metadata()
            .returning(move |_| Ok((link_addr, usdc_addr, 3000)));
        ledger
            .expect_exact_input_single()
            .withf(|_, p| p.amount_in == U256::from(1_234_567u64))
            .times(1)
            .returning(|_, _| Ok(TxReceipt::reverted(tx(2))));

        let outcome = Pipeline::new(ledger, config())
            .run(Decimal::from_str("1.23456789").unwrap())
            .await;
        assert_eq!(outcome.stage(), Stage::Failed);
    }

    #[tokio::test]
    async fn failed_swap_approval_never_swaps() {
        let mut ledger = ledger_with_wallet();
        ledger
            .expect_approve()
            .times(1)
            .returning(|_, _, _| Err(eyre!("nonce too low")));
        ledger.expect_get_pool().never();
        ledger.expect_pool_metadata().never();
        ledger.expect_exact_input_single().never();
        ledger.expect_balance_of().never();
        ledger.expect_supply().never();

        let outcome = Pipeline::new(ledger, config()).run(Decimal::ONE).await;

        match outcome {
            Outcome::Failed {
                stage: Stage::ApprovingSwap,
                error: StepError::Approval { .. },
            } => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn reverted_swap_approval_never_swaps() {
        let mut ledger = ledger_with_wallet();
        ledger
            .expect_approve()
            .times(1)
            .returning(|_, _, _| Ok(TxReceipt::reverted(tx(1))));
        ledger.expect_get_pool().never();
        ledger.expect_exact_input_single().never();

        let outcome = Pipeline::new(ledger, config()).run(Decimal::ONE).await;
        assert_eq!(outcome.stage(), Stage::Failed);
    }

    #[tokio::test]
    async fn missing_pool_aborts_before_swap() {
        let mut ledger = ledger_with_wallet();
        ledger
            .expect_approve()
            .times(1)
            .returning(|_, _, _| Ok(ok_receipt(1)));
        ledger
            .expect_get_pool()
            .times(1)
            .returning(|_, _, _, _| Ok(Address::ZERO));
        ledger.expect_pool_metadata().never();
        ledger.expect_exact_input_single().never();
        ledger.expect_balance_of().never();
        ledger.expect_supply().never();

        let outcome = Pipeline::new(ledger, config()).run(Decimal::ONE).await;

        match outcome {
            Outcome::Failed {
                stage: Stage::ResolvingPool,
                error: StepError::PoolNotFound { fee: 3000, .. },
            } => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_swap_stops_before_balance_read() {
        let mut ledger = ledger_with_wallet();
        ledger
            .expect_approve()
            .times(1)
            .returning(|_, _, _| Ok(ok_receipt(1)));
        ledger
            .expect_get_pool()
            .returning(|_, _, _, _| Ok(POOL));
        ledger
            .expect_pool_metadata()
            .returning(|_| Ok((link().address, usdc().address, 3000)));
        ledger
            .expect_exact_input_single()
            .times(1)
            .returning(|_, _| Ok(TxReceipt::reverted(tx(2))));
        ledger.expect_balance_of().never();
        ledger.expect_supply().never();

        let outcome = Pipeline::new(ledger, config()).run(Decimal::ONE).await;

        match outcome {
            Outcome::Failed {
                stage: Stage::Swapping,
                error: StepError::SwapExecution { .. },
            } => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_balance_read_aborts() {
        let mut ledger = ledger_with_wallet();
        ledger
            .expect_approve()
            .times(1)
            .returning(|_, _, _| Ok(ok_receipt(1)));
        ledger
            .expect_get_pool()
            .returning(|_, _, _, _| Ok(POOL));
        ledger
            .expect_pool_metadata()
            .returning(|_| Ok((link().address, usdc().address, 3000)));
        ledger
            .expect_exact_input_single()
            .returning(|_, _| Ok(ok_receipt(2)));
        ledger
            .expect_balance_of()
            .times(1)
            .returning(|_, _| Err(eyre!("header not found")));
        ledger.expect_supply().never();

        let outcome = Pipeline::new(ledger, config()).run(Decimal::ONE).await;

        match outcome {
            Outcome::Failed {
                stage: Stage::ReadingBalance,
                error: StepError::Query { .. },
            } => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_supply_approval_aborts() {
        let (usdc_addr, link_addr) = (usdc().address, link().address);

        let mut ledger = ledger_with_wallet();
        ledger
            .expect_approve()
            .withf(move |t, _, _| *t == usdc_addr)
            .returning(|_, _, _| Ok(ok_receipt(1)));
        ledger
            .expect_get_pool()
            .returning(|_, _, _, _| Ok(POOL));
        ledger
            .expect_pool_metadata()
            .returning(move |_| Ok((link_addr, usdc_addr, 3000)));
        ledger
            .expect_exact_input_single()
            .returning(|_, _| Ok(ok_receipt(2)));
        ledger
            .expect_balance_of()
            .returning(|_, _| Ok(U256::from(RECEIVED)));
        ledger
            .expect_approve()
            .withf(move |t, _, _| *t == link_addr)
            .times(1)
            .returning(|_, _, _| Err(eyre!("replacement transaction underpriced")));
        ledger.expect_supply().never();

        let outcome = Pipeline::new(ledger, config()).run(Decimal::ONE).await;

        match outcome {
            Outcome::Failed {
                stage: Stage::ApprovingSupply,
                error: StepError::Approval { .. },
            } => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_supply_still_completes() {
        let mut ledger = ledger_with_wallet();
        expect_through_supply_approval(&mut ledger, U256::from(RECEIVED));
        ledger
            .expect_supply()
            .times(1)
            .returning(|_, _, _, _, _| Err(eyre!("execution reverted")));

        let outcome = Pipeline::new(ledger, config()).run(Decimal::ONE).await;

        assert_eq!(outcome.stage(), Stage::Done);
        let Outcome::Done(summary) = outcome else {
            panic!("expected a completed run");
        };
        assert_eq!(summary.output_balance, U256::from(RECEIVED));
        assert!(matches!(summary.supply, Err(StepError::Supply { .. })));
    }

    #[tokio::test]
    async fn reverted_supply_still_completes() {
        let mut ledger = ledger_with_wallet();
        expect_through_supply_approval(&mut ledger, U256::from(RECEIVED));
        ledger
            .expect_supply()
            .times(1)
            .returning(|_, _, _, _, _| Ok(TxReceipt::reverted(tx(4))));

        let outcome = Pipeline::new(ledger, config()).run(Decimal::ONE).await;
        assert_eq!(outcome.stage(), Stage::Done);
    }

    #[tokio::test]
    async fn zero_output_is_still_approved_and_supplied() {
        let mut ledger = ledger_with_wallet();
        expect_through_supply_approval(&mut ledger, U256::ZERO);
        ledger
            .expect_supply()
            .withf(|_, _, amt, _, _| amt.is_zero())
            .times(1)
            .returning(|_, _, _, _, _| Err(eyre!("INVALID_AMOUNT")));

        let outcome = Pipeline::new(ledger, config()).run(Decimal::ONE).await;
        assert_eq!(outcome.stage(), Stage::Done);
    }

    #[tokio::test]
    async fn each_run_is_a_fresh_cycle() {
        let (usdc_addr, link_addr) = (usdc().address, link().address);
        let reads = Arc::new(AtomicU64::new(0));
        let balances = reads.clone();

        let mut ledger = ledger_with_wallet();
        ledger
            .expect_approve()
            .withf(move |t, _, a| *t == usdc_addr && *a == U256::from(2_000_000u64))
            .times(2)
            .returning(|_, _, _| Ok(ok_receipt(1)));
        ledger
            .expect_get_pool()
            .times(2)
            .returning(|_, _, _, _| Ok(POOL));
        ledger
            .expect_pool_metadata()
            .times(2)
            .returning(move |_| Ok((link_addr, usdc_addr, 3000)));
        ledger
            .expect_exact_input_single()
            .times(2)
            .returning(|_, _| Ok(ok_receipt(2)));
        // the wallet holds more after every swap
        ledger
            .expect_balance_of()
            .times(2)
            .returning(move |_, _| {
                let n = balances.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(U256::from(n * 1_000))
            });
        ledger
            .expect_approve()
            .withf(move |t, _, _| *t == link_addr)
            .times(2)
            .returning(|_, _, _| Ok(ok_receipt(3)));
        ledger
            .expect_supply()
            .times(2)
            .returning(|_, _, _, _, _| Ok(ok_receipt(4)));

        let pipeline = Pipeline::new(ledger, config());
        let amount = Decimal::from_str("2").unwrap();

        let first = pipeline.run(amount).await;
        let second = pipeline.run(amount).await;

        let (Outcome::Done(first), Outcome::Done(second)) = (first, second) else {
            panic!("both runs should complete");
        };
        assert_eq!(first.output_balance, U256::from(1_000u64));
        assert_eq!(second.output_balance, U256::from(2_000u64));
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }
}
