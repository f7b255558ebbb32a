//! Swap execution: TON in, jettons out.
//!
//! The realized amount is always the measured jetton balance diff, never the
//! expected output computed from reserves. The expected output only feeds
//! the slippage-tolerance floor passed to the venue.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::domain::{AppError, SwapError, SwapVenue, WalletGateway};
use crate::util::{PollSchedule, poll_until};

/// Swap preconditions and polling knobs.
#[derive(Debug, Clone)]
pub struct SwapConfig {
    /// Absolute minimum swap input, nanotons (default 0.001 TON)
    pub min_swap_nanotons: i64,
    /// Absolute maximum swap input, nanotons (default 1000 TON)
    pub max_swap_nanotons: i64,
    /// Maximum share of the pool's TON reserve one swap may consume, percent
    pub max_pool_fraction_pct: i64,
    /// Slippage tolerance applied to the expected output, percent
    pub slippage_pct: i64,
    /// Balance-diff polling schedule after the swap message is sent
    pub balance_poll: PollSchedule,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            min_swap_nanotons: 1_000_000,
            max_swap_nanotons: 1_000_000_000_000,
            max_pool_fraction_pct: 10,
            slippage_pct: 5,
            balance_poll: PollSchedule::growing(
                5,
                Duration::from_secs(2),
                1.6,
                Duration::from_secs(15),
            ),
        }
    }
}

/// Executes swaps through the venue and the wallet signer.
pub struct SwapExecutor {
    venue: Arc<dyn SwapVenue>,
    wallet: Arc<dyn WalletGateway>,
    config: SwapConfig,
}

impl SwapExecutor {
    pub fn new(
        venue: Arc<dyn SwapVenue>,
        wallet: Arc<dyn WalletGateway>,
        config: SwapConfig,
    ) -> Self {
        Self {
            venue,
            wallet,
            config,
        }
    }

    /// Swap `offer_nanotons` of TON into jettons, returning the realized
    /// jetton amount. An error after the send means the paid-in TON is still
    /// outstanding and the caller must route to refund.
    #[instrument(skip(self), fields(offer = offer_nanotons, correlation_id = %correlation_id))]
    pub async fn execute(
        &self,
        offer_nanotons: i64,
        correlation_id: &str,
    ) -> Result<i64, AppError> {
        // Liquidity preconditions are rejections, not retries.
        if offer_nanotons < self.config.min_swap_nanotons
            || offer_nanotons > self.config.max_swap_nanotons
        {
            return Err(AppError::Swap(SwapError::OutOfRange {
                amount: offer_nanotons,
                min: self.config.min_swap_nanotons,
                max: self.config.max_swap_nanotons,
            }));
        }

        let reserves = self.venue.pool_reserves().await?;
        let cap = reserves.ton_nanotons * self.config.max_pool_fraction_pct / 100;
        if offer_nanotons > cap {
            return Err(AppError::Swap(SwapError::ExceedsReserve {
                amount: offer_nanotons,
                cap,
            }));
        }

        let expected = expected_output(
            offer_nanotons,
            reserves.ton_nanotons,
            reserves.jetton_units,
        );
        if expected == 0 {
            return Err(AppError::Swap(SwapError::ZeroExpectedOutput));
        }
        let min_ask = expected * (100 - self.config.slippage_pct) / 100;

        let balance_before = self.wallet.jetton_balance().await?;

        let message = self
            .venue
            .build_swap(offer_nanotons, min_ask, self.wallet.address())
            .await?;
        let confirmation = self
            .wallet
            .send(&message.to, message.value_nanotons, message.body)
            .await?;

        if !confirmation.confirmed {
            // The balance diff below is the source of truth, not the
            // confirmation wait.
            warn!(
                seqno = confirmation.seqno,
                "Swap send unconfirmed; falling back to balance diff"
            );
        }

        let realized = poll_until(&self.config.balance_poll, || async {
            match self.wallet.jetton_balance().await {
                Ok(after) if after > balance_before => Some(after - balance_before),
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "Jetton balance probe failed");
                    None
                }
            }
        })
        .await;

        match realized {
            Some(amount) => {
                info!(
                    expected = expected,
                    realized = amount,
                    "Swap completed"
                );
                Ok(amount)
            }
            // An unconfirmed send with no balance increase may still land
            // later; it is failed here and left to operator reconciliation.
            None if !confirmation.confirmed => Err(AppError::Chain(
                crate::domain::ChainError::ConfirmationTimeout(
                    "swap unconfirmed and no jetton balance increase observed".to_string(),
                ),
            )),
            None => Err(AppError::Swap(SwapError::NoBalanceIncrease)),
        }
    }
}

/// Constant-product expected output for `offer` against the reserves.
fn expected_output(offer: i64, ton_reserve: i64, jetton_reserve: i64) -> i64 {
    let numerator = offer as i128 * jetton_reserve as i128;
    let denominator = ton_reserve as i128 + offer as i128;
    (numerator / denominator) as i64
}
