//! STON.fi-style swap venue adapter.
//!
//! Reads the traded pair's reserves from the pool contract and builds
//! ready-to-send swap messages targeting the venue router. The reserve order
//! is resolved by magnitude: the jetton side of the pair is the numerically
//! larger reserve.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, instrument};

use crate::domain::{
    AppError, MessageDescriptor, PoolReserves, SwapError, SwapVenue, TonAddress,
};
use crate::infra::ton::messages::OutboundBody;
use crate::infra::ton::rpc::TonRpcProvider;

/// Venue configuration.
#[derive(Debug, Clone)]
pub struct StonfiVenueConfig {
    /// Router contract that executes swaps
    pub router: TonAddress,
    /// Pool contract of the TON/jetton pair
    pub pool: TonAddress,
    /// Gas forwarded on top of the offered amount, nanotons
    pub forward_gas: i64,
}

impl StonfiVenueConfig {
    #[must_use]
    pub fn new(router: TonAddress, pool: TonAddress) -> Self {
        Self {
            router,
            pool,
            forward_gas: 250_000_000, // 0.25 TON
        }
    }
}

/// Swap venue backed by an on-chain pool contract.
pub struct StonfiVenue {
    provider: Arc<dyn TonRpcProvider>,
    config: StonfiVenueConfig,
}

impl StonfiVenue {
    pub fn new(provider: Arc<dyn TonRpcProvider>, config: StonfiVenueConfig) -> Self {
        Self { provider, config }
    }
}

#[async_trait]
impl SwapVenue for StonfiVenue {
    #[instrument(skip(self))]
    async fn pool_reserves(&self) -> Result<PoolReserves, AppError> {
        let result = self
            .provider
            .run_get_method(&self.config.pool, "get_pool_data", vec![])
            .await?;

        let reserve0 = result.int_at(0).map_err(AppError::Chain)?;
        let reserve1 = result.int_at(1).map_err(AppError::Chain)?;

        if reserve0 <= 0 || reserve1 <= 0 {
            return Err(AppError::Swap(SwapError::ZeroReserves));
        }

        // Jetton units dwarf nanotons for this pair, so the larger reserve is
        // the jetton side.
        let (ton_nanotons, jetton_units) = if reserve0 > reserve1 {
            (reserve1, reserve0)
        } else {
            (reserve0, reserve1)
        };

        debug!(
            ton_reserve = ton_nanotons,
            jetton_reserve = jetton_units,
            "Read pool reserves"
        );
        Ok(PoolReserves {
            ton_nanotons,
            jetton_units,
        })
    }

    #[instrument(skip(self), fields(offer = offer_nanotons, min_ask = min_ask_units))]
    async fn build_swap(
        &self,
        offer_nanotons: i64,
        min_ask_units: i64,
        recipient: &TonAddress,
    ) -> Result<MessageDescriptor, AppError> {
        let body = OutboundBody::Swap {
            query_id: rand::thread_rng().r#gen(),
            offer_nanotons,
            min_ask_units,
            recipient: recipient.clone(),
        }
        .encode();

        Ok(MessageDescriptor {
            to: self.config.router.clone(),
            value_nanotons: offer_nanotons + self.config.forward_gas,
            body,
        })
    }
}
