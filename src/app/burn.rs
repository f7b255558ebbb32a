//! Jetton burn execution.

use std::sync::Arc;

use rand::Rng;
use tracing::{info, instrument, warn};

use crate::domain::{AppError, ChainError, WalletGateway};
use crate::infra::ton::messages::OutboundBody;

/// Burn execution knobs.
#[derive(Debug, Clone)]
pub struct BurnConfig {
    /// Gas attached to the burn message, nanotons (default 0.1 TON)
    pub burn_gas: i64,
}

impl Default for BurnConfig {
    fn default() -> Self {
        Self {
            burn_gas: 100_000_000,
        }
    }
}

/// Destroys acquired jettons through the relayer's jetton wallet.
pub struct BurnExecutor {
    wallet: Arc<dyn WalletGateway>,
    config: BurnConfig,
}

impl BurnExecutor {
    pub fn new(wallet: Arc<dyn WalletGateway>, config: BurnConfig) -> Self {
        Self { wallet, config }
    }

    /// Burn `jetton_amount` units. Success is the send outcome; the token
    /// contract rejects the message outright if it cannot burn, so no
    /// balance confirmation follows.
    #[instrument(skip(self), fields(amount = jetton_amount, correlation_id = %correlation_id))]
    pub async fn execute(&self, jetton_amount: i64, correlation_id: &str) -> Result<(), AppError> {
        let balance = self.wallet.jetton_balance().await?;
        if balance < jetton_amount {
            return Err(AppError::Chain(ChainError::InsufficientJettons {
                balance,
                required: jetton_amount,
            }));
        }

        let jetton_wallet = self.wallet.jetton_wallet_address().await?;
        let body = OutboundBody::JettonBurn {
            query_id: rand::thread_rng().r#gen(),
            amount: jetton_amount,
            response_destination: self.wallet.address().clone(),
        }
        .encode();

        let confirmation = self
            .wallet
            .send(&jetton_wallet, self.config.burn_gas, body)
            .await?;

        if !confirmation.confirmed {
            warn!(seqno = confirmation.seqno, "Burn send unconfirmed");
        }
        info!(amount = jetton_amount, "Burn message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockWallet;

    #[tokio::test]
    async fn test_burn_requires_jetton_balance() {
        let wallet = MockWallet::new();
        wallet.set_jetton_balance(10);
        let exec = BurnExecutor::new(Arc::new(wallet), BurnConfig::default());

        let err = exec.execute(100, "t1").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Chain(ChainError::InsufficientJettons { .. })
        ));
    }

    #[tokio::test]
    async fn test_burn_sends_to_jetton_wallet() {
        let wallet = MockWallet::new();
        wallet.set_jetton_balance(1_000);
        let wallet = Arc::new(wallet);
        let exec = BurnExecutor::new(Arc::clone(&wallet) as _, BurnConfig::default());

        exec.execute(500, "t2").await.unwrap();

        let sends = wallet.sends();
        assert_eq!(sends.len(), 1);
        match OutboundBody::decode(&sends[0].body).unwrap() {
            OutboundBody::JettonBurn {
                amount,
                response_destination,
                ..
            } => {
                assert_eq!(amount, 500);
                assert_eq!(&response_destination, wallet.address());
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }
}
