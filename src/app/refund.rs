//! Refunds of failed payments.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::{AppError, ChainError, TonAddress, WalletGateway};
use crate::infra::ton::messages::OutboundBody;

/// Refund routing configuration.
#[derive(Debug, Clone)]
pub struct RefundConfig {
    /// Subscription contract that forwards refunds to users
    pub subscription_contract: TonAddress,
    /// Gas headroom required on top of the refunded amount, nanotons
    pub gas_for_callback: i64,
}

/// Returns the original payment to the payer after an unrecoverable failure.
pub struct RefundHandler {
    wallet: Arc<dyn WalletGateway>,
    config: RefundConfig,
}

impl RefundHandler {
    pub fn new(wallet: Arc<dyn WalletGateway>, config: RefundConfig) -> Self {
        Self { wallet, config }
    }

    /// Refund exactly `amount_nanotons` (the principal; consumed gas is not
    /// returned). A wallet balance that cannot cover amount + gas is an
    /// error before any send.
    #[instrument(skip(self), fields(user = %user, amount = amount_nanotons))]
    pub async fn refund(&self, user: &TonAddress, amount_nanotons: i64) -> Result<(), AppError> {
        let balance = self.wallet.balance().await?;
        let required = amount_nanotons + self.config.gas_for_callback;
        if balance < required {
            return Err(AppError::Chain(ChainError::RefundShortfall {
                balance,
                required,
            }));
        }

        let body = OutboundBody::RefundUser {
            user: user.clone(),
            amount_nanotons,
        }
        .encode();

        self.wallet
            .send(&self.config.subscription_contract, amount_nanotons, body)
            .await?;

        info!(amount = amount_nanotons, "Refund sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockWallet;

    fn handler(wallet: Arc<MockWallet>) -> RefundHandler {
        RefundHandler::new(
            wallet as _,
            RefundConfig {
                subscription_contract: TonAddress::new(0, [0xEE; 32]),
                gas_for_callback: 10_000_000,
            },
        )
    }

    #[tokio::test]
    async fn test_refund_shortfall_sends_nothing() {
        let wallet = Arc::new(MockWallet::new());
        wallet.set_balance(500);

        let err = handler(Arc::clone(&wallet))
            .refund(&TonAddress::new(0, [1; 32]), 1_000_000_000)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Chain(ChainError::RefundShortfall { .. })
        ));
        assert!(wallet.sends().is_empty());
    }

    #[tokio::test]
    async fn test_refund_sends_exact_principal() {
        let wallet = Arc::new(MockWallet::new());
        wallet.set_balance(2_000_000_000);

        let user = TonAddress::new(0, [1; 32]);
        handler(Arc::clone(&wallet))
            .refund(&user, 1_000_000_000)
            .await
            .unwrap();

        let sends = wallet.sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].value_nanotons, 1_000_000_000);
        assert_eq!(sends[0].dest, TonAddress::new(0, [0xEE; 32]));
        match OutboundBody::decode(&sends[0].body).unwrap() {
            OutboundBody::RefundUser {
                user: u,
                amount_nanotons,
            } => {
                assert_eq!(u, user);
                assert_eq!(amount_nanotons, 1_000_000_000);
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }
}
