//! The relayer wallet signer.
//!
//! The chain wallet exposes a single monotonically increasing seqno that must
//! be consumed exactly once per accepted outgoing message, so every send
//! (swap, burn, refund, callback) funnels through this one component. A
//! single async mutex serializes the read-seqno / submit / wait-for-advance
//! critical section; it is the only in-process synchronization primitive for
//! send ordering.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    AppError, ChainError, SendConfirmation, TonAddress, WalletGateway,
};
use crate::util::{PollSchedule, poll_until, retry_with_backoff};

use super::messages::BodyWriter;
use super::rpc::TonRpcProvider;

/// External message validity window in seconds.
const MESSAGE_TTL_SECS: i64 = 60;

/// Domain tag mixed into the wallet address derivation.
const WALLET_DERIVATION_TAG: &[u8] = b"ton-burn-relayer/wallet-v1";

/// Wallet signer configuration.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// Configured relayer wallet address; must match the derived address
    pub address: TonAddress,
    /// Jetton master contract of the target token
    pub jetton_master: TonAddress,
    /// Gas reserved for callback/refund sends, nanotons
    pub gas_for_callback: i64,
    /// Seqno-advance confirmation wait (default 30 x 1s)
    pub seqno_poll: PollSchedule,
    /// Initialization retry schedule (default 5 attempts, doubling from 1s)
    pub init_retry: PollSchedule,
    /// Seqno fetch / submit retry attempts
    pub submit_retries: u32,
}

impl WalletConfig {
    #[must_use]
    pub fn new(address: TonAddress, jetton_master: TonAddress, gas_for_callback: i64) -> Self {
        Self {
            address,
            jetton_master,
            gas_for_callback,
            seqno_poll: PollSchedule::fixed(30, Duration::from_secs(1)),
            init_retry: PollSchedule::growing(
                5,
                Duration::from_secs(1),
                2.0,
                Duration::from_secs(30),
            ),
            submit_retries: 3,
        }
    }
}

/// The single serialized signer for the relayer wallet.
pub struct WalletSigner {
    provider: Arc<dyn TonRpcProvider>,
    signing_key: SigningKey,
    config: WalletConfig,
    /// Serializes the seqno critical section across all send callers
    send_lock: Mutex<()>,
    /// Latch shared by concurrent initialization waiters
    init: OnceCell<()>,
    /// Cached resolution of the relayer's jetton wallet address
    jetton_wallet: OnceCell<TonAddress>,
}

impl WalletSigner {
    pub fn new(
        provider: Arc<dyn TonRpcProvider>,
        signing_key: SigningKey,
        config: WalletConfig,
    ) -> Self {
        Self {
            provider,
            signing_key,
            config,
            send_lock: Mutex::new(()),
            init: OnceCell::new(),
            jetton_wallet: OnceCell::new(),
        }
    }

    /// Derive the wallet address for a public key: sha256 over a domain tag
    /// and the key bytes, in the base workchain.
    #[must_use]
    pub fn derive_address(signing_key: &SigningKey) -> TonAddress {
        let mut hasher = Sha256::new();
        hasher.update(WALLET_DERIVATION_TAG);
        hasher.update(signing_key.verifying_key().as_bytes());
        TonAddress::new(0, hasher.finalize().into())
    }

    async fn initialize(&self) -> Result<(), AppError> {
        let derived = Self::derive_address(&self.signing_key);
        if derived != self.config.address {
            return Err(AppError::Chain(ChainError::WalletInit(format!(
                "derived address {} does not match configured address {}",
                derived, self.config.address
            ))));
        }

        let balance = self.provider.get_balance(&self.config.address).await?;
        if balance == 0 {
            warn!(address = %self.config.address, "Relayer wallet has zero balance");
        }

        let seqno = self.fetch_seqno().await?;
        info!(
            address = %self.config.address,
            balance = balance,
            seqno = seqno,
            "Relayer wallet initialized"
        );
        Ok(())
    }

    async fn fetch_seqno(&self) -> Result<u32, AppError> {
        let result = self
            .provider
            .run_get_method(&self.config.address, "seqno", vec![])
            .await?;
        let seqno = result.int_at(0).map_err(AppError::Chain)?;
        u32::try_from(seqno)
            .map_err(|_| AppError::Chain(ChainError::Parse(format!("seqno out of range: {seqno}"))))
    }

    /// Seqno fetch with bounded retry on transient errors.
    async fn fetch_seqno_with_retry(&self) -> Result<u32, AppError> {
        let schedule = PollSchedule::growing(
            self.config.submit_retries,
            Duration::from_secs(1),
            2.0,
            Duration::from_secs(10),
        );
        retry_with_backoff(&schedule, || self.fetch_seqno(), AppError::is_transient).await
    }

    /// Build and sign the external wallet message for one transfer.
    fn build_signed_external(
        &self,
        seqno: u32,
        dest: &TonAddress,
        value_nanotons: i64,
        body: &[u8],
    ) -> String {
        let valid_until = (Utc::now().timestamp() + MESSAGE_TTL_SECS) as u64;

        let mut payload = BodyWriter::new(seqno);
        payload.write_u64(valid_until);
        payload.write_address(dest);
        payload.write_u64(value_nanotons as u64);
        payload.write_u32(body.len() as u32);
        payload.write_bytes(body);
        let payload = payload.finish();

        let signature = self.signing_key.sign(&payload);
        let mut message = Vec::with_capacity(64 + payload.len());
        message.extend_from_slice(&signature.to_bytes());
        message.extend_from_slice(&payload);
        BASE64.encode(message)
    }

    /// Submit the message, refreshing the seqno and rebuilding on a seqno
    /// mismatch rejection.
    async fn submit_with_seqno_retry(
        &self,
        mut seqno: u32,
        dest: &TonAddress,
        value_nanotons: i64,
        body: &[u8],
    ) -> Result<u32, AppError> {
        let mut attempt = 0;
        loop {
            let boc = self.build_signed_external(seqno, dest, value_nanotons, body);
            match self.provider.send_message(&boc).await {
                Ok(()) => return Ok(seqno),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.config.submit_retries {
                        return Err(e);
                    }
                    let msg = e.to_string();
                    if msg.contains("exitcode=33") || msg.contains("exit code 33") {
                        warn!(seqno = seqno, "Seqno rejected, refreshing");
                        seqno = self.fetch_seqno_with_retry().await?;
                    } else if !e.is_transient() {
                        return Err(e);
                    }
                    tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                }
            }
        }
    }
}

#[async_trait]
impl WalletGateway for WalletSigner {
    #[instrument(skip(self))]
    async fn ensure_initialized(&self) -> Result<(), AppError> {
        self.init
            .get_or_try_init(|| async {
                retry_with_backoff(
                    &self.config.init_retry,
                    || self.initialize(),
                    |e| !matches!(e, AppError::Chain(ChainError::WalletInit(_))),
                )
                .await
                .map_err(|e| AppError::Chain(ChainError::WalletInit(e.to_string())))
            })
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, body), fields(dest = %dest, value = value_nanotons))]
    async fn send(
        &self,
        dest: &TonAddress,
        value_nanotons: i64,
        body: Vec<u8>,
    ) -> Result<SendConfirmation, AppError> {
        self.ensure_initialized().await?;

        let _guard = self.send_lock.lock().await;

        let balance = self.provider.get_balance(&self.config.address).await?;
        if balance < value_nanotons + self.config.gas_for_callback {
            return Err(AppError::Chain(ChainError::InsufficientFunds));
        }

        let seqno = self.fetch_seqno_with_retry().await?;
        debug!(seqno = seqno, "Submitting external message");

        let used_seqno = self
            .submit_with_seqno_retry(seqno, dest, value_nanotons, &body)
            .await?;

        // The message is accepted once the chain-visible seqno advances past
        // the one we consumed.
        let advanced = poll_until(&self.config.seqno_poll, || async {
            match self.fetch_seqno().await {
                Ok(current) if current > used_seqno => Some(current),
                Ok(_) => None,
                Err(e) => {
                    debug!(error = %e, "Seqno probe failed, will retry");
                    None
                }
            }
        })
        .await;

        match advanced {
            Some(current) => {
                debug!(seqno = used_seqno, current = current, "Send confirmed");
                Ok(SendConfirmation {
                    seqno: used_seqno,
                    confirmed: true,
                })
            }
            None => {
                // Lock is released on return either way; the caller must
                // verify the effect independently (balance diff).
                warn!(
                    seqno = used_seqno,
                    "Seqno did not advance within the bounded wait; send unconfirmed"
                );
                Ok(SendConfirmation {
                    seqno: used_seqno,
                    confirmed: false,
                })
            }
        }
    }

    async fn balance(&self) -> Result<i64, AppError> {
        self.provider.get_balance(&self.config.address).await
    }

    async fn jetton_balance(&self) -> Result<i64, AppError> {
        let jetton_wallet = self.jetton_wallet_address().await?;
        let result = self
            .provider
            .run_get_method(&jetton_wallet, "get_wallet_data", vec![])
            .await?;
        result.int_at(0).map_err(AppError::Chain)
    }

    async fn jetton_wallet_address(&self) -> Result<TonAddress, AppError> {
        self.jetton_wallet
            .get_or_try_init(|| async {
                let owner = serde_json::json!(["addr", self.config.address.to_string()]);
                let result = self
                    .provider
                    .run_get_method(&self.config.jetton_master, "get_wallet_address", vec![owner])
                    .await?;
                let addr = result.address_at(0).map_err(AppError::Chain)?;
                info!(jetton_wallet = %addr, "Resolved relayer jetton wallet");
                Ok(addr)
            })
            .await
            .map(Clone::clone)
    }

    fn address(&self) -> &TonAddress {
        &self.config.address
    }
}

/// Parse the relayer signing key from its hex-encoded 32-byte seed.
pub fn signing_key_from_hex(secret: &SecretString) -> Result<SigningKey, AppError> {
    let bytes = hex::decode(secret.expose_secret().trim())
        .map_err(|e| AppError::Chain(ChainError::WalletInit(format!("invalid key hex: {e}"))))?;
    let seed: [u8; 32] = bytes.try_into().map_err(|_| {
        AppError::Chain(ChainError::WalletInit(
            "signing key must be 32 bytes".to_string(),
        ))
    })?;
    Ok(SigningKey::from_bytes(&seed))
}
