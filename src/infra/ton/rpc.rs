//! TON JSON-RPC provider.
//!
//! Wraps a toncenter-style JSON-RPC endpoint behind the `TonRpcProvider`
//! trait so the wallet signer, ingestor and swap venue can be tested against
//! in-memory implementations. All HTTP calls go through the shared
//! `RpcRateLimiter`; transient failures are retried with bounded backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{AppError, ChainError, TonAddress};
use crate::util::{PollSchedule, retry_with_backoff};

use super::rate_limit::{RpcRateLimiter, RpcThrottleConfig};

/// Configuration for the RPC client
#[derive(Debug, Clone)]
pub struct TonRpcConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub throttle: RpcThrottleConfig,
}

impl Default for TonRpcConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            throttle: RpcThrottleConfig::default(),
        }
    }
}

/// One transaction as returned by `getTransactions`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawTransaction {
    pub transaction_id: RawTransactionId,
    #[serde(default)]
    pub aborted: bool,
    pub in_msg: Option<RawMessage>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawTransactionId {
    /// Logical time, decimal string per the API
    pub lt: String,
    pub hash: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawMessage {
    pub source: Option<String>,
    pub destination: Option<String>,
    /// Value in nanotons, decimal string per the API
    pub value: Option<String>,
    pub msg_data: Option<RawMessageData>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawMessageData {
    /// Base64-encoded message body
    pub body: Option<String>,
}

/// Result of `runGetMethod`: TVM exit code plus a typed stack.
///
/// Stack entries are `["num", "0x.."]` or `["addr", "wc:hex"]` pairs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GetMethodResult {
    pub exit_code: i32,
    pub stack: Vec<serde_json::Value>,
}

impl GetMethodResult {
    fn entry(&self, idx: usize) -> Result<(&str, &str), ChainError> {
        let entry = self
            .stack
            .get(idx)
            .ok_or_else(|| ChainError::Parse(format!("missing stack entry {}", idx)))?;
        let pair = entry
            .as_array()
            .filter(|a| a.len() == 2)
            .ok_or_else(|| ChainError::Parse(format!("stack entry {} is not a pair", idx)))?;
        match (pair[0].as_str(), pair[1].as_str()) {
            (Some(tag), Some(value)) => Ok((tag, value)),
            _ => Err(ChainError::Parse(format!(
                "stack entry {} has non-string parts",
                idx
            ))),
        }
    }

    /// Parse stack entry `idx` as an integer (`["num", "0x.."]`).
    pub fn int_at(&self, idx: usize) -> Result<i64, ChainError> {
        let (tag, value) = self.entry(idx)?;
        if tag != "num" {
            return Err(ChainError::Parse(format!(
                "stack entry {} is '{}', expected 'num'",
                idx, tag
            )));
        }
        let digits = value.strip_prefix("0x").unwrap_or(value);
        let radix = if digits == value { 10 } else { 16 };
        i64::from_str_radix(digits, radix)
            .map_err(|e| ChainError::Parse(format!("bad stack integer '{}': {}", value, e)))
    }

    /// Parse stack entry `idx` as an address (`["addr", "wc:hex"]`).
    pub fn address_at(&self, idx: usize) -> Result<TonAddress, ChainError> {
        let (tag, value) = self.entry(idx)?;
        if tag != "addr" {
            return Err(ChainError::Parse(format!(
                "stack entry {} is '{}', expected 'addr'",
                idx, tag
            )));
        }
        value.parse()
    }
}

/// Abstract provider for TON RPC interactions to enable testing
#[async_trait]
pub trait TonRpcProvider: Send + Sync {
    /// Recent transactions of `address`, newest first.
    async fn get_transactions(
        &self,
        address: &TonAddress,
        limit: usize,
    ) -> Result<Vec<RawTransaction>, AppError>;

    /// TON balance of `address` in nanotons.
    async fn get_balance(&self, address: &TonAddress) -> Result<i64, AppError>;

    /// Execute a get-method on a contract.
    async fn run_get_method(
        &self,
        address: &TonAddress,
        method: &str,
        stack: Vec<serde_json::Value>,
    ) -> Result<GetMethodResult, AppError>;

    /// Submit a signed external message (base64).
    async fn send_message(&self, boc_base64: &str) -> Result<(), AppError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<T: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    params: T,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// HTTP-based TON RPC provider
pub struct HttpTonRpcProvider {
    http_client: Client,
    rpc_url: String,
    api_key: Option<String>,
    limiter: RpcRateLimiter,
    retry: PollSchedule,
}

impl HttpTonRpcProvider {
    pub fn new(
        rpc_url: &str,
        api_key: Option<String>,
        config: TonRpcConfig,
    ) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Chain(ChainError::Rpc(e.to_string())))?;

        Ok(Self {
            http_client,
            rpc_url: rpc_url.to_string(),
            api_key,
            limiter: RpcRateLimiter::new(&config.throttle),
            retry: PollSchedule::growing(
                config.max_retries,
                config.retry_delay,
                2.0,
                Duration::from_secs(5),
            ),
        })
    }

    pub fn with_defaults(rpc_url: &str, api_key: Option<String>) -> Result<Self, AppError> {
        Self::new(rpc_url, api_key, TonRpcConfig::default())
    }

    async fn send_request_once<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, AppError> {
        let _permit = self.limiter.acquire().await;

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: method.to_string(),
            params,
        };

        let mut builder = self.http_client.post(&self.rpc_url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("X-API-Key", key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Chain(ChainError::Timeout(e.to_string()))
            } else {
                AppError::Chain(ChainError::Transport(e.to_string()))
            }
        })?;

        if response.status().is_server_error() {
            return Err(AppError::Chain(ChainError::Transport(format!(
                "server error: {}",
                response.status()
            ))));
        }

        let rpc_response: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| AppError::Chain(ChainError::Transport(e.to_string())))?;

        if let Some(error) = rpc_response.error {
            if error.message.contains("insufficient") {
                return Err(AppError::Chain(ChainError::InsufficientFunds));
            }
            return Err(AppError::Chain(ChainError::Rpc(format!(
                "{}: {}",
                error.code, error.message
            ))));
        }

        rpc_response
            .result
            .ok_or_else(|| AppError::Chain(ChainError::Rpc("Empty response".to_string())))
    }

    async fn send_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, AppError> {
        retry_with_backoff(
            &self.retry,
            || self.send_request_once(method, params.clone()),
            AppError::is_transient,
        )
        .await
    }
}

#[async_trait]
impl TonRpcProvider for HttpTonRpcProvider {
    #[instrument(skip(self), fields(address = %address))]
    async fn get_transactions(
        &self,
        address: &TonAddress,
        limit: usize,
    ) -> Result<Vec<RawTransaction>, AppError> {
        let params = serde_json::json!({
            "address": address.to_string(),
            "limit": limit,
            "archival": true,
        });
        let transactions: Vec<RawTransaction> =
            self.send_request("getTransactions", params).await?;
        debug!(count = transactions.len(), "Fetched transactions");
        Ok(transactions)
    }

    #[instrument(skip(self), fields(address = %address))]
    async fn get_balance(&self, address: &TonAddress) -> Result<i64, AppError> {
        let params = serde_json::json!({ "address": address.to_string() });
        let balance: String = self.send_request("getAddressBalance", params).await?;
        balance
            .parse()
            .map_err(|e| AppError::Chain(ChainError::Parse(format!("bad balance '{balance}': {e}"))))
    }

    #[instrument(skip(self, stack), fields(address = %address, method = %method))]
    async fn run_get_method(
        &self,
        address: &TonAddress,
        method: &str,
        stack: Vec<serde_json::Value>,
    ) -> Result<GetMethodResult, AppError> {
        let params = serde_json::json!({
            "address": address.to_string(),
            "method": method,
            "stack": stack,
        });
        let result: GetMethodResult = self.send_request("runGetMethod", params).await?;
        if result.exit_code != 0 {
            return Err(AppError::Chain(ChainError::Rpc(format!(
                "get-method '{}' exited with code {}",
                method, result.exit_code
            ))));
        }
        Ok(result)
    }

    #[instrument(skip(self, boc_base64))]
    async fn send_message(&self, boc_base64: &str) -> Result<(), AppError> {
        let params = serde_json::json!({ "boc": boc_base64 });
        let _ack: serde_json::Value = self.send_request("sendBoc", params).await?;
        Ok(())
    }
}
