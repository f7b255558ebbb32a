//! Domain types with validation support.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::error::ChainError;

/// Processing status of a relayed transaction.
///
/// Status only ever advances forward; `Completed`, `Failed` and `Refunded`
/// are terminal and records in those states are immutable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Record created, not yet claimed by a processing run
    #[default]
    Pending,
    /// Claimed by a processing run
    Processing,
    /// Swap and burn succeeded, callback attempted
    Completed,
    /// Unrecoverable failure (no refund was possible)
    Failed,
    /// Swap or burn failed but the original amount was returned to the payer
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    /// Terminal states never transition again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Refunded)
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A TON account address: workchain plus 256-bit account hash.
///
/// Parsed from and displayed in the raw `workchain:hex` form. The wire form
/// used in message bodies is the workchain byte followed by the 32-byte hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TonAddress {
    pub workchain: i8,
    pub hash: [u8; 32],
}

impl TonAddress {
    #[must_use]
    pub fn new(workchain: i8, hash: [u8; 32]) -> Self {
        Self { workchain, hash }
    }

    /// Wire encoding: workchain byte + 32-byte account hash.
    #[must_use]
    pub fn to_wire(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out[0] = self.workchain as u8;
        out[1..].copy_from_slice(&self.hash);
        out
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self, ChainError> {
        if bytes.len() != 33 {
            return Err(ChainError::InvalidAddress(format!(
                "expected 33 wire bytes, got {}",
                bytes.len()
            )));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[1..]);
        Ok(Self {
            workchain: bytes[0] as i8,
            hash,
        })
    }
}

impl FromStr for TonAddress {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (wc, hash_hex) = s
            .split_once(':')
            .ok_or_else(|| ChainError::InvalidAddress(format!("missing workchain: {}", s)))?;
        let workchain: i8 = wc
            .parse()
            .map_err(|_| ChainError::InvalidAddress(format!("bad workchain: {}", s)))?;
        let bytes = hex::decode(hash_hex)
            .map_err(|_| ChainError::InvalidAddress(format!("bad account hash: {}", s)))?;
        if bytes.len() != 32 {
            return Err(ChainError::InvalidAddress(format!(
                "account hash must be 32 bytes: {}",
                s
            )));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(Self { workchain, hash })
    }
}

impl std::fmt::Display for TonAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.workchain, hex::encode(self.hash))
    }
}

impl Serialize for TonAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TonAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The unit of work: one incoming payment tracked through the pipeline.
///
/// `(lt, hash)` is chain-unique and is the deduplication key. Records are
/// never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TransactionRecord {
    /// Unique record identifier
    pub id: Uuid,
    /// Chain-assigned logical time of the incoming transaction
    pub lt: i64,
    /// Incoming transaction hash
    #[schema(example = "te6ccgEBAQEAAgAAAA==")]
    pub hash: String,
    /// User who paid for the subscription
    pub user_address: String,
    /// Source of the payment (subscription contract)
    pub from_address: String,
    /// Relayer wallet address
    pub to_address: String,
    /// Received value in nanotons
    pub amount_nanotons: i64,
    /// Realized jetton amount from the swap (balance diff), set after swap
    pub jetton_amount: Option<i64>,
    /// Processing status
    pub status: TransactionStatus,
    /// Error message for failure paths
    pub error_message: Option<String>,
    /// Retry attempts on the unexpected-error path
    pub retry_count: i32,
    /// When processing reached a terminal state
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A parsed incoming transfer observed on chain, before admission.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTransaction {
    pub lt: i64,
    pub hash: String,
    pub from_address: String,
    pub to_address: String,
    pub value_nanotons: i64,
    /// Payer to credit; parsed from the message body when present, otherwise
    /// the source address
    pub user_address: String,
    /// Raw message body, if any
    pub body: Option<Vec<u8>>,
}

/// Request to process a known subscription payment synchronously.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    /// User who paid for the subscription
    #[validate(length(min = 1, message = "User address is required"))]
    #[schema(example = "0:3333333333333333333333333333333333333333333333333333333333333333")]
    pub user_address: String,
    /// Logical time of the payment transaction
    pub lt: i64,
    /// Payment transaction hash
    #[validate(length(min = 1, message = "Transaction hash is required"))]
    pub tx_hash: String,
    /// Received value in nanotons
    #[validate(range(min = 1, message = "Amount must be greater than 0"))]
    #[schema(example = 1000000000)]
    pub amount_nanotons: i64,
    /// Subscription contract that forwarded the payment
    #[validate(length(min = 1, message = "Subscription contract address is required"))]
    pub subscription_contract_address: String,
}

/// Outcome of a synchronous payment processing call.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentResponse {
    pub success: bool,
    pub tx_id: String,
    pub message: String,
}

/// Payload delivered to the backend webhook after each processed payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SwapResultNotification {
    pub user_address: String,
    pub success: bool,
    pub tx_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jetton_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of submitting an outgoing message through the wallet.
///
/// `confirmed == false` means the seqno wait timed out: the message may still
/// land and the caller must verify the effect independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendConfirmation {
    pub seqno: u32,
    pub confirmed: bool,
}

/// Reserves of the traded pair at the swap venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReserves {
    pub ton_nanotons: i64,
    pub jetton_units: i64,
}

/// A ready-to-send outgoing message built by the swap venue.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDescriptor {
    pub to: TonAddress,
    pub value_nanotons: i64,
    pub body: Vec<u8>,
}

/// Point-in-time metrics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RelayerMetrics {
    pub total_transactions: u64,
    pub successful_transactions: u64,
    pub failed_transactions: u64,
    pub total_jettons_burned: i64,
    pub total_ton_swapped: i64,
    /// Rolling exponential average of per-record processing time
    pub average_processing_ms: f64,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub wallet_balance_nanotons: i64,
    pub uptime_secs: u64,
}

/// Health verdict plus the metrics it was derived from.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthReport {
    pub healthy: bool,
    pub issues: Vec<String>,
    pub metrics: RelayerMetrics,
}

/// Error response structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Error type identifier
    #[schema(example = "validation_error")]
    pub r#type: String,
    /// Human-readable error message
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_status_display_and_parsing() {
        let statuses = vec![
            (TransactionStatus::Pending, "pending"),
            (TransactionStatus::Processing, "processing"),
            (TransactionStatus::Completed, "completed"),
            (TransactionStatus::Failed, "failed"),
            (TransactionStatus::Refunded, "refunded"),
        ];

        for (status, string) in statuses {
            assert_eq!(status.as_str(), string);
            assert_eq!(status.to_string(), string);
            assert_eq!(TransactionStatus::from_str(string).unwrap(), status);
        }

        assert!(TransactionStatus::from_str("invalid").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(!TransactionStatus::Processing.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Refunded.is_terminal());
    }

    #[test]
    fn test_ton_address_roundtrip() {
        let raw = "0:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let addr: TonAddress = raw.parse().unwrap();
        assert_eq!(addr.workchain, 0);
        assert_eq!(addr.to_string(), raw);

        let wire = addr.to_wire();
        assert_eq!(TonAddress::from_wire(&wire).unwrap(), addr);
    }

    #[test]
    fn test_ton_address_masterchain() {
        let addr: TonAddress =
            "-1:bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
                .parse()
                .unwrap();
        assert_eq!(addr.workchain, -1);
        let wire = addr.to_wire();
        assert_eq!(TonAddress::from_wire(&wire).unwrap().workchain, -1);
    }

    #[test]
    fn test_ton_address_rejects_malformed() {
        assert!("nocolon".parse::<TonAddress>().is_err());
        assert!("0:tooshort".parse::<TonAddress>().is_err());
        assert!(
            "x:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
                .parse::<TonAddress>()
                .is_err()
        );
    }

    #[test]
    fn test_process_payment_request_validation() {
        let valid = ProcessPaymentRequest {
            user_address: "0:aa".to_string(),
            lt: 1,
            tx_hash: "hash".to_string(),
            amount_nanotons: 1_000_000_000,
            subscription_contract_address: "0:bb".to_string(),
        };
        assert!(valid.validate().is_ok());

        let mut invalid = valid.clone();
        invalid.user_address = String::new();
        assert!(invalid.validate().is_err());

        let mut invalid = valid.clone();
        invalid.amount_nanotons = 0;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_notification_serialization_omits_empty_fields() {
        let n = SwapResultNotification {
            user_address: "0:aa".to_string(),
            success: true,
            tx_id: "id".to_string(),
            jetton_amount: None,
            error: None,
        };
        let json = serde_json::to_string(&n).unwrap();
        assert!(json.contains("userAddress"));
        assert!(!json.contains("jettonAmount"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn test_transaction_record_serialization_roundtrip() {
        let now = Utc::now();
        let record = TransactionRecord {
            id: Uuid::new_v4(),
            lt: 42,
            hash: "abc".to_string(),
            user_address: "0:aa".to_string(),
            from_address: "0:bb".to_string(),
            to_address: "0:cc".to_string(),
            amount_nanotons: 1_000_000_000,
            jetton_amount: Some(72_000),
            status: TransactionStatus::Completed,
            error_message: None,
            retry_count: 0,
            processed_at: Some(now),
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&record).unwrap();
        let back: TransactionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
