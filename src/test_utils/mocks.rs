//! Mock implementations for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use uuid::Uuid;

use crate::domain::{
    AppError, BackendNotifier, CandidateTransaction, ChainError, DatabaseError, LedgerStore,
    MessageDescriptor, PoolReserves, SendConfirmation, SwapResultNotification, SwapVenue,
    TonAddress, TransactionRecord, TransactionSource, TransactionStatus, WalletGateway,
};
use crate::infra::ton::messages::OutboundBody;
use crate::infra::ton::rpc::{GetMethodResult, RawTransaction, TonRpcProvider};

/// Configuration for mock behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error_message: Option<String>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }
}

/// Mock ledger backed by an in-memory map keyed on `(lt, hash)`.
pub struct MockLedger {
    records: Mutex<HashMap<(i64, String), TransactionRecord>>,
    config: MockConfig,
    is_healthy: AtomicBool,
}

impl MockLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            config,
            is_healthy: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// All stored records (for assertions)
    pub fn all_records(&self) -> Vec<TransactionRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    /// Seed a record directly, bypassing admission (for assertions on
    /// pre-existing state)
    pub fn seed(&self, record: TransactionRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((record.lt, record.hash.clone()), record);
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock error".to_string());
            return Err(AppError::Database(DatabaseError::Query(msg)));
        }
        Ok(())
    }

    fn insert_with_status(
        &self,
        candidate: &CandidateTransaction,
        status: TransactionStatus,
    ) -> Option<TransactionRecord> {
        let key = (candidate.lt, candidate.hash.clone());
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&key) {
            return None;
        }
        let now = Utc::now();
        let record = TransactionRecord {
            id: Uuid::new_v4(),
            lt: candidate.lt,
            hash: candidate.hash.clone(),
            user_address: candidate.user_address.clone(),
            from_address: candidate.from_address.clone(),
            to_address: candidate.to_address.clone(),
            amount_nanotons: candidate.value_nanotons,
            jetton_amount: None,
            status,
            error_message: None,
            retry_count: 0,
            processed_at: None,
            created_at: now,
            updated_at: now,
        };
        records.insert(key, record.clone());
        Some(record)
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MockLedger {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Unhealthy".to_string(),
            )));
        }
        self.check_should_fail()
    }

    async fn try_create(
        &self,
        candidate: &CandidateTransaction,
    ) -> Result<Option<TransactionRecord>, AppError> {
        self.check_should_fail()?;
        Ok(self.insert_with_status(candidate, TransactionStatus::Processing))
    }

    async fn insert_pending(
        &self,
        candidate: &CandidateTransaction,
    ) -> Result<Option<TransactionRecord>, AppError> {
        self.check_should_fail()?;
        Ok(self.insert_with_status(candidate, TransactionStatus::Pending))
    }

    async fn mark_processing(&self, id: Uuid) -> Result<(), AppError> {
        self.check_should_fail()?;
        let mut records = self.records.lock().unwrap();
        let record = records
            .values_mut()
            .find(|r| r.id == id && r.status == TransactionStatus::Pending)
            .ok_or_else(|| {
                AppError::Database(DatabaseError::NotFound(format!("no pending record {}", id)))
            })?;
        record.status = TransactionStatus::Processing;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn finalize(
        &self,
        id: Uuid,
        status: TransactionStatus,
        error_message: Option<&str>,
        jetton_amount: Option<i64>,
    ) -> Result<(), AppError> {
        self.check_should_fail()?;
        let mut records = self.records.lock().unwrap();
        let record = records
            .values_mut()
            .find(|r| r.id == id && !r.status.is_terminal())
            .ok_or_else(|| {
                AppError::Database(DatabaseError::NotFound(format!("no active record {}", id)))
            })?;
        let now = Utc::now();
        record.status = status;
        record.error_message = error_message.map(str::to_string);
        if jetton_amount.is_some() {
            record.jetton_amount = jetton_amount;
        }
        record.processed_at = Some(now);
        record.updated_at = now;
        Ok(())
    }

    async fn increment_retry_count(&self, id: Uuid) -> Result<i32, AppError> {
        self.check_should_fail()?;
        let mut records = self.records.lock().unwrap();
        let record = records.values_mut().find(|r| r.id == id).ok_or_else(|| {
            AppError::Database(DatabaseError::NotFound(id.to_string()))
        })?;
        record.retry_count += 1;
        record.updated_at = Utc::now();
        Ok(record.retry_count)
    }

    async fn find_by_key(
        &self,
        lt: i64,
        hash: &str,
    ) -> Result<Option<TransactionRecord>, AppError> {
        self.check_should_fail()?;
        let records = self.records.lock().unwrap();
        Ok(records.get(&(lt, hash.to_string())).cloned())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<TransactionRecord>, AppError> {
        self.check_should_fail()?;
        let records = self.records.lock().unwrap();
        let mut items: Vec<TransactionRecord> = records.values().cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }
}

/// One message captured by the mock wallet.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub seqno: u32,
    pub dest: TonAddress,
    pub value_nanotons: i64,
    pub body: Vec<u8>,
}

/// Mock wallet gateway recording every send.
pub struct MockWallet {
    address: TonAddress,
    jetton_wallet: TonAddress,
    seqno: AtomicU32,
    sends: Mutex<Vec<SentMessage>>,
    balance: Mutex<i64>,
    jetton_balance: Mutex<i64>,
    jetton_balance_after_send: Mutex<Option<i64>>,
    confirmed: AtomicBool,
    send_config: Mutex<MockConfig>,
    fail_sends_after: Mutex<Option<usize>>,
    init_calls: AtomicU32,
}

impl MockWallet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            address: TonAddress::new(0, [0xAB; 32]),
            jetton_wallet: TonAddress::new(0, [0xAC; 32]),
            seqno: AtomicU32::new(1),
            sends: Mutex::new(Vec::new()),
            balance: Mutex::new(100_000_000_000),
            jetton_balance: Mutex::new(0),
            jetton_balance_after_send: Mutex::new(None),
            confirmed: AtomicBool::new(true),
            send_config: Mutex::new(MockConfig::success()),
            fail_sends_after: Mutex::new(None),
            init_calls: AtomicU32::new(0),
        }
    }

    pub fn set_balance(&self, balance: i64) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn set_jetton_balance(&self, balance: i64) {
        *self.jetton_balance.lock().unwrap() = balance;
    }

    /// After the next send, `jetton_balance` reports this value instead
    /// (simulates a landed swap).
    pub fn set_jetton_balance_after_send(&self, balance: i64) {
        *self.jetton_balance_after_send.lock().unwrap() = Some(balance);
    }

    /// Make `send` return `confirmed: false` (seqno wait timeout).
    pub fn set_send_unconfirmed(&self) {
        self.confirmed.store(false, Ordering::Relaxed);
    }

    /// Make `send` fail with the given message.
    pub fn fail_sends(&self, message: impl Into<String>) {
        *self.send_config.lock().unwrap() = MockConfig::failure(message);
    }

    /// Let the first `n` sends succeed, then fail the rest.
    pub fn fail_sends_after(&self, n: usize) {
        *self.fail_sends_after.lock().unwrap() = Some(n);
    }

    pub fn sends(&self) -> Vec<SentMessage> {
        self.sends.lock().unwrap().clone()
    }

    pub fn init_calls(&self) -> u32 {
        self.init_calls.load(Ordering::Relaxed)
    }

    /// Decoded bodies of every send, for state-machine assertions.
    pub fn sent_bodies(&self) -> Vec<OutboundBody> {
        self.sends()
            .iter()
            .filter_map(|s| OutboundBody::decode(&s.body).ok())
            .collect()
    }
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletGateway for MockWallet {
    async fn ensure_initialized(&self) -> Result<(), AppError> {
        self.init_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn send(
        &self,
        dest: &TonAddress,
        value_nanotons: i64,
        body: Vec<u8>,
    ) -> Result<SendConfirmation, AppError> {
        let config = self.send_config.lock().unwrap().clone();
        if config.should_fail {
            let msg = config
                .error_message
                .unwrap_or_else(|| "Mock send error".to_string());
            return Err(AppError::Chain(ChainError::Rpc(msg)));
        }
        if let Some(n) = *self.fail_sends_after.lock().unwrap() {
            if self.sends.lock().unwrap().len() >= n {
                return Err(AppError::Chain(ChainError::Rpc(
                    "Mock send rejected".to_string(),
                )));
            }
        }

        let seqno = self.seqno.fetch_add(1, Ordering::SeqCst);
        self.sends.lock().unwrap().push(SentMessage {
            seqno,
            dest: dest.clone(),
            value_nanotons,
            body,
        });

        if let Some(after) = self.jetton_balance_after_send.lock().unwrap().take() {
            *self.jetton_balance.lock().unwrap() = after;
        }

        Ok(SendConfirmation {
            seqno,
            confirmed: self.confirmed.load(Ordering::Relaxed),
        })
    }

    async fn balance(&self) -> Result<i64, AppError> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn jetton_balance(&self) -> Result<i64, AppError> {
        Ok(*self.jetton_balance.lock().unwrap())
    }

    async fn jetton_wallet_address(&self) -> Result<TonAddress, AppError> {
        Ok(self.jetton_wallet.clone())
    }

    fn address(&self) -> &TonAddress {
        &self.address
    }
}

/// Mock swap venue with fixed reserves.
pub struct MockVenue {
    router: TonAddress,
    reserves: Mutex<PoolReserves>,
    forward_gas: i64,
    config: MockConfig,
}

impl MockVenue {
    #[must_use]
    pub fn with_reserves(ton_nanotons: i64, jetton_units: i64) -> Self {
        Self {
            router: TonAddress::new(0, [0xDD; 32]),
            reserves: Mutex::new(PoolReserves {
                ton_nanotons,
                jetton_units,
            }),
            forward_gas: 250_000_000,
            config: MockConfig::success(),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        let mut venue = Self::with_reserves(1, 1);
        venue.config = MockConfig::failure(message);
        venue
    }

    pub fn set_reserves(&self, ton_nanotons: i64, jetton_units: i64) {
        *self.reserves.lock().unwrap() = PoolReserves {
            ton_nanotons,
            jetton_units,
        };
    }
}

#[async_trait]
impl SwapVenue for MockVenue {
    async fn pool_reserves(&self) -> Result<PoolReserves, AppError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock venue error".to_string());
            return Err(AppError::Chain(ChainError::Rpc(msg)));
        }
        Ok(*self.reserves.lock().unwrap())
    }

    async fn build_swap(
        &self,
        offer_nanotons: i64,
        min_ask_units: i64,
        recipient: &TonAddress,
    ) -> Result<MessageDescriptor, AppError> {
        Ok(MessageDescriptor {
            to: self.router.clone(),
            value_nanotons: offer_nanotons + self.forward_gas,
            body: OutboundBody::Swap {
                query_id: 1,
                offer_nanotons,
                min_ask_units,
                recipient: recipient.clone(),
            }
            .encode(),
        })
    }
}

/// Mock transaction source returning a fixed candidate set.
pub struct MockSource {
    candidates: Mutex<Vec<CandidateTransaction>>,
    fetch_calls: AtomicU32,
    config: MockConfig,
}

impl MockSource {
    #[must_use]
    pub fn new(candidates: Vec<CandidateTransaction>) -> Self {
        Self {
            candidates: Mutex::new(candidates),
            fetch_calls: AtomicU32::new(0),
            config: MockConfig::success(),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        let mut source = Self::new(vec![]);
        source.config = MockConfig::failure(message);
        source
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TransactionSource for MockSource {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<CandidateTransaction>, AppError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock source error".to_string());
            return Err(AppError::Chain(ChainError::Rpc(msg)));
        }
        let candidates = self.candidates.lock().unwrap();
        Ok(candidates.iter().take(limit).cloned().collect())
    }
}

/// Mock backend notifier recording every notification.
pub struct MockNotifier {
    notifications: Mutex<Vec<SwapResultNotification>>,
    config: MockConfig,
}

impl MockNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
            config: MockConfig::success(),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
            config: MockConfig::failure(message),
        }
    }

    pub fn notifications(&self) -> Vec<SwapResultNotification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendNotifier for MockNotifier {
    async fn notify_swap_result(
        &self,
        notification: &SwapResultNotification,
    ) -> Result<(), AppError> {
        self.notifications.lock().unwrap().push(notification.clone());
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock notifier error".to_string());
            return Err(AppError::ExternalService(msg));
        }
        Ok(())
    }
}

/// Mock RPC provider for infra-level tests.
pub struct MockRpcProvider {
    transactions: Mutex<Vec<RawTransaction>>,
    balance: Mutex<i64>,
    get_methods: Mutex<HashMap<String, GetMethodResult>>,
    seqno: AtomicU32,
    freeze_seqno: AtomicBool,
    sent_bocs: Mutex<Vec<String>>,
    config: MockConfig,
}

impl MockRpcProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            transactions: Mutex::new(Vec::new()),
            balance: Mutex::new(100_000_000_000),
            get_methods: Mutex::new(HashMap::new()),
            seqno: AtomicU32::new(1),
            freeze_seqno: AtomicBool::new(false),
            sent_bocs: Mutex::new(Vec::new()),
            config: MockConfig::success(),
        }
    }

    /// Stop advancing the seqno on accepted messages (simulates a send whose
    /// confirmation never becomes visible).
    pub fn freeze_seqno(&self) {
        self.freeze_seqno.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn with_transactions(self, transactions: Vec<RawTransaction>) -> Self {
        *self.transactions.lock().unwrap() = transactions;
        self
    }

    /// Register a get-method whose stack is the given integers.
    #[must_use]
    pub fn with_get_method_ints(self, method: &str, ints: Vec<i64>) -> Self {
        let stack = ints
            .into_iter()
            .map(|i| serde_json::json!(["num", format!("{:#x}", i)]))
            .collect();
        self.get_methods.lock().unwrap().insert(
            method.to_string(),
            GetMethodResult {
                exit_code: 0,
                stack,
            },
        );
        self
    }

    /// Register a get-method whose stack is a single address.
    #[must_use]
    pub fn with_get_method_address(self, method: &str, address: &TonAddress) -> Self {
        self.get_methods.lock().unwrap().insert(
            method.to_string(),
            GetMethodResult {
                exit_code: 0,
                stack: vec![serde_json::json!(["addr", address.to_string()])],
            },
        );
        self
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        let mut provider = Self::new();
        provider.config = MockConfig::failure(message);
        provider
    }

    pub fn set_balance(&self, balance: i64) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn sent_bocs(&self) -> Vec<String> {
        self.sent_bocs.lock().unwrap().clone()
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock RPC error".to_string());
            return Err(AppError::Chain(ChainError::Rpc(msg)));
        }
        Ok(())
    }
}

impl Default for MockRpcProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TonRpcProvider for MockRpcProvider {
    async fn get_transactions(
        &self,
        _address: &TonAddress,
        limit: usize,
    ) -> Result<Vec<RawTransaction>, AppError> {
        self.check_should_fail()?;
        let transactions = self.transactions.lock().unwrap();
        Ok(transactions.iter().take(limit).cloned().collect())
    }

    async fn get_balance(&self, _address: &TonAddress) -> Result<i64, AppError> {
        self.check_should_fail()?;
        Ok(*self.balance.lock().unwrap())
    }

    async fn run_get_method(
        &self,
        _address: &TonAddress,
        method: &str,
        _stack: Vec<serde_json::Value>,
    ) -> Result<GetMethodResult, AppError> {
        self.check_should_fail()?;
        if method == "seqno" {
            let seqno = self.seqno.load(Ordering::SeqCst);
            return Ok(GetMethodResult {
                exit_code: 0,
                stack: vec![serde_json::json!(["num", format!("{:#x}", seqno)])],
            });
        }
        self.get_methods
            .lock()
            .unwrap()
            .get(method)
            .cloned()
            .ok_or_else(|| {
                AppError::Chain(ChainError::Rpc(format!("no mock for get-method {method}")))
            })
    }

    async fn send_message(&self, boc_base64: &str) -> Result<(), AppError> {
        self.check_should_fail()?;
        self.sent_bocs.lock().unwrap().push(boc_base64.to_string());
        // Accepting the message advances the chain-visible seqno.
        if !self.freeze_seqno.load(Ordering::Relaxed) {
            self.seqno.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
