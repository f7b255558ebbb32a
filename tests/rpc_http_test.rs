//! HTTP-level tests for the TON RPC provider, using wiremock.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ton_burn_relayer::domain::{AppError, ChainError, TonAddress};
use ton_burn_relayer::infra::ton::rate_limit::RpcThrottleConfig;
use ton_burn_relayer::infra::ton::rpc::{HttpTonRpcProvider, TonRpcConfig, TonRpcProvider};

fn fast_config() -> TonRpcConfig {
    TonRpcConfig {
        timeout: Duration::from_secs(5),
        max_retries: 3,
        retry_delay: Duration::from_millis(10),
        throttle: RpcThrottleConfig {
            min_interval: Duration::from_millis(1),
            max_concurrent: 5,
        },
    }
}

fn wallet() -> TonAddress {
    TonAddress::new(0, [0x77; 32])
}

async fn provider_for(server: &MockServer) -> HttpTonRpcProvider {
    HttpTonRpcProvider::new(&server.uri(), Some("test-key".to_string()), fast_config()).unwrap()
}

#[tokio::test]
async fn test_get_balance_parses_decimal_string() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({"method": "getAddressBalance"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": "123456789"
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server).await;
    let balance = provider.get_balance(&wallet()).await.unwrap();
    assert_eq!(balance, 123_456_789);
}

#[tokio::test]
async fn test_get_transactions_deserializes_api_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "getTransactions"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": [
                {
                    "transaction_id": {"lt": "100", "hash": "abc"},
                    "aborted": false,
                    "in_msg": {
                        "source": "0:aa",
                        "destination": "0:bb",
                        "value": "1000000000",
                        "msg_data": {"body": null}
                    }
                },
                {
                    "transaction_id": {"lt": "99", "hash": "def"},
                    "aborted": true,
                    "in_msg": null
                }
            ]
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server).await;
    let transactions = provider.get_transactions(&wallet(), 10).await.unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0].transaction_id.lt, "100");
    assert!(!transactions[0].aborted);
    assert!(transactions[1].aborted);
    assert_eq!(
        transactions[0].in_msg.as_ref().unwrap().value.as_deref(),
        Some("1000000000")
    );
}

#[tokio::test]
async fn test_server_error_is_retried_then_succeeds() {
    let server = MockServer::start().await;

    // First attempt hits a 500; the retry gets a healthy response.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": "42"
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server).await;
    let balance = provider.get_balance(&wallet()).await.unwrap();
    assert_eq!(balance, 42);
}

#[tokio::test]
async fn test_rpc_error_object_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32602, "message": "invalid params"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server).await;
    let err = provider.get_balance(&wallet()).await.unwrap_err();
    assert!(matches!(err, AppError::Chain(ChainError::Rpc(_))));
}

#[tokio::test]
async fn test_insufficient_funds_detected_from_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "insufficient funds for message"}
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server).await;
    let err = provider.send_message("dGVzdA==").await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Chain(ChainError::InsufficientFunds)
    ));
}

#[tokio::test]
async fn test_run_get_method_nonzero_exit_code_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "runGetMethod"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"exit_code": 11, "stack": []}
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server).await;
    let err = provider
        .run_get_method(&wallet(), "seqno", vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Chain(ChainError::Rpc(_))));
}

#[tokio::test]
async fn test_run_get_method_parses_stack() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "runGetMethod"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"exit_code": 0, "stack": [["num", "0x1f"]]}
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server).await;
    let result = provider
        .run_get_method(&wallet(), "seqno", vec![])
        .await
        .unwrap();
    assert_eq!(result.int_at(0).unwrap(), 31);
}

#[tokio::test]
async fn test_send_boc_round_trips() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "sendBoc", "params": {"boc": "dGVzdA=="}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"@type": "ok"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server).await;
    provider.send_message("dGVzdA==").await.unwrap();
}
