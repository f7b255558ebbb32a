//! Application entry point.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::SecretString;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ton_burn_relayer::api::{RateLimitConfig, create_router, create_router_with_rate_limit};
use ton_burn_relayer::app::{
    AppState, BurnConfig, BurnExecutor, MetricsConfig, MetricsService, ProcessorConfig,
    RefundConfig, RefundHandler, RelayerService, SchedulerConfig, SwapConfig, SwapExecutor,
    spawn_scheduler,
};
use ton_burn_relayer::domain::{TonAddress, WalletGateway};
use ton_burn_relayer::infra::{
    HttpBackendNotifier, HttpTonRpcProvider, PostgresConfig, PostgresLedger, StonfiVenue,
    StonfiVenueConfig, TonRpcConfig, TransactionIngestor, WalletConfig, WalletSigner,
    signing_key_from_hex,
};

/// Application configuration
struct Config {
    database_url: String,
    ton_rpc_url: String,
    ton_api_key: Option<String>,
    relayer_private_key: SecretString,
    relayer_wallet_address: TonAddress,
    subscription_contract_address: TonAddress,
    jetton_master_address: TonAddress,
    venue_router_address: TonAddress,
    venue_pool_address: TonAddress,
    backend_url: String,
    host: String,
    port: u16,
    gas_for_callback: i64,
    gas_reserve: i64,
    poll_interval: Duration,
    fetch_limit: usize,
    enable_scheduler: bool,
    enable_rate_limiting: bool,
    rate_limit_config: RateLimitConfig,
}

impl Config {
    fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let ton_rpc_url = env::var("TON_RPC_URL")
            .unwrap_or_else(|_| "https://toncenter.com/api/v2/jsonRPC".to_string());
        let ton_api_key = env::var("TON_API_KEY").ok().filter(|k| !k.is_empty());

        let relayer_private_key = Self::load_private_key()?;
        let relayer_wallet_address = Self::parse_address("RELAYER_WALLET_ADDR")?;
        let subscription_contract_address = Self::parse_address("SUBSCRIPTION_CONTRACT_ADDR")?;
        let jetton_master_address = Self::parse_address("JETTON_MASTER_ADDR")?;
        let venue_router_address = Self::parse_address("VENUE_ROUTER_ADDR")?;
        let venue_pool_address = Self::parse_address("VENUE_POOL_ADDR")?;

        let backend_url =
            env::var("BACKEND_URL").unwrap_or_else(|_| "http://backend:3000".to_string());

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3001);

        let gas_for_callback = env::var("GAS_FOR_CALLBACK")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_000_000); // 0.01 TON

        let gas_reserve = env::var("GAS_RESERVE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(200_000_000); // 0.2 TON

        let poll_interval = Duration::from_secs(
            env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        );

        let fetch_limit = env::var("FETCH_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(25);

        let enable_scheduler = env::var("ENABLE_SCHEDULER")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        let enable_rate_limiting = env::var("ENABLE_RATE_LIMITING")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            database_url,
            ton_rpc_url,
            ton_api_key,
            relayer_private_key,
            relayer_wallet_address,
            subscription_contract_address,
            jetton_master_address,
            venue_router_address,
            venue_pool_address,
            backend_url,
            host,
            port,
            gas_for_callback,
            gas_reserve,
            poll_interval,
            fetch_limit,
            enable_scheduler,
            enable_rate_limiting,
            rate_limit_config: RateLimitConfig::from_env(),
        })
    }

    fn parse_address(var: &str) -> Result<TonAddress> {
        let raw = env::var(var).with_context(|| format!("{} not set", var))?;
        raw.parse()
            .map_err(|e| anyhow::anyhow!("{} is not a valid address: {}", var, e))
    }

    fn load_private_key() -> Result<SecretString> {
        let key_str = env::var("RELAYER_PRIV_KEY").map_err(|_| {
            anyhow::anyhow!(
                "RELAYER_PRIV_KEY environment variable is not set.\n\
                 This is a REQUIRED configuration for production.\n\
                 Please set RELAYER_PRIV_KEY to the hex-encoded 32-byte wallet seed."
            )
        })?;

        if key_str.is_empty() {
            anyhow::bail!(
                "RELAYER_PRIV_KEY environment variable is empty.\n\
                 Please provide the hex-encoded 32-byte wallet seed."
            );
        }

        Ok(SecretString::from(key_str))
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("TON Burn Relayer v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    info!("Initializing infrastructure...");

    // Database
    let ledger = PostgresLedger::new(&config.database_url, PostgresConfig::default()).await?;
    ledger.run_migrations().await?;
    info!("   Database connected and migrations applied");
    let ledger = Arc::new(ledger);

    // TON RPC provider (shared by signer, ingestor and venue)
    let provider = Arc::new(HttpTonRpcProvider::new(
        &config.ton_rpc_url,
        config.ton_api_key.clone(),
        TonRpcConfig::default(),
    )?);
    info!("   TON RPC provider created ({})", config.ton_rpc_url);

    // Wallet signer: the single serialized sender
    let signing_key = signing_key_from_hex(&config.relayer_private_key)?;
    let wallet = Arc::new(WalletSigner::new(
        Arc::clone(&provider) as _,
        signing_key,
        WalletConfig::new(
            config.relayer_wallet_address.clone(),
            config.jetton_master_address.clone(),
            config.gas_for_callback,
        ),
    ));
    // Initialization failure is fatal to the process.
    wallet.ensure_initialized().await?;
    info!("   Wallet signer initialized ({})", wallet.address());

    // Swap venue
    let venue = Arc::new(StonfiVenue::new(
        Arc::clone(&provider) as _,
        StonfiVenueConfig::new(
            config.venue_router_address.clone(),
            config.venue_pool_address.clone(),
        ),
    ));
    info!("   Swap venue configured");

    // Ingestor
    let ingestor = Arc::new(TransactionIngestor::new(
        Arc::clone(&provider) as _,
        config.relayer_wallet_address.clone(),
    ));

    // Backend notifier
    let notifier = Arc::new(HttpBackendNotifier::with_defaults(&config.backend_url)?);
    info!("   Backend notifier configured ({})", config.backend_url);

    // Metrics
    let metrics = Arc::new(MetricsService::new(MetricsConfig {
        gas_for_callback: config.gas_for_callback,
        max_idle: config.poll_interval * 10,
    }));

    // Executors and the processor
    let swap = SwapExecutor::new(
        Arc::clone(&venue) as _,
        Arc::clone(&wallet) as _,
        SwapConfig::default(),
    );
    let burn = BurnExecutor::new(Arc::clone(&wallet) as _, BurnConfig::default());
    let refund = RefundHandler::new(
        Arc::clone(&wallet) as _,
        RefundConfig {
            subscription_contract: config.subscription_contract_address.clone(),
            gas_for_callback: config.gas_for_callback,
        },
    );

    let mut processor_config = ProcessorConfig::new(config.subscription_contract_address.clone());
    processor_config.gas_reserve = config.gas_reserve;
    processor_config.gas_for_callback = config.gas_for_callback;
    processor_config.fetch_limit = config.fetch_limit;

    let service = Arc::new(RelayerService::new(
        Arc::clone(&ledger) as _,
        Arc::clone(&wallet) as _,
        ingestor as _,
        swap,
        burn,
        refund,
        notifier as _,
        Arc::clone(&metrics),
        processor_config,
    ));

    if let Err(e) = service.check_wallet_balance().await {
        warn!(error = %e, "Startup balance check failed");
    }

    let app_state = Arc::new(AppState::new(
        Arc::clone(&service),
        Arc::clone(&ledger) as _,
        metrics,
    ));

    // Scheduler: the recurring, non-overlapping chain poller
    let scheduler_shutdown_tx = if config.enable_scheduler {
        let (_handle, shutdown_tx) = spawn_scheduler(
            Arc::clone(&service),
            SchedulerConfig {
                poll_interval: config.poll_interval,
                enabled: true,
            },
        );
        info!(
            "   Scheduler started (poll: {}s)",
            config.poll_interval.as_secs()
        );
        Some(shutdown_tx)
    } else {
        info!("   Scheduler disabled");
        None
    };

    // Router
    let router = if config.enable_rate_limiting {
        info!("   Rate limiting enabled");
        create_router_with_rate_limit(app_state, config.rate_limit_config)
    } else {
        create_router(app_state)
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server starting on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(tx) = scheduler_shutdown_tx {
        let _ = tx.send(true);
    }

    info!("Server shutdown complete");
    Ok(())
}
