use std::sync::Arc;

use creditcore_api::config::{Config, LogFormat, PaymentProvider};
use creditcore_api::state::AppState;
use creditcore_api::{build_router, scheduler};
use creditcore_domain_notification::Notifier;
use creditcore_infra_db::Db;
use creditcore_infra_notification::TelegramNotifier;
use creditcore_infra_payment::{MockVerifier, PaymentVerifier, RobokassaVerifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config);

    let db = Db::connect(&config.database_url, config.database_max_connections).await?;
    db.migrate().await?;

    let verifier: Arc<dyn PaymentVerifier> = match config.payment_provider {
        PaymentProvider::Robokassa => Arc::new(RobokassaVerifier {
            merchant_login: config.robokassa_merchant_login.clone(),
            password_1: config.robokassa_password_1.clone(),
            password_2: config.robokassa_password_2.clone(),
            is_test: config.robokassa_is_test,
        }),
        PaymentProvider::Mock => Arc::new(MockVerifier {
            merchant_login: config.robokassa_merchant_login.clone(),
            password_1: config.robokassa_password_1.clone(),
            password_2: config.robokassa_password_2.clone(),
            base_url: config.mock_payment_base_url.clone(),
        }),
    };

    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(reqwest::Client::new(), config.bot_token.clone()));

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(db, verifier, notifier, config);

    let scheduler_handle = scheduler::spawn(state.clone());

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind_addr, "creditcore-api listening");

    axum::serve(listener, router).await?;

    scheduler_handle.abort();
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Standard => subscriber.init(),
    }
}
