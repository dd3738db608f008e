use std::time::Duration;

use reqhook::{handlers::default_hooks, Client, Config, DelayConfig, LogLevel, Operation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct CreatePayment {
    amount: u64,
    phone: String,
}

#[derive(Debug, Default, Deserialize)]
struct Payment {
    id: String,
    status: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let endpoint = std::env::var("REQHOOK_ENDPOINT")?;
    let token = std::env::var("REQHOOK_TOKEN")?;

    let config = Config::new(endpoint)
        .with_bearer(token)
        .with_log_level(LogLevel::DEBUG_WITH_REQUEST_RETRIES)
        .with_max_retries(3)
        .with_retry_delay(DelayConfig {
            initial_delay: Duration::from_millis(200),
            ..DelayConfig::default()
        });
    let client = Client::new(config);
    let hooks = default_hooks::<CreatePayment, Payment>();

    let payment = client
        .call(
            Operation::post("CreatePayment", "/v1/payments"),
            &hooks,
            CreatePayment {
                amount: 100,
                phone: "254700000000".to_owned(),
            },
        )
        .await?;

    println!("{} {}", payment.id, payment.status);
    Ok(())
}
