//! Cribside Simulator
//!
//! Synthetic data generator for manual testing: posts one reading per
//! interval to a running relay, with slowly drifting vitals and a periodic
//! discrete event.
//!
//! Run with: cargo run --bin cribside-sim -- --device demo-1

use clap::Parser;
use cribside::telemetry::{fields, Telemetry};
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "cribside-sim",
    about = "Synthetic telemetry generator for a Cribside relay"
)]
struct Args {
    /// Base URL of the relay
    #[arg(long, default_value = "http://localhost:8000")]
    url: String,

    /// Device id to emit readings for
    #[arg(long, default_value = "demo-1")]
    device: String,

    /// Shared secret the relay expects
    #[arg(long, default_value = "dev-secret-change-me")]
    token: String,

    /// Seconds between readings
    #[arg(long, default_value_t = 1.0)]
    interval: f64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let client = reqwest::Client::new();
    let endpoint = format!("{}/api/v1/ingest", args.url.trim_end_matches('/'));

    tracing::info!(device = %args.device, endpoint = %endpoint, "Simulator started");

    let mut t: f64 = 0.0;
    loop {
        let reading = Telemetry::new(&args.device)
            .field(fields::RESPIRATION_RATE, 24.0 + 2.0 * (t / 10.0).sin())
            .field(fields::HEART_RATE, 120.0 + 5.0 * (t / 7.0).sin())
            .field(fields::SKIN_TEMP_C, 35.4 + 0.2 * (t / 19.0).sin())
            .field(fields::AMBIENT_TEMP_C, 22.5)
            .field(fields::H2S_LEVEL, (0.1 + jitter(0.02)).max(0.0))
            .field(fields::NOISE_DB, (38.0 + jitter(3.0)).max(30.0))
            .field(fields::PRESENCE, true);

        post_reading(&client, &endpoint, &args.token, &reading).await;

        // A discrete event every 30 ticks keeps event handling exercised.
        if t as i64 % 30 == 0 && t as i64 != 0 {
            let event = Telemetry::new(&args.device).field(fields::EVENT, "poop");
            post_reading(&client, &endpoint, &args.token, &event).await;
        }

        t += 1.0;
        tokio::time::sleep(Duration::from_secs_f64(args.interval)).await;
    }
}

fn jitter(spread: f64) -> f64 {
    rand::thread_rng().gen_range(-spread..spread)
}

async fn post_reading(client: &reqwest::Client, endpoint: &str, token: &str, reading: &Telemetry) {
    match client
        .post(endpoint)
        .header("X-Token", token)
        .json(reading)
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            tracing::debug!(device = %reading.device_id, "Reading relayed");
        }
        Ok(resp) => {
            tracing::warn!(status = %resp.status(), "Relay rejected reading");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to reach relay");
        }
    }
}
