//! Burst of concurrent callers against a small window.
//!
//! Eight workers share a limiter that admits ten calls per five seconds, so
//! the later calls are held until the window drains.
//!
//! Run with:
//! ```bash
//! RUST_LOG=info cargo run -p quotagate --example burst
//! ```

use quotagate::prelude::*;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let limiter = RateLimiter::new(
        LimiterConfig::new()
            .max_calls(10)
            .safety_margin(3)
            .base_wait(Duration::from_millis(50))
            .window(Duration::from_secs(5)),
    )?;

    let start = Instant::now();
    let mut workers = Vec::new();
    for worker in 0..8 {
        let limiter = limiter.clone();
        workers.push(tokio::spawn(async move {
            for call in 0..3 {
                limiter.acquire(&format!("worker_{worker}_call_{call}")).await;
                println!(
                    "worker {worker} call {call} admitted at {:.2}s",
                    start.elapsed().as_secs_f64()
                );
            }
        }));
    }
    for worker in workers {
        worker.await?;
    }

    println!("\n{}", limiter.statistics());
    Ok(())
}
