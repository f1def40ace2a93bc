//! Producer/consumer demo.
//!
//! A producer thread adds `0..produce` with a delay between adds. The main
//! thread polls on a slower schedule and either takes one element or
//! reports an empty buffer, without ever parking.
//!
//! ```bash
//! RUST_LOG=br_buffer=trace cargo run -p br-buffer --bin ring-demo
//! ```

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use br_buffer::BoundedRingBuffer;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "ring-demo")]
#[command(about = "Bounded ring buffer producer/consumer demo")]
struct Args {
    /// Buffer capacity
    #[arg(long, default_value_t = 10)]
    capacity: usize,

    /// Elements the producer adds
    #[arg(long, default_value_t = 20)]
    produce: u64,

    /// Polls the consumer performs
    #[arg(long, default_value_t = 15)]
    consume: u64,

    /// Delay between adds, in milliseconds
    #[arg(long, default_value_t = 500)]
    produce_delay_ms: u64,

    /// Delay between polls, in milliseconds
    #[arg(long, default_value_t = 1000)]
    consume_delay_ms: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let buffer = BoundedRingBuffer::new(args.capacity).context("invalid --capacity")?;

    let producer = {
        let buffer = buffer.clone();
        let delay = Duration::from_millis(args.produce_delay_ms);
        let produce = args.produce;
        thread::spawn(move || {
            for i in 0..produce {
                buffer.add(i);
                tracing::info!(element = i, size = buffer.size(), "added");
                thread::sleep(delay);
            }
        })
    };

    let delay = Duration::from_millis(args.consume_delay_ms);
    for _ in 0..args.consume {
        thread::sleep(delay);
        match buffer.take_timeout(Duration::ZERO) {
            Ok(element) => println!("Retrieved: {}", element),
            Err(_) => println!("Buffer currently empty"),
        }
    }

    // The producer may still be parked on a full buffer.
    while !producer.is_finished() {
        if let Ok(element) = buffer.take_timeout(delay) {
            tracing::debug!(element, "drained");
        }
    }
    producer
        .join()
        .map_err(|_| anyhow!("producer thread panicked"))?;

    tracing::info!(remaining = buffer.size(), "demo finished");
    Ok(())
}
