//! Batch logger example
//!
//! Several producer tasks submit log lines; a handler prints each flushed
//! group. Groups are flushed every 5 lines or 200ms after a group's first
//! line, whichever comes first.
//!
//! Usage:
//!   BATCHER_CAPACITY=5 \
//!   BATCHER_TIMEOUT_MS=200 \
//!   BATCHER_NAME=batch-logger \
//!   cargo run --example batch_logger

use async_trait::async_trait;
use batcher_core::{init_tracing, BatchResult, Batcher, BatcherConfig, FlushHandler};
use std::sync::Arc;
use std::time::Duration;

/// A handler that prints every flushed group
struct PrintingHandler {
    flush_count: u64,
    line_count: usize,
}

impl PrintingHandler {
    fn new() -> Self {
        Self {
            flush_count: 0,
            line_count: 0,
        }
    }
}

#[async_trait]
impl FlushHandler<String> for PrintingHandler {
    async fn flush(&mut self, batch: Vec<String>) -> BatchResult<()> {
        self.flush_count += 1;
        self.line_count += batch.len();

        println!("=== Flush #{} ({} lines) ===", self.flush_count, batch.len());
        for line in &batch {
            println!("  {}", line);
        }
        println!();

        Ok(())
    }

    async fn shutdown(&mut self) -> BatchResult<()> {
        println!("PrintingHandler shutting down");
        println!("Total: {} lines in {} flushes", self.line_count, self.flush_count);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> BatchResult<()> {
    let config = BatcherConfig::from_env().unwrap_or_else(|_| {
        println!("Using default configuration");
        println!("To use custom settings, set environment variables:");
        println!("  BATCHER_CAPACITY (default: 5)");
        println!("  BATCHER_TIMEOUT_MS (default: 200)");
        println!("  BATCHER_NAME (default: batch-logger)");
        println!();

        BatcherConfig::new(5, Duration::from_millis(200)).with_name("batch-logger")
    });

    init_tracing(&config);

    let batcher = Arc::new(Batcher::with_handler(config, PrintingHandler::new())?);

    let producers: Vec<_> = (0..3)
        .map(|producer| {
            let batcher = batcher.clone();
            tokio::spawn(async move {
                for line in 0..7 {
                    batcher
                        .push(format!("producer {} line {}", producer, line))
                        .await?;
                    tokio::time::sleep(Duration::from_millis(30 * (producer + 1))).await;
                }
                BatchResult::Ok(())
            })
        })
        .collect();

    for producer in producers {
        if let Ok(Err(e)) = producer.await {
            eprintln!("producer stopped: {}", e);
        }
    }

    batcher.close().await?;

    let stats = batcher.stats();
    println!(
        "accepted={} size_flushes={} timeout_flushes={} shutdown_flushes={}",
        stats.accepted, stats.size_flushes, stats.timeout_flushes, stats.shutdown_flushes
    );

    Ok(())
}
