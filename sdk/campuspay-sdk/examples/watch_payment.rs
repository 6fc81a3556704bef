// Example: scan-to-pay with a payment-match watcher
//
// This example demonstrates how to:
// 1. Create a request with a reference key and print its payment link
// 2. Watch the reference for a matching transfer
// 3. Stop watching on Ctrl-C
//
// Usage: cargo run --example watch_payment -- <RECIPIENT> <AMOUNT_SOL>

use campuspay_sdk::utils::parse_sol;
use campuspay_sdk::{
    ClusterConfig, MemoryStore, PaymentConfig, PaymentMatchWatcher, PaymentRequest,
    ReconciliationSink, RpcConnection, StatusUpdate, WatchOutcome,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let recipient = args.next().ok_or("missing recipient address")?;
    let amount = parse_sol(&args.next().unwrap_or_else(|| "0.01".to_string()))?;

    let cluster = ClusterConfig::from_env();
    let config = PaymentConfig::default();

    // 1. Request with a fresh reference key
    let request = PaymentRequest::builder(recipient, amount)
        .with_label("Campus bookstore")
        .with_message("Scan to pay")
        .with_new_reference()
        .build(&config)?;
    println!("Payment link: {}", request.to_uri());
    println!("Expires at:   {}", request.expires_at());

    // 2. Watch the reference
    let watcher = PaymentMatchWatcher::new(Arc::new(RpcConnection::new(cluster.rpc_url)), config)
        .with_sink(ReconciliationSink::new(Arc::new(MemoryStore::new())))
        .with_listener(Arc::new(|update: &StatusUpdate| {
            println!("status: {}", update.status);
        }));
    let handle = watcher.spawn(request)?;
    let token = handle.token();

    // 3. Wait for a match, expiry, or Ctrl-C
    tokio::select! {
        outcome = handle.join() => match outcome {
            Some(WatchOutcome::Matched { signature, payer }) => {
                println!("Paid by {payer:?} in {signature}");
            },
            Some(WatchOutcome::Expired) => println!("Request expired"),
            None => println!("Watch stopped"),
        },
        _ = tokio::signal::ctrl_c() => {
            token.cancel();
            println!("Cancelled");
        },
    }

    Ok(())
}
