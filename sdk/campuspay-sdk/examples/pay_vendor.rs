// Example: paying a vendor from a local keypair
//
// This example demonstrates how to:
// 1. Build a vendor payment request
// 2. Execute it through a payment session (balance gate, signing, confirmation)
// 3. Persist the transaction record to a JSON file
//
// Usage: RPC_URL=https://api.devnet.solana.com cargo run --example pay_vendor -- <RECIPIENT> <AMOUNT_SOL>

use campuspay_sdk::utils::parse_sol;
use campuspay_sdk::{
    ClusterConfig, JsonFileStore, KeypairWallet, PaymentConfig, PaymentRequest, PaymentSession,
    ReconciliationSink, RecordStore, RpcConnection,
};
use solana_sdk::signature::read_keypair_file;
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

    // 1. Connect to the cluster with the local payer key
    let cluster = ClusterConfig::from_env();
    let keypair = read_keypair_file(&cluster.keypair_path)?;
    let connection = Arc::new(RpcConnection::new(cluster.rpc_url.clone()));
    let wallet = Arc::new(KeypairWallet::new(keypair));

    // 2. Build the request
    let config = PaymentConfig::default();
    let request = PaymentRequest::builder(recipient, amount)
        .with_label("Campus vendor")
        .with_memo("pay_vendor example")
        .build(&config)?;
    println!("Paying {} SOL to {}", request.amount(), request.recipient());

    // 3. Execute
    let store = Arc::new(JsonFileStore::new("transactions.json"));
    let session = PaymentSession::new(connection, wallet, config)
        .with_sink(ReconciliationSink::new(store.clone()));
    let outcome = session.execute(&request).await;

    match &outcome.result.error {
        None => println!(
            "Status: {} (signature {:?}, {} attempt(s) via {:?})",
            outcome.result.status, outcome.result.signature, outcome.attempts, outcome.path
        ),
        Some(err) => println!("Payment failed: {err}\n{}", err.remediation()),
    }

    if let Some(record) = store.get(request.id())? {
        println!("Record {} is {:?}", record.id, record.status);
    }

    Ok(())
}
