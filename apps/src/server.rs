use std::sync::Arc;
use std::time::Duration;

use broker::{BrokerClient, BrokerLink, InMemoryBroker};
use clap::Parser;
use relay::bridge::MessageBridge;
use relay::consumer::spawn_record_sink;
use relay::emitter::{run_supplier, Emitter, RECORD_DELAY_MS};
use relay::http;
use relay::router_fn::spawn_dynamic_router;
use relay::OUTBOUND_BINDING;
use routing::DestinationRegistry;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address for the manual dispatch endpoint
    #[arg(long, default_value = "127.0.0.1:8080")]
    http_addr: String,

    /// Destination the supplier publishes to and the sink consumes from
    #[arg(long, default_value = "records")]
    destination: String,

    /// Destination carrying dynamic-routing requests
    #[arg(long, default_value = "route-requests")]
    route_requests: String,

    /// Supplier poll period in milliseconds
    #[arg(long, default_value_t = 1000)]
    emit_period_ms: u64,

    /// Delay attribute stamped on emitted records, milliseconds
    #[arg(long, default_value_t = RECORD_DELAY_MS)]
    record_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set up logging");

    let args = Args::parse();

    let client: Arc<dyn BrokerClient> = Arc::new(BrokerLink::new(Arc::new(InMemoryBroker::new())));

    let registry = Arc::new(DestinationRegistry::new());
    registry.register(OUTBOUND_BINDING, &args.destination);

    let _sink = spawn_record_sink(client.as_ref(), &args.destination)?;
    let _router = spawn_dynamic_router(client.clone(), &args.route_requests, &args.destination)?;

    let supplier = run_supplier(
        client.clone(),
        args.destination.clone(),
        Duration::from_millis(args.emit_period_ms),
        Emitter::with_delay(args.record_delay_ms),
    );
    tokio::spawn(supplier);

    let bridge = Arc::new(MessageBridge::new(client, registry));
    let listener = TcpListener::bind(&args.http_addr).await?;
    info!("relay service up");
    http::serve(listener, bridge).await?;
    Ok(())
}
