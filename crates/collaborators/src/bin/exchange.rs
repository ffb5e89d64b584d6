//! Exchange server: reference-to-local currency rate.

use collaborators::{ExchangeDesk, FaultConfig, exchange, server};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    server::init_tracing();

    let faults = FaultConfig::from_env("EXCHANGE");
    if faults != FaultConfig::none() {
        tracing::warn!(?faults, "fault injection enabled");
    }
    let app = exchange::router(ExchangeDesk::new(faults));

    server::serve("exchange", app, &server::addr_from_env(8082)).await
}
