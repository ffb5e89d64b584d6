//! Fidelity server: loyalty points.

use collaborators::{FaultConfig, PointsLedger, fidelity, server};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    server::init_tracing();

    let faults = FaultConfig::from_env("FIDELITY");
    if faults != FaultConfig::none() {
        tracing::warn!(?faults, "fault injection enabled");
    }
    let app = fidelity::router(PointsLedger::new(faults));

    server::serve("fidelity", app, &server::addr_from_env(8083)).await
}
