//! Airlineshub server: flight prices and ticket sales.

use collaborators::{FlightCatalog, airlineshub, server};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    server::init_tracing();

    let catalog = FlightCatalog::seeded();
    let app = airlineshub::router(catalog);

    server::serve("airlineshub", app, &server::addr_from_env(8081)).await
}
