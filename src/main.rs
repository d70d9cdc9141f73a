use anyhow::Result;
use otenki_meshi::{OtenkiConfig, VERSION, logging, web};

#[tokio::main]
async fn main() -> Result<()> {
    let config = OtenkiConfig::load()?;
    logging::init(&config.logging)?;

    tracing::info!("Starting otenki-meshi {VERSION}");
    web::run(config).await
}
