/// Image Converter - HTTP function server
///
/// Receives storage CloudEvents over HTTP and converts each new WebP object
/// to JPEG in the destination bucket.
use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use anyhow::Context;
use image_converter::handlers;
use image_converter::services::{ConversionService, GcsClient};
use image_converter::Config;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("image_converter=info,actix_web=info"));
    if config.app.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match config.conversion.destination_bucket.as_deref() {
        Some(bucket) => tracing::info!(destination_bucket = %bucket, "Configuration loaded"),
        None => tracing::warn!(
            "DESTINATION_BUCKET not set; every invocation will fail until it is configured"
        ),
    }

    // One store client for the whole process
    let gcs_client =
        Arc::new(GcsClient::from_config(&config.gcs).context("Failed to initialize GCS client")?);
    let service = ConversionService::new(gcs_client, config.conversion.clone());

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(
        address = %bind_address,
        deadline_secs = config.conversion.deadline.as_secs(),
        "Image converter listening"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(service.clone()))
            .wrap(actix_middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await
    .context("HTTP server failed")?;

    tracing::info!("Image converter shutting down");
    Ok(())
}
