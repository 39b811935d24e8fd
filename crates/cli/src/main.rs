//! OS2mo job function configurator.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: flags with environment fallbacks ([`config::Settings`]).
//! 2. **Wire observability**: `tracing-subscriber` with a JSON layer, an
//!    optional OpenTelemetry OTLP exporter, and a Prometheus recorder.
//! 3. **Construct infrastructure**: the OS2mo GraphQL client and the AMQP
//!    system, with the engagement listener merged into its router.
//! 4. **Serve**: run the AMQP consumers and the HTTP surface until shutdown.

mod app;
mod config;
mod engagement_listener;
mod http;
mod observability;

use clap::Parser;
use tracing::info;

use crate::app::create_app;
use crate::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    let telemetry = observability::init(&settings)?;

    info!(
        application = %settings.application_name,
        source = %settings.job_function_source,
        facet = %settings.job_function_facet,
        match_by = %settings.job_function_match_by,
        dry_run = settings.dry_run,
        "Starting job function configurator"
    );

    let app = create_app(&settings, telemetry.metrics())?;
    app.serve().await?;

    drop(telemetry);
    Ok(())
}
