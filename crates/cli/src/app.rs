//! Application bootstrap.
//!
//! Builds the OS2mo client, the engagement listener and the AMQP system,
//! merges the listener's routes into the AMQP system's router, and mounts the
//! HTTP surface. [`App::serve`] then runs consumers and HTTP server side by
//! side until a shutdown signal arrives or either of them fails.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::watch;
use tracing::info;

use configurator::MoGraphQl;
use listener::AmqpSystem;
use mo_graphql::MoGraphQlClient;

use crate::config::Settings;
use crate::engagement_listener::{amqp_router, EngagementListener};
use crate::http::{self, AppState};

/// The composed application, ready to serve.
pub struct App {
    pub amqp: AmqpSystem,
    pub http: Router,
    pub bind: SocketAddr,
}

/// Builds the application against the real OS2mo GraphQL API.
pub fn create_app(settings: &Settings, metrics: Option<PrometheusHandle>) -> anyhow::Result<App> {
    let mo = MoGraphQlClient::new(settings.graphql_config())
        .context("failed to construct OS2mo GraphQL client")?;
    create_app_with_client(settings, Arc::new(mo), metrics)
}

/// Builds the application around any [`MoGraphQl`] implementation.
pub fn create_app_with_client(
    settings: &Settings,
    mo: Arc<dyn MoGraphQl>,
    metrics: Option<PrometheusHandle>,
) -> anyhow::Result<App> {
    let listener = Arc::new(EngagementListener::new(mo, settings.rules()?));

    let mut amqp = AmqpSystem::new(settings.amqp_config());
    amqp.router_mut().update(&amqp_router(listener.clone()));

    let http = http::router(AppState {
        readiness: amqp.readiness(),
        listener,
        metrics,
    });

    Ok(App {
        amqp,
        http,
        bind: settings.http_bind,
    })
}

impl App {
    /// Runs until ctrl-c / SIGTERM, or until the AMQP system or HTTP server fails.
    pub async fn serve(self) -> anyhow::Result<()> {
        let tcp = tokio::net::TcpListener::bind(self.bind)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {}", self.bind))?;
        info!(bind = %self.bind, "HTTP server listening");

        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown requested");
            let _ = stop_tx.send(true);
        });

        let http = axum::serve(tcp, self.http).with_graceful_shutdown(stopped(stop_rx.clone()));
        let amqp = self.amqp.run(stopped(stop_rx));

        tokio::try_join!(
            async { http.await.context("HTTP server failed") },
            async { amqp.await.context("AMQP system failed") },
        )?;
        info!("Stopped");
        Ok(())
    }
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddrV4};

    use super::*;
    use crate::config::tests::settings;
    use crate::engagement_listener::tests::RecordingMo;

    #[test]
    fn listener_routes_are_merged_into_the_amqp_router() {
        let settings = settings(&[]);
        let app = create_app_with_client(&settings, RecordingMo::new(false), None).unwrap();

        let handlers: Vec<_> = app.amqp.router().handler_names().collect();
        assert_eq!(handlers, vec![EngagementListener::NAME]);
        assert_eq!(
            app.amqp.router().routing_keys(EngagementListener::NAME),
            vec!["engagement"]
        );
        assert_eq!(
            app.amqp.config().queue_name(EngagementListener::NAME),
            "os2mo-job-function-configurator_listener"
        );
        assert_eq!(
            app.bind,
            SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8000))
        );
    }

    #[test]
    fn invalid_rules_fail_bootstrap() {
        let settings = settings(&["--job-function-facet", ""]);
        assert!(create_app_with_client(&settings, RecordingMo::new(false), None).is_err());
    }

    #[test]
    fn real_client_builds_without_network() {
        let settings = settings(&[]);
        assert!(create_app(&settings, None).is_ok());
    }
}
