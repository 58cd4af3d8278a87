//! Operational HTTP endpoint (`/health`, `/metrics`)

use std::net::SocketAddr;

use actix_web::dev::Server;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use sitewatch::Shutdown;
use tracing::info;

use crate::error::AppError;
use crate::metrics::PrometheusMetrics;
use crate::routes;

/// Bind the listener. Failing here is fatal, so it happens before the pipeline starts.
pub fn bind(addr: &str, metrics: PrometheusMetrics) -> Result<Server, AppError> {
    let addr: SocketAddr = addr.parse()?;
    let metrics = Data::new(metrics);

    let server = HttpServer::new(move || {
        App::new().app_data(metrics.clone()).configure(routes::routes)
    })
    .workers(1)
    .disable_signals()
    .bind(addr)?
    .run();

    info!(%addr, "Operational endpoint listening");
    Ok(server)
}

/// Serve until `shutdown` fires.
pub async fn serve(server: Server, mut shutdown: Shutdown) -> Result<(), AppError> {
    let handle = server.handle();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        handle.stop(true).await;
    });

    server.await?;
    info!("Operational endpoint stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_bind_address() {
        let metrics = PrometheusMetrics::new().unwrap();
        assert!(matches!(bind("not-an-address", metrics), Err(AppError::AddrParse(_))));
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let server = bind(&format!("127.0.0.1:{port}"), PrometheusMetrics::new().unwrap()).unwrap();
        let (trigger, shutdown) = sitewatch::shutdown::channel();
        let serving = tokio::spawn(serve(server, shutdown));

        let response = reqwest::get(format!("http://127.0.0.1:{port}/health")).await.unwrap();
        assert_eq!(response.status(), 200);

        trigger.trigger();
        tokio::time::timeout(std::time::Duration::from_secs(10), serving)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
