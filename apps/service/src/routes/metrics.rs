use actix_web::web::{Data, ServiceConfig};
use actix_web::{HttpResponse, Responder, get};
use tracing::error;

use crate::metrics::PrometheusMetrics;

pub fn routes(cfg: &mut ServiceConfig) {
    cfg.service(metrics_route);
}

/// Prometheus scrape endpoint
#[get("/metrics")]
pub async fn metrics_route(metrics: Data<PrometheusMetrics>) -> impl Responder {
    match metrics.render() {
        Ok(body) => HttpResponse::Ok().content_type("text/plain; version=0.0.4").body(body),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test};
    use sitewatch::MetricsRecorder;

    #[actix_web::test]
    async fn test_metrics_exposition() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.malformed_message();

        let app = test::init_service(
            App::new().app_data(Data::new(metrics)).configure(routes),
        )
        .await;
        let response = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;

        assert!(response.status().is_success());
        let body = test::read_body(response).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("alert_malformed_messages_total 1"));
    }
}
