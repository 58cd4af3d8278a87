use actix_web::web::ServiceConfig;
use actix_web::{HttpResponse, Responder, get};

pub fn routes(cfg: &mut ServiceConfig) {
    cfg.service(health_route);
}

/// Health check route
/// This route returns no content, the response status is enough.
#[get("/health")]
pub async fn health_route() -> impl Responder {
    HttpResponse::Ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test};

    #[actix_web::test]
    async fn test_health_is_empty_ok() {
        let app = test::init_service(App::new().configure(routes)).await;
        let response = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;

        assert!(response.status().is_success());
        let body = test::read_body(response).await;
        assert!(body.is_empty());
    }
}
