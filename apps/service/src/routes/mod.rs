use actix_web::web::ServiceConfig;

mod health;
mod metrics;

pub fn routes(cfg: &mut ServiceConfig) {
    health::routes(cfg);
    metrics::routes(cfg);
}
