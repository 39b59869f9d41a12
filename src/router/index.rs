use crate::comment::index::comment_routes;
use crate::community::index::community_routes;
use crate::post::index::post_routes;
use crate::realtime::index::realtime_routes;
use crate::utils::response::ok;
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;

async fn health() -> impl Responder {
    let response: HttpResponse = ok("Service is healthy", json!({ "status": "ok" }));
    response
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
    cfg.configure(community_routes);
    cfg.configure(post_routes);
    cfg.configure(comment_routes);
    cfg.configure(realtime_routes);
}
