use actix::Addr;
use actix_web::{HttpRequest, HttpResponse, web};
use actix_web_actors::ws;
use serde::Deserialize;

use crate::middleware::auth::decode_claims;
use crate::realtime::hub::TopicHub;
use crate::realtime::session::WsSession;
use crate::utils::config::AppConfig;

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket endpoint. The token travels in the query string because
/// browsers cannot set headers on upgrade requests; a missing or invalid
/// token yields an anonymous session.
/// GET /ws?token=<jwt_token>
pub async fn ws_connect(
    req: HttpRequest,
    stream: web::Payload,
    hub: web::Data<Addr<TopicHub>>,
    config: web::Data<AppConfig>,
    query: web::Query<WsQuery>,
) -> Result<HttpResponse, actix_web::Error> {
    let user_id = query
        .token
        .as_deref()
        .and_then(|token| match decode_claims(token, &config.jwt_secret) {
            Ok(claims) => Some(claims.id),
            Err(_) => {
                log::warn!("Rejected WebSocket token, continuing anonymously");
                None
            }
        });

    log::info!(
        "WebSocket connection request from {}",
        user_id.as_deref().unwrap_or("anonymous")
    );

    let session = WsSession::new(user_id, hub.get_ref().clone());
    ws::start(session, &req, stream)
}
