use crate::database::redis::RedisService;
use crate::utils::config::AppConfig;
use crate::utils::error::ForumError;
use actix_web::{Error, HttpMessage, HttpRequest, dev::ServiceRequest, web};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{DecodingKey, Validation, decode};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Token claims; `id` is the caller's user id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub id: String,
    pub exp: usize,
}

fn jwt_secret(req: &ServiceRequest) -> String {
    req.app_data::<web::Data<AppConfig>>()
        .map(|config| config.jwt_secret.clone())
        .unwrap_or_else(|| std::env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()))
}

pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, ForumError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ForumError::Unauthorized("Invalid token".to_string()))
}

/// Verify JWT token and validate session in Redis
pub async fn verify_token(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let token = credentials.token();

    let claims = match decode_claims(token, &jwt_secret(&req)) {
        Ok(claims) => claims,
        Err(e) => return Err((e.into(), req)),
    };

    let redis_service = match req.app_data::<web::Data<RedisService>>() {
        Some(service) => service,
        None => {
            // Without Redis only the signature and expiry are checked
            req.extensions_mut().insert(claims);
            return Ok(req);
        }
    };

    match redis_service.validate_session(token).await {
        Ok(Some(stored_user_id)) if stored_user_id == claims.id => {
            req.extensions_mut().insert(claims);
            Ok(req)
        }
        Ok(Some(_)) => Err((
            ForumError::Unauthorized("Session mismatch".to_string()).into(),
            req,
        )),
        Ok(None) => Err((
            ForumError::Unauthorized("Session expired or invalid".to_string()).into(),
            req,
        )),
        Err(e) => {
            log::warn!("Session lookup failed, accepting signed token: {}", e);
            req.extensions_mut().insert(claims);
            Ok(req)
        }
    }
}

/// Caller id placed in the request by [`verify_token`].
pub fn authenticated_user(req: &HttpRequest) -> Result<ObjectId, ForumError> {
    let extensions = req.extensions();
    let claims = extensions
        .get::<Claims>()
        .ok_or_else(|| ForumError::Unauthorized("Missing credentials".to_string()))?;

    ObjectId::parse_str(&claims.id)
        .map_err(|_| ForumError::Unauthorized("Token does not carry a valid user id".to_string()))
}
