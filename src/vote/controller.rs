use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;

use crate::middleware::auth::authenticated_user;
use crate::utils::error::ForumError;
use crate::utils::response::ok;
use crate::utils::validation::parse_object_id;
use crate::vote::model::{VoteRequest, VoteTarget};
use crate::vote::service::VoteService;

async fn cast(
    target: VoteTarget,
    raw_id: &str,
    vote_service: &VoteService,
    body: VoteRequest,
    req: &HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let user_id = authenticated_user(req)?;
    let label = match target {
        VoteTarget::Post => "post",
        VoteTarget::Comment => "comment",
    };
    let entity_id = parse_object_id(raw_id, label)?;

    let outcome = vote_service
        .vote(target, &entity_id, &user_id, &body.vote_type)
        .await?;

    let message = match outcome.user_vote {
        Some(_) => "Vote recorded",
        None => "Vote removed",
    };
    Ok(ok(message, json!({ "vote": outcome })))
}

pub async fn vote_post(
    post_id: web::Path<String>,
    vote_service: web::Data<VoteService>,
    body: web::Json<VoteRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    cast(VoteTarget::Post, &post_id, &vote_service, body.into_inner(), &req).await
}

pub async fn vote_comment(
    comment_id: web::Path<String>,
    vote_service: web::Data<VoteService>,
    body: web::Json<VoteRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    cast(VoteTarget::Comment, &comment_id, &vote_service, body.into_inner(), &req).await
}
