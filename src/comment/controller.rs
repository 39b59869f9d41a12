use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;

use crate::comment::model::{
    CommentListQuery, CommentView, CreateCommentRequest, UpdateCommentRequest,
};
use crate::comment::service::CommentService;
use crate::middleware::auth::authenticated_user;
use crate::utils::error::ForumError;
use crate::utils::response::{created, ok};
use crate::utils::validation::parse_object_id;

/// Create a comment or a reply
/// POST /comments
pub async fn create_comment(
    comment_service: web::Data<CommentService>,
    body: web::Json<CreateCommentRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let author_id = authenticated_user(&req)?;
    let comment = comment_service
        .create_comment(&author_id, body.into_inner())
        .await?;
    let comment = CommentView::for_viewer(comment, &author_id);

    Ok(created("Comment added successfully", json!({ "comment": comment })))
}

/// Top-level comments of a post
/// GET /comments/post/{post_id}?sort=newest|oldest|popular
pub async fn get_post_comments(
    post_id: web::Path<String>,
    query: web::Query<CommentListQuery>,
    comment_service: web::Data<CommentService>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let post_id = parse_object_id(&post_id, "post")?;
    let comments: Vec<CommentView> = comment_service
        .list_post_comments(&post_id, query.sort)
        .await?
        .into_iter()
        .map(|comment| CommentView::for_viewer(comment, &caller))
        .collect();

    Ok(ok(
        "Comments fetched successfully",
        json!({ "count": comments.len(), "comments": comments }),
    ))
}

/// GET /comments/{id}/replies
pub async fn get_replies(
    comment_id: web::Path<String>,
    comment_service: web::Data<CommentService>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let comment_id = parse_object_id(&comment_id, "comment")?;
    let replies: Vec<CommentView> = comment_service
        .list_replies(&comment_id)
        .await?
        .into_iter()
        .map(|reply| CommentView::for_viewer(reply, &caller))
        .collect();

    Ok(ok(
        "Replies fetched successfully",
        json!({ "count": replies.len(), "replies": replies }),
    ))
}

pub async fn update_comment(
    comment_id: web::Path<String>,
    comment_service: web::Data<CommentService>,
    body: web::Json<UpdateCommentRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let comment_id = parse_object_id(&comment_id, "comment")?;
    let comment = comment_service
        .update_comment(&comment_id, &caller, body.into_inner())
        .await?;
    let comment = CommentView::for_viewer(comment, &caller);

    Ok(ok("Comment updated successfully", json!({ "comment": comment })))
}

pub async fn delete_comment(
    comment_id: web::Path<String>,
    comment_service: web::Data<CommentService>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let comment_id = parse_object_id(&comment_id, "comment")?;
    comment_service.delete_comment(&comment_id, &caller).await?;

    Ok(ok("Comment deleted successfully", json!({})))
}
