use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;

use crate::middleware::auth::authenticated_user;
use crate::post::model::{CreatePostRequest, PostView, UpdatePostRequest};
use crate::post::service::{PostRemoval, PostService};
use crate::utils::error::ForumError;
use crate::utils::response::{created, ok};
use crate::utils::validation::parse_object_id;

pub async fn create_post(
    post_service: web::Data<PostService>,
    body: web::Json<CreatePostRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let author_id = authenticated_user(&req)?;
    let post = post_service.create_post(&author_id, body.into_inner()).await?;
    let post = PostView::for_viewer(post, &author_id);

    Ok(created("Post created successfully", json!({ "post": post })))
}

pub async fn get_post(
    post_id: web::Path<String>,
    post_service: web::Data<PostService>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let post_id = parse_object_id(&post_id, "post")?;
    let post = PostView::for_viewer(post_service.get_post(&post_id).await?, &caller);

    Ok(ok("Post fetched successfully", json!({ "post": post })))
}

pub async fn update_post(
    post_id: web::Path<String>,
    post_service: web::Data<PostService>,
    body: web::Json<UpdatePostRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let post_id = parse_object_id(&post_id, "post")?;
    let post = post_service
        .update_post(&post_id, &caller, body.into_inner())
        .await?;
    let post = PostView::for_viewer(post, &caller);

    Ok(ok("Post updated successfully", json!({ "post": post })))
}

pub async fn delete_post(
    post_id: web::Path<String>,
    post_service: web::Data<PostService>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let post_id = parse_object_id(&post_id, "post")?;

    let message = match post_service.delete_post(&post_id, &caller).await? {
        PostRemoval::Soft | PostRemoval::Hard => "Post deleted successfully",
        PostRemoval::AlreadyDeleted => "Post was already deleted",
    };
    Ok(ok(message, json!({})))
}

pub async fn community_posts(
    community_id: web::Path<String>,
    post_service: web::Data<PostService>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let community_id = parse_object_id(&community_id, "community")?;
    let posts: Vec<PostView> = post_service
        .list_community_posts(&community_id)
        .await?
        .into_iter()
        .map(|post| PostView::for_viewer(post, &caller))
        .collect();

    Ok(ok(
        "Posts fetched successfully",
        json!({ "count": posts.len(), "posts": posts }),
    ))
}
