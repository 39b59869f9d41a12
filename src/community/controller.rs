use actix_web::{HttpRequest, HttpResponse, web};
use mongodb::bson::oid::ObjectId;
use serde_json::json;

use crate::community::model::{
    AddRuleRequest, CreateCommunityRequest, MembershipState, SearchQuery, UpdateCommunityRequest,
    UpdateImagesRequest,
};
use crate::community::service::CommunityService;
use crate::middleware::auth::authenticated_user;
use crate::utils::error::ForumError;
use crate::utils::response::{created, ok};
use crate::utils::validation::parse_object_id;

pub async fn create_community(
    community_service: web::Data<CommunityService>,
    body: web::Json<CreateCommunityRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let creator_id = authenticated_user(&req)?;
    let community = community_service
        .create_community(&creator_id, body.into_inner())
        .await?;

    Ok(created(
        "Community created successfully",
        json!({ "community": community }),
    ))
}

pub async fn list_communities(
    community_service: web::Data<CommunityService>,
) -> Result<HttpResponse, ForumError> {
    let communities = community_service.list_communities().await?;

    Ok(ok(
        "Communities fetched successfully",
        json!({ "count": communities.len(), "communities": communities }),
    ))
}

/// GET /community/search?q=
pub async fn search_communities(
    query: web::Query<SearchQuery>,
    community_service: web::Data<CommunityService>,
) -> Result<HttpResponse, ForumError> {
    let communities = community_service.search_communities(&query.q).await?;

    Ok(ok(
        "Search completed",
        json!({ "count": communities.len(), "communities": communities }),
    ))
}

pub async fn get_community(
    community_id: web::Path<String>,
    community_service: web::Data<CommunityService>,
) -> Result<HttpResponse, ForumError> {
    let community_id = parse_object_id(&community_id, "community")?;
    let community = community_service.get_community(&community_id).await?;

    Ok(ok(
        "Community fetched successfully",
        json!({ "community": community }),
    ))
}

pub async fn update_community(
    community_id: web::Path<String>,
    community_service: web::Data<CommunityService>,
    body: web::Json<UpdateCommunityRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let community_id = parse_object_id(&community_id, "community")?;
    let community = community_service
        .update_community(&community_id, &caller, body.into_inner())
        .await?;

    Ok(ok(
        "Community updated successfully",
        json!({ "community": community }),
    ))
}

pub async fn delete_community(
    community_id: web::Path<String>,
    community_service: web::Data<CommunityService>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let community_id = parse_object_id(&community_id, "community")?;
    community_service
        .delete_community(&community_id, &caller)
        .await?;

    Ok(ok("Community deleted successfully", json!({})))
}

pub async fn join_community(
    community_id: web::Path<String>,
    community_service: web::Data<CommunityService>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let user_id = authenticated_user(&req)?;
    let community_id = parse_object_id(&community_id, "community")?;
    let membership = community_service.join(&community_id, &user_id).await?;

    let message = if membership.state == MembershipState::Pending {
        "Join request sent"
    } else {
        "Joined community successfully"
    };
    Ok(ok(message, json!({ "membership": membership })))
}

pub async fn leave_community(
    community_id: web::Path<String>,
    community_service: web::Data<CommunityService>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let user_id = authenticated_user(&req)?;
    let community_id = parse_object_id(&community_id, "community")?;
    community_service.leave(&community_id, &user_id).await?;

    Ok(ok("Left community successfully", json!({})))
}

/// The caller's own relation to the community
/// GET /community/{id}/membership
pub async fn get_membership(
    community_id: web::Path<String>,
    community_service: web::Data<CommunityService>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let user_id = authenticated_user(&req)?;
    let community_id = parse_object_id(&community_id, "community")?;
    let membership = community_service
        .membership_of(&community_id, &user_id)
        .await?;

    Ok(ok(
        "Membership fetched successfully",
        json!({ "membership": membership }),
    ))
}

pub async fn get_members(
    community_id: web::Path<String>,
    community_service: web::Data<CommunityService>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let viewer = authenticated_user(&req)?;
    let community_id = parse_object_id(&community_id, "community")?;
    let roster = community_service.roster(&community_id, &viewer).await?;

    Ok(ok("Members fetched successfully", json!({ "roster": roster })))
}

fn ids(path: web::Path<(String, String)>) -> Result<(ObjectId, ObjectId), ForumError> {
    let (community_id, user_id) = path.into_inner();
    Ok((
        parse_object_id(&community_id, "community")?,
        parse_object_id(&user_id, "user")?,
    ))
}

pub async fn approve_request(
    path: web::Path<(String, String)>,
    community_service: web::Data<CommunityService>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let (community_id, requester) = ids(path)?;
    community_service
        .approve(&community_id, &caller, &requester)
        .await?;

    Ok(ok("Join request approved", json!({})))
}

pub async fn promote_member(
    path: web::Path<(String, String)>,
    community_service: web::Data<CommunityService>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let (community_id, target) = ids(path)?;
    community_service
        .promote(&community_id, &caller, &target)
        .await?;

    Ok(ok("Member promoted to moderator", json!({})))
}

pub async fn demote_moderator(
    path: web::Path<(String, String)>,
    community_service: web::Data<CommunityService>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let (community_id, target) = ids(path)?;
    community_service
        .demote(&community_id, &caller, &target)
        .await?;

    Ok(ok("Moderator demoted to member", json!({})))
}

pub async fn add_rule(
    community_id: web::Path<String>,
    community_service: web::Data<CommunityService>,
    body: web::Json<AddRuleRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let community_id = parse_object_id(&community_id, "community")?;
    let community = community_service
        .add_rule(&community_id, &caller, body.into_inner())
        .await?;

    Ok(ok("Rule added successfully", json!({ "community": community })))
}

pub async fn update_images(
    community_id: web::Path<String>,
    community_service: web::Data<CommunityService>,
    body: web::Json<UpdateImagesRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, ForumError> {
    let caller = authenticated_user(&req)?;
    let community_id = parse_object_id(&community_id, "community")?;
    let community = community_service
        .update_images(&community_id, &caller, body.into_inner())
        .await?;

    Ok(ok(
        "Community images updated successfully",
        json!({ "community": community }),
    ))
}
