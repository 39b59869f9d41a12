use super::controller::{
    add_rule, approve_request, create_community, delete_community, demote_moderator,
    get_community, get_members, get_membership, join_community, leave_community,
    list_communities, promote_member, search_communities, update_community, update_images,
};
use crate::middleware::auth::verify_token;
use crate::post::controller::community_posts;
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

pub fn community_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/community")
            .wrap(HttpAuthentication::bearer(verify_token))
            .route("", web::post().to(create_community))
            .route("", web::get().to(list_communities))
            .route("/search", web::get().to(search_communities))
            .route("/{id}", web::get().to(get_community))
            .route("/{id}", web::put().to(update_community))
            .route("/{id}", web::delete().to(delete_community))
            .route("/{id}/join", web::post().to(join_community))
            .route("/{id}/leave", web::post().to(leave_community))
            .route("/{id}/membership", web::get().to(get_membership))
            .route("/{id}/members", web::get().to(get_members))
            .route("/{id}/approve/{user_id}", web::post().to(approve_request))
            .route("/{id}/promote/{user_id}", web::post().to(promote_member))
            .route("/{id}/demote/{user_id}", web::post().to(demote_moderator))
            .route("/{id}/rules", web::post().to(add_rule))
            .route("/{id}/images", web::post().to(update_images))
            .route("/{id}/posts", web::get().to(community_posts)),
    );
}
