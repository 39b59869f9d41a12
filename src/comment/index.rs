use super::controller::{create_comment, delete_comment, get_post_comments, get_replies, update_comment};
use crate::middleware::auth::verify_token;
use crate::vote::controller::vote_comment;
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

pub fn comment_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/comments")
            .wrap(HttpAuthentication::bearer(verify_token))
            .route("", web::post().to(create_comment))
            .route("/post/{post_id}", web::get().to(get_post_comments))
            .route("/{id}/replies", web::get().to(get_replies))
            .route("/{id}", web::put().to(update_comment))
            .route("/{id}", web::delete().to(delete_comment))
            .route("/{id}/vote", web::post().to(vote_comment)),
    );
}
