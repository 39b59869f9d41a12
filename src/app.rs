use std::sync::Arc;

use actix_web::web;

use crate::comment::service::CommentService;
use crate::community::service::CommunityService;
use crate::counters::CounterProjector;
use crate::database::ForumStore;
use crate::media::MediaStore;
use crate::post::service::PostService;
use crate::realtime::notifier::Notifier;
use crate::vote::service::VoteService;

/// The request-facing services, built once and shared by every worker.
#[derive(Clone)]
pub struct ForumServices {
    pub communities: web::Data<CommunityService>,
    pub posts: web::Data<PostService>,
    pub comments: web::Data<CommentService>,
    pub votes: web::Data<VoteService>,
}

impl ForumServices {
    pub fn new(
        store: Arc<dyn ForumStore>,
        notifier: Arc<dyn Notifier>,
        media: Arc<dyn MediaStore>,
        projector: Arc<CounterProjector>,
    ) -> Self {
        let communities = Arc::new(CommunityService::new(
            store.clone(),
            notifier.clone(),
            projector.clone(),
            media.clone(),
        ));
        let posts = PostService::new(store.clone(), communities.clone(), media.clone());
        let comments = CommentService::new(store.clone(), notifier.clone(), projector, media);
        let votes = VoteService::new(store, notifier);

        ForumServices {
            communities: web::Data::from(communities),
            posts: web::Data::new(posts),
            comments: web::Data::new(comments),
            votes: web::Data::new(votes),
        }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.communities.clone())
            .app_data(self.posts.clone())
            .app_data(self.comments.clone())
            .app_data(self.votes.clone());
    }
}
