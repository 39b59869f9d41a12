use std::sync::Arc;

use chrono::Utc;
use mongodb::bson::oid::ObjectId;

use crate::community::model::{
    AddRuleRequest, Community, CommunityChanges, CreateCommunityRequest, Membership,
    MembershipState, MembershipView, Privacy, Role, Roster, Rule, UpdateCommunityRequest,
    UpdateImagesRequest,
};
use crate::counters::CounterProjector;
use crate::database::ForumStore;
use crate::media::{MediaRef, MediaStore, purge_media};
use crate::realtime::model::{ForumEvent, Topic};
use crate::realtime::notifier::Notifier;
use crate::utils::error::ForumError;
use crate::utils::validation::{
    MAX_COMMUNITY_DESCRIPTION, MAX_COMMUNITY_NAME, MAX_RULE_DESCRIPTION, MAX_RULE_TITLE,
    normalize_tags, optional_text, required_text,
};

fn conflict_for(role: Role) -> ForumError {
    match role {
        Role::Pending => ForumError::Conflict("Join request already sent".to_string()),
        Role::Member | Role::Moderator => {
            ForumError::Conflict("Already a member of this community".to_string())
        }
    }
}

/// Replaced media that is no longer referenced after an update.
fn replaced(old: &Option<MediaRef>, new: &Option<MediaRef>) -> Option<MediaRef> {
    match (old, new) {
        (Some(old), Some(new)) if old.external_id != new.external_id => Some(old.clone()),
        _ => None,
    }
}

/// Communities and the membership state machine.
///
/// Each (community, user) pair has at most one membership row whose role is
/// `pending`, `member` or `moderator`; no row means no relation. The creator
/// holds a `member` row and derives its authority from `creator_id`.
pub struct CommunityService {
    store: Arc<dyn ForumStore>,
    notifier: Arc<dyn Notifier>,
    projector: Arc<CounterProjector>,
    media: Arc<dyn MediaStore>,
}

impl CommunityService {
    pub fn new(
        store: Arc<dyn ForumStore>,
        notifier: Arc<dyn Notifier>,
        projector: Arc<CounterProjector>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        CommunityService {
            store,
            notifier,
            projector,
            media,
        }
    }

    fn announce(&self, community_id: &ObjectId, user_id: &ObjectId, new_state: MembershipState) {
        self.notifier.publish(
            &Topic::Community(*community_id),
            &ForumEvent::MembershipChanged {
                community_id: community_id.to_hex(),
                user_id: user_id.to_hex(),
                new_state,
            },
        );
    }

    async fn role_of(&self, community_id: &ObjectId, user_id: &ObjectId) -> Result<Option<Role>, ForumError> {
        Ok(self
            .store
            .find_membership(community_id, user_id)
            .await?
            .map(|m| m.role))
    }

    pub async fn create_community(
        &self,
        creator_id: &ObjectId,
        req: CreateCommunityRequest,
    ) -> Result<Community, ForumError> {
        let name = required_text("Community name", &req.name, MAX_COMMUNITY_NAME)?;
        let description = required_text("Description", &req.description, MAX_COMMUNITY_DESCRIPTION)?;

        let now = Utc::now();
        let community = Community {
            id: ObjectId::new(),
            name,
            description,
            category: req.category,
            tags: normalize_tags(&req.tags),
            privacy: req.privacy,
            creator_id: *creator_id,
            member_count: 1,
            banner_image: req.banner_image,
            icon: req.icon,
            rules: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.store
            .insert_community(&community)
            .await
            .map_err(ForumError::not_retryable)?;

        let creator_row = Membership::new(community.id, *creator_id, Role::Member);
        if let Err(err) = self.store.insert_membership(&creator_row).await {
            log::error!(
                "Failed to register creator of community {}, rolling back: {}",
                community.id,
                err
            );
            if let Err(e) = self.store.delete_community(&community.id).await {
                log::error!("Rollback of community {} failed: {}", community.id, e);
            }
            return Err(err.not_retryable());
        }

        log::info!("Community {} created by {}", community.name, creator_id);
        Ok(community)
    }

    pub async fn get_community(&self, community_id: &ObjectId) -> Result<Community, ForumError> {
        self.store
            .find_community(community_id)
            .await?
            .ok_or_else(|| ForumError::NotFound("Community not found".to_string()))
    }

    pub async fn list_communities(&self) -> Result<Vec<Community>, ForumError> {
        self.store.list_communities().await
    }

    pub async fn search_communities(&self, query: &str) -> Result<Vec<Community>, ForumError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ForumError::InvalidArgument(
                "Search query is required".to_string(),
            ));
        }
        self.store.search_communities(query).await
    }

    /// Creator or moderator of the community.
    pub async fn can_moderate(&self, community: &Community, user_id: &ObjectId) -> Result<bool, ForumError> {
        if community.is_creator(user_id) {
            return Ok(true);
        }
        Ok(self.role_of(&community.id, user_id).await? == Some(Role::Moderator))
    }

    /// Creator, member or moderator of the community.
    pub async fn is_member(&self, community: &Community, user_id: &ObjectId) -> Result<bool, ForumError> {
        if community.is_creator(user_id) {
            return Ok(true);
        }
        Ok(self
            .role_of(&community.id, user_id)
            .await?
            .is_some_and(Role::is_member))
    }

    pub async fn membership_of(
        &self,
        community_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<MembershipView, ForumError> {
        let community = self.get_community(community_id).await?;
        let role = self.role_of(community_id, user_id).await?;
        let is_creator = community.is_creator(user_id);

        Ok(MembershipView {
            community_id: *community_id,
            user_id: *user_id,
            state: MembershipState::from(role),
            is_creator,
            can_moderate: is_creator || role == Some(Role::Moderator),
        })
    }

    /// Join requests are only listed for callers who can moderate.
    pub async fn roster(&self, community_id: &ObjectId, viewer: &ObjectId) -> Result<Roster, ForumError> {
        let community = self.get_community(community_id).await?;
        let show_requests = self.can_moderate(&community, viewer).await?;

        let mut roster = Roster {
            members: Vec::new(),
            moderators: Vec::new(),
            join_requests: Vec::new(),
        };
        for row in self.store.list_memberships(community_id).await? {
            match row.role {
                Role::Pending if show_requests => roster.join_requests.push(row.user_id),
                Role::Pending => {}
                Role::Member => roster.members.push(row.user_id),
                Role::Moderator => {
                    roster.members.push(row.user_id);
                    roster.moderators.push(row.user_id);
                }
            }
        }
        Ok(roster)
    }

    /// Public communities admit the caller at once; private ones record a
    /// pending request.
    pub async fn join(&self, community_id: &ObjectId, user_id: &ObjectId) -> Result<MembershipView, ForumError> {
        let community = self.get_community(community_id).await?;
        if let Some(role) = self.role_of(community_id, user_id).await? {
            return Err(conflict_for(role));
        }

        let role = match community.privacy {
            Privacy::Public => Role::Member,
            Privacy::Private => Role::Pending,
        };
        let inserted = self
            .store
            .insert_membership(&Membership::new(*community_id, *user_id, role))
            .await?;
        if !inserted {
            // A concurrent join won the race; report what it created.
            let existing = self.role_of(community_id, user_id).await?.unwrap_or(role);
            return Err(conflict_for(existing));
        }

        if role.is_member() {
            self.projector.member_joined(community_id).await;
        }
        let state = MembershipState::from(Some(role));
        self.announce(community_id, user_id, state);

        Ok(MembershipView {
            community_id: *community_id,
            user_id: *user_id,
            state,
            is_creator: false,
            can_moderate: false,
        })
    }

    pub async fn approve(
        &self,
        community_id: &ObjectId,
        caller: &ObjectId,
        requester: &ObjectId,
    ) -> Result<(), ForumError> {
        let community = self.get_community(community_id).await?;
        if !self.can_moderate(&community, caller).await? {
            return Err(ForumError::Forbidden(
                "Only moderators can approve join requests".to_string(),
            ));
        }

        if !self
            .store
            .transition_membership(community_id, requester, Role::Pending, Role::Member)
            .await?
        {
            return Err(ForumError::NotFound(
                "No pending join request for this user".to_string(),
            ));
        }

        self.projector.member_joined(community_id).await;
        self.announce(community_id, requester, MembershipState::Member);
        Ok(())
    }

    /// Leaving drops the membership row, and moderator rights with it.
    pub async fn leave(&self, community_id: &ObjectId, user_id: &ObjectId) -> Result<(), ForumError> {
        let community = self.get_community(community_id).await?;
        if community.is_creator(user_id) {
            return Err(ForumError::Forbidden(
                "The creator cannot leave the community".to_string(),
            ));
        }

        if !self
            .store
            .remove_membership(community_id, user_id, &[Role::Member, Role::Moderator])
            .await?
        {
            return Err(ForumError::InvalidState(
                "Not a member of this community".to_string(),
            ));
        }

        self.projector.member_left(community_id).await;
        self.announce(community_id, user_id, MembershipState::None);
        Ok(())
    }

    pub async fn promote(
        &self,
        community_id: &ObjectId,
        caller: &ObjectId,
        target: &ObjectId,
    ) -> Result<(), ForumError> {
        let community = self.get_community(community_id).await?;
        if !community.is_creator(caller) {
            return Err(ForumError::Forbidden(
                "Only the creator can promote members".to_string(),
            ));
        }
        if community.is_creator(target) {
            return Err(ForumError::InvalidState(
                "The creator already has moderator rights".to_string(),
            ));
        }

        if !self
            .store
            .transition_membership(community_id, target, Role::Member, Role::Moderator)
            .await?
        {
            let message = match self.role_of(community_id, target).await? {
                Some(Role::Moderator) => "User is already a moderator",
                _ => "User is not a member of this community",
            };
            return Err(ForumError::InvalidState(message.to_string()));
        }

        self.announce(community_id, target, MembershipState::Moderator);
        Ok(())
    }

    pub async fn demote(
        &self,
        community_id: &ObjectId,
        caller: &ObjectId,
        target: &ObjectId,
    ) -> Result<(), ForumError> {
        let community = self.get_community(community_id).await?;
        if !community.is_creator(caller) {
            return Err(ForumError::Forbidden(
                "Only the creator can demote moderators".to_string(),
            ));
        }
        if community.is_creator(target) {
            return Err(ForumError::InvalidState(
                "The creator cannot be demoted".to_string(),
            ));
        }

        if !self
            .store
            .transition_membership(community_id, target, Role::Moderator, Role::Member)
            .await?
        {
            return Err(ForumError::InvalidState("User is not a moderator".to_string()));
        }

        self.announce(community_id, target, MembershipState::Member);
        Ok(())
    }

    pub async fn add_rule(
        &self,
        community_id: &ObjectId,
        caller: &ObjectId,
        req: AddRuleRequest,
    ) -> Result<Community, ForumError> {
        let community = self.get_community(community_id).await?;
        if !self.can_moderate(&community, caller).await? {
            return Err(ForumError::Forbidden(
                "Only moderators can add rules".to_string(),
            ));
        }

        let rule = Rule {
            title: required_text("Rule title", &req.title, MAX_RULE_TITLE)?,
            description: required_text("Rule description", &req.description, MAX_RULE_DESCRIPTION)?,
        };
        self.store
            .push_rule(community_id, &rule)
            .await?
            .ok_or_else(|| ForumError::NotFound("Community not found".to_string()))
    }

    pub async fn update_community(
        &self,
        community_id: &ObjectId,
        caller: &ObjectId,
        req: UpdateCommunityRequest,
    ) -> Result<Community, ForumError> {
        let community = self.get_community(community_id).await?;
        if !self.can_moderate(&community, caller).await? {
            return Err(ForumError::Forbidden(
                "Only moderators can update this community".to_string(),
            ));
        }

        let changes = CommunityChanges {
            description: optional_text(
                "Description",
                req.description.as_deref(),
                MAX_COMMUNITY_DESCRIPTION,
            )?,
            category: req.category,
            tags: req.tags.as_deref().map(normalize_tags),
            privacy: req.privacy,
            ..CommunityChanges::default()
        };
        if changes.is_empty() {
            return Err(ForumError::InvalidArgument("Nothing to update".to_string()));
        }

        self.store
            .update_community(community_id, &changes)
            .await?
            .ok_or_else(|| ForumError::NotFound("Community not found".to_string()))
    }

    /// Swaps banner and icon references, then deletes the replaced files
    /// from the media store on a best-effort basis.
    pub async fn update_images(
        &self,
        community_id: &ObjectId,
        caller: &ObjectId,
        req: UpdateImagesRequest,
    ) -> Result<Community, ForumError> {
        let community = self.get_community(community_id).await?;
        if !self.can_moderate(&community, caller).await? {
            return Err(ForumError::Forbidden(
                "Only moderators can update community images".to_string(),
            ));
        }

        let changes = CommunityChanges {
            banner_image: req.banner_image,
            icon: req.icon,
            ..CommunityChanges::default()
        };
        if changes.is_empty() {
            return Err(ForumError::InvalidArgument(
                "A banner image or icon is required".to_string(),
            ));
        }

        let updated = self
            .store
            .update_community(community_id, &changes)
            .await?
            .ok_or_else(|| ForumError::NotFound("Community not found".to_string()))?;

        let stale: Vec<MediaRef> = [
            replaced(&community.banner_image, &updated.banner_image),
            replaced(&community.icon, &updated.icon),
        ]
        .into_iter()
        .flatten()
        .collect();
        purge_media(self.media.as_ref(), &stale).await;

        Ok(updated)
    }

    pub async fn delete_community(&self, community_id: &ObjectId, caller: &ObjectId) -> Result<(), ForumError> {
        let community = self.get_community(community_id).await?;
        if !community.is_creator(caller) {
            return Err(ForumError::Forbidden(
                "Only the creator can delete this community".to_string(),
            ));
        }

        if !self.store.delete_community(community_id).await? {
            return Err(ForumError::NotFound("Community not found".to_string()));
        }
        let removed = self.store.delete_memberships(community_id).await?;
        log::info!(
            "Community {} deleted with {} membership rows",
            community_id,
            removed
        );

        let media: Vec<MediaRef> = community
            .banner_image
            .into_iter()
            .chain(community.icon)
            .collect();
        purge_media(self.media.as_ref(), &media).await;
        Ok(())
    }
}
