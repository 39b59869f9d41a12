mod common;

use mongodb::bson::oid::ObjectId;

use forum_backend::comment::model::CommentSort;
use forum_backend::community::model::{MembershipState, Privacy};
use forum_backend::counters::Reconciler;
use forum_backend::database::ForumStore;
use forum_backend::realtime::{ForumEvent, Topic};
use forum_backend::utils::error::ForumError;
use forum_backend::utils::validation::DELETED_MARKER;
use forum_backend::vote::model::{VoteTarget, VoteType};

use common::{community_request, forum};

#[actix_web::test]
async fn membership_walkthrough() {
    let forum = forum();
    let (u1, u2, u3) = (ObjectId::new(), ObjectId::new(), ObjectId::new());

    let c = forum
        .communities
        .create_community(&u1, community_request("rustaceans", Privacy::Public))
        .await
        .unwrap();
    assert_eq!(c.member_count, 1);

    let joined = forum.communities.join(&c.id, &u2).await.unwrap();
    assert_eq!(joined.state, MembershipState::Member);

    let roster = forum.communities.roster(&c.id, &u1).await.unwrap();
    assert_eq!(roster.members.len(), 2);
    assert!(roster.members.contains(&u1) && roster.members.contains(&u2));
    assert_eq!(forum.communities.get_community(&c.id).await.unwrap().member_count, 2);

    match forum.communities.join(&c.id, &u2).await {
        Err(ForumError::Conflict(message)) => assert!(message.starts_with("Already a member")),
        other => panic!("expected conflict, got {:?}", other),
    }
    assert_eq!(forum.communities.get_community(&c.id).await.unwrap().member_count, 2);

    forum.communities.promote(&c.id, &u1, &u2).await.unwrap();
    let roster = forum.communities.roster(&c.id, &u1).await.unwrap();
    assert_eq!(roster.moderators, vec![u2]);

    // A private community D where U2 moderates and U3 waits for approval.
    let d = forum
        .communities
        .create_community(&u1, community_request("rust-internals", Privacy::Private))
        .await
        .unwrap();
    forum.communities.join(&d.id, &u2).await.unwrap();
    forum.communities.approve(&d.id, &u1, &u2).await.unwrap();
    forum.communities.promote(&d.id, &u1, &u2).await.unwrap();

    let pending = forum.communities.join(&d.id, &u3).await.unwrap();
    assert_eq!(pending.state, MembershipState::Pending);
    let before = forum.communities.roster(&d.id, &u2).await.unwrap();
    assert_eq!(before.join_requests, vec![u3]);

    forum.communities.approve(&d.id, &u2, &u3).await.unwrap();
    let after = forum.communities.roster(&d.id, &u2).await.unwrap();
    assert!(after.members.contains(&u3));
    assert!(after.join_requests.is_empty());
    assert_eq!(forum.communities.get_community(&d.id).await.unwrap().member_count, 3);

    assert!(matches!(
        forum.communities.approve(&d.id, &u2, &u3).await,
        Err(ForumError::NotFound(_))
    ));
    assert_eq!(forum.communities.get_community(&d.id).await.unwrap().member_count, 3);
}

#[actix_web::test]
async fn only_the_creator_promotes() {
    let forum = forum();
    let (creator, member, other) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
    let c = forum
        .communities
        .create_community(&creator, community_request("gophers", Privacy::Public))
        .await
        .unwrap();
    forum.communities.join(&c.id, &member).await.unwrap();
    forum.communities.join(&c.id, &other).await.unwrap();

    assert!(matches!(
        forum.communities.promote(&c.id, &member, &other).await,
        Err(ForumError::Forbidden(_))
    ));
    let roster = forum.communities.roster(&c.id, &creator).await.unwrap();
    assert!(roster.moderators.is_empty());
}

#[actix_web::test]
async fn voting_walkthrough() {
    let forum = forum();
    let (owner, a, b) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
    let c = forum
        .communities
        .create_community(&owner, community_request("votes", Privacy::Public))
        .await
        .unwrap();
    let p = forum.post_in(&c.id, &owner).await;

    let steps = [
        (a, "up", 1, 0, Some(VoteType::Up)),
        (b, "up", 2, 0, Some(VoteType::Up)),
        (a, "down", 1, 1, Some(VoteType::Down)),
        (a, "down", 1, 0, None),
    ];
    for (user, vote, up, down, caller_vote) in steps {
        let outcome = forum.votes.vote(VoteTarget::Post, &p, &user, vote).await.unwrap();
        assert_eq!((outcome.upvotes, outcome.downvotes), (up, down));
        assert_eq!(outcome.user_vote, caller_vote);

        let post = forum.store.find_post(&p).await.unwrap().unwrap();
        let ups = post.voters.iter().filter(|v| v.vote_type == VoteType::Up).count() as i64;
        let downs = post.voters.iter().filter(|v| v.vote_type == VoteType::Down).count() as i64;
        assert_eq!((post.upvotes, post.downvotes), (ups, downs));
    }

    let post = forum.store.find_post(&p).await.unwrap().unwrap();
    assert!(post.voters.iter().all(|v| v.user_id != a));

    let vote_events = forum
        .bus
        .on_topic(&Topic::Post(p))
        .into_iter()
        .filter(|e| matches!(e, ForumEvent::VoteChanged { .. }))
        .count();
    assert_eq!(vote_events, 4);
}

#[actix_web::test]
async fn comment_votes_follow_the_same_toggle() {
    let forum = forum();
    let (owner, voter) = (ObjectId::new(), ObjectId::new());
    let c = forum
        .communities
        .create_community(&owner, community_request("comment-votes", Privacy::Public))
        .await
        .unwrap();
    let p = forum.post_in(&c.id, &owner).await;
    let comment = forum.comment_on(&p, &owner, None).await;

    let up = forum.votes.vote(VoteTarget::Comment, &comment, &voter, "up").await.unwrap();
    assert_eq!(up.upvotes, 1);
    let down = forum.votes.vote(VoteTarget::Comment, &comment, &voter, "down").await.unwrap();
    assert_eq!((down.upvotes, down.downvotes), (0, 1));

    assert!(matches!(
        forum.votes.vote(VoteTarget::Comment, &comment, &voter, "meh").await,
        Err(ForumError::InvalidArgument(_))
    ));
    assert!(matches!(
        forum.votes.vote(VoteTarget::Comment, &ObjectId::new(), &voter, "up").await,
        Err(ForumError::NotFound(_))
    ));
}

#[actix_web::test]
async fn deleting_a_comment_keeps_its_replies() {
    let forum = forum();
    let owner = ObjectId::new();
    let c = forum
        .communities
        .create_community(&owner, community_request("threads", Privacy::Public))
        .await
        .unwrap();
    let p = forum.post_in(&c.id, &owner).await;

    let root = forum.comment_on(&p, &owner, None).await;
    let reply = forum.comment_on(&p, &owner, Some(&root)).await;
    assert_eq!(forum.store.find_post(&p).await.unwrap().unwrap().comment_count, 2);

    forum.comments.delete_comment(&root, &owner).await.unwrap();

    let deleted = forum.store.find_comment(&root).await.unwrap().unwrap();
    assert!(deleted.is_deleted);
    assert_eq!(deleted.content, DELETED_MARKER);
    assert_eq!(forum.store.find_post(&p).await.unwrap().unwrap().comment_count, 1);

    let replies = forum.comments.list_replies(&root).await.unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].id, reply);
    assert!(!replies[0].is_deleted);

    // A second delete neither fails nor decrements again.
    forum.comments.delete_comment(&root, &owner).await.unwrap();
    assert_eq!(forum.store.find_post(&p).await.unwrap().unwrap().comment_count, 1);

    let top_level = forum
        .comments
        .list_post_comments(&p, CommentSort::Newest)
        .await
        .unwrap();
    assert_eq!(top_level.len(), 1);
    assert_eq!(top_level[0].id, root);
}

#[actix_web::test]
async fn reconciliation_repairs_counters_after_store_failures() {
    let forum = forum();
    let owner = ObjectId::new();
    let c = forum
        .communities
        .create_community(&owner, community_request("drift", Privacy::Public))
        .await
        .unwrap();
    let p = forum.post_in(&c.id, &owner).await;

    // Both the increment and its single retry fail.
    forum.store.fail_next(2);
    forum.comment_on(&p, &owner, None).await;
    assert_eq!(forum.store.find_post(&p).await.unwrap().unwrap().comment_count, 0);

    let report = Reconciler::new(forum.store.clone()).run_pass().await.unwrap();
    assert_eq!(report.posts_corrected, 1);
    assert_eq!(forum.store.find_post(&p).await.unwrap().unwrap().comment_count, 1);
}

#[actix_web::test]
async fn membership_changes_reach_the_community_topic() {
    let forum = forum();
    let (creator, user) = (ObjectId::new(), ObjectId::new());
    let c = forum
        .communities
        .create_community(&creator, community_request("events", Privacy::Private))
        .await
        .unwrap();

    forum.communities.join(&c.id, &user).await.unwrap();
    forum.communities.approve(&c.id, &creator, &user).await.unwrap();
    forum.communities.leave(&c.id, &user).await.unwrap();

    let states: Vec<MembershipState> = forum
        .bus
        .on_topic(&Topic::Community(c.id))
        .into_iter()
        .filter_map(|e| match e {
            ForumEvent::MembershipChanged { new_state, .. } => Some(new_state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            MembershipState::Pending,
            MembershipState::Member,
            MembershipState::None
        ]
    );
    assert_eq!(forum.communities.get_community(&c.id).await.unwrap().member_count, 1);
}
