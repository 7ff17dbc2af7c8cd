//! Persistence interfaces
//!
//! The server only talks to storage through these traits, so that the
//! comment tree and notification logic run the same way over postgres and
//! over the in-memory store used by tests.
//!
//! Infrastructure failures are reported through `anyhow::Result`, while
//! failures the client must hear about (unique constraints) are reported as
//! an inner `Result<_, Error>`.

use async_trait::async_trait;

use crate::{
    AuthToken, Comment, CommentId, CounterDelta, Error, Notification, NotificationFilter,
    NotificationId, Post, PostFilter, PostId, PostOrder, ProfileUpdate, Time, UserId, UserRecord,
};

#[async_trait]
pub trait IdentityStore {
    /// Fails with `EmailAlreadyUsed` or `UsernameAlreadyUsed` on conflict
    async fn create_user(&mut self, u: &UserRecord) -> anyhow::Result<Result<(), Error>>;
    async fn user_by_id(&mut self, id: UserId) -> anyhow::Result<Option<UserRecord>>;
    async fn user_by_username(&mut self, username: &str) -> anyhow::Result<Option<UserRecord>>;
    async fn user_by_email(&mut self, email: &str) -> anyhow::Result<Option<UserRecord>>;

    /// Case-insensitive substring search on usernames
    async fn search_users(&mut self, query: &str, limit: usize)
        -> anyhow::Result<Vec<UserRecord>>;

    /// Fails with `UsernameAlreadyUsed` if another user has the new username
    async fn update_profile(
        &mut self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> anyhow::Result<Result<(), Error>>;
    async fn set_profile_img(&mut self, id: UserId, url: &str) -> anyhow::Result<()>;
    async fn set_password_hash(&mut self, id: UserId, hash: &str) -> anyhow::Result<()>;
    async fn adjust_user_counters(
        &mut self,
        id: UserId,
        total_posts: i64,
        total_reads: i64,
    ) -> anyhow::Result<()>;
    async fn add_authored_post(&mut self, id: UserId, post: PostId) -> anyhow::Result<()>;
    async fn remove_authored_post(&mut self, id: UserId, post: PostId) -> anyhow::Result<()>;
}

#[async_trait]
pub trait SessionStore {
    async fn create_session(
        &mut self,
        token: AuthToken,
        user: UserId,
        device: &str,
    ) -> anyhow::Result<()>;

    /// Returns the session owner, unless the session was created before `not_before`
    async fn recover_session(
        &mut self,
        token: AuthToken,
        not_before: Time,
    ) -> anyhow::Result<Option<UserId>>;

    /// Returns whether a session was actually removed
    async fn delete_session(&mut self, token: AuthToken) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait ContentStore {
    /// Fails with `SlugAlreadyUsed` on conflict
    async fn insert_post(&mut self, p: &Post) -> anyhow::Result<Result<(), Error>>;

    /// Overwrites the editable fields (title, description, banner, content,
    /// tags, draft, published_at) of the post with the same id
    async fn update_post(&mut self, p: &Post) -> anyhow::Result<()>;
    async fn post_by_id(&mut self, id: PostId) -> anyhow::Result<Option<Post>>;
    async fn post_by_slug(&mut self, slug: &str) -> anyhow::Result<Option<Post>>;

    /// Removes the post record only, cascading is up to the caller
    async fn delete_post(&mut self, id: PostId) -> anyhow::Result<()>;

    /// The only way post counters ever change
    async fn adjust_post_counters(&mut self, id: PostId, delta: CounterDelta)
        -> anyhow::Result<()>;
    async fn append_comment_ref(&mut self, id: PostId, comment: CommentId) -> anyhow::Result<()>;
    async fn remove_comment_ref(&mut self, id: PostId, comment: CommentId) -> anyhow::Result<()>;

    async fn list_posts(
        &mut self,
        filter: &PostFilter,
        order: PostOrder,
        skip: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Post>>;
    async fn count_posts(&mut self, filter: &PostFilter) -> anyhow::Result<u64>;

    /// Returns whether the like was not already there
    async fn insert_like(&mut self, post: PostId, user: UserId) -> anyhow::Result<bool>;

    /// Returns whether there was a like to remove
    async fn delete_like(&mut self, post: PostId, user: UserId) -> anyhow::Result<bool>;
    async fn is_liked(&mut self, post: PostId, user: UserId) -> anyhow::Result<bool>;
    async fn delete_likes_for_post(&mut self, post: PostId) -> anyhow::Result<()>;
}

#[async_trait]
pub trait CommentStore {
    async fn insert_comment(&mut self, c: &Comment) -> anyhow::Result<()>;
    async fn comment_by_id(&mut self, id: CommentId) -> anyhow::Result<Option<Comment>>;
    async fn append_child(&mut self, parent: CommentId, child: CommentId) -> anyhow::Result<()>;
    async fn remove_child(&mut self, parent: CommentId, child: CommentId) -> anyhow::Result<()>;

    /// Removes the comment record only, children are left untouched
    async fn delete_comment(&mut self, id: CommentId) -> anyhow::Result<()>;

    /// Top-level comments of a post, newest first
    async fn list_top_level_comments(
        &mut self,
        post: PostId,
        skip: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Comment>>;

    /// Direct children of a comment, newest first
    async fn list_replies(
        &mut self,
        parent: CommentId,
        skip: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Comment>>;
    async fn delete_comments_for_post(&mut self, post: PostId) -> anyhow::Result<()>;
}

#[async_trait]
pub trait NotificationStore {
    async fn insert_notification(&mut self, n: &Notification) -> anyhow::Result<()>;
    async fn notification_by_id(
        &mut self,
        id: NotificationId,
    ) -> anyhow::Result<Option<Notification>>;

    /// Removes the like notification of `actor` on `post`, if any
    async fn delete_like_notification(&mut self, post: PostId, actor: UserId)
        -> anyhow::Result<()>;

    /// Removes the notifications whose primary comment is `comment`
    async fn delete_notifications_for_comment(&mut self, comment: CommentId)
        -> anyhow::Result<()>;

    /// Clears the `reply` back-reference of notifications pointing at `comment`
    async fn detach_reply(&mut self, comment: CommentId) -> anyhow::Result<()>;
    async fn set_notification_reply(
        &mut self,
        id: NotificationId,
        reply: CommentId,
    ) -> anyhow::Result<()>;
    async fn delete_notifications_for_post(&mut self, post: PostId) -> anyhow::Result<()>;

    /// Notifications addressed to `recipient` and not authored by them, newest first
    async fn list_notifications(
        &mut self,
        recipient: UserId,
        filter: NotificationFilter,
        skip: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Notification>>;
    async fn count_notifications(
        &mut self,
        recipient: UserId,
        filter: NotificationFilter,
    ) -> anyhow::Result<u64>;
    async fn mark_seen(&mut self, ids: &[NotificationId]) -> anyhow::Result<()>;

    /// Whether `recipient` has unseen notifications not authored by them
    async fn has_unseen(&mut self, recipient: UserId) -> anyhow::Result<bool>;
}

/// One connection to the whole storage
pub trait Db:
    IdentityStore + SessionStore + ContentStore + CommentStore + NotificationStore + Send
{
}

impl<T> Db for T where
    T: IdentityStore + SessionStore + ContentStore + CommentStore + NotificationStore + Send
{
}

/// Hands out connections, one per request
#[async_trait]
pub trait Store: Send + Sync {
    async fn conn(&self) -> anyhow::Result<Box<dyn Db>>;
}
