use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use yatra_api::{
    db::{CommentStore, ContentStore, Db, IdentityStore, NotificationStore, SessionStore, Store},
    AuthToken, Comment, CommentId, CounterDelta, Error, Notification, NotificationFilter,
    NotificationId, NotificationType, Post, PostFilter, PostId, PostOrder, ProfileUpdate, Time,
    UserId, UserRecord,
};

/// In-memory storage, cheap to clone, all clones share the same data
#[derive(Clone, Default)]
pub struct MockStore(Arc<Mutex<MockState>>);

#[derive(Debug, Default)]
struct MockState {
    users: BTreeMap<UserId, UserRecord>,
    sessions: HashMap<AuthToken, Session>,

    // vectors are kept in insertion order, which breaks timestamp ties
    posts: Vec<Post>,
    likes: HashSet<(PostId, UserId)>,
    comments: Vec<Comment>,
    notifications: Vec<Notification>,

    fail_counter_updates: bool,
}

#[derive(Debug)]
struct Session {
    user: UserId,
    created_at: Time,
    #[allow(dead_code)]
    device: String,
}

impl MockStore {
    pub fn new() -> MockStore {
        MockStore::default()
    }

    /// Make every subsequent post counter update fail, to exercise error paths
    pub async fn fail_counter_updates(&self, fail: bool) {
        self.0.lock().await.fail_counter_updates = fail;
    }

    pub async fn test_num_comments(&self) -> usize {
        self.0.lock().await.comments.len()
    }

    pub async fn test_num_notifications(&self) -> usize {
        self.0.lock().await.notifications.len()
    }

    pub async fn test_num_posts(&self) -> usize {
        self.0.lock().await.posts.len()
    }

    pub async fn test_notifications(&self) -> Vec<Notification> {
        self.0.lock().await.notifications.clone()
    }

    /// Backdates a session, to test expiration
    pub async fn test_age_session(&self, token: AuthToken, created_at: Time) {
        if let Some(s) = self.0.lock().await.sessions.get_mut(&token) {
            s.created_at = created_at;
        }
    }
}

#[async_trait]
impl Store for MockStore {
    async fn conn(&self) -> anyhow::Result<Box<dyn Db>> {
        Ok(Box::new(MockDb(self.0.clone())))
    }
}

/// One "connection" to a `MockStore`
pub struct MockDb(Arc<Mutex<MockState>>);

impl MockState {
    fn post_mut(&mut self, id: PostId) -> Option<&mut Post> {
        self.posts.iter_mut().find(|p| p.id == id)
    }

    fn comment_mut(&mut self, id: CommentId) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == id)
    }

    fn user_mut(&mut self, id: UserId) -> anyhow::Result<&mut UserRecord> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("user {:?} does not exist", id))
    }

    fn inbox(&self, recipient: UserId, filter: NotificationFilter) -> Vec<&Notification> {
        let mut res: Vec<&Notification> = self
            .notifications
            .iter()
            .rev()
            .filter(|n| n.recipient == recipient && n.actor != recipient && filter.matches(n))
            .collect();
        res.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        res
    }
}

fn newest_comments_first<'a>(it: impl DoubleEndedIterator<Item = &'a Comment>) -> Vec<&'a Comment> {
    let mut res: Vec<&Comment> = it.rev().collect();
    res.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    res
}

fn page<T: Clone>(items: Vec<&T>, skip: usize, limit: usize) -> Vec<T> {
    items.into_iter().skip(skip).take(limit).cloned().collect()
}

#[async_trait]
impl IdentityStore for MockDb {
    async fn create_user(&mut self, u: &UserRecord) -> anyhow::Result<Result<(), Error>> {
        let mut state = self.0.lock().await;
        if state.users.values().any(|o| o.email == u.email) {
            return Ok(Err(Error::EmailAlreadyUsed(u.email.clone())));
        }
        if state.users.values().any(|o| o.username == u.username) {
            return Ok(Err(Error::UsernameAlreadyUsed(u.username.clone())));
        }
        anyhow::ensure!(
            !state.users.contains_key(&u.id),
            "user id {:?} is already used",
            u.id
        );
        state.users.insert(u.id, u.clone());
        Ok(Ok(()))
    }

    async fn user_by_id(&mut self, id: UserId) -> anyhow::Result<Option<UserRecord>> {
        Ok(self.0.lock().await.users.get(&id).cloned())
    }

    async fn user_by_username(&mut self, username: &str) -> anyhow::Result<Option<UserRecord>> {
        Ok(self
            .0
            .lock()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn user_by_email(&mut self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        Ok(self
            .0
            .lock()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn search_users(
        &mut self,
        query: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<UserRecord>> {
        let query = query.to_lowercase();
        Ok(self
            .0
            .lock()
            .await
            .users
            .values()
            .filter(|u| u.username.to_lowercase().contains(&query))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_profile(
        &mut self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> anyhow::Result<Result<(), Error>> {
        let mut state = self.0.lock().await;
        if state
            .users
            .values()
            .any(|u| u.id != id && u.username == update.username)
        {
            return Ok(Err(Error::UsernameAlreadyUsed(update.username.clone())));
        }
        let u = state.user_mut(id)?;
        u.username = update.username.clone();
        u.bio = update.bio.clone();
        u.social_links = update.social_links.clone();
        Ok(Ok(()))
    }

    async fn set_profile_img(&mut self, id: UserId, url: &str) -> anyhow::Result<()> {
        self.0.lock().await.user_mut(id)?.profile_img = String::from(url);
        Ok(())
    }

    async fn set_password_hash(&mut self, id: UserId, hash: &str) -> anyhow::Result<()> {
        self.0.lock().await.user_mut(id)?.password_hash = Some(String::from(hash));
        Ok(())
    }

    async fn adjust_user_counters(
        &mut self,
        id: UserId,
        total_posts: i64,
        total_reads: i64,
    ) -> anyhow::Result<()> {
        let mut state = self.0.lock().await;
        let u = state.user_mut(id)?;
        u.account_info.total_posts += total_posts;
        u.account_info.total_reads += total_reads;
        Ok(())
    }

    async fn add_authored_post(&mut self, id: UserId, post: PostId) -> anyhow::Result<()> {
        self.0.lock().await.user_mut(id)?.posts.push(post);
        Ok(())
    }

    async fn remove_authored_post(&mut self, id: UserId, post: PostId) -> anyhow::Result<()> {
        self.0.lock().await.user_mut(id)?.posts.retain(|p| *p != post);
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MockDb {
    async fn create_session(
        &mut self,
        token: AuthToken,
        user: UserId,
        device: &str,
    ) -> anyhow::Result<()> {
        self.0.lock().await.sessions.insert(
            token,
            Session {
                user,
                created_at: chrono::Utc::now(),
                device: String::from(device),
            },
        );
        Ok(())
    }

    async fn recover_session(
        &mut self,
        token: AuthToken,
        not_before: Time,
    ) -> anyhow::Result<Option<UserId>> {
        Ok(self
            .0
            .lock()
            .await
            .sessions
            .get(&token)
            .filter(|s| s.created_at >= not_before)
            .map(|s| s.user))
    }

    async fn delete_session(&mut self, token: AuthToken) -> anyhow::Result<bool> {
        Ok(self.0.lock().await.sessions.remove(&token).is_some())
    }
}

#[async_trait]
impl ContentStore for MockDb {
    async fn insert_post(&mut self, p: &Post) -> anyhow::Result<Result<(), Error>> {
        let mut state = self.0.lock().await;
        if state.posts.iter().any(|o| o.slug == p.slug) {
            return Ok(Err(Error::SlugAlreadyUsed(p.slug.clone())));
        }
        state.posts.push(p.clone());
        Ok(Ok(()))
    }

    async fn update_post(&mut self, p: &Post) -> anyhow::Result<()> {
        let mut state = self.0.lock().await;
        let stored = state
            .post_mut(p.id)
            .ok_or_else(|| anyhow::anyhow!("post {:?} does not exist", p.id))?;
        stored.title = p.title.clone();
        stored.description = p.description.clone();
        stored.banner = p.banner.clone();
        stored.content = p.content.clone();
        stored.tags = p.tags.clone();
        stored.draft = p.draft;
        stored.published_at = p.published_at;
        Ok(())
    }

    async fn post_by_id(&mut self, id: PostId) -> anyhow::Result<Option<Post>> {
        Ok(self.0.lock().await.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn post_by_slug(&mut self, slug: &str) -> anyhow::Result<Option<Post>> {
        Ok(self
            .0
            .lock()
            .await
            .posts
            .iter()
            .find(|p| p.slug == slug)
            .cloned())
    }

    async fn delete_post(&mut self, id: PostId) -> anyhow::Result<()> {
        self.0.lock().await.posts.retain(|p| p.id != id);
        Ok(())
    }

    async fn adjust_post_counters(
        &mut self,
        id: PostId,
        delta: CounterDelta,
    ) -> anyhow::Result<()> {
        let mut state = self.0.lock().await;
        anyhow::ensure!(
            !state.fail_counter_updates,
            "counter updates are configured to fail"
        );
        let p = state
            .post_mut(id)
            .ok_or_else(|| anyhow::anyhow!("post {:?} does not exist", id))?;
        delta.apply(&mut p.activity);
        Ok(())
    }

    async fn append_comment_ref(&mut self, id: PostId, comment: CommentId) -> anyhow::Result<()> {
        let mut state = self.0.lock().await;
        let p = state
            .post_mut(id)
            .ok_or_else(|| anyhow::anyhow!("post {:?} does not exist", id))?;
        p.comments.push(comment);
        Ok(())
    }

    async fn remove_comment_ref(&mut self, id: PostId, comment: CommentId) -> anyhow::Result<()> {
        if let Some(p) = self.0.lock().await.post_mut(id) {
            p.comments.retain(|c| *c != comment);
        }
        Ok(())
    }

    async fn list_posts(
        &mut self,
        filter: &PostFilter,
        order: PostOrder,
        skip: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Post>> {
        let state = self.0.lock().await;
        let mut posts: Vec<&Post> = state.posts.iter().rev().filter(|p| filter.matches(p)).collect();
        match order {
            PostOrder::Latest => posts.sort_by(|a, b| b.published_at.cmp(&a.published_at)),
            PostOrder::Trending => posts.sort_by(|a, b| {
                (b.activity.total_reads, b.activity.total_likes, b.published_at).cmp(&(
                    a.activity.total_reads,
                    a.activity.total_likes,
                    a.published_at,
                ))
            }),
        }
        Ok(page(posts, skip, limit))
    }

    async fn count_posts(&mut self, filter: &PostFilter) -> anyhow::Result<u64> {
        Ok(self
            .0
            .lock()
            .await
            .posts
            .iter()
            .filter(|p| filter.matches(p))
            .count() as u64)
    }

    async fn insert_like(&mut self, post: PostId, user: UserId) -> anyhow::Result<bool> {
        Ok(self.0.lock().await.likes.insert((post, user)))
    }

    async fn delete_like(&mut self, post: PostId, user: UserId) -> anyhow::Result<bool> {
        Ok(self.0.lock().await.likes.remove(&(post, user)))
    }

    async fn is_liked(&mut self, post: PostId, user: UserId) -> anyhow::Result<bool> {
        Ok(self.0.lock().await.likes.contains(&(post, user)))
    }

    async fn delete_likes_for_post(&mut self, post: PostId) -> anyhow::Result<()> {
        self.0.lock().await.likes.retain(|(p, _)| *p != post);
        Ok(())
    }
}

#[async_trait]
impl CommentStore for MockDb {
    async fn insert_comment(&mut self, c: &Comment) -> anyhow::Result<()> {
        let mut state = self.0.lock().await;
        anyhow::ensure!(
            state.comments.iter().all(|o| o.id != c.id),
            "comment id {:?} is already used",
            c.id
        );
        state.comments.push(c.clone());
        Ok(())
    }

    async fn comment_by_id(&mut self, id: CommentId) -> anyhow::Result<Option<Comment>> {
        Ok(self
            .0
            .lock()
            .await
            .comments
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn append_child(&mut self, parent: CommentId, child: CommentId) -> anyhow::Result<()> {
        let mut state = self.0.lock().await;
        let p = state
            .comment_mut(parent)
            .ok_or_else(|| anyhow::anyhow!("comment {:?} does not exist", parent))?;
        p.children.push(child);
        Ok(())
    }

    async fn remove_child(&mut self, parent: CommentId, child: CommentId) -> anyhow::Result<()> {
        if let Some(p) = self.0.lock().await.comment_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        Ok(())
    }

    async fn delete_comment(&mut self, id: CommentId) -> anyhow::Result<()> {
        self.0.lock().await.comments.retain(|c| c.id != id);
        Ok(())
    }

    async fn list_top_level_comments(
        &mut self,
        post: PostId,
        skip: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Comment>> {
        let state = self.0.lock().await;
        let comments = newest_comments_first(
            state
                .comments
                .iter()
                .filter(|c| c.post_id == post && c.parent.is_none())
                .collect::<Vec<_>>()
                .into_iter(),
        );
        Ok(page(comments, skip, limit))
    }

    async fn list_replies(
        &mut self,
        parent: CommentId,
        skip: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Comment>> {
        let state = self.0.lock().await;
        let comments = newest_comments_first(
            state
                .comments
                .iter()
                .filter(|c| c.parent == Some(parent))
                .collect::<Vec<_>>()
                .into_iter(),
        );
        Ok(page(comments, skip, limit))
    }

    async fn delete_comments_for_post(&mut self, post: PostId) -> anyhow::Result<()> {
        self.0.lock().await.comments.retain(|c| c.post_id != post);
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MockDb {
    async fn insert_notification(&mut self, n: &Notification) -> anyhow::Result<()> {
        self.0.lock().await.notifications.push(n.clone());
        Ok(())
    }

    async fn notification_by_id(
        &mut self,
        id: NotificationId,
    ) -> anyhow::Result<Option<Notification>> {
        Ok(self
            .0
            .lock()
            .await
            .notifications
            .iter()
            .find(|n| n.id == id)
            .cloned())
    }

    async fn delete_like_notification(
        &mut self,
        post: PostId,
        actor: UserId,
    ) -> anyhow::Result<()> {
        self.0.lock().await.notifications.retain(|n| {
            !(n.kind == NotificationType::Like && n.post == post && n.actor == actor)
        });
        Ok(())
    }

    async fn delete_notifications_for_comment(
        &mut self,
        comment: CommentId,
    ) -> anyhow::Result<()> {
        self.0
            .lock()
            .await
            .notifications
            .retain(|n| n.comment != Some(comment));
        Ok(())
    }

    async fn detach_reply(&mut self, comment: CommentId) -> anyhow::Result<()> {
        for n in self.0.lock().await.notifications.iter_mut() {
            if n.reply == Some(comment) {
                n.reply = None;
            }
        }
        Ok(())
    }

    async fn set_notification_reply(
        &mut self,
        id: NotificationId,
        reply: CommentId,
    ) -> anyhow::Result<()> {
        let mut state = self.0.lock().await;
        let n = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| anyhow::anyhow!("notification {:?} does not exist", id))?;
        n.reply = Some(reply);
        Ok(())
    }

    async fn delete_notifications_for_post(&mut self, post: PostId) -> anyhow::Result<()> {
        self.0.lock().await.notifications.retain(|n| n.post != post);
        Ok(())
    }

    async fn list_notifications(
        &mut self,
        recipient: UserId,
        filter: NotificationFilter,
        skip: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Notification>> {
        let state = self.0.lock().await;
        Ok(page(state.inbox(recipient, filter), skip, limit))
    }

    async fn count_notifications(
        &mut self,
        recipient: UserId,
        filter: NotificationFilter,
    ) -> anyhow::Result<u64> {
        Ok(self.0.lock().await.inbox(recipient, filter).len() as u64)
    }

    async fn mark_seen(&mut self, ids: &[NotificationId]) -> anyhow::Result<()> {
        for n in self.0.lock().await.notifications.iter_mut() {
            if ids.contains(&n.id) {
                n.seen = true;
            }
        }
        Ok(())
    }

    async fn has_unseen(&mut self, recipient: UserId) -> anyhow::Result<bool> {
        Ok(self
            .0
            .lock()
            .await
            .inbox(recipient, NotificationFilter::All)
            .iter()
            .any(|n| !n.seen))
    }
}
