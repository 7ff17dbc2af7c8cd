//! Notification fan-out and the per-user inbox
//!
//! Notifications are written after the like or comment they describe, and
//! failing to write them never fails the request.

use anyhow::Context;
use yatra_api::{
    Comment, CommentId, CommentRef, Count, CountNotifications, Db, FetchNotifications, Inbox,
    NewNotificationStatus, Notification, NotificationId, NotificationType, NotificationView, Post,
    PostId, PostRef, UserId, NOTIFICATION_PAGE_SIZE,
};

use crate::{users::AuthorCache, Error};

async fn insert(db: &mut dyn Db, n: Notification) {
    if let Err(err) = db.insert_notification(&n).await {
        tracing::error!(?err, kind=%n.kind, post=?n.post, "failed inserting notification");
    }
}

pub async fn notify_like(db: &mut dyn Db, post: &Post, actor: UserId) {
    insert(
        db,
        Notification::new(NotificationType::Like, post.id, post.author, actor, None, None),
    )
    .await
}

pub async fn retract_like(db: &mut dyn Db, post: PostId, actor: UserId) {
    if let Err(err) = db.delete_like_notification(post, actor).await {
        tracing::error!(?err, ?post, ?actor, "failed deleting like notification");
    }
}

/// Notifies the author of the replied comment, or of the post for top-level comments
pub async fn notify_comment(db: &mut dyn Db, post: &Post, comment: &Comment, parent: Option<&Comment>) {
    let n = match parent {
        Some(p) => Notification::new(
            NotificationType::Reply,
            post.id,
            p.author,
            comment.author,
            Some(comment.id),
            Some(p.id),
        ),
        None => Notification::new(
            NotificationType::Comment,
            post.id,
            post.author,
            comment.author,
            Some(comment.id),
            None,
        ),
    };
    insert(db, n).await
}

/// Remembers `reply` as the latest reply written from notification `notif`
pub async fn record_reply(db: &mut dyn Db, notif: NotificationId, reply: CommentId) {
    if let Err(err) = db.set_notification_reply(notif, reply).await {
        tracing::error!(?err, ?notif, ?reply, "failed recording reply on notification");
    }
}

async fn comment_ref(db: &mut dyn Db, id: Option<CommentId>) -> anyhow::Result<Option<CommentRef>> {
    let id = match id {
        Some(id) => id,
        None => return Ok(None),
    };
    Ok(db
        .comment_by_id(id)
        .await
        .with_context(|| format!("fetching comment {:?}", id))?
        .map(|c| CommentRef { id: c.id, body: c.body }))
}

pub async fn inbox(db: &mut dyn Db, user: UserId, req: FetchNotifications) -> Result<Inbox, Error> {
    let notifs = db
        .list_notifications(user, req.filter, req.skip, NOTIFICATION_PAGE_SIZE)
        .await
        .with_context(|| format!("listing notifications of {:?}", user))?;

    let mut authors = AuthorCache::default();
    let mut views = Vec::with_capacity(notifs.len());
    for n in notifs.iter() {
        let post = match db
            .post_by_id(n.post)
            .await
            .with_context(|| format!("fetching post {:?}", n.post))?
        {
            Some(p) => PostRef {
                id: p.id,
                slug: p.slug,
                title: p.title,
            },
            None => {
                tracing::warn!(notif=?n.id, post=?n.post, "notification refers to a missing post");
                continue;
            }
        };
        views.push(NotificationView {
            id: n.id,
            kind: n.kind,
            post,
            actor: authors.get(db, n.actor).await?,
            comment: comment_ref(db, n.comment).await?,
            replied_on_comment: comment_ref(db, n.replied_on_comment).await?,
            reply: comment_ref(db, n.reply).await?,
            seen: n.seen,
            created_at: n.created_at,
        });
    }

    let unseen = notifs
        .iter()
        .filter(|n| !n.seen)
        .map(|n| n.id)
        .collect::<Vec<_>>();
    if !unseen.is_empty() {
        db.mark_seen(&unseen)
            .await
            .with_context(|| format!("marking notifications of {:?} seen", user))?;
    }
    let has_unseen = db
        .has_unseen(user)
        .await
        .with_context(|| format!("checking unseen notifications of {:?}", user))?;
    Ok(Inbox {
        notifications: views,
        has_unseen,
    })
}

pub async fn count(db: &mut dyn Db, user: UserId, req: CountNotifications) -> Result<Count, Error> {
    Ok(Count {
        total_docs: db
            .count_notifications(user, req.filter)
            .await
            .with_context(|| format!("counting notifications of {:?}", user))?,
    })
}

pub async fn has_new(db: &mut dyn Db, user: UserId) -> Result<NewNotificationStatus, Error> {
    Ok(NewNotificationStatus {
        new_notification_available: db
            .has_unseen(user)
            .await
            .with_context(|| format!("checking unseen notifications of {:?}", user))?,
    })
}
