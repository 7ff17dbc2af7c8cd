//! The comment tree: comments, replies and cascading deletion
//!
//! A comment's `parent` and its parent's `children` always designate each
//! other. Post counters follow every insertion and removal through
//! `posts::adjust_counters`.

use anyhow::Context;
use yatra_api::{
    Comment, CommentId, CommentView, CounterDelta, Db, FetchComments, FetchReplies, NewComment,
    UserId, Uuid, COMMENT_PAGE_SIZE,
};

use crate::{notifications, posts, users::AuthorCache, Error};

async fn existing_comment(db: &mut dyn Db, id: CommentId) -> Result<Comment, Error> {
    Ok(db
        .comment_by_id(id)
        .await
        .with_context(|| format!("fetching comment {:?}", id))?
        .ok_or_else(|| Error::comment_not_found(id))?)
}

/// Number of ancestors of `c`, 0 for a top-level comment
async fn depth_of(db: &mut dyn Db, c: &Comment) -> anyhow::Result<u32> {
    let mut depth = 0;
    let mut next = c.parent;
    while let Some(id) = next {
        depth += 1;
        next = match db
            .comment_by_id(id)
            .await
            .with_context(|| format!("fetching ancestor comment {:?}", id))?
        {
            Some(ancestor) => ancestor.parent,
            None => {
                tracing::warn!(comment=?c.id, missing=?id, "comment has a dangling ancestor");
                None
            }
        };
    }
    Ok(depth)
}

pub async fn add_comment(
    db: &mut dyn Db,
    user: UserId,
    data: NewComment,
) -> Result<CommentView, Error> {
    data.validate()?;
    let post = posts::visible_post(db, Some(user), data.post_id).await?;
    let parent = match data.parent {
        Some(id) => {
            let parent = existing_comment(db, id).await?;
            if parent.post_id != post.id {
                return Err(Error::validation(
                    "the replied-to comment belongs to another post",
                ));
            }
            Some(parent)
        }
        None => None,
    };
    if let Some(id) = data.notification_id {
        let origin = db
            .notification_by_id(id)
            .await
            .with_context(|| format!("fetching notification {:?}", id))?
            .ok_or_else(|| Error::notification_not_found(id))?;
        if origin.recipient != user {
            return Err(Error::permission_denied());
        }
    }
    let author = AuthorCache::default().get(db, user).await?;
    let depth = match &parent {
        Some(p) => depth_of(db, p).await? + 1,
        None => 0,
    };

    let comment = Comment {
        id: CommentId(Uuid::new_v4()),
        post_id: post.id,
        author: user,
        body: data.body,
        parent: data.parent,
        children: Vec::new(),
        is_reply: parent.is_some(),
        created_at: chrono::Utc::now(),
    };
    db.insert_comment(&comment)
        .await
        .with_context(|| format!("inserting comment {:?}", comment.id))?;
    if let Some(p) = &parent {
        db.append_child(p.id, comment.id)
            .await
            .with_context(|| format!("attaching comment {:?} to {:?}", comment.id, p.id))?;
    }
    db.append_comment_ref(post.id, comment.id)
        .await
        .with_context(|| format!("attaching comment {:?} to post {:?}", comment.id, post.id))?;
    tracing::debug!(comment=?comment.id, post=?post.id, parent=?comment.parent, "added comment");

    posts::adjust_counters(db, post.id, CounterDelta::comment_added(comment.is_top_level())).await;
    notifications::notify_comment(db, &post, &comment, parent.as_ref()).await;
    if let Some(id) = data.notification_id {
        notifications::record_reply(db, id, comment.id).await;
    }
    Ok(comment.view(author, depth))
}

async fn views(
    db: &mut dyn Db,
    comments: Vec<Comment>,
    depth: u32,
) -> Result<Vec<CommentView>, Error> {
    let mut authors = AuthorCache::default();
    let mut res = Vec::with_capacity(comments.len());
    for c in comments {
        let author = authors.get(db, c.author).await?;
        res.push(c.view(author, depth));
    }
    Ok(res)
}

pub async fn list_comments(
    db: &mut dyn Db,
    viewer: Option<UserId>,
    req: FetchComments,
) -> Result<Vec<CommentView>, Error> {
    posts::visible_post(db, viewer, req.post_id).await?;
    let comments = db
        .list_top_level_comments(req.post_id, req.skip, COMMENT_PAGE_SIZE)
        .await
        .with_context(|| format!("listing comments of {:?}", req.post_id))?;
    views(db, comments, 0).await
}

pub async fn list_replies(
    db: &mut dyn Db,
    viewer: Option<UserId>,
    req: FetchReplies,
) -> Result<Vec<CommentView>, Error> {
    let parent = existing_comment(db, req.comment_id).await?;
    posts::visible_post(db, viewer, parent.post_id).await?;
    let depth = depth_of(db, &parent).await? + 1;
    let replies = db
        .list_replies(parent.id, req.skip, COMMENT_PAGE_SIZE)
        .await
        .with_context(|| format!("listing replies to {:?}", parent.id))?;
    views(db, replies, depth).await
}

/// Deletes a comment and its whole subtree
///
/// Only the comment's author and the post's author may do so.
pub async fn delete_comment(db: &mut dyn Db, user: UserId, id: CommentId) -> Result<(), Error> {
    let root = existing_comment(db, id).await?;
    let post_author = db
        .post_by_id(root.post_id)
        .await
        .with_context(|| format!("fetching post {:?}", root.post_id))?
        .map(|p| p.author);
    if root.author != user && post_author != Some(user) {
        return Err(Error::permission_denied());
    }
    let removed = cascade_delete(db, root.id).await?;
    tracing::info!(comment=?root.id, ?user, removed, "deleted comment");
    Ok(())
}

enum Step {
    /// Load the comment, detach it from its parent and schedule its children
    Enter(CommentId),

    /// All children are gone, remove the comment itself
    Leave(Comment),
}

/// Post-order walk over the subtree of `root`, returning the number of removed comments
///
/// Errors on the root are returned, errors on descendants are logged and the
/// offending subtree is skipped.
async fn cascade_delete(db: &mut dyn Db, root: CommentId) -> Result<usize, Error> {
    let mut removed = 0;
    let mut stack = vec![Step::Enter(root)];
    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(id) => match enter(db, id).await {
                Ok(c) => {
                    let children = c.children.clone();
                    stack.push(Step::Leave(c));
                    stack.extend(children.into_iter().rev().map(Step::Enter));
                }
                Err(err) if id == root => return Err(err),
                Err(err) => tracing::warn!(?err, comment=?id, "skipping subtree in cascade"),
            },
            Step::Leave(c) => match leave(db, &c).await {
                Ok(()) => removed += 1,
                Err(err) if c.id == root => return Err(err.into()),
                Err(err) => tracing::error!(?err, comment=?c.id, "failed removing comment in cascade"),
            },
        }
    }
    Ok(removed)
}

async fn enter(db: &mut dyn Db, id: CommentId) -> Result<Comment, Error> {
    let c = existing_comment(db, id).await?;
    if let Some(parent) = c.parent {
        db.remove_child(parent, c.id)
            .await
            .with_context(|| format!("detaching comment {:?} from {:?}", c.id, parent))?;
    }
    Ok(c)
}

async fn leave(db: &mut dyn Db, c: &Comment) -> anyhow::Result<()> {
    db.delete_comment(c.id)
        .await
        .with_context(|| format!("deleting comment {:?}", c.id))?;
    db.delete_notifications_for_comment(c.id)
        .await
        .with_context(|| format!("deleting notifications of comment {:?}", c.id))?;
    db.detach_reply(c.id)
        .await
        .with_context(|| format!("clearing reply references to {:?}", c.id))?;
    db.remove_comment_ref(c.post_id, c.id)
        .await
        .with_context(|| format!("detaching comment {:?} from post {:?}", c.id, c.post_id))?;
    posts::adjust_counters(db, c.post_id, CounterDelta::comment_removed(c.is_top_level())).await;
    Ok(())
}
