use anyhow::Context;
use yatra_api::{
    generate_slug, Activity, CounterDelta, Db, GetPost, LikePost, LikeStatus, NewPost, Post,
    PostId, PostView, PublishedPost, UserId, Uuid,
};

use crate::{notifications, users::AuthorCache, Error};

/// Applies `delta` to the counters of `post`, returning whether it succeeded
///
/// Counters are best-effort: the write that motivated the change already
/// happened, so a failure here is only logged.
pub async fn adjust_counters(db: &mut dyn Db, post: PostId, delta: CounterDelta) -> bool {
    if delta.is_zero() {
        return true;
    }
    match db.adjust_post_counters(post, delta).await {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(?err, ?post, ?delta, "failed adjusting post counters");
            false
        }
    }
}

async fn adjust_author_counters(db: &mut dyn Db, user: UserId, total_posts: i64, total_reads: i64) {
    if let Err(err) = db.adjust_user_counters(user, total_posts, total_reads).await {
        tracing::error!(?err, ?user, total_posts, total_reads, "failed adjusting user counters");
    }
}

async fn existing_post(db: &mut dyn Db, slug: &str) -> Result<Post, Error> {
    yatra_api::validate_string(slug)?;
    Ok(db
        .post_by_slug(slug)
        .await
        .with_context(|| format!("fetching post {slug:?}"))?
        .ok_or_else(|| Error::post_not_found(slug))?)
}

/// Fetches a post `viewer` may see, drafts being visible to their author only
pub async fn visible_post(
    db: &mut dyn Db,
    viewer: Option<UserId>,
    id: PostId,
) -> Result<Post, Error> {
    let not_found = || Error::post_not_found(&id.0.to_string());
    let post = db
        .post_by_id(id)
        .await
        .with_context(|| format!("fetching post {:?}", id))?
        .ok_or_else(not_found)?;
    if post.draft && viewer != Some(post.author) {
        return Err(not_found());
    }
    Ok(post)
}

pub async fn save_post(db: &mut dyn Db, user: UserId, data: NewPost) -> Result<PublishedPost, Error> {
    data.validate()?;
    let tags = data.normalized_tags();
    let published = match data.slug {
        None => {
            let post = Post {
                id: PostId(Uuid::new_v4()),
                slug: generate_slug(&data.title),
                title: data.title,
                description: data.description,
                banner: data.banner,
                content: data.content,
                tags,
                draft: data.draft,
                author: user,
                activity: Activity::default(),
                comments: Vec::new(),
                published_at: chrono::Utc::now(),
            };
            db.insert_post(&post)
                .await
                .with_context(|| format!("inserting post {:?}", post.id))??;
            db.add_authored_post(user, post.id)
                .await
                .with_context(|| format!("recording {:?} as authored by {:?}", post.id, user))?;
            if !post.draft {
                adjust_author_counters(db, user, 1, 0).await;
            }
            tracing::info!(post=?post.id, slug=%post.slug, draft=post.draft, "created post");
            PublishedPost {
                id: post.id,
                slug: post.slug,
            }
        }
        Some(slug) => {
            let mut post = existing_post(db, &slug).await?;
            if post.author != user {
                return Err(Error::permission_denied());
            }
            let posts_delta = match (post.draft, data.draft) {
                (true, false) => {
                    post.published_at = chrono::Utc::now();
                    1
                }
                (false, true) => -1,
                _ => 0,
            };
            post.title = data.title;
            post.description = data.description;
            post.banner = data.banner;
            post.content = data.content;
            post.tags = tags;
            post.draft = data.draft;
            db.update_post(&post)
                .await
                .with_context(|| format!("updating post {:?}", post.id))?;
            if posts_delta != 0 {
                adjust_author_counters(db, user, posts_delta, 0).await;
            }
            PublishedPost {
                id: post.id,
                slug: post.slug,
            }
        }
    };
    Ok(published)
}

pub async fn get_post(
    db: &mut dyn Db,
    viewer: Option<UserId>,
    req: GetPost,
) -> Result<PostView, Error> {
    let mut post = existing_post(db, &req.slug).await?;
    let is_author = viewer == Some(post.author);
    if post.draft && !is_author {
        return Err(Error::post_not_found(&req.slug));
    }
    if req.edit && !is_author {
        return Err(Error::permission_denied());
    }
    if !req.edit {
        if adjust_counters(db, post.id, CounterDelta::read()).await {
            CounterDelta::read().apply(&mut post.activity);
        }
        adjust_author_counters(db, post.author, 0, 1).await;
    }
    let author = AuthorCache::default().get(db, post.author).await?;
    let liked = match viewer {
        Some(v) => db
            .is_liked(post.id, v)
            .await
            .with_context(|| format!("checking whether {:?} liked {:?}", v, post.id))?,
        None => false,
    };
    Ok(post.view(author, liked))
}

pub async fn delete_post(db: &mut dyn Db, user: UserId, slug: &str) -> Result<(), Error> {
    let post = existing_post(db, slug).await?;
    if post.author != user {
        return Err(Error::permission_denied());
    }
    db.delete_post(post.id)
        .await
        .with_context(|| format!("deleting post {:?}", post.id))?;
    tracing::info!(post=?post.id, "deleted post");

    if let Err(err) = db.delete_comments_for_post(post.id).await {
        tracing::error!(?err, post=?post.id, "failed deleting comments of deleted post");
    }
    if let Err(err) = db.delete_likes_for_post(post.id).await {
        tracing::error!(?err, post=?post.id, "failed deleting likes of deleted post");
    }
    if let Err(err) = db.delete_notifications_for_post(post.id).await {
        tracing::error!(?err, post=?post.id, "failed deleting notifications of deleted post");
    }
    if let Err(err) = db.remove_authored_post(user, post.id).await {
        tracing::error!(?err, post=?post.id, "failed removing deleted post from its author");
    }
    if !post.draft {
        adjust_author_counters(db, user, -1, 0).await;
    }
    Ok(())
}

/// Sets whether `user` likes the post, changing nothing if it already was the case
pub async fn like_post(db: &mut dyn Db, user: UserId, req: LikePost) -> Result<LikeStatus, Error> {
    let mut post = visible_post(db, Some(user), req.post_id).await?;
    let changed = if req.liked {
        db.insert_like(post.id, user).await
    } else {
        db.delete_like(post.id, user).await
    }
    .with_context(|| format!("recording like={} of {:?} on {:?}", req.liked, user, post.id))?;
    if changed {
        let delta = CounterDelta::like(req.liked);
        if adjust_counters(db, post.id, delta).await {
            delta.apply(&mut post.activity);
        }
        if req.liked {
            notifications::notify_like(db, &post, user).await;
        } else {
            notifications::retract_like(db, post.id, user).await;
        }
    }
    Ok(LikeStatus {
        liked: req.liked,
        total_likes: post.activity.total_likes,
    })
}

pub async fn is_liked(db: &mut dyn Db, user: UserId, post: PostId) -> Result<bool, Error> {
    Ok(db
        .is_liked(post, user)
        .await
        .with_context(|| format!("checking whether {:?} liked {:?}", user, post))?)
}
