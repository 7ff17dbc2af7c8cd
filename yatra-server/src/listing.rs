use anyhow::Context;
use yatra_api::{
    page_offset, Count, Db, LatestPosts, Post, PostFilter, PostOrder, PostSummary, SearchPosts,
    UserId, UserWrittenPosts, BLOG_PAGE_SIZE, TRENDING_LIMIT,
};

use crate::{users::AuthorCache, Error};

async fn summaries(db: &mut dyn Db, posts: Vec<Post>) -> Result<Vec<PostSummary>, Error> {
    let mut authors = AuthorCache::default();
    let mut res = Vec::with_capacity(posts.len());
    for p in posts {
        let author = authors.get(db, p.author).await?;
        res.push(p.summary(author));
    }
    Ok(res)
}

async fn list(
    db: &mut dyn Db,
    filter: &PostFilter,
    order: PostOrder,
    skip: usize,
    limit: usize,
) -> Result<Vec<PostSummary>, Error> {
    let posts = db
        .list_posts(filter, order, skip, limit)
        .await
        .with_context(|| format!("listing posts matching {filter:?}"))?;
    summaries(db, posts).await
}

async fn count(db: &mut dyn Db, filter: &PostFilter) -> Result<Count, Error> {
    Ok(Count {
        total_docs: db
            .count_posts(filter)
            .await
            .with_context(|| format!("counting posts matching {filter:?}"))?,
    })
}

pub async fn latest(db: &mut dyn Db, req: LatestPosts) -> Result<Vec<PostSummary>, Error> {
    list(
        db,
        &PostFilter::published(),
        PostOrder::Latest,
        page_offset(req.page, BLOG_PAGE_SIZE),
        BLOG_PAGE_SIZE,
    )
    .await
}

pub async fn latest_count(db: &mut dyn Db) -> Result<Count, Error> {
    count(db, &PostFilter::published()).await
}

pub async fn trending(db: &mut dyn Db) -> Result<Vec<PostSummary>, Error> {
    list(db, &PostFilter::published(), PostOrder::Trending, 0, TRENDING_LIMIT).await
}

pub async fn search(db: &mut dyn Db, req: SearchPosts) -> Result<Vec<PostSummary>, Error> {
    let filter = req.filter()?;
    let limit = req.page_size()?;
    list(
        db,
        &filter,
        PostOrder::Latest,
        page_offset(req.page, limit),
        limit,
    )
    .await
}

pub async fn search_count(db: &mut dyn Db, req: SearchPosts) -> Result<Count, Error> {
    count(db, &req.filter()?).await
}

pub async fn user_written(
    db: &mut dyn Db,
    user: UserId,
    req: UserWrittenPosts,
) -> Result<Vec<PostSummary>, Error> {
    list(
        db,
        &req.filter(user)?,
        PostOrder::Latest,
        page_offset(req.page, BLOG_PAGE_SIZE),
        BLOG_PAGE_SIZE,
    )
    .await
}

pub async fn user_written_count(
    db: &mut dyn Db,
    user: UserId,
    req: UserWrittenPosts,
) -> Result<Count, Error> {
    count(db, &req.filter(user)?).await
}
