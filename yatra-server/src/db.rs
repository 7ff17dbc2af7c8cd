use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgRow, types::Json, Row};
use yatra_api::{
    db::{CommentStore, ContentStore, Db, IdentityStore, NotificationStore, SessionStore, Store},
    AccountInfo, Activity, AuthToken, Comment, CommentId, CounterDelta, Error as ApiError,
    Notification, NotificationFilter, NotificationId, Post, PostFilter, PostId, PostOrder,
    ProfileUpdate, Time, UserId, UserRecord, Uuid,
};

use crate::query::{self, Bind};

#[derive(Clone)]
pub struct PgStore(sqlx::PgPool);

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> PgStore {
        PgStore(pool)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn conn(&self) -> anyhow::Result<Box<dyn Db>> {
        Ok(Box::new(PostgresDb(
            self.0.acquire().await.context("acquiring db connection")?,
        )))
    }
}

pub struct PostgresDb(sqlx::pool::PoolConnection<sqlx::Postgres>);

/// Name of the unique constraint a failed query violated, if any
fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(e) => e
            .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
            .filter(|e| e.code() == "23505")
            .and_then(|e| e.constraint()),
        _ => None,
    }
}

/// OFFSET or LIMIT argument, saturating at what postgres accepts
fn sql_bound(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

const USER_COLUMNS: &str = "
    id, fullname, email, username, password_hash, external_auth, bio, profile_img,
    social_links, total_posts, total_reads, posts, joined_at
";

fn user_from_row(r: &PgRow) -> anyhow::Result<UserRecord> {
    Ok(UserRecord {
        id: UserId(r.try_get("id").context("retrieving the id field")?),
        fullname: r.try_get("fullname").context("retrieving the fullname field")?,
        email: r.try_get("email").context("retrieving the email field")?,
        username: r.try_get("username").context("retrieving the username field")?,
        password_hash: r
            .try_get("password_hash")
            .context("retrieving the password_hash field")?,
        external_auth: r
            .try_get("external_auth")
            .context("retrieving the external_auth field")?,
        bio: r.try_get("bio").context("retrieving the bio field")?,
        profile_img: r
            .try_get("profile_img")
            .context("retrieving the profile_img field")?,
        social_links: r
            .try_get::<Json<_>, _>("social_links")
            .context("retrieving the social_links field")?
            .0,
        account_info: AccountInfo {
            total_posts: r
                .try_get("total_posts")
                .context("retrieving the total_posts field")?,
            total_reads: r
                .try_get("total_reads")
                .context("retrieving the total_reads field")?,
        },
        posts: r
            .try_get::<Vec<Uuid>, _>("posts")
            .context("retrieving the posts field")?
            .into_iter()
            .map(PostId)
            .collect(),
        joined_at: r.try_get("joined_at").context("retrieving the joined_at field")?,
    })
}

const POST_COLUMNS: &str = "
    p.id, p.slug, p.title, p.description, p.banner, p.content, p.tags, p.draft, p.author_id,
    p.total_reads, p.total_likes, p.total_comments, p.total_parent_comments, p.comment_ids,
    p.published_at
";

fn post_from_row(r: &PgRow) -> anyhow::Result<Post> {
    Ok(Post {
        id: PostId(r.try_get("id").context("retrieving the id field")?),
        slug: r.try_get("slug").context("retrieving the slug field")?,
        title: r.try_get("title").context("retrieving the title field")?,
        description: r
            .try_get("description")
            .context("retrieving the description field")?,
        banner: r.try_get("banner").context("retrieving the banner field")?,
        content: r
            .try_get::<Json<_>, _>("content")
            .context("retrieving the content field")?
            .0,
        tags: r.try_get("tags").context("retrieving the tags field")?,
        draft: r.try_get("draft").context("retrieving the draft field")?,
        author: UserId(r.try_get("author_id").context("retrieving the author_id field")?),
        activity: Activity {
            total_reads: r
                .try_get("total_reads")
                .context("retrieving the total_reads field")?,
            total_likes: r
                .try_get("total_likes")
                .context("retrieving the total_likes field")?,
            total_comments: r
                .try_get("total_comments")
                .context("retrieving the total_comments field")?,
            total_parent_comments: r
                .try_get("total_parent_comments")
                .context("retrieving the total_parent_comments field")?,
        },
        comments: r
            .try_get::<Vec<Uuid>, _>("comment_ids")
            .context("retrieving the comment_ids field")?
            .into_iter()
            .map(CommentId)
            .collect(),
        published_at: r
            .try_get("published_at")
            .context("retrieving the published_at field")?,
    })
}

const COMMENT_COLUMNS: &str =
    "id, post_id, author_id, body, parent_id, children, is_reply, created_at";

fn comment_from_row(r: &PgRow) -> anyhow::Result<Comment> {
    Ok(Comment {
        id: CommentId(r.try_get("id").context("retrieving the id field")?),
        post_id: PostId(r.try_get("post_id").context("retrieving the post_id field")?),
        author: UserId(r.try_get("author_id").context("retrieving the author_id field")?),
        body: r.try_get("body").context("retrieving the body field")?,
        parent: r
            .try_get::<Option<Uuid>, _>("parent_id")
            .context("retrieving the parent_id field")?
            .map(CommentId),
        children: r
            .try_get::<Vec<Uuid>, _>("children")
            .context("retrieving the children field")?
            .into_iter()
            .map(CommentId)
            .collect(),
        is_reply: r.try_get("is_reply").context("retrieving the is_reply field")?,
        created_at: r
            .try_get("created_at")
            .context("retrieving the created_at field")?,
    })
}

const NOTIFICATION_COLUMNS: &str = "
    id, kind, post_id, recipient_id, actor_id, comment_id, replied_on_comment_id, reply_id,
    seen, created_at
";

fn notification_from_row(r: &PgRow) -> anyhow::Result<Notification> {
    let opt_comment = |field: &str| -> anyhow::Result<Option<CommentId>> {
        Ok(r
            .try_get::<Option<Uuid>, _>(field)
            .with_context(|| format!("retrieving the {field} field"))?
            .map(CommentId))
    };
    Ok(Notification {
        id: NotificationId(r.try_get("id").context("retrieving the id field")?),
        kind: r
            .try_get::<String, _>("kind")
            .context("retrieving the kind field")?
            .parse()
            .context("parsing the kind field")?,
        post: PostId(r.try_get("post_id").context("retrieving the post_id field")?),
        recipient: UserId(
            r.try_get("recipient_id")
                .context("retrieving the recipient_id field")?,
        ),
        actor: UserId(r.try_get("actor_id").context("retrieving the actor_id field")?),
        comment: opt_comment("comment_id")?,
        replied_on_comment: opt_comment("replied_on_comment_id")?,
        reply: opt_comment("reply_id")?,
        seen: r.try_get("seen").context("retrieving the seen field")?,
        created_at: r
            .try_get("created_at")
            .context("retrieving the created_at field")?,
    })
}

impl PostgresDb {
    async fn fetch_user(&mut self, column: &str, value: Bind) -> anyhow::Result<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = bind(sqlx::query(&sql), value)
            .fetch_optional(&mut *self.0)
            .await
            .with_context(|| format!("querying users table by {column}"))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn fetch_post(&mut self, column: &str, value: Bind) -> anyhow::Result<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.{column} = $1");
        let row = bind(sqlx::query(&sql), value)
            .fetch_optional(&mut *self.0)
            .await
            .with_context(|| format!("querying posts table by {column}"))?;
        row.as_ref().map(post_from_row).transpose()
    }

    async fn fetch_comments(
        &mut self,
        condition: &str,
        value: Uuid,
        skip: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments
                WHERE {condition}
                ORDER BY created_at DESC
                OFFSET $2 LIMIT $3"
        );
        sqlx::query(&sql)
            .bind(value)
            .bind(sql_bound(skip))
            .bind(sql_bound(limit))
            .fetch_all(&mut *self.0)
            .await
            .with_context(|| format!("listing comments where {condition}"))?
            .iter()
            .map(comment_from_row)
            .collect()
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind(q: PgQuery<'_>, b: Bind) -> PgQuery<'_> {
    match b {
        Bind::Bool(v) => q.bind(v),
        Bind::Uuid(v) => q.bind(v),
        Bind::String(v) => q.bind(v),
    }
}

#[async_trait]
impl IdentityStore for PostgresDb {
    async fn create_user(&mut self, u: &UserRecord) -> anyhow::Result<Result<(), ApiError>> {
        let res = sqlx::query(
            "
                INSERT INTO users
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(u.id.0)
        .bind(&u.fullname)
        .bind(&u.email)
        .bind(&u.username)
        .bind(&u.password_hash)
        .bind(u.external_auth)
        .bind(&u.bio)
        .bind(&u.profile_img)
        .bind(Json(&u.social_links))
        .bind(u.account_info.total_posts)
        .bind(u.account_info.total_reads)
        .bind(u.posts.iter().map(|p| p.0).collect::<Vec<_>>())
        .bind(u.joined_at)
        .execute(&mut *self.0)
        .await;
        match res {
            Ok(_) => Ok(Ok(())),
            Err(e) => match violated_constraint(&e) {
                Some("users_email_key") => Ok(Err(ApiError::EmailAlreadyUsed(u.email.clone()))),
                Some("users_username_key") => {
                    Ok(Err(ApiError::UsernameAlreadyUsed(u.username.clone())))
                }
                _ => Err(e).with_context(|| format!("inserting user {:?}", u.id)),
            },
        }
    }

    async fn user_by_id(&mut self, id: UserId) -> anyhow::Result<Option<UserRecord>> {
        self.fetch_user("id", Bind::Uuid(id.0)).await
    }

    async fn user_by_username(&mut self, username: &str) -> anyhow::Result<Option<UserRecord>> {
        self.fetch_user("username", Bind::String(String::from(username)))
            .await
    }

    async fn user_by_email(&mut self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        self.fetch_user("email", Bind::String(String::from(email)))
            .await
    }

    async fn search_users(
        &mut self,
        query: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<UserRecord>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users
                WHERE strpos(lower(username), lower($1)) > 0
                ORDER BY username
                LIMIT $2"
        );
        sqlx::query(&sql)
            .bind(query)
            .bind(sql_bound(limit))
            .fetch_all(&mut *self.0)
            .await
            .with_context(|| format!("searching users matching {query:?}"))?
            .iter()
            .map(user_from_row)
            .collect()
    }

    async fn update_profile(
        &mut self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> anyhow::Result<Result<(), ApiError>> {
        let res = sqlx::query(
            "UPDATE users SET username = $2, bio = $3, social_links = $4 WHERE id = $1",
        )
        .bind(id.0)
        .bind(&update.username)
        .bind(&update.bio)
        .bind(Json(&update.social_links))
        .execute(&mut *self.0)
        .await;
        match res {
            Ok(_) => Ok(Ok(())),
            Err(e) if violated_constraint(&e) == Some("users_username_key") => {
                Ok(Err(ApiError::UsernameAlreadyUsed(update.username.clone())))
            }
            Err(e) => Err(e).with_context(|| format!("updating profile of {:?}", id)),
        }
    }

    async fn set_profile_img(&mut self, id: UserId, url: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET profile_img = $2 WHERE id = $1")
            .bind(id.0)
            .bind(url)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("updating profile image of {:?}", id))?;
        Ok(())
    }

    async fn set_password_hash(&mut self, id: UserId, hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id.0)
            .bind(hash)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("updating password of {:?}", id))?;
        Ok(())
    }

    async fn adjust_user_counters(
        &mut self,
        id: UserId,
        total_posts: i64,
        total_reads: i64,
    ) -> anyhow::Result<()> {
        let res = sqlx::query(
            "
                UPDATE users
                SET total_posts = total_posts + $2, total_reads = total_reads + $3
                WHERE id = $1
            ",
        )
        .bind(id.0)
        .bind(total_posts)
        .bind(total_reads)
        .execute(&mut *self.0)
        .await
        .with_context(|| format!("adjusting counters of {:?}", id))?;
        anyhow::ensure!(res.rows_affected() == 1, "user {:?} does not exist", id);
        Ok(())
    }

    async fn add_authored_post(&mut self, id: UserId, post: PostId) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET posts = array_append(posts, $2) WHERE id = $1")
            .bind(id.0)
            .bind(post.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("adding {:?} to the posts of {:?}", post, id))?;
        Ok(())
    }

    async fn remove_authored_post(&mut self, id: UserId, post: PostId) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET posts = array_remove(posts, $2) WHERE id = $1")
            .bind(id.0)
            .bind(post.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("removing {:?} from the posts of {:?}", post, id))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PostgresDb {
    async fn create_session(
        &mut self,
        token: AuthToken,
        user: UserId,
        device: &str,
    ) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO sessions VALUES ($1, $2, $3, $4)")
            .bind(token.0)
            .bind(user.0)
            .bind(device)
            .bind(chrono::Utc::now())
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("creating session for {:?}", user))?;
        Ok(())
    }

    async fn recover_session(
        &mut self,
        token: AuthToken,
        not_before: Time,
    ) -> anyhow::Result<Option<UserId>> {
        Ok(
            sqlx::query("SELECT user_id FROM sessions WHERE id = $1 AND created_at >= $2")
                .bind(token.0)
                .bind(not_before)
                .fetch_optional(&mut *self.0)
                .await
                .context("querying sessions table")?
                .map(|r| r.try_get("user_id").map(UserId))
                .transpose()
                .context("retrieving the user_id field")?,
        )
    }

    async fn delete_session(&mut self, token: AuthToken) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(token.0)
            .execute(&mut *self.0)
            .await
            .context("deleting session")?;
        Ok(res.rows_affected() == 1)
    }
}

#[async_trait]
impl ContentStore for PostgresDb {
    async fn insert_post(&mut self, p: &Post) -> anyhow::Result<Result<(), ApiError>> {
        let res = sqlx::query(
            "
                INSERT INTO posts
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ",
        )
        .bind(p.id.0)
        .bind(&p.slug)
        .bind(&p.title)
        .bind(&p.description)
        .bind(&p.banner)
        .bind(Json(&p.content))
        .bind(&p.tags)
        .bind(p.draft)
        .bind(p.author.0)
        .bind(p.activity.total_reads)
        .bind(p.activity.total_likes)
        .bind(p.activity.total_comments)
        .bind(p.activity.total_parent_comments)
        .bind(p.comments.iter().map(|c| c.0).collect::<Vec<_>>())
        .bind(p.published_at)
        .execute(&mut *self.0)
        .await;
        match res {
            Ok(_) => Ok(Ok(())),
            Err(e) if violated_constraint(&e) == Some("posts_slug_key") => {
                Ok(Err(ApiError::SlugAlreadyUsed(p.slug.clone())))
            }
            Err(e) => Err(e).with_context(|| format!("inserting post {:?}", p.id)),
        }
    }

    async fn update_post(&mut self, p: &Post) -> anyhow::Result<()> {
        let res = sqlx::query(
            "
                UPDATE posts
                SET title = $2, description = $3, banner = $4, content = $5, tags = $6,
                    draft = $7, published_at = $8
                WHERE id = $1
            ",
        )
        .bind(p.id.0)
        .bind(&p.title)
        .bind(&p.description)
        .bind(&p.banner)
        .bind(Json(&p.content))
        .bind(&p.tags)
        .bind(p.draft)
        .bind(p.published_at)
        .execute(&mut *self.0)
        .await
        .with_context(|| format!("updating post {:?}", p.id))?;
        anyhow::ensure!(res.rows_affected() == 1, "post {:?} does not exist", p.id);
        Ok(())
    }

    async fn post_by_id(&mut self, id: PostId) -> anyhow::Result<Option<Post>> {
        self.fetch_post("id", Bind::Uuid(id.0)).await
    }

    async fn post_by_slug(&mut self, slug: &str) -> anyhow::Result<Option<Post>> {
        self.fetch_post("slug", Bind::String(String::from(slug)))
            .await
    }

    async fn delete_post(&mut self, id: PostId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("deleting post {:?}", id))?;
        Ok(())
    }

    async fn adjust_post_counters(
        &mut self,
        id: PostId,
        delta: CounterDelta,
    ) -> anyhow::Result<()> {
        let res = sqlx::query(
            "
                UPDATE posts
                SET total_reads = total_reads + $2,
                    total_likes = total_likes + $3,
                    total_comments = total_comments + $4,
                    total_parent_comments = total_parent_comments + $5
                WHERE id = $1
            ",
        )
        .bind(id.0)
        .bind(delta.reads)
        .bind(delta.likes)
        .bind(delta.comments)
        .bind(delta.parent_comments)
        .execute(&mut *self.0)
        .await
        .with_context(|| format!("adjusting counters of {:?}", id))?;
        anyhow::ensure!(res.rows_affected() == 1, "post {:?} does not exist", id);
        Ok(())
    }

    async fn append_comment_ref(&mut self, id: PostId, comment: CommentId) -> anyhow::Result<()> {
        sqlx::query("UPDATE posts SET comment_ids = array_append(comment_ids, $2) WHERE id = $1")
            .bind(id.0)
            .bind(comment.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("adding {:?} to the comments of {:?}", comment, id))?;
        Ok(())
    }

    async fn remove_comment_ref(&mut self, id: PostId, comment: CommentId) -> anyhow::Result<()> {
        sqlx::query("UPDATE posts SET comment_ids = array_remove(comment_ids, $2) WHERE id = $1")
            .bind(id.0)
            .bind(comment.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("removing {:?} from the comments of {:?}", comment, id))?;
        Ok(())
    }

    async fn list_posts(
        &mut self,
        filter: &PostFilter,
        order: PostOrder,
        skip: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Post>> {
        let where_sql = query::to_postgres(filter, 1);
        let num_binds = where_sql.binds.len();
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE {} ORDER BY {} OFFSET ${} LIMIT ${}",
            where_sql.where_clause,
            query::order_by(order),
            num_binds + 1,
            num_binds + 2,
        );
        let mut q = sqlx::query(&sql);
        for b in where_sql.binds {
            q = bind(q, b);
        }
        q.bind(sql_bound(skip))
            .bind(sql_bound(limit))
            .fetch_all(&mut *self.0)
            .await
            .with_context(|| format!("listing posts matching {filter:?}"))?
            .iter()
            .map(post_from_row)
            .collect()
    }

    async fn count_posts(&mut self, filter: &PostFilter) -> anyhow::Result<u64> {
        let where_sql = query::to_postgres(filter, 1);
        let sql = format!(
            "SELECT COUNT(*) AS num FROM posts p WHERE {}",
            where_sql.where_clause
        );
        let mut q = sqlx::query(&sql);
        for b in where_sql.binds {
            q = bind(q, b);
        }
        let num: i64 = q
            .fetch_one(&mut *self.0)
            .await
            .with_context(|| format!("counting posts matching {filter:?}"))?
            .try_get("num")
            .context("retrieving the num field")?;
        Ok(num as u64)
    }

    async fn insert_like(&mut self, post: PostId, user: UserId) -> anyhow::Result<bool> {
        let res = sqlx::query("INSERT INTO likes VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(post.0)
            .bind(user.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("recording like of {:?} on {:?}", user, post))?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete_like(&mut self, post: PostId, user: UserId) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(post.0)
            .bind(user.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("removing like of {:?} on {:?}", user, post))?;
        Ok(res.rows_affected() == 1)
    }

    async fn is_liked(&mut self, post: PostId, user: UserId) -> anyhow::Result<bool> {
        Ok(
            sqlx::query("SELECT 1 FROM likes WHERE post_id = $1 AND user_id = $2")
                .bind(post.0)
                .bind(user.0)
                .fetch_optional(&mut *self.0)
                .await
                .with_context(|| format!("checking like of {:?} on {:?}", user, post))?
                .is_some(),
        )
    }

    async fn delete_likes_for_post(&mut self, post: PostId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM likes WHERE post_id = $1")
            .bind(post.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("deleting likes of {:?}", post))?;
        Ok(())
    }
}

#[async_trait]
impl CommentStore for PostgresDb {
    async fn insert_comment(&mut self, c: &Comment) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO comments VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
            .bind(c.id.0)
            .bind(c.post_id.0)
            .bind(c.author.0)
            .bind(&c.body)
            .bind(c.parent.map(|p| p.0))
            .bind(c.children.iter().map(|c| c.0).collect::<Vec<_>>())
            .bind(c.is_reply)
            .bind(c.created_at)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("inserting comment {:?}", c.id))?;
        Ok(())
    }

    async fn comment_by_id(&mut self, id: CommentId) -> anyhow::Result<Option<Comment>> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&mut *self.0)
            .await
            .with_context(|| format!("fetching comment {:?}", id))?
            .as_ref()
            .map(comment_from_row)
            .transpose()
    }

    async fn append_child(&mut self, parent: CommentId, child: CommentId) -> anyhow::Result<()> {
        let res = sqlx::query("UPDATE comments SET children = array_append(children, $2) WHERE id = $1")
            .bind(parent.0)
            .bind(child.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("adding child {:?} to {:?}", child, parent))?;
        anyhow::ensure!(res.rows_affected() == 1, "comment {:?} does not exist", parent);
        Ok(())
    }

    async fn remove_child(&mut self, parent: CommentId, child: CommentId) -> anyhow::Result<()> {
        sqlx::query("UPDATE comments SET children = array_remove(children, $2) WHERE id = $1")
            .bind(parent.0)
            .bind(child.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("removing child {:?} from {:?}", child, parent))?;
        Ok(())
    }

    async fn delete_comment(&mut self, id: CommentId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("deleting comment {:?}", id))?;
        Ok(())
    }

    async fn list_top_level_comments(
        &mut self,
        post: PostId,
        skip: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Comment>> {
        self.fetch_comments("post_id = $1 AND parent_id IS NULL", post.0, skip, limit)
            .await
    }

    async fn list_replies(
        &mut self,
        parent: CommentId,
        skip: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Comment>> {
        self.fetch_comments("parent_id = $1", parent.0, skip, limit)
            .await
    }

    async fn delete_comments_for_post(&mut self, post: PostId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(post.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("deleting comments of {:?}", post))?;
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for PostgresDb {
    async fn insert_notification(&mut self, n: &Notification) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO notifications VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)")
            .bind(n.id.0)
            .bind(n.kind.as_str())
            .bind(n.post.0)
            .bind(n.recipient.0)
            .bind(n.actor.0)
            .bind(n.comment.map(|c| c.0))
            .bind(n.replied_on_comment.map(|c| c.0))
            .bind(n.reply.map(|c| c.0))
            .bind(n.seen)
            .bind(n.created_at)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("inserting notification {:?}", n.id))?;
        Ok(())
    }

    async fn notification_by_id(
        &mut self,
        id: NotificationId,
    ) -> anyhow::Result<Option<Notification>> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1");
        sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&mut *self.0)
            .await
            .with_context(|| format!("fetching notification {:?}", id))?
            .as_ref()
            .map(notification_from_row)
            .transpose()
    }

    async fn delete_like_notification(
        &mut self,
        post: PostId,
        actor: UserId,
    ) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM notifications WHERE kind = 'like' AND post_id = $1 AND actor_id = $2")
            .bind(post.0)
            .bind(actor.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("deleting like notification of {:?} on {:?}", actor, post))?;
        Ok(())
    }

    async fn delete_notifications_for_comment(
        &mut self,
        comment: CommentId,
    ) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM notifications WHERE comment_id = $1")
            .bind(comment.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("deleting notifications of {:?}", comment))?;
        Ok(())
    }

    async fn detach_reply(&mut self, comment: CommentId) -> anyhow::Result<()> {
        sqlx::query("UPDATE notifications SET reply_id = NULL WHERE reply_id = $1")
            .bind(comment.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("clearing reply references to {:?}", comment))?;
        Ok(())
    }

    async fn set_notification_reply(
        &mut self,
        id: NotificationId,
        reply: CommentId,
    ) -> anyhow::Result<()> {
        let res = sqlx::query("UPDATE notifications SET reply_id = $2 WHERE id = $1")
            .bind(id.0)
            .bind(reply.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("setting reply of notification {:?}", id))?;
        anyhow::ensure!(res.rows_affected() == 1, "notification {:?} does not exist", id);
        Ok(())
    }

    async fn delete_notifications_for_post(&mut self, post: PostId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM notifications WHERE post_id = $1")
            .bind(post.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("deleting notifications of {:?}", post))?;
        Ok(())
    }

    async fn list_notifications(
        &mut self,
        recipient: UserId,
        filter: NotificationFilter,
        skip: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Notification>> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                WHERE recipient_id = $1
                AND actor_id <> $1
                AND ($2::VARCHAR IS NULL OR kind = $2)
                ORDER BY created_at DESC
                OFFSET $3 LIMIT $4"
        );
        sqlx::query(&sql)
            .bind(recipient.0)
            .bind(filter.kind().map(|k| k.as_str()))
            .bind(sql_bound(skip))
            .bind(sql_bound(limit))
            .fetch_all(&mut *self.0)
            .await
            .with_context(|| format!("listing notifications of {:?}", recipient))?
            .iter()
            .map(notification_from_row)
            .collect()
    }

    async fn count_notifications(
        &mut self,
        recipient: UserId,
        filter: NotificationFilter,
    ) -> anyhow::Result<u64> {
        let num: i64 = sqlx::query(
            "
                SELECT COUNT(*) AS num FROM notifications
                WHERE recipient_id = $1
                AND actor_id <> $1
                AND ($2::VARCHAR IS NULL OR kind = $2)
            ",
        )
        .bind(recipient.0)
        .bind(filter.kind().map(|k| k.as_str()))
        .fetch_one(&mut *self.0)
        .await
        .with_context(|| format!("counting notifications of {:?}", recipient))?
        .try_get("num")
        .context("retrieving the num field")?;
        Ok(num as u64)
    }

    async fn mark_seen(&mut self, ids: &[NotificationId]) -> anyhow::Result<()> {
        sqlx::query("UPDATE notifications SET seen = true WHERE id = ANY($1)")
            .bind(ids.iter().map(|n| n.0).collect::<Vec<_>>())
            .execute(&mut *self.0)
            .await
            .context("marking notifications seen")?;
        Ok(())
    }

    async fn has_unseen(&mut self, recipient: UserId) -> anyhow::Result<bool> {
        Ok(sqlx::query(
            "
                SELECT 1 FROM notifications
                WHERE recipient_id = $1
                AND actor_id <> $1
                AND seen = false
                LIMIT 1
            ",
        )
        .bind(recipient.0)
        .fetch_optional(&mut *self.0)
        .await
        .with_context(|| format!("checking unseen notifications of {:?}", recipient))?
        .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_bounds_saturate() {
        assert_eq!(sql_bound(5), 5);
        assert_eq!(sql_bound(usize::MAX), i64::MAX);
    }
}
