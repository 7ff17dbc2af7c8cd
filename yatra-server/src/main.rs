use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use structopt::StructOpt;
use tower_http::trace::TraceLayer;
use yatra_api::{AuthToken, Store, Uuid};

mod comments;
mod db;
mod error;
mod extractors;
mod handlers;
mod listing;
mod notifications;
mod posts;
mod query;
mod users;


use error::Error;
use extractors::{AppState, Config, DbPool};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(Debug, StructOpt)]
#[structopt(name = "yatra-server", about = "Serve the blogging API")]
struct Opt {
    /// Postgres connection string
    #[structopt(long, env = "DATABASE_URL")]
    database_url: String,

    /// Bearer token granting access to the admin routes, which are disabled if unset
    #[structopt(long, env = "ADMIN_TOKEN")]
    admin_token: Option<Uuid>,

    #[structopt(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:3000")]
    listen_addr: SocketAddr,

    #[structopt(long, env = "SESSION_LIFETIME_HOURS", default_value = "720")]
    session_lifetime_hours: i64,

    #[structopt(long, env = "BCRYPT_COST", default_value = "10")]
    bcrypt_cost: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = Opt::from_args();

    let pool = create_sqlx_pool(&opt.database_url).await?;
    MIGRATOR
        .run(&pool)
        .await
        .context("running pending migrations")?;

    let config = Config {
        admin_token: opt.admin_token.map(AuthToken),
        session_lifetime: chrono::Duration::hours(opt.session_lifetime_hours),
        bcrypt_cost: opt.bcrypt_cost,
    };
    if config.admin_token.is_none() {
        tracing::warn!("no admin token configured, admin routes will refuse every request");
    }
    let app = app(Arc::new(db::PgStore::new(pool)), config);

    tracing::info!("listening on {}", opt.listen_addr);
    axum::Server::bind(&opt.listen_addr)
        .serve(app.into_make_service())
        .await
        .context("serving axum webserver")
}

pub async fn create_sqlx_pool(db_url: &str) -> anyhow::Result<sqlx::PgPool> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(16)
        .connect(db_url)
        .await
        .context("opening database")
}

pub fn app(store: Arc<dyn Store>, config: Config) -> Router {
    Router::new()
        .route("/api/signup", post(handlers::signup))
        .route("/api/signin", post(handlers::signin))
        .route("/api/signout", post(handlers::signout))
        .route("/api/whoami", get(handlers::whoami))
        .route("/api/admin/create-user", post(handlers::admin_create_user))
        .route("/api/get-profile", post(handlers::get_profile))
        .route("/api/search-users", post(handlers::search_users))
        .route("/api/update-profile", post(handlers::update_profile))
        .route("/api/update-profile-img", post(handlers::update_profile_img))
        .route("/api/change-password", post(handlers::change_password))
        .route("/api/create-post", post(handlers::create_post))
        .route("/api/get-post", post(handlers::get_post))
        .route("/api/delete-post", post(handlers::delete_post))
        .route("/api/latest-posts", post(handlers::latest_posts))
        .route("/api/latest-posts-count", post(handlers::latest_posts_count))
        .route("/api/trending-posts", get(handlers::trending_posts))
        .route("/api/search-posts", post(handlers::search_posts))
        .route("/api/search-posts-count", post(handlers::search_posts_count))
        .route("/api/user-written-posts", post(handlers::user_written_posts))
        .route(
            "/api/user-written-posts-count",
            post(handlers::user_written_posts_count),
        )
        .route("/api/like-post", post(handlers::like_post))
        .route("/api/is-liked", post(handlers::is_liked))
        .route("/api/add-comment", post(handlers::add_comment))
        .route("/api/get-post-comments", post(handlers::get_post_comments))
        .route("/api/get-replies", post(handlers::get_replies))
        .route("/api/delete-comment", post(handlers::delete_comment))
        .route("/api/notifications", post(handlers::fetch_notifications))
        .route("/api/notifications-count", post(handlers::count_notifications))
        .route("/api/new-notification", get(handlers::new_notification))
        .with_state(AppState {
            db: DbPool::new(store),
            config,
        })
        .layer(TraceLayer::new_for_http())
}
