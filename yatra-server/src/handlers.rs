use axum::{extract::State, Json};
use yatra_api::{
    AuthorInfo, ChangePassword, CommentView, Count, CountNotifications, DeleteComment, DeletePost,
    FetchComments, FetchNotifications, FetchReplies, GetPost, GetProfile, Inbox, IsLiked,
    LatestPosts, LikePost, LikeStatus, NewComment, NewNotificationStatus, NewPost, NewSession,
    NewUser, PostSummary, PostView, Profile, ProfileImageUpdate, ProfileUpdate, PublishedPost,
    SearchPosts, SearchUsers, SessionInfo, UserId, UserWrittenPosts,
};

use crate::{comments, extractors::*, listing, notifications, posts, users, Error};

pub async fn signup(
    State(config): State<Config>,
    mut conn: Conn,
    Json(data): Json<NewUser>,
) -> Result<Json<SessionInfo>, Error> {
    Ok(Json(users::signup(&mut *conn, &config, data).await?))
}

pub async fn signin(mut conn: Conn, Json(data): Json<NewSession>) -> Result<Json<SessionInfo>, Error> {
    Ok(Json(users::signin(&mut *conn, data).await?))
}

pub async fn signout(PreAuth(token): PreAuth, mut conn: Conn) -> Result<(), Error> {
    users::signout(&mut *conn, token).await
}

pub async fn whoami(Auth(user): Auth) -> Json<UserId> {
    Json(user)
}

pub async fn admin_create_user(
    AdminAuth: AdminAuth,
    State(config): State<Config>,
    mut conn: Conn,
    Json(data): Json<NewUser>,
) -> Result<Json<UserId>, Error> {
    Ok(Json(users::admin_create_user(&mut *conn, &config, data).await?))
}

pub async fn get_profile(mut conn: Conn, Json(req): Json<GetProfile>) -> Result<Json<Profile>, Error> {
    Ok(Json(users::get_profile(&mut *conn, &req.username).await?))
}

pub async fn search_users(
    mut conn: Conn,
    Json(req): Json<SearchUsers>,
) -> Result<Json<Vec<AuthorInfo>>, Error> {
    Ok(Json(users::search_users(&mut *conn, &req.query).await?))
}

pub async fn update_profile(
    Auth(user): Auth,
    mut conn: Conn,
    Json(data): Json<ProfileUpdate>,
) -> Result<Json<Profile>, Error> {
    Ok(Json(users::update_profile(&mut *conn, user, data).await?))
}

pub async fn update_profile_img(
    Auth(user): Auth,
    mut conn: Conn,
    Json(data): Json<ProfileImageUpdate>,
) -> Result<Json<ProfileImageUpdate>, Error> {
    Ok(Json(users::update_profile_img(&mut *conn, user, data).await?))
}

pub async fn change_password(
    Auth(user): Auth,
    State(config): State<Config>,
    mut conn: Conn,
    Json(data): Json<ChangePassword>,
) -> Result<(), Error> {
    users::change_password(&mut *conn, &config, user, data).await
}

pub async fn create_post(
    Auth(user): Auth,
    mut conn: Conn,
    Json(data): Json<NewPost>,
) -> Result<Json<PublishedPost>, Error> {
    Ok(Json(posts::save_post(&mut *conn, user, data).await?))
}

pub async fn get_post(
    MaybeAuth(viewer): MaybeAuth,
    mut conn: Conn,
    Json(req): Json<GetPost>,
) -> Result<Json<PostView>, Error> {
    Ok(Json(posts::get_post(&mut *conn, viewer, req).await?))
}

pub async fn delete_post(
    Auth(user): Auth,
    mut conn: Conn,
    Json(req): Json<DeletePost>,
) -> Result<(), Error> {
    posts::delete_post(&mut *conn, user, &req.slug).await
}

pub async fn like_post(
    Auth(user): Auth,
    mut conn: Conn,
    Json(req): Json<LikePost>,
) -> Result<Json<LikeStatus>, Error> {
    Ok(Json(posts::like_post(&mut *conn, user, req).await?))
}

pub async fn is_liked(
    Auth(user): Auth,
    mut conn: Conn,
    Json(req): Json<IsLiked>,
) -> Result<Json<bool>, Error> {
    Ok(Json(posts::is_liked(&mut *conn, user, req.post_id).await?))
}

pub async fn latest_posts(
    mut conn: Conn,
    Json(req): Json<LatestPosts>,
) -> Result<Json<Vec<PostSummary>>, Error> {
    Ok(Json(listing::latest(&mut *conn, req).await?))
}

pub async fn latest_posts_count(mut conn: Conn) -> Result<Json<Count>, Error> {
    Ok(Json(listing::latest_count(&mut *conn).await?))
}

pub async fn trending_posts(mut conn: Conn) -> Result<Json<Vec<PostSummary>>, Error> {
    Ok(Json(listing::trending(&mut *conn).await?))
}

pub async fn search_posts(
    mut conn: Conn,
    Json(req): Json<SearchPosts>,
) -> Result<Json<Vec<PostSummary>>, Error> {
    Ok(Json(listing::search(&mut *conn, req).await?))
}

pub async fn search_posts_count(
    mut conn: Conn,
    Json(req): Json<SearchPosts>,
) -> Result<Json<Count>, Error> {
    Ok(Json(listing::search_count(&mut *conn, req).await?))
}

pub async fn user_written_posts(
    Auth(user): Auth,
    mut conn: Conn,
    Json(req): Json<UserWrittenPosts>,
) -> Result<Json<Vec<PostSummary>>, Error> {
    Ok(Json(listing::user_written(&mut *conn, user, req).await?))
}

pub async fn user_written_posts_count(
    Auth(user): Auth,
    mut conn: Conn,
    Json(req): Json<UserWrittenPosts>,
) -> Result<Json<Count>, Error> {
    Ok(Json(listing::user_written_count(&mut *conn, user, req).await?))
}

pub async fn add_comment(
    Auth(user): Auth,
    mut conn: Conn,
    Json(data): Json<NewComment>,
) -> Result<Json<CommentView>, Error> {
    Ok(Json(comments::add_comment(&mut *conn, user, data).await?))
}

pub async fn get_post_comments(
    MaybeAuth(viewer): MaybeAuth,
    mut conn: Conn,
    Json(req): Json<FetchComments>,
) -> Result<Json<Vec<CommentView>>, Error> {
    Ok(Json(comments::list_comments(&mut *conn, viewer, req).await?))
}

pub async fn get_replies(
    MaybeAuth(viewer): MaybeAuth,
    mut conn: Conn,
    Json(req): Json<FetchReplies>,
) -> Result<Json<Vec<CommentView>>, Error> {
    Ok(Json(comments::list_replies(&mut *conn, viewer, req).await?))
}

pub async fn delete_comment(
    Auth(user): Auth,
    mut conn: Conn,
    Json(req): Json<DeleteComment>,
) -> Result<(), Error> {
    comments::delete_comment(&mut *conn, user, req.comment_id).await
}

pub async fn fetch_notifications(
    Auth(user): Auth,
    mut conn: Conn,
    Json(req): Json<FetchNotifications>,
) -> Result<Json<Inbox>, Error> {
    Ok(Json(notifications::inbox(&mut *conn, user, req).await?))
}

pub async fn count_notifications(
    Auth(user): Auth,
    mut conn: Conn,
    Json(req): Json<CountNotifications>,
) -> Result<Json<Count>, Error> {
    Ok(Json(notifications::count(&mut *conn, user, req).await?))
}

pub async fn new_notification(
    Auth(user): Auth,
    mut conn: Conn,
) -> Result<Json<NewNotificationStatus>, Error> {
    Ok(Json(notifications::has_new(&mut *conn, user).await?))
}
