use std::collections::HashMap;

use anyhow::Context;
use yatra_api::{
    default_profile_img, username_from_email, AccountInfo, AuthToken, AuthorInfo, ChangePassword,
    Db, NewSession, NewUser, Profile, ProfileImageUpdate, ProfileUpdate, SessionInfo, SocialLinks,
    UserId, UserRecord, Uuid, USER_SEARCH_LIMIT,
};

use crate::{extractors::Config, Error};

/// Public author info, fetched at most once per user
#[derive(Default)]
pub struct AuthorCache(HashMap<UserId, AuthorInfo>);

impl AuthorCache {
    pub async fn get(&mut self, db: &mut dyn Db, user: UserId) -> anyhow::Result<AuthorInfo> {
        if let Some(info) = self.0.get(&user) {
            return Ok(info.clone());
        }
        let info = db
            .user_by_id(user)
            .await
            .with_context(|| format!("fetching user {:?}", user))?
            .ok_or_else(|| anyhow::anyhow!("user {:?} is referenced but does not exist", user))?
            .author_info();
        self.0.insert(user, info.clone());
        Ok(info)
    }
}

async fn hash_password(password: String, cost: u32) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("joining password hashing task")?
        .context("hashing password")
}

async fn verify_password(password: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("joining password verification task")?
        .context("verifying password hash")
}

async fn register(db: &mut dyn Db, config: &Config, data: NewUser) -> Result<UserRecord, Error> {
    data.validate()?;
    if db
        .user_by_email(&data.email)
        .await
        .context("checking email availability")?
        .is_some()
    {
        return Err(Error::Api(yatra_api::Error::EmailAlreadyUsed(data.email)));
    }
    let candidate = username_from_email(&data.email, false);
    let taken = db
        .user_by_username(&candidate)
        .await
        .context("checking username availability")?
        .is_some();
    let username = if taken {
        username_from_email(&data.email, true)
    } else {
        candidate
    };
    let password_hash = match data.password {
        Some(p) => Some(hash_password(p, config.bcrypt_cost).await?),
        None => None,
    };
    let user = UserRecord {
        id: UserId(Uuid::new_v4()),
        fullname: data.fullname,
        email: data.email,
        external_auth: password_hash.is_none(),
        password_hash,
        bio: String::new(),
        profile_img: default_profile_img(&username),
        username,
        social_links: SocialLinks::default(),
        account_info: AccountInfo::default(),
        posts: Vec::new(),
        joined_at: chrono::Utc::now(),
    };
    db.create_user(&user)
        .await
        .with_context(|| format!("creating user {:?}", user.id))??;
    tracing::info!(user=?user.id, username=%user.username, "created user");
    Ok(user)
}

async fn open_session(
    db: &mut dyn Db,
    user: &UserRecord,
    device: &str,
) -> Result<SessionInfo, Error> {
    let token = AuthToken(Uuid::new_v4());
    db.create_session(token, user.id, device)
        .await
        .with_context(|| format!("opening session for {:?}", user.id))?;
    Ok(SessionInfo {
        access_token: token,
        user_id: user.id,
        username: user.username.clone(),
        fullname: user.fullname.clone(),
        profile_img: user.profile_img.clone(),
    })
}

pub async fn signup(db: &mut dyn Db, config: &Config, data: NewUser) -> Result<SessionInfo, Error> {
    if data.password.is_none() {
        return Err(Error::validation("password is required"));
    }
    let user = register(db, config, data).await?;
    open_session(db, &user, "").await
}

pub async fn admin_create_user(
    db: &mut dyn Db,
    config: &Config,
    data: NewUser,
) -> Result<UserId, Error> {
    Ok(register(db, config, data).await?.id)
}

pub async fn signin(db: &mut dyn Db, data: NewSession) -> Result<SessionInfo, Error> {
    data.validate()?;
    let user = db
        .user_by_email(&data.email)
        .await
        .context("fetching user by email")?
        .ok_or_else(|| Error::invalid_credentials("email not found"))?;
    let hash = match (&user.password_hash, user.external_auth) {
        (Some(hash), false) => hash.clone(),
        _ => {
            return Err(Error::invalid_credentials(
                "account was created with an external provider, sign in with it",
            ))
        }
    };
    if !verify_password(data.password, hash).await? {
        return Err(Error::invalid_credentials("incorrect password"));
    }
    open_session(db, &user, &data.device).await
}

pub async fn signout(db: &mut dyn Db, token: AuthToken) -> Result<(), Error> {
    match db.delete_session(token).await.context("closing session")? {
        true => Ok(()),
        false => Err(Error::authentication_required()),
    }
}

pub async fn get_profile(db: &mut dyn Db, username: &str) -> Result<Profile, Error> {
    yatra_api::validate_string(username)?;
    Ok(db
        .user_by_username(username)
        .await
        .with_context(|| format!("fetching profile of {username:?}"))?
        .ok_or_else(|| Error::user_not_found(username))?
        .profile())
}

pub async fn search_users(db: &mut dyn Db, query: &str) -> Result<Vec<AuthorInfo>, Error> {
    yatra_api::validate_string(query)?;
    Ok(db
        .search_users(query, USER_SEARCH_LIMIT)
        .await
        .with_context(|| format!("searching users matching {query:?}"))?
        .iter()
        .map(UserRecord::author_info)
        .collect())
}

async fn existing_user(db: &mut dyn Db, user: UserId) -> Result<UserRecord, Error> {
    Ok(db
        .user_by_id(user)
        .await
        .with_context(|| format!("fetching user {:?}", user))?
        .ok_or_else(|| Error::user_not_found(&user.0.to_string()))?)
}

pub async fn update_profile(
    db: &mut dyn Db,
    user: UserId,
    data: ProfileUpdate,
) -> Result<Profile, Error> {
    data.validate()?;
    db.update_profile(user, &data)
        .await
        .with_context(|| format!("updating profile of {:?}", user))??;
    Ok(existing_user(db, user).await?.profile())
}

pub async fn update_profile_img(
    db: &mut dyn Db,
    user: UserId,
    data: ProfileImageUpdate,
) -> Result<ProfileImageUpdate, Error> {
    yatra_api::validate_string(&data.url)?;
    if data.url.trim().is_empty() {
        return Err(Error::validation("profile image url must not be empty"));
    }
    db.set_profile_img(user, &data.url)
        .await
        .with_context(|| format!("updating profile image of {:?}", user))?;
    Ok(data)
}

pub async fn change_password(
    db: &mut dyn Db,
    config: &Config,
    user: UserId,
    data: ChangePassword,
) -> Result<(), Error> {
    data.validate()?;
    let record = existing_user(db, user).await?;
    let hash = match (record.password_hash, record.external_auth) {
        (Some(hash), false) => hash,
        _ => return Err(Error::permission_denied()),
    };
    if !verify_password(data.current_password, hash).await? {
        return Err(Error::invalid_credentials("incorrect current password"));
    }
    let new_hash = hash_password(data.new_password, config.bcrypt_cost).await?;
    db.set_password_hash(user, &new_hash)
        .await
        .with_context(|| format!("storing new password of {:?}", user))?;
    tracing::info!(?user, "changed password");
    Ok(())
}
