use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{self, request},
};
use yatra_api::{AuthToken, Db, SessionStore, Store, UserId, Uuid};

use crate::Error;

#[derive(Clone, axum::extract::FromRef)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub admin_token: Option<AuthToken>,
    pub session_lifetime: chrono::Duration,
    pub bcrypt_cost: u32,
}

#[derive(Clone)]
pub struct DbPool(Arc<dyn Store>);

impl DbPool {
    pub fn new(store: Arc<dyn Store>) -> DbPool {
        DbPool(store)
    }

    pub async fn acquire(&self) -> Result<Conn, Error> {
        Ok(Conn(self.0.conn().await.context("acquiring db connection")?))
    }
}

pub struct Conn(Box<dyn Db>);

#[async_trait]
impl FromRequestParts<AppState> for Conn {
    type Rejection = Error;

    async fn from_request_parts(_req: &mut request::Parts, state: &AppState) -> Result<Conn, Error> {
        state.db.acquire().await
    }
}

impl Deref for Conn {
    type Target = dyn Db;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl DerefMut for Conn {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.0
    }
}

pub struct PreAuth(pub AuthToken);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for PreAuth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, _state: &S) -> Result<PreAuth, Error> {
        match req.headers.get(http::header::AUTHORIZATION) {
            None => Err(Error::authentication_required()),
            Some(auth) => {
                let auth = auth
                    .to_str()
                    .map_err(|_| Error::authentication_required())?;
                let mut auth = auth.split(' ');
                if !auth
                    .next()
                    .ok_or(Error::authentication_required())?
                    .eq_ignore_ascii_case("bearer")
                {
                    return Err(Error::authentication_required());
                }
                let token = auth.next().ok_or(Error::authentication_required())?;
                if auth.next().is_some() {
                    return Err(Error::authentication_required());
                }
                let token = Uuid::try_from(token).map_err(|_| Error::authentication_required())?;
                Ok(PreAuth(AuthToken(token)))
            }
        }
    }
}

async fn recover_session(token: AuthToken, state: &AppState) -> Result<UserId, Error> {
    let mut conn = state.db.acquire().await?;
    let not_before = chrono::Utc::now() - state.config.session_lifetime;
    match conn
        .recover_session(token, not_before)
        .await
        .context("recovering session")?
    {
        Some(user) => Ok(user),
        None => {
            tracing::debug!(?token, "rejected unknown or expired session token");
            Err(Error::authentication_required())
        }
    }
}

pub struct Auth(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for Auth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, state: &AppState) -> Result<Auth, Error> {
        let token = PreAuth::from_request_parts(req, state).await?.0;
        Ok(Auth(recover_session(token, state).await?))
    }
}

/// Authentication for routes that anonymous readers may also use
pub struct MaybeAuth(pub Option<UserId>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuth {
    type Rejection = Error;

    async fn from_request_parts(
        req: &mut request::Parts,
        state: &AppState,
    ) -> Result<MaybeAuth, Error> {
        if !req.headers.contains_key(http::header::AUTHORIZATION) {
            return Ok(MaybeAuth(None));
        }
        let token = PreAuth::from_request_parts(req, state).await?.0;
        Ok(MaybeAuth(Some(recover_session(token, state).await?)))
    }
}

pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = Error;

    async fn from_request_parts(
        req: &mut request::Parts,
        state: &AppState,
    ) -> Result<AdminAuth, Error> {
        let token = PreAuth::from_request_parts(req, state).await?.0;
        if Some(token) == state.config.admin_token {
            Ok(AdminAuth)
        } else {
            Err(Error::permission_denied())
        }
    }
}
