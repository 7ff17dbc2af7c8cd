use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("User not found {0:?}")]
    UserNotFound(String),

    #[error("Post not found {0:?}")]
    PostNotFound(String),

    #[error("Comment not found {0}")]
    CommentNotFound(Uuid),

    #[error("Notification not found {0}")]
    NotificationNotFound(Uuid),

    #[error("Email already used {0}")]
    EmailAlreadyUsed(String),

    #[error("Username already used {0}")]
    UsernameAlreadyUsed(String),

    #[error("Slug already used {0}")]
    SlugAlreadyUsed(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Error {
        Error::Validation(msg.into())
    }

    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Error::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::UserNotFound(_) => StatusCode::NOT_FOUND,
            Error::PostNotFound(_) => StatusCode::NOT_FOUND,
            Error::CommentNotFound(_) => StatusCode::NOT_FOUND,
            Error::NotificationNotFound(_) => StatusCode::NOT_FOUND,
            Error::EmailAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::UsernameAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::SlugAlreadyUsed(_) => StatusCode::CONFLICT,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::Validation(msg) => json!({
                "message": msg,
                "type": "validation",
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::AuthenticationRequired => json!({
                "message": "missing or invalid access token",
                "type": "authentication-required",
            }),
            Error::InvalidCredentials(msg) => json!({
                "message": msg,
                "type": "invalid-credentials",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::UserNotFound(u) => json!({
                "message": "user not found",
                "type": "not-found-user",
                "user": u,
            }),
            Error::PostNotFound(p) => json!({
                "message": "post not found",
                "type": "not-found-post",
                "post": p,
            }),
            Error::CommentNotFound(c) => json!({
                "message": "comment not found",
                "type": "not-found-comment",
                "uuid": c,
            }),
            Error::NotificationNotFound(n) => json!({
                "message": "notification not found",
                "type": "not-found-notification",
                "uuid": n,
            }),
            Error::EmailAlreadyUsed(e) => json!({
                "message": "email already used",
                "type": "conflict-email",
                "email": e,
            }),
            Error::UsernameAlreadyUsed(n) => json!({
                "message": "username already used",
                "type": "conflict-username",
                "name": n,
            }),
            Error::SlugAlreadyUsed(s) => json!({
                "message": "slug already used",
                "type": "conflict-slug",
                "slug": s,
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let field = |name: &str| -> anyhow::Result<String> {
            data.get(name)
                .and_then(|v| v.as_str())
                .map(String::from)
                .ok_or_else(|| anyhow!("error contents is missing the {name:?} field"))
        };
        let uuid_field = || -> anyhow::Result<Uuid> {
            Uuid::from_str(&field("uuid")?).context("parsing the uuid field of error contents")
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(field("message").unwrap_or_default()),
                "validation" => Error::Validation(field("message")?),
                "null-byte" => Error::NullByteInString(field("string")?),
                "authentication-required" => Error::AuthenticationRequired,
                "invalid-credentials" => Error::InvalidCredentials(field("message")?),
                "permission-denied" => Error::PermissionDenied,
                "not-found-user" => Error::UserNotFound(field("user")?),
                "not-found-post" => Error::PostNotFound(field("post")?),
                "not-found-comment" => Error::CommentNotFound(uuid_field()?),
                "not-found-notification" => Error::NotificationNotFound(uuid_field()?),
                "conflict-email" => Error::EmailAlreadyUsed(field("email")?),
                "conflict-username" => Error::UsernameAlreadyUsed(field("name")?),
                "conflict-slug" => Error::SlugAlreadyUsed(field("slug")?),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_survive_json_encoding() {
        let errors = [
            Error::Unknown(String::from("Internal server error, see logs for details")),
            Error::Validation(String::from("write something to leave a comment")),
            Error::NullByteInString(String::from("a\0b")),
            Error::AuthenticationRequired,
            Error::InvalidCredentials(String::from("incorrect email or password")),
            Error::PermissionDenied,
            Error::UserNotFound(String::from("alice")),
            Error::PostNotFound(String::from("a-trip-to-goa-x1y2z")),
            Error::CommentNotFound(Uuid::new_v4()),
            Error::NotificationNotFound(Uuid::new_v4()),
            Error::EmailAlreadyUsed(String::from("alice@example.com")),
            Error::UsernameAlreadyUsed(String::from("alice")),
            Error::SlugAlreadyUsed(String::from("hello-world")),
        ];
        for err in errors {
            assert_eq!(Error::parse(&err.contents()).unwrap(), err);
        }
    }

    #[test]
    fn status_codes_follow_error_taxonomy() {
        assert_eq!(Error::validation("x").status_code(), 400);
        assert_eq!(Error::AuthenticationRequired.status_code(), 401);
        assert_eq!(Error::PermissionDenied.status_code(), 403);
        assert_eq!(Error::CommentNotFound(Uuid::nil()).status_code(), 404);
        assert_eq!(Error::EmailAlreadyUsed(String::new()).status_code(), 409);
        assert_eq!(Error::Unknown(String::new()).status_code(), 500);
    }

    #[test]
    fn unknown_error_types_are_rejected() {
        assert!(Error::parse(br#"{"type": "teapot"}"#).is_err());
        assert!(Error::parse(b"not json").is_err());
    }
}
