use yatra_api::{CommentId, Error as ApiError, NotificationId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub fn permission_denied() -> Error {
        Error::Api(ApiError::PermissionDenied)
    }

    pub fn authentication_required() -> Error {
        Error::Api(ApiError::AuthenticationRequired)
    }

    pub fn invalid_credentials(reason: &str) -> Error {
        Error::Api(ApiError::InvalidCredentials(String::from(reason)))
    }

    pub fn validation(msg: impl Into<String>) -> Error {
        Error::Api(ApiError::validation(msg))
    }

    pub fn user_not_found(user: &str) -> Error {
        Error::Api(ApiError::UserNotFound(String::from(user)))
    }

    pub fn post_not_found(post: &str) -> Error {
        Error::Api(ApiError::PostNotFound(String::from(post)))
    }

    pub fn comment_not_found(comment: CommentId) -> Error {
        Error::Api(ApiError::CommentNotFound(comment.0))
    }

    pub fn notification_not_found(notif: NotificationId) -> Error {
        Error::Api(ApiError::NotificationNotFound(notif.0))
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let err = match self {
            Error::Anyhow(err) => {
                tracing::error!(?err, "internal server error");
                #[cfg(not(test))]
                let err =
                    ApiError::Unknown(String::from("Internal server error, see logs for details"));
                #[cfg(test)]
                let err = ApiError::Unknown(format!("Internal server error: {err:?}"));
                err
            }
            Error::Api(err) => {
                tracing::info!("returning error to client: {err}");
                err
            }
        };
        (err.status_code(), err.contents()).into_response()
    }
}
