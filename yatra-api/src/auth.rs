use uuid::Uuid;

use crate::{Error, UserId};

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewSession {
    pub email: String,
    pub password: String,

    /// Free-form label of the device opening the session
    #[serde(default)]
    pub device: String,
}

impl NewSession {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_strings([&self.email as &str, &self.password, &self.device])
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub Uuid);

/// What the client gets back after signing up or signing in
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SessionInfo {
    pub access_token: AuthToken,
    pub user_id: UserId,
    pub username: String,
    pub fullname: String,
    pub profile_img: String,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

impl ChangePassword {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_strings([&self.current_password as &str, &self.new_password])?;
        crate::validate_password(&self.current_password)?;
        crate::validate_password(&self.new_password)
    }
}
