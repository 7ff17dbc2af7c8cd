use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use crate::{Error, PostId, Time};

pub const MIN_FULLNAME_LEN: usize = 3;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_BIO_LEN: usize = 150;

lazy_static::lazy_static! {
    static ref EMAIL_REGEX: regex::Regex =
        regex::Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$")
            .expect("email regex is invalid");
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct UserId(pub Uuid);

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SocialLinks {
    #[serde(default)]
    pub youtube: String,
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub facebook: String,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub github: String,
    #[serde(default)]
    pub website: String,
}

impl SocialLinks {
    fn entries(&self) -> [(&'static str, &str); 6] {
        [
            ("youtube", &self.youtube),
            ("instagram", &self.instagram),
            ("facebook", &self.facebook),
            ("twitter", &self.twitter),
            ("github", &self.github),
            ("website", &self.website),
        ]
    }

    /// Empty links are allowed, the others must be http(s) urls whose host
    /// mentions the platform (any host goes for the website)
    pub fn validate(&self) -> Result<(), Error> {
        for (platform, link) in self.entries() {
            crate::validate_string(link)?;
            if link.is_empty() {
                continue;
            }
            let invalid = || Error::validation(format!("{platform} link is invalid"));
            let uri: http::Uri = link.parse().map_err(|_| invalid())?;
            match uri.scheme_str() {
                Some("http") | Some("https") => (),
                _ => return Err(invalid()),
            }
            let host = uri.host().ok_or_else(invalid)?;
            if platform != "website" && !host.to_lowercase().contains(platform) {
                return Err(invalid());
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AccountInfo {
    pub total_posts: i64,
    pub total_reads: i64,
}

/// A user as persisted by the identity store
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserRecord {
    pub id: UserId,
    pub fullname: String,
    pub email: String,
    pub username: String,

    /// bcrypt hash, `None` for accounts created through an external identity provider
    pub password_hash: Option<String>,
    pub external_auth: bool,

    pub bio: String,
    pub profile_img: String,
    pub social_links: SocialLinks,
    pub account_info: AccountInfo,

    /// Posts authored by this user, drafts included
    pub posts: Vec<PostId>,
    pub joined_at: Time,
}

impl UserRecord {
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            fullname: self.fullname.clone(),
            username: self.username.clone(),
            bio: self.bio.clone(),
            profile_img: self.profile_img.clone(),
            social_links: self.social_links.clone(),
            account_info: self.account_info,
            joined_at: self.joined_at,
        }
    }

    pub fn author_info(&self) -> AuthorInfo {
        AuthorInfo {
            id: self.id,
            fullname: self.fullname.clone(),
            username: self.username.clone(),
            profile_img: self.profile_img.clone(),
        }
    }
}

/// Public view of a user, without anything credential-related
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Profile {
    pub id: UserId,
    pub fullname: String,
    pub username: String,
    pub bio: String,
    pub profile_img: String,
    pub social_links: SocialLinks,
    pub account_info: AccountInfo,
    pub joined_at: Time,
}

/// Short user description attached to posts, comments and notifications
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthorInfo {
    pub id: UserId,
    pub fullname: String,
    pub username: String,
    pub profile_img: String,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewUser {
    pub fullname: String,
    pub email: String,

    /// `None` creates an account that can only sign in through an external provider,
    /// which only the admin endpoint allows
    pub password: Option<String>,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_strings([&self.fullname as &str, &self.email])?;
        if self.fullname.chars().count() < MIN_FULLNAME_LEN {
            return Err(Error::validation(format!(
                "full name must be at least {MIN_FULLNAME_LEN} letters long"
            )));
        }
        validate_email(&self.email)?;
        if let Some(password) = &self.password {
            crate::validate_string(password)?;
            validate_password(password)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct ProfileUpdate {
    pub username: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub social_links: SocialLinks,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_strings([&self.username as &str, &self.bio])?;
        if self.username.chars().count() < MIN_USERNAME_LEN {
            return Err(Error::validation(format!(
                "username should be at least {MIN_USERNAME_LEN} letters long"
            )));
        }
        if self.bio.chars().count() > MAX_BIO_LEN {
            return Err(Error::validation(format!(
                "bio should not be more than {MAX_BIO_LEN} characters"
            )));
        }
        self.social_links.validate()
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct ProfileImageUpdate {
    pub url: String,
}

pub fn validate_email(email: &str) -> Result<(), Error> {
    if email.is_empty() {
        return Err(Error::validation("enter email"));
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err(Error::validation("email is invalid"));
    }
    Ok(())
}

/// 6 to 20 characters, with at least a digit, a lowercase and an uppercase letter
pub fn validate_password(password: &str) -> Result<(), Error> {
    let len = password.chars().count();
    if (6..=20).contains(&len)
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
    {
        Ok(())
    } else {
        Err(Error::validation(
            "password should be 6 to 20 characters long with a numeric, lowercase and uppercase letters",
        ))
    }
}

/// Username candidate derived from an email, `taken` tells whether it must be disambiguated
pub fn username_from_email(email: &str, taken: bool) -> String {
    let base = email.split('@').next().unwrap_or(email);
    if !taken {
        return String::from(base);
    }
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(char::from)
        .collect();
    format!("{base}{suffix}")
}

const AVATAR_COLLECTIONS: [&str; 4] = ["notionists-neutral", "adventurer-neutral", "fun-emoji", "lorelei-neutral"];

pub fn default_profile_img(username: &str) -> String {
    let collection = AVATAR_COLLECTIONS[rand::thread_rng().gen_range(0..AVATAR_COLLECTIONS.len())];
    format!("https://api.dicebear.com/6.x/{collection}/svg?seed={username}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(fullname: &str, email: &str, password: &str) -> NewUser {
        NewUser {
            fullname: String::from(fullname),
            email: String::from(email),
            password: Some(String::from(password)),
        }
    }

    #[test]
    fn signup_rules() {
        assert!(new_user("Alice Doe", "alice@example.com", "Secret1").validate().is_ok());
        assert!(new_user("Al", "alice@example.com", "Secret1").validate().is_err());
        assert!(new_user("Alice Doe", "alice@example", "Secret1").validate().is_err());
        assert!(new_user("Alice Doe", "", "Secret1").validate().is_err());
        assert!(new_user("Alice Doe", "alice@example.com", "secret1").validate().is_err());
        assert!(new_user("Alice Doe", "alice@example.com", "Secret").validate().is_err());
        assert!(new_user("Alice Doe", "alice@example.com", "S1a").validate().is_err());
        assert!(new_user("Alice Doe", "alice@example.com", "Secret1Secret1Secret1X")
            .validate()
            .is_err());
    }

    #[test]
    fn external_accounts_have_no_password_rule() {
        let u = NewUser {
            fullname: String::from("Bob Smith"),
            email: String::from("bob.smith@mail.example.org"),
            password: None,
        };
        assert!(u.validate().is_ok());
    }

    #[test]
    fn username_is_derived_from_email() {
        assert_eq!(username_from_email("alice@example.com", false), "alice");
        let disambiguated = username_from_email("alice@example.com", true);
        assert!(disambiguated.starts_with("alice"));
        assert_eq!(disambiguated.len(), "alice".len() + 5);
    }

    #[test]
    fn social_links_must_match_their_platform() {
        let mut links = SocialLinks::default();
        assert!(links.validate().is_ok());
        links.github = String::from("https://github.com/alice");
        links.website = String::from("https://alice.dev");
        assert!(links.validate().is_ok());
        links.youtube = String::from("https://example.com/alice");
        assert!(links.validate().is_err());
        links.youtube = String::from("ftp://youtube.com/alice");
        assert!(links.validate().is_err());
    }

    #[test]
    fn profile_update_rules() {
        let mut up = ProfileUpdate {
            username: String::from("alice"),
            bio: String::from("Travels a lot"),
            social_links: SocialLinks::default(),
        };
        assert!(up.validate().is_ok());
        up.username = String::from("al");
        assert!(up.validate().is_err());
        up.username = String::from("alice");
        up.bio = "x".repeat(MAX_BIO_LEN + 1);
        assert!(up.validate().is_err());
    }
}
