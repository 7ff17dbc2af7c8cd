use chrono::Utc;

mod auth;
mod comment;
pub mod db;
mod error;
mod notification;
mod post;
mod query;
mod user;

pub use auth::*;
pub use comment::*;
pub use db::{
    CommentStore, ContentStore, Db, IdentityStore, NotificationStore, SessionStore, Store,
};
pub use error::Error;
pub use notification::*;
pub use post::*;
pub use query::*;
pub use user::*;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

/// Number of posts returned by one page of a post listing
pub const BLOG_PAGE_SIZE: usize = 5;

/// Largest page size a post search may ask for
pub const MAX_SEARCH_LIMIT: usize = 50;

/// Number of posts returned by the trending listing
pub const TRENDING_LIMIT: usize = 5;

/// Number of comments returned by one page of comments or replies
pub const COMMENT_PAGE_SIZE: usize = 5;

/// Number of notifications returned by one page of the inbox
pub const NOTIFICATION_PAGE_SIZE: usize = 10;

/// Maximum number of users returned by a user search
pub const USER_SEARCH_LIMIT: usize = 50;

// The validate functions are there to reject, at the API boundary, anything that
// postgres could refuse later on. Semantic checks live next to the types.

pub fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::NullByteInString(String::from(s)));
    }
    Ok(())
}

pub fn validate_strings<'a>(strings: impl IntoIterator<Item = &'a str>) -> Result<(), Error> {
    for s in strings {
        validate_string(s)?;
    }
    Ok(())
}

/// Skip offset of a 1-based page number, pages before the first one being clamped to it
///
/// Pages past the end of the address space saturate, and simply come back empty.
pub fn page_offset(page: usize, page_size: usize) -> usize {
    page.saturating_sub(1).saturating_mul(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_bytes_are_rejected() {
        assert!(validate_string("hello").is_ok());
        assert_eq!(
            validate_string("he\0llo"),
            Err(Error::NullByteInString(String::from("he\0llo")))
        );
        assert!(validate_strings(["a", "b\0"]).is_err());
    }

    #[test]
    fn page_offsets_start_at_page_one() {
        assert_eq!(page_offset(0, BLOG_PAGE_SIZE), 0);
        assert_eq!(page_offset(1, BLOG_PAGE_SIZE), 0);
        assert_eq!(page_offset(3, BLOG_PAGE_SIZE), 10);
        assert_eq!(page_offset(usize::MAX, BLOG_PAGE_SIZE), usize::MAX);
    }
}
