use std::{fmt, str::FromStr};

use uuid::Uuid;

use crate::{AuthorInfo, CommentId, PostId, Time, UserId};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct NotificationId(pub Uuid);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Like,
    Comment,
    Reply,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Like => "like",
            NotificationType::Comment => "comment",
            NotificationType::Reply => "reply",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<NotificationType> {
        match s {
            "like" => Ok(NotificationType::Like),
            "comment" => Ok(NotificationType::Comment),
            "reply" => Ok(NotificationType::Reply),
            _ => Err(anyhow::anyhow!("unknown notification type {s:?}")),
        }
    }
}

/// A notification as persisted by the notification store
///
/// Notifications are a projection of likes and comments, they are never
/// used to compute counters.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationType,
    pub post: PostId,
    pub recipient: UserId,
    pub actor: UserId,

    /// The comment or reply that triggered this notification
    pub comment: Option<CommentId>,

    /// For replies, the comment that was replied to
    pub replied_on_comment: Option<CommentId>,

    /// Latest reply the recipient wrote from this notification
    pub reply: Option<CommentId>,
    pub seen: bool,
    pub created_at: Time,
}

impl Notification {
    pub fn new(
        kind: NotificationType,
        post: PostId,
        recipient: UserId,
        actor: UserId,
        comment: Option<CommentId>,
        replied_on_comment: Option<CommentId>,
    ) -> Notification {
        Notification {
            id: NotificationId(Uuid::new_v4()),
            kind,
            post,
            recipient,
            actor,
            comment,
            replied_on_comment,
            reply: None,
            seen: false,
            created_at: chrono::Utc::now(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationFilter {
    #[default]
    All,
    Like,
    Comment,
    Reply,
}

impl NotificationFilter {
    pub fn kind(&self) -> Option<NotificationType> {
        match self {
            NotificationFilter::All => None,
            NotificationFilter::Like => Some(NotificationType::Like),
            NotificationFilter::Comment => Some(NotificationType::Comment),
            NotificationFilter::Reply => Some(NotificationType::Reply),
        }
    }

    pub fn matches(&self, n: &Notification) -> bool {
        self.kind().map(|k| k == n.kind).unwrap_or(true)
    }
}

#[derive(Clone, Copy, Debug, serde::Deserialize, serde::Serialize)]
pub struct FetchNotifications {
    #[serde(default)]
    pub filter: NotificationFilter,
    #[serde(default)]
    pub skip: usize,
}

#[derive(Clone, Copy, Debug, serde::Deserialize, serde::Serialize)]
pub struct CountNotifications {
    #[serde(default)]
    pub filter: NotificationFilter,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PostRef {
    pub id: PostId,
    pub slug: String,
    pub title: String,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentRef {
    pub id: CommentId,
    pub body: String,
}

/// A notification ready for display in the inbox
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NotificationView {
    pub id: NotificationId,
    pub kind: NotificationType,
    pub post: PostRef,
    pub actor: AuthorInfo,
    pub comment: Option<CommentRef>,
    pub replied_on_comment: Option<CommentRef>,
    pub reply: Option<CommentRef>,

    /// Whether this notification had already been seen before this fetch
    pub seen: bool,
    pub created_at: Time,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Inbox {
    pub notifications: Vec<NotificationView>,

    /// Whether unseen notifications remain after this page was marked seen
    pub has_unseen: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewNotificationStatus {
    pub new_notification_available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_select_kinds() {
        let n = Notification::new(
            NotificationType::Reply,
            PostId(Uuid::new_v4()),
            UserId(Uuid::new_v4()),
            UserId(Uuid::new_v4()),
            None,
            None,
        );
        assert!(NotificationFilter::All.matches(&n));
        assert!(NotificationFilter::Reply.matches(&n));
        assert!(!NotificationFilter::Like.matches(&n));
        assert!(!n.seen);
    }

    #[test]
    fn kinds_have_a_stable_text_form() {
        for k in [
            NotificationType::Like,
            NotificationType::Comment,
            NotificationType::Reply,
        ] {
            assert_eq!(k.as_str().parse::<NotificationType>().unwrap(), k);
            assert_eq!(serde_json::to_string(&k).unwrap(), format!("\"{k}\""));
        }
        assert!("share".parse::<NotificationType>().is_err());
    }
}
