use uuid::Uuid;

use crate::{AuthorInfo, Error, NotificationId, PostId, Time, UserId};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct CommentId(pub Uuid);

/// A comment as persisted by the comment store
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: UserId,
    pub body: String,

    /// `None` for top-level comments
    pub parent: Option<CommentId>,

    /// Direct replies, in insertion order
    pub children: Vec<CommentId>,
    pub is_reply: bool,
    pub created_at: Time,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    pub fn view(&self, author: AuthorInfo, depth: u32) -> CommentView {
        CommentView {
            id: self.id,
            post_id: self.post_id,
            body: self.body.clone(),
            parent: self.parent,
            children: self.children.clone(),
            is_reply: self.is_reply,
            created_at: self.created_at,
            author,
            depth,
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub post_id: PostId,
    pub body: String,

    #[serde(default)]
    pub parent: Option<CommentId>,

    /// Notification the reply was written from, which then remembers the reply
    #[serde(default)]
    pub notification_id: Option<NotificationId>,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.body)?;
        if self.body.trim().is_empty() {
            return Err(Error::validation("write something to leave a comment"));
        }
        Ok(())
    }
}

/// A comment ready for display, `depth` being 0 for top-level comments
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentView {
    pub id: CommentId,
    pub post_id: PostId,
    pub body: String,
    pub parent: Option<CommentId>,
    pub children: Vec<CommentId>,
    pub is_reply: bool,
    pub created_at: Time,
    pub author: AuthorInfo,
    pub depth: u32,
}

#[derive(Clone, Copy, Debug, serde::Deserialize, serde::Serialize)]
pub struct FetchComments {
    pub post_id: PostId,
    #[serde(default)]
    pub skip: usize,
}

#[derive(Clone, Copy, Debug, serde::Deserialize, serde::Serialize)]
pub struct FetchReplies {
    pub comment_id: CommentId,
    #[serde(default)]
    pub skip: usize,
}

#[derive(Clone, Copy, Debug, serde::Deserialize, serde::Serialize)]
pub struct DeleteComment {
    pub comment_id: CommentId,
}
