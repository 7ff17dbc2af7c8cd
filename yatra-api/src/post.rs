use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use crate::{AuthorInfo, CommentId, Error, Time, UserId};

pub const MAX_TAGS: usize = 10;
pub const MAX_DESCRIPTION_LEN: usize = 200;
const SLUG_SUFFIX_LEN: usize = 21;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct PostId(pub Uuid);

/// Aggregate counters of a post
///
/// Only ever moved through `ContentStore::adjust_post_counters`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Activity {
    pub total_reads: i64,
    pub total_likes: i64,
    pub total_comments: i64,
    pub total_parent_comments: i64,
}

/// Relative change to apply to an `Activity`
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CounterDelta {
    pub reads: i64,
    pub likes: i64,
    pub comments: i64,
    pub parent_comments: i64,
}

impl CounterDelta {
    pub fn read() -> CounterDelta {
        CounterDelta {
            reads: 1,
            ..CounterDelta::default()
        }
    }

    pub fn like(liked: bool) -> CounterDelta {
        CounterDelta {
            likes: if liked { 1 } else { -1 },
            ..CounterDelta::default()
        }
    }

    pub fn comment_added(top_level: bool) -> CounterDelta {
        CounterDelta {
            comments: 1,
            parent_comments: top_level as i64,
            ..CounterDelta::default()
        }
    }

    pub fn comment_removed(top_level: bool) -> CounterDelta {
        CounterDelta {
            comments: -1,
            parent_comments: -(top_level as i64),
            ..CounterDelta::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == CounterDelta::default()
    }

    pub fn apply(&self, a: &mut Activity) {
        a.total_reads += self.reads;
        a.total_likes += self.likes;
        a.total_comments += self.comments;
        a.total_parent_comments += self.parent_comments;
    }
}

/// Structured content of a post, as produced by the block editor
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PostContent {
    #[serde(default)]
    pub blocks: Vec<serde_json::Value>,
}

/// A post as persisted by the content store
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Post {
    pub id: PostId,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub banner: String,
    pub content: PostContent,
    pub tags: Vec<String>,
    pub draft: bool,
    pub author: UserId,
    pub activity: Activity,

    /// Comments of this post, top-level ones and replies alike
    pub comments: Vec<CommentId>,
    pub published_at: Time,
}

impl Post {
    pub fn summary(&self, author: AuthorInfo) -> PostSummary {
        PostSummary {
            id: self.id,
            slug: self.slug.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            banner: self.banner.clone(),
            tags: self.tags.clone(),
            draft: self.draft,
            activity: self.activity,
            published_at: self.published_at,
            author,
        }
    }

    pub fn view(&self, author: AuthorInfo, liked_by_viewer: bool) -> PostView {
        PostView {
            id: self.id,
            slug: self.slug.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            banner: self.banner.clone(),
            content: self.content.clone(),
            tags: self.tags.clone(),
            draft: self.draft,
            activity: self.activity,
            published_at: self.published_at,
            author,
            liked_by_viewer,
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewPost {
    /// Slug of the post being updated, `None` to create a new post
    #[serde(default)]
    pub slug: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub banner: String,
    #[serde(default)]
    pub content: PostContent,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub draft: bool,
}

impl NewPost {
    /// Drafts only need a title, publishing needs everything readers will see
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_strings(
            [&self.title as &str, &self.description, &self.banner]
                .into_iter()
                .chain(self.tags.iter().map(|t| t as &str))
                .chain(self.slug.iter().map(|s| s as &str)),
        )?;
        if self.title.trim().is_empty() {
            return Err(Error::validation("you must provide a title"));
        }
        if self.tags.len() > MAX_TAGS {
            return Err(Error::validation(format!(
                "must provide tags, maximum of {MAX_TAGS}"
            )));
        }
        if self.draft {
            return Ok(());
        }
        let desc_len = self.description.chars().count();
        if desc_len == 0 || desc_len > MAX_DESCRIPTION_LEN {
            return Err(Error::validation(format!(
                "you must provide a post description under {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if self.banner.is_empty() {
            return Err(Error::validation("you must provide a banner to publish"));
        }
        if self.content.blocks.is_empty() {
            return Err(Error::validation("there must be some content to publish"));
        }
        if self.tags.is_empty() {
            return Err(Error::validation(format!(
                "must provide tags, maximum of {MAX_TAGS}"
            )));
        }
        Ok(())
    }

    pub fn normalized_tags(&self) -> Vec<String> {
        normalize_tags(&self.tags)
    }
}

pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut res: Vec<String> = Vec::with_capacity(tags.len());
    for t in tags {
        let t = t.trim().to_lowercase();
        if !t.is_empty() && !res.contains(&t) {
            res.push(t);
        }
    }
    res.truncate(MAX_TAGS);
    res
}

/// Slug made of the title's alphanumeric words joined with dashes, plus a random suffix
pub fn generate_slug(title: &str) -> String {
    let base = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SLUG_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{base}{suffix}")
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PostSummary {
    pub id: PostId,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub banner: String,
    pub tags: Vec<String>,
    pub draft: bool,
    pub activity: Activity,
    pub published_at: Time,
    pub author: AuthorInfo,
}

/// Full post, as shown on its own page
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PostView {
    pub id: PostId,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub banner: String,
    pub content: PostContent,
    pub tags: Vec<String>,
    pub draft: bool,
    pub activity: Activity,
    pub published_at: Time,
    pub author: AuthorInfo,
    pub liked_by_viewer: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PublishedPost {
    pub id: PostId,
    pub slug: String,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct GetPost {
    pub slug: String,

    /// Fetching for the editor: no read is counted, only the author may do it
    #[serde(default)]
    pub edit: bool,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct DeletePost {
    pub slug: String,
}

#[derive(Clone, Copy, Debug, serde::Deserialize, serde::Serialize)]
pub struct LikePost {
    pub post_id: PostId,

    /// Desired state, setting the current state again is a no-op
    pub liked: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LikeStatus {
    pub liked: bool,
    pub total_likes: i64,
}

#[derive(Clone, Copy, Debug, serde::Deserialize, serde::Serialize)]
pub struct IsLiked {
    pub post_id: PostId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publishable() -> NewPost {
        NewPost {
            slug: None,
            title: String::from("A trip to Goa"),
            description: String::from("Beaches and more"),
            banner: String::from("https://img.example.com/goa.jpeg"),
            content: PostContent {
                blocks: vec![serde_json::json!({"type": "paragraph", "data": {"text": "Hi"}})],
            },
            tags: vec![String::from("Travel")],
            draft: false,
        }
    }

    #[test]
    fn publishing_requires_everything() {
        assert!(publishable().validate().is_ok());

        let mut p = publishable();
        p.title = String::from("   ");
        assert!(p.validate().is_err());

        let mut p = publishable();
        p.description = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(p.validate().is_err());

        let mut p = publishable();
        p.banner.clear();
        assert!(p.validate().is_err());

        let mut p = publishable();
        p.content.blocks.clear();
        assert!(p.validate().is_err());

        let mut p = publishable();
        p.tags.clear();
        assert!(p.validate().is_err());

        let mut p = publishable();
        p.tags = (0..=MAX_TAGS).map(|i| format!("tag{i}")).collect();
        assert!(p.validate().is_err());
    }

    #[test]
    fn drafts_only_need_a_title() {
        let p = NewPost {
            slug: None,
            title: String::from("Unfinished"),
            description: String::new(),
            banner: String::new(),
            content: PostContent::default(),
            tags: Vec::new(),
            draft: true,
        };
        assert!(p.validate().is_ok());
    }

    #[test]
    fn tags_are_lowercased_and_deduplicated() {
        let tags = vec![
            String::from("Travel"),
            String::from(" travel "),
            String::from("GOA"),
            String::new(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["travel", "goa"]);
    }

    #[test]
    fn slug_is_built_from_the_title() {
        let slug = generate_slug("A trip to Goa!!  (2024)");
        assert!(slug.starts_with("A-trip-to-Goa-2024"), "{slug}");
        assert_eq!(slug.len(), "A-trip-to-Goa-2024".len() + SLUG_SUFFIX_LEN);
        assert_ne!(slug, generate_slug("A trip to Goa!!  (2024)"));
    }

    #[test]
    fn counter_deltas() {
        let mut a = Activity::default();
        CounterDelta::comment_added(true).apply(&mut a);
        CounterDelta::comment_added(false).apply(&mut a);
        CounterDelta::like(true).apply(&mut a);
        CounterDelta::read().apply(&mut a);
        assert_eq!(
            a,
            Activity {
                total_reads: 1,
                total_likes: 1,
                total_comments: 2,
                total_parent_comments: 1,
            }
        );
        CounterDelta::comment_removed(true).apply(&mut a);
        assert_eq!(a.total_comments, 1);
        assert_eq!(a.total_parent_comments, 0);
        assert!(CounterDelta::default().is_zero());
    }
}
