use crate::{Error, UserId};

/// Which posts a listing is about
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PostFilter {
    /// `false` lists published posts, `true` lists drafts
    pub draft: bool,
    pub author: Option<UserId>,
    pub tag: Option<String>,

    /// Case-insensitive substring of the title
    pub title: Option<String>,
    pub exclude_slug: Option<String>,
}

impl PostFilter {
    pub fn published() -> PostFilter {
        PostFilter::default()
    }

    pub fn matches(&self, p: &crate::Post) -> bool {
        p.draft == self.draft
            && self.author.map(|a| a == p.author).unwrap_or(true)
            && self.tag.as_ref().map(|t| p.tags.contains(t)).unwrap_or(true)
            && self
                .title
                .as_ref()
                .map(|q| p.title.to_lowercase().contains(&q.to_lowercase()))
                .unwrap_or(true)
            && self
                .exclude_slug
                .as_ref()
                .map(|s| *s != p.slug)
                .unwrap_or(true)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PostOrder {
    /// Most recently published first
    Latest,

    /// Most read first, then most liked, then most recent
    Trending,
}

#[derive(Clone, Copy, Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct LatestPosts {
    #[serde(default)]
    pub page: usize,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct SearchPosts {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub author: Option<UserId>,
    #[serde(default)]
    pub page: usize,

    /// Overrides the page size, used to fetch posts similar to one being read
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub exclude_slug: Option<String>,
}

impl SearchPosts {
    pub fn page_size(&self) -> Result<usize, Error> {
        match self.limit {
            None => Ok(crate::BLOG_PAGE_SIZE),
            Some(l) if l > crate::MAX_SEARCH_LIMIT => Err(Error::validation(format!(
                "cannot fetch more than {} posts at once",
                crate::MAX_SEARCH_LIMIT
            ))),
            Some(l) => Ok(l),
        }
    }

    /// Tag wins over query, which wins over author
    pub fn filter(&self) -> Result<PostFilter, Error> {
        crate::validate_strings(
            self.tag
                .iter()
                .chain(self.query.iter())
                .chain(self.exclude_slug.iter())
                .map(|s| s as &str),
        )?;
        let mut filter = PostFilter {
            exclude_slug: self.exclude_slug.clone(),
            ..PostFilter::published()
        };
        if let Some(tag) = &self.tag {
            filter.tag = Some(tag.trim().to_lowercase());
        } else if let Some(query) = &self.query {
            filter.title = Some(query.clone());
        } else if let Some(author) = self.author {
            filter.author = Some(author);
        } else {
            return Err(Error::validation("search needs a tag, a query or an author"));
        }
        Ok(filter)
    }
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct UserWrittenPosts {
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub query: String,
}

impl UserWrittenPosts {
    pub fn filter(&self, author: UserId) -> Result<PostFilter, Error> {
        crate::validate_string(&self.query)?;
        Ok(PostFilter {
            draft: self.draft,
            author: Some(author),
            title: Some(self.query.clone()).filter(|q| !q.is_empty()),
            ..PostFilter::default()
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Count {
    pub total_docs: u64,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct GetProfile {
    pub username: String,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct SearchUsers {
    pub query: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Uuid;

    #[test]
    fn search_picks_a_single_criterion() {
        let author = UserId(Uuid::new_v4());
        let s = SearchPosts {
            tag: Some(String::from("Travel")),
            query: Some(String::from("goa")),
            author: Some(author),
            ..SearchPosts::default()
        };
        let f = s.filter().unwrap();
        assert_eq!(f.tag.as_deref(), Some("travel"));
        assert_eq!(f.title, None);
        assert_eq!(f.author, None);
        assert!(!f.draft);

        let s = SearchPosts {
            author: Some(author),
            ..SearchPosts::default()
        };
        assert_eq!(s.filter().unwrap().author, Some(author));

        assert!(SearchPosts::default().filter().is_err());
    }

    #[test]
    fn search_page_size_is_bounded() {
        assert_eq!(SearchPosts::default().page_size(), Ok(crate::BLOG_PAGE_SIZE));
        let s = SearchPosts {
            limit: Some(3),
            ..SearchPosts::default()
        };
        assert_eq!(s.page_size(), Ok(3));
        let s = SearchPosts {
            limit: Some(crate::MAX_SEARCH_LIMIT + 1),
            ..SearchPosts::default()
        };
        assert!(matches!(s.page_size(), Err(Error::Validation(_))));
    }

    #[test]
    fn own_posts_filter() {
        let author = UserId(Uuid::new_v4());
        let q = UserWrittenPosts {
            page: 1,
            draft: true,
            query: String::new(),
        };
        let f = q.filter(author).unwrap();
        assert!(f.draft);
        assert_eq!(f.author, Some(author));
        assert_eq!(f.title, None);
    }
}
