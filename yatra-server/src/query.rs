use yatra_api::{PostFilter, PostOrder, Uuid};

pub enum Bind {
    Bool(bool),
    Uuid(Uuid),
    String(String),
}

#[derive(Default)]
pub struct Sql {
    pub where_clause: String,
    pub binds: Vec<Bind>,
}

impl Sql {
    /// Adds a Bind, returning the index that should be used to refer to it assuming the first bind is at index first_bind_idx
    fn add_bind(&mut self, first_bind_idx: usize, b: Bind) -> usize {
        let res = first_bind_idx + self.binds.len();
        self.binds.push(b);
        res
    }

    fn and(&mut self, clause: &str) {
        self.where_clause.push_str(" AND ");
        self.where_clause.push_str(clause);
    }
}

/// Assumes the posts table is available as `p`
pub fn to_postgres(f: &PostFilter, first_bind_idx: usize) -> Sql {
    let mut res = Sql::default();
    let idx = res.add_bind(first_bind_idx, Bind::Bool(f.draft));
    res.where_clause.push_str(&format!("(p.draft = ${idx}"));
    if let Some(author) = f.author {
        let idx = res.add_bind(first_bind_idx, Bind::Uuid(author.0));
        res.and(&format!("p.author_id = ${idx}"));
    }
    if let Some(tag) = &f.tag {
        let idx = res.add_bind(first_bind_idx, Bind::String(tag.clone()));
        res.and(&format!("${idx} = ANY(p.tags)"));
    }
    if let Some(title) = &f.title {
        let idx = res.add_bind(first_bind_idx, Bind::String(title.clone()));
        res.and(&format!("strpos(lower(p.title), lower(${idx})) > 0"));
    }
    if let Some(slug) = &f.exclude_slug {
        let idx = res.add_bind(first_bind_idx, Bind::String(slug.clone()));
        res.and(&format!("p.slug <> ${idx}"));
    }
    res.where_clause.push(')');
    res
}

pub fn order_by(o: PostOrder) -> &'static str {
    match o {
        PostOrder::Latest => "p.published_at DESC",
        PostOrder::Trending => "p.total_reads DESC, p.total_likes DESC, p.published_at DESC",
    }
}
