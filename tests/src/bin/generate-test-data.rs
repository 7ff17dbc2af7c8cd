use std::collections::HashSet;

use anyhow::Context;
use chrono::{Duration, Utc};
use rand::{seq::SliceRandom, Rng};
use yatra_api::{generate_slug, username_from_email, Time, Uuid};

const NUM_USERS: usize = 8;
const PASSWORD: &str = "Passw0rd";

const NUM_POSTS: usize = 30;
const DRAFT_ONE_IN: u32 = 6;
const POST_TITLE_WORDS: usize = 5;
const POST_DESCRIPTION_WORDS: usize = 20;
const POST_PARAGRAPHS: usize = 4;
const POST_TAGS: [&str; 8] = [
    "travel", "india", "food", "trek", "beach", "culture", "budget", "rail",
];

const NUM_COMMENTS: usize = 150;
const COMMENT_WORDS: usize = 15;

const NUM_LIKES: usize = 80;

struct User {
    id: Uuid,
    total_posts: i64,
    total_reads: i64,
}

struct Post {
    id: Uuid,
    author: usize,
    draft: bool,
    reads: i64,
    likes: i64,
    comments: Vec<Uuid>,
    parent_comments: i64,
    published_at: Time,
}

struct Comment {
    id: Uuid,
    post: usize,
    author: usize,
    parent: Option<usize>,
    children: Vec<Uuid>,
    created_at: Time,
}

fn gen_n_items<T>(table: &str, columns: &str, items: &[T], f: impl Fn(usize, &T) -> String) {
    if items.is_empty() {
        return;
    }
    println!("INSERT INTO {table} ({columns}) VALUES");
    for (i, item) in items.iter().enumerate() {
        if i != 0 {
            println!(",");
        }
        print!("    {}", f(i, item));
    }
    println!();
    println!("ON CONFLICT DO NOTHING;");
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn uuid_array(ids: &[Uuid]) -> String {
    let ids = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>();
    format!("'{{{}}}'", ids.join(","))
}

fn time(t: &Time) -> String {
    quote(&t.to_rfc3339())
}

fn sentence(words: usize) -> String {
    lipsum::lipsum_words(words)
        .trim_end_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

fn main() -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();
    let now = Utc::now();
    let password_hash = bcrypt::hash(PASSWORD, bcrypt::DEFAULT_COST).context("hashing password")?;

    let mut users = (0..NUM_USERS)
        .map(|_| User {
            id: Uuid::new_v4(),
            total_posts: 0,
            total_reads: 0,
        })
        .collect::<Vec<_>>();

    let mut posts = Vec::with_capacity(NUM_POSTS);
    for _ in 0..NUM_POSTS {
        let post = Post {
            id: Uuid::new_v4(),
            author: rng.gen_range(0..users.len()),
            draft: rng.gen_ratio(1, DRAFT_ONE_IN),
            reads: 0,
            likes: 0,
            comments: Vec::new(),
            parent_comments: 0,
            published_at: now - Duration::minutes(rng.gen_range(60..60 * 24 * 90)),
        };
        if !post.draft {
            users[post.author].total_posts += 1;
        }
        posts.push(post);
    }
    let published = (0..posts.len())
        .filter(|&p| !posts[p].draft)
        .collect::<Vec<_>>();
    anyhow::ensure!(!published.is_empty(), "no published post was generated");

    // Comments only go to published posts, half of them replying to an earlier comment
    let mut comments: Vec<Comment> = Vec::with_capacity(NUM_COMMENTS);
    for _ in 0..NUM_COMMENTS {
        let post = *published.choose(&mut rng).context("picking a post")?;
        let earlier = comments
            .iter()
            .enumerate()
            .filter(|(_, c)| c.post == post)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        let parent = match rng.gen_bool(0.5) {
            true => earlier.choose(&mut rng).copied(),
            false => None,
        };
        let after = match parent {
            Some(p) => comments[p].created_at,
            None => posts[post].published_at,
        };
        let comment = Comment {
            id: Uuid::new_v4(),
            post,
            author: rng.gen_range(0..users.len()),
            parent,
            children: Vec::new(),
            created_at: after + Duration::minutes(rng.gen_range(1..600)),
        };
        if let Some(p) = parent {
            comments[p].children.push(comment.id);
        } else {
            posts[post].parent_comments += 1;
        }
        posts[post].comments.push(comment.id);
        comments.push(comment);
    }

    let mut likes = HashSet::new();
    for _ in 0..NUM_LIKES {
        let post = *published.choose(&mut rng).context("picking a post")?;
        let user = rng.gen_range(0..users.len());
        if likes.insert((post, user)) {
            posts[post].likes += 1;
        }
    }
    let mut likes = likes.into_iter().collect::<Vec<_>>();
    likes.sort_unstable();

    for &p in published.iter() {
        posts[p].reads = rng.gen_range(posts[p].likes..200);
        users[posts[p].author].total_reads += posts[p].reads;
    }

    gen_n_items(
        "users",
        "id, fullname, email, username, password_hash, external_auth, bio, profile_img, social_links, total_posts, total_reads, posts, joined_at",
        &users,
        |i, u| {
            let email = format!("traveller{i}@example.com");
            let username = username_from_email(&email, false);
            let authored = posts
                .iter()
                .filter(|p| p.author == i)
                .map(|p| p.id)
                .collect::<Vec<_>>();
            format!(
                "('{}', {}, {}, {}, {}, false, {}, {}, {}, {}, {}, {}, {})",
                u.id,
                quote(&sentence(2)),
                quote(&email),
                quote(&username),
                quote(&password_hash),
                quote(&sentence(12)),
                quote(&yatra_api::default_profile_img(&username)),
                quote(&serde_json::json!({ "website": format!("https://{username}.example.com") }).to_string()),
                u.total_posts,
                u.total_reads,
                uuid_array(&authored),
                time(&(now - Duration::days(120))),
            )
        },
    );

    gen_n_items(
        "posts",
        "id, slug, title, description, banner, content, tags, draft, author_id, total_reads, total_likes, total_comments, total_parent_comments, comment_ids, published_at",
        &posts,
        |_, p| {
            let title = sentence(POST_TITLE_WORDS);
            let blocks = (0..POST_PARAGRAPHS)
                .map(|_| serde_json::json!({ "type": "paragraph", "data": { "text": lipsum::lipsum_words(60) } }))
                .collect::<Vec<_>>();
            let tags = POST_TAGS
                .choose_multiple(&mut rand::thread_rng(), 3)
                .map(|t| quote(t))
                .collect::<Vec<_>>();
            format!(
                "('{}', {}, {}, {}, {}, {}, ARRAY[{}]::VARCHAR[], {}, '{}', {}, {}, {}, {}, {}, {})",
                p.id,
                quote(&generate_slug(&title)),
                quote(&title),
                quote(&sentence(POST_DESCRIPTION_WORDS)),
                quote(&format!("https://img.example.com/{}.jpeg", p.id)),
                quote(&serde_json::json!({ "blocks": blocks }).to_string()),
                tags.join(", "),
                p.draft,
                users[p.author].id,
                p.reads,
                p.likes,
                p.comments.len(),
                p.parent_comments,
                uuid_array(&p.comments),
                time(&p.published_at),
            )
        },
    );

    gen_n_items(
        "comments",
        "id, post_id, author_id, body, parent_id, children, is_reply, created_at",
        &comments,
        |_, c| {
            let parent = match c.parent {
                Some(p) => format!("'{}'", comments[p].id),
                None => String::from("NULL"),
            };
            format!(
                "('{}', '{}', '{}', {}, {}, {}, {}, {})",
                c.id,
                posts[c.post].id,
                users[c.author].id,
                quote(&sentence(COMMENT_WORDS)),
                parent,
                uuid_array(&c.children),
                c.parent.is_some(),
                time(&c.created_at),
            )
        },
    );

    gen_n_items("likes", "post_id, user_id", &likes, |_, &(p, u)| {
        format!("('{}', '{}')", posts[p].id, users[u].id)
    });

    // One notification per comment and per like, as the server would have written them
    let mut notifications = Vec::new();
    for c in comments.iter() {
        let post = &posts[c.post];
        let (kind, recipient, replied_on) = match c.parent {
            Some(p) => ("reply", comments[p].author, format!("'{}'", comments[p].id)),
            None => ("comment", post.author, String::from("NULL")),
        };
        notifications.push(format!(
            "('{}', '{kind}', '{}', '{}', '{}', '{}', {replied_on}, {}, {})",
            Uuid::new_v4(),
            post.id,
            users[recipient].id,
            users[c.author].id,
            c.id,
            rng.gen_bool(0.5),
            time(&c.created_at),
        ));
    }
    for &(p, u) in likes.iter() {
        notifications.push(format!(
            "('{}', 'like', '{}', '{}', '{}', NULL, NULL, {}, {})",
            Uuid::new_v4(),
            posts[p].id,
            users[posts[p].author].id,
            users[u].id,
            rng.gen_bool(0.5),
            time(&(posts[p].published_at + Duration::minutes(rng.gen_range(1..600)))),
        ));
    }
    gen_n_items(
        "notifications",
        "id, kind, post_id, recipient_id, actor_id, comment_id, replied_on_comment_id, seen, created_at",
        &notifications,
        |_, n| n.clone(),
    );

    Ok(())
}
