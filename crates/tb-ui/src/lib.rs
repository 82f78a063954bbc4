//! # tb-ui
//!
//! Askama page templates and the display models they render.

mod comment_form;

pub use comment_form::{CommentForm, FormState};

use askama::Template;
use tb_core::models::{Children, ThreadView, User};
use uuid::Uuid;

/// Reply avatars shown under a feed entry.
const MAX_REPLY_AVATARS: usize = 3;

/// The signed-in user, as shown in the page header.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub id: Uuid,
    pub name: String,
    pub image: String,
}

impl From<&User> for Viewer {
    fn from(user: &User) -> Self {
        Self { id: user.id, name: user.name.clone(), image: user.image.clone() }
    }
}

/// A thread flattened for display.
#[derive(Debug, Clone)]
pub struct PostCard {
    pub id: Uuid,
    pub text: String,
    pub author_name: String,
    pub author_image: String,
    pub created_at: String,
    pub reply_count: usize,
    pub reply_avatars: Vec<String>,
    /// Nesting depth on a thread page, in rem
    pub indent: usize,
    /// Replies that exist but were not populated at this depth
    pub hidden_replies: usize,
}

impl PostCard {
    pub fn from_view(view: &ThreadView, indent: usize) -> Self {
        let hidden_replies = match &view.children {
            Children::Ids(ids) => ids.len(),
            Children::Resolved(_) => 0,
        };
        Self {
            id: view.id,
            text: view.text.clone(),
            author_name: view.author.name.clone(),
            author_image: view.author.image.clone(),
            created_at: view.created_at.format("%b %d, %Y %H:%M").to_string(),
            reply_count: view.children.len(),
            reply_avatars: view
                .children
                .resolved()
                .iter()
                .map(|reply| reply.author.image.clone())
                .take(MAX_REPLY_AVATARS)
                .collect(),
            indent,
            hidden_replies,
        }
    }
}

/// Flattens the populated replies of `view` depth-first, oldest first.
pub fn flatten_replies(view: &ThreadView) -> Vec<PostCard> {
    fn walk(view: &ThreadView, depth: usize, out: &mut Vec<PostCard>) {
        for reply in view.children.resolved() {
            out.push(PostCard::from_view(reply, depth * 2));
            walk(reply, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    walk(view, 0, &mut out);
    out
}

#[derive(Template)]
#[template(path = "feed.html")]
pub struct FeedTemplate<'a> {
    pub title: &'a str,
    pub viewer: Option<&'a Viewer>,
    pub posts: &'a Vec<PostCard>,
    pub page: u32,
    pub page_size: u32,
    pub prev_page: Option<u32>,
    pub next_page: Option<u32>,
}

#[derive(Template)]
#[template(path = "thread.html")]
pub struct ThreadTemplate<'a> {
    pub title: &'a str,
    pub viewer: Option<&'a Viewer>,
    pub thread: &'a PostCard,
    pub replies: &'a Vec<PostCard>,
    /// Pre-rendered reply form; `None` for signed-out visitors
    pub comment_form: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tb_core::models::AuthorSummary;

    fn view(text: &str, author: &str, children: Children) -> ThreadView {
        ThreadView {
            id: Uuid::now_v7(),
            text: text.to_string(),
            author: AuthorSummary {
                id: Uuid::now_v7(),
                name: author.to_string(),
                image: format!("/avatars/{}.png", author),
            },
            community: None,
            parent_id: None,
            children,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn flatten_indents_nested_replies() {
        let grandchild = view("deep", "c", Children::Ids(vec![Uuid::now_v7()]));
        let child = view("reply", "b", Children::Resolved(vec![grandchild]));
        let root = view("root", "a", Children::Resolved(vec![child]));

        let replies = flatten_replies(&root);

        assert_eq!(replies.len(), 2);
        assert_eq!((replies[0].text.as_str(), replies[0].indent), ("reply", 0));
        assert_eq!((replies[1].text.as_str(), replies[1].indent), ("deep", 2));
        assert_eq!(replies[1].hidden_replies, 1);
    }

    #[test]
    fn feed_escapes_post_text() {
        let posts = vec![PostCard::from_view(
            &view("<script>alert(1)</script>", "ada", Children::Ids(vec![])),
            0,
        )];
        let html = FeedTemplate {
            title: "Threads",
            viewer: None,
            posts: &posts,
            page: 1,
            page_size: 20,
            prev_page: None,
            next_page: Some(2),
        }
        .render()
        .unwrap();

        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("/?page=2&amp;size=20") || html.contains("/?page=2&size=20"));
        assert!(html.contains("Signed out"));
    }

    #[test]
    fn thread_page_without_form_asks_to_sign_in() {
        let root = view("root", "a", Children::Resolved(vec![]));
        let card = PostCard::from_view(&root, 0);
        let html = ThreadTemplate {
            title: "Thread",
            viewer: None,
            thread: &card,
            replies: &Vec::new(),
            comment_form: None,
        }
        .render()
        .unwrap();

        assert!(html.contains("Sign in to reply."));
        assert!(html.contains("root"));
    }

    #[test]
    fn feed_pluralizes_reply_count() {
        let one = view("one", "a", Children::Resolved(vec![view("r", "b", Children::Ids(vec![]))]));
        let two = view("two", "a", Children::Ids(vec![Uuid::now_v7(), Uuid::now_v7()]));
        let posts = vec![PostCard::from_view(&one, 0), PostCard::from_view(&two, 0)];
        let html = FeedTemplate {
            title: "Threads",
            viewer: None,
            posts: &posts,
            page: 1,
            page_size: 20,
            prev_page: None,
            next_page: None,
        }
        .render()
        .unwrap();

        assert!(html.contains("1 reply"));
        assert!(!html.contains("1 replies"));
        assert!(html.contains("2 replies"));
    }
}
