//! The reply form shown under a thread.
//!
//! Holds a single text field and a busy flag. Submitting moves the form
//! from `Idle` to `Submitting` until the add-comment action settles; a
//! successful reply clears the field.

use askama::Template;
use tb_core::actions::ThreadActions;
use tb_core::error::{AppError, Result};
use tb_core::models::Thread;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Submitting,
}

#[derive(Debug, Clone)]
pub struct CommentForm {
    thread_id: Uuid,
    current_user_id: Uuid,
    current_user_img: String,
    text: String,
    state: FormState,
}

#[derive(Template)]
#[template(path = "comment_form.html")]
struct CommentFormTemplate<'a> {
    form: &'a CommentForm,
    path: &'a str,
}

impl CommentForm {
    pub fn new(thread_id: Uuid, current_user_id: Uuid, current_user_img: impl Into<String>) -> Self {
        Self {
            thread_id,
            current_user_id,
            current_user_img: current_user_img.into(),
            text: String::new(),
            state: FormState::Idle,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn thread_id(&self) -> Uuid {
        self.thread_id
    }

    pub fn current_user_img(&self) -> &str {
        &self.current_user_img
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == FormState::Submitting
    }

    pub fn action_url(&self) -> String {
        format!("/thread/{}/comment", self.thread_id)
    }

    /// Posts the current text as a reply, revalidating `path` (the page the
    /// form lives on). The field keeps its text when the action fails.
    pub async fn submit(&mut self, actions: &ThreadActions, path: &str) -> Result<Thread> {
        if self.is_busy() {
            return Err(AppError::Conflict("a reply is already being submitted".into()));
        }

        self.state = FormState::Submitting;
        let result = actions
            .add_comment_to_thread(self.thread_id, &self.text, self.current_user_id, path)
            .await;
        if result.is_ok() {
            self.text.clear();
        }
        self.state = FormState::Idle;

        result
    }

    pub fn render(&self, path: &str) -> askama::Result<String> {
        CommentFormTemplate { form: self, path }.render()
    }
}
