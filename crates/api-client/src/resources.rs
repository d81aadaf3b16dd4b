//! Typed calls for the notes and job post resources

use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use crate::error::Result;

pub const NOTES_PATH: &str = "/notes/";
pub const JOB_POSTS_PATH: &str = "/jobposts/";
/// Job posts open to drivers.
pub const PUBLIC_JOB_POSTS_PATH: &str = "/public/jobposts/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Job post as listed by the backend. Only `id`, `title` and `status` are
/// interpreted; the rest is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPost {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn note_path(id: i64) -> String {
    format!("{NOTES_PATH}{id}/")
}

/// Listing endpoint for a role: drivers see public posts, everyone else
/// their own.
pub fn job_posts_path(role: &str) -> &'static str {
    if role.eq_ignore_ascii_case("driver") {
        PUBLIC_JOB_POSTS_PATH
    } else {
        JOB_POSTS_PATH
    }
}

impl ApiClient {
    pub async fn list_notes(&self) -> Result<Vec<Note>> {
        self.get(NOTES_PATH).await?.json()
    }

    pub async fn create_note(&self, content: &str) -> Result<Note> {
        self.post(NOTES_PATH, serde_json::json!({ "content": content }))
            .await?
            .json()
    }

    pub async fn update_note(&self, id: i64, content: &str) -> Result<Note> {
        self.put(note_path(id), serde_json::json!({ "content": content }))
            .await?
            .json()
    }

    pub async fn delete_note(&self, id: i64) -> Result<()> {
        self.delete(note_path(id)).await?;
        Ok(())
    }

    pub async fn list_job_posts(&self, role: &str) -> Result<Vec<JobPost>> {
        self.get(job_posts_path(role)).await?.json()
    }
}
