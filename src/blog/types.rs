//! Blog API Data Types
//!
//! Request and response bodies of the HTTP surface. Every response carries a
//! `status` string; failures add an `error` message and leave the payload out.

use super::models::{Post, User};
use crate::indexing::types::{PropagationReport, ReindexReport};
use crate::storage::types::EntityId;

use serde::{Deserialize, Serialize};

/// Settings the handlers need from the runtime configuration.
#[derive(Debug, Clone, Copy)]
pub struct BlogSettings {
    pub posts_per_page: usize,
}

impl Default for BlogSettings {
    fn default() -> Self {
        Self { posts_per_page: 10 }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub user_id: EntityId,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub body: String,
}

/// Result of a post write, with what happened on the index side.
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Post>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<PropagationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub status: String,
    pub query: String,
    pub results: Vec<Post>,
    pub total: usize,
    pub page: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReindexResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReindexReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
