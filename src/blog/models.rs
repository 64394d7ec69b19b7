use crate::search::types::{SearchField, Searchable};
use crate::storage::types::{EntityId, Model};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a post body, in characters.
pub const MAX_POST_LEN: usize = 140;

/// A registered author. Not mirrored into the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub username: String,
    pub email: String,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: 0,
            username: username.into(),
            email: email.into(),
        }
    }
}

impl Model for User {
    const TABLE: &'static str = "user";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    /// Usernames are unique; enforced when the user is committed.
    fn unique_key(&self) -> Option<String> {
        Some(self.username.clone())
    }
}

/// A short status update, searchable on its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: EntityId,
    pub body: String,
    pub user_id: EntityId,
    pub timestamp: DateTime<Utc>,
}

impl Post {
    pub fn new(user_id: EntityId, body: impl Into<String>) -> Self {
        Self {
            id: 0,
            body: body.into(),
            user_id,
            timestamp: Utc::now(),
        }
    }
}

impl Model for Post {
    const TABLE: &'static str = "post";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

impl Searchable for Post {
    const INDEX_NAME: &'static str = "post";
    const FIELDS: &'static [SearchField<Self>] = &[SearchField {
        name: "body",
        value: |post| post.body.clone(),
    }];
}

/// Checks a post body against the length rules; returns the trimmed body.
pub fn validate_body(body: &str) -> Result<&str, String> {
    let body = body.trim();
    if body.is_empty() {
        return Err("post body must not be empty".to_string());
    }
    let len = body.chars().count();
    if len > MAX_POST_LEN {
        return Err(format!(
            "post body is {} characters, the limit is {}",
            len, MAX_POST_LEN
        ));
    }
    Ok(body)
}
