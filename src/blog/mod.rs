//! Microblog Module
//!
//! The application the sync layer serves: users write short posts, and posts
//! are searchable by their body.
//!
//! Every write goes through a `SearchSync` session, so the post index follows
//! committed posts without the handlers ever calling the index themselves.
//!
//! ## Submodules
//! - **`models`**: `User` and the searchable `Post`.
//! - **`types`**: Request and response bodies.
//! - **`handlers`**: axum handlers and the error-to-status mapping.

pub mod handlers;
pub mod models;
pub mod types;


use handlers::*;
use types::BlogSettings;

use crate::indexing::service::SearchSync;

use axum::routing::{get, post};
use axum::{Extension, Router};
use std::sync::Arc;

/// The HTTP surface of the blog.
pub fn router(sync: Arc<SearchSync>, settings: BlogSettings) -> Router {
    Router::new()
        .route("/users", post(handle_create_user))
        .route("/posts", post(handle_create_post))
        .route(
            "/posts/:id",
            get(handle_get_post)
                .put(handle_update_post)
                .delete(handle_delete_post),
        )
        .route("/search", get(handle_search))
        .route("/admin/reindex/:index", post(handle_reindex))
        .layer(Extension(sync))
        .layer(Extension(settings))
}
