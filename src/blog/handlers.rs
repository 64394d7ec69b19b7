use super::models::{Post, User, validate_body};
use super::types::*;
use crate::error::SyncError;
use crate::indexing::service::SearchSync;
use crate::storage::types::EntityId;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;

/// HTTP status a library error surfaces as.
pub fn status_for(err: &SyncError) -> StatusCode {
    match err {
        SyncError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        SyncError::NotFound(_) | SyncError::UnknownIndex(_) => StatusCode::NOT_FOUND,
        SyncError::Conflict(_) => StatusCode::CONFLICT,
        SyncError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        SyncError::Transport(_) | SyncError::Http(_) => StatusCode::SERVICE_UNAVAILABLE,
        SyncError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn user_error(status: StatusCode, error: String) -> (StatusCode, Json<UserResponse>) {
    (
        status,
        Json(UserResponse {
            status: "error".to_string(),
            user: None,
            error: Some(error),
        }),
    )
}

fn post_error(status: StatusCode, error: String) -> (StatusCode, Json<PostResponse>) {
    (
        status,
        Json(PostResponse {
            status: "error".to_string(),
            post: None,
            index: None,
            error: Some(error),
        }),
    )
}

pub async fn handle_create_user(
    Extension(sync): Extension<Arc<SearchSync>>,
    Json(req): Json<CreateUserRequest>,
) -> (StatusCode, Json<UserResponse>) {
    let username = req.username.trim();
    if username.is_empty() {
        return user_error(StatusCode::BAD_REQUEST, "username must not be empty".to_string());
    }

    let mut session = sync.begin();
    let mut user = User::new(username, req.email.trim());
    user.id = session.add(user.clone());

    match session.commit().await {
        Ok(_) => {
            tracing::debug!("Created user #{} ({})", user.id, user.username);
            (
                StatusCode::CREATED,
                Json(UserResponse {
                    status: "created".to_string(),
                    user: Some(user),
                    error: None,
                }),
            )
        }
        Err(e @ SyncError::Conflict(_)) => {
            tracing::info!("Rejected user '{}': {}", username, e);
            user_error(status_for(&e), e.to_string())
        }
        Err(e) => {
            tracing::error!("Failed to create user: {}", e);
            user_error(status_for(&e), e.to_string())
        }
    }
}

pub async fn handle_create_post(
    Extension(sync): Extension<Arc<SearchSync>>,
    Json(req): Json<CreatePostRequest>,
) -> (StatusCode, Json<PostResponse>) {
    let body = match validate_body(&req.body) {
        Ok(body) => body,
        Err(msg) => return post_error(StatusCode::BAD_REQUEST, msg),
    };

    if sync.db().get::<User>(req.user_id).is_none() {
        return post_error(
            StatusCode::NOT_FOUND,
            format!("user #{} does not exist", req.user_id),
        );
    }

    let mut session = sync.begin();
    let mut post = Post::new(req.user_id, body);
    post.id = session.add(post.clone());

    tracing::debug!(
        "Adding post #{} to index 'post' ({} bytes)",
        post.id,
        post.body.len()
    );

    match session.commit().await {
        Ok(report) => (
            StatusCode::CREATED,
            Json(PostResponse {
                status: "created".to_string(),
                post: Some(post),
                index: Some(report),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to create post: {}", e);
            post_error(status_for(&e), e.to_string())
        }
    }
}

pub async fn handle_get_post(
    Path(id): Path<EntityId>,
    Extension(sync): Extension<Arc<SearchSync>>,
) -> (StatusCode, Json<PostResponse>) {
    match sync.db().get::<Post>(id) {
        Some(post) => (
            StatusCode::OK,
            Json(PostResponse {
                status: "ok".to_string(),
                post: Some(post),
                index: None,
                error: None,
            }),
        ),
        None => post_error(StatusCode::NOT_FOUND, format!("post #{} does not exist", id)),
    }
}

pub async fn handle_update_post(
    Path(id): Path<EntityId>,
    Extension(sync): Extension<Arc<SearchSync>>,
    Json(req): Json<UpdatePostRequest>,
) -> (StatusCode, Json<PostResponse>) {
    let body = match validate_body(&req.body) {
        Ok(body) => body,
        Err(msg) => return post_error(StatusCode::BAD_REQUEST, msg),
    };

    let mut session = sync.begin();
    let Some(mut post) = session.get::<Post>(id) else {
        return post_error(StatusCode::NOT_FOUND, format!("post #{} does not exist", id));
    };
    post.body = body.to_string();

    if let Err(e) = session.update(post.clone()) {
        return post_error(status_for(&e), e.to_string());
    }

    match session.commit().await {
        Ok(report) => {
            tracing::debug!("Updated post #{} ({} bytes)", post.id, post.body.len());
            (
                StatusCode::OK,
                Json(PostResponse {
                    status: "updated".to_string(),
                    post: Some(post),
                    index: Some(report),
                    error: None,
                }),
            )
        }
        Err(e) => {
            tracing::warn!("Failed to update post #{}: {}", id, e);
            post_error(status_for(&e), e.to_string())
        }
    }
}

pub async fn handle_delete_post(
    Path(id): Path<EntityId>,
    Extension(sync): Extension<Arc<SearchSync>>,
) -> (StatusCode, Json<PostResponse>) {
    let mut session = sync.begin();
    if let Err(e) = session.delete::<Post>(id) {
        return post_error(status_for(&e), e.to_string());
    }

    match session.commit().await {
        Ok(report) => {
            tracing::debug!("Removing post #{} from index 'post'", id);
            (
                StatusCode::OK,
                Json(PostResponse {
                    status: "deleted".to_string(),
                    post: None,
                    index: Some(report),
                    error: None,
                }),
            )
        }
        Err(e) => {
            tracing::warn!("Failed to delete post #{}: {}", id, e);
            post_error(status_for(&e), e.to_string())
        }
    }
}

pub async fn handle_search(
    Query(params): Query<SearchParams>,
    Extension(sync): Extension<Arc<SearchSync>>,
    Extension(settings): Extension<BlogSettings>,
) -> (StatusCode, Json<SearchResponse>) {
    let page = params.page.unwrap_or(1);

    match sync
        .search::<Post>(&params.q, page, settings.posts_per_page)
        .await
    {
        Ok(result) => {
            let status = if sync.is_search_enabled() {
                "ok"
            } else {
                "disabled"
            };
            let next_page = result.has_next().then(|| page + 1);
            let prev_page = result.has_prev().then(|| page - 1);

            (
                StatusCode::OK,
                Json(SearchResponse {
                    status: status.to_string(),
                    query: params.q,
                    total: result.total,
                    page,
                    next_page,
                    prev_page,
                    results: result.records,
                    error: None,
                }),
            )
        }
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::error!("Search for '{}' failed: {}", params.q, e);
            }
            (
                status,
                Json(SearchResponse {
                    status: "error".to_string(),
                    query: params.q,
                    results: Vec::new(),
                    total: 0,
                    page,
                    next_page: None,
                    prev_page: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_reindex(
    Path(index): Path<String>,
    Extension(sync): Extension<Arc<SearchSync>>,
) -> (StatusCode, Json<ReindexResponse>) {
    tracing::info!("Reindex of '{}' requested", index);

    match sync.rebuild(&index).await {
        Ok(report) => {
            let status = if report.failed > 0 { "partial" } else { "ok" };
            (
                StatusCode::OK,
                Json(ReindexResponse {
                    status: status.to_string(),
                    report: Some(report),
                    error: None,
                }),
            )
        }
        Err(e) => (
            status_for(&e),
            Json(ReindexResponse {
                status: "error".to_string(),
                report: None,
                error: Some(e.to_string()),
            }),
        ),
    }
}
