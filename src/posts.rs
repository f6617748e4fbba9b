use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::AdminSession,
    error::AppError,
    state::AppState,
    store::{Comment, Post},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/{id}/like", post(like_post))
        .route("/api/posts/{id}/comments", post(add_comment))
}

async fn list_posts(State(state): State<AppState>) -> Json<Vec<Post>> {
    Json(state.store.load_all().await)
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct CreatePostRequest {
    image_url: Option<String>,
    description: Option<String>,
    author: Option<String>,
}

async fn create_post(
    State(state): State<AppState>,
    AdminSession(is_admin): AdminSession,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    if !state.open_posting && !is_admin {
        return Err(AppError::Forbidden);
    }
    let Json(req) = payload?;

    let post = state
        .store
        .create_post(
            req.image_url.as_deref().unwrap_or_default(),
            req.description.as_deref().unwrap_or_default(),
            req.author.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

async fn like_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let likes = state.store.like_post(&id).await?;
    Ok(Json(json!({ "likes": likes })))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AddCommentRequest {
    author: Option<String>,
    text: Option<String>,
}

async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AddCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let Json(req) = payload?;
    let comment = state
        .store
        .add_comment(
            &id,
            req.author.as_deref(),
            req.text.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}
