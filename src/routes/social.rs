use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::social::CommentNode;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts/{id}/like", post(toggle_like))
        .route(
            "/posts/{id}/comments",
            get(list_comments).post(create_comment),
        )
}

async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let liked = state.social.toggle_like(&user.id, &post_id)?;
    Ok(Json(json!({ "liked": liked })).into_response())
}

#[derive(Deserialize)]
struct CreateComment {
    comment: String,
    parent_id: Option<String>,
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    Json(body): Json<CreateComment>,
) -> AppResult<Response> {
    let id = state.social.add_comment(
        &user.id,
        &post_id,
        &body.comment,
        body.parent_id.as_deref(),
    )?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))).into_response())
}

async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<Vec<CommentNode>>> {
    Ok(Json(state.social.list_comments(&post_id)?))
}
