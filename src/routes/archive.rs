use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::archive::YearCount;
use crate::db::models::Post;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/archive/stats", get(stats))
        .route("/archive/{year}", get(by_year))
}

async fn stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<YearCount>>> {
    Ok(Json(state.archive.stats_by_user(&user.id)?))
}

async fn by_year(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(year): Path<i32>,
) -> AppResult<Json<Vec<Post>>> {
    Ok(Json(state.archive.by_year(&user.id, year)?))
}
