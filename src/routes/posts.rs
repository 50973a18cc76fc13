use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::posts::{CreatePost, NewImage, PostDetail, UpdatePost};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/posts/{id}/archive", patch(set_archived))
        .route("/posts/location/{location}", get(posts_by_location))
}

/// Multipart fields shared by create and update. Repeated `images` parts
/// carry the files; everything else is plain text.
#[derive(Default)]
struct UploadFields {
    title: Option<String>,
    description: Option<String>,
    location: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    archived: Option<bool>,
    images: Vec<NewImage>,
}

async fn read_upload(mut multipart: Multipart) -> AppResult<UploadFields> {
    let mut fields = UploadFields::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("title") => fields.title = Some(field.text().await?),
            Some("description") => fields.description = Some(field.text().await?),
            Some("location") => fields.location = Some(field.text().await?),
            Some("latitude") => fields.latitude = Some(field.text().await?),
            Some("longitude") => fields.longitude = Some(field.text().await?),
            Some("archived") => {
                fields.archived = Some(field.text().await? == "true");
            }
            Some("images") => {
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .or_else(|| {
                        field
                            .file_name()
                            .map(|n| mime_guess::from_path(n).first_or_octet_stream().to_string())
                    })
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let data = field.bytes().await?;
                fields.images.push(NewImage { data, content_type });
            }
            _ => {}
        }
    }

    Ok(fields)
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let fields = read_upload(multipart).await?;

    let input = CreatePost {
        title: fields.title.unwrap_or_default(),
        description: fields.description.unwrap_or_default(),
        location: fields.location,
        latitude: fields.latitude,
        longitude: fields.longitude,
        archived: fields.archived.unwrap_or(false),
        images: fields.images,
    };

    let id = state.posts.create(&user.id, input).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))).into_response())
}

async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<PostDetail>>> {
    Ok(Json(state.posts.list_public()?))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PostDetail>> {
    Ok(Json(state.posts.get(&id)?))
}

async fn posts_by_location(
    State(state): State<AppState>,
    Path(location): Path<String>,
) -> AppResult<Response> {
    let posts = state.posts.list_by_location(&location)?;
    Ok(Json(posts).into_response())
}

async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Response> {
    let fields = read_upload(multipart).await?;

    let input = UpdatePost {
        title: fields.title,
        description: fields.description,
        location: fields.location,
        latitude: fields.latitude,
        longitude: fields.longitude,
        archived: fields.archived,
        images: fields.images,
    };

    let id = state.posts.update(&id, &user.id, input).await?;
    Ok(Json(json!({ "id": id })).into_response())
}

#[derive(Deserialize)]
struct SetArchived {
    archived: bool,
}

async fn set_archived(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<SetArchived>,
) -> AppResult<Response> {
    let id = state.posts.set_archived(&id, &user.id, body.archived)?;
    Ok(Json(json!({ "id": id })).into_response())
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    state.posts.delete(&id, &user.id).await?;
    Ok(StatusCode::OK.into_response())
}
