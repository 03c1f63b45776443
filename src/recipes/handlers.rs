use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::error::{AppError, AppResult};
use crate::export;
use crate::recipes::dto::{
    CreatedRecipe, GalleryParams, GalleryResponse, ImageUpload, IndexResponse, RecipeDetails,
    RecipeInput, SearchParams, SearchResponse,
};
use crate::recipes::{repo, service};
use crate::state::AppState;

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(index))
        .route("/recipes/search", get(search))
        .route("/recipes/:id", get(read_recipe))
        .route("/recipes/:id/pdf", get(export_pdf))
        .route("/gallery", get(gallery))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/recipes", post(create_recipe))
        .route("/recipes/:id", put(update_recipe))
        .route("/recipes/:id", delete(delete_recipe))
        .route("/images/:id", delete(delete_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

// --- handlers ---

#[instrument(skip(state))]
async fn index(State(state): State<AppState>) -> AppResult<Json<IndexResponse>> {
    Ok(Json(service::index(&state.db).await?))
}

#[instrument(skip(state, mp))]
async fn create_recipe(
    State(state): State<AppState>,
    mp: Multipart,
) -> AppResult<(StatusCode, Json<CreatedRecipe>)> {
    let (input, uploads) = parse_recipe_form(mp).await?;
    let (id, images) = service::create_recipe(&state, input, uploads).await?;
    Ok((StatusCode::CREATED, Json(CreatedRecipe { id, images })))
}

#[instrument(skip(state))]
async fn read_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<RecipeDetails>> {
    Ok(Json(service::read_recipe(&state, id).await?))
}

#[instrument(skip(state, mp))]
async fn update_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    mp: Multipart,
) -> AppResult<StatusCode> {
    let (input, uploads) = parse_recipe_form(mp).await?;
    service::update_recipe(&state, id, input, uploads).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    service::delete_recipe(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    service::delete_image(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<SearchResponse>> {
    Ok(Json(service::search(&state.db, params).await?))
}

#[instrument(skip(state))]
async fn gallery(
    State(state): State<AppState>,
    Query(params): Query<GalleryParams>,
) -> AppResult<Json<GalleryResponse>> {
    Ok(Json(service::gallery(&state.db, params).await?))
}

#[instrument(skip(state))]
async fn export_pdf(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let recipe = repo::get_recipe(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("recipe"))?;
    let bytes = export::render_pdf(&recipe)?;
    let filename = export::download_name(&recipe.title, &recipe.date);
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, bytes))
}

// --- multipart parsing ---

async fn parse_recipe_form(mut mp: Multipart) -> AppResult<(RecipeInput, Vec<ImageUpload>)> {
    let mut input = RecipeInput::default();
    let mut uploads = Vec::new();
    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "images" || name == "images[]" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let body = field.bytes().await.map_err(bad_multipart)?;
            uploads.push(ImageUpload { filename, body });
            continue;
        }
        let value = field.text().await.map_err(bad_multipart)?;
        match name.as_str() {
            "title" => input.title = value,
            "author" => input.author = some_if_not_empty(value),
            "prep_time" => input.prep_time = value,
            "cook_time" => input.cook_time = value,
            "ingredients" => input.ingredients = value,
            "instructions" => input.instructions = value,
            "variations" => input.variations = some_if_not_empty(value),
            "notes" => input.notes = some_if_not_empty(value),
            _ => {}
        }
    }
    Ok((input, uploads))
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("malformed multipart body: {e}"))
}

fn some_if_not_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
