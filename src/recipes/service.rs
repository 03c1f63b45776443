use sqlx::SqlitePool;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::recipes::dto::{
    GalleryParams, GalleryResponse, ImageUpload, IndexResponse, RecipeDetails, RecipeFields,
    RecipeInput, SearchParams, SearchResponse,
};
use crate::recipes::repo;
use crate::state::AppState;
use crate::store::{allowed_extension, generate_image_name, ImageStore};

fn today() -> AppResult<String> {
    let fmt = format_description!("[year]-[month]-[day]");
    OffsetDateTime::now_utc()
        .date()
        .format(&fmt)
        .map_err(|e| AppError::Internal(e.into()))
}

/// Writes accepted uploads to the image store and returns their keys.
/// Disallowed extensions and empty payloads are skipped, never fatal. A
/// failed write discards everything staged so far and aborts.
async fn stage_uploads(
    store: &dyn ImageStore,
    uploads: Vec<ImageUpload>,
) -> AppResult<Vec<String>> {
    let mut staged = Vec::new();
    for upload in uploads {
        let Some(ext) = allowed_extension(&upload.filename) else {
            debug!(filename = %upload.filename, "skipping upload with disallowed extension");
            continue;
        };
        if upload.body.is_empty() {
            debug!(filename = %upload.filename, "skipping empty upload");
            continue;
        }
        let key = generate_image_name(&ext);
        if let Err(e) = store.write(&key, upload.body).await {
            discard_staged(store, &staged).await;
            return Err(AppError::FileIo(e));
        }
        staged.push(key);
    }
    Ok(staged)
}

async fn discard_staged(store: &dyn ImageStore, keys: &[String]) {
    for key in keys {
        if let Err(e) = store.remove(key).await {
            warn!(key = %key, error = %e, "failed to discard staged image file");
        }
    }
}

/// Creates a recipe with its images. Files are written before the database
/// transaction; if the transaction fails the written files are removed, so
/// neither partial rows nor orphaned files survive a failure.
pub async fn create_recipe(
    state: &AppState,
    input: RecipeInput,
    uploads: Vec<ImageUpload>,
) -> AppResult<(i64, usize)> {
    let fields = input.validate()?;
    info!(title = %fields.title, "adding new recipe");

    let date = today()?;
    let staged = stage_uploads(state.images.as_ref(), uploads).await?;
    match persist_new_recipe(&state.db, &fields, &date, &staged).await {
        Ok(id) => {
            info!(recipe_id = id, images = staged.len(), "recipe added");
            Ok((id, staged.len()))
        }
        Err(e) => {
            discard_staged(state.images.as_ref(), &staged).await;
            Err(e.into())
        }
    }
}

async fn persist_new_recipe(
    db: &SqlitePool,
    fields: &RecipeFields,
    date: &str,
    image_keys: &[String],
) -> sqlx::Result<i64> {
    let mut tx = db.begin().await?;
    let id = repo::insert_recipe_tx(&mut tx, fields, date).await?;
    for key in image_keys {
        repo::insert_image_tx(&mut tx, id, key).await?;
    }
    tx.commit().await?;
    Ok(id)
}

pub async fn read_recipe(state: &AppState, id: i64) -> AppResult<RecipeDetails> {
    let recipe = repo::get_recipe(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("recipe"))?;
    let images = repo::list_images(&state.db, id).await?;
    Ok(RecipeDetails::from_parts(recipe, images))
}

/// Replaces all mutable fields; the creation date is never touched. New
/// uploads are appended to the existing image set, with the same staging
/// discipline as create.
pub async fn update_recipe(
    state: &AppState,
    id: i64,
    input: RecipeInput,
    uploads: Vec<ImageUpload>,
) -> AppResult<usize> {
    repo::get_recipe(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("recipe"))?;
    let fields = input.validate()?;
    info!(recipe_id = id, "updating recipe");

    let staged = stage_uploads(state.images.as_ref(), uploads).await?;
    match persist_update(&state.db, id, &fields, &staged).await {
        Ok(()) => {
            info!(recipe_id = id, new_images = staged.len(), "recipe updated");
            Ok(staged.len())
        }
        Err(e) => {
            discard_staged(state.images.as_ref(), &staged).await;
            Err(e.into())
        }
    }
}

async fn persist_update(
    db: &SqlitePool,
    id: i64,
    fields: &RecipeFields,
    image_keys: &[String],
) -> sqlx::Result<()> {
    let mut tx = db.begin().await?;
    repo::update_recipe_tx(&mut tx, id, fields).await?;
    for key in image_keys {
        repo::insert_image_tx(&mut tx, id, key).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Deletes a recipe, its image rows (by cascade) and their backing files.
/// A backing file that is already gone is tolerated; any other removal
/// error aborts before a single row is deleted, so the failure is reported
/// instead of leaving unreferenced files behind.
pub async fn delete_recipe(state: &AppState, id: i64) -> AppResult<()> {
    repo::get_recipe(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("recipe"))?;
    info!(recipe_id = id, "deleting recipe");

    let images = repo::list_images(&state.db, id).await?;
    for image in &images {
        if !state.images.remove(&image.image_path).await? {
            warn!(recipe_id = id, key = %image.image_path, "image file was already missing");
        }
    }
    repo::delete_recipe_row(&state.db, id).await?;
    info!(recipe_id = id, images = images.len(), "recipe deleted");
    Ok(())
}

pub async fn delete_image(state: &AppState, image_id: i64) -> AppResult<()> {
    let image = repo::get_image(&state.db, image_id)
        .await?
        .ok_or(AppError::NotFound("image"))?;
    if !state.images.remove(&image.image_path).await? {
        warn!(image_id, key = %image.image_path, "image file was already missing");
    }
    repo::delete_image_row(&state.db, image_id).await?;
    info!(image_id, recipe_id = image.recipe_id, "image deleted");
    Ok(())
}

pub async fn index(db: &SqlitePool) -> AppResult<IndexResponse> {
    let total_recipes = repo::count_recipes(db).await?;
    let recently_added = repo::recently_added(db, 8).await?;
    let recipes = repo::list_all(db).await?;
    let results = if recipes.is_empty() {
        "You don't have any recipes yet. Why not add your first one?".to_string()
    } else {
        format!("Showing all {} recipes in the database:", recipes.len())
    };
    Ok(IndexResponse {
        total_recipes,
        recently_added,
        recipes,
        results,
    })
}

pub async fn search(db: &SqlitePool, params: SearchParams) -> AppResult<SearchResponse> {
    let keyword = params.keyword.as_deref().filter(|s| !s.is_empty());
    let ingredient = params.ingredient.as_deref().filter(|s| !s.is_empty());
    let recipes = repo::search(db, keyword, ingredient).await?;
    let results = search_summary(&recipes, keyword, ingredient);
    Ok(SearchResponse { recipes, results })
}

fn search_summary(
    recipes: &[repo::Recipe],
    keyword: Option<&str>,
    ingredient: Option<&str>,
) -> String {
    if recipes.is_empty() {
        return "No recipes found matching your criteria.".to_string();
    }
    let n = recipes.len();
    match (keyword, ingredient) {
        (Some(k), Some(i)) => format!("Found {n} recipes matching your filters '{k}' and '{i}':"),
        (Some(k), None) => format!("Found {n} recipes matching your keyword '{k}':"),
        (None, Some(i)) => format!("Found {n} recipes containing '{i}':"),
        (None, None) => format!("Showing all {n} recipes in the database:"),
    }
}

pub async fn gallery(db: &SqlitePool, params: GalleryParams) -> AppResult<GalleryResponse> {
    let keyword = params.keyword.as_deref().filter(|s| !s.is_empty());
    let images = repo::gallery(db, keyword).await?;
    let results = match (keyword, images.is_empty()) {
        (Some(_), true) => "No photos found for this keyword. Why not add your first one?".to_string(),
        (Some(k), false) => format!("Showing {} images matching '{k}'.", images.len()),
        (None, _) => format!("Showing all {} images.", images.len()),
    };
    Ok(GalleryResponse { images, results })
}
