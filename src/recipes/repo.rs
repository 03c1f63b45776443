use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, Transaction};

use crate::recipes::dto::RecipeFields;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub date: String,
    pub prep_time: i64,
    pub cook_time: i64,
    pub ingredients: String,
    pub instructions: String,
    pub variations: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecipeImage {
    pub id: i64,
    pub recipe_id: i64,
    pub image_path: String,
}

/// One gallery row: an image joined with its recipe's display fields.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GalleryImage {
    pub image_id: i64,
    pub image_path: String,
    pub recipe_id: i64,
    pub title: String,
    pub ingredients: String,
}

pub async fn insert_recipe_tx(
    tx: &mut Transaction<'_, Sqlite>,
    fields: &RecipeFields,
    date: &str,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO recipes (title, author, date, prep_time, cook_time,
                             ingredients, instructions, variations, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&fields.title)
    .bind(&fields.author)
    .bind(date)
    .bind(fields.prep_time)
    .bind(fields.cook_time)
    .bind(&fields.ingredients)
    .bind(&fields.instructions)
    .bind(&fields.variations)
    .bind(&fields.notes)
    .execute(&mut **tx)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Replaces all mutable fields. `date` is deliberately absent from the SET
/// list: the creation date is immutable.
pub async fn update_recipe_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    fields: &RecipeFields,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE recipes
           SET title = ?, author = ?, prep_time = ?, cook_time = ?,
               ingredients = ?, instructions = ?, variations = ?, notes = ?
         WHERE id = ?
        "#,
    )
    .bind(&fields.title)
    .bind(&fields.author)
    .bind(fields.prep_time)
    .bind(fields.cook_time)
    .bind(&fields.ingredients)
    .bind(&fields.instructions)
    .bind(&fields.variations)
    .bind(&fields.notes)
    .bind(id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn insert_image_tx(
    tx: &mut Transaction<'_, Sqlite>,
    recipe_id: i64,
    image_path: &str,
) -> sqlx::Result<i64> {
    let result = sqlx::query("INSERT INTO recipe_images (recipe_id, image_path) VALUES (?, ?)")
        .bind(recipe_id)
        .bind(image_path)
        .execute(&mut **tx)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn get_recipe(db: &SqlitePool, id: i64) -> sqlx::Result<Option<Recipe>> {
    sqlx::query_as::<_, Recipe>(
        r#"
        SELECT id, title, author, date, prep_time, cook_time,
               ingredients, instructions, variations, notes
        FROM recipes
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn list_images(db: &SqlitePool, recipe_id: i64) -> sqlx::Result<Vec<RecipeImage>> {
    sqlx::query_as::<_, RecipeImage>(
        "SELECT id, recipe_id, image_path FROM recipe_images WHERE recipe_id = ? ORDER BY id",
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
}

pub async fn get_image(db: &SqlitePool, image_id: i64) -> sqlx::Result<Option<RecipeImage>> {
    sqlx::query_as::<_, RecipeImage>(
        "SELECT id, recipe_id, image_path FROM recipe_images WHERE id = ?",
    )
    .bind(image_id)
    .fetch_optional(db)
    .await
}

pub async fn delete_image_row(db: &SqlitePool, image_id: i64) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM recipe_images WHERE id = ?")
        .bind(image_id)
        .execute(db)
        .await?;
    Ok(())
}

/// The ON DELETE CASCADE on recipe_images removes the owned rows in the
/// same statement's transaction.
pub async fn delete_recipe_row(db: &SqlitePool, id: i64) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM recipes WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn count_recipes(db: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM recipes")
        .fetch_one(db)
        .await
}

pub async fn list_all(db: &SqlitePool) -> sqlx::Result<Vec<Recipe>> {
    sqlx::query_as::<_, Recipe>(
        r#"
        SELECT id, title, author, date, prep_time, cook_time,
               ingredients, instructions, variations, notes
        FROM recipes
        ORDER BY date DESC, id DESC
        "#,
    )
    .fetch_all(db)
    .await
}

pub async fn recently_added(db: &SqlitePool, limit: i64) -> sqlx::Result<Vec<Recipe>> {
    sqlx::query_as::<_, Recipe>(
        r#"
        SELECT id, title, author, date, prep_time, cook_time,
               ingredients, instructions, variations, notes
        FROM recipes
        ORDER BY date DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(db)
    .await
}

/// Case-insensitive substring search. A keyword matches title or
/// ingredients, an ingredient matches ingredients only; both filters are
/// ANDed when both are present. Results are ordered by creation date
/// descending with id descending as the tiebreak.
pub async fn search(
    db: &SqlitePool,
    keyword: Option<&str>,
    ingredient: Option<&str>,
) -> sqlx::Result<Vec<Recipe>> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT id, title, author, date, prep_time, cook_time, \
         ingredients, instructions, variations, notes FROM recipes",
    );
    let mut sep = " WHERE ";
    if let Some(keyword) = keyword {
        let pattern = like_pattern(keyword);
        qb.push(sep);
        sep = " AND ";
        qb.push("(LOWER(title) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(ingredients) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(ingredient) = ingredient {
        qb.push(sep);
        qb.push("LOWER(ingredients) LIKE ")
            .push_bind(like_pattern(ingredient));
    }
    qb.push(" ORDER BY date DESC, id DESC");
    qb.build_query_as::<Recipe>().fetch_all(db).await
}

pub async fn gallery(db: &SqlitePool, keyword: Option<&str>) -> sqlx::Result<Vec<GalleryImage>> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT ri.id AS image_id, ri.image_path, r.id AS recipe_id, r.title, r.ingredients \
         FROM recipe_images ri JOIN recipes r ON r.id = ri.recipe_id",
    );
    if let Some(keyword) = keyword {
        let pattern = like_pattern(keyword);
        qb.push(" WHERE (LOWER(r.title) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(r.ingredients) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    qb.push(" ORDER BY ri.id");
    qb.build_query_as::<GalleryImage>().fetch_all(db).await
}

fn like_pattern(term: &str) -> String {
    format!("%{}%", term.to_lowercase())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::str::FromStr;

    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    use super::*;

    pub(crate) async fn test_pool() -> SqlitePool {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        // One connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    pub(crate) fn fields(title: &str, ingredients: &str) -> RecipeFields {
        RecipeFields {
            title: title.into(),
            author: None,
            prep_time: 10,
            cook_time: 20,
            ingredients: ingredients.into(),
            instructions: "Simmer.".into(),
            variations: None,
            notes: None,
        }
    }

    pub(crate) async fn insert(
        db: &SqlitePool,
        title: &str,
        ingredients: &str,
        date: &str,
    ) -> i64 {
        let mut tx = db.begin().await.unwrap();
        let id = insert_recipe_tx(&mut tx, &fields(title, ingredients), date)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        id
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let db = test_pool().await;
        let id = insert(&db, "Tomato Soup", "tomato,basil,salt", "2026-08-30").await;

        let recipe = get_recipe(&db, id).await.unwrap().unwrap();
        assert_eq!(recipe.title, "Tomato Soup");
        assert_eq!(recipe.date, "2026-08-30");
        assert_eq!(recipe.prep_time, 10);

        assert!(get_recipe(&db, id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cascade_removes_image_rows() {
        let db = test_pool().await;
        let id = insert(&db, "Salad", "lettuce", "2026-08-30").await;

        let mut tx = db.begin().await.unwrap();
        insert_image_tx(&mut tx, id, "IMG_AAAAAAAAAA.png").await.unwrap();
        insert_image_tx(&mut tx, id, "IMG_BBBBBBBBBB.png").await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(list_images(&db, id).await.unwrap().len(), 2);

        delete_recipe_row(&db, id).await.unwrap();
        assert!(list_images(&db, id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_paths_are_unique() {
        let db = test_pool().await;
        let id = insert(&db, "Salad", "lettuce", "2026-08-30").await;

        let mut tx = db.begin().await.unwrap();
        insert_image_tx(&mut tx, id, "IMG_AAAAAAAAAA.png").await.unwrap();
        assert!(insert_image_tx(&mut tx, id, "IMG_AAAAAAAAAA.png")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn search_matches_title_and_ingredients() {
        let db = test_pool().await;
        insert(&db, "Tomato Soup", "tomato,basil,salt", "2026-08-30").await;
        insert(&db, "Pancakes", "flour,eggs,milk", "2026-08-29").await;

        let hits = search(&db, Some("TOMATO"), None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Tomato Soup");

        // Keyword also reaches into the ingredients text.
        let hits = search(&db, Some("eggs"), None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Pancakes");

        let hits = search(&db, None, Some("basil")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Tomato Soup");
    }

    #[tokio::test]
    async fn both_filters_are_anded() {
        let db = test_pool().await;
        insert(&db, "Tomato Soup", "tomato,basil,salt", "2026-08-30").await;
        insert(&db, "Tomato Salad", "tomato,lettuce", "2026-08-29").await;

        let hits = search(&db, Some("tomato"), Some("lettuce")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Tomato Salad");
    }

    #[tokio::test]
    async fn results_ordered_by_date_then_id_descending() {
        let db = test_pool().await;
        let old = insert(&db, "Old", "a", "2026-08-01").await;
        let first = insert(&db, "SameDay A", "a", "2026-08-30").await;
        let second = insert(&db, "SameDay B", "a", "2026-08-30").await;

        let all = search(&db, None, None).await.unwrap();
        let ids: Vec<i64> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second, first, old]);

        let recent = recently_added(&db, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, second);
    }

    #[tokio::test]
    async fn gallery_joins_recipe_fields() {
        let db = test_pool().await;
        let id = insert(&db, "Tomato Soup", "tomato,basil", "2026-08-30").await;
        let other = insert(&db, "Pancakes", "flour", "2026-08-30").await;

        let mut tx = db.begin().await.unwrap();
        insert_image_tx(&mut tx, id, "IMG_AAAAAAAAAA.png").await.unwrap();
        insert_image_tx(&mut tx, other, "IMG_BBBBBBBBBB.png").await.unwrap();
        tx.commit().await.unwrap();

        let all = gallery(&db, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "Tomato Soup");

        let filtered = gallery(&db, Some("tomato")).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].image_path, "IMG_AAAAAAAAAA.png");
    }
}
