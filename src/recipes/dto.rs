use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::recipes::repo::{Recipe, RecipeImage};

/// Raw form fields as they arrive from the multipart body. Everything is
/// text at this point; `validate` turns it into typed [`RecipeFields`].
#[derive(Debug, Default)]
pub struct RecipeInput {
    pub title: String,
    pub author: Option<String>,
    pub prep_time: String,
    pub cook_time: String,
    pub ingredients: String,
    pub instructions: String,
    pub variations: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecipeFields {
    pub title: String,
    pub author: Option<String>,
    pub prep_time: i64,
    pub cook_time: i64,
    pub ingredients: String,
    pub instructions: String,
    pub variations: Option<String>,
    pub notes: Option<String>,
}

impl RecipeInput {
    pub fn validate(self) -> Result<RecipeFields, AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("title is required".into()));
        }
        if self.ingredients.trim().is_empty() {
            return Err(AppError::Validation("ingredients are required".into()));
        }
        if self.instructions.trim().is_empty() {
            return Err(AppError::Validation("instructions are required".into()));
        }
        let prep_time = parse_minutes("prep_time", &self.prep_time)?;
        let cook_time = parse_minutes("cook_time", &self.cook_time)?;
        Ok(RecipeFields {
            title: self.title,
            author: self.author,
            prep_time,
            cook_time,
            ingredients: self.ingredients,
            instructions: self.instructions,
            variations: self.variations,
            notes: self.notes,
        })
    }
}

fn parse_minutes(field: &str, value: &str) -> Result<i64, AppError> {
    let minutes = value
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::Validation(format!("{field} must be an integer number of minutes")))?;
    if minutes < 0 {
        return Err(AppError::Validation(format!("{field} must not be negative")));
    }
    Ok(minutes)
}

/// One uploaded file from the multipart request.
#[derive(Debug)]
pub struct ImageUpload {
    pub filename: String,
    pub body: Bytes,
}

#[derive(Debug, Serialize)]
pub struct CreatedRecipe {
    pub id: i64,
    pub images: usize,
}

#[derive(Debug, Serialize)]
pub struct RecipeDetails {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub date: String,
    pub prep_time: i64,
    pub cook_time: i64,
    pub ingredients: String,
    pub ingredients_list: Vec<String>,
    pub instructions: String,
    pub variations: Option<String>,
    pub notes: Option<String>,
    pub images: Vec<RecipeImage>,
}

impl RecipeDetails {
    pub fn from_parts(recipe: Recipe, images: Vec<RecipeImage>) -> Self {
        let ingredients_list = split_ingredients(&recipe.ingredients);
        Self {
            id: recipe.id,
            title: recipe.title,
            author: recipe.author,
            date: recipe.date,
            prep_time: recipe.prep_time,
            cook_time: recipe.cook_time,
            ingredients: recipe.ingredients,
            ingredients_list,
            instructions: recipe.instructions,
            variations: recipe.variations,
            notes: recipe.notes,
            images,
        }
    }
}

/// Comma-split of the raw ingredients text. Empty text yields an empty list;
/// items are kept verbatim otherwise.
pub fn split_ingredients(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(',').map(str::to_string).collect()
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub total_recipes: i64,
    pub recently_added: Vec<Recipe>,
    pub recipes: Vec<Recipe>,
    pub results: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub keyword: Option<String>,
    pub ingredient: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub recipes: Vec<Recipe>,
    pub results: String,
}

#[derive(Debug, Deserialize)]
pub struct GalleryParams {
    pub keyword: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GalleryResponse {
    pub images: Vec<crate::recipes::repo::GalleryImage>,
    pub results: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> RecipeInput {
        RecipeInput {
            title: "Tomato Soup".into(),
            author: None,
            prep_time: "10".into(),
            cook_time: "20".into(),
            ingredients: "tomato,basil,salt".into(),
            instructions: "Simmer.".into(),
            variations: None,
            notes: None,
        }
    }

    #[test]
    fn valid_input_passes() {
        let fields = input().validate().unwrap();
        assert_eq!(fields.prep_time, 10);
        assert_eq!(fields.cook_time, 20);
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let mut bad = input();
        bad.title = "  ".into();
        assert!(matches!(bad.validate(), Err(AppError::Validation(_))));

        let mut bad = input();
        bad.instructions = String::new();
        assert!(matches!(bad.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn times_must_be_non_negative_integers() {
        let mut bad = input();
        bad.prep_time = "-5".into();
        assert!(matches!(bad.validate(), Err(AppError::Validation(_))));

        let mut bad = input();
        bad.cook_time = "a while".into();
        assert!(matches!(bad.validate(), Err(AppError::Validation(_))));

        let mut ok = input();
        ok.prep_time = "0".into();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn ingredients_split() {
        assert_eq!(
            split_ingredients("tomato,basil,salt"),
            vec!["tomato", "basil", "salt"]
        );
        assert!(split_ingredients("").is_empty());
        assert_eq!(split_ingredients("just one"), vec!["just one"]);
    }
}
