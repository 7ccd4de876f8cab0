use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::recipe::{Category, Ingredient, NewRecipe, Recipe};

/// The request body for creating or replacing a recipe.
///
/// Every field is optional at the serde level so that validation can report
/// all missing fields at once instead of failing on the first one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipePayload {
    pub name: Option<String>,
    pub category: Option<String>,
    pub directions: Option<String>,
    pub serves: Option<u32>,
    pub total_time: Option<u32>,
    /// Unix timestamp in seconds.
    pub publish_date: Option<i64>,
    pub is_published: Option<bool>,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    pub image_url: Option<String>,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl RecipePayload {
    /// Validate the payload and turn it into a storable recipe body.
    ///
    /// Fails with [`AppError::Validation`] naming every missing or invalid
    /// field. Nothing is written before this succeeds.
    pub fn validate(self) -> Result<NewRecipe, AppError> {
        let mut missing = Vec::new();

        let name = present(&self.name);
        if name.is_none() {
            missing.push("name");
        }

        let category = present(&self.category).and_then(|c| c.parse::<Category>().ok());
        if category.is_none() {
            missing.push("category");
        }

        let directions = present(&self.directions);
        if directions.is_none() {
            missing.push("directions");
        }

        let serves = self.serves.filter(|s| *s > 0);
        if serves.is_none() {
            missing.push("serves");
        }

        let total_time = self.total_time.filter(|t| *t > 0);
        if total_time.is_none() {
            missing.push("totalTime");
        }

        if self.is_published.is_none() {
            missing.push("isPublished");
        }

        let publish_date = self
            .publish_date
            .filter(|secs| *secs > 0)
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        if publish_date.is_none() {
            missing.push("publishDate");
        }

        if self.ingredients.is_empty() {
            missing.push("ingredients");
        }

        let image_url = present(&self.image_url);
        if image_url.is_none() {
            missing.push("imageUrl");
        }

        match (name, category, directions, serves, total_time, self.is_published, publish_date, image_url) {
            (
                Some(name),
                Some(category),
                Some(directions),
                Some(serves),
                Some(total_time),
                Some(is_published),
                Some(publish_date),
                Some(image_url),
            ) if missing.is_empty() => Ok(NewRecipe {
                name,
                category,
                directions,
                serves,
                total_time,
                publish_date,
                is_published,
                ingredients: self.ingredients,
                image_url,
            }),
            _ => Err(AppError::Validation {
                missing: missing.into_iter().map(String::from).collect(),
            }),
        }
    }
}

/// A recipe as returned by the HTTP API.
///
/// Values are passed through undecoded: `publish_date` stays a unix
/// timestamp and the client decides how to present it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeResponse {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub directions: String,
    pub serves: u32,
    pub total_time: u32,
    pub publish_date: i64,
    pub is_published: bool,
    pub ingredients: Vec<Ingredient>,
    pub image_url: String,
}

impl From<Recipe> for RecipeResponse {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id.to_string(),
            name: recipe.name,
            category: recipe.category,
            directions: recipe.directions,
            serves: recipe.serves,
            total_time: recipe.total_time,
            publish_date: recipe.publish_date.timestamp(),
            is_published: recipe.is_published,
            ingredients: recipe.ingredients,
            image_url: recipe.image_url,
        }
    }
}

/// Response for create and replace requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIdResponse {
    pub id: String,
}
