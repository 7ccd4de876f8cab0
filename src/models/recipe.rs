use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Identifier assigned by the repository when a recipe is inserted.
///
/// Identifiers are ObjectId hex strings, so their lexicographic order follows
/// insertion order. The repositories rely on that for the `_id` tie-breaker.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(String);

impl RecipeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate a fresh identifier.
    pub fn generate() -> Self {
        Self(bson::oid::ObjectId::new().to_hex())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed set of recipe categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    BreadsSandwichesPizza,
    EggsBreakfast,
    DessertsBakedGoods,
    FishSeafood,
    Vegetables,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::BreadsSandwichesPizza,
        Category::EggsBreakfast,
        Category::DessertsBakedGoods,
        Category::FishSeafood,
        Category::Vegetables,
    ];

    /// The stored (and wire) name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::BreadsSandwichesPizza => "breadsSandwichesPizza",
            Category::EggsBreakfast => "eggsBreakfast",
            Category::DessertsBakedGoods => "dessertsBakedGoods",
            Category::FishSeafood => "fishSeafood",
            Category::Vegetables => "vegetables",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::BadRequest(format!("Unknown category '{s}'")))
    }
}

/// A single line of a recipe's ingredient list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub amount: String,
    pub unit: String,
    pub name: String,
}

/// Recipe content without an identifier, as submitted for insert or replace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecipe {
    pub name: String,
    pub category: Category,
    pub directions: String,
    pub serves: u32,
    /// Total preparation plus cooking time, in minutes.
    pub total_time: u32,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub publish_date: DateTime<Utc>,
    pub is_published: bool,
    pub ingredients: Vec<Ingredient>,
    pub image_url: String,
}

impl NewRecipe {
    pub fn with_id(self, id: RecipeId) -> Recipe {
        Recipe {
            id,
            name: self.name,
            category: self.category,
            directions: self.directions,
            serves: self.serves,
            total_time: self.total_time,
            publish_date: self.publish_date,
            is_published: self.is_published,
            ingredients: self.ingredients,
            image_url: self.image_url,
        }
    }
}

/// A recipe stored in the `recipes` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(rename = "_id")]
    pub id: RecipeId,
    pub name: String,
    pub category: Category,
    pub directions: String,
    pub serves: u32,
    pub total_time: u32,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub publish_date: DateTime<Utc>,
    pub is_published: bool,
    pub ingredients: Vec<Ingredient>,
    pub image_url: String,
}

/// Partial update: only the `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeUpdate {
    pub name: Option<String>,
    pub category: Option<Category>,
    pub directions: Option<String>,
    pub serves: Option<u32>,
    pub total_time: Option<u32>,
    pub publish_date: Option<DateTime<Utc>>,
    pub is_published: Option<bool>,
    pub ingredients: Option<Vec<Ingredient>>,
    pub image_url: Option<String>,
}

impl RecipeUpdate {
    pub fn publish() -> Self {
        Self {
            is_published: Some(true),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the update to an in-memory recipe.
    pub fn apply_to(&self, recipe: &mut Recipe) {
        if let Some(name) = &self.name {
            recipe.name = name.clone();
        }
        if let Some(category) = self.category {
            recipe.category = category;
        }
        if let Some(directions) = &self.directions {
            recipe.directions = directions.clone();
        }
        if let Some(serves) = self.serves {
            recipe.serves = serves;
        }
        if let Some(total_time) = self.total_time {
            recipe.total_time = total_time;
        }
        if let Some(publish_date) = self.publish_date {
            recipe.publish_date = publish_date;
        }
        if let Some(is_published) = self.is_published {
            recipe.is_published = is_published;
        }
        if let Some(ingredients) = &self.ingredients {
            recipe.ingredients = ingredients.clone();
        }
        if let Some(image_url) = &self.image_url {
            recipe.image_url = image_url.clone();
        }
    }

    /// Build the `$set` document for MongoDB.
    pub fn to_set_document(&self) -> Result<bson::Document, AppError> {
        use bson::Bson;

        let mut set = bson::Document::new();
        if let Some(name) = &self.name {
            set.insert("name", name.as_str());
        }
        if let Some(category) = self.category {
            set.insert("category", category.as_str());
        }
        if let Some(directions) = &self.directions {
            set.insert("directions", directions.as_str());
        }
        if let Some(serves) = self.serves {
            set.insert("serves", Bson::Int64(serves.into()));
        }
        if let Some(total_time) = self.total_time {
            set.insert("total_time", Bson::Int64(total_time.into()));
        }
        if let Some(publish_date) = self.publish_date {
            set.insert(
                "publish_date",
                Bson::DateTime(bson::DateTime::from_chrono(publish_date)),
            );
        }
        if let Some(is_published) = self.is_published {
            set.insert("is_published", is_published);
        }
        if let Some(ingredients) = &self.ingredients {
            let value = bson::to_bson(ingredients)
                .map_err(|e| AppError::Internal(format!("Failed to encode ingredients: {e}")))?;
            set.insert("ingredients", value);
        }
        if let Some(image_url) = &self.image_url {
            set.insert("image_url", image_url.as_str());
        }
        Ok(set)
    }
}
