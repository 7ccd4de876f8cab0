use async_trait::async_trait;

use crate::error::AppError;
use crate::models::recipe::{NewRecipe, Recipe, RecipeId, RecipeUpdate};
use crate::query::builder::RecipeQuery;

/// Repository trait for recipe operations.
///
/// This trait allows swapping the database layer in tests. Mutations return
/// snapshots of the recipe so lifecycle events can carry before/after pairs.
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// Insert a new recipe and return it with its assigned id.
    async fn insert(&self, recipe: NewRecipe) -> Result<Recipe, AppError>;

    /// Find a recipe by id.
    async fn get(&self, id: &RecipeId) -> Result<Option<Recipe>, AppError>;

    /// Run a bounded query.
    ///
    /// Fails with [`AppError::UnresolvableCursor`] when the query resumes
    /// after a recipe that no longer exists.
    async fn query(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, AppError>;

    /// Apply a partial update. Returns `(before, after)`, or `None` if the
    /// recipe does not exist.
    async fn update(
        &self,
        id: &RecipeId,
        update: RecipeUpdate,
    ) -> Result<Option<(Recipe, Recipe)>, AppError>;

    /// Replace the whole recipe body. Returns `(before, after)`, or `None`
    /// if the recipe does not exist.
    async fn replace(
        &self,
        id: &RecipeId,
        recipe: NewRecipe,
    ) -> Result<Option<(Recipe, Recipe)>, AppError>;

    /// Delete a recipe, returning the deleted snapshot.
    async fn delete(&self, id: &RecipeId) -> Result<Option<Recipe>, AppError>;
}

/// MongoDB implementation of the RecipeRepository.
///
/// This is only available when the `server` feature is enabled.
#[cfg(feature = "server")]
pub struct MongoRecipeRepository {
    collection: mongodb::Collection<Recipe>,
}

#[cfg(feature = "server")]
impl MongoRecipeRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("recipes"),
        }
    }
}

#[cfg(feature = "server")]
#[async_trait]
impl RecipeRepository for MongoRecipeRepository {
    async fn insert(&self, recipe: NewRecipe) -> Result<Recipe, AppError> {
        let recipe = recipe.with_id(RecipeId::generate());

        self.collection
            .insert_one(&recipe)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(recipe)
    }

    async fn get(&self, id: &RecipeId) -> Result<Option<Recipe>, AppError> {
        use mongodb::bson::doc;

        self.collection
            .find_one(doc! { "_id": id.as_str() })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn query(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, AppError> {
        use crate::query::builder::PagePosition;
        use crate::query::mongo::{cursor_document, filter_document, sort_document};
        use futures::TryStreamExt;
        use mongodb::options::FindOptions;

        let cursor_recipe = match query.position() {
            Some(PagePosition::After(cursor_id)) => Some(
                self.collection
                    .find_one(cursor_document(query, cursor_id))
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?
                    .ok_or_else(|| AppError::UnresolvableCursor(cursor_id.to_string()))?,
            ),
            _ => None,
        };

        let filter = filter_document(query, cursor_recipe.as_ref());
        let options = FindOptions::builder()
            .sort(sort_document(query))
            .skip(Some(query.offset()).filter(|skip| *skip > 0))
            .limit(query.page_size().map(i64::from))
            .build();

        let cursor = self
            .collection
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        cursor
            .try_collect::<Vec<Recipe>>()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update(
        &self,
        id: &RecipeId,
        update: RecipeUpdate,
    ) -> Result<Option<(Recipe, Recipe)>, AppError> {
        use mongodb::bson::doc;

        if update.is_empty() {
            return Ok(self.get(id).await?.map(|r| (r.clone(), r)));
        }

        // The default return document is the one before the update.
        let before = self
            .collection
            .find_one_and_update(
                doc! { "_id": id.as_str() },
                doc! { "$set": update.to_set_document()? },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(before.map(|before| {
            let mut after = before.clone();
            update.apply_to(&mut after);
            (before, after)
        }))
    }

    async fn replace(
        &self,
        id: &RecipeId,
        recipe: NewRecipe,
    ) -> Result<Option<(Recipe, Recipe)>, AppError> {
        use mongodb::bson::doc;

        let after = recipe.with_id(id.clone());
        let before = self
            .collection
            .find_one_and_replace(doc! { "_id": id.as_str() }, &after)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(before.map(|before| (before, after)))
    }

    async fn delete(&self, id: &RecipeId) -> Result<Option<Recipe>, AppError> {
        use mongodb::bson::doc;

        self.collection
            .find_one_and_delete(doc! { "_id": id.as_str() })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
