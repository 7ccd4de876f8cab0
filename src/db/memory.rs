//! In-memory repositories, used for tests and the `memory` backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::counter_repository::{CounterRepository, CounterUpdate};
use crate::db::repository::RecipeRepository;
use crate::error::AppError;
use crate::models::recipe::{NewRecipe, Recipe, RecipeId, RecipeUpdate};
use crate::query::builder::{PagePosition, RecipeQuery};

fn poisoned<T>(_: T) -> AppError {
    AppError::Internal("In-memory store lock poisoned".into())
}

#[derive(Default)]
pub struct InMemoryRecipeRepository {
    recipes: Mutex<HashMap<RecipeId, Recipe>>,
}

impl InMemoryRecipeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored recipes (ignores visibility).
    pub fn len(&self) -> usize {
        self.recipes.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecipeRepository for InMemoryRecipeRepository {
    async fn insert(&self, recipe: NewRecipe) -> Result<Recipe, AppError> {
        let recipe = recipe.with_id(RecipeId::generate());
        self.recipes
            .lock()
            .map_err(poisoned)?
            .insert(recipe.id.clone(), recipe.clone());
        Ok(recipe)
    }

    async fn get(&self, id: &RecipeId) -> Result<Option<Recipe>, AppError> {
        Ok(self.recipes.lock().map_err(poisoned)?.get(id).cloned())
    }

    async fn query(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, AppError> {
        let recipes = self.recipes.lock().map_err(poisoned)?;

        let cursor = match query.position() {
            Some(PagePosition::After(cursor_id)) => Some(
                recipes
                    .get(cursor_id)
                    .filter(|cursor| query.matches(cursor))
                    .ok_or_else(|| AppError::UnresolvableCursor(cursor_id.to_string()))?,
            ),
            _ => None,
        };

        let mut matching: Vec<&Recipe> = recipes
            .values()
            .filter(|recipe| query.matches(recipe))
            .filter(|recipe| {
                cursor.map_or(true, |cursor| {
                    query.compare(recipe, cursor) == std::cmp::Ordering::Greater
                })
            })
            .collect();
        matching.sort_by(|a, b| query.compare(a, b));

        let skip = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let take = query
            .page_size()
            .map(|size| size as usize)
            .unwrap_or(usize::MAX);

        Ok(matching.into_iter().skip(skip).take(take).cloned().collect())
    }

    async fn update(
        &self,
        id: &RecipeId,
        update: RecipeUpdate,
    ) -> Result<Option<(Recipe, Recipe)>, AppError> {
        let mut recipes = self.recipes.lock().map_err(poisoned)?;
        Ok(recipes.get_mut(id).map(|stored| {
            let before = stored.clone();
            update.apply_to(stored);
            (before, stored.clone())
        }))
    }

    async fn replace(
        &self,
        id: &RecipeId,
        recipe: NewRecipe,
    ) -> Result<Option<(Recipe, Recipe)>, AppError> {
        let mut recipes = self.recipes.lock().map_err(poisoned)?;
        Ok(recipes.get_mut(id).map(|stored| {
            let after = recipe.with_id(id.clone());
            let before = std::mem::replace(stored, after.clone());
            (before, after)
        }))
    }

    async fn delete(&self, id: &RecipeId) -> Result<Option<Recipe>, AppError> {
        Ok(self.recipes.lock().map_err(poisoned)?.remove(id))
    }
}

/// Counters kept in a map. Each primitive holds the lock for its whole
/// read-and-write, which makes it atomic like the MongoDB `$inc`.
#[derive(Default)]
pub struct InMemoryCounterRepository {
    counts: Mutex<HashMap<String, u64>>,
}

impl InMemoryCounterRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterRepository for InMemoryCounterRepository {
    async fn read(&self, name: &str) -> Result<Option<u64>, AppError> {
        Ok(self.counts.lock().map_err(poisoned)?.get(name).copied())
    }

    async fn increment_existing(&self, name: &str) -> Result<CounterUpdate, AppError> {
        let mut counts = self.counts.lock().map_err(poisoned)?;
        Ok(match counts.get_mut(name) {
            Some(count) => {
                *count += 1;
                CounterUpdate::Applied(*count)
            }
            None => CounterUpdate::Missing,
        })
    }

    async fn decrement_existing(&self, name: &str) -> Result<CounterUpdate, AppError> {
        let mut counts = self.counts.lock().map_err(poisoned)?;
        Ok(match counts.get_mut(name) {
            Some(0) => CounterUpdate::AtFloor,
            Some(count) => {
                *count -= 1;
                CounterUpdate::Applied(*count)
            }
            None => CounterUpdate::Missing,
        })
    }

    async fn create_if_absent(&self, name: &str, initial: u64) -> Result<bool, AppError> {
        let mut counts = self.counts.lock().map_err(poisoned)?;
        if counts.contains_key(name) {
            return Ok(false);
        }
        counts.insert(name.to_string(), initial);
        Ok(true)
    }
}
