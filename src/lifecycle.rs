use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::counters::{CounterName, CounterStore};
use crate::db::repository::RecipeRepository;
use crate::error::AppError;
use crate::models::recipe::{NewRecipe, Recipe, RecipeId, RecipeUpdate};
use crate::query::builder::RecipeQuery;
use crate::storage::client::{blob_key_from_image_url, StorageClient};

/// A committed change to the recipe collection.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Created(Recipe),
    Updated { before: Recipe, after: Recipe },
    Deleted(Recipe),
}

impl LifecycleEvent {
    fn recipe_id(&self) -> &RecipeId {
        match self {
            LifecycleEvent::Created(recipe) | LifecycleEvent::Deleted(recipe) => &recipe.id,
            LifecycleEvent::Updated { after, .. } => &after.id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delta {
    Up,
    Down,
}

/// Applies lifecycle events to the counters and the blob store.
///
/// Failures are logged and swallowed: the mutation that produced the event
/// has already been committed and is never rolled back.
#[derive(Clone)]
pub struct LifecycleHandler {
    counters: CounterStore,
    storage: Arc<dyn StorageClient>,
}

impl LifecycleHandler {
    pub fn new(counters: CounterStore, storage: Arc<dyn StorageClient>) -> Self {
        Self { counters, storage }
    }

    pub async fn handle(&self, event: LifecycleEvent) {
        tracing::debug!(recipe = %event.recipe_id(), "Handling lifecycle event");

        match event {
            LifecycleEvent::Created(recipe) => {
                self.apply(CounterName::All, Delta::Up).await;
                if recipe.is_published {
                    self.apply(CounterName::Published, Delta::Up).await;
                }
            }
            LifecycleEvent::Updated { before, after } => {
                match (before.is_published, after.is_published) {
                    (false, true) => self.apply(CounterName::Published, Delta::Up).await,
                    (true, false) => self.apply(CounterName::Published, Delta::Down).await,
                    _ => {}
                }
            }
            LifecycleEvent::Deleted(recipe) => {
                self.delete_image(&recipe).await;
                self.apply(CounterName::All, Delta::Down).await;
                if recipe.is_published {
                    self.apply(CounterName::Published, Delta::Down).await;
                }
            }
        }
    }

    async fn apply(&self, name: CounterName, delta: Delta) {
        let result = match delta {
            Delta::Up => self.counters.increment(name).await,
            Delta::Down => self.counters.decrement(name).await,
        };

        if let Err(e) = result {
            tracing::warn!(counter = %name, ?delta, "Failed to update recipe counter: {e}");
        }
    }

    async fn delete_image(&self, recipe: &Recipe) {
        let Some(key) = blob_key_from_image_url(&recipe.image_url) else {
            tracing::debug!(recipe = %recipe.id, "Image URL does not point at our storage, keeping it");
            return;
        };

        match self.storage.delete_object(&key).await {
            Ok(()) => tracing::info!(recipe = %recipe.id, "Deleted image '{}'", key),
            Err(e) => tracing::warn!(recipe = %recipe.id, "Failed to delete image '{}': {e}", key),
        }
    }
}

/// Start the task that drains lifecycle events into `handler`.
///
/// Events are handled one at a time, in the order they were emitted. The
/// task ends once every sender has been dropped and the queue is empty.
pub fn spawn_lifecycle_worker(
    handler: LifecycleHandler,
) -> (UnboundedSender<LifecycleEvent>, JoinHandle<()>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let worker = tokio::spawn(run_worker(handler, receiver));
    (sender, worker)
}

async fn run_worker(handler: LifecycleHandler, mut events: UnboundedReceiver<LifecycleEvent>) {
    while let Some(event) = events.recv().await {
        handler.handle(event).await;
    }
    tracing::info!("Lifecycle worker stopped");
}

/// Recipe repository that emits a [`LifecycleEvent`] after every committed
/// mutation. Reads pass straight through.
pub struct ObservedRecipeRepository {
    inner: Arc<dyn RecipeRepository>,
    events: UnboundedSender<LifecycleEvent>,
}

impl ObservedRecipeRepository {
    pub fn new(inner: Arc<dyn RecipeRepository>, events: UnboundedSender<LifecycleEvent>) -> Self {
        Self { inner, events }
    }

    fn emit(&self, event: LifecycleEvent) {
        if let Err(e) = self.events.send(event) {
            tracing::warn!(recipe = %e.0.recipe_id(), "Lifecycle worker is gone, counter update dropped");
        }
    }
}

#[async_trait]
impl RecipeRepository for ObservedRecipeRepository {
    async fn insert(&self, recipe: NewRecipe) -> Result<Recipe, AppError> {
        let created = self.inner.insert(recipe).await?;
        self.emit(LifecycleEvent::Created(created.clone()));
        Ok(created)
    }

    async fn get(&self, id: &RecipeId) -> Result<Option<Recipe>, AppError> {
        self.inner.get(id).await
    }

    async fn query(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, AppError> {
        self.inner.query(query).await
    }

    async fn update(
        &self,
        id: &RecipeId,
        update: RecipeUpdate,
    ) -> Result<Option<(Recipe, Recipe)>, AppError> {
        let changed = self.inner.update(id, update).await?;
        if let Some((before, after)) = &changed {
            self.emit(LifecycleEvent::Updated {
                before: before.clone(),
                after: after.clone(),
            });
        }
        Ok(changed)
    }

    async fn replace(
        &self,
        id: &RecipeId,
        recipe: NewRecipe,
    ) -> Result<Option<(Recipe, Recipe)>, AppError> {
        let changed = self.inner.replace(id, recipe).await?;
        if let Some((before, after)) = &changed {
            self.emit(LifecycleEvent::Updated {
                before: before.clone(),
                after: after.clone(),
            });
        }
        Ok(changed)
    }

    async fn delete(&self, id: &RecipeId) -> Result<Option<Recipe>, AppError> {
        let deleted = self.inner.delete(id).await?;
        if let Some(recipe) = &deleted {
            self.emit(LifecycleEvent::Deleted(recipe.clone()));
        }
        Ok(deleted)
    }
}
