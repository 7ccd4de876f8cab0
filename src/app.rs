use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::Router;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::auth::models::Caller;
use crate::auth::verifier::{resolve_caller, CredentialVerifier};
use crate::counters::CounterStore;
use crate::db::repository::RecipeRepository;
use crate::lifecycle::{spawn_lifecycle_worker, LifecycleHandler, ObservedRecipeRepository};
use crate::query::pagination::PaginationCoordinator;
use crate::storage::client::StorageClient;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub recipes: Arc<dyn RecipeRepository>,
    pub counters: CounterStore,
    pub storage_client: Arc<dyn StorageClient>,
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl AppState {
    /// Wire the state so that every committed recipe mutation reaches the
    /// counters and the blob store through the lifecycle worker.
    ///
    /// The returned handle belongs to the worker; it finishes once the state
    /// and all its clones are dropped.
    pub fn with_lifecycle(
        recipes: Arc<dyn RecipeRepository>,
        counters: CounterStore,
        storage_client: Arc<dyn StorageClient>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> (Self, JoinHandle<()>) {
        let handler = LifecycleHandler::new(counters.clone(), storage_client.clone());
        let (events, worker) = spawn_lifecycle_worker(handler);

        let state = Self {
            recipes: Arc::new(ObservedRecipeRepository::new(recipes, events)),
            counters,
            storage_client,
            verifier,
        };
        (state, worker)
    }

    pub fn pagination(&self) -> PaginationCoordinator {
        PaginationCoordinator::new(self.recipes.clone(), self.counters.clone())
    }
}

/// Resolves the caller from the `Authorization` header. Never rejects:
/// handlers that need a user call [`Caller::require_user`].
impl<S> FromRequestParts<S> for Caller
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        Ok(resolve_caller(state.verifier.as_ref(), authorization).await)
    }
}

/// Build the HTTP router for the recipe API.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/recipes",
            get(api::recipes::list_recipes_handler).post(api::recipes::create_recipe_handler),
        )
        .route(
            "/api/v1/recipes/{id}",
            get(api::recipes::get_recipe_handler)
                .put(api::recipes::replace_recipe_handler)
                .delete(api::recipes::delete_recipe_handler),
        )
        .route(
            "/api/v1/recipe-counts",
            get(api::recipes::recipe_counts_handler),
        )
        .route("/api/v1/images", post(api::upload::upload_image_handler))
        .route(
            "/api/v1/images/{filename}",
            get(api::upload::serve_image_handler),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
