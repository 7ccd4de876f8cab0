use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::Caller;
use crate::counters::{CounterName, CounterSnapshot};
use crate::error::AppError;
use crate::models::payload::{RecipeIdResponse, RecipePayload, RecipeResponse};
use crate::models::recipe::{Category, RecipeId};
use crate::query::builder::{
    FieldValue, FilterClause, Operator, QueryBuilder, RecipeField, SortDirection,
};
use crate::query::pagination::PageOutcome;

/// Page size used when a listing does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Query string of `GET /api/v1/recipes`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub category: Option<String>,
    /// A number for an exact match, or `N+` for "at least N".
    pub serves: Option<String>,
    /// Unix seconds; only recipes published at or after this instant.
    pub published_after: Option<i64>,
    /// `true` or `false`. Ignored for anonymous callers.
    pub is_published: Option<String>,
    pub order_by_field: Option<String>,
    pub order_by_direction: Option<String>,
    pub per_page: Option<u32>,
    pub page_number: Option<u32>,
    pub cursor_id: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_serves(raw: &str) -> Result<FilterClause, AppError> {
    let (operator, number) = match raw.strip_suffix('+') {
        Some(number) => (Operator::Gte, number),
        None => (Operator::Eq, raw),
    };
    let serves = number
        .trim()
        .parse::<u32>()
        .map_err(|_| AppError::BadRequest(format!("Invalid serves value '{raw}'")))?;
    FilterClause::new(RecipeField::Serves, operator, FieldValue::Integer(serves.into()))
}

fn parse_published(raw: &str) -> Result<FilterClause, AppError> {
    let is_published = raw
        .to_ascii_lowercase()
        .parse::<bool>()
        .map_err(|_| AppError::BadRequest(format!("Invalid isPublished value '{raw}'")))?;
    FilterClause::new(RecipeField::IsPublished, Operator::Eq, FieldValue::Bool(is_published))
}

impl ListParams {
    /// Translate the query string into a query builder. Visibility is applied
    /// later, when the builder is built for a caller.
    pub fn to_builder(&self) -> Result<QueryBuilder, AppError> {
        let mut builder =
            QueryBuilder::new().page_size(self.per_page.unwrap_or(DEFAULT_PAGE_SIZE));

        if let Some(category) = non_empty(&self.category) {
            let category = category.parse::<Category>()?;
            builder = builder.filter(FilterClause::new(
                RecipeField::Category,
                Operator::Eq,
                category.into(),
            )?);
        }
        if let Some(serves) = non_empty(&self.serves) {
            builder = builder.filter(parse_serves(serves)?);
        }
        if let Some(seconds) = self.published_after {
            let since = DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
                AppError::BadRequest(format!("Invalid publishedAfter value '{seconds}'"))
            })?;
            builder = builder.filter(FilterClause::new(
                RecipeField::PublishDate,
                Operator::Gte,
                FieldValue::Timestamp(since),
            )?);
        }
        if let Some(is_published) = non_empty(&self.is_published) {
            builder = builder.filter(parse_published(is_published)?);
        }

        if let Some(field) = non_empty(&self.order_by_field) {
            let direction = match non_empty(&self.order_by_direction) {
                Some(direction) => direction.parse::<SortDirection>()?,
                None => SortDirection::default(),
            };
            builder = builder.sort(field.parse::<RecipeField>()?, direction);
        }

        if let Some(page) = self.page_number {
            builder = builder.page(page);
        }
        if let Some(cursor) = non_empty(&self.cursor_id) {
            builder = builder.after(RecipeId::new(cursor));
        }

        Ok(builder)
    }
}

/// Body of a successful listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeListResponse {
    pub recipe_count: u64,
    pub total_pages: u64,
    pub is_last_page: bool,
    pub next_cursor: Option<String>,
    pub documents: Vec<RecipeResponse>,
}

/// Body returned instead of an empty page past the first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPageResponse {
    pub retry_page: u32,
}

/// Axum handler for `GET /api/v1/recipes`.
pub async fn list_recipes_handler(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    let query = params.to_builder()?.build(&caller)?;

    let response = match state.pagination().fetch(&query, &caller).await? {
        PageOutcome::Page(page) => Json(RecipeListResponse {
            recipe_count: page.total_count,
            total_pages: page.total_pages,
            is_last_page: page.is_last_page,
            next_cursor: page.next_cursor.map(|id| id.to_string()),
            documents: page.recipes.into_iter().map(RecipeResponse::from).collect(),
        })
        .into_response(),
        PageOutcome::RetryAt(page) => Json(RetryPageResponse { retry_page: page }).into_response(),
    };

    Ok(response)
}

/// Axum handler for `GET /api/v1/recipes/{id}`.
///
/// Unpublished recipes do not exist for anonymous callers.
pub async fn get_recipe_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<RecipeResponse>, AppError> {
    let recipe = state
        .recipes
        .get(&RecipeId::new(id.as_str()))
        .await?
        .filter(|recipe| recipe.is_published || caller.is_authenticated())
        .ok_or_else(|| AppError::NotFound(format!("Recipe '{}' not found", id)))?;

    Ok(Json(recipe.into()))
}

/// Axum handler for `POST /api/v1/recipes`.
pub async fn create_recipe_handler(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<RecipePayload>,
) -> Result<(StatusCode, Json<RecipeIdResponse>), AppError> {
    let user = caller.require_user()?;
    let recipe = payload.validate()?;

    let created = state.recipes.insert(recipe).await?;
    tracing::info!(user = %user.user_id, recipe = %created.id, "Created recipe '{}'", created.name);

    Ok((
        StatusCode::CREATED,
        Json(RecipeIdResponse {
            id: created.id.to_string(),
        }),
    ))
}

/// Axum handler for `PUT /api/v1/recipes/{id}`: full replace.
pub async fn replace_recipe_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<RecipePayload>,
) -> Result<Json<RecipeIdResponse>, AppError> {
    let user = caller.require_user()?;
    let recipe = payload.validate()?;
    let id = RecipeId::new(id);

    state
        .recipes
        .replace(&id, recipe)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Recipe '{}' not found", id)))?;
    tracing::info!(user = %user.user_id, recipe = %id, "Replaced recipe");

    Ok(Json(RecipeIdResponse { id: id.to_string() }))
}

/// Axum handler for `DELETE /api/v1/recipes/{id}`.
pub async fn delete_recipe_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user = caller.require_user()?;
    let id = RecipeId::new(id);

    state
        .recipes
        .delete(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Recipe '{}' not found", id)))?;
    tracing::info!(user = %user.user_id, recipe = %id, "Deleted recipe");

    Ok(StatusCode::NO_CONTENT)
}

/// Body of `GET /api/v1/recipe-counts`. `all` is omitted for anonymous
/// callers, who only see the published partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeCountsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<u64>,
    pub published: u64,
}

impl From<CounterSnapshot> for RecipeCountsResponse {
    fn from(snapshot: CounterSnapshot) -> Self {
        Self {
            all: Some(snapshot.all),
            published: snapshot.published,
        }
    }
}

/// Axum handler for `GET /api/v1/recipe-counts`.
pub async fn recipe_counts_handler(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<RecipeCountsResponse>, AppError> {
    let counts = if caller.is_authenticated() {
        state.counters.snapshot().await?.into()
    } else {
        RecipeCountsResponse {
            all: None,
            published: state.counters.count(CounterName::Published).await?,
        }
    };
    Ok(Json(counts))
}
