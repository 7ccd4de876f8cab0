use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::auth::models::Caller;
use crate::db::repository::RecipeRepository;
use crate::error::AppError;
use crate::models::recipe::RecipeUpdate;
use crate::query::builder::{FilterClause, QueryBuilder};

/// Publish every unpublished recipe whose publish date is not after `now`.
///
/// Returns how many recipes were flipped. Each flip goes through the
/// repository, so an observed repository also moves the published counter.
pub async fn publish_due_recipes(
    repo: &dyn RecipeRepository,
    now: DateTime<Utc>,
) -> Result<usize, AppError> {
    // The visibility rule would hide drafts from an anonymous caller.
    let scheduler = Caller::service("publish-scheduler");
    let query = QueryBuilder::new()
        .filter(FilterClause::published(false))
        .build(&scheduler)?;

    let due: Vec<_> = repo
        .query(&query)
        .await?
        .into_iter()
        .filter(|recipe| recipe.publish_date <= now)
        .collect();

    let mut published = 0;
    for recipe in due {
        match repo.update(&recipe.id, RecipeUpdate::publish()).await? {
            Some(_) => published += 1,
            None => tracing::debug!(recipe = %recipe.id, "Recipe deleted before it could be published"),
        }
    }

    if published > 0 {
        tracing::info!("Published {} recipe(s) whose publish date has passed", published);
    }
    Ok(published)
}

/// Run [`publish_due_recipes`] every `every`, starting immediately.
pub fn spawn_publish_schedule(repo: Arc<dyn RecipeRepository>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = publish_due_recipes(repo.as_ref(), Utc::now()).await {
                tracing::warn!("Scheduled publish run failed: {e}");
            }
        }
    })
}
