use std::sync::Arc;

use crate::auth::models::Caller;
use crate::counters::{CounterName, CounterStore};
use crate::db::repository::RecipeRepository;
use crate::error::AppError;
use crate::models::recipe::{Recipe, RecipeId};
use crate::query::builder::{PagePosition, RecipeQuery};

/// One page of recipes with its pagination metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub recipes: Vec<Recipe>,
    /// Counter value for the caller's partition. Approximate.
    pub total_count: u64,
    /// `ceil(total_count / page_size)`. Approximate.
    pub total_pages: u64,
    pub is_last_page: bool,
    /// Cursor for the following page; `None` on the last page.
    pub next_cursor: Option<RecipeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Page(Page),
    /// The requested page came back empty although it is past page 1,
    /// typically after deletions shrank the result set. Ask again for the
    /// carried page number.
    RetryAt(u32),
}

/// Serves pages together with a total page count and a last-page flag.
#[derive(Clone)]
pub struct PaginationCoordinator {
    repo: Arc<dyn RecipeRepository>,
    counters: CounterStore,
}

impl PaginationCoordinator {
    pub fn new(repo: Arc<dyn RecipeRepository>, counters: CounterStore) -> Self {
        Self { repo, counters }
    }

    /// Fetch the page `query` addresses.
    ///
    /// The page and the counter are read concurrently. The last page is
    /// detected by a lookahead query for the next page, which doubles the
    /// query cost per fetch.
    pub async fn fetch(&self, query: &RecipeQuery, caller: &Caller) -> Result<PageOutcome, AppError> {
        let page_size = query
            .page_size()
            .ok_or_else(|| AppError::BadRequest("Pagination requires a page size".into()))?;
        let partition = CounterName::visible_to(caller);

        let (recipes, total_count) =
            futures::try_join!(self.repo.query(query), self.counters.count(partition))?;

        if recipes.is_empty() {
            if let Some(page) = query.page_number().filter(|page| *page > 1) {
                tracing::debug!(page, "Empty page past the first, asking caller to retry");
                return Ok(PageOutcome::RetryAt(page - 1));
            }
        }

        let lookahead = match query.position() {
            Some(PagePosition::After(_)) => recipes
                .last()
                .map(|last| query.at(PagePosition::After(last.id.clone()))),
            Some(PagePosition::Page(page)) => Some(query.at(PagePosition::Page(page + 1))),
            None => Some(query.at(PagePosition::Page(2))),
        };

        let is_last_page = match lookahead {
            Some(next) if !recipes.is_empty() => self.repo.query(&next).await?.is_empty(),
            _ => true,
        };

        let next_cursor = if is_last_page {
            None
        } else {
            recipes.last().map(|last| last.id.clone())
        };

        Ok(PageOutcome::Page(Page {
            recipes,
            total_count,
            total_pages: total_count.div_ceil(u64::from(page_size)),
            is_last_page,
            next_cursor,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::AuthenticatedUser;
    use crate::db::memory::{InMemoryCounterRepository, InMemoryRecipeRepository};
    use crate::models::recipe::fixtures::new_recipe;
    use crate::query::builder::{QueryBuilder, RecipeField, SortDirection};

    fn user() -> Caller {
        Caller::Authenticated(AuthenticatedUser {
            user_id: "uid".to_string(),
            email: None,
        })
    }

    struct Fixture {
        repo: Arc<InMemoryRecipeRepository>,
        counters: CounterStore,
        coordinator: PaginationCoordinator,
    }

    /// `count` published recipes with serves 1..=count, counters in sync.
    async fn fixture(count: u32) -> Fixture {
        let repo = Arc::new(InMemoryRecipeRepository::new());
        let counters = CounterStore::new(Arc::new(InMemoryCounterRepository::new()));
        for serves in 1..=count {
            repo.insert(new_recipe(&format!("r{serves}"), serves, true))
                .await
                .unwrap();
            counters.increment(CounterName::All).await.unwrap();
            counters.increment(CounterName::Published).await.unwrap();
        }
        let coordinator = PaginationCoordinator::new(repo.clone(), counters.clone());
        Fixture {
            repo,
            counters,
            coordinator,
        }
    }

    fn by_serves(page_size: u32) -> QueryBuilder {
        QueryBuilder::new()
            .sort(RecipeField::Serves, SortDirection::Asc)
            .page_size(page_size)
    }

    fn expect_page(outcome: PageOutcome) -> Page {
        match outcome {
            PageOutcome::Page(page) => page,
            other => panic!("Expected a page, got: {:?}", other),
        }
    }

    fn names(page: &Page) -> Vec<&str> {
        page.recipes.iter().map(|r| r.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_last_page_detection() {
        let f = fixture(5).await;

        let query = by_serves(3).page(1).build(&user()).unwrap();
        let page1 = expect_page(f.coordinator.fetch(&query, &user()).await.unwrap());
        assert_eq!(names(&page1), vec!["r1", "r2", "r3"]);
        assert!(!page1.is_last_page);
        assert_eq!(page1.total_pages, 2);
        assert_eq!(page1.next_cursor, Some(page1.recipes[2].id.clone()));

        let query = by_serves(3).page(2).build(&user()).unwrap();
        let page2 = expect_page(f.coordinator.fetch(&query, &user()).await.unwrap());
        assert_eq!(names(&page2), vec!["r4", "r5"]);
        assert!(page2.is_last_page);
        assert_eq!(page2.next_cursor, None);
    }

    #[tokio::test]
    async fn test_first_page_without_position() {
        let f = fixture(3).await;
        let query = by_serves(3).build(&user()).unwrap();
        let page = expect_page(f.coordinator.fetch(&query, &user()).await.unwrap());
        assert_eq!(page.recipes.len(), 3);
        assert!(page.is_last_page);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn test_empty_page_past_first_asks_for_retry() {
        let f = fixture(3).await;
        let query = by_serves(3).page(2).build(&user()).unwrap();
        assert_eq!(
            f.coordinator.fetch(&query, &user()).await.unwrap(),
            PageOutcome::RetryAt(1)
        );
    }

    #[tokio::test]
    async fn test_empty_first_page_is_last() {
        let f = fixture(0).await;
        let query = by_serves(3).page(1).build(&user()).unwrap();
        let page = expect_page(f.coordinator.fetch(&query, &user()).await.unwrap());
        assert!(page.recipes.is_empty());
        assert!(page.is_last_page);
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn test_cursor_pages_survive_unrelated_insert() {
        let f = fixture(6).await;

        let first = by_serves(2).build(&user()).unwrap();
        let page1 = expect_page(f.coordinator.fetch(&first, &user()).await.unwrap());
        assert_eq!(names(&page1), vec!["r1", "r2"]);

        // Sorts after everything already paged through.
        f.repo.insert(new_recipe("late", 10, true)).await.unwrap();

        let cursor = page1.next_cursor.clone().unwrap();
        let second = by_serves(2).after(cursor).build(&user()).unwrap();
        let page2 = expect_page(f.coordinator.fetch(&second, &user()).await.unwrap());
        assert_eq!(names(&page2), vec!["r3", "r4"]);
        assert!(!page2.is_last_page);
    }

    #[tokio::test]
    async fn test_cursor_to_deleted_recipe_fails_distinctly() {
        let f = fixture(4).await;
        let first = by_serves(2).build(&user()).unwrap();
        let page1 = expect_page(f.coordinator.fetch(&first, &user()).await.unwrap());

        let cursor = page1.next_cursor.unwrap();
        f.repo.delete(&cursor).await.unwrap();

        let second = by_serves(2).after(cursor).build(&user()).unwrap();
        let result = f.coordinator.fetch(&second, &user()).await;
        assert!(matches!(result, Err(AppError::UnresolvableCursor(_))));
    }

    #[tokio::test]
    async fn test_anonymous_cursor_on_draft_is_unresolvable() {
        let f = fixture(3).await;
        let draft = f.repo.insert(new_recipe("draft", 0, false)).await.unwrap();

        let anon_query = by_serves(2)
            .after(draft.id.clone())
            .build(&Caller::Anonymous)
            .unwrap();
        let result = f.coordinator.fetch(&anon_query, &Caller::Anonymous).await;
        assert!(matches!(result, Err(AppError::UnresolvableCursor(_))));

        // Same error as for an id that never existed.
        let missing = by_serves(2)
            .after(RecipeId::new("no-such-recipe"))
            .build(&Caller::Anonymous)
            .unwrap();
        let result = f.coordinator.fetch(&missing, &Caller::Anonymous).await;
        assert!(matches!(result, Err(AppError::UnresolvableCursor(_))));

        let user_query = by_serves(2).after(draft.id).build(&user()).unwrap();
        let page = expect_page(f.coordinator.fetch(&user_query, &user()).await.unwrap());
        assert_eq!(names(&page), vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn test_anonymous_total_uses_published_counter() {
        let f = fixture(4).await;
        let hidden = f.repo.insert(new_recipe("draft", 9, false)).await.unwrap();
        f.counters.increment(CounterName::All).await.unwrap();

        let anon_query = by_serves(3).page(1).build(&Caller::Anonymous).unwrap();
        let anon = expect_page(f.coordinator.fetch(&anon_query, &Caller::Anonymous).await.unwrap());
        assert_eq!(anon.total_count, 4);
        assert!(anon.recipes.iter().all(|r| r.id != hidden.id));

        let user_query = by_serves(3).page(1).build(&user()).unwrap();
        let authed = expect_page(f.coordinator.fetch(&user_query, &user()).await.unwrap());
        assert_eq!(authed.total_count, 5);
        assert_eq!(authed.total_pages, 2);
    }

    #[tokio::test]
    async fn test_page_size_required() {
        let f = fixture(1).await;
        let query = QueryBuilder::new().build(&user()).unwrap();
        assert!(matches!(
            f.coordinator.fetch(&query, &user()).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
