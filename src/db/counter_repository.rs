use async_trait::async_trait;

use crate::error::AppError;

/// Outcome of an atomic counter delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterUpdate {
    /// The delta was applied; carries the new value.
    Applied(u64),
    /// The counter does not exist yet.
    Missing,
    /// A decrement hit a counter that is already 0; nothing changed.
    AtFloor,
}

/// Storage primitives for named counters.
///
/// Every method must be a single atomic operation on the stored value, never
/// a read followed by a write, so concurrent lifecycle events cannot lose
/// updates.
#[async_trait]
pub trait CounterRepository: Send + Sync {
    /// Current value, or `None` when the counter was never created.
    async fn read(&self, name: &str) -> Result<Option<u64>, AppError>;

    /// Atomically add 1 to an existing counter.
    async fn increment_existing(&self, name: &str) -> Result<CounterUpdate, AppError>;

    /// Atomically subtract 1 from an existing, positive counter.
    async fn decrement_existing(&self, name: &str) -> Result<CounterUpdate, AppError>;

    /// Create the counter with `initial` unless it exists. Returns whether it
    /// was created by this call.
    async fn create_if_absent(&self, name: &str, initial: u64) -> Result<bool, AppError>;
}

/// A counter as stored in the `recipe_counts` collection.
#[cfg(feature = "server")]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct CounterDocument {
    #[serde(rename = "_id")]
    name: String,
    count: i64,
}

#[cfg(feature = "server")]
fn stored_count(doc: &CounterDocument) -> u64 {
    u64::try_from(doc.count).unwrap_or(0)
}

/// MongoDB implementation of the CounterRepository, built on `$inc`.
#[cfg(feature = "server")]
pub struct MongoCounterRepository {
    collection: mongodb::Collection<CounterDocument>,
}

#[cfg(feature = "server")]
impl MongoCounterRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("recipe_counts"),
        }
    }
}

#[cfg(feature = "server")]
#[async_trait]
impl CounterRepository for MongoCounterRepository {
    async fn read(&self, name: &str) -> Result<Option<u64>, AppError> {
        use mongodb::bson::doc;

        let found = self
            .collection
            .find_one(doc! { "_id": name })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(found.as_ref().map(stored_count))
    }

    async fn increment_existing(&self, name: &str) -> Result<CounterUpdate, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .collection
            .find_one_and_update(doc! { "_id": name }, doc! { "$inc": { "count": 1_i64 } })
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(match updated {
            Some(doc) => CounterUpdate::Applied(stored_count(&doc)),
            None => CounterUpdate::Missing,
        })
    }

    async fn decrement_existing(&self, name: &str) -> Result<CounterUpdate, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        // Only positive counters match, so the floor holds under concurrency.
        let updated = self
            .collection
            .find_one_and_update(
                doc! { "_id": name, "count": { "$gt": 0_i64 } },
                doc! { "$inc": { "count": -1_i64 } },
            )
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match updated {
            Some(doc) => Ok(CounterUpdate::Applied(stored_count(&doc))),
            None => Ok(match self.read(name).await? {
                Some(_) => CounterUpdate::AtFloor,
                None => CounterUpdate::Missing,
            }),
        }
    }

    async fn create_if_absent(&self, name: &str, initial: u64) -> Result<bool, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::UpdateOptions;

        let initial = i64::try_from(initial)
            .map_err(|_| AppError::Internal(format!("Counter value {initial} out of range")))?;
        let options = UpdateOptions::builder().upsert(true).build();

        let result = self
            .collection
            .update_one(
                doc! { "_id": name },
                doc! { "$setOnInsert": { "count": initial } },
            )
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.upserted_id.is_some())
    }
}
