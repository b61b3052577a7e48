//! Recipe service: cache-aside listing plus writes that invalidate it.
//!
//! The full collection is cached as one JSON snapshot under
//! [`LISTING_CACHE_KEY`] with no expiry. A listing read serves the snapshot
//! when present; otherwise it queries the store and stores what it returned.
//! Every successful create, update or delete deletes the snapshot exactly once.
//! The write and its invalidation run on a spawned task, so a request that
//! hits its deadline after the store commit still leaves no stale snapshot.
//!
//! Miss-then-populate is not locked. A read that started before a write can
//! repopulate the snapshot with pre-write data after the write's invalidation;
//! that entry stays until the next write.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::Instrument;

use crate::cache::Cache;
use crate::error::{AppError, CacheError};
use crate::models::{Recipe, RecipeFilter, RecipeInput};
use crate::storage::RecipeStore;

pub const LISTING_CACHE_KEY: &str = "recipes";

#[derive(Clone)]
pub struct RecipeService {
    store: Arc<dyn RecipeStore>,
    cache: Arc<dyn Cache>,
}

impl RecipeService {
    pub fn new(store: Arc<dyn RecipeStore>, cache: Arc<dyn Cache>) -> Self {
        Self { store, cache }
    }

    /// Whole collection, from the cached snapshot when there is one.
    ///
    /// A cache read error fails the call rather than falling back to the store.
    pub async fn list(&self) -> Result<Vec<Recipe>, AppError> {
        if let Some(snapshot) = self.cache.get(LISTING_CACHE_KEY).await? {
            tracing::debug!(key = LISTING_CACHE_KEY, "recipe listing served from cache");
            let recipes: Vec<Recipe> =
                serde_json::from_slice(&snapshot).map_err(CacheError::Corrupt)?;
            return Ok(recipes);
        }

        tracing::debug!(key = LISTING_CACHE_KEY, "recipe listing cache miss, loading from store");
        let recipes = self.store.find(&RecipeFilter::default()).await?;
        let snapshot = serde_json::to_vec(&recipes)
            .map_err(|err| AppError::Internal(format!("serialize listing: {err}")))?;
        if let Err(err) = self.cache.set(LISTING_CACHE_KEY, snapshot, None).await {
            tracing::warn!(key = LISTING_CACHE_KEY, error = %err, "failed to populate recipe listing cache");
        }
        Ok(recipes)
    }

    /// Filtered listing straight from the store. The snapshot only ever holds
    /// the unfiltered collection.
    pub async fn list_tagged(&self, tag: &str) -> Result<Vec<Recipe>, AppError> {
        Ok(self.store.find(&RecipeFilter::tagged(tag)).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Recipe, AppError> {
        Ok(self.store.find_one(id).await?)
    }

    pub async fn create(&self, input: RecipeInput) -> Result<Recipe, AppError> {
        let recipe = Recipe::new(input, Utc::now());
        let service = self.clone();
        let stored = recipe.clone();
        run_to_completion(async move {
            service.store.insert(&stored).await?;
            tracing::info!(recipe_id = %stored.id, "recipe created");
            service.invalidate().await;
            Ok::<_, AppError>(())
        })
        .await?;
        Ok(recipe)
    }

    pub async fn update(&self, id: &str, input: RecipeInput) -> Result<Recipe, AppError> {
        let service = self.clone();
        let id = id.to_owned();
        run_to_completion(async move {
            let recipe = service.store.update_fields(&id, &input).await?;
            tracing::info!(recipe_id = %id, "recipe updated");
            service.invalidate().await;
            Ok::<_, AppError>(recipe)
        })
        .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let service = self.clone();
        let id = id.to_owned();
        run_to_completion(async move {
            service.store.delete(&id).await?;
            tracing::info!(recipe_id = %id, "recipe deleted");
            service.invalidate().await;
            Ok::<_, AppError>(())
        })
        .await
    }

    /// Drop the listing snapshot. Failure is logged and swallowed: the write
    /// already happened, and a stale cache is preferred over a failed write.
    pub async fn invalidate(&self) {
        match self.cache.delete(LISTING_CACHE_KEY).await {
            Ok(()) => tracing::debug!(key = LISTING_CACHE_KEY, "recipe listing cache invalidated"),
            Err(err) => tracing::warn!(
                key = LISTING_CACHE_KEY,
                error = %err,
                "failed to invalidate recipe listing cache, entry may be stale"
            ),
        }
    }
}

/// Runs a store write and its invalidation on their own task. Dropping the
/// caller (request deadline, client disconnect) detaches the task instead of
/// cancelling it, so a committed write is always followed by its invalidation.
async fn run_to_completion<T, F>(write: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, AppError>> + Send + 'static,
{
    tokio::spawn(write.in_current_span())
        .await
        .map_err(|err| AppError::Internal(format!("recipe write task failed: {err}")))?
}
