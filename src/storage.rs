//! Document store for recipes and user credentials.
//!
//! Sled keeps one tree per collection, namespaced by the configured database
//! name (`<database>/recipes`, `<database>/users`). Documents are stored as
//! Serde JSON keyed by recipe id or username.

use async_trait::async_trait;
use sled::{Db, Tree};

use crate::error::StorageError;
use crate::models::{Recipe, RecipeFilter, RecipeInput, User};

/// CRUD over the recipe collection.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Matching recipes in publication order.
    async fn find(&self, filter: &RecipeFilter) -> Result<Vec<Recipe>, StorageError>;
    async fn find_one(&self, id: &str) -> Result<Recipe, StorageError>;
    async fn insert(&self, recipe: &Recipe) -> Result<String, StorageError>;
    /// Replace the mutable fields and return the stored result.
    async fn update_fields(&self, id: &str, fields: &RecipeInput) -> Result<Recipe, StorageError>;
    async fn delete(&self, id: &str) -> Result<(), StorageError>;
}

/// Lookup of stored credentials.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, username: &str) -> Result<Option<User>, StorageError>;
    async fn put_user(&self, user: &User) -> Result<(), StorageError>;
}

#[derive(Clone)] // Sled handles are cheap to clone and thread-safe
pub struct Storage {
    db: Db,
    recipe_tree: Tree,
    user_tree: Tree,
}

impl Storage {
    /// Open or create the Sled database at `path`.
    pub fn open(path: &str, database: &str) -> Result<Self, StorageError> {
        Self::with_db(sled::open(path)?, database)
    }

    /// In-memory database removed on drop. Used by tests and dry runs.
    pub fn temporary(database: &str) -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db, database)
    }

    fn with_db(db: Db, database: &str) -> Result<Self, StorageError> {
        let recipe_tree = db.open_tree(format!("{database}/recipes"))?;
        let user_tree = db.open_tree(format!("{database}/users"))?;
        Ok(Self {
            db,
            recipe_tree,
            user_tree,
        })
    }

    pub async fn flush(&self) -> Result<(), StorageError> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl RecipeStore for Storage {
    async fn find(&self, filter: &RecipeFilter) -> Result<Vec<Recipe>, StorageError> {
        let mut recipes = Vec::new();
        for item in self.recipe_tree.iter() {
            let (_, value) = item?;
            let recipe: Recipe = serde_json::from_slice(&value)?;
            if filter.matches(&recipe) {
                recipes.push(recipe);
            }
        }
        // Keys are random UUIDs, so restore insertion order explicitly
        recipes.sort_by(|a, b| {
            a.published_at
                .cmp(&b.published_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(recipes)
    }

    async fn find_one(&self, id: &str) -> Result<Recipe, StorageError> {
        let bytes = self
            .recipe_tree
            .get(id.as_bytes())?
            .ok_or(StorageError::NotFound)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn insert(&self, recipe: &Recipe) -> Result<String, StorageError> {
        let json_bytes = serde_json::to_vec(recipe)?;
        self.recipe_tree.insert(recipe.id.as_bytes(), json_bytes)?;
        Ok(recipe.id.clone())
    }

    async fn update_fields(&self, id: &str, fields: &RecipeInput) -> Result<Recipe, StorageError> {
        loop {
            let current = self
                .recipe_tree
                .get(id.as_bytes())?
                .ok_or(StorageError::NotFound)?;
            let mut recipe: Recipe = serde_json::from_slice(&current)?;
            recipe.apply(fields);
            let next = serde_json::to_vec(&recipe)?;

            // Retry when another writer replaced the document in between
            match self
                .recipe_tree
                .compare_and_swap(id.as_bytes(), Some(current), Some(next))?
            {
                Ok(()) => return Ok(recipe),
                Err(_) => continue,
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        match self.recipe_tree.remove(id.as_bytes())? {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound),
        }
    }
}

#[async_trait]
impl UserStore for Storage {
    async fn find_user(&self, username: &str) -> Result<Option<User>, StorageError> {
        match self.user_tree.get(username.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_user(&self, user: &User) -> Result<(), StorageError> {
        let json_bytes = serde_json::to_vec(user)?;
        self.user_tree.insert(user.username.as_bytes(), json_bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn input(name: &str, tags: &[&str]) -> RecipeInput {
        RecipeInput {
            name: name.to_string(),
            ingredients: vec!["rice".to_string()],
            instructions: vec!["boil".to_string()],
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_insert_find_one_and_delete() {
        let storage = Storage::temporary("test").expect("temporary storage");
        let recipe = Recipe::new(input("Risotto", &["italian"]), Utc::now());

        let id = storage.insert(&recipe).await.expect("insert");
        assert_eq!(id, recipe.id);
        assert_eq!(storage.find_one(&id).await.expect("find_one"), recipe);

        storage.delete(&id).await.expect("delete");
        assert!(matches!(storage.find_one(&id).await, Err(StorageError::NotFound)));
        assert!(matches!(storage.delete(&id).await, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn test_find_returns_publication_order_and_filters() {
        let storage = Storage::temporary("test").expect("temporary storage");
        let now = Utc::now();
        let older = Recipe::new(input("Curry", &["spicy"]), now - Duration::minutes(5));
        let newer = Recipe::new(input("Salad", &["fresh"]), now);
        storage.insert(&newer).await.unwrap();
        storage.insert(&older).await.unwrap();

        let all = storage.find(&RecipeFilter::default()).await.unwrap();
        assert_eq!(all, vec![older.clone(), newer.clone()]);

        let spicy = storage.find(&RecipeFilter::tagged("spicy")).await.unwrap();
        assert_eq!(spicy, vec![older]);
    }

    #[tokio::test]
    async fn test_update_fields_preserves_id_and_published_at() {
        let storage = Storage::temporary("test").expect("temporary storage");
        let recipe = Recipe::new(input("Stew", &[]), Utc::now());
        storage.insert(&recipe).await.unwrap();

        let updated = storage
            .update_fields(&recipe.id, &input("Beef Stew", &["winter"]))
            .await
            .expect("update");
        assert_eq!(updated.id, recipe.id);
        assert_eq!(updated.published_at, recipe.published_at);
        assert_eq!(updated.name, "Beef Stew");
        assert_eq!(storage.find_one(&recipe.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let storage = Storage::temporary("test").expect("temporary storage");
        let result = storage.update_fields("missing", &input("Ghost", &[])).await;
        assert!(matches!(result, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn test_databases_are_isolated() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let first = Storage::with_db(db.clone(), "first").unwrap();
        let second = Storage::with_db(db, "second").unwrap();
        first
            .insert(&Recipe::new(input("Tacos", &[]), Utc::now()))
            .await
            .unwrap();

        assert_eq!(first.find(&RecipeFilter::default()).await.unwrap().len(), 1);
        assert!(second.find(&RecipeFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_round_trip() {
        let storage = Storage::temporary("test").expect("temporary storage");
        assert!(storage.find_user("admin").await.unwrap().is_none());

        let user = User {
            username: "admin".to_string(),
            password_hash: "$2b$04$hash".to_string(),
        };
        storage.put_user(&user).await.unwrap();
        let found = storage.find_user("admin").await.unwrap().expect("user");
        assert_eq!(found.password_hash, user.password_hash);
    }
}
