//! Records and wire types.
//!
//! `Recipe` and `IssuedToken` serialize with camelCase keys (`publishedAt`,
//! `expiresAt`). `Claims` is the JWT payload; `exp` and `iat` are Unix seconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored recipe. `id` and `published_at` are assigned once, at creation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub tags: Vec<String>,
    pub published_at: DateTime<Utc>,
}

impl Recipe {
    pub fn new(input: RecipeInput, published_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            ingredients: input.ingredients,
            instructions: input.instructions,
            tags: input.tags,
            published_at,
        }
    }

    /// Overwrite the mutable fields; id and publication time stay as they are.
    pub fn apply(&mut self, input: &RecipeInput) {
        self.name = input.name.clone();
        self.ingredients = input.ingredients.clone();
        self.instructions = input.instructions.clone();
        self.tags = input.tags.clone();
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Client-supplied recipe body for create and update.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecipeInput {
    pub name: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Selection criteria for `RecipeStore::find`. The default matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tag: Option<String>,
}

impl RecipeFilter {
    pub fn tagged(tag: impl Into<String>) -> Self {
        Self { tag: Some(tag.into()) }
    }

    pub fn matches(&self, recipe: &Recipe) -> bool {
        match &self.tag {
            Some(tag) => recipe.has_tag(tag),
            None => true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub username: String,
    pub password_hash: String,
}

#[derive(Deserialize, Debug)]
pub struct SignInRequest {
    pub username: String,
    #[serde(alias = "secret")]
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RefreshRequest {
    pub token: String,
}

/// JWT claims: subject plus issue/expiry times in Unix seconds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // username
    pub iat: i64,
    pub exp: i64,
}

/// Response of sign-in and refresh.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, tags: &[&str]) -> RecipeInput {
        RecipeInput {
            name: name.to_string(),
            ingredients: vec!["flour".to_string()],
            instructions: vec!["mix".to_string()],
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_apply_keeps_identity_and_publication_time() {
        let published_at = Utc::now();
        let mut recipe = Recipe::new(input("Bread", &["bake"]), published_at);
        let id = recipe.id.clone();

        recipe.apply(&input("Flatbread", &["quick"]));

        assert_eq!(recipe.id, id);
        assert_eq!(recipe.published_at, published_at);
        assert_eq!(recipe.name, "Flatbread");
        assert_eq!(recipe.tags, vec!["quick".to_string()]);
    }

    #[test]
    fn test_recipe_json_uses_camel_case() {
        let recipe = Recipe::new(input("Soup", &[]), Utc::now());
        let value = serde_json::to_value(&recipe).unwrap();
        assert!(value.get("publishedAt").is_some());
        assert!(value.get("published_at").is_none());
    }

    #[test]
    fn test_input_accepts_missing_sequences() {
        let parsed: RecipeInput = serde_json::from_str(r#"{"name":"Toast"}"#).unwrap();
        assert!(parsed.ingredients.is_empty());
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn test_filter_by_tag() {
        let recipe = Recipe::new(input("Pesto", &["italian", "vegetarian"]), Utc::now());
        assert!(RecipeFilter::default().matches(&recipe));
        assert!(RecipeFilter::tagged("italian").matches(&recipe));
        assert!(!RecipeFilter::tagged("dessert").matches(&recipe));
    }

    #[test]
    fn test_sign_in_accepts_secret_alias() {
        let parsed: SignInRequest =
            serde_json::from_str(r#"{"username":"admin","secret":"hunter2"}"#).unwrap();
        assert_eq!(parsed.password, "hunter2");
    }
}
