//! Seed the recipe store
//!
//! Creates (or resets) a user with a bcrypt-hashed password and, optionally,
//! imports recipes from a JSON array of `{name, ingredients, instructions, tags}`.
//! Run: cargo run --bin load_data -- --username admin --password <secret> --recipes recipes.json
//!
//! Writes go straight to the store, so a running server with a Redis cache
//! keeps serving its old listing until the next write or a cache flush.

use clap::Parser;
use std::fs;

use recipes_api::auth::hash_password;
use recipes_api::models::{Recipe, RecipeInput, User};
use recipes_api::storage::{RecipeStore, Storage, UserStore};

#[derive(Parser)]
#[command(name = "load_data", about = "Seed users and recipes into the store")]
struct Args {
    #[arg(long, env = "STORE_PATH", default_value = "recipes_data")]
    store_path: String,

    #[arg(long, env = "STORE_DATABASE", default_value = "demo")]
    store_database: String,

    #[arg(long, default_value = "admin")]
    username: String,

    #[arg(long)]
    password: String,

    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    bcrypt_cost: u32,

    /// JSON file with recipes to import.
    #[arg(long)]
    recipes: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let storage = Storage::open(&args.store_path, &args.store_database)?;

    let user = User {
        username: args.username.clone(),
        password_hash: hash_password(&args.password, args.bcrypt_cost)?,
    };
    storage.put_user(&user).await?;
    println!("✅ User `{}` stored", args.username);

    if let Some(path) = &args.recipes {
        let inputs: Vec<RecipeInput> = serde_json::from_str(&fs::read_to_string(path)?)?;
        let count = inputs.len();
        for input in inputs {
            let recipe = Recipe::new(input, chrono::Utc::now());
            storage.insert(&recipe).await?;
        }
        println!("✅ Imported {} recipes from {}", count, path);
    }

    storage.flush().await?;
    Ok(())
}
