use clap::{Args, Parser, Subcommand};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::fs;

const TOKEN_FILE: &str = ".recipes_token";

#[derive(Parser)]
#[command(name = "recipes-cli")]
#[command(about = "CLI for the recipes API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, env = "RECIPES_URL", default_value = "http://localhost:8080")]
    url: String,
}

#[derive(Args)]
struct RecipeArgs {
    #[arg(short, long)]
    name: String,
    /// Repeat for each ingredient, in order.
    #[arg(short, long = "ingredient")]
    ingredients: Vec<String>,
    /// Repeat for each step, in order.
    #[arg(short = 's', long = "step")]
    instructions: Vec<String>,
    #[arg(short, long = "tag")]
    tags: Vec<String>,
}

impl RecipeArgs {
    fn body(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "ingredients": self.ingredients,
            "instructions": self.instructions,
            "tags": self.tags,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    SignIn {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Exchange the saved token for a fresh one.
    Refresh,
    List {
        #[arg(short, long)]
        tag: Option<String>,
    },
    Get {
        id: String,
    },
    Create(RecipeArgs),
    Update {
        id: String,
        #[command(flatten)]
        recipe: RecipeArgs,
    },
    Delete {
        id: String,
    },
    SignOut,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(rename = "expiresAt")]
    expires_at: String,
}

fn saved_token() -> String {
    fs::read_to_string(TOKEN_FILE).unwrap_or_default()
}

fn authorized(builder: RequestBuilder) -> RequestBuilder {
    builder.header("Authorization", saved_token())
}

async fn print_response(res: Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    println!("{}: {}", status, res.text().await?);
    Ok(())
}

async fn save_token(res: Response) -> Result<(), Box<dyn std::error::Error>> {
    if res.status().is_success() {
        let body: TokenResponse = res.json().await?;
        fs::write(TOKEN_FILE, body.token)?;
        println!("Token saved to {} (expires {})", TOKEN_FILE, body.expires_at);
    } else {
        println!("Request failed: {}", res.text().await?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::SignIn { username, password } => {
            let res = client
                .post(format!("{}/signin", base))
                .json(&json!({ "username": username, "password": password }))
                .send()
                .await?;
            save_token(res).await?;
        }
        Commands::Refresh => {
            let res = client
                .post(format!("{}/refresh", base))
                .json(&json!({ "token": saved_token() }))
                .send()
                .await?;
            save_token(res).await?;
        }
        Commands::List { tag } => {
            let mut req = client.get(format!("{}/recipes", base));
            if let Some(tag) = tag {
                req = req.query(&[("tag", tag)]);
            }
            print_response(req.send().await?).await?;
        }
        Commands::Get { id } => {
            let res = authorized(client.get(format!("{}/recipes/{}", base, id)))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Create(recipe) => {
            let res = authorized(client.post(format!("{}/recipes", base)))
                .json(&recipe.body())
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Update { id, recipe } => {
            let res = authorized(client.put(format!("{}/recipes/{}", base, id)))
                .json(&recipe.body())
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Delete { id } => {
            let res = authorized(client.delete(format!("{}/recipes/{}", base, id)))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::SignOut => {
            let _ = fs::remove_file(TOKEN_FILE);
            println!("Signed out (token removed).");
        }
    }

    Ok(())
}
