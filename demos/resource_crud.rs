//! Search, read, create, update, and remove against JSONPlaceholder.
//!
//! Run with: `cargo run --example resource_crud`
//!
//! Set `RUST_LOG=apiary=debug` to watch the pipeline.

use apiary::{
    ApiConfig, ApiError, Client, EndpointConfig, ErrorKind, SearchParameters, SortDirection,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[derive(Debug, Serialize)]
struct TitlePatch<'a> {
    title: &'a str,
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("apiary=info,resource_crud=info")),
        )
        .init();

    let config = ApiConfig::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .endpoint(
            "posts",
            EndpointConfig::new("posts")
                .timeout(Duration::from_secs(3))
                .retries(2),
        )
        .default_timeout(Duration::from_secs(10))
        .build()?;

    let client = Client::builder()
        .config(config)
        .default_header("User-Agent", "apiary-demo/0.1")?
        .build()?;

    let posts = client.resource::<Post>("posts")?;

    println!("=== Search ===");
    let params = SearchParameters::new()
        .filter("userId", 1)
        .sort("id", SortDirection::Desc)
        .limit(10);
    let page = posts.search(Some(&params)).await?;
    println!(
        "Got {} posts (total {}, {} pages)",
        page.data.len(),
        page.pagination.total,
        page.pagination.pages
    );
    println!();

    println!("=== Read ===");
    let post = posts.read(1).await?;
    println!("Post {}: {}", post.id, post.title);
    println!("Received at {}", post.metadata.timestamp);
    println!();

    println!("=== Create ===");
    let created = posts
        .create(&NewPost {
            title: "Hello",
            body: "Posted through apiary",
            user_id: 1,
        })
        .await?;
    println!("Created post {} (status {})", created.id, created.metadata.status_code);
    println!();

    println!("=== Update ===");
    let updated = posts.update(1, &TitlePatch { title: "Renamed" }).await?;
    println!("Post {} is now titled {:?}", updated.id, updated.title);
    println!();

    println!("=== Remove ===");
    // JSONPlaceholder answers DELETE with `{}`, so read the payload untyped.
    let raw_posts = client.resource::<serde_json::Value>("posts")?;
    let removed = raw_posts.remove(1).await?;
    println!("Removed (status {})", removed.metadata.status_code);
    println!();

    println!("=== Errors ===");
    match posts.read(999_999).await {
        Ok(post) => println!("Unexpectedly found {:?}", post.data),
        Err(e) if e.kind() == ErrorKind::Client => {
            println!("{} {:?}: {}", e.status(), e.code(), e.message());
        }
        Err(e) => return Err(e),
    }

    match client.resource::<Post>("comments") {
        Ok(_) => println!("comments is configured"),
        Err(e) => println!("{:?}: {}", e.kind(), e.message()),
    }

    Ok(())
}
