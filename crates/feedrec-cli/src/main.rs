//! Demo binary: loads a dag directory, seeds the in-memory gateway with a
//! handful of fixtures, and prints one page of recommendations as JSON.
//! Exercises the library crates end to end; carries none of an HTTP
//! surface's routes or auth.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use feedrec_core::types::{Candidate, ItemKind, UserProfile};
use feedrec_gateway::{EventRecord, InMemoryGateway};
use feedrec_pipeline::{get_recommended_items, PipelineRuntime, SceneContext};

#[derive(Parser)]
#[command(name = "feedrec")]
#[command(about = "Feed recommendation DAG demo", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory of `*.json` graph definitions to load
    #[arg(long, env = "FEEDREC_DAG_DIR", default_value = "config/dags")]
    dag_dir: PathBuf,

    /// User id to recommend for; omit for an anonymous (cold-start) request
    #[arg(long)]
    user_id: Option<i64>,

    /// Page size
    #[arg(long, default_value_t = 10)]
    count: usize,

    /// Page offset
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Scene name carried on the request context
    #[arg(long, default_value = "feed")]
    scene: String,

    /// Print the DAG's internal trace alongside the results
    #[arg(long)]
    debug: bool,
}

/// Seeds a small, self-contained fixture set so the demo produces
/// non-trivial output without an external store: a handful of content
/// items tagged for one user, an ad and a product, and a short event
/// history to drive popularity and multi-hop recall.
fn seed_demo_fixtures(gateway: &InMemoryGateway) {
    let tag_sets = [
        vec!["rust".to_string(), "systems".to_string()],
        vec!["rust".to_string(), "async".to_string()],
        vec!["cooking".to_string()],
        vec!["travel".to_string(), "photography".to_string()],
        vec!["rust".to_string(), "databases".to_string()],
    ];

    for (i, tags) in tag_sets.iter().enumerate() {
        let id = i as i64 + 1;
        let mut item = Candidate::new(id, ItemKind::Content);
        item.title = Some(format!("Post #{id}"));
        item.content = Some("demo content body".to_string());
        item.tags = tags.clone();
        item.author_id = Some(100 + id);
        item.created_at = Some(Utc::now());
        gateway.seed_item(item);
    }

    let mut ad = Candidate::new(901, ItemKind::Ad);
    ad.title = Some("Sponsored: try our product".to_string());
    gateway.seed_item(ad);

    let mut product = Candidate::new(902, ItemKind::Product);
    product.title = Some("Featured gadget".to_string());
    gateway.seed_item(product);

    gateway.seed_user(UserProfile { id: 1, tags: vec!["rust".to_string(), "systems".to_string()] });

    let now = Utc::now();
    for (item_id, event_type) in [(1, "like"), (1, "share"), (2, "pv"), (4, "comment"), (5, "pv")] {
        gateway.seed_event(EventRecord { user_id: 1, item_id, event_type: event_type.to_string(), at: now });
    }
    // A co-visitor for multi-hop recall: user 2 liked item 1 (shared with
    // user 1) and item 3 (which user 1 hasn't seen yet).
    gateway.seed_event(EventRecord { user_id: 2, item_id: 1, event_type: "like".to_string(), at: now });
    gateway.seed_event(EventRecord { user_id: 2, item_id: 3, event_type: "like".to_string(), at: now });
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let runtime = PipelineRuntime::load(&cli.dag_dir)
        .with_context(|| format!("failed to load dag definitions from {}", cli.dag_dir.display()))?;

    let gateway = Arc::new(InMemoryGateway::new());
    seed_demo_fixtures(&gateway);

    let scene_ctx = SceneContext { scene: cli.scene, debug: cli.debug, ..SceneContext::default() };

    let items = get_recommended_items(&runtime, gateway, cli.user_id, cli.count, cli.offset, scene_ctx).await;

    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}
