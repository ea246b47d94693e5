use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use sqlx::Row;
use stockroom::config::Config;
use stockroom::db::{self, OverrideStore};

#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Dump raw slot JSON instead of the decoded summary
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let raw_cfg = fs::read_to_string(&args.config)?;
    let cfg: Config = serde_yaml::from_str(&raw_cfg)?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    if args.raw {
        let rows = sqlx::query("SELECT key, value, updated_at FROM override_entries ORDER BY key")
            .fetch_all(&pool)
            .await?;
        for row in rows {
            let key: String = row.get("key");
            let value: String = row.get("value");
            let updated_at: String = row.get("updated_at");
            println!("{key} (updated {updated_at}):");
            println!("  {value}");
        }
        return Ok(());
    }

    let store = OverrideStore::new(pool);
    let ledger = store.load().await?;

    println!("added ({}):", ledger.added.len());
    for product in &ledger.added {
        println!("  {:>6}  {}", product.id, product.title);
    }
    println!("edited ({}):", ledger.edited.len());
    for (id, product) in &ledger.edited {
        println!("  {id:>6}  {}", product.title);
    }
    println!("deleted ({}):", ledger.deleted.len());
    for id in &ledger.deleted {
        println!("  {id}");
    }
    Ok(())
}
