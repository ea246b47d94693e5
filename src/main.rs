use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use stockroom::catalog::CatalogClient;
use stockroom::config;
use stockroom::db::{self, OverrideStore};
use stockroom::filters::{ProductFilters, SortKey, SortOrder};
use stockroom::inventory::Inventory;
use stockroom::model::{Product, ProductDraft};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List catalog products with local overrides applied
    List {
        /// Free-text search
        #[arg(short, long)]
        query: Option<String>,

        /// Category slug filter
        #[arg(long)]
        category: Option<String>,

        /// Sort key (price|stock)
        #[arg(long, value_parser = parse_sort_key)]
        sort_by: Option<SortKey>,

        /// Sort order (asc|desc)
        #[arg(long, value_parser = parse_sort_order)]
        order: Option<SortOrder>,

        /// 1-based page
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// A previously printed view string, instead of discrete flags
        #[arg(long, conflicts_with_all = ["query", "category", "sort_by", "order", "page"])]
        view: Option<String>,
    },

    /// List catalog categories
    Categories,

    /// Show one product as the server stores it
    Show { id: u64 },

    /// Create a product and record it in the local ledger
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        stock: u32,
    },

    /// Edit a product; omitted fields keep their current value
    Edit {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        stock: Option<u32>,
    },

    /// Delete a product and record the deletion locally
    Rm {
        id: u64,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

fn parse_sort_key(s: &str) -> Result<SortKey, String> {
    SortKey::parse(s).ok_or_else(|| format!("unknown sort key '{s}' (expected price or stock)"))
}

fn parse_sort_order(s: &str) -> Result<SortOrder, String> {
    SortOrder::parse(s).ok_or_else(|| format!("unknown order '{s}' (expected asc or desc)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let catalog = CatalogClient::from_config(&cfg)?;
    let inventory = Inventory::new(Arc::new(catalog), OverrideStore::new(pool));
    let page_size = cfg.app.page_size;

    match args.command {
        Command::List {
            query,
            category,
            sort_by,
            order,
            page,
            view,
        } => {
            let filters = match view {
                Some(view) => ProductFilters::from_view_query(&view, page_size),
                None => ProductFilters {
                    q: query,
                    category,
                    sort_by,
                    order,
                    limit: Some(page_size),
                    skip: Some(page.saturating_sub(1).saturating_mul(page_size)),
                },
            };
            if let Err(err) = render_listing(&inventory, &filters).await {
                eprintln!("error loading products; rerun the command to retry");
                return Err(err);
            }
        }
        Command::Categories => {
            for category in inventory.categories().await? {
                println!("{:<24} {}", category.slug, category.name);
            }
        }
        Command::Show { id } => {
            print_product(&inventory.product(id).await?);
        }
        Command::Add {
            title,
            description,
            category,
            price,
            stock,
        } => {
            let draft = ProductDraft {
                title,
                description,
                category,
                price,
                stock,
            };
            let created = inventory.create(&draft).await?;
            println!("created product {}", created.id);
            print_product(&created);
            println!();
            render_listing(&inventory, &first_page(page_size)).await?;
        }
        Command::Edit {
            id,
            title,
            description,
            category,
            price,
            stock,
        } => {
            let basis = inventory.edit_basis(id).await?;
            let mut draft = ProductDraft::from_product(&basis);
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(description) = description {
                draft.description = description;
            }
            if let Some(category) = category {
                draft.category = category;
            }
            if let Some(price) = price {
                draft.price = price;
            }
            if let Some(stock) = stock {
                draft.stock = stock;
            }
            let updated = inventory.update(id, &draft).await?;
            println!("updated product {}", updated.id);
            print_product(&updated);
            println!();
            render_listing(&inventory, &first_page(page_size)).await?;
        }
        Command::Rm { id, yes } => {
            if !yes {
                anyhow::bail!("refusing to delete product {id} without --yes");
            }
            let removed = inventory.delete(id).await?;
            println!("deleted product {} ({})", removed.id, removed.title);
            println!();
            render_listing(&inventory, &first_page(page_size)).await?;
        }
    }

    Ok(())
}

fn first_page(page_size: u32) -> ProductFilters {
    ProductFilters {
        limit: Some(page_size),
        skip: Some(0),
        ..Default::default()
    }
}

async fn render_listing(inventory: &Inventory, filters: &ProductFilters) -> Result<()> {
    let page = inventory.products(filters).await?;
    println!(
        "{:>6}  {:<40} {:<20} {:>10} {:>7}",
        "id", "title", "category", "price", "stock"
    );
    for product in &page.products {
        println!(
            "{:>6}  {:<40} {:<20} {:>10.2} {:>7}",
            product.id,
            truncate(&product.title, 40),
            product.category,
            product.price,
            product.stock
        );
    }
    println!("{} shown, {} on server", page.products.len(), page.total);
    println!("view: {}", filters.view_query());
    Ok(())
}

fn print_product(product: &Product) {
    println!("id:          {}", product.id);
    println!("title:       {}", product.title);
    println!("category:    {}", product.category);
    println!("price:       {:.2}", product.price);
    println!("stock:       {}", product.stock);
    println!("description: {}", product.description);
    if let Some(brand) = &product.brand {
        println!("brand:       {brand}");
    }
    if let Some(rating) = product.rating {
        println!("rating:      {rating:.2}");
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
