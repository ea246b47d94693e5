//! Query/mutation orchestrator: one fetch per distinct filter set, override
//! write-through on successful mutations, and page-cache invalidation after
//! every mutation.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::catalog::{CatalogService, RequestFailed};
use crate::db::OverrideStore;
use crate::filters::ProductFilters;
use crate::model::{Category, Product, ProductDraft, ProductPage};
use crate::validate::{validate_draft, ValidationError};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Request(#[from] RequestFailed),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

type PageFetch = Shared<BoxFuture<'static, Result<ProductPage, RequestFailed>>>;
type CategoryFetch = Shared<BoxFuture<'static, Result<Vec<Category>, RequestFailed>>>;

/// The cache entry *is* the shared fetch future: concurrent identical reads
/// attach to it, a completed one keeps serving its result, and invalidation
/// simply drops entries. A fetch dispatched before an invalidation can
/// still settle for its waiters but never re-enters the map.
#[derive(Default)]
struct FetchCache {
    pages: HashMap<String, PageFetch>,
    categories: Option<CategoryFetch>,
}

pub struct Inventory {
    catalog: Arc<dyn CatalogService>,
    store: OverrideStore,
    cache: Mutex<FetchCache>,
}

impl Inventory {
    pub fn new(catalog: Arc<dyn CatalogService>, store: OverrideStore) -> Self {
        Self {
            catalog,
            store,
            cache: Mutex::new(FetchCache::default()),
        }
    }

    /// One reconciled page. The raw server page is cached keyed by the
    /// canonical filter serialization; the override ledger is re-read on
    /// every call so the overlay is always current. The server's total
    /// count passes through untouched.
    #[instrument(skip_all)]
    pub async fn products(&self, filters: &ProductFilters) -> Result<ProductPage, InventoryError> {
        let key = filters.query_string();
        let fetch = {
            let mut cache = self.cache.lock().await;
            match cache.pages.get(&key) {
                Some(fetch) => fetch.clone(),
                None => {
                    debug!(%key, "fetching product page");
                    let catalog = Arc::clone(&self.catalog);
                    let filters = filters.clone();
                    let fetch = async move { catalog.list(&filters).await }.boxed().shared();
                    cache.pages.insert(key.clone(), fetch.clone());
                    fetch
                }
            }
        };

        let page = match fetch.clone().await {
            Ok(page) => page,
            Err(err) => {
                // Failed fetches are not retained; the next read re-attempts.
                let mut cache = self.cache.lock().await;
                if cache.pages.get(&key).is_some_and(|f| f.ptr_eq(&fetch)) {
                    cache.pages.remove(&key);
                }
                return Err(err.into());
            }
        };

        let ledger = self.store.load().await?;
        let ProductPage {
            products,
            total,
            skip,
            limit,
        } = page;
        Ok(ProductPage {
            products: ledger.apply(products),
            total,
            skip,
            limit,
        })
    }

    /// Category list, cached in a single slot. Product mutations never
    /// invalidate it.
    pub async fn categories(&self) -> Result<Vec<Category>, InventoryError> {
        let fetch = {
            let mut cache = self.cache.lock().await;
            match &cache.categories {
                Some(fetch) => fetch.clone(),
                None => {
                    debug!("fetching categories");
                    let catalog = Arc::clone(&self.catalog);
                    let fetch = async move { catalog.list_categories().await }.boxed().shared();
                    cache.categories = Some(fetch.clone());
                    fetch
                }
            }
        };

        match fetch.clone().await {
            Ok(categories) => Ok(categories),
            Err(err) => {
                let mut cache = self.cache.lock().await;
                if cache.categories.as_ref().is_some_and(|f| f.ptr_eq(&fetch)) {
                    cache.categories = None;
                }
                Err(err.into())
            }
        }
    }

    /// Uncached single-record fetch straight from the catalog.
    pub async fn product(&self, id: u64) -> Result<Product, InventoryError> {
        Ok(self.catalog.get(id).await?)
    }

    /// The record an edit starts from: the ledger's edited entry if one
    /// exists, else the latest locally added record with that id, else the
    /// server's copy.
    pub async fn edit_basis(&self, id: u64) -> Result<Product, InventoryError> {
        let ledger = self.store.load().await?;
        if let Some(product) = ledger.edited.get(&id) {
            return Ok(product.clone());
        }
        if let Some(product) = ledger.added.iter().rev().find(|p| p.id == id) {
            return Ok(product.clone());
        }
        Ok(self.catalog.get(id).await?)
    }

    #[instrument(skip_all)]
    pub async fn create(&self, draft: &ProductDraft) -> Result<Product, InventoryError> {
        validate_draft(draft)?;
        let created = self.catalog.create(draft).await?;
        self.store.record_addition(&created).await?;
        self.invalidate_products().await;
        info!(id = created.id, "product created");
        Ok(created)
    }

    #[instrument(skip_all)]
    pub async fn update(&self, id: u64, draft: &ProductDraft) -> Result<Product, InventoryError> {
        validate_draft(draft)?;
        let updated = self.catalog.update(id, &draft.as_patch()).await?;
        self.store.record_edit(&updated).await?;
        self.invalidate_products().await;
        info!(id, "product updated");
        Ok(updated)
    }

    #[instrument(skip_all)]
    pub async fn delete(&self, id: u64) -> Result<Product, InventoryError> {
        let deleted = self.catalog.delete(id).await?;
        // The requested id is recorded, not the id the response carries.
        self.store.record_deletion(id).await?;
        self.invalidate_products().await;
        info!(id, "product deleted");
        Ok(deleted)
    }

    async fn invalidate_products(&self) {
        let mut cache = self.cache.lock().await;
        let dropped = cache.pages.len();
        cache.pages.clear();
        debug!(dropped, "invalidated product page cache");
    }
}
