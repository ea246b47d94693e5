use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::filters::ProductFilters;
use crate::model::{Category, Product, ProductDraft, ProductPage, ProductPatch};

/// A catalog operation failed. Deliberately unstructured: one attempt per
/// operation, and callers only learn which operation did not go through.
/// Status and body go to the log, not into the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("failed to {0}")]
pub struct RequestFailed(pub &'static str);

/// Read/write access to the remote product catalog.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn list(&self, filters: &ProductFilters) -> Result<ProductPage, RequestFailed>;
    async fn list_categories(&self) -> Result<Vec<Category>, RequestFailed>;
    async fn get(&self, id: u64) -> Result<Product, RequestFailed>;
    async fn create(&self, draft: &ProductDraft) -> Result<Product, RequestFailed>;
    async fn update(&self, id: u64, patch: &ProductPatch) -> Result<Product, RequestFailed>;
    async fn delete(&self, id: u64) -> Result<Product, RequestFailed>;
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: Url,
}

impl CatalogClient {
    pub fn new(base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("stockroom/0.1")
            .build()
            .expect("reqwest client");
        Self { http, base_url }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.catalog.base_url).context("invalid catalog.base_url")?;
        Ok(Self::new(base_url))
    }

    /// Listing uses a distinct search endpoint when free text is present;
    /// both endpoints take the same query parameters.
    pub fn list_request(&self, filters: &ProductFilters) -> Result<reqwest::Request> {
        let path = if filters.is_search() {
            "products/search"
        } else {
            "products"
        };
        let mut url = self.base_url.join(path).context("invalid catalog base URL")?;
        let pairs = filters.to_query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));
        }
        self.http
            .get(url)
            .build()
            .context("failed to build catalog request")
    }

    pub fn categories_request(&self) -> Result<reqwest::Request> {
        let url = self
            .base_url
            .join("products/categories")
            .context("invalid catalog base URL")?;
        self.http
            .get(url)
            .build()
            .context("failed to build catalog request")
    }

    pub fn get_request(&self, id: u64) -> Result<reqwest::Request> {
        let url = self
            .base_url
            .join(&format!("products/{id}"))
            .context("invalid catalog base URL")?;
        self.http
            .get(url)
            .build()
            .context("failed to build catalog request")
    }

    pub fn create_request(&self, draft: &ProductDraft) -> Result<reqwest::Request> {
        let url = self
            .base_url
            .join("products/add")
            .context("invalid catalog base URL")?;
        self.http
            .post(url)
            .json(draft)
            .build()
            .context("failed to build catalog request")
    }

    pub fn update_request(&self, id: u64, patch: &ProductPatch) -> Result<reqwest::Request> {
        let url = self
            .base_url
            .join(&format!("products/{id}"))
            .context("invalid catalog base URL")?;
        self.http
            .put(url)
            .json(patch)
            .build()
            .context("failed to build catalog request")
    }

    pub fn delete_request(&self, id: u64) -> Result<reqwest::Request> {
        let url = self
            .base_url
            .join(&format!("products/{id}"))
            .context("invalid catalog base URL")?;
        self.http
            .delete(url)
            .build()
            .context("failed to build catalog request")
    }

    /// One attempt, no retry, no timeout beyond the transport's own. Any
    /// transport error, non-success status, or undecodable body collapses
    /// into the operation's generic failure.
    async fn execute<T: DeserializeOwned>(
        &self,
        op: &'static str,
        request: Result<reqwest::Request>,
    ) -> Result<T, RequestFailed> {
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                warn!(op, %err, "failed to build catalog request");
                return Err(RequestFailed(op));
            }
        };
        debug!(op, url = %request.url(), "catalog request");

        let res = match self.http.execute(request).await {
            Ok(res) => res,
            Err(err) => {
                warn!(op, %err, "catalog request did not complete");
                return Err(RequestFailed(op));
            }
        };

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(op, %status, %body, "catalog request rejected");
            return Err(RequestFailed(op));
        }

        match res.json::<T>().await {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(op, %err, "catalog response undecodable");
                Err(RequestFailed(op))
            }
        }
    }

    pub async fn list(&self, filters: &ProductFilters) -> Result<ProductPage, RequestFailed> {
        self.execute("fetch products", self.list_request(filters))
            .await
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, RequestFailed> {
        let value: Value = self
            .execute("fetch categories", self.categories_request())
            .await?;
        match parse_categories(value) {
            Ok(categories) => Ok(categories),
            Err(err) => {
                warn!(%err, "categories response undecodable");
                Err(RequestFailed("fetch categories"))
            }
        }
    }

    pub async fn get(&self, id: u64) -> Result<Product, RequestFailed> {
        self.execute("fetch product", self.get_request(id)).await
    }

    pub async fn create(&self, draft: &ProductDraft) -> Result<Product, RequestFailed> {
        self.execute("create product", self.create_request(draft))
            .await
    }

    pub async fn update(&self, id: u64, patch: &ProductPatch) -> Result<Product, RequestFailed> {
        self.execute("update product", self.update_request(id, patch))
            .await
    }

    pub async fn delete(&self, id: u64) -> Result<Product, RequestFailed> {
        self.execute("delete product", self.delete_request(id))
            .await
    }
}

#[async_trait]
impl CatalogService for CatalogClient {
    async fn list(&self, filters: &ProductFilters) -> Result<ProductPage, RequestFailed> {
        CatalogClient::list(self, filters).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RequestFailed> {
        CatalogClient::list_categories(self).await
    }

    async fn get(&self, id: u64) -> Result<Product, RequestFailed> {
        CatalogClient::get(self, id).await
    }

    async fn create(&self, draft: &ProductDraft) -> Result<Product, RequestFailed> {
        CatalogClient::create(self, draft).await
    }

    async fn update(&self, id: u64, patch: &ProductPatch) -> Result<Product, RequestFailed> {
        CatalogClient::update(self, id, patch).await
    }

    async fn delete(&self, id: u64) -> Result<Product, RequestFailed> {
        CatalogClient::delete(self, id).await
    }
}

/// The category endpoint has returned unexpected shapes before; a non-array
/// body is treated as an empty catalog rather than a failure.
pub fn parse_categories(value: Value) -> Result<Vec<Category>, serde_json::Error> {
    if value.is_array() {
        serde_json::from_value(value)
    } else {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{SortKey, SortOrder};
    use serde_json::json;

    fn client() -> CatalogClient {
        CatalogClient::new(Url::parse("https://dummyjson.com").unwrap())
    }

    #[test]
    fn list_request_uses_listing_endpoint_without_query() {
        let request = client().list_request(&ProductFilters::default()).unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().path(), "/products");
        assert_eq!(request.url().query(), None);
    }

    #[test]
    fn list_request_switches_to_search_with_free_text() {
        let filters = ProductFilters {
            q: Some("phone".into()),
            ..Default::default()
        };
        let request = client().list_request(&filters).unwrap();
        assert_eq!(request.url().path(), "/products/search");
        assert_eq!(request.url().query(), Some("q=phone"));
    }

    #[test]
    fn list_request_serializes_all_filter_params_in_order() {
        let filters = ProductFilters {
            q: Some("phone".into()),
            category: Some("smartphones".into()),
            sort_by: Some(SortKey::Price),
            order: Some(SortOrder::Asc),
            limit: Some(10),
            skip: Some(20),
        };
        let request = client().list_request(&filters).unwrap();
        assert_eq!(
            request.url().query(),
            Some("q=phone&category=smartphones&sortBy=price&order=asc&limit=10&skip=20")
        );
    }

    #[test]
    fn create_request_posts_json_draft() {
        let draft = ProductDraft {
            title: "Widget".into(),
            description: "A widget".into(),
            category: "tools".into(),
            price: 4.5,
            stock: 12,
        };
        let request = client().create_request(&draft).unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/products/add");
        assert_eq!(
            request
                .headers()
                .get("content-type")
                .and_then(|h| h.to_str().ok()),
            Some("application/json")
        );
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        let sent: ProductDraft = serde_json::from_slice(body).unwrap();
        assert_eq!(sent, draft);
    }

    #[test]
    fn update_request_puts_partial_body() {
        let patch = ProductPatch {
            stock: Some(0),
            ..Default::default()
        };
        let request = client().update_request(42, &patch).unwrap();
        assert_eq!(request.method(), reqwest::Method::PUT);
        assert_eq!(request.url().path(), "/products/42");
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(
            serde_json::from_slice::<Value>(body).unwrap(),
            json!({ "stock": 0 })
        );
    }

    #[test]
    fn delete_request_targets_product_path() {
        let request = client().delete_request(7).unwrap();
        assert_eq!(request.method(), reqwest::Method::DELETE);
        assert_eq!(request.url().path(), "/products/7");
    }

    #[test]
    fn categories_request_targets_category_path() {
        let request = client().categories_request().unwrap();
        assert_eq!(request.url().path(), "/products/categories");
    }

    #[test]
    fn parse_categories_tolerates_non_array_bodies() {
        assert!(parse_categories(json!({ "message": "nope" })).unwrap().is_empty());
        assert!(parse_categories(json!("beauty")).unwrap().is_empty());

        let parsed = parse_categories(json!([
            { "slug": "beauty", "name": "Beauty", "url": "https://dummyjson.com/products/category/beauty" },
            { "slug": "fragrances", "name": "Fragrances" }
        ]))
        .unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].slug, "beauty");
        assert_eq!(parsed[1].name, "Fragrances");
    }

    #[test]
    fn parse_categories_rejects_malformed_elements() {
        assert!(parse_categories(json!([{ "slug": "beauty" }])).is_err());
    }

    #[test]
    fn request_failures_read_as_generic_messages() {
        assert_eq!(
            RequestFailed("fetch products").to_string(),
            "failed to fetch products"
        );
    }
}
