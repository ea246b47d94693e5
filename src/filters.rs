//! Catalog query descriptors and their two serialized forms: the upstream
//! query-string parameters (`limit`/`skip` based) and the shareable view
//! query (`page` based) that mirrors what the user is looking at.

use reqwest::Url;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Price,
    Stock,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Price => "price",
            SortKey::Stock => "stock",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "price" => Some(SortKey::Price),
            "stock" => Some(SortKey::Stock),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// Transient query descriptor for a catalog listing. Not persisted; built
/// from CLI flags or a view query string and serialized back out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilters {
    pub q: Option<String>,
    pub category: Option<String>,
    pub sort_by: Option<SortKey>,
    pub order: Option<SortOrder>,
    pub limit: Option<u32>,
    pub skip: Option<u32>,
}

impl ProductFilters {
    /// The upstream parameter list, in the order the API expects them.
    /// Absent filters are omitted entirely; empty strings and zero
    /// limit/skip count as absent.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(q) = self.q.as_deref().filter(|q| !q.is_empty()) {
            pairs.push(("q", q.to_string()));
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            pairs.push(("category", category.to_string()));
        }
        if let Some(sort_by) = self.sort_by {
            pairs.push(("sortBy", sort_by.as_str().to_string()));
        }
        if let Some(order) = self.order {
            pairs.push(("order", order.as_str().to_string()));
        }
        if let Some(limit) = self.limit.filter(|n| *n > 0) {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(skip) = self.skip.filter(|n| *n > 0) {
            pairs.push(("skip", skip.to_string()));
        }
        pairs
    }

    /// Whether the free-text search endpoint applies instead of the plain
    /// listing endpoint.
    pub fn is_search(&self) -> bool {
        self.q.as_deref().is_some_and(|q| !q.is_empty())
    }

    /// Canonical form-encoded serialization of the upstream parameters.
    /// Doubles as the fetch-cache key: identical filters produce identical
    /// strings.
    pub fn query_string(&self) -> String {
        encode_pairs(&self.to_query_pairs())
    }

    /// The 1-based page this descriptor points at, derived from skip/limit.
    pub fn page(&self) -> u32 {
        match (self.skip, self.limit) {
            (Some(skip), Some(limit)) if limit > 0 => skip / limit + 1,
            _ => 1,
        }
    }

    /// The shareable view string: `q`, `category`, `sortBy`, `order` plus a
    /// 1-based `page`. The page is always written, like the address-bar
    /// state this mirrors.
    pub fn view_query(&self) -> String {
        let mut pairs: Vec<(&'static str, String)> = self
            .to_query_pairs()
            .into_iter()
            .filter(|(key, _)| !matches!(*key, "limit" | "skip"))
            .collect();
        pairs.push(("page", self.page().to_string()));
        encode_pairs(&pairs)
    }

    /// Rebuild filters from a view string. Unknown parameters are ignored;
    /// sort keys outside price/stock and malformed page numbers fall back
    /// to their defaults. `page_size` supplies the limit/skip arithmetic.
    pub fn from_view_query(view: &str, page_size: u32) -> Self {
        let mut filters = ProductFilters::default();
        let mut page: u32 = 1;
        for (key, value) in decode_pairs(view) {
            match key.as_str() {
                "q" if filters.q.is_none() && !value.is_empty() => filters.q = Some(value),
                "category" if filters.category.is_none() && !value.is_empty() => {
                    filters.category = Some(value)
                }
                "sortBy" if filters.sort_by.is_none() => filters.sort_by = SortKey::parse(&value),
                "order" if filters.order.is_none() => filters.order = SortOrder::parse(&value),
                "page" => page = value.parse().unwrap_or(1).max(1),
                _ => {}
            }
        }
        filters.limit = Some(page_size);
        // Saturate rather than overflow on absurd page numbers.
        filters.skip = Some((page - 1).saturating_mul(page_size));
        filters
    }
}

fn encode_pairs(pairs: &[(&'static str, String)]) -> String {
    // A throwaway URL does the form encoding; only its query is kept.
    let mut url = Url::parse("http://filters.invalid/").expect("valid base url");
    url.query_pairs_mut()
        .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));
    url.query().unwrap_or_default().to_string()
}

fn decode_pairs(query: &str) -> Vec<(String, String)> {
    let trimmed = query.trim().trim_start_matches('?');
    let url = match Url::parse(&format!("http://filters.invalid/?{trimmed}")) {
        Ok(url) => url,
        Err(_) => return Vec::new(),
    };
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> ProductFilters {
        ProductFilters {
            q: Some("blue shirt".into()),
            category: Some("mens-shirts".into()),
            sort_by: Some(SortKey::Price),
            order: Some(SortOrder::Desc),
            limit: Some(10),
            skip: Some(20),
        }
    }

    #[test]
    fn pairs_keep_upstream_order_and_omit_absent() {
        let keys: Vec<&str> = full().to_query_pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["q", "category", "sortBy", "order", "limit", "skip"]);

        assert!(ProductFilters::default().to_query_pairs().is_empty());
    }

    #[test]
    fn empty_and_zero_values_count_as_absent() {
        let filters = ProductFilters {
            q: Some(String::new()),
            skip: Some(0),
            limit: Some(10),
            ..Default::default()
        };
        let pairs = filters.to_query_pairs();
        assert_eq!(pairs, vec![("limit", "10".to_string())]);
        assert!(!filters.is_search());
    }

    #[test]
    fn query_string_is_form_encoded() {
        let filters = ProductFilters {
            q: Some("blue shirt".into()),
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(filters.query_string(), "q=blue+shirt&limit=10");
    }

    #[test]
    fn view_query_uses_pages_not_offsets() {
        assert_eq!(
            full().view_query(),
            "q=blue+shirt&category=mens-shirts&sortBy=price&order=desc&page=3"
        );
        assert_eq!(ProductFilters::default().view_query(), "page=1");
    }

    #[test]
    fn view_round_trip_preserves_filters() {
        let filters = full();
        let parsed = ProductFilters::from_view_query(&filters.view_query(), 10);
        assert_eq!(parsed, filters);
    }

    #[test]
    fn view_parse_ignores_unknown_and_untyped_values() {
        let parsed = ProductFilters::from_view_query("?utm_source=x&sortBy=weight&page=2", 10);
        assert_eq!(parsed.sort_by, None);
        assert_eq!(parsed.q, None);
        assert_eq!(parsed.limit, Some(10));
        assert_eq!(parsed.skip, Some(10));
    }

    #[test]
    fn view_parse_survives_garbage_pages() {
        let parsed = ProductFilters::from_view_query("page=zero", 10);
        assert_eq!(parsed.skip, Some(0));
        assert_eq!(parsed.page(), 1);

        let parsed = ProductFilters::from_view_query("page=0", 10);
        assert_eq!(parsed.skip, Some(0));
    }

    #[test]
    fn view_parse_survives_out_of_range_pages() {
        // A page whose offset exceeds u32 saturates instead of wrapping.
        let parsed = ProductFilters::from_view_query("page=429496731", 10);
        assert_eq!(parsed.limit, Some(10));
        assert_eq!(parsed.skip, Some(u32::MAX));
    }

    #[test]
    fn sort_enums_round_trip() {
        assert_eq!(SortKey::parse("price"), Some(SortKey::Price));
        assert_eq!(SortKey::parse("weight"), None);
        assert_eq!(SortOrder::parse(SortOrder::Desc.as_str()), Some(SortOrder::Desc));
    }
}
