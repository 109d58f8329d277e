//! HTTP client for the product service.

use async_trait::async_trait;
use common::ProductId;
use serde::Serialize;

use crate::{Catalog, CatalogError, Product};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest<'a> {
    product_ids: &'a [ProductId],
}

/// Catalog backed by the product service's batch endpoint.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn batch_url(&self) -> String {
        format!("{}/products/batch", self.base_url)
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    async fn fetch_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, CatalogError> {
        let result = self.request(ids).await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        metrics::counter!("catalog_lookups_total", "outcome" => outcome).increment(1);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Catalog lookup failed");
        }

        result
    }
}

impl HttpCatalog {
    async fn request(&self, ids: &[ProductId]) -> Result<Vec<Product>, CatalogError> {
        let response = self
            .client
            .post(self.batch_url())
            .json(&BatchRequest { product_ids: ids })
            .send()
            .await
            .map_err(CatalogError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(CatalogError::Transport)?;
        serde_json::from_slice(&body).map_err(|e| CatalogError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let catalog = HttpCatalog::new("http://products.local/");
        assert_eq!(catalog.base_url(), "http://products.local");
        assert_eq!(catalog.batch_url(), "http://products.local/products/batch");
    }

    #[test]
    fn batch_request_uses_camel_case() {
        let id = ProductId::new();
        let body = serde_json::to_value(BatchRequest { product_ids: &[id] }).unwrap();
        assert_eq!(body, serde_json::json!({ "productIds": [id.to_string()] }));
    }
}
