use std::collections::HashMap;

use async_trait::async_trait;
use log::error;
use reqwest::Client;

use super::http::{get_envelope, ids_param};
use crate::domain::enrichment::ProductSummary;
use crate::domain::errors::DomainError;
use crate::domain::identity::{Principal, Role};
use crate::domain::ports::ProductCatalog;

/// HTTP client for the product service. Admins use `/admin/products`,
/// customers the storefront `/products/home` routes.
pub struct HttpProductCatalog {
    client: Client,
    base_url: String,
}

impl HttpProductCatalog {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn prefix(&self, role: Role) -> String {
        match role {
            Role::Admin => format!("{}/admin/products", self.base_url),
            Role::Customer => format!("{}/products/home", self.base_url),
        }
    }
}

#[async_trait]
impl ProductCatalog for HttpProductCatalog {
    async fn get_product(
        &self,
        product_id: i64,
        caller: &Principal,
    ) -> Result<ProductSummary, DomainError> {
        let url = format!("{}/{}", self.prefix(caller.role), product_id);
        get_envelope(&self.client, &url, &caller.token)
            .await
            .map_err(|e| {
                error!("[ProductCatalog] product {} lookup failed: {}", product_id, e);
                e
            })
    }

    async fn get_products(
        &self,
        product_ids: &[i64],
        caller: &Principal,
    ) -> Result<HashMap<i64, ProductSummary>, DomainError> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let url = format!(
            "{}/bulk?ids={}",
            self.prefix(caller.role),
            ids_param(product_ids)
        );
        let products: Vec<ProductSummary> = get_envelope(&self.client, &url, &caller.token)
            .await
            .map_err(|e| {
                error!(
                    "[ProductCatalog] bulk lookup of {} products failed: {}",
                    product_ids.len(),
                    e
                );
                e
            })?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }
}
