use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::errors::DomainError;
use crate::domain::order::{Order, OrderPage, OrderStatus, QueryFilter};
use crate::domain::ports::{OrderIndexWriter, OrderSearchIndex};

/// Elasticsearch-backed order index, queried through the `_search` REST API
/// and written through the document APIs. Documents are the order-created
/// payloads keyed by order id, so `_source` is an `Order`.
pub struct ElasticOrderIndex {
    client: Client,
    base_url: String,
    index: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    total: Total,
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Total {
    value: i64,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: Order,
}

impl ElasticOrderIndex {
    pub fn new(client: Client, base_url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            index: index.into(),
        }
    }

    /// Same membership as the store predicate: free text over code and
    /// status, optional status match, optional buyer.
    pub fn query_body(filter: &QueryFilter) -> Value {
        let mut must = Vec::new();
        let mut filters = Vec::new();

        if !filter.search.is_empty() {
            must.push(json!({
                "query_string": {
                    "query": format!("*{}*", escape_query(&filter.search)),
                    "fields": ["order_code", "status"],
                    "analyze_wildcard": true
                }
            }));
        }
        if !filter.status.is_empty() {
            must.push(json!({ "match": { "status": filter.status } }));
        }
        if let Some(buyer_id) = filter.buyer_id {
            filters.push(json!({ "term": { "buyer_id": buyer_id } }));
        }

        json!({
            "from": filter.offset(),
            "size": filter.per_page,
            "track_total_hits": true,
            "query": { "bool": { "must": must, "filter": filters } },
            "sort": [ { filter.order_by.as_str(): { "order": filter.order_type.as_str() } } ]
        })
    }

    fn doc_url(&self, api: &str, order_id: i64) -> String {
        format!("{}/{}/{}/{}?refresh=true", self.base_url, self.index, api, order_id)
    }

    async fn check(op: &str, order_id: i64, response: Response) -> Result<(), DomainError> {
        let status = response.status();
        if status.is_success() {
            info!("[OrderIndex] {} order {}: {}", op, order_id, status);
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        warn!("[OrderIndex] {} order {} failed with {}: {}", op, order_id, status, body);
        if status == StatusCode::NOT_FOUND {
            return Err(DomainError::NotFound);
        }
        Err(DomainError::UpstreamUnavailable(format!(
            "search index returned {} for {} of order {}",
            status, op, order_id
        )))
    }
}

/// Backslash-escape Lucene query-string operators.
fn escape_query(raw: &str) -> String {
    const RESERVED: &[char] = &[
        '+', '-', '=', '&', '|', '>', '<', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*',
        '?', ':', '\\', '/',
    ];
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl OrderSearchIndex for ElasticOrderIndex {
    async fn search(&self, filter: &QueryFilter) -> Result<OrderPage, DomainError> {
        let url = format!("{}/{}/_search", self.base_url, self.index);
        let response = self
            .client
            .post(&url)
            .json(&Self::query_body(filter))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("[OrderIndex] search returned {}: {}", status, body);
            return Err(DomainError::UpstreamUnavailable(format!(
                "search index returned {}",
                status
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        let total_count = parsed.hits.total.value;
        debug!(
            "[OrderIndex] {} hits (total {}) for page {}",
            parsed.hits.hits.len(),
            total_count,
            filter.page
        );

        Ok(OrderPage {
            orders: parsed.hits.hits.into_iter().map(|h| h.source).collect(),
            total_count,
            total_pages: filter.total_pages(total_count),
        })
    }
}

#[async_trait]
impl OrderIndexWriter for ElasticOrderIndex {
    async fn upsert(&self, order: &Order) -> Result<(), DomainError> {
        let response = self
            .client
            .put(self.doc_url("_doc", order.id))
            .json(order)
            .send()
            .await?;
        Self::check("index", order.id, response).await
    }

    async fn patch_status(&self, order_id: i64, status: OrderStatus) -> Result<(), DomainError> {
        let response = self
            .client
            .post(self.doc_url("_update", order_id))
            .json(&json!({ "doc": { "status": status.as_str() } }))
            .send()
            .await?;
        Self::check("patch", order_id, response).await
    }

    async fn delete(&self, order_id: i64) -> Result<(), DomainError> {
        let response = self
            .client
            .delete(self.doc_url("_doc", order_id))
            .send()
            .await?;
        match Self::check("delete", order_id, response).await {
            Err(DomainError::NotFound) => {
                debug!("[OrderIndex] order {} was not indexed", order_id);
                Ok(())
            }
            other => other,
        }
    }
}
