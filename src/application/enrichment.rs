use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};

use crate::domain::enrichment::EnrichmentMaps;
use crate::domain::errors::DomainError;
use crate::domain::identity::Principal;
use crate::domain::order::Order;
use crate::domain::ports::{ProductCatalog, UserDirectory};

/// Joins orders against the user and product services with at most two
/// downstream calls per request, issued concurrently.
///
/// Enrichment is all-or-nothing: if either lookup fails, or the pair does not
/// finish before the deadline, the whole call fails and no order is returned.
/// Ids absent from a successful lookup are tolerated and leave display fields
/// at their defaults.
pub struct BulkEnricher {
    users: Arc<dyn UserDirectory>,
    products: Arc<dyn ProductCatalog>,
    deadline: Duration,
}

impl BulkEnricher {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        products: Arc<dyn ProductCatalog>,
        deadline: Duration,
    ) -> Self {
        Self {
            users,
            products,
            deadline,
        }
    }

    pub async fn enrich_page(
        &self,
        mut orders: Vec<Order>,
        caller: &Principal,
    ) -> Result<Vec<Order>, DomainError> {
        if orders.is_empty() {
            return Ok(orders);
        }

        let buyer_ids: Vec<i64> = orders
            .iter()
            .map(|o| o.buyer_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let product_ids: Vec<i64> = orders
            .iter()
            .flat_map(|o| o.items.iter().map(|i| i.product_id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        debug!(
            "enriching {} orders: {} buyers, {} products",
            orders.len(),
            buyer_ids.len(),
            product_ids.len()
        );

        let (buyers, products) = self
            .with_deadline(futures::future::try_join(
                self.users.get_profiles(&buyer_ids, caller),
                self.products.get_products(&product_ids, caller),
            ))
            .await?;

        let maps = EnrichmentMaps { buyers, products };
        for order in &mut orders {
            maps.apply(order);
        }
        Ok(orders)
    }

    /// Detail variant: one profile lookup plus one product lookup for the
    /// order's own items. Orders of a single product use the single-product
    /// endpoint instead of the bulk one.
    pub async fn enrich_one(
        &self,
        mut order: Order,
        caller: &Principal,
    ) -> Result<Order, DomainError> {
        let product_ids: Vec<i64> = order
            .items
            .iter()
            .map(|i| i.product_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let products = async {
            match product_ids.as_slice() {
                [only] => match self.products.get_product(*only, caller).await {
                    Ok(product) => Ok(HashMap::from([(*only, product)])),
                    Err(DomainError::NotFound) => Ok(HashMap::new()),
                    Err(e) => Err(e),
                },
                ids => self.products.get_products(ids, caller).await,
            }
        };

        let (buyer, products) = self
            .with_deadline(futures::future::try_join(
                self.users.get_profile(order.buyer_id, caller),
                products,
            ))
            .await?;

        let maps = EnrichmentMaps {
            buyers: HashMap::from([(order.buyer_id, buyer)]),
            products,
        };
        maps.apply(&mut order);
        Ok(order)
    }

    async fn with_deadline<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("order enrichment failed: {}", e);
                Err(e)
            }
            Err(_) => {
                error!("order enrichment exceeded {:?}", self.deadline);
                Err(DomainError::Cancelled(format!(
                    "enrichment did not finish within {:?}",
                    self.deadline
                )))
            }
        }
    }
}
