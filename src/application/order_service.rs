use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};

use super::enrichment::BulkEnricher;
use super::query_router::QueryRouter;
use super::status_workflow::StatusWorkflow;
use crate::domain::errors::DomainError;
use crate::domain::events::OrderEvent;
use crate::domain::identity::Principal;
use crate::domain::order::{
    NewOrder, Order, OrderPage, OrderStatus, PlacedOrder, QueryFilter, StatusChange,
};
use crate::domain::ports::{EventDispatcher, OrderRepository};

/// Entry point for every order operation the HTTP layer exposes.
pub struct OrderService {
    store: Arc<dyn OrderRepository>,
    router: QueryRouter,
    enricher: BulkEnricher,
    workflow: StatusWorkflow,
    dispatcher: Arc<dyn EventDispatcher>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderRepository>,
        router: QueryRouter,
        enricher: BulkEnricher,
        workflow: StatusWorkflow,
        dispatcher: Arc<dyn EventDispatcher>,
    ) -> Self {
        Self {
            store,
            router,
            enricher,
            workflow,
            dispatcher,
        }
    }

    pub async fn list_admin(
        &self,
        filter: QueryFilter,
        caller: &Principal,
    ) -> Result<OrderPage, DomainError> {
        let page = self.router.search_all(filter).await?;
        self.enrich_listing(page, caller).await
    }

    pub async fn list_customer(
        &self,
        filter: QueryFilter,
        caller: &Principal,
    ) -> Result<OrderPage, DomainError> {
        let page = self.router.search_for_buyer(caller.user_id, filter).await?;
        self.enrich_listing(page, caller).await
    }

    pub async fn get_by_id(&self, id: i64, caller: &Principal) -> Result<Order, DomainError> {
        let order = self.store.find_by_id(id).await?.ok_or(DomainError::NotFound)?;
        self.enricher.enrich_one(order, caller).await
    }

    /// Admins may read any order; everyone else only their own.
    pub async fn get_by_code(&self, code: &str, caller: &Principal) -> Result<Order, DomainError> {
        let order = self
            .store
            .find_by_code(code)
            .await?
            .ok_or(DomainError::NotFound)?;
        if !caller.role.is_admin() && order.buyer_id != caller.user_id {
            return Err(DomainError::NotFound);
        }
        self.enricher.enrich_one(order, caller).await
    }

    /// Like `get_by_id`, but another buyer's order is reported as absent.
    pub async fn get_detail_customer(
        &self,
        id: i64,
        caller: &Principal,
    ) -> Result<Order, DomainError> {
        let order = self.store.find_by_id(id).await?.ok_or(DomainError::NotFound)?;
        if order.buyer_id != caller.user_id {
            return Err(DomainError::NotFound);
        }
        self.enricher.enrich_one(order, caller).await
    }

    pub async fn create_order(
        &self,
        order: NewOrder,
        caller: &Principal,
    ) -> Result<i64, DomainError> {
        order.validate()?;
        let placed = PlacedOrder::place(order, Utc::now().date_naive());
        let stock: Vec<(i64, i64)> = placed
            .order
            .items
            .iter()
            .map(|i| (i.product_id, i.quantity))
            .collect();

        let order_id = self.store.create(placed).await?;
        info!("order {} created", order_id);

        let stored = self
            .store
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| DomainError::Internal(format!("order {} vanished", order_id)))?;
        let indexed = match self.enricher.enrich_one(stored.clone(), caller).await {
            Ok(enriched) => enriched,
            Err(e) => {
                warn!("indexing order {} without enrichment: {}", order_id, e);
                stored
            }
        };

        self.dispatcher
            .dispatch(OrderEvent::OrderCreated(Box::new(indexed)));
        for (product_id, quantity) in stock {
            self.dispatcher.dispatch(OrderEvent::StockDecrement {
                product_id,
                quantity,
            });
        }

        Ok(order_id)
    }

    pub async fn update_status(
        &self,
        order_id: i64,
        target: OrderStatus,
        remarks: Option<String>,
        caller: &Principal,
    ) -> Result<StatusChange, DomainError> {
        self.workflow
            .update_status(order_id, target, remarks, caller)
            .await
    }

    async fn enrich_listing(
        &self,
        page: OrderPage,
        caller: &Principal,
    ) -> Result<OrderPage, DomainError> {
        if page.is_empty() {
            return Err(DomainError::NotFound);
        }
        let OrderPage {
            orders,
            total_count,
            total_pages,
        } = page;
        let orders = self.enricher.enrich_page(orders, caller).await.map_err(|e| {
            error!("order listing enrichment failed: {}", e);
            e
        })?;
        Ok(OrderPage {
            orders,
            total_count,
            total_pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    use super::OrderService;
    use crate::application::enrichment::BulkEnricher;
    use crate::application::query_router::QueryRouter;
    use crate::application::status_workflow::StatusWorkflow;
    use crate::application::testing::{
        admin, customer, sample_order, FakeIndex, FakeProducts, FakeStore, FakeUsers,
        RecordingDispatcher,
    };
    use crate::domain::errors::DomainError;
    use crate::domain::events::OrderEvent;
    use crate::domain::order::{NewOrder, NewOrderItem, OrderPage, OrderStatus, QueryFilter};

    struct Harness {
        service: OrderService,
        index: Arc<FakeIndex>,
        store: Arc<FakeStore>,
        users: Arc<FakeUsers>,
        products: Arc<FakeProducts>,
        dispatcher: Arc<RecordingDispatcher>,
    }

    fn harness(index: FakeIndex, store: FakeStore, users: FakeUsers, products: FakeProducts) -> Harness {
        let index = Arc::new(index);
        let store = Arc::new(store);
        let users = Arc::new(users);
        let products = Arc::new(products);
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let service = OrderService::new(
            store.clone(),
            QueryRouter::new(index.clone(), store.clone()),
            BulkEnricher::new(users.clone(), products.clone(), Duration::from_secs(5)),
            StatusWorkflow::new(store.clone(), users.clone(), dispatcher.clone()),
            dispatcher.clone(),
        );
        Harness {
            service,
            index,
            store,
            users,
            products,
            dispatcher,
        }
    }

    fn new_order(buyer_id: i64, items: &[(i64, i64)]) -> NewOrder {
        NewOrder {
            buyer_id,
            order_date: NaiveDate::from_ymd_opt(2026, 5, 1).expect("valid date"),
            order_time: "09:30".to_string(),
            total_amount: BigDecimal::from(30_000),
            shipping_type: "Delivery".to_string(),
            payment_method: Some("COD".to_string()),
            remarks: None,
            items: items
                .iter()
                .map(|(product_id, quantity)| NewOrderItem {
                    product_id: *product_id,
                    quantity: *quantity,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn index_outage_falls_back_and_enriches_in_two_calls() {
        let h = harness(
            FakeIndex::failing(),
            FakeStore::with_orders(vec![sample_order(1, 10, &[1, 2]), sample_order(2, 10, &[2, 3])]),
            FakeUsers::with_buyers(&[10]),
            FakeProducts::with_products(&[1, 2, 3]),
        );

        let page = h
            .service
            .list_admin(QueryFilter::default(), &admin())
            .await
            .expect("listing failed");

        assert_eq!(h.index.calls(), 1);
        assert_eq!(h.store.search_calls().len(), 1);
        assert_eq!(h.users.bulk_calls(), vec![vec![10]]);
        assert_eq!(h.products.bulk_calls(), vec![vec![1, 2, 3]]);

        assert_eq!(page.total_count, 2);
        for order in &page.orders {
            assert_eq!(order.buyer.name, "buyer-10");
            assert_eq!(order.buyer.email, "buyer-10@example.com");
            for item in &order.items {
                assert_eq!(item.product.name, format!("product-{}", item.product_id));
                assert_eq!(item.product.unit_price, item.product_id * 1000);
            }
        }
    }

    #[tokio::test]
    async fn empty_listing_is_not_found_and_skips_enrichment() {
        let h = harness(
            FakeIndex::answering(OrderPage::default()),
            FakeStore::with_orders(vec![sample_order(1, 10, &[1])]),
            FakeUsers::with_buyers(&[10]),
            FakeProducts::with_products(&[1]),
        );

        let err = h
            .service
            .list_admin(QueryFilter::default(), &admin())
            .await
            .expect_err("no data");

        assert!(matches!(err, DomainError::NotFound));
        assert!(h.users.bulk_calls().is_empty());
        assert!(h.products.bulk_calls().is_empty());
        assert!(h.store.search_calls().is_empty());
    }

    #[tokio::test]
    async fn enrichment_failure_fails_the_listing() {
        let h = harness(
            FakeIndex::failing(),
            FakeStore::with_orders(vec![sample_order(1, 10, &[1])]),
            FakeUsers::with_buyers(&[10]),
            FakeProducts::failing(),
        );

        let err = h
            .service
            .list_admin(QueryFilter::default(), &admin())
            .await
            .expect_err("catalog down");

        assert!(matches!(err, DomainError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn customer_listing_is_scoped_to_the_caller() {
        let h = harness(
            FakeIndex::failing(),
            FakeStore::with_orders(vec![sample_order(1, 10, &[1]), sample_order(2, 11, &[1])]),
            FakeUsers::with_buyers(&[10, 11]),
            FakeProducts::with_products(&[1]),
        );

        let page = h
            .service
            .list_customer(QueryFilter::default(), &customer(11))
            .await
            .expect("listing failed");

        assert_eq!(page.orders.len(), 1);
        assert_eq!(page.orders[0].buyer_id, 11);
        assert_eq!(h.store.search_calls()[0].buyer_id, Some(11));
    }

    #[tokio::test]
    async fn detail_by_code_is_enriched() {
        let h = harness(
            FakeIndex::failing(),
            FakeStore::with_orders(vec![sample_order(5, 10, &[1])]),
            FakeUsers::with_buyers(&[10]),
            FakeProducts::with_products(&[1]),
        );

        let order = h
            .service
            .get_by_code("ORD-TEST-5", &admin())
            .await
            .expect("lookup failed");

        assert_eq!(order.id, 5);
        assert_eq!(order.buyer.name, "buyer-10");
    }

    #[tokio::test]
    async fn code_lookup_hides_other_buyers_orders_from_customers() {
        let h = harness(
            FakeIndex::failing(),
            FakeStore::with_orders(vec![sample_order(5, 10, &[1])]),
            FakeUsers::with_buyers(&[10]),
            FakeProducts::with_products(&[1]),
        );

        let err = h
            .service
            .get_by_code("ORD-TEST-5", &customer(99))
            .await
            .expect_err("foreign order");
        assert!(matches!(err, DomainError::NotFound));
        assert_eq!(h.users.single_calls(), 0);
        assert_eq!(h.products.single_calls(), 0);
        assert!(h.products.bulk_calls().is_empty());

        let own = h
            .service
            .get_by_code("ORD-TEST-5", &customer(10))
            .await
            .expect("own order");
        assert_eq!(own.id, 5);
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let h = harness(
            FakeIndex::failing(),
            FakeStore::with_orders(vec![]),
            FakeUsers::with_buyers(&[10]),
            FakeProducts::with_products(&[1]),
        );

        let err = h.service.get_by_id(1, &admin()).await.expect_err("absent");
        assert!(matches!(err, DomainError::NotFound));
    }

    #[tokio::test]
    async fn customers_cannot_read_other_buyers_orders() {
        let h = harness(
            FakeIndex::failing(),
            FakeStore::with_orders(vec![sample_order(1, 10, &[1])]),
            FakeUsers::with_buyers(&[10]),
            FakeProducts::with_products(&[1]),
        );

        let err = h
            .service
            .get_detail_customer(1, &customer(99))
            .await
            .expect_err("foreign order");
        assert!(matches!(err, DomainError::NotFound));

        let own = h
            .service
            .get_detail_customer(1, &customer(10))
            .await
            .expect("own order");
        assert_eq!(own.id, 1);
    }

    #[tokio::test]
    async fn create_persists_and_publishes_order_and_stock_events() {
        let h = harness(
            FakeIndex::failing(),
            FakeStore::with_orders(vec![]),
            FakeUsers::with_buyers(&[10]),
            FakeProducts::with_products(&[1, 2]),
        );

        let id = h
            .service
            .create_order(new_order(10, &[(1, 2), (2, 5)]), &customer(10))
            .await
            .expect("create failed");

        let stored = h.store.order(id).expect("order stored");
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.shipping_fee, BigDecimal::from(5000));
        assert_eq!(stored.total_amount, BigDecimal::from(30_000));
        assert!(stored.order_code.starts_with("ORD-"));

        let events = h.dispatcher.events();
        assert_eq!(events.len(), 3);
        match &events[0] {
            OrderEvent::OrderCreated(order) => {
                assert_eq!(order.id, id);
                assert_eq!(order.buyer.name, "buyer-10");
            }
            other => panic!("expected order created, got {:?}", other),
        }
        assert_eq!(
            events[1],
            OrderEvent::StockDecrement {
                product_id: 1,
                quantity: 2
            }
        );
        assert_eq!(
            events[2],
            OrderEvent::StockDecrement {
                product_id: 2,
                quantity: 5
            }
        );
    }

    #[tokio::test]
    async fn create_still_publishes_when_enrichment_fails() {
        let h = harness(
            FakeIndex::failing(),
            FakeStore::with_orders(vec![]),
            FakeUsers::failing(),
            FakeProducts::with_products(&[1]),
        );

        h.service
            .create_order(new_order(10, &[(1, 1)]), &customer(10))
            .await
            .expect("create failed");

        let events = h.dispatcher.events();
        assert!(matches!(&events[0], OrderEvent::OrderCreated(o) if o.buyer.name.is_empty()));
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn invalid_orders_are_not_stored() {
        let h = harness(
            FakeIndex::failing(),
            FakeStore::with_orders(vec![]),
            FakeUsers::with_buyers(&[10]),
            FakeProducts::with_products(&[1]),
        );

        let err = h
            .service
            .create_order(new_order(10, &[]), &customer(10))
            .await
            .expect_err("empty order");

        assert!(matches!(err, DomainError::InvalidInput(_)));
        assert!(h.dispatcher.events().is_empty());
    }

    #[tokio::test]
    async fn status_update_goes_through_the_workflow() {
        let h = harness(
            FakeIndex::failing(),
            FakeStore::with_orders(vec![sample_order(1, 10, &[1])]),
            FakeUsers::with_buyers(&[10]),
            FakeProducts::with_products(&[1]),
        );

        h.service
            .update_status(1, OrderStatus::Processing, Some("packed".to_string()), &admin())
            .await
            .expect("transition failed");

        assert_eq!(h.store.status_of(1), Some(OrderStatus::Processing));
        assert_eq!(h.store.order(1).and_then(|o| o.remarks).as_deref(), Some("packed"));
        assert_eq!(h.dispatcher.events().len(), 3);
    }
}
