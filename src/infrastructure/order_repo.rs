use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use log::debug;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{
    Order, OrderPage, OrderStatus, PlacedOrder, QueryFilter, SortDirection, SortField,
    StatusChange,
};
use crate::domain::ports::OrderRepository;
use crate::schema::{order_items, orders};

use super::models::{NewOrderItemRow, NewOrderRow, OrderItemRow, OrderRow};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

// ── Queries ──────────────────────────────────────────────────────────────────

type BoxedOrders = orders::BoxedQuery<'static, Pg>;

/// Shared predicate for both the page and the count query.
fn filtered(filter: &QueryFilter) -> BoxedOrders {
    let mut query = orders::table.into_boxed();
    if !filter.search.is_empty() {
        let pattern = format!("%{}%", escape_like(&filter.search));
        query = query.filter(
            orders::order_code
                .ilike(pattern.clone())
                .or(orders::status.ilike(pattern)),
        );
    }
    if !filter.status.is_empty() {
        query = query.filter(orders::status.ilike(escape_like(&filter.status)));
    }
    if let Some(buyer_id) = filter.buyer_id {
        query = query.filter(orders::buyer_id.eq(buyer_id));
    }
    query
}

fn sorted(query: BoxedOrders, field: SortField, direction: SortDirection) -> BoxedOrders {
    let query = match (field, direction) {
        (SortField::OrderDate, SortDirection::Asc) => query.order(orders::order_date.asc()),
        (SortField::OrderDate, SortDirection::Desc) => query.order(orders::order_date.desc()),
        (SortField::Id, SortDirection::Asc) => query.order(orders::id.asc()),
        (SortField::Id, SortDirection::Desc) => query.order(orders::id.desc()),
        (SortField::OrderCode, SortDirection::Asc) => query.order(orders::order_code.asc()),
        (SortField::OrderCode, SortDirection::Desc) => query.order(orders::order_code.desc()),
        (SortField::Status, SortDirection::Asc) => query.order(orders::status.asc()),
        (SortField::Status, SortDirection::Desc) => query.order(orders::status.desc()),
        (SortField::TotalAmount, SortDirection::Asc) => query.order(orders::total_amount.asc()),
        (SortField::TotalAmount, SortDirection::Desc) => query.order(orders::total_amount.desc()),
    };
    // Stable paging when the sort key has ties.
    query.then_order_by(orders::id.desc())
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Attach each row's items with one extra query for the whole batch.
fn with_items(conn: &mut PgConnection, rows: Vec<OrderRow>) -> Result<Vec<Order>, DomainError> {
    let items = OrderItemRow::belonging_to(&rows)
        .select(OrderItemRow::as_select())
        .order(order_items::id.asc())
        .load(conn)?
        .grouped_by(&rows);

    rows.into_iter()
        .zip(items)
        .map(|(row, items)| row.into_order(items))
        .collect()
}

fn find_one(conn: &mut PgConnection, row: Option<OrderRow>) -> Result<Option<Order>, DomainError> {
    match row {
        Some(row) => Ok(with_items(conn, vec![row])?.pop()),
        None => Ok(None),
    }
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Diesel is blocking; keep it off the async workers.
    async fn run<T, F>(&self, work: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, DomainError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            work(&mut conn)
        })
        .await
        .map_err(|e| DomainError::Internal(format!("database task failed: {}", e)))?
    }
}

#[async_trait]
impl OrderRepository for DieselOrderRepository {
    async fn search(&self, filter: &QueryFilter) -> Result<OrderPage, DomainError> {
        let filter = filter.clone();
        self.run(move |conn| {
            let total_count: i64 = filtered(&filter).count().get_result(conn)?;

            let rows = sorted(filtered(&filter), filter.order_by, filter.order_type)
                .select(OrderRow::as_select())
                .limit(filter.per_page)
                .offset(filter.offset())
                .load(conn)?;

            debug!(
                "[OrderRepository] {} of {} orders for page {}",
                rows.len(),
                total_count,
                filter.page
            );

            Ok(OrderPage {
                orders: with_items(conn, rows)?,
                total_count,
                total_pages: filter.total_pages(total_count),
            })
        })
        .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, DomainError> {
        self.run(move |conn| {
            let row = orders::table
                .find(id)
                .select(OrderRow::as_select())
                .first(conn)
                .optional()?;
            find_one(conn, row)
        })
        .await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Order>, DomainError> {
        let code = code.to_string();
        self.run(move |conn| {
            let row = orders::table
                .filter(orders::order_code.eq(code))
                .select(OrderRow::as_select())
                .first(conn)
                .optional()?;
            find_one(conn, row)
        })
        .await
    }

    async fn create(&self, order: PlacedOrder) -> Result<i64, DomainError> {
        self.run(move |conn| {
            conn.transaction::<_, DomainError, _>(|conn| {
                // 1. Insert the order
                let order_id: i64 = diesel::insert_into(orders::table)
                    .values(&NewOrderRow::from(&order))
                    .returning(orders::id)
                    .get_result(conn)?;

                // 2. Insert its items
                let items: Vec<NewOrderItemRow> = order
                    .order
                    .items
                    .iter()
                    .map(|item| NewOrderItemRow {
                        order_id,
                        product_id: item.product_id,
                        quantity: item.quantity,
                    })
                    .collect();
                diesel::insert_into(order_items::table)
                    .values(&items)
                    .execute(conn)?;

                Ok(order_id)
            })
        })
        .await
    }

    async fn update_status(
        &self,
        id: i64,
        target: OrderStatus,
        remarks: Option<String>,
    ) -> Result<StatusChange, DomainError> {
        self.run(move |conn| {
            conn.transaction::<_, DomainError, _>(|conn| {
                let row = orders::table
                    .find(id)
                    .select(OrderRow::as_select())
                    .for_update()
                    .first(conn)
                    .optional()?
                    .ok_or(DomainError::NotFound)?;

                let previous: OrderStatus = row.status.parse().map_err(|_| {
                    DomainError::Internal(format!(
                        "order {} has unknown status '{}'",
                        row.id, row.status
                    ))
                })?;
                previous.ensure_transition(target)?;

                diesel::update(orders::table.find(id))
                    .set((
                        orders::status.eq(target.as_str()),
                        orders::remarks.eq(remarks.or(row.remarks)),
                        orders::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;

                Ok(StatusChange {
                    order_id: row.id,
                    order_code: row.order_code,
                    buyer_id: row.buyer_id,
                    previous,
                    current: target,
                })
            })
        })
        .await
    }
}
