use std::future::{ready, Ready};
use std::str::FromStr;
use std::sync::Arc;

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::application::order_service::OrderService;
use crate::domain::identity::{IdentityDecoder, Principal};
use crate::domain::order::{
    NewOrder, NewOrderItem, Order, OrderItem, OrderPage, OrderStatus, QueryFilter, StatusChange,
};
use crate::errors::AppError;

/// Header the authentication gateway forwards the verified claims in.
pub const CLAIMS_HEADER: &str = "X-User-Claims";

// ── Identity extraction ──────────────────────────────────────────────────────

impl FromRequest for Principal {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<Principal, AppError> {
    let decoder = req
        .app_data::<web::Data<Arc<dyn IdentityDecoder>>>()
        .ok_or_else(|| AppError::Internal("identity decoder is not configured".to_string()))?;
    let claims = req
        .headers()
        .get(CLAIMS_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Ok(decoder.decode(claims)?)
}

fn require_admin(caller: &Principal) -> Result<(), AppError> {
    if caller.role.is_admin() {
        Ok(())
    } else {
        Err(AppError::Unauthorized("admin role required".to_string()))
    }
}

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Defaults to today.
    pub order_date: Option<NaiveDate>,
    #[serde(default)]
    pub order_time: String,
    /// Decimal amount as a string, e.g. "150000.00". Stored as given.
    pub total_amount: String,
    #[serde(default)]
    pub shipping_type: String,
    pub payment_method: Option<String>,
    pub remarks: Option<String>,
    pub items: Vec<CreateOrderItemRequest>,
}

impl CreateOrderRequest {
    fn into_new_order(self, buyer_id: i64) -> Result<NewOrder, AppError> {
        let total_amount = BigDecimal::from_str(self.total_amount.trim()).map_err(|e| {
            AppError::BadRequest(format!(
                "Invalid total_amount '{}': {}",
                self.total_amount, e
            ))
        })?;
        Ok(NewOrder {
            buyer_id,
            order_date: self.order_date.unwrap_or_else(|| Utc::now().date_naive()),
            order_time: self.order_time,
            total_amount,
            shipping_type: self.shipping_type,
            payment_method: self.payment_method,
            remarks: self.remarks,
            items: self
                .items
                .into_iter()
                .map(|i| NewOrderItem {
                    product_id: i.product_id,
                    quantity: i.quantity,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub remarks: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub product_name: String,
    pub product_image: String,
    pub unit_price: i64,
    pub weight: i64,
    pub unit: String,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            product_name: item.product.name,
            product_image: item.product.image,
            unit_price: item.product.unit_price,
            weight: item.product.weight,
            unit: item.product.unit,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: i64,
    pub order_code: String,
    pub status: String,
    pub buyer_id: i64,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: String,
    pub buyer_address: String,
    pub order_date: String,
    pub order_time: String,
    pub total_amount: String,
    pub shipping_type: String,
    pub shipping_fee: String,
    pub payment_method: Option<String>,
    pub remarks: Option<String>,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            id: o.id,
            order_code: o.order_code,
            status: o.status.to_string(),
            buyer_id: o.buyer_id,
            buyer_name: o.buyer.name,
            buyer_email: o.buyer.email,
            buyer_phone: o.buyer.phone,
            buyer_address: o.buyer.address,
            order_date: o.order_date.to_string(),
            order_time: o.order_time,
            total_amount: o.total_amount.to_string(),
            shipping_type: o.shipping_type,
            shipping_fee: o.shipping_fee.to_string(),
            payment_method: o.payment_method,
            remarks: o.remarks,
            created_at: o.created_at.to_rfc3339(),
            items: o.items.into_iter().map(OrderItemResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Pagination {
    pub page: i64,
    pub total_count: i64,
    pub per_page: i64,
    pub total_page: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub message: String,
    pub data: Vec<OrderResponse>,
    pub pagination: Pagination,
}

impl ListOrdersResponse {
    fn from_page(page: OrderPage, filter: &QueryFilter) -> Self {
        Self {
            message: "success".to_string(),
            pagination: Pagination {
                page: filter.page,
                total_count: page.total_count,
                per_page: filter.per_page,
                total_page: page.total_pages,
            },
            data: page.orders.into_iter().map(OrderResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderEnvelope {
    pub message: String,
    pub data: OrderResponse,
}

impl From<Order> for OrderEnvelope {
    fn from(order: Order) -> Self {
        Self {
            message: "success".to_string(),
            data: order.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedOrder {
    pub id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub message: String,
    pub data: CreatedOrder,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusChangeResponse {
    pub order_id: i64,
    pub order_code: String,
    pub previous_status: String,
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateStatusResponse {
    pub message: String,
    pub data: StatusChangeResponse,
}

impl From<StatusChange> for UpdateStatusResponse {
    fn from(change: StatusChange) -> Self {
        Self {
            message: "success".to_string(),
            data: StatusChangeResponse {
                order_id: change.order_id,
                order_code: change.order_code,
                previous_status: change.previous.to_string(),
                status: change.current.to_string(),
            },
        }
    }
}

// ── Listing parameters ───────────────────────────────────────────────────────

/// Raw query string. Paging values are kept as text so garbage falls back to
/// the defaults instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub page: Option<String>,
    #[serde(rename = "perPage")]
    pub per_page: Option<String>,
    #[serde(rename = "orderBy")]
    pub order_by: Option<String>,
    #[serde(rename = "orderType")]
    pub order_type: Option<String>,
}

impl ListOrdersParams {
    pub fn to_filter(&self) -> QueryFilter {
        let number = |raw: &Option<String>| raw.as_deref().and_then(|v| v.trim().parse().ok());
        QueryFilter::normalized(
            self.search.clone(),
            self.status.clone(),
            number(&self.page),
            number(&self.per_page),
            self.order_by.as_deref(),
            self.order_type.as_deref(),
        )
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /admin/orders
///
/// Every buyer's orders. Served from the search index, or from the database
/// when the index is unavailable.
#[utoipa::path(
    get,
    path = "/admin/orders",
    params(
        ("search" = Option<String>, Query, description = "Substring of order code or status"),
        ("status" = Option<String>, Query, description = "Exact status, case-insensitive"),
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("perPage" = Option<i64>, Query, description = "Items per page (default 10)"),
        ("orderBy" = Option<String>, Query, description = "order_date | id | order_code | status | total_amount"),
        ("orderType" = Option<String>, Query, description = "asc | desc (default desc)"),
    ),
    responses(
        (status = 200, description = "Page of orders", body = ListOrdersResponse),
        (status = 401, description = "Missing or non-admin claims"),
        (status = 404, description = "No orders match"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "admin"
)]
pub async fn list_orders_admin(
    service: web::Data<OrderService>,
    caller: Principal,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    require_admin(&caller)?;
    let filter = query.to_filter();
    let page = service.list_admin(filter.clone(), &caller).await?;
    Ok(HttpResponse::Ok().json(ListOrdersResponse::from_page(page, &filter)))
}

/// GET /admin/orders/{id}
#[utoipa::path(
    get,
    path = "/admin/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = OrderEnvelope),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "admin"
)]
pub async fn get_order_admin(
    service: web::Data<OrderService>,
    caller: Principal,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_admin(&caller)?;
    let order = service.get_by_id(path.into_inner(), &caller).await?;
    Ok(HttpResponse::Ok().json(OrderEnvelope::from(order)))
}

/// PUT /admin/orders/{id}/status
///
/// Moves the order one step along the status graph, then notifies the buyer
/// and patches the search index in the background.
#[utoipa::path(
    put,
    path = "/admin/orders/{id}/status",
    params(("id" = i64, Path, description = "Order id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = UpdateStatusResponse),
        (status = 400, description = "Transition not allowed from the current status"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "admin"
)]
pub async fn update_order_status(
    service: web::Data<OrderService>,
    caller: Principal,
    path: web::Path<i64>,
    body: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&caller)?;
    let body = body.into_inner();
    let target: OrderStatus = body.status.parse()?;
    let change = service
        .update_status(path.into_inner(), target, body.remarks, &caller)
        .await?;
    Ok(HttpResponse::Ok().json(UpdateStatusResponse::from(change)))
}

/// GET /auth/orders
///
/// The caller's own orders.
#[utoipa::path(
    get,
    path = "/auth/orders",
    params(
        ("search" = Option<String>, Query, description = "Substring of order code or status"),
        ("status" = Option<String>, Query, description = "Exact status, case-insensitive"),
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("perPage" = Option<i64>, Query, description = "Items per page (default 10)"),
        ("orderBy" = Option<String>, Query, description = "order_date | id | order_code | status | total_amount"),
        ("orderType" = Option<String>, Query, description = "asc | desc (default desc)"),
    ),
    responses(
        (status = 200, description = "Page of orders", body = ListOrdersResponse),
        (status = 401, description = "Missing claims"),
        (status = 404, description = "No orders match"),
    ),
    tag = "orders"
)]
pub async fn list_orders_customer(
    service: web::Data<OrderService>,
    caller: Principal,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let filter = query.to_filter();
    let page = service.list_customer(filter.clone(), &caller).await?;
    Ok(HttpResponse::Ok().json(ListOrdersResponse::from_page(page, &filter)))
}

/// POST /auth/orders
#[utoipa::path(
    post,
    path = "/auth/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = CreateOrderResponse),
        (status = 422, description = "Invalid order"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    service: web::Data<OrderService>,
    caller: Principal,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let order = body.into_inner().into_new_order(caller.user_id)?;
    let id = service.create_order(order, &caller).await?;
    Ok(HttpResponse::Created().json(CreateOrderResponse {
        message: "success".to_string(),
        data: CreatedOrder { id },
    }))
}

/// GET /auth/orders/{id}
///
/// Orders belonging to another buyer are reported as not found.
#[utoipa::path(
    get,
    path = "/auth/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = OrderEnvelope),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_order_customer(
    service: web::Data<OrderService>,
    caller: Principal,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let order = service
        .get_detail_customer(path.into_inner(), &caller)
        .await?;
    Ok(HttpResponse::Ok().json(OrderEnvelope::from(order)))
}

/// GET /auth/orders/{code}/code
#[utoipa::path(
    get,
    path = "/auth/orders/{code}/code",
    params(("code" = String, Path, description = "Order code, e.g. ORD-20260101-1A2B3C4D")),
    responses(
        (status = 200, description = "Order found", body = OrderEnvelope),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_order_by_code(
    service: web::Data<OrderService>,
    caller: Principal,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let order = service.get_by_code(&path.into_inner(), &caller).await?;
    Ok(HttpResponse::Ok().json(OrderEnvelope::from(order)))
}
