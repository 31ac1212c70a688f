pub mod orders;

use actix_web::web;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        orders::list_orders_admin,
        orders::get_order_admin,
        orders::update_order_status,
        orders::list_orders_customer,
        orders::create_order,
        orders::get_order_customer,
        orders::get_order_by_code,
    ),
    components(schemas(
        orders::CreateOrderRequest,
        orders::CreateOrderItemRequest,
        orders::UpdateStatusRequest,
        orders::OrderResponse,
        orders::OrderItemResponse,
        orders::OrderEnvelope,
        orders::ListOrdersResponse,
        orders::Pagination,
        orders::CreateOrderResponse,
        orders::CreatedOrder,
        orders::UpdateStatusResponse,
        orders::StatusChangeResponse,
    )),
    tags(
        (name = "admin", description = "Back-office order management"),
        (name = "orders", description = "Buyer-facing order endpoints"),
    )
)]
pub struct ApiDoc;

/// Mount every order route. Shared by the server and the API tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin/orders")
            .route("", web::get().to(orders::list_orders_admin))
            .route("/{id}", web::get().to(orders::get_order_admin))
            .route("/{id}/status", web::put().to(orders::update_order_status)),
    )
    .service(
        web::scope("/auth/orders")
            .route("", web::get().to(orders::list_orders_customer))
            .route("", web::post().to(orders::create_order))
            .route("/{code}/code", web::get().to(orders::get_order_by_code))
            .route("/{id}", web::get().to(orders::get_order_customer)),
    );
}
