pub mod consumer;
pub mod dispatcher;
pub mod http;
pub mod models;
pub mod order_repo;
pub mod product_client;
pub mod publisher;
pub mod search_index;
pub mod user_client;
