pub mod enrichment;
pub mod index_sync;
pub mod order_service;
pub mod query_router;
pub mod status_workflow;

#[cfg(test)]
pub(crate) mod testing;
