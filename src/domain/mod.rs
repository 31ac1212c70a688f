pub mod enrichment;
pub mod errors;
pub mod events;
pub mod identity;
pub mod order;
pub mod ports;
