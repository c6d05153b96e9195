pub mod balances;
pub mod conflict;
pub mod errors;
pub mod models;
pub mod network;
pub mod services;
pub mod settlement;
pub mod split;
pub mod sync_queue;
