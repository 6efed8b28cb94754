pub mod backup;
pub mod bootstrap;
pub mod manager;
pub mod models;

pub use manager::{DatabaseError, DatabaseManager, DEFAULT_BIND_KEY, MASTER_BIND_KEY};
