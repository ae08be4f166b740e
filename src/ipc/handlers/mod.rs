pub mod analytics;
pub mod attendance;
pub mod backup_exchange;
pub mod core;
pub mod people;
pub mod reports;
pub mod setup;
pub mod storage;
pub mod students;
