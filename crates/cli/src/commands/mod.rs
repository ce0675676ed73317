pub mod config_cmd;
pub mod memory;
pub mod readme;
pub mod setup;
pub mod subscriptions;
