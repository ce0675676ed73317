//! Dev-team agents collaborating on the `devteam` topic.

pub mod events;
pub mod product_manager;
pub mod skills;

pub use events::{ReadmeChainClosed, ReadmeCreated, ReadmeGenerated, ReadmeRequested};
pub use product_manager::ProductManager;

/// The topic every dev-team agent subscribes to.
pub const TOPIC: &str = "devteam";
