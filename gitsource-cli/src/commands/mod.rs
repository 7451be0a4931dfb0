//! CLI command implementations

pub mod nodes;
pub mod sync;

pub use nodes::NodesArgs;
pub use sync::SyncArgs;
