//! CLI command handling

pub mod context;
pub mod device;
pub mod output;
pub mod post;

pub use context::*;
pub use device::*;
pub use output::*;
pub use post::*;
