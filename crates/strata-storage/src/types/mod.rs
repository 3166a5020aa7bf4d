//! Type definitions for strata storage.

mod checkpoints;
mod commits;
mod folders;
mod ids;
mod projects;
mod resources;
mod secrets;

// Re-export all types from submodules
pub use checkpoints::*;
pub use commits::*;
pub use folders::*;
pub use ids::*;
pub use projects::*;
pub use resources::*;
pub use secrets::*;
