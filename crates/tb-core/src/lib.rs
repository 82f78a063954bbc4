//! thread-board/crates/tb-core/src/lib.rs
//!
//! The central domain logic and interface definitions for the thread board.

pub mod actions;
pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use actions::*;
pub use error::*;
pub use models::*;
pub use traits::*;
