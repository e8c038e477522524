//! Type definitions

pub mod customer;
pub mod import;
pub mod messages;
pub mod visit;

pub use customer::*;
pub use import::*;
pub use messages::*;
pub use visit::*;
