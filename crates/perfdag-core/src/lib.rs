//! perfdag core
//!
//! Domain types shared by the workflow builder: the release descriptor,
//! the declarative benchmark tree, execution units and the layered
//! configuration resolver.

pub mod error;
pub mod ids;
pub mod layers;
pub mod release;
pub mod spec;
pub mod unit;
pub mod vars;

pub use error::{Error, Result};
pub use ids::UnitId;
