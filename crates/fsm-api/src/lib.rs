//! FSM controller API types
//!
//! Status conditions and object references shared by controllers that
//! reconcile Kubernetes custom resources as finite-state machines.

#![warn(missing_docs)]

pub mod condition;
pub mod error;
pub mod reference;
pub mod resource;

pub use condition::*;
pub use error::{Error, Result};
pub use reference::*;
pub use resource::*;
