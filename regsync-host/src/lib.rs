//! regsync-host - runs regsync handlers as a sequence of stateless invocations.
//!
//! Between invocations the host keeps three files: the desired model, the
//! callback context of an in-progress operation, and a snapshot of the
//! simulated backend.

pub mod config;
pub mod runner;
pub mod store;

pub use config::{load_config, Overrides};
pub use runner::{drive, handler_for, invoke_once, operation_key, ActionArg, ResourceType};
