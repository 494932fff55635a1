//! regsync-engine - reconciles schema registries and registry policies.
//!
//! A reconciliation runs as a chain of stateless invocations. Each invocation
//! takes the desired model plus the context returned by the previous one and
//! produces a [`ProgressEvent`]:
//!
//! - **Success**: the resource is in the desired state; the context is dropped.
//! - **InProgress**: a mutation was issued but is not yet visible; the host
//!   must redeliver the returned context after the requested delay.
//! - **Failed**: a terminal, classified error.
//!
//! ## Layout
//!
//! - [`handlers`]: create/read/update/delete/list per resource type
//! - [`engine`]: the stabilization state machine shared by async mutations
//! - [`translator`]: model <-> backend request/response mapping
//! - [`classify`]: backend failure -> [`ErrorKind`] per operation
//! - [`backend`]: the [`ResourceBackend`] capability and an in-memory backend

pub mod backend;
pub mod classify;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod model;
pub mod outcome;
pub mod translator;

pub use backend::memory::MemoryBackend;
pub use backend::ResourceBackend;
pub use config::EngineConfig;
pub use context::CallbackContext;
pub use engine::{Engine, Observation, Stabilizer};
pub use error::{BackendError, BackendErrorKind, ErrorKind, OperationError};
pub use handlers::policy::PolicyHandler;
pub use handlers::registry::RegistryHandler;
pub use handlers::{Action, HandlerRequest, ResourceHandler};
pub use model::{ResourceModel, Tag};
pub use outcome::{ListPage, ProgressEvent};
