//! # kubesweep-core
//!
//! Core abstractions shared by the kubesweep crates.
//!
//! - **Object model**: [`ManagedObject`], its identity [`ObjectRef`] and the
//!   listing unit [`ResourceKind`]
//! - **Metadata accessor**: typed get/set over annotations, labels and owner
//!   references ([`Metadata`])
//! - **Cluster access**: the [`ClusterAccessor`] contract and an in-memory
//!   implementation ([`MemoryCluster`])
//! - **Error types**: shared error definitions and result alias
//! - **Observability**: logging initialization and spans
//!
//! ## Example
//!
//! ```rust
//! use kubesweep_core::prelude::*;
//!
//! let mut object = ManagedObject::new("v1", "ConfigMap", Some("default"), "settings");
//! object.set_label("app.kubernetes.io/name", "billing");
//! assert_eq!(object.label("app.kubernetes.io/name"), Some("billing"));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod accessor;
pub mod error;
pub mod memory;
pub mod metadata;
pub mod object;
pub mod observability;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::accessor::{ClusterAccessor, DeletePropagation, ListSelector};
    pub use crate::error::{Error, Result};
    pub use crate::memory::MemoryCluster;
    pub use crate::metadata::Metadata;
    pub use crate::object::{ManagedObject, ObjectRef, ResourceKind};
}

pub use accessor::{ClusterAccessor, DeletePropagation, ListSelector};
pub use error::{Error, Result};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
pub use memory::MemoryCluster;
pub use metadata::Metadata;
pub use object::{ManagedObject, ObjectRef, ResourceKind};
pub use observability::{LogFormat, LogSettings, init_logging, init_logging_with};
