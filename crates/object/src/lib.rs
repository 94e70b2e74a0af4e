//! Reflective runtime object model.
//!
//! The config compiler drives objects through this crate's trait surface:
//! [`ConfigType`] describes a class of objects (field metadata, load
//! dependencies, the per-type instance table), [`ConfigObject`] is one
//! live instance with lifecycle callbacks, and [`DependencyGraph`] tracks
//! the inter-object edges consulted during reload.

mod debug_info;
mod error;
mod fields;
mod graph;
mod object;
mod serialize;
mod types;

pub use debug_info::DebugInfo;
pub use error::ObjectError;
pub use fields::{FieldAttrs, FieldInfo};
pub use graph::DependencyGraph;
pub use object::{ConfigObject, ObjectCore, ValidationUtils};
pub use serialize::{deserialize_fields, serialize_fields};
pub use types::{ConfigType, InstanceMap, NameComposer, TypeRegistry};

/// Dynamic field value representation.
pub type Value = serde_json::Value;
