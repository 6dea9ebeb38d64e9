//! Shared vocabulary for the weft compute engine.
//!
//! This crate holds the types every subsystem speaks: dot-separated resource
//! names and the namespaces that build them, and the buffer payloads a
//! resource can hold (dense host arrays, opaque device field descriptors,
//! plain immediate values).
//!
//! No engine logic lives here. The registry, producers and modules are in
//! `weft-engine`; renderers and numeric runtimes consume these types without
//! pulling the engine in.

pub mod array;
pub mod buffer;
pub mod dtype;
pub mod name;
pub mod value;

pub use array::{Array, ArrayData};
pub use buffer::{Buffer, FieldDesc, Payload, ResourceKind};
pub use dtype::Dtype;
pub use name::{Namespace, ResourceName};
pub use value::Value;
