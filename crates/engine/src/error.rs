//! Engine errors.

use thiserror::Error;

use weft_foundation::ResourceName;

use crate::producer::ProducerId;

/// Engine result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the compute engine.
///
/// Every variant carries the offending resource name(s); cycle variants carry
/// the full path. The engine never retries and never swallows: errors
/// propagate out of `ensure`/`set`/`commit` unchanged, and partial state is
/// never committed.
#[derive(Debug, Error)]
pub enum Error {
    /// Lookup of a name that was never declared.
    #[error("unknown resource: {name}")]
    UnknownResource {
        /// The undeclared name.
        name: ResourceName,
    },

    /// `declare` of a name already present in the registry.
    #[error("resource already declared: {name}")]
    DuplicateDeclaration {
        /// The already-declared name.
        name: ResourceName,
    },

    /// The dependency DFS revisited a name already on the stack.
    #[error("dependency cycle detected: {}", join_path(.path))]
    ResourceCycle {
        /// The full path, ending with the repeated name.
        path: Vec<ResourceName>,
    },

    /// Module construction revisited a `(scope, module)` already being built.
    #[error("module dependency cycle detected: {}", .path.join(" -> "))]
    ModuleCycle {
        /// `"scope:Name"` entries, ending with the repeated module.
        path: Vec<String>,
    },

    /// `ensure` reached a stale resource that has no producer and was never
    /// committed.
    #[error("uninitialized input: '{name}' has no producer and was never set")]
    UninitializedInput {
        /// The unset input.
        name: ResourceName,
    },

    /// A producer's `compute` returned without committing every output.
    #[error("producer '{producer}' ran but did not commit: {}", join_names(.outputs))]
    ProducerDidNotCommit {
        /// Label of the delinquent producer.
        producer: String,
        /// The outputs whose versions did not advance.
        outputs: Vec<ResourceName>,
    },

    /// A resource was declared with a producer that does not list it as an
    /// output.
    #[error("resource '{name}' lists producer '{producer}' which does not own it")]
    ProducerOutputNotOwned {
        /// Label of the producer.
        producer: String,
        /// The resource that claimed it.
        name: ResourceName,
    },

    /// A producer declared an empty or duplicated output set.
    #[error("invalid producer '{producer}': {reason}")]
    InvalidProducer {
        /// Label of the producer.
        producer: String,
        /// What was wrong with its output set.
        reason: String,
    },

    /// A [`ProducerId`] that does not resolve in this registry.
    #[error("unknown producer: {id}")]
    UnknownProducer {
        /// The dangling id.
        id: ProducerId,
    },

    /// A buffer was rejected by a resource's spec, or a typed read did not
    /// match the stored payload. The write (if any) was rolled back.
    #[error("validation failed for '{name}': {reason}")]
    Validation {
        /// The resource whose contract was violated.
        name: ResourceName,
        /// Which check failed.
        reason: String,
    },
}

fn join_path(names: &[ResourceName]) -> String {
    names
        .iter()
        .map(ResourceName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn join_names(names: &[ResourceName]) -> String {
    names
        .iter()
        .map(ResourceName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
