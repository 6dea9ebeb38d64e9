//! Registry-owned resource records.

use weft_foundation::{Buffer, ResourceName};

use crate::producer::ProducerId;
use crate::spec::ResourceSpec;

/// Snapshot of dependency versions observed at the last commit.
pub type DepSig = Vec<(ResourceName, u64)>;

/// A single registry entry: buffer, wiring and freshness state.
///
/// Resources are arena-owned by the registry; user code reads and writes
/// them through [`ResourceRef`](crate::ResourceRef) handles. `version`
/// starts at zero (never committed) and only ever increases. `dep_sig` is
/// written by commits, recording the dependency versions the current buffer
/// was computed against.
#[derive(Debug, Clone)]
pub struct Resource {
    pub(crate) name: ResourceName,
    pub(crate) buffer: Option<Buffer>,
    pub(crate) deps: Vec<ResourceName>,
    pub(crate) producer: Option<ProducerId>,
    pub(crate) version: u64,
    pub(crate) dep_sig: DepSig,
    pub(crate) description: String,
    pub(crate) spec: Option<ResourceSpec>,
}

impl Resource {
    /// Full name of this resource.
    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    /// Current buffer, if any.
    pub fn buffer(&self) -> Option<&Buffer> {
        self.buffer.as_ref()
    }

    /// Declared dependency names, in order.
    pub fn deps(&self) -> &[ResourceName] {
        &self.deps
    }

    /// Owning producer, if any. `None` means a purely user-set input.
    pub fn producer(&self) -> Option<ProducerId> {
        self.producer
    }

    /// Current version. Zero means never committed.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Dependency versions recorded at the last commit.
    pub fn dep_sig(&self) -> &DepSig {
        &self.dep_sig
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Runtime contract for the buffer, if declared with one.
    pub fn spec(&self) -> Option<&ResourceSpec> {
        self.spec.as_ref()
    }

    /// True once the resource has been committed at least once.
    pub fn is_committed(&self) -> bool {
        self.version > 0
    }
}
