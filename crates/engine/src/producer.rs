//! Producers: computation nodes owning a fixed set of outputs.
//!
//! A producer declares, once, the ordered set of resource names it may
//! commit, and a `compute` operation that must commit (or bump) every one of
//! them before returning. The registry decides when producers run, based on
//! dependency freshness; see [`Registry::ensure`](crate::Registry::ensure).

use std::collections::HashSet;
use std::fmt;

use weft_foundation::ResourceName;

use crate::error::{Error, Result};
use crate::registry::Registry;

/// Identity of a producer within one registry's producer table.
///
/// Producers are registered with
/// [`Registry::add_producer`](crate::Registry::add_producer); the returned id
/// is what resources bind to and what the per-pass "already ran" bookkeeping
/// tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProducerId(pub(crate) usize);

impl fmt::Display for ProducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "producer#{}", self.0)
    }
}

/// A computation node with a fixed ordered set of outputs.
///
/// # Contract
///
/// - `outputs` is non-empty, distinct, and immutable after construction.
/// - `compute` must, before returning, commit or bump every output. The
///   registry verifies this and fails the ensure pass otherwise.
/// - Inputs are read without re-ensuring (`peek`/`read(..., false)`); the
///   registry guarantees they are fresh by the time `compute` runs.
/// - `compute` must not call `ensure` on its own outputs or their ancestors;
///   such reentry is detected as a dependency cycle.
pub trait Producer {
    /// Ordered output names this producer may commit.
    fn outputs(&self) -> &[ResourceName];

    /// Run the computation against the registry.
    fn compute(&self, registry: &Registry) -> Result<()>;

    /// Identifier used in logs, errors and `explain` output.
    fn label(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Checks the producer output contract: non-empty and distinct.
pub(crate) fn validate_outputs(label: &str, outputs: &[ResourceName]) -> Result<()> {
    if outputs.is_empty() {
        return Err(Error::InvalidProducer {
            producer: label.to_string(),
            reason: "no outputs declared".to_string(),
        });
    }
    let mut seen = HashSet::new();
    for output in outputs {
        if !seen.insert(output) {
            return Err(Error::InvalidProducer {
                producer: label.to_string(),
                reason: format!("duplicate output '{output}'"),
            });
        }
    }
    Ok(())
}

/// An IO record: a fixed collection of typed resource refs with a designated
/// ordered subset marked as outputs.
///
/// Implementors list the refs of their output fields, in declaration order.
/// [`WiredProducer`] derives its `outputs` from this at construction time.
pub trait IoRecord {
    /// Names of the fields marked as outputs, in declaration order.
    fn outputs(&self) -> Vec<ResourceName>;
}

/// A producer wired to concrete resource refs at construction time.
///
/// The IO record carries one typed ref per field; `compute` reads inputs
/// through `io.<field>.peek()` and writes outputs through
/// `io.<field>.set(..)`, `set_buffer(.., false)` + `commit()`, or `bump()`.
///
/// # Examples
///
/// ```no_run
/// # use weft_engine::{IoRecord, Registry, ResourceRef, Result, WiredProducer};
/// # use weft_foundation::ResourceName;
/// struct SquareIo {
///     x: ResourceRef<f64>,
///     y: ResourceRef<f64>,
/// }
///
/// impl IoRecord for SquareIo {
///     fn outputs(&self) -> Vec<ResourceName> {
///         vec![self.y.name().clone()]
///     }
/// }
///
/// # fn wire(io: SquareIo) -> Result<()> {
/// let producer = WiredProducer::new("square", io, |io, _reg| {
///     let x = io.x.peek()?.unwrap_or(0.0);
///     io.y.set(x * x)
/// })?;
/// # let _ = producer; Ok(())
/// # }
/// ```
pub struct WiredProducer<Io, F> {
    label: String,
    io: Io,
    outputs: Vec<ResourceName>,
    run: F,
}

impl<Io, F> WiredProducer<Io, F>
where
    Io: IoRecord,
    F: Fn(&Io, &Registry) -> Result<()>,
{
    /// Wire an IO record to a compute closure.
    ///
    /// Fails if the record marks no outputs or marks the same name twice.
    pub fn new(label: impl Into<String>, io: Io, run: F) -> Result<Self> {
        let label = label.into();
        let outputs = io.outputs();
        validate_outputs(&label, &outputs)?;
        Ok(Self {
            label,
            io,
            outputs,
            run,
        })
    }

    /// The wired IO record.
    pub fn io(&self) -> &Io {
        &self.io
    }
}

impl<Io, F> Producer for WiredProducer<Io, F>
where
    Io: IoRecord,
    F: Fn(&Io, &Registry) -> Result<()>,
{
    fn outputs(&self) -> &[ResourceName] {
        &self.outputs
    }

    fn compute(&self, registry: &Registry) -> Result<()> {
        (self.run)(&self.io, registry)
    }

    fn label(&self) -> &str {
        &self.label
    }
}
