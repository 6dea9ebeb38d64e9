//! weft-engine: a lazy, versioned resource/producer dataflow graph.
//!
//! The engine is a name-keyed [`Registry`] of versioned resources, each
//! optionally owned by a [`Producer`] with a fixed output set. Reading a
//! resource through its typed [`ResourceRef`] handle triggers a recursive
//! [`ensure`](Registry::ensure): dependencies are made fresh first, stale
//! producers run exactly once per pass, and commits are enforced. Freshness
//! is tracked with per-resource versions and dependency-version signatures,
//! so a change to any upstream input lazily invalidates everything computed
//! from it.
//!
//! [`Module`]s group related resources under scoped namespace prefixes and
//! are memoized per [`World`], which makes composite graphs (a mesh module
//! required by a solver module required by an app) cheap to assemble and
//! impossible to double-declare.
//!
//! # Example
//!
//! ```
//! use weft_engine::{IoRecord, Module, ModuleCtx, Result, ResourceRef, WiredProducer, World};
//! use weft_foundation::ResourceName;
//!
//! struct SquareIo {
//!     x: ResourceRef<f64>,
//!     y: ResourceRef<f64>,
//! }
//!
//! impl IoRecord for SquareIo {
//!     fn outputs(&self) -> Vec<ResourceName> {
//!         vec![self.y.name().clone()]
//!     }
//! }
//!
//! struct Squares {
//!     x: ResourceRef<f64>,
//!     y: ResourceRef<f64>,
//! }
//!
//! impl Module for Squares {
//!     const NAME: &'static str = "Squares";
//!
//!     fn construct(ctx: &mut ModuleCtx<'_>) -> Result<Self> {
//!         let x = ctx.input("x", None, "Input scalar")?;
//!         let y = ctx.reserve("y", None, "x squared");
//!
//!         let io = SquareIo { x: x.clone(), y: y.clone() };
//!         let producer = ctx.add_producer(WiredProducer::new("square", io, |io, _| {
//!             let x = io.x.peek()?.unwrap_or(0.0);
//!             io.y.set(x * x)
//!         })?)?;
//!         ctx.declare(&y).dep(&x).producer(producer).finish()?;
//!
//!         Ok(Self { x, y })
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let world = World::new();
//! let squares = world.require::<Squares>()?;
//! squares.x.set(6.0)?;
//! assert_eq!(squares.y.get()?, 36.0);
//! # Ok(())
//! # }
//! ```

pub mod error;
mod explain;
pub mod handle;
pub mod module;
pub mod producer;
pub mod registry;
pub mod resource;
pub mod spec;

pub use error::{Error, Result};
pub use handle::{AsDep, ResourceKey, ResourceRef};
pub use module::{Module, ModuleCtx, World};
pub use producer::{IoRecord, Producer, ProducerId, WiredProducer};
pub use registry::{DeclareBuilder, Registry};
pub use resource::{DepSig, Resource};
pub use spec::{shape_of, ResourceSpec, ShapeFn};

// Re-export the vocabulary so downstream crates can depend on the engine
// alone.
pub use weft_foundation::{
    Array, Buffer, Dtype, FieldDesc, Namespace, Payload, ResourceKind, ResourceName, Value,
};
