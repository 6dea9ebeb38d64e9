//! Scoped modules and the world that owns them.
//!
//! A [`Module`] groups related resources under a stable namespace prefix and
//! declares them through typed refs, never touching name strings. A
//! [`World`] owns one registry plus a cache of module instances keyed by
//! `(scope, module type)`: requiring the same module twice in the same scope
//! returns the same instance, and mutual `require` during construction is
//! detected as a module cycle.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use weft_foundation::{Namespace, Payload, ResourceName};

use crate::error::{Error, Result};
use crate::handle::{ResourceKey, ResourceRef};
use crate::producer::{Producer, ProducerId};
use crate::registry::{DeclareBuilder, Registry};
use crate::spec::ResourceSpec;

type ModuleKey = (String, TypeId);

/// A scoped construction site for a group of resources and producers.
///
/// Implementors declare their resources inside `construct`, using the
/// [`ModuleCtx`] helpers, and keep the returned refs as fields. Modules can
/// `require` other modules; dependencies are discovered dynamically as
/// construction runs.
///
/// # Examples
///
/// ```no_run
/// # use weft_engine::{Module, ModuleCtx, ResourceRef, Result};
/// struct Springs {
///     rest_length: ResourceRef<f64>,
/// }
///
/// impl Module for Springs {
///     const NAME: &'static str = "Springs";
///
///     fn construct(ctx: &mut ModuleCtx<'_>) -> Result<Self> {
///         Ok(Self {
///             rest_length: ctx.input("rest_length", None, "Spring rest length")?,
///         })
///     }
/// }
/// ```
pub trait Module: Sized + 'static {
    /// Stable module name; becomes a namespace segment.
    const NAME: &'static str;

    /// Build the module's resource graph.
    fn construct(ctx: &mut ModuleCtx<'_>) -> Result<Self>;
}

/// Top-level container: one registry plus the module cache.
///
/// Two worlds are fully isolated; there is no process-wide state.
pub struct World {
    registry: Rc<Registry>,
    modules: RefCell<HashMap<ModuleKey, Rc<dyn Any>>>,
    /// Modules currently under construction, for cycle detection.
    building: RefCell<Vec<(ModuleKey, &'static str)>>,
}

impl World {
    /// New world with an empty registry.
    pub fn new() -> Self {
        Self {
            registry: Rc::new(Registry::new()),
            modules: RefCell::new(HashMap::new()),
            building: RefCell::new(Vec::new()),
        }
    }

    /// The registry this world owns.
    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    /// Require a module in the root scope.
    pub fn require<M: Module>(&self) -> Result<Rc<M>> {
        self.require_scoped("")
    }

    /// Require a module instance for `(scope, M)`.
    ///
    /// Returns the cached instance if one exists; otherwise constructs it,
    /// which may recursively require further modules. A repeated
    /// `(scope, M)` on the construction stack is a module cycle.
    pub fn require_scoped<M: Module>(&self, scope: &str) -> Result<Rc<M>> {
        let key: ModuleKey = (scope.to_string(), TypeId::of::<M>());

        if let Some(existing) = self.modules.borrow().get(&key) {
            let Ok(module) = Rc::clone(existing).downcast::<M>() else {
                unreachable!("module cache entry keyed by TypeId");
            };
            return Ok(module);
        }

        {
            let building = self.building.borrow();
            if building.iter().any(|(k, _)| *k == key) {
                let start = building
                    .iter()
                    .position(|(k, _)| *k == key)
                    .unwrap_or(0);
                let mut path: Vec<String> = building[start..]
                    .iter()
                    .map(|((scope, _), name)| format!("{scope}:{name}"))
                    .collect();
                path.push(format!("{scope}:{}", M::NAME));
                return Err(Error::ModuleCycle { path });
            }
        }

        debug!(module = M::NAME, scope, "constructing module");
        self.building.borrow_mut().push((key.clone(), M::NAME));
        let mut ctx = ModuleCtx {
            world: self,
            scope: scope.to_string(),
            ns: Namespace::root(scope).child(M::NAME),
        };
        let constructed = M::construct(&mut ctx);
        self.building.borrow_mut().pop();

        let module = Rc::new(constructed?);
        self.modules
            .borrow_mut()
            .insert(key, Rc::clone(&module) as Rc<dyn Any>);
        Ok(module)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Construction-time context handed to [`Module::construct`].
///
/// Carries the module's namespace and the helpers that resolve attribute
/// names to fully-qualified registry names behind typed refs.
pub struct ModuleCtx<'w> {
    world: &'w World,
    scope: String,
    ns: Namespace,
}

impl ModuleCtx<'_> {
    /// The world being populated.
    pub fn world(&self) -> &World {
        self.world
    }

    /// The world's registry.
    pub fn registry(&self) -> &Rc<Registry> {
        self.world.registry()
    }

    /// The scope this module was required under.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// This module's namespace (`scope.NAME` or `NAME`).
    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    /// Qualify an attribute into this module's namespace.
    pub fn qualify(&self, attr: &str) -> ResourceName {
        self.ns.qualify(attr)
    }

    /// Require another module in the same scope.
    pub fn require<M: Module>(&self) -> Result<Rc<M>> {
        self.world.require_scoped(&self.scope)
    }

    /// Register a producer with the registry.
    pub fn add_producer(&self, producer: impl Producer + 'static) -> Result<ProducerId> {
        self.registry().add_producer(producer)
    }

    /// Create a module-scoped ref without declaring the resource yet.
    ///
    /// Use when the wiring (deps, producer) is only known later in
    /// construction; finish with [`declare`](Self::declare).
    pub fn reserve<T: Payload>(
        &self,
        attr: &str,
        spec: Option<ResourceSpec>,
        doc: &str,
    ) -> ResourceRef<T> {
        ResourceRef::new(
            Rc::clone(self.registry()),
            ResourceKey::new(self.qualify(attr), spec),
            doc,
        )
    }

    /// Declare a purely user-set input (no deps, no producer) and return
    /// its ref.
    pub fn input<T: Payload>(
        &self,
        attr: &str,
        spec: Option<ResourceSpec>,
        doc: &str,
    ) -> Result<ResourceRef<T>> {
        let resource = self.reserve(attr, spec, doc);
        self.declare(&resource).finish()?;
        Ok(resource)
    }

    /// Start declaring a previously reserved ref, carrying over its spec
    /// and doc string. Wire deps and the producer on the returned builder.
    pub fn declare<T: Payload>(&self, resource: &ResourceRef<T>) -> DeclareBuilder<'_> {
        let mut builder = self
            .world
            .registry
            .declare(resource.name().clone())
            .description(resource.doc());
        if let Some(spec) = resource.spec() {
            builder = builder.spec(spec.clone());
        }
        builder
    }
}
