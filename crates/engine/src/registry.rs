//! The name-keyed resource registry and the lazy `ensure` algorithm.
//!
//! The registry is the single owner of all [`Resource`] records and the
//! single place invariants are enforced: declaration uniqueness, spec
//! validation, dependency-signature freshness, producer commit enforcement
//! and cycle detection. It is shared behind `Rc` and uses interior
//! mutability; the engine is single-threaded by design, and every public
//! operation takes `&self` so producers can write back through the same
//! handle they were handed.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, instrument, trace};

use weft_foundation::{Buffer, ResourceName};

use crate::error::{Error, Result};
use crate::handle::AsDep;
use crate::producer::{validate_outputs, Producer, ProducerId};
use crate::resource::{DepSig, Resource};
use crate::spec::ResourceSpec;

/// Per-pass bookkeeping for `ensure`.
///
/// `ensured` memoizes names already made fresh; `ran` guarantees each
/// producer executes at most once per top-level ensure, even when its
/// outputs are interconnected by downstream consumers.
#[derive(Default)]
struct EnsureCtx {
    ensured: HashSet<ResourceName>,
    ran: HashSet<ProducerId>,
}

/// Name-keyed store of all resources; executor of the lazy DAG.
pub struct Registry {
    resources: RefCell<IndexMap<ResourceName, Resource>>,
    producers: RefCell<Vec<Rc<dyn Producer>>>,
    /// Names currently on the depth-first ensure stack. Kept on the registry
    /// so reentrant `ensure` from inside a producer is caught as a cycle.
    visiting: RefCell<Vec<ResourceName>>,
}

impl Registry {
    /// New empty registry.
    pub fn new() -> Self {
        Self {
            resources: RefCell::new(IndexMap::new()),
            producers: RefCell::new(Vec::new()),
            visiting: RefCell::new(Vec::new()),
        }
    }

    // ---- declaration ----

    /// Start declaring a resource. Finish with [`DeclareBuilder::finish`].
    ///
    /// Dependencies may reference names that do not exist yet (construction
    /// order is unconstrained); an unresolved dependency becomes fatal at
    /// `ensure` time.
    pub fn declare(&self, name: impl Into<ResourceName>) -> DeclareBuilder<'_> {
        DeclareBuilder {
            registry: self,
            name: name.into(),
            buffer: None,
            deps: Vec::new(),
            producer: None,
            description: String::new(),
            spec: None,
        }
    }

    fn declare_impl(
        &self,
        name: ResourceName,
        buffer: Option<Buffer>,
        deps: Vec<ResourceName>,
        producer: Option<ProducerId>,
        description: String,
        spec: Option<ResourceSpec>,
    ) -> Result<()> {
        if self.resources.borrow().contains_key(&name) {
            return Err(Error::DuplicateDeclaration { name });
        }

        if let Some(id) = producer {
            let label = {
                let producers = self.producers.borrow();
                let p = producers
                    .get(id.0)
                    .ok_or(Error::UnknownProducer { id })?;
                if !p.outputs().contains(&name) {
                    Some(p.label().to_string())
                } else {
                    None
                }
            };
            if let Some(producer) = label {
                return Err(Error::ProducerOutputNotOwned { producer, name });
            }
        }

        // Declaration is not a commit: the buffer is stored at version 0,
        // but it still has to honor the contract.
        if let (Some(buf), Some(spec)) = (&buffer, &spec) {
            spec.validate(&name, Some(buf), self)?;
        }

        debug!(name = %name, deps = deps.len(), produced = producer.is_some(), "resource declared");
        self.resources.borrow_mut().insert(
            name.clone(),
            Resource {
                name,
                buffer,
                deps,
                producer,
                version: 0,
                dep_sig: Vec::new(),
                description,
                spec,
            },
        );
        Ok(())
    }

    /// Register a producer, returning the id resources bind to.
    ///
    /// Fails if the producer declares an empty or duplicated output set.
    pub fn add_producer(&self, producer: impl Producer + 'static) -> Result<ProducerId> {
        validate_outputs(producer.label(), producer.outputs())?;
        let mut table = self.producers.borrow_mut();
        let id = ProducerId(table.len());
        debug!(producer = producer.label(), outputs = producer.outputs().len(), "producer registered");
        table.push(Rc::new(producer));
        Ok(id)
    }

    // ---- introspection ----

    /// True if the name is declared.
    pub fn contains(&self, name: &ResourceName) -> bool {
        self.resources.borrow().contains_key(name)
    }

    /// All declared names, in declaration order.
    pub fn names(&self) -> Vec<ResourceName> {
        self.resources.borrow().keys().cloned().collect()
    }

    /// Snapshot of one resource record.
    pub fn resource(&self, name: &ResourceName) -> Result<Resource> {
        let resources = self.resources.borrow();
        resources
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownResource { name: name.clone() })
    }

    /// Current version of a resource. Zero means never committed.
    pub fn version(&self, name: &ResourceName) -> Result<u64> {
        let resources = self.resources.borrow();
        resources
            .get(name)
            .map(|r| r.version)
            .ok_or_else(|| Error::UnknownResource { name: name.clone() })
    }

    /// Description a resource was declared with.
    pub fn description(&self, name: &ResourceName) -> Result<String> {
        let resources = self.resources.borrow();
        resources
            .get(name)
            .map(|r| r.description.clone())
            .ok_or_else(|| Error::UnknownResource { name: name.clone() })
    }

    pub(crate) fn producer_label(&self, id: ProducerId) -> String {
        self.producers
            .borrow()
            .get(id.0)
            .map(|p| p.label().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    // ---- reads ----

    /// Current buffer of a resource, optionally ensuring it first.
    pub fn read(&self, name: &ResourceName, ensure: bool) -> Result<Option<Buffer>> {
        if ensure {
            self.ensure(name)?;
        }
        let resources = self.resources.borrow();
        let r = resources
            .get(name)
            .ok_or_else(|| Error::UnknownResource { name: name.clone() })?;
        Ok(r.buffer.clone())
    }

    // ---- writes ----

    /// Validate, replace the buffer, bump the version and record a fresh
    /// dependency signature.
    pub fn set(&self, name: &ResourceName, buffer: Buffer) -> Result<()> {
        self.write(name, buffer, true, true)
    }

    /// [`set`](Self::set) without spec validation.
    pub fn set_unchecked(&self, name: &ResourceName, buffer: Buffer) -> Result<()> {
        self.write(name, buffer, true, false)
    }

    /// Validate and replace the buffer; bump and re-sign only if `bump`.
    ///
    /// `bump = false` is the allocate-before-fill path: attach a fresh
    /// buffer, fill it, then [`commit`](Self::commit).
    pub fn set_buffer(&self, name: &ResourceName, buffer: Buffer, bump: bool) -> Result<()> {
        self.write(name, buffer, bump, true)
    }

    /// [`set_buffer`](Self::set_buffer) without spec validation.
    pub fn set_buffer_unchecked(
        &self,
        name: &ResourceName,
        buffer: Buffer,
        bump: bool,
    ) -> Result<()> {
        self.write(name, buffer, bump, false)
    }

    fn write(&self, name: &ResourceName, buffer: Buffer, commit: bool, validate: bool) -> Result<()> {
        if validate {
            let spec = self.spec_of(name)?;
            if let Some(spec) = spec {
                spec.validate(name, Some(&buffer), self)?;
            }
        } else {
            // Still reject unknown names before storing.
            let _ = self.version(name)?;
        }

        {
            let mut resources = self.resources.borrow_mut();
            if let Some(r) = resources.get_mut(name) {
                r.buffer = Some(buffer);
            }
        }

        if commit {
            // The buffer was validated just above; do not validate twice.
            self.commit_impl(name, false)?;
        }
        Ok(())
    }

    /// Mark a resource fresh relative to current dependency versions.
    ///
    /// Validates the current buffer, bumps the version by one and records
    /// the dependency signature. The buffer is unchanged. Allowed for any
    /// resource, produced or not: nothing is read-only here.
    pub fn commit(&self, name: &ResourceName) -> Result<()> {
        self.commit_impl(name, true)
    }

    /// [`commit`](Self::commit) without validating the current buffer.
    pub fn commit_unchecked(&self, name: &ResourceName) -> Result<()> {
        self.commit_impl(name, false)
    }

    fn commit_impl(&self, name: &ResourceName, validate: bool) -> Result<()> {
        if validate {
            self.validate_current(name)?;
        }
        let sig = self.current_dep_sig(name)?;
        let mut resources = self.resources.borrow_mut();
        let r = resources
            .get_mut(name)
            .ok_or_else(|| Error::UnknownResource { name: name.clone() })?;
        r.version += 1;
        r.dep_sig = sig;
        trace!(name = %name, version = r.version, "committed");
        Ok(())
    }

    /// Bump the version **without** refreshing the dependency signature.
    ///
    /// This signals "the output is updated; propagate downstream" while
    /// keeping the recorded upstream baseline. A resource bumped against a
    /// stale baseline stays stale itself and will be recomputed on the next
    /// ensure pass.
    pub fn bump(&self, name: &ResourceName) -> Result<()> {
        self.bump_impl(name, true)
    }

    /// [`bump`](Self::bump) without validating the current buffer.
    pub fn bump_unchecked(&self, name: &ResourceName) -> Result<()> {
        self.bump_impl(name, false)
    }

    fn bump_impl(&self, name: &ResourceName, validate: bool) -> Result<()> {
        if validate {
            self.validate_current(name)?;
        }
        let mut resources = self.resources.borrow_mut();
        let r = resources
            .get_mut(name)
            .ok_or_else(|| Error::UnknownResource { name: name.clone() })?;
        r.version += 1;
        trace!(name = %name, version = r.version, "bumped");
        Ok(())
    }

    /// Commit a set of resources as one unit, buffers unchanged.
    ///
    /// All-or-nothing with respect to validation: if any buffer fails its
    /// contract, no version is bumped. Signatures are recorded after every
    /// version bump, so interdependent members see each other's new
    /// versions.
    pub fn commit_many(&self, names: &[ResourceName]) -> Result<()> {
        for name in names {
            self.validate_current(name)?;
        }
        self.bump_and_sign(names)
    }

    /// Commit a set of resources with replacement buffers, as one unit.
    ///
    /// Buffers are stored first so shape functions of later members can see
    /// earlier members' new data, then validated together; on any failure
    /// the previous buffers are restored and no version is bumped.
    pub fn commit_many_with(&self, entries: Vec<(ResourceName, Buffer)>) -> Result<()> {
        let mut saved: Vec<(ResourceName, Option<Buffer>)> = Vec::with_capacity(entries.len());
        let names: Vec<ResourceName> = entries.iter().map(|(n, _)| n.clone()).collect();

        for (name, buffer) in entries {
            let replaced = {
                let mut resources = self.resources.borrow_mut();
                match resources.get_mut(&name) {
                    Some(r) => Ok(r.buffer.replace(buffer)),
                    None => Err(Error::UnknownResource { name: name.clone() }),
                }
            };
            match replaced {
                Ok(old) => saved.push((name, old)),
                Err(err) => {
                    self.restore_buffers(saved);
                    return Err(err);
                }
            }
        }

        for name in &names {
            if let Err(err) = self.validate_current(name) {
                self.restore_buffers(saved);
                return Err(err);
            }
        }

        if let Err(err) = self.bump_and_sign(&names) {
            self.restore_buffers(saved);
            return Err(err);
        }
        Ok(())
    }

    fn restore_buffers(&self, saved: Vec<(ResourceName, Option<Buffer>)>) {
        let mut resources = self.resources.borrow_mut();
        for (name, buffer) in saved {
            if let Some(r) = resources.get_mut(&name) {
                r.buffer = buffer;
            }
        }
    }

    fn bump_and_sign(&self, names: &[ResourceName]) -> Result<()> {
        // Every dependency must resolve before any version moves.
        for name in names {
            let deps = self.deps_of(name)?;
            for dep in &deps {
                let _ = self.version(dep)?;
            }
        }

        {
            let mut resources = self.resources.borrow_mut();
            for name in names {
                if let Some(r) = resources.get_mut(name) {
                    r.version += 1;
                }
            }
        }
        for name in names {
            let sig = self.current_dep_sig(name)?;
            let mut resources = self.resources.borrow_mut();
            if let Some(r) = resources.get_mut(name) {
                r.dep_sig = sig;
                trace!(name = %name, version = r.version, "committed");
            }
        }
        Ok(())
    }

    /// Mutate the current buffer in place.
    ///
    /// No validation and no version change; follow with
    /// [`commit`](Self::commit) or [`bump`](Self::bump). The buffer is
    /// detached from the registry while the closure runs, so reads of the
    /// same resource from inside it observe null.
    pub fn mutate<R>(&self, name: &ResourceName, f: impl FnOnce(&mut Buffer) -> R) -> Result<R> {
        let mut buffer = {
            let mut resources = self.resources.borrow_mut();
            let r = resources
                .get_mut(name)
                .ok_or_else(|| Error::UnknownResource { name: name.clone() })?;
            r.buffer.take().ok_or_else(|| Error::Validation {
                name: name.clone(),
                reason: "resource holds no buffer to mutate".to_string(),
            })?
        };
        let out = f(&mut buffer);
        let mut resources = self.resources.borrow_mut();
        if let Some(r) = resources.get_mut(name) {
            r.buffer = Some(buffer);
        }
        Ok(out)
    }

    // ---- validation helpers ----

    fn spec_of(&self, name: &ResourceName) -> Result<Option<ResourceSpec>> {
        let resources = self.resources.borrow();
        let r = resources
            .get(name)
            .ok_or_else(|| Error::UnknownResource { name: name.clone() })?;
        Ok(r.spec.clone())
    }

    fn deps_of(&self, name: &ResourceName) -> Result<Vec<ResourceName>> {
        let resources = self.resources.borrow();
        let r = resources
            .get(name)
            .ok_or_else(|| Error::UnknownResource { name: name.clone() })?;
        Ok(r.deps.clone())
    }

    /// Validate a resource's current buffer against its spec, if any.
    fn validate_current(&self, name: &ResourceName) -> Result<()> {
        let (spec, buffer) = {
            let resources = self.resources.borrow();
            let r = resources
                .get(name)
                .ok_or_else(|| Error::UnknownResource { name: name.clone() })?;
            (r.spec.clone(), r.buffer.clone())
        };
        if let Some(spec) = spec {
            spec.validate(name, buffer.as_ref(), self)?;
        }
        Ok(())
    }

    // ---- freshness ----

    fn current_dep_sig(&self, name: &ResourceName) -> Result<DepSig> {
        let resources = self.resources.borrow();
        let r = resources
            .get(name)
            .ok_or_else(|| Error::UnknownResource { name: name.clone() })?;
        r.deps
            .iter()
            .map(|dep| {
                resources
                    .get(dep)
                    .map(|d| (dep.clone(), d.version))
                    .ok_or_else(|| Error::UnknownResource { name: dep.clone() })
            })
            .collect()
    }

    /// Stale means: never committed, or some dependency's current version
    /// differs from the one recorded at last commit.
    pub(crate) fn is_stale(&self, name: &ResourceName) -> Result<bool> {
        {
            let resources = self.resources.borrow();
            let r = resources
                .get(name)
                .ok_or_else(|| Error::UnknownResource { name: name.clone() })?;
            if r.version == 0 {
                return Ok(true);
            }
        }
        let current = self.current_dep_sig(name)?;
        let resources = self.resources.borrow();
        let r = resources
            .get(name)
            .ok_or_else(|| Error::UnknownResource { name: name.clone() })?;
        Ok(r.dep_sig != current)
    }

    // ---- ensure ----

    /// Make a resource fresh, recursively ensuring dependencies and running
    /// stale producers. Each producer runs at most once per call.
    #[instrument(skip_all, fields(name = %name), level = "trace")]
    pub fn ensure(&self, name: &ResourceName) -> Result<()> {
        let mut ctx = EnsureCtx::default();
        self.ensure_with(name, &mut ctx)
    }

    /// Ensure several resources in order, sharing one pass's bookkeeping so
    /// producers still run at most once across the whole set.
    pub fn ensure_many<'a>(&self, names: impl IntoIterator<Item = &'a ResourceName>) -> Result<()> {
        let mut ctx = EnsureCtx::default();
        for name in names {
            self.ensure_with(name, &mut ctx)?;
        }
        Ok(())
    }

    fn ensure_with(&self, name: &ResourceName, ctx: &mut EnsureCtx) -> Result<()> {
        if ctx.ensured.contains(name) {
            return Ok(());
        }

        {
            let visiting = self.visiting.borrow();
            if visiting.contains(name) {
                let mut path = visiting.clone();
                path.push(name.clone());
                return Err(Error::ResourceCycle { path });
            }
        }

        let (deps, producer) = {
            let resources = self.resources.borrow();
            let r = resources
                .get(name)
                .ok_or_else(|| Error::UnknownResource { name: name.clone() })?;
            (r.deps.clone(), r.producer)
        };

        self.visiting.borrow_mut().push(name.clone());
        let result = self.ensure_visit(name, &deps, producer, ctx);
        self.visiting.borrow_mut().pop();

        if result.is_ok() {
            ctx.ensured.insert(name.clone());
        }
        result
    }

    fn ensure_visit(
        &self,
        name: &ResourceName,
        deps: &[ResourceName],
        producer: Option<ProducerId>,
        ctx: &mut EnsureCtx,
    ) -> Result<()> {
        for dep in deps {
            self.ensure_with(dep, ctx)?;
        }

        if !self.is_stale(name)? {
            return Ok(());
        }

        let Some(id) = producer else {
            if self.version(name)? == 0 {
                return Err(Error::UninitializedInput { name: name.clone() });
            }
            // A stale user-set input has no way to refresh itself; whatever
            // the user last committed stands.
            return Ok(());
        };

        if ctx.ran.contains(&id) {
            // The producer already ran this pass but this output is still
            // stale: it committed only a subset of what it claims to own.
            return Err(Error::ProducerDidNotCommit {
                producer: self.producer_label(id),
                outputs: vec![name.clone()],
            });
        }

        let producer = {
            let producers = self.producers.borrow();
            producers
                .get(id.0)
                .cloned()
                .ok_or(Error::UnknownProducer { id })?
        };

        // The union of deps across all outputs must be fresh before the
        // single compute call (fused multi-output producers).
        let outputs: Vec<ResourceName> = producer.outputs().to_vec();
        for output in &outputs {
            let output_deps = self.deps_of(output)?;
            for dep in &output_deps {
                self.ensure_with(dep, ctx)?;
            }
        }

        let before: Vec<(ResourceName, u64)> = outputs
            .iter()
            .map(|output| self.version(output).map(|v| (output.clone(), v)))
            .collect::<Result<_>>()?;

        trace!(producer = producer.label(), target = %name, "running producer");
        producer.compute(self)?;

        let mut delinquent = Vec::new();
        for (output, version_before) in &before {
            if self.version(output)? <= *version_before {
                delinquent.push(output.clone());
            }
        }
        if !delinquent.is_empty() {
            return Err(Error::ProducerDidNotCommit {
                producer: producer.label().to_string(),
                outputs: delinquent,
            });
        }

        ctx.ran.insert(id);
        Ok(())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// In-progress declaration; see [`Registry::declare`].
pub struct DeclareBuilder<'r> {
    registry: &'r Registry,
    name: ResourceName,
    buffer: Option<Buffer>,
    deps: Vec<ResourceName>,
    producer: Option<ProducerId>,
    description: String,
    spec: Option<ResourceSpec>,
}

impl DeclareBuilder<'_> {
    /// Initial buffer. Stored at version 0: declaration is not a commit.
    pub fn buffer(mut self, buffer: impl Into<Buffer>) -> Self {
        self.buffer = Some(buffer.into());
        self
    }

    /// Add one dependency. Accepts refs and names alike.
    pub fn dep(mut self, dep: impl AsDep) -> Self {
        self.deps.push(dep.dep_name());
        self
    }

    /// Add several dependencies.
    pub fn deps<I>(mut self, deps: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsDep,
    {
        self.deps.extend(deps.into_iter().map(|d| d.dep_name()));
        self
    }

    /// Bind the owning producer. It must list this name as an output.
    pub fn producer(mut self, id: ProducerId) -> Self {
        self.producer = Some(id);
        self
    }

    /// Human-readable description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Runtime contract for the buffer.
    pub fn spec(mut self, spec: ResourceSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    /// Store the resource in the registry.
    pub fn finish(self) -> Result<()> {
        self.registry.declare_impl(
            self.name,
            self.buffer,
            self.deps,
            self.producer,
            self.description,
            self.spec,
        )
    }
}
