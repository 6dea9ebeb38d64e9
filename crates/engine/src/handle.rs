//! Typed resource handles.
//!
//! A [`ResourceRef`] is the public read/write surface of the engine: a
//! non-owning handle `(registry, key)` that resolves by name on every
//! operation. Refs are cheap to clone, compare by name, and never expose
//! name strings to user code.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use weft_foundation::{Buffer, Payload, ResourceName};

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::spec::ResourceSpec;

/// Immutable `(name, spec)` pair identifying a resource.
///
/// The phantom type parameter carries the expected payload type to call
/// sites; it has no runtime representation.
pub struct ResourceKey<T> {
    name: ResourceName,
    spec: Option<ResourceSpec>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> ResourceKey<T> {
    /// New key for a fully-qualified name.
    pub fn new(name: ResourceName, spec: Option<ResourceSpec>) -> Self {
        Self {
            name,
            spec,
            _payload: PhantomData,
        }
    }

    /// The full resource name.
    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    /// The declared contract, if any.
    pub fn spec(&self) -> Option<&ResourceSpec> {
        self.spec.as_ref()
    }
}

impl<T> Clone for ResourceKey<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            spec: self.spec.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ResourceKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceKey")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Typed handle to one resource in a registry.
///
/// All operations delegate to the registry, which is where invariants are
/// enforced. Mutations validate against the resource's spec unless the
/// `_unchecked` variant is used.
pub struct ResourceRef<T: Payload> {
    registry: Rc<Registry>,
    key: ResourceKey<T>,
    doc: String,
}

impl<T: Payload> ResourceRef<T> {
    /// New handle bound to a registry.
    pub fn new(registry: Rc<Registry>, key: ResourceKey<T>, doc: impl Into<String>) -> Self {
        Self {
            registry,
            key,
            doc: doc.into(),
        }
    }

    /// The full resource name.
    pub fn name(&self) -> &ResourceName {
        self.key.name()
    }

    /// The contract carried by this handle's key.
    pub fn spec(&self) -> Option<&ResourceSpec> {
        self.key.spec()
    }

    /// Documentation attached at creation.
    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// The registry this handle resolves against.
    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    /// Make this resource fresh, running stale producers as needed.
    pub fn ensure(&self) -> Result<()> {
        self.registry.ensure(self.name())
    }

    /// Ensure freshness, then return the current payload.
    ///
    /// Fails if the resource cannot be made fresh, holds no buffer, or holds
    /// a buffer of a different payload family.
    pub fn get(&self) -> Result<T> {
        match self.read(true)? {
            Some(value) => Ok(value),
            None => Err(Error::Validation {
                name: self.name().clone(),
                reason: "resource holds no buffer".to_string(),
            }),
        }
    }

    /// Return the current payload without ensuring; `None` if null.
    ///
    /// May observe stale state. Producers read their inputs this way, since
    /// the registry has already ensured them.
    pub fn peek(&self) -> Result<Option<T>> {
        self.read(false)
    }

    fn read(&self, ensure: bool) -> Result<Option<T>> {
        let Some(buffer) = self.registry.read(self.name(), ensure)? else {
            return Ok(None);
        };
        match T::from_buffer(&buffer) {
            Some(value) => Ok(Some(value)),
            None => Err(Error::Validation {
                name: self.name().clone(),
                reason: format!(
                    "stored {} buffer does not match the requested payload type",
                    buffer.kind()
                ),
            }),
        }
    }

    /// Validate, replace the buffer, bump the version and record a fresh
    /// dependency signature. The atomic "set_buffer then commit".
    pub fn set(&self, value: T) -> Result<()> {
        self.registry.set(self.name(), value.into_buffer())
    }

    /// [`set`](Self::set) without spec validation. The caller vouches for
    /// the buffer.
    pub fn set_unchecked(&self, value: T) -> Result<()> {
        self.registry.set_unchecked(self.name(), value.into_buffer())
    }

    /// Validate and replace the buffer. With `bump = false` the version and
    /// dependency signature stay untouched (allocate-before-fill); with
    /// `bump = true` this behaves like [`set`](Self::set).
    pub fn set_buffer(&self, value: T, bump: bool) -> Result<()> {
        self.registry
            .set_buffer(self.name(), value.into_buffer(), bump)
    }

    /// [`set_buffer`](Self::set_buffer) without spec validation.
    pub fn set_buffer_unchecked(&self, value: T, bump: bool) -> Result<()> {
        self.registry
            .set_buffer_unchecked(self.name(), value.into_buffer(), bump)
    }

    /// Mark the current buffer fresh with respect to current dependency
    /// versions. Bumps the version; the buffer is unchanged.
    pub fn commit(&self) -> Result<()> {
        self.registry.commit(self.name())
    }

    /// Alias of [`commit`](Self::commit).
    pub fn mark_fresh(&self) -> Result<()> {
        self.commit()
    }

    /// Alias of [`commit`](Self::commit).
    pub fn touch(&self) -> Result<()> {
        self.commit()
    }

    /// [`commit`](Self::commit) without validating the current buffer.
    pub fn commit_unchecked(&self) -> Result<()> {
        self.registry.commit_unchecked(self.name())
    }

    /// Bump the version without refreshing the dependency signature.
    ///
    /// Signals "this output is updated" for downstream freshness propagation
    /// while keeping the recorded upstream baseline.
    pub fn bump(&self) -> Result<()> {
        self.registry.bump(self.name())
    }

    /// [`bump`](Self::bump) without validating the current buffer.
    pub fn bump_unchecked(&self) -> Result<()> {
        self.registry.bump_unchecked(self.name())
    }

    /// Mutate the current buffer in place. No validation, no version
    /// change; follow with [`commit`](Self::commit) or
    /// [`bump`](Self::bump) once the buffer is filled.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Buffer) -> R) -> Result<R> {
        self.registry.mutate(self.name(), f)
    }

    /// Current version of the underlying resource.
    pub fn version(&self) -> Result<u64> {
        self.registry.version(self.name())
    }
}

impl<T: Payload> Clone for ResourceRef<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
            key: self.key.clone(),
            doc: self.doc.clone(),
        }
    }
}

impl<T: Payload> PartialEq for ResourceRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl<T: Payload> Eq for ResourceRef<T> {}

impl<T: Payload> fmt::Debug for ResourceRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRef")
            .field("name", self.name())
            .finish_non_exhaustive()
    }
}

/// Erase a typed ref (or name) into a dependency name.
///
/// Lets heterogeneous dep lists be written against refs, so module code
/// never spells out name strings.
pub trait AsDep {
    /// The dependency's fully-qualified name.
    fn dep_name(&self) -> ResourceName;
}

impl<T: Payload> AsDep for ResourceRef<T> {
    fn dep_name(&self) -> ResourceName {
        self.name().clone()
    }
}

impl<T: AsDep + ?Sized> AsDep for &T {
    fn dep_name(&self) -> ResourceName {
        T::dep_name(*self)
    }
}

impl AsDep for ResourceName {
    fn dep_name(&self) -> ResourceName {
        self.clone()
    }
}

impl AsDep for str {
    fn dep_name(&self) -> ResourceName {
        ResourceName::from(self)
    }
}

impl AsDep for String {
    fn dep_name(&self) -> ResourceName {
        ResourceName::from(self.as_str())
    }
}
