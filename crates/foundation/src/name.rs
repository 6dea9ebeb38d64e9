//! Resource naming.
//!
//! Every resource in a registry is keyed by a dot-separated [`ResourceName`]
//! built as `"<scope>.<module>.<attr>"`, or `"<module>.<attr>"` when the
//! scope is empty. User code does not assemble these strings by hand; modules
//! qualify attribute names through their [`Namespace`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// A fully-qualified, dot-separated resource name.
///
/// Names are the sole universal key across a registry. They are immutable
/// and support efficient comparison and hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceName(String);

impl ResourceName {
    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The dot-separated segments of the name.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// The last segment (the attribute part).
    pub fn attr(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ResourceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<&str> for ResourceName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A namespace prefix for a group of related resources.
///
/// Modules own one namespace each; the root is the (possibly empty) scope,
/// and the module name is appended as a child segment.
///
/// # Examples
///
/// ```
/// # use weft_foundation::Namespace;
/// let ns = Namespace::root("left").child("Mesh");
/// assert_eq!(ns.prefix(), "left.Mesh");
/// assert_eq!(ns.qualify("V_pos"), "left.Mesh.V_pos");
///
/// let unscoped = Namespace::root("").child("Mesh");
/// assert_eq!(unscoped.qualify("V_pos"), "Mesh.V_pos");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    parts: Vec<String>,
}

impl Namespace {
    /// Root namespace for a scope. An empty scope yields an empty root.
    pub fn root(scope: &str) -> Self {
        if scope.is_empty() {
            Self::default()
        } else {
            Self {
                parts: vec![scope.to_string()],
            }
        }
    }

    /// Append a segment, producing a child namespace.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut parts = self.parts.clone();
        parts.push(name.into());
        Self { parts }
    }

    /// The namespace segments.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// The dot-joined prefix.
    pub fn prefix(&self) -> String {
        self.parts.join(".")
    }

    /// Qualify an attribute into a full resource name.
    pub fn qualify(&self, attr: &str) -> ResourceName {
        if self.parts.is_empty() {
            ResourceName::from(attr)
        } else {
            ResourceName::from(format!("{}.{attr}", self.prefix()))
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}
