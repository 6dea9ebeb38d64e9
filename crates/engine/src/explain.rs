//! Human-readable dependency explanations.
//!
//! `explain` walks the dependency tree under a resource and reports, per
//! line: name, current version, the owning producer (if any), a stale tag
//! and the dependency-signature entry that triggers the staleness. Purely a
//! debugging aid; the text is not a stable API.

use std::collections::HashSet;
use std::fmt::Write;

use weft_foundation::ResourceName;

use crate::error::{Error, Result};
use crate::registry::Registry;

impl Registry {
    /// Render the dependency tree under `name`, `depth` levels deep.
    ///
    /// Never mutates the registry and never runs producers.
    pub fn explain(&self, name: &ResourceName, depth: usize) -> Result<String> {
        if !self.contains(name) {
            return Err(Error::UnknownResource { name: name.clone() });
        }
        let mut out = String::new();
        let mut seen = HashSet::new();
        self.explain_rec(name, 0, depth, &mut seen, &mut out);
        Ok(out)
    }

    fn explain_rec(
        &self,
        name: &ResourceName,
        level: usize,
        depth: usize,
        seen: &mut HashSet<ResourceName>,
        out: &mut String,
    ) {
        if level > depth {
            return;
        }
        let Ok(resource) = self.resource(name) else {
            // Declared deps may reference names that never materialized.
            let _ = writeln!(out, "{}- {name} (undeclared)", "  ".repeat(level));
            return;
        };

        let producer = match resource.producer() {
            Some(id) => self.producer_label(id),
            None => "-".to_string(),
        };
        let stale = self.is_stale(name).unwrap_or(true);

        let _ = write!(
            out,
            "{}- {name} v={} producer={producer}",
            "  ".repeat(level),
            resource.version(),
        );
        if stale {
            let _ = write!(out, " STALE");
            if let Some((dep, seen_version)) = first_stale_entry(self, &resource) {
                let current = self.version(&dep).map(|v| v.to_string());
                let current = current.as_deref().unwrap_or("?");
                let _ = write!(out, " ({dep}: saw v{seen_version}, now v{current})");
            }
        }
        let _ = writeln!(out);

        if !seen.insert(name.clone()) {
            return;
        }
        for dep in resource.deps() {
            self.explain_rec(dep, level + 1, depth, seen, out);
        }
    }
}

/// The first dependency whose current version drifted from the recorded
/// signature, if the staleness has a nameable cause.
fn first_stale_entry(
    registry: &Registry,
    resource: &crate::resource::Resource,
) -> Option<(ResourceName, u64)> {
    resource
        .dep_sig()
        .iter()
        .find(|(dep, seen_version)| {
            registry
                .version(dep)
                .map(|current| current != *seen_version)
                .unwrap_or(true)
        })
        .cloned()
}
