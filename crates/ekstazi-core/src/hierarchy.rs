//! Class inheritance hierarchy with twin adjacency lists.
//!
//! Inheritance is tracked in both directions: `base -> derived` for
//! resolving the possible targets of a virtual call, and `derived -> base`
//! for walking up to supertypes. Both views are updated atomically by
//! [`TypeHierarchy::add_inheritance`], so they always describe the same
//! relation. Multiple inheritance is representable: a derived type may
//! list several bases.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::warn;

use crate::error::CoreError;
use crate::graph::{self, AdjacencyList};

const DELIM: char = ';';
const DERIVED_HEADER: &str = "Derived Hierarchy:";
const SUPER_HEADER: &str = "Super Hierarchy:";

/// Twin-view inheritance hierarchy keyed by demangled class name.
#[derive(Debug, Clone, Default)]
pub struct TypeHierarchy {
    /// `base -> {derived}` view.
    derived: AdjacencyList,
    /// `derived -> {base}` view.
    supers: AdjacencyList,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `base` is a base of `derived`, updating both views.
    pub fn add_inheritance(&mut self, base: &str, derived: &str) {
        self.derived
            .entry(base.to_owned())
            .or_default()
            .push(derived.to_owned());
        self.supers
            .entry(derived.to_owned())
            .or_default()
            .push(base.to_owned());
    }

    /// Every type transitively deriving from `base`.
    pub fn derived_of(&self, base: &str) -> HashSet<String> {
        graph::reach(base, &self.derived)
    }

    /// Every transitive base of `derived`.
    pub fn super_of(&self, derived: &str) -> HashSet<String> {
        graph::reach(derived, &self.supers)
    }

    /// Union of the derived and super reach sets.
    pub fn all_related(&self, ty: &str) -> HashSet<String> {
        let mut related = self.derived_of(ty);
        related.extend(self.super_of(ty));
        related
    }

    /// Whether `ty` appears anywhere in the derived view, as a key or a
    /// value. Linear scan; only used by tooling.
    pub fn contains(&self, ty: &str) -> bool {
        if self.derived.contains_key(ty) {
            return true;
        }
        self.derived
            .values()
            .any(|targets| targets.iter().any(|t| t == ty))
    }

    /// Sorts and uniques both views.
    pub fn dedup(&mut self) {
        for targets in self.derived.values_mut().chain(self.supers.values_mut()) {
            targets.sort_unstable();
            targets.dedup();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.derived.is_empty() && self.supers.is_empty()
    }

    /// Max inheritance depth, computed over the derived view.
    pub fn max_depth(&self) -> u32 {
        graph::max_distance(&self.derived)
    }

    /// Average inheritance depth from the leaves of the derived view.
    pub fn average_depth(&self) -> f64 {
        graph::average_distance(&self.derived)
    }

    /// Total number of types in the hierarchy.
    pub fn size(&self) -> usize {
        graph::node_count(&self.derived)
    }

    /// Number of types that derive from something.
    pub fn derived_count(&self) -> usize {
        graph::nonroot_count(&self.derived)
    }

    /// Loads a hierarchy from `path`. A missing file yields an empty
    /// hierarchy.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let mut hierarchy = TypeHierarchy::new();
        if !path.exists() {
            warn!(path = %path.display(), "no type hierarchy file, starting empty");
            return Ok(hierarchy);
        }

        enum Section {
            None,
            Derived,
            Supers,
        }
        let mut section = Section::None;

        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            if line == DERIVED_HEADER {
                section = Section::Derived;
                continue;
            }
            if line == SUPER_HEADER {
                section = Section::Supers;
                continue;
            }

            let mut fields = line.split(DELIM).filter(|f| !f.is_empty());
            let Some(key) = fields.next() else {
                continue;
            };
            let view = match section {
                Section::Derived => &mut hierarchy.derived,
                Section::Supers => &mut hierarchy.supers,
                Section::None => {
                    warn!(%line, "hierarchy line before any section header, skipping");
                    continue;
                }
            };
            let entry = view.entry(key.to_owned()).or_default();
            for value in fields {
                entry.push(value.to_owned());
            }
        }
        Ok(hierarchy)
    }

    /// Saves both views: each section header followed by `key;v1;v2;`
    /// lines with a trailing delimiter after every value.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let mut writer = BufWriter::new(File::create(path)?);

        writeln!(writer, "{DERIVED_HEADER}")?;
        for (base, derived) in &self.derived {
            write!(writer, "{base}{DELIM}")?;
            for ty in derived {
                write!(writer, "{ty}{DELIM}")?;
            }
            writeln!(writer)?;
        }

        writeln!(writer, "{SUPER_HEADER}")?;
        for (derived, bases) in &self.supers {
            write!(writer, "{derived}{DELIM}")?;
            for ty in bases {
                write!(writer, "{ty}{DELIM}")?;
            }
            writeln!(writer)?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> TypeHierarchy {
        // Base is inherited by Left and Right, both inherited by Bottom.
        let mut hierarchy = TypeHierarchy::new();
        hierarchy.add_inheritance("Base", "Left");
        hierarchy.add_inheritance("Base", "Right");
        hierarchy.add_inheritance("Left", "Bottom");
        hierarchy.add_inheritance("Right", "Bottom");
        hierarchy
    }

    #[test]
    fn derived_and_super_views_agree() {
        let hierarchy = diamond();

        let derived = hierarchy.derived_of("Base");
        assert_eq!(derived.len(), 3);
        assert!(derived.contains("Bottom"));

        let supers = hierarchy.super_of("Bottom");
        assert_eq!(supers.len(), 3);
        assert!(supers.contains("Base"));
    }

    #[test]
    fn multiple_inheritance_is_representable() {
        let hierarchy = diamond();
        let direct_bases = &hierarchy.supers["Bottom"];
        assert_eq!(direct_bases.len(), 2);
    }

    #[test]
    fn all_related_unions_both_directions() {
        let hierarchy = diamond();
        let related = hierarchy.all_related("Left");
        assert!(related.contains("Base"));
        assert!(related.contains("Bottom"));
        assert!(!related.contains("Right"));
    }

    #[test]
    fn contains_finds_keys_and_values() {
        let hierarchy = diamond();
        assert!(hierarchy.contains("Base"));
        assert!(hierarchy.contains("Bottom"));
        assert!(!hierarchy.contains("Unrelated"));
    }

    #[test]
    fn depth_metrics() {
        let hierarchy = diamond();
        assert_eq!(hierarchy.max_depth(), 2);
        assert_eq!(hierarchy.size(), 4);
        assert_eq!(hierarchy.derived_count(), 3);
    }

    #[test]
    fn save_load_roundtrips_both_views() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("types.txt");

        let mut hierarchy = diamond();
        hierarchy.dedup();
        hierarchy.save(&path).unwrap();

        let loaded = TypeHierarchy::load(&path).unwrap();
        assert_eq!(loaded.derived, hierarchy.derived);
        assert_eq!(loaded.supers, hierarchy.supers);
    }

    #[test]
    fn save_writes_trailing_delimiters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("types.txt");

        let mut hierarchy = TypeHierarchy::new();
        hierarchy.add_inheritance("Shape", "Circle");
        hierarchy.save(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let expected = "Derived Hierarchy:\nShape;Circle;\nSuper Hierarchy:\nCircle;Shape;\n";
        assert_eq!(contents, expected);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let hierarchy = TypeHierarchy::load(&dir.path().join("nope.txt")).unwrap();
        assert!(hierarchy.is_empty());
    }
}
