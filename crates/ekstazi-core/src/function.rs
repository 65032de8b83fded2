//! Function records and the set diff that seeds change propagation.
//!
//! A record is the persisted identity of one function: demangled name,
//! source filename, and a structural checksum rendered as a string. The
//! name is the exclusive key across all persisted artifacts; checksum
//! equality is what "unchanged" means.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::warn;

use crate::error::CoreError;

const DELIM: char = ';';

/// Itanium ABI tags marking complete/base/allocating constructors.
const CONSTRUCTOR_TAGS: [&str; 3] = ["C1", "C2", "C3"];

/// Persisted identity of a single function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    /// Demangled function name, e.g. `Shape::area() const`.
    pub name: String,
    /// Source filename of the defining module.
    pub filename: String,
    /// Structural checksum rendered as a decimal string.
    pub checksum: String,
}

impl FunctionRecord {
    pub fn new(name: impl Into<String>, filename: impl Into<String>, checksum: impl Into<String>) -> Self {
        FunctionRecord {
            name: name.into(),
            filename: filename.into(),
            checksum: checksum.into(),
        }
    }
}

/// Name-keyed record map; ordered so saves are deterministic.
pub type FunctionMap = BTreeMap<String, FunctionRecord>;

/// Every name present in exactly one of the two maps, plus every shared
/// name whose checksums differ. This is the raw "directly modified" set
/// before graph propagation.
pub fn modified_between(old: &FunctionMap, new: &FunctionMap) -> HashSet<String> {
    let mut modified = HashSet::new();

    for (name, old_record) in old {
        match new.get(name) {
            None => {
                modified.insert(name.clone());
            }
            Some(new_record) if new_record.checksum != old_record.checksum => {
                modified.insert(name.clone());
            }
            Some(_) => {}
        }
    }

    for name in new.keys() {
        if !old.contains_key(name) {
            modified.insert(name.clone());
        }
    }

    modified
}

/// Splits a demangled member-function name into its qualified class name
/// and its short function name.
///
/// The split point is the last `::` at or before the opening parenthesis
/// of the argument list. Free functions yield an empty class name.
pub fn split_class_name(demangled: &str) -> (&str, &str) {
    let paren = demangled.find('(').unwrap_or(demangled.len());
    let qualified = &demangled[..paren];

    match qualified.rfind("::") {
        Some(sep) => (&qualified[..sep], &qualified[sep + 2..]),
        None => ("", qualified),
    }
}

/// Whether a function is a constructor.
///
/// The mangled spelling must carry one of the Itanium constructor tags,
/// and the trailing component of the demangled class name must equal the
/// short function name, as in `ns::Widget::Widget(int)`.
pub fn is_constructor(mangled: &str, demangled: &str) -> bool {
    if !CONSTRUCTOR_TAGS.iter().any(|tag| mangled.contains(tag)) {
        return false;
    }

    let (class_name, fun_name) = split_class_name(demangled);
    let class_tail = match class_name.rfind("::") {
        Some(sep) => &class_name[sep + 2..],
        None => class_name,
    };

    !class_tail.is_empty() && class_tail == fun_name
}

/// Loads `name;filename;checksum` records. A missing file yields an empty
/// map; malformed lines are skipped.
pub fn load_records(path: &Path) -> Result<FunctionMap, CoreError> {
    let mut records = FunctionMap::new();
    if !path.exists() {
        warn!(path = %path.display(), "no function records file, starting empty");
        return Ok(records);
    }

    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        // The name never contains ';', so a simple split suffices.
        let mut fields = line.splitn(3, DELIM);
        let (Some(name), Some(filename), Some(checksum)) =
            (fields.next(), fields.next(), fields.next())
        else {
            warn!(%line, "malformed function record, skipping");
            continue;
        };
        records.insert(
            name.to_owned(),
            FunctionRecord::new(name, filename, checksum),
        );
    }
    Ok(records)
}

/// Saves records as `name;filename;checksum` lines in name order.
pub fn save_records(records: &FunctionMap, path: &Path) -> Result<(), CoreError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records.values() {
        writeln!(
            writer,
            "{}{DELIM}{}{DELIM}{}",
            record.name, record.filename, record.checksum
        )?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> FunctionMap {
        entries
            .iter()
            .map(|(name, checksum)| {
                (
                    (*name).to_owned(),
                    FunctionRecord::new(*name, "main.cc", *checksum),
                )
            })
            .collect()
    }

    #[test]
    fn identical_maps_have_no_modifications() {
        let records = map(&[("a()", "1"), ("b()", "2")]);
        assert!(modified_between(&records, &records).is_empty());
    }

    #[test]
    fn checksum_change_is_a_modification() {
        let old = map(&[("a()", "1"), ("b()", "2")]);
        let new = map(&[("a()", "1"), ("b()", "99")]);
        let modified = modified_between(&old, &new);
        assert_eq!(modified.len(), 1);
        assert!(modified.contains("b()"));
    }

    #[test]
    fn added_and_removed_names_are_modifications() {
        let old = map(&[("a()", "1"), ("gone()", "2")]);
        let new = map(&[("a()", "1"), ("fresh()", "3")]);
        let modified = modified_between(&old, &new);
        assert_eq!(modified.len(), 2);
        assert!(modified.contains("gone()"));
        assert!(modified.contains("fresh()"));
    }

    #[test]
    fn split_member_function() {
        let (class_name, fun_name) = split_class_name("ns::Widget::resize(int, int)");
        assert_eq!(class_name, "ns::Widget");
        assert_eq!(fun_name, "resize");
    }

    #[test]
    fn split_ignores_colons_inside_arguments() {
        let (class_name, fun_name) = split_class_name("Widget::set(std::string const&)");
        assert_eq!(class_name, "Widget");
        assert_eq!(fun_name, "set");
    }

    #[test]
    fn split_free_function() {
        let (class_name, fun_name) = split_class_name("helper(int)");
        assert_eq!(class_name, "");
        assert_eq!(fun_name, "helper");
    }

    #[test]
    fn split_concat_is_prefix_of_original() {
        let name = "a::b::C::method(int)";
        let (class_name, fun_name) = split_class_name(name);
        let joined = format!("{class_name}::{fun_name}");
        assert!(name.starts_with(&joined));
    }

    #[test]
    fn constructor_requires_tag_and_matching_names() {
        assert!(is_constructor("_ZN6WidgetC1Ev", "Widget::Widget()"));
        assert!(is_constructor("_ZN2ns6WidgetC2Ei", "ns::Widget::Widget(int)"));
        // Tag present but not a constructor shape.
        assert!(!is_constructor("_ZN6WidgetC1Ev", "Widget::resize()"));
        // Constructor shape but no tag.
        assert!(!is_constructor("_ZN6Widget6WidgetEv", "Widget::Widget()"));
        // Free function never qualifies.
        assert!(!is_constructor("_Z4initC1v", "init()"));
    }

    #[test]
    fn records_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("functions.txt");

        let records = map(&[("a()", "17"), ("ns::B::b()", "42")]);
        save_records(&records, &path).unwrap();

        let loaded = load_records(&path).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn malformed_record_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("functions.txt");
        std::fs::write(&path, "good();main.cc;1\nbogus-line\n").unwrap();

        let loaded = load_records(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("good()"));
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_records(&dir.path().join("nope.txt")).unwrap();
        assert!(loaded.is_empty());
    }
}
