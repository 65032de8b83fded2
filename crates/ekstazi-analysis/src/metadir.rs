//! The `.ekstazi/` metadata directory.
//!
//! Every module owns a distinct set of files derived from its basename,
//! so parallel analyses of different modules only share the directory
//! itself. At the start of each run the current files are rolled to their
//! `.old` siblings; the prior `.old` generation is overwritten, shifting
//! the comparison window forward by one build.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::AnalysisError;

/// Metadata directory name, relative to the working directory.
pub const METADATA_DIRNAME: &str = ".ekstazi";
/// Invocation counter file; a value of `1` means "first run, select all".
pub const COUNT_FILENAME: &str = "count.ekstazi";
/// Suffix appended to a current file to name its previous generation.
pub const OLD_SUFFIX: &str = "old";
/// Bitcode suffix stripped from a module name to find its executable.
pub const BC_SUFFIX: &str = ".0.5.precodegen.bc";

const TYPE_HIERARCHY_FILENAME: &str = "types.txt";
const DEPGRAPH_FILENAME: &str = "depgraph.txt";
const FUNCTIONS_FILENAME: &str = "functions.txt";
const CONSTRUCTORS_FILENAME: &str = "constructors.txt";
const MODIFIED_FUNS_FILENAME: &str = "modified-functions.txt";
const MODIFIED_TESTS_FILENAME: &str = "modified-tests.txt";

/// Paths and rollover for one module's metadata files.
#[derive(Debug, Clone)]
pub struct MetaDir {
    root: PathBuf,
    module_name: String,
}

impl MetaDir {
    pub fn new(root: impl Into<PathBuf>, module_name: &str) -> Self {
        MetaDir {
            root: root.into(),
            module_name: module_name.to_owned(),
        }
    }

    /// The conventional location relative to the working directory.
    pub fn for_module(module_name: &str) -> Self {
        MetaDir::new(METADATA_DIRNAME, module_name)
    }

    pub fn ensure_exists(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    fn module_file(&self, filename: &str) -> PathBuf {
        self.root.join(format!("{}.{filename}", self.module_name))
    }

    pub fn count_path(&self) -> PathBuf {
        self.root.join(COUNT_FILENAME)
    }

    pub fn hierarchy_path(&self) -> PathBuf {
        self.module_file(TYPE_HIERARCHY_FILENAME)
    }

    pub fn depgraph_path(&self) -> PathBuf {
        self.module_file(DEPGRAPH_FILENAME)
    }

    pub fn functions_path(&self) -> PathBuf {
        self.module_file(FUNCTIONS_FILENAME)
    }

    pub fn constructors_path(&self) -> PathBuf {
        self.module_file(CONSTRUCTORS_FILENAME)
    }

    pub fn modified_functions_path(&self) -> PathBuf {
        self.module_file(MODIFIED_FUNS_FILENAME)
    }

    pub fn modified_tests_path(&self) -> PathBuf {
        self.module_file(MODIFIED_TESTS_FILENAME)
    }

    /// The `.old` sibling of a metadata file.
    pub fn old_sibling(path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(".");
        name.push(OLD_SUFFIX);
        PathBuf::from(name)
    }

    /// Rolls a current file over to its `.old` sibling, overwriting the
    /// previous generation. Returns the sibling path when a current file
    /// existed.
    pub fn rotate(path: &Path) -> io::Result<Option<PathBuf>> {
        if !path.exists() {
            return Ok(None);
        }
        let old_path = Self::old_sibling(path);
        info!(from = %path.display(), to = %old_path.display(), "rotating metadata file");
        fs::rename(path, &old_path)?;
        Ok(Some(old_path))
    }

    /// Reads the invocation counter, if present and well-formed.
    pub fn read_count(&self) -> Option<u32> {
        let contents = fs::read_to_string(self.count_path()).ok()?;
        match contents.trim().parse() {
            Ok(count) => Some(count),
            Err(_) => {
                warn!(contents = contents.trim(), "corrupt invocation counter");
                None
            }
        }
    }

    /// Increments the invocation counter, creating it at `1`.
    pub fn bump_count(&self) -> Result<u32, AnalysisError> {
        let count = self.read_count().map_or(1, |count| count + 1);
        fs::write(self.count_path(), format!("{count}\n"))?;
        Ok(count)
    }

    /// The filter string consumed by the test driver.
    ///
    /// The first run selects everything; afterwards the lines of the
    /// modified-tests file are joined with `:`, each stripped of its
    /// leading namespace.
    pub fn driver_filter(&self) -> Result<String, AnalysisError> {
        if self.read_count() == Some(1) {
            return Ok("*".to_owned());
        }

        let path = self.modified_tests_path();
        if !path.exists() {
            warn!(path = %path.display(), "no modified-tests file");
            return Ok(String::new());
        }

        let contents = fs::read_to_string(&path)?;
        let filter = contents
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| match line.rfind("::") {
                Some(pos) => &line[pos + 2..],
                None => line,
            })
            .collect::<Vec<_>>()
            .join(":");
        Ok(filter)
    }
}

/// Derives the default test executable from a module path by stripping
/// the bitcode suffix.
pub fn default_test_executable(module_path: &str) -> PathBuf {
    match module_path.find(BC_SUFFIX) {
        Some(pos) => PathBuf::from(&module_path[..pos]),
        None => PathBuf::from(module_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_keyed_by_module_name() {
        let metadir = MetaDir::new("/meta", "suite.bc");
        assert_eq!(
            metadir.depgraph_path(),
            PathBuf::from("/meta/suite.bc.depgraph.txt")
        );
        assert_eq!(metadir.count_path(), PathBuf::from("/meta/count.ekstazi"));
        assert_eq!(
            MetaDir::old_sibling(&metadir.functions_path()),
            PathBuf::from("/meta/suite.bc.functions.txt.old")
        );
    }

    #[test]
    fn rotate_moves_current_to_old() {
        let dir = tempfile::tempdir().unwrap();
        let metadir = MetaDir::new(dir.path(), "m");
        let path = metadir.depgraph_path();

        assert_eq!(MetaDir::rotate(&path).unwrap(), None);

        fs::write(&path, "f();g()\n").unwrap();
        let old_path = MetaDir::rotate(&path).unwrap().unwrap();
        assert!(!path.exists());
        assert_eq!(fs::read_to_string(old_path).unwrap(), "f();g()\n");
    }

    #[test]
    fn rotate_overwrites_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let metadir = MetaDir::new(dir.path(), "m");
        let path = metadir.depgraph_path();
        let old_path = MetaDir::old_sibling(&path);

        fs::write(&old_path, "stale\n").unwrap();
        fs::write(&path, "current\n").unwrap();
        MetaDir::rotate(&path).unwrap();
        assert_eq!(fs::read_to_string(&old_path).unwrap(), "current\n");
    }

    #[test]
    fn count_starts_at_one_and_increments() {
        let dir = tempfile::tempdir().unwrap();
        let metadir = MetaDir::new(dir.path(), "m");

        assert_eq!(metadir.read_count(), None);
        assert_eq!(metadir.bump_count().unwrap(), 1);
        assert_eq!(metadir.bump_count().unwrap(), 2);
        assert_eq!(metadir.read_count(), Some(2));
    }

    #[test]
    fn corrupt_count_restarts_at_one() {
        let dir = tempfile::tempdir().unwrap();
        let metadir = MetaDir::new(dir.path(), "m");
        fs::write(metadir.count_path(), "not-a-number\n").unwrap();
        assert_eq!(metadir.bump_count().unwrap(), 1);
    }

    #[test]
    fn driver_filter_selects_all_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let metadir = MetaDir::new(dir.path(), "m");
        metadir.bump_count().unwrap();
        assert_eq!(metadir.driver_filter().unwrap(), "*");
    }

    #[test]
    fn driver_filter_joins_and_strips_namespaces() {
        let dir = tempfile::tempdir().unwrap();
        let metadir = MetaDir::new(dir.path(), "m");
        metadir.bump_count().unwrap();
        metadir.bump_count().unwrap();

        fs::write(
            metadir.modified_tests_path(),
            "Calc.Adds\nns::Case/0.Name\n",
        )
        .unwrap();
        assert_eq!(metadir.driver_filter().unwrap(), "Calc.Adds:Case/0.Name");
    }

    #[test]
    fn driver_filter_empty_when_nothing_selected() {
        let dir = tempfile::tempdir().unwrap();
        let metadir = MetaDir::new(dir.path(), "m");
        metadir.bump_count().unwrap();
        metadir.bump_count().unwrap();
        fs::write(metadir.modified_tests_path(), "").unwrap();
        assert_eq!(metadir.driver_filter().unwrap(), "");
    }

    #[test]
    fn executable_derived_by_stripping_suffix() {
        assert_eq!(
            default_test_executable("build/suite.0.5.precodegen.bc"),
            PathBuf::from("build/suite")
        );
        assert_eq!(
            default_test_executable("plain-binary"),
            PathBuf::from("plain-binary")
        );
    }
}
