//! Registration and selection over the compiled test binary.
//!
//! The adapter owns two indexes: tests registered from the runner listing,
//! keyed by map key, and tests registered from IR names, keyed by their
//! symbol. The value-parameterized remap bridges the factory symbols the
//! IR exposes to the `TestBody()` symbols the dependency graph contains.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::GtestError;
use crate::test::{listing_variant, Test, TestVariant};

const HELP_FLAG: &str = "--help";
const LIST_TESTS_FLAG: &str = "--gtest_list_tests";
/// Token probed for in the help output to recognize a gtest binary.
const GTEST_FLAG_TOKEN: &str = "--gtest";

/// Adapter indexing every test of one compiled binary.
#[derive(Debug, Default)]
pub struct GtestAdapter {
    /// Listing-registered tests by map key.
    tests: HashMap<String, Test>,
    /// IR-registered tests by IR symbol name.
    ir_tests: HashMap<String, Test>,
}

impl GtestAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probes `executable` for gtest support and registers its test
    /// inventory from `--gtest_list_tests`.
    pub fn register_from_executable(&mut self, executable: &Path) -> Result<(), GtestError> {
        let help = Command::new(executable).arg(HELP_FLAG).output()?;
        let advertises_gtest = [&help.stdout, &help.stderr]
            .into_iter()
            .any(|stream| String::from_utf8_lossy(stream).contains(GTEST_FLAG_TOKEN));
        if !advertises_gtest {
            return Err(GtestError::NotAGtestBinary {
                path: executable.to_path_buf(),
            });
        }

        let listing = Command::new(executable).arg(LIST_TESTS_FLAG).output()?;
        let text = String::from_utf8_lossy(&listing.stdout).into_owned();
        self.register_from_listing(&text)
    }

    /// Registers every test in a `--gtest_list_tests` dump.
    ///
    /// The listing groups a case header line ending in `.` with indented
    /// test-name lines. A header without any following line means the
    /// stream was cut mid-case, which poisons the whole inventory.
    pub fn register_from_listing(&mut self, listing: &str) -> Result<(), GtestError> {
        let mut lines = listing.lines().peekable();
        while let Some(case_line) = lines.next() {
            if case_line.trim().is_empty() || case_line.contains("Running main() from") {
                continue;
            }

            let Some(first_test) = lines.peek() else {
                return Err(GtestError::UnexpectedEndOfListing);
            };
            if !case_line.contains('.') || !first_test.starts_with(' ') {
                debug!(line = case_line, "not a test case header, skipping");
                continue;
            }

            let variant = listing_variant(case_line, first_test);
            while let Some(test_line) = lines.next() {
                match Test::from_listing(variant, case_line, test_line) {
                    Some(test) => {
                        self.tests.insert(test.map_key(), test);
                    }
                    None => warn!(line = test_line, "malformed listing line, skipping"),
                }
                match lines.peek() {
                    Some(next) if next.starts_with(' ') => continue,
                    _ => break,
                }
            }
        }
        info!(count = self.tests.len(), "registered tests from listing");
        Ok(())
    }

    /// Registers a function name from the IR if it is a test. Returns
    /// whether it was one.
    pub fn register_ir_test(&mut self, fun_name: &str) -> bool {
        match Test::from_ir_name(fun_name) {
            Some(test) => {
                self.ir_tests.insert(fun_name.to_owned(), test);
                true
            }
            None => false,
        }
    }

    /// Remaps every value-parameterized factory entry to its `TestBody()`
    /// symbol, so lookups keyed by the body symbol resolve to the same
    /// registered test.
    pub fn remap_value_parameterized_tests(&mut self) {
        let remapped: Vec<(String, Test)> = self
            .ir_tests
            .values()
            .filter(|test| test.variant == TestVariant::ValueParameterized)
            .map(|test| (test.test_body_symbol(), test.clone()))
            .collect();

        for (body_symbol, test) in remapped {
            if !self.ir_tests.contains_key(&body_symbol) {
                warn!(symbol = %body_symbol, "value-parameterized body symbol not seen in IR");
            }
            self.ir_tests.insert(body_symbol, test);
        }
    }

    /// Looks up an IR-registered test by symbol, after remapping.
    pub fn lookup_ir(&self, fun_name: &str) -> Option<&Test> {
        self.ir_tests.get(fun_name)
    }

    /// Listing-registered tests by map key.
    pub fn registered_tests(&self) -> &HashMap<String, Test> {
        &self.tests
    }

    /// Runner filter strings for the modified functions that match a test
    /// signature and are present in the listing.
    pub fn modified_filters(&self, modified_funs: &HashSet<String>) -> BTreeSet<String> {
        let mut filters = BTreeSet::new();
        for (_, registered) in self.match_modified(modified_funs) {
            filters.insert(registered.filter_string());
        }
        filters
    }

    /// The registered tests behind the modified functions, one per map key.
    pub fn modified_tests(&self, modified_funs: &HashSet<String>) -> BTreeMap<String, Test> {
        self.match_modified(modified_funs)
            .map(|(key, test)| (key, test.clone()))
            .collect()
    }

    /// Like [`Self::modified_tests`], but additionally selects every
    /// registered test sharing a case with a matched test.
    pub fn modified_tests_by_case(&self, modified_funs: &HashSet<String>) -> BTreeMap<String, Test> {
        let mut results = self.modified_tests(modified_funs);
        let cases: BTreeSet<String> = results
            .values()
            .map(|test| test.case_name.clone())
            .collect();
        for test in self.tests.values() {
            if cases.contains(&test.case_name) {
                results.insert(test.map_key(), test.clone());
            }
        }
        results
    }

    /// Joins modified function names against the listing index.
    ///
    /// Factory symbols are skipped: whenever a value-parameterized body
    /// changes, its `TestBody()` symbol is also in the modified set and
    /// parses as a normal test with the same map key.
    fn match_modified<'a>(
        &'a self,
        modified_funs: &'a HashSet<String>,
    ) -> impl Iterator<Item = (String, &'a Test)> + 'a {
        modified_funs.iter().filter_map(move |fun_name| {
            let probe = Test::from_ir_name(fun_name)?;
            if probe.variant == TestVariant::ValueParameterized {
                return None;
            }
            let key = probe.map_key();
            match self.tests.get(&key) {
                Some(registered) => Some((key, registered)),
                None => {
                    warn!(%key, fun = %fun_name, "modified test not found in listing");
                    None
                }
            }
        })
    }
}
