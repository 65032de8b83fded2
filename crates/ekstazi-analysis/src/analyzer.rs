//! The analysis pass: initialization, function walk, finalization.
//!
//! Virtual edges are deliberately staged in a pending list instead of
//! being installed during the walk: the constructor-liveness test needs
//! the fully-built direct graph before it can decide which of them are
//! worth keeping.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use ekstazi_core::{
    is_constructor, load_records, modified_between, save_records, split_class_name,
    DependencyGraph, FunctionMap, FunctionRecord, TypeHierarchy,
};
use ekstazi_gtest::{is_internal_function, is_test_name, GtestAdapter};
use ekstazi_ir::{CallTarget, CalledValue, Function, GepIndex, Instruction, Module};

use crate::error::AnalysisError;
use crate::hasher::function_checksum;
use crate::metadir::{self, MetaDir};
use crate::vtable::{VTable, PURE_VIRTUAL_SENTINEL};
use crate::{AnalysisSummary, AnalyzerOptions};

const CLASS_TYPE_PREFIX: &str = "class.";

/// One module's analysis state, rebuilt on every invocation.
pub struct Analyzer {
    options: AnalyzerOptions,
    metadir: MetaDir,
    invocation: u32,

    old_hierarchy: TypeHierarchy,
    new_hierarchy: TypeHierarchy,
    old_depgraph: DependencyGraph,
    new_depgraph: DependencyGraph,
    old_functions: FunctionMap,
    new_functions: FunctionMap,

    /// Demangled names of registered constructors.
    new_constructors: BTreeSet<String>,
    /// Reconstructed vtables by class name.
    vtables: IndexMap<String, VTable>,

    /// Pending virtual edges as `(caller, callee)` demangled pairs, in
    /// discovery order, deduplicated at record time.
    virtual_calls: Vec<(String, String)>,
    virtual_call_seen: HashSet<(String, String)>,

    init_elapsed: Duration,
    walk_elapsed: Duration,
}

impl Analyzer {
    /// Sets up the metadata directory, rolls the previous generation over,
    /// and rebuilds the hierarchy and vtables from the module's globals.
    pub fn initialize(module: &Module, options: AnalyzerOptions) -> Result<Self, AnalysisError> {
        let start = Instant::now();
        if options.constructors {
            info!("constructor optimization enabled");
        } else {
            info!("constructor optimization disabled");
        }

        let metadir = MetaDir::new(&options.metadata_root, module.basename());
        metadir.ensure_exists()?;
        let invocation = metadir.bump_count()?;

        let old_hierarchy = match MetaDir::rotate(&metadir.hierarchy_path())? {
            Some(old_path) => TypeHierarchy::load(&old_path)?,
            None => {
                warn!("no previous type hierarchy, treating as empty");
                TypeHierarchy::new()
            }
        };
        let old_depgraph = match MetaDir::rotate(&metadir.depgraph_path())? {
            Some(old_path) => DependencyGraph::load(&old_path)?,
            None => {
                warn!("no previous dependency graph, treating as empty");
                DependencyGraph::new()
            }
        };
        let old_functions = match MetaDir::rotate(&metadir.functions_path())? {
            Some(old_path) => load_records(&old_path)?,
            None => {
                warn!("no previous function records, treating as empty");
                FunctionMap::new()
            }
        };

        let mut analyzer = Analyzer {
            options,
            metadir,
            invocation,
            old_hierarchy,
            new_hierarchy: TypeHierarchy::new(),
            old_depgraph,
            new_depgraph: DependencyGraph::new(),
            old_functions,
            new_functions: FunctionMap::new(),
            new_constructors: BTreeSet::new(),
            vtables: IndexMap::new(),
            virtual_calls: Vec::new(),
            virtual_call_seen: HashSet::new(),
            init_elapsed: Duration::ZERO,
            walk_elapsed: Duration::ZERO,
        };

        analyzer.build_hierarchy(module)?;
        analyzer.build_vtables(module);

        analyzer.init_elapsed = start.elapsed();
        Ok(analyzer)
    }

    /// Walks every defined function: registers it, installs direct call
    /// edges, and stages resolved virtual calls.
    pub fn process_functions(&mut self, module: &Module) {
        let start = Instant::now();

        for caller in module.functions.values() {
            if caller.is_declaration {
                continue;
            }
            self.register_function(caller, module);

            for inst in caller.instructions() {
                let Instruction::Call { target, .. } = inst else {
                    continue;
                };
                match target {
                    CallTarget::Direct(callee_name) => {
                        let Some(callee) = module.get_function(callee_name) else {
                            continue;
                        };
                        if callee.is_declaration {
                            continue;
                        }
                        self.register_function(callee, module);
                        self.add_call_dependency(caller, callee);
                    }
                    CallTarget::Indirect(called) => {
                        self.resolve_virtual_call(caller, called, module);
                    }
                }
            }
        }

        self.walk_elapsed += start.elapsed();
    }

    /// Installs surviving virtual edges, persists both generations of all
    /// artifacts, and projects the affected set onto runner filters.
    ///
    /// The adapter must already hold the runner's test inventory; the
    /// IR-side registration and value-parameterized remap happen here.
    pub fn finalize(
        &mut self,
        module: &Module,
        adapter: &mut GtestAdapter,
    ) -> Result<AnalysisSummary, AnalysisError> {
        let start = Instant::now();

        self.new_depgraph.dedup();
        info!(count = self.virtual_calls.len(), "pending virtual calls");

        let mut constructed_count = 0;
        let virtual_calls = std::mem::take(&mut self.virtual_calls);
        if self.options.constructors {
            constructed_count = self.install_live_virtual_edges(&virtual_calls);
        } else {
            for (caller, callee) in &virtual_calls {
                self.new_depgraph.add_dependency(callee, caller);
            }
        }
        self.new_depgraph.dedup();

        // Persist both generations; the window moves forward one build
        // per invocation.
        self.new_depgraph.save(&self.metadir.depgraph_path())?;
        self.old_depgraph
            .save(&MetaDir::old_sibling(&self.metadir.depgraph_path()))?;
        save_records(&self.new_functions, &self.metadir.functions_path())?;
        save_records(
            &self.old_functions,
            &MetaDir::old_sibling(&self.metadir.functions_path()),
        )?;
        write_lines(
            &self.metadir.constructors_path(),
            self.new_constructors.iter(),
        )?;

        // Join the IR world to the runner world. Registration goes over
        // the module, not the function set: value-parameterized factory
        // symbols live in the framework namespace the set excludes.
        for function in module.functions.values() {
            if !function.is_declaration {
                adapter.register_ir_test(&function.demangled);
            }
        }
        adapter.remap_value_parameterized_tests();

        info!("finding modified functions");
        let directly_modified = modified_between(&self.old_functions, &self.new_functions);

        let mut affected: BTreeSet<String> = BTreeSet::new();
        for fun_name in &directly_modified {
            affected.insert(fun_name.clone());
            affected.extend(self.old_depgraph.all_dependents(fun_name));
            affected.extend(self.new_depgraph.all_dependents(fun_name));
        }
        write_lines(&self.metadir.modified_functions_path(), affected.iter())?;

        let affected_set: HashSet<String> = affected.iter().cloned().collect();
        let filters = adapter.modified_filters(&affected_set);
        write_lines(&self.metadir.modified_tests_path(), filters.iter())?;
        info!(count = filters.len(), "selected test filters");

        Ok(AnalysisSummary {
            module: self.metadir.module_name().to_owned(),
            invocation: self.invocation,
            functions: self.new_functions.len(),
            vtables: self.vtables.len(),
            virtual_calls: virtual_calls.len(),
            constructed_classes: constructed_count,
            directly_modified: directly_modified.len(),
            affected: affected.len(),
            selected_filters: filters.len(),
            initialization_ms: self.init_elapsed.as_millis() as u64,
            analysis_ms: self.walk_elapsed.as_millis() as u64,
            finalization_ms: start.elapsed().as_millis() as u64,
        })
    }

    pub fn invocation(&self) -> u32 {
        self.invocation
    }

    pub fn metadir(&self) -> &MetaDir {
        &self.metadir
    }

    pub fn old_hierarchy(&self) -> &TypeHierarchy {
        &self.old_hierarchy
    }

    pub fn new_hierarchy(&self) -> &TypeHierarchy {
        &self.new_hierarchy
    }

    /// Builds the class hierarchy from the `!type` metadata of vtable
    /// globals: the last entry names the concrete class, every earlier
    /// entry one of its bases.
    fn build_hierarchy(&mut self, module: &Module) -> Result<(), AnalysisError> {
        for global in module.globals.values() {
            if !VTable::is_vtable_def(global) {
                continue;
            }
            let metadata = &global.type_metadata;
            let Some((concrete, bases)) = metadata.split_last() else {
                continue;
            };
            for base in bases {
                self.new_hierarchy.add_inheritance(base, concrete);
            }
        }
        self.new_hierarchy.dedup();
        self.new_hierarchy.save(&self.metadir.hierarchy_path())?;
        Ok(())
    }

    fn build_vtables(&mut self, module: &Module) {
        for global in module.globals.values() {
            if let Some(vtable) = VTable::from_global(global) {
                self.vtables.insert(vtable.class_name.clone(), vtable);
            }
        }
        info!(count = self.vtables.len(), "virtual tables found");
    }

    /// Whether a function participates in the function set and the
    /// dependency graph. Framework internals and standard library code
    /// are noise: they change with toolchain updates, not with the code
    /// under test.
    fn should_add(&self, function: &Function) -> bool {
        if function.is_declaration {
            return false;
        }
        if is_internal_function(&function.demangled) {
            return false;
        }
        !function.demangled.contains("std::") && !function.demangled.contains("__gnu_cxx::")
    }

    /// Registers a function: checksum, record, constructor classification.
    /// Idempotent per demangled name.
    fn register_function(&mut self, function: &Function, module: &Module) {
        if !self.should_add(function) {
            return;
        }
        if self.new_functions.contains_key(&function.demangled) {
            return;
        }

        let checksum = function_checksum(function, module).to_string();
        self.new_functions.insert(
            function.demangled.clone(),
            FunctionRecord::new(
                function.demangled.clone(),
                module.source_filename.clone(),
                checksum,
            ),
        );

        if is_constructor(&function.name, &function.demangled) {
            self.new_constructors.insert(function.demangled.clone());
        }
    }

    fn add_call_dependency(&mut self, caller: &Function, callee: &Function) {
        if !self.should_add(caller) || !self.should_add(callee) {
            return;
        }
        self.new_depgraph
            .add_dependency(&callee.demangled, &caller.demangled);
    }

    /// Resolves an indirect call through the vtable of the receiver class
    /// and of every class derived from it, staging the targets as pending
    /// virtual edges.
    fn resolve_virtual_call(&mut self, caller: &Function, called: &CalledValue, module: &Module) {
        let CalledValue::Load(pointer) = called else {
            return;
        };
        let CalledValue::GetElementPtr {
            struct_name,
            indices,
        } = pointer.as_ref()
        else {
            return;
        };
        // A vtable access always carries exactly one index.
        if indices.len() != 1 {
            return;
        }
        let GepIndex::Const(slot) = indices[0] else {
            return;
        };
        let Some(class_name) = struct_name.strip_prefix(CLASS_TYPE_PREFIX) else {
            return;
        };

        // The receiver's own class first, then its derived classes in a
        // fixed order so edge discovery stays deterministic.
        let mut classes = vec![class_name.to_owned()];
        let mut derived: Vec<String> = self.new_hierarchy.derived_of(class_name).into_iter().collect();
        derived.sort_unstable();
        classes.extend(derived);

        let mut targets: Vec<String> = Vec::new();
        for class in &classes {
            let Some(vtable) = self.vtables.get(class.as_str()) else {
                debug!(class = %class, "no vtable for class");
                continue;
            };
            match vtable.slot(slot as usize) {
                None => {
                    warn!(class = %class, slot, size = vtable.vfuns().len(), "vtable slot out of range");
                }
                Some(target) if target.contains(PURE_VIRTUAL_SENTINEL) => {}
                Some(target) => targets.push(target.to_owned()),
            }
        }

        for target_name in targets {
            let Some(target) = module.get_function(&target_name) else {
                continue;
            };
            self.register_function(target, module);
            if !self.should_add(caller) || !self.should_add(target) {
                continue;
            }
            let edge = (caller.demangled.clone(), target.demangled.clone());
            if self.virtual_call_seen.insert(edge.clone()) {
                self.virtual_calls.push(edge);
            }
        }
    }

    /// The constructor-liveness optimization.
    ///
    /// A pending edge `(caller, callee)` survives only when the callee's
    /// class has a constructor reachable from some test, the edge is not
    /// already present, and one of those witnessing tests also reaches
    /// the caller. Returns the number of constructed classes.
    fn install_live_virtual_edges(&mut self, virtual_calls: &[(String, String)]) -> usize {
        let mut constructed: HashSet<String> = HashSet::new();
        let mut class_tests: HashMap<String, HashSet<String>> = HashMap::new();

        for constructor in &self.new_constructors {
            let mut dependents = self.old_depgraph.all_dependents(constructor);
            dependents.extend(self.new_depgraph.all_dependents(constructor));
            for fun_name in &dependents {
                if is_test_name(fun_name) {
                    let (class_name, _) = split_class_name(constructor);
                    constructed.insert(class_name.to_owned());
                    class_tests
                        .entry(class_name.to_owned())
                        .or_default()
                        .insert(fun_name.clone());
                }
            }
        }
        info!(count = constructed.len(), "constructed classes");

        for (caller, callee) in virtual_calls {
            let (class_name, _) = split_class_name(callee);
            if !constructed.contains(class_name) {
                debug!(class = %class_name, "never constructed, dropping virtual edge");
                continue;
            }
            if self.new_depgraph.exists_dependency(callee, caller) {
                continue;
            }

            // The caller itself may be the test.
            let mut dependents = HashSet::from([caller.clone()]);
            dependents.extend(self.old_depgraph.all_dependents(caller));
            dependents.extend(self.new_depgraph.all_dependents(caller));

            let Some(witnesses) = class_tests.get(class_name) else {
                continue;
            };
            let witnessed = dependents
                .iter()
                .any(|fun_name| is_test_name(fun_name) && witnesses.contains(fun_name));
            if witnessed {
                self.new_depgraph.add_dependency(callee, caller);
            }
        }

        constructed.len()
    }
}

/// Runs the full pipeline against a module: initialization, walk, runner
/// registration, finalization.
pub fn run_analysis(
    module: &Module,
    options: AnalyzerOptions,
) -> Result<AnalysisSummary, AnalysisError> {
    let executable = options
        .test_executable
        .clone()
        .unwrap_or_else(|| metadir::default_test_executable(&module.name));

    let mut analyzer = Analyzer::initialize(module, options)?;
    analyzer.process_functions(module);

    let mut adapter = GtestAdapter::new();
    adapter.register_from_executable(&executable)?;
    analyzer.finalize(module, &mut adapter)
}

/// Writes one line per item, in iteration order.
fn write_lines<'a>(
    path: &std::path::Path,
    lines: impl Iterator<Item = &'a String>,
) -> Result<(), AnalysisError> {
    let mut contents = String::new();
    for line in lines {
        contents.push_str(line);
        contents.push('\n');
    }
    fs::write(path, contents)?;
    Ok(())
}
