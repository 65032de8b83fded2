//! Modules and global variables.

use indexmap::IndexMap;

use crate::constant::Constant;
use crate::function::Function;

/// A global variable, with the metadata the analysis reads off vtable
/// definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariable {
    /// Mangled symbol name; vtable definitions carry the `TV` tag.
    pub name: String,
    /// Demangled name, e.g. `vtable for Shape`.
    pub demangled: String,
    pub initializer: Option<Constant>,
    /// Class names from the global's `!type` metadata. Earlier entries
    /// name bases; the last entry names the concrete class.
    pub type_metadata: Vec<String>,
}

/// One translation unit's worth of IR.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Module name as given to the compiler, usually a bitcode path.
    pub name: String,
    /// Source filename recorded in the module.
    pub source_filename: String,
    /// Functions keyed by mangled name, in definition order.
    pub functions: IndexMap<String, Function>,
    /// Global variables keyed by mangled name, in definition order.
    pub globals: IndexMap<String, GlobalVariable>,
}

impl Module {
    pub fn new(name: impl Into<String>, source_filename: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            source_filename: source_filename.into(),
            functions: IndexMap::new(),
            globals: IndexMap::new(),
        }
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn get_global(&self, name: &str) -> Option<&GlobalVariable> {
        self.globals.get(name)
    }

    /// Module name with any directory prefix stripped.
    pub fn basename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_strips_directories() {
        let module = Module::new("build/out/suite.0.5.precodegen.bc", "suite.cc");
        assert_eq!(module.basename(), "suite.0.5.precodegen.bc");

        let bare = Module::new("suite.bc", "suite.cc");
        assert_eq!(bare.basename(), "suite.bc");
    }
}
