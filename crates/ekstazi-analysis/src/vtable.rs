//! Virtual table reconstruction from IR global initializers.
//!
//! A vtable definition is a global whose mangled name carries the
//! Itanium `TV` tag and whose initializer's first aggregate element is a
//! constant array. Slot 0 of that array is the offset-to-top, slot 1 the
//! RTTI pointer, and slots 2.. hold the virtual function pointers behind
//! pointer casts. Non-function slots are skipped; pure-virtual sentinels
//! are kept and recognized by name at use sites.

use ekstazi_ir::{Constant, GlobalVariable};

/// Name of the pure-virtual placeholder installed in abstract slots.
pub const PURE_VIRTUAL_SENTINEL: &str = "__cxa_pure_virtual";

const VTABLE_TAG: &str = "TV";
const VTABLE_PREFIX: &str = "vtable for ";

/// One class's reconstructed virtual table.
#[derive(Debug, Clone)]
pub struct VTable {
    /// Demangled class name, stripped of the `vtable for ` prefix.
    pub class_name: String,
    /// Offset-to-top from slot 0.
    pub offset: u64,
    /// RTTI symbol from slot 1; empty when unavailable.
    pub rtti: String,
    /// Mangled virtual function names, indexed as the IR computes vtable
    /// offsets.
    vfuns: Vec<String>,
}

impl VTable {
    /// Whether a global variable defines a vtable.
    pub fn is_vtable_def(global: &GlobalVariable) -> bool {
        global.name.contains(VTABLE_TAG)
            && matches!(
                global
                    .initializer
                    .as_ref()
                    .and_then(|init| init.aggregate_element(0)),
                Some(Constant::Aggregate(_))
            )
    }

    /// Reconstructs the vtable of a defining global.
    pub fn from_global(global: &GlobalVariable) -> Option<VTable> {
        if !Self::is_vtable_def(global) {
            return None;
        }
        let slots = global.initializer.as_ref()?.aggregate_element(0)?;

        let offset = match slots.aggregate_element(0).map(Constant::strip_pointer_casts) {
            Some(Constant::Int(offset)) => *offset,
            _ => 0,
        };
        let rtti = match slots.aggregate_element(1).map(Constant::strip_pointer_casts) {
            Some(Constant::GlobalRef(name)) => name.clone(),
            _ => String::new(),
        };

        let mut vfuns = Vec::new();
        let mut slot = 2;
        while let Some(entry) = slots.aggregate_element(slot) {
            if let Constant::FunctionRef(name) = entry.strip_pointer_casts() {
                vfuns.push(name.clone());
            }
            slot += 1;
        }

        Some(VTable {
            class_name: strip_vtable_prefix(&global.demangled),
            offset,
            rtti,
            vfuns,
        })
    }

    pub fn vfuns(&self) -> &[String] {
        &self.vfuns
    }

    /// The mangled function name in a slot, if the slot exists.
    pub fn slot(&self, index: usize) -> Option<&str> {
        self.vfuns.get(index).map(String::as_str)
    }
}

/// Strips the `vtable for ` prefix from a demangled vtable name.
fn strip_vtable_prefix(demangled: &str) -> String {
    match demangled.find(VTABLE_PREFIX) {
        Some(pos) => {
            let mut name = demangled.to_owned();
            name.replace_range(pos..pos + VTABLE_PREFIX.len(), "");
            name
        }
        None => demangled.to_owned(),
    }
}
