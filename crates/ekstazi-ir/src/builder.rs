//! Construction API for the IR model.
//!
//! Hosts translating real parser output, and tests constructing fixtures,
//! both go through these builders so invariants like "index 0 is the
//! entry block" hold by construction.

use smallvec::{smallvec, SmallVec};

use crate::constant::Constant;
use crate::function::{BasicBlock, Function};
use crate::inst::{CallTarget, CalledValue, GepIndex, Instruction, Opcode, Operand};
use crate::module::{GlobalVariable, Module};

/// Builds one [`Function`] block by block.
pub struct FunctionBuilder {
    function: Function,
    current: usize,
}

impl FunctionBuilder {
    /// Starts a defined function with an empty entry block.
    pub fn new(name: impl Into<String>, demangled: impl Into<String>) -> Self {
        FunctionBuilder {
            function: Function {
                name: name.into(),
                demangled: demangled.into(),
                is_declaration: false,
                is_var_arg: false,
                arg_count: 0,
                blocks: vec![BasicBlock::default()],
            },
            current: 0,
        }
    }

    /// A declaration: no blocks, defined in some other module.
    pub fn declaration(name: impl Into<String>, demangled: impl Into<String>) -> Function {
        Function {
            name: name.into(),
            demangled: demangled.into(),
            is_declaration: true,
            is_var_arg: false,
            arg_count: 0,
            blocks: Vec::new(),
        }
    }

    pub fn arg_count(mut self, count: u32) -> Self {
        self.function.arg_count = count;
        self
    }

    pub fn var_arg(mut self) -> Self {
        self.function.is_var_arg = true;
        self
    }

    /// Appends a new block, selects it, and returns its index.
    pub fn add_block(&mut self) -> usize {
        self.function.blocks.push(BasicBlock::default());
        self.current = self.function.blocks.len() - 1;
        self.current
    }

    /// Selects the block subsequent instructions are appended to.
    pub fn select_block(&mut self, index: usize) -> &mut Self {
        self.current = index;
        self
    }

    /// Records a control-flow edge between two blocks.
    pub fn add_successor(&mut self, from: usize, to: usize) -> &mut Self {
        self.function.blocks[from].successors.push(to);
        self
    }

    /// Appends a non-call instruction to the current block.
    pub fn push(&mut self, opcode: Opcode, operands: Vec<Operand>) -> &mut Self {
        self.function.blocks[self.current]
            .instructions
            .push(Instruction::Simple {
                opcode,
                operands: SmallVec::from_vec(operands),
            });
        self
    }

    /// Appends a direct call.
    pub fn push_call(&mut self, callee: &str, args: Vec<Operand>) -> &mut Self {
        self.push_call_inst(Opcode::Call, CallTarget::Direct(callee.to_owned()), args)
    }

    /// Appends a direct invoke.
    pub fn push_invoke(&mut self, callee: &str, args: Vec<Operand>) -> &mut Self {
        self.push_call_inst(Opcode::Invoke, CallTarget::Direct(callee.to_owned()), args)
    }

    /// Appends an indirect call through a vtable slot: a load of a
    /// single-index `getelementptr` into `%class.<name>`.
    pub fn push_virtual_call(&mut self, class_name: &str, slot: u64, args: Vec<Operand>) -> &mut Self {
        let called = CalledValue::Load(Box::new(CalledValue::GetElementPtr {
            struct_name: format!("class.{class_name}"),
            indices: smallvec![GepIndex::Const(slot)],
        }));
        self.push_call_inst(Opcode::Call, CallTarget::Indirect(called), args)
    }

    /// Appends an indirect call with an arbitrary called value.
    pub fn push_indirect_call(&mut self, called: CalledValue, args: Vec<Operand>) -> &mut Self {
        self.push_call_inst(Opcode::Call, CallTarget::Indirect(called), args)
    }

    fn push_call_inst(&mut self, opcode: Opcode, target: CallTarget, args: Vec<Operand>) -> &mut Self {
        self.function.blocks[self.current]
            .instructions
            .push(Instruction::Call {
                opcode,
                target,
                args: SmallVec::from_vec(args),
            });
        self
    }

    /// Appends a bare `ret`.
    pub fn ret(&mut self) -> &mut Self {
        self.push(Opcode::Ret, Vec::new())
    }

    pub fn finish(self) -> Function {
        self.function
    }
}

/// Builds one [`Module`].
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>, source_filename: impl Into<String>) -> Self {
        ModuleBuilder {
            module: Module::new(name, source_filename),
        }
    }

    pub fn add_function(&mut self, function: Function) -> &mut Self {
        self.module.functions.insert(function.name.clone(), function);
        self
    }

    pub fn add_declaration(
        &mut self,
        name: impl Into<String>,
        demangled: impl Into<String>,
    ) -> &mut Self {
        self.add_function(FunctionBuilder::declaration(name, demangled))
    }

    pub fn add_global(&mut self, global: GlobalVariable) -> &mut Self {
        self.module.globals.insert(global.name.clone(), global);
        self
    }

    /// Adds a vtable definition in the shape the analysis expects: the
    /// initializer's first aggregate element is the slot array, slot 0 the
    /// offset-to-top, slot 1 the RTTI pointer, slots 2.. bitcast function
    /// pointers. `bases` fills the `!type` metadata ahead of `class_name`.
    pub fn add_vtable(
        &mut self,
        name: &str,
        class_name: &str,
        bases: &[&str],
        vfuns: &[&str],
    ) -> &mut Self {
        let rtti = match name.strip_prefix("_ZTV") {
            Some(suffix) => format!("_ZTI{suffix}"),
            None => format!("_ZTI{class_name}"),
        };

        let mut slots = vec![Constant::Int(0), Constant::GlobalRef(rtti)];
        slots.extend(vfuns.iter().map(|vfun| {
            Constant::PointerCast(Box::new(Constant::FunctionRef((*vfun).to_owned())))
        }));

        let mut type_metadata: Vec<String> = bases.iter().map(|b| (*b).to_owned()).collect();
        type_metadata.push(class_name.to_owned());

        self.add_global(GlobalVariable {
            name: name.to_owned(),
            demangled: format!("vtable for {class_name}"),
            initializer: Some(Constant::Aggregate(vec![Constant::Aggregate(slots)])),
            type_metadata,
        })
    }

    pub fn finish(self) -> Module {
        self.module
    }
}
