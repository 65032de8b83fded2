//! Functions and basic blocks.

use smallvec::SmallVec;

use crate::inst::Instruction;

/// A basic block: a straight-line instruction sequence plus its successor
/// blocks in program order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicBlock {
    pub instructions: Vec<Instruction>,
    /// Indices into the owning function's block list.
    pub successors: SmallVec<[usize; 2]>,
}

/// One function of a module.
///
/// Both name spellings are provided at the parser boundary; the analysis
/// never demangles. Declarations carry no blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Mangled symbol name, e.g. `_ZN5Shape4areaEv`.
    pub name: String,
    /// Demangled name, e.g. `Shape::area()`.
    pub demangled: String,
    /// True for functions declared but not defined in this module.
    pub is_declaration: bool,
    pub is_var_arg: bool,
    pub arg_count: u32,
    /// Basic blocks; index 0 is the entry block.
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    /// Iterates every instruction of every block.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|block| block.instructions.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::Opcode;
    use smallvec::smallvec;

    #[test]
    fn entry_block_is_first() {
        let function = Function {
            name: "_Z1fv".to_owned(),
            demangled: "f()".to_owned(),
            is_declaration: false,
            is_var_arg: false,
            arg_count: 0,
            blocks: vec![
                BasicBlock {
                    instructions: vec![Instruction::Simple {
                        opcode: Opcode::Br,
                        operands: smallvec![],
                    }],
                    successors: smallvec![1],
                },
                BasicBlock::default(),
            ],
        };
        assert_eq!(function.entry_block().unwrap().successors.as_slice(), &[1]);
        assert_eq!(function.instructions().count(), 1);
    }
}
