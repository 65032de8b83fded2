//! Location-insensitive structural function checksums.
//!
//! The checksum captures a function's block structure, opcode sequence,
//! and constant operands, while staying stable under the two kinds of
//! noise a rebuild introduces: code moving to a different source location,
//! and test-framework helper calls whose arguments embed line numbers.
//!
//! # Traversal order
//!
//! Blocks are walked with an explicit stack: the entry block is pushed
//! first, blocks are popped from the back, and unvisited successors are
//! pushed in program order. The last successor of a block is therefore
//! hashed before its siblings. The order is arbitrary but fixed; changing
//! it would silently invalidate every persisted checksum.

use std::collections::HashSet;

use ekstazi_gtest::is_internal_function;
use ekstazi_ir::{CallTarget, Constant, Function, Instruction, Module, Operand};

/// Seed of the accumulator.
const HASH_SEED: u64 = 0x6aca_a36b_ef83_25c5;
/// Mixed in ahead of every block, so the partition of opcodes into blocks
/// affects the hash, not just their sequence.
const BLOCK_HEADER: u64 = 45798;

/// Accumulates a 64-bit structural hash.
///
/// Two mixing primitives, both built on blake3 and deterministic across
/// runs: a position-sensitive step for 64-bit inputs, and a commutative
/// accumulate for byte strings.
#[derive(Debug)]
pub struct HashAccumulator {
    hash: u64,
}

impl HashAccumulator {
    pub fn new() -> Self {
        HashAccumulator { hash: HASH_SEED }
    }

    /// Position-sensitive mix of a 64-bit value.
    pub fn add_u64(&mut self, value: u64) {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.hash.to_le_bytes());
        hasher.update(&value.to_le_bytes());
        self.hash = digest_word(&hasher.finalize());
    }

    /// Commutative accumulate of a byte string.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.hash = self.hash.wrapping_add(digest_word(&blake3::hash(bytes)));
    }

    /// Mixes in a constant's content after stripping pointer casts.
    ///
    /// Aggregates and constant expressions are deliberate no-ops: their
    /// contents are a known precision limit, not part of the contract.
    pub fn add_constant(&mut self, constant: &Constant, module: &Module) {
        match constant.strip_pointer_casts() {
            Constant::Int(value) => self.add_u64(*value),
            Constant::Float(value) => self.add_u64(value.to_bits()),
            Constant::Bytes(bytes) => self.add_bytes(bytes),
            Constant::Aggregate(_) | Constant::Expr | Constant::Null => {}
            Constant::FunctionRef(_) => {}
            Constant::GlobalRef(name) => {
                let Some(global) = module.get_global(name) else {
                    return;
                };
                // Framework globals carry source-location payloads.
                if is_internal_function(&global.demangled) {
                    return;
                }
                if let Some(initializer) = &global.initializer {
                    self.add_constant(initializer, module);
                }
            }
            Constant::PointerCast(_) => unreachable!("stripped above"),
        }
    }

    pub fn finish(&self) -> u64 {
        self.hash
    }
}

impl Default for HashAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// First eight little-endian bytes of a blake3 digest.
fn digest_word(digest: &blake3::Hash) -> u64 {
    let bytes = digest.as_bytes();
    u64::from_le_bytes(bytes[..8].try_into().expect("digest is 32 bytes"))
}

/// Computes the structural checksum of a function.
pub fn function_checksum(function: &Function, module: &Module) -> u64 {
    let mut acc = HashAccumulator::new();
    acc.add_u64(function.is_var_arg as u64);
    acc.add_u64(u64::from(function.arg_count));

    if function.blocks.is_empty() {
        return acc.finish();
    }

    let mut stack = vec![0usize];
    let mut visited: HashSet<usize> = HashSet::from([0]);

    while let Some(index) = stack.pop() {
        let block = &function.blocks[index];
        acc.add_u64(BLOCK_HEADER);

        for inst in &block.instructions {
            acc.add_u64(inst.opcode().as_u64());
            match inst {
                Instruction::Call { target, args, .. } => {
                    // Framework callees take source locations by argument;
                    // skip all of their operands.
                    if let CallTarget::Direct(callee_name) = target {
                        if module
                            .get_function(callee_name)
                            .is_some_and(|callee| is_internal_function(&callee.demangled))
                        {
                            continue;
                        }
                    }
                    for arg in args {
                        let Operand::Const(constant) = arg else {
                            continue;
                        };
                        if matches!(constant.strip_pointer_casts(), Constant::FunctionRef(_)) {
                            continue;
                        }
                        acc.add_constant(constant, module);
                    }
                }
                Instruction::Simple { operands, .. } => {
                    for operand in operands {
                        if let Operand::Const(constant) = operand {
                            acc.add_constant(constant, module);
                        }
                    }
                }
            }
        }

        for &successor in &block.successors {
            if visited.insert(successor) {
                stack.push(successor);
            }
        }
    }

    acc.finish()
}
