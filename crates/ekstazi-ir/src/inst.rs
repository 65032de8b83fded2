//! Instructions, opcodes, and call targets.

use smallvec::SmallVec;

use crate::constant::Constant;

/// Instruction opcodes with stable numeric values.
///
/// The numbering feeds the structural checksum, so values are explicit and
/// must never be reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    // Terminators
    Ret = 1,
    Br = 2,
    Switch = 3,
    IndirectBr = 4,
    Invoke = 5,
    Resume = 6,
    Unreachable = 7,
    // Integer arithmetic
    Add = 11,
    Sub = 12,
    Mul = 13,
    UDiv = 14,
    SDiv = 15,
    URem = 16,
    SRem = 17,
    // Floating-point arithmetic
    FAdd = 21,
    FSub = 22,
    FMul = 23,
    FDiv = 24,
    FRem = 25,
    // Bitwise
    Shl = 31,
    LShr = 32,
    AShr = 33,
    And = 34,
    Or = 35,
    Xor = 36,
    // Memory
    Alloca = 41,
    Load = 42,
    Store = 43,
    GetElementPtr = 44,
    // Casts
    Trunc = 51,
    ZExt = 52,
    SExt = 53,
    FPToSI = 54,
    SIToFP = 55,
    PtrToInt = 56,
    IntToPtr = 57,
    BitCast = 58,
    // Other
    ICmp = 61,
    FCmp = 62,
    Phi = 63,
    Select = 64,
    Call = 65,
}

impl Opcode {
    pub fn as_u64(self) -> u64 {
        self as u32 as u64
    }
}

/// One instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A constant value.
    Const(Constant),
    /// An SSA value produced elsewhere; its identity is irrelevant to the
    /// analysis, only its presence.
    Value,
}

/// A single index of a `getelementptr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GepIndex {
    Const(u64),
    Dynamic,
}

/// The called value of an indirect call, preserving just enough structure
/// for the orchestrator to recognize vtable dispatch: a load from a
/// `getelementptr` into a named struct type.
#[derive(Debug, Clone, PartialEq)]
pub enum CalledValue {
    /// Load through a pointer value.
    Load(Box<CalledValue>),
    /// Pointer arithmetic into a struct type, e.g. `%class.Shape`.
    GetElementPtr {
        /// Struct type name as spelled in the IR, e.g. `class.Shape`.
        struct_name: String,
        indices: SmallVec<[GepIndex; 2]>,
    },
    /// Anything the analysis cannot see through.
    Opaque,
}

/// Callee of a call or invoke instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    /// Callee known at IR inspection time, by mangled name.
    Direct(String),
    /// Indirect call through a computed value.
    Indirect(CalledValue),
}

/// One IR instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// A call or invoke with its callee and argument operands.
    Call {
        opcode: Opcode,
        target: CallTarget,
        args: SmallVec<[Operand; 4]>,
    },
    /// Any non-call instruction with its operands.
    Simple {
        opcode: Opcode,
        operands: SmallVec<[Operand; 4]>,
    },
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Call { opcode, .. } => *opcode,
            Instruction::Simple { opcode, .. } => *opcode,
        }
    }
}
