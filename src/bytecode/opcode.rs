//! Instruction set of the JOOS stack machine
//!
//! Only the subset of JVM opcodes the peephole rules reason about is modelled
//! here. Every instruction is a small `Copy` value; jumps carry the id of
//! their target label rather than an offset.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a local variable slot
pub type Slot = u16;

/// Identifier of a label within one body
pub type LabelId = u32;

/// One bytecode instruction with its operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    // ========== Locals ==========
    /// Push an int local
    Iload(Slot),
    /// Pop into an int local
    Istore(Slot),
    /// Push a reference local
    Aload(Slot),
    /// Pop into a reference local
    Astore(Slot),
    /// Add a constant to an int local in place
    Iinc(Slot, i8),

    // ========== Constants ==========
    /// Push a 32-bit signed constant
    LdcInt(i32),

    // ========== Stack Operations ==========
    /// Duplicate the top value
    Dup,
    /// Discard the top value
    Pop,
    /// No operation
    Nop,

    // ========== Arithmetic ==========
    Iadd,
    Isub,
    Imul,
    /// Truncating division; traps on a zero divisor
    Idiv,
    /// Truncating remainder; traps on a zero divisor
    Irem,
    Ineg,

    // ========== Control Transfer ==========
    /// Unconditional jump
    Goto(LabelId),
    /// Pop, jump if zero
    Ifeq(LabelId),
    /// Pop, jump if non-zero
    Ifne(LabelId),
    /// Pop two, jump if equal
    IfIcmpeq(LabelId),
    /// Pop two, jump if not equal
    IfIcmpne(LabelId),
    /// Pop two, jump if the deeper value is greater or equal
    IfIcmpge(LabelId),
    /// Pop two, jump if the deeper value is less or equal
    IfIcmple(LabelId),
    /// Pop two, jump if the deeper value is greater
    IfIcmpgt(LabelId),
    /// Pop two, jump if the deeper value is less
    IfIcmplt(LabelId),

    // ========== Labels ==========
    /// Jump target definition; not executed
    Label(LabelId),
}

impl Instruction {
    /// The label this instruction jumps to, if it is a jump
    pub fn target(&self) -> Option<LabelId> {
        use Instruction::*;
        match *self {
            Goto(l) | Ifeq(l) | Ifne(l) | IfIcmpeq(l) | IfIcmpne(l) | IfIcmpge(l)
            | IfIcmple(l) | IfIcmpgt(l) | IfIcmplt(l) => Some(l),
            _ => None,
        }
    }

    /// The same jump aimed at `label`; non-jumps are returned unchanged
    pub fn retarget(self, label: LabelId) -> Self {
        use Instruction::*;
        match self {
            Goto(_) => Goto(label),
            Ifeq(_) => Ifeq(label),
            Ifne(_) => Ifne(label),
            IfIcmpeq(_) => IfIcmpeq(label),
            IfIcmpne(_) => IfIcmpne(label),
            IfIcmpge(_) => IfIcmpge(label),
            IfIcmple(_) => IfIcmple(label),
            IfIcmpgt(_) => IfIcmpgt(label),
            IfIcmplt(_) => IfIcmplt(label),
            other => other,
        }
    }

    /// The conditional branch taken exactly when this one is not
    pub fn negate(self) -> Option<Self> {
        use Instruction::*;
        Some(match self {
            Ifeq(l) => Ifne(l),
            Ifne(l) => Ifeq(l),
            IfIcmpeq(l) => IfIcmpne(l),
            IfIcmpne(l) => IfIcmpeq(l),
            IfIcmpge(l) => IfIcmplt(l),
            IfIcmplt(l) => IfIcmpge(l),
            IfIcmple(l) => IfIcmpgt(l),
            IfIcmpgt(l) => IfIcmple(l),
            _ => return None,
        })
    }

    /// Whether this is a jump that may fall through
    pub fn is_conditional(&self) -> bool {
        self.target().is_some() && !matches!(self, Instruction::Goto(_))
    }

    /// Whether this is a `label` pseudo-instruction
    pub fn is_label(&self) -> bool {
        matches!(self, Instruction::Label(_))
    }

    /// Assembler mnemonic
    pub fn mnemonic(&self) -> &'static str {
        use Instruction::*;
        match self {
            Iload(_) => "iload",
            Istore(_) => "istore",
            Aload(_) => "aload",
            Astore(_) => "astore",
            Iinc(..) => "iinc",
            LdcInt(_) => "ldc",
            Dup => "dup",
            Pop => "pop",
            Nop => "nop",
            Iadd => "iadd",
            Isub => "isub",
            Imul => "imul",
            Idiv => "idiv",
            Irem => "irem",
            Ineg => "ineg",
            Goto(_) => "goto",
            Ifeq(_) => "ifeq",
            Ifne(_) => "ifne",
            IfIcmpeq(_) => "if_icmpeq",
            IfIcmpne(_) => "if_icmpne",
            IfIcmpge(_) => "if_icmpge",
            IfIcmple(_) => "if_icmple",
            IfIcmpgt(_) => "if_icmpgt",
            IfIcmplt(_) => "if_icmplt",
            Label(_) => "label",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match *self {
            Iload(s) | Istore(s) | Aload(s) | Astore(s) => write!(f, "{} {}", self.mnemonic(), s),
            Iinc(s, k) => write!(f, "iinc {} {}", s, k),
            LdcInt(k) => write!(f, "ldc {}", k),
            Label(l) => write!(f, "L{}:", l),
            _ => match self.target() {
                Some(l) => write!(f, "{} L{}", self.mnemonic(), l),
                None => f.write_str(self.mnemonic()),
            },
        }
    }
}
