//! Arithmetic identities
//!
//! JOOS `int` is the JVM's: signed 32-bit, two's complement, wrapping on
//! overflow, division and remainder truncating toward zero and trapping on a
//! zero divisor. Every rewrite below reproduces that exactly, including
//! `i32::MIN / -1 == i32::MIN` and `i32::MIN % -1 == 0`. Operands are only ever
//! taken from `ldc` constants or from two loads of the same slot.
//!
//! `x / x → 1` is deliberately absent: it would erase the trap for `x == 0`.

use super::{rewrite, Rule, RuleCategory};
use crate::bytecode::{Code, Instruction, Instruction::*, Pos};
use crate::error::Result;

/// Evaluate `a op b` with JVM semantics; `None` for a zero divisor or a
/// non-arithmetic `op`
fn fold(a: i32, b: i32, op: Instruction) -> Option<i32> {
    match op {
        Iadd => Some(a.wrapping_add(b)),
        Isub => Some(a.wrapping_sub(b)),
        Imul => Some(a.wrapping_mul(b)),
        Idiv if b != 0 => Some(a.wrapping_div(b)),
        Irem if b != 0 => Some(a.wrapping_rem(b)),
        _ => None,
    }
}

/// ```text
/// ldc a          ldc 5
/// ldc b          ldc 5
/// <op>           idiv
/// -------->      -------->
/// ldc (a op b)   ldc 1
/// ```
///
/// Also `ldc a; ineg` → `ldc -a`.
pub struct FoldConstants;

impl Rule for FoldConstants {
    fn name(&self) -> &'static str {
        "fold_constants"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Arithmetic
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        if let Some([LdcInt(a), Ineg]) = code.window::<2>(at) {
            return rewrite(code, at, 2, [LdcInt(a.wrapping_neg())]);
        }
        if let Some([LdcInt(a), LdcInt(b), op]) = code.window::<3>(at) {
            if let Some(k) = fold(a, b, op) {
                return rewrite(code, at, 3, [LdcInt(k)]);
            }
        }
        Ok(false)
    }
}

/// ```text
/// iload x        iload x        iload x
/// ldc 0          ldc 1          ldc 2
/// imul           imul           imul
/// ------>        ------>        ------>
/// ldc 0          iload x        iload x
///                               dup
///                               iadd
/// ```
///
/// and the same with the constant pushed first. `x + x` wraps exactly like
/// `x * 2`.
pub struct SimplifyMultiplication;

impl Rule for SimplifyMultiplication {
    fn name(&self) -> &'static str {
        "simplify_multiplication"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Arithmetic
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        let (x, k) = match code.window::<3>(at) {
            Some([Iload(x), LdcInt(k), Imul]) | Some([LdcInt(k), Iload(x), Imul]) => (x, k),
            _ => return Ok(false),
        };
        match k {
            0 => rewrite(code, at, 3, vec![LdcInt(0)]),
            1 => rewrite(code, at, 3, vec![Iload(x)]),
            2 => rewrite(code, at, 3, vec![Iload(x), Dup, Iadd]),
            _ => Ok(false),
        }
    }
}

/// Operations that leave the other operand unchanged:
///
/// ```text
/// ldc 0; iadd   → (nothing)
/// ldc 0; isub   → (nothing)
/// ldc 1; imul   → (nothing)
/// ldc 1; idiv   → (nothing)
/// ldc -1; imul  → ineg
/// ldc -1; idiv  → ineg
/// ldc 0; iload x; iadd → iload x
/// ```
pub struct RemoveIdentityOperation;

impl Rule for RemoveIdentityOperation {
    fn name(&self) -> &'static str {
        "remove_identity_operation"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Arithmetic
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        if let Some([LdcInt(0), Iload(x), Iadd]) = code.window::<3>(at) {
            return rewrite(code, at, 3, [Iload(x)]);
        }
        match code.window::<2>(at) {
            Some([LdcInt(0), Iadd | Isub]) | Some([LdcInt(1), Imul | Idiv]) => {
                rewrite(code, at, 2, [])
            }
            Some([LdcInt(-1), Imul | Idiv]) => rewrite(code, at, 2, [Ineg]),
            _ => Ok(false),
        }
    }
}

/// `iload x; ldc 1; irem` (or `ldc -1`) → `ldc 0`
pub struct SimplifyRemainderByOne;

impl Rule for SimplifyRemainderByOne {
    fn name(&self) -> &'static str {
        "simplify_remainder_by_one"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Arithmetic
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        match code.window::<3>(at) {
            Some([Iload(_), LdcInt(1 | -1), Irem]) => rewrite(code, at, 3, [LdcInt(0)]),
            _ => Ok(false),
        }
    }
}

/// `iload x; iload x; isub` → `ldc 0`
pub struct SimplifySelfSubtraction;

impl Rule for SimplifySelfSubtraction {
    fn name(&self) -> &'static str {
        "simplify_self_subtraction"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Arithmetic
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        match code.window::<3>(at) {
            Some([Iload(x), Iload(y), Isub]) if x == y => rewrite(code, at, 3, [LdcInt(0)]),
            _ => Ok(false),
        }
    }
}

/// ```text
/// ldc 0; iload x; isub → iload x; ineg
/// ineg; ineg           → (nothing)
/// ineg; iadd           → isub
/// ineg; isub           → iadd
/// ```
pub struct SimplifyNegation;

impl Rule for SimplifyNegation {
    fn name(&self) -> &'static str {
        "simplify_negation"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Arithmetic
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        if let Some([LdcInt(0), Iload(x), Isub]) = code.window::<3>(at) {
            return rewrite(code, at, 3, [Iload(x), Ineg]);
        }
        match code.window::<2>(at) {
            Some([Ineg, Ineg]) => rewrite(code, at, 2, []),
            Some([Ineg, Iadd]) => rewrite(code, at, 2, [Isub]),
            Some([Ineg, Isub]) => rewrite(code, at, 2, [Iadd]),
            _ => Ok(false),
        }
    }
}
