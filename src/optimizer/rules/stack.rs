//! Stack-shape cleanups
//!
//! None of these touch a jump, so none of them touch the label table. Each
//! leaves the operand stack and the locals exactly as the original window
//! would have left them.

use super::{rewrite, Rule, RuleCategory};
use crate::bytecode::{Code, Instruction::*, Pos};
use crate::error::Result;

/// `nop` → nothing
pub struct RemoveNop;

impl Rule for RemoveNop {
    fn name(&self) -> &'static str {
        "remove_nop"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Stack
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        if code.is_nop(Some(at)) {
            code.kill_line(at)?;
            return Ok(true);
        }
        Ok(false)
    }
}

/// ```text
/// dup            dup
/// istore x       astore x
/// pop            pop
/// -------->      -------->
/// istore x       astore x
/// ```
///
/// The copy made by `dup` is thrown away by `pop` right after the store.
pub struct SimplifyDupStorePop;

impl Rule for SimplifyDupStorePop {
    fn name(&self) -> &'static str {
        "simplify_dup_store_pop"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Stack
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        match code.window::<3>(at) {
            Some([Dup, store @ (Istore(_) | Astore(_)), Pop]) => rewrite(code, at, 3, [store]),
            _ => Ok(false),
        }
    }
}

/// A side-effect-free push immediately popped: `iload x; pop`,
/// `aload x; pop`, `ldc k; pop`, `dup; pop` → nothing
pub struct RemovePushPop;

impl Rule for RemovePushPop {
    fn name(&self) -> &'static str {
        "remove_push_pop"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Stack
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        match code.window::<2>(at) {
            Some([Iload(_) | Aload(_) | LdcInt(_) | Dup, Pop]) => rewrite(code, at, 2, []),
            _ => Ok(false),
        }
    }
}

/// `iload x; istore x` (or the reference pair) writes back the value the slot
/// already holds → nothing
pub struct RemoveLoadStoreSameSlot;

impl Rule for RemoveLoadStoreSameSlot {
    fn name(&self) -> &'static str {
        "remove_load_store_same_slot"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Stack
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        match code.window::<2>(at) {
            Some([Iload(x), Istore(y)]) | Some([Aload(x), Astore(y)]) if x == y => {
                rewrite(code, at, 2, [])
            }
            _ => Ok(false),
        }
    }
}
