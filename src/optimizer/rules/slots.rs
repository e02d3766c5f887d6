//! Local slot rewrites: increment folding and store/load elimination

use super::{rewrite, Rule, RuleCategory};
use crate::bytecode::{Code, Instruction::*, Pos};
use crate::error::Result;

/// ```text
/// iload x        ldc k          iload x
/// ldc k          iload x        ldc k
/// iadd           iadd           isub
/// istore x       istore x       istore x
/// --------->     --------->     --------->
/// iinc x k       iinc x k       iinc x -k
/// ```
///
/// Only when the constant fits the signed byte operand of `iinc`.
pub struct FoldIncrement;

impl Rule for FoldIncrement {
    fn name(&self) -> &'static str {
        "fold_increment"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Slots
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        let (x, delta) = match code.window::<4>(at) {
            Some([Iload(x), LdcInt(k), Iadd, Istore(y)])
            | Some([LdcInt(k), Iload(x), Iadd, Istore(y)])
                if x == y =>
            {
                (x, i8::try_from(k).ok())
            }
            Some([Iload(x), LdcInt(k), Isub, Istore(y)]) if x == y => {
                (x, k.checked_neg().and_then(|n| i8::try_from(n).ok()))
            }
            _ => return Ok(false),
        };
        match delta {
            Some(k) => rewrite(code, at, 4, [Iinc(x, k)]),
            None => Ok(false),
        }
    }
}

/// ```text
/// iinc x a       iinc x 0
/// iinc x b       -------->
/// -------->      (nothing)
/// iinc x (a+b)
/// ```
///
/// The sum must still fit the operand; a zero sum removes both.
pub struct MergeIncrements;

impl Rule for MergeIncrements {
    fn name(&self) -> &'static str {
        "merge_increments"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Slots
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        if let Some((_, 0)) = code.is_iinc(Some(at)) {
            code.kill_line(at)?;
            return Ok(true);
        }
        match code.window::<2>(at) {
            Some([Iinc(x, a), Iinc(y, b)]) if x == y => match a.checked_add(b) {
                Some(0) => rewrite(code, at, 2, []),
                Some(k) => rewrite(code, at, 2, [Iinc(x, k)]),
                None => Ok(false),
            },
            _ => Ok(false),
        }
    }
}

/// ```text
/// istore x       astore x
/// iload x        aload x
/// --------->     --------->
/// (nothing)      (nothing)
/// ```
///
/// The stored value is left on the stack instead of making a round trip
/// through the slot. Only valid when that load is the last read of the value:
/// the slot is overwritten before any further read or the end of the body, and no
/// jump or live label sits in between. A jump could lead to a path that still
/// reads the slot and the window cannot follow it.
pub struct RemoveSuperfluousStoreLoad;

impl Rule for RemoveSuperfluousStoreLoad {
    fn name(&self) -> &'static str {
        "remove_superfluous_storeload"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Slots
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        let load = code.next(at);
        let same_slot = match (code.is_istore(Some(at)), code.is_astore(Some(at))) {
            (Some(x), _) => code.is_iload(load) == Some(x),
            (_, Some(x)) => code.is_aload(load) == Some(x),
            _ => false,
        };
        if same_slot && !code.is_label_destination(load) && code.is_last_value_load(load) {
            return rewrite(code, at, 2, []);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::rules::testing::{assert_declines, assert_rewrites};

    #[test]
    fn test_fold_increment() {
        assert_rewrites(
            &FoldIncrement,
            vec![Iload(2), LdcInt(127), Iadd, Istore(2)],
            vec![Iinc(2, 127)],
        );
        assert_rewrites(
            &FoldIncrement,
            vec![LdcInt(1), Iload(0), Iadd, Istore(0)],
            vec![Iinc(0, 1)],
        );
        assert_rewrites(
            &FoldIncrement,
            vec![Iload(4), LdcInt(128), Isub, Istore(4)],
            vec![Iinc(4, -128)],
        );
    }

    #[test]
    fn test_increment_bounds() {
        assert_declines(&FoldIncrement, vec![Iload(2), LdcInt(128), Iadd, Istore(2)]);
        assert_declines(&FoldIncrement, vec![Iload(2), LdcInt(-129), Iadd, Istore(2)]);
        assert_declines(&FoldIncrement, vec![Iload(2), LdcInt(i32::MIN), Isub, Istore(2)]);
        assert_declines(&FoldIncrement, vec![LdcInt(3), Iload(0), Isub, Istore(0)]);
        assert_declines(&FoldIncrement, vec![Iload(2), LdcInt(1), Iadd, Istore(3)]);
    }

    #[test]
    fn test_merge_increments() {
        assert_rewrites(&MergeIncrements, vec![Iinc(1, 3), Iinc(1, 4)], vec![Iinc(1, 7)]);
        assert_rewrites(&MergeIncrements, vec![Iinc(1, 3), Iinc(1, -3)], vec![]);
        assert_rewrites(&MergeIncrements, vec![Iinc(1, 0), Iload(1)], vec![Iload(1)]);
        assert_declines(&MergeIncrements, vec![Iinc(1, 100), Iinc(1, 100)]);
        assert_declines(&MergeIncrements, vec![Iinc(1, 1), Iinc(2, 1)]);
    }

    #[test]
    fn test_store_load_elimination() {
        assert_rewrites(
            &RemoveSuperfluousStoreLoad,
            vec![Istore(1), Iload(1), Iload(2), Iadd, Istore(1)],
            vec![Iload(2), Iadd, Istore(1)],
        );
        assert_rewrites(
            &RemoveSuperfluousStoreLoad,
            vec![Astore(0), Aload(0), Aload(1), Astore(0)],
            vec![Aload(1), Astore(0)],
        );
    }

    #[test]
    fn test_store_load_kept_when_slot_outlives_body() {
        assert_declines(&RemoveSuperfluousStoreLoad, vec![Istore(0), Iload(0)]);
        assert_declines(&RemoveSuperfluousStoreLoad, vec![Astore(0), Aload(0)]);
        assert_declines(&RemoveSuperfluousStoreLoad, vec![Istore(2), Iload(2), Pop, Iload(1)]);
    }

    #[test]
    fn test_store_load_kept_when_value_is_read_again() {
        assert_declines(&RemoveSuperfluousStoreLoad, vec![Istore(1), Iload(1), Iload(1), Iadd]);
        assert_declines(&RemoveSuperfluousStoreLoad, vec![Istore(1), Iload(1), Iinc(1, 1)]);
        assert_declines(&RemoveSuperfluousStoreLoad, vec![Istore(1), Iload(2)]);
        assert_declines(&RemoveSuperfluousStoreLoad, vec![Istore(1), Aload(1)]);
    }

    #[test]
    fn test_store_load_kept_across_control_flow() {
        // a loop back edge may read slot 1 again
        assert_declines(
            &RemoveSuperfluousStoreLoad,
            vec![Istore(1), Iload(1), Pop, Label(3), Iload(1), Pop, Goto(3)],
        );
        // a conditional jump could reach a reader of slot 1
        assert_declines(
            &RemoveSuperfluousStoreLoad,
            vec![Istore(1), Iload(1), Ifeq(3), LdcInt(0), Istore(1), Label(3), Iload(1)],
        );
    }
}
