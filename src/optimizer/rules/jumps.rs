//! Jump-chain and label-topology rewrites
//!
//! Every rule here adds, removes or redirects at least one jump, and records
//! each of those with `copy_label`/`drop_label` before splicing. The driver's
//! termination argument relies on two things in this file: chain collapsing
//! only ever retargets to a numerically smaller label id, and every other
//! rewrite removes at least one non-label instruction or one label.

use super::{rewrite, Rule, RuleCategory};
use crate::bytecode::{Code, Instruction::*, Pos};
use crate::error::Result;

/// A `label` instruction nobody jumps to → nothing; its table entry goes too
pub struct RemoveDeadLabel;

impl Rule for RemoveDeadLabel {
    fn name(&self) -> &'static str {
        "remove_dead_label"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Jumps
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        let Some(l) = code.is_label(Some(at)) else {
            return Ok(false);
        };
        if !code.labels().dead_label(l)? {
            return Ok(false);
        }
        code.kill_line(at)?;
        code.labels_mut().remove(l)?;
        Ok(true)
    }
}

/// ```text
/// goto L
/// M:        (any run of labels)
/// L:
/// -------->
/// M:
/// L:        (reference count reduced by 1)
/// ```
pub struct RemoveGotoNextLabel;

impl Rule for RemoveGotoNextLabel {
    fn name(&self) -> &'static str {
        "remove_goto_next_label"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Jumps
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        let Some(l) = code.is_goto(Some(at)) else {
            return Ok(false);
        };
        let mut cursor = code.next(at);
        while let Some(m) = code.is_label(cursor) {
            if m == l {
                code.labels_mut().drop_label(l)?;
                code.kill_line(at)?;
                return Ok(true);
            }
            cursor = code.after(cursor);
        }
        Ok(false)
    }
}

/// ```text
/// goto L
/// X          (not a label)
/// -------->
/// goto L
/// ```
///
/// Labels are the only way into the middle of a body, so whatever directly
/// follows an unconditional jump without a label in front of it never runs.
pub struct RemoveUnreachableAfterGoto;

impl Rule for RemoveUnreachableAfterGoto {
    fn name(&self) -> &'static str {
        "remove_unreachable_after_goto"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Jumps
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        if code.is_goto(Some(at)).is_none() {
            return Ok(false);
        }
        let Some(dead) = code.next(at) else {
            return Ok(false);
        };
        if code.is_label(Some(dead)).is_some() {
            return Ok(false);
        }
        if let Some(target) = code.uses_label(Some(dead)) {
            code.labels_mut().drop_label(target)?;
        }
        code.kill_line(dead)?;
        Ok(true)
    }
}

/// ```text
/// goto L1            (or any conditional jump to L1)
/// ...
/// L1:
/// goto L2
/// ...
/// L2:
/// --------->
/// goto L2
/// ...
/// L1:    (reference count reduced by 1)
/// goto L2
/// ...
/// L2:    (reference count increased by 1)
/// ```
///
/// Only when `L2 < L1`, which rules out cycling through a loop of gotos.
pub struct SimplifyGotoGoto;

impl Rule for SimplifyGotoGoto {
    fn name(&self) -> &'static str {
        "simplify_goto_goto"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Jumps
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        let Some(l1) = code.uses_label(Some(at)) else {
            return Ok(false);
        };
        let landing = code.next(code.destination(l1)?);
        match code.is_goto(landing) {
            Some(l2) if l2 < l1 => {
                let jump = code.instruction(at)?;
                code.labels_mut().drop_label(l1)?;
                code.labels_mut().copy_label(l2)?;
                rewrite(code, at, 1, [jump.retarget(l2)])
            }
            _ => Ok(false),
        }
    }
}

/// ```text
/// ldc k          ldc k
/// ifeq L         ifne L
/// -------->      -------->
/// goto L   if the branch is taken for k
/// (nothing) otherwise
/// ```
pub struct SimplifyConstantBranch;

impl Rule for SimplifyConstantBranch {
    fn name(&self) -> &'static str {
        "simplify_constant_branch"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Jumps
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        let (l, taken) = match code.window::<2>(at) {
            Some([LdcInt(k), Ifeq(l)]) => (l, k == 0),
            Some([LdcInt(k), Ifne(l)]) => (l, k != 0),
            _ => return Ok(false),
        };
        code.labels_mut().drop_label(l)?;
        if taken {
            code.labels_mut().copy_label(l)?;
            rewrite(code, at, 2, [Goto(l)])
        } else {
            rewrite(code, at, 2, [])
        }
    }
}

/// ```text
/// ldc k
/// goto L1
/// ...
/// L1:
/// ifeq L2        (or ifne L2)
/// X
/// --------->
/// goto L2        if the test is taken for k
/// ...
/// L1:            (reference count reduced by 1)
/// ifeq L2        (L2 reference count increased by 1)
/// X
/// ```
///
/// When the test falls through for `k`, the jump lands right after the test
/// instead: on the label already there, or on a fresh label split in front
/// of `X` and shared by every later rewrite of this shape. With every label
/// id used up there is nothing to split with, and the rule declines.
pub struct SimplifyConstantBranchThroughGoto;

impl Rule for SimplifyConstantBranchThroughGoto {
    fn name(&self) -> &'static str {
        "simplify_constant_branch_through_goto"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Jumps
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        let (k, l1) = match code.window::<2>(at) {
            Some([LdcInt(k), Goto(l1)]) => (k, l1),
            _ => return Ok(false),
        };
        let test = code.next(code.destination(l1)?);
        let (l2, taken) = match (code.is_ifeq(test), code.is_ifne(test)) {
            (Some(l2), _) => (l2, k == 0),
            (_, Some(l2)) => (l2, k != 0),
            _ => return Ok(false),
        };
        let Some(test) = test else {
            return Ok(false);
        };

        let target = if taken {
            l2
        } else if let Some(m) = code.is_label(code.next(test)) {
            m
        } else {
            let Some(m) = code.labels().fresh_id() else {
                return Ok(false);
            };
            let pos = code.insert_after(test, Label(m))?;
            code.labels_mut()
                .insert_new_label(m, format!("split_{}", m), pos, 0)?;
            m
        };

        code.labels_mut().drop_label(l1)?;
        code.labels_mut().copy_label(target)?;
        rewrite(code, at, 2, [Goto(target)])
    }
}

/// ```text
/// ifeq L1        (any conditional)
/// goto L2
/// L1:
/// -------->
/// ifne L2        (the negated conditional)
/// L1:            (reference count reduced by 1)
/// ```
pub struct InvertBranchOverGoto;

impl Rule for InvertBranchOverGoto {
    fn name(&self) -> &'static str {
        "invert_branch_over_goto"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Jumps
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        let Some(branch) = code.is_conditional(Some(at)) else {
            return Ok(false);
        };
        let (l1, l2) = match code.window::<3>(at) {
            Some([_, Goto(l2), Label(m)]) if branch.target() == Some(m) => (m, l2),
            _ => return Ok(false),
        };
        let Some(inverted) = branch.negate() else {
            return Ok(false);
        };
        let labels = code.labels_mut();
        labels.drop_label(l1)?;
        labels.drop_label(l2)?;
        labels.copy_label(l2)?;
        rewrite(code, at, 2, [inverted.retarget(l2)])
    }
}

/// Boolean materialization feeding a test of the same boolean:
///
/// ```text
/// if_icmplt L1       (any conditional <c>)
/// ldc t
/// goto L2
/// L1:                (unique)
/// ldc u
/// L2:                (unique)
/// ifeq L3            (or ifne L3)
/// --------->
/// if_icmplt L3       or its negation, whichever jumps exactly when the
///                    original test on the materialized value would
/// ```
///
/// Exactly one of `t` and `u` must be zero. L1 and L2 have no other users, so
/// both labels disappear along with the window.
pub struct CollapseComparisonTail;

impl Rule for CollapseComparisonTail {
    fn name(&self) -> &'static str {
        "collapse_comparison_tail"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Jumps
    }

    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool> {
        let Some([branch, LdcInt(t), Goto(l2), Label(l1), LdcInt(u), Label(end), test]) =
            code.window::<7>(at)
        else {
            return Ok(false);
        };
        if !branch.is_conditional() || branch.target() != Some(l1) || end != l2 {
            return Ok(false);
        }
        if (t == 0) == (u == 0) {
            return Ok(false);
        }
        // whether `test` jumps when the branch condition holds (value `u`)
        let (l3, jumps_when_taken) = match test {
            Ifeq(l3) => (l3, u == 0),
            Ifne(l3) => (l3, u != 0),
            _ => return Ok(false),
        };
        if !code.labels().unique_label(l1)? || !code.labels().unique_label(l2)? {
            return Ok(false);
        }
        let collapsed = if jumps_when_taken {
            branch.retarget(l3)
        } else {
            match branch.negate() {
                Some(negated) => negated.retarget(l3),
                None => return Ok(false),
            }
        };

        let labels = code.labels_mut();
        labels.drop_label(l1)?;
        labels.drop_label(l2)?;
        labels.drop_label(l3)?;
        labels.copy_label(l3)?;
        labels.remove(l1)?;
        labels.remove(l2)?;
        rewrite(code, at, 7, [collapsed])
    }
}
