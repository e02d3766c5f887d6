//! Peephole rewrite rules
//!
//! A rule looks at a short window starting at one position and either
//! declines or performs its rewrite through [`Code::replace`]. Rules that add,
//! remove or redirect a jump update the label table in the same step; the
//! splice itself never touches reference counts.
//!
//! Registration order is fixed by [`default_rules`] and is part of the
//! optimizer's contract: the driver applies the first rule that matches.

mod arithmetic;
mod jumps;
mod slots;
mod stack;

pub use arithmetic::{
    FoldConstants, RemoveIdentityOperation, SimplifyMultiplication, SimplifyNegation,
    SimplifyRemainderByOne, SimplifySelfSubtraction,
};
pub use jumps::{
    CollapseComparisonTail, InvertBranchOverGoto, RemoveDeadLabel, RemoveGotoNextLabel,
    RemoveUnreachableAfterGoto, SimplifyConstantBranch, SimplifyConstantBranchThroughGoto,
    SimplifyGotoGoto,
};
pub use slots::{MergeIncrements, FoldIncrement, RemoveSuperfluousStoreLoad};
pub use stack::{RemoveLoadStoreSameSlot, RemoveNop, RemovePushPop, SimplifyDupStorePop};

use crate::bytecode::{Code, Instruction, Pos};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse grouping of rules, used to switch families on and off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    /// Stack-local cleanups with no control-flow interaction
    Stack,
    /// Arithmetic identities over statically known operands
    Arithmetic,
    /// Local slot store/load/increment rewrites
    Slots,
    /// Jump chains and label topology
    Jumps,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCategory::Stack => write!(f, "stack"),
            RuleCategory::Arithmetic => write!(f, "arithmetic"),
            RuleCategory::Slots => write!(f, "slots"),
            RuleCategory::Jumps => write!(f, "jumps"),
        }
    }
}

/// A single peephole rewrite
pub trait Rule {
    /// Stable name, used in logs and statistics
    fn name(&self) -> &'static str;

    /// Family this rule belongs to
    fn category(&self) -> RuleCategory;

    /// Try to rewrite the window starting at `at`.
    ///
    /// Returns `Ok(true)` if the rewrite was performed. Errors are internal
    /// invariant violations only.
    fn apply(&self, code: &mut Code, at: Pos) -> Result<bool>;
}

/// The full rule set in registration order
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        // stack
        Box::new(RemoveNop),
        Box::new(SimplifyDupStorePop),
        Box::new(RemovePushPop),
        Box::new(RemoveLoadStoreSameSlot),
        // arithmetic
        Box::new(FoldConstants),
        Box::new(SimplifyMultiplication),
        Box::new(RemoveIdentityOperation),
        Box::new(SimplifyRemainderByOne),
        Box::new(SimplifySelfSubtraction),
        Box::new(SimplifyNegation),
        // slots
        Box::new(FoldIncrement),
        Box::new(MergeIncrements),
        Box::new(RemoveSuperfluousStoreLoad),
        // jumps
        Box::new(RemoveDeadLabel),
        Box::new(RemoveGotoNextLabel),
        Box::new(RemoveUnreachableAfterGoto),
        Box::new(SimplifyGotoGoto),
        Box::new(SimplifyConstantBranch),
        Box::new(SimplifyConstantBranchThroughGoto),
        Box::new(InvertBranchOverGoto),
        Box::new(CollapseComparisonTail),
    ]
}

/// Splice `n` instructions at `at` and report a match
fn rewrite<I>(code: &mut Code, at: Pos, n: usize, new: I) -> Result<bool>
where
    I: IntoIterator<Item = Instruction>,
{
    code.replace(at, n, new)?;
    Ok(true)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Rule;
    use crate::bytecode::{Code, Instruction};

    /// Apply `rule` once at the first position, returning the result body
    pub fn apply_at_start(rule: &dyn Rule, instrs: Vec<Instruction>) -> (bool, Code) {
        let mut code = Code::from_instructions(instrs).unwrap();
        let at = code.first().unwrap();
        let matched = rule.apply(&mut code, at).unwrap();
        code.verify().unwrap();
        (matched, code)
    }

    /// Assert that `rule` rewrites `before` into `after` at the first position
    pub fn assert_rewrites(rule: &dyn Rule, before: Vec<Instruction>, after: Vec<Instruction>) {
        let (matched, code) = apply_at_start(rule, before);
        assert!(matched, "{} did not match", rule.name());
        pretty_assertions::assert_eq!(code.instructions(), after);
    }

    /// Assert that `rule` declines at the first position and leaves the body alone
    pub fn assert_declines(rule: &dyn Rule, before: Vec<Instruction>) {
        let (matched, code) = apply_at_start(rule, before.clone());
        assert!(!matched, "{} should not match", rule.name());
        assert_eq!(code.instructions(), before);
    }
}
