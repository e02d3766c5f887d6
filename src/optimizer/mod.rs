//! Peephole optimizer for JOOS bytecode bodies
//!
//! The driver walks a body from its first instruction, tries every registered
//! rule at each position in registration order, and applies the first one
//! that matches. Any rewrite can expose new opportunities earlier in the body
//! (a shorter goto chain, a label that just became dead), so after each
//! rewrite the scan restarts from the top. The run ends when one full pass
//! makes no change.
//!
//! Termination: every rule strictly decreases, lexicographically,
//! (non-label instructions, `imul` instructions, labels, sum of jump target
//! ids). Goto chains only move toward smaller ids; every other rewrite
//! removes an instruction or a label. The rewrite cap below is a tripwire for
//! a broken rule, not a tuning knob.

pub mod rules;
mod window;

use crate::bytecode::{Code, Pos};
use crate::error::{Error, Result};
use rules::{Rule, RuleCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Rewrites allowed per (instruction × label) before the driver gives up
const REWRITE_BUDGET_FACTOR: usize = 8;

/// Floor of the default rewrite cap
const MIN_REWRITE_LIMIT: usize = 1024;

/// Configuration for the peephole optimizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Enable stack-shape cleanups
    pub stack: bool,
    /// Enable arithmetic identities
    pub arithmetic: bool,
    /// Enable slot store/load/increment rules
    pub slots: bool,
    /// Enable jump-chain and label rules
    pub jumps: bool,
    /// Cap on rewrites per body; derived from the body's size when unset
    pub max_rewrites: Option<usize>,
    /// Re-check every label count after each rewrite
    pub verify_each_step: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            stack: true,
            arithmetic: true,
            slots: true,
            jumps: true,
            max_rewrites: None,
            verify_each_step: cfg!(debug_assertions),
        }
    }
}

impl OptimizerConfig {
    /// Whether rules of `category` should be registered
    pub fn enables(&self, category: RuleCategory) -> bool {
        match category {
            RuleCategory::Stack => self.stack,
            RuleCategory::Arithmetic => self.arithmetic,
            RuleCategory::Slots => self.slots,
            RuleCategory::Jumps => self.jumps,
        }
    }

    fn rewrite_limit(&self, code: &Code) -> usize {
        self.max_rewrites.unwrap_or_else(|| {
            (code.len() + 1)
                .saturating_mul(code.labels().len() + 2)
                .saturating_mul(REWRITE_BUDGET_FACTOR)
                .max(MIN_REWRITE_LIMIT)
        })
    }
}

/// What one `optimize` call did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptimizeStats {
    /// Scans started, including the final one that found nothing
    pub passes: usize,
    /// Rewrites applied
    pub rewrites: usize,
    /// Rewrites applied per rule name
    pub rule_hits: BTreeMap<&'static str, usize>,
    /// Instruction count on entry
    pub instructions_before: usize,
    /// Instruction count on exit
    pub instructions_after: usize,
}

impl OptimizeStats {
    fn record(&mut self, rule: &'static str) {
        self.rewrites += 1;
        *self.rule_hits.entry(rule).or_insert(0) += 1;
    }

    /// Fold another body's statistics into this one
    pub fn merge(&mut self, other: &OptimizeStats) {
        self.passes += other.passes;
        self.rewrites += other.rewrites;
        for (rule, hits) in &other.rule_hits {
            *self.rule_hits.entry(*rule).or_insert(0) += hits;
        }
        self.instructions_before += other.instructions_before;
        self.instructions_after += other.instructions_after;
    }
}

/// Peephole optimizer
pub struct Optimizer {
    config: OptimizerConfig,
    rules: Vec<Box<dyn Rule>>,
}

impl Optimizer {
    /// Create a new optimizer with default configuration
    pub fn new() -> Self {
        Self::with_config(OptimizerConfig::default())
    }

    /// Create an optimizer with the default rules of the enabled categories
    pub fn with_config(config: OptimizerConfig) -> Self {
        let rules = rules::default_rules()
            .into_iter()
            .filter(|rule| config.enables(rule.category()))
            .collect();
        Self { config, rules }
    }

    /// Create an optimizer with an explicit rule list, in the given order
    pub fn with_rules(config: OptimizerConfig, rules: Vec<Box<dyn Rule>>) -> Self {
        Self { config, rules }
    }

    /// Names of the registered rules, in order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// Rewrite `code` in place until no rule applies anywhere
    pub fn optimize(&self, code: &mut Code) -> Result<OptimizeStats> {
        let limit = self.config.rewrite_limit(code);
        let mut stats = OptimizeStats {
            instructions_before: code.len(),
            ..Default::default()
        };

        'scan: loop {
            stats.passes += 1;
            let mut cursor = code.first();
            while let Some(at) = cursor {
                for rule in &self.rules {
                    if rule.apply(code, at)? {
                        stats.record(rule.name());
                        trace!(rule = rule.name(), len = code.len(), "rewrite");
                        if self.config.verify_each_step {
                            code.verify()?;
                        }
                        if stats.rewrites > limit {
                            return Err(Error::RewriteLimitExceeded { limit });
                        }
                        continue 'scan;
                    }
                }
                cursor = code.next(at);
            }
            break;
        }

        stats.instructions_after = code.len();
        debug!(
            passes = stats.passes,
            rewrites = stats.rewrites,
            before = stats.instructions_before,
            after = stats.instructions_after,
            "body optimized"
        );
        Ok(stats)
    }

    /// First `(position, rule)` that would still rewrite `code`, trying each
    /// rule on a scratch copy. `None` means `code` is at a fixpoint.
    pub fn find_match(&self, code: &Code) -> Result<Option<(Pos, &'static str)>> {
        for (at, _) in code.iter() {
            for rule in &self.rules {
                let mut scratch = code.clone();
                if rule.apply(&mut scratch, at)? {
                    return Ok(Some((at, rule.name())));
                }
            }
        }
        Ok(None)
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to optimize a body with default settings
pub fn optimize(code: &mut Code) -> Result<OptimizeStats> {
    Optimizer::new().optimize(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Instruction, Instruction::*};
    use pretty_assertions::assert_eq;

    fn optimized(instrs: Vec<Instruction>) -> Code {
        let mut code = Code::from_instructions(instrs).unwrap();
        optimize(&mut code).unwrap();
        code.verify().unwrap();
        code
    }

    #[test]
    fn test_scenarios() {
        assert_eq!(optimized(vec![Iload(1), LdcInt(0), Imul]).instructions(), vec![LdcInt(0)]);
        assert_eq!(
            optimized(vec![Iload(2), LdcInt(127), Iadd, Istore(2)]).instructions(),
            vec![Iinc(2, 127)]
        );
        assert_eq!(optimized(vec![Dup, Istore(3), Pop]).instructions(), vec![Istore(3)]);
        assert_eq!(optimized(vec![LdcInt(5), LdcInt(5), Idiv]).instructions(), vec![LdcInt(1)]);
        assert!(optimized(vec![Nop]).is_empty());
    }

    #[test]
    fn test_rewrite_exposes_earlier_opportunity() {
        // folding produces `ldc 0` which then meets the earlier `iload; ... imul`
        let code = optimized(vec![Iload(1), LdcInt(3), LdcInt(3), Isub, Imul]);
        assert_eq!(code.instructions(), vec![LdcInt(0)]);
    }

    #[test]
    fn test_stats() {
        let mut code = Code::from_instructions(vec![Nop, Nop, Iload(0), LdcInt(1), Imul]).unwrap();
        let stats = optimize(&mut code).unwrap();
        assert_eq!(stats.rewrites, 3);
        assert_eq!(stats.rule_hits.get("remove_nop"), Some(&2));
        assert_eq!(stats.rule_hits.get("simplify_multiplication"), Some(&1));
        assert_eq!(stats.passes, 4);
        assert_eq!(stats.instructions_before, 5);
        assert_eq!(stats.instructions_after, 1);
    }

    #[test]
    fn test_disabled_categories() {
        let config = OptimizerConfig {
            arithmetic: false,
            ..Default::default()
        };
        let optimizer = Optimizer::with_config(config);
        assert!(!optimizer.rule_names().contains(&"fold_constants"));
        let mut code = Code::from_instructions(vec![LdcInt(2), LdcInt(3), Iadd, Nop]).unwrap();
        optimizer.optimize(&mut code).unwrap();
        assert_eq!(code.instructions(), vec![LdcInt(2), LdcInt(3), Iadd]);
    }

    #[test]
    fn test_rewrite_limit_is_internal_error() {
        let config = OptimizerConfig {
            max_rewrites: Some(2),
            ..Default::default()
        };
        let mut code = Code::from_instructions(vec![Nop, Nop, Nop, Nop]).unwrap();
        let err = Optimizer::with_config(config).optimize(&mut code).unwrap_err();
        assert!(matches!(err, Error::RewriteLimitExceeded { limit: 2 }));
        assert!(err.is_internal());
    }

    #[test]
    fn test_find_match() {
        let optimizer = Optimizer::new();
        let code = Code::from_instructions(vec![Iload(0), Nop]).unwrap();
        let (at, rule) = optimizer.find_match(&code).unwrap().unwrap();
        assert_eq!(rule, "remove_nop");
        assert_eq!(code.get(at), Some(&Nop));
        // find_match leaves the body alone
        assert_eq!(code.len(), 2);
        assert_eq!(optimizer.find_match(&optimized(vec![Iload(0), Nop])).unwrap(), None);
    }

    #[test]
    fn test_config_from_json() {
        let config: OptimizerConfig = serde_json::from_str(r#"{"jumps": false, "max_rewrites": 50}"#).unwrap();
        assert!(config.stack);
        assert!(!config.jumps);
        assert_eq!(config.max_rewrites, Some(50));
    }
}
