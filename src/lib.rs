//! joosopt: a peephole optimizer for JOOS bytecode
//!
//! joosopt takes the stack-machine code of each method and constructor body
//! produced by a JOOS code generator and rewrites it into equivalent, shorter
//! code. It slides a small window over the body, replaces instruction patterns
//! with cheaper ones, and keeps going until no pattern matches anywhere.
//!
//! # Quick Start
//!
//! ```
//! use joosopt::{Code, Instruction::*};
//!
//! fn main() -> joosopt::Result<()> {
//!     let mut code = Code::from_instructions(vec![Iload(1), LdcInt(0), Imul])?;
//!     joosopt::optimize(&mut code)?;
//!     assert_eq!(code.instructions(), vec![LdcInt(0)]);
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! | Module | Role |
//! |--------|------|
//! | [`bytecode`] | instructions, the body arena, the label table, splicing |
//! | [`optimizer`] | the rule set and the fixpoint driver |
//! | [`program`] | JSON container for a whole program's bodies |
//! | [`machine`] | reference interpreter used to check rewrites |

pub mod bytecode;
pub mod machine;
pub mod optimizer;
pub mod program;

mod error;

pub use bytecode::{Code, Instruction, LabelId, Pos, Slot};
pub use error::{Error, Result};
pub use optimizer::{optimize, OptimizeStats, Optimizer, OptimizerConfig};
pub use program::Program;

/// Version of joosopt
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
