//! Program container: the bodies of a compiled JOOS program as JSON
//!
//! A program is a list of method and constructor bodies in the shape the
//! code generator emits them:
//!
//! ```json
//! {
//!   "methods": [
//!     {
//!       "name": "Counter.next",
//!       "kind": "method",
//!       "code": [{"iload": 1}, {"ldc_int": 1}, "iadd", {"istore": 1}],
//!       "labels": []
//!     }
//!   ]
//! }
//! ```

use crate::bytecode::{Code, Instruction, LabelId};
use crate::error::{Error, Result};
use crate::optimizer::{OptimizeStats, Optimizer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Whether a body belongs to a method or a constructor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    Method,
    Constructor,
}

/// Debug name of a label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelName {
    pub id: LabelId,
    pub name: String,
}

/// One method or constructor body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBody {
    pub name: String,
    pub kind: BodyKind,
    pub code: Vec<Instruction>,
    /// Names for labels; labels without an entry are called `L<id>`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LabelName>,
}

impl MethodBody {
    /// Build the arena form with accurate label reference counts
    pub fn to_code(&self) -> Result<Code> {
        Code::with_label_names(
            self.code.iter().copied(),
            self.labels.iter().map(|l| (l.id, l.name.clone())),
        )
        .map_err(|err| match err {
            Error::MalformedBody(message) => {
                Error::malformed(format!("{}: {}", self.name, message))
            }
            other => other,
        })
    }

    /// Replace the instructions and label names with those of `code`
    pub fn store(&mut self, code: &Code) {
        self.code = code.instructions();
        self.labels = code
            .labels()
            .iter()
            .filter(|entry| entry.name != format!("L{}", entry.id))
            .map(|entry| LabelName {
                id: entry.id,
                name: entry.name.clone(),
            })
            .collect();
    }
}

/// Outcome of optimizing one body
#[derive(Debug, Clone, Serialize)]
pub struct BodyReport {
    pub name: String,
    pub stats: OptimizeStats,
}

/// All bodies of one program
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub methods: Vec<MethodBody>,
}

impl Program {
    /// Parse a program from JSON text
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Render the program as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a program from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_json(&source)
    }

    /// Write the program to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Optimize every body in order.
    ///
    /// Bodies are rewritten on copies and written back only once all of them
    /// succeeded, so any error leaves the program untouched.
    pub fn optimize(&mut self, optimizer: &Optimizer) -> Result<Vec<BodyReport>> {
        let mut bodies = self
            .methods
            .iter()
            .map(MethodBody::to_code)
            .collect::<Result<Vec<_>>>()?;

        let mut reports = Vec::with_capacity(bodies.len());
        for (method, code) in self.methods.iter().zip(bodies.iter_mut()) {
            debug!(body = %method.name, "optimizing");
            reports.push(BodyReport {
                name: method.name.clone(),
                stats: optimizer.optimize(code)?,
            });
        }

        for (method, code) in self.methods.iter_mut().zip(&bodies) {
            method.store(code);
        }
        Ok(reports)
    }

    /// Statistics summed over all reports
    pub fn total(reports: &[BodyReport]) -> OptimizeStats {
        let mut total = OptimizeStats::default();
        for report in reports {
            total.merge(&report.stats);
        }
        total
    }

    /// Assembler listing of every body
    pub fn disassemble(&self) -> Result<String> {
        let mut out = String::new();
        for method in &self.methods {
            out.push_str(&method.to_code()?.disassemble(&method.name));
            out.push('\n');
        }
        Ok(out)
    }
}
