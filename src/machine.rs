//! Reference interpreter for JOOS bytecode bodies
//!
//! Runs a flat instruction slice on an `i32` operand stack and `i32` local
//! slots. References are modelled as plain integers: the optimizer never
//! inspects them, it only moves them between slots and the stack, so an
//! integer handle is enough to tell whether a rewrite preserved the data flow.
//!
//! Used to check that an optimized body behaves like the original.

use crate::bytecode::{Instruction, LabelId, Slot};
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

/// Default number of instructions a run may execute
pub const DEFAULT_FUEL: usize = 100_000;

/// Abnormal end of a run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Trap {
    #[error("division by zero")]
    DivisionByZero,

    #[error("stack underflow at instruction {0}")]
    StackUnderflow(usize),

    #[error("jump to unknown label {0}")]
    UnknownLabel(LabelId),

    #[error("slot {0} out of range")]
    SlotOutOfRange(Slot),

    #[error("out of fuel after {0} steps")]
    OutOfFuel(usize),
}

/// Observable state at the end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionState {
    /// Operand stack, bottom first
    pub stack: Vec<i32>,
    /// Local slots
    pub locals: Vec<i32>,
    /// Instructions executed, labels included
    pub steps: usize,
}

/// Stack machine over a single body
pub struct Machine {
    stack: Vec<i32>,
    locals: Vec<i32>,
    fuel: usize,
}

impl Machine {
    /// Create a machine with the given initial locals
    pub fn new(locals: Vec<i32>) -> Self {
        Self {
            stack: Vec::new(),
            locals,
            fuel: DEFAULT_FUEL,
        }
    }

    /// Limit the number of executed instructions
    pub fn with_fuel(mut self, fuel: usize) -> Self {
        self.fuel = fuel;
        self
    }

    /// Preload the operand stack, bottom first
    pub fn with_stack(mut self, stack: Vec<i32>) -> Self {
        self.stack = stack;
        self
    }

    /// Execute `code` from its first instruction until it falls off the end
    pub fn run(mut self, code: &[Instruction]) -> Result<ExecutionState, Trap> {
        let targets: HashMap<LabelId, usize> = code
            .iter()
            .enumerate()
            .filter_map(|(index, instr)| match instr {
                Instruction::Label(id) => Some((*id, index)),
                _ => None,
            })
            .collect();

        let mut ip = 0;
        let mut steps = 0;
        while let Some(&instr) = code.get(ip) {
            if steps == self.fuel {
                return Err(Trap::OutOfFuel(steps));
            }
            steps += 1;
            ip += 1;

            match instr {
                Instruction::Nop | Instruction::Label(_) => {}

                Instruction::Iload(slot) | Instruction::Aload(slot) => {
                    let value = *self.slot(slot)?;
                    self.stack.push(value);
                }

                Instruction::Istore(slot) | Instruction::Astore(slot) => {
                    let value = self.pop(ip)?;
                    *self.slot(slot)? = value;
                }

                Instruction::Iinc(slot, delta) => {
                    let local = self.slot(slot)?;
                    *local = local.wrapping_add(i32::from(delta));
                }

                Instruction::LdcInt(value) => self.stack.push(value),

                Instruction::Dup => {
                    let value = self.pop(ip)?;
                    self.stack.push(value);
                    self.stack.push(value);
                }

                Instruction::Pop => {
                    self.pop(ip)?;
                }

                Instruction::Iadd => self.binary(ip, |a, b| Ok(a.wrapping_add(b)))?,
                Instruction::Isub => self.binary(ip, |a, b| Ok(a.wrapping_sub(b)))?,
                Instruction::Imul => self.binary(ip, |a, b| Ok(a.wrapping_mul(b)))?,
                Instruction::Idiv => self.binary(ip, |a, b| match b {
                    0 => Err(Trap::DivisionByZero),
                    _ => Ok(a.wrapping_div(b)),
                })?,
                Instruction::Irem => self.binary(ip, |a, b| match b {
                    0 => Err(Trap::DivisionByZero),
                    _ => Ok(a.wrapping_rem(b)),
                })?,

                Instruction::Ineg => {
                    let value = self.pop(ip)?;
                    self.stack.push(value.wrapping_neg());
                }

                Instruction::Goto(label) => {
                    ip = Self::resolve(&targets, label)?;
                }

                Instruction::Ifeq(label) | Instruction::Ifne(label) => {
                    let value = self.pop(ip)?;
                    let taken = match instr {
                        Instruction::Ifeq(_) => value == 0,
                        _ => value != 0,
                    };
                    if taken {
                        ip = Self::resolve(&targets, label)?;
                    }
                }

                Instruction::IfIcmpeq(label)
                | Instruction::IfIcmpne(label)
                | Instruction::IfIcmpge(label)
                | Instruction::IfIcmple(label)
                | Instruction::IfIcmpgt(label)
                | Instruction::IfIcmplt(label) => {
                    let (a, b) = self.pop_binary(ip)?;
                    let taken = match instr {
                        Instruction::IfIcmpeq(_) => a == b,
                        Instruction::IfIcmpne(_) => a != b,
                        Instruction::IfIcmpge(_) => a >= b,
                        Instruction::IfIcmple(_) => a <= b,
                        Instruction::IfIcmpgt(_) => a > b,
                        _ => a < b,
                    };
                    if taken {
                        ip = Self::resolve(&targets, label)?;
                    }
                }
            }
        }

        Ok(ExecutionState {
            stack: self.stack,
            locals: self.locals,
            steps,
        })
    }

    fn resolve(targets: &HashMap<LabelId, usize>, label: LabelId) -> Result<usize, Trap> {
        targets.get(&label).copied().ok_or(Trap::UnknownLabel(label))
    }

    fn slot(&mut self, slot: Slot) -> Result<&mut i32, Trap> {
        self.locals
            .get_mut(usize::from(slot))
            .ok_or(Trap::SlotOutOfRange(slot))
    }

    fn pop(&mut self, ip: usize) -> Result<i32, Trap> {
        self.stack.pop().ok_or(Trap::StackUnderflow(ip - 1))
    }

    /// Pop two operands, returning them in push order
    fn pop_binary(&mut self, ip: usize) -> Result<(i32, i32), Trap> {
        let b = self.pop(ip)?;
        let a = self.pop(ip)?;
        Ok((a, b))
    }

    fn binary(
        &mut self,
        ip: usize,
        op: impl FnOnce(i32, i32) -> Result<i32, Trap>,
    ) -> Result<(), Trap> {
        let (a, b) = self.pop_binary(ip)?;
        self.stack.push(op(a, b)?);
        Ok(())
    }
}

/// Run `code` with the given locals and default fuel
pub fn execute(code: &[Instruction], locals: Vec<i32>) -> Result<ExecutionState, Trap> {
    Machine::new(locals).run(code)
}
