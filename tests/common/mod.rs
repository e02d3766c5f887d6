//! Shared test helpers for integration tests

#![allow(dead_code)]

use joosopt::machine::{ExecutionState, Machine, Trap};
use joosopt::{Code, Instruction, Instruction::*, LabelId, Optimizer};
use rand::rngs::StdRng;
use rand::Rng;

/// Number of local slots the generated bodies use
pub const SLOTS: u16 = 6;

/// Slot reserved for loop counters
const COUNTER: u16 = SLOTS - 1;

/// Optimize `instrs` with the default optimizer and check the label table
pub fn optimized(instrs: Vec<Instruction>) -> Vec<Instruction> {
    let mut code = Code::from_instructions(instrs).unwrap();
    Optimizer::new().optimize(&mut code).unwrap();
    code.verify().unwrap();
    code.instructions()
}

/// Run a body with the given locals and a generous fuel budget
pub fn run(code: &[Instruction], locals: &[i32]) -> Result<ExecutionState, Trap> {
    Machine::new(locals.to_vec()).with_fuel(1_000_000).run(code)
}

/// Assert that `before` and `after` end in the same stack and locals, or
/// stop with the same trap
pub fn assert_equivalent(before: &[Instruction], after: &[Instruction], locals: &[i32]) {
    let expected = run(before, locals);
    let actual = run(after, locals);
    match (expected, actual) {
        (Ok(expected), Ok(actual)) => {
            assert_eq!(
                (expected.stack, expected.locals),
                (actual.stack, actual.locals),
                "\nbefore: {:?}\nafter: {:?}\nlocals: {:?}",
                before,
                after,
                locals
            );
        }
        (expected, actual) => assert_eq!(
            expected, actual,
            "\nbefore: {:?}\nafter: {:?}\nlocals: {:?}",
            before, after, locals
        ),
    }
}

/// Random locals in a range that keeps loops short and hits small constants
pub fn random_locals(rng: &mut StdRng) -> Vec<i32> {
    (0..SLOTS)
        .map(|_| match rng.gen_range(0..4) {
            0 => 0,
            1 => rng.gen_range(-3..=3),
            2 => rng.gen_range(-200..=200),
            _ => rng.gen(),
        })
        .collect()
}

/// Generator of well-formed, stack-balanced bodies shaped like the output of
/// a JOOS code generator: expressions, assignments, increments, `if`/`else`,
/// bounded loops and materialized booleans.
pub struct BodyGen<'a> {
    rng: &'a mut StdRng,
    code: Vec<Instruction>,
    next_label: LabelId,
}

impl<'a> BodyGen<'a> {
    pub fn new(rng: &'a mut StdRng) -> Self {
        Self {
            rng,
            code: Vec::new(),
            next_label: 1,
        }
    }

    /// A body of `statements` statements. Every slot is loaded at the end so
    /// that the final stack exposes every local.
    pub fn body(mut self, statements: usize) -> Vec<Instruction> {
        for _ in 0..statements {
            self.statement(3, true);
        }
        for slot in 0..SLOTS {
            self.code.push(Iload(slot));
        }
        self.code
    }

    fn label(&mut self) -> LabelId {
        // hand out ids in a scrambled order so chains go both ways
        let id = self.next_label * 7 % 1009;
        self.next_label += 1;
        id
    }

    fn slot(&mut self) -> u16 {
        self.rng.gen_range(0..COUNTER)
    }

    fn constant(&mut self) -> i32 {
        const INTERESTING: [i32; 14] = [0, 1, 2, -1, -2, 3, 5, 127, 128, -128, -129, 255, i32::MAX, i32::MIN];
        if self.rng.gen_bool(0.8) {
            INTERESTING[self.rng.gen_range(0..INTERESTING.len())]
        } else {
            self.rng.gen()
        }
    }

    fn statement(&mut self, depth: u32, loops: bool) {
        let choice = if depth == 0 { self.rng.gen_range(0..7) } else { self.rng.gen_range(0..10) };
        match choice {
            0 => {
                self.expression(depth);
                let slot = self.slot();
                self.code.push(Istore(slot));
            }
            1 => {
                self.expression(depth);
                self.code.push(Pop);
            }
            2 => {
                self.expression(depth);
                let slot = self.slot();
                self.code.extend([Dup, Istore(slot), Pop]);
            }
            3 => {
                let slot = self.slot();
                let k = self.rng.gen_range(-130..=130);
                match self.rng.gen_range(0..3) {
                    0 => self.code.extend([Iload(slot), LdcInt(k), Iadd, Istore(slot)]),
                    1 => self.code.extend([Iload(slot), LdcInt(k), Isub, Istore(slot)]),
                    _ => self.code.push(Iinc(slot, k.clamp(-128, 127) as i8)),
                }
            }
            4 => self.code.push(Nop),
            5 => {
                let (from, to) = (self.slot(), self.slot());
                self.code.extend([Aload(from), Astore(to)]);
            }
            6 => {
                let slot = self.slot();
                self.code.extend([Iload(slot), Istore(slot)]);
            }
            7 | 8 => self.if_else(depth, loops),
            _ if loops => self.bounded_loop(depth),
            _ => self.if_else(depth, loops),
        }
    }

    fn if_else(&mut self, depth: u32, loops: bool) {
        let (otherwise, end) = (self.label(), self.label());
        self.condition(depth, otherwise);
        for _ in 0..self.rng.gen_range(0..3) {
            self.statement(depth - 1, loops);
        }
        if self.rng.gen_bool(0.7) {
            self.code.extend([Goto(end), Label(otherwise)]);
            for _ in 0..self.rng.gen_range(0..3) {
                self.statement(depth - 1, loops);
            }
            self.code.push(Label(end));
        } else {
            self.code.push(Label(otherwise));
        }
    }

    /// `counter = n; while (counter != 0) { ...; counter-- }`
    fn bounded_loop(&mut self, depth: u32) {
        let (top, end) = (self.label(), self.label());
        let n = self.rng.gen_range(0..4);
        self.code.extend([LdcInt(n), Istore(COUNTER), Label(top), Iload(COUNTER), Ifeq(end)]);
        for _ in 0..self.rng.gen_range(1..3) {
            self.statement(depth - 1, false);
        }
        self.code.extend([Iinc(COUNTER, -1), Goto(top), Label(end)]);
    }

    /// Jump to `target` when the generated condition is false
    fn condition(&mut self, depth: u32, target: LabelId) {
        match self.rng.gen_range(0..4) {
            0 => {
                let k = self.constant();
                self.code.push(LdcInt(k));
                self.code.push(Ifeq(target));
            }
            1 => {
                self.expression(depth - 1);
                let branch = if self.rng.gen_bool(0.5) { Ifeq(target) } else { Ifne(target) };
                self.code.push(branch);
            }
            2 => {
                self.boolean(depth - 1);
                self.code.push(Ifeq(target));
            }
            _ => {
                self.expression(depth - 1);
                self.expression(depth - 1);
                let branch = self.comparison(target);
                self.code.push(branch);
            }
        }
    }

    fn comparison(&mut self, target: LabelId) -> Instruction {
        match self.rng.gen_range(0..6) {
            0 => IfIcmpeq(target),
            1 => IfIcmpne(target),
            2 => IfIcmpge(target),
            3 => IfIcmple(target),
            4 => IfIcmpgt(target),
            _ => IfIcmplt(target),
        }
    }

    /// `a <op> b ? 1 : 0` the way JOOS materializes comparisons
    fn boolean(&mut self, depth: u32) {
        let (yes, end) = (self.label(), self.label());
        self.expression(depth);
        self.expression(depth);
        let branch = self.comparison(yes);
        let (t, u) = if self.rng.gen_bool(0.5) { (0, 1) } else { (1, 0) };
        self.code.extend([branch, LdcInt(t), Goto(end), Label(yes), LdcInt(u), Label(end)]);
    }

    /// Push exactly one value
    fn expression(&mut self, depth: u32) {
        let choice = if depth == 0 { self.rng.gen_range(0..2) } else { self.rng.gen_range(0..8) };
        match choice {
            0 => {
                let slot = self.slot();
                self.code.push(Iload(slot));
            }
            1 => {
                let k = self.constant();
                self.code.push(LdcInt(k));
            }
            2 | 3 => {
                self.expression(depth - 1);
                self.expression(depth - 1);
                let op = [Iadd, Isub, Imul, Idiv, Irem][self.rng.gen_range(0..5)];
                self.code.push(op);
            }
            4 => {
                let slot = self.slot();
                let k = self.constant();
                if self.rng.gen_bool(0.5) {
                    self.code.extend([Iload(slot), LdcInt(k), Imul]);
                } else {
                    self.code.extend([LdcInt(k), Iload(slot), Imul]);
                }
            }
            5 => {
                self.expression(depth - 1);
                self.code.push(Ineg);
            }
            6 => {
                // assignment used as a value
                self.expression(depth - 1);
                let slot = self.slot();
                self.code.extend([Dup, Istore(slot)]);
            }
            _ => self.boolean(depth - 1),
        }
    }
}
