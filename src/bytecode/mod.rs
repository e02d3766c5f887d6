//! Bytecode representation of one method or constructor body
//!
//! A [`Code`] owns an arena of instruction nodes linked in program order and
//! the [`LabelTable`] describing its jump targets. Nodes are never moved or
//! reused: splicing marks the old nodes dead and appends new ones, so a
//! [`Pos`] stays valid (or detectably stale) for the whole optimization run.

mod labels;
mod opcode;

pub use labels::{LabelEntry, LabelTable};
pub use opcode::{Instruction, LabelId, Slot};

use crate::error::{Error, Result};
use rustc_hash::FxHashMap as HashMap;
use std::fmt;

/// Stable address of an instruction node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos(pub(crate) usize);

#[derive(Debug, Clone)]
struct Node {
    instr: Instruction,
    prev: Option<Pos>,
    next: Option<Pos>,
    live: bool,
}

/// Instruction sequence and label table of one body
#[derive(Debug, Clone, Default)]
pub struct Code {
    nodes: Vec<Node>,
    head: Option<Pos>,
    len: usize,
    labels: LabelTable,
}

impl Code {
    /// Create an empty body
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a body, naming every label `L<id>`
    pub fn from_instructions(instrs: impl IntoIterator<Item = Instruction>) -> Result<Self> {
        Self::with_label_names(instrs, std::iter::empty())
    }

    /// Build a body and its label table with accurate reference counts.
    ///
    /// Fails if a label is defined twice or a jump targets a label that is
    /// not defined in the sequence.
    pub fn with_label_names(
        instrs: impl IntoIterator<Item = Instruction>,
        names: impl IntoIterator<Item = (LabelId, String)>,
    ) -> Result<Self> {
        let mut code = Code::new();
        let mut definitions: Vec<(LabelId, Pos)> = Vec::new();
        let mut references: HashMap<LabelId, u32> = HashMap::default();

        let mut last = None;
        for instr in instrs {
            let pos = code.link_after(last, instr);
            if let Instruction::Label(id) = instr {
                definitions.push((id, pos));
            }
            if let Some(target) = instr.target() {
                *references.entry(target).or_insert(0) += 1;
            }
            last = Some(pos);
        }

        let mut names: HashMap<LabelId, String> = names.into_iter().collect();
        for (id, pos) in definitions {
            let name = names.remove(&id).unwrap_or_else(|| format!("L{}", id));
            let count = references.remove(&id).unwrap_or(0);
            code.labels
                .insert_new_label(id, name, pos, count)
                .map_err(|_| Error::malformed(format!("label {} is defined twice", id)))?;
        }
        if let Some(id) = references.keys().min() {
            return Err(Error::malformed(format!("jump to undefined label {}", id)));
        }
        Ok(code)
    }

    /// Position of the first instruction
    pub fn first(&self) -> Option<Pos> {
        self.head
    }

    /// Position following `pos`, or `None` at the end of the body
    pub fn next(&self, pos: Pos) -> Option<Pos> {
        self.nodes.get(pos.0).filter(|n| n.live).and_then(|n| n.next)
    }

    /// Instruction at `pos`, `None` if the position was spliced out
    pub fn get(&self, pos: Pos) -> Option<&Instruction> {
        self.nodes.get(pos.0).filter(|n| n.live).map(|n| &n.instr)
    }

    /// Instruction at `pos`, treating a stale position as an internal error
    pub fn instruction(&self, pos: Pos) -> Result<Instruction> {
        self.get(pos).copied().ok_or(Error::StalePosition(pos.0))
    }

    /// `N` consecutive instructions starting at `pos`, or `None` if the body
    /// ends first
    pub fn window<const N: usize>(&self, pos: Pos) -> Option<[Instruction; N]> {
        let mut out = [Instruction::Nop; N];
        let mut cursor = Some(pos);
        for slot in out.iter_mut() {
            let at = cursor?;
            *slot = *self.get(at)?;
            cursor = self.next(at);
        }
        Some(out)
    }

    /// Number of instructions, labels included
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the body has no instructions
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over `(position, instruction)` in program order
    pub fn iter(&self) -> impl Iterator<Item = (Pos, &Instruction)> + '_ {
        std::iter::successors(self.head, move |&pos| self.next(pos))
            .map(move |pos| (pos, &self.nodes[pos.0].instr))
    }

    /// Copy the sequence out in program order
    pub fn instructions(&self) -> Vec<Instruction> {
        self.iter().map(|(_, instr)| *instr).collect()
    }

    /// The label table
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// The label table, for rules that add or remove jump references
    pub fn labels_mut(&mut self) -> &mut LabelTable {
        &mut self.labels
    }

    /// Position of the `label` instruction defining `id`
    pub fn destination(&self, id: LabelId) -> Result<Pos> {
        let pos = self.labels.entry(id)?.position;
        match self.get(pos) {
            Some(Instruction::Label(found)) if *found == id => Ok(pos),
            _ => Err(Error::desync(id, format!("no label instruction at position {}", pos.0))),
        }
    }

    /// Delete exactly `n` instructions starting at `pos` and put `new` in
    /// their place. Returns the position of the first inserted instruction.
    ///
    /// Reference counts are left alone; the caller owns every
    /// `drop_label`/`copy_label` the rewrite implies.
    pub fn replace(
        &mut self,
        pos: Pos,
        n: usize,
        new: impl IntoIterator<Item = Instruction>,
    ) -> Result<Option<Pos>> {
        let prev = match self.nodes.get(pos.0) {
            Some(node) if node.live => node.prev,
            _ => return Err(Error::StalePosition(pos.0)),
        };

        let mut doomed = Vec::with_capacity(n);
        let mut cursor = Some(pos);
        while doomed.len() < n {
            match cursor {
                Some(at) => {
                    doomed.push(at);
                    cursor = self.nodes[at.0].next;
                }
                None => {
                    return Err(Error::WindowOverrun {
                        wanted: n,
                        available: doomed.len(),
                    })
                }
            }
        }
        let after = cursor;

        for at in doomed {
            self.nodes[at.0].live = false;
            self.len -= 1;
        }
        match prev {
            Some(p) => self.nodes[p.0].next = after,
            None => self.head = after,
        }
        if let Some(a) = after {
            self.nodes[a.0].prev = prev;
        }

        let mut first = None;
        let mut last = prev;
        for instr in new {
            let at = self.link_after(last, instr);
            if let Instruction::Label(id) = instr {
                self.labels.set_position(id, at);
            }
            first.get_or_insert(at);
            last = Some(at);
        }
        Ok(first)
    }

    /// Delete the single instruction at `pos`
    pub fn kill_line(&mut self, pos: Pos) -> Result<()> {
        self.replace(pos, 1, std::iter::empty()).map(|_| ())
    }

    /// Insert one instruction directly after `pos`
    pub fn insert_after(&mut self, pos: Pos, instr: Instruction) -> Result<Pos> {
        if self.get(pos).is_none() {
            return Err(Error::StalePosition(pos.0));
        }
        let at = self.link_after(Some(pos), instr);
        if let Instruction::Label(id) = instr {
            self.labels.set_position(id, at);
        }
        Ok(at)
    }

    /// Allocate a node and link it after `prev` (at the head for `None`)
    fn link_after(&mut self, prev: Option<Pos>, instr: Instruction) -> Pos {
        let at = Pos(self.nodes.len());
        let next = match prev {
            Some(p) => self.nodes[p.0].next,
            None => self.head,
        };
        self.nodes.push(Node {
            instr,
            prev,
            next,
            live: true,
        });
        match prev {
            Some(p) => self.nodes[p.0].next = Some(at),
            None => self.head = Some(at),
        }
        if let Some(n) = next {
            self.nodes[n.0].prev = Some(at);
        }
        self.len += 1;
        at
    }

    /// Recompute every reference count and label position from the sequence
    /// and compare with the table.
    pub fn verify(&self) -> Result<()> {
        let mut counts: HashMap<LabelId, u32> = HashMap::default();
        let mut defined: HashMap<LabelId, Pos> = HashMap::default();
        for (pos, instr) in self.iter() {
            if let Instruction::Label(id) = *instr {
                if defined.insert(id, pos).is_some() {
                    return Err(Error::desync(id, "defined twice"));
                }
            }
            if let Some(target) = instr.target() {
                *counts.entry(target).or_insert(0) += 1;
            }
        }

        for (&id, &pos) in &defined {
            let entry = self.labels.entry(id)?;
            if entry.position != pos {
                return Err(Error::desync(id, "table points at the wrong instruction"));
            }
            let actual = counts.remove(&id).unwrap_or(0);
            if entry.references != actual {
                return Err(Error::desync(
                    id,
                    format!("table count {}, sequence has {}", entry.references, actual),
                ));
            }
        }
        if let Some(&id) = counts.keys().min() {
            return Err(Error::UnknownLabel(id));
        }
        if let Some(entry) = self.labels.iter().find(|e| !defined.contains_key(&e.id)) {
            return Err(Error::desync(entry.id, "entry without a label instruction"));
        }
        Ok(())
    }

    /// Disassemble the body for debugging
    pub fn disassemble(&self, name: &str) -> String {
        let mut output = format!("== {} ==\n", name);
        for (_, instr) in self.iter() {
            output.push_str(&self.format_instruction(instr));
            output.push('\n');
        }
        output
    }

    fn label_name(&self, id: LabelId) -> String {
        self.labels
            .get(id)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| format!("L{}", id))
    }

    fn format_instruction(&self, instr: &Instruction) -> String {
        match *instr {
            Instruction::Label(id) => format!("{}:", self.label_name(id)),
            _ => match instr.target() {
                Some(id) => format!("  {} {}", instr.mnemonic(), self.label_name(id)),
                None => format!("  {}", instr),
            },
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (_, instr) in self.iter() {
            writeln!(f, "{}", self.format_instruction(instr))?;
        }
        Ok(())
    }
}
