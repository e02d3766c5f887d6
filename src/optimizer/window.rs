//! Classification and window primitives used by the rules
//!
//! Every predicate takes an `Option<Pos>` so lookahead chains through
//! [`Code::next`] without unwrapping: `code.is_imul(code.after(code.after(Some(at))))`
//! is simply `false` when the body ends early. Predicates never mutate.

use crate::bytecode::{Code, Instruction, LabelId, Pos, Slot};

impl Code {
    fn at(&self, pos: Option<Pos>) -> Option<Instruction> {
        pos.and_then(|p| self.get(p)).copied()
    }

    /// `next` lifted over the end marker
    pub fn after(&self, pos: Option<Pos>) -> Option<Pos> {
        pos.and_then(|p| self.next(p))
    }

    pub fn is_iload(&self, pos: Option<Pos>) -> Option<Slot> {
        match self.at(pos)? {
            Instruction::Iload(slot) => Some(slot),
            _ => None,
        }
    }

    pub fn is_istore(&self, pos: Option<Pos>) -> Option<Slot> {
        match self.at(pos)? {
            Instruction::Istore(slot) => Some(slot),
            _ => None,
        }
    }

    pub fn is_aload(&self, pos: Option<Pos>) -> Option<Slot> {
        match self.at(pos)? {
            Instruction::Aload(slot) => Some(slot),
            _ => None,
        }
    }

    pub fn is_astore(&self, pos: Option<Pos>) -> Option<Slot> {
        match self.at(pos)? {
            Instruction::Astore(slot) => Some(slot),
            _ => None,
        }
    }

    pub fn is_iinc(&self, pos: Option<Pos>) -> Option<(Slot, i8)> {
        match self.at(pos)? {
            Instruction::Iinc(slot, k) => Some((slot, k)),
            _ => None,
        }
    }

    pub fn is_ldc_int(&self, pos: Option<Pos>) -> Option<i32> {
        match self.at(pos)? {
            Instruction::LdcInt(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_dup(&self, pos: Option<Pos>) -> bool {
        self.at(pos) == Some(Instruction::Dup)
    }

    pub fn is_pop(&self, pos: Option<Pos>) -> bool {
        self.at(pos) == Some(Instruction::Pop)
    }

    pub fn is_nop(&self, pos: Option<Pos>) -> bool {
        self.at(pos) == Some(Instruction::Nop)
    }

    pub fn is_iadd(&self, pos: Option<Pos>) -> bool {
        self.at(pos) == Some(Instruction::Iadd)
    }

    pub fn is_isub(&self, pos: Option<Pos>) -> bool {
        self.at(pos) == Some(Instruction::Isub)
    }

    pub fn is_imul(&self, pos: Option<Pos>) -> bool {
        self.at(pos) == Some(Instruction::Imul)
    }

    pub fn is_idiv(&self, pos: Option<Pos>) -> bool {
        self.at(pos) == Some(Instruction::Idiv)
    }

    pub fn is_irem(&self, pos: Option<Pos>) -> bool {
        self.at(pos) == Some(Instruction::Irem)
    }

    pub fn is_ineg(&self, pos: Option<Pos>) -> bool {
        self.at(pos) == Some(Instruction::Ineg)
    }

    pub fn is_goto(&self, pos: Option<Pos>) -> Option<LabelId> {
        match self.at(pos)? {
            Instruction::Goto(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_ifeq(&self, pos: Option<Pos>) -> Option<LabelId> {
        match self.at(pos)? {
            Instruction::Ifeq(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_ifne(&self, pos: Option<Pos>) -> Option<LabelId> {
        match self.at(pos)? {
            Instruction::Ifne(l) => Some(l),
            _ => None,
        }
    }

    /// Any of the six `if_icmp*` comparisons
    pub fn is_if_icmp(&self, pos: Option<Pos>) -> Option<LabelId> {
        use Instruction::*;
        match self.at(pos)? {
            IfIcmpeq(l) | IfIcmpne(l) | IfIcmpge(l) | IfIcmple(l) | IfIcmpgt(l) | IfIcmplt(l) => {
                Some(l)
            }
            _ => None,
        }
    }

    /// Any jump that may fall through, returned whole so it can be negated
    pub fn is_conditional(&self, pos: Option<Pos>) -> Option<Instruction> {
        self.at(pos).filter(Instruction::is_conditional)
    }

    pub fn is_label(&self, pos: Option<Pos>) -> Option<LabelId> {
        match self.at(pos)? {
            Instruction::Label(l) => Some(l),
            _ => None,
        }
    }

    /// Target of the jump at `pos`, if it is one
    pub fn uses_label(&self, pos: Option<Pos>) -> Option<LabelId> {
        self.at(pos)?.target()
    }

    /// Whether control can arrive at `pos` by a jump: it defines a label that
    /// some jump still targets.
    pub fn is_label_destination(&self, pos: Option<Pos>) -> bool {
        let Some(id) = self.is_label(pos) else {
            return false;
        };
        self.labels()
            .get(id)
            .is_some_and(|entry| Some(entry.position) == pos && entry.references > 0)
    }

    /// Whether the load at `pos` is the last read of its slot before the
    /// slot is overwritten.
    ///
    /// Gives up (returns `false`) at the first jump or live label: past that
    /// point the window can no longer see every path that reads the slot.
    /// Running off the end of the body also returns `false`: the final locals
    /// are observable, so the slot must be overwritten before the body ends.
    pub fn is_last_value_load(&self, pos: Option<Pos>) -> bool {
        let Some(slot) = self.is_iload(pos).or_else(|| self.is_aload(pos)) else {
            return false;
        };

        let mut cursor = self.after(pos);
        while let Some(at) = cursor {
            match self.at(cursor) {
                Some(Instruction::Istore(s) | Instruction::Astore(s)) if s == slot => return true,
                Some(Instruction::Iload(s) | Instruction::Aload(s) | Instruction::Iinc(s, _))
                    if s == slot =>
                {
                    return false
                }
                _ => {}
            }
            if self.uses_label(cursor).is_some() || self.is_label_destination(cursor) {
                return false;
            }
            cursor = self.next(at);
        }
        false
    }
}
