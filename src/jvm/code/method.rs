use super::{InsnId, Instruction};

/// One entry of a method's exception-handler table
///
/// The protected range runs from `start` to `end` *inclusive on both ends*,
/// matching the handler records of the class-file `Code` attribute after
/// offset resolution.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ExceptionHandler {
    /// First protected instruction
    pub start: InsnId,

    /// Last protected instruction (inclusive)
    pub end: InsnId,

    /// Instruction control jumps to when the handler fires
    pub handler: InsnId,
}

/// A single decoded method body
///
/// Owns the instructions and the handler table; everything downstream refers
/// back into it through [`InsnId`]s. The sequence is immutable once built -
/// analyses may hold ids across calls without invalidation concerns.
#[derive(Clone, Debug)]
pub struct MethodCode {
    instructions: Vec<Instruction>,
    handlers: Vec<ExceptionHandler>,
}

impl MethodCode {
    /// Assemble a method body from decoded instructions and handler records
    ///
    /// All jump targets and handler endpoints must already be resolved to
    /// valid ids. A decoder handing out ids that are out of bounds (or an
    /// inverted handler range) is a bug in the decoder, so those cases panic
    /// instead of being reported as method defects.
    pub fn new(instructions: Vec<Instruction>, handlers: Vec<ExceptionHandler>) -> MethodCode {
        assert!(
            !instructions.is_empty(),
            "a method body contains at least one instruction"
        );
        for (index, insn) in instructions.iter().enumerate() {
            for target in insn.jump_targets() {
                assert!(
                    target.0 < instructions.len(),
                    "{:?} jumps to {:?}, past the end of the method",
                    InsnId(index),
                    target,
                );
            }
        }
        for handler in &handlers {
            assert!(
                handler.start <= handler.end,
                "exception handler has an inverted protected range: {:?}",
                handler,
            );
            assert!(
                handler.end.0 < instructions.len() && handler.handler.0 < instructions.len(),
                "exception handler reaches past the end of the method: {:?}",
                handler,
            );
        }
        MethodCode {
            instructions,
            handlers,
        }
    }

    /// First instruction of the method
    pub fn entry(&self) -> InsnId {
        InsnId(0)
    }

    /// Look up an instruction by its handle
    pub fn instruction(&self, id: InsnId) -> &Instruction {
        &self.instructions[id.0]
    }

    /// Physical successor of an instruction, if it has one
    pub fn next(&self, id: InsnId) -> Option<InsnId> {
        if id.0 + 1 < self.instructions.len() {
            Some(InsnId(id.0 + 1))
        } else {
            None
        }
    }

    /// Ids of every instruction, in physical order
    pub fn ids(&self) -> impl Iterator<Item = InsnId> {
        (0..self.instructions.len()).map(InsnId)
    }

    /// Instructions paired with their ids, in physical order
    pub fn iter(&self) -> impl Iterator<Item = (InsnId, &Instruction)> {
        self.instructions
            .iter()
            .enumerate()
            .map(|(index, insn)| (InsnId(index), insn))
    }

    /// The method's exception-handler table
    pub fn handlers(&self) -> &[ExceptionHandler] {
        &self.handlers
    }

    /// Number of instructions in the method
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
