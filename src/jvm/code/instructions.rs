use super::InsnId;

/// Decoded JVM bytecode instruction
///
/// The representation is slightly different from the usual presentation to
/// make it more convenient to analyze:
///
///   - The "wide" instruction doesn't show up at all, but instead gets merged
///     into the instructions it is allowed to modify
///
///   - Some instructions (like the conditional branches) get abstracted into
///     one instruction with a field, which helps with repetitive pattern
///     matches
///
///   - Jump operands are [`InsnId`]s, not bytecode offsets - resolving
///     offsets is the decoder's problem
///
/// Only the opcode families that matter to structural analysis are spelled
/// out individually: local-variable accesses, branches, `jsr`/`ret` and the
/// method terminators. The remaining straight-line opcodes are represented by
/// a handful of stand-ins since the analyses never distinguish them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConst(i32), // covers `iconst_<n>`, `bipush`, `sipush`
    LConst(i64), // covers `lconst_<n>`
    Pop,
    Dup,
    Swap,
    IAdd,
    ISub,
    IMul,
    IAnd,
    IOr,
    IXor,
    ILoad(u16), // covers `iload`, `iload_<n>`, `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IStore(u16), // covers `istore`, `istore_<n>`, `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    Goto(InsnId),   // covers `goto`, `goto_w`
    If(OrdComparison, InsnId), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, InsnId), // covers `if_icmpeq`, ... `if_icmple`
    IfACmp(EqComparison, InsnId), // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, InsnId), // covers `ifnull`, `ifnonnull`
    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len()`
        default: InsnId,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<InsnId>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: InsnId,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, InsnId)>,
    },
    Jsr(InsnId), // covers `jsr`, `jsr_w`
    Ret(u16),    // covers `ret`, `wide ret`
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
}

impl Instruction {
    /// Is this an instruction of the `jsr` family?
    pub fn is_jsr(&self) -> bool {
        matches!(self, Instruction::Jsr(_))
    }

    /// Entry instruction of the subroutine this `jsr` calls
    pub fn jsr_target(&self) -> Option<InsnId> {
        match self {
            Instruction::Jsr(target) => Some(*target),
            _ => None,
        }
    }

    /// Does this instruction return from the enclosing method?
    pub fn is_method_return(&self) -> bool {
        matches!(
            self,
            Instruction::IReturn
                | Instruction::LReturn
                | Instruction::FReturn
                | Instruction::DReturn
                | Instruction::AReturn
                | Instruction::Return
        )
    }

    /// Every explicit branch target of this instruction (the `jsr` target
    /// included)
    pub fn jump_targets(&self) -> Vec<InsnId> {
        match self {
            Instruction::Goto(target)
            | Instruction::If(_, target)
            | Instruction::IfICmp(_, target)
            | Instruction::IfACmp(_, target)
            | Instruction::IfNull(_, target)
            | Instruction::Jsr(target) => vec![*target],
            Instruction::TableSwitch {
                default, targets, ..
            } => {
                let mut out = Vec::with_capacity(targets.len() + 1);
                out.push(*default);
                out.extend_from_slice(targets);
                out
            }
            Instruction::LookupSwitch { default, targets } => {
                let mut out = Vec::with_capacity(targets.len() + 1);
                out.push(*default);
                out.extend(targets.iter().map(|(_, target)| *target));
                out
            }
            _ => vec![],
        }
    }

    /// The local-variable slot this instruction reads or writes, if any
    ///
    /// `ret` counts: it reads the return address out of its slot. Accesses of
    /// `long` and `double` values claim two slots, reflected in the reported
    /// width.
    pub fn accessed_local(&self) -> Option<LocalAccess> {
        let (slot, width) = match *self {
            Instruction::ILoad(slot)
            | Instruction::FLoad(slot)
            | Instruction::ALoad(slot)
            | Instruction::IStore(slot)
            | Instruction::FStore(slot)
            | Instruction::AStore(slot)
            | Instruction::IInc(slot, _)
            | Instruction::Ret(slot) => (slot, 1),
            Instruction::LLoad(slot)
            | Instruction::DLoad(slot)
            | Instruction::LStore(slot)
            | Instruction::DStore(slot) => (slot, 2),
            _ => return None,
        };
        Some(LocalAccess { slot, width })
    }
}

/// A direct read or write of a local-variable slot
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LocalAccess {
    /// First slot touched
    pub slot: u16,

    /// Number of consecutive slots claimed (2 for `long` and `double`)
    pub width: u16,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}
