use crate::jvm::code::{ExceptionHandler, InsnId};
use std::fmt;

/// Structural rule broken by the method under analysis
///
/// Every variant describes a defect of the *input method*, not of this crate:
/// callers are expected to catch these and reject the method with a
/// diagnostic. The analysis aborts on the first violation - there is no
/// partially-built result to recover.
///
/// Region identity is reported as the region's entry instruction; `None`
/// stands for the top level, which has no callable entry.
#[derive(Debug, Eq, PartialEq)]
pub enum StructuralError {
    /// A `jsr` targets an instruction that does not store the return address
    /// into a local-variable slot
    EntryNotReturnAddressStore { entry: InsnId },

    /// An instruction is reachable from two different region entries
    SharedInstruction {
        instruction: InsnId,
        first_owner: Option<InsnId>,
        second_owner: Option<InsnId>,
    },

    /// A subroutine has no `ret` among its instructions
    MissingRet { entry: InsnId },

    /// A subroutine has more than one `ret` among its instructions
    MultipleRets {
        entry: InsnId,
        first: InsnId,
        second: InsnId,
    },

    /// A subroutine's `ret` reads a different slot than the one its entry
    /// stores the return address into
    MismatchedRetSlot {
        entry: InsnId,
        ret: InsnId,
        expected: u16,
        found: u16,
    },

    /// A subroutine instruction lies inside an exception handler's protected
    /// range
    ProtectedSubroutineInstruction {
        instruction: InsnId,
        handler: ExceptionHandler,
    },

    /// A subroutine is entered while another subroutine on the same call path
    /// already uses its return-address slot (this covers direct and mutual
    /// recursion, both of which would clobber a stored return address)
    ReturnSlotReuse {
        outer_entry: InsnId,
        inner_entry: InsnId,
        slot: u16,
    },
}

fn region_name(entry: &Option<InsnId>) -> String {
    match entry {
        Some(entry) => format!("the subroutine at {:?}", entry),
        None => String::from("the top level"),
    }
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralError::EntryNotReturnAddressStore { entry } => write!(
                f,
                "subroutine entry {:?} is not a return-address store",
                entry,
            ),
            StructuralError::SharedInstruction {
                instruction,
                first_owner,
                second_owner,
            } => write!(
                f,
                "instruction {:?} belongs to {} and {}",
                instruction,
                region_name(first_owner),
                region_name(second_owner),
            ),
            StructuralError::MissingRet { entry } => {
                write!(f, "the subroutine at {:?} has no ret", entry)
            }
            StructuralError::MultipleRets {
                entry,
                first,
                second,
            } => write!(
                f,
                "the subroutine at {:?} has more than one ret: {:?} and {:?}",
                entry, first, second,
            ),
            StructuralError::MismatchedRetSlot {
                entry,
                ret,
                expected,
                found,
            } => write!(
                f,
                "ret {:?} of the subroutine at {:?} reads slot {} where its entry stores into slot {}",
                ret, entry, found, expected,
            ),
            StructuralError::ProtectedSubroutineInstruction {
                instruction,
                handler,
            } => write!(
                f,
                "subroutine instruction {:?} is protected by the exception handler {:?}..={:?} -> {:?}",
                instruction, handler.start, handler.end, handler.handler,
            ),
            StructuralError::ReturnSlotReuse {
                outer_entry,
                inner_entry,
                slot,
            } => write!(
                f,
                "the subroutine at {:?} is called while slot {} already holds the return address of the subroutine at {:?}",
                inner_entry, slot, outer_entry,
            ),
        }
    }
}

impl std::error::Error for StructuralError {}
