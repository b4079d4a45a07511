//! Decoded method bodies
//!
//! A [`MethodCode`] is the input the structural analyses work over: the
//! method's instructions in physical order, plus its exception-handler table.
//! Instructions are addressed by [`InsnId`], an opaque index-based handle.
//! Anything that was a bytecode offset in the class file (jump targets,
//! handler ranges) has already been resolved to an [`InsnId`] by the decoder,
//! so nothing in here deals with widths, padding or the `wide` prefix - the
//! instruction set is condensed to one variant per opcode family (see
//! [`Instruction`]).

mod handle;
mod instructions;
mod method;

pub use handle::*;
pub use instructions::*;
pub use method::*;
