//! Structural bytecode verification
//!
//! Before a verifier can run type inference over a method that uses the
//! `jsr`/`ret` instruction family, it has to know which instructions make up
//! which subroutine - a `ret` doesn't mean anything on its own, only relative
//! to the region it leaves. The class-file specification is notoriously vague
//! about what a subroutine *is*, so this module pins down a stricter,
//! decidable notion and checks it: see [`Subroutines`].
//!
//! Everything here is pure graph work over an already-decoded
//! [`crate::jvm::code::MethodCode`]. A method is either analyzed completely
//! or rejected with a [`crate::jvm::StructuralError`]; there is no partial
//! result. Whether the method would actually *run* correctly (types, stack
//! depths, falling off the end of the code array) is for other passes to
//! decide.

mod subroutines;

pub use subroutines::*;
