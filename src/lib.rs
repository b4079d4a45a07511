//! Structural analysis of JVM method bytecode
//!
//! This crate answers one question about a decoded method body: is its use of
//! the `jsr`/`ret` instruction family well-formed, and if so, which
//! instructions belong to which subroutine? The entry point is
//! [`jvm::verifier::Subroutines`], which partitions a [`jvm::code::MethodCode`]
//! into disjoint call/return regions and validates the structural rules that
//! make those regions safe for later verification passes to reason about.
//!
//! Decoding class files into instruction sequences, type inference and stack
//! depth checking are all out of scope - this is the piece of a verifier that
//! sits between them.

pub mod jvm;
pub mod util;
