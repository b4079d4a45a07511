//! JVM method-code analysis
//!
//! The types in this module split into two layers:
//!
//!   - [`code`] models a single decoded method body: an ordered sequence of
//!     [`code::Instruction`]s addressed by opaque [`code::InsnId`] handles,
//!     plus the method's exception-handler table. Producing one of these from
//!     a class file is the job of whatever decoder sits upstream.
//!
//!   - [`verifier`] consumes a [`code::MethodCode`] and checks structural
//!     properties of it. Currently that means the subroutine analysis: the
//!     partition of the method into `jsr`/`ret` call/return regions.
//!
//! Rejections of the method under analysis are reported as
//! [`StructuralError`]; defects in this crate or its caller (querying the
//! wrong region, handing out ids from a different method) are panics.

pub mod code;
mod errors;
pub mod verifier;

pub use errors::*;
