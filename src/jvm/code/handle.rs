use std::fmt;

/// Opaque handle to one instruction in a method body
///
/// Handles are only meaningful together with the [`MethodCode`] that issued
/// them; the physical successor of `InsnId(n)` is `InsnId(n + 1)`, when it
/// exists.
///
/// [`MethodCode`]: crate::jvm::code::MethodCode
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct InsnId(pub usize);

impl fmt::Debug for InsnId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("i{}", self.0))
    }
}
