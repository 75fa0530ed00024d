//! Opaque 32-bit handles naming host-owned entities.
//!
//! The core never dereferences a handle; it only passes them back into host
//! callbacks. Handle `0` is the well-known nil ("absent") handle.

/// Handle to a host-owned value (string, integer, double, list, dict, or a
/// host-defined foreign object).
///
/// Values live entirely on the host side of the ABI. The core moves these
/// handles between host callbacks but never inspects their contents directly.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ValueId(u32);

impl ValueId {
    /// The nil handle, denoting "absent" (also the `Default`).
    pub const NIL: Self = Self(0);

    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value for transport across an FFI boundary.
    #[inline]
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub fn is_nil(self) -> bool {
        self.0 == 0
    }
}

/// Handle naming an interpreter: frame stack, command table, last result,
/// return options, traces, and the recursion limit all hang off this handle
/// in host storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct InterpId(u32);

impl InterpId {
    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}
