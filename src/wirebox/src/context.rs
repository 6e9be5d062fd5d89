use std::fmt::{Display, Formatter, Result as FmtResult};

/// An opaque identity of one logical execution scope, e.g. one inbound
/// request.
///
/// A [`ContextId`] is minted by the surrounding runtime whenever it opens a
/// new execution scope and is destroyed by the same runtime when that scope
/// ends. This crate never creates or retires context identities on its own,
/// it only keys per-context instance storage by them. Two identities compare
/// equal if and only if they denote the same logical scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId {
    id: u64,
}

/// The distinguished context denoting the shared, process-wide instance slot.
///
/// Every wrapper holds a record for this context from the moment it is
/// constructed. It is the canonical fallback whenever a component's whole
/// dependency tree turns out to be shareable.
pub const STATIC_CONTEXT: ContextId = ContextId { id: 1 };

impl ContextId {
    pub const fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(self) -> u64 {
        self.id
    }

    /// Returns true if this identity denotes [`STATIC_CONTEXT`].
    pub fn is_static(self) -> bool {
        self == STATIC_CONTEXT
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "context#{}", self.id)
    }
}
