use std::fmt::{Display, Formatter, Result as FmtResult};

/// A type that specifies how instances of a component are shared.
///
/// The scope of a component decides how many live instances of it may exist
/// at once and which execution context each instance belongs to:
///
/// - [`Scope::Default`]: one instance shared by every caller through the
///   whole process lifetime, provided the component's transitive dependency
///   tree is itself shareable.
/// - [`Scope::Request`]: one isolated instance per execution context. A
///   request-scoped component also forces every component depending on it,
///   directly or transitively, out of the shared slot.
/// - [`Scope::Transient`]: a fresh instance per resolution. A transient
///   component on its own does not make its dependents context-sensitive;
///   only its reachable subtree does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Scope {
    #[default]
    Default,
    Request,
    Transient,
}

impl Scope {
    /// Returns true if this scope on its own ties instances to a single
    /// execution context, regardless of what the component depends on.
    pub fn is_context_sensitive(self) -> bool {
        matches!(self, Self::Request)
    }

    /// Returns the name of the current scope in a string literal.
    pub fn to_str(&self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Request => "Request",
            Self::Transient => "Transient",
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_default_succeeds() {
        assert_eq!(Scope::default(), Scope::Default);
    }

    #[test]
    fn scope_is_context_sensitive_succeeds() {
        assert!(!Scope::Default.is_context_sensitive());
        assert!(Scope::Request.is_context_sensitive());
        assert!(!Scope::Transient.is_context_sensitive());
    }

    #[test]
    fn scope_display_succeeds() {
        assert_eq!(Scope::Default.to_string(), "Default");
        assert_eq!(Scope::Request.to_string(), "Request");
        assert_eq!(Scope::Transient.to_string(), "Transient");
    }
}
