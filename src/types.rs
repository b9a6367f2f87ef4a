//! Type-safe wrapper for decision variables.
//!
//! The variable identifier doubles as its position in the (fixed) variable
//! order: smaller identifiers are closer to the root.
use std::fmt;

/// A decision variable.
///
/// # Invariants
///
/// - [`Var::TERMINAL`] is reserved for the terminal nodes and compares
///   greater than every real variable, so `min` over variables always picks
///   the topmost decision.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Marker carried by the terminal nodes.
    pub const TERMINAL: Var = Var(u32::MAX);

    /// Creates a new variable with the given position in the order.
    ///
    /// # Panics
    ///
    /// Panics if `id` collides with the terminal marker.
    pub fn new(id: u32) -> Self {
        assert_ne!(id, u32::MAX, "Variable id is reserved for terminals");
        Var(id)
    }

    /// Returns the raw variable id.
    pub fn id(self) -> u32 {
        self.0
    }

    pub fn is_terminal(self) -> bool {
        self == Self::TERMINAL
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_terminal() {
            write!(f, "x⊥")
        } else {
            write!(f, "x{}", self.0)
        }
    }
}

impl From<Var> for u32 {
    fn from(var: Var) -> Self {
        var.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_creation() {
        let v0 = Var::new(0);
        let v1 = Var::new(1);
        assert_eq!(v0.id(), 0);
        assert_eq!(v1.id(), 1);
        assert!(v0 < v1);
        assert!(v1 < Var::TERMINAL);
    }

    #[test]
    #[should_panic(expected = "Variable id is reserved for terminals")]
    fn test_var_terminal_panics() {
        Var::new(u32::MAX);
    }

    #[test]
    fn test_display() {
        assert_eq!(Var::new(7).to_string(), "x7");
        assert_eq!(Var::TERMINAL.to_string(), "x⊥");
    }
}
