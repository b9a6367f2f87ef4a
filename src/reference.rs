use std::fmt::{Display, Formatter};

/// A handle to a node in the unique table.
///
/// Index `0` is the table sentry and never denotes a node. The terminals
/// occupy the first two real slots.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Ref(u32);

impl Ref {
    /// The constant `false` terminal.
    pub const ZERO: Self = Self(1);
    /// The constant `true` terminal.
    pub const ONE: Self = Self(2);

    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the index of the node in the table.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Return the internal representation of the reference.
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == Self::ZERO.0
    }

    pub const fn is_one(self) -> bool {
        self.0 == Self::ONE.0
    }

    pub const fn is_terminal(self) -> bool {
        self.is_zero() || self.is_one()
    }

    /// Terminal for the given constant.
    pub const fn constant(value: bool) -> Self {
        if value {
            Self::ONE
        } else {
            Self::ZERO
        }
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::ZERO => write!(f, "@0"),
            Self::ONE => write!(f, "@1"),
            _ => write!(f, "@{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminals() {
        assert!(Ref::ZERO.is_zero());
        assert!(Ref::ONE.is_one());
        assert!(Ref::ZERO.is_terminal());
        assert!(Ref::ONE.is_terminal());
        assert!(!Ref::new(3).is_terminal());
        assert_eq!(Ref::constant(true), Ref::ONE);
        assert_eq!(Ref::constant(false), Ref::ZERO);
    }

    #[test]
    fn test_display() {
        assert_eq!(Ref::ZERO.to_string(), "@0");
        assert_eq!(Ref::ONE.to_string(), "@1");
        assert_eq!(Ref::new(42).to_string(), "@42");
    }
}
