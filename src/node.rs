use crate::reference::Ref;
use crate::types::Var;
use crate::utils::{pairing3, MyHash};

/// A decision node: `if variable then high else low`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Node {
    pub variable: Var,
    pub low: Ref,
    pub high: Ref,
}

impl Node {
    pub fn terminal() -> Self {
        Self::default()
    }

    pub fn is_terminal(&self) -> bool {
        self.variable.is_terminal()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self {
            variable: Var::TERMINAL,
            low: Ref::ZERO,
            high: Ref::ZERO,
        }
    }
}

impl MyHash for Node {
    fn hash(&self) -> u64 {
        pairing3(
            self.variable.id() as u64,
            self.low.raw() as u64,
            self.high.raw() as u64,
        )
    }
}
