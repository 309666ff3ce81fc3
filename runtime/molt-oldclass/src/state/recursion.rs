use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

use crate::error::{OldClassError, OpResult};
use crate::object::Value;
use crate::object::dict::ObjectKey;

/// Which comparison entry point pushed a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Cmp,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Identifies one in-progress comparison: a single object, or an object
/// and whatever it is being compared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareMarker {
    Single(CompareOp, usize),
    Pair(CompareOp, usize, u64),
}

impl CompareMarker {
    /// `None` when `lhs` has no identity; comparisons between plain values
    /// cannot re-enter user code.
    pub fn for_operands(op: CompareOp, lhs: &Value, rhs: &Value) -> Option<Self> {
        let left = lhs.identity()?;
        if let Some(right) = rhs.identity() {
            return Some(Self::Pair(op, left, right as u64));
        }
        match ObjectKey::from_value(rhs) {
            Ok(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                Some(Self::Pair(op, left, hasher.finish()))
            }
            Err(_) => Some(Self::Single(op, left)),
        }
    }
}

/// Stack of the comparisons running on one call context.
///
/// Re-entering a comparison that is already on the stack, or nesting deeper
/// than the limit, fails with `RecursionExceeded`.
#[derive(Debug)]
pub struct ComparisonGuard {
    stack: SmallVec<[CompareMarker; 8]>,
    limit: usize,
}

impl ComparisonGuard {
    pub fn new(limit: usize) -> Self {
        Self {
            stack: SmallVec::new(),
            limit,
        }
    }

    pub fn enter(&mut self, marker: CompareMarker) -> OpResult<()> {
        if self.stack.len() >= self.limit || self.stack.contains(&marker) {
            tracing::debug!(?marker, depth = self.stack.len(), "comparison recursion rejected");
            return Err(OldClassError::RecursionExceeded);
        }
        self.stack.push(marker);
        Ok(())
    }

    /// Pops `marker`. Markers left above it by an unbalanced caller are
    /// discarded with it.
    pub fn exit(&mut self, marker: CompareMarker) {
        match self.stack.iter().rposition(|active| *active == marker) {
            Some(idx) if idx + 1 == self.stack.len() => {
                self.stack.pop();
            }
            Some(idx) => {
                tracing::warn!(
                    ?marker,
                    depth = self.stack.len(),
                    "comparison guard exited out of order"
                );
                self.stack.truncate(idx);
            }
            None => tracing::warn!(?marker, "comparison guard exited without entering"),
        }
    }

    pub fn is_active(&self, marker: &CompareMarker) -> bool {
        self.stack.contains(marker)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
