//! Action space representation.
//!
//! An action is either a single discrete index or a composite key holding one
//! index per action dimension. The full list of possible actions is enumerated
//! once when the space is built, and the tree addresses children by their
//! ordinal in that list.

use serde::{Deserialize, Serialize};

/// A concrete action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Index into a one-dimensional action space.
    Discrete(usize),
    /// One value index per action dimension.
    Composite(Vec<usize>),
}

impl Action {
    /// Per-dimension component indices (a single component for discrete actions).
    pub fn components(&self) -> &[usize] {
        match self {
            Action::Discrete(a) => std::slice::from_ref(a),
            Action::Composite(indices) => indices,
        }
    }
}

/// Shape of the action space.
#[derive(Debug, Clone)]
pub struct ActionSpace {
    kind: ActionSpaceKind,
    actions: Vec<Action>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionSpaceKind {
    Discrete { n: usize },
    Composite { dims: usize, values_per_dim: usize },
}

impl ActionSpace {
    /// A one-dimensional space of `n` actions. `n` may be 0; the search
    /// rejects empty spaces.
    pub fn discrete(n: usize) -> Self {
        Self {
            kind: ActionSpaceKind::Discrete { n },
            actions: (0..n).map(Action::Discrete).collect(),
        }
    }

    /// A `dims`-dimensional space with `values_per_dim` choices per dimension.
    ///
    /// Actions are enumerated in row-major order (last dimension varies fastest).
    pub fn composite(dims: usize, values_per_dim: usize) -> Self {
        assert!(
            dims > 0 && values_per_dim > 0,
            "composite action space needs at least one dimension and one value"
        );
        let total = values_per_dim.pow(dims as u32);
        let actions = (0..total)
            .map(|mut ordinal| {
                let mut indices = vec![0; dims];
                for slot in indices.iter_mut().rev() {
                    *slot = ordinal % values_per_dim;
                    ordinal /= values_per_dim;
                }
                Action::Composite(indices)
            })
            .collect();
        Self {
            kind: ActionSpaceKind::Composite {
                dims,
                values_per_dim,
            },
            actions,
        }
    }

    /// Number of action dimensions (1 for discrete spaces).
    #[inline]
    pub fn dims(&self) -> usize {
        match self.kind {
            ActionSpaceKind::Discrete { .. } => 1,
            ActionSpaceKind::Composite { dims, .. } => dims,
        }
    }

    /// Number of choices in each dimension.
    #[inline]
    pub fn values_per_dim(&self) -> usize {
        match self.kind {
            ActionSpaceKind::Discrete { n } => n,
            ActionSpaceKind::Composite { values_per_dim, .. } => values_per_dim,
        }
    }

    /// Total number of distinct actions.
    #[inline]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Whether this is a multi-dimensional space.
    #[inline]
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, ActionSpaceKind::Composite { .. })
    }

    /// All possible actions, indexed by ordinal.
    #[inline]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// The action with the given ordinal.
    #[inline]
    pub fn action(&self, ordinal: usize) -> &Action {
        &self.actions[ordinal]
    }

    /// Ordinal of an action, if it belongs to this space.
    pub fn ordinal(&self, action: &Action) -> Option<usize> {
        let components = action.components();
        if components.len() != self.dims() {
            return None;
        }
        let width = self.values_per_dim();
        components.iter().try_fold(0usize, |acc, &c| {
            (c < width).then_some(acc * width + c)
        })
    }

    /// Prior probability of the action with the given ordinal: the product of
    /// the per-dimension policy probabilities for its components.
    pub fn prior(&self, policy: &[Vec<f32>], ordinal: usize) -> f32 {
        self.actions[ordinal]
            .components()
            .iter()
            .zip(policy)
            .map(|(&c, dim_policy)| dim_policy[c])
            .product()
    }
}
