//! MCTS tree node representation.
//!
//! Each node represents a hypothetical latent state reached by taking an
//! action from its parent. Children are created one at a time, the first time
//! a simulation selects their action.

/// Index into the node arena. Using a newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn is_some(self) -> bool {
        !self.is_none()
    }
}

/// A node in the MCTS tree.
#[derive(Debug, Clone)]
pub struct MctsNode<L, H> {
    /// Parent node index (NONE for root). Non-owning.
    pub parent: NodeId,

    /// Ordinal of the action that led here from the parent (None for root).
    pub action: Option<usize>,

    /// Latent state produced by the model.
    pub latent: L,

    /// Recurrent carry passed to the dynamics of this node's children.
    pub hidden: Option<H>,

    /// Reward (or value prefix) of the transition into this node. 0 for root.
    pub reward: f32,

    /// Value predicted by the model at this node.
    pub value_prediction: f32,

    /// Policy probabilities predicted at this node, one vector per action dimension.
    pub policy_prediction: Vec<Vec<f32>>,

    /// Number of simulations that passed through or landed on this node.
    pub visit_count: u32,

    /// Running average of backed-up values.
    pub average_value: f32,

    /// One slot per action ordinal; None until expanded.
    pub children: Vec<Option<NodeId>>,
}

impl<L, H> MctsNode<L, H> {
    /// Create a new root node.
    pub fn new_root(
        latent: L,
        hidden: Option<H>,
        value_prediction: f32,
        policy_prediction: Vec<Vec<f32>>,
        num_actions: usize,
    ) -> Self {
        Self {
            parent: NodeId::NONE,
            action: None,
            latent,
            hidden,
            reward: 0.0,
            value_prediction,
            policy_prediction,
            visit_count: 0,
            average_value: value_prediction,
            children: vec![None; num_actions],
        }
    }

    /// Create a new child node.
    #[allow(clippy::too_many_arguments)]
    pub fn new_child(
        parent: NodeId,
        action: usize,
        latent: L,
        hidden: Option<H>,
        reward: f32,
        value_prediction: f32,
        policy_prediction: Vec<Vec<f32>>,
        num_actions: usize,
    ) -> Self {
        Self {
            parent,
            action: Some(action),
            latent,
            hidden,
            reward,
            value_prediction,
            policy_prediction,
            visit_count: 0,
            average_value: value_prediction,
            children: vec![None; num_actions],
        }
    }

    /// Fold a backed-up value into the running average and count the visit.
    ///
    /// Uses `avg' = (avg * n + v) / (n + 1)` with `n` taken before the visit
    /// is counted, as in the MuZero paper.
    #[inline]
    pub fn record_visit(&mut self, value: f32) {
        let n = self.visit_count as f32;
        self.average_value = (self.average_value * n + value) / (n + 1.0);
        self.visit_count += 1;
    }

    /// Check whether the child slot for `action` has been expanded.
    #[inline]
    pub fn is_expanded(&self, action: usize) -> bool {
        self.children[action].is_some()
    }

    /// Check if this node has no expanded children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    /// Sum of visits over all expanded children.
    pub fn child_visits(&self, arena: &[MctsNode<L, H>]) -> u32 {
        self.children
            .iter()
            .flatten()
            .map(|id| arena[id.0 as usize].visit_count)
            .sum()
    }

    /// Visit count per action ordinal (0 for unexpanded actions).
    pub fn visit_counts(&self, arena: &[MctsNode<L, H>]) -> Vec<u32> {
        self.children
            .iter()
            .map(|slot| slot.map_or(0, |id| arena[id.0 as usize].visit_count))
            .collect()
    }
}

/// UCB-style action score from Appendix B of MuZero.
///
/// `score = value + prior * sqrt(N) / (1 + n) * (c1 + ln((N + c2 + 1) / c2))`
/// where `N` is the total visit count over the parent's children and `n` the
/// visit count of the candidate child. `value` is expected to be normalized
/// already (0 for unexpanded children).
#[inline]
pub fn action_score(
    value: f32,
    prior: f32,
    child_visits: u32,
    total_visits: u32,
    pb_c_init: f32,
    pb_c_base: f32,
) -> f32 {
    let total = total_visits as f32;
    let explore_term = total.sqrt() / (1.0 + child_visits as f32);
    let balance_term = pb_c_init + ((total + pb_c_base + 1.0) / pb_c_base).ln();
    value + prior * explore_term * balance_term
}
