//! MCTS tree structure with arena allocation.
//!
//! The tree uses arena allocation for efficient node storage and
//! cache-friendly traversal. Nodes are stored in a contiguous Vec
//! and referenced by NodeId indices. A node's children are held as one
//! optional slot per action ordinal, so the parent back-reference is the
//! only non-owning link.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha20Rng;

use crate::action::ActionSpace;
use crate::config::MctsConfig;
use crate::minmax::MinMaxStats;
use crate::node::{action_score, MctsNode, NodeId};

/// MCTS tree with arena-based node storage.
#[derive(Debug, Clone)]
pub struct MctsTree<L, H> {
    /// Arena storing all nodes
    nodes: Vec<MctsNode<L, H>>,

    /// Root node index (always 0 after initialization)
    root: NodeId,
}

impl<L, H> MctsTree<L, H> {
    /// Create a new tree from a root node.
    pub fn new(root_node: MctsNode<L, H>) -> Self {
        Self {
            nodes: vec![root_node],
            root: NodeId(0),
        }
    }

    /// Get the root node ID.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Get a reference to a node by ID.
    #[inline]
    pub fn get(&self, id: NodeId) -> &MctsNode<L, H> {
        &self.nodes[id.0 as usize]
    }

    /// Get a mutable reference to a node by ID.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut MctsNode<L, H> {
        &mut self.nodes[id.0 as usize]
    }

    /// Allocate a new node and return its ID.
    fn allocate(&mut self, node: MctsNode<L, H>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get the total number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty (should never be true after construction).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get the arena slice for read access.
    #[inline]
    pub fn arena(&self) -> &[MctsNode<L, H>] {
        &self.nodes
    }

    /// Attach `child` under `parent_id` at action slot `action`.
    ///
    /// # Panics
    /// If the slot is already expanded.
    pub fn insert_child(&mut self, parent_id: NodeId, action: usize, child: MctsNode<L, H>) -> NodeId {
        assert!(
            !self.get(parent_id).is_expanded(action),
            "action {} of node {} is already expanded",
            action,
            parent_id.0
        );
        let child_id = self.allocate(child);
        self.get_mut(parent_id).children[action] = Some(child_id);
        child_id
    }

    /// Score every action of a node and return the ordinal of the best one.
    ///
    /// Unexpanded actions score with a value of 0 and no visits. Ties at the
    /// maximum are broken uniformly at random.
    pub fn select_action(
        &self,
        node_id: NodeId,
        minmax: &MinMaxStats,
        space: &ActionSpace,
        config: &MctsConfig,
        rng: &mut ChaCha20Rng,
    ) -> usize {
        let node = self.get(node_id);
        let total_visits = node.child_visits(&self.nodes);

        let mut best_score = f32::NEG_INFINITY;
        let mut best = Vec::new();
        for (ordinal, slot) in node.children.iter().enumerate() {
            let (value, visits) = match slot {
                Some(id) => {
                    let child = self.get(*id);
                    (minmax.normalize(child.average_value), child.visit_count)
                }
                None => (0.0, 0),
            };
            let prior = space.prior(&node.policy_prediction, ordinal);
            let score = action_score(
                value,
                prior,
                visits,
                total_visits,
                config.pb_c_init,
                config.pb_c_base,
            );

            if score > best_score {
                best_score = score;
                best.clear();
                best.push(ordinal);
            } else if score == best_score {
                best.push(ordinal);
            }
        }

        best.choose(rng).copied().unwrap_or(0)
    }

    /// Back up a leaf value along a simulation path (root first, leaf last).
    ///
    /// Walking from the leaf to the root, each node counts a visit, turns the
    /// running value into `reward + discount * value` and folds that into its
    /// average. The running min/max is widened with every backed-up value.
    pub fn backpropagate(
        &mut self,
        path: &[NodeId],
        leaf_value: f32,
        discount: f32,
        minmax: &mut MinMaxStats,
    ) {
        let mut value = leaf_value;
        for &node_id in path.iter().rev() {
            let node = self.get_mut(node_id);
            value = node.reward + discount * value;
            node.record_visit(value);
            minmax.update(value);
        }
    }

    /// Visit count of each root action ordinal.
    pub fn root_visit_counts(&self) -> Vec<u32> {
        self.get(self.root).visit_counts(&self.nodes)
    }

    /// Choose the action ordinal to play from the root visit counts.
    ///
    /// Temperature 0 picks uniformly among the most visited actions; any other
    /// temperature samples with weight `(visits + 1)^(1 / temperature)`.
    pub fn pick_game_action(&self, temperature: f32, rng: &mut ChaCha20Rng) -> usize {
        let visits = self.root_visit_counts();

        if temperature <= 0.0 {
            let max = visits.iter().copied().max().unwrap_or(0);
            let candidates: Vec<usize> = visits
                .iter()
                .enumerate()
                .filter(|(_, v)| **v == max)
                .map(|(i, _)| i)
                .collect();
            return candidates.choose(rng).copied().unwrap_or(0);
        }

        // Scaled relative to the largest count so high visits with a small
        // temperature cannot overflow.
        let max_log = visits
            .iter()
            .map(|&v| (v as f64 + 1.0).ln())
            .fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = visits
            .iter()
            .map(|&v| (((v as f64 + 1.0).ln() - max_log) / temperature as f64).exp())
            .collect();
        sample_weighted(&weights, rng)
    }

    /// Normalized root visit distribution, marginalized per action dimension.
    ///
    /// For a discrete space this is a single vector over actions. All zeros if
    /// the root has not been visited.
    pub fn visit_policy(&self, space: &ActionSpace) -> Vec<Vec<f32>> {
        let visits = self.root_visit_counts();
        let mut policy = vec![vec![0.0f32; space.values_per_dim()]; space.dims()];

        for (ordinal, &v) in visits.iter().enumerate() {
            for (dim, &component) in space.action(ordinal).components().iter().enumerate() {
                policy[dim][component] += v as f32;
            }
        }

        let total: u32 = visits.iter().sum();
        if total > 0 {
            for dim_policy in &mut policy {
                for p in dim_policy.iter_mut() {
                    *p /= total as f32;
                }
            }
        }
        policy
    }

    /// Average backed-up value at the root.
    #[inline]
    pub fn root_value(&self) -> f32 {
        self.get(self.root).average_value
    }

    /// Get statistics about the tree for debugging.
    pub fn stats(&self) -> TreeStats {
        let root = self.get(self.root);
        TreeStats {
            total_nodes: self.nodes.len(),
            root_visits: root.visit_count,
            root_value: root.average_value,
            max_depth: self.compute_max_depth(),
        }
    }

    // Children are always allocated after their parent, so one forward pass
    // over the arena sees every parent's depth first.
    fn compute_max_depth(&self) -> u32 {
        let mut depths = vec![0u32; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate().skip(1) {
            depths[i] = depths[node.parent.0 as usize] + 1;
        }
        depths.into_iter().max().unwrap_or(0)
    }
}

/// Sample an index proportionally to non-negative weights.
fn sample_weighted(weights: &[f64], rng: &mut ChaCha20Rng) -> usize {
    let total: f64 = weights.iter().sum();
    let r: f64 = rng.gen::<f64>() * total;
    let mut cumsum = 0.0;

    for (i, &w) in weights.iter().enumerate() {
        cumsum += w;
        if r < cumsum {
            return i;
        }
    }

    // Fallback to last non-zero weight (handles floating point issues)
    weights.iter().rposition(|&w| w > 0.0).unwrap_or(0)
}

/// Statistics about an MCTS tree.
#[derive(Debug, Clone)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub root_visits: u32,
    pub root_value: f32,
    pub max_depth: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn uniform_root(num_actions: usize) -> MctsNode<(), ()> {
        MctsNode::new_root(
            (),
            None,
            0.0,
            vec![vec![1.0 / num_actions as f32; num_actions]],
            num_actions,
        )
    }

    fn child(parent: NodeId, action: usize, reward: f32, num_actions: usize) -> MctsNode<(), ()> {
        MctsNode::new_child(
            parent,
            action,
            (),
            None,
            reward,
            0.0,
            vec![vec![1.0 / num_actions as f32; num_actions]],
            num_actions,
        )
    }

    #[test]
    fn test_new_tree() {
        let tree = MctsTree::new(uniform_root(3));

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root(), NodeId(0));
        assert!(tree.get(tree.root()).parent.is_none());
    }

    #[test]
    fn test_insert_child() {
        let mut tree = MctsTree::new(uniform_root(3));
        let child_id = tree.insert_child(tree.root(), 1, child(NodeId(0), 1, 0.0, 3));

        assert_eq!(tree.len(), 2);
        assert_eq!(child_id, NodeId(1));
        assert_eq!(tree.get(tree.root()).children[1], Some(NodeId(1)));
        assert_eq!(tree.get(child_id).parent, tree.root());
        assert_eq!(tree.get(child_id).action, Some(1));
    }

    #[test]
    #[should_panic(expected = "already expanded")]
    fn test_insert_child_twice_panics() {
        let mut tree = MctsTree::new(uniform_root(2));
        tree.insert_child(tree.root(), 0, child(NodeId(0), 0, 0.0, 2));
        tree.insert_child(tree.root(), 0, child(NodeId(0), 0, 0.0, 2));
    }

    #[test]
    fn test_backpropagate_discounts_rewards() {
        let mut tree = MctsTree::new(uniform_root(1));
        let c1 = tree.insert_child(tree.root(), 0, child(NodeId(0), 0, 1.0, 1));
        let c2 = tree.insert_child(c1, 0, child(c1, 0, 2.0, 1));

        let mut minmax = MinMaxStats::new();
        tree.backpropagate(&[tree.root(), c1, c2], 10.0, 0.5, &mut minmax);

        // leaf: 2 + 0.5 * 10 = 7; c1: 1 + 0.5 * 7 = 4.5; root: 0 + 0.5 * 4.5 = 2.25
        assert_eq!(tree.get(c2).visit_count, 1);
        assert!((tree.get(c2).average_value - 7.0).abs() < 1e-6);
        assert!((tree.get(c1).average_value - 4.5).abs() < 1e-6);
        assert!((tree.root_value() - 2.25).abs() < 1e-6);
        assert_eq!(tree.get(tree.root()).visit_count, 1);

        assert!((minmax.min_value - 2.25).abs() < 1e-6);
        assert!((minmax.max_value - 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_minmax_tracks_backed_up_values_not_averages() {
        let mut tree = MctsTree::new(uniform_root(1));
        let root = tree.root();
        let mut minmax = MinMaxStats::new();

        tree.backpropagate(&[root], 0.0, 1.0, &mut minmax);
        tree.backpropagate(&[root], 10.0, 1.0, &mut minmax);

        assert_eq!(tree.get(root).visit_count, 2);
        assert!((tree.root_value() - 5.0).abs() < 1e-6);
        assert_eq!(minmax.min_value, 0.0);
        assert_eq!(minmax.max_value, 10.0);
    }

    #[test]
    fn test_select_prefers_higher_prior() {
        let mut root = uniform_root(2);
        root.policy_prediction = vec![vec![0.3, 0.7]];
        let mut tree = MctsTree::new(root);
        let c0 = tree.insert_child(tree.root(), 0, child(NodeId(0), 0, 0.0, 2));
        tree.get_mut(c0).visit_count = 1;

        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let config = MctsConfig::for_testing();
        let best = tree.select_action(tree.root(), &MinMaxStats::new(), &ActionSpace::discrete(2), &config, &mut rng);
        assert_eq!(best, 1);
    }

    #[test]
    fn test_select_breaks_ties_uniformly() {
        let tree = MctsTree::new(uniform_root(2));
        let space = ActionSpace::discrete(2);
        let config = MctsConfig::for_testing();
        let minmax = MinMaxStats::new();
        let mut rng = ChaCha20Rng::seed_from_u64(7);

        let mut counts = [0u32; 2];
        for _ in 0..2000 {
            counts[tree.select_action(tree.root(), &minmax, &space, &config, &mut rng)] += 1;
        }
        assert!(counts[0] > 800 && counts[1] > 800, "counts: {:?}", counts);
    }

    #[test]
    fn test_pick_game_action_greedy() {
        let mut tree = MctsTree::new(uniform_root(3));
        let c0 = tree.insert_child(tree.root(), 0, child(NodeId(0), 0, 0.0, 3));
        let c2 = tree.insert_child(tree.root(), 2, child(NodeId(0), 2, 0.0, 3));
        tree.get_mut(c0).visit_count = 3;
        tree.get_mut(c2).visit_count = 7;

        let mut rng = ChaCha20Rng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(tree.pick_game_action(0.0, &mut rng), 2);
        }
        assert_eq!(tree.root_visit_counts(), vec![3, 0, 7]);
    }

    #[test]
    fn test_pick_game_action_with_temperature_samples_all() {
        let mut tree = MctsTree::new(uniform_root(2));
        let c0 = tree.insert_child(tree.root(), 0, child(NodeId(0), 0, 0.0, 2));
        let c1 = tree.insert_child(tree.root(), 1, child(NodeId(0), 1, 0.0, 2));
        tree.get_mut(c0).visit_count = 1;
        tree.get_mut(c1).visit_count = 3;

        // Weights 2 and 4 at temperature 1.
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let mut counts = [0u32; 2];
        for _ in 0..3000 {
            counts[tree.pick_game_action(1.0, &mut rng)] += 1;
        }
        let frac = counts[0] as f32 / 3000.0;
        assert!((frac - 1.0 / 3.0).abs() < 0.05, "frac: {}", frac);
    }

    #[test]
    fn test_visit_policy_marginalizes_composite() {
        let space = ActionSpace::composite(2, 2);
        let root = MctsNode::<(), ()>::new_root((), None, 0.0, vec![vec![0.5; 2]; 2], space.len());
        let mut tree = MctsTree::new(root);

        // ordinal 1 = [0, 1], ordinal 3 = [1, 1]
        let a = tree.insert_child(tree.root(), 1, child(NodeId(0), 1, 0.0, 4));
        let b = tree.insert_child(tree.root(), 3, child(NodeId(0), 3, 0.0, 4));
        tree.get_mut(a).visit_count = 1;
        tree.get_mut(b).visit_count = 3;

        let policy = tree.visit_policy(&space);
        assert_eq!(policy.len(), 2);
        assert!((policy[0][0] - 0.25).abs() < 1e-6);
        assert!((policy[0][1] - 0.75).abs() < 1e-6);
        assert!(policy[1][0].abs() < 1e-6);
        assert!((policy[1][1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tree_stats() {
        let mut tree = MctsTree::new(uniform_root(2));
        let c = tree.insert_child(tree.root(), 0, child(NodeId(0), 0, 0.0, 2));
        tree.insert_child(c, 1, child(c, 1, 0.0, 2));
        tree.insert_child(tree.root(), 1, child(NodeId(0), 1, 0.0, 2));

        let stats = tree.stats();
        assert_eq!(stats.total_nodes, 4);
        assert_eq!(stats.max_depth, 2);
    }
}
