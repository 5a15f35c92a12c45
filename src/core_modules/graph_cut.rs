// THEORY:
// The `graph_cut` module computes a minimum s-t cut over a sparse graph: each
// node has a capacity from the source and to the sink (t-links) and nodes are
// joined by pairs of directed arcs (n-links). After `max_flow`, a node is on
// the source side of the cut if `in_source_segment` says so.
//
// Key architectural principles:
// 1.  **Two Search Trees**: Augmenting paths are found by growing one tree
//     from the source and one from the sink at the same time (Boykov and
//     Kolmogorov). The trees are kept between augmentations and repaired
//     locally, which suits image grids where most paths are short.
// 2.  **Folded Terminal Links**: A node stores `source - sink` as a single
//     signed residual. The shared part `min(source, sink)` is pushed straight
//     into the flow when the weights are added, so only the difference matters.
//     This keeps costs such as negative log-likelihoods usable as capacities.
// 3.  **Paired Arcs**: Arcs are stored in pairs, so `arc ^ 1` is always the
//     reverse arc. Growing, augmenting and adoption all index through that.

use std::collections::VecDeque;

const NONE: u32 = u32::MAX;
const SOURCE: u32 = 0;
const SINK: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    Free,
    Terminal,
    Orphan,
    Arc(u32),
}

#[derive(Debug, Clone)]
struct Node {
    first: u32,
    parent: Parent,
    tree: u32,
    active: bool,
    /// Positive: residual capacity from the source. Negative: to the sink.
    terminal: f64,
    timestamp: u32,
    distance: u32,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            first: NONE,
            parent: Parent::Free,
            tree: SOURCE,
            active: false,
            terminal: 0.0,
            timestamp: 0,
            distance: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct Arc {
    head: u32,
    next: u32,
    capacity: f64,
}

/// A flow network with a fixed node count, built once and solved once.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    nodes: Vec<Node>,
    arcs: Vec<Arc>,
    flow: f64,
}

impl FlowGraph {
    pub fn new(node_count: usize, edge_hint: usize) -> Self {
        Self {
            nodes: vec![Node::default(); node_count],
            arcs: Vec::with_capacity(2 * edge_hint),
            flow: 0.0,
        }
    }

    pub fn add_terminal_weights(&mut self, node: usize, mut source: f64, mut sink: f64) {
        let residual = self.nodes[node].terminal;
        if residual > 0.0 {
            source += residual;
        } else {
            sink -= residual;
        }
        self.flow += source.min(sink);
        self.nodes[node].terminal = source - sink;
    }

    /// Adds `from -> to` with `capacity` and `to -> from` with `reverse`.
    pub fn add_edge(&mut self, from: usize, to: usize, capacity: f64, reverse: f64) {
        let forward = self.arcs.len() as u32;
        self.arcs.push(Arc {
            head: to as u32,
            next: self.nodes[from].first,
            capacity,
        });
        self.nodes[from].first = forward;
        self.arcs.push(Arc {
            head: from as u32,
            next: self.nodes[to].first,
            capacity: reverse,
        });
        self.nodes[to].first = forward + 1;
    }

    pub fn in_source_segment(&self, node: usize) -> bool {
        self.nodes[node].tree == SOURCE
    }

    /// Runs the solver and returns the total flow, equal to the cut cost.
    pub fn max_flow(&mut self) -> f64 {
        let mut active = VecDeque::new();
        let mut orphans = Vec::new();
        let mut clock = 0u32;

        for (index, node) in self.nodes.iter_mut().enumerate() {
            node.timestamp = 0;
            if node.terminal != 0.0 {
                node.parent = Parent::Terminal;
                node.tree = if node.terminal < 0.0 { SINK } else { SOURCE };
                node.distance = 1;
                node.active = true;
                active.push_back(index);
            } else {
                node.parent = Parent::Free;
                node.active = false;
            }
        }

        while let Some(bridge) = self.grow(&mut active) {
            let amount = self.bottleneck(bridge);
            self.augment(bridge, amount, &mut orphans);
            clock += 1;
            self.adopt(&mut orphans, &mut active, clock);
        }
        self.flow
    }

    fn head(&self, arc: u32) -> usize {
        self.arcs[arc as usize].head as usize
    }

    fn capacity(&self, arc: u32) -> f64 {
        self.arcs[arc as usize].capacity
    }

    /// Grows both trees until they touch. Returns the arc that leads from the
    /// source tree into the sink tree.
    fn grow(&mut self, active: &mut VecDeque<usize>) -> Option<u32> {
        while let Some(&v) = active.front() {
            if self.nodes[v].parent != Parent::Free {
                let tree = self.nodes[v].tree;
                let (v_timestamp, v_distance) = (self.nodes[v].timestamp, self.nodes[v].distance);
                let mut arc = self.nodes[v].first;
                while arc != NONE {
                    let next = self.arcs[arc as usize].next;
                    if self.capacity(arc ^ tree) != 0.0 {
                        let u = self.head(arc);
                        let node = &mut self.nodes[u];
                        if node.parent == Parent::Free {
                            node.tree = tree;
                            node.parent = Parent::Arc(arc ^ 1);
                            node.timestamp = v_timestamp;
                            node.distance = v_distance + 1;
                            if !node.active {
                                node.active = true;
                                active.push_back(u);
                            }
                        } else if node.tree != tree {
                            return Some(arc ^ tree);
                        } else if node.distance > v_distance + 1 && node.timestamp <= v_timestamp {
                            node.parent = Parent::Arc(arc ^ 1);
                            node.timestamp = v_timestamp;
                            node.distance = v_distance + 1;
                        }
                    }
                    arc = next;
                }
            }
            active.pop_front();
            self.nodes[v].active = false;
        }
        None
    }

    /// Smallest residual along source root -> bridge -> sink root.
    fn bottleneck(&self, bridge: u32) -> f64 {
        let mut amount = self.capacity(bridge);
        // k = 1 walks the source tree, k = 0 the sink tree.
        for k in [1, 0] {
            let mut v = self.head(bridge ^ k);
            while let Parent::Arc(arc) = self.nodes[v].parent {
                amount = amount.min(self.capacity(arc ^ k));
                v = self.head(arc);
            }
            amount = amount.min(self.nodes[v].terminal.abs());
        }
        amount
    }

    fn augment(&mut self, bridge: u32, amount: f64, orphans: &mut Vec<usize>) {
        self.arcs[bridge as usize].capacity -= amount;
        self.arcs[(bridge ^ 1) as usize].capacity += amount;
        self.flow += amount;

        for k in [1, 0] {
            let mut v = self.head(bridge ^ k);
            while let Parent::Arc(arc) = self.nodes[v].parent {
                self.arcs[(arc ^ (k ^ 1)) as usize].capacity += amount;
                let saturated = &mut self.arcs[(arc ^ k) as usize];
                saturated.capacity -= amount;
                if saturated.capacity == 0.0 {
                    self.nodes[v].parent = Parent::Orphan;
                    orphans.push(v);
                }
                v = self.head(arc);
            }
            let root = &mut self.nodes[v];
            root.terminal += if k == 1 { -amount } else { amount };
            if root.terminal == 0.0 {
                root.parent = Parent::Orphan;
                orphans.push(v);
            }
        }
    }

    /// Finds a new parent in the same tree for every orphan, or frees it.
    fn adopt(&mut self, orphans: &mut Vec<usize>, active: &mut VecDeque<usize>, clock: u32) {
        while let Some(v) = orphans.pop() {
            let tree = self.nodes[v].tree;
            let mut best: Option<(u32, u32)> = None;

            let mut arc = self.nodes[v].first;
            while arc != NONE {
                let next = self.arcs[arc as usize].next;
                let u = self.head(arc);
                let candidate = self.capacity(arc ^ (tree ^ 1)) != 0.0
                    && self.nodes[u].tree == tree
                    && self.nodes[u].parent != Parent::Free;
                if candidate {
                    if let Some(depth) = self.root_distance(u, clock) {
                        let distance = depth + 1;
                        if best.is_none_or(|(_, shortest)| distance < shortest) {
                            best = Some((arc, distance));
                        }
                        self.stamp_path(u, depth, clock);
                    }
                }
                arc = next;
            }

            if let Some((arc, distance)) = best {
                let node = &mut self.nodes[v];
                node.parent = Parent::Arc(arc);
                node.timestamp = clock;
                node.distance = distance;
                continue;
            }

            self.nodes[v].timestamp = 0;
            self.nodes[v].parent = Parent::Free;
            let mut arc = self.nodes[v].first;
            while arc != NONE {
                let next = self.arcs[arc as usize].next;
                let u = self.head(arc);
                let parent = self.nodes[u].parent;
                if self.nodes[u].tree == tree && parent != Parent::Free {
                    if self.capacity(arc ^ (tree ^ 1)) != 0.0 && !self.nodes[u].active {
                        self.nodes[u].active = true;
                        active.push_back(u);
                    }
                    if let Parent::Arc(parent_arc) = parent {
                        if self.head(parent_arc) == v {
                            self.nodes[u].parent = Parent::Orphan;
                            orphans.push(u);
                        }
                    }
                }
                arc = next;
            }
        }
    }

    /// Distance from `start` to its terminal, or `None` if the chain ends at
    /// an orphan.
    fn root_distance(&mut self, start: usize, clock: u32) -> Option<u32> {
        let mut u = start;
        let mut depth = 0;
        loop {
            if self.nodes[u].timestamp == clock {
                return Some(depth + self.nodes[u].distance);
            }
            depth += 1;
            match self.nodes[u].parent {
                Parent::Arc(arc) => u = self.head(arc),
                Parent::Terminal => {
                    self.nodes[u].timestamp = clock;
                    self.nodes[u].distance = 1;
                    return Some(depth);
                }
                Parent::Orphan | Parent::Free => return None,
            }
        }
    }

    /// Caches the distances along a freshly measured chain.
    fn stamp_path(&mut self, start: usize, mut distance: u32, clock: u32) {
        let mut u = start;
        while self.nodes[u].timestamp != clock {
            self.nodes[u].timestamp = clock;
            self.nodes[u].distance = distance;
            distance = distance.saturating_sub(1);
            match self.nodes[u].parent {
                Parent::Arc(arc) => u = self.head(arc),
                _ => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_path_is_limited_by_its_narrowest_link() {
        let mut graph = FlowGraph::new(2, 1);
        graph.add_terminal_weights(0, 3.0, 0.0);
        graph.add_terminal_weights(1, 0.0, 5.0);
        graph.add_edge(0, 1, 2.0, 0.0);
        assert_eq!(graph.max_flow(), 2.0);
        assert!(graph.in_source_segment(0));
        assert!(!graph.in_source_segment(1));
    }

    #[test]
    fn folded_terminal_weights_count_towards_flow() {
        let mut graph = FlowGraph::new(2, 1);
        graph.add_terminal_weights(0, 4.0, 1.0);
        graph.add_terminal_weights(1, 2.0, 6.0);
        graph.add_edge(0, 1, 3.0, 0.0);
        assert_eq!(graph.max_flow(), 6.0);
        assert!(!graph.in_source_segment(1));
    }

    #[test]
    fn flow_matches_exhaustive_minimum_cut() {
        const NODES: usize = 7;
        let mut seed = 0x2545_f491_u64;
        let mut next = move || {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            ((seed >> 33) % 10) as f64
        };

        for _ in 0..20 {
            let terminals: Vec<(f64, f64)> = (0..NODES).map(|_| (next(), next())).collect();
            let mut edges = Vec::new();
            for i in 0..NODES {
                for j in (i + 1)..NODES {
                    if next() < 5.0 {
                        edges.push((i, j, next(), next()));
                    }
                }
            }

            let mut graph = FlowGraph::new(NODES, edges.len());
            for (node, &(source, sink)) in terminals.iter().enumerate() {
                graph.add_terminal_weights(node, source, sink);
            }
            for &(i, j, forward, reverse) in &edges {
                graph.add_edge(i, j, forward, reverse);
            }

            let cut_cost = |in_source: &dyn Fn(usize) -> bool| {
                let mut cost = 0.0;
                for (node, &(source, sink)) in terminals.iter().enumerate() {
                    cost += if in_source(node) { sink } else { source };
                }
                for &(i, j, forward, reverse) in &edges {
                    if in_source(i) && !in_source(j) {
                        cost += forward;
                    }
                    if in_source(j) && !in_source(i) {
                        cost += reverse;
                    }
                }
                cost
            };

            let exhaustive = (0..1u32 << NODES)
                .map(|set| cut_cost(&|node| set & (1 << node) != 0))
                .fold(f64::INFINITY, f64::min);

            let flow = graph.max_flow();
            assert!((flow - exhaustive).abs() < 1e-9, "flow={flow} cut={exhaustive}");
            let found = cut_cost(&|node| graph.in_source_segment(node));
            assert!((found - exhaustive).abs() < 1e-9, "segment={found} cut={exhaustive}");
        }
    }
}
