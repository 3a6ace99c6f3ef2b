use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

/// A directed graph kept as successor sets; nodes and edges are only added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph<N: Hash + Eq + Copy + Debug> {
    nodes: HashSet<N>,
    edges: HashMap<N, HashSet<N>>,
    num_edges: usize,
}

impl<N: Hash + Eq + Copy + Debug> Default for Graph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Hash + Eq + Copy + Debug> Graph<N> {
    pub fn new() -> Self {
        Self {
            nodes: HashSet::new(),
            edges: HashMap::new(),
            num_edges: 0,
        }
    }

    pub fn add_node(&mut self, node: N) -> bool {
        self.nodes.insert(node)
    }

    /// Returns true if the edge was not in the graph before.
    pub fn add_edge(&mut self, from: N, to: N) -> bool {
        self.nodes.insert(from);
        self.nodes.insert(to);
        let added = self.edges.entry(from).or_default().insert(to);
        if added {
            self.num_edges += 1;
        }
        added
    }

    pub fn has_edge(&self, from: N, to: N) -> bool {
        self.edges.get(&from).map_or(false, |tos| tos.contains(&to))
    }

    pub fn succs(&self, node: N) -> impl Iterator<Item = N> + '_ {
        self.edges
            .get(&node)
            .into_iter()
            .flat_map(|tos| tos.iter().copied())
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.num_edges
    }
}

#[cfg(test)]
mod tests {
    use super::Graph;

    #[test]
    fn test_graph_basic() {
        let mut graph = Graph::new();
        assert!(graph.add_node(1));
        assert!(graph.add_edge(1, 2));
        assert!(graph.add_edge(1, 3));
        assert!(graph.add_edge(2, 4));
        assert!(!graph.add_edge(1, 2));
        assert!(!graph.add_node(4));
        assert!(graph.has_edge(2, 4));
        assert!(!graph.has_edge(4, 2));
        let mut succs: Vec<_> = graph.succs(1).collect();
        succs.sort();
        assert_eq!(succs, [2, 3]);
        assert_eq!(graph.succs(4).count(), 0);
        assert_eq!(graph.num_nodes(), 4);
        assert_eq!(graph.num_edges(), 3);
    }
}
