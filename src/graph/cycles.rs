//! Elementary circuit enumeration
//!
//! Tarjan's strongly-connected components followed by Johnson's blocked
//! search inside each non-trivial component. Circuits are canonicalized by
//! rotating the lexicographically smallest node to the front and
//! deduplicated by a `\0`-joined key.

use std::collections::{BTreeSet, HashMap, HashSet};

pub fn elementary_circuits(
    adj: &HashMap<String, BTreeSet<String>>,
    max_cycles: usize,
) -> Vec<Vec<String>> {
    if max_cycles == 0 {
        return Vec::new();
    }

    // Index nodes in lexicographic order so index order == name order.
    let mut names: Vec<&String> = adj.keys().collect();
    names.sort();
    let index: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let edges: Vec<Vec<usize>> = names
        .iter()
        .map(|name| {
            adj.get(*name)
                .map(|set| {
                    let mut targets: Vec<usize> =
                        set.iter().filter_map(|t| index.get(t.as_str()).copied()).collect();
                    targets.sort_unstable();
                    targets
                })
                .unwrap_or_default()
        })
        .collect();

    let mut collector = Collector {
        names: &names,
        seen: HashSet::new(),
        result: Vec::new(),
        max_cycles,
    };

    for scc in tarjan_scc(&edges) {
        if collector.full() {
            break;
        }
        if scc.len() == 1 {
            let v = scc[0];
            if edges[v].contains(&v) {
                collector.record(&[v]);
            }
            continue;
        }

        let members: BTreeSet<usize> = scc.iter().copied().collect();
        for &start in &members {
            if collector.full() {
                break;
            }
            let mut search = BlockedSearch {
                edges: &edges,
                members: &members,
                start,
                blocked: HashSet::new(),
                blocked_by: HashMap::new(),
                stack: Vec::new(),
                collector: &mut collector,
            };
            search.circuit(start);
        }
    }

    collector.result
}

struct Collector<'a> {
    names: &'a [&'a String],
    seen: HashSet<String>,
    result: Vec<Vec<String>>,
    max_cycles: usize,
}

impl Collector<'_> {
    fn full(&self) -> bool {
        self.result.len() >= self.max_cycles
    }

    fn record(&mut self, circuit: &[usize]) {
        if self.full() {
            return;
        }
        let mut path: Vec<String> = circuit
            .iter()
            .map(|&i| self.names[i].to_string())
            .collect();

        // Rotate the smallest node to the front
        if let Some(min_pos) = path
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.cmp(b.1))
            .map(|(pos, _)| pos)
        {
            path.rotate_left(min_pos);
        }

        let key = path.join("\u{0}");
        if self.seen.insert(key) {
            self.result.push(path);
        }
    }
}

struct BlockedSearch<'a, 'c> {
    edges: &'a [Vec<usize>],
    members: &'a BTreeSet<usize>,
    start: usize,
    blocked: HashSet<usize>,
    blocked_by: HashMap<usize, HashSet<usize>>,
    stack: Vec<usize>,
    collector: &'a mut Collector<'c>,
}

impl BlockedSearch<'_, '_> {
    /// Johnson's blocked DFS. Only nodes of this component with index
    /// `>= start` participate, so each circuit is found exactly once, from
    /// its smallest node.
    fn circuit(&mut self, v: usize) -> bool {
        let mut found = false;
        self.stack.push(v);
        self.blocked.insert(v);

        for i in 0..self.edges[v].len() {
            let w = self.edges[v][i];
            if w < self.start || !self.members.contains(&w) {
                continue;
            }
            if w == self.start {
                let circuit = self.stack.clone();
                self.collector.record(&circuit);
                found = true;
            } else if !self.blocked.contains(&w) && !self.collector.full() {
                if self.circuit(w) {
                    found = true;
                }
            }
        }

        if found {
            self.unblock(v);
        } else {
            for i in 0..self.edges[v].len() {
                let w = self.edges[v][i];
                if w >= self.start && self.members.contains(&w) {
                    self.blocked_by.entry(w).or_default().insert(v);
                }
            }
        }

        self.stack.pop();
        found
    }

    fn unblock(&mut self, v: usize) {
        self.blocked.remove(&v);
        if let Some(waiters) = self.blocked_by.remove(&v) {
            for w in waiters {
                if self.blocked.contains(&w) {
                    self.unblock(w);
                }
            }
        }
    }
}

/// Iterative Tarjan SCC over index-based adjacency.
pub fn tarjan_scc(edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = edges.len();
    let mut index_of: Vec<Option<usize>> = vec![None; n];
    let mut lowlink: Vec<usize> = vec![0; n];
    let mut on_stack: Vec<bool> = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut sccs: Vec<Vec<usize>> = Vec::new();

    // Explicit work stack: (node, next child position)
    for root in 0..n {
        if index_of[root].is_some() {
            continue;
        }
        let mut work: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(&(v, child)) = work.last() {
            if index_of[v].is_none() {
                index_of[v] = Some(next_index);
                lowlink[v] = next_index;
                next_index += 1;
                stack.push(v);
                on_stack[v] = true;
            }

            if child < edges[v].len() {
                work.last_mut().expect("frame just read").1 += 1;
                let w = edges[v][child];
                match index_of[w] {
                    None => work.push((w, 0)),
                    Some(w_index) => {
                        if on_stack[w] {
                            lowlink[v] = lowlink[v].min(w_index);
                        }
                    }
                }
            } else {
                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if Some(lowlink[v]) == index_of[v] {
                    let mut component = Vec::new();
                    loop {
                        let w = stack.pop().expect("tarjan stack underflow");
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    sccs.push(component);
                }
            }
        }
    }

    sccs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjacency(edges: &[(&str, &str)]) -> HashMap<String, BTreeSet<String>> {
        let mut adj: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (src, dst) in edges {
            adj.entry(src.to_string()).or_default().insert(dst.to_string());
            adj.entry(dst.to_string()).or_default();
        }
        adj
    }

    #[test]
    fn test_acyclic_graph_has_no_circuits() {
        let adj = adjacency(&[("a", "b"), ("b", "c"), ("a", "c")]);
        assert!(elementary_circuits(&adj, usize::MAX).is_empty());
    }

    #[test]
    fn test_triangle_is_rotated_canonically() {
        // Entered as c -> a -> b -> c; expect rotation starting at "a"
        let adj = adjacency(&[("c", "a"), ("a", "b"), ("b", "c")]);
        let circuits = elementary_circuits(&adj, usize::MAX);
        assert_eq!(circuits, vec![vec!["a".to_string(), "b".into(), "c".into()]]);
    }

    #[test]
    fn test_self_loop() {
        let adj = adjacency(&[("a", "a"), ("a", "b")]);
        let circuits = elementary_circuits(&adj, usize::MAX);
        assert_eq!(circuits, vec![vec!["a".to_string()]]);
    }

    #[test]
    fn test_two_independent_cycles() {
        let adj = adjacency(&[("a", "b"), ("b", "a"), ("x", "y"), ("y", "x")]);
        let mut circuits = elementary_circuits(&adj, usize::MAX);
        circuits.sort();
        assert_eq!(
            circuits,
            vec![
                vec!["a".to_string(), "b".into()],
                vec!["x".to_string(), "y".into()],
            ]
        );
    }

    #[test]
    fn test_overlapping_circuits_all_enumerated() {
        // a -> b -> a and a -> b -> c -> a share the edge a->b
        let adj = adjacency(&[("a", "b"), ("b", "a"), ("b", "c"), ("c", "a")]);
        let mut circuits = elementary_circuits(&adj, usize::MAX);
        circuits.sort();
        assert_eq!(
            circuits,
            vec![
                vec!["a".to_string(), "b".into()],
                vec!["a".to_string(), "b".into(), "c".into()],
            ]
        );
    }

    #[test]
    fn test_max_cycles_cap() {
        let adj = adjacency(&[("a", "b"), ("b", "a"), ("x", "y"), ("y", "x")]);
        let circuits = elementary_circuits(&adj, 1);
        assert_eq!(circuits.len(), 1);
        assert!(elementary_circuits(&adj, 0).is_empty());
    }

    #[test]
    fn test_complete_graph_circuit_count() {
        // K4 has 6 + 8 + 6 = 20 elementary circuits
        let names = ["a", "b", "c", "d"];
        let mut edge_list = Vec::new();
        for s in names {
            for d in names {
                if s != d {
                    edge_list.push((s, d));
                }
            }
        }
        let adj = adjacency(&edge_list);
        assert_eq!(elementary_circuits(&adj, usize::MAX).len(), 20);
    }

    #[test]
    fn test_tarjan_components() {
        // 0 -> 1 -> 2 -> 0 strongly connected, 3 alone
        let edges = vec![vec![1], vec![2], vec![0], vec![0]];
        let mut sccs: Vec<Vec<usize>> = tarjan_scc(&edges)
            .into_iter()
            .map(|mut c| {
                c.sort_unstable();
                c
            })
            .collect();
        sccs.sort();
        assert_eq!(sccs, vec![vec![0, 1, 2], vec![3]]);
    }
}
