//! Dependency graph engine
//!
//! Built from module-edge relation rows (imports, type references,
//! re-exports) into a pair of adjacency maps. Every node is a key in `adj`;
//! destination-only nodes get an empty set. Rebuilt lazily and cached by the
//! query layer until the next index run.

pub mod cycles;

use crate::store::relations::RelationRow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct DependencyGraph {
    adj: HashMap<String, BTreeSet<String>>,
    radj: HashMap<String, BTreeSet<String>>,
}

/// Per-file fan counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanMetrics {
    pub fan_in: usize,
    pub fan_out: usize,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from relation rows; non-module edges are ignored.
    pub fn from_relations(rows: &[RelationRow]) -> Self {
        let mut graph = Self::new();
        for row in rows {
            if matches!(
                row.rel_type.as_str(),
                "imports" | "type-references" | "re-exports"
            ) {
                graph.add_edge(&row.src_file_path, &row.dst_file_path);
            }
        }
        graph
    }

    pub fn add_edge(&mut self, src: &str, dst: &str) {
        self.adj
            .entry(src.to_string())
            .or_default()
            .insert(dst.to_string());
        self.adj.entry(dst.to_string()).or_default();
        self.radj
            .entry(dst.to_string())
            .or_default()
            .insert(src.to_string());
        self.radj.entry(src.to_string()).or_default();
    }

    pub fn node_count(&self) -> usize {
        self.adj.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adj.values().map(|s| s.len()).sum()
    }

    /// Direct dependencies of a file.
    pub fn get_dependencies(&self, path: &str) -> Vec<String> {
        self.adj
            .get(path)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Direct dependents of a file.
    pub fn get_dependents(&self, path: &str) -> Vec<String> {
        self.radj
            .get(path)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Everything reachable from `path` following imports. The start node
    /// itself only appears when a cycle leads back to it.
    pub fn get_transitive_dependencies(&self, path: &str) -> Vec<String> {
        self.bfs(path, &self.adj)
    }

    /// Everything that (transitively) imports `path`.
    pub fn get_transitive_dependents(&self, path: &str) -> Vec<String> {
        self.bfs(path, &self.radj)
    }

    fn bfs(&self, start: &str, edges: &HashMap<String, BTreeSet<String>>) -> Vec<String> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut result: Vec<String> = Vec::new();

        if let Some(neighbors) = edges.get(start) {
            for n in neighbors {
                queue.push_back(n);
            }
        }

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            result.push(current.to_string());
            if let Some(neighbors) = edges.get(current) {
                for n in neighbors {
                    if !visited.contains(n.as_str()) {
                        queue.push_back(n);
                    }
                }
            }
        }

        result.sort();
        result
    }

    /// Union of transitive dependents over the given files, deduplicated.
    pub fn get_affected_by_change(&self, files: &[String]) -> Vec<String> {
        let mut affected: BTreeSet<String> = BTreeSet::new();
        for file in files {
            affected.extend(self.get_transitive_dependents(file));
        }
        affected.into_iter().collect()
    }

    /// Full snapshot copy of the adjacency structure.
    pub fn get_adjacency_list(&self) -> BTreeMap<String, Vec<String>> {
        self.adj
            .iter()
            .map(|(node, deps)| (node.clone(), deps.iter().cloned().collect()))
            .collect()
    }

    pub fn get_fan_metrics(&self, path: &str) -> FanMetrics {
        FanMetrics {
            fan_in: self.radj.get(path).map(|s| s.len()).unwrap_or(0),
            fan_out: self.adj.get(path).map(|s| s.len()).unwrap_or(0),
        }
    }

    /// Whether any cycle (self-loops included) exists. Iterative DFS with an
    /// on-path set; returns on the first back-edge.
    pub fn has_cycle(&self) -> bool {
        let mut state: HashMap<&str, u8> = HashMap::new(); // 1 = on path, 2 = done

        let neighbors_of = |node: &str| -> Vec<&str> {
            self.adj
                .get(node)
                .map(|s| s.iter().map(String::as_str).collect())
                .unwrap_or_default()
        };

        for start in self.adj.keys() {
            if state.contains_key(start.as_str()) {
                continue;
            }
            state.insert(start, 1);
            let mut stack: Vec<(&str, Vec<&str>)> = vec![(start, neighbors_of(start))];

            while let Some((node, mut pending)) = stack.pop() {
                match pending.pop() {
                    Some(next) => {
                        stack.push((node, pending));
                        match state.get(next) {
                            Some(1) => return true,
                            Some(_) => {}
                            None => {
                                state.insert(next, 1);
                                stack.push((next, neighbors_of(next)));
                            }
                        }
                    }
                    None => {
                        state.insert(node, 2);
                    }
                }
            }
        }
        false
    }

    /// Every elementary circuit, canonicalized and deduplicated; see
    /// [`cycles`].
    pub fn get_cycle_paths(&self, max_cycles: Option<usize>) -> Vec<Vec<String>> {
        cycles::elementary_circuits(&self.adj, max_cycles.unwrap_or(usize::MAX))
    }

    pub(crate) fn adjacency(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.adj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for (src, dst) in edges {
            g.add_edge(src, dst);
        }
        g
    }

    #[test]
    fn test_direct_queries() {
        let g = graph(&[("a", "b"), ("a", "c"), ("b", "c")]);
        assert_eq!(g.get_dependencies("a"), vec!["b", "c"]);
        assert_eq!(g.get_dependents("c"), vec!["a", "b"]);
        assert!(g.get_dependencies("c").is_empty());
        assert!(g.get_dependencies("missing").is_empty());
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn test_transitive_excludes_start() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "d")]);
        assert_eq!(g.get_transitive_dependencies("a"), vec!["b", "c", "d"]);
        assert_eq!(g.get_transitive_dependents("d"), vec!["a", "b", "c"]);
        assert!(!g.get_transitive_dependencies("a").contains(&"a".to_string()));
    }

    #[test]
    fn test_transitive_includes_start_via_cycle() {
        let g = graph(&[("a", "b"), ("b", "a")]);
        assert_eq!(g.get_transitive_dependencies("a"), vec!["a", "b"]);
    }

    #[test]
    fn test_affected_by_change() {
        let g = graph(&[("app", "lib"), ("tool", "lib"), ("app", "util")]);
        let affected = g.get_affected_by_change(&["lib".into(), "util".into()]);
        assert_eq!(affected, vec!["app", "tool"]);
    }

    #[test]
    fn test_adjacency_snapshot() {
        let g = graph(&[("a", "b")]);
        let list = g.get_adjacency_list();
        assert_eq!(list["a"], vec!["b"]);
        assert!(list["b"].is_empty());
    }

    #[test]
    fn test_fan_metrics() {
        let g = graph(&[("a", "lib"), ("b", "lib"), ("lib", "util")]);
        let m = g.get_fan_metrics("lib");
        assert_eq!(m.fan_in, 2);
        assert_eq!(m.fan_out, 1);
        assert_eq!(g.get_fan_metrics("nowhere"), FanMetrics { fan_in: 0, fan_out: 0 });
    }

    #[test]
    fn test_has_cycle() {
        assert!(!graph(&[("a", "b"), ("b", "c")]).has_cycle());
        assert!(graph(&[("a", "b"), ("b", "a")]).has_cycle());
        assert!(graph(&[("a", "a")]).has_cycle());
        assert!(graph(&[("a", "b"), ("b", "c"), ("c", "a"), ("x", "y")]).has_cycle());
    }

    #[test]
    fn test_from_relations_filters_calls() {
        let rows = vec![
            relation("imports", "a.ts", "b.ts"),
            relation("calls", "a.ts", "c.ts"),
        ];
        let g = DependencyGraph::from_relations(&rows);
        assert_eq!(g.get_dependencies("a.ts"), vec!["b.ts"]);
        assert!(g.adjacency().get("c.ts").is_none());
    }

    fn relation(rel_type: &str, src: &str, dst: &str) -> RelationRow {
        RelationRow {
            project: "p".into(),
            rel_type: rel_type.into(),
            src_file_path: src.into(),
            src_symbol_name: None,
            dst_project: "p".into(),
            dst_file_path: dst.into(),
            dst_symbol_name: None,
            meta_json: None,
        }
    }
}
