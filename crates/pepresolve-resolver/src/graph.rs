use rustc_hash::FxHashMap;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::candidate::Candidate;
use crate::key::DependencyKey;
use crate::resolver::Resolution;

/// A node in the resolution graph: either the synthetic root (the user's top-level requirement
/// set) or a pinned candidate.
#[derive(Debug, Clone)]
pub enum Node {
    /// The distinguished root node every top-level requirement's pin is reachable from.
    Root,
    /// A pinned identity and the candidate it was resolved to.
    Package(DependencyKey, String),
}

/// Build a directed graph from a finished [`Resolution`]: a single root node, one node per pin,
/// and one edge per `(parent, child)` pair the resolver recorded — a root edge for every
/// top-level requirement's pin, a parent-pin edge for every dependency-introduced one.
pub fn build_graph(resolution: &Resolution) -> DiGraph<Node, ()> {
    let mut graph = DiGraph::new();
    let root = graph.add_node(Node::Root);

    let mut nodes: FxHashMap<DependencyKey, NodeIndex> =
        FxHashMap::with_capacity_and_hasher(resolution.pins.len(), Default::default());
    for (key, candidate) in &resolution.pins {
        let label = format!("{}=={}", candidate_display_name(candidate), candidate.version);
        let node = graph.add_node(Node::Package(key.clone(), label));
        nodes.insert(key.clone(), node);
    }

    for (parent, child) in &resolution.edges {
        let Some(&child_node) = nodes.get(child) else {
            continue;
        };
        let parent_node = match parent {
            Some(parent) => match nodes.get(parent) {
                Some(&node) => node,
                None => continue,
            },
            None => root,
        };
        graph.add_edge(parent_node, child_node, ());
    }

    graph
}

fn candidate_display_name(candidate: &Candidate) -> String {
    candidate.name.to_string()
}

#[cfg(test)]
mod tests {
    use pepresolve_client::{Archive, ArchiveLink};
    use url::Url;

    use super::*;

    fn candidate(name: &str, version: &str) -> Candidate {
        let filename = format!("{name}-{version}-py3-none-any.whl");
        let link = ArchiveLink {
            url: Url::parse(&format!("https://example.org/{filename}")).unwrap(),
            filename,
            requires_python: None,
        };
        Candidate::new(Archive::from_link(link).unwrap(), Vec::new())
    }

    #[test]
    fn root_requirement_connects_directly_to_root() {
        let foo = candidate("foo", "1.0");
        let foo_key = foo.identity();
        let resolution = Resolution {
            pins: vec![(foo_key.clone(), foo)],
            edges: vec![(None, foo_key)],
        };

        let graph = build_graph(&resolution);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn transitive_pin_connects_from_its_parent_not_the_root() {
        let app = candidate("app", "1.0");
        let foo = candidate("foo", "1.0");
        let app_key = app.identity();
        let foo_key = foo.identity();
        let resolution = Resolution {
            pins: vec![(app_key.clone(), app), (foo_key.clone(), foo)],
            edges: vec![(None, app_key.clone()), (Some(app_key.clone()), foo_key.clone())],
        };

        let graph = build_graph(&resolution);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        // The root has exactly one outgoing edge, to `app` — not to `foo`.
        let root = graph
            .node_indices()
            .find(|&i| matches!(graph[i], Node::Root))
            .unwrap();
        assert_eq!(graph.edges(root).count(), 1);
    }
}
