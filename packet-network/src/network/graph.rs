//! Shortest-path routing
//!
//! The routing tables of every node are a pure function of a [`Graph`] snapshot. Link metrics are
//! at least 1, so Dijkstra's algorithm applies.

use crate::network::node::NodeId;
use crate::network::route::{Route, RoutingTable};
use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Vertex {
    pub node: NodeId,
    pub ip: IpAddr,
}

/// An undirected edge, one per established connection
#[derive(Debug, Clone)]
pub struct Edge {
    pub a: NodeId,
    pub a_interface: Arc<str>,
    pub b: NodeId,
    pub b_interface: Arc<str>,
    pub metric: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
}

/// An edge seen from one of its ends
struct Outgoing<'a> {
    neighbor: NodeIndex,
    interface: &'a Arc<str>,
    metric: u64,
}

impl Graph {
    pub fn new(vertices: Vec<Vertex>, edges: Vec<Edge>) -> Self {
        Self { vertices, edges }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Builds the petgraph representation, along with every vertex's outgoing edges in edge order
    fn build(&self) -> (UnGraph<NodeId, u64>, Vec<Vec<Outgoing<'_>>>) {
        let mut graph = UnGraph::with_capacity(self.vertices.len(), self.edges.len());
        let index: HashMap<NodeId, NodeIndex> = self
            .vertices
            .iter()
            .map(|v| (v.node, graph.add_node(v.node)))
            .collect();

        let mut outgoing: Vec<Vec<Outgoing>> = (0..self.vertices.len()).map(|_| Vec::new()).collect();
        for edge in &self.edges {
            let (Some(&a), Some(&b)) = (index.get(&edge.a), index.get(&edge.b)) else {
                continue;
            };

            graph.add_edge(a, b, edge.metric);
            outgoing[a.index()].push(Outgoing {
                neighbor: b,
                interface: &edge.a_interface,
                metric: edge.metric,
            });
            outgoing[b.index()].push(Outgoing {
                neighbor: a,
                interface: &edge.b_interface,
                metric: edge.metric,
            });
        }

        (graph, outgoing)
    }

    /// Computes the routing table of every vertex
    ///
    /// The first hop towards a destination is the first outgoing edge (in edge order) lying on a
    /// shortest path, so equal-cost paths resolve deterministically. Routes are ordered by cost,
    /// then by vertex order.
    pub fn routing_tables(&self) -> HashMap<NodeId, RoutingTable> {
        let (graph, outgoing) = self.build();
        let distances: Vec<HashMap<NodeIndex, u64>> = graph
            .node_indices()
            .map(|source| dijkstra(&graph, source, None, |e| *e.weight()))
            .collect();

        graph
            .node_indices()
            .map(|source| {
                let table = self.routing_table_from(source, &outgoing[source.index()], &distances);
                (graph[source], table)
            })
            .collect()
    }

    fn routing_table_from(
        &self,
        source: NodeIndex,
        outgoing: &[Outgoing],
        distances: &[HashMap<NodeIndex, u64>],
    ) -> RoutingTable {
        let mut destinations: Vec<(u64, NodeIndex)> = distances[source.index()]
            .iter()
            .filter(|&(&destination, _)| destination != source)
            .map(|(&destination, &cost)| (cost, destination))
            .collect();
        destinations.sort_unstable();

        destinations
            .into_iter()
            .filter_map(|(cost, destination)| {
                let hop = outgoing.iter().find(|hop| {
                    distances[hop.neighbor.index()]
                        .get(&destination)
                        .is_some_and(|rest| hop.metric.saturating_add(*rest) == cost)
                })?;

                Some(Route::new(
                    self.vertices[destination.index()].ip,
                    self.vertices[hop.neighbor.index()].ip,
                    hop.interface.clone(),
                    cost.min(i64::MAX as u64) as i64,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::Ipv4Addr;

    fn vertex(i: usize) -> Vertex {
        Vertex {
            node: NodeId(i),
            ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, i as u8 + 1)),
        }
    }

    fn edge(a: usize, a_interface: &str, b: usize, b_interface: &str, metric: u64) -> Edge {
        Edge {
            a: NodeId(a),
            a_interface: a_interface.into(),
            b: NodeId(b),
            b_interface: b_interface.into(),
            metric,
        }
    }

    #[test]
    fn test_chain_routes_through_middle_node() {
        // a --5-- b --1-- c
        let graph = Graph::new(
            vec![vertex(0), vertex(1), vertex(2)],
            vec![edge(0, "a-b", 1, "b-a", 5), edge(1, "b-c", 2, "c-b", 1)],
        );
        let tables = graph.routing_tables();

        let a_to_c = tables[&NodeId(0)].best_route(vertex(2).ip).unwrap();
        assert_eq!(a_to_c.metrics(), 6);
        assert_eq!(a_to_c.gateway, vertex(1).ip);
        assert_eq!(a_to_c.interface.as_ref(), "a-b");

        let c_to_a = tables[&NodeId(2)].best_route(vertex(0).ip).unwrap();
        assert_eq!(c_to_a.metrics(), 6);
        assert_eq!(c_to_a.gateway, vertex(1).ip);
        assert_eq!(c_to_a.interface.as_ref(), "c-b");

        let b_to_a = tables[&NodeId(1)].best_route(vertex(0).ip).unwrap();
        assert_eq!(b_to_a.metrics(), 5);
        assert_eq!(b_to_a.gateway, vertex(0).ip);
    }

    #[test]
    fn test_cheaper_detour_beats_direct_link() {
        // a --10-- c, a --2-- b --3-- c
        let graph = Graph::new(
            vec![vertex(0), vertex(1), vertex(2)],
            vec![
                edge(0, "a-c", 2, "c-a", 10),
                edge(0, "a-b", 1, "b-a", 2),
                edge(1, "b-c", 2, "c-b", 3),
            ],
        );
        let tables = graph.routing_tables();

        let a_to_c = tables[&NodeId(0)].best_route(vertex(2).ip).unwrap();
        assert_eq!(a_to_c.metrics(), 5);
        assert_eq!(a_to_c.interface.as_ref(), "a-b");
        assert_eq!(tables[&NodeId(0)].len(), 2);
    }

    #[test]
    fn test_unreachable_nodes_have_no_routes() {
        let graph = Graph::new(
            vec![vertex(0), vertex(1), vertex(2)],
            vec![edge(0, "a-b", 1, "b-a", 1)],
        );
        let tables = graph.routing_tables();

        assert!(tables[&NodeId(0)].best_route(vertex(2).ip).is_none());
        assert!(tables[&NodeId(2)].is_empty());
        assert!(tables[&NodeId(0)].best_route(vertex(0).ip).is_none());
    }

    #[test]
    fn test_equal_cost_paths_are_deterministic() {
        // a --1-- b --1-- d, a --1-- c --1-- d
        let graph = Graph::new(
            vec![vertex(0), vertex(1), vertex(2), vertex(3)],
            vec![
                edge(0, "a-b", 1, "b-a", 1),
                edge(0, "a-c", 2, "c-a", 1),
                edge(1, "b-d", 3, "d-b", 1),
                edge(2, "c-d", 3, "d-c", 1),
            ],
        );

        let first = graph.routing_tables();
        let second = graph.routing_tables();
        assert_eq!(first, second);

        // The path through `b` is discovered first
        let a_to_d = first[&NodeId(0)].best_route(vertex(3).ip).unwrap();
        assert_eq!(a_to_d.metrics(), 2);
        assert_eq!(a_to_d.interface.as_ref(), "a-b");
    }

    #[test]
    fn test_parallel_links_use_cheapest() {
        let graph = Graph::new(
            vec![vertex(0), vertex(1)],
            vec![edge(0, "slow", 1, "slow", 9), edge(0, "fast", 1, "fast", 2)],
        );
        let tables = graph.routing_tables();

        let table = &tables[&NodeId(0)];
        assert_eq!(table.len(), 1);
        assert_eq!(table.routes()[0].interface.as_ref(), "fast");
    }

    #[test]
    fn test_edges_to_unknown_vertices_are_ignored() {
        let graph = Graph::new(
            vec![vertex(0), vertex(1)],
            vec![edge(0, "a-x", 7, "x-a", 1), edge(0, "a-b", 1, "b-a", 4)],
        );
        let tables = graph.routing_tables();

        assert_eq!(tables.len(), 2);
        let a_to_b = tables[&NodeId(0)].best_route(vertex(1).ip).unwrap();
        assert_eq!(a_to_b.metrics(), 4);
        assert_eq!(a_to_b.interface.as_ref(), "a-b");
        assert_eq!(tables[&NodeId(0)].len(), 1);
    }
}
