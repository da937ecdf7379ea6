//! Packet-switched network simulation
//!
//! A [`Network`] owns every node and link. It is driven one step at a time by an external caller:
//! topology changes rebuild the routing tables before returning, and packets only move when the
//! caller sends, receives or forwards them.

pub mod application;
pub mod graph;
pub mod host;
pub mod interface;
pub mod link;
pub mod node;
pub mod packet;
pub mod route;
pub mod router;
pub mod spec;

use crate::error::NetworkError;
use crate::network::application::{Application, ApplicationKind};
use crate::network::graph::{Edge, Graph, Vertex};
use crate::network::interface::{Interface, InterfaceId};
use crate::network::link::{Direction, Link, LinkId, Links};
use crate::network::node::{Connection, Forwarding, Hop, Node, NodeId, NodeKind, Reception};
use crate::network::packet::{Packet, PacketIds};
use crate::network::route::RoutingTable;
use crate::network::spec::{NetworkSpec, NodeRole};
use crate::trace::simulation_step::DropReason;
use crate::trace::tracer::SimulationStepTracer;
use anyhow::Context;
use fastrand::Rng;
use std::net::IpAddr;
use std::sync::Arc;

/// Knobs of a simulation run
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Seed of the rng behind packet ids and packet values
    pub rng_seed: u64,
    /// Upper bound (inclusive) of the ppv assigned to packets sent through [`Network::send_packet`]
    pub max_ppv: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rng_seed: 42,
            max_ppv: 100,
        }
    }
}

pub struct Network {
    nodes: Vec<Option<Node>>,
    links: Links,
    graph: Graph,
    next_interface_id: u64,
    packet_ids: PacketIds,
    rng: Rng,
    max_ppv: u32,
    dropped: u64,
    tracer: Arc<SimulationStepTracer>,
}

impl Network {
    pub fn new(config: NetworkConfig, tracer: Arc<SimulationStepTracer>) -> Self {
        let mut rng = Rng::with_seed(config.rng_seed);
        let packet_ids = PacketIds::new(rng.fork());
        Self {
            nodes: Vec::new(),
            links: Links::default(),
            graph: Graph::default(),
            next_interface_id: 0,
            packet_ids,
            rng,
            max_ppv: config.max_ppv.max(1),
            dropped: 0,
            tracer,
        }
    }

    /// Builds a whole topology at once
    pub fn from_spec(
        spec: NetworkSpec,
        config: NetworkConfig,
        tracer: Arc<SimulationStepTracer>,
    ) -> anyhow::Result<Self> {
        let mut network = Network::new(config, tracer);

        for node in spec.nodes {
            let created = match node.role {
                NodeRole::Host => network.create_host(&node.name, node.ip, node.send_rate),
                NodeRole::Router => {
                    network.create_router(&node.name, node.ip, node.send_rate, node.buffer_size)
                }
            };
            created.with_context(|| format!("failed to create node `{}`", node.name))?;

            for interface in &node.interfaces {
                network
                    .add_interface(&node.name, interface)
                    .with_context(|| format!("failed to add interface to `{}`", node.name))?;
            }

            if let Some(app) = node.application {
                network
                    .set_application(&node.name, &app.name, app.amount, app.send_rate, app.kind)
                    .with_context(|| format!("failed to set application of `{}`", node.name))?;
            }
        }

        for link in spec.links {
            let a = network.resolve(&link.a.node)?;
            let b = network.resolve(&link.b.node)?;
            network
                .link_interfaces(a, &link.a.interface, b, &link.b.interface, link.speed, link.metric)
                .with_context(|| {
                    format!(
                        "failed to connect `{}:{}` to `{}:{}`",
                        link.a.node, link.a.interface, link.b.node, link.b.interface
                    )
                })?;
        }

        network.update_routing_tables();
        Ok(network)
    }

    pub fn tracer(&self) -> &Arc<SimulationStepTracer> {
        &self.tracer
    }

    /// Number of packets lost so far (link teardown, buffer overflow, admission control)
    pub fn dropped_packets(&self) -> u64 {
        self.dropped
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn links(&self) -> &Links {
        &self.links
    }

    // --- Queries ---

    /// Finds a node by name or, failing that, by ip address
    pub fn resolve(&self, key: &str) -> Result<NodeId, NetworkError> {
        let by_name = self.nodes().find(|n| n.name.as_ref() == key);
        let found = match by_name {
            Some(node) => Some(node),
            None => key
                .parse::<IpAddr>()
                .ok()
                .and_then(|ip| self.node_by_ip(ip)),
        };

        found.map(|n| n.id).ok_or_else(|| NetworkError::NodeNotFound {
            key: key.to_string(),
        })
    }

    pub fn node(&self, key: &str) -> Result<&Node, NetworkError> {
        let id = self.resolve(key)?;
        Ok(self.node_by_id(id))
    }

    pub fn host(&self, key: &str) -> Result<&Node, NetworkError> {
        let node = self.node(key)?;
        if !node.is_host() {
            return Err(NetworkError::NotAHost {
                node: node.name.clone(),
            });
        }
        Ok(node)
    }

    pub fn router(&self, key: &str) -> Result<&Node, NetworkError> {
        let node = self.node(key)?;
        if !node.is_router() {
            return Err(NetworkError::NotARouter {
                node: node.name.clone(),
            });
        }
        Ok(node)
    }

    pub fn node_by_ip(&self, ip: IpAddr) -> Option<&Node> {
        self.nodes().find(|n| n.ip == ip)
    }

    /// Returns the node behind a handle obtained from this network
    ///
    /// Panics if the node has been deleted since.
    pub(crate) fn node_by_id(&self, id: NodeId) -> &Node {
        self.nodes[id.0].as_ref().expect("node does not exist")
    }

    pub fn try_node_by_id(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)?.as_ref()
    }

    /// All nodes, in creation order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Node> {
        self.nodes().filter(|n| n.is_host())
    }

    pub fn routers(&self) -> impl Iterator<Item = &Node> {
        self.nodes().filter(|n| n.is_router())
    }

    pub fn applications(&self) -> impl Iterator<Item = (&Node, &Application)> {
        self.nodes()
            .filter_map(|n| n.application().map(|app| (n, app)))
    }

    pub fn interfaces(&self, node: &str) -> Result<&[Interface], NetworkError> {
        Ok(self.node(node)?.interfaces())
    }

    pub fn connections(&self, node: &str) -> Result<&[Connection], NetworkError> {
        Ok(self.node(node)?.connections())
    }

    pub fn routing_table(&self, node: &str) -> Result<&RoutingTable, NetworkError> {
        Ok(self.node(node)?.routing_table())
    }

    /// The node and interface at the other end of `interface`
    pub fn peer_of(&self, node: NodeId, interface: &str) -> Option<(NodeId, Arc<str>)> {
        self.try_node_by_id(node)?
            .connections
            .iter()
            .find(|c| c.interface.as_ref() == interface)
            .map(|c| (c.peer_node, c.peer_interface.clone()))
    }

    // --- Topology ---

    pub fn create_host(&mut self, name: &str, ip: IpAddr, send_rate: u64) -> Result<NodeId, NetworkError> {
        self.ensure_unique(name, ip)?;
        let id = self.next_node_id();
        self.insert_node(Node::host(id, name.into(), ip, send_rate));
        Ok(id)
    }

    pub fn create_router(
        &mut self,
        name: &str,
        ip: IpAddr,
        send_rate: u64,
        buffer_size: i64,
    ) -> Result<NodeId, NetworkError> {
        self.ensure_unique(name, ip)?;
        let id = self.next_node_id();
        self.insert_node(Node::router(id, name.into(), ip, send_rate, buffer_size));
        Ok(id)
    }

    /// Removes a node, tearing down its links first
    ///
    /// Returns the number of packets lost in the process: those in flight on its links plus, for
    /// a router, those still in its buffer.
    pub fn delete_node(&mut self, key: &str) -> Result<usize, NetworkError> {
        let id = self.resolve(key)?;
        let connected: Vec<Arc<str>> = self
            .node_by_id(id)
            .connections
            .iter()
            .map(|c| c.interface.clone())
            .collect();

        let had_connections = !connected.is_empty();
        let mut discarded = 0;
        for interface in connected {
            discarded += self.unlink(id, &interface)?;
        }

        let buffered: Vec<Packet> = match &mut self.node_by_id_mut(id).kind {
            NodeKind::Router(router) => router.drain().collect(),
            NodeKind::Host(_) => Vec::new(),
        };
        let node = self.node_by_id(id);
        for packet in &buffered {
            self.tracer
                .track_packet_dropped(node, packet, DropReason::NodeDeleted);
        }
        self.dropped += buffered.len() as u64;
        discarded += buffered.len();

        if let Some(node) = self.nodes[id.0].take() {
            tracing::debug!(node = %node.name, buffered = buffered.len(), "deleted node");
        }
        if had_connections {
            self.update_routing_tables();
        }

        Ok(discarded)
    }

    pub fn add_interface(&mut self, node: &str, name: &str) -> Result<InterfaceId, NetworkError> {
        let id = self.resolve(node)?;
        let interface_id = InterfaceId::new(self.next_interface_id);
        self.node_by_id_mut(id).add_interface(interface_id, name)?;
        self.next_interface_id += 1;
        Ok(interface_id)
    }

    /// Removes an interface, disconnecting it first if needed
    ///
    /// Returns the number of in-flight packets lost in the process.
    pub fn delete_interface(&mut self, node: &str, name: &str) -> Result<usize, NetworkError> {
        let id = self.resolve(node)?;
        let connected = match self.node_by_id(id).interface(name) {
            Some(interface) => interface.is_connected(),
            None => return Err(self.node_by_id(id).interface_not_found(name)),
        };

        let discarded = if connected { self.unlink(id, name)? } else { 0 };
        self.node_by_id_mut(id).remove_interface(name);
        if connected {
            self.update_routing_tables();
        }

        Ok(discarded)
    }

    /// Connects two interfaces with a new link and rebuilds the routing tables
    pub fn connect(
        &mut self,
        node_a: &str,
        interface_a: &str,
        node_b: &str,
        interface_b: &str,
        speed: i64,
        metric: i64,
    ) -> Result<LinkId, NetworkError> {
        let a = self.resolve(node_a)?;
        let b = self.resolve(node_b)?;
        let link = self.link_interfaces(a, interface_a, b, interface_b, speed, metric)?;
        self.update_routing_tables();
        Ok(link)
    }

    /// Disconnects an interface from its peer and rebuilds the routing tables
    ///
    /// Returns the number of in-flight packets lost in the process.
    pub fn disconnect(&mut self, node: &str, interface: &str) -> Result<usize, NetworkError> {
        let id = self.resolve(node)?;
        let discarded = self.unlink(id, interface)?;
        self.update_routing_tables();
        Ok(discarded)
    }

    pub fn set_application(
        &mut self,
        host: &str,
        name: &str,
        amount: u64,
        send_rate: u64,
        kind: ApplicationKind,
    ) -> Result<(), NetworkError> {
        let id = self.resolve(host)?;
        let node = self.node_by_id_mut(id);
        let application = Application::new(node.ip, name.into(), amount, send_rate, kind);
        node.set_application(application)
    }

    /// Recomputes every routing table from the current topology
    pub fn update_routing_tables(&mut self) {
        let vertices = self
            .nodes()
            .map(|n| Vertex {
                node: n.id,
                ip: n.ip,
            })
            .collect();

        // One edge per link, seen from the side of its first endpoint
        let mut edges = Vec::new();
        for node in self.nodes() {
            for connection in &node.connections {
                let Some(link) = self.links.get(connection.link) else {
                    continue;
                };
                let Some(own) = node.interface(&connection.interface) else {
                    continue;
                };
                if link.send_direction(own.id()) != Some(Direction::Forward) {
                    continue;
                }

                edges.push(Edge {
                    a: node.id,
                    a_interface: connection.interface.clone(),
                    b: connection.peer_node,
                    b_interface: connection.peer_interface.clone(),
                    metric: link.metrics(),
                });
            }
        }

        self.graph = Graph::new(vertices, edges);
        let mut tables = self.graph.routing_tables();

        let mut total_routes = 0;
        for node in self.nodes.iter_mut().flatten() {
            node.routing_table = tables.remove(&node.id).unwrap_or_default();
            total_routes += node.routing_table.len();
        }

        tracing::debug!(
            nodes = self.graph.vertices().len(),
            links = self.graph.edges().len(),
            routes = total_routes,
            "rebuilt routing tables"
        );
        self.tracer
            .track_routing_tables_rebuilt(self.graph.edges().len(), total_routes);
    }

    // --- Steps ---

    /// Sends a packet from a host's application, with a ppv drawn at random
    pub fn send_packet(&mut self, from: &str, to: &str) -> Result<Hop, NetworkError> {
        let ppv = self.rng.u32(1..=self.max_ppv);
        self.send_packet_with_ppv(from, to, ppv as i64)
    }

    pub fn send_packet_with_ppv(&mut self, from: &str, to: &str, ppv: i64) -> Result<Hop, NetworkError> {
        let source = self.resolve(from)?;
        let destination = match self.resolve(to) {
            Ok(id) => self.node_by_id(id).ip,
            Err(e) => to.parse::<IpAddr>().map_err(|_| e)?,
        };

        let identity = self.packet_ids.next();
        let node = self.nodes[source.0]
            .as_mut()
            .expect("resolved node does not exist");
        let hop = node.send_packet(destination, identity, ppv, &mut self.links)?;

        self.tracer.track_packet_created(node, &hop.packet);
        self.tracer
            .track_packet_in_transit(node, &hop.interface, &hop.packet);
        Ok(hop)
    }

    /// Takes the next packet waiting at a node's interface
    ///
    /// Hosts hand the packet to their application. Routers run admission control, and any packet
    /// it rejects or evicts counts as dropped.
    pub fn receive_packet(&mut self, node: &str, interface: &str) -> Result<Reception, NetworkError> {
        let id = self.resolve(node)?;
        let node = self.nodes[id.0]
            .as_mut()
            .expect("resolved node does not exist");
        let reception = node.receive_packet(interface, &mut self.links)?;

        let tracer = &self.tracer;
        match &reception {
            Reception::Delivered(packet) => {
                tracer.track_packet_in_node(node, packet);
                tracer.track_packet_delivered(node, packet);
            }
            Reception::Buffered(packet) => {
                tracer.track_packet_in_node(node, packet);
                tracer.track_packet_buffered(node, packet);
            }
            Reception::Evicted { admitted, evicted } => {
                self.dropped += 1;
                tracer.track_packet_in_node(node, admitted);
                tracer.track_packet_dropped(node, evicted, DropReason::Evicted);
                tracer.track_packet_buffered(node, admitted);
            }
            Reception::Dropped(packet) => {
                self.dropped += 1;
                tracer.track_packet_in_node(node, packet);
                tracer.track_packet_dropped(node, packet, DropReason::BufferFull);
            }
        }

        Ok(reception)
    }

    /// Forwards the next buffered packet of a router
    ///
    /// A packet the router has no route for is discarded and counts as dropped.
    pub fn forward_packet(&mut self, router: &str) -> Result<Forwarding, NetworkError> {
        let id = self.resolve(router)?;
        let node = self.nodes[id.0]
            .as_mut()
            .expect("resolved node does not exist");
        let forwarding = node.forward_packet(&mut self.links)?;

        match &forwarding {
            Forwarding::Forwarded(hop) => {
                self.tracer
                    .track_packet_in_transit(node, &hop.interface, &hop.packet);
            }
            Forwarding::Dropped(packet) => {
                self.dropped += 1;
                self.tracer
                    .track_packet_dropped(node, packet, DropReason::NoRoute);
            }
            Forwarding::Idle => {}
        }

        Ok(forwarding)
    }

    /// Applies congestion feedback to the application of the host with the given address
    pub fn send_feedback(&mut self, source_ip: IpAddr, value: i64) -> Result<u64, NetworkError> {
        let Some(node) = self.node_by_ip(source_ip) else {
            return Err(NetworkError::NodeNotFound {
                key: source_ip.to_string(),
            });
        };

        let id = node.id;
        self.node_by_id_mut(id).handle_feedback(value)
    }

    pub fn handle_feedback(&mut self, host: &str, value: i64) -> Result<u64, NetworkError> {
        let id = self.resolve(host)?;
        self.node_by_id_mut(id).handle_feedback(value)
    }

    // --- Internals ---

    fn ensure_unique(&self, name: &str, ip: IpAddr) -> Result<(), NetworkError> {
        if self.nodes().any(|n| n.name.as_ref() == name) {
            return Err(NetworkError::DuplicateName {
                name: name.to_string(),
            });
        }
        if self.nodes().any(|n| n.ip == ip) {
            return Err(NetworkError::DuplicateIp { ip });
        }

        Ok(())
    }

    fn next_node_id(&self) -> NodeId {
        NodeId(self.nodes.len())
    }

    fn insert_node(&mut self, node: Node) {
        tracing::debug!(%node, "created node");
        self.tracer.track_node_added(&node);
        self.nodes.push(Some(node));
    }

    fn node_by_id_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.0].as_mut().expect("node does not exist")
    }

    /// Creates a link between two interfaces, without rebuilding the routing tables
    fn link_interfaces(
        &mut self,
        a: NodeId,
        interface_a: &str,
        b: NodeId,
        interface_b: &str,
        speed: i64,
        metric: i64,
    ) -> Result<LinkId, NetworkError> {
        if a == b {
            return Err(NetworkError::SelfConnection {
                node: self.node_by_id(a).name.clone(),
            });
        }

        let a_id = self.free_interface(a, interface_a)?;
        let b_id = self.free_interface(b, interface_b)?;

        let link = self.links.insert(Link::new(a_id, b_id, speed, metric));
        let interface_a: Arc<str> = interface_a.into();
        let interface_b: Arc<str> = interface_b.into();

        let node_a = self.node_by_id_mut(a);
        if let Some(interface) = node_a.interface_by_id_mut(a_id) {
            interface.connect_link(link, Direction::Forward, Direction::Backward);
        }
        node_a.connections.push(Connection {
            interface: interface_a.clone(),
            peer_node: b,
            peer_interface: interface_b.clone(),
            link,
        });

        let node_b = self.node_by_id_mut(b);
        if let Some(interface) = node_b.interface_by_id_mut(b_id) {
            interface.connect_link(link, Direction::Backward, Direction::Forward);
        }
        node_b.connections.push(Connection {
            interface: interface_b.clone(),
            peer_node: a,
            peer_interface: interface_a.clone(),
            link,
        });

        tracing::debug!(
            a = %self.node_by_id(a).name,
            %interface_a,
            b = %self.node_by_id(b).name,
            %interface_b,
            "connected interfaces"
        );
        Ok(link)
    }

    fn free_interface(&self, node: NodeId, name: &str) -> Result<InterfaceId, NetworkError> {
        let node = self.node_by_id(node);
        let Some(interface) = node.interface(name) else {
            return Err(node.interface_not_found(name));
        };
        if interface.is_connected() {
            return Err(NetworkError::InterfaceInUse {
                node: node.name.clone(),
                interface: interface.name().clone(),
            });
        }

        Ok(interface.id())
    }

    /// Tears down the link attached to an interface, without rebuilding the routing tables
    ///
    /// Packets still in flight are discarded and counted as dropped.
    fn unlink(&mut self, node: NodeId, interface: &str) -> Result<usize, NetworkError> {
        let own = self.node_by_id(node);
        let Some(own_interface) = own.interface(interface) else {
            return Err(own.interface_not_found(interface));
        };
        let not_connected = NetworkError::InterfaceNotConnected {
            node: own.name.clone(),
            interface: own_interface.name().clone(),
        };
        let Some(binding) = own_interface.binding() else {
            return Err(not_connected);
        };
        let Some(mut link) = self.links.remove(binding.link) else {
            return Err(not_connected);
        };

        // Both endpoints forget about the link
        for endpoint in link.endpoints() {
            for candidate in self.nodes.iter_mut().flatten() {
                if let Some(interface) = candidate.interface_by_id_mut(endpoint) {
                    interface.disconnect_link();
                    candidate.connections.retain(|c| c.link != binding.link);
                    break;
                }
            }
        }

        let discarded = link.discard_in_flight();
        self.dropped += discarded.len() as u64;

        let node = self.node_by_id(node);
        for packet in &discarded {
            self.tracer
                .track_packet_dropped(node, packet, DropReason::LinkTeardown);
        }

        tracing::debug!(
            node = %node.name,
            interface,
            discarded = discarded.len(),
            "disconnected interface"
        );
        Ok(discarded.len())
    }
}
