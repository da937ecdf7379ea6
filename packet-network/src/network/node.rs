use crate::error::NetworkError;
use crate::network::application::Application;
use crate::network::host::Host;
use crate::network::interface::{Interface, InterfaceId};
use crate::network::link::{LinkId, Links};
use crate::network::packet::{Packet, PacketIdentity};
use crate::network::route::{Route, RoutingTable};
use crate::network::router::Router;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::sync::Arc;

/// Handle to a node stored in the network
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug)]
pub enum NodeKind {
    Host(Host),
    Router(Router),
}

/// A link established between one of our interfaces and an interface of another node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub interface: Arc<str>,
    pub peer_node: NodeId,
    pub peer_interface: Arc<str>,
    pub link: LinkId,
}

/// Where a packet went after leaving a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    /// The next hop's ip address
    pub gateway: IpAddr,
    /// The interface the packet left through
    pub interface: Arc<str>,
    /// The node the packet left from
    pub node: NodeId,
    pub packet: Packet,
}

/// What happened to a packet taken from an interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reception {
    /// The packet reached its final destination
    Delivered(Packet),
    /// The packet is waiting in a router's buffer
    Buffered(Packet),
    /// The packet was admitted at the expense of a buffered one
    Evicted { admitted: Packet, evicted: Packet },
    /// The packet was rejected by admission control
    Dropped(Packet),
}

/// What happened when a router tried to forward its next packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Forwarding {
    /// The packet left through one of the router's interfaces
    Forwarded(Hop),
    /// The packet had no usable route and was discarded
    Dropped(Packet),
    /// Nothing left the router
    Idle,
}

#[derive(Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: Arc<str>,
    pub(crate) ip: IpAddr,
    pub(crate) send_rate: u64,
    pub(crate) interfaces: Vec<Interface>,
    pub(crate) connections: Vec<Connection>,
    pub(crate) routing_table: RoutingTable,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn host(id: NodeId, name: Arc<str>, ip: IpAddr, send_rate: u64) -> Self {
        Self::new(id, name, ip, send_rate, NodeKind::Host(Host::new()))
    }

    pub(crate) fn router(
        id: NodeId,
        name: Arc<str>,
        ip: IpAddr,
        send_rate: u64,
        buffer_size: i64,
    ) -> Self {
        Self::new(
            id,
            name,
            ip,
            send_rate,
            NodeKind::Router(Router::new(buffer_size)),
        )
    }

    fn new(id: NodeId, name: Arc<str>, ip: IpAddr, send_rate: u64, kind: NodeKind) -> Self {
        Self {
            id,
            name,
            ip,
            send_rate,
            interfaces: Vec::new(),
            connections: Vec::new(),
            routing_table: RoutingTable::new(),
            kind,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn send_rate(&self) -> u64 {
        self.send_rate
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_host(&self) -> bool {
        matches!(self.kind, NodeKind::Host(_))
    }

    pub fn is_router(&self) -> bool {
        matches!(self.kind, NodeKind::Router(_))
    }

    pub fn application(&self) -> Option<&Application> {
        match &self.kind {
            NodeKind::Host(host) => host.application(),
            NodeKind::Router(_) => None,
        }
    }

    pub fn router_state(&self) -> Option<&Router> {
        match &self.kind {
            NodeKind::Router(router) => Some(router),
            NodeKind::Host(_) => None,
        }
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name().as_ref() == name)
    }

    pub(crate) fn interface_mut(&mut self, name: &str) -> Option<&mut Interface> {
        self.interfaces.iter_mut().find(|i| i.name().as_ref() == name)
    }

    pub(crate) fn interface_by_id_mut(&mut self, id: InterfaceId) -> Option<&mut Interface> {
        self.interfaces.iter_mut().find(|i| i.id() == id)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    pub fn best_route(&self, destination: IpAddr) -> Option<&Route> {
        self.routing_table.best_route(destination)
    }

    pub(crate) fn add_interface(&mut self, id: InterfaceId, name: &str) -> Result<(), NetworkError> {
        if self.interface(name).is_some() {
            return Err(NetworkError::DuplicateInterface {
                node: self.name.clone(),
                interface: name.to_string(),
            });
        }

        self.interfaces.push(Interface::new(id, name.into()));
        Ok(())
    }

    pub(crate) fn remove_interface(&mut self, name: &str) -> Option<Interface> {
        let index = self.interfaces.iter().position(|i| i.name().as_ref() == name)?;
        Some(self.interfaces.remove(index))
    }

    pub(crate) fn interface_not_found(&self, interface: &str) -> NetworkError {
        NetworkError::InterfaceNotFound {
            node: self.name.clone(),
            interface: interface.to_string(),
        }
    }

    /// Attaches an application to a host, mirroring its send rate onto the host
    pub(crate) fn set_application(&mut self, application: Application) -> Result<(), NetworkError> {
        let NodeKind::Host(host) = &mut self.kind else {
            return Err(NetworkError::NotAHost {
                node: self.name.clone(),
            });
        };

        self.send_rate = application.send_rate();
        host.application = Some(application);
        Ok(())
    }

    /// Creates a packet towards `destination` and puts it on the outgoing interface
    pub(crate) fn send_packet(
        &mut self,
        destination: IpAddr,
        identity: PacketIdentity,
        ppv: i64,
        links: &mut Links,
    ) -> Result<Hop, NetworkError> {
        let NodeKind::Host(host) = &mut self.kind else {
            return Err(NetworkError::NotAHost {
                node: self.name.clone(),
            });
        };
        let Some(application) = &mut host.application else {
            return Err(NetworkError::NoApplication {
                node: self.name.clone(),
            });
        };
        if !application.can_send() {
            return Err(NetworkError::QuotaExhausted {
                node: self.name.clone(),
            });
        }
        if destination == self.ip {
            return Err(NetworkError::SelfAddressed {
                node: self.name.clone(),
            });
        }

        let Some(route) = self.routing_table.best_route(destination) else {
            return Err(NetworkError::NoRoute {
                node: self.name.clone(),
                destination,
            });
        };
        let Some(interface) = self
            .interfaces
            .iter()
            .find(|i| i.name() == &route.interface)
        else {
            return Err(NetworkError::InterfaceNotFound {
                node: self.name.clone(),
                interface: route.interface.to_string(),
            });
        };
        if !interface.is_connected() {
            return Err(NetworkError::InterfaceNotConnected {
                node: self.name.clone(),
                interface: interface.name().clone(),
            });
        }

        // Unwrap: we checked above that the application can send
        let packet = application.send(identity, destination, ppv).unwrap();
        let hop = Hop {
            gateway: route.gateway,
            interface: route.interface.clone(),
            node: self.id,
            packet: packet.clone(),
        };

        interface.put_to_link(links, packet).map_err(|_| {
            NetworkError::InterfaceNotConnected {
                node: self.name.clone(),
                interface: hop.interface.clone(),
            }
        })?;

        Ok(hop)
    }

    /// Takes the next packet waiting at `interface` and handles it
    pub(crate) fn receive_packet(
        &mut self,
        interface: &str,
        links: &mut Links,
    ) -> Result<Reception, NetworkError> {
        let Some(iface) = self.interface(interface) else {
            return Err(self.interface_not_found(interface));
        };
        let Some(packet) = iface.receive_from_link(links) else {
            return Err(NetworkError::NoPacketAvailable {
                node: self.name.clone(),
                interface: iface.name().clone(),
            });
        };

        let reception = match &mut self.kind {
            NodeKind::Host(host) => {
                if let Some(application) = &mut host.application {
                    application.receive(&packet);
                }
                Reception::Delivered(packet)
            }
            NodeKind::Router(_) if packet.target_ip() == self.ip => Reception::Delivered(packet),
            NodeKind::Router(router) => router.admit(packet),
        };

        Ok(reception)
    }

    /// Forwards the oldest buffered packet along its best route
    ///
    /// A packet without a route (or whose route points at a disconnected interface) is taken
    /// out of the buffer and reported as dropped, so it cannot hold back the packets behind it.
    pub(crate) fn forward_packet(&mut self, links: &mut Links) -> Result<Forwarding, NetworkError> {
        let NodeKind::Router(router) = &mut self.kind else {
            return Err(NetworkError::NotARouter {
                node: self.name.clone(),
            });
        };
        let Some(packet) = router.take_next() else {
            return Ok(Forwarding::Idle);
        };
        let Some(route) = self.routing_table.best_route(packet.target_ip()) else {
            return Ok(Forwarding::Dropped(packet));
        };
        let Some(interface) = self
            .interfaces
            .iter()
            .find(|i| i.name() == &route.interface && i.is_connected())
        else {
            return Ok(Forwarding::Dropped(packet));
        };

        let hop = Hop {
            gateway: route.gateway,
            interface: route.interface.clone(),
            node: self.id,
            packet: packet.clone(),
        };

        if let Err(packet) = interface.put_to_link(links, packet) {
            // The binding points to a link that no longer exists; keep the packet
            router.buffer_front(packet);
            return Ok(Forwarding::Idle);
        }

        Ok(Forwarding::Forwarded(hop))
    }

    /// Applies congestion feedback to the host's application and mirrors the new send rate
    pub(crate) fn handle_feedback(&mut self, value: i64) -> Result<u64, NetworkError> {
        let NodeKind::Host(host) = &mut self.kind else {
            return Err(NetworkError::NotAHost {
                node: self.name.clone(),
            });
        };
        let Some(application) = &mut host.application else {
            return Err(NetworkError::NoApplication {
                node: self.name.clone(),
            });
        };

        self.send_rate = application.handle_feedback(value);
        Ok(self.send_rate)
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            NodeKind::Host(_) => "host",
            NodeKind::Router(_) => "router",
        };
        write!(f, "{kind} `{}` ({})", self.name, self.ip)
    }
}
