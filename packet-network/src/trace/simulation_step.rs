use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationStep {
    /// Sequence number of the step within the simulation
    pub step: u64,
    #[serde(flatten)]
    pub kind: SimulationStepKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
pub enum SimulationStepKind {
    /// A node joined the network
    NodeAdded(NodeAdded),
    /// The routing tables of all nodes were recomputed
    RoutingTablesRebuilt(RoutingTablesRebuilt),
    /// The packet was created by a host's application
    PacketCreated(GenericPacketEvent),
    /// The packet was put on a link
    PacketInTransit(PacketInTransit),
    /// The packet was taken from a link by one of the network nodes
    PacketInNode(GenericPacketEvent),
    /// The packet was admitted into a router's buffer
    PacketBuffered(GenericPacketEvent),
    /// The packet was dropped
    PacketDropped(PacketDropped),
    /// The packet reached its destination
    PacketDeliveredToApplication(GenericPacketEvent),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeAdded {
    #[serde(with = "crate::util::serde_arc_str")]
    pub node_id: Arc<str>,
    pub host: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoutingTablesRebuilt {
    pub links: usize,
    pub routes: usize,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenericPacketEvent {
    #[serde_as(as = "DisplayFromStr")]
    pub packet_id: Uuid,
    pub packet_number: u64,
    pub ppv: u32,
    #[serde(with = "crate::util::serde_arc_str")]
    pub node_id: Arc<str>,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketInTransit {
    #[serde_as(as = "DisplayFromStr")]
    pub packet_id: Uuid,
    #[serde(with = "crate::util::serde_arc_str")]
    pub node_id: Arc<str>,
    #[serde(with = "crate::util::serde_arc_str")]
    pub interface: Arc<str>,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketDropped {
    #[serde_as(as = "DisplayFromStr")]
    pub packet_id: Uuid,
    #[serde(with = "crate::util::serde_arc_str")]
    pub node_id: Arc<str>,
    pub reason: DropReason,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropReason {
    /// Rejected by a router whose buffer was full
    BufferFull,
    /// Removed from a router's buffer to make room for a more valuable packet
    Evicted,
    /// Still in flight when its link was torn down
    LinkTeardown,
    /// Taken from a router's buffer without a route to its destination
    NoRoute,
    /// Still buffered when its router was deleted
    NodeDeleted,
}
