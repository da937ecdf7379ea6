use crate::trace::simulation_step::{
    DropReason, GenericPacketEvent, PacketDropped, SimulationStep, SimulationStepKind,
};
use crate::trace::stats::NodeStats;
use std::cmp;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub struct VerifiedSimulation {
    pub stats_by_node: HashMap<Arc<str>, NodeStats>,
    /// Packets still on a link when the trace ends
    pub in_flight: usize,
    pub routing_rebuilds: usize,
}

impl VerifiedSimulation {
    pub fn total(&self) -> NodeStats {
        let mut total = NodeStats::default();
        for stats in self.stats_by_node.values() {
            total.sent.add(stats.sent);
            total.received.add(stats.received);
            total.forwarded.add(stats.forwarded);
            total.delivered.add(stats.delivered);
            total.dropped_buffer_full.add(stats.dropped_buffer_full);
            total.dropped_evicted.add(stats.dropped_evicted);
            total.dropped_link_teardown.add(stats.dropped_link_teardown);
            total.dropped_no_route.add(stats.dropped_no_route);
            total.dropped_node_deleted.add(stats.dropped_node_deleted);
            total.max_buffer_usage = cmp::max(total.max_buffer_usage, stats.max_buffer_usage);
        }
        total
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InvalidSimulation {
    #[error("network node `{node_id}` was referenced but does not exist")]
    MissingNode { node_id: Arc<str> },
    #[error("packet `{packet_id}` was created more than once")]
    PacketAlreadyCreated { packet_id: Uuid },
    #[error("network node received packet with id `{packet_id}` multiple times")]
    PacketAlreadyReceived { packet_id: Uuid },
    #[error("packet `{packet_id}` was delivered to an application more than once")]
    PacketAlreadyDelivered { packet_id: Uuid },
    #[error("network node `{node_id}` created a packet out of thin air (packet `{packet_id}`)")]
    PacketCreatedByRouterNode { node_id: Arc<str>, packet_id: Uuid },
    #[error(
        "network node `{node_id}` removed packet `{packet_id}`, but according to the trace the packet was not present at all"
    )]
    MissingPacket { node_id: Arc<str>, packet_id: Uuid },
    #[error(
        "network node `{node_id}` received packet `{packet_id}`, but according to the trace the packet was not in transit"
    )]
    PacketNotInTransit { node_id: Arc<str>, packet_id: Uuid },
    #[error(
        "packet `{packet_id}` was marked as lost in transit, but according to the trace the packet was not in transit at that moment"
    )]
    MissingLostPacket { packet_id: Uuid },
}

/// Replays a trace, checking that packets only move in ways the network allows
#[derive(Default)]
pub struct SimulationVerifier {
    steps: Vec<SimulationStep>,
    /// Map from node ids to their associated state
    nodes: HashMap<Arc<str>, ReplayedNode>,
    /// Map from packet ids to the node that put them on a link
    in_flight_packets: HashMap<Uuid, InFlightPacket>,
    created_packets: HashSet<Uuid>,
    delivered_packets: HashSet<Uuid>,
    routing_rebuilds: usize,
}

impl SimulationVerifier {
    pub fn new(mut steps: Vec<SimulationStep>) -> Self {
        if !steps.is_sorted_by_key(|s| s.step) {
            steps.sort_unstable_by_key(|s| s.step);
        }

        Self {
            steps,
            ..Default::default()
        }
    }

    pub fn verify(mut self) -> Result<VerifiedSimulation, InvalidSimulation> {
        let steps = std::mem::take(&mut self.steps);
        for step in steps {
            match &step.kind {
                SimulationStepKind::NodeAdded(s) => {
                    self.nodes.entry(s.node_id.clone()).or_default().host = s.host;
                }
                SimulationStepKind::RoutingTablesRebuilt(_) => {
                    self.routing_rebuilds += 1;
                }
                SimulationStepKind::PacketCreated(s) => {
                    if !self.created_packets.insert(s.packet_id) {
                        return Err(InvalidSimulation::PacketAlreadyCreated {
                            packet_id: s.packet_id,
                        });
                    }

                    let node = self.node(&s.node_id)?;
                    if !node.host {
                        return Err(InvalidSimulation::PacketCreatedByRouterNode {
                            node_id: s.node_id.clone(),
                            packet_id: s.packet_id,
                        });
                    }
                    node.packet_created(s)?;
                }
                SimulationStepKind::PacketInTransit(s) => {
                    let packet = self.node(&s.node_id)?.packet_sent(&s.node_id, s.packet_id)?;
                    self.in_flight_packets.insert(
                        s.packet_id,
                        InFlightPacket {
                            ppv: packet.ppv,
                        },
                    );
                }
                SimulationStepKind::PacketInNode(s) => {
                    if self.in_flight_packets.remove(&s.packet_id).is_none() {
                        return Err(InvalidSimulation::PacketNotInTransit {
                            node_id: s.node_id.clone(),
                            packet_id: s.packet_id,
                        });
                    }

                    self.node(&s.node_id)?.packet_received(s)?;
                }
                SimulationStepKind::PacketBuffered(s) => {
                    self.node(&s.node_id)?.packet_buffered(s)?;
                }
                SimulationStepKind::PacketDeliveredToApplication(s) => {
                    if !self.delivered_packets.insert(s.packet_id) {
                        return Err(InvalidSimulation::PacketAlreadyDelivered {
                            packet_id: s.packet_id,
                        });
                    }

                    self.node(&s.node_id)?.packet_delivered(s)?;
                }
                SimulationStepKind::PacketDropped(s) if s.reason == DropReason::LinkTeardown => {
                    let Some(packet) = self.in_flight_packets.remove(&s.packet_id) else {
                        return Err(InvalidSimulation::MissingLostPacket {
                            packet_id: s.packet_id,
                        });
                    };

                    self.node(&s.node_id)?
                        .stats
                        .dropped_link_teardown
                        .track_one(packet.ppv);
                }
                SimulationStepKind::PacketDropped(s) => {
                    self.node(&s.node_id)?.packet_dropped(s)?;
                }
            }
        }

        let stats_by_node = self
            .nodes
            .into_iter()
            .map(|(k, v)| (k, v.stats))
            .collect();

        Ok(VerifiedSimulation {
            stats_by_node,
            in_flight: self.in_flight_packets.len(),
            routing_rebuilds: self.routing_rebuilds,
        })
    }

    fn node(&mut self, node_id: &Arc<str>) -> Result<&mut ReplayedNode, InvalidSimulation> {
        if let Some(node) = self.nodes.get_mut(node_id) {
            Ok(node)
        } else {
            Err(InvalidSimulation::MissingNode {
                node_id: node_id.clone(),
            })
        }
    }
}

#[derive(Default)]
struct ReplayedNode {
    host: bool,
    /// Packets currently held by the node (just created, just received or buffered)
    packets: HashMap<Uuid, ReplayedPacket>,
    buffer_usage: usize,
    stats: NodeStats,
}

impl ReplayedNode {
    fn packet_created(&mut self, s: &GenericPacketEvent) -> Result<(), InvalidSimulation> {
        self.stats.sent.track_one(s.ppv);
        self.hold(s)
    }

    fn packet_received(&mut self, s: &GenericPacketEvent) -> Result<(), InvalidSimulation> {
        self.stats.received.track_one(s.ppv);
        self.hold(s)
    }

    fn packet_buffered(&mut self, s: &GenericPacketEvent) -> Result<(), InvalidSimulation> {
        let Some(packet) = self.packets.get_mut(&s.packet_id) else {
            return Err(InvalidSimulation::MissingPacket {
                node_id: s.node_id.clone(),
                packet_id: s.packet_id,
            });
        };

        if !packet.buffered {
            packet.buffered = true;
            self.buffer_usage += 1;
            self.stats.max_buffer_usage = cmp::max(self.stats.max_buffer_usage, self.buffer_usage);
        }

        Ok(())
    }

    fn packet_sent(
        &mut self,
        node_id: &Arc<str>,
        packet_id: Uuid,
    ) -> Result<ReplayedPacket, InvalidSimulation> {
        let packet = self.release(node_id, packet_id)?;
        if packet.buffered {
            self.stats.forwarded.track_one(packet.ppv);
        }
        Ok(packet)
    }

    fn packet_delivered(&mut self, s: &GenericPacketEvent) -> Result<(), InvalidSimulation> {
        let packet = self.release(&s.node_id, s.packet_id)?;
        self.stats.delivered.track_one(packet.ppv);
        Ok(())
    }

    fn packet_dropped(&mut self, s: &PacketDropped) -> Result<(), InvalidSimulation> {
        let packet = self.release(&s.node_id, s.packet_id)?;
        match s.reason {
            DropReason::BufferFull => self.stats.dropped_buffer_full.track_one(packet.ppv),
            DropReason::Evicted => self.stats.dropped_evicted.track_one(packet.ppv),
            DropReason::LinkTeardown => self.stats.dropped_link_teardown.track_one(packet.ppv),
            DropReason::NoRoute => self.stats.dropped_no_route.track_one(packet.ppv),
            DropReason::NodeDeleted => self.stats.dropped_node_deleted.track_one(packet.ppv),
        }

        Ok(())
    }

    fn hold(&mut self, s: &GenericPacketEvent) -> Result<(), InvalidSimulation> {
        let already_exists = self
            .packets
            .insert(
                s.packet_id,
                ReplayedPacket {
                    ppv: s.ppv,
                    buffered: false,
                },
            )
            .is_some();
        if already_exists {
            return Err(InvalidSimulation::PacketAlreadyReceived {
                packet_id: s.packet_id,
            });
        }

        Ok(())
    }

    fn release(
        &mut self,
        node_id: &Arc<str>,
        packet_id: Uuid,
    ) -> Result<ReplayedPacket, InvalidSimulation> {
        let Some(packet) = self.packets.remove(&packet_id) else {
            return Err(InvalidSimulation::MissingPacket {
                node_id: node_id.clone(),
                packet_id,
            });
        };

        if packet.buffered {
            self.buffer_usage -= 1;
        }
        Ok(packet)
    }
}

struct ReplayedPacket {
    ppv: u32,
    buffered: bool,
}

struct InFlightPacket {
    ppv: u32,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::trace::simulation_step::{NodeAdded, PacketInTransit};

    fn host(name: &str) -> SimulationStepKind {
        SimulationStepKind::NodeAdded(NodeAdded {
            node_id: name.into(),
            host: true,
        })
    }

    fn router(name: &str) -> SimulationStepKind {
        SimulationStepKind::NodeAdded(NodeAdded {
            node_id: name.into(),
            host: false,
        })
    }

    fn event(id: u128, node: &str) -> GenericPacketEvent {
        GenericPacketEvent {
            packet_id: Uuid::from_u128(id),
            packet_number: id as u64,
            ppv: 10,
            node_id: node.into(),
        }
    }

    fn transit(id: u128, node: &str) -> SimulationStepKind {
        SimulationStepKind::PacketInTransit(PacketInTransit {
            packet_id: Uuid::from_u128(id),
            node_id: node.into(),
            interface: "eth0".into(),
        })
    }

    fn steps(kinds: Vec<SimulationStepKind>) -> Vec<SimulationStep> {
        kinds
            .into_iter()
            .enumerate()
            .map(|(i, kind)| SimulationStep {
                step: i as u64,
                kind,
            })
            .collect()
    }

    #[test]
    fn test_valid_trace_produces_stats() {
        let trace = steps(vec![
            host("a"),
            router("r"),
            host("b"),
            SimulationStepKind::PacketCreated(event(1, "a")),
            transit(1, "a"),
            SimulationStepKind::PacketInNode(event(1, "r")),
            SimulationStepKind::PacketBuffered(event(1, "r")),
            transit(1, "r"),
            SimulationStepKind::PacketInNode(event(1, "b")),
            SimulationStepKind::PacketDeliveredToApplication(event(1, "b")),
        ]);

        let verified = SimulationVerifier::new(trace).verify().unwrap();
        assert_eq!(verified.in_flight, 0);
        assert_eq!(verified.stats_by_node["a"].sent.packets, 1);
        assert_eq!(verified.stats_by_node["r"].forwarded.packets, 1);
        assert_eq!(verified.stats_by_node["r"].max_buffer_usage, 1);
        assert_eq!(verified.stats_by_node["b"].delivered.packets, 1);
        assert_eq!(verified.stats_by_node["b"].delivered.ppv, 10);
    }

    #[test]
    fn test_router_cannot_create_packets() {
        let trace = steps(vec![
            router("r"),
            SimulationStepKind::PacketCreated(event(1, "r")),
        ]);

        assert_eq!(
            SimulationVerifier::new(trace).verify().err(),
            Some(InvalidSimulation::PacketCreatedByRouterNode {
                node_id: "r".into(),
                packet_id: Uuid::from_u128(1),
            })
        );
    }

    #[test]
    fn test_double_delivery_is_rejected() {
        let trace = steps(vec![
            host("a"),
            host("b"),
            SimulationStepKind::PacketCreated(event(1, "a")),
            transit(1, "a"),
            SimulationStepKind::PacketInNode(event(1, "b")),
            SimulationStepKind::PacketDeliveredToApplication(event(1, "b")),
            SimulationStepKind::PacketInNode(event(1, "b")),
        ]);

        assert!(matches!(
            SimulationVerifier::new(trace).verify(),
            Err(InvalidSimulation::PacketNotInTransit { .. })
        ));
    }

    #[test]
    fn test_packet_cannot_reappear_after_drop() {
        let trace = steps(vec![
            host("a"),
            host("b"),
            SimulationStepKind::PacketCreated(event(1, "a")),
            transit(1, "a"),
            SimulationStepKind::PacketDropped(PacketDropped {
                packet_id: Uuid::from_u128(1),
                node_id: "a".into(),
                reason: DropReason::LinkTeardown,
            }),
            SimulationStepKind::PacketInNode(event(1, "b")),
        ]);

        assert!(matches!(
            SimulationVerifier::new(trace).verify(),
            Err(InvalidSimulation::PacketNotInTransit { .. })
        ));
    }

    #[test]
    fn test_buffered_packet_dropped_without_route() {
        let trace = steps(vec![
            host("a"),
            router("r"),
            SimulationStepKind::PacketCreated(event(1, "a")),
            transit(1, "a"),
            SimulationStepKind::PacketInNode(event(1, "r")),
            SimulationStepKind::PacketBuffered(event(1, "r")),
            SimulationStepKind::PacketDropped(PacketDropped {
                packet_id: Uuid::from_u128(1),
                node_id: "r".into(),
                reason: DropReason::NoRoute,
            }),
        ]);

        let verified = SimulationVerifier::new(trace).verify().unwrap();
        let stats = &verified.stats_by_node["r"];
        assert_eq!(stats.dropped_no_route.packets, 1);
        assert_eq!(stats.dropped().packets, 1);
        assert_eq!(stats.forwarded.packets, 0);
        assert_eq!(verified.total().dropped_no_route.ppv, 10);
    }
}
