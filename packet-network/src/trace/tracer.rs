use crate::network::node::Node;
use crate::network::packet::Packet;
use crate::trace::simulation_step::{
    DropReason, GenericPacketEvent, NodeAdded, PacketDropped, PacketInTransit,
    RoutingTablesRebuilt, SimulationStep, SimulationStepKind,
};
use crate::trace::simulation_stepper::SimulationStepper;
use crate::trace::simulation_verifier::{InvalidSimulation, SimulationVerifier, VerifiedSimulation};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Records every packet event of a simulation, in order
#[derive(Default)]
pub struct SimulationStepTracer {
    recorded_steps: Mutex<Vec<SimulationStep>>,
    already_warned_dropped_from_buffer: Mutex<HashSet<Arc<str>>>,
}

impl SimulationStepTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> Vec<SimulationStep> {
        self.recorded_steps.lock().clone()
    }

    pub fn stepper(&self) -> SimulationStepper {
        SimulationStepper::new(self.steps())
    }

    /// Replays the recorded steps, checking that no packet was lost or delivered twice
    pub fn verify(&self) -> Result<VerifiedSimulation, InvalidSimulation> {
        SimulationVerifier::new(self.steps()).verify()
    }

    fn record(&self, kind: SimulationStepKind) {
        let mut steps = self.recorded_steps.lock();
        let step = steps.len() as u64;
        steps.push(SimulationStep { step, kind });
    }

    pub fn track_node_added(&self, node: &Node) {
        self.record(SimulationStepKind::NodeAdded(NodeAdded {
            node_id: node.name().clone(),
            host: node.is_host(),
        }));
    }

    pub fn track_routing_tables_rebuilt(&self, links: usize, routes: usize) {
        self.record(SimulationStepKind::RoutingTablesRebuilt(
            RoutingTablesRebuilt { links, routes },
        ));
    }

    pub fn track_packet_created(&self, node: &Node, packet: &Packet) {
        self.record(SimulationStepKind::PacketCreated(generic_event(node, packet)));
    }

    pub fn track_packet_in_transit(&self, node: &Node, interface: &Arc<str>, packet: &Packet) {
        self.record(SimulationStepKind::PacketInTransit(PacketInTransit {
            packet_id: packet.id(),
            node_id: node.name().clone(),
            interface: interface.clone(),
        }));
    }

    pub fn track_packet_in_node(&self, node: &Node, packet: &Packet) {
        self.record(SimulationStepKind::PacketInNode(generic_event(node, packet)));
    }

    pub fn track_packet_buffered(&self, node: &Node, packet: &Packet) {
        self.record(SimulationStepKind::PacketBuffered(generic_event(node, packet)));
    }

    pub fn track_packet_delivered(&self, node: &Node, packet: &Packet) {
        self.record(SimulationStepKind::PacketDeliveredToApplication(
            generic_event(node, packet),
        ));
    }

    pub fn track_packet_dropped(&self, node: &Node, packet: &Packet, reason: DropReason) {
        self.record(SimulationStepKind::PacketDropped(PacketDropped {
            packet_id: packet.id(),
            node_id: node.name().clone(),
            reason,
        }));

        match reason {
            DropReason::LinkTeardown => {
                tracing::warn!(
                    "packet #{} lost in transit because a link of node `{}` was torn down",
                    packet.number(),
                    node.name(),
                );
            }
            DropReason::NoRoute => {
                tracing::warn!(
                    "packet #{} dropped by node `{}` because it has no route to {}",
                    packet.number(),
                    node.name(),
                    packet.target_ip(),
                );
            }
            DropReason::NodeDeleted => {
                tracing::debug!(
                    "packet #{} discarded from the buffer of deleted node `{}`",
                    packet.number(),
                    node.name(),
                );
            }
            DropReason::BufferFull | DropReason::Evicted => {
                let first_dropped = self
                    .already_warned_dropped_from_buffer
                    .lock()
                    .insert(node.name().clone());
                if first_dropped {
                    tracing::warn!(
                        "packet #{} dropped by node `{}` because its buffer was full! (Note: further warnings for this node will be omitted to avoid cluttering the output)",
                        packet.number(),
                        node.name(),
                    );
                }
            }
        }
    }
}

fn generic_event(node: &Node, packet: &Packet) -> GenericPacketEvent {
    GenericPacketEvent {
        packet_id: packet.id(),
        packet_number: packet.number(),
        ppv: packet.ppv(),
        node_id: node.name().clone(),
    }
}
