use crate::trace::simulation_step::{SimulationStep, SimulationStepKind};
use std::sync::Arc;
use uuid::Uuid;

/// Read-only view over recorded steps, to follow individual packets
#[derive(Clone, Default)]
pub struct SimulationStepper {
    steps: Vec<SimulationStep>,
}

impl SimulationStepper {
    pub fn new(steps: Vec<SimulationStep>) -> Self {
        Self { steps }
    }

    pub fn steps(self) -> Vec<SimulationStep> {
        self.steps
    }

    /// The nodes a packet went through, starting at the host that created it
    pub fn get_packet_path(&self, id: Uuid) -> Vec<Arc<str>> {
        let mut path = Vec::new();
        for step in &self.steps {
            match &step.kind {
                SimulationStepKind::PacketCreated(s) | SimulationStepKind::PacketInNode(s)
                    if s.packet_id == id =>
                {
                    path.push(s.node_id.clone());
                }
                _ => {}
            }
        }

        path
    }

    /// The step at which the packet arrived at the given node, if it ever did
    pub fn get_packet_arrived_at(&self, packet_id: Uuid, node_id: &str) -> Option<u64> {
        self.steps
            .iter()
            .filter_map(|s| match &s.kind {
                SimulationStepKind::PacketInNode(kind)
                    if kind.packet_id == packet_id && kind.node_id.as_ref() == node_id =>
                {
                    Some(s.step)
                }
                _ => None,
            })
            .next()
    }

    /// Ids of the packets delivered to an application, in delivery order
    pub fn delivered_packets(&self) -> Vec<Uuid> {
        self.steps
            .iter()
            .filter_map(|s| match &s.kind {
                SimulationStepKind::PacketDeliveredToApplication(kind) => Some(kind.packet_id),
                _ => None,
            })
            .collect()
    }
}
