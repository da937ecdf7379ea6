use crate::config::SimulationConfig;
use crate::config::cli::{CliOpt, Command};
use crate::config::script::ScriptStepJson;
use crate::{config, util};
use anyhow::Context as _;
use fastrand::Rng;
use packet_network::network::node::{Forwarding, Hop, NodeId, Reception};
use packet_network::network::spec::NetworkSpec;
use packet_network::{Network, NetworkConfig, NetworkError, SimulationStepTracer};
use std::collections::VecDeque;
use std::fs;
use std::net::IpAddr;
use std::sync::Arc;

pub fn run(options: &CliOpt, simulation_config: SimulationConfig) -> anyhow::Result<()> {
    println!("--- Params ---");
    let network_rng_seed = if options.non_deterministic {
        Rng::new().u64(..)
    } else {
        options.network_rng_seed
    };
    println!("* Network seed: {network_rng_seed}");
    println!("* Max packet value: {}", options.max_ppv);
    println!("* Network graph path: {}", options.network_graph.display());

    let network_spec: NetworkSpec = simulation_config.network_graph.into();
    let tracer = Arc::new(SimulationStepTracer::new());
    let network = Network::from_spec(
        network_spec,
        NetworkConfig {
            rng_seed: network_rng_seed,
            max_ppv: options.max_ppv,
        },
        tracer.clone(),
    )
    .context("failed to build the network from its graph")?;

    println!("--- Network ---");
    println!(
        "* {} hosts, {} routers, {} links",
        network.hosts().count(),
        network.routers().count(),
        network.links().iter().count()
    );

    // Traffic destinations use their own rng, so packet ids stay stable across commands
    let traffic_rng = Rng::with_seed(network_rng_seed.wrapping_add(1));
    let network = match &options.command {
        Command::Routes => {
            util::print_routing_tables(&network);
            return Ok(());
        }
        Command::Run(run_opt) => {
            let steps = config::load_script(&run_opt.script)?;
            println!("--- Script ---");
            let mut simulation = Simulation::new(network, traffic_rng);
            let failed = simulation.run_script(&steps);
            println!(
                "* {} steps run, {failed} failed, {} packets dropped so far",
                steps.len(),
                simulation.network().dropped_packets()
            );
            simulation.into_network()
        }
        Command::Traffic(traffic_opt) => {
            println!("--- Traffic ---");
            let mut simulation = Simulation::new(network, traffic_rng);
            let stats = simulation.run_traffic(traffic_opt.ticks);
            println!("* Ticks: {}", traffic_opt.ticks);
            println!("* Packets sent: {}", stats.sent);
            println!("* Packets delivered: {}", stats.delivered);
            println!("* Packets dropped: {}", stats.dropped);
            println!("* Packets still in the network: {}", simulation.pending());
            simulation.into_network()
        }
    };

    if let Some(replay_log_path) = &options.replay_log {
        println!("--- Replay log ---");
        let json_steps =
            serde_json::to_vec_pretty(&tracer.steps()).context("failed to serialize replay log")?;
        fs::write(replay_log_path, json_steps).context("failed to store replay log")?;
        println!("* Replay log available at {}", replay_log_path.display());
    }

    let verified_simulation = tracer.verify().context("failed to verify simulation")?;
    util::print_node_stats(&verified_simulation, &network);
    util::print_max_buffer_usage_per_node(&verified_simulation);
    util::print_application_stats(&network);
    println!("--- Drops ---");
    println!("* Total packets dropped: {}", network.dropped_packets());

    Ok(())
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrafficStats {
    pub sent: u64,
    pub delivered: u64,
    pub dropped: u64,
}

/// Drives a network step by step, keeping track of the packets that still have to be received
pub struct Simulation {
    network: Network,
    rng: Rng,
    /// Interfaces that have a packet waiting, in the order the packets were put on their links
    pending: VecDeque<(NodeId, Arc<str>)>,
}

impl Simulation {
    pub fn new(network: Network, rng: Rng) -> Self {
        Self {
            network,
            rng,
            pending: VecDeque::new(),
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn into_network(self) -> Network {
        self.network
    }

    /// Number of packets put on a link that have not been received yet
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Runs every step in order, reporting each outcome
    ///
    /// Failing steps are reported and skipped. Returns the number of failures.
    pub fn run_script(&mut self, steps: &[ScriptStepJson]) -> usize {
        let mut failed = 0;
        for (i, step) in steps.iter().enumerate() {
            match self.run_step(step) {
                Ok(outcome) => println!("* Step {i}: {outcome}"),
                Err(e) => {
                    failed += 1;
                    println!("* Step {i} failed: {e}");
                }
            }
        }

        failed
    }

    fn run_step(&mut self, step: &ScriptStepJson) -> Result<String, NetworkError> {
        let outcome = match step {
            ScriptStepJson::Send { from, to, ppv } => {
                let hop = match ppv {
                    Some(ppv) => self.network.send_packet_with_ppv(from, to, *ppv)?,
                    None => self.network.send_packet(from, to)?,
                };
                format!(
                    "`{from}` sent packet #{} (ppv {}) through {} towards {}",
                    hop.packet.number(),
                    hop.packet.ppv(),
                    hop.interface,
                    hop.gateway
                )
            }
            ScriptStepJson::Receive { node, interface } => {
                let reception = self.network.receive_packet(node, interface)?;
                describe_reception(node, &reception)
            }
            ScriptStepJson::Forward { router } => match self.network.forward_packet(router)? {
                Forwarding::Forwarded(hop) => format!(
                    "`{router}` forwarded packet #{} through {} towards {}",
                    hop.packet.number(),
                    hop.interface,
                    hop.gateway
                ),
                Forwarding::Dropped(packet) => format!(
                    "`{router}` dropped packet #{} (no route to {})",
                    packet.number(),
                    packet.target_ip()
                ),
                Forwarding::Idle => format!("`{router}` had nothing to forward"),
            },
            ScriptStepJson::Feedback { host, value } => {
                let send_rate = self.network.handle_feedback(host, *value)?;
                format!("`{host}` now sends {send_rate} packets per tick")
            }
            ScriptStepJson::Connect {
                a,
                b,
                speed,
                metric,
            } => {
                self.network
                    .connect(&a.node, &a.interface, &b.node, &b.interface, *speed, *metric)?;
                format!(
                    "connected `{}:{}` to `{}:{}`",
                    a.node, a.interface, b.node, b.interface
                )
            }
            ScriptStepJson::Disconnect { node, interface } => {
                let discarded = self.network.disconnect(node, interface)?;
                format!("disconnected `{node}:{interface}` ({discarded} packets lost in transit)")
            }
            ScriptStepJson::DeleteInterface { node, interface } => {
                let discarded = self.network.delete_interface(node, interface)?;
                format!("deleted `{node}:{interface}` ({discarded} packets lost in transit)")
            }
            ScriptStepJson::DeleteNode { node } => {
                let discarded = self.network.delete_node(node)?;
                format!("deleted `{node}` ({discarded} packets lost in transit or buffered)")
            }
        };

        Ok(outcome)
    }

    pub fn run_traffic(&mut self, ticks: u64) -> TrafficStats {
        let mut stats = TrafficStats::default();
        for tick in 0..ticks {
            self.send_from_hosts(&mut stats);
            self.receive_pending(&mut stats);
            self.forward_from_routers(&mut stats);
            tracing::debug!(tick, pending = self.pending.len(), "tick done");
        }

        stats
    }

    fn send_from_hosts(&mut self, stats: &mut TrafficStats) {
        let senders: Vec<_> = self
            .network
            .applications()
            .filter(|(_, app)| app.can_send())
            .map(|(node, _)| (node.name().clone(), node.ip(), node.send_rate()))
            .collect();
        let hosts: Vec<IpAddr> = self.network.hosts().map(|h| h.ip()).collect();

        for (sender, sender_ip, send_rate) in senders {
            let destinations: Vec<_> = hosts.iter().filter(|&&ip| ip != sender_ip).collect();
            if destinations.is_empty() {
                continue;
            }

            for _ in 0..send_rate {
                let destination = destinations[self.rng.usize(..destinations.len())];
                match self.network.send_packet(&sender, &destination.to_string()) {
                    Ok(hop) => {
                        stats.sent += 1;
                        self.schedule(&hop);
                    }
                    Err(NetworkError::QuotaExhausted { .. }) => break,
                    Err(e) => {
                        tracing::debug!(%sender, %destination, "failed to send packet: {e}");
                    }
                }
            }
        }
    }

    fn receive_pending(&mut self, stats: &mut TrafficStats) {
        let pending = std::mem::take(&mut self.pending);
        for (node, interface) in pending {
            let Some(name) = self.network.try_node_by_id(node).map(|n| n.name().clone()) else {
                continue;
            };

            let reception = match self.network.receive_packet(&name, &interface) {
                Ok(reception) => reception,
                Err(e) => {
                    // The link was torn down after the packet was sent
                    tracing::debug!(node = %name, %interface, "nothing to receive: {e}");
                    continue;
                }
            };

            match reception {
                Reception::Delivered(packet) => {
                    stats.delivered += 1;
                    self.feedback(packet.source_ip(), 1);
                }
                Reception::Buffered(_) => {}
                Reception::Evicted { evicted, .. } => {
                    stats.dropped += 1;
                    self.feedback(evicted.source_ip(), -1);
                }
                Reception::Dropped(packet) => {
                    stats.dropped += 1;
                    self.feedback(packet.source_ip(), -1);
                }
            }
        }
    }

    fn forward_from_routers(&mut self, stats: &mut TrafficStats) {
        let routers: Vec<_> = self
            .network
            .routers()
            .map(|r| (r.name().clone(), r.send_rate()))
            .collect();

        for (router, send_rate) in routers {
            for _ in 0..send_rate {
                match self.network.forward_packet(&router) {
                    Ok(Forwarding::Forwarded(hop)) => self.schedule(&hop),
                    Ok(Forwarding::Dropped(packet)) => {
                        stats.dropped += 1;
                        self.feedback(packet.source_ip(), -1);
                    }
                    Ok(Forwarding::Idle) => break,
                    Err(e) => {
                        tracing::debug!(%router, "failed to forward packet: {e}");
                        break;
                    }
                }
            }
        }
    }

    fn schedule(&mut self, hop: &Hop) {
        if let Some(peer) = self.network.peer_of(hop.node, &hop.interface) {
            self.pending.push_back(peer);
        }
    }

    fn feedback(&mut self, source: IpAddr, value: i64) {
        if let Err(e) = self.network.send_feedback(source, value) {
            tracing::debug!(%source, value, "feedback not applied: {e}");
        }
    }
}

fn describe_reception(node: &str, reception: &Reception) -> String {
    match reception {
        Reception::Delivered(packet) => {
            format!("`{node}` received packet #{} (delivered)", packet.number())
        }
        Reception::Buffered(packet) => {
            format!("`{node}` received packet #{} (buffered)", packet.number())
        }
        Reception::Evicted { admitted, evicted } => format!(
            "`{node}` received packet #{} (buffered, evicting packet #{})",
            admitted.number(),
            evicted.number()
        ),
        Reception::Dropped(packet) => {
            format!("`{node}` received packet #{} (dropped, buffer full)", packet.number())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::network::NetworkSpecJson;

    const GRAPH: &str = r#"{
        "nodes": [
            {
                "name": "a",
                "ip": "10.0.0.1",
                "interfaces": ["eth0"],
                "application": { "name": "app-a", "amount": 20, "send_rate": 2, "type": "aimd" }
            },
            {
                "name": "r",
                "ip": "10.0.0.2",
                "type": "router",
                "send_rate": 50,
                "buffer_size": 64,
                "interfaces": ["eth0", "eth1"]
            },
            {
                "name": "b",
                "ip": "10.0.0.3",
                "interfaces": ["eth0"],
                "application": { "name": "app-b", "amount": 20, "send_rate": 2, "type": "const" }
            }
        ],
        "links": [
            { "a": { "node": "a", "interface": "eth0" }, "b": { "node": "r", "interface": "eth0" }, "metric": 1 },
            { "a": { "node": "r", "interface": "eth1" }, "b": { "node": "b", "interface": "eth0" }, "metric": 1 }
        ]
    }"#;

    fn simulation() -> Simulation {
        let json: NetworkSpecJson = serde_json::from_str(GRAPH).unwrap();
        let network = Network::from_spec(
            json.into(),
            NetworkConfig::default(),
            Arc::new(SimulationStepTracer::new()),
        )
        .unwrap();
        Simulation::new(network, Rng::with_seed(42))
    }

    #[test]
    fn test_traffic_reaches_the_other_host() {
        let mut simulation = simulation();
        let stats = simulation.run_traffic(10);

        assert!(stats.sent > 0);
        assert!(stats.delivered > 0);
        assert_eq!(stats.dropped, 0);
        assert_eq!(
            stats.sent,
            stats.delivered + simulation.pending() as u64 + buffered(&simulation)
        );

        // Positive feedback only, so the AIMD host sped up
        assert!(simulation.network().node("a").unwrap().send_rate() > 2);
        assert_eq!(simulation.network().node("b").unwrap().send_rate(), 2);

        simulation.network().tracer().verify().unwrap();
    }

    #[test]
    fn test_traffic_stops_when_quota_is_exhausted() {
        let mut simulation = simulation();
        let stats = simulation.run_traffic(100);

        assert_eq!(stats.sent, 40);
        assert_eq!(stats.delivered, 40);
        assert_eq!(simulation.pending(), 0);
    }

    #[test]
    fn test_script_reports_failures_and_continues() {
        let script = r#"[
            { "action": "send", "from": "a", "to": "b", "ppv": 3 },
            { "action": "receive", "node": "r", "interface": "eth0" },
            { "action": "receive", "node": "r", "interface": "eth0" },
            { "action": "forward", "router": "r" },
            { "action": "receive", "node": "b", "interface": "eth0" },
            { "action": "forward", "router": "a" },
            { "action": "delete-node", "node": "r" }
        ]"#;
        let steps: Vec<ScriptStepJson> = serde_json::from_str(script).unwrap();

        let mut simulation = simulation();
        let failed = simulation.run_script(&steps);

        // Receiving from an empty link and forwarding from a host both fail
        assert_eq!(failed, 2);
        assert_eq!(
            simulation.network().node("b").unwrap().application().unwrap().received(),
            1
        );
        assert!(simulation.network().node("r").is_err());
        simulation.network().tracer().verify().unwrap();
    }

    fn buffered(simulation: &Simulation) -> u64 {
        simulation
            .network()
            .routers()
            .filter_map(|r| r.router_state())
            .map(|r| r.buffered() as u64)
            .sum()
    }
}
