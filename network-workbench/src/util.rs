use packet_network::Network;
use packet_network::trace::simulation_verifier::VerifiedSimulation;

pub fn print_routing_tables(network: &Network) {
    println!("--- Routing tables ---");
    for node in network.nodes() {
        println!("* {node}");
        let table = node.routing_table();
        if table.is_empty() {
            println!("  (no routes)");
        }
        for route in table.routes() {
            println!("  * {route}");
        }
    }
}

pub fn print_node_stats(verified_simulation: &VerifiedSimulation, network: &Network) {
    println!("--- Node stats ---");
    for node in network.nodes() {
        let Some(stats) = verified_simulation.stats_by_node.get(node.name()) else {
            continue;
        };

        println!("* {node}");
        if node.is_host() {
            println!(
                "  * Sent packets: {} (total ppv {})",
                stats.sent.packets, stats.sent.ppv
            );
            println!(
                "  * Delivered packets: {} (total ppv {})",
                stats.delivered.packets, stats.delivered.ppv
            );
        } else {
            println!(
                "  * Received packets: {} (total ppv {})",
                stats.received.packets, stats.received.ppv
            );
            println!(
                "  * Forwarded packets: {} (total ppv {})",
                stats.forwarded.packets, stats.forwarded.ppv
            );
        }

        let dropped = stats.dropped();
        println!(
            "  * Dropped packets: {} (total ppv {})",
            dropped.packets, dropped.ppv
        );
        println!(
            "    | {} rejected by a full buffer, {} evicted, {} lost in transit",
            stats.dropped_buffer_full.packets,
            stats.dropped_evicted.packets,
            stats.dropped_link_teardown.packets
        );
        println!(
            "    | {} without a route, {} discarded with the node",
            stats.dropped_no_route.packets, stats.dropped_node_deleted.packets
        );
    }

    let total = verified_simulation.total();
    println!(
        "* Overall: {} sent, {} delivered, {} dropped, {} in flight",
        total.sent.packets,
        total.delivered.packets,
        total.dropped().packets,
        verified_simulation.in_flight
    );
}

pub fn print_max_buffer_usage_per_node(verified_simulation: &VerifiedSimulation) {
    println!("--- Max buffer usage per node ---");
    let mut buffer_usage: Vec<_> = verified_simulation
        .stats_by_node
        .iter()
        .filter(|(_, stats)| stats.received.packets > 0)
        .collect();
    buffer_usage.sort_unstable_by(|t1, t2| {
        t1.1.max_buffer_usage
            .cmp(&t2.1.max_buffer_usage)
            .then(t2.0.cmp(t1.0))
    });
    for (node_id, stats) in buffer_usage.into_iter().rev() {
        println!(
            "* {node_id}: {} packets ({} packets dropped due to buffer being full)",
            stats.max_buffer_usage,
            stats.dropped_buffer_full.packets + stats.dropped_evicted.packets
        );
    }
}

pub fn print_application_stats(network: &Network) {
    println!("--- Applications ---");
    for (node, app) in network.applications() {
        println!(
            "* {} on `{}` ({:?}): sent {}/{}, received {}, send rate {}",
            app.name(),
            node.name(),
            app.kind(),
            app.curr_sent(),
            app.amount(),
            app.received(),
            app.send_rate()
        );
    }
}
