#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeStats {
    /// Packets created by this node's application
    pub sent: PacketStats,
    /// Packets taken from one of this node's links
    pub received: PacketStats,
    /// Packets put back on a link after buffering
    pub forwarded: PacketStats,
    pub delivered: PacketStats,
    pub dropped_buffer_full: PacketStats,
    pub dropped_evicted: PacketStats,
    pub dropped_link_teardown: PacketStats,
    pub dropped_no_route: PacketStats,
    /// Packets still buffered when the node was deleted
    pub dropped_node_deleted: PacketStats,
    /// Highest number of packets simultaneously buffered
    pub max_buffer_usage: usize,
}

impl NodeStats {
    pub fn dropped(&self) -> PacketStats {
        let mut total = self.dropped_buffer_full;
        total.add(self.dropped_evicted);
        total.add(self.dropped_link_teardown);
        total.add(self.dropped_no_route);
        total.add(self.dropped_node_deleted);
        total
    }
}

/// Packet count, together with the sum of the packets' ppv
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PacketStats {
    pub packets: u64,
    pub ppv: u64,
}

impl PacketStats {
    pub fn track_one(&mut self, ppv: u32) {
        self.packets += 1;
        self.ppv += ppv as u64;
    }

    pub fn add(&mut self, other: PacketStats) {
        self.packets += other.packets;
        self.ppv += other.ppv;
    }
}
