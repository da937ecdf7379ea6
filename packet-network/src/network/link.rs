use crate::network::interface::InterfaceId;
use crate::network::packet::Packet;
use std::collections::VecDeque;

/// One direction of a link: a FIFO queue of packets
#[derive(Debug)]
pub struct Channel {
    payload: VecDeque<Packet>,
    speed: u64,
    metrics: u64,
}

impl Channel {
    /// Creates an empty channel, clamping non-positive `speed` and `metrics` to 1
    pub fn new(speed: i64, metrics: i64) -> Self {
        Self {
            payload: VecDeque::new(),
            speed: speed.max(1) as u64,
            metrics: metrics.max(1) as u64,
        }
    }

    pub fn fill_payload(&mut self, packet: Packet) {
        self.payload.push_back(packet);
    }

    pub fn pop_payload(&mut self) -> Option<Packet> {
        self.payload.pop_front()
    }

    pub fn speed(&self) -> u64 {
        self.speed
    }

    pub fn metrics(&self) -> u64 {
        self.metrics
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    fn drain(&mut self) -> impl Iterator<Item = Packet> + '_ {
        self.payload.drain(..)
    }
}

/// Which of the two channels of a link
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    /// From the first endpoint to the second
    Forward,
    /// From the second endpoint to the first
    Backward,
}

impl Direction {
    fn index(self) -> usize {
        match self {
            Direction::Forward => 0,
            Direction::Backward => 1,
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Handle to a link stored in [`Links`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LinkId(usize);

/// A duplex connection between two interfaces
///
/// The link refers to its endpoints by handle, so it never borrows the nodes it connects.
#[derive(Debug)]
pub struct Link {
    endpoints: [InterfaceId; 2],
    channels: [Channel; 2],
}

impl Link {
    pub fn new(a: InterfaceId, b: InterfaceId, speed: i64, metrics: i64) -> Self {
        Self {
            endpoints: [a, b],
            channels: [Channel::new(speed, metrics), Channel::new(speed, metrics)],
        }
    }

    pub fn endpoints(&self) -> [InterfaceId; 2] {
        self.endpoints
    }

    pub fn speed(&self) -> u64 {
        self.channels[0].speed()
    }

    pub fn metrics(&self) -> u64 {
        self.channels[0].metrics()
    }

    pub fn channel(&self, direction: Direction) -> &Channel {
        &self.channels[direction.index()]
    }

    pub fn channel_mut(&mut self, direction: Direction) -> &mut Channel {
        &mut self.channels[direction.index()]
    }

    /// The direction in which `endpoint` sends, if it is attached to this link
    pub fn send_direction(&self, endpoint: InterfaceId) -> Option<Direction> {
        if self.endpoints[0] == endpoint {
            Some(Direction::Forward)
        } else if self.endpoints[1] == endpoint {
            Some(Direction::Backward)
        } else {
            None
        }
    }

    /// The endpoint at the other side of `endpoint`
    pub fn peer(&self, endpoint: InterfaceId) -> Option<InterfaceId> {
        match self.send_direction(endpoint)? {
            Direction::Forward => Some(self.endpoints[1]),
            Direction::Backward => Some(self.endpoints[0]),
        }
    }

    /// Whether the channel `endpoint` sends through currently holds a packet
    ///
    /// Returns `None` if `endpoint` is not attached to this link.
    pub fn availability(&self, endpoint: InterfaceId) -> Option<bool> {
        let direction = self.send_direction(endpoint)?;
        Some(!self.channel(direction).is_empty())
    }

    /// Discards the packets still in flight in both directions
    pub(crate) fn discard_in_flight(&mut self) -> Vec<Packet> {
        let [forward, backward] = &mut self.channels;
        forward.drain().chain(backward.drain()).collect()
    }
}

/// Arena owning every link in the network
#[derive(Debug, Default)]
pub struct Links {
    slots: Vec<Option<Link>>,
}

impl Links {
    pub fn insert(&mut self, link: Link) -> LinkId {
        // Reuse a free slot if available
        if let Some(index) = self.slots.iter().position(Option::is_none) {
            self.slots[index] = Some(link);
            return LinkId(index);
        }

        self.slots.push(Some(link));
        LinkId(self.slots.len() - 1)
    }

    pub fn remove(&mut self, id: LinkId) -> Option<Link> {
        self.slots.get_mut(id.0)?.take()
    }

    pub fn get(&self, id: LinkId) -> Option<&Link> {
        self.slots.get(id.0)?.as_ref()
    }

    pub fn get_mut(&mut self, id: LinkId) -> Option<&mut Link> {
        self.slots.get_mut(id.0)?.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, l)| Some((LinkId(i), l.as_ref()?)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::packet::{PacketIds, PacketIdentity};
    use fastrand::Rng;
    use std::net::{IpAddr, Ipv4Addr};

    const A: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const B: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    fn packet(identity: PacketIdentity) -> Packet {
        Packet::new(identity, A, B, 1)
    }

    #[test]
    fn test_channel_clamps_speed_and_metrics() {
        for (speed, metrics) in [(-5, -5), (0, 0), (1, 1)] {
            let channel = Channel::new(speed, metrics);
            assert_eq!(channel.speed(), 1);
            assert_eq!(channel.metrics(), 1);
        }

        let channel = Channel::new(100, 3);
        assert_eq!(channel.speed(), 100);
        assert_eq!(channel.metrics(), 3);
    }

    #[test]
    fn test_channel_is_fifo() {
        let mut ids = PacketIds::new(Rng::with_seed(0));
        let mut channel = Channel::new(1, 1);
        let first = packet(ids.next());
        let second = packet(ids.next());
        channel.fill_payload(first.clone());
        channel.fill_payload(second.clone());

        assert_eq!(channel.pop_payload(), Some(first));
        assert_eq!(channel.pop_payload(), Some(second));
        assert_eq!(channel.pop_payload(), None);
    }

    #[test]
    fn test_link_availability_and_teardown() {
        let mut ids = PacketIds::new(Rng::with_seed(0));
        let a = InterfaceId::new(0);
        let b = InterfaceId::new(1);
        let mut link = Link::new(a, b, 10, -1);
        assert_eq!(link.metrics(), 1);
        assert_eq!(link.peer(a), Some(b));
        assert_eq!(link.availability(InterfaceId::new(7)), None);

        link.channel_mut(Direction::Forward).fill_payload(packet(ids.next()));
        assert_eq!(link.availability(a), Some(true));
        assert_eq!(link.availability(b), Some(false));

        link.channel_mut(Direction::Backward).fill_payload(packet(ids.next()));
        assert_eq!(link.discard_in_flight().len(), 2);
        assert_eq!(link.availability(a), Some(false));
    }

    #[test]
    fn test_links_reuse_free_slots() {
        let mut links = Links::default();
        let first = links.insert(Link::new(InterfaceId::new(0), InterfaceId::new(1), 1, 1));
        let second = links.insert(Link::new(InterfaceId::new(2), InterfaceId::new(3), 1, 1));
        assert!(links.remove(first).is_some());
        assert!(links.get(first).is_none());

        let third = links.insert(Link::new(InterfaceId::new(4), InterfaceId::new(5), 1, 1));
        assert_eq!(third, first);
        assert_eq!(links.iter().count(), 2);
        assert!(links.get(second).is_some());
    }
}
