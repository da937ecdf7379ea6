use crate::network::link::{Direction, LinkId, Links};
use crate::network::packet::Packet;
use std::sync::Arc;

/// Network-wide unique identifier of an interface
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(u64);

impl InterfaceId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

/// The link an interface is attached to, and which of its channels the interface uses
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LinkBinding {
    pub link: LinkId,
    pub send_channel: Direction,
    pub receive_channel: Direction,
}

#[derive(Debug)]
pub struct Interface {
    id: InterfaceId,
    name: Arc<str>,
    binding: Option<LinkBinding>,
}

impl Interface {
    pub fn new(id: InterfaceId, name: Arc<str>) -> Self {
        Self {
            id,
            name,
            binding: None,
        }
    }

    pub fn id(&self) -> InterfaceId {
        self.id
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn binding(&self) -> Option<LinkBinding> {
        self.binding
    }

    pub fn is_connected(&self) -> bool {
        self.binding.is_some()
    }

    pub fn connect_link(&mut self, link: LinkId, send_channel: Direction, receive_channel: Direction) {
        self.binding = Some(LinkBinding {
            link,
            send_channel,
            receive_channel,
        });
    }

    /// Clears the binding, returning the previous one (calling it twice is harmless)
    pub fn disconnect_link(&mut self) -> Option<LinkBinding> {
        self.binding.take()
    }

    /// Pops the next packet waiting on the receive channel, if any
    pub fn receive_from_link(&self, links: &mut Links) -> Option<Packet> {
        let binding = self.binding?;
        links
            .get_mut(binding.link)?
            .channel_mut(binding.receive_channel)
            .pop_payload()
    }

    /// Appends the packet to the send channel
    ///
    /// There is no backpressure at this level. The packet is handed back if the interface is not
    /// attached to a link.
    pub fn put_to_link(&self, links: &mut Links, packet: Packet) -> Result<(), Packet> {
        let Some(binding) = self.binding else {
            return Err(packet);
        };
        let Some(link) = links.get_mut(binding.link) else {
            return Err(packet);
        };

        link.channel_mut(binding.send_channel).fill_payload(packet);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::link::Link;
    use crate::network::packet::PacketIds;
    use fastrand::Rng;
    use std::net::{IpAddr, Ipv4Addr};

    const A: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const B: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[test]
    fn test_packets_cross_the_link() {
        let mut ids = PacketIds::new(Rng::with_seed(3));
        let mut links = Links::default();
        let mut left = Interface::new(InterfaceId::new(0), "eth0".into());
        let mut right = Interface::new(InterfaceId::new(1), "eth0".into());
        let link = links.insert(Link::new(left.id(), right.id(), 1, 1));
        left.connect_link(link, Direction::Forward, Direction::Backward);
        right.connect_link(link, Direction::Backward, Direction::Forward);

        let packet = Packet::new(ids.next(), A, B, 3);
        left.put_to_link(&mut links, packet.clone()).unwrap();

        assert!(left.receive_from_link(&mut links).is_none());
        assert_eq!(right.receive_from_link(&mut links), Some(packet));
        assert!(right.receive_from_link(&mut links).is_none());
    }

    #[test]
    fn test_unbound_interface() {
        let mut ids = PacketIds::new(Rng::with_seed(3));
        let mut links = Links::default();
        let mut interface = Interface::new(InterfaceId::new(0), "eth0".into());

        let packet = Packet::new(ids.next(), A, B, 3);
        assert_eq!(interface.put_to_link(&mut links, packet.clone()), Err(packet));
        assert!(interface.receive_from_link(&mut links).is_none());

        assert!(interface.disconnect_link().is_none());
        assert!(interface.disconnect_link().is_none());
    }
}
