use crate::network::node::Reception;
use crate::network::packet::Packet;
use std::collections::VecDeque;

/// Router-specific state: a bounded buffer of packets awaiting forwarding
///
/// The buffer is FIFO: forwarding always takes the oldest admitted packet.
#[derive(Debug)]
pub struct Router {
    buffer: VecDeque<Packet>,
    buffer_size: usize,
}

impl Router {
    /// Creates a router state, normalizing a negative `buffer_size` to 0
    pub fn new(buffer_size: i64) -> Self {
        let buffer_size = buffer_size.max(0) as usize;
        Self {
            buffer: VecDeque::with_capacity(buffer_size.min(1024)),
            buffer_size,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn buffer(&self) -> impl ExactSizeIterator<Item = &Packet> {
        self.buffer.iter()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Applies admission control to an incoming packet
    ///
    /// When the buffer is full, the incoming packet replaces the first resident with the lowest
    /// ppv, but only if that resident's ppv is strictly lower. Otherwise the incoming packet is
    /// dropped.
    pub fn admit(&mut self, packet: Packet) -> Reception {
        if self.buffer.len() < self.buffer_size {
            self.buffer.push_back(packet.clone());
            return Reception::Buffered(packet);
        }

        if self.buffer_size == 0 {
            return Reception::Dropped(packet);
        }

        let mut victim: Option<(usize, u32)> = None;
        for (i, resident) in self.buffer.iter().enumerate() {
            if victim.is_none_or(|(_, lowest)| resident.ppv() < lowest) {
                victim = Some((i, resident.ppv()));
            }
        }

        match victim {
            Some((index, lowest)) if lowest < packet.ppv() => {
                // Unwrap: the index was found while scanning the buffer
                let evicted = self.buffer.remove(index).unwrap();
                self.buffer.push_back(packet.clone());
                Reception::Evicted {
                    admitted: packet,
                    evicted,
                }
            }
            _ => Reception::Dropped(packet),
        }
    }

    pub fn take_next(&mut self) -> Option<Packet> {
        self.buffer.pop_front()
    }

    pub(crate) fn buffer_front(&mut self, packet: Packet) {
        self.buffer.push_front(packet);
    }

    /// Empties the buffer, oldest packet first
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Packet> + '_ {
        self.buffer.drain(..)
    }
}
