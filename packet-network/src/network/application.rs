use crate::network::packet::{Packet, PacketIdentity};
use std::net::IpAddr;
use std::sync::Arc;

/// Congestion control policy of an [`Application`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApplicationKind {
    /// Sends at a constant rate, ignoring feedback
    Const,
    /// Additive increase, multiplicative decrease
    Aimd,
}

/// Traffic source running on a host
#[derive(Debug, Clone)]
pub struct Application {
    ip: IpAddr,
    name: Arc<str>,
    kind: ApplicationKind,
    amount: u64,
    send_rate: u64,
    curr_sent: u64,
    received: u64,
}

impl Application {
    pub fn new(ip: IpAddr, name: Arc<str>, amount: u64, send_rate: u64, kind: ApplicationKind) -> Self {
        Self {
            ip,
            name,
            kind,
            amount,
            send_rate,
            curr_sent: 0,
            received: 0,
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn kind(&self) -> ApplicationKind {
        self.kind
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn send_rate(&self) -> u64 {
        self.send_rate
    }

    pub fn curr_sent(&self) -> u64 {
        self.curr_sent
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn can_send(&self) -> bool {
        self.curr_sent < self.amount
    }

    /// Creates the next packet, unless the quota is exhausted
    pub fn send(&mut self, identity: PacketIdentity, target_ip: IpAddr, ppv: i64) -> Option<Packet> {
        if !self.can_send() {
            return None;
        }

        self.curr_sent += 1;
        Some(Packet::new(identity, self.ip, target_ip, ppv))
    }

    pub fn receive(&mut self, packet: &Packet) {
        self.received += 1;
        tracing::debug!(
            application = %self.name,
            packet = packet.number(),
            source = %packet.source_ip(),
            "application received packet"
        );
    }

    /// Applies feedback and returns the resulting send rate
    ///
    /// A positive value signals improvement, a negative value signals degradation.
    pub fn handle_feedback(&mut self, value: i64) -> u64 {
        match self.kind {
            ApplicationKind::Const => {}
            ApplicationKind::Aimd if value > 0 => self.send_rate += 1,
            ApplicationKind::Aimd if value < 0 => self.send_rate /= 2,
            ApplicationKind::Aimd => {}
        }

        self.send_rate
    }
}
