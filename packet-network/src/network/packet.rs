use fastrand::Rng;
use std::net::IpAddr;
use uuid::Uuid;

/// A packet travelling through the simulated network
///
/// Packets are immutable once created: routers forward them unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    id: Uuid,
    number: u64,
    source_ip: IpAddr,
    target_ip: IpAddr,
    ppv: u32,
}

impl Packet {
    /// Creates a packet, normalizing a non-positive `ppv` to 1
    pub fn new(identity: PacketIdentity, source_ip: IpAddr, target_ip: IpAddr, ppv: i64) -> Self {
        Self {
            id: identity.id,
            number: identity.number,
            source_ip,
            target_ip,
            ppv: ppv.clamp(1, u32::MAX as i64) as u32,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Sequential number of the packet within the simulation, handy for log lines
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn source_ip(&self) -> IpAddr {
        self.source_ip
    }

    pub fn target_ip(&self) -> IpAddr {
        self.target_ip
    }

    pub fn ppv(&self) -> u32 {
        self.ppv
    }
}

#[derive(Copy, Clone, Debug)]
pub struct PacketIdentity {
    pub id: Uuid,
    pub number: u64,
}

/// Hands out packet identities
///
/// Ids are drawn from a seeded rng, so two simulations with the same seed produce the same ids.
pub struct PacketIds {
    rng: Rng,
    next_number: u64,
}

impl PacketIds {
    pub fn new(rng: Rng) -> Self {
        Self {
            rng,
            next_number: 0,
        }
    }

    pub fn next(&mut self) -> PacketIdentity {
        let number = self.next_number;
        self.next_number += 1;
        PacketIdentity {
            id: Uuid::from_u128(self.rng.u128(..)),
            number,
        }
    }
}
