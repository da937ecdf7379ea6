use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::sync::Arc;

/// A route towards a single destination
///
/// Two routes are the same route only if all their fields match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub destination: IpAddr,
    /// The next hop towards the destination
    pub gateway: IpAddr,
    /// The name of the outgoing interface on the node owning the route
    pub interface: Arc<str>,
    metrics: u64,
}

impl Route {
    /// Creates a route, normalizing non-positive metrics to 1
    pub fn new(destination: IpAddr, gateway: IpAddr, interface: Arc<str>, metrics: i64) -> Self {
        Self {
            destination,
            gateway,
            interface,
            metrics: metrics.max(1) as u64,
        }
    }

    pub fn metrics(&self) -> u64 {
        self.metrics
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} via {} dev {} metric {}",
            self.destination, self.gateway, self.interface, self.metrics
        )
    }
}

/// The routes known to a node, in insertion order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a route, or updates the route sharing its destination and interface
    ///
    /// Setting a route identical to an existing one is a no-op.
    pub fn set_route(&mut self, route: Route) {
        let existing = self
            .routes
            .iter_mut()
            .find(|r| r.destination == route.destination && r.interface == route.interface);

        match existing {
            Some(existing) if *existing == route => {}
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
    }

    /// Returns the route with the lowest metrics towards `destination` (the first one wins ties)
    pub fn best_route(&self, destination: IpAddr) -> Option<&Route> {
        let mut best: Option<&Route> = None;
        for route in self.routes.iter().filter(|r| r.destination == destination) {
            if best.is_none_or(|b| route.metrics < b.metrics) {
                best = Some(route);
            }
        }

        best
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl FromIterator<Route> for RoutingTable {
    fn from_iter<T: IntoIterator<Item = Route>>(iter: T) -> Self {
        let mut table = RoutingTable::new();
        for route in iter {
            table.set_route(route);
        }
        table
    }
}

impl Display for RoutingTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for route in &self.routes {
            writeln!(f, "{route}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_metrics_are_at_least_one() {
        assert_eq!(Route::new(ip(1), ip(2), "eth0".into(), -3).metrics(), 1);
        assert_eq!(Route::new(ip(1), ip(2), "eth0".into(), 0).metrics(), 1);
        assert_eq!(Route::new(ip(1), ip(2), "eth0".into(), 9).metrics(), 9);
    }

    #[test]
    fn test_set_route_never_duplicates_destination_and_interface() {
        let mut table = RoutingTable::new();
        table.set_route(Route::new(ip(1), ip(2), "eth0".into(), 5));
        table.set_route(Route::new(ip(1), ip(2), "eth0".into(), 5));
        assert_eq!(table.len(), 1);

        // Same destination and interface, different fields: overwritten in place
        table.set_route(Route::new(ip(1), ip(3), "eth0".into(), 2));
        assert_eq!(table.len(), 1);
        assert_eq!(table.routes()[0].gateway, ip(3));
        assert_eq!(table.routes()[0].metrics(), 2);

        // Same destination through another interface is a separate route
        table.set_route(Route::new(ip(1), ip(4), "eth1".into(), 7));
        assert_eq!(table.len(), 2);

        for (i, a) in table.routes().iter().enumerate() {
            for b in &table.routes()[i + 1..] {
                assert!(a.destination != b.destination || a.interface != b.interface);
            }
        }
    }

    #[test]
    fn test_best_route_prefers_lowest_metrics_then_first_seen() {
        let table: RoutingTable = [
            Route::new(ip(1), ip(2), "eth0".into(), 4),
            Route::new(ip(1), ip(3), "eth1".into(), 3),
            Route::new(ip(1), ip(4), "eth2".into(), 3),
            Route::new(ip(9), ip(4), "eth2".into(), 1),
        ]
        .into_iter()
        .collect();

        let best = table.best_route(ip(1)).unwrap();
        assert_eq!(best.interface.as_ref(), "eth1");
        assert!(table.best_route(ip(7)).is_none());
    }
}
