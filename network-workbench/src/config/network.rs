use packet_network::network::application::ApplicationKind;
use packet_network::network::spec::{
    ApplicationSpec, LinkEndpointSpec, NetworkLinkSpec, NetworkNodeSpec, NetworkSpec, NodeRole,
};
use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use std::net::IpAddr;

#[derive(Deserialize, Clone)]
pub struct NetworkSpecJson {
    nodes: Vec<NetworkNodeJson>,
    #[serde(default)]
    links: Vec<NetworkLinkJson>,
}

#[serde_as]
#[derive(Deserialize, Clone)]
struct NetworkNodeJson {
    name: String,
    #[serde_as(as = "DisplayFromStr")]
    ip: IpAddr,
    #[serde(rename = "type")]
    #[serde(default = "default_network_node_kind")]
    kind: NetworkNodeKindJson,
    /// Packets sent (hosts) or forwarded (routers) per tick
    #[serde(default = "default_send_rate")]
    send_rate: u64,
    /// The capacity of a router's buffer, in packets
    #[serde(default)]
    buffer_size: i64,
    #[serde(default)]
    interfaces: Vec<String>,
    application: Option<ApplicationJson>,
}

fn default_network_node_kind() -> NetworkNodeKindJson {
    NetworkNodeKindJson::Host
}

fn default_send_rate() -> u64 {
    1
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
enum NetworkNodeKindJson {
    Router,
    Host,
}

#[derive(Deserialize, Clone)]
struct ApplicationJson {
    name: String,
    /// The total number of packets the application may send
    amount: u64,
    send_rate: u64,
    #[serde(rename = "type")]
    #[serde(default = "default_application_kind")]
    kind: ApplicationKindJson,
}

fn default_application_kind() -> ApplicationKindJson {
    ApplicationKindJson::Const
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
enum ApplicationKindJson {
    Const,
    Aimd,
}

#[derive(Deserialize, Clone)]
struct NetworkLinkJson {
    a: LinkEndpointJson,
    b: LinkEndpointJson,
    #[serde(default = "default_speed")]
    speed: i64,
    /// The cost of the link, used when computing shortest paths
    metric: i64,
}

fn default_speed() -> i64 {
    1
}

#[derive(Deserialize, Clone, Debug)]
pub struct LinkEndpointJson {
    pub node: String,
    pub interface: String,
}

impl From<NetworkSpecJson> for NetworkSpec {
    fn from(json: NetworkSpecJson) -> Self {
        let nodes = json
            .nodes
            .into_iter()
            .map(|n| NetworkNodeSpec {
                name: n.name,
                ip: n.ip,
                role: match n.kind {
                    NetworkNodeKindJson::Router => NodeRole::Router,
                    NetworkNodeKindJson::Host => NodeRole::Host,
                },
                send_rate: n.send_rate,
                buffer_size: n.buffer_size,
                interfaces: n.interfaces,
                application: n.application.map(|app| ApplicationSpec {
                    name: app.name,
                    amount: app.amount,
                    send_rate: app.send_rate,
                    kind: match app.kind {
                        ApplicationKindJson::Const => ApplicationKind::Const,
                        ApplicationKindJson::Aimd => ApplicationKind::Aimd,
                    },
                }),
            })
            .collect();

        let links = json
            .links
            .into_iter()
            .map(|l| NetworkLinkSpec {
                a: l.a.into(),
                b: l.b.into(),
                speed: l.speed,
                metric: l.metric,
            })
            .collect();

        NetworkSpec { nodes, links }
    }
}

impl From<LinkEndpointJson> for LinkEndpointSpec {
    fn from(json: LinkEndpointJson) -> Self {
        LinkEndpointSpec {
            node: json.node,
            interface: json.interface,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const GRAPH: &str = r#"{
        "nodes": [
            {
                "name": "a",
                "ip": "10.0.0.1",
                "interfaces": ["eth0"],
                "application": { "name": "ping", "amount": 5, "send_rate": 2, "type": "aimd" }
            },
            {
                "name": "r",
                "ip": "10.0.0.2",
                "type": "router",
                "send_rate": 3,
                "buffer_size": 4,
                "interfaces": ["eth0", "eth1"]
            },
            { "name": "b", "ip": "10.0.0.3", "interfaces": ["eth0"] }
        ],
        "links": [
            { "a": { "node": "a", "interface": "eth0" }, "b": { "node": "r", "interface": "eth0" }, "metric": 2 },
            { "a": { "node": "r", "interface": "eth1" }, "b": { "node": "b", "interface": "eth0" }, "speed": 4, "metric": 3 }
        ]
    }"#;

    #[test]
    fn test_network_graph_is_converted_to_spec() {
        let json: NetworkSpecJson = serde_json::from_str(GRAPH).unwrap();
        let spec: NetworkSpec = json.into();

        assert_eq!(spec.nodes.len(), 3);
        assert_eq!(spec.nodes[0].role, NodeRole::Host);
        assert_eq!(spec.nodes[0].send_rate, 1);
        let app = spec.nodes[0].application.as_ref().unwrap();
        assert_eq!(app.kind, ApplicationKind::Aimd);
        assert_eq!(app.amount, 5);

        assert_eq!(spec.nodes[1].role, NodeRole::Router);
        assert_eq!(spec.nodes[1].buffer_size, 4);
        assert!(spec.nodes[2].application.is_none());

        assert_eq!(spec.links[0].speed, 1);
        assert_eq!(spec.links[1].speed, 4);
        assert_eq!(spec.links[1].b.node, "b");
    }

    #[test]
    fn test_invalid_ip_is_rejected() {
        let graph = r#"{ "nodes": [{ "name": "a", "ip": "not-an-ip" }] }"#;
        assert!(serde_json::from_str::<NetworkSpecJson>(graph).is_err());
    }
}
