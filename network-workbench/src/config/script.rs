use crate::config::network::LinkEndpointJson;
use serde::Deserialize;

/// A single step of a scripted run
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "kebab-case", tag = "action")]
pub enum ScriptStepJson {
    /// Have a host's application send a packet
    Send {
        from: String,
        to: String,
        /// Explicit packet value; drawn at random when absent
        ppv: Option<i64>,
    },
    /// Take the next packet waiting at an interface
    Receive { node: String, interface: String },
    /// Have a router forward its oldest buffered packet
    Forward { router: String },
    /// Apply congestion feedback to a host's application
    Feedback { host: String, value: i64 },
    Connect {
        a: LinkEndpointJson,
        b: LinkEndpointJson,
        #[serde(default = "default_speed")]
        speed: i64,
        metric: i64,
    },
    Disconnect { node: String, interface: String },
    DeleteInterface { node: String, interface: String },
    DeleteNode { node: String },
}

fn default_speed() -> i64 {
    1
}
