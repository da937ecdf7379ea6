use crate::config::network::NetworkSpecJson;
use crate::config::script::ScriptStepJson;
use anyhow::Context;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub mod cli;
pub mod network;
pub mod script;

pub struct SimulationConfig {
    pub network_graph: NetworkSpecJson,
}

impl SimulationConfig {
    pub fn load(network_graph: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            network_graph: load_json(network_graph)?,
        })
    }
}

pub fn load_script(path: &Path) -> anyhow::Result<Vec<ScriptStepJson>> {
    load_json(path)
}

fn load_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read `{}`", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("invalid JSON in `{}`", path.display()))
}
