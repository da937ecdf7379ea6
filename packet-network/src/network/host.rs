use crate::network::application::Application;

/// Host-specific state
#[derive(Debug, Default)]
pub struct Host {
    pub(crate) application: Option<Application>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn application(&self) -> Option<&Application> {
        self.application.as_ref()
    }
}
