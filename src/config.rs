use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::inbound::{Inbound, MixedInbound};
use crate::config::log::Log;
use crate::config::outbound::{Outbound, OutboundDescriptor};
use crate::config::route::Route;

pub mod inbound;
pub mod log;
pub mod outbound;
pub mod route;
pub mod shared;
pub mod util;

/// Configuration handed to the proxy engine
///
/// Mirrors the sing-box configuration file layout, restricted to the
/// sections a share-link proxy needs: log, inbounds, outbounds and route.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RoutingConfig {
    /// Log configuration
    #[serde(default, skip_serializing_if = "is_default_log")]
    pub log: Log,

    /// Inbound configurations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inbounds: Vec<Inbound>,

    /// Outbound configurations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outbounds: Vec<Outbound>,

    /// Route configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
}

fn is_default_log(log: &Log) -> bool {
    *log == Log::default()
}

impl RoutingConfig {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration builder
    pub fn builder() -> RoutingConfigBuilder {
        RoutingConfigBuilder::new()
    }

    /// First mixed inbound, the local listener applications connect to
    pub fn mixed_inbound(&self) -> Option<&MixedInbound> {
        self.inbounds.iter().find_map(|inbound| match inbound {
            Inbound::Mixed(mixed) => Some(mixed),
        })
    }

    /// First outbound decoded from a share link
    pub fn proxy_outbound(&self) -> Option<&OutboundDescriptor> {
        self.outbounds.iter().find_map(|outbound| match outbound {
            Outbound::Proxy(descriptor) => Some(descriptor),
            Outbound::Builtin(_) => None,
        })
    }

    /// Serialize the configuration to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize the configuration to a pretty-printed JSON string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write the pretty-printed configuration to `path`
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = self.to_json_pretty().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Builder for RoutingConfig
#[derive(Default)]
pub struct RoutingConfigBuilder {
    config: RoutingConfig,
}

impl RoutingConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set log configuration
    pub fn log(mut self, log: Log) -> Self {
        self.config.log = log;
        self
    }

    /// Add an inbound
    pub fn inbound(mut self, inbound: Inbound) -> Self {
        self.config.inbounds.push(inbound);
        self
    }

    /// Add an outbound
    pub fn outbound(mut self, outbound: Outbound) -> Self {
        self.config.outbounds.push(outbound);
        self
    }

    /// Set route configuration
    pub fn route(mut self, route: Route) -> Self {
        self.config.route = Some(route);
        self
    }

    /// Build the configuration
    pub fn build(self) -> RoutingConfig {
        self.config
    }
}
