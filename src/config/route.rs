use serde::{Deserialize, Serialize};

use crate::config::util::is_false;

// ============================================================================
// Route
// ============================================================================

/// Route configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Route {
    /// List of route rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RouteRule>,

    /// Default outbound tag (first outbound used if empty)
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "final")]
    pub final_outbound: Option<String>,

    /// Bind outbound connections to default NIC (Linux/Windows/macOS)
    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_detect_interface: bool,
}

impl Route {
    /// Route sending every connection to `outbound`, with interface
    /// auto-detection enabled.
    pub fn catch_all(outbound: impl Into<String>) -> Self {
        Self {
            rules: vec![RouteRule::route_to(outbound)],
            final_outbound: None,
            auto_detect_interface: true,
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

/// A route rule without match conditions, so it matches everything.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RouteRule {
    /// What to do with matched connections
    #[serde(flatten)]
    pub action: RuleAction,
}

impl RouteRule {
    pub fn route_to(outbound: impl Into<String>) -> Self {
        Self {
            action: RuleAction::Route(RouteAction {
                outbound: outbound.into(),
            }),
        }
    }
}

/// Rule action
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum RuleAction {
    /// Route to an outbound
    Route(RouteAction),
    /// Reject the connection
    Reject,
}

/// Route action fields
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RouteAction {
    /// Target outbound tag (required)
    pub outbound: String,
}
