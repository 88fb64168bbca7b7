//! Proxy engine seam
//!
//! The lifecycle hands the assembled `RoutingConfig` to an `EngineFactory`
//! and drives the resulting `Engine` through start and close. Relaying
//! traffic is the engine's business; the bundled `ListenerEngine` only owns
//! the local mixed listener socket.

use std::net::{SocketAddr, TcpListener};

use tracing::{debug, trace};

use crate::config::RoutingConfig;
use crate::error::BoxError;

// ============================================================================
// Engine Traits
// ============================================================================

/// A proxy engine instance built from one routing configuration.
///
/// `start` and `close` may block (socket binds, teardown), so async callers
/// run them on a blocking thread.
pub trait Engine: Send {
    /// Starts serving. Called at most once per instance.
    fn start(&mut self) -> Result<(), BoxError>;

    /// Releases every resource held by the engine.
    fn close(&mut self) -> Result<(), BoxError>;
}

/// Builds engines from routing configurations
pub trait EngineFactory: Send + Sync {
    fn create(&self, config: &RoutingConfig) -> Result<Box<dyn Engine>, BoxError>;
}

// ============================================================================
// Listener Engine
// ============================================================================

/// Engine that binds the mixed inbound socket and holds it until closed
#[derive(Debug)]
pub struct ListenerEngine {
    addr: SocketAddr,
    listener: Option<TcpListener>,
}

impl ListenerEngine {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            listener: None,
        }
    }

    /// Configured listen address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Address actually bound, while started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }
}

impl Engine for ListenerEngine {
    fn start(&mut self) -> Result<(), BoxError> {
        if self.listener.is_some() {
            return Err(format!("listener on {} already started", self.addr).into());
        }

        let listener = TcpListener::bind(self.addr)
            .map_err(|e| format!("bind mixed inbound {}: {}", self.addr, e))?;
        debug!("Mixed inbound listening on {}", self.addr);
        self.listener = Some(listener);
        Ok(())
    }

    fn close(&mut self) -> Result<(), BoxError> {
        if self.listener.take().is_some() {
            debug!("Mixed inbound on {} closed", self.addr);
        } else {
            trace!("Mixed inbound on {} was not bound", self.addr);
        }
        Ok(())
    }
}

/// Factory producing `ListenerEngine`s from the mixed inbound of a config
#[derive(Debug, Default, Clone, Copy)]
pub struct ListenerEngineFactory;

impl EngineFactory for ListenerEngineFactory {
    fn create(&self, config: &RoutingConfig) -> Result<Box<dyn Engine>, BoxError> {
        let addr = config
            .mixed_inbound()
            .and_then(|inbound| inbound.socket_addr())
            .ok_or("routing config has no usable mixed inbound")?;
        trace!("Creating listener engine for {}", addr);
        Ok(Box::new(ListenerEngine::new(addr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::inbound::{Inbound, MixedInbound};

    fn config_for(addr: &str) -> RoutingConfig {
        RoutingConfig::builder()
            .inbound(Inbound::Mixed(MixedInbound::bound_to(addr.parse().unwrap())))
            .build()
    }

    #[test]
    fn test_listener_engine_binds_and_releases() {
        let mut engine = ListenerEngine::new("127.0.0.1:0".parse().unwrap());
        assert!(engine.local_addr().is_none());

        engine.start().unwrap();
        let bound = engine.local_addr().unwrap();
        assert!(bound.ip().is_loopback());
        assert_ne!(bound.port(), 0);

        engine.close().unwrap();
        assert!(engine.local_addr().is_none());

        // Released port can be bound again
        TcpListener::bind(bound).unwrap();
    }

    #[test]
    fn test_listener_engine_double_start() {
        let mut engine = ListenerEngine::new("127.0.0.1:0".parse().unwrap());
        engine.start().unwrap();
        assert!(engine.start().is_err());
        engine.close().unwrap();
    }

    #[test]
    fn test_listener_engine_address_in_use() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut engine = ListenerEngine::new(taken.local_addr().unwrap());

        let err = engine.start().unwrap_err();
        assert!(err.to_string().contains("bind mixed inbound"));
    }

    #[test]
    fn test_listener_engine_close_is_idempotent() {
        let mut engine = ListenerEngine::new("127.0.0.1:0".parse().unwrap());
        engine.close().unwrap();
        engine.close().unwrap();
    }

    #[test]
    fn test_factory_uses_mixed_inbound() {
        let mut engine = ListenerEngineFactory.create(&config_for("127.0.0.1:0")).unwrap();
        engine.start().unwrap();
        engine.close().unwrap();
    }

    #[test]
    fn test_factory_requires_mixed_inbound() {
        let err = ListenerEngineFactory.create(&RoutingConfig::new()).err().unwrap();
        assert!(err.to_string().contains("mixed inbound"));
    }
}
