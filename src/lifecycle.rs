//! Proxy lifecycle management
//!
//! A `ProxyLifecycle` wraps one decoded outbound in a complete routing
//! configuration (mixed inbound, the outbound, direct/block, catch-all rule)
//! and owns the engine built from it while running.
//!
//! States are `Idle` and `Running`; the engine handle exists exactly while
//! running. Instances share nothing, so callers pick distinct listen
//! addresses when running several of them.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RoutingConfig;
use crate::config::inbound::{Inbound, MixedInbound};
use crate::config::log::{Log, LogLevel};
use crate::config::outbound::{
    BLOCK_TAG, BlockOutbound, BuiltinOutbound, DIRECT_TAG, DirectOutbound, Outbound,
    OutboundDescriptor,
};
use crate::config::route::Route;
use crate::engine::{Engine, EngineFactory, ListenerEngineFactory};
use crate::error::{LifecycleError, Phase};

/// Listen address used when none is configured
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:1080";

/// Port used when the listen address has none or an unparseable one
pub const DEFAULT_LISTEN_PORT: u16 = 1080;

type Result<T> = std::result::Result<T, LifecycleError>;

// ============================================================================
// Options
// ============================================================================

/// Construction options for a `ProxyLifecycle`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LifecycleOptions {
    /// `host:port` of the local mixed listener, default `127.0.0.1:1080`
    pub listen_addr: Option<String>,

    /// Engine log level, default `panic`
    pub log_level: Option<LogLevel>,
}

impl LifecycleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }
}

/// Parses a listen address.
///
/// The host must be a literal IP; anything else is replaced by `127.0.0.1`.
/// A missing or unparseable port becomes `DEFAULT_LISTEN_PORT`.
pub fn parse_listen_addr(addr: &str) -> SocketAddr {
    let addr = addr.trim();
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        return socket_addr;
    }
    if let Ok(ip) = addr.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        return SocketAddr::new(ip, DEFAULT_LISTEN_PORT);
    }

    let (host, port) = match addr.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (addr, None),
    };

    let host = host.trim_start_matches('[').trim_end_matches(']');
    let ip = host.parse::<IpAddr>().unwrap_or_else(|_| {
        warn!(host, "Listen host is not an IP address, using 127.0.0.1");
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    });
    let port = port
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_LISTEN_PORT);

    SocketAddr::new(ip, port)
}

/// Assembles the routing configuration for one outbound
pub fn build_routing_config(
    descriptor: &OutboundDescriptor,
    listen: SocketAddr,
    level: LogLevel,
) -> RoutingConfig {
    let direct = DirectOutbound {
        tag: builtin_tag(DIRECT_TAG, &descriptor.tag),
    };
    let block = BlockOutbound {
        tag: builtin_tag(BLOCK_TAG, &descriptor.tag),
    };

    RoutingConfig::builder()
        .log(Log::engine(level))
        .inbound(Inbound::Mixed(MixedInbound::bound_to(listen)))
        .outbound(Outbound::Proxy(descriptor.clone()))
        .outbound(Outbound::Builtin(BuiltinOutbound::Direct(direct)))
        .outbound(Outbound::Builtin(BuiltinOutbound::Block(block)))
        .route(Route::catch_all(descriptor.tag.clone()))
        .build()
}

/// Built-in outbound tag, moved aside when the proxy already uses it.
/// The catch-all rule targets the proxy tag, so it must stay unique.
fn builtin_tag(tag: &str, proxy_tag: &str) -> String {
    if tag == proxy_tag {
        let renamed = format!("{}-out", tag);
        debug!(proxy_tag, renamed = %renamed, "Proxy tag shadows a built-in outbound");
        renamed
    } else {
        tag.to_string()
    }
}

// ============================================================================
// Proxy Lifecycle
// ============================================================================

/// Lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Running,
}

/// Start/stop control over one proxy engine.
///
/// Not synchronized: one owner drives an instance. Dropping a running
/// lifecycle closes its engine.
pub struct ProxyLifecycle {
    descriptor: OutboundDescriptor,
    config: RoutingConfig,
    factory: Arc<dyn EngineFactory>,
    engine: Option<Box<dyn Engine>>,
}

impl ProxyLifecycle {
    /// Lifecycle backed by the bundled `ListenerEngineFactory`
    pub fn new(descriptor: OutboundDescriptor, options: LifecycleOptions) -> Self {
        Self::with_engine(descriptor, options, Arc::new(ListenerEngineFactory))
    }

    /// Lifecycle backed by `factory`
    pub fn with_engine(
        descriptor: OutboundDescriptor,
        options: LifecycleOptions,
        factory: Arc<dyn EngineFactory>,
    ) -> Self {
        let listen = parse_listen_addr(
            options
                .listen_addr
                .as_deref()
                .filter(|a| !a.trim().is_empty())
                .unwrap_or(DEFAULT_LISTEN_ADDR),
        );
        let level = options.log_level.unwrap_or_default();
        let config = build_routing_config(&descriptor, listen, level);

        debug!(
            "Created lifecycle for '{}' ({}) listening on {}",
            descriptor.tag,
            descriptor.kind(),
            listen
        );

        Self {
            descriptor,
            config,
            factory,
            engine: None,
        }
    }

    /// Builds and starts the engine.
    ///
    /// On failure nothing is kept and the lifecycle stays idle.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(LifecycleError::AlreadyRunning);
        }

        let engine = create_and_start(self.factory.as_ref(), &self.config)?;
        self.engine = Some(engine);
        debug!("Proxy '{}' running", self.descriptor.tag);
        Ok(())
    }

    /// Closes the engine.
    ///
    /// The handle is released before the close result is known, so the
    /// lifecycle is idle even when closing fails.
    pub fn stop(&mut self) -> Result<()> {
        let mut engine = self.engine.take().ok_or(LifecycleError::NotRunning)?;
        debug!("Proxy '{}' stopping", self.descriptor.tag);
        engine.close().map_err(LifecycleError::Close)
    }

    /// `start` raced against `cancel`
    pub async fn start_with_cancel(&mut self, cancel: CancellationToken) -> Result<()> {
        self.start_until(async move {
            cancel.cancelled().await;
            LifecycleError::Cancelled { phase: Phase::Start }
        })
        .await
    }

    /// `start` bounded by `timeout`
    pub async fn start_with_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.start_until(async move {
            tokio::time::sleep(timeout).await;
            LifecycleError::TimedOut {
                phase: Phase::Start,
                timeout,
            }
        })
        .await
    }

    /// `stop` raced against `cancel`
    pub async fn stop_with_cancel(&mut self, cancel: CancellationToken) -> Result<()> {
        self.stop_until(async move {
            cancel.cancelled().await;
            LifecycleError::Cancelled { phase: Phase::Stop }
        })
        .await
    }

    /// `stop` bounded by `timeout`
    pub async fn stop_with_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.stop_until(async move {
            tokio::time::sleep(timeout).await;
            LifecycleError::TimedOut {
                phase: Phase::Stop,
                timeout,
            }
        })
        .await
    }

    /// Runs create+start on a blocking thread until done or `deadline` fires.
    ///
    /// When the deadline wins, the engine is closed in the background once
    /// its start returns.
    async fn start_until<F>(&mut self, deadline: F) -> Result<()>
    where
        F: Future<Output = LifecycleError>,
    {
        if self.is_running() {
            return Err(LifecycleError::AlreadyRunning);
        }

        let factory = Arc::clone(&self.factory);
        let config = self.config.clone();
        let mut task =
            tokio::task::spawn_blocking(move || create_and_start(factory.as_ref(), &config));

        tokio::select! {
            biased;
            joined = &mut task => {
                self.engine = Some(joined??);
                debug!("Proxy '{}' running", self.descriptor.tag);
                Ok(())
            }
            err = deadline => {
                warn!("Proxy '{}': {}, closing engine in background", self.descriptor.tag, err);
                tokio::spawn(async move {
                    if let Ok(Ok(engine)) = task.await {
                        close_in_background(engine).await;
                    }
                });
                Err(err)
            }
        }
    }

    /// Runs close on a blocking thread until done or `deadline` fires.
    ///
    /// The lifecycle is idle as soon as this is called; a close outrun by
    /// the deadline keeps running detached.
    async fn stop_until<F>(&mut self, deadline: F) -> Result<()>
    where
        F: Future<Output = LifecycleError>,
    {
        let mut engine = self.engine.take().ok_or(LifecycleError::NotRunning)?;
        debug!("Proxy '{}' stopping", self.descriptor.tag);

        let mut task =
            tokio::task::spawn_blocking(move || engine.close().map_err(LifecycleError::Close));

        tokio::select! {
            biased;
            joined = &mut task => joined?,
            err = deadline => {
                warn!("Proxy '{}': {}, close continues in background", self.descriptor.tag, err);
                Err(err)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_some()
    }

    pub fn state(&self) -> LifecycleState {
        if self.is_running() {
            LifecycleState::Running
        } else {
            LifecycleState::Idle
        }
    }

    /// `host:port` of the mixed listener, empty if the config has none
    pub fn listen_address(&self) -> String {
        self.config
            .mixed_inbound()
            .and_then(MixedInbound::socket_addr)
            .map(|addr| addr.to_string())
            .unwrap_or_default()
    }

    /// The outbound this lifecycle was created for
    pub fn descriptor(&self) -> &OutboundDescriptor {
        &self.descriptor
    }

    /// The assembled routing configuration
    pub fn routing_config(&self) -> &RoutingConfig {
        &self.config
    }
}

impl Drop for ProxyLifecycle {
    fn drop(&mut self) {
        if let Some(mut engine) = self.engine.take()
            && let Err(e) = engine.close()
        {
            warn!("Failed to close proxy '{}' on drop: {}", self.descriptor.tag, e);
        }
    }
}

/// Creates and starts an engine, closing it again if the start fails
fn create_and_start(
    factory: &dyn EngineFactory,
    config: &RoutingConfig,
) -> Result<Box<dyn Engine>> {
    let mut engine = factory.create(config).map_err(LifecycleError::Create)?;

    if let Err(e) = engine.start() {
        if let Err(close_err) = engine.close() {
            warn!("Failed to close engine after start failure: {}", close_err);
        }
        return Err(LifecycleError::Start(e));
    }

    Ok(engine)
}

async fn close_in_background(mut engine: Box<dyn Engine>) {
    match tokio::task::spawn_blocking(move || engine.close()).await {
        Ok(Ok(())) => debug!("Closed engine started after cancellation"),
        Ok(Err(e)) => warn!("Failed to close engine started after cancellation: {}", e),
        Err(e) => warn!("Engine close task failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::outbound::{ProtocolOptions, TrojanOptions};
    use crate::error::BoxError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn descriptor() -> OutboundDescriptor {
        OutboundDescriptor {
            tag: "test-node".to_string(),
            server: "example.com".to_string(),
            server_port: 443,
            protocol: ProtocolOptions::Trojan(TrojanOptions {
                password: "pw".to_string(),
            }),
            tls: None,
            transport: None,
        }
    }

    /// Counts engine calls and fails on demand
    #[derive(Default)]
    struct MockFactory {
        created: AtomicUsize,
        started: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
        fail_create: AtomicBool,
        fail_start: AtomicBool,
        fail_close: AtomicBool,
    }

    struct MockEngine {
        started: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
        fail_start: bool,
        fail_close: bool,
    }

    impl Engine for MockEngine {
        fn start(&mut self) -> std::result::Result<(), BoxError> {
            if self.fail_start {
                return Err("boom".into());
            }
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn close(&mut self) -> std::result::Result<(), BoxError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err("close failed".into());
            }
            Ok(())
        }
    }

    impl EngineFactory for MockFactory {
        fn create(&self, _config: &RoutingConfig) -> std::result::Result<Box<dyn Engine>, BoxError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err("bad config".into());
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockEngine {
                started: Arc::clone(&self.started),
                closed: Arc::clone(&self.closed),
                fail_start: self.fail_start.load(Ordering::SeqCst),
                fail_close: self.fail_close.load(Ordering::SeqCst),
            }))
        }
    }

    fn lifecycle(factory: &Arc<MockFactory>) -> ProxyLifecycle {
        ProxyLifecycle::with_engine(descriptor(), LifecycleOptions::default(), factory.clone())
    }

    #[test]
    fn test_parse_listen_addr() {
        assert_eq!(parse_listen_addr("127.0.0.1:9050"), "127.0.0.1:9050".parse().unwrap());
        assert_eq!(parse_listen_addr("0.0.0.0:1081"), "0.0.0.0:1081".parse().unwrap());
        assert_eq!(parse_listen_addr("[::1]:1081"), "[::1]:1081".parse().unwrap());
        assert_eq!(parse_listen_addr("::1"), "[::1]:1080".parse().unwrap());
        assert_eq!(parse_listen_addr("10.0.0.2"), "10.0.0.2:1080".parse().unwrap());
    }

    #[test]
    fn test_parse_listen_addr_fallbacks() {
        assert_eq!(parse_listen_addr("localhost:9050"), "127.0.0.1:9050".parse().unwrap());
        assert_eq!(parse_listen_addr(":8080"), "127.0.0.1:8080".parse().unwrap());
        assert_eq!(parse_listen_addr("127.0.0.1:http"), "127.0.0.1:1080".parse().unwrap());
        assert_eq!(parse_listen_addr("127.0.0.1:70000"), "127.0.0.1:1080".parse().unwrap());
        assert_eq!(parse_listen_addr("garbage"), "127.0.0.1:1080".parse().unwrap());
    }

    #[test]
    fn test_routing_config_shape() {
        let lifecycle = ProxyLifecycle::new(descriptor(), LifecycleOptions::default());
        let config = lifecycle.routing_config();

        assert_eq!(config.inbounds.len(), 1);
        assert_eq!(config.outbounds.len(), 3);
        let tags: Vec<&str> = config.outbounds.iter().map(Outbound::tag).collect();
        assert_eq!(tags, vec!["test-node", "direct", "block"]);
        assert_eq!(config.proxy_outbound(), Some(lifecycle.descriptor()));

        let route = config.route.as_ref().unwrap();
        assert!(route.auto_detect_interface);
        assert_eq!(route.rules, vec![crate::config::route::RouteRule::route_to("test-node")]);
        assert_eq!(config.log.level, Some(LogLevel::Panic));
        assert_eq!(config.log.output.as_deref(), Some("stderr"));
    }

    #[test]
    fn test_routing_config_renames_shadowed_builtin() {
        for (proxy_tag, expected) in [
            ("direct", ["direct", "direct-out", "block"]),
            ("block", ["block", "direct", "block-out"]),
        ] {
            let mut descriptor = descriptor();
            descriptor.tag = proxy_tag.to_string();
            let config = build_routing_config(
                &descriptor,
                DEFAULT_LISTEN_ADDR.parse().unwrap(),
                LogLevel::default(),
            );

            let tags: Vec<&str> = config.outbounds.iter().map(Outbound::tag).collect();
            assert_eq!(tags, expected);
            assert_eq!(config.proxy_outbound(), Some(&descriptor));
            assert_eq!(
                config.route.unwrap().rules,
                vec![crate::config::route::RouteRule::route_to(proxy_tag)]
            );
        }
    }

    #[test]
    fn test_options_builder() {
        let options = LifecycleOptions::new()
            .listen_addr("127.0.0.1:9050")
            .log_level(LogLevel::Debug);
        let lifecycle = ProxyLifecycle::new(descriptor(), options);
        assert_eq!(lifecycle.listen_address(), "127.0.0.1:9050");
        assert_eq!(lifecycle.routing_config().log.level, Some(LogLevel::Debug));
    }

    #[test]
    fn test_default_listen_address() {
        let lifecycle = ProxyLifecycle::new(descriptor(), LifecycleOptions::default());
        assert_eq!(lifecycle.listen_address(), DEFAULT_LISTEN_ADDR);

        let lifecycle = ProxyLifecycle::new(descriptor(), LifecycleOptions::new().listen_addr("  "));
        assert_eq!(lifecycle.listen_address(), DEFAULT_LISTEN_ADDR);
    }

    #[test]
    fn test_listen_address_empty_without_mixed_inbound() {
        let mut lifecycle = ProxyLifecycle::new(descriptor(), LifecycleOptions::default());
        lifecycle.config.inbounds.clear();
        assert_eq!(lifecycle.listen_address(), "");
    }

    #[test]
    fn test_start_stop_cycle() {
        let factory = Arc::new(MockFactory::default());
        let mut lifecycle = lifecycle(&factory);
        assert_eq!(lifecycle.state(), LifecycleState::Idle);

        lifecycle.start().unwrap();
        assert!(lifecycle.is_running());
        assert_eq!(lifecycle.state(), LifecycleState::Running);

        lifecycle.stop().unwrap();
        assert!(!lifecycle.is_running());

        lifecycle.start().unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(factory.started.load(Ordering::SeqCst), 2);
        assert_eq!(factory.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_before_start() {
        let factory = Arc::new(MockFactory::default());
        let mut lifecycle = lifecycle(&factory);
        assert!(matches!(lifecycle.stop(), Err(LifecycleError::NotRunning)));
        assert_eq!(factory.closed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_double_start_keeps_first_engine() {
        let factory = Arc::new(MockFactory::default());
        let mut lifecycle = lifecycle(&factory);
        lifecycle.start().unwrap();

        assert!(matches!(lifecycle.start(), Err(LifecycleError::AlreadyRunning)));
        assert!(lifecycle.is_running());
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(factory.closed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_create_failure_stays_idle() {
        let factory = Arc::new(MockFactory::default());
        factory.fail_create.store(true, Ordering::SeqCst);
        let mut lifecycle = lifecycle(&factory);

        let err = lifecycle.start().unwrap_err();
        assert!(matches!(err, LifecycleError::Create(_)));
        assert_eq!(err.to_string(), "create proxy engine: bad config");
        assert!(!lifecycle.is_running());

        factory.fail_create.store(false, Ordering::SeqCst);
        lifecycle.start().unwrap();
    }

    #[test]
    fn test_start_failure_closes_engine() {
        let factory = Arc::new(MockFactory::default());
        factory.fail_start.store(true, Ordering::SeqCst);
        let mut lifecycle = lifecycle(&factory);

        assert!(matches!(lifecycle.start(), Err(LifecycleError::Start(_))));
        assert!(!lifecycle.is_running());
        assert_eq!(factory.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_failure_still_idle() {
        let factory = Arc::new(MockFactory::default());
        factory.fail_close.store(true, Ordering::SeqCst);
        let mut lifecycle = lifecycle(&factory);
        lifecycle.start().unwrap();

        assert!(matches!(lifecycle.stop(), Err(LifecycleError::Close(_))));
        assert!(!lifecycle.is_running());
        assert!(matches!(lifecycle.stop(), Err(LifecycleError::NotRunning)));
    }

    #[test]
    fn test_drop_closes_running_engine() {
        let factory = Arc::new(MockFactory::default());
        let mut lifecycle = lifecycle(&factory);
        lifecycle.start().unwrap();
        drop(lifecycle);
        assert_eq!(factory.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_with_timeout_completes() {
        let factory = Arc::new(MockFactory::default());
        let mut lifecycle = lifecycle(&factory);

        lifecycle.start_with_timeout(Duration::from_secs(5)).await.unwrap();
        assert!(lifecycle.is_running());
        assert!(matches!(
            lifecycle.start_with_timeout(Duration::from_secs(5)).await,
            Err(LifecycleError::AlreadyRunning)
        ));

        lifecycle.stop_with_timeout(Duration::from_secs(5)).await.unwrap();
        assert!(!lifecycle.is_running());
        assert!(matches!(
            lifecycle.stop_with_timeout(Duration::from_secs(5)).await,
            Err(LifecycleError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_start_with_cancel_propagates_engine_error() {
        let factory = Arc::new(MockFactory::default());
        factory.fail_start.store(true, Ordering::SeqCst);
        let mut lifecycle = lifecycle(&factory);

        let result = lifecycle.start_with_cancel(CancellationToken::new()).await;
        assert!(matches!(result, Err(LifecycleError::Start(_))));
        assert!(!lifecycle.is_running());
    }

    #[tokio::test]
    async fn test_stop_with_cancel_reports_close_error() {
        let factory = Arc::new(MockFactory::default());
        factory.fail_close.store(true, Ordering::SeqCst);
        let mut lifecycle = lifecycle(&factory);
        lifecycle.start().unwrap();

        let result = lifecycle.stop_with_cancel(CancellationToken::new()).await;
        assert!(matches!(result, Err(LifecycleError::Close(_))));
        assert!(!lifecycle.is_running());
    }
}
