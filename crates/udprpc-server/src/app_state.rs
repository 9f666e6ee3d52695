//! Shared application state for the RPC server.
//!
//! Wires the dedup store, monitor registry, facility handler, fault
//! simulator and metrics into one dispatcher. Startup errors are returned,
//! never panicked.

use std::sync::Arc;

use udprpc_core::error::Result;
use udprpc_core::protocol::wire_marshaller;

use crate::config::ServerConfig;
use crate::dispatch::{Dispatcher, OperationHandler};
use crate::history::InvocationHistory;
use crate::monitor::MonitorRegistry;
use crate::obs::RpcMetrics;
use crate::services::FacilityService;
use crate::simulator::FaultSimulator;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    simulator: Arc<FaultSimulator>,
    metrics: Arc<RpcMetrics>,
}

impl AppState {
    /// Build state with the facility service seeded from `cfg.facilities`.
    pub fn new(cfg: ServerConfig) -> Result<Self> {
        let handler = Arc::new(FacilityService::from_config(&cfg.facilities)?);
        let simulator = FaultSimulator::new(&cfg.simulation);
        Self::with_parts(cfg, handler, simulator)
    }

    /// Build state around any handler and simulator.
    pub fn with_parts(
        cfg: ServerConfig,
        handler: Arc<dyn OperationHandler>,
        simulator: FaultSimulator,
    ) -> Result<Self> {
        cfg.validate()?;
        let metrics = Arc::new(RpcMetrics::default());
        let dispatcher = Dispatcher::new(
            wire_marshaller()?,
            cfg.server.semantics,
            Arc::new(InvocationHistory::new(cfg.history.max_entries)),
            Arc::new(MonitorRegistry::new()),
            handler,
            Arc::clone(&metrics),
        );

        tracing::info!(
            semantics = cfg.server.semantics.as_str(),
            history_cap = cfg.history.max_entries,
            simulation = simulator.is_active(),
            "server state ready"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                dispatcher: Arc::new(dispatcher),
                simulator: Arc::new(simulator),
                metrics,
            }),
        })
    }

    pub fn cfg(&self) -> &ServerConfig {
        &self.inner.cfg
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.inner.dispatcher)
    }

    pub fn simulator(&self) -> Arc<FaultSimulator> {
        Arc::clone(&self.inner.simulator)
    }

    pub fn metrics(&self) -> Arc<RpcMetrics> {
        Arc::clone(&self.inner.metrics)
    }
}
