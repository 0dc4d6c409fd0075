//! The process-wide gateway.

use crate::api::config::CollectorConfig;
use crate::api::error::GcResult;
use crate::api::gateway::AllocationGateway;
use crate::api::singleton::{Singleton, SingletonCell, SingletonToken};
use crate::diagnostics;

/// Gateway over a collector configured from the environment.
pub(crate) struct GlobalGateway {
    gateway: AllocationGateway,
}

impl Singleton for GlobalGateway {
    fn create(_token: SingletonToken) -> Self {
        diagnostics::init_from_env();
        let config = CollectorConfig::from_env();
        log::debug!("[gcgate] global collector: {:?}", config);
        Self {
            gateway: AllocationGateway::with_config(config),
        }
    }
}

static GLOBAL: SingletonCell<GlobalGateway> = SingletonCell::new();

/// The process-wide gateway, created on first use.
pub(crate) fn gateway() -> GcResult<&'static AllocationGateway> {
    GLOBAL.instance().map(|global| &global.gateway)
}
