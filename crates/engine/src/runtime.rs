// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process-global singleton bundle (spec.md §5): mechanism registry,
//! passdb registry, scheme registry, and the failure-delay queue, built
//! once in `main` and shared via `Arc<Runtime>` with every connection
//! task — the idiomatic rendition of spec.md §9's "singleton owned by the
//! top-level runtime object."

use std::time::Duration;

use authd_core::SystemClock;

use crate::failure_delay::FailureDelayQueue;
use crate::mechanisms::MechanismRegistry;
use crate::passdb::PassdbRegistry;
use crate::scheme::SchemeRegistry;

pub struct RuntimeConfig {
    pub failure_delay: Duration,
    pub request_deadline: Duration,
    pub connection_inactivity_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            failure_delay: Duration::from_secs(2),
            request_deadline: Duration::from_secs(30),
            connection_inactivity_timeout: Duration::from_secs(60),
        }
    }
}

pub struct Runtime {
    pub mechanisms: MechanismRegistry,
    pub passdbs: PassdbRegistry,
    pub schemes: SchemeRegistry,
    pub failure_delay: FailureDelayQueue,
    pub config: RuntimeConfig,
    pub clock: SystemClock,
}

impl Runtime {
    pub fn new(passdbs: PassdbRegistry, config: RuntimeConfig) -> Runtime {
        Runtime {
            mechanisms: MechanismRegistry::new(),
            passdbs,
            schemes: SchemeRegistry::new(),
            failure_delay: FailureDelayQueue::new(config.failure_delay),
            config,
            clock: SystemClock,
        }
    }
}
