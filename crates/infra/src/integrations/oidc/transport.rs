//! Per-process transport decision with a one-way fallback latch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use super::broker::{TransportCapability, WebAuthBroker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    BrokerPreferred,
    LoopbackOnly,
}

/// Chooses between the broker and the loopback flow.
///
/// Starts in [`TransportState::BrokerPreferred`] when a broker was injected.
/// [`TransportSelector::latch_loopback`] moves it to
/// [`TransportState::LoopbackOnly`] for the rest of its lifetime.
#[derive(Debug)]
pub struct TransportSelector {
    capability: TransportCapability,
    loopback_only: AtomicBool,
}

impl TransportSelector {
    pub fn new(capability: TransportCapability) -> Self {
        let loopback_only = matches!(capability, TransportCapability::LoopbackOnly);
        Self { capability, loopback_only: AtomicBool::new(loopback_only) }
    }

    pub fn state(&self) -> TransportState {
        if self.loopback_only.load(Ordering::Acquire) {
            TransportState::LoopbackOnly
        } else {
            TransportState::BrokerPreferred
        }
    }

    /// The broker to use for this attempt, if still preferred.
    pub fn broker(&self) -> Option<Arc<dyn WebAuthBroker>> {
        match (&self.capability, self.state()) {
            (TransportCapability::Broker(broker), TransportState::BrokerPreferred) => {
                Some(Arc::clone(broker))
            }
            _ => None,
        }
    }

    /// Permanently disable the broker. Returns `true` for the call that
    /// performed the transition.
    pub fn latch_loopback(&self) -> bool {
        let transitioned = !self.loopback_only.swap(true, Ordering::AcqRel);
        if transitioned {
            warn!("web authentication broker unsupported; using loopback flow from now on");
        }
        transitioned
    }
}
