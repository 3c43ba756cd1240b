//! Fault injection for resilience testing.
//!
//! [`ChaosTransport`] wraps any [`ClientTransport`] and misbehaves on purpose:
//! dropping inbound frames and killing the channel after a configured number of sends.
//! The reconnect test suites use it to drive the
//! [`ConnectionManager`](crate::ConnectionManager) through disconnect/reconnect cycles
//! without a real flaky network.

use std::collections::VecDeque;

use crate::net::transport::{ClientTransport, TransportEvent};
use crate::rng::Pcg32;
use crate::GridroomError;

/// Fault model for a [`ChaosTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChaosConfig {
    /// Probability in `[0.0, 1.0]` that an inbound message frame is silently dropped.
    pub drop_probability: f64,
    /// If set, the channel fails permanently after this many successful sends.
    pub fail_after_sends: Option<u32>,
    /// Seed for the deterministic drop decisions.
    pub seed: u64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            drop_probability: 0.0,
            fail_after_sends: None,
            seed: 0,
        }
    }
}

/// A [`ClientTransport`] wrapper that injects faults per a [`ChaosConfig`].
#[derive(Debug)]
pub struct ChaosTransport<T: ClientTransport> {
    inner: T,
    config: ChaosConfig,
    rng: Pcg32,
    sends: u32,
    failed: bool,
    /// Synthetic events queued when this wrapper kills the channel itself.
    injected: VecDeque<TransportEvent>,
    dropped: u64,
}

impl<T: ClientTransport> ChaosTransport<T> {
    /// Wraps a transport with the given fault model.
    #[must_use]
    pub fn new(inner: T, config: ChaosConfig) -> Self {
        let rng = Pcg32::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            rng,
            sends: 0,
            failed: false,
            injected: VecDeque::new(),
            dropped: 0,
        }
    }

    /// Kills the channel immediately, as if the socket errored out.
    pub fn force_fail(&mut self) {
        if !self.failed {
            self.failed = true;
            self.inner.close();
            self.injected.push_back(TransportEvent::Error {
                context: "injected failure".to_owned(),
            });
            self.injected.push_back(TransportEvent::Closed);
        }
    }

    /// Number of inbound frames dropped so far.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Consumes the wrapper, returning the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: ClientTransport> ClientTransport for ChaosTransport<T> {
    fn send(&mut self, text: &str) -> Result<(), GridroomError> {
        if self.failed {
            return Err(GridroomError::Transport {
                context: "chaos channel already failed".to_owned(),
            });
        }
        self.inner.send(text)?;
        self.sends += 1;
        if let Some(limit) = self.config.fail_after_sends {
            if self.sends >= limit {
                tracing::debug!(sends = self.sends, "chaos transport killing channel");
                self.force_fail();
            }
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let mut events: Vec<TransportEvent> = self.injected.drain(..).collect();
        if self.failed {
            return events;
        }
        for event in self.inner.poll() {
            match event {
                TransportEvent::Message { text } => {
                    if self.rng.gen_f64() < self.config.drop_probability {
                        self.dropped += 1;
                        tracing::trace!("chaos transport dropped an inbound frame");
                    } else {
                        events.push(TransportEvent::Message { text });
                    }
                }
                other => events.push(other),
            }
        }
        events
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
