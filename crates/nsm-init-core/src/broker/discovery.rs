//! Service discovery with bounded retry.

use super::{BrokerClient, BrokerError};
use crate::clock::Clock;
use crate::models::ServiceDescriptor;
use crate::retry::{RetryContext, RetryPolicy};
use crate::{NsmError, Result};
use tracing::{debug, info, warn};

/// Polls the broker for its service list until it answers or the deadline passes.
pub struct DiscoveryWaiter<'a, B: BrokerClient + ?Sized, C: Clock + ?Sized> {
    broker: &'a B,
    clock: &'a C,
}

impl<'a, B: BrokerClient + ?Sized, C: Clock + ?Sized> DiscoveryWaiter<'a, B, C> {
    pub fn new(broker: &'a B, clock: &'a C) -> Self {
        Self { broker, clock }
    }

    /// Discover the network services known to the local NSM.
    ///
    /// Any successful answer ends the wait, including an empty list. Failed
    /// calls are retried on every tick; the last one is reported in
    /// [`NsmError::DiscoveryTimeout`] if the deadline passes first. A call
    /// still pending at the deadline is abandoned.
    pub async fn discover(&self, policy: &RetryPolicy) -> Result<Vec<ServiceDescriptor>> {
        let mut ctx: RetryContext<'_, C, BrokerError> = RetryContext::start(self.clock, policy)?;

        while ctx.next_attempt().await {
            let Some(outcome) = ctx.bounded(self.broker.discover()).await else {
                warn!(
                    "nsm client: Discovery request still unanswered after {:?}, giving up",
                    policy.timeout
                );
                ctx.record_error(BrokerError::deadline_exceeded(
                    "discovery request unanswered at the deadline",
                ));
                break;
            };

            match outcome {
                Ok(services) => {
                    debug!(
                        "Discovery succeeded on attempt {} after {:?}",
                        ctx.attempts(),
                        ctx.elapsed()
                    );
                    return Ok(services);
                }
                Err(e) => {
                    info!(
                        "nsm client: Discovery request failed with: {}, re-attempting in {:?}",
                        e, policy.interval
                    );
                    ctx.record_error(e);
                }
            }
        }

        Err(NsmError::DiscoveryTimeout {
            timeout: policy.timeout,
            attempts: ctx.attempts(),
            last_error: ctx.take_last_error(),
        })
    }
}
