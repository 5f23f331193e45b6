//! Connection admission with bounded retry.
//!
//! Per-service state machine:
//!
//! ```text
//! Polling --Success--> Accepted
//! Polling --Permanent--> Rejected
//! Polling --deadline--> TimedOut
//! ```
//!
//! The deadline also cuts short an attempt that is still waiting for the
//! broker.

use super::{classify, AdmissionClass, BrokerClient, BrokerError, StatusCode};
use crate::clock::Clock;
use crate::models::{AdmissionRequest, AdmissionResult, ConnectionParameters};
use crate::retry::{RetryContext, RetryPolicy};
use crate::{NsmError, Result};
use tracing::{debug, info, warn};

/// Admission state of one network service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionState {
    /// Still retrying.
    Polling,
    /// The broker admitted the connection.
    Accepted,
    /// The broker refused the request for good.
    Rejected,
    /// The deadline passed with only transient answers.
    TimedOut,
}

impl AdmissionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AdmissionState::Polling)
    }
}

impl std::fmt::Display for AdmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdmissionState::Polling => write!(f, "POLLING"),
            AdmissionState::Accepted => write!(f, "ACCEPTED"),
            AdmissionState::Rejected => write!(f, "REJECTED"),
            AdmissionState::TimedOut => write!(f, "TIMED_OUT"),
        }
    }
}

/// Requests admission for one service until a terminal state is reached.
pub struct ConnectionRequester<'a, B: BrokerClient + ?Sized, C: Clock + ?Sized> {
    broker: &'a B,
    clock: &'a C,
    state: AdmissionState,
}

impl<'a, B: BrokerClient + ?Sized, C: Clock + ?Sized> ConnectionRequester<'a, B, C> {
    pub fn new(broker: &'a B, clock: &'a C) -> Self {
        Self {
            broker,
            clock,
            state: AdmissionState::Polling,
        }
    }

    /// State reached by the last call to [`request_connection`](Self::request_connection).
    pub fn state(&self) -> AdmissionState {
        self.state
    }

    /// Request a connection, sending `request` unchanged on every attempt.
    pub async fn request_connection(
        &mut self,
        request: &AdmissionRequest,
        policy: &RetryPolicy,
    ) -> Result<ConnectionParameters> {
        self.state = AdmissionState::Polling;
        let service = request.network_service_name.as_str();
        let mut ctx: RetryContext<'_, C, BrokerError> = RetryContext::start(self.clock, policy)?;
        let mut admission_error: Option<String> = None;

        while ctx.next_attempt().await {
            let Some(outcome) = ctx.bounded(self.broker.request_connection(request)).await else {
                warn!(
                    "nsm client: Request Connection to NSM for {} still unanswered after {:?}, giving up",
                    service, policy.timeout
                );
                ctx.record_error(BrokerError::deadline_exceeded(
                    "connection request unanswered at the deadline",
                ));
                admission_error = None;
                break;
            };

            match classify(&outcome) {
                AdmissionClass::Success => {
                    self.state = AdmissionState::Accepted;
                    debug!(
                        "Connection to {} admitted on attempt {} after {:?}",
                        service,
                        ctx.attempts(),
                        ctx.elapsed()
                    );
                    return Ok(Self::parameters(service, outcome));
                }
                AdmissionClass::Permanent => {
                    self.state = AdmissionState::Rejected;
                    let (code, message) = match outcome {
                        Err(e) => (e.code, e.message),
                        // classify only reports Permanent for broker errors
                        Ok(_) => (StatusCode::Aborted, String::new()),
                    };
                    return Err(NsmError::AdmissionRejected {
                        service: service.to_string(),
                        code,
                        message,
                        admission_error,
                    });
                }
                // Only the latest transient answer is reported on timeout.
                AdmissionClass::Transient => match outcome {
                    Err(e) => {
                        Self::log_transient(&e, policy);
                        ctx.record_error(e);
                        admission_error = None;
                    }
                    Ok(result) => {
                        ctx.take_last_error();
                        info!(
                            "nsm client: NSM failed Connection Request with an admission error: {}, check NSM log for more details. Failed request ID: {}",
                            result.admission_error.as_deref().unwrap_or(""),
                            request.request_id
                        );
                        admission_error = result.admission_error;
                    }
                },
            }
        }

        self.state = AdmissionState::TimedOut;
        Err(NsmError::AdmissionTimeout {
            service: service.to_string(),
            timeout: policy.timeout,
            attempts: ctx.attempts(),
            last_error: ctx.take_last_error(),
            admission_error,
        })
    }

    fn log_transient(err: &BrokerError, policy: &RetryPolicy) {
        match err.code {
            StatusCode::AlreadyExists => info!(
                "nsm client: NSM indicates already existing non-completed Connection Request, retrying in {:?}",
                policy.interval
            ),
            _ => warn!(
                "nsm client: Request Connection to NSM has failed with unexpected error: {}, retrying in {:?}",
                err, policy.interval
            ),
        }
    }

    fn parameters(
        service: &str,
        outcome: std::result::Result<AdmissionResult, BrokerError>,
    ) -> ConnectionParameters {
        match outcome.ok().and_then(|r| r.connection_parameters) {
            Some(params) => params,
            None => {
                warn!(
                    "nsm client: NSM accepted connection to {} without connection parameters",
                    service
                );
                ConnectionParameters::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::testing::{ScriptedBroker, StalledBroker};
    use crate::clock::ManualClock;
    use crate::models::{DesiredService, Interface, Metadata};
    use std::sync::Arc;
    use std::time::Duration;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn request(service: &str) -> AdmissionRequest {
        AdmissionRequest::for_service(
            "pod-uid-1234",
            Metadata::new("client-pod", "default"),
            "4026532565",
            &DesiredService {
                name: service.to_string(),
                interfaces: vec![Interface::new("KERNEL_INTERFACE", "DEFAULT")],
            },
        )
    }

    fn params() -> ConnectionParameters {
        ConnectionParameters(serde_json::json!({"address": "10.0.0.2/24"}))
    }

    #[tokio::test]
    async fn test_accepted_on_first_attempt() {
        let clock = ManualClock::new();
        let broker = ScriptedBroker::default();
        broker.push_admission(Ok(AdmissionResult::accepted(params())));

        let mut requester = ConnectionRequester::new(&broker, &clock);
        let result = requester
            .request_connection(&request("gold"), &RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(result, params());
        assert_eq!(requester.state(), AdmissionState::Accepted);
    }

    #[tokio::test]
    async fn test_aborted_rejects_after_one_attempt() {
        let clock = ManualClock::new();
        let broker = ScriptedBroker::default();
        broker.push_admission(Err(BrokerError::new(StatusCode::Aborted, "never")));

        let mut requester = ConnectionRequester::new(&broker, &clock);
        let err = requester
            .request_connection(&request("gold"), &RetryPolicy::default())
            .await
            .unwrap_err();

        assert_eq!(broker.requests.lock().unwrap().len(), 1);
        assert_eq!(requester.state(), AdmissionState::Rejected);
        assert_eq!(clock.elapsed(), Duration::ZERO);
        match err {
            NsmError::AdmissionRejected { service, code, .. } => {
                assert_eq!(service, "gold");
                assert_eq!(code, StatusCode::Aborted);
            }
            other => panic!("Expected AdmissionRejected, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_not_found_rejects_without_retry() {
        let clock = ManualClock::new();
        let broker = ScriptedBroker::default();
        broker.push_admission(Err(BrokerError::new(StatusCode::NotFound, "no such service")));

        let mut requester = ConnectionRequester::new(&broker, &clock);
        let err = requester
            .request_connection(&request("missing"), &RetryPolicy::default())
            .await
            .unwrap_err();

        assert_eq!(broker.requests.lock().unwrap().len(), 1);
        assert_eq!(err.service(), Some("missing"));
    }

    #[tokio::test]
    async fn test_already_exists_then_accepted_after_two_intervals() {
        let clock = Arc::new(ManualClock::new());
        let broker = ScriptedBroker::with_clock(clock.clone());
        broker.push_admission(Err(BrokerError::new(StatusCode::AlreadyExists, "programming")));
        broker.push_admission(Err(BrokerError::new(StatusCode::AlreadyExists, "programming")));
        broker.push_admission(Ok(AdmissionResult::accepted(params())));

        let mut requester = ConnectionRequester::new(&broker, &*clock);
        requester
            .request_connection(&request("gold"), &RetryPolicy::new(secs(60), secs(2)))
            .await
            .unwrap();

        assert_eq!(clock.elapsed(), secs(4));
        assert_eq!(
            *broker.admission_calls.lock().unwrap(),
            vec![secs(0), secs(2), secs(4)]
        );
    }

    #[tokio::test]
    async fn test_request_id_is_identical_on_every_attempt() {
        let clock = ManualClock::new();
        let broker = ScriptedBroker::default();
        broker.push_admission(Err(BrokerError::new(StatusCode::AlreadyExists, "programming")));
        broker.push_admission(Err(BrokerError::unavailable("socket closed")));
        broker.push_admission(Ok(AdmissionResult::declined("pending")));
        broker.push_admission(Ok(AdmissionResult::accepted(params())));

        let req = request("gold");
        let mut requester = ConnectionRequester::new(&broker, &clock);
        requester
            .request_connection(&req, &RetryPolicy::default())
            .await
            .unwrap();

        let sent = broker.requests.lock().unwrap();
        assert_eq!(sent.len(), 4);
        for attempt in sent.iter() {
            assert_eq!(attempt.request_id.as_bytes(), req.request_id.as_bytes());
            assert_eq!(attempt, &req);
        }
    }

    #[tokio::test]
    async fn test_always_transient_times_out_after_three_attempts() {
        let clock = Arc::new(ManualClock::new());
        let broker = ScriptedBroker::with_clock(clock.clone());
        broker.push_admission(Err(BrokerError::new(StatusCode::Other(13), "internal")));

        let mut requester = ConnectionRequester::new(&broker, &*clock);
        let err = requester
            .request_connection(&request("gold"), &RetryPolicy::new(secs(6), secs(2)))
            .await
            .unwrap_err();

        assert_eq!(broker.requests.lock().unwrap().len(), 3);
        assert_eq!(requester.state(), AdmissionState::TimedOut);
        assert!(clock.elapsed() >= secs(6));
        match err {
            NsmError::AdmissionTimeout {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error.unwrap().code, StatusCode::Other(13));
            }
            other => panic!("Expected AdmissionTimeout, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_decline_without_code_times_out_with_diagnostic() {
        let clock = ManualClock::new();
        let broker = ScriptedBroker::default();
        broker.push_admission(Ok(AdmissionResult::declined("no free interfaces")));

        let mut requester = ConnectionRequester::new(&broker, &clock);
        let err = requester
            .request_connection(&request("gold"), &RetryPolicy::new(secs(4), secs(1)))
            .await
            .unwrap_err();

        match err {
            NsmError::AdmissionTimeout {
                last_error,
                admission_error,
                ..
            } => {
                assert!(last_error.is_none());
                assert_eq!(admission_error.as_deref(), Some("no free interfaces"));
            }
            other => panic!("Expected AdmissionTimeout, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_reports_only_the_last_transient_answer() {
        let clock = ManualClock::new();
        let broker = ScriptedBroker::default();
        broker.push_admission(Err(BrokerError::internal("broker hiccup")));
        broker.push_admission(Ok(AdmissionResult::declined("no free interfaces")));

        let err = ConnectionRequester::new(&broker, &clock)
            .request_connection(&request("gold"), &RetryPolicy::new(secs(6), secs(2)))
            .await
            .unwrap_err();

        match err {
            NsmError::AdmissionTimeout {
                last_error,
                admission_error,
                ..
            } => {
                assert!(last_error.is_none());
                assert_eq!(admission_error.as_deref(), Some("no free interfaces"));
            }
            other => panic!("Expected AdmissionTimeout, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_after_decline_replaces_diagnostic() {
        let clock = ManualClock::new();
        let broker = ScriptedBroker::default();
        broker.push_admission(Ok(AdmissionResult::declined("no free interfaces")));
        broker.push_admission(Err(BrokerError::new(StatusCode::AlreadyExists, "programming")));

        let err = ConnectionRequester::new(&broker, &clock)
            .request_connection(&request("gold"), &RetryPolicy::new(secs(6), secs(2)))
            .await
            .unwrap_err();

        match err {
            NsmError::AdmissionTimeout {
                last_error,
                admission_error,
                ..
            } => {
                assert_eq!(last_error.unwrap().code, StatusCode::AlreadyExists);
                assert!(admission_error.is_none());
            }
            other => panic!("Expected AdmissionTimeout, got: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_admission_times_out_at_deadline() {
        let clock = crate::clock::TokioClock;
        let broker = StalledBroker::default();

        let start = tokio::time::Instant::now();
        let mut requester = ConnectionRequester::new(&broker, &clock);
        let err = requester
            .request_connection(&request("gold"), &RetryPolicy::new(secs(6), secs(2)))
            .await
            .unwrap_err();

        assert!(start.elapsed() >= secs(6) && start.elapsed() < secs(7));
        assert_eq!(requester.state(), AdmissionState::TimedOut);
        assert_eq!(*broker.calls.lock().unwrap(), 1);
        match err {
            NsmError::AdmissionTimeout {
                service,
                last_error,
                ..
            } => {
                assert_eq!(service, "gold");
                assert_eq!(
                    last_error.unwrap().code,
                    StatusCode::Other(StatusCode::DEADLINE_EXCEEDED)
                );
            }
            other => panic!("Expected AdmissionTimeout, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_admission_past_deadline_on_manual_clock_times_out() {
        let clock = Arc::new(ManualClock::new());
        let broker = StalledBroker::with_clock(clock.clone(), secs(8));

        let mut requester = ConnectionRequester::new(&broker, &*clock);
        let err = requester
            .request_connection(&request("gold"), &RetryPolicy::new(secs(6), secs(2)))
            .await
            .unwrap_err();

        assert!(matches!(err, NsmError::AdmissionTimeout { attempts: 1, .. }));
        assert_eq!(requester.state(), AdmissionState::TimedOut);
    }

    #[tokio::test]
    async fn test_accepted_without_parameters_returns_empty_parameters() {
        let clock = ManualClock::new();
        let broker = ScriptedBroker::default();
        broker.push_admission(Ok(AdmissionResult {
            accepted: true,
            connection_parameters: None,
            admission_error: None,
        }));

        let mut requester = ConnectionRequester::new(&broker, &clock);
        let result = requester
            .request_connection(&request("gold"), &RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(result, ConnectionParameters::default());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!AdmissionState::Polling.is_terminal());
        assert!(AdmissionState::Accepted.is_terminal());
        assert!(AdmissionState::Rejected.is_terminal());
        assert!(AdmissionState::TimedOut.is_terminal());
    }
}
