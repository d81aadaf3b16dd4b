//! Token refresh coordination
//!
//! When the server rejects an access token, at most one refresh exchange runs
//! at a time. Every call that fails with an expired token while that exchange
//! is in flight waits in a FIFO queue and is replayed once, in arrival order,
//! with the new token. If the exchange fails the store is cleared and every
//! waiting call receives the refresh error.
//!
//! The transitions live in `RefreshState`, a plain value with no I/O, so the
//! ordering rules are testable without a runtime. `RefreshCoordinator` wraps
//! it in a `tokio::sync::Mutex` and drives the network side:
//!
//! ```text
//! Idle --401 (not retried, pair stored)--> Refreshing{queue: [trigger]}
//! Refreshing --401--> Refreshing{queue: [.., call]}
//! Refreshing --exchange concluded--> Idle (queue drained, replayed or rejected)
//! ```
//!
//! Store updates after an exchange run on the blocking pool while the state
//! lock is held: the file backend does synchronous I/O, and the new pair must
//! be in place before the next 401 is admitted.

use std::collections::VecDeque;
use std::sync::Arc;

use reqwest::header::HeaderMap;
use session_auth::{CredentialPair, CredentialStore};
use tokio::sync::{Mutex, oneshot};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::authenticator::Authenticator;
use crate::classify;
use crate::error::{ClientError, Result};
use crate::metrics;
use crate::request::{ApiRequest, ApiResponse, Attempt};
use crate::upstream::Upstream;

/// Refresh state machine, generic over the queued item.
#[derive(Debug)]
pub enum RefreshState<T> {
    Idle,
    Refreshing { queue: VecDeque<T> },
}

/// Where an admitted call ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First call of the cycle: it must start the exchange.
    Leader,
    /// An exchange is already running. `position` is the 0-based queue index.
    Queued { position: usize },
}

impl<T> Default for RefreshState<T> {
    fn default() -> Self {
        RefreshState::Idle
    }
}

impl<T> RefreshState<T> {
    /// Enqueue a call that needs a fresh token.
    ///
    /// From `Idle` this starts a new cycle with the call at the head of the
    /// queue; while `Refreshing` it appends.
    pub fn admit(&mut self, call: T) -> Admission {
        match self {
            RefreshState::Idle => {
                *self = RefreshState::Refreshing {
                    queue: VecDeque::from([call]),
                };
                Admission::Leader
            }
            RefreshState::Refreshing { queue } => {
                queue.push_back(call);
                Admission::Queued {
                    position: queue.len() - 1,
                }
            }
        }
    }

    /// End the cycle, returning the queue in arrival order.
    pub fn conclude(&mut self) -> VecDeque<T> {
        match std::mem::take(self) {
            RefreshState::Idle => VecDeque::new(),
            RefreshState::Refreshing { queue } => queue,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(self, RefreshState::Refreshing { .. })
    }
}

/// A call suspended until the current refresh concludes.
///
/// `attempt` is already marked as retried; `reply` is fulfilled exactly once.
struct PendingCall {
    attempt: Attempt,
    request_id: String,
    reply: oneshot::Sender<Result<ApiResponse>>,
}

/// What a call that got a 401 does next, decided under the state lock.
enum Recovery {
    Propagate,
    /// A refresh completed after this call left; replay with the stored pair.
    ReplayNow(CredentialPair),
    Lead {
        refresh_token: String,
        reply: oneshot::Receiver<Result<ApiResponse>>,
    },
    Wait {
        position: usize,
        reply: oneshot::Receiver<Result<ApiResponse>>,
    },
}

struct Shared {
    state: Mutex<RefreshState<PendingCall>>,
    store: Arc<CredentialStore>,
    upstream: Arc<dyn Upstream>,
    authenticator: Arc<dyn Authenticator>,
}

/// Sends requests and recovers from expired access tokens.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Shared>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        upstream: Arc<dyn Upstream>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(RefreshState::Idle),
                store,
                upstream,
                authenticator,
            }),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.inner.store
    }

    /// Whether a refresh exchange is currently in flight.
    pub async fn is_refreshing(&self) -> bool {
        self.inner.state.lock().await.is_refreshing()
    }

    /// Send `request` with the current credential, refreshing and replaying it
    /// once if the server reports the access token as expired.
    pub async fn execute(&self, request: ApiRequest, request_id: &str) -> Result<ApiResponse> {
        let attempt = Attempt::first(request);
        let credential = self.inner.store.read();
        let sent_with = credential.as_ref().map(|pair| pair.access().to_owned());

        match self.inner.dispatch(&attempt, credential.as_ref()).await {
            Err(ClientError::AuthorizationExpired(body)) => {
                self.recover(attempt, sent_with, body, request_id).await
            }
            other => other,
        }
    }

    async fn recover(
        &self,
        attempt: Attempt,
        sent_with: Option<String>,
        body: String,
        request_id: &str,
    ) -> Result<ApiResponse> {
        if attempt.is_retry() {
            return Err(ClientError::AuthorizationExpired(body));
        }

        let recovery = {
            let mut state = self.inner.state.lock().await;
            match self.inner.store.read() {
                None => Recovery::Propagate,
                Some(current)
                    if !state.is_refreshing() && sent_with.as_deref() != Some(current.access()) =>
                {
                    Recovery::ReplayNow(current)
                }
                Some(current) => {
                    let (tx, rx) = oneshot::channel();
                    let call = PendingCall {
                        attempt: attempt.replay(),
                        request_id: request_id.to_owned(),
                        reply: tx,
                    };
                    match state.admit(call) {
                        Admission::Leader => Recovery::Lead {
                            refresh_token: current.refresh().to_owned(),
                            reply: rx,
                        },
                        Admission::Queued { position } => Recovery::Wait {
                            position,
                            reply: rx,
                        },
                    }
                }
            }
        };

        let reply = match recovery {
            Recovery::Propagate => {
                debug!(request_id, "no refresh token stored, propagating 401");
                return Err(ClientError::AuthorizationExpired(body));
            }
            Recovery::ReplayNow(current) => {
                debug!(request_id, "token rotated since request was sent, replaying");
                let result = self.inner.dispatch(&attempt.replay(), Some(&current)).await;
                metrics::record_replay(replay_outcome(&result));
                return result;
            }
            Recovery::Lead {
                refresh_token,
                reply,
            } => {
                info!(request_id, "access token expired, refreshing");
                let shared = Arc::clone(&self.inner);
                tokio::spawn(
                    shared
                        .run_refresh(refresh_token)
                        .instrument(info_span!("token_refresh")),
                );
                reply
            }
            Recovery::Wait { position, reply } => {
                debug!(request_id, position, "refresh in flight, queued");
                reply
            }
        };

        reply.await.map_err(|_| {
            ClientError::Canceled(format!("{request_id} dropped before the refresh concluded"))
        })?
    }
}

impl Shared {
    /// One send: authenticate, transmit, classify.
    async fn dispatch(
        &self,
        attempt: &Attempt,
        credential: Option<&CredentialPair>,
    ) -> Result<ApiResponse> {
        let request = attempt.request();
        let headers: HeaderMap = self.authenticator.authenticate(request, credential);
        debug!(
            authenticator = self.authenticator.id(),
            authenticated = credential.is_some(),
            retry = attempt.is_retry(),
            "dispatching request"
        );
        let response = self.upstream.send(request, headers).await?;
        classify::into_result(response)
    }

    /// Apply `change` to the store on the blocking pool. Failures are logged;
    /// memory already reflects the change.
    async fn update_store<F>(&self, action: &'static str, change: F)
    where
        F: FnOnce(&CredentialStore) -> session_auth::Result<()> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || change(&store)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(action, error = %e, "failed to update stored credentials"),
            Err(e) => warn!(action, error = %e, "credential store task failed"),
        }
    }

    /// Run one refresh exchange, conclude the cycle, then answer every queued
    /// call in arrival order.
    async fn run_refresh(self: Arc<Self>, refresh_token: String) {
        let outcome = self.upstream.refresh(&refresh_token).await;

        // The store changes and the state returns to Idle in one critical
        // section, so a 401 arriving afterwards sees the new pair.
        let (queue, outcome) = {
            let mut state = self.state.lock().await;
            let outcome = match outcome {
                Ok(refreshed) => {
                    let pair = refreshed.into_pair(&refresh_token);
                    let stored = pair.clone();
                    self.update_store("write", move |store| store.write(stored)).await;
                    metrics::record_refresh("success");
                    Ok(pair)
                }
                Err(e) => {
                    warn!(error = %e, "token refresh failed, clearing credentials");
                    self.update_store("clear", CredentialStore::clear).await;
                    metrics::record_refresh(refresh_outcome(&e));
                    Err(e)
                }
            };
            (state.conclude(), outcome)
        };

        match &outcome {
            Ok(_) => info!(queued = queue.len(), "token refreshed, replaying queued requests"),
            Err(_) => info!(queued = queue.len(), "rejecting queued requests"),
        }

        for call in queue {
            let result = match &outcome {
                Ok(pair) => {
                    let result = self.dispatch(&call.attempt, Some(pair)).await;
                    metrics::record_replay(replay_outcome(&result));
                    result
                }
                Err(e) => {
                    metrics::record_replay("rejected");
                    Err(e.clone())
                }
            };
            if call.reply.send(result).is_err() {
                debug!(request_id = %call.request_id, "caller went away before its replay finished");
            }
        }
    }
}

fn replay_outcome(result: &Result<ApiResponse>) -> &'static str {
    if result.is_ok() { "success" } else { "failure" }
}

fn refresh_outcome(err: &ClientError) -> &'static str {
    match err {
        ClientError::Network(_) => "network",
        _ => "rejected",
    }
}
