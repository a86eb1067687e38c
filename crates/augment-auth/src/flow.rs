//! In-flight authorization flows keyed by `state`
//!
//! Each call to the authorize endpoint either reuses the most recent live
//! flow or mints a new one. Exchanges look the flow up by the `state` the
//! caller echoes back, or fall back to the most recent live flow when the
//! caller has none. Flows expire after the registry TTL and are pruned
//! lazily on every mutation.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::pkce::OAuthState;

/// Default lifetime of an authorization flow.
pub const DEFAULT_FLOW_TTL: Duration = Duration::from_secs(600);

#[derive(Default)]
struct Flows {
    by_state: HashMap<String, OAuthState>,
    latest: Option<String>,
}

/// Registry of authorization flows awaiting a code exchange.
pub struct FlowRegistry {
    ttl: Duration,
    flows: Mutex<Flows>,
}

impl FlowRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            flows: Mutex::new(Flows::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_live(&self, flow: &OAuthState) -> bool {
        flow.created_at.elapsed() < self.ttl
    }

    fn prune(&self, flows: &mut Flows) {
        flows.by_state.retain(|_, f| f.created_at.elapsed() < self.ttl);
        if flows
            .latest
            .as_ref()
            .is_some_and(|latest| !flows.by_state.contains_key(latest))
        {
            flows.latest = None;
        }
    }

    fn insert(&self, flows: &mut Flows, flow: OAuthState) {
        flows.latest = Some(flow.state.clone());
        flows.by_state.insert(flow.state.clone(), flow);
    }

    /// Mint a new flow and make it the current one.
    pub async fn begin(&self) -> OAuthState {
        let mut flows = self.flows.lock().await;
        self.prune(&mut flows);
        let flow = OAuthState::generate();
        self.insert(&mut flows, flow.clone());
        debug!(state = %flow.state, "authorization flow started");
        flow
    }

    /// The most recent live flow, minting one if none is live.
    pub async fn current(&self) -> OAuthState {
        let mut flows = self.flows.lock().await;
        self.prune(&mut flows);
        if let Some(flow) = flows
            .latest
            .as_ref()
            .and_then(|state| flows.by_state.get(state))
        {
            return flow.clone();
        }
        let flow = OAuthState::generate();
        self.insert(&mut flows, flow.clone());
        debug!(state = %flow.state, "authorization flow started");
        flow
    }

    /// Find the flow a code exchange belongs to.
    ///
    /// With a `state`, that exact flow must exist and be live. Without one,
    /// the most recent live flow is used.
    pub async fn resolve(&self, state: Option<&str>) -> Result<OAuthState> {
        let mut flows = self.flows.lock().await;
        match state {
            Some(state) => {
                let flow = flows
                    .by_state
                    .get(state)
                    .cloned()
                    .ok_or_else(|| Error::FlowNotFound(format!("unknown state {state}")))?;
                if !self.is_live(&flow) {
                    flows.by_state.remove(state);
                    self.prune(&mut flows);
                    return Err(Error::FlowExpired(format!(
                        "state {state} is older than {}s, request a new authorization URL",
                        self.ttl.as_secs()
                    )));
                }
                Ok(flow)
            }
            None => {
                self.prune(&mut flows);
                flows
                    .latest
                    .as_ref()
                    .and_then(|state| flows.by_state.get(state))
                    .cloned()
                    .ok_or_else(|| {
                        Error::FlowNotFound(
                            "no authorization flow in progress, request a new authorization URL"
                                .into(),
                        )
                    })
            }
        }
    }

    /// Retire a flow after its code has been exchanged.
    pub async fn complete(&self, state: &str) {
        let mut flows = self.flows.lock().await;
        if flows.by_state.remove(state).is_some() {
            debug!(state, "authorization flow completed");
        }
        if flows.latest.as_deref() == Some(state) {
            flows.latest = None;
        }
    }

    /// Number of flows currently held, live or not yet pruned.
    pub async fn len(&self) -> usize {
        self.flows.lock().await.by_state.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for FlowRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_FLOW_TTL)
    }
}
