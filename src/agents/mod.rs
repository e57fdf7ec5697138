//! Agents module - the single agent the service exposes.
//!
//! # Types
//! - **Agent**: trait every agent implementation satisfies (one request in, one result out)
//! - **AgentHandle**: the shared, long-lived reference the HTTP layer invokes
//! - **ReactAgent**: default implementation running a ReAct loop against a planning model
//!
//! # Invocation policy
//! `AgentHandle::invoke` runs each call on its own task so a panicking agent
//! cannot take the request handler down with it. An optional semaphore bounds
//! concurrent calls and an optional deadline, covering admission and the run,
//! cancels runaway calls.

mod react;
mod types;

pub use react::ReactAgent;
pub use types::{termination, AgentError, AgentInitError, AgentRequest, AgentResult, TaskItem};

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio::time::Instant;

use crate::config::InvocationConfig;

/// Base trait for agents.
///
/// # Invariants
/// - `run()` returns either a fully populated `AgentResult` or an `AgentError`
/// - `run()` leaves no state behind that affects later calls' correctness
#[async_trait]
pub trait Agent: Send + Sync {
    /// Process one task.
    ///
    /// `model` is the model identifier the caller asked for; `request` is the
    /// full payload including the item and planning port.
    async fn run(&self, request: &AgentRequest, model: &str) -> Result<AgentResult, AgentError>;

    /// Whether overlapping `run()` calls are safe.
    ///
    /// Agents returning `false` are always invoked one at a time.
    fn concurrent_safe(&self) -> bool {
        true
    }

    /// Get a human-readable description of this agent.
    fn description(&self) -> &str {
        "Generic agent"
    }
}

/// Shared reference to an agent.
pub type AgentRef = Arc<dyn Agent>;

/// The process-wide agent instance plus the policy used to call it.
///
/// Cloning shares the same agent and the same admission gate.
#[derive(Clone)]
pub struct AgentHandle {
    agent: AgentRef,
    gate: Option<Arc<Semaphore>>,
    timeout: Option<Duration>,
}

impl AgentHandle {
    pub fn new(agent: AgentRef, policy: &InvocationConfig) -> Self {
        let limit = if agent.concurrent_safe() {
            policy.max_concurrency
        } else {
            Some(1)
        };
        Self {
            agent,
            gate: limit.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            timeout: policy.timeout,
        }
    }

    pub fn description(&self) -> &str {
        self.agent.description()
    }

    /// Invoke the agent with `request`, using `request.model` as the model.
    ///
    /// The timeout is one deadline covering both the wait for an admission
    /// permit and the run itself. The run is detached from the caller and
    /// enforces the deadline on its own task, so dropping the returned future
    /// does not stop it but it still ends by the deadline and frees its permit.
    pub async fn invoke(&self, request: AgentRequest) -> Result<AgentResult, AgentError> {
        let deadline = self.timeout.map(|limit| (Instant::now() + limit, limit));

        let permit = match &self.gate {
            Some(gate) => {
                let acquire = Arc::clone(gate).acquire_owned();
                let acquired = match deadline {
                    Some((at, limit)) => tokio::time::timeout_at(at, acquire).await.map_err(|_| {
                        tracing::warn!("Agent admission wait exceeded {:?}", limit);
                        AgentError::Timeout(limit)
                    })?,
                    None => acquire.await,
                };
                Some(acquired.map_err(|_| AgentError::Internal("Agent admission gate closed".to_string()))?)
            }
            None => None,
        };

        let agent = Arc::clone(&self.agent);
        let task = tokio::spawn(async move {
            let _permit = permit;
            let model = request.model.clone();
            let run = agent.run(&request, &model);
            match deadline {
                Some((at, limit)) => tokio::time::timeout_at(at, run).await.unwrap_or_else(|_| {
                    tracing::warn!("Agent run exceeded {:?}, cancelled", limit);
                    Err(AgentError::Timeout(limit))
                }),
                None => run.await,
            }
        });

        task.await.map_err(from_join_error)?
    }
}

fn from_join_error(err: JoinError) -> AgentError {
    if err.is_panic() {
        AgentError::Panicked(panic_message(&*err.into_panic()))
    } else {
        AgentError::Internal("Agent task was cancelled".to_string())
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn request(question: &str) -> AgentRequest {
        serde_json::from_value(json!({
            "item": {"question": question},
            "planning_port": 6001,
            "model": "test-model"
        }))
        .unwrap()
    }

    /// Records peak overlap of concurrent runs.
    struct Tracking {
        safe: bool,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Tracking {
        fn new(safe: bool) -> Self {
            Self {
                safe,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Agent for Tracking {
        async fn run(&self, request: &AgentRequest, model: &str) -> Result<AgentResult, AgentError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(AgentResult {
                question: request.question().unwrap_or_default().to_string(),
                answer: String::new(),
                messages: Vec::new(),
                prediction: model.to_string(),
                termination: termination::ANSWER.to_string(),
            })
        }

        fn concurrent_safe(&self) -> bool {
            self.safe
        }
    }

    /// Sleeps, then records that it got to the end.
    struct Sleepy {
        delay: Duration,
        finished: AtomicBool,
    }

    #[async_trait]
    impl Agent for Sleepy {
        async fn run(&self, _request: &AgentRequest, _model: &str) -> Result<AgentResult, AgentError> {
            tokio::time::sleep(self.delay).await;
            self.finished.store(true, Ordering::SeqCst);
            Err(AgentError::Internal("finished too late".to_string()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Agent for Panicking {
        async fn run(&self, _request: &AgentRequest, _model: &str) -> Result<AgentResult, AgentError> {
            panic!("reasoning loop exploded");
        }
    }

    #[tokio::test]
    async fn invoke_passes_request_model() {
        let handle = AgentHandle::new(Arc::new(Tracking::new(true)), &InvocationConfig::default());
        let result = handle.invoke(request("q")).await.unwrap();
        assert_eq!(result.question, "q");
        assert_eq!(result.prediction, "test-model");
    }

    #[tokio::test]
    async fn unlimited_policy_runs_in_parallel() {
        let agent = Arc::new(Tracking::new(true));
        let handle = AgentHandle::new(agent.clone(), &InvocationConfig::default());
        let calls = (0..4).map(|i| handle.invoke(request(&format!("q{}", i))));
        futures::future::join_all(calls).await;
        assert!(agent.peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn gate_of_one_serializes_calls() {
        let agent = Arc::new(Tracking::new(true));
        let policy = InvocationConfig {
            max_concurrency: Some(1),
            timeout: None,
        };
        let handle = AgentHandle::new(agent.clone(), &policy);
        let calls = (0..4).map(|i| handle.invoke(request(&format!("q{}", i))));
        let results = futures::future::join_all(calls).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(agent.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsafe_agent_is_serialized_regardless_of_policy() {
        let agent = Arc::new(Tracking::new(false));
        let handle = AgentHandle::new(agent.clone(), &InvocationConfig::default());
        let calls = (0..3).map(|i| handle.invoke(request(&format!("q{}", i))));
        futures::future::join_all(calls).await;
        assert_eq!(agent.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_aborts_the_run() {
        let policy = InvocationConfig {
            max_concurrency: None,
            timeout: Some(Duration::from_millis(5)),
        };
        let handle = AgentHandle::new(Arc::new(Tracking::new(true)), &policy);
        let err = handle.invoke(request("slow")).await.unwrap_err();
        assert_eq!(err.kind(), "AgentTimeout");
    }

    #[tokio::test]
    async fn panic_becomes_error() {
        let handle = AgentHandle::new(Arc::new(Panicking), &InvocationConfig::default());
        let err = handle.invoke(request("q")).await.unwrap_err();
        assert_eq!(err.kind(), "AgentPanicked");
        assert!(err.to_string().contains("reasoning loop exploded"));
    }

    #[tokio::test]
    async fn abandoned_call_is_still_cancelled_at_deadline() {
        let agent = Arc::new(Sleepy {
            delay: Duration::from_millis(300),
            finished: AtomicBool::new(false),
        });
        let policy = InvocationConfig {
            max_concurrency: Some(1),
            timeout: Some(Duration::from_millis(50)),
        };
        let handle = AgentHandle::new(agent.clone(), &policy);

        // Caller gives up long before the deadline; its future is dropped.
        let abandoned = tokio::time::timeout(Duration::from_millis(10), handle.invoke(request("q"))).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!agent.finished.load(Ordering::SeqCst));
        assert_eq!(handle.gate.as_ref().unwrap().available_permits(), 1);
    }

    #[tokio::test]
    async fn admission_wait_counts_against_timeout() {
        let policy = InvocationConfig {
            max_concurrency: Some(1),
            timeout: Some(Duration::from_millis(100)),
        };
        let handle = AgentHandle::new(Arc::new(Tracking::new(true)), &policy);

        let started = std::time::Instant::now();
        let calls = (0..10).map(|i| handle.invoke(request(&format!("q{}", i))));
        let results = futures::future::join_all(calls).await;
        let elapsed = started.elapsed();

        assert!(results[0].is_ok());
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(e) if e.kind() == "AgentTimeout")));
        // Ten serialized 30ms runs would take 300ms without a shared deadline.
        assert!(elapsed < Duration::from_millis(250), "took {:?}", elapsed);
    }
}
