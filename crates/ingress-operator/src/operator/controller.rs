//! Runs a [`Reconciler`] on top of `kube::runtime::Controller`.
//!
//! The controller collapses repeated triggers for an object and never runs
//! two reconciles of the same object at once. Retry accounting is ours: a key
//! that keeps failing is requeued with backoff until its [`RetryBudget`] runs
//! out, then waits for the next real change.

use super::config::BackoffConfig;
use super::reconciler::Reconciler;
use super::trigger;
use super::types::{Error, ObjectKey, Result};
use crate::adapter::SchemaAdapter;
use futures::StreamExt;
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::reflector::Store;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Per-key failure counts and the backoff derived from them
pub struct RetryBudget {
    base_delay: Duration,
    max_delay: Duration,
    max_num_requeues: u32,
    failures: Mutex<HashMap<String, u32>>,
}

impl RetryBudget {
    pub fn new(backoff: &BackoffConfig, max_num_requeues: u32) -> Self {
        Self {
            base_delay: backoff.base_delay(),
            max_delay: backoff.max_delay(),
            max_num_requeues,
            failures: Mutex::new(HashMap::new()),
        }
    }

    fn failures(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a failed pass of `key` and return the delay before the next one.
    /// `None` once the key has used all its requeues; its history is cleared.
    pub fn record_failure(&self, key: &str) -> Option<Duration> {
        let mut failures = self.failures();
        let count = failures.entry(key.to_string()).or_insert(0);
        if *count >= self.max_num_requeues {
            failures.remove(key);
            return None;
        }
        *count += 1;
        Some(backoff_delay(self.base_delay, self.max_delay, *count))
    }

    pub fn forget(&self, key: &str) {
        self.failures().remove(key);
    }

    pub fn num_requeues(&self, key: &str) -> u32 {
        self.failures().get(key).copied().unwrap_or(0)
    }
}

/// `base * 2^(failures - 1)`, capped at `max`
pub fn backoff_delay(base: Duration, max: Duration, failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1);
    base.saturating_mul(2u32.saturating_pow(exponent)).min(max)
}

/// State shared by every reconcile of one kind
pub struct ControllerContext<A: SchemaAdapter> {
    pub reconciler: Reconciler<A>,
    pub retries: RetryBudget,
}

impl<A: SchemaAdapter> ControllerContext<A> {
    pub fn new(reconciler: Reconciler<A>, retries: RetryBudget) -> Self {
        Self {
            reconciler,
            retries,
        }
    }
}

async fn reconcile_object<A: SchemaAdapter>(
    obj: Arc<A::Source>,
    ctx: Arc<ControllerContext<A>>,
) -> Result<Action> {
    let key = ObjectKey::for_resource(obj.as_ref())?.to_string();
    ctx.reconciler.reconcile(&key).await?;
    ctx.retries.forget(&key);
    Ok(Action::await_change())
}

fn error_policy<A: SchemaAdapter>(
    obj: Arc<A::Source>,
    err: &Error,
    ctx: Arc<ControllerContext<A>>,
) -> Action {
    let Ok(key) = ObjectKey::for_resource(obj.as_ref()) else {
        return Action::await_change();
    };
    let key = key.to_string();

    match ctx.retries.record_failure(&key) {
        Some(delay) => {
            warn!(kind = A::KIND, %key, error = %err, ?delay, "Error syncing key, retrying");
            Action::requeue(delay)
        }
        None => {
            error!(
                kind = A::KIND,
                %key,
                error = %err,
                max_requeues = ctx.retries.max_num_requeues,
                "Dropping key after repeated failures"
            );
            Action::await_change()
        }
    }
}

/// Reconcile every object sent through `triggers` with `num_threads`
/// concurrent reconciles, until `shutdown` fires. In-flight reconciles finish
/// before this returns.
pub async fn run_controller<A: SchemaAdapter>(
    reader: Store<A::Source>,
    triggers: mpsc::UnboundedReceiver<A::Source>,
    context: Arc<ControllerContext<A>>,
    num_threads: usize,
    shutdown: CancellationToken,
) {
    let concurrency = u16::try_from(num_threads).unwrap_or(u16::MAX);
    let triggers = trigger::into_stream(triggers).take_until(shutdown.cancelled_owned());
    let results_ctx = Arc::clone(&context);

    Controller::for_stream(triggers, reader)
        .with_config(controller::Config::default().concurrency(concurrency))
        .run(reconcile_object::<A>, error_policy::<A>, context)
        .for_each(|result| {
            let ctx = Arc::clone(&results_ctx);
            async move {
                match result {
                    Ok((object, _)) => debug!(kind = A::KIND, %object, "Reconciled"),
                    Err(controller::Error::ObjectNotFound(object)) => {
                        debug!(kind = A::KIND, %object, "Object no longer exists");
                        ctx.retries.forget(&ObjectKey::from(&object).to_string());
                    }
                    // Already reported by the error policy.
                    Err(controller::Error::ReconcilerFailed(_, _)) => {}
                    Err(e) => error!(kind = A::KIND, error = ?e, "Controller error"),
                }
            }
        })
        .await;

    debug!(kind = A::KIND, "Controller stopped");
}
