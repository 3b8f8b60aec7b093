//! One watch -> filter -> controller -> reconciler chain per source kind.

use super::controller::{run_controller, ControllerContext, RetryBudget};
use super::events::EventRecorder;
use super::filter::ChangeFilter;
use super::patch::FinalizerPatcher;
use super::precedence::SourcePrecedence;
use super::reconciler::Reconciler;
use super::trigger::{self, CachedObjectTrigger, KeyTrigger, ReconcileTrigger};
use super::watch::{run_watch, EventSink};
use super::OperatorContext;
use crate::adapter::SchemaAdapter;
use kube::runtime::reflector::{self, Store};
use kube::Api;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct Pipeline<A: SchemaAdapter> {
    reader: Store<A::Source>,
    trigger: ReconcileTrigger<A::Source>,
    triggers: mpsc::UnboundedReceiver<A::Source>,
    sink: EventSink<A>,
    reconciler: Reconciler<A>,
    retries: RetryBudget,
    num_threads: usize,
}

impl<A: SchemaAdapter> Pipeline<A> {
    pub fn new(context: &OperatorContext, adapter: A, patcher: Arc<dyn FinalizerPatcher>) -> Self {
        let config = &context.config;
        let adapter = Arc::new(adapter);
        let (reader, writer) = reflector::store::<A::Source>();
        let (trigger, triggers) = trigger::channel();

        let recorder: Arc<dyn EventRecorder> = Arc::clone(&context.recorder);
        let filter = Arc::new(ChangeFilter::new(
            Arc::clone(&adapter),
            trigger.clone(),
            recorder,
            config.cloud_provider.clone(),
        ));
        let reconciler = Reconciler::new(
            adapter,
            Arc::new(reader.clone()),
            patcher,
            Arc::clone(&context.delegates),
            config.ingress_class.clone(),
        );

        Self {
            reader,
            trigger,
            triggers,
            sink: EventSink::new(writer, filter),
            reconciler,
            retries: RetryBudget::new(&config.backoff, config.max_num_requeues),
            num_threads: config.num_threads,
        }
    }

    #[must_use]
    pub fn with_precedence(mut self, precedence: Arc<dyn SourcePrecedence>) -> Self {
        self.reconciler = self.reconciler.with_precedence(precedence);
        self
    }

    /// Tell `sibling` whenever a key appears in or leaves this kind's cache.
    #[must_use]
    pub fn with_sibling(mut self, sibling: Arc<dyn KeyTrigger>) -> Self {
        self.sink = self.sink.with_sibling(sibling);
        self
    }

    /// Cache of this kind, filled by the watch
    pub fn store(&self) -> Store<A::Source> {
        self.reader.clone()
    }

    /// Re-triggers this kind's object at a key, for use as another pipeline's sibling
    pub fn retrigger(&self) -> Arc<dyn KeyTrigger> {
        Arc::new(CachedObjectTrigger::new(
            self.reader.clone(),
            self.trigger.clone(),
        ))
    }

    /// Run the watch and the controller until `shutdown` fires, then let
    /// in-flight reconciles finish.
    pub async fn run(self, api: Api<A::Source>, shutdown: CancellationToken) {
        info!(
            kind = A::KIND,
            threads = self.num_threads,
            "Starting pipeline"
        );

        let context = Arc::new(ControllerContext::new(self.reconciler, self.retries));
        let controller = tokio::spawn(run_controller(
            self.reader,
            self.triggers,
            context,
            self.num_threads,
            shutdown.clone(),
        ));

        run_watch(api, self.sink, shutdown).await;

        if let Err(e) = controller.await {
            error!(kind = A::KIND, error = %e, "Controller task failed");
        }
        info!(kind = A::KIND, "Pipeline stopped");
    }
}
