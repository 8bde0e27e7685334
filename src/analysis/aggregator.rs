//! Concurrent evidence collection.
//!
//! Every enabled adapter runs as its own task. The aggregator waits for all
//! of them (never short-circuiting on a failure) up to a global deadline;
//! whatever is still outstanding then is recorded as unavailable.

use crate::error::panic_message;
use crate::models::{AnalysisRequest, EvidenceBundle, ResolvedEntity, SourceResult, SourceStatus};
use crate::sources::SourceAdapter;
use futures::FutureExt;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Fans out to the configured adapters and merges their results.
pub struct EvidenceAggregator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    deadline: Duration,
}

impl EvidenceAggregator {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, deadline: Duration) -> Self {
        Self { adapters, deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Names of the adapters enabled for `request`.
    pub fn enabled_sources(&self, request: &AnalysisRequest) -> Vec<&'static str> {
        self.adapters
            .iter()
            .filter(|a| a.is_enabled(request))
            .map(|a| a.name())
            .collect()
    }

    /// Collect evidence from every enabled adapter.
    ///
    /// Returns within the collection deadline even if adapters hang; the
    /// bundle always holds exactly one result per enabled adapter.
    pub async fn collect(
        &self,
        gene: &ResolvedEntity,
        disease: &ResolvedEntity,
        request: &AnalysisRequest,
    ) -> EvidenceBundle {
        let gene = Arc::new(gene.clone());
        let disease = Arc::new(disease.clone());
        let request = Arc::new(request.clone());

        let mut tasks = JoinSet::new();
        let mut outstanding: BTreeSet<&'static str> = BTreeSet::new();

        for adapter in &self.adapters {
            let name = adapter.name();
            if !adapter.is_enabled(&request) {
                debug!("{}: disabled for this request", name);
                continue;
            }
            outstanding.insert(name);

            let adapter = Arc::clone(adapter);
            let (gene, disease, request) = (gene.clone(), disease.clone(), request.clone());
            tasks.spawn(async move {
                let fetch = adapter.fetch(&gene, &disease, &request);
                let result = AssertUnwindSafe(fetch)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        SourceResult::unavailable(
                            name,
                            format!("adapter panicked: {}", panic_message(panic.as_ref())),
                        )
                    });
                (name, result)
            });
        }

        info!(
            "Collecting evidence from {} source(s) (deadline {:?})",
            outstanding.len(),
            self.deadline
        );

        let mut bundle = EvidenceBundle::new();
        let deadline = Instant::now() + self.deadline;
        let mut timed_out = false;

        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((name, result)))) => {
                    outstanding.remove(name);
                    bundle.insert(result);
                }
                Ok(Some(Err(err))) => warn!("Evidence task ended abnormally: {}", err),
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    tasks.abort_all();
                    break;
                }
            }
        }

        for name in outstanding {
            let reason = if timed_out {
                format!("timed out: no result within the {:?} collection deadline", self.deadline)
            } else {
                "adapter task ended without a result".to_string()
            };
            warn!("{}: {}", name, reason);
            bundle.insert(SourceResult::unavailable(name, reason));
        }

        info!(
            "Evidence collected: {} ok, {} partial, {} unavailable",
            bundle.count(SourceStatus::Ok),
            bundle.count(SourceStatus::Partial),
            bundle.count(SourceStatus::Unavailable)
        );
        bundle
    }
}
