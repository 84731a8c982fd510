use crate::{
    adapters::ProtocolAdapter,
    classifier::{Windows, classify},
    config::{EnvoyConfig, TimeoutConfig},
    errors::{BranchFailure, FetchError, Stage, StoreError},
    messages,
    models::RawRecord,
    normalizer::{NormalizedBatch, Normalizer},
    notifier::{Channel, Notifier},
    proposal::{Proposal, ProposalKey, Protocol},
    store::Store,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashSet},
    future::Future,
    sync::Arc,
    time::Duration,
};
use tokio::{sync::watch, time::timeout};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Default)]
pub struct OrchestratorSettings {
    pub windows: Windows,
    pub timeouts: TimeoutConfig,
    pub notify_expiring_each_cycle: bool,
}

impl From<&EnvoyConfig> for OrchestratorSettings {
    fn from(config: &EnvoyConfig) -> Self {
        Self {
            windows: config.windows,
            timeouts: config.timeouts.clone(),
            notify_expiring_each_cycle: config.notify_expiring_each_cycle,
        }
    }
}

/// Outcome of one cycle. Every protocol with an adapter lands in exactly one of
/// `new`/`expiring` (success) or `errors` (failure).
#[derive(Debug, Default, Serialize)]
pub struct CycleReport {
    pub new: BTreeMap<Protocol, Vec<Proposal>>,
    pub expiring: BTreeMap<Protocol, Vec<Proposal>>,
    pub errors: BTreeMap<Protocol, String>,
    pub rejected: BTreeMap<Protocol, Vec<String>>,
}

enum BranchOutcome {
    Done {
        new: Vec<Proposal>,
        expiring: Vec<Proposal>,
        rejected: Vec<String>,
    },
    Failed {
        failure: BranchFailure,
        rejected: Vec<String>,
    },
}

pub struct Orchestrator {
    adapters: Vec<Arc<dyn ProtocolAdapter>>,
    normalizer: Normalizer,
    store: Option<Arc<dyn Store>>,
    notifier: Arc<dyn Notifier>,
    settings: OrchestratorSettings,
    shutdown: watch::Receiver<bool>,
}

impl Orchestrator {
    pub fn new(
        adapters: Vec<Arc<dyn ProtocolAdapter>>,
        normalizer: Normalizer,
        notifier: Arc<dyn Notifier>,
        settings: OrchestratorSettings,
    ) -> Self {
        let (_, shutdown) = watch::channel(false);
        Self {
            adapters,
            normalizer,
            store: None,
            notifier,
            settings,
            shutdown,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Protocols with at least one adapter, in declaration order.
    pub fn protocols(&self) -> Vec<Protocol> {
        Protocol::ALL
            .into_iter()
            .filter(|p| self.adapters.iter().any(|a| a.protocol() == *p))
            .collect()
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub async fn run_cycle(&self) -> CycleReport {
        self.run_cycle_at(Utc::now()).await
    }

    /// Runs every protocol branch concurrently; a failing branch never affects the others.
    #[instrument(skip(self, now), fields(now = %now))]
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> CycleReport {
        let protocols = self.protocols();
        let outcomes = join_all(
            protocols
                .iter()
                .map(|&protocol| async move { (protocol, self.run_branch(protocol, now).await) }),
        )
        .await;

        let mut report = CycleReport::default();
        for (protocol, outcome) in outcomes {
            match outcome {
                BranchOutcome::Done {
                    new,
                    expiring,
                    rejected,
                } => {
                    info!(
                        %protocol,
                        new = new.len(),
                        expiring = expiring.len(),
                        rejected = rejected.len(),
                        "Branch completed"
                    );
                    report.new.insert(protocol, new);
                    report.expiring.insert(protocol, expiring);
                    if !rejected.is_empty() {
                        report.rejected.insert(protocol, rejected);
                    }
                }
                BranchOutcome::Failed { failure, rejected } => {
                    error!(%protocol, error = %failure, "Branch failed");
                    self.report_failure(protocol, &failure).await;
                    report.errors.insert(protocol, failure.to_string());
                    if !rejected.is_empty() {
                        report.rejected.insert(protocol, rejected);
                    }
                }
            }
        }

        info!(
            succeeded = report.new.len(),
            failed = report.errors.len(),
            "Cycle finished"
        );
        report
    }

    /// Fetching and normalizing only: no persistence, no notifications.
    #[instrument(skip(self), fields(protocol = %protocol))]
    pub async fn fetch_protocol(&self, protocol: Protocol) -> Result<NormalizedBatch, BranchFailure> {
        let adapters: Vec<_> = self
            .adapters
            .iter()
            .filter(|a| a.protocol() == protocol)
            .collect();

        let fetch_timeout = self.settings.timeouts.fetch;
        let results = join_all(
            adapters
                .iter()
                .map(|adapter| with_timeout(Stage::Fetch, fetch_timeout, adapter.fetch_raw())),
        )
        .await;

        let mut raws: Vec<RawRecord> = Vec::new();
        for result in results {
            let records: Result<Vec<RawRecord>, FetchError> = result?;
            raws.extend(records?);
        }

        let batch = self.normalizer.normalize_batch(&raws);
        debug!(
            raw = raws.len(),
            normalized = batch.proposals.len(),
            rejected = batch.rejected.len(),
            "Normalized batch"
        );
        Ok(batch)
    }

    #[instrument(skip(self, now), fields(protocol = %protocol))]
    async fn run_branch(&self, protocol: Protocol, now: DateTime<Utc>) -> BranchOutcome {
        let batch = match self.fetch_protocol(protocol).await {
            Ok(batch) => batch,
            Err(failure) => {
                return BranchOutcome::Failed {
                    failure,
                    rejected: Vec::new(),
                };
            }
        };
        let NormalizedBatch {
            proposals,
            rejected,
        } = batch;

        if self.is_shutting_down() {
            warn!("Shutdown requested, skipping persistence");
            return BranchOutcome::Failed {
                failure: BranchFailure::Cancelled,
                rejected,
            };
        }

        let snapshot = self.snapshot(protocol).await;
        let classification = classify(&proposals, snapshot.as_ref(), now, &self.settings.windows);

        let new = match self.persist_and_notify(protocol, classification.new_items).await {
            Ok(new) => new,
            Err(failure) => return BranchOutcome::Failed { failure, rejected },
        };

        if self.settings.notify_expiring_each_cycle && !classification.expiring_items.is_empty() {
            let digest = messages::expiring_digest(&classification.expiring_items);
            self.deliver(&Channel::Protocol(protocol), &digest).await;
        }

        BranchOutcome::Done {
            new,
            expiring: classification.expiring_items,
            rejected,
        }
    }

    /// Keys already recorded for `protocol`, or `None` to use the temporal fallback.
    async fn snapshot(&self, protocol: Protocol) -> Option<HashSet<ProposalKey>> {
        let store = self.store.as_ref()?;
        let limit = self.settings.timeouts.store;
        let reason = match with_timeout(Stage::Store, limit, store.known_keys(protocol)).await {
            Ok(Ok(keys)) => return Some(keys),
            Ok(Err(err)) => err.to_string(),
            Err(err) => err.to_string(),
        };
        warn!(%protocol, error = %reason, "Snapshot unavailable, using temporal fallback");
        None
    }

    /// Records each new proposal, then announces it. Returns the proposals that were
    /// actually recorded in this call.
    async fn persist_and_notify(
        &self,
        protocol: Protocol,
        candidates: Vec<Proposal>,
    ) -> Result<Vec<Proposal>, BranchFailure> {
        let channel = Channel::Protocol(protocol);
        let mut recorded = Vec::with_capacity(candidates.len());

        for proposal in candidates {
            if let Some(store) = &self.store {
                match with_timeout(Stage::Store, self.settings.timeouts.store, store.upsert(&proposal))
                    .await?
                {
                    Ok(()) => {}
                    Err(StoreError::ConstraintViolation { key }) => {
                        debug!(%key, "Already recorded, not notifying");
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            if recorded.is_empty() && protocol == Protocol::Arbitrum {
                self.deliver(&channel, messages::NEW_PROPOSALS_HEADER).await;
            }
            self.deliver(&channel, &messages::proposal_message(&proposal))
                .await;
            recorded.push(proposal);
        }

        Ok(recorded)
    }

    /// Sends a message; failures are logged and echoed to diagnostics, never propagated.
    async fn deliver(&self, channel: &Channel, message: &str) {
        let result = with_timeout(
            Stage::Notify,
            self.settings.timeouts.notify,
            self.notifier.send(channel, message),
        )
        .await;

        let reason = match result {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(err) => err.to_string(),
        };

        warn!(%channel, error = %reason, "Notification not delivered");
        if *channel != Channel::Diagnostics {
            self.send_diagnostics(&channel.to_string(), &reason).await;
        }
    }

    async fn send_diagnostics(&self, origin: &str, error: &str) {
        let message = messages::error_message(origin, Utc::now(), error);
        let result = with_timeout(
            Stage::Notify,
            self.settings.timeouts.notify,
            self.notifier.send(&Channel::Diagnostics, &message),
        )
        .await;

        let reason = match result {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(err) => err.to_string(),
        };
        warn!(error = %reason, "Diagnostics message not delivered");
    }

    /// Reports a failed branch to the diagnostics channel.
    pub async fn report_failure(&self, protocol: Protocol, failure: &BranchFailure) {
        let origin = match failure {
            BranchFailure::Fetch(err) => err.origin().to_string(),
            _ => protocol.to_string(),
        };
        self.send_diagnostics(&origin, &failure.to_string()).await;
    }

    /// Recorded proposals expiring within the expiry window from `now`.
    pub async fn stored_expiring(&self, now: DateTime<Utc>) -> Result<Vec<Proposal>, BranchFailure> {
        let Some(store) = &self.store else {
            return Ok(Vec::new());
        };
        let end = now + self.settings.windows.expiry_window;
        let found = with_timeout(
            Stage::Store,
            self.settings.timeouts.store,
            store.find_expiring_between(now, end),
        )
        .await??;
        Ok(found)
    }

    /// Sends one reminder per protocol listing its soon-to-expire recorded proposals.
    #[instrument(skip(self))]
    pub async fn send_expiring_digest(
        &self,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<Protocol, Vec<Proposal>>, BranchFailure> {
        if self.store.is_none() {
            warn!("No store configured, skipping expiring digest");
            return Ok(BTreeMap::new());
        }

        let mut grouped: BTreeMap<Protocol, Vec<Proposal>> = BTreeMap::new();
        for proposal in self.stored_expiring(now).await? {
            grouped.entry(proposal.protocol).or_default().push(proposal);
        }

        for (protocol, proposals) in &grouped {
            info!(%protocol, count = proposals.len(), "Sending expiring digest");
            self.deliver(
                &Channel::Protocol(*protocol),
                &messages::expiring_digest(proposals),
            )
            .await;
        }
        Ok(grouped)
    }
}

async fn with_timeout<F, T>(stage: Stage, limit: Duration, future: F) -> Result<T, BranchFailure>
where
    F: Future<Output = T>,
{
    timeout(limit, future)
        .await
        .map_err(|_| BranchFailure::Timeout {
            stage,
            seconds: limit.as_secs(),
        })
}
