//! Node runtime wiring the ballot engine to its observers

use agora_ballot::{
    create_event_channel, BallotEngine, BallotEvent, BallotManifest, EventRecord,
    ManifestLoader, SharedBallot,
};
use agora_core::{Address, AgoraResult, NodeConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

const OBSERVER_CATCH_UP_INTERVAL: Duration = Duration::from_millis(200);

/// Node runtime managing the ballot and its event stream
pub struct NodeRuntime {
    config: NodeConfig,
    ballot: SharedBallot,
    event_rx: Mutex<Option<mpsc::Receiver<EventRecord>>>,
    observed: Arc<AtomicU64>,
}

impl NodeRuntime {
    /// Create a new node runtime for a ballot administered by `owner`
    pub fn new(config: NodeConfig, owner: Address) -> Self {
        let (event_tx, event_rx) = create_event_channel(config.ballot.event_channel_capacity);

        let mut engine = BallotEngine::new(owner, config.ballot.clone());
        engine.set_event_channel(event_tx);

        Self {
            config,
            ballot: Arc::new(engine),
            event_rx: Mutex::new(Some(event_rx)),
            observed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register the manifest's voters
    pub fn apply_manifest(&self, manifest: BallotManifest) -> AgoraResult<usize> {
        ManifestLoader::new(self.ballot.clone(), manifest).apply()
    }

    /// Spawn the task that logs every ballot event. Only the first call
    /// gets the event stream; later calls return `None`.
    ///
    /// Records reach the observer from the ballot's event log. Channel
    /// records only wake it up, so events committed before the observer
    /// started, or dropped by a full channel, are still logged in order.
    pub fn spawn_event_observer(&self) -> Option<JoinHandle<()>> {
        let mut rx = self.event_rx.lock().take()?;
        let observer = EventObserver {
            ballot: self.ballot.clone(),
            last_seen: self.observed.clone(),
        };

        Some(tokio::spawn(async move {
            // Picks up records dropped after the last one the channel delivered
            let mut ticker = interval(OBSERVER_CATCH_UP_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(record) if record.sequence <= observer.last_seen() => {}
                        Some(_) => observer.catch_up(),
                        None => break,
                    },
                    _ = ticker.tick() => observer.catch_up(),
                }
            }

            observer.catch_up();
            info!("Ballot event stream closed");
        }))
    }

    /// Sequence number of the last event the observer has logged
    pub fn last_observed_sequence(&self) -> u64 {
        self.observed.load(Ordering::Acquire)
    }

    /// Get ballot reference
    pub fn ballot(&self) -> &SharedBallot {
        &self.ballot
    }

    /// Get config reference
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}

struct EventObserver {
    ballot: SharedBallot,
    last_seen: Arc<AtomicU64>,
}

impl EventObserver {
    fn last_seen(&self) -> u64 {
        self.last_seen.load(Ordering::Acquire)
    }

    /// Log every record committed after the last one seen
    fn catch_up(&self) {
        for record in self.ballot.events_since(self.last_seen()) {
            log_event(&record);
            self.last_seen.store(record.sequence, Ordering::Release);
        }
    }
}

fn log_event(record: &EventRecord) {
    match &record.event {
        BallotEvent::VoterRegistered { voter_address } => {
            info!(seq = record.sequence, "VoterRegistered voter={}", voter_address)
        }
        BallotEvent::ProposalRegistered { proposal_id } => {
            info!(seq = record.sequence, "ProposalRegistered proposal={}", proposal_id)
        }
        BallotEvent::Voted { voter, proposal_id } => {
            info!(seq = record.sequence, "Voted voter={} proposal={}", voter, proposal_id)
        }
        BallotEvent::WorkflowStatusChange {
            previous_status,
            new_status,
        } => info!(
            seq = record.sequence,
            "WorkflowStatusChange {}({}) -> {}({})",
            previous_status,
            previous_status.code(),
            new_status,
            new_status.code()
        ),
    }
}
