//! Threaded generation of pending certificates for one event.
//!
//! [`GenerationPipeline::run`] claims every pending participant, loads them
//! into a bounded queue sized exactly to the batch, closes the queue and lets
//! a fixed pool of worker threads drain it. The call returns once every worker
//! has exited, so a run is synchronous from the caller's point of view.
//!
//! Each job either completes (artifact written, fingerprint persisted) or
//! leaves its participant pending for a later run. Individual failures never
//! abort the batch.
//!
//! ## Structure
//!
//! - [`worker`] - the per-thread loop and the per-job algorithm.

mod worker;

use core::time::Duration;
use crossbeam_channel as channel;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::cipher::PiiCipher;
use crate::domain::{EventId, Participant};
use crate::error::{Error, Result};
use crate::render::DocumentRenderer;
use crate::signer::IntegritySigner;
use crate::store::ParticipantStore;
use crate::time::{SystemClock, TimeSource};

/// Default number of worker threads.
pub const DEFAULT_WORKERS: usize = 10;

/// Default lifetime of an issued QR token.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default upper bound on a single render call.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Tunables of a generation run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Size of the worker pool. Must be greater than zero.
    pub workers: usize,
    /// Root directory of the artifacts. Each event writes into its own
    /// subdirectory, created on demand.
    pub output_dir: PathBuf,
    /// Leading component of every certificate id.
    pub certificate_prefix: String,
    /// Token lifetime, added to the generation time to get its expiration.
    pub validity: Duration,
    /// Deadline for one render call; `None` waits indefinitely.
    pub render_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            output_dir: PathBuf::from("./storage/certificates"),
            certificate_prefix: String::from("CERT"),
            validity: DEFAULT_VALIDITY,
            render_timeout: Some(DEFAULT_RENDER_TIMEOUT),
        }
    }
}

impl PipelineConfig {
    /// Directory holding the artifacts of `event_id`.
    pub fn event_dir(&self, event_id: EventId) -> PathBuf {
        self.output_dir.join(event_id.to_string())
    }
}

/// Outcome counts of one run.
///
/// Failures are per participant: each counted participant is still pending
/// and will be claimed again by the next run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationSummary {
    /// Participants found pending when the run started.
    pub claimed: usize,
    /// Artifacts written and recorded.
    pub completed: usize,
    /// Identifiers that failed to decrypt.
    pub crypto_failures: usize,
    /// Documents that could not be rendered or written.
    pub render_failures: usize,
    /// Artifacts written whose completion could not be recorded.
    pub store_failures: usize,
}

impl GenerationSummary {
    pub fn skipped(&self) -> usize {
        self.crypto_failures + self.render_failures + self.store_failures
    }
}

/// Result of one job, reduced into a [`GenerationSummary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    Completed,
    CryptoFailed,
    RenderFailed,
    StoreFailed,
}

#[derive(Default)]
pub(crate) struct Tally {
    completed: AtomicUsize,
    crypto_failures: AtomicUsize,
    render_failures: AtomicUsize,
    store_failures: AtomicUsize,
}

impl Tally {
    pub(crate) fn record(&self, outcome: JobOutcome) {
        let counter = match outcome {
            JobOutcome::Completed => &self.completed,
            JobOutcome::CryptoFailed => &self.crypto_failures,
            JobOutcome::RenderFailed => &self.render_failures,
            JobOutcome::StoreFailed => &self.store_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn summarize(self, claimed: usize) -> GenerationSummary {
        GenerationSummary {
            claimed,
            completed: self.completed.into_inner(),
            crypto_failures: self.crypto_failures.into_inner(),
            render_failures: self.render_failures.into_inner(),
            store_failures: self.store_failures.into_inner(),
        }
    }
}

/// Turns pending participants into signed, fingerprinted artifacts.
pub struct GenerationPipeline<S, R, T = SystemClock> {
    store: S,
    cipher: PiiCipher,
    signer: IntegritySigner,
    renderer: Arc<R>,
    clock: T,
    config: PipelineConfig,
}

impl<S, R> GenerationPipeline<S, R, SystemClock>
where
    S: ParticipantStore,
    R: DocumentRenderer + 'static,
{
    pub fn new(
        store: S,
        cipher: PiiCipher,
        signer: IntegritySigner,
        renderer: Arc<R>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            cipher,
            signer,
            renderer,
            clock: SystemClock,
            config,
        }
    }
}

impl<S, R, T> GenerationPipeline<S, R, T>
where
    S: ParticipantStore,
    R: DocumentRenderer + 'static,
    T: TimeSource,
{
    /// Replaces the clock used for issuance timestamps.
    pub fn with_clock<U: TimeSource>(self, clock: U) -> GenerationPipeline<S, R, U> {
        GenerationPipeline {
            store: self.store,
            cipher: self.cipher,
            signer: self.signer,
            renderer: self.renderer,
            clock,
            config: self.config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generates certificates for every pending participant of `event_id`.
    ///
    /// Blocks until all claimed jobs are finished.
    ///
    /// # Errors
    ///
    /// Only batch-scope failures are returned: an invalid configuration, an
    /// unknown event, a failed claim, or an output directory that cannot be
    /// created. Per-participant failures are logged and counted in the
    /// returned [`GenerationSummary`].
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn run(&self, event_id: EventId) -> Result<GenerationSummary> {
        if self.config.workers == 0 {
            return Err(Error::validation("worker pool size must be greater than 0"));
        }

        let event = self
            .store
            .event(event_id)?
            .ok_or_else(|| Error::validation(format!("event {event_id} does not exist")))?;
        let pending = self.store.claim_pending(event_id)?;
        let claimed = pending.len();

        if claimed == 0 {
            #[cfg(feature = "tracing")]
            tracing::info!("Nothing to do: no pending certificates for '{}'", event.name);
            return Ok(GenerationSummary::default());
        }

        std::fs::create_dir_all(self.config.event_dir(event.id))?;

        let workers = self.config.workers.min(claimed);
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Generating {claimed} certificates for '{}' with {workers} workers",
            event.name
        );

        let (tx, rx) = channel::bounded::<Participant>(claimed);
        for participant in pending {
            // Capacity equals the batch and `rx` is alive, so this never blocks.
            if tx.send(participant).is_err() {
                return Err(Error::validation("job queue closed while loading"));
            }
        }
        drop(tx);

        let tally = Tally::default();
        thread::scope(|s| {
            for worker_id in 0..workers {
                let jobs = rx.clone();
                let event = &event;
                let tally = &tally;
                s.spawn(move || self.worker_loop(worker_id, event, jobs, tally));
            }
        });

        let summary = tally.summarize(claimed);
        #[cfg(feature = "tracing")]
        tracing::info!(
            completed = summary.completed,
            skipped = summary.skipped(),
            "Certificate generation finished for '{}'",
            event.name
        );
        Ok(summary)
    }
}
