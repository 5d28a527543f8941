use core::time::Duration;
use crossbeam_channel::{self as channel, Receiver, RecvTimeoutError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use super::{GenerationPipeline, JobOutcome, Tally};
use crate::domain::{Event, Fingerprint, Participant};
use crate::error::RenderError;
use crate::render::{
    CertificateFields, DocumentRenderer, QrImage, RenderRequest, artifact_file_name,
    mask_identifier,
};
use crate::signer::QrToken;
use crate::store::ParticipantStore;
use crate::time::{TimeSource, unix_nanos};

/// Human-readable issue date printed on the certificate.
const ISSUED_ON_FORMAT: &str = "%d %B %Y";

impl<S, R, T> GenerationPipeline<S, R, T>
where
    S: ParticipantStore,
    R: DocumentRenderer + 'static,
    T: TimeSource,
{
    /// Drains `jobs` until the queue is empty and closed.
    ///
    /// The queue is fully loaded and its sender dropped before any worker
    /// starts, so an empty, disconnected receiver means the batch is done.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub(super) fn worker_loop(
        &self,
        worker_id: usize,
        event: &Event,
        jobs: Receiver<Participant>,
        tally: &Tally,
    ) {
        #[cfg(feature = "tracing")]
        tracing::trace!("Worker {worker_id} started");

        for participant in jobs.iter() {
            let outcome = self.process(event, &participant);
            tally.record(outcome);
        }

        #[cfg(feature = "tracing")]
        tracing::trace!("Worker {worker_id} stopped");
    }

    /// Runs one participant through decrypt, sign, render, write and record.
    ///
    /// Any failure leaves the participant pending.
    fn process(&self, event: &Event, participant: &Participant) -> JobOutcome {
        let identifier = match self.cipher.decrypt(&participant.encrypted_identifier) {
            Ok(identifier) => identifier,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    participant = %participant.id,
                    "Skipping participant, identifier did not decrypt: {_e}"
                );
                return JobOutcome::CryptoFailed;
            }
        };

        let now = self.clock.now();
        let certificate_id = format!(
            "{}-{}-{}-{}",
            self.config.certificate_prefix,
            event.id,
            participant.id,
            unix_nanos(now)
        );
        let validity = i64::try_from(self.config.validity.as_secs()).unwrap_or(i64::MAX);
        let expires_at = now.timestamp().saturating_add(validity);
        let token = QrToken::issue(
            &self.signer,
            certificate_id.as_str(),
            identifier.as_str(),
            expires_at,
        );

        let bytes = match self.build_artifact(event, participant, &identifier, &token, now) {
            Ok(bytes) => bytes,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    participant = %participant.id,
                    certificate = %certificate_id,
                    "Skipping participant, rendering failed: {_e}"
                );
                return JobOutcome::RenderFailed;
            }
        };

        let path = self.config.event_dir(event.id).join(artifact_file_name(
            &identifier,
            participant.id,
            self.renderer.extension(),
        ));
        if let Err(_e) = std::fs::write(&path, &bytes) {
            #[cfg(feature = "tracing")]
            tracing::error!(
                participant = %participant.id,
                path = %path.display(),
                "Skipping participant, artifact write failed: {_e}"
            );
            return JobOutcome::RenderFailed;
        }

        let fingerprint = Fingerprint::of(&bytes);
        match self.store.mark_completed(participant.id, &fingerprint) {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    participant = %participant.id,
                    certificate = %certificate_id,
                    %fingerprint,
                    "Certificate generated"
                );
                JobOutcome::Completed
            }
            Err(_e) => {
                // The file stays on disk; the next run overwrites it.
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    participant = %participant.id,
                    path = %path.display(),
                    "Artifact written but completion not recorded: {_e}"
                );
                JobOutcome::StoreFailed
            }
        }
    }

    fn build_artifact(
        &self,
        event: &Event,
        participant: &Participant,
        identifier: &str,
        token: &QrToken,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<u8>, RenderError> {
        let qr = QrImage::encode(&token.encode())?;
        let request = RenderRequest {
            fields: CertificateFields {
                full_name: participant.full_name.clone(),
                masked_identifier: mask_identifier(identifier),
                event_name: event.name.clone(),
                certificate_id: token.certificate_id.clone(),
                issued_on: now.format(ISSUED_ON_FORMAT).to_string(),
            },
            qr,
        };
        match self.config.render_timeout {
            Some(deadline) => render_with_deadline(&self.renderer, request, deadline),
            None => render_in_place(self.renderer.as_ref(), &request),
        }
    }
}

/// Calls the renderer on the current thread, turning a panic into an error so
/// it costs one participant instead of the whole batch.
pub(crate) fn render_in_place<R>(
    renderer: &R,
    request: &RenderRequest,
) -> Result<Vec<u8>, RenderError>
where
    R: DocumentRenderer + ?Sized,
{
    panic::catch_unwind(AssertUnwindSafe(|| renderer.render(request)))
        .unwrap_or(Err(RenderError::Panicked))
}

/// Calls the renderer on a helper thread and gives up after `deadline`.
///
/// A renderer that overruns is abandoned: its thread finishes on its own and
/// the result is discarded.
pub(crate) fn render_with_deadline<R>(
    renderer: &Arc<R>,
    request: RenderRequest,
    deadline: Duration,
) -> Result<Vec<u8>, RenderError>
where
    R: DocumentRenderer + 'static,
{
    let (tx, rx) = channel::bounded(1);
    let renderer = Arc::clone(renderer);
    thread::Builder::new()
        .name("certigen-render".into())
        .spawn(move || {
            let _ = tx.send(renderer.render(&request));
        })?;

    match rx.recv_timeout(deadline) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(RenderError::Timeout(deadline)),
        Err(RecvTimeoutError::Disconnected) => Err(RenderError::Disconnected),
    }
}
