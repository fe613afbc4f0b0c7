use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;

use crate::detection::domain::candidate_filter::FilterStats;
use crate::pipeline::frame_pipeline::{FramePipeline, PipelineError};
use crate::pipeline::frame_presenter::FramePresenter;
use crate::pipeline::frame_slot::{frame_slot, SlotMode, SlotReceiver, SlotSender};
use crate::pipeline::seen_persons::SeenPersons;
use crate::shared::collaborator::CollaboratorError;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

type Captured = Result<Frame, CollaboratorError>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("frame capture failed: {0}")]
    Capture(#[source] CollaboratorError),
    #[error("face detection failed: {0}")]
    Detection(#[source] CollaboratorError),
    #[error("presentation failed: {0}")]
    Presentation(#[source] CollaboratorError),
    #[error("capture thread panicked")]
    CapturePanicked,
}

/// What a finished session saw and did.
#[derive(Debug, Default)]
pub struct SessionSummary {
    pub frames_processed: usize,
    /// Stale live frames replaced before processing picked them up.
    pub frames_dropped: usize,
    /// Malformed frames skipped.
    pub frames_skipped: usize,
    pub filter_stats: FilterStats,
    pub seen: SeenPersons,
    pub cancelled: bool,
}

/// Runs a [`FramePipeline`] over a [`FrameSource`].
///
/// Layout: `capture thread → single slot → main [process/present]`
///
/// Live sources hand over the latest frame only, dropping stale ones when
/// processing falls behind; finite sources block so every frame is
/// processed. Cancelling lets the in-flight frame finish, then releases the
/// source and discards tracker state.
pub struct RecognitionSession {
    pipeline: FramePipeline,
    cancelled: Arc<AtomicBool>,
}

impl RecognitionSession {
    pub fn new(pipeline: FramePipeline) -> Self {
        Self {
            pipeline,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the running session when raised from any thread.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }

    /// Processes `source` to its end, a failure, or cancellation.
    ///
    /// The source is always closed and the tracker reset before returning,
    /// and `presenter.finish()` is always called.
    pub fn run(
        &mut self,
        source: Box<dyn FrameSource>,
        presenter: &mut dyn FramePresenter,
    ) -> Result<SessionSummary, SessionError> {
        self.cancelled.store(false, Ordering::SeqCst);
        let live = source.is_live();
        let mode = if live {
            SlotMode::LatestWins
        } else {
            SlotMode::Blocking
        };
        log::info!(
            "Starting {} recognition session",
            if live { "live" } else { "finite" }
        );

        let (tx, rx) = frame_slot::<Captured>(mode);
        let capture = spawn_capture(source, tx, Arc::clone(&self.cancelled));

        let mut summary = SessionSummary::default();
        let outcome = self.process_frames(&rx, presenter, &mut summary);

        // Unblocks and stops the capture thread whatever the outcome.
        self.cancelled.store(true, Ordering::SeqCst);
        summary.frames_dropped = rx.dropped();
        drop(rx);
        let joined = capture.join();

        self.pipeline.reset_session();
        self.pipeline.logger_mut().summary();
        let finished = presenter.finish();

        outcome?;
        if joined.is_err() {
            return Err(SessionError::CapturePanicked);
        }
        finished.map_err(SessionError::Presentation)?;

        log::info!(
            "Session ended: {} frames processed, {} dropped, {} skipped, {} persons seen",
            summary.frames_processed,
            summary.frames_dropped,
            summary.frames_skipped,
            summary.seen.len()
        );
        Ok(summary)
    }

    fn process_frames(
        &mut self,
        rx: &SlotReceiver<Captured>,
        presenter: &mut dyn FramePresenter,
        summary: &mut SessionSummary,
    ) -> Result<(), SessionError> {
        while let Ok(captured) = rx.recv() {
            if self.cancelled.load(Ordering::SeqCst) {
                summary.cancelled = true;
                break;
            }
            let frame = captured.map_err(SessionError::Capture)?;

            match self.pipeline.process_frame(&frame) {
                Ok(assignments) => {
                    summary
                        .filter_stats
                        .accumulate(self.pipeline.last_filter_stats());
                    summary.seen.record(frame.index(), &assignments);
                    presenter
                        .present(&frame, &assignments)
                        .map_err(SessionError::Presentation)?;
                    summary.frames_processed += 1;
                    self.pipeline
                        .logger_mut()
                        .progress(summary.frames_processed, None);
                }
                Err(PipelineError::Input(e)) => {
                    log::warn!("Skipping frame {}: {e}", frame.index());
                    summary.frames_skipped += 1;
                }
                Err(PipelineError::Collaborator(e)) => return Err(SessionError::Detection(e)),
            }
        }
        if self.cancelled.load(Ordering::SeqCst) {
            summary.cancelled = true;
        }
        Ok(())
    }
}

fn spawn_capture(
    mut source: Box<dyn FrameSource>,
    tx: SlotSender<Captured>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while !cancelled.load(Ordering::SeqCst) {
            let item = match source.next_frame() {
                Ok(Some(frame)) => Ok(frame),
                Ok(None) => break,
                Err(e) => Err(e),
            };
            let failed = item.is_err();
            if tx.send(item).is_err() || failed {
                break;
            }
        }
        source.close();
        log::debug!("Capture released");
    })
}
