use std::io::Write;

use serde::Serialize;

use crate::pipeline::frame_presenter::FramePresenter;
use crate::shared::collaborator::CollaboratorError;
use crate::shared::frame::Frame;
use crate::tracking::domain::track::TrackAssignment;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameRecord<'a> {
    frame_index: usize,
    assignments: &'a [TrackAssignment],
}

/// Writes one JSON object per frame:
/// `{"frameIndex":0,"assignments":[{"trackId":1,"status":{...},"confidence":0.98,"box":{...}}]}`.
pub struct JsonLinesPresenter<W: Write + Send> {
    writer: W,
    skip_empty: bool,
}

impl<W: Write + Send> JsonLinesPresenter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            skip_empty: false,
        }
    }

    /// Omits frames without any face.
    pub fn skipping_empty(mut self) -> Self {
        self.skip_empty = true;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> FramePresenter for JsonLinesPresenter<W> {
    fn present(
        &mut self,
        frame: &Frame,
        assignments: &[TrackAssignment],
    ) -> Result<(), CollaboratorError> {
        if self.skip_empty && assignments.is_empty() {
            return Ok(());
        }
        let record = FrameRecord {
            frame_index: frame.index(),
            assignments,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CollaboratorError> {
        self.writer.flush()?;
        Ok(())
    }
}
