//! Display sink for annotated frames.

use crate::integration::pipeline::FrameReport;
use crate::pacing::Pacing;

/// Whether the display loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFlow {
    Continue,
    /// Stop after this frame (the user closed the window or hit Esc).
    Stop,
}

/// Receives every processed frame with its report. Purely a sink: nothing
/// it does feeds back into tracking.
pub trait Renderer<F> {
    /// Draw the frame and its tracked objects, then wait up to
    /// `pacing.wait` for user input.
    fn render(&mut self, frame: &F, report: &FrameReport, pacing: &Pacing) -> RenderFlow;
}

impl<F, C> Renderer<F> for C
where
    C: FnMut(&F, &FrameReport, &Pacing) -> RenderFlow,
{
    fn render(&mut self, frame: &F, report: &FrameReport, pacing: &Pacing) -> RenderFlow {
        self(frame, report, pacing)
    }
}
