//! Terminal progress bars driven by the sequence runner.

use dade_core::plan::SequencePlan;
use dade_core::runner::{SequenceObserver, SequenceResult};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

const BAR_TEMPLATE: &str = "{msg:>16} [{bar:40}] {pos}/{len} ticks ({eta})";

/// Observer that shows one bar for the warm-up and one for the recording.
#[derive(Default)]
pub struct ProgressObserver {
    warmup: Option<ProgressBar>,
    record: Option<ProgressBar>,
    record_len: u64,
    hidden: bool,
}

impl ProgressObserver {
    /// Observer drawing to the terminal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observer that tracks positions without drawing.
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            hidden: true,
            ..Self::default()
        }
    }

    fn bar(&self, len: u64, message: &'static str) -> ProgressBar {
        let bar = if self.hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(len)
        };
        bar.set_length(len);
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_err| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_message(message);
        bar
    }

    /// Ticks counted so far by the warm-up and recording bars.
    #[cfg(test)]
    pub fn positions(&self) -> (u64, u64) {
        (
            self.warmup.as_ref().map_or(0, ProgressBar::position),
            self.record.as_ref().map_or(0, ProgressBar::position),
        )
    }
}

impl SequenceObserver for ProgressObserver {
    fn on_start(&mut self, plan: &SequencePlan) {
        self.warmup = Some(self.bar(plan.ticks_to_discard, "Discarding ticks"));
        self.record = None;
        self.record_len = plan.ticks_to_record;
    }

    fn on_warmup_tick(&mut self, _index: u64) {
        if let Some(bar) = &self.warmup {
            bar.inc(1);
        }
    }

    fn on_record_tick(&mut self, _index: u64, saved_frame: Option<u64>) {
        if self.record.is_none() {
            if let Some(bar) = &self.warmup {
                bar.finish();
            }
            self.record = Some(self.bar(self.record_len, "Recording ticks"));
        }
        if let Some(bar) = &self.record {
            bar.inc(1);
        }
        if let Some(frame) = saved_frame {
            debug!(frame, "Frame saved");
        }
    }

    fn on_finish(&mut self, result: &SequenceResult) {
        for bar in [&self.warmup, &self.record].into_iter().flatten() {
            bar.finish_and_clear();
        }
        debug!(folder = %result.folder, frames = result.frames_saved, "Progress closed");
    }
}
