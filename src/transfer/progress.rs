//! Progress reporting shared by export and import.
//!
//! A tracker always keeps its counters; the indicatif bar is only drawn
//! when requested. Exports know their total up front and get a bar,
//! imports read a stream of unknown length and get a spinner.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Which direction documents are moving, used in the progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Export,
    Import,
}

impl TransferDirection {
    fn verb(self) -> &'static str {
        match self {
            TransferDirection::Export => "exported",
            TransferDirection::Import => "inserted",
        }
    }
}

pub struct ProgressTracker {
    direction: TransferDirection,
    documents: AtomicU64,
    rejected: AtomicU64,
    started: Instant,
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a tracker
    ///
    /// # Arguments
    /// * `direction` - Export or import, for the message
    /// * `total` - Documents expected, when known
    /// * `visible` - Draw a bar on the terminal
    pub fn new(direction: TransferDirection, total: Option<u64>, visible: bool) -> Self {
        let bar = visible.then(|| Self::make_bar(total));
        Self {
            direction,
            documents: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            started: Instant::now(),
            bar,
        }
    }

    /// A tracker that never draws anything.
    pub fn hidden(direction: TransferDirection) -> Self {
        Self::new(direction, None, false)
    }

    fn make_bar(total: Option<u64>) -> ProgressBar {
        let (bar, template) = match total {
            Some(n) => (
                ProgressBar::new(n),
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            ),
            None => (ProgressBar::new_spinner(), "{spinner:.green} {pos} {msg}"),
        };
        let style = match total {
            Some(_) => ProgressStyle::default_bar(),
            None => ProgressStyle::default_spinner(),
        };
        if let Ok(style) = style.template(template) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    }

    /// Record the running total of documents moved so far
    pub fn update(&self, documents: u64) {
        self.documents.store(documents, Ordering::Relaxed);
        self.redraw();
    }

    /// Count one rejected import line
    pub fn reject(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.redraw();
    }

    pub fn documents(&self) -> u64 {
        self.documents.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Text shown next to the bar, e.g. `exported (1200 docs/sec)`.
    pub fn message(&self) -> String {
        let documents = self.documents();
        let elapsed = self.started.elapsed().as_secs_f64();
        let mut message = self.direction.verb().to_string();
        if elapsed > 0.0 && documents > 0 {
            message.push_str(&format!(" ({:.0} docs/sec)", documents as f64 / elapsed));
        }
        let rejected = self.rejected();
        if rejected > 0 {
            message.push_str(&format!(", {} rejected", rejected));
        }
        message
    }

    fn redraw(&self) {
        if let Some(bar) = &self.bar {
            bar.set_position(self.documents());
            bar.set_message(self.message());
        }
    }

    /// Finish and clear the bar
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
