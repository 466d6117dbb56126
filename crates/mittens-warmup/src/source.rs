//! Lazy cyclic view over the parsed request specs.
//!
//! Workers share one cursor. Each call to [`RequestSource::next_spec`] hands
//! out the next spec, wrapping around to the start when the list is
//! exhausted, so warmup volume grows with the time budget instead of
//! stopping after one pass.

use std::sync::atomic::{AtomicUsize, Ordering};

use mittens_core::RequestSpec;

pub struct RequestSource {
    specs: Vec<RequestSpec>,
    cursor: AtomicUsize,
    single_pass: bool,
}

impl RequestSource {
    /// Cycle over `specs` forever.
    pub fn cyclic(specs: Vec<RequestSpec>) -> Self {
        Self {
            specs,
            cursor: AtomicUsize::new(0),
            single_pass: false,
        }
    }

    /// Hand out each spec exactly once.
    pub fn single_pass(specs: Vec<RequestSpec>) -> Self {
        Self {
            specs,
            cursor: AtomicUsize::new(0),
            single_pass: true,
        }
    }

    /// Next spec to dispatch, or `None` once a single-pass source is drained.
    pub fn next_spec(&self) -> Option<&RequestSpec> {
        if self.specs.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        if self.single_pass && idx >= self.specs.len() {
            return None;
        }
        Some(&self.specs[idx % self.specs.len()])
    }

    /// Whether no more specs will be handed out.
    pub fn is_exhausted(&self) -> bool {
        self.specs.is_empty()
            || (self.single_pass && self.cursor.load(Ordering::Relaxed) >= self.specs.len())
    }

    /// Completed passes over the list so far.
    pub fn passes(&self) -> usize {
        if self.specs.is_empty() {
            return 0;
        }
        let handed_out = self.cursor.load(Ordering::Relaxed);
        let handed_out = if self.single_pass {
            handed_out.min(self.specs.len())
        } else {
            handed_out
        };
        handed_out / self.specs.len()
    }

    /// Number of distinct specs in one pass.
    pub fn request_count(&self) -> usize {
        self.specs.len()
    }
}
