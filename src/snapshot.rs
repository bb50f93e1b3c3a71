//! Per-block parameter snapshots and the dirty flags derived from them.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::eq_params::{EqParams, PassFilterParams, MAX_BANDS};
use crate::params::Enum;

/// The most biquads a single pass filter cascade can contain.
pub const MAX_STAGES: usize = 4;

/// The number of cascaded biquads used for slope index `slope_index`. The 6 dB and 12 dB slopes
/// both use a single stage, with the 6 dB slope using a first order filter. Every step above that
/// doubles the number of stages.
pub fn stage_count_for_slope_index(slope_index: usize) -> usize {
    match slope_index {
        0 | 1 => 1,
        2 => 2,
        _ => MAX_STAGES,
    }
}

/// The state of a single peaking band at the start of a block.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandSnapshot {
    pub enabled: bool,
    pub frequency: f32,
    pub q: f32,
    pub gain_db: f32,
}

/// The state of a high-pass or low-pass filter at the start of a block.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PassFilterSnapshot {
    pub enabled: bool,
    pub frequency: f32,
    pub slope_index: usize,
    /// Derived from `slope_index` through [`stage_count_for_slope_index()`].
    pub stages: usize,
}

/// Every parameter the processor needs for a single block, captured by value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChainSnapshot {
    pub input_gain_db: f32,
    pub output_gain_db: f32,
    pub hpf: PassFilterSnapshot,
    pub lpf: PassFilterSnapshot,
    pub bands: [BandSnapshot; MAX_BANDS],
}

impl PassFilterSnapshot {
    fn read(params: &PassFilterParams) -> Self {
        let slope_index = params.slope.value().to_index();

        Self {
            enabled: params.enabled.value(),
            frequency: params.frequency.value(),
            slope_index,
            stages: stage_count_for_slope_index(slope_index),
        }
    }

    /// The 6 dB/octave slope uses a first order filter instead of a biquad.
    pub fn first_order(&self) -> bool {
        self.slope_index == 0
    }
}

impl ChainSnapshot {
    /// Read every parameter from `params`. The parameters may be changed by another thread while
    /// this is happening, but every field is read exactly once so the result is always complete.
    pub fn read(params: &EqParams) -> Self {
        Self {
            input_gain_db: params.input_gain.value(),
            output_gain_db: params.output_gain.value(),
            hpf: PassFilterSnapshot::read(&params.hpf),
            lpf: PassFilterSnapshot::read(&params.lpf),
            bands: std::array::from_fn(|idx| {
                let band = &params.bands[idx];
                BandSnapshot {
                    enabled: band.enabled.value(),
                    frequency: band.frequency.value(),
                    q: band.q.value(),
                    gain_db: band.gain.value(),
                }
            }),
        }
    }
}

/// One flag per group of filters that can be rebuilt independently. A set flag means that group's
/// coefficients are out of date. All flags start out set so the first rebuild initializes
/// everything.
#[derive(Debug)]
pub struct DirtyFlags {
    hpf: AtomicBool,
    lpf: AtomicBool,
    bands: [AtomicBool; MAX_BANDS],
}

impl Default for DirtyFlags {
    fn default() -> Self {
        Self {
            hpf: AtomicBool::new(true),
            lpf: AtomicBool::new(true),
            bands: std::array::from_fn(|_| AtomicBool::new(true)),
        }
    }
}

impl DirtyFlags {
    pub fn mark_hpf(&self) {
        self.hpf.store(true, Ordering::Release);
    }

    pub fn mark_lpf(&self) {
        self.lpf.store(true, Ordering::Release);
    }

    /// # Panics
    ///
    /// Panics if `band_idx >= MAX_BANDS`.
    pub fn mark_band(&self, band_idx: usize) {
        self.bands[band_idx].store(true, Ordering::Release);
    }

    /// Mark every group as dirty. Used when the sample rate changes.
    pub fn mark_all(&self) {
        self.mark_hpf();
        self.mark_lpf();
        for band in &self.bands {
            band.store(true, Ordering::Release);
        }
    }

    /// Clear the high-pass flag, returning whether it was set.
    pub fn take_hpf(&self) -> bool {
        self.hpf.swap(false, Ordering::AcqRel)
    }

    /// Clear the low-pass flag, returning whether it was set.
    pub fn take_lpf(&self) -> bool {
        self.lpf.swap(false, Ordering::AcqRel)
    }

    /// Clear a band's flag, returning whether it was set.
    pub fn take_band(&self, band_idx: usize) -> bool {
        self.bands[band_idx].swap(false, Ordering::AcqRel)
    }

    pub fn is_hpf_dirty(&self) -> bool {
        self.hpf.load(Ordering::Acquire)
    }

    pub fn is_lpf_dirty(&self) -> bool {
        self.lpf.load(Ordering::Acquire)
    }

    pub fn is_band_dirty(&self, band_idx: usize) -> bool {
        self.bands[band_idx].load(Ordering::Acquire)
    }

    /// Whether any group needs to be rebuilt.
    pub fn any_dirty(&self) -> bool {
        self.is_hpf_dirty()
            || self.is_lpf_dirty()
            || self.bands.iter().any(|band| band.load(Ordering::Acquire))
    }

    /// Compare two snapshots group by group and mark every group that differs. Returns the number
    /// of groups that were marked. The gains are not part of any group.
    fn mark_changes(&self, old: &ChainSnapshot, new: &ChainSnapshot) -> usize {
        let mut num_marked = 0;
        if old.hpf != new.hpf {
            self.mark_hpf();
            num_marked += 1;
        }
        if old.lpf != new.lpf {
            self.mark_lpf();
            num_marked += 1;
        }
        for (band_idx, (old_band, new_band)) in old.bands.iter().zip(&new.bands).enumerate() {
            if old_band != new_band {
                self.mark_band(band_idx);
                num_marked += 1;
            }
        }

        num_marked
    }
}

/// Keeps the current and previous snapshots together with the dirty flags they produce.
#[derive(Debug, Default)]
pub struct SnapshotTracker {
    current: ChainSnapshot,
    previous: ChainSnapshot,
    dirty: DirtyFlags,
}

impl SnapshotTracker {
    /// Start tracking from the values currently stored in `params`. Every group starts out dirty.
    pub fn new(params: &EqParams) -> Self {
        let snapshot = ChainSnapshot::read(params);

        Self {
            current: snapshot,
            previous: snapshot,
            dirty: DirtyFlags::default(),
        }
    }

    /// The snapshot taken for the current block.
    pub fn current(&self) -> &ChainSnapshot {
        &self.current
    }

    /// The baseline the next snapshot will be compared against.
    pub fn previous(&self) -> &ChainSnapshot {
        &self.previous
    }

    pub fn dirty(&self) -> &DirtyFlags {
        &self.dirty
    }

    /// Read a new snapshot from `params` and mark every group that changed since the last one.
    /// Afterwards the new snapshot is both the current snapshot and the baseline for the next
    /// comparison. Returns the number of groups that were marked dirty.
    pub fn snapshot(&mut self, params: &EqParams) -> usize {
        let snapshot = ChainSnapshot::read(params);
        let num_marked = self.dirty.mark_changes(&self.previous, &snapshot);

        self.current = snapshot;
        self.previous = snapshot;

        num_marked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eq_params::Slope;
    use crate::params::Param;

    fn clean_tracker(params: &EqParams) -> SnapshotTracker {
        let tracker = SnapshotTracker::new(params);
        tracker.dirty().take_hpf();
        tracker.dirty().take_lpf();
        for band_idx in 0..MAX_BANDS {
            tracker.dirty().take_band(band_idx);
        }
        assert!(!tracker.dirty().any_dirty());

        tracker
    }

    #[test]
    fn slope_stage_counts() {
        let stages: Vec<usize> = (0..4).map(stage_count_for_slope_index).collect();
        assert_eq!(stages, [1, 1, 2, 4]);
    }

    #[test]
    fn everything_starts_dirty() {
        let params = EqParams::default();
        let tracker = SnapshotTracker::new(&params);
        assert!(tracker.dirty().is_hpf_dirty());
        assert!(tracker.dirty().is_lpf_dirty());
        assert!((0..MAX_BANDS).all(|idx| tracker.dirty().is_band_dirty(idx)));
    }

    #[test]
    fn unchanged_parameters_mark_nothing() {
        let params = EqParams::default();
        let mut tracker = clean_tracker(&params);
        assert_eq!(tracker.snapshot(&params), 0);
        assert!(!tracker.dirty().any_dirty());
    }

    #[test]
    fn band_changes_are_isolated() {
        let params = EqParams::default();
        let mut tracker = clean_tracker(&params);

        params.bands[4].gain.set_plain_value(3.0);
        assert_eq!(tracker.snapshot(&params), 1);
        for band_idx in 0..MAX_BANDS {
            assert_eq!(tracker.dirty().is_band_dirty(band_idx), band_idx == 4);
        }
        assert!(!tracker.dirty().is_hpf_dirty());
        assert!(!tracker.dirty().is_lpf_dirty());
        assert_eq!(tracker.current().bands[4].gain_db, 3.0);
        assert_eq!(tracker.previous(), tracker.current());
    }

    #[test]
    fn gain_changes_mark_nothing() {
        let params = EqParams::default();
        let mut tracker = clean_tracker(&params);

        params.input_gain.set_plain_value(-6.0);
        params.output_gain.set_plain_value(3.0);
        assert_eq!(tracker.snapshot(&params), 0);
        assert_eq!(tracker.current().input_gain_db, -6.0);
        assert_eq!(tracker.current().output_gain_db, 3.0);
    }

    #[test]
    fn slope_changes_mark_only_their_group() {
        let params = EqParams::default();
        let mut tracker = clean_tracker(&params);

        params.lpf.slope.set_plain_value(Slope::Db48);
        assert_eq!(tracker.snapshot(&params), 1);
        assert!(tracker.dirty().is_lpf_dirty());
        assert!(!tracker.dirty().is_hpf_dirty());
        assert_eq!(tracker.current().lpf.stages, 4);
        assert!(!tracker.current().lpf.first_order());
        assert!(tracker.current().hpf.first_order());
    }

    #[test]
    fn take_clears_once() {
        let flags = DirtyFlags::default();
        assert!(flags.take_band(2));
        assert!(!flags.take_band(2));
        flags.mark_band(2);
        assert!(flags.take_band(2));
    }
}
