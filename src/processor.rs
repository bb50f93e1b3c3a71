//! The block processor. This ties the parameter snapshots, the filter chain and the response
//! handoff together, and it's the only part of the equalizer that runs on the audio thread.

use std::sync::Arc;
use triple_buffer::TripleBuffer;

use crate::buffer::Buffer;
use crate::chain::{FilterChain, MAX_CHANNELS};
use crate::config::{EqConfig, ProcessConfig};
use crate::eq_params::EqParams;
use crate::error::PrepareError;
use crate::filter::{make_high_pass, make_low_pass, make_peaking};
use crate::meters::{self, PeakMeters};
use crate::params::{Smoother, SmoothingStyle};
use crate::response::{ChainResponse, FrequencyResponse, ResponseEvaluator};
use crate::snapshot::{ChainSnapshot, DirtyFlags, SnapshotTracker};
use crate::util;

/// Indicates the outcome of a [`EqProcessor::process()`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// The block was processed normally.
    Normal,
    /// Something went wrong. The buffer has been left untouched.
    Error(&'static str),
}

/// The equalizer's processing context. Owns every piece of state the audio thread touches.
///
/// The UI may write to the shared [`EqParams`] at any time. Every `process()` call reads all
/// parameters once, rebuilds only the filter groups whose parameters changed, and then runs input
/// gain, the high-pass cascade, the peaking bands, the low-pass cascade and output gain on every
/// channel.
pub struct EqProcessor {
    params: Arc<EqParams>,
    config: EqConfig,
    /// Set in [`prepare()`][Self::prepare()]. Processing is refused until then.
    process_config: Option<ProcessConfig>,

    tracker: SnapshotTracker,
    chain: FilterChain,

    /// Linear gain ramps. Both channels always receive the same gain.
    input_gain: Smoother,
    output_gain: Smoother,
    /// Holds the per-sample gain values for a chunk of up to `max_buffer_size` samples.
    gain_scratch: Vec<f32>,

    /// Needed to normalize the peak meters' response based on the sample rate.
    peak_meter_decay_weight: f32,
    meters: Arc<PeakMeters>,

    /// Every rebuild publishes the chain's new state here for the [`ResponseEvaluator`].
    response_input: triple_buffer::Input<ChainResponse>,
}

impl EqProcessor {
    /// Create a processor reading from `params`, together with the evaluator that lets another
    /// thread query the processor's frequency response.
    pub fn new(params: Arc<EqParams>, config: EqConfig) -> (Self, ResponseEvaluator) {
        let (response_input, response_output) = TripleBuffer::new(&ChainResponse::default()).split();
        let tracker = SnapshotTracker::new(&params);

        let processor = Self {
            params,
            config,
            process_config: None,

            tracker,
            chain: FilterChain::default(),

            input_gain: Smoother::new(SmoothingStyle::Linear(config.gain_ramp_ms)),
            output_gain: Smoother::new(SmoothingStyle::Linear(config.gain_ramp_ms)),
            gain_scratch: Vec::new(),

            peak_meter_decay_weight: 1.0,
            meters: Arc::new(PeakMeters::default()),

            response_input,
        };

        (processor, ResponseEvaluator::new(response_output))
    }

    pub fn params(&self) -> &Arc<EqParams> {
        &self.params
    }

    /// The peak meters, to be shared with whatever displays them.
    pub fn meters(&self) -> Arc<PeakMeters> {
        self.meters.clone()
    }

    /// The sample rate passed to the last successful [`prepare()`][Self::prepare()] call.
    pub fn sample_rate(&self) -> Option<f32> {
        self.process_config.map(|config| config.sample_rate)
    }

    /// The snapshot the last block was processed with.
    pub fn snapshot(&self) -> &ChainSnapshot {
        self.tracker.current()
    }

    pub fn dirty_flags(&self) -> &DirtyFlags {
        self.tracker.dirty()
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }

    /// Prepare for processing a stream. Allocates filter state for every channel, clears all
    /// filter histories, and rebuilds every filter for the new sample rate. This must not be called
    /// from the audio thread.
    pub fn prepare(&mut self, process_config: ProcessConfig) -> Result<(), PrepareError> {
        let ProcessConfig {
            sample_rate,
            max_buffer_size,
            num_channels,
        } = process_config;
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(PrepareError::InvalidSampleRate(sample_rate));
        }
        if max_buffer_size == 0 {
            return Err(PrepareError::InvalidBufferSize);
        }
        if num_channels == 0 || num_channels as usize > MAX_CHANNELS {
            return Err(PrepareError::UnsupportedChannelCount(num_channels));
        }

        self.process_config = Some(process_config);
        self.chain.allocate(num_channels as usize);
        self.gain_scratch = vec![0.0; max_buffer_size as usize];
        self.peak_meter_decay_weight =
            meters::decay_weight(sample_rate, self.config.peak_meter_decay_ms);
        self.meters.reset();

        self.tracker.snapshot(&self.params);
        self.tracker.dirty().mark_all();
        let num_rebuilt = self.update_dirty_filters();

        // The first block starts at the current gains instead of ramping up from silence
        let snapshot = self.tracker.current();
        self.input_gain.reset(util::db_to_gain(snapshot.input_gain_db));
        self.output_gain.reset(util::db_to_gain(snapshot.output_gain_db));

        peq_log!(
            "Prepared for {num_channels} channel(s) at {sample_rate} Hz with up to \
             {max_buffer_size} samples per block, rebuilt {num_rebuilt} filter groups"
        );

        Ok(())
    }

    /// Take a new parameter snapshot and mark every filter group whose parameters changed as
    /// dirty. Returns the number of groups that were marked. This is called at the start of every
    /// [`process()`][Self::process()] call.
    pub fn snapshot_parameters(&mut self) -> usize {
        self.tracker.snapshot(&self.params)
    }

    /// Design new coefficients for every dirty filter group using the current snapshot, and clear
    /// those groups' dirty flags. Returns the number of groups that were rebuilt. Does nothing
    /// before [`prepare()`][Self::prepare()] has been called.
    pub fn update_dirty_filters(&mut self) -> usize {
        let sample_rate = match self.process_config {
            Some(config) => config.sample_rate,
            None => return 0,
        };

        let snapshot = *self.tracker.current();
        let dirty = self.tracker.dirty();
        let chain = &mut self.chain;
        let response_input = &mut self.response_input;

        // New coefficient sets are allocated here, and the sets they replace may be freed here
        util::permit_alloc(|| {
            let mut num_rebuilt = 0;

            // A flag set by a concurrent change after the flag was taken triggers another rebuild
            // on the next block
            if dirty.take_hpf() {
                let hpf = snapshot.hpf;
                chain.assign_hpf(
                    make_high_pass(sample_rate, hpf.frequency, hpf.first_order()),
                    hpf.stages,
                    hpf.enabled,
                );
                num_rebuilt += 1;
            }
            if dirty.take_lpf() {
                let lpf = snapshot.lpf;
                chain.assign_lpf(
                    make_low_pass(sample_rate, lpf.frequency, lpf.first_order()),
                    lpf.stages,
                    lpf.enabled,
                );
                num_rebuilt += 1;
            }
            for (band_idx, band) in snapshot.bands.iter().enumerate() {
                if dirty.take_band(band_idx) {
                    let coefficients = band
                        .enabled
                        .then(|| make_peaking(sample_rate, band.frequency, band.q, band.gain_db));
                    chain.assign_band(band_idx, coefficients);
                    num_rebuilt += 1;
                }
            }

            if num_rebuilt > 0 {
                response_input.write(chain.response(sample_rate));
            }

            num_rebuilt
        })
    }

    /// Process a block of audio in place. Channels beyond the number of channels passed to
    /// [`prepare()`][Self::prepare()] are left untouched.
    pub fn process(&mut self, buffer: &mut Buffer) -> ProcessStatus {
        util::process_wrapper(|| self.process_block(buffer))
    }

    fn process_block(&mut self, buffer: &mut Buffer) -> ProcessStatus {
        let sample_rate = match self.process_config {
            Some(config) => config.sample_rate,
            None => return ProcessStatus::Error("process() called before prepare()"),
        };

        self.snapshot_parameters();
        self.update_dirty_filters();

        let snapshot = self.tracker.current();
        let input_gain = util::db_to_gain(snapshot.input_gain_db);
        let output_gain = util::db_to_gain(snapshot.output_gain_db);
        if input_gain != self.input_gain.target() {
            self.input_gain.set_target(sample_rate, input_gain);
        }
        if output_gain != self.output_gain.target() {
            self.output_gain.set_target(sample_rate, output_gain);
        }

        peq_debug_assert!(
            buffer.channels() <= self.chain.num_channels(),
            "Got {} channels, but only {} were prepared",
            buffer.channels(),
            self.chain.num_channels()
        );
        let num_channels = buffer.channels().min(self.chain.num_channels());
        let num_samples = buffer.samples();
        let max_block_len = self.gain_scratch.len();
        let channels = &mut buffer.as_slice()[..num_channels];

        let mut block_start = 0;
        while block_start < num_samples {
            let block_end = (block_start + max_block_len).min(num_samples);
            let block_len = block_end - block_start;

            self.input_gain
                .next_block(&mut self.gain_scratch, block_len);
            for (channel_idx, channel) in channels.iter_mut().enumerate() {
                let samples = &mut channel[block_start..block_end];
                for (sample, gain) in samples.iter_mut().zip(&self.gain_scratch) {
                    *sample *= gain;
                }

                self.meters
                    .update_input(channel_idx, samples, self.peak_meter_decay_weight);
                self.chain.process(channel_idx, samples);
            }

            self.output_gain
                .next_block(&mut self.gain_scratch, block_len);
            for (channel_idx, channel) in channels.iter_mut().enumerate() {
                let samples = &mut channel[block_start..block_end];
                for (sample, gain) in samples.iter_mut().zip(&self.gain_scratch) {
                    *sample *= gain;
                }

                self.meters
                    .update_output(channel_idx, samples, self.peak_meter_decay_weight);
            }

            block_start = block_end;
        }

        ProcessStatus::Normal
    }

    /// The linear magnitude response of the filters as they are right now. Unlike the
    /// [`ResponseEvaluator`] this must be called from the thread that owns the processor.
    ///
    /// # Panics
    ///
    /// Panics if the two slices have different lengths.
    pub fn frequency_response(&self, frequencies: &[f64], magnitudes: &mut [f64]) {
        let mut response = match self.process_config {
            Some(config) => self.chain.response(config.sample_rate),
            None => ChainResponse::default(),
        };

        response.frequency_response(frequencies, magnitudes);
    }

    /// Clear all filter histories, skip any ongoing gain ramps, and drop the meters to silence.
    pub fn reset(&mut self) {
        self.chain.reset();
        self.input_gain.reset(self.input_gain.target());
        self.output_gain.reset(self.output_gain.target());
        self.meters.reset();
    }
}

impl std::fmt::Debug for EqProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EqProcessor")
            .field("process_config", &self.process_config)
            .field("snapshot", self.tracker.current())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eq_params::{Slope, MAX_BANDS};
    use crate::params::Param;
    use approx::assert_relative_eq;

    const SAMPLE_RATE: f32 = 44_100.0;

    fn stereo_config(max_buffer_size: u32) -> ProcessConfig {
        ProcessConfig {
            sample_rate: SAMPLE_RATE,
            max_buffer_size,
            num_channels: 2,
        }
    }

    /// Parameters with every filter turned off.
    fn flat_params() -> Arc<EqParams> {
        let params = EqParams::default();
        params.hpf.enabled.set_plain_value(false);
        params.lpf.enabled.set_plain_value(false);
        for band in &params.bands {
            band.enabled.set_plain_value(false);
        }

        Arc::new(params)
    }

    fn process_constant(processor: &mut EqProcessor, value: f32, len: usize) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![value; len];
        let mut right = vec![value; len];
        let mut channels = [&mut left[..], &mut right[..]];
        let status = processor.process(&mut Buffer::new(&mut channels));
        assert_eq!(status, ProcessStatus::Normal);

        (left, right)
    }

    #[test]
    fn prepare_rejects_bad_configs() {
        let (mut processor, _) = EqProcessor::new(flat_params(), EqConfig::default());

        let mut config = stereo_config(512);
        config.num_channels = 3;
        assert_eq!(
            processor.prepare(config),
            Err(PrepareError::UnsupportedChannelCount(3))
        );
        config.num_channels = 0;
        assert_eq!(
            processor.prepare(config),
            Err(PrepareError::UnsupportedChannelCount(0))
        );

        let mut config = stereo_config(512);
        config.sample_rate = 0.0;
        assert_eq!(
            processor.prepare(config),
            Err(PrepareError::InvalidSampleRate(0.0))
        );
        assert_eq!(
            processor.prepare(stereo_config(0)),
            Err(PrepareError::InvalidBufferSize)
        );

        assert!(processor.sample_rate().is_none());
        assert!(processor.prepare(stereo_config(512)).is_ok());
        assert_eq!(processor.sample_rate(), Some(SAMPLE_RATE));
    }

    #[test]
    fn process_before_prepare_is_an_error() {
        let (mut processor, _) = EqProcessor::new(flat_params(), EqConfig::default());
        let mut samples = [0.5f32; 8];
        let mut channels = [&mut samples[..]];
        assert!(matches!(
            processor.process(&mut Buffer::new(&mut channels)),
            ProcessStatus::Error(_)
        ));
        assert_eq!(samples, [0.5; 8]);
    }

    #[test]
    fn prepare_rebuilds_everything() {
        let (mut processor, _) = EqProcessor::new(Arc::new(EqParams::default()), EqConfig::default());
        processor.prepare(stereo_config(64)).unwrap();

        assert!(!processor.dirty_flags().any_dirty());
        assert!(processor.chain().hpf().coefficients().is_some());
        assert!(processor.chain().lpf().coefficients().is_some());
        for band_idx in 0..MAX_BANDS {
            assert_eq!(processor.chain().band(band_idx).is_some(), band_idx < 3);
        }
        assert_eq!(processor.update_dirty_filters(), 0);
    }

    #[test]
    fn flat_chain_passes_through() {
        let (mut processor, _) = EqProcessor::new(flat_params(), EqConfig::default());
        processor.prepare(stereo_config(64)).unwrap();

        let (left, right) = process_constant(&mut processor, 0.25, 100);
        assert!(left.iter().chain(&right).all(|sample| *sample == 0.25));
    }

    #[test]
    fn gain_changes_are_ramped() {
        let params = flat_params();
        let (mut processor, _) = EqProcessor::new(params.clone(), EqConfig::default());
        processor.prepare(stereo_config(1024)).unwrap();

        params.output_gain.set_plain_value(-6.0);
        let (left, right) = process_constant(&mut processor, 1.0, 1024);
        assert_eq!(left, right);
        assert!(left[0] < 1.0 && left[0] > 0.99);
        assert!(left.windows(2).all(|pair| pair[1] <= pair[0]));

        // 20 ms at 44.1 kHz is 882 samples
        assert_relative_eq!(left[881], util::db_to_gain(-6.0), epsilon = 1e-4);
        assert_relative_eq!(left[1023], util::db_to_gain(-6.0), epsilon = 1e-6);
    }

    #[test]
    fn oversized_buffers_are_chunked() {
        let params = flat_params();
        params.input_gain.set_plain_value(-12.0);
        let (mut processor, _) = EqProcessor::new(params, EqConfig::default());
        processor.prepare(stereo_config(16)).unwrap();

        let (left, _) = process_constant(&mut processor, 1.0, 100);
        for sample in left {
            assert_relative_eq!(sample, util::db_to_gain(-12.0), epsilon = 1e-6);
        }
    }

    #[test]
    fn mono_processing() {
        let params = flat_params();
        params.input_gain.set_plain_value(-12.0);
        let (mut processor, _) = EqProcessor::new(params, EqConfig::default());
        processor
            .prepare(ProcessConfig {
                sample_rate: SAMPLE_RATE,
                max_buffer_size: 32,
                num_channels: 1,
            })
            .unwrap();

        let mut mono = [1.0f32; 32];
        let mut channels = [&mut mono[..]];
        processor.process(&mut Buffer::new(&mut channels));
        assert_relative_eq!(mono[31], util::db_to_gain(-12.0), epsilon = 1e-6);
    }

    #[test]
    fn slope_changes_rebuild_only_that_group() {
        let params = Arc::new(EqParams::default());
        let (mut processor, _) = EqProcessor::new(params.clone(), EqConfig::default());
        processor.prepare(stereo_config(64)).unwrap();
        let bands_before: Vec<_> = (0..MAX_BANDS)
            .map(|idx| processor.chain().band(idx).cloned())
            .collect();

        params.hpf.slope.set_plain_value(Slope::Db48);
        assert_eq!(processor.snapshot_parameters(), 1);
        assert_eq!(processor.update_dirty_filters(), 1);
        assert_eq!(processor.chain().hpf().stages(), 4);

        for (band_idx, before) in bands_before.iter().enumerate() {
            match (processor.chain().band(band_idx), before) {
                (Some(after), Some(before)) => assert!(Arc::ptr_eq(after, before)),
                (None, None) => (),
                _ => panic!("band {band_idx} changed"),
            }
        }
    }

    #[test]
    fn response_follows_processing() {
        let params = flat_params();
        let (mut processor, mut evaluator) = EqProcessor::new(params.clone(), EqConfig::default());
        processor.prepare(stereo_config(64)).unwrap();

        params.bands[0].enabled.set_plain_value(true);
        params.bands[0].frequency.set_plain_value(1000.0);
        params.bands[0].gain.set_plain_value(-12.0);
        process_constant(&mut processor, 0.0, 64);

        let mut local = [0.0];
        processor.frequency_response(&[1000.0], &mut local);
        let remote = evaluator.frequency_response_vec(&[1000.0]);
        assert_relative_eq!(local[0], util::db_to_gain(-12.0) as f64, epsilon = 1e-4);
        assert_eq!(local[0], remote[0]);
    }

    #[test]
    fn meters_follow_the_signal() {
        let params = flat_params();
        params.output_gain.set_plain_value(-6.0);
        let (mut processor, _) = EqProcessor::new(params, EqConfig::default());
        processor.prepare(stereo_config(256)).unwrap();
        let meters = processor.meters();

        process_constant(&mut processor, 0.5, 256);
        assert_relative_eq!(meters.input_peak(0), 0.5, epsilon = 1e-6);
        assert_relative_eq!(meters.output_peak(1), 0.5 * util::db_to_gain(-6.0), epsilon = 1e-4);

        processor.reset();
        assert_eq!(meters.input_peak(0), 0.0);
    }
}
