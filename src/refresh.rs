//! A background thread that periodically redraws the response curve.
//!
//! The refresher owns a [`ResponseEvaluator`] and a [`CurveSampler`]. Every tick it checks whether
//! the processor published new filters, resamples the curve if it did, and hands the result to
//! the display through a triple buffer. None of this ever blocks the audio thread, and a late or
//! skipped tick only means the display is briefly out of date.

use crossbeam::channel;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use triple_buffer::TripleBuffer;

use crate::curve::{Curve, CurveConfig, CurveSampler};
use crate::response::ResponseEvaluator;

/// 30 Hz.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 30);
/// Intervals shorter than this are rounded up.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);
/// The number of pending requests before [`CurveRefresher::request_refresh()`] starts failing.
const MESSAGE_QUEUE_CAPACITY: usize = 64;

/// The receiving end for the curves produced by a [`CurveRefresher`].
pub type CurveOutput = triple_buffer::Output<Curve>;

/// See the module's documentation. Dropping this stops and joins the worker thread.
pub struct CurveRefresher {
    /// Wrapped in an `Option` so the thread can be taken out of it and joined when this struct
    /// gets dropped.
    worker_thread: Option<JoinHandle<()>>,
    /// Used to wake the worker thread before its next tick.
    messages_sender: channel::Sender<Message>,
    /// The number of curves published so far.
    num_refreshes: Arc<AtomicUsize>,
}

/// A message for communicating with the worker thread.
enum Message {
    /// Resample the curve now, even if the filters did not change.
    RefreshNow,
    /// Change the tick interval. The next tick happens one new interval from now.
    SetInterval(Duration),
    /// Shut down the worker thread.
    Shutdown,
}

impl CurveRefresher {
    /// Spawn the worker thread. The first curve is published right away, after that the curve is
    /// resampled at most once every `interval` and only when the filters changed.
    pub fn spawn(
        evaluator: ResponseEvaluator,
        config: CurveConfig,
        interval: Duration,
    ) -> std::io::Result<(Self, CurveOutput)> {
        let (messages_sender, messages_receiver) = channel::bounded(MESSAGE_QUEUE_CAPACITY);
        let (curve_input, curve_output) = TripleBuffer::new(&Curve::default()).split();
        let num_refreshes = Arc::new(AtomicUsize::new(0));

        let worker = Worker {
            messages_receiver,
            evaluator,
            sampler: CurveSampler::new(config),
            curve_input,
            num_refreshes: num_refreshes.clone(),
            interval: interval.max(MIN_REFRESH_INTERVAL),
        };
        let worker_thread = thread::Builder::new()
            .name(String::from("peq-curve"))
            .spawn(move || worker.run())?;

        let refresher = Self {
            worker_thread: Some(worker_thread),
            messages_sender,
            num_refreshes,
        };

        Ok((refresher, curve_output))
    }

    /// Ask for the curve to be resampled as soon as possible. Returns `false` if the request could
    /// not be queued.
    pub fn request_refresh(&self) -> bool {
        self.messages_sender.try_send(Message::RefreshNow).is_ok()
    }

    /// Change how often the worker checks for new filters. Returns `false` if the request could not
    /// be queued.
    pub fn set_interval(&self, interval: Duration) -> bool {
        self.messages_sender
            .try_send(Message::SetInterval(interval.max(MIN_REFRESH_INTERVAL)))
            .is_ok()
    }

    /// The number of curves that have been published so far.
    pub fn num_refreshes(&self) -> usize {
        self.num_refreshes.load(Ordering::Relaxed)
    }
}

impl Drop for CurveRefresher {
    fn drop(&mut self) {
        if self.messages_sender.send(Message::Shutdown).is_err() {
            peq_trace!("The curve refresh thread already stopped");
        }
        if let Some(join_handle) = self.worker_thread.take() {
            if join_handle.join().is_err() {
                peq_error!("The curve refresh thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for CurveRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurveRefresher")
            .field("num_refreshes", &self.num_refreshes())
            .finish_non_exhaustive()
    }
}

/// Everything the worker thread owns.
struct Worker {
    messages_receiver: channel::Receiver<Message>,
    evaluator: ResponseEvaluator,
    sampler: CurveSampler,
    curve_input: triple_buffer::Input<Curve>,
    num_refreshes: Arc<AtomicUsize>,
    interval: Duration,
}

impl Worker {
    fn run(mut self) {
        // The first curve is always drawn, even if the processor hasn't published anything yet
        let mut force_refresh = true;
        let mut next_tick = Instant::now();

        loop {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            let should_refresh = match self.messages_receiver.recv_timeout(timeout) {
                Ok(Message::RefreshNow) => {
                    force_refresh = true;
                    true
                }
                Ok(Message::SetInterval(interval)) => {
                    self.interval = interval;
                    next_tick = Instant::now() + interval;
                    false
                }
                Ok(Message::Shutdown) => return,
                Err(channel::RecvTimeoutError::Timeout) => {
                    next_tick = Instant::now() + self.interval;
                    true
                }
                Err(channel::RecvTimeoutError::Disconnected) => {
                    peq_trace!("Curve refresh thread got disconnected unexpectedly, shutting down");
                    return;
                }
            };

            if should_refresh && (force_refresh || self.evaluator.has_update()) {
                // Both of the sampler's passes need to see the same filters
                let mut response = self.evaluator.snapshot();
                let curve = self.sampler.refresh(&mut response);
                self.curve_input.write(curve.clone());
                self.num_refreshes.fetch_add(1, Ordering::Relaxed);
                force_refresh = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EqConfig, ProcessConfig};
    use crate::eq_params::EqParams;
    use crate::params::Param;
    use crate::processor::EqProcessor;

    /// Poll `condition` for up to five seconds.
    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }

        false
    }

    fn prepared_evaluator() -> (EqProcessor, ResponseEvaluator) {
        let (mut processor, evaluator) =
            EqProcessor::new(Arc::new(EqParams::default()), EqConfig::default());
        processor
            .prepare(ProcessConfig {
                sample_rate: 48_000.0,
                max_buffer_size: 256,
                num_channels: 2,
            })
            .unwrap();

        (processor, evaluator)
    }

    #[test]
    fn publishes_the_first_curve_immediately() {
        let (_processor, evaluator) = prepared_evaluator();
        let (refresher, mut output) =
            CurveRefresher::spawn(evaluator, CurveConfig::default(), Duration::from_secs(60))
                .unwrap();

        assert!(wait_for(|| output.updated()));
        assert!(output.read().len() >= CurveConfig::default().base_points);
        assert_eq!(refresher.num_refreshes(), 1);
    }

    #[test]
    fn refresh_requests_are_honored() {
        let (_processor, evaluator) = prepared_evaluator();
        let (refresher, _output) =
            CurveRefresher::spawn(evaluator, CurveConfig::default(), Duration::from_secs(60))
                .unwrap();

        assert!(wait_for(|| refresher.num_refreshes() == 1));
        assert!(refresher.request_refresh());
        assert!(wait_for(|| refresher.num_refreshes() == 2));
    }

    #[test]
    fn unchanged_filters_are_not_resampled() {
        let (_processor, evaluator) = prepared_evaluator();
        let (refresher, _output) =
            CurveRefresher::spawn(evaluator, CurveConfig::default(), Duration::from_millis(1))
                .unwrap();

        assert!(wait_for(|| refresher.num_refreshes() == 1));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(refresher.num_refreshes(), 1);
    }

    #[test]
    fn a_refresh_samples_a_single_published_state() {
        let (mut processor, mut evaluator) = prepared_evaluator();
        let params = processor.params().clone();
        params.hpf.enabled.set_plain_value(false);
        params.lpf.enabled.set_plain_value(false);
        for band in &params.bands {
            band.enabled.set_plain_value(false);
        }
        processor.snapshot_parameters();
        processor.update_dirty_filters();
        let mut response = evaluator.snapshot();

        // New filters get published between taking the snapshot and sampling it
        let band = &params.bands[2];
        band.enabled.set_plain_value(true);
        band.frequency.set_plain_value(900.0);
        band.q.set_plain_value(6.0);
        band.gain.set_plain_value(-15.0);
        processor.snapshot_parameters();
        assert_eq!(processor.update_dirty_filters(), 1);

        let mut sampler = CurveSampler::new(CurveConfig::default());
        let curve = sampler.refresh(&mut response);
        assert_eq!(curve.len(), CurveConfig::default().base_points);
        assert!(curve
            .iter_db()
            .all(|(_, magnitude_db)| magnitude_db.abs() < 1e-9));

        // The newer filters are still waiting for the next tick
        assert!(evaluator.has_update());
        let mut response = evaluator.snapshot();
        let curve = sampler.refresh(&mut response);
        assert!(curve.len() > CurveConfig::default().base_points);
        assert!(curve
            .iter_db()
            .any(|(_, magnitude_db)| magnitude_db < -14.0));
    }

    #[test]
    fn new_filters_are_picked_up() {
        let (mut processor, evaluator) = prepared_evaluator();
        let (refresher, mut output) =
            CurveRefresher::spawn(evaluator, CurveConfig::default(), Duration::from_millis(60_000))
                .unwrap();
        assert!(wait_for(|| refresher.num_refreshes() == 1));
        assert!(refresher.set_interval(Duration::from_millis(1)));

        processor.params().bands[0].gain.set_plain_value(12.0);
        processor.snapshot_parameters();
        assert_eq!(processor.update_dirty_filters(), 1);

        assert!(wait_for(|| refresher.num_refreshes() >= 2));
        assert!(wait_for(|| {
            output
                .read()
                .iter_db()
                .any(|(_, magnitude_db)| magnitude_db > 11.0)
        }));
    }
}
