//! The audio buffer passed to [`EqProcessor::process()`][crate::processor::EqProcessor::process()].

/// A block of audio, processed in place. This wraps one slice per channel. The slices are
/// borrowed, so the host's buffers can be passed to the processor without copying them.
#[derive(Debug)]
pub struct Buffer<'a, 'b> {
    channels: &'a mut [&'b mut [f32]],
}

impl<'a, 'b> Buffer<'a, 'b> {
    /// Wrap a set of channel slices. All channels should have the same length.
    pub fn new(channels: &'a mut [&'b mut [f32]]) -> Self {
        peq_debug_assert!(
            channels.windows(2).all(|pair| pair[0].len() == pair[1].len()),
            "Channels have different lengths"
        );

        Self { channels }
    }

    /// The number of samples in the buffer. If the channels differ in length, this is the length
    /// of the shortest channel and the remaining samples are never touched.
    pub fn samples(&self) -> usize {
        self.channels
            .iter()
            .map(|channel| channel.len())
            .min()
            .unwrap_or(0)
    }

    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    /// Returns true if this buffer does not contain any samples.
    pub fn is_empty(&self) -> bool {
        self.samples() == 0
    }

    /// The raw channel slices.
    pub fn as_slice(&mut self) -> &mut [&'b mut [f32]] {
        &mut *self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_dimensions() {
        let mut left = [0.0f32; 16];
        let mut right = [0.0f32; 16];
        let mut channels = [&mut left[..], &mut right[..]];
        let mut buffer = Buffer::new(&mut channels);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.samples(), 16);

        buffer.as_slice()[1][3] = 1.0;
        assert_eq!(buffer.as_slice()[1][3], 1.0);
    }

    #[test]
    fn no_channels_means_no_samples() {
        let mut channels: [&mut [f32]; 0] = [];
        let buffer = Buffer::new(&mut channels);
        assert!(buffer.is_empty());
    }
}
