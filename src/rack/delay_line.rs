/// Fixed-capacity circular buffer with linearly interpolated fractional reads.
///
/// The write cursor advances by exactly one slot per `write`. Reads are
/// addressed relative to the newest sample: a delay of `0.0` returns the
/// sample just written, `1.0` the one before it, and so on.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "delay line needs at least two slots");
        Self {
            buffer: vec![0.0; capacity],
            write_pos: 0,
        }
    }

    /// Longest delay that can be read back.
    pub fn max_delay(&self) -> f32 {
        (self.buffer.len() - 2) as f32
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    #[inline]
    pub fn read(&self, delay: f32) -> f32 {
        debug_assert!(delay.is_finite(), "non-finite delay {delay}");
        let len = self.buffer.len();
        let delay = delay.clamp(0.0, self.max_delay());
        let whole = delay as usize;
        let frac = delay - whole as f32;

        // newest sample lives one slot behind the write cursor
        let newest = self.write_pos + len - 1;
        let near = (newest - whole) % len;
        let far = (newest - whole - 1) % len;

        (1.0 - frac).mul_add(self.buffer[near], frac * self.buffer[far])
    }
}
