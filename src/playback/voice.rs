pub fn midi_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

/// One sounding tone inside the audio callback. Times are in samples on the
/// output's own counter.
#[derive(Debug, Clone)]
pub struct Voice {
    pub handle: u64,
    pub start_sample: u64,
    pub stop_sample: u64,
    pub frequency: f32,
    /// Level at `start_sample`, 0.0 -> 1.0
    pub gain: f32,
    phase: f32,
}

impl Voice {
    pub fn new(
        handle: u64,
        start_sample: u64,
        stop_sample: u64,
        frequency: f32,
        gain: f32,
    ) -> Self {
        Self {
            handle,
            start_sample,
            stop_sample,
            frequency,
            gain,
            phase: 0.0,
        }
    }

    /// Linear release from `gain` at the start down to silence at the stop.
    pub fn envelope(&self, sample: u64) -> f32 {
        if sample < self.start_sample || sample >= self.stop_sample {
            return 0.0;
        }
        let length = (self.stop_sample - self.start_sample) as f32;
        let elapsed = (sample - self.start_sample) as f32;
        self.gain * (1.0 - elapsed / length)
    }

    pub fn is_finished(&self, sample: u64) -> bool {
        sample >= self.stop_sample
    }

    pub fn render_sample(&mut self, sample: u64, sample_rate: f32) -> f32 {
        let level = self.envelope(sample);
        if level == 0.0 {
            return 0.0;
        }
        let out = triangle(self.phase) * level;
        self.phase += self.frequency / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        out
    }
}

fn triangle(phase: f32) -> f32 {
    1.0 - 4.0 * (phase - 0.5).abs()
}
