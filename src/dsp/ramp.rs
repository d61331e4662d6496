/// Linear parameter ramp used for click-free gain changes.
///
/// Holds its value until `ramp_to` is called, then moves to the target in a
/// straight line over the requested number of samples.
pub struct LinearRamp {
    value: f32,
    target: f32,
    step: f32,
    remaining: u32,
}

impl LinearRamp {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            target: value,
            step: 0.0,
            remaining: 0,
        }
    }

    /// Start a ramp from the current value. A zero length jumps immediately.
    pub fn ramp_to(&mut self, target: f32, samples: u32) {
        self.target = target;
        if samples == 0 {
            self.value = target;
            self.remaining = 0;
            return;
        }
        self.step = (target - self.value) / samples as f32;
        self.remaining = samples;
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.value = if self.remaining == 0 {
                self.target
            } else {
                self.value + self.step
            };
        }
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_ramping(&self) -> bool {
        self.remaining > 0
    }
}
