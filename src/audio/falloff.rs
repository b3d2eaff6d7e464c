/// Per-channel decay state: the gravity-blended bars that get drawn and a
/// separate peak-hold envelope.
#[derive(Debug, Clone, Default)]
pub struct Falloff {
    current: Vec<f64>,
    peaks: Vec<f64>,
}

impl Falloff {
    pub fn new(detail: usize) -> Self {
        Self {
            current: vec![0.0; detail],
            peaks: vec![0.0; detail],
        }
    }

    /// Keep existing values where possible when detail changes.
    pub fn resize(&mut self, detail: usize) {
        self.current.resize(detail, 0.0);
        self.peaks.resize(detail, 0.0);
    }

    pub fn current(&self) -> &[f64] {
        &self.current
    }

    pub fn peaks(&self) -> &[f64] {
        &self.peaks
    }

    /// Blend `new` into the visible bars and advance the peak envelope.
    pub fn apply(&mut self, new: &[f64], gravity: f64, falloff_weight: f64) {
        self.resize(new.len());

        for ((current, peak), &value) in self.current.iter_mut().zip(&mut self.peaks).zip(new) {
            *current = *current * gravity + value * (1.0 - gravity);

            let decayed = (*peak * falloff_weight).min(*peak - 1.0);
            *peak = decayed.max(value).max(0.0);
        }
    }
}
