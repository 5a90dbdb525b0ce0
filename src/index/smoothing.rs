/// One EWMA step. `prev = None` seeds with the raw value.
pub fn ewma(alpha: f64, raw: f64, prev: Option<f64>) -> f64 {
    match prev {
        Some(prev) => alpha * raw + (1.0 - alpha) * prev,
        None => raw,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmoothedPair {
    pub wf_smoothed: f64,
    pub wc_smoothed: f64,
}

/// Exponential smoothing of both basket values.
///
/// `smooth` only computes; nothing changes until `commit`, so a tick that
/// fails after smoothing leaves the EWMA state exactly as it was.
#[derive(Clone, Debug)]
pub struct SmoothingEngine {
    alpha_f: f64,
    alpha_c: f64,
    state: Option<SmoothedPair>,
}

impl SmoothingEngine {
    pub fn new(alpha_f: f64, alpha_c: f64) -> Self {
        SmoothingEngine {
            alpha_f,
            alpha_c,
            state: None,
        }
    }

    pub fn set_alphas(&mut self, alpha_f: f64, alpha_c: f64) {
        self.alpha_f = alpha_f;
        self.alpha_c = alpha_c;
    }

    pub fn smooth(&self, raw_f: f64, raw_c: f64) -> SmoothedPair {
        SmoothedPair {
            wf_smoothed: ewma(self.alpha_f, raw_f, self.state.map(|s| s.wf_smoothed)),
            wc_smoothed: ewma(self.alpha_c, raw_c, self.state.map(|s| s.wc_smoothed)),
        }
    }

    pub fn commit(&mut self, pair: SmoothedPair) {
        self.state = Some(pair);
    }

    /// Seed from a persisted tick on warm start.
    pub fn restore(&mut self, pair: SmoothedPair) {
        self.state = Some(pair);
    }

    pub fn state(&self) -> Option<SmoothedPair> {
        self.state
    }
}
