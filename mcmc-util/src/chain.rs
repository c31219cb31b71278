/// Trace of a random-walk Metropolis-Hastings run.
///
/// One entry per step: the parameter value and the log score held after
/// the step (unchanged on rejection).
#[derive(Debug, Clone, Default)]
pub struct MhChain {
    pub values: Vec<f64>,
    pub log_scores: Vec<f64>,
    pub accepted: usize,
    pub rejected: usize,
    pub out_of_support: usize,
}

impl MhChain {
    pub fn with_capacity(steps: usize) -> Self {
        Self {
            values: Vec::with_capacity(steps),
            log_scores: Vec::with_capacity(steps),
            ..Default::default()
        }
    }

    pub fn n_steps(&self) -> usize {
        self.values.len()
    }

    pub fn push(&mut self, value: f64, log_score: f64) {
        self.values.push(value);
        self.log_scores.push(log_score);
    }

    /// Fraction of steps whose proposal was accepted.
    pub fn acceptance_rate(&self) -> f64 {
        let n = self.n_steps();
        if n == 0 {
            return 0.0;
        }
        self.accepted as f64 / n as f64
    }

    pub fn last_value(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn last_log_score(&self) -> Option<f64> {
        self.log_scores.last().copied()
    }

    /// Mean of the visited values.
    pub fn posterior_mean(&self) -> Option<f64> {
        let n = self.n_steps();
        if n == 0 {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / n as f64)
    }
}
