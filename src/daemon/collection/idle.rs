/// Decides when the user counts as away from the computer.
#[derive(Debug, Clone, Copy)]
pub struct IdleEvaluator {
    threshold_s: u64,
}

impl IdleEvaluator {
    pub fn from_seconds(threshold_s: u64) -> Self {
        Self { threshold_s }
    }

    pub fn is_idle(&self, idle_seconds: u64) -> bool {
        self.threshold_s <= idle_seconds
    }
}
