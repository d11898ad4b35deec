//! Debounce gate for pose tracking confidence.

/// Counts consecutive confident frames.
///
/// A single unconfident frame discards the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityGate {
    run: u32,
    required: u32,
}

impl StabilityGate {
    /// Create a gate that opens after `required` consecutive confident frames.
    pub fn new(required: u32) -> Self {
        Self { run: 0, required }
    }

    /// Record one frame.
    pub fn observe(&mut self, confident: bool) {
        if confident {
            self.run = self.run.saturating_add(1);
        } else {
            self.run = 0;
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.run >= self.required
    }

    /// Current number of consecutive confident frames.
    pub fn run_length(&self) -> u32 {
        self.run
    }

    pub fn required(&self) -> u32 {
        self.required
    }

    pub fn reset(&mut self) {
        self.run = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_opens_after_run() {
        let mut gate = StabilityGate::new(3);
        gate.observe(true);
        gate.observe(true);
        assert!(!gate.is_satisfied());
        gate.observe(true);
        assert!(gate.is_satisfied());
        gate.observe(true);
        assert_eq!(gate.run_length(), 4);
        assert!(gate.is_satisfied());
    }

    #[test]
    fn test_single_miss_resets_run() {
        let mut gate = StabilityGate::new(8);
        for _ in 0..20 {
            gate.observe(true);
        }
        gate.observe(false);
        assert_eq!(gate.run_length(), 0);
        assert!(!gate.is_satisfied());
    }

    #[test]
    fn test_zero_requirement_is_always_open() {
        let mut gate = StabilityGate::new(0);
        assert!(gate.is_satisfied());
        gate.observe(false);
        assert!(gate.is_satisfied());
    }
}
