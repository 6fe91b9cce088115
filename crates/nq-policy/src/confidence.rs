//! Confidence gate: low self-reported confidence is treated as a schema mismatch.

/// Gate applied to SQL-generation confidence (0-100 scale).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceGate {
    pub threshold: f64,
}

impl ConfidenceGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Strictly below the threshold means re-run schema selection.
    pub fn requires_reanalysis(&self, confidence: f64) -> bool {
        confidence < self.threshold
    }

    /// Error text attached to the synthetic SemanticError.
    pub fn rejection_message(&self, confidence: f64) -> String {
        format!("Low confidence ({confidence}%). Agent suggests schema re-analysis.")
    }
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self::new(50.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_exclusive() {
        let gate = ConfidenceGate::default();
        assert!(gate.requires_reanalysis(30.0));
        assert!(gate.requires_reanalysis(49.9));
        assert!(!gate.requires_reanalysis(50.0));
        assert!(!gate.requires_reanalysis(95.0));
    }

    #[test]
    fn rejection_message_mentions_low_confidence() {
        let msg = ConfidenceGate::default().rejection_message(30.0);
        assert!(msg.contains("Low confidence"));
        assert!(msg.contains("30"));
    }
}
