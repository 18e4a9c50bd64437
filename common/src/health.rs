use crate::error::BusMismatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusCheck {
    Ok,
    Mismatch(BusMismatch),
    /// The mismatch count reached the threshold; the bus is considered
    /// corrupted and the controller must restart.
    Escalate(BusMismatch),
}

/// Cross-checks the circulation pump feedback line against the commanded
/// heat demand. The feedback line is active low.
#[derive(Debug, Clone)]
pub struct BusHealthMonitor {
    threshold: u32,
    mismatches: u32,
}

impl BusHealthMonitor {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            mismatches: 0,
        }
    }

    pub fn mismatches(&self) -> u32 {
        self.mismatches
    }

    pub fn check(&mut self, demand_w: u32, feedback_low: bool) -> BusCheck {
        let mismatch = match (demand_w > 0, feedback_low) {
            (false, true) => BusMismatch::PumpOnWithoutDemand,
            (true, false) => BusMismatch::PumpOffWithDemand,
            _ => return BusCheck::Ok,
        };

        self.mismatches += 1;
        if self.mismatches >= self.threshold {
            BusCheck::Escalate(mismatch)
        } else {
            BusCheck::Mismatch(mismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn matching_feedback_is_ok() {
        let mut monitor = BusHealthMonitor::new(5);
        assert_eq!(monitor.check(0, false), BusCheck::Ok);
        assert_eq!(monitor.check(1254, true), BusCheck::Ok);
        assert_eq!(monitor.mismatches(), 0);
    }

    #[test]
    fn four_mismatches_do_not_escalate() {
        let mut monitor = BusHealthMonitor::new(5);
        for _ in 0..4 {
            assert_eq!(
                monitor.check(0, true),
                BusCheck::Mismatch(BusMismatch::PumpOnWithoutDemand)
            );
        }
        assert_eq!(monitor.mismatches(), 4);
    }

    #[test]
    fn fifth_cumulative_mismatch_escalates() {
        let mut monitor = BusHealthMonitor::new(5);
        monitor.check(0, true);
        monitor.check(916, false);
        monitor.check(916, true);
        monitor.check(0, true);
        monitor.check(460, false);
        assert_eq!(monitor.mismatches(), 4);

        assert_eq!(
            monitor.check(460, false),
            BusCheck::Escalate(BusMismatch::PumpOffWithDemand)
        );
    }
}
