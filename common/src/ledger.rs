use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Samples per hour at the fixed one-minute cadence.
const SAMPLES_PER_HOUR: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerMode {
    /// The sample is an instantaneous power in kW; one minute of it is added.
    Rate,
    /// The sample is a level in kWh; only rises since the previous sample are
    /// added.
    Delta,
}

/// The persisted part of a ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub total_kwh: f64,
    pub hour_kwh: f64,
    pub previous_hour_total_kwh: f64,
    #[serde(default)]
    pub last_rollover: Option<NaiveDateTime>,
}

/// Energy accumulator with per-hour and all-time figures.
///
/// `sample` must be called once per minute; the rate scaling depends on it.
#[derive(Debug, Clone)]
pub struct EnergyLedger {
    mode: LedgerMode,
    state: LedgerSnapshot,
    previous_level: Option<f64>,
    last_increment: f64,
}

impl EnergyLedger {
    pub fn new(mode: LedgerMode) -> Self {
        Self::restore(mode, LedgerSnapshot::default())
    }

    pub fn restore(mode: LedgerMode, snapshot: LedgerSnapshot) -> Self {
        Self {
            mode,
            state: snapshot,
            previous_level: None,
            last_increment: 0.0,
        }
    }

    pub fn mode(&self) -> LedgerMode {
        self.mode
    }

    pub fn total_kwh(&self) -> f64 {
        self.state.total_kwh
    }

    /// Energy accumulated during the last completed hour.
    pub fn hour_kwh(&self) -> f64 {
        self.state.hour_kwh
    }

    pub fn previous_hour_total_kwh(&self) -> f64 {
        self.state.previous_hour_total_kwh
    }

    /// Change of the raw level seen by the last delta sample, negative
    /// values included.
    pub fn last_increment(&self) -> f64 {
        self.last_increment
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state.clone()
    }

    /// Adds one sample and rolls the hour over when the wall clock is at
    /// minute zero. Returns true when the hour rolled over.
    pub fn sample(&mut self, value: f64, wall: NaiveDateTime) -> bool {
        match self.mode {
            LedgerMode::Rate => {
                let increment = value / SAMPLES_PER_HOUR;
                self.last_increment = increment;
                self.state.total_kwh += increment;
            }
            LedgerMode::Delta => {
                // After a restart the first level only seeds the reference.
                let increment = self
                    .previous_level
                    .map(|previous| value - previous)
                    .unwrap_or(0.0);
                self.last_increment = increment;
                if increment > 0.0 {
                    self.state.total_kwh += increment;
                }
                self.previous_level = Some(value);
            }
        }

        self.rollover_if_due(wall)
    }

    /// Rolls the hour over without adding a sample.
    pub fn rollover_if_due(&mut self, wall: NaiveDateTime) -> bool {
        if wall.minute() != 0 {
            return false;
        }
        let Some(hour_start) = wall.date().and_hms_opt(wall.hour(), 0, 0) else {
            return false;
        };
        if self.state.last_rollover == Some(hour_start) {
            return false;
        }

        self.state.hour_kwh = self.state.total_kwh - self.state.previous_hour_total_kwh;
        self.state.previous_hour_total_kwh = self.state.total_kwh;
        self.state.last_rollover = Some(hour_start);
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 12)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn rate_mode_adds_one_minute_of_power() {
        let mut ledger = EnergyLedger::new(LedgerMode::Rate);
        for minute in 1..=30 {
            ledger.sample(6.0, at(10, minute, 0));
        }
        assert!(approx(ledger.total_kwh(), 3.0));
    }

    #[test]
    fn delta_mode_never_decreases() {
        let mut ledger = EnergyLedger::new(LedgerMode::Delta);
        let levels = [5.0, 6.5, 6.0, 4.0, 4.5, 9.0, 1.0];
        let mut previous_total = ledger.total_kwh();

        for (minute, level) in levels.into_iter().enumerate() {
            ledger.sample(level, at(10, minute as u32 + 1, 0));
            assert!(ledger.total_kwh() >= previous_total);
            previous_total = ledger.total_kwh();
        }

        // +1.5, +0.5, +4.5; the first level only seeds the reference.
        assert!(approx(ledger.total_kwh(), 6.5));
        assert!(approx(ledger.last_increment(), -8.0));
    }

    #[test]
    fn hour_rolls_over_once_for_polls_straddling_minute_zero() {
        let mut ledger = EnergyLedger::new(LedgerMode::Rate);
        ledger.sample(60.0, at(10, 59, 30));

        assert!(ledger.sample(60.0, at(11, 0, 5)));
        let first = ledger.snapshot();
        assert!(approx(first.previous_hour_total_kwh, 2.0));
        assert!(approx(first.hour_kwh, 2.0));

        assert!(!ledger.sample(60.0, at(11, 0, 55)));
        let second = ledger.snapshot();
        assert_eq!(second.previous_hour_total_kwh, first.previous_hour_total_kwh);
        assert_eq!(second.hour_kwh, first.hour_kwh);
        assert!(approx(second.total_kwh, 3.0));
    }

    #[test]
    fn hour_accumulation_is_difference_between_snapshots() {
        let mut ledger = EnergyLedger::new(LedgerMode::Rate);
        ledger.sample(0.0, at(9, 0, 0));
        for minute in 1..60 {
            ledger.sample(3.0, at(9, minute, 0));
        }
        ledger.sample(3.0, at(10, 0, 0));

        // 60 samples of 3 kW = 3 kWh
        assert!(approx(ledger.hour_kwh(), 3.0));
        assert!(approx(ledger.previous_hour_total_kwh(), ledger.total_kwh()));
    }

    #[test]
    fn restored_snapshot_does_not_roll_twice_in_same_hour() {
        let mut ledger = EnergyLedger::new(LedgerMode::Rate);
        ledger.sample(60.0, at(11, 0, 5));
        let persisted = ledger.snapshot();

        let mut restored = EnergyLedger::restore(LedgerMode::Rate, persisted.clone());
        assert!(!restored.sample(60.0, at(11, 0, 40)));
        assert_eq!(restored.hour_kwh(), persisted.hour_kwh);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut ledger = EnergyLedger::new(LedgerMode::Delta);
        ledger.sample(2.0, at(8, 0, 0));
        ledger.sample(3.0, at(8, 1, 0));

        let raw = serde_json::to_string(&ledger.snapshot()).unwrap();
        let parsed: LedgerSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, ledger.snapshot());
    }
}
