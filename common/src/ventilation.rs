use serde::{Deserialize, Serialize};

/// CO2 concentration of fresh outdoor air, in ppm.
pub const CO2_BASELINE_PPM: f64 = 400.0;

/// Rooms reporting CO2 levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Co2Source {
    Eetpl,
    BandB,
    Slak,
}

impl Co2Source {
    pub const ALL: [Co2Source; 3] = [Self::Eetpl, Self::BandB, Self::Slak];

    pub fn index(self) -> usize {
        match self {
            Self::Eetpl => 0,
            Self::BandB => 1,
            Self::Slak => 2,
        }
    }

    /// Event subject the room prefixes its CO2 reading with.
    pub fn subject(self) -> &'static str {
        match self {
            Self::Eetpl => "EETPL",
            Self::BandB => "BandB",
            Self::Slak => "SLAK",
        }
    }
}

/// Manual fan settings. The fan PWM input is inverted: 255 stops the fans
/// and 0 runs them at full speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanSetting {
    On,
    Full,
    Off,
}

impl FanSetting {
    pub fn level(self) -> u8 {
        match self {
            Self::On => 120,
            Self::Full => 0,
            Self::Off => 255,
        }
    }
}

/// Demand-based fan level from room CO2 excess. The computed level is kept
/// for reporting only; the fans are driven by manual settings.
#[derive(Debug, Clone, Default)]
pub struct Ventilation {
    excess_ppm: [i32; 3],
    demand_level: u8,
}

impl Ventilation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn excess_ppm(&self, source: Co2Source) -> i32 {
        self.excess_ppm[source.index()]
    }

    pub fn demand_level(&self) -> u8 {
        self.demand_level
    }

    pub fn update(&mut self, source: Co2Source, ppm: f64) -> u8 {
        // `as` saturates out-of-range and NaN readings.
        self.excess_ppm[source.index()] = (ppm - CO2_BASELINE_PPM) as i32;
        let sum: i64 = self.excess_ppm.iter().map(|excess| i64::from(*excess)).sum();
        self.demand_level = sum.clamp(0, i64::from(u8::MAX)) as u8;
        self.demand_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demand_sums_excess_and_clamps() {
        let mut vent = Ventilation::new();
        assert_eq!(vent.update(Co2Source::Eetpl, 450.0), 50);
        assert_eq!(vent.update(Co2Source::Slak, 480.0), 130);
        assert_eq!(vent.update(Co2Source::BandB, 900.0), 255);
        assert_eq!(vent.excess_ppm(Co2Source::BandB), 500);
    }

    #[test]
    fn absurd_readings_saturate_instead_of_overflowing() {
        let mut vent = Ventilation::new();
        let huge = match crate::EventKind::parse("EETPL:99999999999").unwrap() {
            crate::EventKind::Co2 { ppm, .. } => ppm,
            other => panic!("expected a CO2 reading, got {other:?}"),
        };
        vent.update(Co2Source::Eetpl, huge);
        vent.update(Co2Source::Slak, huge);
        assert_eq!(vent.update(Co2Source::BandB, huge), 255);
        assert_eq!(vent.excess_ppm(Co2Source::Slak), i32::MAX);

        assert_eq!(vent.update(Co2Source::Eetpl, -1e12), 255);
        assert_eq!(vent.update(Co2Source::Slak, f64::NAN), 0);
    }

    #[test]
    fn fresh_air_cancels_excess() {
        let mut vent = Ventilation::new();
        vent.update(Co2Source::Eetpl, 420.0);
        assert_eq!(vent.update(Co2Source::BandB, 350.0), 0);
    }
}
