use serde::Deserialize;

use hvac_common::EventKind;

const HEATING_RISE_C: f64 = 0.15;
const COOLING_DROP_C: f64 = 0.1;
/// Ticks for one rise and fall of the simulated humidity.
const HUMIDITY_PERIOD_TICKS: u64 = 40;
const HUMIDITY_MIN_PCT: f64 = 55.0;
const HUMIDITY_MAX_PCT: f64 = 85.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RoomSettings {
    pub setpoint_c: f64,
    pub hysteresis_c: f64,
    /// Report condensation heat demand; only the wet rooms do.
    pub track_humidity: bool,
    pub humidity_on_pct: f64,
    pub humidity_off_pct: f64,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            setpoint_c: 20.0,
            hysteresis_c: 0.5,
            track_humidity: false,
            humidity_on_pct: 75.0,
            humidity_off_pct: 70.0,
        }
    }
}

/// A room thermostat with a crude thermal model: the room warms while it asks
/// for heat and cools otherwise.
#[derive(Debug, Clone)]
pub struct RoomModel {
    settings: RoomSettings,
    temp_c: f64,
    heat_demand: bool,
    condensation: bool,
    tick: u64,
}

impl RoomModel {
    pub fn new(settings: RoomSettings, temp_c: f64) -> Self {
        Self {
            settings,
            temp_c,
            heat_demand: false,
            condensation: false,
            tick: 0,
        }
    }

    pub fn temp_c(&self) -> f64 {
        self.temp_c
    }

    pub fn humidity_pct(&self) -> f64 {
        let half = HUMIDITY_PERIOD_TICKS / 2;
        let phase = self.tick % HUMIDITY_PERIOD_TICKS;
        let rising = if phase < half { phase } else { HUMIDITY_PERIOD_TICKS - phase };
        HUMIDITY_MIN_PCT + (HUMIDITY_MAX_PCT - HUMIDITY_MIN_PCT) * rising as f64 / half as f64
    }

    /// Advances one tick and returns the events to publish. The thermostat
    /// state goes out every tick so the controller keeps seeing the node;
    /// condensation only when it changes.
    pub fn step(&mut self) -> Vec<EventKind> {
        self.tick = self.tick.wrapping_add(1);
        self.temp_c += if self.heat_demand {
            HEATING_RISE_C
        } else {
            -COOLING_DROP_C
        };

        let lower = self.settings.setpoint_c - self.settings.hysteresis_c;
        let upper = self.settings.setpoint_c + self.settings.hysteresis_c;
        if !self.heat_demand && self.temp_c < lower {
            self.heat_demand = true;
        } else if self.heat_demand && self.temp_c > upper {
            self.heat_demand = false;
        }

        let mut events = vec![EventKind::Thermostat(self.heat_demand)];

        if self.settings.track_humidity {
            let humidity = self.humidity_pct();
            let condensation = if self.condensation {
                humidity >= self.settings.humidity_off_pct
            } else {
                humidity > self.settings.humidity_on_pct
            };
            if condensation != self.condensation {
                self.condensation = condensation;
                events.push(EventKind::Condensation(condensation));
            }
        }

        events
    }
}
