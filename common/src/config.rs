use serde::{Deserialize, Serialize};

use crate::{
    ledger::LedgerSnapshot,
    types::{BoilerId, HeatMode},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HvacConfig {
    pub heat_set_interval_ms: u64,
    pub sensor_interval_ms: u64,
    pub sensor_conversion_ms: u64,
    pub sensor_stale_timeout_ms: u64,
    pub ledger_interval_ms: u64,
    pub node_timeout_ms: u64,
    pub supply_hold_ms: u64,
    pub bus_error_threshold: u32,
    pub boiler_min_useful_c: f64,
    pub transfer_start_kwh: f64,
    pub transfer_stop_kwh: f64,
    pub transfer_max_duration_ms: u64,
    pub transfer_check_interval_ms: u64,
    pub transfer_destination: BoilerId,
    pub initial_mode: HeatMode,
}

impl Default for HvacConfig {
    fn default() -> Self {
        Self {
            heat_set_interval_ms: 60_000,
            sensor_interval_ms: 10_000,
            sensor_conversion_ms: 1_000,
            sensor_stale_timeout_ms: 3_600_000,
            ledger_interval_ms: 60_000,
            node_timeout_ms: 600_000,
            supply_hold_ms: 5_000,
            bus_error_threshold: 5,
            boiler_min_useful_c: 25.0,
            transfer_start_kwh: 15.0,
            transfer_stop_kwh: 12.0,
            transfer_max_duration_ms: 300_000,
            transfer_check_interval_ms: 60_000,
            transfer_destination: BoilerId::Sch,
            initial_mode: HeatMode::Home,
        }
    }
}

impl HvacConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();

        self.heat_set_interval_ms = self.heat_set_interval_ms.clamp(1_000, 600_000);
        self.sensor_interval_ms = self.sensor_interval_ms.clamp(2_000, 600_000);
        self.sensor_conversion_ms = self.sensor_conversion_ms.clamp(750, 2_000);
        // Energy scaling assumes one ledger sample per minute.
        self.ledger_interval_ms = defaults.ledger_interval_ms;
        self.node_timeout_ms = self.node_timeout_ms.max(60_000);
        self.supply_hold_ms = self.supply_hold_ms.clamp(500, 30_000);
        self.bus_error_threshold = self.bus_error_threshold.max(1);
        self.boiler_min_useful_c = self.boiler_min_useful_c.clamp(10.0, 60.0);

        if !(self.transfer_stop_kwh.is_finite() && self.transfer_start_kwh.is_finite())
            || self.transfer_stop_kwh >= self.transfer_start_kwh
        {
            self.transfer_start_kwh = defaults.transfer_start_kwh;
            self.transfer_stop_kwh = defaults.transfer_stop_kwh;
        }
        self.transfer_max_duration_ms = self.transfer_max_duration_ms.max(10_000);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub hvac: HvacConfig,
    pub timezone: String,
    pub network: NetworkConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            hvac: HvacConfig::default(),
            timezone: "Europe/Brussels".to_string(),
            network: NetworkConfig::default(),
        }
    }
}

/// Counters that survive a restart: the three energy ledgers and the
/// energy pumped from the solar buffer into each boiler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub heat_demand: LedgerSnapshot,
    pub sch_energy: LedgerSnapshot,
    pub won_energy: LedgerSnapshot,
    pub transferred_sch_kwh: f64,
    pub transferred_won_kwh: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_transfer_band_falls_back_to_defaults() {
        let mut config = HvacConfig {
            transfer_start_kwh: 10.0,
            transfer_stop_kwh: 14.0,
            ..HvacConfig::default()
        };
        config.sanitize();

        assert_eq!(config.transfer_start_kwh, 15.0);
        assert_eq!(config.transfer_stop_kwh, 12.0);
    }

    #[test]
    fn ledger_cadence_is_pinned_to_one_minute() {
        let mut config = HvacConfig {
            ledger_interval_ms: 5_000,
            ..HvacConfig::default()
        };
        config.sanitize();

        assert_eq!(config.ledger_interval_ms, 60_000);
    }

    #[test]
    fn runtime_config_parses_from_json() {
        let raw = r#"{"hvac":{
            "heat_set_interval_ms":5000,"sensor_interval_ms":10000,"sensor_conversion_ms":1000,
            "sensor_stale_timeout_ms":3600000,"ledger_interval_ms":60000,"node_timeout_ms":600000,
            "supply_hold_ms":5000,"bus_error_threshold":5,"boiler_min_useful_c":25.0,
            "transfer_start_kwh":15.0,"transfer_stop_kwh":12.0,"transfer_max_duration_ms":300000,
            "transfer_check_interval_ms":60000,"transfer_destination":"SCH","initial_mode":"AWAY"},
            "timezone":"Europe/Brussels",
            "network":{"mqtt_host":"broker","mqtt_port":1883,"mqtt_user":"","mqtt_pass":""}}"#;

        let runtime: RuntimeConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(runtime.hvac.initial_mode, HeatMode::Away);
        assert_eq!(runtime.hvac.heat_set_interval_ms, 5_000);
        assert_eq!(runtime.network.mqtt_host, "broker");
    }

    #[test]
    fn persisted_state_tolerates_missing_fields() {
        let state: PersistedState =
            serde_json::from_str(r#"{"transferred_sch_kwh":3.5}"#).unwrap();
        assert_eq!(state.transferred_sch_kwh, 3.5);
        assert_eq!(state.heat_demand, LedgerSnapshot::default());
    }
}
