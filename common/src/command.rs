use std::str::FromStr;

use crate::{
    error::CommandError,
    types::{BoilerId, CircuitId, HeatMode},
    ventilation::FanSetting,
};

/// Result code of `reset`; the controller restarts after replying.
pub const RESTART_CODE: i32 = -10_000;
pub const SUPPLY_CODE: i32 = 5;
pub const REPORT_STATUS_CODE: i32 = 1001;
pub const REPORT_SENSORS_CODE: i32 = 1002;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetMode(HeatMode),
    Circuit { id: CircuitId, on: bool },
    AllCircuits(bool),
    TransferPump { destination: BoilerId, on: bool },
    Restart,
    /// Power-cycle the shared 5 V supply of the remote nodes.
    SupplyReset,
    Supply(bool),
    Fan(FanSetting),
    ReportStatus,
    ReportSensors,
}

impl Command {
    /// Integer reply sent back to whoever issued the command.
    pub fn result_code(self) -> i32 {
        match self {
            Self::SetMode(mode) => mode.code(),
            Self::Circuit { id, on: true } => id.rated_power_w() as i32,
            Self::AllCircuits(true) => CircuitId::ALL
                .iter()
                .map(|id| id.rated_power_w() as i32)
                .sum(),
            Self::TransferPump {
                destination,
                on: true,
            } => destination.pump_code(),
            Self::Circuit { on: false, .. }
            | Self::AllCircuits(false)
            | Self::TransferPump { on: false, .. } => 0,
            Self::Restart => RESTART_CODE,
            Self::SupplyReset | Self::Supply(_) => SUPPLY_CODE,
            Self::Fan(setting) => setting.level() as i32,
            Self::ReportStatus => REPORT_STATUS_CODE,
            Self::ReportSensors => REPORT_SENSORS_CODE,
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    /// Accepts the short forms (`bbon`, `home`, ...) and the `KEY=0}` /
    /// `KEY=1}` forms sent by the phone app, case-insensitively.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let lowered = text.trim().to_ascii_lowercase();
        let command = match lowered.as_str() {
            "home" | "home=1}" | "manual=0}" => Self::SetMode(HeatMode::Home),
            "out" | "home=0}" => Self::SetMode(HeatMode::Away),
            "manual" | "manual=1}" => Self::SetMode(HeatMode::Manual),
            "allon" | "all=1}" => Self::AllCircuits(true),
            "alloff" | "all=0}" => Self::AllCircuits(false),
            "schon" | "sch=1}" => Self::TransferPump {
                destination: BoilerId::Sch,
                on: true,
            },
            "schoff" | "sch=0}" => Self::TransferPump {
                destination: BoilerId::Sch,
                on: false,
            },
            "wonon" | "won=1}" => Self::TransferPump {
                destination: BoilerId::Won,
                on: true,
            },
            "wonoff" | "won=0}" => Self::TransferPump {
                destination: BoilerId::Won,
                on: false,
            },
            "reset" => Self::Restart,
            "reset5v" => Self::SupplyReset,
            "5voff" => Self::Supply(false),
            "5von" => Self::Supply(true),
            "venton" => Self::Fan(FanSetting::On),
            "ventfull" => Self::Fan(FanSetting::Full),
            "ventoff" => Self::Fan(FanSetting::Off),
            "reportstatus" => Self::ReportStatus,
            "reportsensors" => Self::ReportSensors,
            other => parse_circuit(other)
                .ok_or_else(|| CommandError::Unrecognized(text.to_string()))?,
        };
        Ok(command)
    }
}

fn parse_circuit(lowered: &str) -> Option<Command> {
    let (tag, on) = if let Some(tag) = lowered.strip_suffix("=1}") {
        (tag, true)
    } else if let Some(tag) = lowered.strip_suffix("=0}") {
        (tag, false)
    } else if let Some(tag) = lowered.strip_suffix("off") {
        (tag, false)
    } else if let Some(tag) = lowered.strip_suffix("on") {
        (tag, true)
    } else {
        return None;
    };
    CircuitId::from_tag(tag).map(|id| Command::Circuit { id, on })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn code(text: &str) -> i32 {
        text.parse::<Command>()
            .map(Command::result_code)
            .unwrap_or(CommandError::CODE)
    }

    #[test]
    fn all_on_returns_total_rated_power() {
        assert_eq!(code("allon"), 6601);
        assert_eq!(code("ALL=1}"), 6601);
        assert_eq!(code("alloff"), 0);
    }

    #[test]
    fn circuit_commands_return_rated_power() {
        assert_eq!(
            "bbon".parse::<Command>().unwrap(),
            Command::Circuit {
                id: CircuitId::Bb,
                on: true,
            }
        );
        assert_eq!(code("bbon"), 1254);
        assert_eq!(code("WP=1}"), 1096);
        assert_eq!(code("ikon"), 1025);
        assert_eq!(code("kkon"), 1018);
        assert_eq!(code("epon"), 916);
        assert_eq!(code("zpon"), 460);
        assert_eq!(code("bkon"), 832);
        assert_eq!(code("zpoff"), 0);
        assert_eq!(code("EP=0}"), 0);
    }

    #[test]
    fn short_forms_are_case_insensitive() {
        assert_eq!(
            "Bkoff".parse::<Command>().unwrap(),
            Command::Circuit {
                id: CircuitId::Bk,
                on: false,
            }
        );
        assert_eq!(code("Ikon"), 1025);
        assert_eq!(code("HOME"), 1);
    }

    #[test]
    fn mode_aliases() {
        assert_eq!(code("home"), 1);
        assert_eq!(code("Manual=0}"), 1);
        assert_eq!(code("out"), 2);
        assert_eq!(code("Home=0}"), 2);
        assert_eq!(code("manual"), 3);
        assert_eq!(code("Manual=1}"), 3);
    }

    #[test]
    fn service_command_codes() {
        assert_eq!(code("schon"), 9);
        assert_eq!(code("wonon"), 10);
        assert_eq!(code("schoff"), 0);
        assert_eq!(code("reset"), -10_000);
        assert_eq!(code("reset5v"), 5);
        assert_eq!(code("5voff"), 5);
        assert_eq!(code("5von"), 5);
        assert_eq!(code("venton"), 120);
        assert_eq!(code("ventfull"), 0);
        assert_eq!(code("ventoff"), 255);
        assert_eq!(code("reportstatus"), 1001);
        assert_eq!(code("reportsensors"), 1002);
    }

    #[test]
    fn unrecognized_command_echoes_input() {
        assert_eq!(
            "xxon".parse::<Command>(),
            Err(CommandError::Unrecognized("xxon".to_string()))
        );
        assert_eq!(code("heat please"), -1);
        assert_eq!(code(""), -1);
    }
}
