use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HeatMode {
    Home,
    Away,
    Manual,
}

impl HeatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "HOME",
            Self::Away => "AWAY",
            Self::Manual => "MANUAL",
        }
    }

    /// Result code returned by the mode commands.
    pub fn code(self) -> i32 {
        match self {
            Self::Home => 1,
            Self::Away => 2,
            Self::Manual => 3,
        }
    }
}

/// The seven floor-heating circuits, in relay order R1..R7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CircuitId {
    Bb,
    Wp,
    Ik,
    Kk,
    Ep,
    Zp,
    Bk,
}

impl CircuitId {
    pub const ALL: [CircuitId; 7] = [
        Self::Bb,
        Self::Wp,
        Self::Ik,
        Self::Kk,
        Self::Ep,
        Self::Zp,
        Self::Bk,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Bb => 0,
            Self::Wp => 1,
            Self::Ik => 2,
            Self::Kk => 3,
            Self::Ep => 4,
            Self::Zp => 5,
            Self::Bk => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bb => "BB",
            Self::Wp => "WP",
            Self::Ik => "IK",
            Self::Kk => "KK",
            Self::Ep => "EP",
            Self::Zp => "ZP",
            Self::Bk => "BK",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(tag))
    }

    pub fn rated_power_w(self) -> u32 {
        match self {
            Self::Bb => 1254,
            Self::Wp => 1096,
            Self::Ik => 1025,
            Self::Kk => 1018,
            Self::Ep => 916,
            Self::Zp => 460,
            Self::Bk => 832,
        }
    }

    /// Circuits whose thermostat is a contact wired to the expander instead of
    /// a remote node.
    pub fn is_wired(self) -> bool {
        matches!(self, Self::Kk | Self::Ep | Self::Zp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoilerId {
    /// Boiler A, heating the barn.
    Sch,
    /// Boiler B, heating the house.
    Won,
}

impl BoilerId {
    pub const ALL: [BoilerId; 2] = [Self::Sch, Self::Won];

    pub fn index(self) -> usize {
        match self {
            Self::Sch => 0,
            Self::Won => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sch => "SCH",
            Self::Won => "WON",
        }
    }

    /// Result code returned when the transfer pump to this boiler is started.
    pub fn pump_code(self) -> i32 {
        match self {
            Self::Sch => 9,
            Self::Won => 10,
        }
    }
}

/// Remote room controllers that report thermostat and condensation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeId {
    BandB,
    Badk,
    Inkom,
    Waspl,
}

impl NodeId {
    pub const ALL: [NodeId; 4] = [Self::BandB, Self::Badk, Self::Inkom, Self::Waspl];

    pub fn index(self) -> usize {
        match self {
            Self::BandB => 0,
            Self::Badk => 1,
            Self::Inkom => 2,
            Self::Waspl => 3,
        }
    }

    /// Tag the node appends to its event name.
    pub fn tag(self) -> &'static str {
        match self {
            Self::BandB => "R1-BandB",
            Self::Badk => "R2-BADK",
            Self::Inkom => "R3-INKOM",
            Self::Waspl => "R5-WASPL",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|node| node.tag() == tag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BandB => "BandB",
            Self::Badk => "BADK",
            Self::Inkom => "INKOM",
            Self::Waspl => "WASPL",
        }
    }

    pub fn circuit(self) -> CircuitId {
        match self {
            Self::BandB => CircuitId::Bb,
            Self::Badk => CircuitId::Bk,
            Self::Inkom => CircuitId::Ik,
            Self::Waspl => CircuitId::Wp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoilerStatus {
    pub id: BoilerId,
    #[serde(rename = "topH")]
    pub top_high: f64,
    #[serde(rename = "topL")]
    pub top_low: f64,
    #[serde(rename = "midH")]
    pub mid_high: f64,
    #[serde(rename = "midL")]
    pub mid_low: f64,
    #[serde(rename = "botH")]
    pub bottom_high: f64,
    #[serde(rename = "botL")]
    pub bottom_low: f64,
    #[serde(rename = "avg")]
    pub average: f64,
    #[serde(rename = "qTot")]
    pub spare_energy_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitStatus {
    pub id: CircuitId,
    #[serde(rename = "dutyCycle")]
    pub duty_cycle: f64,
    #[serde(rename = "desiredOn")]
    pub desired_on: bool,
    #[serde(rename = "relayOn")]
    pub relay_on: bool,
}

/// Telemetry record published once per sampling interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRecord {
    pub mode: &'static str,
    pub boilers: Vec<BoilerStatus>,
    pub circuits: Vec<CircuitStatus>,
    #[serde(rename = "heatDemandKw")]
    pub heat_demand_kw: f64,
    #[serde(rename = "solarEnergyKwh")]
    pub solar_energy_kwh: Option<f64>,
    #[serde(rename = "hourDemandKwh")]
    pub hour_demand_kwh: f64,
    #[serde(rename = "totalDemandKwh")]
    pub total_demand_kwh: f64,
}
