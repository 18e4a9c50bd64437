use thiserror::Error;

use crate::types::{BoilerId, NodeId};

/// Faults detected by the engine. All of them are absorbed locally and
/// published on the alert channel; only a persistent bus mismatch escalates
/// to a restart.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    #[error("Bad reading on sensor {channel} ({label})")]
    SensorChecksum { channel: usize, label: &'static str },
    #[error("Sensor timeout on sensor {channel} ({label})")]
    SensorTimeout { channel: usize, label: &'static str },
    #[error("Heating problem: {0}")]
    BusMismatch(BusMismatch),
    #[error("reset5v for {}!", .0.as_str())]
    RemoteNodeTimeout(NodeId),
    #[error("{} ECO pump time-out!", .0.as_str())]
    TransferTimeout(BoilerId),
    #[error("Unrecognized command: {0}")]
    UnrecognizedCommand(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusMismatch {
    #[error("Pump = ON, no heat demand")]
    PumpOnWithoutDemand,
    #[error("Pump = OFF with heat demand")]
    PumpOffWithDemand,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorReadError {
    #[error("no presence pulse on the bus")]
    NoPresence,
    #[error("bus transfer failed: {0}")]
    Transfer(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unrecognized command `{0}`")]
    Unrecognized(String),
}

impl CommandError {
    /// Result code returned for a command that could not be parsed.
    pub const CODE: i32 = -1;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventParseError {
    #[error("unknown event source `{0}`")]
    UnknownSource(String),
    #[error("unrecognized payload `{0}`")]
    UnrecognizedPayload(String),
    #[error("invalid number in `{0}`")]
    InvalidNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_messages_name_the_culprit() {
        assert_eq!(
            Fault::RemoteNodeTimeout(NodeId::Inkom).to_string(),
            "reset5v for INKOM!"
        );
        assert_eq!(
            Fault::TransferTimeout(BoilerId::Sch).to_string(),
            "SCH ECO pump time-out!"
        );
        assert_eq!(
            Fault::BusMismatch(BusMismatch::PumpOffWithDemand).to_string(),
            "Heating problem: Pump = OFF with heat demand"
        );
    }
}
