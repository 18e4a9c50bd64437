use serde::Serialize;
use thiserror::Error;

use hvac_common::{
    sensor::{encode_frame, Address, CHANNEL_ADDRESSES},
    BoilerId, CircuitId, SensorBus, SensorReadError, WiredContacts, FRAME_LEN,
};

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("i/o expander did not acknowledge: {0}")]
    Expander(String),
}

/// Outputs and inputs of the relay board: zone valves, transfer pumps, the
/// shared 5 V supply of the remote nodes and the ventilation PWM.
pub trait RelayBoard {
    fn set_relay(&mut self, circuit: CircuitId, on: bool) -> Result<(), BoardError>;
    fn set_transfer_pump(&mut self, destination: BoilerId, on: bool) -> Result<(), BoardError>;
    /// The circulation pump feedback line, active low.
    fn feedback_low(&mut self) -> Result<bool, BoardError>;
    fn read_contacts(&mut self) -> Result<WiredContacts, BoardError>;
    fn set_supply(&mut self, on: bool) -> Result<(), BoardError>;
    fn set_fan_level(&mut self, level: u8) -> Result<(), BoardError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardDiagnostics {
    pub relays: Vec<(CircuitId, bool)>,
    #[serde(rename = "transferPumps")]
    pub transfer_pumps: Vec<(BoilerId, bool)>,
    #[serde(rename = "supplyOn")]
    pub supply_on: bool,
    #[serde(rename = "fanLevel")]
    pub fan_level: u8,
}

/// Host stand-in for the relay board. The circulation pump runs whenever a
/// zone valve is open, so the feedback line is low exactly then. Every
/// `fault_every`-th feedback read fails like an unacknowledged expander.
#[derive(Debug, Clone)]
pub struct SimulatedBoard {
    relays: [bool; 7],
    pumps: [bool; 2],
    contacts: WiredContacts,
    supply_on: bool,
    fan_level: u8,
    feedback_reads: u64,
    fault_every: Option<u64>,
}

impl SimulatedBoard {
    pub fn new(contacts: WiredContacts, fault_every: Option<u64>) -> Self {
        Self {
            relays: [false; 7],
            pumps: [false; 2],
            contacts,
            supply_on: true,
            fan_level: u8::MAX,
            feedback_reads: 0,
            fault_every: fault_every.filter(|every| *every > 0),
        }
    }

    /// Parses a comma separated list of closed wired contacts, e.g. `kk,zp`.
    pub fn contacts_from_list(list: &str) -> WiredContacts {
        let mut contacts = WiredContacts::default();
        for tag in list.split(',').map(str::trim) {
            match CircuitId::from_tag(tag) {
                Some(CircuitId::Kk) => contacts.kk = true,
                Some(CircuitId::Ep) => contacts.ep = true,
                Some(CircuitId::Zp) => contacts.zp = true,
                _ => {}
            }
        }
        contacts
    }

    pub fn diagnostics(&self) -> BoardDiagnostics {
        BoardDiagnostics {
            relays: CircuitId::ALL
                .iter()
                .map(|id| (*id, self.relays[id.index()]))
                .collect(),
            transfer_pumps: BoilerId::ALL
                .iter()
                .map(|id| (*id, self.pumps[id.index()]))
                .collect(),
            supply_on: self.supply_on,
            fan_level: self.fan_level,
        }
    }
}

impl RelayBoard for SimulatedBoard {
    fn set_relay(&mut self, circuit: CircuitId, on: bool) -> Result<(), BoardError> {
        self.relays[circuit.index()] = on;
        Ok(())
    }

    fn set_transfer_pump(&mut self, destination: BoilerId, on: bool) -> Result<(), BoardError> {
        self.pumps[destination.index()] = on;
        Ok(())
    }

    fn feedback_low(&mut self) -> Result<bool, BoardError> {
        self.feedback_reads = self.feedback_reads.wrapping_add(1);
        if let Some(every) = self.fault_every {
            if self.feedback_reads % every == 0 {
                return Err(BoardError::Expander("feedback read".to_string()));
            }
        }
        Ok(self.relays.iter().any(|on| *on))
    }

    fn read_contacts(&mut self) -> Result<WiredContacts, BoardError> {
        Ok(self.contacts)
    }

    fn set_supply(&mut self, on: bool) -> Result<(), BoardError> {
        self.supply_on = on;
        Ok(())
    }

    fn set_fan_level(&mut self, level: u8) -> Result<(), BoardError> {
        self.fan_level = level;
        Ok(())
    }
}

/// Temperatures per channel, top to bottom for each boiler.
const STRATIFIED_PROFILE_C: [f64; 12] = [
    68.0, 66.5, 58.0, 52.0, 41.0, 38.5, 61.0, 60.0, 54.5, 47.0, 36.0, 33.5,
];

/// Host stand-in for the one-wire bus. Readings follow a stratified profile
/// with a slow wobble; every `corrupt_every`-th frame gets a broken checksum.
#[derive(Debug, Clone)]
pub struct SimulatedSensorBus {
    conversions: u64,
    reads: u64,
    converted: bool,
    corrupt_every: Option<u64>,
}

impl SimulatedSensorBus {
    pub fn new(corrupt_every: Option<u64>) -> Self {
        Self {
            conversions: 0,
            reads: 0,
            converted: false,
            corrupt_every: corrupt_every.filter(|every| *every > 0),
        }
    }

    fn temperature_c(&self, index: usize) -> f64 {
        let wobble = ((self.conversions + index as u64) % 8) as f64 * 0.125 - 0.5;
        STRATIFIED_PROFILE_C[index] + wobble
    }
}

impl SensorBus for SimulatedSensorBus {
    fn start_conversion(&mut self) -> Result<(), SensorReadError> {
        self.conversions = self.conversions.wrapping_add(1);
        self.converted = true;
        Ok(())
    }

    fn read_scratchpad(&mut self, address: &Address) -> Result<[u8; FRAME_LEN], SensorReadError> {
        if !self.converted {
            return Err(SensorReadError::Transfer(
                "read before first conversion".to_string(),
            ));
        }
        let index = CHANNEL_ADDRESSES
            .iter()
            .position(|candidate| candidate == address)
            .ok_or(SensorReadError::NoPresence)?;

        self.reads = self.reads.wrapping_add(1);
        let raw = (self.temperature_c(index) * 16.0).round() as i16;
        let mut frame = encode_frame(raw);
        if let Some(every) = self.corrupt_every {
            if self.reads % every == 0 {
                frame[FRAME_LEN - 1] ^= 0xA5;
            }
        }
        Ok(frame)
    }
}
