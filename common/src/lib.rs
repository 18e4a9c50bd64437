pub mod boiler;
pub mod circuit;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod health;
pub mod ledger;
pub mod mode;
pub mod sensor;
pub mod topics;
pub mod transfer;
pub mod types;
pub mod ventilation;
pub mod watchdog;

pub use command::Command;
pub use config::{HvacConfig, NetworkConfig, PersistedState, RuntimeConfig};
pub use engine::{EngineAction, HvacEngine};
pub use error::{BusMismatch, CommandError, EventParseError, Fault, SensorReadError};
pub use event::{EventKind, InboundEvent};
pub use mode::WiredContacts;
pub use sensor::{SensorBus, FRAME_LEN};
pub use topics::*;
pub use types::{BoilerId, CircuitId, HeatMode, NodeId, StatusRecord};
