use crate::{error::EventParseError, types::NodeId, ventilation::Co2Source};

const TSTAT_ON: &str = "Tstat heat demand";
const TSTAT_OFF: &str = "No Tstat heat demand";
const CONDENS_ON: &str = "Tout heat demand (Humidity)";
const CONDENS_OFF: &str = "No Tout heat demand (Humidity)";

const SOLAR_SUBJECT: &str = "ECO";

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Thermostat(bool),
    Condensation(bool),
    /// Spare energy of the solar buffer, in kWh.
    SolarEnergy(f64),
    Co2 {
        source: Co2Source,
        ppm: f64,
    },
    /// A message from a known node whose payload carries nothing for us.
    Heartbeat,
}

impl EventKind {
    pub fn parse(payload: &str) -> Result<Self, EventParseError> {
        let payload = payload.trim();
        match payload {
            TSTAT_ON => return Ok(Self::Thermostat(true)),
            TSTAT_OFF => return Ok(Self::Thermostat(false)),
            CONDENS_ON => return Ok(Self::Condensation(true)),
            CONDENS_OFF => return Ok(Self::Condensation(false)),
            _ => {}
        }

        let Some((subject, rest)) = payload.split_once(':') else {
            return Err(EventParseError::UnrecognizedPayload(payload.to_string()));
        };

        if subject.starts_with(SOLAR_SUBJECT) {
            return leading_number(rest)
                .map(Self::SolarEnergy)
                .ok_or_else(|| EventParseError::InvalidNumber(payload.to_string()));
        }

        let source = Co2Source::ALL
            .into_iter()
            .find(|source| subject.starts_with(source.subject()))
            .ok_or_else(|| EventParseError::UnrecognizedPayload(payload.to_string()))?;
        let ppm = leading_number(rest)
            .ok_or_else(|| EventParseError::InvalidNumber(payload.to_string()))?;
        Ok(Self::Co2 { source, ppm })
    }
}

impl EventKind {
    /// The payload a remote node sends for this event.
    pub fn to_payload(&self) -> String {
        match self {
            Self::Thermostat(true) => TSTAT_ON.to_string(),
            Self::Thermostat(false) => TSTAT_OFF.to_string(),
            Self::Condensation(true) => CONDENS_ON.to_string(),
            Self::Condensation(false) => CONDENS_OFF.to_string(),
            Self::SolarEnergy(kwh) => format!("{SOLAR_SUBJECT}:{kwh:.2}"),
            Self::Co2 { source, ppm } => format!("{}:{ppm:.0}", source.subject()),
            Self::Heartbeat => "online".to_string(),
        }
    }
}

/// Decoded inbound message, tagged with the remote node it came from when
/// the source is one of the watched nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub node: Option<NodeId>,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn parse(source: &str, payload: &str) -> Result<Self, EventParseError> {
        let node = NodeId::from_tag(source);
        match (node, EventKind::parse(payload)) {
            (None, Ok(EventKind::Thermostat(_) | EventKind::Condensation(_))) => {
                Err(EventParseError::UnknownSource(source.to_string()))
            }
            (node, Ok(kind)) => Ok(Self { node, kind }),
            (Some(node), Err(_)) => Ok(Self {
                node: Some(node),
                kind: EventKind::Heartbeat,
            }),
            (None, Err(err)) => Err(err),
        }
    }
}

/// Parses the number at the start of `text`, ignoring leading whitespace and
/// any trailing unit or list, e.g. ` 10.13 kWh` or `612,48`.
fn leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text[..end].parse().ok()
}
