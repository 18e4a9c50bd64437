use crate::types::{CircuitId, HeatMode};

/// Per-room demand flags fed by the remote nodes and the wired thermostats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomInputs {
    thermostat: [bool; 7],
    condensation: [bool; 7],
}

impl RoomInputs {
    pub fn thermostat(&self, id: CircuitId) -> bool {
        self.thermostat[id.index()]
    }

    pub fn set_thermostat(&mut self, id: CircuitId, demand: bool) {
        self.thermostat[id.index()] = demand;
    }

    pub fn condensation(&self, id: CircuitId) -> bool {
        self.condensation[id.index()]
    }

    pub fn set_condensation(&mut self, id: CircuitId, demand: bool) {
        self.condensation[id.index()] = demand;
    }
}

/// Closed/open state of the thermostat contacts wired to the expander.
/// A closed contact means the room asks for heat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WiredContacts {
    pub kk: bool,
    pub ep: bool,
    pub zp: bool,
}

impl WiredContacts {
    pub fn closed(&self, id: CircuitId) -> bool {
        match id {
            CircuitId::Kk => self.kk,
            CircuitId::Ep => self.ep,
            CircuitId::Zp => self.zp,
            _ => false,
        }
    }
}

/// Desired ON/OFF per circuit for the given mode, indexed like
/// [`CircuitId::ALL`]. MANUAL returns `None`: desired state is then only
/// changed by explicit commands.
pub fn select_desired(
    mode: HeatMode,
    inputs: &RoomInputs,
    contacts: &WiredContacts,
) -> Option<[bool; 7]> {
    let mut desired = [false; 7];
    match mode {
        HeatMode::Manual => return None,
        HeatMode::Home => {
            for id in CircuitId::ALL {
                let thermostat = if id.is_wired() {
                    contacts.closed(id)
                } else {
                    inputs.thermostat(id)
                };
                desired[id.index()] = thermostat || inputs.condensation(id);
            }
        }
        HeatMode::Away => {
            for id in CircuitId::ALL {
                desired[id.index()] = inputs.condensation(id);
            }
        }
    }
    Some(desired)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn home_combines_thermostat_and_condensation() {
        let mut inputs = RoomInputs::default();
        inputs.set_thermostat(CircuitId::Bb, true);
        inputs.set_condensation(CircuitId::Bk, true);
        let contacts = WiredContacts {
            ep: true,
            ..WiredContacts::default()
        };

        let desired = select_desired(HeatMode::Home, &inputs, &contacts).unwrap();

        assert_eq!(desired, [true, false, false, false, true, false, true]);
    }

    #[test]
    fn wired_circuits_ignore_remote_thermostat_flag() {
        let mut inputs = RoomInputs::default();
        inputs.set_thermostat(CircuitId::Kk, true);

        let desired =
            select_desired(HeatMode::Home, &inputs, &WiredContacts::default()).unwrap();

        assert!(!desired[CircuitId::Kk.index()]);
    }

    #[test]
    fn away_only_honours_condensation() {
        let mut inputs = RoomInputs::default();
        inputs.set_thermostat(CircuitId::Bb, true);
        inputs.set_condensation(CircuitId::Ik, true);
        let contacts = WiredContacts {
            kk: true,
            ep: true,
            zp: true,
        };

        let desired = select_desired(HeatMode::Away, &inputs, &contacts).unwrap();

        assert_eq!(desired, [false, false, true, false, false, false, false]);
    }

    #[test]
    fn manual_leaves_desired_state_alone() {
        let mut inputs = RoomInputs::default();
        inputs.set_thermostat(CircuitId::Bb, true);

        assert_eq!(
            select_desired(HeatMode::Manual, &inputs, &WiredContacts::default()),
            None
        );
    }
}
