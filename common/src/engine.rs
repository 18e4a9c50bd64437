use chrono::NaiveDateTime;

use crate::{
    boiler::Boiler,
    circuit::{self, Circuit, Edge},
    command::Command,
    config::{HvacConfig, PersistedState},
    error::{CommandError, Fault},
    event::{EventKind, InboundEvent},
    health::{BusCheck, BusHealthMonitor},
    ledger::{EnergyLedger, LedgerMode},
    mode::{self, RoomInputs, WiredContacts},
    sensor::{Address, SensorBus, SensorTable},
    transfer::{TransferController, TransferEvent, TransferSettings},
    types::{BoilerId, BoilerStatus, CircuitId, CircuitStatus, HeatMode, StatusRecord},
    ventilation::{FanSetting, Ventilation},
    watchdog::RemoteNodeWatchdog,
};

const CHANNELS_PER_BOILER: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    SetRelay { circuit: CircuitId, on: bool },
    SetTransferPump { destination: BoilerId, on: bool },
    /// Read the pump feedback line and hand it to `record_feedback`.
    CheckFeedback,
    StartConversion,
    /// The conversion has had its time; call `complete_sensor_read`.
    ReadSensors,
    SupplyOff,
    SupplyOn,
    SetFanLevel(u8),
    Alert(Fault),
    Report(String),
    Telemetry(StatusRecord),
    /// Persist state and restart the controller.
    Restart,
}

#[derive(Debug, Clone, Copy)]
struct Interval {
    period_ms: u64,
    last_ms: Option<u64>,
}

impl Interval {
    fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            last_ms: None,
        }
    }

    /// True when the period has elapsed since the last run. The first poll is
    /// always due.
    fn poll(&mut self, now_ms: u64) -> bool {
        let due = self
            .last_ms
            .map(|last| now_ms.saturating_sub(last) >= self.period_ms)
            .unwrap_or(true);
        if due {
            self.last_ms = Some(now_ms);
        }
        due
    }
}

/// The whole controller state, owned by a single control task.
///
/// Time flows in through `now_ms` (monotonic) and, for the hourly ledger
/// rollover, a local wall-clock time. Nothing here blocks: waits such as the
/// sensor conversion or the supply power-cycle are kept as deadlines and
/// completed by a later `tick`.
#[derive(Debug, Clone)]
pub struct HvacEngine {
    pub config: HvacConfig,
    mode: HeatMode,
    inputs: RoomInputs,
    contacts: WiredContacts,
    circuits: [Circuit; 7],
    boilers: [Boiler; 2],
    sensors: SensorTable,
    demand_ledger: EnergyLedger,
    boiler_ledgers: [EnergyLedger; 2],
    bus_health: BusHealthMonitor,
    watchdog: RemoteNodeWatchdog,
    transfer: TransferController,
    ventilation: Ventilation,

    control_interval: Interval,
    sensor_interval: Interval,
    ledger_interval: Interval,

    conversion_ready_ms: Option<u64>,
    supply_restore_ms: Option<u64>,
    started: bool,
    persist_dirty: bool,
}

impl HvacEngine {
    pub fn new(mut config: HvacConfig, persisted: PersistedState, now_ms: u64) -> Self {
        config.sanitize();
        let transfer = TransferController::new(
            TransferSettings {
                start_kwh: config.transfer_start_kwh,
                stop_kwh: config.transfer_stop_kwh,
                max_duration_ms: config.transfer_max_duration_ms,
                check_interval_ms: config.transfer_check_interval_ms,
                auto_destination: config.transfer_destination,
            },
            [persisted.transferred_sch_kwh, persisted.transferred_won_kwh],
        );

        Self {
            mode: config.initial_mode,
            inputs: RoomInputs::default(),
            contacts: WiredContacts::default(),
            circuits: CircuitId::ALL.map(Circuit::new),
            boilers: BoilerId::ALL.map(|id| Boiler::new(id, config.boiler_min_useful_c)),
            sensors: SensorTable::new(config.sensor_stale_timeout_ms, now_ms),
            demand_ledger: EnergyLedger::restore(LedgerMode::Rate, persisted.heat_demand),
            boiler_ledgers: [
                EnergyLedger::restore(LedgerMode::Delta, persisted.sch_energy),
                EnergyLedger::restore(LedgerMode::Delta, persisted.won_energy),
            ],
            bus_health: BusHealthMonitor::new(config.bus_error_threshold),
            watchdog: RemoteNodeWatchdog::new(config.node_timeout_ms, now_ms),
            transfer,
            ventilation: Ventilation::new(),
            control_interval: Interval::new(config.heat_set_interval_ms),
            sensor_interval: Interval::new(config.sensor_interval_ms),
            ledger_interval: Interval::new(config.ledger_interval_ms),
            conversion_ready_ms: None,
            supply_restore_ms: None,
            started: false,
            persist_dirty: false,
            config,
        }
    }

    pub fn mode(&self) -> HeatMode {
        self.mode
    }

    pub fn inputs(&self) -> &RoomInputs {
        &self.inputs
    }

    pub fn circuits(&self) -> &[Circuit] {
        &self.circuits
    }

    pub fn circuit(&self, id: CircuitId) -> &Circuit {
        &self.circuits[id.index()]
    }

    pub fn boiler(&self, id: BoilerId) -> &Boiler {
        &self.boilers[id.index()]
    }

    pub fn sensors(&self) -> &SensorTable {
        &self.sensors
    }

    pub fn demand_ledger(&self) -> &EnergyLedger {
        &self.demand_ledger
    }

    pub fn boiler_ledger(&self, id: BoilerId) -> &EnergyLedger {
        &self.boiler_ledgers[id.index()]
    }

    pub fn bus_health(&self) -> &BusHealthMonitor {
        &self.bus_health
    }

    pub fn watchdog(&self) -> &RemoteNodeWatchdog {
        &self.watchdog
    }

    pub fn transfer(&self) -> &TransferController {
        &self.transfer
    }

    pub fn ventilation(&self) -> &Ventilation {
        &self.ventilation
    }

    pub fn heat_demand_w(&self) -> u32 {
        circuit::heat_demand_w(&self.circuits)
    }

    pub fn set_wired_contacts(&mut self, contacts: WiredContacts) {
        self.contacts = contacts;
    }

    /// Returns whether persisted fields changed since the last call.
    pub fn take_persist_dirty(&mut self) -> bool {
        std::mem::take(&mut self.persist_dirty)
    }

    pub fn persisted_state(&self) -> PersistedState {
        let [transferred_sch_kwh, transferred_won_kwh] = self.transfer.totals_kwh();
        PersistedState {
            heat_demand: self.demand_ledger.snapshot(),
            sch_energy: self.boiler_ledgers[BoilerId::Sch.index()].snapshot(),
            won_energy: self.boiler_ledgers[BoilerId::Won.index()].snapshot(),
            transferred_sch_kwh,
            transferred_won_kwh,
        }
    }

    pub fn tick(&mut self, now_ms: u64, wall: NaiveDateTime) -> Vec<EngineAction> {
        let mut actions = Vec::new();

        if !self.started {
            self.started = true;
            actions.push(EngineAction::SetFanLevel(FanSetting::On.level()));
        }

        self.finish_supply_cycle(now_ms, &mut actions);
        self.finish_conversion(now_ms, &mut actions);

        if self.control_interval.poll(now_ms) {
            self.run_control(now_ms, &mut actions);
        }
        if self.sensor_interval.poll(now_ms) {
            self.start_conversion(now_ms, &mut actions);
        }
        self.roll_ledgers_over(wall);
        if self.ledger_interval.poll(now_ms) {
            self.sample_ledgers(wall);
        }

        let events = self.transfer.check_timeouts(now_ms);
        self.apply_transfer_events(events, &mut actions);
        self.check_remote_nodes(now_ms, &mut actions);

        actions
    }

    /// Reads every channel after a finished conversion, refreshes both boiler
    /// models and emits the telemetry record.
    pub fn complete_sensor_read<B: SensorBus + ?Sized>(
        &mut self,
        bus: &mut B,
        now_ms: u64,
    ) -> Vec<EngineAction> {
        let mut actions: Vec<EngineAction> = self
            .sensors
            .acquire(bus, now_ms)
            .into_iter()
            .map(EngineAction::Alert)
            .collect();

        for boiler in self.boilers.iter_mut() {
            let first = boiler.id().index() * CHANNELS_PER_BOILER;
            boiler.update(self.sensors.block(first));
        }

        actions.push(EngineAction::Telemetry(self.status_record()));
        actions
    }

    pub fn record_feedback(&mut self, feedback_low: bool) -> Vec<EngineAction> {
        match self.bus_health.check(self.heat_demand_w(), feedback_low) {
            BusCheck::Ok => Vec::new(),
            BusCheck::Mismatch(mismatch) => vec![EngineAction::Alert(Fault::BusMismatch(mismatch))],
            BusCheck::Escalate(mismatch) => {
                self.persist_dirty = true;
                vec![
                    EngineAction::Alert(Fault::BusMismatch(mismatch)),
                    EngineAction::Restart,
                ]
            }
        }
    }

    pub fn handle_event(&mut self, event: InboundEvent, now_ms: u64) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        if let Some(node) = event.node {
            self.watchdog.record_seen(node, now_ms);
        }

        match (event.node, event.kind) {
            (Some(node), EventKind::Thermostat(demand)) => {
                self.inputs.set_thermostat(node.circuit(), demand);
            }
            (Some(node), EventKind::Condensation(demand)) => {
                let id = node.circuit();
                self.inputs.set_condensation(id, demand);
                let (_, mut command_actions) =
                    self.execute(Command::Circuit { id, on: demand }, now_ms);
                actions.append(&mut command_actions);
            }
            (_, EventKind::SolarEnergy(kwh)) => {
                let events = self.transfer.update_source(kwh, now_ms);
                self.apply_transfer_events(events, &mut actions);
            }
            (_, EventKind::Co2 { source, ppm }) => {
                self.ventilation.update(source, ppm);
            }
            _ => {}
        }

        actions
    }

    /// Parses and runs a textual command. Unrecognized input yields the
    /// failure code and an alert echoing it.
    pub fn execute_text(&mut self, text: &str, now_ms: u64) -> (i32, Vec<EngineAction>) {
        match text.parse::<Command>() {
            Ok(command) => self.execute(command, now_ms),
            Err(CommandError::Unrecognized(echo)) => (
                CommandError::CODE,
                vec![EngineAction::Alert(Fault::UnrecognizedCommand(echo))],
            ),
        }
    }

    /// Circuit commands only change the desired state; the relays follow on
    /// the next control poll.
    pub fn execute(&mut self, command: Command, now_ms: u64) -> (i32, Vec<EngineAction>) {
        let mut actions = Vec::new();
        match command {
            Command::SetMode(mode) => self.mode = mode,
            Command::Circuit { id, on } => self.circuits[id.index()].set_desired(on),
            Command::AllCircuits(on) => {
                for circuit in self.circuits.iter_mut() {
                    circuit.set_desired(on);
                }
            }
            Command::TransferPump { destination, on } => {
                let events = self.transfer.command(destination, on, now_ms);
                self.apply_transfer_events(events, &mut actions);
            }
            Command::Restart => {
                self.persist_dirty = true;
                actions.push(EngineAction::Restart);
            }
            Command::SupplyReset => self.begin_supply_cycle(now_ms, &mut actions),
            Command::Supply(on) => {
                self.supply_restore_ms = None;
                actions.push(if on {
                    EngineAction::SupplyOn
                } else {
                    EngineAction::SupplyOff
                });
            }
            Command::Fan(setting) => actions.push(EngineAction::SetFanLevel(setting.level())),
            Command::ReportStatus => {
                actions.extend(self.status_report().into_iter().map(EngineAction::Report));
            }
            Command::ReportSensors => {
                actions.extend(self.sensor_report().into_iter().map(EngineAction::Report));
            }
        }
        (command.result_code(), actions)
    }

    pub fn status_record(&self) -> StatusRecord {
        StatusRecord {
            mode: self.mode.as_str(),
            boilers: self.boilers.iter().map(boiler_status).collect(),
            circuits: self
                .circuits
                .iter()
                .map(|circuit| CircuitStatus {
                    id: circuit.id(),
                    duty_cycle: circuit.duty_cycle(),
                    desired_on: circuit.desired_on(),
                    relay_on: circuit.commanded_on(),
                })
                .collect(),
            heat_demand_kw: self.heat_demand_w() as f64 / 1000.0,
            solar_energy_kwh: self.transfer.source_kwh(),
            hour_demand_kwh: self.demand_ledger.hour_kwh(),
            total_demand_kwh: self.demand_ledger.total_kwh(),
        }
    }

    pub fn status_report(&self) -> Vec<String> {
        let [sch, won] = self.transfer.totals_kwh();
        let mut lines = vec![
            format!("Mode: {}", self.mode.as_str()),
            self.watchdog.reset_report(),
            circuit::summary_line(&self.circuits),
            format!("Pumped to SCH:{sch:.2}, WON:{won:.2}"),
            format!(
                "Heat demand: hourly {:.2} kWh, total {:.2} kWh",
                self.demand_ledger.hour_kwh(),
                self.demand_ledger.total_kwh()
            ),
        ];
        lines.extend(self.boilers.iter().map(Boiler::zone_report));
        lines.push(format!("CRC errors: {:?}", self.sensors.error_counts()));
        lines
    }

    /// Configured bus addresses with the validity of their ROM checksum.
    pub fn sensor_report(&self) -> Vec<String> {
        self.sensors
            .channels()
            .iter()
            .enumerate()
            .map(|(index, channel)| {
                format!(
                    "{index:2} {:<6} {} {:?} CRC {}",
                    channel.label(),
                    format_address(channel.address()),
                    channel.class(),
                    if channel.address_valid() { "OK" } else { "BAD" }
                )
            })
            .collect()
    }

    fn run_control(&mut self, now_ms: u64, actions: &mut Vec<EngineAction>) {
        if let Some(desired) = mode::select_desired(self.mode, &self.inputs, &self.contacts) {
            for circuit in self.circuits.iter_mut() {
                circuit.set_desired(desired[circuit.id().index()]);
            }
        }

        for circuit in self.circuits.iter_mut() {
            if let Some(edge) = circuit.apply(now_ms) {
                actions.push(EngineAction::SetRelay {
                    circuit: circuit.id(),
                    on: edge == Edge::SwitchedOn,
                });
            }
        }
        actions.push(EngineAction::CheckFeedback);
    }

    fn start_conversion(&mut self, now_ms: u64, actions: &mut Vec<EngineAction>) {
        if self.conversion_ready_ms.is_some() {
            return;
        }
        actions.push(EngineAction::StartConversion);
        self.conversion_ready_ms = Some(now_ms + self.config.sensor_conversion_ms);
    }

    fn finish_conversion(&mut self, now_ms: u64, actions: &mut Vec<EngineAction>) {
        if let Some(ready) = self.conversion_ready_ms {
            if now_ms >= ready {
                self.conversion_ready_ms = None;
                actions.push(EngineAction::ReadSensors);
            }
        }
    }

    fn sample_ledgers(&mut self, wall: NaiveDateTime) {
        let demand_kw = self.heat_demand_w() as f64 / 1000.0;
        self.demand_ledger.sample(demand_kw, wall);

        for (ledger, boiler) in self.boiler_ledgers.iter_mut().zip(self.boilers.iter()) {
            if boiler.is_valid() {
                ledger.sample(boiler.spare_energy_kwh(), wall);
            } else {
                ledger.rollover_if_due(wall);
            }
        }
        self.persist_dirty = true;
    }

    /// The sampling interval drifts against the wall clock, so the hour
    /// boundary is checked on every tick.
    fn roll_ledgers_over(&mut self, wall: NaiveDateTime) {
        let mut rolled = self.demand_ledger.rollover_if_due(wall);
        for ledger in self.boiler_ledgers.iter_mut() {
            rolled |= ledger.rollover_if_due(wall);
        }
        self.persist_dirty |= rolled;
    }

    fn check_remote_nodes(&mut self, now_ms: u64, actions: &mut Vec<EngineAction>) {
        let silent = self.watchdog.check(now_ms);
        if silent.is_empty() {
            return;
        }
        actions.extend(
            silent
                .into_iter()
                .map(|node| EngineAction::Alert(Fault::RemoteNodeTimeout(node))),
        );
        self.begin_supply_cycle(now_ms, actions);
    }

    /// Drops the shared 5 V line; a cycle already in progress absorbs the
    /// request.
    fn begin_supply_cycle(&mut self, now_ms: u64, actions: &mut Vec<EngineAction>) {
        if self.supply_restore_ms.is_some() {
            return;
        }
        actions.push(EngineAction::SupplyOff);
        self.supply_restore_ms = Some(now_ms + self.config.supply_hold_ms);
    }

    fn finish_supply_cycle(&mut self, now_ms: u64, actions: &mut Vec<EngineAction>) {
        if let Some(restore) = self.supply_restore_ms {
            if now_ms >= restore {
                self.supply_restore_ms = None;
                actions.push(EngineAction::SupplyOn);
            }
        }
    }

    fn apply_transfer_events(&mut self, events: Vec<TransferEvent>, actions: &mut Vec<EngineAction>) {
        for event in events {
            match event {
                TransferEvent::Started { destination } => {
                    actions.push(EngineAction::SetTransferPump {
                        destination,
                        on: true,
                    });
                    actions.push(EngineAction::Report(format!(
                        "START pumping ECO => {} boiler",
                        destination.as_str()
                    )));
                }
                TransferEvent::Stopped {
                    destination,
                    transferred_kwh,
                    total_kwh,
                    timed_out,
                } => {
                    actions.push(EngineAction::SetTransferPump {
                        destination,
                        on: false,
                    });
                    if timed_out {
                        actions.push(EngineAction::Alert(Fault::TransferTimeout(destination)));
                    }
                    actions.push(EngineAction::Report(format!(
                        "STOP pumping ECO => {0} boiler: {transferred_kwh:.2} kWh, pumped to {0} = {total_kwh:.2}",
                        destination.as_str()
                    )));
                    self.persist_dirty = true;
                }
            }
        }
    }
}

fn boiler_status(boiler: &Boiler) -> BoilerStatus {
    let [top_high, top_low, mid_high, mid_low, bottom_high, bottom_low] = *boiler.readings_c();
    BoilerStatus {
        id: boiler.id(),
        top_high,
        top_low,
        mid_high,
        mid_low,
        bottom_high,
        bottom_low,
        average: boiler.average_c(),
        spare_energy_kwh: boiler.spare_energy_kwh(),
    }
}

fn format_address(address: &Address) -> String {
    address
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join("-")
}
