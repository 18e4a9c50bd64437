use crate::types::BoilerId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferState {
    Idle,
    Transferring {
        started_ms: u64,
        energy_at_start_kwh: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    Started {
        destination: BoilerId,
    },
    Stopped {
        destination: BoilerId,
        transferred_kwh: f64,
        total_kwh: f64,
        timed_out: bool,
    },
}

/// Pump moving solar-buffer energy into one heating boiler.
#[derive(Debug, Clone)]
pub struct TransferPump {
    destination: BoilerId,
    state: TransferState,
    transferred_total_kwh: f64,
}

impl TransferPump {
    pub fn new(destination: BoilerId, transferred_total_kwh: f64) -> Self {
        Self {
            destination,
            state: TransferState::Idle,
            transferred_total_kwh,
        }
    }

    pub fn destination(&self) -> BoilerId {
        self.destination
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TransferState::Transferring { .. })
    }

    pub fn transferred_total_kwh(&self) -> f64 {
        self.transferred_total_kwh
    }

    pub fn running_for_ms(&self, now_ms: u64) -> u64 {
        match self.state {
            TransferState::Transferring { started_ms, .. } => now_ms.saturating_sub(started_ms),
            TransferState::Idle => 0,
        }
    }

    fn start(&mut self, now_ms: u64, source_kwh: Option<f64>) -> Option<TransferEvent> {
        if self.is_running() {
            return None;
        }
        self.state = TransferState::Transferring {
            started_ms: now_ms,
            energy_at_start_kwh: source_kwh,
        };
        Some(TransferEvent::Started {
            destination: self.destination,
        })
    }

    fn stop(&mut self, source_kwh: Option<f64>, timed_out: bool) -> Option<TransferEvent> {
        let TransferState::Transferring {
            energy_at_start_kwh,
            ..
        } = self.state
        else {
            return None;
        };
        self.state = TransferState::Idle;

        // Negative when the source rose during the transfer; added as is.
        let transferred_kwh = match (energy_at_start_kwh, source_kwh) {
            (Some(start), Some(stop)) => start - stop,
            _ => 0.0,
        };
        self.transferred_total_kwh += transferred_kwh;

        Some(TransferEvent::Stopped {
            destination: self.destination,
            transferred_kwh,
            total_kwh: self.transferred_total_kwh,
            timed_out,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub start_kwh: f64,
    pub stop_kwh: f64,
    pub max_duration_ms: u64,
    pub check_interval_ms: u64,
    pub auto_destination: BoilerId,
}

/// Hysteresis controller for the solar-buffer transfer pumps.
///
/// Starts the automatic destination's pump when the source holds more than
/// `start_kwh`, stops it at or below `stop_kwh`, and forces any pump off once
/// it has run for `max_duration_ms`.
#[derive(Debug, Clone)]
pub struct TransferController {
    settings: TransferSettings,
    pumps: [TransferPump; 2],
    source_kwh: Option<f64>,
    last_start_check_ms: Option<u64>,
}

impl TransferController {
    pub fn new(settings: TransferSettings, totals_kwh: [f64; 2]) -> Self {
        Self {
            settings,
            pumps: [
                TransferPump::new(BoilerId::Sch, totals_kwh[0]),
                TransferPump::new(BoilerId::Won, totals_kwh[1]),
            ],
            source_kwh: None,
            last_start_check_ms: None,
        }
    }

    pub fn pump(&self, destination: BoilerId) -> &TransferPump {
        &self.pumps[destination.index()]
    }

    pub fn source_kwh(&self) -> Option<f64> {
        self.source_kwh
    }

    pub fn totals_kwh(&self) -> [f64; 2] {
        [
            self.pumps[0].transferred_total_kwh(),
            self.pumps[1].transferred_total_kwh(),
        ]
    }

    /// Records a new source reading and evaluates the policy.
    pub fn update_source(&mut self, source_kwh: f64, now_ms: u64) -> Vec<TransferEvent> {
        self.source_kwh = Some(source_kwh);
        self.evaluate(now_ms)
    }

    pub fn evaluate(&mut self, now_ms: u64) -> Vec<TransferEvent> {
        let mut events = self.check_timeouts(now_ms);
        let timed_out = !events.is_empty();

        let Some(source) = self.source_kwh else {
            return events;
        };
        let auto = self.settings.auto_destination.index();

        let check_due = self
            .last_start_check_ms
            .map(|last| now_ms.saturating_sub(last) >= self.settings.check_interval_ms)
            .unwrap_or(true);
        if check_due && !timed_out {
            if source > self.settings.start_kwh {
                events.extend(self.pumps[auto].start(now_ms, Some(source)));
            }
            self.last_start_check_ms = Some(now_ms);
        }

        if source <= self.settings.stop_kwh {
            events.extend(self.pumps[auto].stop(Some(source), false));
        }

        events
    }

    /// Forces off every pump that has run for the maximum duration.
    pub fn check_timeouts(&mut self, now_ms: u64) -> Vec<TransferEvent> {
        let source = self.source_kwh;
        let max = self.settings.max_duration_ms;
        self.pumps
            .iter_mut()
            .filter(|pump| pump.is_running() && pump.running_for_ms(now_ms) >= max)
            .filter_map(|pump| pump.stop(source, true))
            .collect()
    }

    /// Manual pump command, bypassing the thresholds.
    pub fn command(&mut self, destination: BoilerId, on: bool, now_ms: u64) -> Vec<TransferEvent> {
        let source = self.source_kwh;
        let pump = &mut self.pumps[destination.index()];
        let event = if on {
            pump.start(now_ms, source)
        } else {
            pump.stop(source, false)
        };
        event.into_iter().collect()
    }
}
