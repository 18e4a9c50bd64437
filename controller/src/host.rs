use std::{
    collections::VecDeque,
    future::IntoFuture,
    net::SocketAddr,
    sync::OnceLock,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot, watch},
};
use tracing::{error, info, warn};

use hvac_common::{
    EngineAction, HvacEngine, InboundEvent, SensorBus, StatusRecord, TOPIC_CMD_MANUAL,
    TOPIC_CONTROLLER_ALERT, TOPIC_CONTROLLER_REPORT, TOPIC_CONTROLLER_RESULT,
    TOPIC_CONTROLLER_STATE, TOPIC_NODE_STATUS_FILTER, TOPIC_NODE_STATUS_PREFIX,
};

use crate::{
    board::{BoardDiagnostics, RelayBoard, SimulatedBoard, SimulatedSensorBus},
    store::AppStore,
};

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;
const CONTROL_QUEUE_DEPTH: usize = 64;
const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Brussels;
/// Time given to queued MQTT publishes and pending HTTP replies before a
/// requested restart ends the process.
const RESTART_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug)]
enum ControlInput {
    Event(InboundEvent),
    Command {
        text: String,
        reply: Option<oneshot::Sender<i32>>,
    },
}

#[derive(Clone)]
struct AppState {
    inputs: mpsc::Sender<ControlInput>,
    status: watch::Receiver<Option<StatusRecord>>,
    board: watch::Receiver<BoardDiagnostics>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct CommandReply {
    command: String,
    result: i32,
}

/// What a batch of engine actions left for the network side to publish.
#[derive(Debug, Default)]
struct Dispatch {
    alerts: Vec<String>,
    reports: Vec<String>,
    telemetry: Option<StatusRecord>,
    restart: bool,
}

/// Owns the engine and the hardware. Every input reaches the engine through
/// this task, one at a time.
struct ControlTask {
    engine: HvacEngine,
    board: SimulatedBoard,
    bus: SimulatedSensorBus,
    timezone: Tz,
    store: AppStore,
    mqtt: AsyncClient,
    status: watch::Sender<Option<StatusRecord>>,
    diagnostics: watch::Sender<BoardDiagnostics>,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::from_env();
    let runtime = store.prepare_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to prepare runtime config in store: {err:#}");
        Default::default()
    });
    let persisted = store.load_persisted().await.unwrap_or_else(|err| {
        warn!("failed to load persisted counters, starting from zero: {err:#}");
        Default::default()
    });
    let timezone = runtime.timezone.parse::<Tz>().unwrap_or_else(|_| {
        warn!(
            "unknown timezone {}, using {}",
            runtime.timezone, DEFAULT_TIMEZONE
        );
        DEFAULT_TIMEZONE
    });

    let engine = HvacEngine::new(runtime.hvac.clone(), persisted, monotonic_ms());

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(runtime.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.mqtt_port);

    let mut mqtt_options = MqttOptions::new("hvac-controller", mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(runtime.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(runtime.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }
    mqtt_options.set_keep_alive(Duration::from_secs(30));

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let contacts = std::env::var("HVAC_SIM_CONTACTS")
        .map(|list| SimulatedBoard::contacts_from_list(&list))
        .unwrap_or_default();
    let board = SimulatedBoard::new(contacts, env_u64("HVAC_SIM_EXPANDER_FAULT_EVERY"));
    let bus = SimulatedSensorBus::new(env_u64("HVAC_SIM_CORRUPT_EVERY"));

    let (inputs_tx, inputs_rx) = mpsc::channel(CONTROL_QUEUE_DEPTH);
    let (status_tx, status_rx) = watch::channel(None);
    let (diagnostics_tx, diagnostics_rx) = watch::channel(board.diagnostics());

    subscribe_topics(&mqtt).await?;
    spawn_mqtt_loop(inputs_tx.clone(), eventloop);

    let control = ControlTask {
        engine,
        board,
        bus,
        timezone,
        store,
        mqtt,
        status: status_tx,
        diagnostics: diagnostics_tx,
    };
    let control = tokio::spawn(control.run(inputs_rx));

    let app_state = AppState {
        inputs: inputs_tx,
        status: status_rx,
        board: diagnostics_rx,
    };
    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/board", get(handle_get_board))
        .route("/api/command", post(handle_post_command))
        .with_state(app_state);

    let port = std::env::var("HVAC_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            result.context("http server stopped")?;
        }
        result = control => {
            result.context("control task panicked")??;
        }
    }
    Ok(())
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    for topic in [TOPIC_NODE_STATUS_FILTER, TOPIC_CMD_MANUAL] {
        mqtt.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

fn spawn_mqtt_loop(inputs: mpsc::Sender<ControlInput>, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    match decode_mqtt_message(&message.topic, &message.payload) {
                        Ok(Some(input)) => {
                            if inputs.send(input).await.is_err() {
                                warn!("control task gone, stopping mqtt loop");
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(err) => warn!("mqtt message handling error: {err:#}"),
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn decode_mqtt_message(topic: &str, payload: &[u8]) -> anyhow::Result<Option<ControlInput>> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(None);
    }

    let message = std::str::from_utf8(payload).context("non utf8 mqtt payload")?;

    if topic == TOPIC_CMD_MANUAL {
        return Ok(Some(ControlInput::Command {
            text: message.trim().to_string(),
            reply: None,
        }));
    }

    let Some(source) = topic.strip_prefix(TOPIC_NODE_STATUS_PREFIX) else {
        return Ok(None);
    };
    let event = InboundEvent::parse(source, message)
        .with_context(|| format!("event from {source} ignored"))?;
    Ok(Some(ControlInput::Event(event)))
}

impl ControlTask {
    async fn run(mut self, mut inputs: mpsc::Receiver<ControlInput>) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            let dispatch = tokio::select! {
                _ = interval.tick() => self.on_tick(),
                Some(input) = inputs.recv() => self.on_input(input).await,
                _ = &mut shutdown => {
                    info!("shutdown requested, saving counters");
                    self.persist().await;
                    return Ok(());
                }
            };

            self.publish(dispatch.alerts, TOPIC_CONTROLLER_ALERT).await;
            self.publish(dispatch.reports, TOPIC_CONTROLLER_REPORT).await;
            if let Some(record) = dispatch.telemetry {
                self.publish_telemetry(record).await;
            }
            self.diagnostics.send_replace(self.board.diagnostics());

            if dispatch.restart {
                self.persist().await;
                tokio::time::sleep(RESTART_GRACE).await;
                return Err(anyhow!("restart requested"));
            }
            if self.engine.take_persist_dirty() {
                self.persist().await;
            }
        }
    }

    fn on_tick(&mut self) -> Dispatch {
        let now_ms = monotonic_ms();
        match self.board.read_contacts() {
            Ok(contacts) => self.engine.set_wired_contacts(contacts),
            Err(err) => warn!("wired contacts unreadable, keeping last state: {err}"),
        }
        let actions = self.engine.tick(now_ms, local_now(self.timezone));
        dispatch_actions(
            &mut self.engine,
            &mut self.board,
            &mut self.bus,
            actions,
            now_ms,
        )
    }

    async fn on_input(&mut self, input: ControlInput) -> Dispatch {
        let now_ms = monotonic_ms();
        let actions = match input {
            ControlInput::Event(event) => self.engine.handle_event(event, now_ms),
            ControlInput::Command { text, reply } => {
                let (result, actions) = self.engine.execute_text(&text, now_ms);
                info!("command {text:?} -> {result}");
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
                self.publish_result(text, result).await;
                actions
            }
        };
        dispatch_actions(
            &mut self.engine,
            &mut self.board,
            &mut self.bus,
            actions,
            now_ms,
        )
    }

    async fn publish(&self, messages: Vec<String>, topic: &str) {
        for message in messages {
            if let Err(err) = self
                .mqtt
                .publish(topic, QoS::AtLeastOnce, false, message)
                .await
            {
                warn!("publish to {topic} failed: {err}");
            }
        }
    }

    async fn publish_telemetry(&self, record: StatusRecord) {
        match serde_json::to_vec(&record) {
            Ok(body) => {
                if let Err(err) = self
                    .mqtt
                    .publish(TOPIC_CONTROLLER_STATE, QoS::AtLeastOnce, true, body)
                    .await
                {
                    warn!("controller state publish failed: {err}");
                }
            }
            Err(err) => warn!("controller state serialization failed: {err}"),
        }
        self.status.send_replace(Some(record));
    }

    async fn publish_result(&self, command: String, result: i32) {
        match serde_json::to_vec(&CommandReply { command, result }) {
            Ok(body) => {
                if let Err(err) = self
                    .mqtt
                    .publish(TOPIC_CONTROLLER_RESULT, QoS::AtLeastOnce, false, body)
                    .await
                {
                    warn!("command result publish failed: {err}");
                }
            }
            Err(err) => warn!("command result serialization failed: {err}"),
        }
    }

    async fn persist(&self) {
        if let Err(err) = self
            .store
            .save_persisted(&self.engine.persisted_state())
            .await
        {
            error!("failed to persist counters: {err:#}");
        }
    }
}

/// Carries out engine actions against the hardware. Actions that need a
/// hardware answer feed it back into the engine, and whatever the engine
/// returns is processed in the same batch.
fn dispatch_actions<R, B>(
    engine: &mut HvacEngine,
    board: &mut R,
    bus: &mut B,
    actions: Vec<EngineAction>,
    now_ms: u64,
) -> Dispatch
where
    R: RelayBoard,
    B: SensorBus,
{
    let mut dispatch = Dispatch::default();
    let mut queue = VecDeque::from(actions);

    while let Some(action) = queue.pop_front() {
        let result = match action {
            EngineAction::SetRelay { circuit, on } => {
                info!("{} relay {}", circuit.as_str(), if on { "ON" } else { "OFF" });
                board.set_relay(circuit, on)
            }
            EngineAction::SetTransferPump { destination, on } => {
                board.set_transfer_pump(destination, on)
            }
            EngineAction::CheckFeedback => match board.feedback_low() {
                Ok(low) => {
                    queue.extend(engine.record_feedback(low));
                    Ok(())
                }
                Err(err) => Err(err),
            },
            EngineAction::StartConversion => {
                if let Err(err) = bus.start_conversion() {
                    warn!("temperature conversion not started: {err}");
                }
                Ok(())
            }
            EngineAction::ReadSensors => {
                queue.extend(engine.complete_sensor_read(bus, now_ms));
                Ok(())
            }
            EngineAction::SupplyOff => {
                warn!("5V supply of the remote nodes OFF");
                board.set_supply(false)
            }
            EngineAction::SupplyOn => {
                info!("5V supply of the remote nodes ON");
                board.set_supply(true)
            }
            EngineAction::SetFanLevel(level) => board.set_fan_level(level),
            EngineAction::Alert(fault) => {
                warn!("alert: {fault}");
                dispatch.alerts.push(fault.to_string());
                Ok(())
            }
            EngineAction::Report(line) => {
                info!("{line}");
                dispatch.reports.push(line);
                Ok(())
            }
            EngineAction::Telemetry(record) => {
                dispatch.telemetry = Some(record);
                Ok(())
            }
            EngineAction::Restart => {
                warn!("restart requested by the engine");
                dispatch.restart = true;
                Ok(())
            }
        };

        if let Err(err) = result {
            warn!("board action failed: {err}");
        }
    }

    dispatch
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.status.borrow().clone() {
        Some(record) => Json(record).into_response(),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "no telemetry yet"),
    }
}

async fn handle_get_board(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.board.borrow().clone())
}

async fn handle_post_command(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let text = body.trim().to_string();
    if text.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty command");
    }

    let (reply_tx, reply_rx) = oneshot::channel();
    let input = ControlInput::Command {
        text: text.clone(),
        reply: Some(reply_tx),
    };
    if state.inputs.send(input).await.is_err() {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "controller not running");
    }

    match reply_rx.await {
        Ok(result) => Json(CommandReply {
            command: text,
            result,
        })
        .into_response(),
        Err(_) => error_response(StatusCode::SERVICE_UNAVAILABLE, "controller not running"),
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
}

/// Local wall-clock time; hour boundaries of the energy ledgers follow it.
fn local_now(timezone: Tz) -> NaiveDateTime {
    Utc::now().with_timezone(&timezone).naive_local()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
