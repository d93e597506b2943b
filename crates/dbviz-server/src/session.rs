//! One client session: a simulation, its playback engine and autoplay.
//!
//! All state transitions happen under one async mutex. Outbound frames are
//! built under the lock and sent after it is released, through an unbounded
//! channel drained by the transport.
//!
//! Autoplay is a background task that advances the cursor on every tick. It
//! is stopped through a `watch` channel and awaited before any control call
//! that changes the mode, so a stale task never races a new `play`.

use std::sync::Arc;
use std::time::Duration;

use dbviz_core::Simulation;
use serde_json::Value;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::SessionError;
use crate::playback::PlaybackEngine;
use crate::schema::{
    ClientMessage, ErrorPayload, SelectProject, ServerMessage, StartOperation, StatePayload, StepInfo,
    StepUpdatePayload,
};

pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

struct SessionInner {
    id: Uuid,
    project: Option<&'static str>,
    simulation: Option<Box<dyn Simulation>>,
    playback: PlaybackEngine,
}

impl SessionInner {
    fn state(&self) -> ServerMessage {
        let playback = &self.playback;
        let data = match playback.current_snapshot() {
            Some(snapshot) => snapshot.clone(),
            None => self.simulation.as_ref().map_or(Value::Null, |s| s.snapshot()),
        };
        ServerMessage::SimulationState(StatePayload {
            session_id: self.id,
            project: self.project.map(str::to_string),
            operation: playback.trace().map(|t| t.operation.clone()),
            mode: playback.mode(),
            speed: playback.speed(),
            step_index: cursor_index(playback.cursor()),
            total_steps: playback.total_steps(),
            current_step: playback.current_step().map(StepInfo::from),
            data,
        })
    }

    fn step_update(&self) -> ServerMessage {
        let playback = &self.playback;
        ServerMessage::StepUpdate(StepUpdatePayload {
            project: self.project.map(str::to_string),
            step: playback.current_step().map(StepInfo::from),
            step_index: cursor_index(playback.cursor()),
            total_steps: playback.total_steps(),
            data: playback.current_snapshot().cloned().unwrap_or(Value::Null),
        })
    }

    fn select(&mut self, project: &str, config: &Value) -> Result<(), SessionError> {
        let entry = dbviz_engines::find_project(project)
            .ok_or_else(|| SessionError::UnknownProject(project.to_string()))?;
        let simulation = entry.create(config)?;
        self.project = Some(entry.info.id);
        self.simulation = Some(simulation);
        self.playback.reset();
        tracing::info!("session {}: project {} selected", self.id, entry.info.id);
        Ok(())
    }
}

fn cursor_index(cursor: Option<usize>) -> i64 {
    cursor.map_or(-1, |c| c as i64)
}

struct Autoplay {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct Session {
    id: Uuid,
    inner: Arc<Mutex<SessionInner>>,
    autoplay: Mutex<Option<Autoplay>>,
    outbound: Outbound,
    tick: Duration,
}

impl Session {
    /// Creates a session with no project selected. `tick` is the autoplay
    /// interval at speed 1.0.
    pub fn new(id: Uuid, outbound: Outbound, tick: Duration) -> Self {
        Session {
            id,
            inner: Arc::new(Mutex::new(SessionInner {
                id,
                project: None,
                simulation: None,
                playback: PlaybackEngine::new(),
            })),
            autoplay: Mutex::new(None),
            outbound,
            tick,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn emit(&self, message: ServerMessage) {
        emit(&self.outbound, self.id, message);
    }

    /// Decodes and handles one text frame, reporting any failure to the
    /// client as an `error` frame.
    pub async fn receive(&self, frame: &str) {
        let result = match ClientMessage::decode(frame) {
            Ok(message) => self.handle(message).await,
            Err(err) => {
                tracing::warn!("session {}: rejected frame: {}", self.id, err);
                Err(err)
            }
        };
        if let Err(err) = result {
            self.emit(ServerMessage::Error(ErrorPayload::from(&err)));
        }
    }

    pub async fn handle(&self, message: ClientMessage) -> Result<(), SessionError> {
        tracing::debug!("session {}: {}", self.id, message.kind());
        match message {
            ClientMessage::SelectProject(req) => self.select_project(req).await,
            ClientMessage::StartOperation(req) => self.start_operation(req).await,
            ClientMessage::StepForward => self.step_forward().await,
            ClientMessage::StepBackward => self.step_backward().await,
            ClientMessage::Play => self.play().await,
            ClientMessage::Pause => {
                self.pause().await;
                Ok(())
            }
            ClientMessage::Reset => {
                self.reset().await;
                Ok(())
            }
            ClientMessage::SetSpeed(req) => {
                self.set_speed(req.speed).await;
                Ok(())
            }
            ClientMessage::GetState => {
                self.get_state().await;
                Ok(())
            }
        }
    }

    /// (Re)builds the project structure from `config` and resets playback.
    pub async fn select_project(&self, req: SelectProject) -> Result<(), SessionError> {
        self.stop_autoplay().await;
        let state = {
            let mut inner = self.inner.lock().await;
            inner.select(&req.project, &req.config)?;
            inner.state()
        };
        self.emit(state);
        Ok(())
    }

    /// Runs one operation to completion and attaches its trace.
    pub async fn start_operation(&self, req: StartOperation) -> Result<(), SessionError> {
        self.stop_autoplay().await;
        let state = {
            let mut inner = self.inner.lock().await;
            let selected = inner.simulation.is_some() && inner.project == Some(req.project.as_str());
            if !selected {
                let config = req.config.clone().unwrap_or(Value::Null);
                inner.select(&req.project, &config)?;
            }
            let simulation = inner
                .simulation
                .as_mut()
                .ok_or_else(|| SessionError::UnknownProject(req.project.clone()))?;
            let trace = simulation.execute(&req.operation, &req.params)?;
            tracing::info!(
                "session {}: {} {} produced {} steps",
                self.id,
                req.project,
                req.operation,
                trace.len()
            );
            inner.playback.attach(trace);
            inner.state()
        };
        self.emit(state);
        Ok(())
    }

    pub async fn step_forward(&self) -> Result<(), SessionError> {
        self.stop_autoplay().await;
        let update = {
            let mut inner = self.inner.lock().await;
            inner.playback.step_forward()?;
            inner.step_update()
        };
        self.emit(update);
        Ok(())
    }

    pub async fn step_backward(&self) -> Result<(), SessionError> {
        self.stop_autoplay().await;
        let update = {
            let mut inner = self.inner.lock().await;
            inner.playback.step_backward()?;
            inner.step_update()
        };
        self.emit(update);
        Ok(())
    }

    pub async fn play(&self) -> Result<(), SessionError> {
        let state = {
            let mut inner = self.inner.lock().await;
            inner.playback.play()?;
            inner.state()
        };
        // Reap a task that finished on its own at the last step.
        self.stop_autoplay().await;
        self.emit(state);

        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(autoplay(
            self.id,
            Arc::clone(&self.inner),
            self.outbound.clone(),
            self.tick,
            stop_rx,
        ));
        *self.autoplay.lock().await = Some(Autoplay { stop, handle });
        Ok(())
    }

    /// Stops autoplay. Outside `playing` the mode is left alone; the client
    /// still gets the current state as acknowledgement.
    pub async fn pause(&self) {
        self.stop_autoplay().await;
        let state = {
            let mut inner = self.inner.lock().await;
            if !inner.playback.pause() {
                tracing::debug!("session {}: pause while {:?}", self.id, inner.playback.mode());
            }
            inner.state()
        };
        self.emit(state);
    }

    /// Discards the trace. The project structure is kept.
    pub async fn reset(&self) {
        self.stop_autoplay().await;
        let state = {
            let mut inner = self.inner.lock().await;
            inner.playback.reset();
            inner.state()
        };
        self.emit(state);
    }

    /// Takes effect from the next autoplay tick.
    pub async fn set_speed(&self, speed: f64) {
        let state = {
            let mut inner = self.inner.lock().await;
            let stored = inner.playback.set_speed(speed);
            tracing::debug!("session {}: speed {} (requested {})", self.id, stored, speed);
            inner.state()
        };
        self.emit(state);
    }

    pub async fn get_state(&self) {
        let state = self.inner.lock().await.state();
        self.emit(state);
    }

    /// Stops and awaits the autoplay task, if any.
    async fn stop_autoplay(&self) {
        let Some(task) = self.autoplay.lock().await.take() else {
            return;
        };
        // The task may already have exited; a closed receiver is fine.
        let _ = task.stop.send(true);
        if let Err(err) = task.handle.await {
            tracing::warn!("session {}: autoplay task failed: {}", self.id, err);
        }
    }

    /// Stops background work before the session is dropped.
    pub async fn shutdown(&self) {
        self.stop_autoplay().await;
    }
}

fn emit(outbound: &Outbound, id: Uuid, message: ServerMessage) {
    if outbound.send(message).is_err() {
        tracing::warn!("session {}: outbound channel closed, frame dropped", id);
    }
}

async fn autoplay(
    id: Uuid,
    inner: Arc<Mutex<SessionInner>>,
    outbound: Outbound,
    base: Duration,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let interval = tokio::select! {
            _ = stop.changed() => break,
            guard = inner.lock() => guard.playback.interval(base),
        };
        tokio::select! {
            _ = stop.changed() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        let mut guard = tokio::select! {
            _ = stop.changed() => break,
            guard = inner.lock() => guard,
        };
        let Some(tick) = guard.playback.tick() else {
            break;
        };
        tracing::debug!("session {}: autoplay step {}", id, tick.index);
        let update = guard.step_update();
        let state = tick.finished.then(|| guard.state());
        drop(guard);

        emit(&outbound, id, update);
        if let Some(state) = state {
            emit(&outbound, id, state);
            break;
        }
    }
}
