//! WebSocket frame types.
//!
//! Every frame is a JSON object `{ "type": ..., "payload": ... }`. Inbound
//! frames decode into [`ClientMessage`]; outbound frames are
//! [`ServerMessage`]s.

use dbviz_core::{Highlight, Step};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::SessionError;
use crate::playback::Mode;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectProject {
    pub project: String,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOperation {
    pub project: String,
    pub operation: String,
    #[serde(default)]
    pub params: Value,
    /// Used only when the session has to (re)select the project.
    #[serde(default)]
    pub config: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SetSpeed {
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    SelectProject(SelectProject),
    StartOperation(StartOperation),
    StepForward,
    StepBackward,
    Play,
    Pause,
    Reset,
    SetSpeed(SetSpeed),
    GetState,
}

fn payload<T: DeserializeOwned>(kind: &str, payload: Value) -> Result<T, SessionError> {
    serde_json::from_value(payload).map_err(|err| SessionError::InvalidPayload {
        message: kind.to_string(),
        reason: err.to_string(),
    })
}

impl ClientMessage {
    /// Decodes one text frame.
    pub fn decode(frame: &str) -> Result<Self, SessionError> {
        let envelope: Envelope =
            serde_json::from_str(frame).map_err(|err| SessionError::Parse(err.to_string()))?;
        let message = match envelope.kind.as_str() {
            "select_project" => ClientMessage::SelectProject(payload(&envelope.kind, envelope.payload)?),
            "start_operation" => ClientMessage::StartOperation(payload(&envelope.kind, envelope.payload)?),
            "step_forward" => ClientMessage::StepForward,
            "step_backward" => ClientMessage::StepBackward,
            "play" => ClientMessage::Play,
            "pause" => ClientMessage::Pause,
            "reset" => ClientMessage::Reset,
            "set_speed" => ClientMessage::SetSpeed(payload(&envelope.kind, envelope.payload)?),
            "get_state" => ClientMessage::GetState,
            _ => return Err(SessionError::UnknownMessage(envelope.kind)),
        };
        Ok(message)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::SelectProject(_) => "select_project",
            ClientMessage::StartOperation(_) => "start_operation",
            ClientMessage::StepForward => "step_forward",
            ClientMessage::StepBackward => "step_backward",
            ClientMessage::Play => "play",
            ClientMessage::Pause => "pause",
            ClientMessage::Reset => "reset",
            ClientMessage::SetSpeed(_) => "set_speed",
            ClientMessage::GetState => "get_state",
        }
    }
}

/// A step without its snapshot; the snapshot travels as the frame's `data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInfo {
    pub index: usize,
    pub title: String,
    pub description: String,
    pub highlights: Vec<Highlight>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl From<&Step> for StepInfo {
    fn from(step: &Step) -> Self {
        StepInfo {
            index: step.index,
            title: step.title.clone(),
            description: step.description.clone(),
            highlights: step.highlights.to_vec(),
            error: step.error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePayload {
    pub session_id: Uuid,
    pub project: Option<String>,
    pub operation: Option<String>,
    pub mode: Mode,
    pub speed: f64,
    /// Cursor position; `-1` before the first step.
    pub step_index: i64,
    pub total_steps: usize,
    pub current_step: Option<StepInfo>,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdatePayload {
    pub project: Option<String>,
    /// `None` when the cursor moved back before the first step.
    pub step: Option<StepInfo>,
    pub step_index: i64,
    pub total_steps: usize,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl From<&SessionError> for ErrorPayload {
    fn from(err: &SessionError) -> Self {
        ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    SimulationState(StatePayload),
    StepUpdate(StepUpdatePayload),
    Error(ErrorPayload),
}
