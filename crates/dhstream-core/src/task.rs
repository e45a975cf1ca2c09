//! Stream task types.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::{CoreError, TaskId, TaskStatus, UserId};

/// A digital-human stream task bound to an RTC room/stream pair.
///
/// Identity fields are fixed once decoded; only `status` moves, and only
/// through [`Task::start`] and [`Task::stop`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Task {
    task_id: TaskId,
    room_id: String,
    stream_id: String,
    user_id: UserId,
    user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(deserialize_with = "deserialize_app_id")]
    app_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<String>,
    #[serde(skip)]
    status: TaskStatus,
}

impl Task {
    /// Create an idle task.
    pub fn new(
        task_id: impl Into<TaskId>,
        room_id: impl Into<String>,
        stream_id: impl Into<String>,
        user_id: impl Into<UserId>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            room_id: room_id.into(),
            stream_id: stream_id.into(),
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Builder method to set the RTC token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Builder method to set the app id.
    pub fn with_app_id(mut self, app_id: i64) -> Self {
        self.app_id = app_id;
        self
    }

    /// Builder method to set the display user name.
    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }

    /// Builder method to set the RTC server address.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Backend task id.
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// RTC room the task streams into.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Stream id inside the room.
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// User the task belongs to.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Display name of the user, possibly empty.
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// RTC join token, if issued.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// RTC app id.
    pub fn app_id(&self) -> i64 {
        self.app_id
    }

    /// RTC server address, if set.
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// Current lifecycle status.
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Mark the task as running.
    pub fn start(&mut self) -> Result<(), CoreError> {
        self.transition(TaskStatus::Running)
    }

    /// Mark the task as stopped.
    pub fn stop(&mut self) -> Result<(), CoreError> {
        self.transition(TaskStatus::Stopped)
    }

    fn transition(&mut self, next: TaskStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Payload returned when a stream task is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreatedTask {
    pub task_id: TaskId,

    /// Opaque renderer configuration.
    pub base64_config: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,

    /// Sent as a string by some backends, as a number by others.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_app_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub app_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl CreatedTask {
    /// Build the running task for `user_id`.
    ///
    /// Fails when the backend left out anything the RTC session needs.
    pub fn into_running_task(self, user_id: UserId) -> Result<(Task, String), CoreError> {
        let room_id = non_empty(self.room_id, "RoomId")?;
        let stream_id = non_empty(self.stream_id, "StreamId")?;
        let token = non_empty(self.token, "Token")?;
        let app_id = self.app_id.ok_or(CoreError::MissingField("AppId"))?;
        if self.base64_config.is_empty() {
            return Err(CoreError::MissingField("Base64Config"));
        }

        let mut task = Task::new(self.task_id, room_id, stream_id, user_id)
            .with_token(token)
            .with_app_id(app_id);
        task.start()?;
        Ok((task, self.base64_config))
    }
}

fn non_empty(value: Option<String>, field: &'static str) -> Result<String, CoreError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CoreError::MissingField(field)),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AppIdRepr {
    Int(i64),
    Str(String),
}

impl AppIdRepr {
    fn into_i64<E: de::Error>(self) -> Result<Option<i64>, E> {
        match self {
            Self::Int(v) => Ok(Some(v)),
            Self::Str(s) if s.trim().is_empty() => Ok(None),
            Self::Str(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| E::custom(format!("invalid AppId '{}'", s))),
        }
    }
}

/// Accepts `AppId` as a number, a numeric string, or null.
pub(crate) fn deserialize_app_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_optional_app_id(deserializer)?.unwrap_or_default())
}

pub(crate) fn deserialize_optional_app_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<AppIdRepr>::deserialize(deserializer)? {
        Some(repr) => repr.into_i64(),
        None => Ok(None),
    }
}
