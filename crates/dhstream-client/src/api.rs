//! Typed API client for the action-based digital-human backend.
//!
//! Every operation posts (or, for the task query, gets) to
//! `<base>/<Action>` with the action name repeated in the parameters as
//! `Action`, then unwraps the `{Code, Message, Data}` envelope into a
//! typed payload.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use dhstream_core::{CreatedTask, DigitalHumanInfo, DriveType, OutputMode, Task, TaskId, UserId};

use crate::error::{ApiError, ErrorKind};
use crate::transport::{HttpTransport, Method, Transport};

/// Header carrying the tenant app id.
pub const HEADER_APP_ID: &str = "X-App-Id";

/// Header carrying the body media type.
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Backend action discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GetDigitalHumanInfo,
    CreateDigitalHumanStreamTask,
    StopDigitalHumanStreamTask,
    QueryDigitalHumanStreamTasks,
    DriveByText,
    DriveByAudio,
    DriveByWsStreamWithTTS,
    InterruptDriveTask,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetDigitalHumanInfo => "GetDigitalHumanInfo",
            Self::CreateDigitalHumanStreamTask => "CreateDigitalHumanStreamTask",
            Self::StopDigitalHumanStreamTask => "StopDigitalHumanStreamTask",
            Self::QueryDigitalHumanStreamTasks => "QueryDigitalHumanStreamTasks",
            Self::DriveByText => "DriveByText",
            Self::DriveByAudio => "DriveByAudio",
            Self::DriveByWsStreamWithTTS => "DriveByWsStreamWithTTS",
            Self::InterruptDriveTask => "InterruptDriveTask",
        }
    }

    /// HTTP method the action is issued with.
    pub fn method(&self) -> Method {
        match self {
            Self::QueryDigitalHumanStreamTasks => Method::Get,
            _ => Method::Post,
        }
    }

    /// Action that drives a task with `drive`.
    pub fn for_drive(drive: DriveType) -> Self {
        match drive {
            DriveType::Text => Self::DriveByText,
            DriveType::Audio => Self::DriveByAudio,
            DriveType::WsTts => Self::DriveByWsStreamWithTTS,
        }
    }

    /// Message used when the server reports a failure without one.
    fn failure_message(&self) -> &'static str {
        match self {
            Self::GetDigitalHumanInfo => "failed to get digital human info",
            Self::CreateDigitalHumanStreamTask => "failed to create stream task",
            Self::StopDigitalHumanStreamTask => "failed to stop stream task",
            Self::QueryDigitalHumanStreamTasks => "failed to query stream tasks",
            Self::DriveByText => "text drive failed",
            Self::DriveByAudio => "audio drive failed",
            Self::DriveByWsStreamWithTTS => "websocket TTS drive failed",
            Self::InterruptDriveTask => "failed to interrupt drive task",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response envelope. Both `Code` and `code` spellings are accepted.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default, alias = "code", rename = "Code")]
    code: Option<i64>,
    #[serde(default, alias = "message", rename = "Message")]
    message: Option<String>,
    #[serde(default, alias = "data", rename = "Data")]
    data: Option<Value>,
    #[serde(default, rename = "RequestId")]
    request_id: Option<String>,
}

/// Acknowledgement returned by the stop, drive and interrupt actions.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub request_id: Option<String>,
    pub data: Value,
}

/// Parameters for `CreateDigitalHumanStreamTask`.
///
/// Extra fields carry any further backend-specific config verbatim, except
/// for the keys in [`RESERVED_FIELDS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTaskRequest {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_mode: Option<OutputMode>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Keys owned by the request itself; `with_field` never overrides them.
pub const RESERVED_FIELDS: [&str; 3] = ["Action", "UserId", "OutputMode"];

impl CreateTaskRequest {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            output_mode: None,
            extra: Map::new(),
        }
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = Some(mode);
        self
    }

    /// Builder method to add an extra config field. Reserved keys are
    /// ignored so the validated user id always wins.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if RESERVED_FIELDS.contains(&key.as_str()) {
            warn!(field = %key, "Ignoring reserved task config field");
            return self;
        }
        self.extra.insert(key, value.into());
        self
    }

    /// Extra config fields added with [`with_field`](Self::with_field).
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// Client for the digital-human backend.
///
/// Operations are independent and stateless. The only mutable setting is
/// the app id, which the backend hands out on task creation.
pub struct ApiClient<T = HttpTransport> {
    transport: T,
    base_url: String,
    app_id: Option<i64>,
}

impl ApiClient<HttpTransport> {
    /// Create a client talking HTTP to `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self::with_transport(HttpTransport::new(), base_url)
    }
}

impl<T: Transport> ApiClient<T> {
    /// Create a client over an arbitrary transport.
    pub fn with_transport(transport: T, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: None,
        }
    }

    /// Builder method to seed the `X-App-Id` header.
    pub fn with_app_id(mut self, app_id: i64) -> Self {
        self.app_id = Some(app_id);
        self
    }

    /// Remember the app id handed out by the backend.
    pub fn set_app_id(&mut self, app_id: i64) {
        self.app_id = Some(app_id);
    }

    /// App id sent as `X-App-Id`, if known.
    pub fn app_id(&self) -> Option<i64> {
        self.app_id
    }

    /// Base URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch the digital human profile for `user_id`.
    pub async fn get_digital_human_info(
        &self,
        user_id: &UserId,
    ) -> Result<DigitalHumanInfo, ApiError> {
        if user_id.is_blank() {
            return Err(ApiError::invalid_parameter("user id must not be empty"));
        }
        let mut params = Map::new();
        params.insert("UserId".into(), Value::String(user_id.to_string()));

        let (data, _) = self.call(Action::GetDigitalHumanInfo, params).await?;
        decode(Action::GetDigitalHumanInfo, data)
    }

    /// Create a stream task.
    pub async fn create_stream_task(
        &self,
        request: &CreateTaskRequest,
    ) -> Result<CreatedTask, ApiError> {
        if request.user_id.is_blank() {
            return Err(ApiError::invalid_parameter("UserId is required"));
        }
        let params = match serde_json::to_value(request) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(ApiError::invalid_parameter("task config must be an object")),
            Err(e) => {
                return Err(ApiError::invalid_parameter("task config is not serializable")
                    .with_source(e))
            }
        };

        let (data, _) = self.call(Action::CreateDigitalHumanStreamTask, params).await?;
        decode(Action::CreateDigitalHumanStreamTask, data)
    }

    /// Stop a stream task.
    pub async fn stop_stream_task(&self, task_id: &TaskId) -> Result<Ack, ApiError> {
        self.task_action(Action::StopDigitalHumanStreamTask, task_id)
            .await
    }

    /// List the tasks the backend currently knows about.
    pub async fn query_stream_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let (data, _) = self
            .call(Action::QueryDigitalHumanStreamTasks, Map::new())
            .await?;
        decode(Action::QueryDigitalHumanStreamTasks, task_list(data))
    }

    /// Drive a task with the given input type.
    pub async fn drive(&self, drive: DriveType, task_id: &TaskId) -> Result<Ack, ApiError> {
        self.task_action(Action::for_drive(drive), task_id).await
    }

    pub async fn drive_by_text(&self, task_id: &TaskId) -> Result<Ack, ApiError> {
        self.drive(DriveType::Text, task_id).await
    }

    pub async fn drive_by_audio(&self, task_id: &TaskId) -> Result<Ack, ApiError> {
        self.drive(DriveType::Audio, task_id).await
    }

    pub async fn drive_by_ws_stream_with_tts(&self, task_id: &TaskId) -> Result<Ack, ApiError> {
        self.drive(DriveType::WsTts, task_id).await
    }

    /// Interrupt whatever the task is currently saying.
    pub async fn interrupt_drive_task(&self, task_id: &TaskId) -> Result<Ack, ApiError> {
        self.task_action(Action::InterruptDriveTask, task_id).await
    }

    async fn task_action(&self, action: Action, task_id: &TaskId) -> Result<Ack, ApiError> {
        if task_id.is_blank() {
            return Err(ApiError::invalid_parameter("task id must not be empty"));
        }
        let mut params = Map::new();
        params.insert("TaskId".into(), Value::String(task_id.to_string()));

        let (data, request_id) = self.call(action, params).await?;
        Ok(Ack { request_id, data })
    }

    fn url(&self, action: Action) -> String {
        format!("{}/{}", self.base_url, action.as_str())
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(HEADER_CONTENT_TYPE.to_string(), CONTENT_TYPE_JSON.to_string())];
        if let Some(app_id) = self.app_id {
            headers.push((HEADER_APP_ID.to_string(), app_id.to_string()));
        }
        headers
    }

    /// Issue `action` and unwrap the envelope, returning `Data` (null when
    /// absent) and the request id.
    async fn call(
        &self,
        action: Action,
        mut params: Map<String, Value>,
    ) -> Result<(Value, Option<String>), ApiError> {
        params.insert("Action".into(), Value::String(action.as_str().to_string()));
        let params = Value::Object(params);
        let url = self.url(action);
        debug!(action = %action, url = %url, "Calling backend");

        let response = self
            .transport
            .request(action.method(), &url, Some(&params), &self.headers())
            .await?;

        if !response.is_object() {
            warn!(action = %action, "Backend returned a non-object response");
            return Err(ApiError::new(
                ErrorKind::Unknown,
                format!("{}: malformed response", action),
            ));
        }
        let envelope: Envelope = serde_json::from_value(response).map_err(|e| {
            ApiError::new(ErrorKind::Unknown, format!("{}: malformed response", action))
                .with_source(e)
        })?;

        match envelope.code {
            Some(code) if code != 0 => {
                let message = envelope
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| action.failure_message().to_string());
                warn!(action = %action, code, message = %message, "Backend reported failure");
                Err(ApiError::from_server(code, message))
            }
            _ => Ok((envelope.data.unwrap_or(Value::Null), envelope.request_id)),
        }
    }
}

fn decode<D: DeserializeOwned>(action: Action, data: Value) -> Result<D, ApiError> {
    serde_json::from_value(data).map_err(|e| {
        ApiError::new(
            ErrorKind::Unknown,
            format!("{}: unexpected response payload", action),
        )
        .with_source(e)
    })
}

/// Pull the task array out of a query payload: `Data.Tasks`,
/// `Data.TaskList` or a bare array. Anything else is an empty list.
fn task_list(data: Value) -> Value {
    match data {
        Value::Array(_) => data,
        Value::Object(mut map) => ["Tasks", "TaskList"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(list @ Value::Array(_)) => Some(list),
                _ => None,
            })
            .unwrap_or_else(|| Value::Array(Vec::new())),
        _ => Value::Array(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::error::TransportError;
    use crate::mock::MockTransport;

    fn client(mock: &Arc<MockTransport>) -> ApiClient<Arc<MockTransport>> {
        ApiClient::with_transport(Arc::clone(mock), "http://localhost:3000/api/").with_app_id(42)
    }

    #[tokio::test]
    async fn test_get_digital_human_info_decodes_all_fields() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(json!({
            "Code": 0,
            "Message": "ok",
            "Data": {
                "DigitalHumanId": "dh-7",
                "Name": "Lin",
                "AvatarUrl": "https://cdn/cover.png",
                "PreviewUrl": "https://cdn/preview.mp4",
                "IsPublic": true,
                "AppId": 1234,
                "Token": "abc",
                "ExpireTime": 1_700_000_000_000_i64
            }
        }));

        let info = client(&mock)
            .get_digital_human_info(&UserId::new("u1"))
            .await
            .unwrap();

        assert_eq!(info.id, "dh-7");
        assert_eq!(info.name, "Lin");
        assert_eq!(info.cover_url.as_deref(), Some("https://cdn/cover.png"));
        assert_eq!(info.preview_url.as_deref(), Some("https://cdn/preview.mp4"));
        assert!(info.is_public);
        assert_eq!(info.app_id, 1234);
        assert_eq!(info.token.as_deref(), Some("abc"));
        assert_eq!(info.expire_time_ms, 1_700_000_000_000);

        let req = mock.last_request();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.url, "http://localhost:3000/api/GetDigitalHumanInfo");
        assert_eq!(
            req.params.as_ref(),
            Some(&json!({ "Action": "GetDigitalHumanInfo", "UserId": "u1" }))
        );
        assert_eq!(req.header(HEADER_APP_ID), Some("42"));
        assert_eq!(req.header(HEADER_CONTENT_TYPE), Some(CONTENT_TYPE_JSON));
    }

    #[tokio::test]
    async fn test_create_stream_task() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(json!({ "Data": { "TaskId": "t1", "Base64Config": "eyJ..." } }));

        let created = client(&mock)
            .create_stream_task(&CreateTaskRequest::new("u1"))
            .await
            .unwrap();

        assert_eq!(created.task_id.as_str(), "t1");
        assert_eq!(created.base64_config, "eyJ...");

        let req = mock.last_request();
        assert_eq!(req.method, Method::Post);
        assert!(req.url.ends_with("/CreateDigitalHumanStreamTask"));
        assert_eq!(
            req.params.unwrap(),
            json!({ "Action": "CreateDigitalHumanStreamTask", "UserId": "u1" })
        );
    }

    #[tokio::test]
    async fn test_create_stream_task_extra_fields() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(json!({ "Data": { "TaskId": "t1", "Base64Config": "x" } }));

        let request = CreateTaskRequest::new("u1")
            .with_output_mode(OutputMode::Large)
            .with_field("DigitalHumanId", "dh-1");
        client(&mock).create_stream_task(&request).await.unwrap();

        let body = mock.last_request().params.unwrap();
        assert_eq!(body["OutputMode"], 1);
        assert_eq!(body["DigitalHumanId"], "dh-1");
    }

    #[tokio::test]
    async fn test_create_reserved_fields_ignored() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(json!({ "Data": { "TaskId": "t1", "Base64Config": "x" } }));

        let request = CreateTaskRequest::new("u1")
            .with_field("UserId", "")
            .with_field("Action", "StopDigitalHumanStreamTask")
            .with_field("OutputMode", 7);
        assert!(request.extra().is_empty());
        client(&mock).create_stream_task(&request).await.unwrap();

        assert_eq!(
            mock.last_request().params.unwrap(),
            json!({ "Action": "CreateDigitalHumanStreamTask", "UserId": "u1" })
        );
    }

    #[tokio::test]
    async fn test_create_requires_user_id() {
        let mock = Arc::new(MockTransport::new());
        let err = client(&mock)
            .create_stream_task(&CreateTaskRequest::new(""))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParameter);
        assert_eq!(err.code, -2);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_create_missing_base64_config_is_error() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(json!({ "Code": 0, "Data": { "TaskId": "t1" } }));

        let err = client(&mock)
            .create_stream_task(&CreateTaskRequest::new("u1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(err.cause().is_some());
    }

    #[tokio::test]
    async fn test_query_empty_list() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(json!({ "Code": 0, "Data": { "Tasks": [] } }));

        let tasks = client(&mock).query_stream_tasks().await.unwrap();
        assert!(tasks.is_empty());

        let req = mock.last_request();
        assert_eq!(req.method, Method::Get);
        assert!(req.url.ends_with("/QueryDigitalHumanStreamTasks"));
        assert_eq!(req.params.unwrap()["Action"], "QueryDigitalHumanStreamTasks");
    }

    #[tokio::test]
    async fn test_query_list_shapes() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(json!({ "Data": { "TaskList": [{ "TaskId": "a", "RoomId": "test_room_1" }] } }));
        mock.push_ok(json!({ "Data": [{ "TaskId": "b" }, { "TaskId": "c" }] }));
        mock.push_ok(json!({ "Code": 0 }));

        let api = client(&mock);
        let first = api.query_stream_tasks().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].room_id(), "test_room_1");

        let second = api.query_stream_tasks().await.unwrap();
        let ids: Vec<_> = second.iter().map(|t| t.task_id().as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        assert!(api.query_stream_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_error() {
        let mock = Arc::new(MockTransport::new());
        mock.push_err(TransportError::Status {
            status: 500,
            body: String::new(),
        });

        let err = client(&mock)
            .stop_stream_task(&TaskId::new("t1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NetworkError);
        assert_eq!(err.code, 500);
        assert!(err.cause().is_some());
    }

    #[tokio::test]
    async fn test_server_error_code() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(json!({ "code": 404, "message": "task does not exist" }));
        mock.push_ok(json!({ "Code": 500, "Message": "" }));

        let api = client(&mock);
        let err = api.interrupt_drive_task(&TaskId::new("t1")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TaskNotFound);
        assert_eq!(err.message, "task does not exist");

        let err = api.drive_by_audio(&TaskId::new("t1")).await.unwrap_err();
        assert_eq!(err.code, 500);
        assert_eq!(err.message, "audio drive failed");
    }

    #[tokio::test]
    async fn test_non_object_response_is_malformed() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(json!([]));
        mock.push_ok(json!([7, "boom"]));
        mock.push_ok(json!("ok"));

        let api = client(&mock);
        let task_id = TaskId::new("t1");
        for _ in 0..3 {
            let err = api.stop_stream_task(&task_id).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::Unknown);
            assert_eq!(err.code, -999);
            assert!(err.message.contains("malformed response"));
        }
    }

    #[tokio::test]
    async fn test_drive_actions() {
        let mock = Arc::new(MockTransport::new());
        for _ in 0..3 {
            mock.push_ok(json!({ "Code": 0, "RequestId": "req-1", "Data": {} }));
        }

        let api = client(&mock);
        let task_id = TaskId::new("t9");
        let ack = api.drive_by_text(&task_id).await.unwrap();
        assert_eq!(ack.request_id.as_deref(), Some("req-1"));
        api.drive_by_audio(&task_id).await.unwrap();
        api.drive_by_ws_stream_with_tts(&task_id).await.unwrap();

        let actions: Vec<String> = mock
            .requests()
            .into_iter()
            .map(|r| r.params.unwrap()["Action"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(actions, vec!["DriveByText", "DriveByAudio", "DriveByWsStreamWithTTS"]);
        assert_eq!(mock.requests()[0].params.as_ref().unwrap()["TaskId"], "t9");
    }

    #[tokio::test]
    async fn test_blank_task_id_rejected() {
        let mock = Arc::new(MockTransport::new());
        let err = client(&mock)
            .interrupt_drive_task(&TaskId::new(" "))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParameter);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_app_id_header_omitted_until_known() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(json!({ "Data": [] }));

        let api = ApiClient::with_transport(Arc::clone(&mock), "http://h/api");
        api.query_stream_tasks().await.unwrap();
        assert_eq!(mock.last_request().header(HEADER_APP_ID), None);
    }
}
