//! Task/drive controller.
//!
//! Owns the single "current task" of a client session, turns API results
//! into task state changes and publishes them to subscribers.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use dhstream_core::{DriveType, OutputMode, Task, TaskId, TaskStatus, UserId};

use crate::api::{Ack, Action, ApiClient, CreateTaskRequest};
use crate::error::ApiError;
use crate::transport::{HttpTransport, Transport};

/// Room prefix of tasks created by this client.
pub const DEFAULT_ROOM_PREFIX: &str = "test_room_";

/// Notifications published by [`TaskController`].
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// The current task changed status.
    StatusChanged { task_id: TaskId, status: TaskStatus },
    /// A drive request was accepted.
    Driven { task_id: TaskId, drive: DriveType },
    /// An operation failed; the message is meant for display.
    Failed {
        action: Action,
        code: i64,
        message: String,
    },
}

/// A freshly created, running task and the renderer config for it.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedTask {
    pub task: Task,
    pub base64_config: String,
}

/// Outcome of [`TaskController::destroy_tasks`].
#[derive(Debug, Default)]
pub struct DestroyReport {
    pub stopped: Vec<TaskId>,
    pub failed: Vec<(TaskId, ApiError)>,
}

/// Holds at most one current task and drives it through the API client.
pub struct TaskController<T = HttpTransport> {
    client: ApiClient<T>,
    current: Option<Task>,
    subscribers: Vec<mpsc::UnboundedSender<TaskEvent>>,
}

impl<T: Transport> TaskController<T> {
    pub fn new(client: ApiClient<T>) -> Self {
        Self {
            client,
            current: None,
            subscribers: Vec::new(),
        }
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    /// The task currently held, if any.
    pub fn current_task(&self) -> Option<&Task> {
        self.current.as_ref()
    }

    /// Receive every event published from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TaskEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Create a stream task for `user_id` and make it current.
    ///
    /// Fails while another task is running. The app id returned by the
    /// backend is adopted by the client for subsequent calls.
    pub async fn create_task(
        &mut self,
        user_id: UserId,
        output_mode: OutputMode,
    ) -> Result<StartedTask, ApiError> {
        let action = Action::CreateDigitalHumanStreamTask;
        if let Some(task) = self.current.as_ref().filter(|t| !t.is_terminal()) {
            let err = ApiError::invalid_parameter(format!(
                "task {} is already running",
                task.task_id()
            ));
            return Err(self.fail(action, err));
        }

        info!(user_id = %user_id, "Creating stream task");
        let request = CreateTaskRequest::new(user_id.clone()).with_output_mode(output_mode);
        let created = match self.client.create_stream_task(&request).await {
            Ok(created) => created,
            Err(e) => return Err(self.fail(action, e)),
        };

        let (task, base64_config) = match created.into_running_task(user_id) {
            Ok(started) => started,
            Err(e) => return Err(self.fail(action, e.into())),
        };

        self.client.set_app_id(task.app_id());
        info!(
            task_id = %task.task_id(),
            room_id = %task.room_id(),
            stream_id = %task.stream_id(),
            "Stream task running"
        );
        self.current = Some(task.clone());
        self.emit(TaskEvent::StatusChanged {
            task_id: task.task_id().clone(),
            status: TaskStatus::Running,
        });

        Ok(StartedTask {
            task,
            base64_config,
        })
    }

    /// Stop the current task. On success it is returned `Stopped` and no
    /// longer held.
    pub async fn stop_task(&mut self) -> Result<Task, ApiError> {
        self.end_current(Action::StopDigitalHumanStreamTask).await
    }

    /// Interrupt the current task. Like [`stop_task`](Self::stop_task), a
    /// successful interrupt ends the session.
    pub async fn interrupt(&mut self) -> Result<Task, ApiError> {
        self.end_current(Action::InterruptDriveTask).await
    }

    /// Drive the current task.
    pub async fn drive(&mut self, drive: DriveType) -> Result<Ack, ApiError> {
        let action = Action::for_drive(drive);
        let task_id = match self.running_task_id() {
            Ok(id) => id,
            Err(e) => return Err(self.fail(action, e)),
        };

        match self.client.drive(drive, &task_id).await {
            Ok(ack) => {
                debug!(task_id = %task_id, drive = %drive, "Drive accepted");
                self.emit(TaskEvent::Driven { task_id, drive });
                Ok(ack)
            }
            Err(e) => Err(self.fail(action, e)),
        }
    }

    /// Query the backend and reconcile the held task with its view.
    ///
    /// A held task the backend no longer lists is marked stopped and dropped.
    pub async fn refresh(&mut self) -> Result<Vec<Task>, ApiError> {
        let tasks = match self.client.query_stream_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => return Err(self.fail(Action::QueryDigitalHumanStreamTasks, e)),
        };

        let missing = self
            .current
            .as_ref()
            .map(|held| !tasks.iter().any(|t| t.task_id() == held.task_id()))
            .unwrap_or(false);
        if missing {
            if let Some(task) = self.release_current() {
                info!(task_id = %task.task_id(), "Held task no longer listed by backend");
            }
        }

        Ok(tasks)
    }

    /// Stop every backend task whose room id starts with `room_prefix`.
    ///
    /// Tasks are stopped one after another; individual failures are
    /// recorded and skipped.
    pub async fn destroy_tasks(&mut self, room_prefix: &str) -> Result<DestroyReport, ApiError> {
        let tasks = match self.client.query_stream_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => return Err(self.fail(Action::QueryDigitalHumanStreamTasks, e)),
        };

        let mut report = DestroyReport::default();
        for task in tasks.iter().filter(|t| t.room_id().starts_with(room_prefix)) {
            let task_id = task.task_id().clone();
            match self.client.stop_stream_task(&task_id).await {
                Ok(_) => {
                    if self.is_current(&task_id) {
                        self.release_current();
                    }
                    report.stopped.push(task_id);
                }
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "Failed to stop task, continuing");
                    report.failed.push((task_id, e));
                }
            }
        }

        info!(
            stopped = report.stopped.len(),
            failed = report.failed.len(),
            "Destroyed tasks"
        );
        Ok(report)
    }

    async fn end_current(&mut self, action: Action) -> Result<Task, ApiError> {
        let task_id = match self.running_task_id() {
            Ok(id) => id,
            Err(e) => return Err(self.fail(action, e)),
        };

        let result = match action {
            Action::InterruptDriveTask => self.client.interrupt_drive_task(&task_id).await,
            _ => self.client.stop_stream_task(&task_id).await,
        };
        if let Err(e) = result {
            return Err(self.fail(action, e));
        }

        info!(task_id = %task_id, action = %action, "Task ended");
        self.release_current()
            .ok_or_else(|| ApiError::task_not_found(format!("task {} is no longer held", task_id)))
    }

    fn running_task_id(&self) -> Result<TaskId, ApiError> {
        match &self.current {
            Some(task) if task.status() == TaskStatus::Running => Ok(task.task_id().clone()),
            Some(task) => Err(ApiError::task_not_found(format!(
                "task {} is not running",
                task.task_id()
            ))),
            None => Err(ApiError::task_not_found("no current task")),
        }
    }

    fn is_current(&self, task_id: &TaskId) -> bool {
        self.current
            .as_ref()
            .map(|t| t.task_id() == task_id)
            .unwrap_or(false)
    }

    /// Drop the held task, marking it stopped.
    fn release_current(&mut self) -> Option<Task> {
        let mut task = self.current.take()?;
        if let Err(e) = task.stop() {
            debug!(task_id = %task.task_id(), error = %e, "Task already terminal");
        }
        self.emit(TaskEvent::StatusChanged {
            task_id: task.task_id().clone(),
            status: task.status(),
        });
        Some(task)
    }

    fn fail(&mut self, action: Action, err: ApiError) -> ApiError {
        warn!(action = %action, code = err.code, message = %err.message, "Operation failed");
        self.emit(TaskEvent::Failed {
            action,
            code: err.code,
            message: err.message.clone(),
        });
        err
    }

    fn emit(&mut self, event: TaskEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
