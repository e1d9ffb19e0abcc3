//! Task that owns one shutter.
//!
//! [`spawn_cover`] moves a [`CoverController`] into a tokio task and returns
//! a cloneable [`CoverHandle`]. The task is the only writer of the cover's
//! state: commands, sensor events, option updates and estimation ticks are
//! handled one at a time, in arrival order. A command runs to completion
//! (including every step and delay of a stop sequence) before the next
//! input is looked at, so two stop sequences of the same shutter never
//! interleave.
//!
//! # Example
//!
//! ```rust
//! use rs_shutters::{spawn_cover, CoverConfig, CoverController};
//! use rs_shutters::hal::{MockInvoker, MockPublisher};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = CoverConfig::new("switch.up", "switch.down").with_initial_position(20.0);
//! let controller = CoverController::new(config, MockInvoker::new(), MockPublisher::new()).unwrap();
//! let (handle, task) = spawn_cover(controller);
//!
//! handle.open().await.unwrap();
//! assert!(handle.state().await.unwrap().is_opening);
//!
//! handle.shutdown().await.unwrap();
//! let controller = task.await.unwrap();
//! assert!(!controller.is_moving());
//! # }
//! ```

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::commands::CoverCommand;
use crate::config::CoverConfig;
use crate::cover::{CoverController, CoverState, SensorEvent};
use crate::error::{ConfigError, CoverError};
use crate::traits::{ActionInvoker, StatePublisher};

/// Pending requests per shutter before senders wait.
pub const REQUEST_QUEUE_DEPTH: usize = 32;

enum Request {
    Command(CoverCommand, oneshot::Sender<Result<(), CoverError>>),
    Sensor(SensorEvent),
    UpdateOptions(CoverConfig, oneshot::Sender<Result<(), ConfigError>>),
    State(oneshot::Sender<CoverState>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to a running cover task.
#[derive(Clone, Debug)]
pub struct CoverHandle {
    tx: mpsc::Sender<Request>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Request::Command(cmd, _) => write!(f, "Command({})", cmd.as_str()),
            Request::Sensor(ev) => write!(f, "Sensor({})", ev.entity_id),
            Request::UpdateOptions(..) => f.write_str("UpdateOptions"),
            Request::State(_) => f.write_str("State"),
            Request::Shutdown(_) => f.write_str("Shutdown"),
        }
    }
}

impl CoverHandle {
    async fn send(&self, request: Request) -> Result<(), CoverError> {
        self.tx.send(request).await.map_err(|_| CoverError::Closed)
    }

    /// Run a command and wait for it to finish.
    pub async fn command(&self, command: CoverCommand) -> Result<(), CoverError> {
        let rx = self.submit(command).await?;
        rx.await.map_err(|_| CoverError::Closed)?
    }

    /// Queue a command without waiting for it to run.
    ///
    /// The returned receiver resolves with the command's result. Queue order
    /// is execution order.
    pub async fn submit(
        &self,
        command: CoverCommand,
    ) -> Result<oneshot::Receiver<Result<(), CoverError>>, CoverError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Command(command, reply)).await?;
        Ok(rx)
    }

    /// Move to fully open.
    pub async fn open(&self) -> Result<(), CoverError> {
        self.command(CoverCommand::Open).await
    }

    /// Move to fully closed.
    pub async fn close(&self) -> Result<(), CoverError> {
        self.command(CoverCommand::Close).await
    }

    /// Halt the shutter.
    pub async fn stop(&self) -> Result<(), CoverError> {
        self.command(CoverCommand::Stop).await
    }

    /// Move to `position`.
    pub async fn set_position(&self, position: f64) -> Result<(), CoverError> {
        self.command(CoverCommand::SetPosition { position }).await
    }

    /// Move to the shade position.
    pub async fn set_shade(&self) -> Result<(), CoverError> {
        self.command(CoverCommand::SetShade).await
    }

    /// Forward a sensor report. Returns once it is queued.
    pub async fn sensor_event(&self, event: SensorEvent) -> Result<(), CoverError> {
        self.send(Request::Sensor(event)).await
    }

    /// Replace the configuration.
    pub async fn update_options(&self, config: CoverConfig) -> Result<(), CoverError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::UpdateOptions(config, reply)).await?;
        rx.await.map_err(|_| CoverError::Closed)?.map_err(CoverError::from)
    }

    /// Current state snapshot.
    pub async fn state(&self) -> Result<CoverState, CoverError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::State(reply)).await?;
        rx.await.map_err(|_| CoverError::Closed)
    }

    /// Stop tracking and end the task. No actions are invoked.
    pub async fn shutdown(&self) -> Result<(), CoverError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Shutdown(reply)).await?;
        rx.await.map_err(|_| CoverError::Closed)
    }

    /// True once the task has ended.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the task owning `controller`.
///
/// The task ends on [`CoverHandle::shutdown`] or when every handle is
/// dropped, and hands the controller back through its `JoinHandle`.
pub fn spawn_cover<A, P>(
    controller: CoverController<A, P>,
) -> (CoverHandle, JoinHandle<CoverController<A, P>>)
where
    A: ActionInvoker + 'static,
    P: StatePublisher + 'static,
{
    let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
    let task = tokio::spawn(run(controller, rx));
    (CoverHandle { tx }, task)
}

async fn run<A, P>(
    mut controller: CoverController<A, P>,
    mut rx: mpsc::Receiver<Request>,
) -> CoverController<A, P>
where
    A: ActionInvoker,
    P: StatePublisher,
{
    debug!(cover = %controller.config().name, "cover task started");
    loop {
        tokio::select! {
            request = rx.recv() => {
                let Some(request) = request else {
                    controller.shutdown();
                    break;
                };
                match request {
                    Request::Command(command, reply) => {
                        let result = controller.apply(command).await;
                        if let Err(e) = &result {
                            warn!(command = command.as_str(), error = %e, "command failed");
                        }
                        let _ = reply.send(result);
                    }
                    Request::Sensor(event) => {
                        controller.handle_sensor_event(&event);
                    }
                    Request::UpdateOptions(config, reply) => {
                        let _ = reply.send(controller.update_options(config));
                    }
                    Request::State(reply) => {
                        let _ = reply.send(controller.state());
                    }
                    Request::Shutdown(reply) => {
                        controller.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                }
            }
            () = controller.next_tick() => {
                controller.on_tick(Instant::now());
            }
        }
    }
    debug!(cover = %controller.config().name, "cover task stopped");
    controller
}
