use tokio::task::JoinHandle;
use crate::error::{Error, Result};

/// How a long-running service task ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskExit {
    Returned,
    Panicked,
    Cancelled,
}

/// Long-running services of the index process: the ticker, the REST server
/// and the SIGHUP reloader. None of them returns while the process is
/// healthy, so any exit is reported as a failure.
#[derive(Default)]
pub struct TaskSupervisor {
    services: Vec<(&'static str, JoinHandle<()>)>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, service: &'static str, future: F) -> &mut Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.services.push((service, tokio::spawn(future)));
        tracing::info!(service, "Service started");
        self
    }

    /// Collect every service that has exited since the last check.
    pub async fn exited(&mut self) -> Vec<(&'static str, TaskExit)> {
        let (finished, running): (Vec<_>, Vec<_>) = self.services
            .drain(..)
            .partition(|(_, handle)| handle.is_finished());
        self.services = running;

        let mut exits = Vec::with_capacity(finished.len());
        for (service, handle) in finished {
            let exit = match handle.await {
                Ok(()) => TaskExit::Returned,
                Err(e) if e.is_panic() => TaskExit::Panicked,
                Err(_) => TaskExit::Cancelled,
            };
            tracing::error!(service, ?exit, "Service exited");
            exits.push((service, exit));
        }
        exits
    }

    /// `TaskFailed` naming each exited service and how it ended.
    pub async fn check_health(&mut self) -> Result<()> {
        let exits = self.exited().await;
        if exits.is_empty() {
            return Ok(());
        }

        let summary: Vec<String> = exits.iter()
            .map(|(service, exit)| format!("{} ({:?})", service, exit))
            .collect();
        Err(Error::TaskFailed(format!("services exited: {}", summary.join(", "))))
    }

    pub fn running(&self) -> Vec<&'static str> {
        self.services.iter().map(|(service, _)| *service).collect()
    }

    pub async fn shutdown_all(&mut self) {
        tracing::info!("Stopping {} services", self.services.len());
        for (service, handle) in self.services.drain(..) {
            handle.abort();
            tracing::debug!(service, "Service aborted");
        }
    }
}
