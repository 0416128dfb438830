use std::{
    io,
    sync::mpsc,
    thread::{self, JoinHandle},
};

use thiserror::Error;

use crate::{Failure, Isolate, IsolateCreateInfo, PortId, STACK_SIZE_BUFFER};

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to start isolate thread: {0}")]
    Thread(#[from] io::Error),
    #[error("isolate thread exited before reporting its main port")]
    Startup,
}

/// An isolate running its dispatch loop on its own thread.
#[derive(Debug)]
pub struct SpawnedIsolate {
    main_port: PortId,
    name: String,
    handle: JoinHandle<Option<Failure>>,
}

impl SpawnedIsolate {
    pub fn main_port(&self) -> PortId {
        self.main_port
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the isolate to shut down. Yields the sticky error it had at
    /// that point.
    pub fn join(self) -> thread::Result<Option<Failure>> {
        self.handle.join()
    }
}

/// Start an isolate on a new thread.
///
/// `setup` runs first on that thread to install libraries and open ports.
/// The isolate then handles messages until it has no live ports or a
/// failure goes unrecovered, and shuts down.
pub fn spawn_isolate<F>(info: IsolateCreateInfo, setup: F) -> Result<SpawnedIsolate, SpawnError>
where
    F: FnOnce(&mut Isolate) + Send + 'static,
{
    let thread_name = info
        .name_prefix
        .clone()
        .unwrap_or_else(|| crate::DEFAULT_NAME_PREFIX.to_owned());
    let stack_size = info.stack_size + STACK_SIZE_BUFFER;
    let (started_tx, started_rx) = mpsc::channel();

    let handle = thread::Builder::new()
        .name(thread_name)
        .stack_size(stack_size)
        .spawn(move || {
            let mut isolate = Isolate::new(info);
            let _ = started_tx.send((isolate.main_port(), isolate.name().to_owned()));
            setup(&mut isolate);
            if !isolate.run() {
                log::debug!("{}: stopped on an unrecovered failure", isolate.name());
            }
            let error = isolate.sticky_error().cloned();
            if let Some(error) = &error {
                log::error!("{}: in shutdown: {error}", isolate.name());
            }
            isolate.shutdown();
            error
        })?;

    let (main_port, name) = started_rx.recv().map_err(|_| SpawnError::Startup)?;
    Ok(SpawnedIsolate {
        main_port,
        name,
        handle,
    })
}
