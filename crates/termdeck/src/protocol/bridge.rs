//! Stdio host bridge.
//!
//! One tokio task owns the coordinator. It reads input lines, writes events
//! and host commands back out, and calls `tick` whenever the coordinator's
//! next deadline passes. The message channel's driver runs on its own task
//! and hands delivered host commands to the writer through [`LineSink`].

use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use termdeck_core::{DeckConfig, Event, HostCommand};
use termdeck_session::{
    Coordinator, CoordinatorDeps, EventSink, MessageChannel, MessageSink, StateStore,
};
use termdeck_view::HeadlessSurface;

use super::wire::{Inbound, LineSink, Outbound};

/// Drives a [`Coordinator`] from JSON lines.
pub struct HostBridge {
    coordinator: Coordinator,
    events: EventSink,
    event_rx: mpsc::UnboundedReceiver<Event>,
    host_rx: mpsc::UnboundedReceiver<Outbound>,
    store: Option<Box<dyn StateStore + Send>>,
}

impl HostBridge {
    /// Build a bridge over headless views.
    pub fn new(config: DeckConfig) -> Self {
        let (sink, host_rx) = LineSink::channel();
        let channel = Arc::new(MessageChannel::new(
            config.channel.clone(),
            Arc::new(sink) as Arc<dyn MessageSink<HostCommand>>,
        ));
        let (events, event_rx) = EventSink::channel();
        let surface = HeadlessSurface::new(config.scrollback.buffer_limit);

        let coordinator = Coordinator::new(CoordinatorDeps {
            surface: Box::new(surface),
            channel,
            events: events.clone(),
            config,
        });

        Self {
            coordinator,
            events,
            event_rx,
            host_rx,
            store: None,
        }
    }

    /// Restore sessions from `store` now and save back to it on shutdown.
    pub fn with_state_store(
        mut self,
        store: impl StateStore + Send + 'static,
    ) -> termdeck_core::Result<Self> {
        let state = store.load()?;
        if !state.is_empty() {
            self.coordinator.restore_state(&state);
        }
        self.store = Some(Box::new(store));
        Ok(self)
    }

    /// Coordinator driven by this bridge.
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Process lines from `reader` until EOF, then shut down.
    pub async fn run<R, W>(mut self, reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let driver = self.coordinator.channel().spawn_driver();
        let mut lines = reader.lines();
        info!("Bridge running");

        loop {
            let deadline = self.coordinator.next_deadline();

            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line).await,
                    None => {
                        debug!("Input closed");
                        break;
                    }
                },
                Some(event) = self.event_rx.recv() => {
                    write_line(&mut writer, &Outbound::Event(event)).await?;
                }
                Some(outbound) = self.host_rx.recv() => {
                    write_line(&mut writer, &outbound).await?;
                }
                _ = sleep_until(deadline) => {
                    self.coordinator.tick(Instant::now());
                }
            }
        }

        self.shutdown(driver, &mut writer).await
    }

    async fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let now = Instant::now();
        match serde_json::from_str::<Inbound>(line) {
            Ok(Inbound::Ui(command)) => {
                // Failures are already reported as CommandFailed.
                if let Err(e) = self.coordinator.handle_command(command, now).await {
                    debug!("Command rejected: {}", e);
                }
            }
            Ok(Inbound::Host(event)) => self.coordinator.handle_host_event(event, now),
            Err(e) => {
                warn!("Malformed input line: error={}", e);
                self.events.emit(Event::CommandFailed {
                    command: "parse".to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    async fn shutdown<W>(mut self, driver: JoinHandle<()>, writer: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.coordinator.persisted_state()) {
                warn!("Failed to save state: error={}", e);
            }
        }

        self.coordinator.channel().close();
        if let Err(e) = driver.await {
            warn!("Channel driver ended abnormally: error={}", e);
        }
        self.coordinator.flush().await;
        self.coordinator.dispose(Instant::now());

        while let Ok(event) = self.event_rx.try_recv() {
            write_line(writer, &Outbound::Event(event)).await?;
        }
        while let Ok(outbound) = self.host_rx.try_recv() {
            write_line(writer, &outbound).await?;
        }
        writer.flush().await?;

        info!("Bridge stopped");
        Ok(())
    }
}

async fn write_line<W>(writer: &mut W, message: &Outbound) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(message.to_line()?.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending::<()>().await,
    }
}
