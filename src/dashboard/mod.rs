//! Live terminal view of trapped clients.
//!
//! Each session owns one screen line, addressed by its display row, so a
//! line never moves once it is drawn. Redraws happen on their own cadence
//! and only ever read the registry.

use crate::session::SessionRegistry;
use crate::DashboardConfig;
use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use std::future::Future;
use std::io::{self, Write};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, trace, warn};

mod render;

pub use self::render::{Screen, Status};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("terminal too small ({width}x{height})")]
    TerminalTooSmall { width: u16, height: u16 },

    #[error("terminal write failed")]
    Io(#[from] io::Error),

    #[error("terminal writer stopped")]
    WriterGone,
}

pub struct Dashboard {
    registry: SessionRegistry,
    config: DashboardConfig,
    port: u16,
    screen: Screen,
    failing: bool,
    skipped_frames: u64,
}

impl Dashboard {
    pub fn new(registry: SessionRegistry, config: DashboardConfig, port: u16) -> Self {
        Self {
            screen: Screen::new(config.user_agent_width()),
            registry,
            config,
            port,
            failing: false,
            skipped_frames: 0,
        }
    }

    /// Refresh ticks dropped because the terminal had not taken the previous
    /// frame yet.
    pub fn skipped_frames(&self) -> u64 {
        self.skipped_frames
    }

    fn status(&self) -> Status {
        Status::new(
            self.port,
            self.registry.len(),
            self.registry.total_sessions(),
            self.registry.total_bytes(),
        )
    }

    /// Draws the current state of the registry for a terminal of `size`
    /// (columns, rows).
    pub fn render<W: Write>(&mut self, out: &mut W, size: (u16, u16)) -> Result<(), RenderError> {
        let status = self.status();
        let sessions = self.registry.snapshot();
        self.screen.draw(out, size, &sessions, &status)
    }

    /// Redraws the terminal on every refresh tick until `shutdown` completes,
    /// then hands the terminal back.
    pub async fn run<F>(mut self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        execute!(io::stdout(), EnterAlternateScreen, Hide)?;
        self.draw_to(tokio::io::stdout(), terminal::size, shutdown).await;
        restore_terminal()
    }

    /// Redraws into `out` on every refresh tick until `shutdown` completes.
    ///
    /// Frames are handed to a writer task through a one-slot queue. While the
    /// slot is taken the tick is skipped without rendering, so a terminal that
    /// stops reading only stalls the dashboard.
    pub async fn draw_to<W, S, F>(&mut self, out: W, mut size: S, shutdown: F)
    where
        W: AsyncWrite + Send + Unpin + 'static,
        S: FnMut() -> io::Result<(u16, u16)>,
        F: Future<Output = ()>,
    {
        let (frames, queue) = mpsc::channel(1);
        let writer = tokio::spawn(write_frames(out, queue));
        let mut refresh = time::interval(self.config.refresh());
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = refresh.tick() => self.refresh(&frames, &mut size),
            }
        }
        writer.abort();
    }

    fn refresh<S>(&mut self, frames: &mpsc::Sender<Vec<u8>>, size: &mut S)
    where
        S: FnMut() -> io::Result<(u16, u16)>,
    {
        let slot = match frames.try_reserve() {
            Ok(slot) => slot,
            Err(TrySendError::Full(())) => {
                self.skipped_frames += 1;
                trace!("Terminal is behind, skipping dashboard refresh");
                return;
            }
            Err(TrySendError::Closed(())) => {
                self.report(Err(RenderError::WriterGone));
                return;
            }
        };
        let result = (*size)().map_err(RenderError::from).and_then(|size| {
            let mut frame = Vec::new();
            self.render(&mut frame, size)?;
            Ok(frame)
        });
        match result {
            Ok(frame) => {
                slot.send(frame);
                self.report(Ok(()));
            }
            Err(err) => self.report(Err(err)),
        }
    }

    fn report(&mut self, result: Result<(), RenderError>) {
        match result {
            Ok(()) if self.failing => {
                info!("Dashboard rendering again");
                self.failing = false;
            }
            Ok(()) => {}
            Err(err) => {
                if !self.failing {
                    warn!("Skipping dashboard refresh: {}", err);
                }
                self.failing = true;
            }
        }
    }
}

async fn write_frames<W>(mut out: W, mut queue: mpsc::Receiver<Vec<u8>>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = queue.recv().await {
        let written = match out.write_all(&frame).await {
            Ok(()) => out.flush().await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            warn!("Dashboard output closed: {}", err);
            return;
        }
    }
}

/// Leaves the alternate screen and shows the cursor again.
pub fn restore_terminal() -> io::Result<()> {
    execute!(io::stdout(), Show, LeaveAlternateScreen)
}
