use super::RenderError;
use crate::session::{SessionSnapshot, SessionState};
use crate::util::{format_duration, megabytes, timestamp};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use std::collections::BTreeSet;
use std::io::Write;

const TITLE: &str = "The Infinite Web Page. Live Log of captured clients.";
const MIN_WIDTH: u16 = 40;
/// Title, one session and the footer.
const MIN_HEIGHT: u16 = 3;

/// Server-wide figures shown in the footer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Status {
    port: u16,
    active: usize,
    total_sessions: u64,
    total_bytes: u64,
}

impl Status {
    pub fn new(port: u16, active: usize, total_sessions: u64, total_bytes: u64) -> Self {
        Self {
            port,
            active,
            total_sessions,
            total_bytes,
        }
    }

    fn line(&self, hidden: usize) -> String {
        let mut line = format!(
            "Listening on port {} | Active: {} | Total: {} | Served: {:.3} MB",
            self.port,
            self.active,
            self.total_sessions,
            megabytes(self.total_bytes)
        );
        if hidden > 0 {
            line.push_str(&format!(" | {} off-screen", hidden));
        }
        line
    }
}

/// Keeps track of what is on the terminal between two draws.
#[derive(Debug)]
pub struct Screen {
    user_agent_width: usize,
    size: Option<(u16, u16)>,
    drawn: BTreeSet<u16>,
}

impl Screen {
    pub fn new(user_agent_width: usize) -> Self {
        Self {
            user_agent_width,
            size: None,
            drawn: BTreeSet::new(),
        }
    }

    pub fn draw<W: Write>(
        &mut self,
        out: &mut W,
        (width, height): (u16, u16),
        sessions: &[SessionSnapshot],
        status: &Status,
    ) -> Result<(), RenderError> {
        if width < MIN_WIDTH || height < MIN_HEIGHT {
            self.size = None;
            return Err(RenderError::TerminalTooSmall { width, height });
        }
        if self.size != Some((width, height)) {
            queue!(out, Clear(ClearType::All), MoveTo(0, 0), Print(fit(TITLE, width.into())))?;
            self.drawn.clear();
            self.size = Some((width, height));
        }

        let footer = height - 1;
        let mut rows = BTreeSet::new();
        let mut hidden = 0;
        for session in sessions {
            match u16::try_from(session.display_row()) {
                Ok(row) if row < footer => {
                    self.draw_session(out, row, width.into(), session)?;
                    rows.insert(row);
                }
                _ => hidden += 1,
            }
        }
        for row in self.drawn.difference(&rows) {
            queue!(out, MoveTo(0, *row), Clear(ClearType::CurrentLine))?;
        }
        self.drawn = rows;

        queue!(
            out,
            MoveTo(0, footer),
            Clear(ClearType::CurrentLine),
            SetForegroundColor(Color::Cyan),
            Print(fit(&status.line(hidden), width.into())),
            ResetColor
        )?;
        out.flush()?;
        Ok(())
    }

    fn draw_session<W: Write>(
        &self,
        out: &mut W,
        row: u16,
        width: usize,
        session: &SessionSnapshot,
    ) -> Result<(), RenderError> {
        let (info, stats) = session_line(session, self.user_agent_width);
        let stats = fit(&stats, width);
        let info = fit(&info, width - stats.chars().count());
        queue!(
            out,
            MoveTo(0, row),
            Clear(ClearType::CurrentLine),
            Print(info),
            SetForegroundColor(Color::Red),
            Print(stats),
            ResetColor
        )?;
        Ok(())
    }
}

/// Splits a session's line into its request description and its transfer
/// figures.
pub(crate) fn session_line(session: &SessionSnapshot, user_agent_width: usize) -> (String, String) {
    let request = session.request();
    let info = format!(
        "{} CLIENT {}:{} {} {} ({})",
        timestamp(session.connection_time()),
        session.peer().ip(),
        session.peer().port(),
        request.method(),
        request.path(),
        fit(request.user_agent(), user_agent_width)
    );
    let stats = match session.state() {
        SessionState::Probing => format!(" Hold Duration {}", format_duration(session.elapsed())),
        _ => format!(
            " Data {:>5.3} MB Duration {}",
            megabytes(session.bytes_transferred()),
            format_duration(session.elapsed())
        ),
    };
    (info, stats)
}

fn fit(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}
