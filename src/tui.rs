use std::io;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use ratatui::Terminal;

use crate::core::error::JobwatchError;
use crate::core::snapshot::{JobRow, Severity, Snapshot};

const REDRAW_EVERY: Duration = Duration::from_millis(50);

fn terminal_err(err: io::Error) -> JobwatchError {
    JobwatchError::Terminal {
        message: err.to_string(),
    }
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self, JobwatchError> {
        enable_raw_mode().map_err(terminal_err)?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen).map_err(terminal_err)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = stdout.execute(LeaveAlternateScreen);
    }
}

#[derive(Debug, Default)]
struct AppState {
    snapshot: Snapshot,
    scroll_offset: usize,
    render_stopped: bool,
    should_quit: bool,
}

impl AppState {
    fn scroll_up(&mut self, rows: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(rows);
    }

    fn scroll_down(&mut self, rows: usize) {
        let max_scroll = self.snapshot.rows.len().saturating_sub(1);
        self.scroll_offset = (self.scroll_offset + rows).min(max_scroll);
    }
}

/// Draws snapshots as they arrive from the render thread until the user quits.
pub fn run(snapshots: Receiver<Snapshot>) -> Result<(), JobwatchError> {
    let _guard = TerminalGuard::enter()?;
    let stdout = io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(terminal_err)?;

    let mut app = AppState::default();

    loop {
        loop {
            match snapshots.try_recv() {
                Ok(snapshot) => app.snapshot = snapshot,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !app.render_stopped {
                        tracing::warn!("render loop stopped; showing last snapshot");
                        app.render_stopped = true;
                    }
                    break;
                }
            }
        }
        app.scroll_offset = app
            .scroll_offset
            .min(app.snapshot.rows.len().saturating_sub(1));

        terminal
            .draw(|frame| {
                let layout = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(3), Constraint::Length(3)])
                    .split(frame.size());

                frame.render_widget(render_table(&app), layout[0]);
                frame.render_widget(render_footer(&app.snapshot), layout[1]);
            })
            .map_err(terminal_err)?;

        if event::poll(REDRAW_EVERY).map_err(terminal_err)? {
            if let Event::Key(key) = event::read().map_err(terminal_err)? {
                match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        app.should_quit = true;
                    }
                    KeyCode::Char('q') | KeyCode::Esc => {
                        app.should_quit = true;
                    }
                    KeyCode::Up => app.scroll_up(1),
                    KeyCode::Down => app.scroll_down(1),
                    KeyCode::PageUp => app.scroll_up(10),
                    KeyCode::PageDown => app.scroll_down(10),
                    KeyCode::Home => app.scroll_offset = 0,
                    _ => {}
                }
            }
        }

        if app.should_quit {
            tracing::info!("shutting down");
            break;
        }
    }

    Ok(())
}

fn severity_style(severity: Severity) -> Style {
    match severity {
        Severity::Success => Style::default().fg(Color::Green),
        Severity::Failure => Style::default().fg(Color::Red),
        Severity::Pending => Style::default().fg(Color::Yellow),
        Severity::Unknown => Style::default().fg(Color::DarkGray),
    }
}

fn job_row(row: &JobRow) -> Row<'static> {
    let mut details: Vec<Line> = row.links.iter().map(|link| Line::from(link.clone())).collect();
    if let Some(metrics) = &row.metrics {
        details.push(Line::from(metrics.clone()));
    }
    if let Some(error) = &row.last_error {
        details.push(Line::from(Span::styled(
            format!("error: {error}"),
            Style::default().fg(Color::Red),
        )));
    }
    let height = details.len().max(1) as u16;

    Row::new(vec![
        Cell::from(row.id.clone()),
        Cell::from(row.raw_state.clone()).style(severity_style(row.severity)),
        Cell::from(details),
        Cell::from(row.units.clone()),
        Cell::from(row.elapsed.clone()),
    ])
    .height(height)
}

fn render_table(app: &AppState) -> Table<'static> {
    let rows: Vec<Row> = app
        .snapshot
        .rows
        .iter()
        .skip(app.scroll_offset)
        .map(job_row)
        .collect();

    let header = Row::new(vec!["ID", "Status", "Details", "Units", "Elapsed Time"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    Table::new(
        rows,
        [
            Constraint::Percentage(20),
            Constraint::Length(12),
            Constraint::Min(30),
            Constraint::Length(8),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(Block::default().title("Your log of jobs").borders(Borders::ALL))
}

fn render_footer(snapshot: &Snapshot) -> Paragraph<'static> {
    Paragraph::new(snapshot.footer())
        .block(Block::default().title("q to quit").borders(Borders::ALL))
}
