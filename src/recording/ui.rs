//! Terminal user interface for recording with a live signal visualization.
//!
//! Draws the render scheduler's pixel canvas above a one-line footer with the
//! elapsed time, input level and recording format, and maps key presses to
//! recording commands.

use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};
use std::io::{stdout, Stdout};
use std::time::Duration;

use super::artifact::AudioFormat;
use crate::error::PipelineError;
use crate::render::{CanvasView, PixelCanvas};

const FOOTER_HEIGHT: u16 = 1;
const RETRY_POLL: Duration = Duration::from_millis(100);
const SPINNER: [&str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

/// User input command during recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingCommand {
    /// Keep recording (no key pressed)
    Continue,
    /// Stop and submit for analysis (Enter key)
    Submit,
    /// Stop without submitting (Escape, 'q' or Ctrl+C)
    Cancel,
}

/// Footer contents for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FooterStatus {
    pub elapsed: Duration,
    pub level: u8,
    pub format: AudioFormat,
}

/// Full-screen recorder view.
pub struct RecorderTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    closed: bool,
}

impl RecorderTui {
    /// Creates a new TUI instance and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    /// - If raw mode cannot be enabled
    /// - If alternate screen cannot be entered
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.hide_cursor()?;

        Ok(RecorderTui {
            terminal,
            closed: false,
        })
    }

    /// Pixel dimensions available for the canvas above the footer.
    pub fn canvas_size(&self) -> anyhow::Result<(usize, usize)> {
        let size = self.terminal.size()?;
        let rows = size.height.saturating_sub(FOOTER_HEIGHT);
        Ok((size.width as usize, rows as usize * 2))
    }

    /// Draws the canvas and the status footer.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn render(&mut self, canvas: &PixelCanvas, status: FooterStatus) -> anyhow::Result<()> {
        self.terminal.draw(|frame| {
            let area = frame.area();
            let (canvas_area, footer_area) = split_footer(area);

            frame.render_widget(CanvasView::new(canvas), canvas_area);
            frame.render_widget(
                Paragraph::new(footer_line(status)).style(
                    Style::default()
                        .fg(Color::Rgb(185, 207, 212))
                        .bg(Color::Rgb(0, 0, 0)),
                ),
                footer_area,
            );
        })?;
        Ok(())
    }

    /// Draws a centered progress message while the recording is being analyzed.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn render_busy(&mut self, message: &str, tick: usize) -> anyhow::Result<()> {
        let spinner = SPINNER[tick % SPINNER.len()];
        self.terminal.draw(|frame| {
            let area = frame.area();
            let line = Line::from(vec![
                Span::styled(spinner, Style::default().fg(Color::Rgb(234, 56, 76))),
                Span::raw(" "),
                Span::raw(message),
            ]);
            let centered = Rect {
                x: area.x,
                y: area.y + area.height / 2,
                width: area.width,
                height: area.height.min(1),
            };
            frame.render_widget(
                Paragraph::new(line).alignment(Alignment::Center),
                centered,
            );
        })?;
        Ok(())
    }

    /// Shows a failed analysis and blocks until the user retries or gives up.
    ///
    /// Returns `Submit` for Enter and `Cancel` for Escape, 'q' or Ctrl+C.
    ///
    /// # Errors
    /// - If terminal rendering or event polling fails
    pub fn prompt_retry(&mut self, error: &PipelineError) -> anyhow::Result<RecordingCommand> {
        let lines = retry_lines(error);
        loop {
            self.terminal.draw(|frame| {
                let area = frame.area();
                let height = (lines.len() as u16).min(area.height);
                let centered = Rect {
                    x: area.x,
                    y: area.y + (area.height - height) / 2,
                    width: area.width,
                    height,
                };
                frame.render_widget(
                    Paragraph::new(lines.clone())
                        .alignment(Alignment::Center)
                        .wrap(Wrap { trim: true }),
                    centered,
                );
            })?;
            match self.handle_input(RETRY_POLL)? {
                RecordingCommand::Continue => {}
                command => return Ok(command),
            }
        }
    }

    /// Waits up to `timeout` for a key press and maps it to a command.
    ///
    /// Only Enter (submit), Escape, 'q' and Ctrl+C (cancel) are recognized.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self, timeout: Duration) -> anyhow::Result<RecordingCommand> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                return Ok(match key.code {
                    KeyCode::Enter => {
                        tracing::debug!("Enter pressed: submitting recording");
                        RecordingCommand::Submit
                    }
                    KeyCode::Char('q') | KeyCode::Esc => {
                        tracing::debug!("Escape or 'q' pressed: canceling recording");
                        RecordingCommand::Cancel
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        tracing::debug!("Ctrl+C pressed: canceling recording");
                        RecordingCommand::Cancel
                    }
                    _ => RecordingCommand::Continue,
                });
            }
        }
        Ok(RecordingCommand::Continue)
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    /// - If cursor cannot be shown
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            crossterm::terminal::LeaveAlternateScreen
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for RecorderTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn split_footer(area: Rect) -> (Rect, Rect) {
    let footer_height = FOOTER_HEIGHT.min(area.height);
    let canvas = Rect {
        height: area.height - footer_height,
        ..area
    };
    let footer = Rect {
        y: area.y + canvas.height,
        height: footer_height,
        ..area
    };
    (canvas, footer)
}

fn footer_line(status: FooterStatus) -> Line<'static> {
    let secs = status.elapsed.as_secs();
    Line::from(vec![
        Span::styled("● ", Style::default().fg(Color::Red)),
        Span::raw(format!("{}:{:02}", secs / 60, secs % 60)),
        Span::raw(" / "),
        Span::raw(format!("{}%", status.level)),
        Span::raw(" / "),
        Span::raw(status.format.to_string()),
        Span::styled(
            "   enter: analyze  esc: cancel",
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

fn retry_lines(error: &PipelineError) -> Vec<Line<'static>> {
    vec![
        Line::from(Span::styled(
            error.title(),
            Style::default()
                .fg(Color::Rgb(234, 56, 76))
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(error.user_message()),
        Line::default(),
        Line::from(Span::styled(
            "enter: retry  esc: give up",
            Style::default().fg(Color::DarkGray),
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_prompt_names_failure_and_keys() {
        let lines = retry_lines(&PipelineError::Rejected {
            status: 502,
            detail: "bad gateway".to_string(),
        });
        let text: Vec<String> = lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert_eq!(text[0], "Analysis failed");
        assert_eq!(text[1], "Server error: bad gateway");
        assert_eq!(text[3], "enter: retry  esc: give up");
    }

    #[test]
    fn test_footer_formats_elapsed_time() {
        let line = footer_line(FooterStatus {
            elapsed: Duration::from_secs(75),
            level: 42,
            format: AudioFormat::Ogg,
        });
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(text.starts_with("● 1:15 / 42% / ogg"));
    }

    #[test]
    fn test_split_footer_keeps_one_row() {
        let (canvas, footer) = split_footer(Rect::new(0, 0, 80, 24));
        assert_eq!(canvas.height, 23);
        assert_eq!(footer.y, 23);
        assert_eq!(footer.height, 1);

        let (canvas, footer) = split_footer(Rect::new(0, 0, 10, 0));
        assert_eq!(canvas.height, 0);
        assert_eq!(footer.height, 0);
    }
}
