//! Full-screen notice for failures that end a recording or an analysis.
//!
//! Shows a title and a human-readable message centered on a red screen and
//! waits for a key press.

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};
use std::io::{self, Stdout};

use crate::error::PipelineError;

const BACKGROUND: Color = Color::Rgb(255, 0, 0);
const FOREGROUND: Color = Color::Rgb(255, 255, 255);

/// Error screen for displaying human-readable error messages.
pub struct ErrorScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    closed: bool,
}

impl ErrorScreen {
    /// Creates a new error screen and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    /// - If raw mode cannot be enabled
    /// - If alternate screen cannot be entered
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(ErrorScreen {
            terminal,
            closed: false,
        })
    }

    /// Shows a pipeline failure until a key is pressed.
    pub fn show_pipeline_error(&mut self, error: &PipelineError) -> anyhow::Result<()> {
        self.show_error(error.title(), &error.user_message())
    }

    /// Displays `title` and `message` on a full red screen with centered white text.
    ///
    /// Waits for any key press to dismiss the error. The message wraps to 80%
    /// of the screen width.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn show_error(&mut self, title: &str, message: &str) -> anyhow::Result<()> {
        loop {
            self.terminal.draw(|frame| {
                let area = frame.area();
                frame.render_widget(
                    Paragraph::new("").style(Style::default().bg(BACKGROUND)),
                    area,
                );

                let padding_x = area.width / 10;
                let text_width = (area.width * 80) / 100;
                let style = Style::default().fg(FOREGROUND).bg(BACKGROUND);

                let text = vec![
                    Line::from(Span::styled(title, style.add_modifier(Modifier::BOLD))),
                    Line::from(""),
                    Line::from(Span::styled(message, style)),
                    Line::from(""),
                    Line::from(Span::styled("press any key", style.add_modifier(Modifier::DIM))),
                ];

                let centered_area = Rect {
                    x: area.x + padding_x,
                    y: area.y + area.height / 3,
                    width: text_width,
                    height: area.height - area.height / 3,
                };

                frame.render_widget(
                    Paragraph::new(text)
                        .alignment(Alignment::Center)
                        .wrap(Wrap { trim: true }),
                    centered_area,
                );
            })?;

            if event::poll(std::time::Duration::from_millis(100))? {
                if let Event::Key(_) = event::read()? {
                    break;
                }
            }
        }

        Ok(())
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
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ErrorScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Shows `error` on a notice screen and restores the terminal.
pub fn notify(error: &PipelineError) -> anyhow::Result<()> {
    tracing::warn!("{}: {}", error.title(), error);
    let mut screen = ErrorScreen::new()?;
    screen.show_pipeline_error(error)?;
    screen.cleanup()
}
