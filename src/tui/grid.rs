use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};
use ratatui::Frame;

use super::mode::TuiState;
use crate::shared::{DisplayState, STEPS_PER_PATTERN};

const NAME_WIDTH: usize = 11;

// one line per track: name, the 16 steps in groups of four, then the source
pub fn draw_step_grid(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let mut lines = Vec::with_capacity(state.grid.len() + 1);
    lines.push(step_ruler(state.playing_step));

    for (row, steps) in state.grid.iter().enumerate() {
        let mut spans = vec![Span::styled(
            format!("{:<NAME_WIDTH$}", state.track_names[row]),
            Style::default().fg(Color::Cyan),
        )];
        for (col, &on) in steps.iter().enumerate() {
            if col % 4 == 0 {
                spans.push(Span::raw(" "));
            }
            let mut style = if on {
                Style::default().fg(Color::LightMagenta).bg(Color::Magenta)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            if state.playing_step == Some(col as u8) {
                style = style.add_modifier(Modifier::BOLD).fg(Color::Yellow);
            }
            if ts.cursor_row as usize == row && ts.cursor_col as usize == col {
                style = style.add_modifier(Modifier::REVERSED);
            }
            spans.push(Span::styled(if on { "■ " } else { "· " }, style));
        }
        spans.push(Span::styled(
            format!("  {}", state.track_sources[row]),
            Style::default().fg(Color::DarkGray),
        ));
        lines.push(Line::from(spans));
    }

    let block = Block::bordered().title(" pattern ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

// step numbers with the playhead marked
fn step_ruler(playing_step: Option<u8>) -> Line<'static> {
    let mut spans = vec![Span::raw(" ".repeat(NAME_WIDTH))];
    for col in 0..STEPS_PER_PATTERN {
        if col % 4 == 0 {
            spans.push(Span::raw(" "));
        }
        let style = if playing_step == Some(col as u8) {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!("{:<2}", (col + 1) % 10), style));
    }
    Line::from(spans)
}
