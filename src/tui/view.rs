use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};
use ratatui::Frame;

use super::grid::draw_step_grid;
use super::mode::TuiState;
use crate::analysis::RecommendationKind;
use crate::shared::DisplayState;

const HELP: &str =
    "enter toggle  space play  +/- tempo  f r d x fx  [ ] knob  tab select  1-3 apply  a hints  g random  c clear  s/o save/load  w render  n sample  q quit";

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // transport
            Constraint::Length(11), // grid
            Constraint::Min(6),     // effects + recommendations
            Constraint::Length(2),  // status + help
        ])
        .split(area);

    draw_transport(frame, sections[0], state);
    draw_step_grid(frame, sections[1], state, ts);

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(sections[2]);
    draw_effects(frame, panels[0], state);
    draw_recommendations(frame, panels[1], state);

    draw_footer(frame, sections[3], state);
}

fn draw_transport(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let (label, color) = if state.playing { ("▶ playing", Color::Green) } else { ("■ stopped", Color::DarkGray) };
    let step = state.playing_step.map_or(String::from("--"), |s| format!("{:02}", s + 1));
    let line = Line::from(vec![
        Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::raw(format!("   {:.0} bpm   step {step}/16", state.tempo)),
    ]);
    frame.render_widget(Paragraph::new(line).block(Block::bordered().title(" zoundboard ")), area);
}

fn draw_effects(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let lines: Vec<Line> = state
        .effects
        .iter()
        .map(|(kind, enabled, summary)| {
            let marker = if *kind == state.selected_effect { "›" } else { " " };
            let style = if *enabled { Style::default().fg(Color::Green) } else { Style::default().fg(Color::DarkGray) };
            Line::from(vec![
                Span::raw(format!("{marker} ")),
                Span::styled(format!("{:<11}", kind.label()), style),
                Span::raw(if *enabled { "on   " } else { "off  " }),
                Span::styled(summary.clone(), Style::default().fg(Color::Gray)),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(Block::bordered().title(" effects ")), area);
}

fn draw_recommendations(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let lines: Vec<Line> = if !state.recommendations_enabled {
        vec![Line::styled("suggestions are off, a turns them on", Style::default().fg(Color::DarkGray))]
    } else if state.recommendations.is_empty() {
        vec![Line::styled("nothing to suggest", Style::default().fg(Color::DarkGray))]
    } else {
        state
            .recommendations
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                let tag = match rec.kind {
                    RecommendationKind::FillEmptyTrack => "fill",
                    RecommendationKind::ImproveTrack => "tweak",
                    RecommendationKind::GenreHint => "genre",
                };
                Line::from(vec![
                    Span::styled(format!("{} ", i + 1), Style::default().fg(Color::Yellow)),
                    Span::styled(format!("{tag:<6}"), Style::default().fg(Color::Cyan)),
                    Span::raw(format!("{} ", rec.rationale)),
                    Span::styled(format!("{:.0}%", rec.relevance * 100.0), Style::default().fg(Color::DarkGray)),
                ])
            })
            .collect()
    };
    let title = if state.recommendations_enabled { " suggestions: on " } else { " suggestions: off " };
    frame.render_widget(Paragraph::new(lines).block(Block::bordered().title(title)), area);
}

fn draw_footer(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let lines = vec![
        Line::from(state.status.as_str()),
        Line::styled(HELP, Style::default().fg(Color::DarkGray)),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}
