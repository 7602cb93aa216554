use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use super::mode::TuiState;
use crate::pipeline::effects::EffectKind;
use crate::shared::InputEvent;

const KNOB_STEP: f32 = 0.05;

// poll for input from the terminal, cursor movement stays in TuiState,
// everything else resolves to InputEvents for the middle layer
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code, ts));
    }
    Ok(vec![])
}

pub fn handle_key(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    match code {
        KeyCode::Esc | KeyCode::Char('q') => vec![InputEvent::Quit],

        // cursor
        KeyCode::Up | KeyCode::Char('k') => { ts.move_cursor(-1, 0); vec![] }
        KeyCode::Down | KeyCode::Char('j') => { ts.move_cursor(1, 0); vec![] }
        KeyCode::Left | KeyCode::Char('h') => { ts.move_cursor(0, -1); vec![] }
        KeyCode::Right | KeyCode::Char('l') => { ts.move_cursor(0, 1); vec![] }
        KeyCode::Enter => vec![InputEvent::ToggleCell(ts.cursor_row, ts.cursor_col)],

        // transport
        KeyCode::Char(' ') => vec![InputEvent::PlayPress],
        KeyCode::Char('+' | '=') => vec![InputEvent::TempoUp],
        KeyCode::Char('-') => vec![InputEvent::TempoDown],

        // effects
        KeyCode::Char('f') => vec![InputEvent::ToggleEffect(EffectKind::Filter)],
        KeyCode::Char('r') => vec![InputEvent::ToggleEffect(EffectKind::Reverb)],
        KeyCode::Char('d') => vec![InputEvent::ToggleEffect(EffectKind::Delay)],
        KeyCode::Char('x') => vec![InputEvent::ToggleEffect(EffectKind::Distortion)],
        KeyCode::Char('[') => vec![InputEvent::KnobTurn(-KNOB_STEP)],
        KeyCode::Char(']') => vec![InputEvent::KnobTurn(KNOB_STEP)],
        KeyCode::Tab => vec![InputEvent::NextEffect],
        KeyCode::Char('0') => vec![InputEvent::ResetEffects],

        // pattern
        KeyCode::Char(c @ '1'..='3') => vec![InputEvent::ApplyRecommendation(c as usize - '1' as usize)],
        KeyCode::Char('a') => vec![InputEvent::ToggleRecommendations],
        KeyCode::Char('g') => vec![InputEvent::Randomize],
        KeyCode::Char('c') => vec![InputEvent::Clear],
        KeyCode::Char('s') => vec![InputEvent::ExportPattern],
        KeyCode::Char('o') => vec![InputEvent::ImportPattern],
        KeyCode::Char('w') => vec![InputEvent::ExportAudio],
        KeyCode::Char('n') => vec![InputEvent::NextSample(ts.cursor_row)],

        _ => vec![],
    }
}
