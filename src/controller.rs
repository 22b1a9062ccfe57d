use std::time::Duration;
use tracing::trace;

use crate::domain::{DashConfig, DashError, Message};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &DashConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, DashError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        let message = match event::read()? {
            // crossterm also reports key release and repeat events on Windows
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Some(Message::RawKey(key))
                } else {
                    self.handle_key(key)
                }
            }
            Event::Resize(width, height) => Some(Message::Resize(width as usize, height as usize)),
            _ => None,
        };
        Ok(message)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Char(c @ '1'..='9'), _) => c
                .to_digit(10)
                .map(|d| Message::Navigate(d as usize - 1)),
            (KeyCode::Tab, _) => Some(Message::NextPanel),
            (KeyCode::BackTab, _) => Some(Message::PrevPanel),
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left, _) | (KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right, _) | (KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::Enter, _) | (KeyCode::Char('s'), _) => Some(Message::Sort),
            (KeyCode::Char(' '), _) => Some(Message::ToggleRow),
            (KeyCode::Char('a'), _) => Some(Message::ToggleAll),
            (KeyCode::PageDown, _) | (KeyCode::Char('n'), _) => Some(Message::NextPage),
            (KeyCode::PageUp, _) | (KeyCode::Char('p'), _) => Some(Message::PrevPage),
            (KeyCode::Char('r'), _) => Some(Message::CycleRowsPerPage),
            (KeyCode::Char('/'), _) => Some(Message::Filter),
            (KeyCode::Char('y'), _) => Some(Message::CopySelection),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn map(code: KeyCode) -> Option<Message> {
        let c = Controller::new(&DashConfig::default());
        c.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn maps_table_keys() {
        assert_eq!(map(KeyCode::Char('q')), Some(Message::Quit));
        assert_eq!(map(KeyCode::Char('s')), Some(Message::Sort));
        assert_eq!(map(KeyCode::Enter), Some(Message::Sort));
        assert_eq!(map(KeyCode::Char(' ')), Some(Message::ToggleRow));
        assert_eq!(map(KeyCode::PageDown), Some(Message::NextPage));
        assert_eq!(map(KeyCode::Char('p')), Some(Message::PrevPage));
        assert_eq!(map(KeyCode::Char('/')), Some(Message::Filter));
        assert_eq!(map(KeyCode::BackTab), Some(Message::PrevPanel));
        assert_eq!(map(KeyCode::Char('x')), None);
    }

    #[test]
    fn digits_navigate() {
        assert_eq!(map(KeyCode::Char('1')), Some(Message::Navigate(0)));
        assert_eq!(map(KeyCode::Char('3')), Some(Message::Navigate(2)));
    }

    #[test]
    fn ctrl_c_quits() {
        let c = Controller::new(&DashConfig::default());
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(c.handle_key(key), Some(Message::Quit));
    }
}
