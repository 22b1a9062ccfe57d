use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

/// Single line editor used for the filter prompt. The cursor counts
/// characters, not bytes.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    cursor: usize,
    finished: bool,
    canceled: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub cursor: usize,
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.finished = true,
            (KeyCode::Esc, _) => {
                self.canceled = true;
                self.finished = true;
            }
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.cursor = self.cursor.saturating_sub(1),
            (KeyCode::Right, _) => self.cursor = (self.cursor + 1).min(self.len()),
            (KeyCode::Home, _) => self.cursor = 0,
            (KeyCode::End, _) => self.cursor = self.len(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => self.clear(),
            (KeyCode::Char(chr), m) if !m.contains(KeyModifiers::CONTROL) => {
                let at = self.byte_pos(self.cursor);
                self.current_input.insert(at, chr);
                self.cursor += 1;
            }
            (kc, km) => trace!("Ignored input key {kc:?} {km:?}"),
        }
        self.get()
    }

    /// Starts editing `s` with the cursor at its end.
    pub fn set(&mut self, s: &str) {
        self.clear();
        self.current_input = s.to_string();
        self.cursor = self.len();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            cursor: self.cursor,
        }
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.current_input.clear();
        self.cursor = 0;
    }

    fn len(&self) -> usize {
        self.current_input.chars().count()
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_pos(self.cursor);
            self.current_input.remove(at);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.len() {
            let at = self.byte_pos(self.cursor);
            self.current_input.remove(at);
        }
    }

    fn byte_pos(&self, char_pos: usize) -> usize {
        self.current_input
            .char_indices()
            .nth(char_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(input: &mut Inputter, s: &str) -> InputResult {
        let mut last = input.get();
        for c in s.chars() {
            last = input.read(key(KeyCode::Char(c)));
        }
        last
    }

    #[test]
    fn edits_multibyte_text_in_the_middle() {
        let mut input = Inputter::default();
        type_str(&mut input, "Мтч");
        input.read(key(KeyCode::Left));
        input.read(key(KeyCode::Left));
        let res = type_str(&mut input, "а");
        assert_eq!(res.input, "Матч");
        assert_eq!(res.cursor, 2);

        let res = input.read(key(KeyCode::Backspace));
        assert_eq!(res.input, "Мтч");
        let res = input.read(key(KeyCode::Delete));
        assert_eq!(res.input, "Мч");
    }

    #[test]
    fn enter_finishes_and_escape_cancels() {
        let mut input = Inputter::default();
        type_str(&mut input, "bo");
        let res = input.read(key(KeyCode::Enter));
        assert!(res.finished && !res.canceled);
        assert_eq!(res.input, "bo");

        input.set("bob");
        assert_eq!(input.get().cursor, 3);
        let res = input.read(key(KeyCode::Esc));
        assert!(res.finished && res.canceled);
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let mut input = Inputter::default();
        let res = input.read(key(KeyCode::Left));
        assert_eq!(res.cursor, 0);
        type_str(&mut input, "ab");
        let res = input.read(key(KeyCode::Right));
        assert_eq!(res.cursor, 2);
        let res = input.read(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert_eq!(res.input, "");
    }
}
