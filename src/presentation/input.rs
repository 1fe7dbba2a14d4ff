use crate::application::{App, AppMode, FormRow};
use crate::domain::AdmissionService;
use crate::infrastructure::KeyValueStore;
use crossterm::event::{KeyCode, KeyModifiers};

pub struct InputHandler;

impl InputHandler {
    pub fn handle_key_event<S, K>(app: &mut App<S, K>, key: KeyCode, modifiers: KeyModifiers)
    where
        S: AdmissionService + 'static,
        K: KeyValueStore,
    {
        match app.mode {
            AppMode::Normal => Self::handle_normal_mode(app, key, modifiers),
            AppMode::Editing => Self::handle_editing_mode(app, key),
            AppMode::Help => Self::handle_help_mode(app, key),
        }
    }

    fn handle_normal_mode<S, K>(app: &mut App<S, K>, key: KeyCode, modifiers: KeyModifiers)
    where
        S: AdmissionService + 'static,
        K: KeyValueStore,
    {
        if modifiers.contains(KeyModifiers::CONTROL) {
            match key {
                KeyCode::Char('s') => app.save_now(),
                KeyCode::Char('r') => app.retry_sync(),
                KeyCode::Char('u') => app.retry_documents(),
                _ => {}
            }
            return;
        }

        app.status_message = None;

        match key {
            KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => app.select_next(),
            KeyCode::Tab => app.next_step(),
            KeyCode::BackTab => app.previous_step(),
            KeyCode::Enter | KeyCode::F(2) => app.start_editing(),
            KeyCode::Char(' ') => {
                if let Some(FormRow::Field(field)) = app.selected_row() {
                    if field.is_flag() {
                        app.start_editing();
                    }
                }
            }
            KeyCode::F(10) => app.submit(),
            KeyCode::F(1) | KeyCode::Char('?') => app.open_help(),
            KeyCode::Char('q') => {
                // Will be handled by main loop
            }
            _ => {}
        }
    }

    fn handle_editing_mode<S, K>(app: &mut App<S, K>, key: KeyCode)
    where
        S: AdmissionService + 'static,
        K: KeyValueStore,
    {
        match key {
            KeyCode::Enter => app.finish_editing(),
            KeyCode::Esc => app.cancel_editing(),
            KeyCode::Backspace => app.delete_before_cursor(),
            KeyCode::Delete => app.delete_at_cursor(),
            KeyCode::Left => app.move_cursor_left(),
            KeyCode::Right => app.move_cursor_right(),
            KeyCode::Home => app.move_cursor_home(),
            KeyCode::End => app.move_cursor_end(),
            KeyCode::Char(c) => app.insert_char(c),
            _ => {}
        }
    }

    fn handle_help_mode<S, K>(app: &mut App<S, K>, key: KeyCode)
    where
        S: AdmissionService + 'static,
        K: KeyValueStore,
    {
        match key {
            KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?') | KeyCode::Char('q') => {
                app.close_help();
            }
            KeyCode::Up | KeyCode::Char('k') => {
                app.help_scroll = app.help_scroll.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.help_scroll += 1;
            }
            KeyCode::PageUp => {
                app.help_scroll = app.help_scroll.saturating_sub(5);
            }
            KeyCode::PageDown => {
                app.help_scroll += 5;
            }
            KeyCode::Home => {
                app.help_scroll = 0;
            }
            _ => {}
        }
    }
}
