use crate::application::{App, AppMode, FormRow};
use crate::domain::{AdmissionService, FieldValue, Step};
use crate::infrastructure::KeyValueStore;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

pub fn render_ui<S: AdmissionService + 'static, K: KeyValueStore>(f: &mut Frame, app: &App<S, K>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(6),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    render_form(f, app, chunks[1]);
    render_notices(f, app, chunks[2]);
    render_status_bar(f, app, chunks[3]);

    if matches!(app.mode, AppMode::Help) {
        render_help_popup(f, app.help_scroll);
    }
}

fn render_header<S: AdmissionService + 'static, K: KeyValueStore>(f: &mut Frame, app: &App<S, K>, area: Rect) {
    let step = app.session.step();
    let header = Paragraph::new(format!(
        "admitsync - Admission Form | {} | Step {}/{}: {} | {}",
        app.session.user_id(),
        step,
        Step::LAST,
        step.title(),
        app.sync_label()
    ))
    .style(Style::default().fg(Color::Cyan));
    f.render_widget(header, area);
}

fn render_form<S: AdmissionService + 'static, K: KeyValueStore>(f: &mut Frame, app: &App<S, K>, area: Rect) {
    let form = app.session.form();
    let visible_rows = area.height.saturating_sub(2) as usize;
    let rows_all = app.rows();
    let first = app.selected.saturating_sub(visible_rows.saturating_sub(1));

    let mut rows = Vec::new();
    for (index, row) in rows_all.iter().enumerate().skip(first).take(visible_rows) {
        let (name, value) = match *row {
            FormRow::Field(field) => {
                let value = match form.get(field) {
                    Some(FieldValue::Flag(on)) => (if *on { "[x]" } else { "[ ]" }).to_string(),
                    Some(FieldValue::Text(text)) => text.clone(),
                    None if field.is_flag() => "[ ]".to_string(),
                    None => String::new(),
                };
                (field_label(field.key()), value)
            }
            FormRow::Document(slot) => {
                let value = form
                    .document(slot)
                    .map(|doc| doc.file_name.clone())
                    .unwrap_or_else(|| "(not attached)".to_string());
                (format!("Document: {}", field_label(slot.key())), value)
            }
        };

        let selected = index == app.selected;
        let value = if selected && app.mode == AppMode::Editing {
            format!("{}_", app.input)
        } else {
            value
        };
        let style = if selected {
            Style::default().bg(Color::Blue).fg(Color::White)
        } else {
            Style::default()
        };
        rows.push(
            Row::new(vec![
                Cell::from(name).style(Style::default().fg(Color::Yellow)),
                Cell::from(value),
            ])
            .style(style)
            .height(1),
        );
    }

    let title = if app.session.is_locked() {
        "Application (read only)".to_string()
    } else {
        format!("{} filled", form.filled_fields())
    };
    let table = Table::new(rows, [Constraint::Length(32), Constraint::Min(10)])
        .block(Block::default().borders(Borders::ALL).title(title))
        .column_spacing(1);

    f.render_widget(table, area);
}

fn render_notices<S: AdmissionService + 'static, K: KeyValueStore>(f: &mut Frame, app: &App<S, K>, area: Rect) {
    let lines: Vec<String> = app.notices.iter().map(|notice| format!("• {notice}")).collect();
    let style = if app.notices.iter().any(|notice| notice.is_actionable()) {
        Style::default().fg(Color::Magenta)
    } else {
        Style::default()
    };
    let panel = Paragraph::new(lines.join("\n"))
        .block(Block::default().borders(Borders::ALL).title("Notices"))
        .style(style);
    f.render_widget(panel, area);
}

fn render_status_bar<S: AdmissionService + 'static, K: KeyValueStore>(f: &mut Frame, app: &App<S, K>, area: Rect) {
    let text = match app.mode {
        AppMode::Normal => app.status_message.clone().unwrap_or_else(|| {
            "Enter: edit | Tab/Shift+Tab: step | Ctrl+S: save | Ctrl+R: retry | Ctrl+U: upload | F10: submit | F1/?: help | q: quit"
                .to_string()
        }),
        AppMode::Editing => format!("Editing: {} (Enter to save, Esc to cancel)", app.input),
        AppMode::Help => "↑↓/jk: scroll | PgUp/PgDn: fast scroll | Home: top | Esc/q: close help".to_string(),
    };

    let status = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(match app.mode {
            AppMode::Normal => Style::default(),
            AppMode::Editing => Style::default().fg(Color::Green),
            AppMode::Help => Style::default().fg(Color::Cyan),
        });
    f.render_widget(status, area);
}

fn render_help_popup(f: &mut Frame, scroll: usize) {
    let area = f.area();
    let popup_area = Rect {
        x: area.width / 10,
        y: area.height / 10,
        width: area.width * 4 / 5,
        height: area.height * 4 / 5,
    };

    f.render_widget(Clear, popup_area);

    let help_lines: Vec<&str> = HELP_TEXT.lines().collect();
    let visible_height = popup_area.height.saturating_sub(2) as usize;

    let start_line = scroll.min(help_lines.len().saturating_sub(visible_height));
    let end_line = (start_line + visible_height).min(help_lines.len());

    let help_widget = Paragraph::new(help_lines[start_line..end_line].join("\n"))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("admitsync Help (Line {}/{})", start_line + 1, help_lines.len()))
                .style(Style::default().fg(Color::Cyan)),
        )
        .style(Style::default().fg(Color::White));

    f.render_widget(help_widget, popup_area);
}

/// Turns a camelCase key into a sentence-case label: `presentAddressLine1`
/// becomes `Present address line 1`.
pub fn field_label(key: &str) -> String {
    let mut label = String::with_capacity(key.len() + 4);
    let mut prev_digit = false;
    for (i, c) in key.chars().enumerate() {
        if i == 0 {
            label.extend(c.to_uppercase());
        } else if c.is_ascii_uppercase() {
            label.push(' ');
            label.push(c.to_ascii_lowercase());
        } else if c.is_ascii_digit() && !prev_digit {
            label.push(' ');
            label.push(c);
        } else {
            label.push(c);
        }
        prev_digit = c.is_ascii_digit();
    }
    label
}

const HELP_TEXT: &str = r#"ADMISSION FORM

=== HOW YOUR PROGRESS IS KEPT ===
• Every change is saved to the portal about a second after you stop typing
• If the portal cannot be reached, changes are kept on this device and the
  header shows "Offline, saved on this device"
• When you come back, your progress is restored from the portal, or from
  this device if the portal is unreachable
• Once submitted, the application is read only

=== NAVIGATION ===
↑↓ or j/k       Move between fields
Tab             Next step
Shift+Tab       Previous step
Enter/F2        Edit the selected field (toggles yes/no fields)
Space           Toggle a yes/no field

=== EDITING ===
Enter           Keep the new value
Esc             Discard the change
←→ Home End     Move the cursor
Backspace/Del   Delete characters

Documents are attached on the last step by typing the file path.
Clearing the path removes the attachment.

=== ACTIONS ===
Ctrl+S          Save the draft now
Ctrl+R          Retry saving to the portal after going offline
Ctrl+U          Upload documents that failed during submission again
F10             Submit the application
F1 or ?         Show this help
q               Quit

=== HELP NAVIGATION ===
↑↓ or j/k       Scroll help text up/down one line
Page Up/Down    Scroll help text up/down 5 lines
Home            Jump to top of help text
Esc/F1/?/q      Close this help window"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::application::{ManualClock, SyncConfig, WizardSession};
    use crate::domain::SubmissionRecord;
    use crate::infrastructure::{LocalFallbackStore, LoopbackAdmissionService, MemoryStore};
    use ratatui::{backend::TestBackend, Terminal};

    fn screen<S: AdmissionService + 'static, K: KeyValueStore>(app: &App<S, K>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| render_ui(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_field_label() {
        assert_eq!(field_label("firstName"), "First name");
        assert_eq!(field_label("presentAddressLine1"), "Present address line 1");
        assert_eq!(field_label("email"), "Email");
    }

    #[test]
    fn test_render_shows_step_and_fields() {
        let mut session = WizardSession::new(
            LoopbackAdmissionService::new(),
            MemoryStore::new(),
            Box::new(ManualClock::new()),
            SyncConfig::default(),
        );
        session.start("render-user");
        assert!(session.wait_for_tasks(Duration::from_secs(5)));
        session.set_text(crate::domain::FormField::FirstName, "Asha");
        let app = App::new(session);

        let text = screen(&app);
        assert!(text.contains("Step 1/6: Personal details"));
        assert!(text.contains("First name"));
        assert!(text.contains("Asha"));
    }

    #[test]
    fn test_first_frame_shows_cached_submission() {
        let service = LoopbackAdmissionService::new().with_admission("APP-8");
        let kv = MemoryStore::new();
        LocalFallbackStore::new(kv.clone())
            .save_submission("render-user", &SubmissionRecord::submitted("APP-8"))
            .unwrap();
        let mut session = WizardSession::new(
            service.clone(),
            kv,
            Box::new(ManualClock::new()),
            SyncConfig::default(),
        );

        service.hold();
        session.start("render-user");
        let mut app = App::new(session);
        assert!(screen(&app).contains("Submitted (APP-8), verifying..."));

        service.release();
        assert!(app.session.wait_for_tasks(Duration::from_secs(5)));
        app.tick();
        let text = screen(&app);
        assert!(text.contains("Submitted (APP-8)"));
        assert!(!text.contains("verifying"));
    }
}
