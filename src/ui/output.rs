//! Status lines for the counter and session commands.
//!
//! Every line is built by a `*_line` function against a [`Palette`] so the
//! wording can be checked without a terminal; the public functions print it
//! with colors when stdout is a TTY.

use owo_colors::{OwoColorize, Style};
use std::path::Path;
use std::sync::OnceLock;
use crate::tables::Session;
use crate::ui::{session_table, Icons};

static PALETTE: OnceLock<Palette> = OnceLock::new();

#[derive(Debug, Clone)]
struct Palette {
    heading: Style,
    id: Style,
    ok: Style,
    failure: Style,
    muted: Style,
}

impl Palette {
    fn detect() -> Self {
        if console::Term::stdout().is_term() {
            Self {
                heading: Style::new().cyan().bold(),
                id: Style::new().magenta().bold(),
                ok: Style::new().green().bold(),
                failure: Style::new().red().bold(),
                muted: Style::new().white().dimmed(),
            }
        } else {
            Self::plain()
        }
    }

    fn plain() -> Self {
        Self {
            heading: Style::new(),
            id: Style::new(),
            ok: Style::new(),
            failure: Style::new(),
            muted: Style::new(),
        }
    }
}

fn palette() -> &'static Palette {
    PALETTE.get_or_init(Palette::detect)
}

fn counter_line(p: &Palette, table: &str, value: i64) -> String {
    format!(
        "{} {} {}",
        Icons::COUNTER,
        format!("{}:", table).style(p.heading),
        format!("next id {}", value).style(p.id)
    )
}

fn added_line(p: &Palette, session: &Session) -> String {
    format!(
        "{} {} {} {}",
        Icons::CHECK,
        "Added session".style(p.ok),
        session.id.style(p.id),
        format!("({})", session.label).style(p.muted)
    )
}

fn detail_lines(p: &Palette, session: &Session) -> String {
    format!(
        "{} {} {}\n{} {} {}",
        Icons::INFO,
        "Id:".style(p.muted),
        session.id.style(p.id),
        Icons::INFO,
        "Label:".style(p.muted),
        session.label
    )
}

fn missing_line(p: &Palette, id: i64) -> String {
    format!("{} {}", Icons::WARN, format!("No session with id {}", id).style(p.failure))
}

fn listing_heading(p: &Palette, count: usize, db_path: &Path) -> String {
    format!(
        "{} {} {}",
        Icons::DATABASE,
        format!("{} session(s)", count).style(p.heading),
        format!("in {}", db_path.display()).style(p.muted)
    )
}

fn removed_line(p: &Palette, removed: usize, requested: usize) -> String {
    let text = format!("Removed {} of {} session(s)", removed, requested);
    if removed == requested {
        format!("{} {}", Icons::CHECK, text.style(p.ok))
    } else {
        // ids that did not exist count as requested but not removed
        format!("{} {}", Icons::WARN, text.style(p.failure))
    }
}

fn config_lines(p: &Palette, config_path: &Path, db_path: &Path) -> String {
    format!(
        "{} {} {}\n{} {} {}",
        Icons::CHECK,
        "Wrote".style(p.ok),
        config_path.display(),
        Icons::DATABASE,
        "Database:".style(p.muted),
        db_path.display()
    )
}

fn failure_line(p: &Palette, text: &str) -> String {
    format!("{} {}", Icons::CROSS, text.style(p.failure))
}

pub fn counter_value(table: &str, value: i64) {
    println!("{}", counter_line(palette(), table, value));
}

pub fn session_added(session: &Session) {
    println!("{}", added_line(palette(), session));
}

pub fn session_detail(session: &Session) {
    println!("{}", detail_lines(palette(), session));
}

pub fn session_missing(id: i64) {
    eprintln!("{}", missing_line(palette(), id));
}

pub fn no_sessions() {
    eprintln!("{} {}", Icons::WARN, "No sessions found.".style(palette().muted));
}

/// Heading plus table; [`no_sessions`] when the slice is empty
pub fn session_listing(sessions: &[Session], db_path: &Path) {
    if sessions.is_empty() {
        return no_sessions();
    }
    println!("{}", listing_heading(palette(), sessions.len(), db_path));
    println!("{}", session_table(sessions));
}

pub fn sessions_removed(removed: usize, requested: usize) {
    println!("{}", removed_line(palette(), removed, requested));
}

pub fn config_written(config_path: &Path, db_path: &Path) {
    println!("{}", config_lines(palette(), config_path, db_path));
}

pub fn failure(text: &str) {
    eprintln!("{}", failure_line(palette(), text));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_lines() {
        let p = Palette::plain();

        assert_eq!(counter_line(&p, "session_counter", 3), format!("{} session_counter: next id 3", Icons::COUNTER));
        assert_eq!(
            added_line(&p, &Session::new(4, "warmup")),
            format!("{} Added session 4 (warmup)", Icons::CHECK)
        );
        assert!(detail_lines(&p, &Session::new(4, "warmup")).ends_with("Label: warmup"));
        assert!(missing_line(&p, 9).contains("No session with id 9"));
        assert!(listing_heading(&p, 2, Path::new("a.db")).contains("2 session(s) in a.db"));
    }

    #[test]
    fn test_partial_removal_warns() {
        let p = Palette::plain();

        assert!(removed_line(&p, 2, 2).starts_with(Icons::CHECK));
        assert!(removed_line(&p, 1, 2).starts_with(Icons::WARN));
        assert!(removed_line(&p, 1, 2).contains("Removed 1 of 2"));
    }
}
