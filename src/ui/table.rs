use tabled::{settings::Style, Table, Tabled};
use crate::tables::Session;

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "Id")]
    id: i64,
    #[tabled(rename = "Label")]
    label: String,
}

/// Render sessions as a table; empty string when there are none
pub fn session_table(sessions: &[Session]) -> String {
    if sessions.is_empty() {
        return String::new();
    }

    let rows: Vec<SessionRow> = sessions
        .iter()
        .map(|s| SessionRow { id: s.id, label: s.label.clone() })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_table() {
        assert!(session_table(&[]).is_empty());

        let rendered = session_table(&[Session::new(1, "warmup"), Session::new(2, "trial")]);
        assert!(rendered.contains("Label"));
        assert!(rendered.contains("warmup"));
        assert!(rendered.contains("trial"));
    }
}
