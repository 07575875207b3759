//! Terminal output for the CLI

pub mod icons;
pub mod output;
pub mod table;

pub use icons::Icons;
pub use output::{
    config_written, counter_value, failure, no_sessions, session_added, session_detail, session_listing,
    session_missing, sessions_removed,
};
pub use table::session_table;
