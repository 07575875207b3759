//! Table definitions - renders `CREATE TABLE IF NOT EXISTS` statements
//!
//! A [`SchemaBuilder`] accumulates columns, foreign keys and checks, then is
//! consumed once by [`SchemaBuilder::build`]. Foreign-key targets are not
//! validated here; the engine enforces them when the DDL runs.

use crate::value::SqlValue;
use crate::{Error, Result};

/// Column storage type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Text,
    Real,
    Blob,
    Numeric,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Text => "TEXT",
            ColumnType::Real => "REAL",
            ColumnType::Blob => "BLOB",
            ColumnType::Numeric => "NUMERIC",
        }
    }
}

/// Column constraint. Modifiers compose; order of declaration is irrelevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnModifier {
    // Declaration order is render order: SQLite only accepts AUTOINCREMENT
    // directly after PRIMARY KEY.
    PrimaryKey,
    AutoIncrement,
    NotNull,
    Unique,
}

impl ColumnModifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnModifier::PrimaryKey => "PRIMARY KEY",
            ColumnModifier::AutoIncrement => "AUTOINCREMENT",
            ColumnModifier::NotNull => "NOT NULL",
            ColumnModifier::Unique => "UNIQUE",
        }
    }
}

/// Action taken on the referencing rows when the parent row changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
    NoAction,
}

impl ReferentialAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

/// A simple or composite foreign-key declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    columns: Vec<String>,
    parent_table: String,
    references: Vec<String>,
    on_delete: Option<ReferentialAction>,
    on_update: Option<ReferentialAction>,
}

impl ForeignKey {
    /// `columns` in this table reference `references` in `parent_table`, pairwise
    pub fn new(columns: &[&str], parent_table: &str, references: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            parent_table: parent_table.to_string(),
            references: references.iter().map(|c| c.to_string()).collect(),
            on_delete: None,
            on_update: None,
        }
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    ty: ColumnType,
    modifiers: Vec<ColumnModifier>,
    default: Option<SqlValue>,
}

/// Accumulates a table definition and renders one CREATE statement.
///
/// ```
/// use repokit::{ColumnModifier, ColumnType, SchemaBuilder};
///
/// let ddl = SchemaBuilder::new("session")
///     .add_column("id", ColumnType::Integer, &[ColumnModifier::PrimaryKey])
///     .add_column("label", ColumnType::Text, &[ColumnModifier::NotNull])
///     .build()?;
/// assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"session\""));
/// # Ok::<(), repokit::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    table: String,
    columns: Vec<Column>,
    foreign_keys: Vec<ForeignKey>,
    checks: Vec<String>,
}

impl SchemaBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Append a column
    pub fn add_column(self, name: &str, ty: ColumnType, modifiers: &[ColumnModifier]) -> Self {
        self.push_column(name, ty, modifiers, None)
    }

    /// Append a column with a DEFAULT value
    pub fn add_column_with_default(
        self,
        name: &str,
        ty: ColumnType,
        default: impl Into<SqlValue>,
        modifiers: &[ColumnModifier],
    ) -> Self {
        self.push_column(name, ty, modifiers, Some(default.into()))
    }

    /// Append a single-column foreign key
    pub fn add_foreign_key(self, column: &str, parent_table: &str, reference: &str) -> Self {
        self.add_foreign_key_constraint(ForeignKey::new(&[column], parent_table, &[reference]))
    }

    /// Append a multi-column foreign key; `columns` and `references` pair up by position
    pub fn add_composite_foreign_key(self, columns: &[&str], parent_table: &str, references: &[&str]) -> Self {
        self.add_foreign_key_constraint(ForeignKey::new(columns, parent_table, references))
    }

    /// Append a foreign key carrying ON DELETE / ON UPDATE actions
    pub fn add_foreign_key_constraint(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Append a CHECK constraint; `predicate` is emitted verbatim
    pub fn add_check(mut self, predicate: &str) -> Self {
        self.checks.push(predicate.to_string());
        self
    }

    /// Names of the columns declared PRIMARY KEY, in declaration order
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.modifiers.contains(&ColumnModifier::PrimaryKey))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Render the statement: columns, composite primary key, foreign keys, checks.
    ///
    /// AUTOINCREMENT is only valid on a lone INTEGER PRIMARY KEY column.
    pub fn build(self) -> Result<String> {
        let primary_keys = self.primary_key_columns();
        let composite = primary_keys.len() > 1;

        for column in &self.columns {
            let single_integer_key = !composite
                && column.ty == ColumnType::Integer
                && column.modifiers.contains(&ColumnModifier::PrimaryKey);
            if column.modifiers.contains(&ColumnModifier::AutoIncrement) && !single_integer_key {
                return Err(Error::query(format!(
                    "column `{}` of {}: AUTOINCREMENT requires a single-column INTEGER PRIMARY KEY",
                    column.name, self.table
                )));
            }
        }

        let mut clauses: Vec<String> = self
            .columns
            .iter()
            .map(|column| render_column(column, composite))
            .collect();

        if composite {
            clauses.push(format!("PRIMARY KEY ({})", quote_list(&primary_keys)));
        }

        for fk in &self.foreign_keys {
            clauses.push(self.render_foreign_key(fk));
        }

        for (i, check) in self.checks.iter().enumerate() {
            clauses.push(format!("CONSTRAINT \"chk_{}\" CHECK ({})", i + 1, check));
        }

        let body: Vec<String> = clauses.into_iter().map(|c| format!("    {}", c)).collect();
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            quote_ident(&self.table),
            body.join(",\n")
        ))
    }

    fn push_column(mut self, name: &str, ty: ColumnType, modifiers: &[ColumnModifier], default: Option<SqlValue>) -> Self {
        let mut modifiers = modifiers.to_vec();
        modifiers.sort();
        modifiers.dedup();
        self.columns.push(Column {
            name: name.to_string(),
            ty,
            modifiers,
            default,
        });
        self
    }

    fn render_foreign_key(&self, fk: &ForeignKey) -> String {
        // Constraint name: parent table plus the 1-based positions of the local columns
        let mut name = format!("fk_{}", fk.parent_table);
        for column in &fk.columns {
            let position = self
                .columns
                .iter()
                .position(|c| &c.name == column)
                .map(|p| p + 1)
                .unwrap_or(0);
            name.push_str(&format!("_{}", position));
        }

        let mut clause = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_ident(&name),
            quote_list(&fk.columns),
            quote_ident(&fk.parent_table),
            quote_list(&fk.references)
        );
        if let Some(action) = fk.on_delete {
            clause.push_str(&format!(" ON DELETE {}", action.as_str()));
        }
        if let Some(action) = fk.on_update {
            clause.push_str(&format!(" ON UPDATE {}", action.as_str()));
        }
        clause
    }
}

fn render_column(column: &Column, composite_key: bool) -> String {
    let mut rendered = format!("{} {}", quote_ident(&column.name), column.ty.as_str());
    for modifier in &column.modifiers {
        if composite_key && *modifier == ColumnModifier::PrimaryKey {
            continue;
        }
        rendered.push(' ');
        rendered.push_str(modifier.as_str());
    }
    if let Some(default) = &column.default {
        rendered.push_str(&format!(" DEFAULT {}", default.to_literal()));
    }
    rendered
}

/// Quote an identifier for SQLite (`"name"`, inner quotes doubled)
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}
