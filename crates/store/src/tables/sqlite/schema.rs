//! SQL statements for the session table.
//!
//! The table name and the extra columns are chosen at runtime, so statements
//! are built here from a `TableSchema`. Pure data, no I/O.

/// Shape of a session table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    extra_columns: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra_columns: Vec::new(),
        }
    }

    pub fn with_extra_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.extra_columns.iter().any(|c| c == column)
    }

    /// `CREATE TABLE` plus an index on `expires` for the sweeper.
    ///
    /// Extra columns are declared without a type so values keep the storage
    /// class they were written with.
    pub fn create_table(&self) -> String {
        let table = quote_ident(&self.name);
        let index = quote_ident(&format!("idx_{}_expires", self.name));
        let extra: String = self
            .extra_columns
            .iter()
            .map(|c| format!(",\n    {}", quote_ident(c)))
            .collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n    \
             sid TEXT PRIMARY KEY,\n    \
             data TEXT,\n    \
             expires TEXT NOT NULL{extra}\n\
             );\n\
             CREATE INDEX IF NOT EXISTS {index} ON {table}(expires);\n"
        )
    }

    /// Select one row by sid. Columns: sid, data, expires, then extra columns in order.
    pub fn select_by_sid(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE sid = ?1",
            self.column_list(),
            quote_ident(&self.name)
        )
    }

    /// Insert a full row. Parameters follow `select_by_sid` column order.
    pub fn insert(&self) -> String {
        let placeholders: Vec<String> = (1..=3 + self.extra_columns.len())
            .map(|i| format!("?{i}"))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.name),
            self.column_list(),
            placeholders.join(", ")
        )
    }

    /// Update `expires` (`?2`), optionally `data` and the given extra columns,
    /// for the row `sid = ?1`. Parameters follow that order.
    pub fn update(&self, set_data: bool, extra_columns: &[&str]) -> String {
        let mut assignments = vec!["expires = ?2".to_string()];
        let mut next = 3;
        if set_data {
            assignments.push(format!("data = ?{next}"));
            next += 1;
        }
        for column in extra_columns {
            assignments.push(format!("{} = ?{next}", quote_ident(column)));
            next += 1;
        }

        format!(
            "UPDATE {} SET {} WHERE sid = ?1",
            quote_ident(&self.name),
            assignments.join(", ")
        )
    }

    pub fn delete_by_sid(&self) -> String {
        format!("DELETE FROM {} WHERE sid = ?1", quote_ident(&self.name))
    }

    pub fn count(&self) -> String {
        format!("SELECT COUNT(*) FROM {}", quote_ident(&self.name))
    }

    pub fn delete_expired(&self) -> String {
        format!("DELETE FROM {} WHERE expires < ?1", quote_ident(&self.name))
    }

    fn column_list(&self) -> String {
        let mut columns = vec!["sid".to_string(), "data".to_string(), "expires".to_string()];
        columns.extend(self.extra_columns.iter().map(|c| quote_ident(c)));
        columns.join(", ")
    }
}

/// Quote an SQL identifier, doubling embedded quotes.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
