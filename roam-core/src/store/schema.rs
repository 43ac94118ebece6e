use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use super::{StoreError, StoreResult};

pub const DESTINATIONS_TABLE: &str = "destinations";
pub const PLANS_TABLE: &str = "plans";
pub const RATES_TABLE: &str = "rates";

/// Columns the typed records read, per table, with the declared type each must carry.
/// The first column listed for each table must be that table's primary key.
const REQUIRED_COLUMNS: &[(&str, &[(&str, ColumnType)])] = &[
    (
        DESTINATIONS_TABLE,
        &[("country", ColumnType::Text), ("zone", ColumnType::Integer)],
    ),
    (
        PLANS_TABLE,
        &[
            ("plan_id", ColumnType::Integer),
            ("zone", ColumnType::Integer),
            ("duration_days", ColumnType::Integer),
            ("data_gb", ColumnType::Real),
            ("price_sgd", ColumnType::Real),
        ],
    ),
    (
        RATES_TABLE,
        &[
            ("zone", ColumnType::Integer),
            ("rate_data_per_10kb", ColumnType::Real),
            ("rate_calls_outgoing_per_min", ColumnType::Real),
            ("rate_calls_incoming_per_min", ColumnType::Real),
            ("rate_per_sms", ColumnType::Real),
        ],
    ),
];

/// Smallest value a source row may carry, per numeric column.
const VALUE_FLOORS: &[(&str, &str, f64)] = &[
    (PLANS_TABLE, "duration_days", 1.0),
    (PLANS_TABLE, "data_gb", 0.0),
    (PLANS_TABLE, "price_sgd", 0.0),
    (RATES_TABLE, "rate_data_per_10kb", 0.0),
    (RATES_TABLE, "rate_calls_outgoing_per_min", 0.0),
    (RATES_TABLE, "rate_calls_incoming_per_min", 0.0),
    (RATES_TABLE, "rate_per_sms", 0.0),
];

pub(crate) fn value_floor(table: &str, column: &str) -> Option<f64> {
    VALUE_FLOORS
        .iter()
        .find(|(t, c, _)| *t == table && *c == column)
        .map(|(_, _, floor)| *floor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    pub(crate) fn expected(&self) -> &'static str {
        match self {
            ColumnType::Integer => "an integer",
            ColumnType::Real => "a number",
            ColumnType::Text => "text",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnSchema {
    pub column_name: String,
    pub data_type: ColumnType,
    #[serde(default, deserialize_with = "flag")]
    pub nullable: bool,
    #[serde(default, deserialize_with = "flag")]
    pub primary_key: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            column_name: name.into(),
            data_type,
            nullable: false,
            primary_key: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// An integer primary key aliases the SQLite rowid and is assigned when left NULL.
    pub fn is_rowid(&self) -> bool {
        self.primary_key && self.data_type == ColumnType::Integer
    }

    /// Whether a source row may leave this column empty.
    pub fn accepts_null(&self) -> bool {
        self.nullable || self.is_rowid()
    }

    pub fn definition(&self) -> String {
        let mut parts = vec![self.column_name.clone(), self.data_type.as_sql().to_string()];
        if self.primary_key {
            parts.push("PRIMARY KEY".to_string());
            if self.data_type == ColumnType::Text {
                parts.push("COLLATE NOCASE".to_string());
            }
        }
        if !self.accepts_null() {
            parts.push("NOT NULL".to_string());
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub filepath: PathBuf,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(
        table_name: impl Into<String>,
        filepath: impl AsRef<Path>,
        columns: Vec<ColumnSchema>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            filepath: filepath.as_ref().to_path_buf(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|column| column.column_name == name)
    }

    pub fn primary_key(&self) -> Option<&ColumnSchema> {
        self.columns.iter().find(|column| column.primary_key)
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {};", self.table_name)
    }

    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(ColumnSchema::definition)
            .collect::<Vec<_>>()
            .join(",\n    ");
        format!("CREATE TABLE {} (\n    {}\n);", self.table_name, columns)
    }

    pub fn insert_sql(&self) -> String {
        let names = self
            .columns
            .iter()
            .map(|column| column.column_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=self.columns.len())
            .map(|idx| format!("?{idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table_name, names, placeholders
        )
    }

    fn validate(&self) -> StoreResult<()> {
        if !is_identifier(&self.table_name) {
            return Err(StoreError::InvalidSchema(format!(
                "table name '{}' is not a valid identifier",
                self.table_name
            )));
        }
        if self.columns.is_empty() {
            return Err(StoreError::InvalidSchema(format!(
                "table {} declares no columns",
                self.table_name
            )));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !is_identifier(&column.column_name) {
                return Err(StoreError::InvalidSchema(format!(
                    "column name '{}' in table {} is not a valid identifier",
                    column.column_name, self.table_name
                )));
            }
            if !seen.insert(column.column_name.to_ascii_lowercase()) {
                return Err(StoreError::InvalidSchema(format!(
                    "column {} declared twice in table {}",
                    column.column_name, self.table_name
                )));
            }
        }
        if self.columns.iter().filter(|column| column.primary_key).count() > 1 {
            return Err(StoreError::InvalidSchema(format!(
                "table {} declares more than one primary key",
                self.table_name
            )));
        }
        Ok(())
    }
}

/// Declarative description of every table the store materialises.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    tables: Vec<TableSchema>,
    base_dir: PathBuf,
}

impl Schema {
    /// Relative source paths resolve against `base_dir`.
    pub fn new(tables: Vec<TableSchema>, base_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let schema = Self {
            tables,
            base_dir: base_dir.as_ref().to_path_buf(),
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Reads a JSON schema; relative source paths resolve against the schema file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tables: Vec<TableSchema> =
            serde_json::from_str(&content).map_err(|source| StoreError::SchemaParse {
                path: path.to_path_buf(),
                source,
            })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(tables, base_dir)
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|table| table.table_name == name)
    }

    pub fn source_path(&self, table: &TableSchema) -> PathBuf {
        if table.filepath.is_absolute() {
            table.filepath.clone()
        } else {
            self.base_dir.join(&table.filepath)
        }
    }

    fn validate(&self) -> StoreResult<()> {
        let mut names = HashSet::new();
        for table in &self.tables {
            table.validate()?;
            if !names.insert(table.table_name.to_ascii_lowercase()) {
                return Err(StoreError::InvalidSchema(format!(
                    "table {} declared twice",
                    table.table_name
                )));
            }
        }

        for (table_name, required) in REQUIRED_COLUMNS {
            let table = self.table(table_name).ok_or_else(|| {
                StoreError::InvalidSchema(format!("missing table {table_name}"))
            })?;
            for (column_name, data_type) in required.iter() {
                let column = table.column(column_name).ok_or_else(|| {
                    StoreError::InvalidSchema(format!(
                        "table {table_name} is missing column {column_name}"
                    ))
                })?;
                if column.data_type != *data_type {
                    return Err(StoreError::InvalidSchema(format!(
                        "column {table_name}.{column_name} must be {data_type}, declared {}",
                        column.data_type
                    )));
                }
                if column.nullable {
                    return Err(StoreError::InvalidSchema(format!(
                        "column {table_name}.{column_name} must not be nullable"
                    )));
                }
            }
            if let Some((key, _)) = required.first() {
                let declared = table.primary_key().map(|column| column.column_name.as_str());
                if declared != Some(*key) {
                    return Err(StoreError::InvalidSchema(format!(
                        "table {table_name} must use {key} as its primary key"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Accepts both `true`/`false` and the `0`/`1` integer flags used by older schema files.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Int(value) => Ok(value != 0),
    }
}
