use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params_from_iter, Connection, ErrorCode, OpenFlags, OptionalExtension, Transaction};
use tracing::{debug, error, info, warn};

use crate::config::RoamConfig;
use crate::sqlite::configure_connection;

use super::loader::{read_table, SourceRow};
use super::models::{
    BuildErrorPolicy, BuildReport, Destination, Plan, Rate, StoreState, TableLoad, ZoneSummary,
};
use super::schema::{Schema, TableSchema};
use super::{StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct PlanStoreBuilder {
    path: Option<PathBuf>,
    schema: Option<Schema>,
    schema_path: Option<PathBuf>,
    on_build_error: BuildErrorPolicy,
}

impl Default for PlanStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            schema: None,
            schema_path: None,
            on_build_error: BuildErrorPolicy::Recoverable,
        }
    }
}

impl PlanStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn schema_path(mut self, path: impl AsRef<Path>) -> Self {
        self.schema_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn on_build_error(mut self, policy: BuildErrorPolicy) -> Self {
        self.on_build_error = policy;
        self
    }

    pub fn build(self) -> StoreResult<PlanStore> {
        let path = self.path.ok_or(StoreError::MissingStore)?;
        let schema = match (self.schema, self.schema_path) {
            (Some(schema), _) => schema,
            (None, Some(schema_path)) => Schema::from_file(schema_path)?,
            (None, None) => return Err(StoreError::MissingSchema),
        };
        Ok(PlanStore {
            path,
            schema,
            on_build_error: self.on_build_error,
            conn: None,
            state: StoreState::Ready,
            sealed: false,
            last_error: None,
        })
    }
}

/// SQLite-backed store for destinations, plans and per-zone rates.
///
/// Holds at most one connection, opened on first use. Not safe for concurrent use:
/// give each worker its own store or serialise access behind a lock.
#[derive(Debug)]
pub struct PlanStore {
    path: PathBuf,
    schema: Schema,
    on_build_error: BuildErrorPolicy,
    conn: Option<Connection>,
    state: StoreState,
    sealed: bool,
    last_error: Option<String>,
}

impl PlanStore {
    pub fn builder() -> PlanStoreBuilder {
        PlanStoreBuilder::new()
    }

    pub fn from_config(config: &RoamConfig) -> StoreResult<Self> {
        PlanStoreBuilder::new()
            .path(config.database_path())
            .schema_path(config.schema_path())
            .on_build_error(config.store.on_build_error)
            .build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn open(&self) -> StoreResult<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(&self.path, flags).map_err(|source| {
            StoreError::OpenDatabase {
                path: self.path.clone(),
                source,
            }
        })?;
        configure_connection(&conn).map_err(|source| StoreError::OpenDatabase {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    fn unavailable(&self) -> StoreError {
        StoreError::Unavailable {
            message: self
                .last_error
                .clone()
                .unwrap_or_else(|| format!("plan store is {}", self.state)),
        }
    }

    fn ensure_connection(&mut self) -> StoreResult<()> {
        if self.sealed {
            return Err(self.unavailable());
        }
        if self.conn.is_none() {
            match self.open() {
                Ok(conn) => {
                    debug!(target: "store", path = %self.path.display(), "opened plan store connection");
                    self.conn = Some(conn);
                }
                Err(err) => {
                    self.record_failure(&err, BuildErrorPolicy::Fatal);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Opens the connection. A READY store attaches to an already-built database file
    /// and becomes CONNECTED; an empty file leaves it READY.
    pub fn connect(&mut self) -> StoreResult<()> {
        self.ensure_connection()?;
        if self.state == StoreState::Ready {
            let built = match self.conn.as_ref() {
                Some(conn) => tables_present(conn, &self.schema)?,
                None => false,
            };
            if built {
                info!(target: "store", path = %self.path.display(), "attached to existing plan store");
                self.state = StoreState::Connected;
            }
        }
        Ok(())
    }

    /// Drops, recreates and reloads every declared table in a single transaction.
    ///
    /// On failure the transaction rolls back, the store moves to ERROR and the message is
    /// kept in [`PlanStore::last_error`]. Safe to call repeatedly.
    pub fn build(&mut self) -> StoreResult<BuildReport> {
        info!(
            target: "store.build",
            path = %self.path.display(),
            tables = self.schema.tables().len(),
            "rebuilding plan store"
        );
        self.ensure_connection()?;
        let result = match self.conn.as_mut() {
            Some(conn) => rebuild(conn, &self.schema),
            None => Err(self.unavailable()),
        };

        match result {
            Ok(report) => {
                for load in &report.tables {
                    info!(target: "store.build", table = %load.table, rows = load.rows, "table loaded");
                }
                self.state = StoreState::Connected;
                self.last_error = None;
                Ok(report)
            }
            Err(err) => {
                self.record_failure(&err, self.on_build_error);
                Err(err)
            }
        }
    }

    fn record_failure(&mut self, err: &StoreError, policy: BuildErrorPolicy) {
        let message = err.to_string();
        self.state = StoreState::Error;
        self.last_error = Some(message.clone());
        if policy == BuildErrorPolicy::Fatal || err.is_fatal() {
            error!(target: "store", error = %message, "plan store failed fatally");
            self.sealed = true;
            self.release();
        } else {
            warn!(target: "store.build", error = %message, "plan store build failed");
        }
    }

    fn release(&mut self) -> Option<rusqlite::Error> {
        let conn = self.conn.take()?;
        match conn.close() {
            Ok(()) => None,
            Err((_conn, err)) => {
                warn!(target: "store", error = %err, "problem closing plan store connection");
                Some(err)
            }
        }
    }

    /// Releases the connection. A failed close is logged and recorded but leaves the state
    /// untouched; the next query reconnects.
    pub fn close(&mut self) -> StoreResult<()> {
        match self.release() {
            None => Ok(()),
            Some(err) => {
                self.last_error = Some(format!("problem closing connection: {err}"));
                Err(StoreError::Database(err))
            }
        }
    }

    pub fn shutdown(&mut self) {
        if self.close().is_ok() {
            debug!(target: "store", path = %self.path.display(), "plan store shut down");
        }
    }

    fn reader(&mut self) -> StoreResult<&Connection> {
        if self.state == StoreState::Error {
            return Err(self.unavailable());
        }
        self.connect()?;
        if self.state == StoreState::Ready {
            return Err(StoreError::NotBuilt {
                path: self.path.clone(),
            });
        }
        match self.conn.as_ref() {
            Some(conn) => Ok(conn),
            None => Err(self.unavailable()),
        }
    }

    /// Case-insensitive exact match on the country name. `None` when unknown.
    pub fn zone_for_destination(&mut self, country: &str) -> StoreResult<Option<i64>> {
        let conn = self.reader()?;
        let zone = conn
            .query_row(
                "SELECT zone FROM destinations WHERE country = ?1 COLLATE NOCASE LIMIT 1",
                [country],
                |row| row.get(0),
            )
            .optional()?;
        Ok(zone)
    }

    pub fn plans_for_zone(&mut self, zone: i64) -> StoreResult<Vec<Plan>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT plan_id, zone, duration_days, data_gb, price_sgd
             FROM plans
             WHERE zone = ?1
             ORDER BY plan_id",
        )?;
        let rows = stmt
            .query_map([zone], |row| Plan::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn rate_for_zone(&mut self, zone: i64) -> StoreResult<Option<Rate>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT zone, rate_data_per_10kb, rate_calls_outgoing_per_min,
                    rate_calls_incoming_per_min, rate_per_sms
             FROM rates
             WHERE zone = ?1",
        )?;
        let rate = stmt.query_row([zone], |row| Rate::from_row(row)).optional()?;
        Ok(rate)
    }

    pub fn destinations(&mut self) -> StoreResult<Vec<Destination>> {
        let conn = self.reader()?;
        let mut stmt =
            conn.prepare("SELECT country, zone FROM destinations ORDER BY zone, country")?;
        let rows = stmt
            .query_map([], |row| Destination::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn zones(&mut self) -> StoreResult<Vec<ZoneSummary>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT d.zone,
                    COUNT(*),
                    (SELECT COUNT(*) FROM plans p WHERE p.zone = d.zone),
                    EXISTS (SELECT 1 FROM rates r WHERE r.zone = d.zone)
             FROM destinations d
             GROUP BY d.zone
             ORDER BY d.zone",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ZoneSummary {
                    zone: row.get(0)?,
                    destinations: row.get::<_, i64>(1)? as usize,
                    plans: row.get::<_, i64>(2)? as usize,
                    has_rates: row.get::<_, i64>(3)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn integrity_check(&mut self) -> StoreResult<String> {
        let conn = self.reader()?;
        let result = conn.query_row("PRAGMA integrity_check;", [], |row| row.get(0))?;
        Ok(result)
    }
}

fn tables_present(conn: &Connection, schema: &Schema) -> StoreResult<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    for table in schema.tables() {
        if !stmt.exists([table.table_name.as_str()])? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn rebuild(conn: &mut Connection, schema: &Schema) -> StoreResult<BuildReport> {
    let tx = conn.transaction()?;
    for table in schema.tables() {
        tx.execute_batch(&table.drop_sql())?;
    }
    for table in schema.tables() {
        tx.execute_batch(&table.create_sql())?;
    }

    let mut tables = Vec::with_capacity(schema.tables().len());
    for table in schema.tables() {
        let source = schema.source_path(table);
        let rows = read_table(table, &source)?;
        let inserted = insert_rows(&tx, table, &rows)?;
        tables.push(TableLoad {
            table: table.table_name.clone(),
            source,
            rows: inserted,
        });
    }
    tx.commit()?;

    Ok(BuildReport {
        tables,
        built_at: Utc::now(),
    })
}

fn insert_rows(tx: &Transaction<'_>, table: &TableSchema, rows: &[SourceRow]) -> StoreResult<usize> {
    let mut stmt = tx.prepare(&table.insert_sql())?;
    for row in rows {
        stmt.execute(params_from_iter(row.values.iter()))
            .map_err(|source| {
                let constraint = matches!(
                    &source,
                    rusqlite::Error::SqliteFailure(err, _)
                        if err.code == ErrorCode::ConstraintViolation
                );
                if constraint {
                    StoreError::Constraint {
                        table: table.table_name.clone(),
                        line: row.line,
                        source,
                    }
                } else {
                    StoreError::Database(source)
                }
            })?;
    }
    Ok(rows.len())
}
