//! Scripted in-process driver.

use crate::command::Command;
use crate::connection::{Connection, ConnectionFactory};
use crate::error::{DriverError, DriverResult};
use crate::row::RowSet;
use entimap_codec::Value;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Which connection entry point received a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// [`Connection::query`].
    Query,
    /// [`Connection::execute`].
    Execute,
    /// [`Connection::scalar`].
    Scalar,
}

/// A command received by a [`MemoryConnection`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedCommand {
    /// Id of the connection that ran the command.
    pub connection: u64,
    /// Entry point used.
    pub kind: CommandKind,
    /// The command itself.
    pub command: Command,
}

/// Lifecycle events recorded per connection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connection opened.
    Opened(u64),
    /// Connection closed.
    Closed(u64),
    /// Transaction started.
    Began(u64),
    /// Transaction committed.
    Committed(u64),
    /// Transaction rolled back.
    RolledBack(u64),
}

#[derive(Debug, Clone)]
enum Response {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    Affected(u64),
    Scalar(Value),
    Fail(String),
}

#[derive(Debug)]
struct Rule {
    kind: CommandKind,
    pattern: String,
    response: Response,
    remaining: Option<usize>,
}

impl Rule {
    fn serves(&self, kind: CommandKind, sql: &str) -> bool {
        let kind_ok = match kind {
            CommandKind::Scalar => matches!(self.kind, CommandKind::Scalar | CommandKind::Query),
            other => self.kind == other,
        };
        kind_ok && self.remaining != Some(0) && sql.contains(&self.pattern)
    }
}

#[derive(Debug, Default)]
struct State {
    rules: Vec<Rule>,
    log: Vec<LoggedCommand>,
    events: Vec<ConnectionEvent>,
    next_connection: u64,
    strict: bool,
    fail_open: Option<String>,
}

impl State {
    /// Finds the newest live rule for a command, consuming one use of it.
    fn take_response(&mut self, kind: CommandKind, sql: &str) -> Option<Response> {
        // Scalar-specific rules win over query rules for scalar requests.
        let pick = |rules: &[Rule], want: CommandKind| {
            rules
                .iter()
                .rposition(|r| r.kind == want && r.serves(kind, sql))
        };
        let index = match kind {
            CommandKind::Scalar => {
                pick(&self.rules, CommandKind::Scalar).or_else(|| pick(&self.rules, CommandKind::Query))
            }
            other => pick(&self.rules, other),
        }?;
        let rule = &mut self.rules[index];
        if let Some(n) = rule.remaining.as_mut() {
            *n -= 1;
        }
        Some(rule.response.clone())
    }
}

/// A scripted database shared by every connection it hands out.
///
/// Responses are registered with [`on_query`](Self::on_query),
/// [`on_execute`](Self::on_execute) and [`on_scalar`](Self::on_scalar). A
/// rule matches when its pattern is a substring of the SQL text; when
/// several rules match, the most recently registered live rule wins.
///
/// Without a matching rule a query yields no rows, a scalar yields nothing
/// and an execute reports one affected row. A [`strict`](Self::strict)
/// database fails with [`DriverError::Unscripted`] instead.
///
/// Every command and lifecycle event is recorded for later assertions.
///
/// # Example
///
/// ```rust
/// use entimap_driver::{Command, Connection, MemoryDatabase};
///
/// let db = MemoryDatabase::new();
/// db.on_execute("DELETE").affects(3);
///
/// let mut conn = db.connection();
/// conn.open().unwrap();
/// assert_eq!(conn.execute(&Command::new("DELETE FROM [Tag]")).unwrap(), 3);
/// conn.close().unwrap();
///
/// assert_eq!(db.statements(), vec!["DELETE FROM [Tag]".to_string()]);
/// assert_eq!(db.open_count(), db.close_count());
/// ```
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    /// Creates a lenient scripted database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a database that rejects unscripted commands.
    #[must_use]
    pub fn strict() -> Self {
        let db = Self::default();
        db.state.lock().strict = true;
        db
    }

    /// Scripts a response for queries containing `pattern`.
    ///
    /// Query rules also answer scalar requests with the first column of
    /// their first row.
    pub fn on_query(&self, pattern: impl Into<String>) -> Script<'_> {
        Script::new(self, CommandKind::Query, pattern.into())
    }

    /// Scripts a response for non-query commands containing `pattern`.
    pub fn on_execute(&self, pattern: impl Into<String>) -> Script<'_> {
        Script::new(self, CommandKind::Execute, pattern.into())
    }

    /// Scripts a response for scalar commands containing `pattern`.
    pub fn on_scalar(&self, pattern: impl Into<String>) -> Script<'_> {
        Script::new(self, CommandKind::Scalar, pattern.into())
    }

    /// Makes the next `open` call fail with a command error.
    pub fn fail_next_open(&self, message: impl Into<String>) {
        self.state.lock().fail_open = Some(message.into());
    }

    /// Creates a new, unopened connection.
    #[must_use]
    pub fn connection(&self) -> MemoryConnection {
        let id = {
            let mut state = self.state.lock();
            state.next_connection += 1;
            state.next_connection
        };
        MemoryConnection {
            id,
            db: self.clone(),
            open: false,
            transaction: false,
        }
    }

    /// Returns every command received so far.
    #[must_use]
    pub fn commands(&self) -> Vec<LoggedCommand> {
        self.state.lock().log.clone()
    }

    /// Returns the SQL text of every command received so far.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.state
            .lock()
            .log
            .iter()
            .map(|c| c.command.sql.clone())
            .collect()
    }

    /// Returns the recorded lifecycle events.
    #[must_use]
    pub fn events(&self) -> Vec<ConnectionEvent> {
        self.state.lock().events.clone()
    }

    /// Number of connections created so far.
    #[must_use]
    pub fn connections_created(&self) -> u64 {
        self.state.lock().next_connection
    }

    /// Number of successful `open` calls.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.count_events(|e| matches!(e, ConnectionEvent::Opened(_)))
    }

    /// Number of `close` calls that closed an open connection.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.count_events(|e| matches!(e, ConnectionEvent::Closed(_)))
    }

    /// Number of committed transactions.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.count_events(|e| matches!(e, ConnectionEvent::Committed(_)))
    }

    /// Number of rolled-back transactions.
    #[must_use]
    pub fn rollback_count(&self) -> usize {
        self.count_events(|e| matches!(e, ConnectionEvent::RolledBack(_)))
    }

    /// Clears recorded commands and events; scripted rules are kept.
    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.log.clear();
        state.events.clear();
    }

    fn count_events(&self, f: impl Fn(&ConnectionEvent) -> bool) -> usize {
        self.state.lock().events.iter().filter(|e| f(e)).count()
    }

    fn push_rule(&self, rule: Rule) {
        self.state.lock().rules.push(rule);
    }

    fn record(&self, event: ConnectionEvent) {
        self.state.lock().events.push(event);
    }

    fn dispatch(&self, connection: u64, kind: CommandKind, command: &Command) -> DriverResult<Response> {
        let mut state = self.state.lock();
        state.log.push(LoggedCommand {
            connection,
            kind,
            command: command.clone(),
        });
        match state.take_response(kind, &command.sql) {
            Some(Response::Fail(message)) => Err(DriverError::Command { message }),
            Some(response) => Ok(response),
            None if state.strict => Err(DriverError::Unscripted {
                sql: command.sql.clone(),
            }),
            None => Ok(match kind {
                CommandKind::Execute => Response::Affected(1),
                CommandKind::Query => Response::Rows {
                    columns: Vec::new(),
                    rows: Vec::new(),
                },
                CommandKind::Scalar => Response::Scalar(Value::Null),
            }),
        }
    }
}

impl fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryDatabase")
            .field("rules", &state.rules.len())
            .field("commands", &state.log.len())
            .field("strict", &state.strict)
            .finish()
    }
}

impl ConnectionFactory for MemoryDatabase {
    fn connect(&self) -> DriverResult<Box<dyn Connection>> {
        Ok(Box::new(self.connection()))
    }
}

/// A scripted response under construction.
///
/// The rule is registered by one of the terminal methods.
#[must_use = "a script is only registered by a terminal method such as `returns_rows`"]
pub struct Script<'a> {
    db: &'a MemoryDatabase,
    kind: CommandKind,
    pattern: String,
    remaining: Option<usize>,
}

impl<'a> Script<'a> {
    fn new(db: &'a MemoryDatabase, kind: CommandKind, pattern: String) -> Self {
        Self {
            db,
            kind,
            pattern,
            remaining: None,
        }
    }

    /// The rule answers a single command, then retires.
    pub fn once(self) -> Self {
        self.times(1)
    }

    /// The rule answers `n` commands, then retires.
    pub fn times(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    /// Answers with the given rows.
    pub fn returns_rows(self, columns: &[&str], rows: Vec<Vec<Value>>) {
        let columns = columns.iter().map(|c| (*c).to_string()).collect();
        self.finish(Response::Rows { columns, rows });
    }

    /// Answers with an affected-row count.
    pub fn affects(self, rows: u64) {
        self.finish(Response::Affected(rows));
    }

    /// Answers with a single value.
    pub fn returns_scalar(self, value: impl Into<Value>) {
        self.finish(Response::Scalar(value.into()));
    }

    /// Fails with a command error.
    pub fn fails(self, message: impl Into<String>) {
        self.finish(Response::Fail(message.into()));
    }

    fn finish(self, response: Response) {
        self.db.push_rule(Rule {
            kind: self.kind,
            pattern: self.pattern,
            response,
            remaining: self.remaining,
        });
    }
}

/// A connection handed out by a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryConnection {
    id: u64,
    db: MemoryDatabase,
    open: bool,
    transaction: bool,
}

impl MemoryConnection {
    /// Id of this connection, as used in the command log.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(DriverError::NotOpen)
        }
    }
}

impl Connection for MemoryConnection {
    fn open(&mut self) -> DriverResult<()> {
        if self.open {
            return Err(DriverError::AlreadyOpen);
        }
        if let Some(message) = self.db.state.lock().fail_open.take() {
            return Err(DriverError::Command { message });
        }
        self.open = true;
        self.db.record(ConnectionEvent::Opened(self.id));
        tracing::trace!(connection = self.id, "opened");
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        if !self.open {
            return Ok(());
        }
        if self.transaction {
            self.transaction = false;
            self.db.record(ConnectionEvent::RolledBack(self.id));
        }
        self.open = false;
        self.db.record(ConnectionEvent::Closed(self.id));
        tracing::trace!(connection = self.id, "closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn execute(&mut self, command: &Command) -> DriverResult<u64> {
        self.ensure_open()?;
        tracing::trace!(connection = self.id, sql = %command.sql, "execute");
        Ok(match self.db.dispatch(self.id, CommandKind::Execute, command)? {
            Response::Affected(n) => n,
            Response::Rows { rows, .. } => rows.len() as u64,
            Response::Scalar(_) | Response::Fail(_) => 0,
        })
    }

    fn query(&mut self, command: &Command) -> DriverResult<RowSet<'_>> {
        self.ensure_open()?;
        tracing::trace!(connection = self.id, sql = %command.sql, "query");
        Ok(match self.db.dispatch(self.id, CommandKind::Query, command)? {
            Response::Rows { columns, rows } => RowSet::from_rows(columns, rows),
            Response::Scalar(value) => RowSet::from_rows(vec![String::new()], vec![vec![value]]),
            Response::Affected(_) | Response::Fail(_) => RowSet::empty(),
        })
    }

    fn scalar(&mut self, command: &Command) -> DriverResult<Option<Value>> {
        self.ensure_open()?;
        tracing::trace!(connection = self.id, sql = %command.sql, "scalar");
        Ok(match self.db.dispatch(self.id, CommandKind::Scalar, command)? {
            Response::Scalar(Value::Null) => None,
            Response::Scalar(value) => Some(value),
            Response::Rows { rows, .. } => rows.into_iter().next().and_then(|r| r.into_iter().next()),
            Response::Affected(_) | Response::Fail(_) => None,
        })
    }

    fn begin_transaction(&mut self) -> DriverResult<()> {
        self.ensure_open()?;
        if self.transaction {
            return Err(DriverError::transaction("a transaction is already active"));
        }
        self.transaction = true;
        self.db.record(ConnectionEvent::Began(self.id));
        Ok(())
    }

    fn commit(&mut self) -> DriverResult<()> {
        if !self.transaction {
            return Err(DriverError::transaction("no active transaction to commit"));
        }
        self.transaction = false;
        self.db.record(ConnectionEvent::Committed(self.id));
        Ok(())
    }

    fn rollback(&mut self) -> DriverResult<()> {
        if !self.transaction {
            return Err(DriverError::transaction("no active transaction to roll back"));
        }
        self.transaction = false;
        self.db.record(ConnectionEvent::RolledBack(self.id));
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Parameters;

    fn open(db: &MemoryDatabase) -> MemoryConnection {
        let mut conn = db.connection();
        conn.open().unwrap();
        conn
    }

    #[test]
    fn commands_require_open_connection() {
        let db = MemoryDatabase::new();
        let mut conn = db.connection();
        let err = conn.execute(&Command::new("DELETE FROM [T]")).unwrap_err();
        assert!(matches!(err, DriverError::NotOpen));
        assert!(db.commands().is_empty());
    }

    #[test]
    fn unscripted_defaults_are_lenient() {
        let db = MemoryDatabase::new();
        let mut conn = open(&db);

        assert_eq!(conn.execute(&Command::new("UPDATE x")).unwrap(), 1);
        assert_eq!(conn.query(&Command::new("SELECT x")).unwrap().count(), 0);
        assert_eq!(conn.scalar(&Command::new("SELECT 1")).unwrap(), None);
    }

    #[test]
    fn strict_database_rejects_unscripted() {
        let db = MemoryDatabase::strict();
        let mut conn = open(&db);
        let err = conn.execute(&Command::new("UPDATE x")).unwrap_err();
        assert!(matches!(err, DriverError::Unscripted { sql } if sql == "UPDATE x"));
    }

    #[test]
    fn newest_live_rule_wins_and_once_retires() {
        let db = MemoryDatabase::new();
        db.on_execute("INSERT").affects(1);
        db.on_execute("INSERT").once().affects(7);
        let mut conn = open(&db);

        assert_eq!(conn.execute(&Command::new("INSERT INTO t")).unwrap(), 7);
        assert_eq!(conn.execute(&Command::new("INSERT INTO t")).unwrap(), 1);
    }

    #[test]
    fn scalar_prefers_scalar_rules_then_query_rules() {
        let db = MemoryDatabase::new();
        db.on_query("SELECT").returns_rows(&["n"], vec![vec![Value::Integer(3)]]);
        let mut conn = open(&db);
        assert_eq!(
            conn.scalar(&Command::new("SELECT COUNT(*)")).unwrap(),
            Some(Value::Integer(3))
        );

        db.on_scalar("SCOPE_IDENTITY").returns_scalar(42);
        assert_eq!(
            conn.scalar(&Command::new("SELECT CAST(SCOPE_IDENTITY() AS BIGINT)"))
                .unwrap(),
            Some(Value::Integer(42))
        );
    }

    #[test]
    fn scripted_failure_surfaces_as_command_error() {
        let db = MemoryDatabase::new();
        db.on_query("FROM [Broken]").fails("invalid object name");
        let mut conn = open(&db);
        let err = conn
            .query(&Command::new("SELECT * FROM [Broken]"))
            .unwrap_err();
        assert!(matches!(err, DriverError::Command { message } if message == "invalid object name"));
    }

    #[test]
    fn log_records_parameters_and_connection() {
        let db = MemoryDatabase::new();
        let mut conn = open(&db);
        let cmd = Command::with_parameters("DELETE WHERE [Id] = @Id", Parameters::new().with("@Id", 9));
        conn.execute(&cmd).unwrap();

        let log = db.commands();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].connection, conn.id());
        assert_eq!(log[0].kind, CommandKind::Execute);
        assert_eq!(log[0].command.parameters.get("@Id"), Some(&Value::Integer(9)));
    }

    #[test]
    fn transaction_lifecycle_is_recorded() {
        let db = MemoryDatabase::new();
        let mut conn = open(&db);

        assert!(conn.commit().is_err());
        conn.begin_transaction().unwrap();
        assert!(conn.in_transaction());
        assert!(conn.begin_transaction().is_err());
        conn.commit().unwrap();
        conn.begin_transaction().unwrap();
        conn.close().unwrap();

        let id = conn.id();
        assert_eq!(
            db.events(),
            vec![
                ConnectionEvent::Opened(id),
                ConnectionEvent::Began(id),
                ConnectionEvent::Committed(id),
                ConnectionEvent::Began(id),
                ConnectionEvent::RolledBack(id),
                ConnectionEvent::Closed(id),
            ]
        );
    }

    #[test]
    fn close_is_idempotent_and_open_failure_is_one_shot() {
        let db = MemoryDatabase::new();
        db.fail_next_open("login failed");
        let mut conn = db.connection();
        assert!(conn.open().is_err());
        conn.open().unwrap();
        conn.close().unwrap();
        conn.close().unwrap();
        assert_eq!(db.open_count(), 1);
        assert_eq!(db.close_count(), 1);
    }

    #[test]
    fn factory_hands_out_distinct_connections() {
        let db = MemoryDatabase::new();
        let a = db.connect().unwrap();
        let b = db.connect().unwrap();
        assert!(!a.is_open() && !b.is_open());
        assert_eq!(db.connections_created(), 2);
    }
}
