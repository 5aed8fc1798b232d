//! The execution and change-batch engine.

use super::cancel::CancellationToken;
use super::pending::{Operation, PendingChange, Tracked};
use super::schema::{SchemaCache, SchemaValidator};
use crate::config::ContextConfig;
use crate::error::{CoreError, CoreResult};
use crate::mapper::{scalar_count, MappedRows};
use crate::metadata::{Catalog, ConventionOracle, Entity, MetadataOracle};
use crate::query::{Projection, QueryBuilder, QueryOptions, SelectStatement};
use entimap_codec::Value;
use entimap_driver::{Command, Connection, ConnectionFactory, Parameters, Row, RowSet};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Entities on this page.
    pub items: Vec<T>,
    /// Matching rows across all pages.
    pub total_count: u64,
    /// 1-based page index.
    pub page_index: u32,
    /// Page size, `None` when the query was not paged.
    pub page_size: Option<u32>,
}

impl<T> Page<T> {
    /// Number of pages needed for `total_count` rows.
    #[must_use]
    pub fn page_count(&self) -> u64 {
        match self.page_size {
            Some(size) if size > 0 => self.total_count.div_ceil(u64::from(size)),
            _ => u64::from(self.total_count > 0),
        }
    }
}

/// Where connections come from.
enum Session {
    /// The context opens a connection per call, or holds one for the
    /// duration of an explicit transaction.
    Owned {
        factory: Arc<dyn ConnectionFactory>,
        active: Option<Box<dyn Connection>>,
    },
    /// A caller-supplied open connection. Never opened or closed here.
    Borrowed(Box<dyn Connection>),
}

/// Runs queries and flushes queued changes against one database.
///
/// A context either owns its connections, created from a
/// [`ConnectionFactory`] per call, or borrows one already-open connection
/// that it never closes. At most one transaction is active at a time.
///
/// Queued changes are flushed in the order they were enqueued. The queue is
/// drained by every flush, including one that fails part way; statements
/// already executed stay applied unless an enclosing transaction is rolled
/// back.
///
/// The context is not meant for concurrent use: a flush is expected to run
/// to completion before the next operation starts.
///
/// # Example
///
/// ```rust
/// use entimap_codec::{CodecResult, FromValue, Value};
/// use entimap_core::{Catalog, ColumnDescriptor, DbContext, Entity, EntityDescriptor};
/// use entimap_driver::MemoryDatabase;
/// use std::sync::OnceLock;
///
/// #[derive(Debug, Default, Clone)]
/// struct Customer {
///     id: i64,
///     name: String,
/// }
///
/// impl Entity for Customer {
///     fn descriptor() -> &'static EntityDescriptor {
///         static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
///         DESCRIPTOR.get_or_init(|| {
///             EntityDescriptor::new("Customer")
///                 .column(ColumnDescriptor::new("Id").identity())
///                 .column(ColumnDescriptor::new("Name"))
///         })
///     }
///
///     fn get(&self, property: &str) -> Option<Value> {
///         match property {
///             "Id" => Some(self.id.into()),
///             "Name" => Some(self.name.as_str().into()),
///             _ => None,
///         }
///     }
///
///     fn set(&mut self, property: &str, value: &Value) -> CodecResult<()> {
///         match property {
///             "Id" => self.id = i64::from_value(value)?,
///             "Name" => self.name = String::from_value(value)?,
///             _ => {}
///         }
///         Ok(())
///     }
/// }
///
/// let db = MemoryDatabase::new();
/// db.on_scalar("SCOPE_IDENTITY").returns_scalar(42_i64);
///
/// let context = DbContext::new(Catalog::new().with::<Customer>(), db.clone());
/// let ann = context.enqueue_add(Customer { id: 0, name: "Ann".into() });
/// assert_eq!(context.flush().unwrap(), 1);
/// assert_eq!(ann.get().id, 42);
/// ```
pub struct DbContext {
    oracle: Box<dyn MetadataOracle + Send + Sync>,
    config: ContextConfig,
    session: Mutex<Session>,
    pending: Mutex<VecDeque<PendingChange>>,
    schema: SchemaCache,
    validator: Option<Box<dyn SchemaValidator>>,
}

impl DbContext {
    /// Creates a context that opens its own connections from `factory`.
    pub fn new(catalog: Catalog, factory: impl ConnectionFactory + 'static) -> Self {
        Self::from_session(
            Box::new(ConventionOracle::new(catalog)),
            Session::Owned {
                factory: Arc::new(factory),
                active: None,
            },
        )
    }

    /// Creates a context over an already-open connection.
    ///
    /// The connection is never opened or closed by the context; take it
    /// back with [`into_connection`](Self::into_connection).
    pub fn with_connection(catalog: Catalog, connection: Box<dyn Connection>) -> Self {
        Self::from_session(
            Box::new(ConventionOracle::new(catalog)),
            Session::Borrowed(connection),
        )
    }

    fn from_session(oracle: Box<dyn MetadataOracle + Send + Sync>, session: Session) -> Self {
        Self {
            oracle,
            config: ContextConfig::default(),
            session: Mutex::new(session),
            pending: Mutex::new(VecDeque::new()),
            schema: SchemaCache::default(),
            validator: None,
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the metadata oracle.
    #[must_use]
    pub fn with_oracle(mut self, oracle: impl MetadataOracle + Send + Sync + 'static) -> Self {
        self.oracle = Box::new(oracle);
        self
    }

    /// Installs the schema validator consulted before an entity is first
    /// used.
    #[must_use]
    pub fn with_schema_validator(mut self, validator: impl SchemaValidator + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The metadata oracle.
    #[must_use]
    pub fn oracle(&self) -> &dyn MetadataOracle {
        self.oracle.as_ref()
    }

    /// A statement builder for this context's oracle and dialect.
    #[must_use]
    pub fn query_builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self.oracle.as_ref(), self.config.dialect.dialect())
    }

    /// Runs `f` on the current connection.
    ///
    /// An owned context without a transaction opens a connection for this
    /// call only and closes it afterwards, even when `f` fails.
    fn with_session<R>(&self, f: impl FnOnce(&mut dyn Connection) -> CoreResult<R>) -> CoreResult<R> {
        let mut session = self.session.lock();
        match &mut *session {
            Session::Borrowed(connection) => f(connection.as_mut()),
            Session::Owned {
                active: Some(connection),
                ..
            } => f(connection.as_mut()),
            Session::Owned {
                factory,
                active: None,
            } => {
                let mut connection = factory.connect()?;
                connection.open()?;
                let result = f(connection.as_mut());
                let closed = connection.close();
                let value = result?;
                closed?;
                Ok(value)
            }
        }
    }

    /// Starts a transaction.
    ///
    /// An owned context opens the connection the transaction runs on; it is
    /// reused by every call until [`commit`](Self::commit) or
    /// [`rollback`](Self::rollback) closes it.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidOperation`] when a transaction is already active.
    pub fn begin_transaction(&self) -> CoreResult<()> {
        let mut session = self.session.lock();
        match &mut *session {
            Session::Owned {
                active: Some(_), ..
            } => Err(CoreError::invalid_operation("a transaction is already active")),
            Session::Owned { factory, active } => {
                let mut connection = factory.connect()?;
                connection.open()?;
                if let Err(e) = connection.begin_transaction() {
                    let _ = connection.close();
                    return Err(e.into());
                }
                *active = Some(connection);
                tracing::debug!("transaction started");
                Ok(())
            }
            Session::Borrowed(connection) => {
                if connection.in_transaction() {
                    return Err(CoreError::invalid_operation("a transaction is already active"));
                }
                connection.begin_transaction()?;
                tracing::debug!("transaction started on borrowed connection");
                Ok(())
            }
        }
    }

    /// Commits the active transaction.
    pub fn commit(&self) -> CoreResult<()> {
        self.finish_transaction(true)
    }

    /// Rolls back the active transaction.
    pub fn rollback(&self) -> CoreResult<()> {
        self.finish_transaction(false)
    }

    fn finish_transaction(&self, commit: bool) -> CoreResult<()> {
        let verb = if commit { "commit" } else { "roll back" };
        let mut session = self.session.lock();
        match &mut *session {
            Session::Owned { active, .. } => {
                let mut connection = active
                    .take()
                    .ok_or_else(|| CoreError::invalid_operation(format!("no active transaction to {verb}")))?;
                let finished = if commit {
                    connection.commit()
                } else {
                    connection.rollback()
                };
                let closed = connection.close();
                finished?;
                closed?;
            }
            Session::Borrowed(connection) => {
                if !connection.in_transaction() {
                    return Err(CoreError::invalid_operation(format!(
                        "no active transaction to {verb}"
                    )));
                }
                if commit {
                    connection.commit()?;
                } else {
                    connection.rollback()?;
                }
            }
        }
        tracing::debug!(commit, "transaction finished");
        Ok(())
    }

    /// Returns true while a transaction is active.
    #[must_use]
    pub fn is_transaction_active(&self) -> bool {
        match &*self.session.lock() {
            Session::Owned { active, .. } => active.is_some(),
            Session::Borrowed(connection) => connection.in_transaction(),
        }
    }

    /// Releases the borrowed connection, or the connection of an active
    /// owned transaction.
    #[must_use]
    pub fn into_connection(self) -> Option<Box<dyn Connection>> {
        match self.session.into_inner() {
            Session::Owned { active, .. } => active,
            Session::Borrowed(connection) => Some(connection),
        }
    }

    fn ensure_schema(&self, entity: &str, connection: &mut dyn Connection) -> CoreResult<()> {
        if !self.config.validate_schema {
            return Ok(());
        }
        let Some(validator) = self.validator.as_deref() else {
            return Ok(());
        };
        if !self.schema.first_attempt(entity) {
            return Ok(());
        }
        let descriptor = self.oracle.descriptor(entity)?;
        tracing::debug!(entity, "validating schema");
        validator
            .validate_or_create(descriptor, connection)
            .map_err(|source| CoreError::Schema {
                entity: entity.to_string(),
                source,
            })
    }

    /// Number of entity types whose schema validation has been attempted.
    #[must_use]
    pub fn validated_entity_count(&self) -> usize {
        self.schema.len()
    }

    fn select<T: Entity>(&self, options: &QueryOptions) -> CoreResult<SelectStatement> {
        self.query_builder()
            .build_select(&T::descriptor().name, options, &Projection::Entity)
    }

    /// Loads every entity matching `options`.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = %T::descriptor().name))]
    pub fn find_many<T: Entity>(&self, options: &QueryOptions) -> CoreResult<Vec<T>> {
        self.find_many_as(options, |entity: T| entity)
    }

    /// Loads every entity matching `options` and applies `selector` to each.
    pub fn find_many_as<T: Entity, R>(
        &self,
        options: &QueryOptions,
        mut selector: impl FnMut(T) -> R,
    ) -> CoreResult<Vec<R>> {
        let statement = self.select::<T>(options)?;
        self.with_session(|connection| {
            self.ensure_schema(&statement.entity, connection)?;
            let rows = query(connection, &statement.command())?;
            MappedRows::<T>::new(rows, &statement)?
                .map(|entity| entity.map(&mut selector))
                .collect()
        })
    }

    /// Loads the first entity matching `options`.
    pub fn find_one<T: Entity>(&self, options: &QueryOptions) -> CoreResult<Option<T>> {
        let statement = self.select::<T>(options)?;
        self.with_session(|connection| {
            self.ensure_schema(&statement.entity, connection)?;
            let rows = query(connection, &statement.command())?;
            MappedRows::<T>::new(rows, &statement)?.next().transpose()
        })
    }

    /// Loads one page together with the total number of matching rows.
    ///
    /// Without a page size every match is returned on page 1.
    ///
    /// With eager-loaded navigations the page window slices joined rows, not
    /// owners: an owner with many related rows takes several slots, so a page
    /// can hold fewer than `page_size` entities and an owner straddling the
    /// boundary is split across pages. `total_count` counts distinct owners.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = %T::descriptor().name))]
    pub fn find_page<T: Entity>(&self, options: &QueryOptions) -> CoreResult<Page<T>> {
        let statement = self.select::<T>(options)?;
        let (items, total_count) = self.with_session(|connection| {
            self.ensure_schema(&statement.entity, connection)?;
            let (items, total_count) = {
                let rows = query(connection, &statement.command())?;
                let mut mapped = MappedRows::<T>::new(rows, &statement)?;
                let items = mapped.by_ref().collect::<CoreResult<Vec<_>>>()?;
                (items, mapped.total_count())
            };
            // A page past the end has no row to carry the counter.
            if items.is_empty() && options.is_paged() {
                let count = self
                    .query_builder()
                    .build_total_count(&statement.entity, options)?;
                let total = scalar_count(scalar(connection, &count.command())?)?;
                return Ok((items, total));
            }
            Ok((items, total_count))
        })?;
        Ok(Page {
            items,
            total_count,
            page_index: if options.is_paged() { options.page_index } else { 1 },
            page_size: options.page_size.filter(|_| options.is_paged()),
        })
    }

    /// Counts the entities matching the filter of `options`.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = %T::descriptor().name))]
    pub fn count<T: Entity>(&self, options: &QueryOptions) -> CoreResult<u64> {
        let statement = self
            .query_builder()
            .build_count(&T::descriptor().name, options)?;
        self.with_session(|connection| {
            self.ensure_schema(&statement.entity, connection)?;
            scalar_count(scalar(connection, &statement.command())?)
        })
    }

    /// Returns true if any entity matches the filter of `options`.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = %T::descriptor().name))]
    pub fn exists<T: Entity>(&self, options: &QueryOptions) -> CoreResult<bool> {
        let statement = self
            .query_builder()
            .build_exists(&T::descriptor().name, options)?;
        self.with_session(|connection| {
            self.ensure_schema(&statement.entity, connection)?;
            let mut rows = query(connection, &statement.command())?;
            Ok(rows.next().transpose()?.is_some())
        })
    }

    /// Loads matching entities into a map.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidOperation`] when two entities produce the same key.
    pub fn to_map<T, K, V>(
        &self,
        options: &QueryOptions,
        key: impl Fn(&T) -> K,
        value: impl Fn(T) -> V,
    ) -> CoreResult<HashMap<K, V>>
    where
        T: Entity,
        K: Eq + Hash + fmt::Debug,
    {
        let mut map = HashMap::new();
        for entity in self.find_many::<T>(options)? {
            let k = key(&entity);
            if map.contains_key(&k) {
                return Err(CoreError::invalid_operation(format!("duplicate key {k:?}")));
            }
            map.insert(k, value(entity));
        }
        Ok(map)
    }

    /// Loads matching entities grouped by key, groups in first-seen order.
    pub fn group_by<T, K, V>(
        &self,
        options: &QueryOptions,
        key: impl Fn(&T) -> K,
        value: impl Fn(T) -> V,
    ) -> CoreResult<Vec<(K, Vec<V>)>>
    where
        T: Entity,
        K: Eq + Hash + Clone,
    {
        let mut groups: Vec<(K, Vec<V>)> = Vec::new();
        let mut index: HashMap<K, usize> = HashMap::new();
        for entity in self.find_many::<T>(options)? {
            let k = key(&entity);
            let slot = *index.entry(k.clone()).or_insert_with(|| {
                groups.push((k, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(value(entity));
        }
        Ok(groups)
    }

    /// Executes hand-written SQL, returning the affected row count.
    pub fn execute_sql(&self, sql: &str, parameters: Parameters) -> CoreResult<u64> {
        let command = Command::with_parameters(sql, parameters);
        self.with_session(|connection| execute(connection, &command))
    }

    /// Runs a hand-written query and collects its rows.
    pub fn query_sql(&self, sql: &str, parameters: Parameters) -> CoreResult<Vec<Row>> {
        let command = Command::with_parameters(sql, parameters);
        self.with_session(|connection| {
            query(connection, &command)?
                .map(|row| row.map_err(CoreError::from))
                .collect()
        })
    }

    /// Runs a hand-written query and maps its rows by column name.
    pub fn query_sql_as<T: Entity>(&self, sql: &str, parameters: Parameters) -> CoreResult<Vec<T>> {
        let command = Command::with_parameters(sql, parameters);
        self.with_session(|connection| MappedRows::<T>::raw(query(connection, &command)?).collect())
    }

    /// Queues an INSERT.
    pub fn enqueue_add<T: Entity>(&self, entity: T) -> Tracked<T> {
        self.enqueue_new(entity, Operation::Added)
    }

    /// Queues an UPDATE.
    pub fn enqueue_update<T: Entity>(&self, entity: T) -> Tracked<T> {
        self.enqueue_new(entity, Operation::Modified)
    }

    /// Queues a DELETE.
    pub fn enqueue_remove<T: Entity>(&self, entity: T) -> Tracked<T> {
        self.enqueue_new(entity, Operation::Removed)
    }

    fn enqueue_new<T: Entity>(&self, entity: T, operation: Operation) -> Tracked<T> {
        let tracked = Tracked::new(entity);
        self.enqueue(&tracked, operation);
        tracked
    }

    /// Queues an operation on an entity already held in a handle.
    pub fn enqueue<T: Entity>(&self, entity: &Tracked<T>, operation: Operation) {
        self.pending
            .lock()
            .push_back(PendingChange::new(entity.clone(), operation));
    }

    /// Number of queued changes.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Entity names and operations of the queued changes, in flush order.
    #[must_use]
    pub fn pending_operations(&self) -> Vec<(&'static str, Operation)> {
        self.pending
            .lock()
            .iter()
            .map(|c| (c.entity_name(), c.operation()))
            .collect()
    }

    /// Drops every queued change, returning how many were dropped.
    pub fn discard_pending(&self) -> usize {
        let mut pending = self.pending.lock();
        let dropped = pending.len();
        pending.clear();
        dropped
    }

    /// Applies every queued change in order and returns the affected row
    /// count.
    ///
    /// For each change the entity's schema is validated on first use, the
    /// row's existence is checked (when enabled), the statement is executed
    /// and, for an insert into an identity-keyed entity, the generated key
    /// is read back into the entity.
    ///
    /// # Errors
    ///
    /// - [`CoreError::EntityAlreadyTracked`] when an added row already exists
    /// - [`CoreError::EntityNotFound`] when a modified or removed row is missing
    /// - [`CoreError::Schema`], builder and driver errors
    ///
    /// The first error aborts the flush. The queue is empty afterwards either
    /// way.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn flush(&self) -> CoreResult<u64> {
        self.flush_changes(None)
    }

    /// [`flush`](Self::flush), checking `cancel` before each change.
    ///
    /// Cancelling aborts like any other failure: changes already executed
    /// stay applied and the rest are dropped.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn flush_with_cancel(&self, cancel: &CancellationToken) -> CoreResult<u64> {
        self.flush_changes(Some(cancel))
    }

    fn flush_changes(&self, cancel: Option<&CancellationToken>) -> CoreResult<u64> {
        let changes: Vec<PendingChange> = self.pending.lock().drain(..).collect();
        if changes.is_empty() {
            return Ok(0);
        }
        let started = Instant::now();
        let total = changes.len();

        let affected = self.with_session(|connection| {
            let mut affected = 0;
            for (index, change) in changes.iter().enumerate() {
                match self.apply(connection, change, cancel) {
                    Ok(n) => affected += n,
                    Err(e) => {
                        tracing::warn!(
                            entity = change.entity_name(),
                            operation = ?change.operation(),
                            index,
                            dropped = total - index - 1,
                            error = %e,
                            "flush aborted"
                        );
                        return Err(e);
                    }
                }
            }
            Ok(affected)
        })?;

        tracing::info!(
            changes = total,
            affected,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "flush complete"
        );
        Ok(affected)
    }

    /// Writes one change. The token is checked before every connection call.
    fn apply(
        &self,
        connection: &mut dyn Connection,
        change: &PendingChange,
        cancel: Option<&CancellationToken>,
    ) -> CoreResult<u64> {
        let checkpoint = || cancel.map_or(Ok(()), CancellationToken::check);
        let entity = change.entity_name();
        checkpoint()?;
        self.ensure_schema(entity, connection)?;

        let builder = self.query_builder();
        let record = change.entity.record();
        let key = self.oracle.primary_key_properties(entity)?;
        let identity = match key.as_slice() {
            [single] => self.oracle.is_identity_column(entity, single)?.then_some(*single),
            _ => None,
        };

        // An insert without a key, or with the database still to assign it,
        // has nothing to check for.
        let check_first = self.config.check_existence
            && match change.operation {
                Operation::Added => {
                    !key.is_empty() && identity.map_or(true, |pk| !record.value(pk).is_default())
                }
                Operation::Modified | Operation::Removed => true,
            };
        if check_first {
            let command = builder.build_existence_check(entity, &record)?;
            checkpoint()?;
            let exists = query(connection, &command)?.next().transpose()?.is_some();
            match (change.operation, exists) {
                (Operation::Added, true) => {
                    return Err(CoreError::EntityAlreadyTracked {
                        entity: entity.to_string(),
                        key: builder.key_string(entity, &record)?,
                    });
                }
                (Operation::Modified | Operation::Removed, false) => {
                    return Err(CoreError::EntityNotFound {
                        entity: entity.to_string(),
                        key: builder.key_string(entity, &record)?,
                    });
                }
                _ => {}
            }
        }

        let command = match change.operation {
            Operation::Added => builder.build_insert(entity, &record)?,
            Operation::Modified => builder.build_update(entity, &record)?,
            Operation::Removed => builder.build_delete(entity, &record)?,
        };
        checkpoint()?;
        let affected = execute(connection, &command)?;

        if let (Operation::Added, Some(pk)) = (change.operation, identity) {
            checkpoint()?;
            let generated = scalar(connection, &builder.build_last_insert_id())?;
            if let Some(value) = generated.filter(|v| !v.is_null()) {
                change
                    .entity
                    .write_back(pk, &value)
                    .map_err(|e| CoreError::conversion(pk, e))?;
            }
        }
        Ok(affected)
    }
}

impl fmt::Debug for DbContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbContext")
            .field("config", &self.config)
            .field("pending", &self.pending_count())
            .field("transaction", &self.is_transaction_active())
            .finish_non_exhaustive()
    }
}

fn execute(connection: &mut dyn Connection, command: &Command) -> CoreResult<u64> {
    tracing::debug!(sql = %command.sql, params = command.parameters.len(), "execute");
    Ok(connection.execute(command)?)
}

fn query<'c>(connection: &'c mut dyn Connection, command: &Command) -> CoreResult<RowSet<'c>> {
    tracing::debug!(sql = %command.sql, params = command.parameters.len(), "query");
    Ok(connection.query(command)?)
}

fn scalar(connection: &mut dyn Connection, command: &Command) -> CoreResult<Option<Value>> {
    tracing::debug!(sql = %command.sql, params = command.parameters.len(), "scalar");
    Ok(connection.scalar(command)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ColumnDescriptor, EntityDescriptor};
    use crate::predicate::prop;
    use entimap_codec::{CodecResult, FromValue};
    use entimap_driver::{ConnectionEvent, MemoryDatabase};
    use std::sync::OnceLock;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Tag {
        name: String,
        color: String,
    }

    impl Tag {
        fn new(name: &str, color: &str) -> Self {
            Self {
                name: name.into(),
                color: color.into(),
            }
        }
    }

    impl Entity for Tag {
        fn descriptor() -> &'static EntityDescriptor {
            static D: OnceLock<EntityDescriptor> = OnceLock::new();
            D.get_or_init(|| {
                EntityDescriptor::new("Tag")
                    .column(ColumnDescriptor::new("Name").primary_key())
                    .column(ColumnDescriptor::new("Color"))
            })
        }

        fn get(&self, property: &str) -> Option<Value> {
            match property {
                "Name" => Some(self.name.as_str().into()),
                "Color" => Some(self.color.as_str().into()),
                _ => None,
            }
        }

        fn set(&mut self, property: &str, value: &Value) -> CodecResult<()> {
            match property {
                "Name" => self.name = String::from_value(value)?,
                "Color" => self.color = String::from_value(value)?,
                _ => {}
            }
            Ok(())
        }
    }

    fn context(db: &MemoryDatabase) -> DbContext {
        DbContext::new(Catalog::new().with::<Tag>(), db.clone())
    }

    #[test]
    fn owned_context_opens_a_connection_per_call() {
        let db = MemoryDatabase::new();
        let ctx = context(&db);
        ctx.count::<Tag>(&QueryOptions::new()).unwrap();
        ctx.exists::<Tag>(&QueryOptions::new()).unwrap();

        assert_eq!(db.connections_created(), 2);
        assert_eq!(db.open_count(), 2);
        assert_eq!(db.close_count(), 2);
    }

    #[test]
    fn transaction_pins_one_connection_until_commit() {
        let db = MemoryDatabase::new();
        let ctx = context(&db);
        ctx.begin_transaction().unwrap();
        assert!(ctx.is_transaction_active());
        assert!(matches!(
            ctx.begin_transaction(),
            Err(CoreError::InvalidOperation { .. })
        ));

        ctx.count::<Tag>(&QueryOptions::new()).unwrap();
        ctx.execute_sql("DELETE FROM [Tag]", Parameters::new()).unwrap();
        ctx.commit().unwrap();

        assert!(!ctx.is_transaction_active());
        assert_eq!(db.connections_created(), 1);
        assert_eq!(
            db.events(),
            vec![
                ConnectionEvent::Opened(1),
                ConnectionEvent::Began(1),
                ConnectionEvent::Committed(1),
                ConnectionEvent::Closed(1),
            ]
        );
        assert!(matches!(ctx.rollback(), Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn borrowed_connection_is_never_closed() {
        let db = MemoryDatabase::new();
        let mut connection = db.connection();
        connection.open().unwrap();
        let ctx = DbContext::with_connection(Catalog::new().with::<Tag>(), Box::new(connection));

        ctx.find_many::<Tag>(&QueryOptions::new()).unwrap();
        ctx.begin_transaction().unwrap();
        ctx.rollback().unwrap();

        assert_eq!(db.close_count(), 0);
        let connection = ctx.into_connection().unwrap();
        assert!(connection.is_open());
    }

    #[test]
    fn flush_checks_existence_then_executes_in_order() {
        let db = MemoryDatabase::new();
        db.on_query("SELECT * FROM [Tag]")
            .once()
            .returns_rows(&["Name", "Color"], vec![vec!["red".into(), "#f00".into()]]);
        let ctx = context(&db);
        ctx.enqueue_update(Tag::new("red", "#e00"));
        ctx.enqueue_add(Tag::new("blue", "#00f"));
        assert_eq!(ctx.pending_count(), 2);

        assert_eq!(ctx.flush().unwrap(), 2);
        assert_eq!(ctx.pending_count(), 0);
        assert_eq!(
            db.statements(),
            vec![
                "SELECT * FROM [Tag] WHERE [Name] = @Name".to_string(),
                "UPDATE [Tag] SET [Color] = @Color WHERE [Name] = @Name".to_string(),
                "SELECT * FROM [Tag] WHERE [Name] = @Name".to_string(),
                "INSERT INTO [Tag] ([Name], [Color]) VALUES (@Name, @Color)".to_string(),
            ]
        );
    }

    #[test]
    fn flush_rejects_inconsistent_state_and_drains() {
        let db = MemoryDatabase::new();
        let ctx = context(&db);
        ctx.enqueue_remove(Tag::new("ghost", ""));
        ctx.enqueue_add(Tag::new("never", ""));

        let err = ctx.flush().unwrap_err();
        assert!(matches!(err, CoreError::EntityNotFound { ref key, .. } if key == "ghost"));
        assert_eq!(ctx.pending_count(), 0);
        assert!(!db.statements().iter().any(|s| s.starts_with("DELETE") || s.starts_with("INSERT")));

        db.on_query("SELECT * FROM [Tag]")
            .returns_rows(&["Name"], vec![vec!["dup".into()]]);
        ctx.enqueue_add(Tag::new("dup", ""));
        assert!(matches!(
            ctx.flush(),
            Err(CoreError::EntityAlreadyTracked { .. })
        ));
    }

    #[test]
    fn probing_can_be_disabled() {
        let db = MemoryDatabase::new();
        let ctx = context(&db).with_config(ContextConfig::new().check_existence(false));
        ctx.enqueue_remove(Tag::new("red", ""));
        assert_eq!(ctx.flush().unwrap(), 1);
        assert_eq!(db.statements(), vec!["DELETE FROM [Tag] WHERE [Name] = @Name".to_string()]);
    }

    #[test]
    fn cancelled_flush_still_drains() {
        let db = MemoryDatabase::new();
        let ctx = context(&db);
        ctx.enqueue_add(Tag::new("a", ""));
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(ctx.flush_with_cancel(&cancel), Err(CoreError::Cancelled)));
        assert_eq!(ctx.pending_count(), 0);
        assert!(db.statements().is_empty());
    }

    #[test]
    fn to_map_rejects_duplicate_keys_and_group_by_keeps_order() {
        let db = MemoryDatabase::new();
        db.on_query("FROM [Tag]").returns_rows(
            &["Name", "Color"],
            vec![
                vec!["a".into(), "red".into()],
                vec!["b".into(), "blue".into()],
                vec!["c".into(), "red".into()],
            ],
        );
        let ctx = context(&db);
        let options = QueryOptions::new().filter(prop("Color").ne(Value::Null));

        let by_name = ctx
            .to_map(&options, |t: &Tag| t.name.clone(), |t| t.color)
            .unwrap();
        assert_eq!(by_name.get("b").map(String::as_str), Some("blue"));
        assert!(matches!(
            ctx.to_map(&options, |t: &Tag| t.color.clone(), |t| t.name),
            Err(CoreError::InvalidOperation { .. })
        ));

        let groups = ctx
            .group_by(&options, |t: &Tag| t.color.clone(), |t| t.name)
            .unwrap();
        assert_eq!(
            groups,
            vec![
                ("red".to_string(), vec!["a".to_string(), "c".to_string()]),
                ("blue".to_string(), vec!["b".to_string()]),
            ]
        );
    }

    #[test]
    fn page_count_rounds_up() {
        let page = Page::<Tag> {
            items: Vec::new(),
            total_count: 11,
            page_index: 1,
            page_size: Some(5),
        };
        assert_eq!(page.page_count(), 3);
        let unpaged = Page::<Tag> {
            page_size: None,
            ..page
        };
        assert_eq!(unpaged.page_count(), 1);
    }
}
