//! INSERT, UPDATE and DELETE compilation.

use super::QueryBuilder;
use crate::error::{CoreError, CoreResult};
use crate::metadata::Record;
use crate::predicate::ParameterNamer;
use entimap_codec::Value;
use entimap_driver::{Command, Parameters};

impl QueryBuilder<'_> {
    /// Compiles an INSERT for one entity.
    ///
    /// Identity columns are left out of the column list; a pre-assigned
    /// identity value is still bound.
    pub fn build_insert(&self, entity: &str, record: &Record) -> CoreResult<Command> {
        let table = self.oracle.table_name(entity)?;
        let mut names = ParameterNamer::default();
        let mut parameters = Parameters::new();
        let mut columns = Vec::new();
        let mut values = Vec::new();

        for (column, property) in self.oracle.mapped_columns(entity)? {
            let value = record.value(property);
            let name = names.next(column);
            if self.oracle.is_identity_column(entity, property)? {
                if !value.is_default() {
                    parameters.bind(name, value);
                }
                continue;
            }
            columns.push(self.dialect.quote(column));
            values.push(name.clone());
            parameters.bind(name, value);
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.dialect.quote(table))
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.dialect.quote(table),
                columns.join(", "),
                values.join(", ")
            )
        };
        Ok(Command::with_parameters(sql, parameters))
    }

    /// Compiles an UPDATE of every non-key column, keyed on the primary key.
    pub fn build_update(&self, entity: &str, record: &Record) -> CoreResult<Command> {
        let table = self.oracle.table_name(entity)?;
        let key = self.key_properties(entity)?;
        let mut names = ParameterNamer::default();
        let mut parameters = Parameters::new();
        let mut assignments = Vec::new();

        for (column, property) in self.oracle.mapped_columns(entity)? {
            if key.contains(&property) || self.oracle.is_identity_column(entity, property)? {
                continue;
            }
            let name = names.next(column);
            assignments.push(format!("{} = {name}", self.dialect.quote(column)));
            parameters.bind(name, record.value(property));
        }
        if assignments.is_empty() {
            return Err(CoreError::invalid_operation(format!(
                "entity {entity} has no updatable columns"
            )));
        }

        let filter = self.key_filter(entity, &key, record, &mut names, &mut parameters)?;
        let sql = format!(
            "UPDATE {} SET {} WHERE {filter}",
            self.dialect.quote(table),
            assignments.join(", ")
        );
        Ok(Command::with_parameters(sql, parameters))
    }

    /// Compiles a DELETE keyed on the primary key.
    pub fn build_delete(&self, entity: &str, record: &Record) -> CoreResult<Command> {
        let table = self.oracle.table_name(entity)?;
        let key = self.key_properties(entity)?;
        let mut names = ParameterNamer::default();
        let mut parameters = Parameters::new();
        let filter = self.key_filter(entity, &key, record, &mut names, &mut parameters)?;
        let sql = format!("DELETE FROM {} WHERE {filter}", self.dialect.quote(table));
        Ok(Command::with_parameters(sql, parameters))
    }

    /// Compiles the `SELECT *` existence check for one entity.
    pub fn build_existence_check(&self, entity: &str, record: &Record) -> CoreResult<Command> {
        let table = self.oracle.table_name(entity)?;
        let key = self.key_properties(entity)?;
        let mut names = ParameterNamer::default();
        let mut parameters = Parameters::new();
        let filter = self.key_filter(entity, &key, record, &mut names, &mut parameters)?;
        let sql = format!("SELECT * FROM {} WHERE {filter}", self.dialect.quote(table));
        Ok(Command::with_parameters(sql, parameters))
    }

    /// The dialect's identity retrieval query.
    #[must_use]
    pub fn build_last_insert_id(&self) -> Command {
        Command::new(self.dialect.last_insert_id())
    }

    /// Primary-key values of a record, joined with `:`.
    pub fn key_string(&self, entity: &str, record: &Record) -> CoreResult<String> {
        let key = self.oracle.primary_key_properties(entity)?;
        Ok(key
            .iter()
            .map(|p| record.value(p).to_string())
            .collect::<Vec<_>>()
            .join(":"))
    }

    fn key_properties(&self, entity: &str) -> CoreResult<Vec<&str>> {
        let key = self.oracle.primary_key_properties(entity)?;
        if key.is_empty() {
            return Err(CoreError::missing_primary_key(entity));
        }
        Ok(key)
    }

    fn key_filter(
        &self,
        entity: &str,
        key: &[&str],
        record: &Record,
        names: &mut ParameterNamer,
        parameters: &mut Parameters,
    ) -> CoreResult<String> {
        let mut terms = Vec::with_capacity(key.len());
        for property in key {
            let column = self.oracle.column_name(entity, property)?;
            let name = names.next(column);
            terms.push(format!("{} = {name}", self.dialect.quote(column)));
            parameters.bind(name, record.get(property).cloned().unwrap_or(Value::Null));
        }
        Ok(terms.join(" AND "))
    }
}
