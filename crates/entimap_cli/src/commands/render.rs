//! Render command implementation.

use super::schema::load_catalog;
use entimap_codec::Value;
use entimap_core::{
    Catalog, ConventionOracle, DialectKind, Projection, QueryBuilder, QueryOptions, Record,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// Statements the CLI can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Entity SELECT, with joins and paging.
    Select,
    /// `SELECT COUNT(*)`.
    Count,
    /// INSERT of one entity.
    Insert,
    /// UPDATE keyed on the primary key.
    Update,
    /// DELETE keyed on the primary key.
    Delete,
}

impl FromStr for StatementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "select" => Ok(Self::Select),
            "count" => Ok(Self::Count),
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!(
                "Unknown statement {other:?} (expected select, count, insert, update or delete)"
            )),
        }
    }
}

/// One bound parameter.
#[derive(Debug, Serialize, PartialEq)]
pub struct RenderedParameter {
    /// Placeholder, including the `@` prefix.
    pub name: String,
    /// Bound value.
    pub value: Value,
}

/// A compiled statement ready for printing.
#[derive(Debug, Serialize)]
pub struct Rendered {
    /// SQL text.
    pub sql: String,
    /// Parameters in binding order.
    pub parameters: Vec<RenderedParameter>,
    /// Counter column of a paged SELECT.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_alias: Option<String>,
    /// Navigations joined by a SELECT.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub joined: Vec<String>,
}

/// Compiles one statement.
///
/// `input` is the JSON text of a [`QueryOptions`] for `select`/`count`, or
/// an object of property values for the mutations. Missing input means
/// default options or an empty entity.
pub fn render(
    catalog: Catalog,
    dialect: DialectKind,
    kind: StatementKind,
    entity: &str,
    input: Option<&str>,
) -> Result<Rendered, Box<dyn std::error::Error>> {
    let oracle = ConventionOracle::new(catalog);
    let builder = QueryBuilder::new(&oracle, dialect.dialect());

    let rendered = match kind {
        StatementKind::Select | StatementKind::Count => {
            let options: QueryOptions = match input {
                Some(text) => serde_json::from_str(text)?,
                None => QueryOptions::new(),
            };
            let statement = if kind == StatementKind::Select {
                builder.build_select(entity, &options, &Projection::Entity)?
            } else {
                builder.build_count(entity, &options)?
            };
            Rendered {
                parameters: parameters_of(statement.parameters.iter()),
                sql: statement.sql,
                counter_alias: statement.counter_alias,
                joined: statement.navigations.into_iter().map(|n| n.property).collect(),
            }
        }
        StatementKind::Insert | StatementKind::Update | StatementKind::Delete => {
            let values: BTreeMap<String, Value> = match input {
                Some(text) => serde_json::from_str(text)?,
                None => BTreeMap::new(),
            };
            let mut record = Record::new(entity);
            for (property, value) in values {
                record.set(property, value);
            }
            let command = match kind {
                StatementKind::Insert => builder.build_insert(entity, &record)?,
                StatementKind::Update => builder.build_update(entity, &record)?,
                _ => builder.build_delete(entity, &record)?,
            };
            Rendered {
                parameters: parameters_of(command.parameters.iter()),
                sql: command.sql,
                counter_alias: None,
                joined: Vec::new(),
            }
        }
    };
    tracing::debug!(?kind, entity, parameters = rendered.parameters.len(), "rendered");
    Ok(rendered)
}

fn parameters_of<'a>(iter: impl Iterator<Item = (&'a str, &'a Value)>) -> Vec<RenderedParameter> {
    iter.map(|(name, value)| RenderedParameter {
        name: name.to_string(),
        value: value.clone(),
    })
    .collect()
}

/// Runs the render command.
pub fn run(
    schema: &Path,
    dialect: DialectKind,
    statement: &str,
    entity: &str,
    input: Option<&Path>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let kind: StatementKind = statement.parse()?;
    let catalog = load_catalog(schema)?;
    let input = input
        .map(|path| {
            std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read input {}: {e}", path.display()))
        })
        .transpose()?;

    let rendered = render(catalog, dialect, kind, entity, input.as_deref())?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
        _ => {
            println!("{}", rendered.sql);
            for parameter in &rendered.parameters {
                println!("  {} = {}", parameter.name, describe(&parameter.value));
            }
            if let Some(alias) = &rendered.counter_alias {
                println!("  total count column: {alias}");
            }
            if !rendered.joined.is_empty() {
                println!("  joined: {}", rendered.joined.join(", "));
            }
        }
    }

    Ok(())
}

fn describe(value: &Value) -> String {
    match value {
        Value::Text(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::schema::tests::schema_file;
    use std::io::Write;

    fn catalog() -> Catalog {
        let file = schema_file();
        load_catalog(file.path()).unwrap()
    }

    #[test]
    fn parses_statement_kinds() {
        assert_eq!("SELECT".parse::<StatementKind>(), Ok(StatementKind::Select));
        assert_eq!("delete".parse::<StatementKind>(), Ok(StatementKind::Delete));
        assert!("merge".parse::<StatementKind>().is_err());
    }

    #[test]
    fn select_from_json_options() {
        let options = r#"{
            "predicate": { "Method": { "kind": "Contains", "target": { "name": "Name" }, "literal": "an" } },
            "page_index": 2,
            "page_size": 10,
            "auto_eager_load": false
        }"#;
        let rendered = render(
            catalog(),
            DialectKind::SqlServer,
            StatementKind::Select,
            "Customer",
            Some(options),
        )
        .unwrap();

        assert!(rendered.sql.starts_with("SELECT [T1].[Id] AS [Id], [T1].[Name] AS [Name], [T2].[C1]"));
        assert!(rendered.sql.ends_with("OFFSET 10 ROWS FETCH NEXT 10 ROWS ONLY"));
        assert_eq!(rendered.counter_alias.as_deref(), Some("C1"));
        assert_eq!(
            rendered.parameters,
            vec![RenderedParameter {
                name: "@Name".into(),
                value: Value::from("%an%"),
            }]
        );
    }

    #[test]
    fn default_select_joins_navigations() {
        let rendered = render(
            catalog(),
            DialectKind::Sqlite,
            StatementKind::Select,
            "Customer",
            None,
        )
        .unwrap();
        assert_eq!(rendered.joined, vec!["Orders".to_string()]);
        assert!(rendered.sql.contains("LEFT OUTER JOIN [Order] AS [T2]"));
        assert!(rendered.sql.contains("[T2].[OrderTotal] AS [OrderTotal]"));
    }

    #[test]
    fn mutations_from_json_values() {
        let rendered = render(
            catalog(),
            DialectKind::SqlServer,
            StatementKind::Insert,
            "Order",
            Some(r#"{ "Id": 0, "CustomerId": 4, "Total": 12.5 }"#),
        )
        .unwrap();
        assert_eq!(
            rendered.sql,
            "INSERT INTO [Order] ([CustomerId], [OrderTotal]) VALUES (@CustomerId, @OrderTotal)"
        );
        assert_eq!(rendered.parameters[1].value, Value::Float(12.5));

        let rendered = render(
            catalog(),
            DialectKind::SqlServer,
            StatementKind::Delete,
            "Customer",
            Some(r#"{ "Id": 9 }"#),
        )
        .unwrap();
        assert_eq!(rendered.sql, "DELETE FROM [Customers] WHERE [Id] = @Id");
    }

    #[test]
    fn keyless_updates_are_rejected() {
        let err = render(
            catalog(),
            DialectKind::SqlServer,
            StatementKind::Update,
            "AuditEntry",
            Some(r#"{ "Message": "hi" }"#),
        )
        .unwrap_err();
        assert!(err.to_string().contains("AuditEntry"));
    }

    #[test]
    fn run_reads_input_files() {
        let schema = schema_file();
        let mut input = tempfile::NamedTempFile::new().unwrap();
        input.write_all(br#"{ "auto_eager_load": false }"#).unwrap();

        run(
            schema.path(),
            DialectKind::SqlServer,
            "count",
            "Customer",
            Some(input.path()),
            "json",
        )
        .unwrap();
        assert!(run(
            schema.path(),
            DialectKind::SqlServer,
            "count",
            "Customer",
            Some(Path::new("/nonexistent/options.json")),
            "text",
        )
        .is_err());
    }
}
