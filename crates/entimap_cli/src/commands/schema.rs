//! Schema loading and the entities command.

use entimap_core::{Catalog, ConventionOracle, EntityDescriptor, MetadataOracle};
use serde::Serialize;
use std::path::Path;

/// Summary of one entity as the oracle sees it.
#[derive(Debug, Serialize)]
pub struct EntitySummary {
    /// Entity name.
    pub name: String,
    /// Table name.
    pub table: String,
    /// Primary key properties; empty for keyless entities.
    pub primary_key: Vec<String>,
    /// Mapped `(column, property)` pairs.
    pub columns: Vec<(String, String)>,
    /// Navigation property names.
    pub navigations: Vec<String>,
}

/// Reads a JSON array of entity descriptors into a catalog.
pub fn load_catalog(path: &Path) -> Result<Catalog, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read schema {}: {e}", path.display()))?;
    let descriptors: Vec<EntityDescriptor> = serde_json::from_str(&text)?;
    tracing::debug!(entities = descriptors.len(), path = %path.display(), "schema loaded");

    let mut catalog = Catalog::new();
    for descriptor in descriptors {
        catalog.register(descriptor);
    }
    Ok(catalog)
}

/// Summarizes every entity of a catalog.
pub fn summarize(oracle: &ConventionOracle) -> Result<Vec<EntitySummary>, Box<dyn std::error::Error>> {
    let mut summaries = Vec::new();
    for descriptor in oracle.catalog().iter() {
        let name = descriptor.name.as_str();
        summaries.push(EntitySummary {
            name: name.to_string(),
            table: oracle.table_name(name)?.to_string(),
            primary_key: oracle
                .primary_key_properties(name)?
                .into_iter()
                .map(str::to_string)
                .collect(),
            columns: oracle
                .mapped_columns(name)?
                .into_iter()
                .map(|(column, property)| (column.to_string(), property.to_string()))
                .collect(),
            navigations: descriptor
                .navigations
                .iter()
                .map(|n| n.property.clone())
                .collect(),
        });
    }
    Ok(summaries)
}

/// Runs the entities command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let oracle = ConventionOracle::new(load_catalog(path)?);
    let summaries = summarize(&oracle)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        _ => {
            for summary in &summaries {
                println!("{} -> [{}]", summary.name, summary.table);
                if summary.primary_key.is_empty() {
                    println!("  key: (none)");
                } else {
                    println!("  key: {}", summary.primary_key.join(", "));
                }
                for (column, property) in &summary.columns {
                    if column == property {
                        println!("  {column}");
                    } else {
                        println!("  {column} ({property})");
                    }
                }
                for navigation in &summary.navigations {
                    println!("  -> {navigation}");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const SCHEMA: &str = r#"[
        {
            "name": "Customer",
            "table": "Customers",
            "columns": [
                { "property": "Id", "primary_key": true, "identity": true },
                { "property": "Name" }
            ],
            "navigations": [
                { "property": "Orders", "target": "Order", "cardinality": "Many" }
            ]
        },
        {
            "name": "Order",
            "columns": [
                { "property": "Id", "primary_key": true, "identity": true },
                { "property": "CustomerId", "references": "Customer" },
                { "property": "Total", "column": "OrderTotal" }
            ]
        },
        {
            "name": "AuditEntry",
            "columns": [{ "property": "Message" }]
        }
    ]"#;

    pub(crate) fn schema_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCHEMA.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_descriptors_with_defaults() {
        let file = schema_file();
        let catalog = load_catalog(file.path()).unwrap();
        assert_eq!(catalog.len(), 3);

        let order = catalog.get("Order").unwrap();
        assert_eq!(order.table_name(), "Order");
        assert_eq!(order.columns[0].column_name(), "Id");
        assert_eq!(order.columns[2].column_name(), "OrderTotal");
    }

    #[test]
    fn summaries_follow_the_oracle() {
        let file = schema_file();
        let oracle = ConventionOracle::new(load_catalog(file.path()).unwrap());
        let summaries = summarize(&oracle).unwrap();

        let customer = summaries.iter().find(|s| s.name == "Customer").unwrap();
        assert_eq!(customer.table, "Customers");
        assert_eq!(customer.primary_key, vec!["Id".to_string()]);
        assert_eq!(customer.navigations, vec!["Orders".to_string()]);

        let audit = summaries.iter().find(|s| s.name == "AuditEntry").unwrap();
        assert!(audit.primary_key.is_empty());
    }

    #[test]
    fn malformed_schema_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(load_catalog(file.path()).is_err());
        assert!(load_catalog(Path::new("/nonexistent/schema.json")).is_err());
    }
}
