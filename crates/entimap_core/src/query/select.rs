//! SELECT compilation.

use super::alias::AliasTable;
use super::dialect::Dialect;
use super::options::{QueryOptions, SortDirection, SortKey};
use super::QueryBuilder;
use crate::error::{CoreError, CoreResult};
use crate::metadata::{Cardinality, NavigationDescriptor};
use crate::predicate::{prop, translate, AliasResolver, PropertyRef, ResolvedColumn};
use entimap_driver::{Command, Parameters};

/// What a SELECT returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    /// Every mapped column of the entity and its eager-loaded navigations.
    #[default]
    Entity,
    /// Explicit select-list expressions. Joins, sorting and paging are
    /// skipped.
    Columns(Vec<String>),
}

/// A navigation joined into a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationLink {
    /// Navigation property on the owner.
    pub property: String,
    /// One or many.
    pub cardinality: Cardinality,
    /// Owning entity.
    pub owner: String,
    /// Related entity.
    pub related: String,
    /// Alias-table index of the related table.
    pub table: usize,
    /// Property on the related entity pointing back at the owner.
    pub foreign_key: String,
    /// Primary-key properties of the related entity.
    pub related_key: Vec<String>,
}

/// A compiled SELECT.
#[derive(Debug, Clone)]
pub struct SelectStatement {
    /// Queried entity.
    pub entity: String,
    /// SQL text.
    pub sql: String,
    /// Bound parameters.
    pub parameters: Parameters,
    /// Eager-loaded navigations.
    pub navigations: Vec<NavigationLink>,
    /// Alias bookkeeping.
    pub aliases: AliasTable,
    /// Alias of the total-count column, when the statement is paged.
    pub counter_alias: Option<String>,
    /// Primary-key properties of the queried entity.
    pub primary_key: Vec<String>,
}

impl SelectStatement {
    /// The statement as a driver command.
    #[must_use]
    pub fn command(&self) -> Command {
        Command::with_parameters(self.sql.clone(), self.parameters.clone())
    }
}

/// Resolves predicate and sort properties against a statement's aliases.
struct StatementResolver<'a> {
    builder: &'a QueryBuilder<'a>,
    aliases: &'a AliasTable,
    links: &'a [NavigationLink],
}

impl StatementResolver<'_> {
    fn table_index(&self, owner: Option<&str>) -> CoreResult<usize> {
        let Some(owner) = owner else {
            return Ok(0);
        };
        if let Some(link) = self
            .links
            .iter()
            .find(|l| l.property == owner || l.related == owner)
        {
            return Ok(link.table);
        }
        match self.aliases.table(0) {
            Some(root) if root.entity == owner => Ok(0),
            _ => Err(CoreError::invalid_operation(format!(
                "{owner} is not joined in this query"
            ))),
        }
    }
}

impl AliasResolver for StatementResolver<'_> {
    fn table_alias(&self, owner: Option<&str>) -> CoreResult<String> {
        let index = self.table_index(owner)?;
        self.aliases
            .table(index)
            .map(|t| t.alias.clone())
            .ok_or_else(|| CoreError::invalid_operation("statement has no root table"))
    }

    fn column(&self, property: &PropertyRef) -> CoreResult<ResolvedColumn> {
        let index = self.table_index(property.owner.as_deref())?;
        let table = self
            .aliases
            .table(index)
            .ok_or_else(|| CoreError::invalid_operation("statement has no root table"))?;
        let column = self
            .builder
            .oracle
            .column_name(&table.entity, &property.name)?;
        let column_alias = self
            .aliases
            .column_index(index, column)
            .map_or_else(|| column.to_string(), |i| self.aliases.columns()[i].alias.clone());
        Ok(ResolvedColumn {
            table_alias: table.alias.clone(),
            column: column.to_string(),
            column_alias,
        })
    }

    fn quote(&self, ident: &str) -> String {
        self.builder.dialect.quote(ident)
    }
}

impl QueryBuilder<'_> {
    /// Compiles a SELECT for `entity`.
    ///
    /// With [`Projection::Entity`] every mapped column is selected under a
    /// generated alias, eager-loaded navigations are joined, rows are sorted
    /// (by the primary key when no sort key is given) and, when a page size
    /// is set, paged with a total-count column computed before the page is
    /// applied.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidPage`] for a page index below 1
    /// - [`CoreError::MissingPrimaryKey`] when paging a keyless entity
    ///   without sort keys
    /// - translation errors from the predicate
    pub fn build_select(
        &self,
        entity: &str,
        options: &QueryOptions,
        projection: &Projection,
    ) -> CoreResult<SelectStatement> {
        options.validate()?;
        let (primary_key, mut aliases) = self.root_aliases(entity)?;

        let custom = matches!(projection, Projection::Columns(_));
        let navigations = if custom {
            Vec::new()
        } else {
            self.resolve_navigations(entity, &primary_key, options, &mut aliases)?
        };
        let paged = !custom && options.is_paged();
        let counter = if paged {
            Some((aliases.reserve_table_alias(), aliases.reserve_column_alias("C")))
        } else {
            None
        };

        let resolver = StatementResolver {
            builder: self,
            aliases: &aliases,
            links: &navigations,
        };
        let filter = options
            .predicate
            .as_ref()
            .map(|p| translate(p, &resolver))
            .transpose()?;
        let where_clause = filter
            .as_ref()
            .map(|t| format!(" WHERE {}", t.sql))
            .unwrap_or_default();
        let from = self.from_clause(&aliases, &navigations)?;

        let mut select_list = match projection {
            Projection::Entity => aliases
                .columns()
                .iter()
                .filter_map(|c| {
                    let table = aliases.table(c.table)?;
                    Some(format!(
                        "{} AS {}",
                        qualified(self.dialect, &table.alias, &c.column),
                        self.dialect.quote(&c.alias)
                    ))
                })
                .collect::<Vec<_>>(),
            Projection::Columns(columns) => columns.clone(),
        };
        if let Some((table_alias, column_alias)) = &counter {
            select_list.push(qualified(self.dialect, table_alias, column_alias));
        }

        let mut sql = format!("SELECT {} FROM {from}", select_list.join(", "));
        if let Some((table_alias, column_alias)) = &counter {
            let count = self.count_expression(&aliases, &primary_key, &navigations)?;
            sql.push_str(&format!(
                " CROSS JOIN (SELECT {count} AS {} FROM {from}{where_clause}) AS {}",
                self.dialect.quote(column_alias),
                self.dialect.quote(table_alias)
            ));
        }
        sql.push_str(&where_clause);

        if !custom {
            let default_keys: Vec<SortKey>;
            let keys = if options.sort_keys.is_empty() {
                default_keys = primary_key
                    .iter()
                    .map(|p| SortKey {
                        property: prop(p.as_str()),
                        direction: SortDirection::Asc,
                    })
                    .collect();
                &default_keys
            } else {
                &options.sort_keys
            };
            if keys.is_empty() && paged {
                return Err(CoreError::missing_primary_key(entity));
            }
            if !keys.is_empty() {
                let rendered = keys
                    .iter()
                    .map(|key| {
                        let column = resolver.column(&key.property)?;
                        Ok(format!(
                            "{} {}",
                            qualified(self.dialect, &column.table_alias, &column.column),
                            key.direction.sql()
                        ))
                    })
                    .collect::<CoreResult<Vec<_>>>()?;
                sql.push_str(" ORDER BY ");
                sql.push_str(&rendered.join(", "));
            }
        }

        if let Some(size) = options.page_size.filter(|_| paged) {
            sql.push(' ');
            sql.push_str(&self.dialect.paging_clause(options.offset(), u64::from(size)));
        }

        tracing::trace!(entity, sql = %sql, "compiled select");
        Ok(SelectStatement {
            entity: entity.to_string(),
            sql,
            parameters: filter.map(|t| t.parameters).unwrap_or_default(),
            navigations,
            aliases,
            counter_alias: counter.map(|(_, column)| column),
            primary_key,
        })
    }

    /// Compiles `SELECT COUNT(*)` over the filtered entity.
    pub fn build_count(&self, entity: &str, options: &QueryOptions) -> CoreResult<SelectStatement> {
        self.build_select(entity, options, &Projection::Columns(vec!["COUNT(*)".into()]))
    }

    /// Compiles the stand-alone total count of a paged entity SELECT.
    ///
    /// The same navigations are joined as in [`build_select`](Self::build_select)
    /// with [`Projection::Entity`], so filters over joined properties resolve,
    /// and owners are counted the way the in-statement counter counts them.
    /// Sorting and paging are dropped.
    pub fn build_total_count(&self, entity: &str, options: &QueryOptions) -> CoreResult<SelectStatement> {
        options.validate()?;
        let (primary_key, mut aliases) = self.root_aliases(entity)?;
        let navigations = self.resolve_navigations(entity, &primary_key, options, &mut aliases)?;
        let resolver = StatementResolver {
            builder: self,
            aliases: &aliases,
            links: &navigations,
        };
        let filter = options
            .predicate
            .as_ref()
            .map(|p| translate(p, &resolver))
            .transpose()?;
        let count = self.count_expression(&aliases, &primary_key, &navigations)?;
        let mut sql = format!("SELECT {count} FROM {}", self.from_clause(&aliases, &navigations)?);
        if let Some(filter) = &filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.sql);
        }

        tracing::trace!(entity, sql = %sql, "compiled total count");
        Ok(SelectStatement {
            entity: entity.to_string(),
            sql,
            parameters: filter.map(|t| t.parameters).unwrap_or_default(),
            navigations,
            aliases,
            counter_alias: None,
            primary_key,
        })
    }

    /// Compiles a SELECT whose first row, if any, proves a match exists.
    pub fn build_exists(&self, entity: &str, options: &QueryOptions) -> CoreResult<SelectStatement> {
        self.build_select(entity, options, &Projection::Columns(vec!["1".into()]))
    }

    /// Primary-key properties and an alias table holding the root columns.
    fn root_aliases(&self, entity: &str) -> CoreResult<(Vec<String>, AliasTable)> {
        let table = self.oracle.table_name(entity)?;
        let primary_key: Vec<String> = self
            .oracle
            .primary_key_properties(entity)?
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut aliases = AliasTable::new();
        let root = aliases.add_table(table, entity);
        for (column, property) in self.oracle.mapped_columns(entity)? {
            aliases.add_column(root, column, property);
        }
        Ok((primary_key, aliases))
    }

    fn count_expression(
        &self,
        aliases: &AliasTable,
        primary_key: &[String],
        navigations: &[NavigationLink],
    ) -> CoreResult<String> {
        match (navigations.is_empty(), primary_key) {
            (false, [key]) => {
                let root = aliases
                    .table(0)
                    .ok_or_else(|| CoreError::invalid_operation("statement has no root table"))?;
                let column = self.oracle.column_name(&root.entity, key)?;
                Ok(format!(
                    "COUNT(DISTINCT {})",
                    qualified(self.dialect, &root.alias, column)
                ))
            }
            _ => Ok("COUNT(*)".to_string()),
        }
    }

    fn from_clause(&self, aliases: &AliasTable, navigations: &[NavigationLink]) -> CoreResult<String> {
        let root = aliases
            .table(0)
            .ok_or_else(|| CoreError::invalid_operation("statement has no root table"))?;
        let mut from = format!(
            "{} AS {}",
            self.dialect.quote(&root.table),
            self.dialect.quote(&root.alias)
        );
        for link in navigations {
            let Some(related) = aliases.table(link.table) else {
                continue;
            };
            let owner_key = self.oracle.primary_key_properties(&link.owner)?;
            let owner_key = owner_key
                .first()
                .ok_or_else(|| CoreError::missing_primary_key(link.owner.as_str()))?;
            let owner_column = self.oracle.column_name(&link.owner, owner_key)?;
            let fk_column = self.oracle.column_name(&link.related, &link.foreign_key)?;
            from.push_str(&format!(
                " LEFT OUTER JOIN {} AS {} ON {} = {}",
                self.dialect.quote(&related.table),
                self.dialect.quote(&related.alias),
                qualified(self.dialect, &root.alias, owner_column),
                qualified(self.dialect, &related.alias, fk_column)
            ));
        }
        Ok(from)
    }

    /// Picks the navigations to join and registers their tables and columns.
    ///
    /// A navigation is joined only when the relationship is provable: the
    /// owner has a single-column key, the related entity has a key and a
    /// foreign key back to the owner, and its table is not already part of
    /// the statement. Anything else is skipped.
    fn resolve_navigations(
        &self,
        owner: &str,
        owner_key: &[String],
        options: &QueryOptions,
        aliases: &mut AliasTable,
    ) -> CoreResult<Vec<NavigationLink>> {
        let declared = self.oracle.navigations(owner)?;
        let requested: Vec<&NavigationDescriptor> = if options.eager_load.is_empty() {
            if !options.auto_eager_load {
                return Ok(Vec::new());
            }
            declared.iter().collect()
        } else {
            options
                .eager_load
                .iter()
                .filter_map(|path| {
                    let found = declared.iter().find(|n| n.property == *path);
                    if found.is_none() {
                        tracing::debug!(owner, path = %path, "eager-load path is not a navigation, skipped");
                    }
                    found
                })
                .collect()
        };
        if requested.is_empty() {
            return Ok(Vec::new());
        }
        if owner_key.len() != 1 {
            tracing::debug!(owner, "owner key is not a single column, eager loading skipped");
            return Ok(Vec::new());
        }

        let mut links = Vec::new();
        for navigation in requested {
            let Ok(descriptor) = self.oracle.descriptor(&navigation.target) else {
                tracing::debug!(owner, navigation = %navigation.property, "unknown target, skipped");
                continue;
            };
            let related_key: Vec<String> = self
                .oracle
                .primary_key_properties(&navigation.target)?
                .into_iter()
                .map(str::to_string)
                .collect();
            let foreign_key = self.oracle.foreign_key_property(&navigation.target, owner)?;
            let related_table = descriptor.table_name();
            let skip = if related_key.is_empty() {
                Some("target has no primary key")
            } else if foreign_key.is_none() {
                Some("target has no foreign key to owner")
            } else if aliases.table_index(related_table).is_some() {
                Some("table already joined")
            } else {
                None
            };
            if let Some(reason) = skip {
                tracing::debug!(owner, navigation = %navigation.property, reason, "navigation skipped");
                continue;
            }
            let Some(foreign_key) = foreign_key else {
                continue;
            };

            let table = aliases.add_table(related_table, &navigation.target);
            for (column, property) in self.oracle.mapped_columns(&navigation.target)? {
                aliases.add_column(table, column, property);
            }
            links.push(NavigationLink {
                property: navigation.property.clone(),
                cardinality: navigation.cardinality,
                owner: owner.to_string(),
                related: navigation.target.clone(),
                table,
                foreign_key: foreign_key.to_string(),
                related_key,
            });
        }
        Ok(links)
    }
}

/// Quoted `[alias].[column]` pair.
pub(crate) fn qualified(dialect: &dyn Dialect, alias: &str, column: &str) -> String {
    format!("{}.{}", dialect.quote(alias), dialect.quote(column))
}
