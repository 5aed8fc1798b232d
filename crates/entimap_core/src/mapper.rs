//! Result mapping: reader rows back into entities.
//!
//! Statements without joins stream, one entity per row. Statements with
//! eager-loaded navigations buffer: a one-to-many join repeats the owner
//! row once per related row, so owners are merged by primary key in an
//! arena and yielded in first-seen order once the reader is exhausted.

use crate::error::{CoreError, CoreResult};
use crate::metadata::{Cardinality, Entity, Record};
use crate::query::SelectStatement;
use entimap_codec::{FromValue, Value};
use entimap_driver::{Row, RowSet};
use std::collections::{HashMap, HashSet};

/// What a reader column is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Main(String),
    Related { link: usize, property: String },
    Counter,
    Ignore,
}

#[derive(Debug, Clone)]
struct LinkPlan {
    property: String,
    cardinality: Cardinality,
    related: String,
    foreign_key: Option<usize>,
    key: Vec<usize>,
}

/// Per-reader mapping plan, computed once from the reader's column names.
#[derive(Debug, Clone)]
struct RowPlan {
    targets: Vec<Target>,
    key: Vec<usize>,
    links: Vec<LinkPlan>,
    counter: Option<usize>,
}

impl RowPlan {
    fn for_statement<T: Entity>(columns: &[String], statement: &SelectStatement) -> Self {
        let descriptor = T::descriptor();
        let targets: Vec<Target> = columns
            .iter()
            .map(|name| {
                if statement.counter_alias.as_deref() == Some(name.as_str()) {
                    return Target::Counter;
                }
                match statement.aliases.column_by_alias(name) {
                    Some(slot) if slot.table == 0 => Target::Main(slot.property.clone()),
                    Some(slot) => statement
                        .navigations
                        .iter()
                        .position(|l| l.table == slot.table)
                        .map_or(Target::Ignore, |link| Target::Related {
                            link,
                            property: slot.property.clone(),
                        }),
                    None => descriptor
                        .column_by_name(name)
                        .map_or(Target::Ignore, |c| Target::Main(c.property.clone())),
                }
            })
            .collect();

        let key = main_ordinals(&targets, &statement.primary_key);
        let links = statement
            .navigations
            .iter()
            .enumerate()
            .map(|(index, link)| {
                let related_property = |t: &Target| match t {
                    Target::Related { link, property } if *link == index => Some(property.clone()),
                    _ => None,
                };
                LinkPlan {
                    property: link.property.clone(),
                    cardinality: link.cardinality,
                    related: link.related.clone(),
                    foreign_key: targets
                        .iter()
                        .position(|t| related_property(t).as_deref() == Some(link.foreign_key.as_str())),
                    key: link
                        .related_key
                        .iter()
                        .filter_map(|k| {
                            targets
                                .iter()
                                .position(|t| related_property(t).as_deref() == Some(k.as_str()))
                        })
                        .collect(),
                }
            })
            .collect();
        let counter = targets.iter().position(|t| *t == Target::Counter);
        Self {
            targets,
            key,
            links,
            counter,
        }
    }

    /// Plan for a hand-written query: columns match by column or property name.
    fn raw<T: Entity>(columns: &[String]) -> Self {
        let descriptor = T::descriptor();
        let targets: Vec<Target> = columns
            .iter()
            .map(|name| {
                descriptor
                    .column_by_name(name)
                    .or_else(|| descriptor.column_by_property(name))
                    .map_or(Target::Ignore, |c| Target::Main(c.property.clone()))
            })
            .collect();
        Self {
            targets,
            key: Vec::new(),
            links: Vec::new(),
            counter: None,
        }
    }

    fn fill<T: Entity>(&self, entity: &mut T, row: &Row) -> CoreResult<()> {
        for (ordinal, target) in self.targets.iter().enumerate() {
            let Target::Main(property) = target else {
                continue;
            };
            let Some(value) = row.value(ordinal).filter(|v| !v.is_null()) else {
                continue;
            };
            entity
                .set(property, value)
                .map_err(|e| CoreError::conversion(column_name(row, ordinal), e))?;
        }
        Ok(())
    }

    /// Row identity: key values joined with `:`, `None` when any is missing.
    fn identity(&self, row: &Row) -> Option<String> {
        identity_of(&self.key, row)
    }

    fn related_record(&self, link: usize, row: &Row) -> Option<Record> {
        let plan = &self.links[link];
        let mut record = Record::new(plan.related.clone());
        for (ordinal, target) in self.targets.iter().enumerate() {
            if let Target::Related { link: l, property } = target {
                if *l != link {
                    continue;
                }
                if let Some(value) = row.value(ordinal).filter(|v| !v.is_null()) {
                    record.set(property.clone(), value.clone());
                }
            }
        }
        (!record.is_empty()).then_some(record)
    }

    /// Whether the related row's foreign key equals the owner's key.
    fn belongs_to_owner(&self, link: usize, row: &Row) -> bool {
        let (Some(fk), [owner_key]) = (self.links[link].foreign_key, self.key.as_slice()) else {
            return false;
        };
        match (row.value(fk), row.value(*owner_key)) {
            (Some(fk), Some(pk)) => fk.key_eq(pk),
            _ => false,
        }
    }

    fn read_counter(&self, row: &Row) -> CoreResult<Option<u64>> {
        let Some(ordinal) = self.counter else {
            return Ok(None);
        };
        match row.value(ordinal) {
            Some(value) if !value.is_null() => u64::from_value(value)
                .map(Some)
                .map_err(|e| CoreError::conversion(column_name(row, ordinal), e)),
            _ => Ok(None),
        }
    }
}

fn main_ordinals(targets: &[Target], properties: &[String]) -> Vec<usize> {
    properties
        .iter()
        .filter_map(|p| {
            targets
                .iter()
                .position(|t| matches!(t, Target::Main(m) if m == p))
        })
        .collect()
}

fn identity_of(ordinals: &[usize], row: &Row) -> Option<String> {
    if ordinals.is_empty() {
        return None;
    }
    let mut parts = Vec::with_capacity(ordinals.len());
    for &ordinal in ordinals {
        match row.value(ordinal) {
            Some(value) if !value.is_null() => parts.push(value.to_string()),
            _ => return None,
        }
    }
    Some(parts.join(":"))
}

fn column_name(row: &Row, ordinal: usize) -> String {
    row.column_name(ordinal).unwrap_or_default().to_string()
}

enum State<'c, T> {
    Streaming {
        rows: RowSet<'c>,
        plan: RowPlan,
        first: bool,
    },
    Buffered(std::vec::IntoIter<T>),
    Done,
}

/// Entities mapped from one reader.
///
/// Forward-only and single-pass. [`total_count`](Self::total_count) is final
/// once the iterator is exhausted.
pub struct MappedRows<'c, T> {
    state: State<'c, T>,
    total: Option<u64>,
    yielded: u64,
}

impl<'c, T: Entity> MappedRows<'c, T> {
    /// Maps a reader produced by `statement`.
    ///
    /// Statements with navigation links consume the whole reader before
    /// returning.
    pub fn new(rows: RowSet<'c>, statement: &SelectStatement) -> CoreResult<Self> {
        let plan = RowPlan::for_statement::<T>(rows.columns(), statement);
        if statement.navigations.is_empty() {
            return Ok(Self {
                state: State::Streaming {
                    rows,
                    plan,
                    first: true,
                },
                total: None,
                yielded: 0,
            });
        }
        let (entities, total) = buffer(rows, &plan)?;
        Ok(Self {
            state: State::Buffered(entities.into_iter()),
            total,
            yielded: 0,
        })
    }

    /// Maps a hand-written query's reader by column name.
    pub fn raw(rows: RowSet<'c>) -> Self {
        let plan = RowPlan::raw::<T>(rows.columns());
        Self {
            state: State::Streaming {
                rows,
                plan,
                first: false,
            },
            total: None,
            yielded: 0,
        }
    }

    /// Total matching rows: the paging counter when the statement carried
    /// one, else the number of entities yielded so far.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.total.unwrap_or(self.yielded)
    }

    /// Applies a projection to every entity.
    pub fn project<R, F>(self, mut selector: F) -> impl Iterator<Item = CoreResult<R>> + 'c
    where
        F: FnMut(T) -> R + 'c,
    {
        self.map(move |entity| entity.map(&mut selector))
    }

    fn next_streamed(&mut self) -> Option<CoreResult<T>> {
        let State::Streaming { rows, plan, first } = &mut self.state else {
            return None;
        };
        let row = match rows.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e.into())),
        };
        if std::mem::take(first) {
            match plan.read_counter(&row) {
                Ok(total) => self.total = total,
                Err(e) => return Some(Err(e)),
            }
        }
        let mut entity = T::default();
        Some(plan.fill(&mut entity, &row).map(|()| entity))
    }
}

impl<T: Entity> Iterator for MappedRows<'_, T> {
    type Item = CoreResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = match &mut self.state {
            State::Streaming { .. } => self.next_streamed(),
            State::Buffered(entities) => entities.next().map(Ok),
            State::Done => None,
        };
        match &item {
            Some(Ok(_)) => self.yielded += 1,
            Some(Err(_)) | None => self.state = State::Done,
        }
        item
    }
}

/// Consumes a joined reader, merging owners by identity.
fn buffer<T: Entity>(rows: RowSet<'_>, plan: &RowPlan) -> CoreResult<(Vec<T>, Option<u64>)> {
    let mut arena: Vec<T> = Vec::new();
    let mut by_identity: HashMap<String, usize> = HashMap::new();
    let mut attached: HashSet<(usize, usize, String)> = HashSet::new();
    let mut singular: HashSet<(usize, usize)> = HashSet::new();
    let mut total = None;

    for (n, row) in rows.enumerate() {
        let row = row?;
        if n == 0 {
            total = plan.read_counter(&row)?;
        }
        let identity = plan.identity(&row);
        let slot = match identity.as_ref().and_then(|k| by_identity.get(k)).copied() {
            Some(slot) => slot,
            None => {
                let mut entity = T::default();
                plan.fill(&mut entity, &row)?;
                arena.push(entity);
                let slot = arena.len() - 1;
                if let Some(identity) = identity {
                    by_identity.insert(identity, slot);
                }
                slot
            }
        };

        for (index, link) in plan.links.iter().enumerate() {
            let Some(record) = plan.related_record(index, &row) else {
                continue;
            };
            if !plan.belongs_to_owner(index, &row) {
                continue;
            }
            if let Some(key) = identity_of(&link.key, &row) {
                if !attached.insert((slot, index, key)) {
                    continue;
                }
            }
            if link.cardinality == Cardinality::One && !singular.insert((slot, index)) {
                tracing::debug!(
                    navigation = %link.property,
                    "second related row for a singular navigation, dropped"
                );
                continue;
            }
            arena[slot]
                .attach(&link.property, &record)
                .map_err(|e| CoreError::conversion(link.property.clone(), e))?;
        }
    }
    tracing::trace!(entities = arena.len(), "buffered joined rows");
    Ok((arena, total))
}

/// Reads a single scalar as `u64`, treating a missing value as zero.
pub(crate) fn scalar_count(value: Option<Value>) -> CoreResult<u64> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(value) => u64::from_value(&value).map_err(|e| CoreError::conversion("COUNT(*)", e)),
    }
}
