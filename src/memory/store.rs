//! # Memory Store
//!
//! A volatile entity graph. Records hold their scalar attributes and the ids
//! of their to-one relations; to-many relations are derived from the
//! `mapped_by` back-reference on the target records.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::entity::{AttrKind, AttrValue, EntitySchema, RelationDef, Schema};
use crate::filters::Operator;

use super::errors::{StoreError, StoreResult};
use super::pattern::LikePattern;

/// One stored record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredRecord {
    /// Scalar attributes, metadata included
    pub attrs: BTreeMap<String, AttrValue>,
    /// To-one relation name -> target id
    pub links: BTreeMap<String, i64>,
}

impl StoredRecord {
    pub fn id(&self) -> Option<i64> {
        self.attrs.get("id").and_then(AttrValue::as_i64)
    }
}

/// Boolean condition over record paths
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        path: String,
        operator: Operator,
        value: Value,
    },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

/// What to read from one table
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub entity: String,
    pub filter: Option<Predicate>,
    /// Dotted paths with their direction (`true` = ascending)
    pub order: Vec<(String, bool)>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl Selection {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }
}

/// Relations to load when materializing a record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeTree {
    pub children: BTreeMap<String, IncludeTree>,
}

impl IncludeTree {
    pub fn from_paths<S: AsRef<str>>(paths: &[S]) -> Self {
        let mut tree = IncludeTree::default();
        for path in paths {
            let mut node = &mut tree;
            for segment in path.as_ref().split('.').filter(|s| !s.is_empty()) {
                node = node.children.entry(segment.to_string()).or_default();
            }
        }
        tree
    }

    /// Every direct relation of `entity`, one level deep
    pub fn all_direct(entity: &EntitySchema) -> Self {
        Self::from_paths(&entity.relation_names())
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A record with its included relations loaded
#[derive(Debug, Clone)]
pub struct RecordGraph {
    pub schema: Arc<EntitySchema>,
    pub attrs: BTreeMap<String, AttrValue>,
    pub links: BTreeMap<String, i64>,
    pub one: BTreeMap<String, RecordGraph>,
    pub many: BTreeMap<String, Vec<RecordGraph>>,
}

/// In-memory entity store
#[derive(Debug, Clone)]
pub struct MemoryStore {
    schema: Schema,
    tables: BTreeMap<String, BTreeMap<i64, StoredRecord>>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new(schema: Schema) -> Self {
        let tables = schema
            .names()
            .into_iter()
            .map(|name| (name, BTreeMap::new()))
            .collect();
        Self {
            schema,
            tables,
            next_id: 1,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn entity_schema(&self, entity: &str) -> StoreResult<&Arc<EntitySchema>> {
        self.schema
            .entity(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.to_string()))
    }

    fn table(&self, entity: &str) -> StoreResult<&BTreeMap<i64, StoredRecord>> {
        self.tables
            .get(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.to_string()))
    }

    fn table_mut(&mut self, entity: &str) -> StoreResult<&mut BTreeMap<i64, StoredRecord>> {
        self.tables
            .get_mut(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.to_string()))
    }

    pub fn get(&self, entity: &str, id: i64) -> StoreResult<&StoredRecord> {
        self.table(entity)?
            .get(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: entity.to_string(),
                id,
            })
    }

    pub fn count(&self, entity: &str) -> StoreResult<usize> {
        Ok(self.table(entity)?.len())
    }

    // ==================
    // Writes
    // ==================

    /// Insert a record; a missing `id` is assigned from the store sequence
    pub fn insert(&mut self, entity: &str, mut record: StoredRecord, actor: &str) -> StoreResult<i64> {
        let schema = self.entity_schema(entity)?.clone();
        self.check_record(&schema, &record)?;

        let id = match record.id() {
            Some(id) => {
                if self.table(entity)?.contains_key(&id) {
                    return Err(StoreError::Constraint(format!(
                        "{} with id {} already exists",
                        entity, id
                    )));
                }
                id
            }
            None => self.next_id,
        };
        self.next_id = self.next_id.max(id + 1);

        let now = AttrValue::Date(Utc::now().fixed_offset());
        record.attrs.insert("id".to_string(), AttrValue::Int(id));
        for (meta, value) in [
            ("createId", AttrValue::Str(actor.to_string())),
            ("modId", AttrValue::Str(actor.to_string())),
            ("createTime", now.clone()),
            ("modTime", now),
        ] {
            let slot = record.attrs.entry(meta.to_string()).or_insert(AttrValue::Null);
            if slot.is_null() {
                *slot = value;
            }
        }

        self.table_mut(entity)?.insert(id, record);
        Ok(id)
    }

    /// Overwrite the given attributes and links of an existing record
    pub fn update(&mut self, entity: &str, id: i64, changes: StoredRecord, actor: &str) -> StoreResult<()> {
        let schema = self.entity_schema(entity)?.clone();
        self.check_record(&schema, &changes)?;
        if changes.id().map_or(false, |new_id| new_id != id) {
            return Err(StoreError::Constraint("id cannot be changed".to_string()));
        }

        let record = self
            .table_mut(entity)?
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: entity.to_string(),
                id,
            })?;
        record.attrs.extend(changes.attrs);
        record.links.extend(changes.links);
        record
            .attrs
            .insert("modId".to_string(), AttrValue::Str(actor.to_string()));
        record.attrs.insert(
            "modTime".to_string(),
            AttrValue::Date(Utc::now().fixed_offset()),
        );
        Ok(())
    }

    /// Delete a record together with the records of its to-many relations
    pub fn delete(&mut self, entity: &str, id: i64) -> StoreResult<()> {
        let schema = self.entity_schema(entity)?.clone();
        self.get(entity, id)?;

        for relation in &schema.many_relations {
            for child in self.child_ids(relation, id)? {
                self.delete(&relation.target, child)?;
            }
        }

        self.table_mut(entity)?.remove(&id);
        for (table_name, table) in self.tables.iter_mut() {
            let Some(table_schema) = self.schema.entity(table_name) else {
                continue;
            };
            for record in table.values_mut() {
                record.links.retain(|name, target| {
                    !(*target == id
                        && table_schema
                            .one_relation(name)
                            .map_or(false, |r| r.target == entity))
                });
            }
        }
        Ok(())
    }

    /// Point a to-one relation at another record
    pub fn link(&mut self, entity: &str, id: i64, relation: &str, target_id: i64) -> StoreResult<()> {
        let schema = self.entity_schema(entity)?.clone();
        let def = schema
            .one_relation(relation)
            .ok_or_else(|| StoreError::unknown_field(entity, relation))?;
        self.get(&def.target, target_id)?;

        let record = self
            .table_mut(entity)?
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: entity.to_string(),
                id,
            })?;
        record.links.insert(relation.to_string(), target_id);
        Ok(())
    }

    fn check_record(&self, schema: &EntitySchema, record: &StoredRecord) -> StoreResult<()> {
        for (name, value) in &record.attrs {
            let kind = schema
                .attribute_kind(name)
                .ok_or_else(|| StoreError::unknown_field(&schema.name, name))?;
            if !value_fits(value, kind) {
                return Err(StoreError::InvalidValue(format!(
                    "{}.{} expects a {} value",
                    schema.name,
                    name,
                    kind.as_str()
                )));
            }
        }
        for (name, target_id) in &record.links {
            let relation = schema
                .one_relation(name)
                .ok_or_else(|| StoreError::unknown_field(&schema.name, name))?;
            self.get(&relation.target, *target_id)?;
        }
        Ok(())
    }

    // ==================
    // Reads
    // ==================

    /// Check that a dotted path ends in a scalar attribute
    pub fn check_path(&self, entity: &str, path: &str) -> StoreResult<AttrKind> {
        let mut schema = self.entity_schema(entity)?;
        let segments: Vec<&str> = path.split('.').collect();
        let (last, relations) = segments
            .split_last()
            .ok_or_else(|| StoreError::unknown_field(entity, path))?;

        for name in relations {
            let relation = schema
                .one_relation(name)
                .or_else(|| schema.many_relation(name))
                .ok_or_else(|| StoreError::unknown_field(&schema.name, name))?;
            schema = self.entity_schema(&relation.target)?;
        }
        schema
            .attribute_kind(last)
            .ok_or_else(|| StoreError::unknown_field(&schema.name, last))
    }

    /// Check that a dotted path is a chain of relations
    pub fn check_relation_path(&self, entity: &str, path: &str) -> StoreResult<()> {
        let mut schema = self.entity_schema(entity)?;
        for name in path.split('.') {
            let relation = schema
                .one_relation(name)
                .or_else(|| schema.many_relation(name))
                .ok_or_else(|| StoreError::unknown_field(&schema.name, name))?;
            schema = self.entity_schema(&relation.target)?;
        }
        Ok(())
    }

    /// Ids of the records on the to-many side of `relation`
    fn child_ids(&self, relation: &RelationDef, id: i64) -> StoreResult<Vec<i64>> {
        let back = relation.mapped_by.as_deref().unwrap_or_default();
        Ok(self
            .table(&relation.target)?
            .iter()
            .filter(|(_, record)| record.links.get(back) == Some(&id))
            .map(|(child_id, _)| *child_id)
            .collect())
    }

    /// Every value reachable from a record along a dotted path
    pub fn values_at(&self, entity: &str, id: i64, path: &str) -> StoreResult<Vec<AttrValue>> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut out = Vec::new();
        self.collect_values(entity, id, &segments, &mut out)?;
        Ok(out)
    }

    fn collect_values(
        &self,
        entity: &str,
        id: i64,
        segments: &[&str],
        out: &mut Vec<AttrValue>,
    ) -> StoreResult<()> {
        let schema = self.entity_schema(entity)?;
        let record = self.get(entity, id)?;

        match segments {
            [] => {}
            [attr] => out.push(record.attrs.get(*attr).cloned().unwrap_or(AttrValue::Null)),
            [relation, rest @ ..] => {
                if let Some(def) = schema.one_relation(relation) {
                    if let Some(target_id) = record.links.get(*relation) {
                        self.collect_values(&def.target, *target_id, rest, out)?;
                    }
                } else if let Some(def) = schema.many_relation(relation) {
                    for child in self.child_ids(def, id)? {
                        self.collect_values(&def.target, child, rest, out)?;
                    }
                } else {
                    return Err(StoreError::unknown_field(entity, relation));
                }
            }
        }
        Ok(())
    }

    fn check_predicate(&self, entity: &str, predicate: &Predicate) -> StoreResult<()> {
        match predicate {
            Predicate::Compare { path, .. } => self.check_path(entity, path).map(|_| ()),
            Predicate::All(children) | Predicate::Any(children) => children
                .iter()
                .try_for_each(|child| self.check_predicate(entity, child)),
        }
    }

    fn matches(&self, entity: &str, id: i64, predicate: &Compiled<'_>) -> StoreResult<bool> {
        match predicate {
            Compiled::Compare { path, test } => Ok(self
                .values_at(entity, id, path)?
                .iter()
                .any(|candidate| test.passes(candidate))),
            Compiled::All(children) => {
                for child in children {
                    if !self.matches(entity, id, child)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Compiled::Any(children) => {
                for child in children {
                    if self.matches(entity, id, child)? {
                        return Ok(true);
                    }
                }
                Ok(children.is_empty())
            }
        }
    }

    /// Ids of the records matching a selection, ordered and windowed
    pub fn select(&self, selection: &Selection) -> StoreResult<Vec<i64>> {
        let entity = selection.entity.as_str();
        let table = self.table(entity)?;
        let filter = match &selection.filter {
            Some(filter) => {
                self.check_predicate(entity, filter)?;
                Some(Compiled::new(filter)?)
            }
            None => None,
        };
        for (path, _) in &selection.order {
            self.check_path(entity, path)?;
        }

        let mut keyed = Vec::new();
        for id in table.keys() {
            if let Some(filter) = &filter {
                if !self.matches(entity, *id, filter)? {
                    continue;
                }
            }
            let mut sort_key = Vec::with_capacity(selection.order.len());
            for (path, _) in &selection.order {
                let first = self.values_at(entity, *id, path)?.into_iter().next();
                sort_key.push(first.unwrap_or(AttrValue::Null));
            }
            keyed.push((*id, sort_key));
        }

        keyed.sort_by(|(a_id, a), (b_id, b)| {
            for ((left, right), (_, ascending)) in a.iter().zip(b.iter()).zip(&selection.order) {
                let ord = left.sort_cmp(right);
                if ord != Ordering::Equal {
                    return if *ascending { ord } else { ord.reverse() };
                }
            }
            a_id.cmp(b_id)
        });

        let skip = usize::try_from(selection.skip).unwrap_or(usize::MAX);
        let ids = keyed.into_iter().map(|(id, _)| id).skip(skip);
        Ok(match selection.limit {
            Some(limit) => ids.take(usize::try_from(limit).unwrap_or(usize::MAX)).collect(),
            None => ids.collect(),
        })
    }

    /// Load a record and the relations named by `includes`
    pub fn materialize(&self, entity: &str, id: i64, includes: &IncludeTree) -> StoreResult<RecordGraph> {
        let schema = self.entity_schema(entity)?.clone();
        let record = self.get(entity, id)?;

        let mut graph = RecordGraph {
            schema: schema.clone(),
            attrs: record.attrs.clone(),
            links: record.links.clone(),
            one: BTreeMap::new(),
            many: BTreeMap::new(),
        };

        for (name, nested) in &includes.children {
            if let Some(def) = schema.one_relation(name) {
                if let Some(target_id) = record.links.get(name) {
                    graph
                        .one
                        .insert(name.clone(), self.materialize(&def.target, *target_id, nested)?);
                }
            } else if let Some(def) = schema.many_relation(name) {
                let children = self
                    .child_ids(def, id)?
                    .into_iter()
                    .map(|child| self.materialize(&def.target, child, nested))
                    .collect::<StoreResult<Vec<_>>>()?;
                graph.many.insert(name.clone(), children);
            } else {
                return Err(StoreError::unknown_field(entity, name));
            }
        }
        Ok(graph)
    }
}

fn value_fits(value: &AttrValue, kind: AttrKind) -> bool {
    matches!(
        (value, kind),
        (AttrValue::Null, _)
            | (AttrValue::Bool(_), AttrKind::Bool)
            | (AttrValue::Int(_), AttrKind::Int)
            | (AttrValue::Int(_), AttrKind::Float)
            | (AttrValue::Float(_), AttrKind::Float)
            | (AttrValue::Str(_), AttrKind::Str)
            | (AttrValue::Date(_), AttrKind::Date)
    )
}

/// A predicate ready for evaluation, with `like` patterns compiled
enum Compiled<'a> {
    Compare { path: &'a str, test: Test<'a> },
    All(Vec<Compiled<'a>>),
    Any(Vec<Compiled<'a>>),
}

enum Test<'a> {
    Like { pattern: LikePattern, negated: bool },
    Value { operator: Operator, operand: &'a Value },
}

impl<'a> Compiled<'a> {
    fn new(predicate: &'a Predicate) -> StoreResult<Self> {
        Ok(match predicate {
            Predicate::Compare {
                path,
                operator,
                value,
            } => Compiled::Compare {
                path: path.as_str(),
                test: Test::new(*operator, value)?,
            },
            Predicate::All(children) => Compiled::All(compile_all(children)?),
            Predicate::Any(children) => Compiled::Any(compile_all(children)?),
        })
    }
}

fn compile_all(children: &[Predicate]) -> StoreResult<Vec<Compiled<'_>>> {
    children.iter().map(Compiled::new).collect()
}

impl<'a> Test<'a> {
    fn new(operator: Operator, operand: &'a Value) -> StoreResult<Self> {
        let (case_insensitive, negated) = match operator {
            Operator::Like => (false, false),
            Operator::ILike => (true, false),
            Operator::NLike => (false, true),
            Operator::NILike => (true, true),
            _ => return Ok(Test::Value { operator, operand }),
        };
        match operand.as_str() {
            Some(pattern) => {
                let pattern = LikePattern::new(pattern, case_insensitive).map_err(|e| {
                    StoreError::InvalidValue(format!("Unusable like pattern {:?}: {}", pattern, e))
                })?;
                Ok(Test::Like { pattern, negated })
            }
            None => Ok(Test::Value { operator, operand }),
        }
    }

    fn passes(&self, candidate: &AttrValue) -> bool {
        match self {
            Test::Like { pattern, negated } => candidate
                .as_text()
                .map_or(false, |text| pattern.is_match(&text) != *negated),
            Test::Value { operator, operand } => compare(candidate, *operator, operand),
        }
    }
}

/// Evaluate one non-pattern operator
fn compare(candidate: &AttrValue, operator: Operator, operand: &Value) -> bool {
    let ordering = || candidate.compare_json(operand);

    match operator {
        Operator::Eq => ordering() == Some(Ordering::Equal),
        Operator::Ne => matches!(ordering(), Some(ord) if ord != Ordering::Equal),
        Operator::Lt => ordering() == Some(Ordering::Less),
        Operator::Lte => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
        Operator::Gt => ordering() == Some(Ordering::Greater),
        Operator::Gte => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
        // text operands are compiled into `Test::Like`
        Operator::Like | Operator::ILike | Operator::NLike | Operator::NILike => false,
        Operator::In => operand.as_array().map_or(false, |items| {
            items
                .iter()
                .any(|item| candidate.compare_json(item) == Some(Ordering::Equal))
        }),
        Operator::Between => match operand.as_array().map(Vec::as_slice) {
            Some([low, high]) => {
                matches!(candidate.compare_json(low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(candidate.compare_json(high), Some(Ordering::Less | Ordering::Equal))
            }
            _ => false,
        },
    }
}
