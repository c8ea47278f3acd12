//! # Rows
//!
//! Relational-mirror records. Tables are named after their entity in upper
//! case; scalar columns keep the attribute names, each to-one relation adds
//! a `<relation>ID` foreign-key column, and relations are named after the
//! upper-cased target table.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::entity::{AttrValue, Entity, EntitySchema, RelationDef, Related, META_ATTRIBUTES};
use crate::memory::RecordGraph;

/// Table name for an entity
pub fn table_name(entity: &str) -> String {
    entity.to_uppercase()
}

/// Foreign-key column of a to-one relation
pub fn foreign_key_column(relation: &RelationDef) -> String {
    format!("{}ID", relation.name)
}

/// Row-side name of a relation
pub fn relation_column(relation: &RelationDef) -> String {
    table_name(&relation.target)
}

/// Find the relation named by its row-side name
pub fn find_relation<'a>(schema: &'a EntitySchema, column: &str) -> Option<&'a RelationDef> {
    schema
        .one_relations
        .iter()
        .chain(schema.many_relations.iter())
        .find(|r| relation_column(r) == column)
}

/// Find the to-one relation owning a foreign-key column
pub fn find_foreign_key<'a>(schema: &'a EntitySchema, column: &str) -> Option<&'a RelationDef> {
    schema
        .one_relations
        .iter()
        .find(|r| foreign_key_column(r) == column)
}

/// Loaded relation of a row
#[derive(Debug, Clone)]
pub enum RelatedRows {
    One(Box<Row>),
    Many(Vec<Row>),
}

/// One row of a table, with any joined relations
#[derive(Debug, Clone)]
pub struct Row {
    table: String,
    schema: Arc<EntitySchema>,
    columns: BTreeMap<String, AttrValue>,
    relation_names: Vec<String>,
    related: BTreeMap<String, RelatedRows>,
}

impl Row {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id(&self) -> Option<i64> {
        self.columns.get("id").and_then(AttrValue::as_i64)
    }

    pub fn columns(&self) -> &BTreeMap<String, AttrValue> {
        &self.columns
    }
}

impl From<RecordGraph> for Row {
    fn from(graph: RecordGraph) -> Self {
        let schema = graph.schema;
        let mut columns = graph.attrs;
        for relation in &schema.one_relations {
            let value = graph
                .links
                .get(&relation.name)
                .map_or(AttrValue::Null, |id| AttrValue::Int(*id));
            columns.insert(foreign_key_column(relation), value);
        }

        let mut related = BTreeMap::new();
        for (name, target) in graph.one {
            if let Some(def) = schema.one_relation(&name) {
                related.insert(relation_column(def), RelatedRows::One(Box::new(Row::from(target))));
            }
        }
        for (name, targets) in graph.many {
            if let Some(def) = schema.many_relation(&name) {
                related.insert(
                    relation_column(def),
                    RelatedRows::Many(targets.into_iter().map(Row::from).collect()),
                );
            }
        }

        let relation_names = schema
            .one_relations
            .iter()
            .chain(schema.many_relations.iter())
            .map(relation_column)
            .collect();

        Self {
            table: table_name(&schema.name),
            schema,
            columns,
            relation_names,
            related,
        }
    }
}

impl Entity for Row {
    fn entity_name(&self) -> &str {
        &self.table
    }

    fn instance_attributes(&self) -> Vec<&str> {
        let mut names = self.schema.instance_attribute_names();
        names.extend(
            self.columns
                .keys()
                .map(String::as_str)
                .filter(|name| find_foreign_key(&self.schema, name).is_some()),
        );
        names
    }

    fn meta_attributes(&self) -> Vec<&str> {
        META_ATTRIBUTES.iter().map(|(name, _)| *name).collect()
    }

    fn relation_attributes(&self) -> Vec<&str> {
        self.relation_names.iter().map(String::as_str).collect()
    }

    fn get(&self, name: &str) -> Option<&AttrValue> {
        self.columns.get(name)
    }

    fn get_related(&self, name: &str) -> Related<'_> {
        match self.related.get(name) {
            Some(RelatedRows::One(row)) => Related::One(row.as_ref()),
            Some(RelatedRows::Many(rows)) => {
                Related::Many(rows.iter().map(|r| r as &dyn Entity).collect())
            }
            None => Related::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{to_record, Schema};
    use crate::memory::{load_fixture, IncludeTree, MemoryStore};
    use serde_json::json;

    #[test]
    fn test_row_naming() {
        let mut store = MemoryStore::new(Schema::icat());
        load_fixture(
            &mut store,
            &json!({
                "Investigation": [{"id": 1, "title": "Inv"}],
                "Dataset": [{"id": 2, "name": "ds", "investigation": 1}]
            }),
        )
        .unwrap();

        let graph = store
            .materialize("Dataset", 2, &IncludeTree::from_paths(&["investigation"]))
            .unwrap();
        let row = Row::from(graph);
        assert_eq!(row.table(), "DATASET");
        assert_eq!(row.get("investigationID"), Some(&AttrValue::Int(1)));
        assert_eq!(row.get("typeID"), Some(&AttrValue::Null));

        let record = to_record(&row, &["INVESTIGATION"]);
        assert_eq!(record["name"], json!("ds"));
        assert_eq!(record["INVESTIGATION"]["title"], json!("Inv"));
    }

    #[test]
    fn test_relation_lookup() {
        let schema = Schema::icat();
        let dataset = schema.entity("Dataset").unwrap();
        assert_eq!(find_relation(dataset, "DATASETTYPE").unwrap().name, "type");
        assert_eq!(find_relation(dataset, "DATAFILE").unwrap().name, "datafiles");
        assert_eq!(find_foreign_key(dataset, "investigationID").unwrap().name, "investigation");
        assert!(find_relation(dataset, "FACILITY").is_none());
    }
}
