//! Catalog entities as returned by, and sent to, a catalog client.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::common::{GatewayError, GatewayResult};
use crate::entity::{AttrValue, Entity, EntitySchema, Related, META_ATTRIBUTES};
use crate::memory::RecordGraph;

/// A catalog entity with whichever relations its query included
#[derive(Debug, Clone)]
pub struct CatalogEntity {
    schema: Arc<EntitySchema>,
    attrs: BTreeMap<String, AttrValue>,
    one: BTreeMap<String, CatalogEntity>,
    many: BTreeMap<String, Vec<CatalogEntity>>,
}

impl CatalogEntity {
    /// A blank entity of the given type
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self {
            schema,
            attrs: BTreeMap::new(),
            one: BTreeMap::new(),
            many: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    pub fn id(&self) -> Option<i64> {
        self.attrs.get("id").and_then(AttrValue::as_i64)
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    /// Loaded to-one relations
    pub fn one_relations(&self) -> &BTreeMap<String, CatalogEntity> {
        &self.one
    }

    /// Set an editable scalar attribute
    ///
    /// Metadata and relation attributes cannot be set this way.
    pub fn set_attribute(&mut self, name: &str, value: AttrValue) -> GatewayResult<()> {
        if self.schema.is_meta_attribute(name) || self.schema.is_relation(name) {
            return Err(GatewayError::bad_request(format!(
                "Bad request made, cannot modify attribute '{}' within the {} entity",
                name, self.schema.name
            )));
        }
        if self.schema.attribute_kind(name).is_none() {
            return Err(GatewayError::bad_request(format!(
                "Bad request made, cannot find attribute '{}' within the {} entity",
                name, self.schema.name
            )));
        }
        self.attrs.insert(name.to_string(), value);
        Ok(())
    }

    /// Point a to-one relation at another entity
    pub fn set_related(&mut self, name: &str, target: CatalogEntity) -> GatewayResult<()> {
        match self.schema.one_relation(name) {
            Some(def) if def.target == target.schema.name => {
                self.one.insert(name.to_string(), target);
                Ok(())
            }
            _ => Err(GatewayError::bad_request(format!(
                "Bad request made, cannot set relation '{}' on the {} entity to a {}",
                name, self.schema.name, target.schema.name
            ))),
        }
    }
}

impl From<RecordGraph> for CatalogEntity {
    fn from(graph: RecordGraph) -> Self {
        Self {
            schema: graph.schema,
            attrs: graph.attrs,
            one: graph
                .one
                .into_iter()
                .map(|(name, target)| (name, CatalogEntity::from(target)))
                .collect(),
            many: graph
                .many
                .into_iter()
                .map(|(name, targets)| {
                    (name, targets.into_iter().map(CatalogEntity::from).collect())
                })
                .collect(),
        }
    }
}

impl Entity for CatalogEntity {
    fn entity_name(&self) -> &str {
        &self.schema.name
    }

    fn instance_attributes(&self) -> Vec<&str> {
        self.schema.instance_attribute_names()
    }

    fn meta_attributes(&self) -> Vec<&str> {
        META_ATTRIBUTES.iter().map(|(name, _)| *name).collect()
    }

    fn relation_attributes(&self) -> Vec<&str> {
        self.schema.relation_names()
    }

    fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    fn get_related(&self, name: &str) -> Related<'_> {
        if let Some(target) = self.one.get(name) {
            return Related::One(target);
        }
        match self.many.get(name) {
            Some(targets) => Related::Many(targets.iter().map(|t| t as &dyn Entity).collect()),
            None => Related::Absent,
        }
    }
}
