//! # PaNOSC Mappings
//!
//! How each PaNOSC entity is stored in the catalog: its base entity, where
//! each of its fields is read from, and which catalog relation each of its
//! relations follows.

use std::collections::BTreeSet;

use crate::common::{GatewayError, GatewayResult};

/// Where a PaNOSC field gets its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Dotted catalog path; crossing a to-many relation yields a list
    Path(&'static str),
    /// `true` once the date at this path has passed
    ReleasedBy(&'static str),
}

impl FieldSource {
    /// Catalog path read by this field
    pub fn path(&self) -> &'static str {
        match self {
            FieldSource::Path(path) | FieldSource::ReleasedBy(path) => *path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub name: &'static str,
    pub source: FieldSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMapping {
    pub name: &'static str,
    /// PaNOSC entity on the other side
    pub target: &'static str,
    /// Catalog relation path followed
    pub icat_path: &'static str,
    /// Rendered as a list rather than a single object
    pub many: bool,
}

/// One PaNOSC entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanoscEntity {
    pub name: &'static str,
    pub icat_entity: &'static str,
    pub fields: Vec<FieldMapping>,
    pub relations: Vec<RelationMapping>,
}

impl PanoscEntity {
    fn new(name: &'static str, icat_entity: &'static str) -> Self {
        Self {
            name,
            icat_entity,
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    fn field(mut self, name: &'static str, path: &'static str) -> Self {
        self.fields.push(FieldMapping {
            name,
            source: FieldSource::Path(path),
        });
        self
    }

    fn released_by(mut self, name: &'static str, path: &'static str) -> Self {
        self.fields.push(FieldMapping {
            name,
            source: FieldSource::ReleasedBy(path),
        });
        self
    }

    fn relation(mut self, name: &'static str, target: &'static str, icat_path: &'static str) -> Self {
        self.relations.push(RelationMapping {
            name,
            target,
            icat_path,
            many: true,
        });
        self
    }

    fn relation_one(mut self, name: &'static str, target: &'static str, icat_path: &'static str) -> Self {
        self.relations.push(RelationMapping {
            name,
            target,
            icat_path,
            many: false,
        });
        self
    }

    pub fn field_mapping(&self, name: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relation_mapping(&self, name: &str) -> Option<&RelationMapping> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Catalog relations needed to read this entity's own fields
    pub fn field_relations(&self) -> Vec<String> {
        let relations: BTreeSet<String> = self
            .fields
            .iter()
            .filter_map(|f| f.source.path().rsplit_once('.').map(|(prefix, _)| prefix.to_string()))
            .collect();
        relations.into_iter().collect()
    }
}

/// The PaNOSC entities served by the search API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mappings {
    entities: Vec<PanoscEntity>,
}

impl Mappings {
    pub fn new(entities: Vec<PanoscEntity>) -> Self {
        Self { entities }
    }

    /// Mappings onto the ICAT schema
    pub fn icat() -> Self {
        Self::new(vec![
            PanoscEntity::new("Dataset", "Dataset")
                .field("pid", "doi")
                .field("title", "name")
                .released_by("isPublic", "investigation.releaseDate")
                .field("creationDate", "createTime")
                .relation("documents", "Document", "investigation")
                .relation("files", "File", "datafiles"),
            PanoscEntity::new("Document", "Investigation")
                .field("pid", "doi")
                .released_by("isPublic", "releaseDate")
                .field("type", "type.name")
                .field("title", "title")
                .field("summary", "summary")
                .field("doi", "doi")
                .field("startDate", "startDate")
                .field("endDate", "endDate")
                .field("releaseDate", "releaseDate")
                .field("keywords", "keywords.name")
                .relation("datasets", "Dataset", "datasets"),
            PanoscEntity::new("Instrument", "Instrument")
                .field("pid", "pid")
                .field("name", "name")
                .field("facility", "facility.name"),
            PanoscEntity::new("File", "Datafile")
                .field("id", "id")
                .field("name", "name")
                .field("path", "location")
                .field("size", "fileSize")
                .relation_one("dataset", "Dataset", "dataset"),
        ])
    }

    pub fn names(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.name.to_string()).collect()
    }

    pub fn entity(&self, name: &str) -> GatewayResult<&PanoscEntity> {
        self.entities.iter().find(|e| e.name == name).ok_or_else(|| {
            GatewayError::bad_request(format!("Bad request made, unknown search API entity {}", name))
        })
    }

    /// Translate a dotted PaNOSC field into a catalog path
    pub fn icat_path(&self, entity: &str, field: &str) -> GatewayResult<String> {
        let panosc = self.entity(entity)?;
        if let Some((head, rest)) = field.split_once('.') {
            let relation = panosc.relation_mapping(head).ok_or_else(|| unknown_field(entity, head))?;
            return Ok(format!("{}.{}", relation.icat_path, self.icat_path(relation.target, rest)?));
        }

        match panosc.field_mapping(field).map(|f| f.source) {
            Some(FieldSource::Path(path)) => Ok(path.to_string()),
            Some(FieldSource::ReleasedBy(_)) => Err(GatewayError::bad_request(format!(
                "Bad request made, {} is computed and cannot be used in a filter",
                field
            ))),
            None => Err(unknown_field(entity, field)),
        }
    }

    /// Translate a dotted PaNOSC relation path into a catalog relation path
    pub fn icat_relation_path(&self, entity: &str, relation: &str) -> GatewayResult<(String, &'static str)> {
        let mut current = self.entity(entity)?;
        let mut path = Vec::new();
        for name in relation.split('.') {
            let mapping = current
                .relation_mapping(name)
                .ok_or_else(|| unknown_field(current.name, name))?;
            path.push(mapping.icat_path);
            current = self.entity(mapping.target)?;
        }
        Ok((path.join("."), current.name))
    }
}

fn unknown_field(entity: &str, field: &str) -> GatewayError {
    GatewayError::bad_request(format!(
        "Bad request made, {} is not a field of the {} entity",
        field, entity
    ))
}
