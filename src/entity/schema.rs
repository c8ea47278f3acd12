//! # Entity Schema
//!
//! Attribute and relation declarations for catalog entity types. Both the
//! catalog doubles and the relational mirror are built from the same
//! declarations; the mirror names its tables in upper case.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::value::AttrKind;

/// Metadata attributes carried by every entity
pub const META_ATTRIBUTES: [(&str, AttrKind); 5] = [
    ("id", AttrKind::Int),
    ("createId", AttrKind::Str),
    ("createTime", AttrKind::Date),
    ("modId", AttrKind::Str),
    ("modTime", AttrKind::Date),
];

/// A scalar attribute declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDef {
    pub name: String,
    pub kind: AttrKind,
}

/// A relation declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    /// Attribute name on the owning entity
    pub name: String,
    /// Target entity name
    pub target: String,
    /// For one-to-many relations, the one-relation on the target pointing back
    pub mapped_by: Option<String>,
}

/// Declaration of one entity type
#[derive(Debug, Clone)]
pub struct EntitySchema {
    pub name: String,
    pub attributes: Vec<AttributeDef>,
    pub one_relations: Vec<RelationDef>,
    pub many_relations: Vec<RelationDef>,
}

impl EntitySchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            one_relations: Vec::new(),
            many_relations: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, kind: AttrKind) -> Self {
        self.attributes.push(AttributeDef {
            name: name.to_string(),
            kind,
        });
        self
    }

    pub fn one(mut self, name: &str, target: &str) -> Self {
        self.one_relations.push(RelationDef {
            name: name.to_string(),
            target: target.to_string(),
            mapped_by: None,
        });
        self
    }

    pub fn many(mut self, name: &str, target: &str, mapped_by: &str) -> Self {
        self.many_relations.push(RelationDef {
            name: name.to_string(),
            target: target.to_string(),
            mapped_by: Some(mapped_by.to_string()),
        });
        self
    }

    /// Kind of a scalar attribute (instance or metadata)
    pub fn attribute_kind(&self, name: &str) -> Option<AttrKind> {
        META_ATTRIBUTES
            .iter()
            .find(|(meta, _)| *meta == name)
            .map(|(_, kind)| *kind)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|a| a.name == name)
                    .map(|a| a.kind)
            })
    }

    pub fn is_meta_attribute(&self, name: &str) -> bool {
        META_ATTRIBUTES.iter().any(|(meta, _)| *meta == name)
    }

    pub fn one_relation(&self, name: &str) -> Option<&RelationDef> {
        self.one_relations.iter().find(|r| r.name == name)
    }

    pub fn many_relation(&self, name: &str) -> Option<&RelationDef> {
        self.many_relations.iter().find(|r| r.name == name)
    }

    pub fn is_relation(&self, name: &str) -> bool {
        self.one_relation(name).is_some() || self.many_relation(name).is_some()
    }

    pub fn instance_attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn relation_names(&self) -> Vec<&str> {
        self.one_relations
            .iter()
            .chain(self.many_relations.iter())
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// The full set of entity declarations
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: BTreeMap<String, Arc<EntitySchema>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, entity: EntitySchema) -> Self {
        self.entities.insert(entity.name.clone(), Arc::new(entity));
        self
    }

    pub fn entity(&self, name: &str) -> Option<&Arc<EntitySchema>> {
        self.entities.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    /// The subset of the ICAT schema served by the gateway
    pub fn icat() -> Self {
        use AttrKind::*;

        Schema::new()
            .with(
                EntitySchema::new("Facility")
                    .attr("name", Str)
                    .attr("fullName", Str)
                    .attr("description", Str)
                    .attr("url", Str)
                    .attr("daysUntilRelease", Int)
                    .many("instruments", "Instrument", "facility")
                    .many("investigations", "Investigation", "facility")
                    .many("facilityCycles", "FacilityCycle", "facility")
                    .many("datasetTypes", "DatasetType", "facility")
                    .many("investigationTypes", "InvestigationType", "facility")
                    .many("parameterTypes", "ParameterType", "facility"),
            )
            .with(
                EntitySchema::new("FacilityCycle")
                    .attr("name", Str)
                    .attr("description", Str)
                    .attr("startDate", Date)
                    .attr("endDate", Date)
                    .one("facility", "Facility"),
            )
            .with(
                EntitySchema::new("Instrument")
                    .attr("name", Str)
                    .attr("fullName", Str)
                    .attr("description", Str)
                    .attr("type", Str)
                    .attr("url", Str)
                    .attr("pid", Str)
                    .one("facility", "Facility")
                    .many("investigationInstruments", "InvestigationInstrument", "instrument"),
            )
            .with(
                EntitySchema::new("InvestigationType")
                    .attr("name", Str)
                    .attr("description", Str)
                    .one("facility", "Facility")
                    .many("investigations", "Investigation", "type"),
            )
            .with(
                EntitySchema::new("Investigation")
                    .attr("name", Str)
                    .attr("title", Str)
                    .attr("summary", Str)
                    .attr("doi", Str)
                    .attr("visitId", Str)
                    .attr("startDate", Date)
                    .attr("endDate", Date)
                    .attr("releaseDate", Date)
                    .one("facility", "Facility")
                    .one("type", "InvestigationType")
                    .many("datasets", "Dataset", "investigation")
                    .many("investigationUsers", "InvestigationUser", "investigation")
                    .many("investigationInstruments", "InvestigationInstrument", "investigation")
                    .many("keywords", "Keyword", "investigation")
                    .many("parameters", "InvestigationParameter", "investigation")
                    .many("studyInvestigations", "StudyInvestigation", "investigation"),
            )
            .with(
                EntitySchema::new("InvestigationInstrument")
                    .one("investigation", "Investigation")
                    .one("instrument", "Instrument"),
            )
            .with(
                EntitySchema::new("InvestigationUser")
                    .attr("role", Str)
                    .one("investigation", "Investigation")
                    .one("user", "User"),
            )
            .with(
                EntitySchema::new("User")
                    .attr("name", Str)
                    .attr("fullName", Str)
                    .attr("email", Str)
                    .attr("orcidId", Str)
                    .many("investigationUsers", "InvestigationUser", "user")
                    .many("studies", "Study", "user"),
            )
            .with(
                EntitySchema::new("Keyword")
                    .attr("name", Str)
                    .one("investigation", "Investigation"),
            )
            .with(
                EntitySchema::new("ParameterType")
                    .attr("name", Str)
                    .attr("units", Str)
                    .attr("valueType", Str)
                    .attr("description", Str)
                    .one("facility", "Facility")
                    .many("permissibleStringValues", "PermissibleStringValue", "type"),
            )
            .with(
                EntitySchema::new("PermissibleStringValue")
                    .attr("value", Str)
                    .one("type", "ParameterType"),
            )
            .with(
                EntitySchema::new("InvestigationParameter")
                    .attr("stringValue", Str)
                    .attr("numericValue", Float)
                    .attr("dateTimeValue", Date)
                    .one("investigation", "Investigation")
                    .one("type", "ParameterType"),
            )
            .with(
                EntitySchema::new("DatasetType")
                    .attr("name", Str)
                    .attr("description", Str)
                    .one("facility", "Facility")
                    .many("datasets", "Dataset", "type"),
            )
            .with(
                EntitySchema::new("Dataset")
                    .attr("name", Str)
                    .attr("description", Str)
                    .attr("doi", Str)
                    .attr("location", Str)
                    .attr("startDate", Date)
                    .attr("endDate", Date)
                    .attr("complete", Bool)
                    .one("investigation", "Investigation")
                    .one("type", "DatasetType")
                    .many("datafiles", "Datafile", "dataset"),
            )
            .with(
                EntitySchema::new("Datafile")
                    .attr("name", Str)
                    .attr("description", Str)
                    .attr("location", Str)
                    .attr("fileSize", Int)
                    .attr("doi", Str)
                    .attr("datafileCreateTime", Date)
                    .attr("datafileModTime", Date)
                    .one("dataset", "Dataset"),
            )
            .with(
                EntitySchema::new("Study")
                    .attr("name", Str)
                    .attr("description", Str)
                    .attr("pid", Str)
                    .attr("startDate", Date)
                    .attr("endDate", Date)
                    .attr("status", Int)
                    .one("user", "User")
                    .many("studyInvestigations", "StudyInvestigation", "study"),
            )
            .with(
                EntitySchema::new("StudyInvestigation")
                    .one("study", "Study")
                    .one("investigation", "Investigation"),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icat_schema_relations_are_consistent() {
        let schema = Schema::icat();
        for name in schema.names() {
            let entity = schema.entity(&name).unwrap();
            for rel in entity.one_relations.iter().chain(entity.many_relations.iter()) {
                let target = schema
                    .entity(&rel.target)
                    .unwrap_or_else(|| panic!("{}.{} targets unknown entity", name, rel.name));
                if let Some(back) = &rel.mapped_by {
                    assert!(
                        target.one_relation(back).is_some(),
                        "{}.{} mapped by missing {}.{}",
                        name,
                        rel.name,
                        rel.target,
                        back
                    );
                }
            }
        }
    }

    #[test]
    fn test_attribute_kinds() {
        let schema = Schema::icat();
        let dataset = schema.entity("Dataset").unwrap();
        assert_eq!(dataset.attribute_kind("createTime"), Some(AttrKind::Date));
        assert_eq!(dataset.attribute_kind("name"), Some(AttrKind::Str));
        assert_eq!(dataset.attribute_kind("investigation"), None);
        assert!(dataset.is_relation("datafiles"));
        assert!(dataset.is_meta_attribute("modId"));
    }
}
