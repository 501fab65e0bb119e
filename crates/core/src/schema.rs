//! Model schema: relation metadata, field defaults, and timestamp
//! conventions the resolver and merger read.
//!
//! A [`Schema`] is built from [`ModelDef`]s, either in code or from a TOML
//! file. Foreign-key names left out of a definition are derived from the
//! relation and model names when the schema is built.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::inflect::{camelize, singularize, underscore};

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("cannot read schema {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid schema TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("model {model} is declared more than once")]
    DuplicateModel { model: String },

    #[error("relation {model}.{relation} targets unknown model {target}")]
    UnknownTarget {
        model: String,
        relation: String,
        target: String,
    },
}

/// The kind of a relation-valued field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    EmbedsOne,
    EmbedsMany,
    BelongsTo,
    HasMany,
    #[serde(alias = "habtm")]
    HasAndBelongsToMany,
}

impl RelationKind {
    pub fn is_embedded(self) -> bool {
        matches!(self, RelationKind::EmbedsOne | RelationKind::EmbedsMany)
    }
}

/// Resolved metadata for one relation of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Attribute name the relation is written under in fixtures.
    pub name: String,
    pub kind: RelationKind,
    /// Related model. For a polymorphic belongs-to this is only the
    /// fallback used by references without a type hint.
    pub target: String,
    /// Where the reference is stored. Belongs-to: on the owner. Has-many:
    /// on the related document. Has-and-belongs-to-many: the owner's id
    /// array. Embedded relations store their value under `name`.
    pub foreign_key: String,
    /// Has-and-belongs-to-many only: the id array on the related side.
    pub inverse_foreign_key: Option<String>,
    pub polymorphic: bool,
    /// Attribute recording the concrete type of a polymorphic reference.
    pub discriminator: Option<String>,
}

/// How a timestamp field is named, if the model has one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampStyle {
    #[default]
    None,
    /// `c_at` / `u_at`
    Short,
    /// `created_at` / `updated_at`
    Long,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    #[serde(default)]
    pub created: TimestampStyle,
    #[serde(default)]
    pub updated: TimestampStyle,
}

impl Timestamps {
    pub fn new(created: TimestampStyle, updated: TimestampStyle) -> Self {
        Timestamps { created, updated }
    }

    pub fn created_field(&self) -> Option<&'static str> {
        match self.created {
            TimestampStyle::None => None,
            TimestampStyle::Short => Some("c_at"),
            TimestampStyle::Long => Some("created_at"),
        }
    }

    pub fn updated_field(&self) -> Option<&'static str> {
        match self.updated {
            TimestampStyle::None => None,
            TimestampStyle::Short => Some("u_at"),
            TimestampStyle::Long => Some("updated_at"),
        }
    }
}

/// What the fixture engine needs to know about models.
pub trait ModelSchema {
    fn has_model(&self, model: &str) -> bool;

    /// Relations in declaration order; empty for unknown models.
    fn relations_of(&self, model: &str) -> &[Relation];

    /// Declared field defaults, if the model is known.
    fn field_defaults(&self, model: &str) -> Option<&Map<String, Value>>;

    fn timestamps(&self, model: &str) -> Timestamps;
}

/// A relation as written in a model definition; unset names are derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    pub name: String,
    pub kind: RelationKind,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub foreign_key: Option<String>,
    #[serde(default)]
    pub inverse_foreign_key: Option<String>,
    #[serde(default)]
    pub polymorphic: bool,
    #[serde(default)]
    pub discriminator: Option<String>,
    /// Has-many only: name of the polymorphic belongs-to on the related
    /// model (`has_many :groups, as: :something`).
    #[serde(default, rename = "as")]
    pub inverse_of: Option<String>,
}

impl RelationDef {
    pub fn new(name: impl Into<String>, kind: RelationKind) -> Self {
        RelationDef {
            name: name.into(),
            kind,
            target: None,
            foreign_key: None,
            inverse_foreign_key: None,
            polymorphic: false,
            discriminator: None,
            inverse_of: None,
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn foreign_key(mut self, key: impl Into<String>) -> Self {
        self.foreign_key = Some(key.into());
        self
    }

    pub fn inverse_foreign_key(mut self, key: impl Into<String>) -> Self {
        self.inverse_foreign_key = Some(key.into());
        self
    }

    fn build(&self, owner: &str) -> Relation {
        let singular = singularize(&self.name);
        let target = self.target.clone().unwrap_or_else(|| match self.kind {
            RelationKind::BelongsTo | RelationKind::EmbedsOne => camelize(&self.name),
            _ => camelize(&singular),
        });
        let owner_key = underscore(owner);

        let mut polymorphic = self.polymorphic;
        let (foreign_key, discriminator) = match self.kind {
            RelationKind::BelongsTo => (
                format!("{}_id", self.name),
                polymorphic.then(|| format!("{}_type", self.name)),
            ),
            RelationKind::HasMany => match &self.inverse_of {
                Some(inverse) => {
                    polymorphic = true;
                    (format!("{}_id", inverse), Some(format!("{}_type", inverse)))
                }
                None => (format!("{}_id", owner_key), None),
            },
            RelationKind::HasAndBelongsToMany => (format!("{}_ids", singular), None),
            RelationKind::EmbedsOne | RelationKind::EmbedsMany => (self.name.clone(), None),
        };
        let inverse_foreign_key = match self.kind {
            RelationKind::HasAndBelongsToMany => Some(
                self.inverse_foreign_key
                    .clone()
                    .unwrap_or_else(|| format!("{}_ids", owner_key)),
            ),
            _ => None,
        };

        Relation {
            name: self.name.clone(),
            kind: self.kind,
            target,
            foreign_key: self.foreign_key.clone().unwrap_or(foreign_key),
            inverse_foreign_key,
            polymorphic,
            discriminator: self.discriminator.clone().or(discriminator),
        }
    }
}

/// One model's definition: defaults, timestamps, relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    #[serde(default)]
    pub timestamps: Timestamps,
    #[serde(default)]
    pub defaults: Map<String, Value>,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>) -> Self {
        ModelDef {
            name: name.into(),
            timestamps: Timestamps::default(),
            defaults: Map::new(),
            relations: Vec::new(),
        }
    }

    pub fn timestamps(mut self, created: TimestampStyle, updated: TimestampStyle) -> Self {
        self.timestamps = Timestamps::new(created, updated);
        self
    }

    pub fn field_default(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(field.into(), value.into());
        self
    }

    pub fn relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn belongs_to(self, name: &str, target: &str) -> Self {
        self.relation(RelationDef::new(name, RelationKind::BelongsTo).target(target))
    }

    pub fn belongs_to_polymorphic(self, name: &str) -> Self {
        let mut def = RelationDef::new(name, RelationKind::BelongsTo);
        def.polymorphic = true;
        self.relation(def)
    }

    pub fn has_many(self, name: &str, target: &str) -> Self {
        self.relation(RelationDef::new(name, RelationKind::HasMany).target(target))
    }

    /// Has-many pointing at a polymorphic belongs-to named `inverse` on
    /// the related model.
    pub fn has_many_as(self, name: &str, target: &str, inverse: &str) -> Self {
        let mut def = RelationDef::new(name, RelationKind::HasMany).target(target);
        def.inverse_of = Some(inverse.to_string());
        self.relation(def)
    }

    pub fn habtm(self, name: &str, target: &str) -> Self {
        self.relation(RelationDef::new(name, RelationKind::HasAndBelongsToMany).target(target))
    }

    pub fn embeds_one(self, name: &str, target: &str) -> Self {
        self.relation(RelationDef::new(name, RelationKind::EmbedsOne).target(target))
    }

    pub fn embeds_many(self, name: &str, target: &str) -> Self {
        self.relation(RelationDef::new(name, RelationKind::EmbedsMany).target(target))
    }
}

#[derive(Debug, Default, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    models: Vec<ModelDef>,
}

#[derive(Debug, Clone)]
struct ModelInfo {
    timestamps: Timestamps,
    defaults: Map<String, Value>,
    relations: Vec<Relation>,
}

/// The standard [`ModelSchema`] implementation.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    models: BTreeMap<String, ModelInfo>,
}

impl Schema {
    /// Build a schema, deriving key names and checking every non-polymorphic
    /// relation targets a declared model.
    pub fn from_models(defs: Vec<ModelDef>) -> Result<Self, SchemaError> {
        let mut models = BTreeMap::new();
        for def in defs {
            if models.contains_key(&def.name) {
                return Err(SchemaError::DuplicateModel { model: def.name });
            }
            let relations = def.relations.iter().map(|r| r.build(&def.name)).collect();
            models.insert(
                def.name,
                ModelInfo {
                    timestamps: def.timestamps,
                    defaults: def.defaults,
                    relations,
                },
            );
        }

        for (model, info) in &models {
            for relation in &info.relations {
                let floating = relation.kind == RelationKind::BelongsTo && relation.polymorphic;
                if !floating && !models.contains_key(&relation.target) {
                    return Err(SchemaError::UnknownTarget {
                        model: model.clone(),
                        relation: relation.name.clone(),
                        target: relation.target.clone(),
                    });
                }
            }
        }

        Ok(Schema { models })
    }

    pub fn from_toml_str(source: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = toml::from_str(source)?;
        Self::from_models(file.models)
    }

    pub fn from_path(path: &Path) -> Result<Self, SchemaError> {
        let source = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn relation(&self, model: &str, name: &str) -> Option<&Relation> {
        self.relations_of(model).iter().find(|r| r.name == name)
    }
}

impl ModelSchema for Schema {
    fn has_model(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    fn relations_of(&self, model: &str) -> &[Relation] {
        self.models
            .get(model)
            .map(|info| info.relations.as_slice())
            .unwrap_or(&[])
    }

    fn field_defaults(&self, model: &str) -> Option<&Map<String, Value>> {
        self.models.get(model).map(|info| &info.defaults)
    }

    fn timestamps(&self, model: &str) -> Timestamps {
        self.models
            .get(model)
            .map(|info| info.timestamps)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Schema {
        Schema::from_models(vec![
            ModelDef::new("Organisation")
                .has_many_as("groups", "Group", "something"),
            ModelDef::new("Group")
                .belongs_to_polymorphic("something")
                .has_many("users", "User"),
            ModelDef::new("User")
                .belongs_to("group", "Group")
                .habtm("tags", "Tag")
                .embeds_one("address", "Address"),
            ModelDef::new("Tag"),
            ModelDef::new("Address").field_default("country", "uk"),
        ])
        .unwrap()
    }

    #[test]
    fn belongs_to_keys_derive_from_name() {
        let schema = sample();
        let rel = schema.relation("User", "group").unwrap();
        assert_eq!(rel.foreign_key, "group_id");
        assert_eq!(rel.discriminator, None);

        let poly = schema.relation("Group", "something").unwrap();
        assert!(poly.polymorphic);
        assert_eq!(poly.foreign_key, "something_id");
        assert_eq!(poly.discriminator.as_deref(), Some("something_type"));
    }

    #[test]
    fn has_many_keys_derive_from_owner_or_inverse() {
        let schema = sample();
        let rel = schema.relation("Group", "users").unwrap();
        assert_eq!(rel.foreign_key, "group_id");
        assert!(!rel.polymorphic);

        let poly = schema.relation("Organisation", "groups").unwrap();
        assert!(poly.polymorphic);
        assert_eq!(poly.foreign_key, "something_id");
        assert_eq!(poly.discriminator.as_deref(), Some("something_type"));
    }

    #[test]
    fn habtm_keys_on_both_sides() {
        let schema = sample();
        let rel = schema.relation("User", "tags").unwrap();
        assert_eq!(rel.foreign_key, "tag_ids");
        assert_eq!(rel.inverse_foreign_key.as_deref(), Some("user_ids"));
    }

    #[test]
    fn unknown_target_rejected() {
        let err = Schema::from_models(vec![ModelDef::new("User").belongs_to("group", "Group")])
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownTarget { .. }));
    }

    #[test]
    fn duplicate_model_rejected() {
        let err = Schema::from_models(vec![ModelDef::new("User"), ModelDef::new("User")])
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateModel { .. }));
    }

    #[test]
    fn schema_from_toml() {
        let schema = Schema::from_toml_str(
            r#"
            [[models]]
            name = "User"
            timestamps = { created = "long", updated = "short" }
            defaults = { role = "member" }
            relations = [
              { name = "group", kind = "belongs_to", target = "Group" },
              { name = "tags", kind = "habtm", inverse_foreign_key = "members" },
            ]

            [[models]]
            name = "Group"

            [[models]]
            name = "Tag"
            "#,
        )
        .unwrap();

        let ts = schema.timestamps("User");
        assert_eq!(ts.created_field(), Some("created_at"));
        assert_eq!(ts.updated_field(), Some("u_at"));
        assert_eq!(
            schema.field_defaults("User").unwrap().get("role"),
            Some(&json!("member"))
        );
        let tags = schema.relation("User", "tags").unwrap();
        assert_eq!(tags.kind, RelationKind::HasAndBelongsToMany);
        assert_eq!(tags.target, "Tag");
        assert_eq!(tags.inverse_foreign_key.as_deref(), Some("members"));
    }

    #[test]
    fn unknown_model_has_no_metadata() {
        let schema = sample();
        assert!(!schema.has_model("Ghost"));
        assert!(schema.relations_of("Ghost").is_empty());
        assert!(schema.field_defaults("Ghost").is_none());
        assert_eq!(schema.timestamps("Ghost"), Timestamps::default());
    }
}
