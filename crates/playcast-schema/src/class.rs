//! Class descriptors and the class table built from the schema DSL.
//!
//! Building is two-pass: first collect every declared class name, then link
//! field types against that set, so classes may reference classes declared
//! later in the document (and themselves).

use std::collections::{BTreeMap, BTreeSet};

use playcast_definition::{FieldDef, PrimitiveName, SchemaDef};
use serde_json::Value as Json;

use crate::{Record, SchemaError, Value};

// ---------------------------------------------------------------------------
// Field kinds
// ---------------------------------------------------------------------------

/// Resolved type of one declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// `string` / `number` / `boolean`.
    Primitive(PrimitiveName),
    /// A single nested instance of the named class.
    Ref(String),
    /// A keyed collection of instances of the named class.
    Map(String),
    /// An ordered collection.
    Array(ElementKind),
}

/// Element type of an `array` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Primitive(PrimitiveName),
    Class(String),
}

// ---------------------------------------------------------------------------
// ClassDescriptor
// ---------------------------------------------------------------------------

/// Immutable description of one class: its name and declared fields.
///
/// Replication and navigation decisions consult the descriptor, never the
/// instance — instances are plain records.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    name: String,
    fields: BTreeMap<String, FieldKind>,
}

impl ClassDescriptor {
    /// The class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldKind)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The kind of one declared field.
    pub fn field(&self, name: &str) -> Option<&FieldKind> {
        self.fields.get(name)
    }
}

// ---------------------------------------------------------------------------
// ClassTable
// ---------------------------------------------------------------------------

/// All classes of one definition plus the root class name and per-class
/// primitive defaults. Built once at room creation, immutable after.
#[derive(Debug, Clone)]
pub struct ClassTable {
    root: String,
    classes: BTreeMap<String, ClassDescriptor>,
    defaults: BTreeMap<String, Json>,
}

impl ClassTable {
    /// Builds the table from the schema DSL.
    ///
    /// # Errors
    /// - [`SchemaError::UnknownRoot`] when `root` is undeclared
    /// - [`SchemaError::BadFieldRef`] when a field references an undeclared
    ///   class (array element names may instead be a primitive name)
    pub fn build(schema: &SchemaDef) -> Result<Self, SchemaError> {
        // Pass 1: collect declared names so forward references resolve.
        let declared: BTreeSet<&str> =
            schema.classes.keys().map(String::as_str).collect();

        if !declared.contains(schema.root.as_str()) {
            return Err(SchemaError::UnknownRoot(schema.root.clone()));
        }

        // Pass 2: link field types against the declared set.
        let mut classes = BTreeMap::new();
        for (class, fields) in &schema.classes {
            let mut linked = BTreeMap::new();
            for (field, def) in fields {
                let kind = link_field(&declared, class, field, def)?;
                linked.insert(field.clone(), kind);
            }
            classes.insert(
                class.clone(),
                ClassDescriptor {
                    name: class.clone(),
                    fields: linked,
                },
            );
        }

        Ok(Self {
            root: schema.root.clone(),
            classes,
            defaults: schema.defaults.clone(),
        })
    }

    /// The root class name.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Whether a class is declared.
    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// Descriptor lookup.
    pub fn descriptor(&self, class: &str) -> Option<&ClassDescriptor> {
        self.classes.get(class)
    }

    /// Constructs a fresh instance of `class`.
    ///
    /// Every `map` field starts as an empty keyed collection, every `array`
    /// field as an empty sequence; `ref` and primitive fields start null.
    /// Primitive defaults declared for the class are then applied; defaults
    /// for non-primitive fields are ignored at this layer (actions create
    /// nested instances explicitly).
    pub fn instantiate(&self, class: &str) -> Result<Value, SchemaError> {
        let desc = self
            .classes
            .get(class)
            .ok_or_else(|| SchemaError::UnknownClass(class.to_string()))?;

        let mut fields = BTreeMap::new();
        for (field, kind) in &desc.fields {
            let initial = match kind {
                FieldKind::Map(_) => Value::Map(BTreeMap::new()),
                FieldKind::Array(_) => Value::Array(Vec::new()),
                FieldKind::Primitive(_) | FieldKind::Ref(_) => Value::Null,
            };
            fields.insert(field.clone(), initial);
        }

        let mut record = Record::classed(class.to_string(), fields);
        if let Some(defaults) = self.defaults.get(class).and_then(Json::as_object) {
            for (field, default) in defaults {
                let is_primitive = matches!(
                    desc.fields.get(field),
                    Some(FieldKind::Primitive(_))
                );
                if is_primitive && !default.is_object() && !default.is_array() {
                    record.set(field, Value::from_json(default))?;
                }
            }
        }
        Ok(Value::Record(record))
    }

    /// Constructs an instance and assigns the supplied fields on top of
    /// defaults. Fields the class does not declare are skipped.
    pub fn instantiate_with_data(
        &self,
        class: &str,
        data: &Json,
    ) -> Result<Value, SchemaError> {
        let mut value = self.instantiate(class)?;
        let Value::Record(record) = &mut value else {
            unreachable!("instantiate always yields a record");
        };
        if let Some(fields) = data.as_object() {
            for (field, supplied) in fields {
                if record.get(field).is_some() {
                    record.set(field, Value::from_json(supplied))?;
                } else {
                    tracing::debug!(
                        class,
                        field,
                        "skipping field not declared by class"
                    );
                }
            }
        }
        Ok(value)
    }

    /// Constructs the root instance with its primitive defaults applied.
    pub fn instantiate_root(&self) -> Result<Value, SchemaError> {
        self.instantiate(&self.root)
    }
}

fn link_field(
    declared: &BTreeSet<&str>,
    class: &str,
    field: &str,
    def: &FieldDef,
) -> Result<FieldKind, SchemaError> {
    let check = |referenced: &str| -> Result<(), SchemaError> {
        if declared.contains(referenced) {
            Ok(())
        } else {
            Err(SchemaError::BadFieldRef {
                class: class.to_string(),
                field: field.to_string(),
                referenced: referenced.to_string(),
            })
        }
    };

    Ok(match def {
        FieldDef::Primitive { ty } => FieldKind::Primitive(*ty),
        FieldDef::Ref { class: c } => {
            check(c)?;
            FieldKind::Ref(c.clone())
        }
        FieldDef::Map { map } => {
            check(map)?;
            FieldKind::Map(map.clone())
        }
        FieldDef::Array { array } => match PrimitiveName::parse(array) {
            Some(p) => FieldKind::Array(ElementKind::Primitive(p)),
            None => {
                check(array)?;
                FieldKind::Array(ElementKind::Class(array.clone()))
            }
        },
    })
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(v: serde_json::Value) -> SchemaDef {
        serde_json::from_value(v).unwrap()
    }

    fn quiz_schema() -> SchemaDef {
        schema(json!({
            "root": "QuizState",
            "classes": {
                "QuizState": {
                    "players": {"map": "Player"},
                    "title": {"type": "string"}
                },
                "Player": {
                    "name": {"type": "string"},
                    "score": {"type": "number"},
                    "phase": {"type": "string"},
                    "currentQuestion": {"ref": "Question"}
                },
                "Question": {
                    "text": {"type": "string"},
                    "options": {"array": "string"}
                }
            },
            "defaults": {
                "QuizState": {"title": "Quiz"},
                "Player": {"score": 0, "phase": "waiting"}
            }
        }))
    }

    #[test]
    fn test_build_resolves_forward_references() {
        // Player references Question, declared after it in the document.
        let table = ClassTable::build(&quiz_schema()).unwrap();
        assert!(table.contains("Question"));
        assert_eq!(
            table.descriptor("Player").unwrap().field("currentQuestion"),
            Some(&FieldKind::Ref("Question".into()))
        );
    }

    #[test]
    fn test_build_rejects_unknown_root() {
        let s = schema(json!({"root": "Ghost", "classes": {"S": {}}}));
        assert!(matches!(
            ClassTable::build(&s),
            Err(SchemaError::UnknownRoot(_))
        ));
    }

    #[test]
    fn test_build_rejects_bad_field_ref() {
        let s = schema(json!({
            "root": "S",
            "classes": {"S": {"q": {"ref": "Missing"}}}
        }));
        let err = ClassTable::build(&s).unwrap_err();
        assert!(matches!(err, SchemaError::BadFieldRef { .. }));
    }

    #[test]
    fn test_array_element_may_be_primitive_or_class() {
        let s = schema(json!({
            "root": "S",
            "classes": {
                "S": {"tags": {"array": "string"}, "qs": {"array": "Q"}},
                "Q": {}
            }
        }));
        let table = ClassTable::build(&s).unwrap();
        let desc = table.descriptor("S").unwrap();
        assert_eq!(
            desc.field("tags"),
            Some(&FieldKind::Array(ElementKind::Primitive(PrimitiveName::String)))
        );
        assert_eq!(
            desc.field("qs"),
            Some(&FieldKind::Array(ElementKind::Class("Q".into())))
        );
    }

    #[test]
    fn test_instantiate_initializes_collections_and_defaults() {
        let table = ClassTable::build(&quiz_schema()).unwrap();
        let root = table.instantiate_root().unwrap();
        assert_eq!(
            root.to_json(),
            json!({"players": {}, "title": "Quiz"})
        );
    }

    #[test]
    fn test_instantiate_applies_class_defaults() {
        let table = ClassTable::build(&quiz_schema()).unwrap();
        let player = table.instantiate("Player").unwrap();
        let j = player.to_json();
        assert_eq!(j["score"], json!(0));
        assert_eq!(j["phase"], json!("waiting"));
        assert_eq!(j["currentQuestion"], json!(null));
    }

    #[test]
    fn test_instantiate_with_data_overrides_defaults() {
        let table = ClassTable::build(&quiz_schema()).unwrap();
        let player = table
            .instantiate_with_data("Player", &json!({"name": "ada", "score": 5}))
            .unwrap();
        let j = player.to_json();
        assert_eq!(j["name"], json!("ada"));
        assert_eq!(j["score"], json!(5));
        assert_eq!(j["phase"], json!("waiting"));
    }

    #[test]
    fn test_instantiate_with_data_skips_undeclared_fields() {
        let table = ClassTable::build(&quiz_schema()).unwrap();
        let player = table
            .instantiate_with_data("Player", &json!({"name": "ada", "rank": 1}))
            .unwrap();
        assert_eq!(player.to_json().get("rank"), None);
    }

    #[test]
    fn test_instantiate_unknown_class_is_an_error() {
        let table = ClassTable::build(&quiz_schema()).unwrap();
        assert!(matches!(
            table.instantiate("Ghost"),
            Err(SchemaError::UnknownClass(_))
        ));
    }
}
