//! Schema model: the parsed form of a format description document.
//!
//! A document deserializes into raw `*Def` types mirroring its YAML shape,
//! then converts into the core model. Conversion parses every expression
//! attribute eagerly and evaluates enum keys against an empty context, so a
//! malformed expression fails at schema-load time, never during decoding.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::errors::SchemaError;
use crate::expr::ops::value_eq;
use crate::expr::{Expr, NoResolve};
use crate::reader::ByteOrder;
use crate::value::Value;

/// What a field's `type:` attribute resolved to: a literal name, or a switch
/// whose discriminant picks a name at decode time.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Name(String),
    Switch {
        on: Expr,
        /// Cases in declaration order; the first whose key equals the
        /// discriminant wins.
        cases: Vec<Case>,
        /// Type selected when no case matches (`_` key).
        default: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub key: Expr,
    pub type_name: String,
}

/// Looping mode of an array-valued field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Repeat {
    #[default]
    None,
    /// Until the end of the current region.
    Eos,
    /// Post-checked predicate; always decodes at least one element.
    Until(Expr),
    /// Fixed count, evaluated once before the loop.
    Count(Expr),
}

/// One enum entry: decoded value and its symbolic name.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumEntry {
    pub value: Value,
    pub sym: String,
}

/// Bidirectional value/symbol mapping, built at load time from
/// expression-keyed entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnumSpec {
    pub entries: Vec<EnumEntry>,
}

impl EnumSpec {
    /// Symbol for a decoded value, if any entry matches.
    pub fn sym_for(&self, v: &Value) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| value_eq(&e.value, v).unwrap_or(false))
            .map(|e| e.sym.as_str())
    }

    /// Value for a symbol, used by `ns::name` expression lookups.
    pub fn value_of(&self, sym: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|e| e.sym == sym)
            .map(|e| &e.value)
    }
}

/// A node in the parsed schema tree: one field specification, or a named
/// type/instance definition (these share the same attribute set).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeSpec {
    pub id: String,
    /// Per-type endianness overrides from `meta`.
    pub endian: Option<ByteOrder>,
    pub bit_endian: Option<ByteOrder>,

    pub type_ref: Option<TypeRef>,

    pub size: Option<Expr>,
    pub size_eos: bool,
    /// Literal bytes the field must equal, length computed at load time.
    pub contents: Option<Vec<u8>>,

    pub repeat: Repeat,
    pub enum_name: Option<String>,
    /// Guard expression; false skips the field entirely.
    pub cond: Option<Expr>,

    /// Instance-only: directly computed value.
    pub value: Option<Expr>,
    /// Instance-only: byte position for a positioned re-decode.
    pub pos: Option<Expr>,

    pub seq: Vec<TypeSpec>,
    pub types: BTreeMap<String, TypeSpec>,
    pub enums: BTreeMap<String, EnumSpec>,
    pub instances: BTreeMap<String, TypeSpec>,
}

/// A loaded schema: the root type definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub root: TypeSpec,
}

impl Schema {
    /// Parses a YAML format description.
    pub fn parse_str(src: &str) -> Result<Schema, SchemaError> {
        let def: TypeDef = serde_yaml::from_str(src).map_err(SchemaError::Document)?;
        let id = def
            .meta
            .as_ref()
            .and_then(|m| m.id.clone())
            .unwrap_or_default();
        Ok(Schema {
            root: convert_type(def, id)?,
        })
    }
}

// raw document shapes

/// Expression attribute written as any YAML scalar (`size: 4`,
/// `if: a > 0`, `value: true`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScalarDef {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ScalarDef {
    fn text(&self) -> String {
        match self {
            ScalarDef::Bool(v) => v.to_string(),
            ScalarDef::Int(v) => v.to_string(),
            ScalarDef::Float(v) => v.to_string(),
            ScalarDef::Str(v) => v.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
enum EndianDef {
    #[serde(rename = "le")]
    Le,
    #[serde(rename = "be")]
    Be,
}

impl From<EndianDef> for ByteOrder {
    fn from(e: EndianDef) -> ByteOrder {
        match e {
            EndianDef::Le => ByteOrder::Little,
            EndianDef::Be => ByteOrder::Big,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetaDef {
    id: Option<String>,
    #[allow(dead_code)]
    title: Option<String>,
    endian: Option<EndianDef>,
    #[serde(rename = "bit-endian")]
    bit_endian: Option<EndianDef>,
}

/// `type:` is either a bare name or a switch object; resolved by attempted
/// decode in this order, fixed at parse time.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeRefDef {
    Name(String),
    Switch {
        #[serde(rename = "switch-on")]
        switch_on: ScalarDef,
        cases: serde_yaml::Mapping,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsDef {
    Str(String),
    List(Vec<ContentsItemDef>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsItemDef {
    Int(i64),
    Str(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnumValDef {
    Sym(String),
    Entry {
        id: String,
        #[allow(dead_code)]
        doc: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct TypeDef {
    meta: Option<MetaDef>,
    id: Option<String>,
    #[serde(rename = "type")]
    type_ref: Option<TypeRefDef>,

    size: Option<ScalarDef>,
    #[serde(rename = "size-eos", default)]
    size_eos: bool,
    contents: Option<ContentsDef>,

    repeat: Option<String>,
    #[serde(rename = "repeat-expr")]
    repeat_expr: Option<ScalarDef>,
    #[serde(rename = "repeat-until")]
    repeat_until: Option<ScalarDef>,

    #[serde(rename = "enum")]
    enum_name: Option<String>,

    #[serde(rename = "if")]
    cond: Option<ScalarDef>,

    value: Option<ScalarDef>,
    pos: Option<ScalarDef>,

    #[serde(default)]
    seq: Vec<TypeDef>,
    #[serde(default)]
    types: BTreeMap<String, TypeDef>,
    #[serde(default)]
    enums: BTreeMap<String, serde_yaml::Mapping>,
    #[serde(default)]
    instances: BTreeMap<String, TypeDef>,
}

fn parse_expr(text: &str) -> Result<Expr, SchemaError> {
    Expr::parse(text).map_err(|err| SchemaError::Expr {
        text: text.to_string(),
        err,
    })
}

fn parse_opt(def: &Option<ScalarDef>) -> Result<Option<Expr>, SchemaError> {
    def.as_ref().map(|d| parse_expr(&d.text())).transpose()
}

/// Renders a YAML mapping key (expression or symbol position) as text.
fn key_text(v: &serde_yaml::Value) -> Result<String, SchemaError> {
    match v {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(SchemaError::Shape(format!(
            "expected a scalar key, got {:?}",
            other
        ))),
    }
}

fn convert_switch(switch_on: ScalarDef, cases: serde_yaml::Mapping) -> Result<TypeRef, SchemaError> {
    let on = parse_expr(&switch_on.text())?;
    let mut out = Vec::with_capacity(cases.len());
    let mut default = None;

    // declaration order is preserved; first matching case wins at decode time
    for (k, v) in &cases {
        let key = key_text(k)?;
        let type_name = match v {
            serde_yaml::Value::String(s) => s.clone(),
            other => {
                return Err(SchemaError::Shape(format!(
                    "switch case value must be a type name, got {:?}",
                    other
                )));
            }
        };
        if key.trim() == "_" {
            default = Some(type_name);
            continue;
        }
        out.push(Case {
            key: parse_expr(&key)?,
            type_name,
        });
    }

    Ok(TypeRef::Switch {
        on,
        cases: out,
        default,
    })
}

fn convert_contents(def: ContentsDef) -> Result<Vec<u8>, SchemaError> {
    match def {
        ContentsDef::Str(s) => Ok(s.into_bytes()),
        ContentsDef::List(items) => {
            let mut bytes = Vec::new();
            for item in items {
                match item {
                    ContentsItemDef::Int(v) if (0..=255).contains(&v) => bytes.push(v as u8),
                    ContentsItemDef::Int(v) => {
                        return Err(SchemaError::Contents(format!(
                            "invalid non-byte integer: {}",
                            v
                        )));
                    }
                    ContentsItemDef::Str(s) => bytes.extend_from_slice(s.as_bytes()),
                }
            }
            Ok(bytes)
        }
    }
}

fn convert_repeat(def: &TypeDef, id: &str) -> Result<Repeat, SchemaError> {
    let Some(mode) = def.repeat.as_deref() else {
        return Ok(Repeat::None);
    };
    match mode {
        "eos" => Ok(Repeat::Eos),
        "until" => match &def.repeat_until {
            Some(e) => Ok(Repeat::Until(parse_expr(&e.text())?)),
            None => Err(SchemaError::Repeat {
                id: id.to_string(),
                detail: "until without repeat-until".to_string(),
            }),
        },
        "expr" => match &def.repeat_expr {
            Some(e) => Ok(Repeat::Count(parse_expr(&e.text())?)),
            None => Err(SchemaError::Repeat {
                id: id.to_string(),
                detail: "expr without repeat-expr".to_string(),
            }),
        },
        other => Err(SchemaError::Repeat {
            id: id.to_string(),
            detail: format!("unknown mode {}", other),
        }),
    }
}

fn convert_enum(def: serde_yaml::Mapping) -> Result<EnumSpec, SchemaError> {
    let mut entries = Vec::with_capacity(def.len());
    for (k, v) in &def {
        let text = key_text(k)?;
        let expr = parse_expr(&text)?;
        let value = expr.eval(&mut NoResolve).map_err(|err| SchemaError::EnumKey {
            text: text.clone(),
            err,
        })?;
        let sym = match serde_yaml::from_value::<EnumValDef>(v.clone()) {
            Ok(EnumValDef::Sym(s)) => s,
            Ok(EnumValDef::Entry { id, .. }) => id,
            Err(_) => {
                return Err(SchemaError::Shape(format!(
                    "enum entry for key {} must be a name or an id object",
                    text
                )));
            }
        };
        entries.push(EnumEntry { value, sym });
    }
    Ok(EnumSpec { entries })
}

fn convert_type(def: TypeDef, id: String) -> Result<TypeSpec, SchemaError> {
    let repeat = convert_repeat(&def, &id)?;

    let type_ref = match def.type_ref {
        None => None,
        Some(TypeRefDef::Name(name)) => Some(TypeRef::Name(name)),
        Some(TypeRefDef::Switch { switch_on, cases }) => Some(convert_switch(switch_on, cases)?),
    };

    let value = parse_opt(&def.value)?;
    let pos = parse_opt(&def.pos)?;
    if value.is_some() && pos.is_some() {
        return Err(SchemaError::Instance {
            id,
            detail: "value and pos are mutually exclusive".to_string(),
        });
    }

    let mut seq = Vec::with_capacity(def.seq.len());
    for field in def.seq {
        let field_id = field.id.clone().unwrap_or_default();
        seq.push(convert_type(field, field_id)?);
    }

    let mut types = BTreeMap::new();
    for (name, t) in def.types {
        types.insert(name.clone(), convert_type(t, name)?);
    }

    let mut enums = BTreeMap::new();
    for (name, e) in def.enums {
        enums.insert(name, convert_enum(e)?);
    }

    let mut instances = BTreeMap::new();
    for (name, t) in def.instances {
        let inst = convert_type(t, name.clone())?;
        if inst.value.is_none() && inst.pos.is_none() {
            return Err(SchemaError::Instance {
                id: name,
                detail: "needs value or pos".to_string(),
            });
        }
        instances.insert(name, inst);
    }

    Ok(TypeSpec {
        id,
        endian: def.meta.as_ref().and_then(|m| m.endian).map(Into::into),
        bit_endian: def.meta.as_ref().and_then(|m| m.bit_endian).map(Into::into),
        type_ref,
        size: parse_opt(&def.size)?,
        size_eos: def.size_eos,
        contents: def.contents.map(convert_contents).transpose()?,
        repeat,
        enum_name: def.enum_name,
        cond: parse_opt(&def.cond)?,
        value,
        pos,
        seq,
        types,
        enums,
        instances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_seq() {
        let s = Schema::parse_str(
            "
meta:
  id: point
  endian: le
seq:
  - id: x
    type: u2
  - id: y
    type: u2
",
        )
        .unwrap();
        assert_eq!(s.root.id, "point");
        assert_eq!(s.root.endian, Some(ByteOrder::Little));
        assert_eq!(s.root.seq.len(), 2);
        assert_eq!(s.root.seq[0].type_ref, Some(TypeRef::Name("u2".into())));
    }

    #[test]
    fn test_expressions_parse_at_load() {
        let s = Schema::parse_str(
            "
seq:
  - id: len
    type: u1
  - id: body
    size: len * 2
    if: len > 0
",
        )
        .unwrap();
        let body = &s.root.seq[1];
        assert_eq!(body.size.as_ref().unwrap().text, "len * 2");
        assert_eq!(body.cond.as_ref().unwrap().text, "len > 0");
    }

    #[test]
    fn test_malformed_expression_fails_at_load() {
        let err = Schema::parse_str(
            "
seq:
  - id: body
    size: len +
",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Expr { .. }));
    }

    #[test]
    fn test_switch_cases_keep_declaration_order() {
        let s = Schema::parse_str(
            "
seq:
  - id: body
    type:
      switch-on: kind
      cases:
        1: alpha
        2: beta
        _: fallback
",
        )
        .unwrap();
        match s.root.seq[0].type_ref.as_ref().unwrap() {
            TypeRef::Switch { on, cases, default } => {
                assert_eq!(on.text, "kind");
                assert_eq!(cases.len(), 2);
                assert_eq!(cases[0].type_name, "alpha");
                assert_eq!(cases[1].type_name, "beta");
                assert_eq!(default.as_deref(), Some("fallback"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_enum_keys_evaluate_at_load() {
        let s = Schema::parse_str(
            "
seq: []
enums:
  color:
    0x10: red
    0x20:
      id: green
      doc: greenish
",
        )
        .unwrap();
        let e = &s.root.enums["color"];
        assert_eq!(e.sym_for(&Value::Int(0x10)), Some("red"));
        assert_eq!(e.sym_for(&Value::Int(0x20)), Some("green"));
        assert_eq!(e.sym_for(&Value::Int(0x30)), None);
        assert_eq!(e.value_of("red"), Some(&Value::Int(0x10)));
    }

    #[test]
    fn test_contents_byte_length_without_eval() {
        let s = Schema::parse_str(
            "
seq:
  - id: magic
    contents: [0x89, 'PNG', 13, 10]
  - id: tag
    contents: ab
",
        )
        .unwrap();
        assert_eq!(
            s.root.seq[0].contents.as_deref(),
            Some(&[0x89, b'P', b'N', b'G', 13, 10][..])
        );
        assert_eq!(s.root.seq[1].contents.as_deref(), Some(&b"ab"[..]));
    }

    #[test]
    fn test_contents_rejects_non_byte() {
        let err = Schema::parse_str(
            "
seq:
  - id: magic
    contents: [300]
",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Contents(_)));
    }

    #[test]
    fn test_repeat_validation() {
        assert!(matches!(
            Schema::parse_str(
                "
seq:
  - id: xs
    type: u1
    repeat: until
",
            )
            .unwrap_err(),
            SchemaError::Repeat { .. }
        ));
        assert!(matches!(
            Schema::parse_str(
                "
seq:
  - id: xs
    type: u1
    repeat: forever
",
            )
            .unwrap_err(),
            SchemaError::Repeat { .. }
        ));
    }

    #[test]
    fn test_instance_needs_value_or_pos() {
        let err = Schema::parse_str(
            "
seq: []
instances:
  broken:
    type: u1
",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Instance { .. }));
    }

    #[test]
    fn test_nested_types_get_ids() {
        let s = Schema::parse_str(
            "
seq:
  - id: hdr
    type: header
types:
  header:
    seq:
      - id: len
        type: u1
",
        )
        .unwrap();
        assert_eq!(s.root.types["header"].id, "header");
        assert_eq!(s.root.types["header"].seq[0].id, "len");
    }
}
