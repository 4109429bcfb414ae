//! Declared types and the introspection questions the walker asks of them.
//!
//! Saves carry their own type registry, the way a self-describing runtime
//! serializer embeds type information next to the data. The walker never
//! looks at type names; it asks [`TypeRegistry::classify`] for the [`Shape`]
//! of a declared type and dispatches on that.

use super::value::{BigInteger, MapKey, Record, Value};
use crate::error::TypeError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default construction gives up past this nesting depth.
const MAX_DEFAULT_DEPTH: usize = 64;

/// The kinds of terminal values the editor knows how to parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Text,
    BigInt,
    Enum { name: String, variants: Vec<String> },
}

impl ScalarKind {
    /// Display name of the kind, used in type labels and parse errors.
    pub fn label(&self) -> String {
        match self {
            ScalarKind::Bool => "bool".to_string(),
            ScalarKind::I8 => "i8".to_string(),
            ScalarKind::I16 => "i16".to_string(),
            ScalarKind::I32 => "i32".to_string(),
            ScalarKind::I64 => "i64".to_string(),
            ScalarKind::U8 => "u8".to_string(),
            ScalarKind::U16 => "u16".to_string(),
            ScalarKind::U32 => "u32".to_string(),
            ScalarKind::U64 => "u64".to_string(),
            ScalarKind::F32 => "f32".to_string(),
            ScalarKind::F64 => "f64".to_string(),
            ScalarKind::Text => "String".to_string(),
            ScalarKind::BigInt => "BigInteger".to_string(),
            ScalarKind::Enum { name, .. } => name.clone(),
        }
    }

    /// The value a freshly constructed instance of this kind holds.
    pub fn zero(&self) -> Value {
        match self {
            ScalarKind::Bool => Value::Bool(false),
            ScalarKind::I8 | ScalarKind::I16 | ScalarKind::I32 | ScalarKind::I64 => Value::Int(0),
            ScalarKind::U8 | ScalarKind::U16 | ScalarKind::U32 | ScalarKind::U64 => Value::UInt(0),
            ScalarKind::F32 | ScalarKind::F64 => Value::Float(0.0),
            ScalarKind::Text => Value::Text(String::new()),
            ScalarKind::BigInt => Value::BigInt(BigInteger::zero()),
            ScalarKind::Enum { variants, .. } => variants
                .first()
                .map(|v| Value::Enum(v.clone()))
                .unwrap_or(Value::Null),
        }
    }

    /// Parses operator input as a value of this kind.
    ///
    /// Integer kinds are range-checked against their width.
    pub fn parse(&self, input: &str) -> Result<Value, TypeError> {
        let fail = |reason: String| TypeError::Parse {
            kind: self.label(),
            input: input.to_string(),
            reason,
        };
        let trimmed = input.trim();

        match self {
            ScalarKind::Bool => match trimmed {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(fail("expected true or false".to_string())),
            },
            ScalarKind::I8 => parse_signed(trimmed, i8::MIN as i64, i8::MAX as i64).map_err(fail),
            ScalarKind::I16 => {
                parse_signed(trimmed, i16::MIN as i64, i16::MAX as i64).map_err(fail)
            }
            ScalarKind::I32 => {
                parse_signed(trimmed, i32::MIN as i64, i32::MAX as i64).map_err(fail)
            }
            ScalarKind::I64 => parse_signed(trimmed, i64::MIN, i64::MAX).map_err(fail),
            ScalarKind::U8 => parse_unsigned(trimmed, u8::MAX as u64).map_err(fail),
            ScalarKind::U16 => parse_unsigned(trimmed, u16::MAX as u64).map_err(fail),
            ScalarKind::U32 => parse_unsigned(trimmed, u32::MAX as u64).map_err(fail),
            ScalarKind::U64 => parse_unsigned(trimmed, u64::MAX).map_err(fail),
            ScalarKind::F32 => trimmed
                .parse::<f32>()
                .map_err(|e| e.to_string())
                .and_then(|f| finite(f as f64))
                .map_err(fail),
            ScalarKind::F64 => trimmed
                .parse::<f64>()
                .map_err(|e| e.to_string())
                .and_then(finite)
                .map_err(fail),
            // text is taken verbatim, whitespace included
            ScalarKind::Text => Ok(Value::Text(input.to_string())),
            ScalarKind::BigInt => trimmed.parse::<BigInteger>().map(Value::BigInt).map_err(fail),
            ScalarKind::Enum { variants, .. } => {
                if variants.iter().any(|v| v == trimmed) {
                    Ok(Value::Enum(trimmed.to_string()))
                } else {
                    Err(fail(format!("expected one of {}", variants.join(", "))))
                }
            }
        }
    }

    /// Parses operator input as a map key of this kind.
    pub fn parse_key(&self, input: &str) -> Result<MapKey, TypeError> {
        if !self.is_key_kind() {
            return Err(TypeError::UnsupportedKey(self.label()));
        }
        let value = self.parse(input)?;
        MapKey::from_value(&value).ok_or_else(|| TypeError::UnsupportedKey(self.label()))
    }

    /// Floats and big integers have no usable hash identity as keys.
    pub fn is_key_kind(&self) -> bool {
        !matches!(
            self,
            ScalarKind::F32 | ScalarKind::F64 | ScalarKind::BigInt
        )
    }
}

fn parse_signed(input: &str, min: i64, max: i64) -> Result<Value, String> {
    let n = input.parse::<i64>().map_err(|e| e.to_string())?;
    if n < min || n > max {
        return Err(format!("out of range {}..={}", min, max));
    }
    Ok(Value::Int(n))
}

// text codecs have no spelling for NaN or infinity
fn finite(f: f64) -> Result<Value, String> {
    if f.is_finite() {
        Ok(Value::Float(f))
    } else {
        Err("must be a finite number".to_string())
    }
}

fn parse_unsigned(input: &str, max: u64) -> Result<Value, String> {
    let n = input.parse::<u64>().map_err(|e| e.to_string())?;
    if n > max {
        return Err(format!("out of range 0..={}", max));
    }
    Ok(Value::UInt(n))
}

/// A declared (static) type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeDesc {
    Scalar(ScalarKind),
    /// Fixed-size ordered sequence
    Array(Box<TypeDesc>),
    /// Growable ordered sequence
    List(Box<TypeDesc>),
    Map {
        key: ScalarKind,
        value: Box<TypeDesc>,
    },
    Set(Box<TypeDesc>),
    /// A record type, by name in the registry
    Record(String),
}

impl TypeDesc {
    pub fn scalar(kind: ScalarKind) -> Self {
        TypeDesc::Scalar(kind)
    }

    pub fn array(element: TypeDesc) -> Self {
        TypeDesc::Array(Box::new(element))
    }

    pub fn list(element: TypeDesc) -> Self {
        TypeDesc::List(Box::new(element))
    }

    pub fn map(key: ScalarKind, value: TypeDesc) -> Self {
        TypeDesc::Map {
            key,
            value: Box::new(value),
        }
    }

    pub fn set(element: TypeDesc) -> Self {
        TypeDesc::Set(Box::new(element))
    }

    pub fn record(name: impl Into<String>) -> Self {
        TypeDesc::Record(name.into())
    }
}

/// Class records are referenced, struct records are copied by assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Class,
    Struct,
}

/// How a record member may be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberAccess {
    ReadWrite,
    ReadOnly,
    WriteOnly,
    Static,
    Const,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberDesc {
    pub name: String,
    pub ty: TypeDesc,
    pub access: MemberAccess,
}

impl MemberDesc {
    pub fn new(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self {
            name: name.into(),
            ty,
            access: MemberAccess::ReadWrite,
        }
    }

    pub fn with_access(mut self, access: MemberAccess) -> Self {
        self.access = access;
        self
    }

    /// Instance members that belong to each record value.
    pub fn is_instance(&self) -> bool {
        !matches!(self.access, MemberAccess::Static | MemberAccess::Const)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordDesc {
    pub name: String,
    pub kind: RecordKind,
    #[serde(default)]
    pub is_abstract: bool,
    pub members: Vec<MemberDesc>,
}

impl RecordDesc {
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RecordKind::Class,
            is_abstract: false,
            members: Vec::new(),
        }
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Self {
            kind: RecordKind::Struct,
            ..Self::class(name)
        }
    }

    pub fn abstract_class(name: impl Into<String>) -> Self {
        Self {
            is_abstract: true,
            ..Self::class(name)
        }
    }

    pub fn member(mut self, member: MemberDesc) -> Self {
        self.members.push(member);
        self
    }

    pub fn field(self, name: impl Into<String>, ty: TypeDesc) -> Self {
        self.member(MemberDesc::new(name, ty))
    }
}

/// Structural classification of a declared type.
///
/// The element/member types are borrowed from the declared type (or the
/// registry), so dispatching on a shape never clones type descriptions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape<'a> {
    Scalar(&'a ScalarKind),
    FixedSequence(&'a TypeDesc),
    GrowableSequence(&'a TypeDesc),
    KeyedMap {
        key: &'a ScalarKind,
        value: &'a TypeDesc,
    },
    UnorderedSet(&'a TypeDesc),
    Record(&'a RecordDesc),
    /// Abstract or unregistered types; shown but never descended into
    Opaque,
}

/// The save's type system: every record type that appears in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeRegistry {
    records: IndexMap<String, RecordDesc>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, record: RecordDesc) {
        self.records.insert(record.name.clone(), record);
    }

    pub fn with(mut self, record: RecordDesc) -> Self {
        self.register(record);
        self
    }

    pub fn record(&self, name: &str) -> Option<&RecordDesc> {
        self.records.get(name)
    }

    pub fn records(&self) -> impl Iterator<Item = &RecordDesc> {
        self.records.values()
    }

    /// Classifies a declared type by shape.
    pub fn classify<'a>(&'a self, ty: &'a TypeDesc) -> Shape<'a> {
        match ty {
            TypeDesc::Scalar(kind) => Shape::Scalar(kind),
            TypeDesc::Array(element) => Shape::FixedSequence(element),
            TypeDesc::List(element) => Shape::GrowableSequence(element),
            TypeDesc::Map { key, value } => Shape::KeyedMap { key, value },
            TypeDesc::Set(element) => Shape::UnorderedSet(element),
            TypeDesc::Record(name) => match self.records.get(name) {
                Some(record) if !record.is_abstract => Shape::Record(record),
                _ => Shape::Opaque,
            },
        }
    }

    /// Members the tree overlay shows for a record: instance members that
    /// are both readable and writable and whose declared type can exist.
    pub fn editable_members<'a>(
        &'a self,
        record: &'a RecordDesc,
    ) -> impl Iterator<Item = &'a MemberDesc> + 'a {
        record.members.iter().filter(move |member| {
            member.access == MemberAccess::ReadWrite && self.is_instantiable(&member.ty)
        })
    }

    pub fn is_instantiable(&self, ty: &TypeDesc) -> bool {
        match ty {
            TypeDesc::Record(name) => self.records.get(name).is_some_and(|r| !r.is_abstract),
            _ => true,
        }
    }

    /// True for types copied by assignment rather than referenced. Text is
    /// a reference type: an unassigned string slot holds null.
    pub fn is_value_type(&self, ty: &TypeDesc) -> bool {
        match ty {
            TypeDesc::Scalar(ScalarKind::Text) => false,
            TypeDesc::Scalar(_) => true,
            TypeDesc::Record(name) => self
                .records
                .get(name)
                .is_some_and(|r| r.kind == RecordKind::Struct),
            _ => false,
        }
    }

    /// The value a slot of this type holds when nothing was assigned:
    /// a default instance for value types, null for everything else.
    pub fn zero_value(&self, ty: &TypeDesc) -> Result<Value, TypeError> {
        if self.is_value_type(ty) {
            self.default_instance(ty)
        } else {
            Ok(Value::Null)
        }
    }

    /// Constructs a fresh instance of a declared type, as a parameterless
    /// constructor would. Record members get their zero values.
    pub fn default_instance(&self, ty: &TypeDesc) -> Result<Value, TypeError> {
        self.default_instance_at(ty, 0)
    }

    fn default_instance_at(&self, ty: &TypeDesc, depth: usize) -> Result<Value, TypeError> {
        if depth > MAX_DEFAULT_DEPTH {
            return Err(TypeError::RecursiveDefault(self.type_label(ty)));
        }

        match ty {
            TypeDesc::Scalar(kind) => Ok(kind.zero()),
            TypeDesc::Array(_) | TypeDesc::List(_) => Ok(Value::Seq(Vec::new())),
            TypeDesc::Map { .. } => Ok(Value::Map(IndexMap::new())),
            TypeDesc::Set(_) => Ok(Value::Set(Vec::new())),
            TypeDesc::Record(name) => {
                let record = self
                    .records
                    .get(name)
                    .ok_or_else(|| TypeError::UnknownRecord(name.clone()))?;
                if record.is_abstract {
                    return Err(TypeError::NotInstantiable(name.clone()));
                }

                let mut instance = Record::new(name.clone());
                for member in record.members.iter().filter(|m| m.is_instance()) {
                    let value = if self.is_value_type(&member.ty) {
                        self.default_instance_at(&member.ty, depth + 1)?
                    } else {
                        Value::Null
                    };
                    instance.fields.insert(member.name.clone(), value);
                }
                Ok(Value::Record(instance))
            }
        }
    }

    /// Generic-notation label for a type, e.g. `Map<String, List<Item>>`.
    pub fn type_label(&self, ty: &TypeDesc) -> String {
        match ty {
            TypeDesc::Scalar(kind) => kind.label(),
            TypeDesc::Array(element) => format!("{}[]", self.type_label(element)),
            TypeDesc::List(element) => format!("List<{}>", self.type_label(element)),
            TypeDesc::Map { key, value } => {
                format!("Map<{}, {}>", key.label(), self.type_label(value))
            }
            TypeDesc::Set(element) => format!("Set<{}>", self.type_label(element)),
            TypeDesc::Record(name) => name.clone(),
        }
    }

    /// Record names referenced by a type that the registry does not define.
    pub fn missing_records(&self, ty: &TypeDesc) -> Vec<String> {
        let mut missing = Vec::new();
        self.collect_missing(ty, &mut missing);
        for record in self.records.values() {
            for member in &record.members {
                self.collect_missing(&member.ty, &mut missing);
            }
        }
        missing.sort();
        missing.dedup();
        missing
    }

    fn collect_missing(&self, ty: &TypeDesc, missing: &mut Vec<String>) {
        match ty {
            TypeDesc::Scalar(_) => {}
            TypeDesc::Array(inner) | TypeDesc::List(inner) | TypeDesc::Set(inner) => {
                self.collect_missing(inner, missing)
            }
            TypeDesc::Map { value, .. } => self.collect_missing(value, missing),
            TypeDesc::Record(name) => {
                if !self.records.contains_key(name) {
                    missing.push(name.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
            .with(
                RecordDesc::structure("Vec2")
                    .field("x", TypeDesc::scalar(ScalarKind::F32))
                    .field("y", TypeDesc::scalar(ScalarKind::F32)),
            )
            .with(RecordDesc::abstract_class("Entity"))
            .with(
                RecordDesc::class("Player")
                    .field("name", TypeDesc::scalar(ScalarKind::Text))
                    .field("position", TypeDesc::record("Vec2"))
                    .field("pet", TypeDesc::record("Player"))
                    .field("owner", TypeDesc::record("Entity"))
                    .member(
                        MemberDesc::new("id", TypeDesc::scalar(ScalarKind::U32))
                            .with_access(MemberAccess::ReadOnly),
                    )
                    .member(
                        MemberDesc::new("VERSION", TypeDesc::scalar(ScalarKind::I32))
                            .with_access(MemberAccess::Const),
                    ),
            )
    }

    #[test]
    fn test_classify_shapes() {
        let reg = registry();
        let list = TypeDesc::list(TypeDesc::scalar(ScalarKind::I32));
        let array = TypeDesc::array(TypeDesc::scalar(ScalarKind::I32));
        let player = TypeDesc::record("Player");
        let entity = TypeDesc::record("Entity");
        let unknown = TypeDesc::record("Nope");

        assert!(matches!(reg.classify(&list), Shape::GrowableSequence(_)));
        assert!(matches!(reg.classify(&array), Shape::FixedSequence(_)));
        assert!(matches!(reg.classify(&player), Shape::Record(r) if r.name == "Player"));
        assert_eq!(reg.classify(&entity), Shape::Opaque);
        assert_eq!(reg.classify(&unknown), Shape::Opaque);
    }

    #[test]
    fn test_editable_members_skip_readonly_const_and_abstract() {
        let reg = registry();
        let player = reg.record("Player").unwrap();
        let names: Vec<&str> = reg
            .editable_members(player)
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["name", "position", "pet"]);
    }

    #[test]
    fn test_default_instance_fills_members() {
        let reg = registry();
        let value = reg.default_instance(&TypeDesc::record("Player")).unwrap();
        let Value::Record(record) = value else {
            panic!("expected record");
        };

        assert_eq!(record.fields.get("name"), Some(&Value::Null));
        assert_eq!(record.fields.get("pet"), Some(&Value::Null));
        assert_eq!(record.fields.get("id"), Some(&Value::UInt(0)));
        assert!(!record.fields.contains_key("VERSION"));
        match record.fields.get("position") {
            Some(Value::Record(pos)) => {
                assert_eq!(pos.fields.get("x"), Some(&Value::Float(0.0)));
            }
            other => panic!("expected Vec2 instance, got {:?}", other),
        }
    }

    #[test]
    fn test_default_instance_of_abstract_fails() {
        let reg = registry();
        assert_eq!(
            reg.default_instance(&TypeDesc::record("Entity")),
            Err(TypeError::NotInstantiable("Entity".to_string()))
        );
    }

    #[test]
    fn test_recursive_struct_default_is_bounded() {
        let reg = TypeRegistry::new()
            .with(RecordDesc::structure("Loop").field("next", TypeDesc::record("Loop")));
        assert!(matches!(
            reg.default_instance(&TypeDesc::record("Loop")),
            Err(TypeError::RecursiveDefault(_))
        ));
    }

    #[test]
    fn test_zero_value_null_for_reference_types() {
        let reg = registry();
        assert_eq!(
            reg.zero_value(&TypeDesc::list(TypeDesc::scalar(ScalarKind::I32))),
            Ok(Value::Null)
        );
        assert_eq!(reg.zero_value(&TypeDesc::record("Player")), Ok(Value::Null));
        assert_eq!(
            reg.zero_value(&TypeDesc::scalar(ScalarKind::I64)),
            Ok(Value::Int(0))
        );
        assert_eq!(reg.zero_value(&TypeDesc::scalar(ScalarKind::Text)), Ok(Value::Null));
    }

    #[test]
    fn test_parse_integer_ranges() {
        assert_eq!(ScalarKind::U8.parse("255"), Ok(Value::UInt(255)));
        assert!(ScalarKind::U8.parse("256").is_err());
        assert!(ScalarKind::U32.parse("-1").is_err());
        assert_eq!(ScalarKind::I16.parse(" -300 "), Ok(Value::Int(-300)));
        assert!(ScalarKind::I32.parse("abc").is_err());
    }

    #[test]
    fn test_parse_other_kinds() {
        assert_eq!(ScalarKind::Bool.parse("true"), Ok(Value::Bool(true)));
        assert!(ScalarKind::Bool.parse("yes").is_err());
        assert_eq!(ScalarKind::F64.parse("2.5"), Ok(Value::Float(2.5)));
        assert_eq!(
            ScalarKind::Text.parse("  padded "),
            Ok(Value::Text("  padded ".to_string()))
        );

        let weapon = ScalarKind::Enum {
            name: "Weapon".to_string(),
            variants: vec!["Sword".to_string(), "Bow".to_string()],
        };
        assert_eq!(weapon.parse("Bow"), Ok(Value::Enum("Bow".to_string())));
        assert!(weapon.parse("Axe").is_err());
        assert_eq!(weapon.zero(), Value::Enum("Sword".to_string()));
    }

    #[test]
    fn test_parse_rejects_non_finite_floats() {
        assert!(ScalarKind::F64.parse("NaN").is_err());
        assert!(ScalarKind::F64.parse("inf").is_err());
        assert!(ScalarKind::F32.parse("-infinity").is_err());
        // overflows f32
        assert!(ScalarKind::F32.parse("1e40").is_err());
        assert_eq!(ScalarKind::F32.parse("1e30").map(|v| v.is_null()), Ok(false));
    }

    #[test]
    fn test_parse_key_rejects_float_kinds() {
        assert_eq!(
            ScalarKind::Text.parse_key("a"),
            Ok(MapKey::Text("a".to_string()))
        );
        assert!(matches!(
            ScalarKind::F32.parse_key("1.0"),
            Err(TypeError::UnsupportedKey(_))
        ));
    }

    #[test]
    fn test_type_labels() {
        let reg = registry();
        let ty = TypeDesc::map(
            ScalarKind::Text,
            TypeDesc::list(TypeDesc::array(TypeDesc::record("Vec2"))),
        );
        assert_eq!(reg.type_label(&ty), "Map<String, List<Vec2[]>>");
    }

    #[test]
    fn test_missing_records() {
        let reg = TypeRegistry::new()
            .with(RecordDesc::class("A").field("b", TypeDesc::record("B")));
        assert_eq!(
            reg.missing_records(&TypeDesc::list(TypeDesc::record("C"))),
            vec!["B".to_string(), "C".to_string()]
        );
    }
}
