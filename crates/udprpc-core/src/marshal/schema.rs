//! Closed type universe for the marshaller.
//!
//! Each persistable type registers a [`TypeDef`]: its wire name plus an ordered
//! list of fields with declared types. Frames carry the same names so a
//! receiver can check every field against its own table.

use std::collections::HashMap;

use super::MAX_DEPTH;
use crate::error::{Result, RpcError};

/// Declared type of a field or array element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Byte,
    Int,
    Long,
    Double,
    Str,
    Array(Box<FieldType>),
    /// Reference to a composite node of the named type.
    Object(String),
}

const STRING_TYPE: &str = "java.lang.String";

impl FieldType {
    pub fn array_of(elem: FieldType) -> Self {
        FieldType::Array(Box::new(elem))
    }

    pub fn object(type_name: impl Into<String>) -> Self {
        FieldType::Object(type_name.into())
    }

    /// Primitives are written raw, without a presence flag.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            FieldType::Bool | FieldType::Byte | FieldType::Int | FieldType::Long | FieldType::Double
        )
    }

    /// Name written into the field metadata of a frame.
    pub fn wire_name(&self) -> String {
        match self {
            FieldType::Bool => "boolean".into(),
            FieldType::Byte => "byte".into(),
            FieldType::Int => "int".into(),
            FieldType::Long => "long".into(),
            FieldType::Double => "double".into(),
            FieldType::Str => STRING_TYPE.into(),
            FieldType::Object(name) => name.clone(),
            FieldType::Array(_) => self.descriptor(),
        }
    }

    /// Array element descriptors (`[I`, `[Ljava.lang.String;`, ...).
    fn descriptor(&self) -> String {
        match self {
            FieldType::Bool => "Z".into(),
            FieldType::Byte => "B".into(),
            FieldType::Int => "I".into(),
            FieldType::Long => "J".into(),
            FieldType::Double => "D".into(),
            FieldType::Str => format!("L{STRING_TYPE};"),
            FieldType::Object(name) => format!("L{name};"),
            FieldType::Array(elem) => format!("[{}", elem.descriptor()),
        }
    }

    /// Inverse of [`FieldType::wire_name`].
    pub fn parse_wire_name(s: &str) -> Result<Self> {
        match s {
            "" => Err(RpcError::Schema("empty type name".into())),
            "boolean" => Ok(FieldType::Bool),
            "byte" => Ok(FieldType::Byte),
            "int" => Ok(FieldType::Int),
            "long" => Ok(FieldType::Long),
            "double" => Ok(FieldType::Double),
            STRING_TYPE => Ok(FieldType::Str),
            _ if s.starts_with('[') => Self::parse_descriptor(s),
            _ => Ok(FieldType::Object(s.to_string())),
        }
    }

    fn parse_descriptor(s: &str) -> Result<Self> {
        let bad = || RpcError::Schema(format!("malformed array type descriptor: {s}"));
        let mut depth = 0usize;
        let mut rest = s;
        while let Some(r) = rest.strip_prefix('[') {
            depth += 1;
            if depth > MAX_DEPTH {
                return Err(RpcError::Schema(format!(
                    "array type nested deeper than {MAX_DEPTH}"
                )));
            }
            rest = r;
        }
        let mut ty = match rest {
            "Z" => FieldType::Bool,
            "B" => FieldType::Byte,
            "I" => FieldType::Int,
            "J" => FieldType::Long,
            "D" => FieldType::Double,
            _ => {
                let name = rest
                    .strip_prefix('L')
                    .and_then(|r| r.strip_suffix(';'))
                    .filter(|n| !n.is_empty())
                    .ok_or_else(bad)?;
                if name == STRING_TYPE {
                    FieldType::Str
                } else {
                    FieldType::Object(name.to_string())
                }
            }
        };
        if depth == 0 {
            return Err(bad());
        }
        for _ in 0..depth {
            ty = FieldType::array_of(ty);
        }
        Ok(ty)
    }
}

/// One declared field of a composite type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    /// Transient fields live in memory only; they are never written and stay
    /// zero-initialized on decode.
    pub transient: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            transient: false,
        }
    }

    pub fn transient(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            transient: true,
            ..Self::new(name, ty)
        }
    }
}

/// Field table for one composite type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldDef::new(name, ty));
        self
    }

    pub fn transient_field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldDef::transient(name, ty));
        self
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Fields that appear on the wire, in declaration order.
    pub fn persisted(&self) -> impl Iterator<Item = (usize, &FieldDef)> {
        self.fields.iter().enumerate().filter(|(_, f)| !f.transient)
    }

    pub fn persisted_count(&self) -> usize {
        self.fields.iter().filter(|f| !f.transient).count()
    }
}

/// Registry of every type a peer knows how to build.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: HashMap<String, TypeDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type; duplicate field names are rejected.
    pub fn register(&mut self, def: TypeDef) -> Result<()> {
        for (i, f) in def.fields.iter().enumerate() {
            if def.fields[..i].iter().any(|g| g.name == f.name) {
                return Err(RpcError::Schema(format!(
                    "type {} declares field {} twice",
                    def.name, f.name
                )));
            }
        }
        self.types.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn resolve(&self, name: &str) -> Result<&TypeDef> {
        self.get(name)
            .ok_or_else(|| RpcError::Schema(format!("unknown type: {name}")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }
}
