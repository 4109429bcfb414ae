//! Blob codecs: bytes ⇄ [`SaveBlob`].
//!
//! The editor treats the encoding as a black box. Any codec that can
//! round-trip a `SaveBlob` without a schema of its own will do; bincode is
//! the default, JSON and YAML are there so saves can be inspected and
//! produced by hand.
//!
//! # Example
//!
//! ```
//! use savequill::document::schema::{ScalarKind, TypeDesc, TypeRegistry};
//! use savequill::document::value::Value;
//! use savequill::document::SaveBlob;
//! use savequill::file::codec::{BlobCodec, CodecKind};
//!
//! let blob = SaveBlob::new(
//!     TypeRegistry::new(),
//!     TypeDesc::scalar(ScalarKind::I32),
//!     Value::Int(7),
//! );
//! let codec = CodecKind::Json.codec();
//! let bytes = codec.encode(&blob).unwrap();
//! assert_eq!(codec.decode(&bytes).unwrap(), blob);
//! ```

use crate::document::SaveBlob;
use crate::error::{DecodeError, EncodeError};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A symmetric, schema-free encoding of whole saves.
pub trait BlobCodec {
    fn name(&self) -> &'static str;
    fn decode(&self, bytes: &[u8]) -> Result<SaveBlob, DecodeError>;
    fn encode(&self, blob: &SaveBlob) -> Result<Vec<u8>, EncodeError>;
}

/// Compact binary saves.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BlobCodec for BincodeCodec {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn decode(&self, bytes: &[u8]) -> Result<SaveBlob, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        bincode::deserialize(bytes).map_err(|e| DecodeError::Malformed {
            codec: self.name(),
            message: e.to_string(),
        })
    }

    fn encode(&self, blob: &SaveBlob) -> Result<Vec<u8>, EncodeError> {
        bincode::serialize(blob).map_err(|e| EncodeError::Serialize {
            codec: self.name(),
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl BlobCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&self, bytes: &[u8]) -> Result<SaveBlob, DecodeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::Empty);
        }
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed {
            codec: self.name(),
            message: e.to_string(),
        })
    }

    fn encode(&self, blob: &SaveBlob) -> Result<Vec<u8>, EncodeError> {
        reject_non_finite(self.name(), blob)?;
        let mut bytes = serde_json::to_vec_pretty(blob).map_err(|e| EncodeError::Serialize {
            codec: self.name(),
            message: e.to_string(),
        })?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

// serde_json writes NaN and infinity as null, which no float slot decodes
fn reject_non_finite(codec: &'static str, blob: &SaveBlob) -> Result<(), EncodeError> {
    if blob.root.has_non_finite_float() {
        return Err(EncodeError::Serialize {
            codec,
            message: "a float is NaN or infinite and has no text form".to_string(),
        });
    }
    Ok(())
}

/// Human-editable saves.
///
/// YAML goes through the JSON data model, so nested enums come out as plain
/// single-key maps instead of YAML tags (which cannot nest).
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl BlobCodec for YamlCodec {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn decode(&self, bytes: &[u8]) -> Result<SaveBlob, DecodeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::Empty);
        }
        let malformed = |message: String| DecodeError::Malformed {
            codec: "yaml",
            message,
        };
        let tree: serde_json::Value =
            serde_yaml::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;
        serde_json::from_value(tree).map_err(|e| malformed(e.to_string()))
    }

    fn encode(&self, blob: &SaveBlob) -> Result<Vec<u8>, EncodeError> {
        let serialize = |message: String| EncodeError::Serialize {
            codec: "yaml",
            message,
        };
        reject_non_finite(self.name(), blob)?;
        let tree = serde_json::to_value(blob).map_err(|e| serialize(e.to_string()))?;
        serde_yaml::to_string(&tree)
            .map(String::into_bytes)
            .map_err(|e| serialize(e.to_string()))
    }
}

/// Which codec to use for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    Bincode,
    Json,
    Yaml,
}

impl CodecKind {
    pub fn codec(self) -> Box<dyn BlobCodec> {
        match self {
            CodecKind::Bincode => Box::new(BincodeCodec),
            CodecKind::Json => Box::new(JsonCodec),
            CodecKind::Yaml => Box::new(YamlCodec),
        }
    }

    /// Guesses the codec from a file name, looking through a trailing `.gz`.
    /// Anything that is not `.json`, `.yaml` or `.yml` is bincode.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let name = name.strip_suffix(".gz").unwrap_or(&name);

        if name.ends_with(".json") {
            CodecKind::Json
        } else if name.ends_with(".yaml") || name.ends_with(".yml") {
            CodecKind::Yaml
        } else {
            CodecKind::Bincode
        }
    }

    /// Resolves the `codec` config setting for a file. `"auto"` (or an
    /// unrecognised setting) picks by file name.
    pub fn resolve(setting: &str, path: &Path) -> Self {
        match setting.parse::<CodecKind>() {
            Ok(kind) => kind,
            Err(_) => {
                if !setting.eq_ignore_ascii_case("auto") {
                    tracing::warn!("unknown codec '{}', picking by file name", setting);
                }
                Self::from_path(path)
            }
        }
    }
}

impl FromStr for CodecKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bincode" | "binary" => Ok(CodecKind::Bincode),
            "json" => Ok(CodecKind::Json),
            "yaml" | "yml" => Ok(CodecKind::Yaml),
            other => Err(format!("unknown codec '{}'", other)),
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codec().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::schema::{RecordDesc, ScalarKind, TypeDesc, TypeRegistry};
    use crate::document::value::{BigInteger, MapKey, Record, Value};
    use indexmap::IndexMap;

    fn sample() -> SaveBlob {
        let registry = TypeRegistry::new().with(
            RecordDesc::class("Player")
                .field("name", TypeDesc::scalar(ScalarKind::Text))
                .field(
                    "wallet",
                    TypeDesc::map(ScalarKind::I32, TypeDesc::scalar(ScalarKind::BigInt)),
                )
                .field("tags", TypeDesc::set(TypeDesc::scalar(ScalarKind::Text))),
        );
        let mut wallet = IndexMap::new();
        wallet.insert(
            MapKey::Int(1),
            Value::BigInt("123456789012345678901234567890".parse::<BigInteger>().unwrap()),
        );
        let root = Value::Record(
            Record::new("Player")
                .with_field("name", Value::Text("Ash".to_string()))
                .with_field("wallet", Value::Map(wallet))
                .with_field("tags", Value::Set(vec![Value::Text("brave".to_string())])),
        );
        SaveBlob::new(registry, TypeDesc::record("Player"), root)
    }

    #[test]
    fn test_every_codec_round_trips() {
        for kind in [CodecKind::Bincode, CodecKind::Json, CodecKind::Yaml] {
            let codec = kind.codec();
            let bytes = codec.encode(&sample()).unwrap();
            assert_eq!(codec.decode(&bytes).unwrap(), sample(), "codec {}", kind);
        }
    }

    #[test]
    fn test_text_codecs_keep_record_field_order() {
        for kind in [CodecKind::Json, CodecKind::Yaml] {
            let codec = kind.codec();
            let decoded = codec.decode(&codec.encode(&sample()).unwrap()).unwrap();
            let Value::Record(player) = decoded.root else {
                panic!("Expected record root");
            };
            let names: Vec<&str> = player.fields.keys().map(String::as_str).collect();
            assert_eq!(names, vec!["name", "wallet", "tags"], "codec {}", kind);
        }
    }

    #[test]
    fn test_text_codecs_refuse_non_finite_floats() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let blob = SaveBlob::new(
                TypeRegistry::new(),
                TypeDesc::list(TypeDesc::scalar(ScalarKind::F64)),
                Value::Seq(vec![Value::Float(1.0), Value::Float(bad)]),
            );
            for kind in [CodecKind::Json, CodecKind::Yaml] {
                assert!(
                    matches!(
                        kind.codec().encode(&blob),
                        Err(EncodeError::Serialize { .. })
                    ),
                    "codec {} accepted {}",
                    kind,
                    bad
                );
            }
            let bytes = BincodeCodec.encode(&blob).unwrap();
            assert_eq!(BincodeCodec.decode(&bytes).unwrap(), blob);
        }
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(BincodeCodec.decode(&[]), Err(DecodeError::Empty)));
        assert!(matches!(JsonCodec.decode(b"  \n"), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            JsonCodec.decode(b"{ not json"),
            Err(DecodeError::Malformed { codec: "json", .. })
        ));
        assert!(matches!(
            BincodeCodec.decode(&[0xff; 3]),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(CodecKind::from_path(Path::new("a.json")), CodecKind::Json);
        assert_eq!(CodecKind::from_path(Path::new("a.JSON.gz")), CodecKind::Json);
        assert_eq!(CodecKind::from_path(Path::new("dir/a.yml")), CodecKind::Yaml);
        assert_eq!(CodecKind::from_path(Path::new("slot1.sav")), CodecKind::Bincode);
        assert_eq!(
            CodecKind::resolve("json", Path::new("slot1.sav")),
            CodecKind::Json
        );
        assert_eq!(
            CodecKind::resolve("auto", Path::new("slot1.yaml")),
            CodecKind::Yaml
        );
    }
}
