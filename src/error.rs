//! Error types for savequill.
//!
//! Each layer has its own error enum so callers can tell a corrupt save
//! apart from a rejected edit. The binary wraps all of them with
//! `anyhow::Context` before printing.

use crate::document::tree::NodeId;
use std::path::PathBuf;
use thiserror::Error;

/// The blob codec could not turn bytes into a save.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("save blob is empty")]
    Empty,

    #[error("failed to decompress gzipped save - file may be corrupted")]
    Gzip(#[source] std::io::Error),

    #[error("{codec} save could not be decoded: {message}")]
    Malformed {
        codec: &'static str,
        message: String,
    },

    #[error("save references unknown record type '{0}'")]
    UnknownRecord(String),
}

/// The blob codec could not turn a save into bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{codec} save could not be encoded: {message}")]
    Serialize {
        codec: &'static str,
        message: String,
    },

    #[error("failed to compress save")]
    Gzip(#[source] std::io::Error),
}

/// Problems answering questions about declared types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    #[error("record type '{0}' is not registered")]
    UnknownRecord(String),

    #[error("type '{0}' cannot be instantiated")]
    NotInstantiable(String),

    #[error("default construction of '{0}' recursed too deeply")]
    RecursiveDefault(String),

    #[error("'{input}' is not a valid {kind}: {reason}")]
    Parse {
        kind: String,
        input: String,
        reason: String,
    },

    #[error("{0} cannot be used as a map key")]
    UnsupportedKey(String),
}

/// Violations of the tree model's single-rooted-tree invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("tree element list is empty")]
    Empty,

    #[error("first element must be the root (no parent, depth -1)")]
    BadRoot,

    #[error("element {0} not found")]
    UnknownElement(NodeId),

    #[error("element {0} already exists")]
    DuplicateId(NodeId),

    #[error("parent {parent} of element {child} is not in the tree")]
    MissingParent { child: NodeId, parent: NodeId },

    #[error("element {child} has depth {found}, expected {expected}")]
    BadDepth {
        child: NodeId,
        expected: i32,
        found: i32,
    },

    #[error("cannot remove the root element")]
    RootImmutable,
}

/// An operator edit that was refused. The tree and the live graph are
/// unchanged whenever one of these is returned, except where noted on the
/// individual operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("node {id} does not support {operation}")]
    Unsupported { id: NodeId, operation: &'static str },

    #[error("invalid value for node {id}: {source}")]
    InvalidEdit {
        id: NodeId,
        #[source]
        source: TypeError,
    },

    #[error("structural edit failed: {0}")]
    Structural(String),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Failures of the load/save bridge.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("no save is loaded")]
    NotLoaded,

    #[error("failed to read or write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Edit(#[from] EditError),
}

impl SaveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SaveError::Io {
            path: path.into(),
            source,
        }
    }
}
