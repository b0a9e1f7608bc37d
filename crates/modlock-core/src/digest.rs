//! Content fingerprints for extension scripts.

use crate::model::Label;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Write as _};
use thiserror::Error;

/// Domain tag mixed into every script digest
const SCRIPT_DIGEST_DOMAIN: &[u8] = b"modlock.script.v1";

/// Opaque fingerprint of an extension script and every script it loads
///
/// Serialized as standard base64; displayed as hex.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitiveDigest(Vec<u8>);

impl TransitiveDigest {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Fingerprint of a single piece of content with no loads
    pub fn of_content(content: &[u8]) -> Self {
        Self(blake3::hash(content).as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(self.0.len() * 2);
        for byte in &self.0 {
            let _ = write!(hex, "{:02x}", byte);
        }
        hex
    }

    /// First twelve hex characters, enough to tell digests apart in messages
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        STANDARD.decode(encoded).map(Self)
    }
}

impl fmt::Debug for TransitiveDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransitiveDigest({})", self.short())
    }
}

impl fmt::Display for TransitiveDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for TransitiveDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for TransitiveDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    #[error("script {label} not found{}", .loaded_from.as_ref().map(|from| format!(" (loaded from {})", from)).unwrap_or_default())]
    MissingScript {
        label: Label,
        loaded_from: Option<Label>,
    },
    #[error("cycle in load statements: {}", .chain.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> "))]
    Cycle { chain: Vec<Label> },
}

#[derive(Debug, Clone)]
struct ScriptFile {
    content: Vec<u8>,
    loads: IndexSet<Label>,
}

/// Extension scripts and the load edges between them
#[derive(Debug, Clone, Default)]
pub struct ScriptGraph {
    files: FxHashMap<Label, ScriptFile>,
}

impl ScriptGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a script; loads keep their declaration order
    pub fn insert(&mut self, label: Label, content: impl Into<Vec<u8>>, loads: impl IntoIterator<Item = Label>) {
        self.files.insert(
            label,
            ScriptFile {
                content: content.into(),
                loads: loads.into_iter().collect(),
            },
        );
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.files.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Fingerprint of `root` covering its content and everything it loads, transitively
    pub fn transitive_digest(&self, root: &Label) -> Result<TransitiveDigest, DigestError> {
        let mut memo = FxHashMap::default();
        let mut stack = Vec::new();
        self.digest_of(root, None, &mut memo, &mut stack)
    }

    fn digest_of(
        &self,
        label: &Label,
        loaded_from: Option<&Label>,
        memo: &mut FxHashMap<Label, TransitiveDigest>,
        stack: &mut Vec<Label>,
    ) -> Result<TransitiveDigest, DigestError> {
        if let Some(digest) = memo.get(label) {
            return Ok(digest.clone());
        }
        if let Some(pos) = stack.iter().position(|entry| entry == label) {
            let mut chain = stack[pos..].to_vec();
            chain.push(label.clone());
            return Err(DigestError::Cycle { chain });
        }

        let file = self.files.get(label).ok_or_else(|| DigestError::MissingScript {
            label: label.clone(),
            loaded_from: loaded_from.cloned(),
        })?;

        stack.push(label.clone());

        let mut hasher = blake3::Hasher::new();
        hasher.update(SCRIPT_DIGEST_DOMAIN);
        hasher.update(&(file.content.len() as u64).to_le_bytes());
        hasher.update(&file.content);
        for dep in &file.loads {
            let dep_digest = self.digest_of(dep, Some(label), memo, stack)?;
            let dep_name = dep.to_string();
            hasher.update(&(dep_name.len() as u64).to_le_bytes());
            hasher.update(dep_name.as_bytes());
            hasher.update(dep_digest.as_bytes());
        }

        stack.pop();

        let digest = TransitiveDigest(hasher.finalize().as_bytes().to_vec());
        memo.insert(label.clone(), digest.clone());
        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> Label {
        Label::parse_canonical(s).unwrap()
    }

    #[test]
    fn test_transitive_change_is_detected() {
        let mut graph = ScriptGraph::new();
        graph.insert(label("//:ext.bzl"), "load('//:util.bzl')", [label("//:util.bzl")]);
        graph.insert(label("//:util.bzl"), "def f(): pass", []);
        let before = graph.transitive_digest(&label("//:ext.bzl")).unwrap();

        graph.insert(label("//:util.bzl"), "def f(): return 1", []);
        let after = graph.transitive_digest(&label("//:ext.bzl")).unwrap();

        assert_ne!(before, after, "Changing a loaded script should change the digest");
    }

    #[test]
    fn test_unrelated_change_is_ignored() {
        let mut graph = ScriptGraph::new();
        graph.insert(label("//:ext.bzl"), "x = 1", []);
        graph.insert(label("//:other.bzl"), "y = 1", []);
        let before = graph.transitive_digest(&label("//:ext.bzl")).unwrap();

        graph.insert(label("//:other.bzl"), "y = 2", []);
        let after = graph.transitive_digest(&label("//:ext.bzl")).unwrap();

        assert_eq!(before, after);
    }

    #[test]
    fn test_missing_script() {
        let mut graph = ScriptGraph::new();
        graph.insert(label("//:ext.bzl"), "", [label("//:gone.bzl")]);
        let err = graph.transitive_digest(&label("//:ext.bzl")).unwrap_err();
        assert_eq!(err.to_string(), "script //:gone.bzl not found (loaded from //:ext.bzl)");
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut graph = ScriptGraph::new();
        graph.insert(label("//:a.bzl"), "", [label("//:b.bzl")]);
        graph.insert(label("//:b.bzl"), "", [label("//:a.bzl")]);
        let err = graph.transitive_digest(&label("//:a.bzl")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cycle in load statements: //:a.bzl -> //:b.bzl -> //:a.bzl"
        );
    }

    #[test]
    fn test_serde_base64() {
        let digest = TransitiveDigest::from_bytes(vec![0u8, 1, 2, 255]);
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, "\"AAEC/w==\"");
        let back: TransitiveDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
        assert_eq!(digest.to_hex(), "000102ff");
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        assert!(serde_json::from_str::<TransitiveDigest>("\"not base64!\"").is_err());
    }
}
