use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU32, Ordering};

/// Process-wide counter behind [`NodeUid::next`]. Zero is never handed out.
static NEXT_UID: AtomicU32 = AtomicU32::new(1);

/// Global string interner for node names. Script-built graphs repeat names a lot.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Unique identity of a scene node.
///
/// Assigned once at construction from a monotonically increasing
/// process-wide counter and never reused. This is the value pushed onto
/// the pick name stack during a pick traversal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeUid(u32);

impl NodeUid {
    /// Allocate the next identity.
    pub fn next() -> Self {
        NodeUid(NEXT_UID.fetch_add(1, Ordering::Relaxed))
    }

    /// Rebuild an identity from its raw value (e.g. read back from a pick name stack).
    pub const fn from_raw(raw: u32) -> Self {
        NodeUid(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for NodeUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for NodeUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Human readable node name. Not necessarily unique.
/// Internally a 4-byte `Spur` index, so comparison and hashing are O(1).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeName(Spur);

impl NodeName {
    /// Intern a name, or return the existing one.
    pub fn intern(s: &str) -> Self {
        NodeName(INTERNER.get_or_intern(s))
    }

    /// The empty name carried by nodes that were never named.
    pub fn unnamed() -> Self {
        Self::intern("")
    }

    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl Default for NodeName {
    fn default() -> Self {
        Self::unnamed()
    }
}

impl fmt::Debug for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NodeName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(NodeName::intern(&s))
    }
}
