use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for component names: fast comparisons, low memory.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// An interned component instance name (`Button1`, `Screen1`, ...).
/// Internally a `Spur` index: 4 bytes, Copy, Eq, Hash in O(1).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentName(Spur);

impl ComponentName {
    /// Intern a name, or return the existing handle if already interned.
    pub fn intern(s: &str) -> Self {
        ComponentName(INTERNER.get_or_intern(s))
    }

    /// The handle for `s` if it was ever interned. Never interns.
    pub fn lookup(s: &str) -> Option<Self> {
        INTERNER.get(s).map(ComponentName)
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Whether `s` is usable as a component name: an identifier that starts
    /// with a letter and continues with letters, digits or underscores.
    pub fn is_valid(s: &str) -> bool {
        let mut chars = s.chars();
        match chars.next() {
            Some(c) if c.is_alphabetic() => {}
            _ => return false,
        }
        chars.all(|c| c.is_alphanumeric() || c == '_')
    }
}

impl fmt::Debug for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ComponentName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ComponentName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ComponentName::intern(&s))
    }
}

/// Stable identity of a component instance.
///
/// Freshly created instances get a v4 UUID. Identifiers read from older
/// source files are kept verbatim, whatever their shape (historically they
/// were signed integers).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentUuid(String);

impl ComponentUuid {
    pub fn generate() -> Self {
        ComponentUuid(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn from_stored(s: &str) -> Self {
        ComponentUuid(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
