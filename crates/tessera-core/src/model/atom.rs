//! Ground atoms and atom schemas

use serde::{Deserialize, Serialize};
use std::fmt;

/// A predicate applied to concrete objects
///
/// Ordering is by predicate name first, then argument tuple, which gives
/// goals a stable index across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroundAtom {
    /// Predicate name
    pub predicate: String,
    /// Object identifiers in argument order
    #[serde(default)]
    pub args: Vec<String>,
}

impl GroundAtom {
    /// Create a new ground atom
    pub fn new<I, S>(predicate: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            predicate: predicate.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Argument at `index`, if the atom has that many arguments
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Number of arguments
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

impl fmt::Display for GroundAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.predicate, self.args.join(", "))
    }
}

/// An atom inside an action schema; arguments may be variables (`?x`) or constants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomSchema {
    /// Predicate name
    pub predicate: String,
    /// Argument terms
    #[serde(default)]
    pub args: Vec<String>,
}

impl AtomSchema {
    pub fn new<I, S>(predicate: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            predicate: predicate.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_atom_display() {
        let atom = GroundAtom::new("welded", ["s1", "b2"]);
        assert_eq!(atom.to_string(), "welded(s1, b2)");
        assert_eq!(GroundAtom::new("handempty", Vec::<String>::new()).to_string(), "handempty()");
    }

    #[test]
    fn test_ground_atom_ordering() {
        let a = GroundAtom::new("at", ["r1", "l2"]);
        let b = GroundAtom::new("at", ["r1", "l3"]);
        let c = GroundAtom::new("welded", ["s1"]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_ground_atom_arg() {
        let atom = GroundAtom::new("on", ["a", "b"]);
        assert_eq!(atom.arg(1), Some("b"));
        assert_eq!(atom.arg(2), None);
        assert_eq!(atom.arity(), 2);
    }

    #[test]
    fn test_ground_atom_deserialize_without_args() {
        let atom: GroundAtom = serde_json::from_str(r#"{"predicate": "done"}"#).unwrap();
        assert!(atom.args.is_empty());
    }
}
