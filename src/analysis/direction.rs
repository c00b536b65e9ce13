//! Direction values and direction vectors.

use serde::{Serialize, Deserialize};
use std::fmt;

/// Relation between the source and sink iteration of one loop.
///
/// The derived ordering exists only so vectors can live in ordered sets;
/// it carries no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// < (source iteration strictly earlier)
    Lt,
    /// = (same iteration)
    Eq,
    /// > (source iteration strictly later)
    Gt,
    /// <= (earlier or same)
    Le,
    /// >= (later or same)
    Ge,
    /// * (unconstrained)
    Any,
}

impl Direction {
    /// All six values.
    pub const ALL: [Direction; 6] = [
        Direction::Lt,
        Direction::Eq,
        Direction::Gt,
        Direction::Le,
        Direction::Ge,
        Direction::Any,
    ];

    /// Get the character representation.
    pub fn to_char(&self) -> char {
        match self {
            Direction::Lt => '<',
            Direction::Eq => '=',
            Direction::Gt => '>',
            Direction::Le => '≤',
            Direction::Ge => '≥',
            Direction::Any => '*',
        }
    }

    /// Uppercase name (`LT`, `EQ`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Lt => "LT",
            Direction::Eq => "EQ",
            Direction::Gt => "GT",
            Direction::Le => "LE",
            Direction::Ge => "GE",
            Direction::Any => "ANY",
        }
    }

    /// Could the source run in an earlier iteration than the sink?
    pub fn admits_forward(&self) -> bool {
        matches!(self, Direction::Lt | Direction::Le | Direction::Any)
    }

    /// Does this value force the source to a later iteration (or same)?
    pub fn is_backward(&self) -> bool {
        matches!(self, Direction::Gt | Direction::Ge)
    }

    /// Combine two directions (union).
    pub fn union(&self, other: &Direction) -> Direction {
        match (self, other) {
            (a, b) if a == b => *a,
            (Direction::Lt, Direction::Eq) | (Direction::Eq, Direction::Lt) => Direction::Le,
            (Direction::Gt, Direction::Eq) | (Direction::Eq, Direction::Gt) => Direction::Ge,
            (Direction::Le, Direction::Lt | Direction::Eq)
            | (Direction::Lt | Direction::Eq, Direction::Le) => Direction::Le,
            (Direction::Ge, Direction::Gt | Direction::Eq)
            | (Direction::Gt | Direction::Eq, Direction::Ge) => Direction::Ge,
            _ => Direction::Any,
        }
    }

    /// Parse either the symbol or the uppercase name.
    pub fn parse(s: &str) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|d| s == d.name() || s.chars().eq(std::iter::once(d.to_char())))
            .or(match s {
                "<=" => Some(Direction::Le),
                ">=" => Some(Direction::Ge),
                _ => None,
            })
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// An immutable direction vector, one entry per common enclosing loop
/// (outermost first). Equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectionVector(Vec<Direction>);

impl DirectionVector {
    pub fn new(directions: Vec<Direction>) -> Self {
        Self(directions)
    }

    /// `len` copies of [`Direction::Any`].
    pub fn any(len: usize) -> Self {
        Self(vec![Direction::Any; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<Direction> {
        self.0.get(i).copied()
    }

    pub fn as_slice(&self) -> &[Direction] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Direction> + '_ {
        self.0.iter().copied()
    }

    /// Index of the first [`Direction::Any`] entry.
    pub fn first_any(&self) -> Option<usize> {
        self.0.iter().position(|&d| d == Direction::Any)
    }

    /// Copy with entry `i` replaced.
    pub fn with(&self, i: usize, d: Direction) -> Self {
        let mut v = self.0.clone();
        v[i] = d;
        Self(v)
    }

    /// Copy with entries `i` and `j` exchanged.
    pub fn swapped(&self, i: usize, j: usize) -> Self {
        let mut v = self.0.clone();
        v.swap(i, j);
        Self(v)
    }

    /// Index and value of the first entry that is not [`Direction::Eq`].
    pub fn leading_non_eq(&self) -> Option<(usize, Direction)> {
        self.0.iter().copied().enumerate().find(|&(_, d)| d != Direction::Eq)
    }

    /// `1 + index of first non-EQ entry`, or 0 if every entry is EQ.
    pub fn level(&self) -> usize {
        self.leading_non_eq().map_or(0, |(i, _)| i + 1)
    }

    /// True unless the first non-EQ entry is GT or GE.
    pub fn is_forward(&self) -> bool {
        self.leading_non_eq().map_or(true, |(_, d)| !d.is_backward())
    }
}

impl From<Vec<Direction>> for DirectionVector {
    fn from(v: Vec<Direction>) -> Self {
        Self(v)
    }
}

impl fmt::Display for DirectionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Direction::*;

    #[test]
    fn test_level() {
        assert_eq!(DirectionVector::new(vec![]).level(), 0);
        assert_eq!(DirectionVector::new(vec![Eq, Eq]).level(), 0);
        assert_eq!(DirectionVector::new(vec![Eq, Lt]).level(), 2);
        assert_eq!(DirectionVector::new(vec![Any, Eq]).level(), 1);
    }

    #[test]
    fn test_forward() {
        assert!(DirectionVector::new(vec![Eq, Lt, Gt]).is_forward());
        assert!(DirectionVector::new(vec![Any]).is_forward());
        assert!(DirectionVector::new(vec![Eq, Eq]).is_forward());
        assert!(!DirectionVector::new(vec![Eq, Ge, Lt]).is_forward());
        assert!(!DirectionVector::new(vec![Gt]).is_forward());
    }

    #[test]
    fn test_display() {
        assert_eq!(DirectionVector::new(vec![Eq, Lt]).to_string(), "[=, <]");
        assert_eq!(DirectionVector::any(0).to_string(), "[]");
        assert_eq!(DirectionVector::any(2).to_string(), "[*, *]");
    }

    #[test]
    fn test_structural_dedup() {
        let mut set = std::collections::BTreeSet::new();
        set.insert(DirectionVector::new(vec![Lt, Eq]));
        set.insert(DirectionVector::any(2).with(0, Lt).with(1, Eq));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_union() {
        assert_eq!(Lt.union(&Eq), Le);
        assert_eq!(Gt.union(&Eq), Ge);
        assert_eq!(Lt.union(&Gt), Any);
        assert_eq!(Le.union(&Lt), Le);
        assert_eq!(Eq.union(&Eq), Eq);
    }

    #[test]
    fn test_parse() {
        assert_eq!(Direction::parse("<"), Some(Lt));
        assert_eq!(Direction::parse("GE"), Some(Ge));
        assert_eq!(Direction::parse("<="), Some(Le));
        assert_eq!(Direction::parse("?"), None);
    }
}
