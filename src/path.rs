// Hierarchical node identifiers for the City → JK → Liter tree.
//
// A path is an ordered list of `(Level, name)` segments; the root is the
// empty path. The flat string form (`city:Москва|jk:ЖК Север`) exists only
// for map keys and persistence boundaries, see `NodePath::encode`.
use crate::error::{Result, RollupError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    City,
    Jk,
    Liter,
}

impl Level {
    /// Depth of the first segment at this level.
    pub fn depth(self) -> usize {
        match self {
            Level::City => 1,
            Level::Jk => 2,
            Level::Liter => 3,
        }
    }

    /// Level of the segment at `depth`. Everything below the JK is a liter,
    /// including members nested under a contract's aggregate liter.
    pub fn at_depth(depth: usize) -> Option<Level> {
        match depth {
            0 => None,
            1 => Some(Level::City),
            2 => Some(Level::Jk),
            _ => Some(Level::Liter),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::City => "city",
            Level::Jk => "jk",
            Level::Liter => "liter",
        }
    }

    fn parse(s: &str) -> Option<Level> {
        match s {
            "city" => Some(Level::City),
            "jk" => Some(Level::Jk),
            "liter" => Some(Level::Liter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub level: Level,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePath {
    segments: Vec<Segment>,
}

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn city(city: &str) -> Self {
        Self::root().child(city)
    }

    pub fn jk(city: &str, jk: &str) -> Self {
        Self::city(city).child(jk)
    }

    pub fn liter(city: &str, jk: &str, liter: &str) -> Self {
        Self::jk(city, jk).child(liter)
    }

    /// Path one segment below `self`. Below a liter this addresses a member
    /// of that liter's contract group.
    pub fn child(&self, name: &str) -> Self {
        let level = Level::at_depth(self.depth() + 1).unwrap_or(Level::Liter);
        let mut segments = self.segments.clone();
        segments.push(Segment {
            level,
            name: name.to_string(),
        });
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn level(&self) -> Option<Level> {
        self.segments.last().map(|s| s.level)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.name.as_str())
    }

    /// Name of the segment at `level`, if the path reaches that deep.
    pub fn name_at(&self, level: Level) -> Option<&str> {
        self.segments
            .get(level.depth() - 1)
            .map(|s| s.name.as_str())
    }

    /// Drops the last segment. The root is its own parent.
    pub fn parent(&self) -> Self {
        self.truncated(self.depth().saturating_sub(1))
    }

    pub fn truncated(&self, depth: usize) -> Self {
        Self {
            segments: self.segments.iter().take(depth).cloned().collect(),
        }
    }

    pub fn is_ancestor_of(&self, other: &NodePath) -> bool {
        self.depth() < other.depth() && other.segments.starts_with(&self.segments)
    }

    /// Segment names from the top down; empty at the root.
    pub fn breadcrumb(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.name.clone()).collect()
    }

    pub fn encode(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("{}:{}", s.level.as_str(), escape(&s.name)))
            .collect::<Vec<_>>()
            .join("|")
    }

    pub fn decode(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for raw in split_unescaped(s) {
            let (level, name) = raw
                .split_once(':')
                .ok_or_else(|| RollupError::MalformedPath(s.to_string()))?;
            let level = Level::parse(level)
                .filter(|l| Level::at_depth(segments.len() + 1) == Some(*l))
                .ok_or_else(|| RollupError::MalformedPath(s.to_string()))?;
            segments.push(Segment {
                level,
                name: unescape(name),
            });
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.encode())
        }
    }
}

impl FromStr for NodePath {
    type Err = RollupError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

fn escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '\\' | '|' | ':') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unescape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Split on `|` that is not preceded by an escaping backslash. Escapes are
/// kept in the pieces; `unescape` removes them later.
fn split_unescaped(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '|' => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_chain() {
        let liter = NodePath::liter("Москва", "ЖК Север", "1");
        assert_eq!(liter.depth(), 3);
        assert_eq!(liter.parent(), NodePath::jk("Москва", "ЖК Север"));
        assert_eq!(liter.parent().parent(), NodePath::city("Москва"));
        assert!(NodePath::city("Москва").parent().is_root());
        assert!(NodePath::root().parent().is_root());
    }

    #[test]
    fn test_breadcrumb() {
        assert!(NodePath::root().breadcrumb().is_empty());
        assert_eq!(
            NodePath::jk("Москва", "ЖК Север").breadcrumb(),
            vec!["Москва".to_string(), "ЖК Север".to_string()]
        );
    }

    #[test]
    fn test_encode_decode() {
        let path = NodePath::liter("Москва", "ЖК \"Бор|Лес\"", "1: корпус\\2");
        let encoded = path.encode();
        assert_eq!(encoded, "city:Москва|jk:ЖК \"Бор\\|Лес\"|liter:1\\: корпус\\\\2");
        assert_eq!(NodePath::decode(&encoded).unwrap(), path);
        assert_eq!(NodePath::decode("").unwrap(), NodePath::root());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(
            NodePath::decode("jk:ЖК Север"),
            Err(RollupError::MalformedPath(_))
        ));
        assert!(NodePath::decode("city").is_err());
        assert!(NodePath::decode("town:Москва").is_err());
        assert!(NodePath::decode("city:A|city:B").is_err());
        assert!(NodePath::decode("city:A|jk:J|liter:L|jk:K").is_err());
    }

    #[test]
    fn test_contract_member_paths() {
        let parent = NodePath::liter("A", "J", "Все");
        let member = parent.child("Литер 5");
        assert_eq!(member.depth(), 4);
        assert_eq!(member.level(), Some(Level::Liter));
        assert_eq!(member.parent(), parent);
        assert!(parent.is_ancestor_of(&member));
        assert_eq!(member.name_at(Level::Liter), Some("Все"));
        let encoded = member.encode();
        assert_eq!(encoded, "city:A|jk:J|liter:Все|liter:Литер 5");
        assert_eq!(NodePath::decode(&encoded).unwrap(), member);
    }

    #[test]
    fn test_ancestry() {
        let city = NodePath::city("A");
        assert!(city.is_ancestor_of(&NodePath::jk("A", "J")));
        assert!(!city.is_ancestor_of(&NodePath::jk("B", "J")));
        assert!(!city.is_ancestor_of(&city));
        assert!(NodePath::root().is_ancestor_of(&city));
        assert_eq!(NodePath::liter("A", "J", "L").name_at(Level::Jk), Some("J"));
        assert_eq!(city.name_at(Level::Jk), None);
    }
}
