//! Run variations: one concrete combination of experiment factor levels.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::errors::{RunError, RunResult};

/// A selected level of one experiment factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactorLevel {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for FactorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for FactorLevel {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for FactorLevel {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl FactorLevel {
    /// Interpret a command-line value, preferring integers, then floats.
    pub fn parse(raw: &str) -> Self {
        if let Ok(v) = raw.parse::<i64>() {
            Self::Integer(v)
        } else if let Ok(v) = raw.parse::<f64>() {
            Self::Float(v)
        } else {
            Self::Text(raw.to_string())
        }
    }
}

/// Immutable mapping of factor name to selected level.
///
/// Factors keep the order in which they were declared so that identifiers
/// derived from a variation are stable across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunVariation {
    factors: Vec<(String, FactorLevel)>,
}

impl RunVariation {
    pub fn new<I, K, V>(factors: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FactorLevel>,
    {
        let mut variation = Self::default();
        for (name, level) in factors {
            let name = name.into();
            let level = level.into();
            match variation.factors.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1 = level,
                None => variation.factors.push((name, level)),
            }
        }
        variation
    }

    pub fn get(&self, factor: &str) -> Option<&FactorLevel> {
        self.factors
            .iter()
            .find(|(name, _)| name == factor)
            .map(|(_, level)| level)
    }

    /// Look up a factor that the run cannot proceed without.
    pub fn require(&self, factor: &str) -> RunResult<&FactorLevel> {
        self.get(factor)
            .ok_or_else(|| RunError::MissingFactor(factor.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FactorLevel)> {
        self.factors.iter().map(|(n, l)| (n.as_str(), l))
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Levels joined with `_`, e.g. `charmm_md_50000`.
    pub fn label(&self) -> String {
        self.factors
            .iter()
            .map(|(_, level)| level.to_string())
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl Serialize for RunVariation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.factors.len()))?;
        for (name, level) in &self.factors {
            map.serialize_entry(name, level)?;
        }
        map.end()
    }
}

struct VariationVisitor;

impl<'de> Visitor<'de> for VariationVisitor {
    type Value = RunVariation;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping of factor names to levels")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut factors = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, level)) = access.next_entry::<String, FactorLevel>()? {
            factors.push((name, level));
        }
        Ok(RunVariation::new(factors))
    }
}

impl<'de> Deserialize<'de> for RunVariation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(VariationVisitor)
    }
}
