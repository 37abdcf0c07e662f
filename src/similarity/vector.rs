// TasteVector — a sparse, insertion-ordered mapping from item key to weight.
//
// Iteration and serialization follow insertion order (the rank order the
// listening-history source returned). Equality ignores order: two vectors
// are equal when they hold the same keys with the same weights.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Sparse weighted vector keyed by normalized artist or track names.
///
/// Absence of a key means weight 0, so non-positive weights are never kept.
#[derive(Debug, Clone, Default)]
pub struct TasteVector {
    entries: Vec<(String, f64)>,
    index: HashMap<String, usize>,
}

impl TasteVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the weight for `key`.
    ///
    /// An existing key keeps its position and takes the new weight. A
    /// weight that is not strictly positive removes the key instead.
    pub fn insert(&mut self, key: impl Into<String>, weight: f64) {
        let key = key.into();
        if weight.is_nan() || weight <= 0.0 {
            self.remove(&key);
            return;
        }
        self.insert_raw(key, weight);
    }

    // Stores the weight as-is. Used by deserialization so that `validate`
    // can report bad stored data instead of silently dropping it.
    fn insert_raw(&mut self, key: String, weight: f64) {
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = weight,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, weight));
            }
        }
    }

    fn remove(&mut self, key: &str) {
        if let Some(pos) = self.index.remove(key) {
            self.entries.remove(pos);
            for (i, (k, _)) in self.entries.iter().enumerate().skip(pos) {
                self.index.insert(k.clone(), i);
            }
        }
    }

    /// Weight for `key`, or 0.0 when absent.
    pub fn weight(&self, key: &str) -> f64 {
        self.get(key).unwrap_or(0.0)
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.index.get(key).map(|&pos| self.entries[pos].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// (key, weight) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, w)| (k.as_str(), *w))
    }

    /// The key set, for presence-only comparisons.
    pub fn key_set(&self) -> HashSet<&str> {
        self.keys().collect()
    }

    /// L2 norm of the weights.
    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt()
    }

    /// Check that every entry has a non-empty key and a finite, positive weight.
    pub fn validate(&self) -> Result<(), String> {
        for (key, weight) in &self.entries {
            if key.is_empty() {
                return Err("empty key".to_string());
            }
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(format!("invalid weight {weight} for \"{key}\""));
            }
        }
        Ok(())
    }
}

impl PartialEq for TasteVector {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, w)| other.get(k) == Some(w))
    }
}

impl FromIterator<(String, f64)> for TasteVector {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut vector = TasteVector::new();
        for (key, weight) in iter {
            vector.insert(key, weight);
        }
        vector
    }
}

impl Serialize for TasteVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, weight) in &self.entries {
            map.serialize_entry(key, weight)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TasteVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct VectorVisitor;

        impl<'de> Visitor<'de> for VectorVisitor {
            type Value = TasteVector;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of item keys to weights")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TasteVector, A::Error> {
                let mut vector = TasteVector::new();
                while let Some((key, weight)) = access.next_entry::<String, f64>()? {
                    vector.insert_raw(key, weight);
                }
                Ok(vector)
            }
        }

        deserializer.deserialize_map(VectorVisitor)
    }
}
