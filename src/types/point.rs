use std::fmt;

use itertools::Itertools;

use super::serialisable::LineProtocol;

/// A typed field value. Line protocol distinguishes these purely by how they
/// are written, so the variant chosen here fixes the column type in InfluxDB.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// On the wire: `300i`
    Integer(i64),
    /// On the wire: `1.5`
    Float(f64),
    /// On the wire: `"text"`, with `"` and `\` escaped and line breaks
    /// written as `\n`/`\r` so the record stays on one line.
    String(String),
    /// On the wire: `true` or `false`
    Boolean(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use FieldValue::*;

        match self {
            Integer(v) => write!(f, "{v}i"),
            Float(v) => write!(f, "{v}"),
            String(v) => {
                f.write_str("\"")?;
                for c in v.chars() {
                    match c {
                        '"' | '\\' => write!(f, "\\{c}")?,
                        '\n' => f.write_str("\\n")?,
                        '\r' => f.write_str("\\r")?,
                        _ => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            },
            Boolean(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

/// A map with unique string keys that remembers insertion order, which is the
/// order entries are serialised in. Equality ignores order.
#[derive(Clone, Debug)]
pub struct KeyedSet<V> {
    entries: Vec<(String, V)>,
}

pub type TagSet = KeyedSet<String>;
pub type FieldSet = KeyedSet<FieldValue>;

impl<V> KeyedSet<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Sets `key` to `value`. An existing key keeps its position but takes
    /// the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<V>) {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for KeyedSet<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: PartialEq> PartialEq for KeyedSet<V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Into<String>, V, T: Into<V>> FromIterator<(K, T)> for KeyedSet<V> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

impl<'de> serde::Deserialize<'de> for TagSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // serde_yaml hands mappings over in document order, so a Vec of
        // pairs keeps the order the operator wrote them in.
        struct Visitor;

        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = TagSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of tag names to string values")
            }

            fn visit_map<A>(self, mut map: A) -> Result<TagSet, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut tags = TagSet::new();
                while let Some((k, v)) = map.next_entry::<String, String>()? {
                    tags.insert(k, v);
                }
                Ok(tags)
            }
        }

        deserializer.deserialize_map(Visitor)
    }
}

/// A single InfluxDB point. Only `build_point` creates these, which
/// guarantees the field set is non-empty and every value is representable.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricPoint {
    measurement: String,
    tags: TagSet,
    fields: FieldSet,
    /// Nanoseconds since the Unix epoch.
    timestamp: i64,
}

impl MetricPoint {
    pub(crate) fn new_unchecked(
        measurement: String,
        tags: TagSet,
        fields: FieldSet,
        timestamp: i64,
    ) -> Self {
        Self {
            measurement,
            tags,
            fields,
            timestamp,
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl LineProtocol for MetricPoint {
    fn serialise_line_protocol(&self) -> String {
        let tags = self
            .tags
            .iter()
            .map(|(k, v)| format!(",{k}={v}"))
            .join("");
        let fields =
            self.fields.iter().map(|(k, v)| format!("{k}={v}")).join(",");

        format!("{}{tags} {fields} {}", self.measurement, self.timestamp)
    }
}
