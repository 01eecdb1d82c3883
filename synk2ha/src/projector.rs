use std::collections::BTreeMap;

use log::{debug, warn};
use serde_json::Value;

use crate::sensors::{SensorDef, Source, SENSORS};
use crate::telemetry::TelemetrySet;

/// The literal the cloud (and the store) use for "no value".
pub static NULL_MARKER: &str = "null";

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Key(String),
    /// Negative indices count from the end, `-1` being the last element.
    Index(i64),
}

/// A parsed path expression like `.data.infos[0].records[-1].value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(expression: &str) -> Result<Self, String> {
        let rest = expression
            .strip_prefix('.')
            .ok_or_else(|| format!("path {expression:?} must start with '.'"))?;

        let mut segments = Vec::new();
        for part in rest.split('.') {
            let (name, mut indices) = match part.find('[') {
                Some(open) => (&part[..open], &part[open..]),
                None => (part, ""),
            };
            if name.is_empty() {
                return Err(format!("empty key in path {expression:?}"));
            }
            segments.push(Segment::Key(name.to_string()));

            while !indices.is_empty() {
                let close = indices
                    .find(']')
                    .ok_or_else(|| format!("unclosed index in path {expression:?}"))?;
                let index = indices[1..close]
                    .parse::<i64>()
                    .map_err(|e| format!("bad index in path {expression:?}: {e}"))?;
                segments.push(Segment::Index(index));
                indices = &indices[close + 1..];
                if !indices.is_empty() && !indices.starts_with('[') {
                    return Err(format!("unexpected {indices:?} in path {expression:?}"));
                }
            }
        }
        Ok(Self { segments })
    }

    /// Walks `document`; any missing key or out-of-range index yields `None`.
    pub fn resolve<'v>(&self, document: &'v Value) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(document, |node, segment| match segment {
                Segment::Key(key) => node.get(key),
                Segment::Index(index) => {
                    let items = node.as_array()?;
                    let position = if *index < 0 {
                        items.len().checked_sub(index.unsigned_abs() as usize)?
                    } else {
                        *index as usize
                    };
                    items.get(position)
                }
            })
    }
}

/// Converts a JSON leaf into the string form the store expects.
/// Non-scalars and JSON `null` have no state.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// One projected value per catalogue key; `None` where the path was missing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SensorValues {
    values: BTreeMap<&'static str, Option<String>>,
}

impl SensorValues {
    pub fn insert(&mut self, key: &'static str, value: Option<String>) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|value| value.as_deref())
    }

    /// The value of `key` if it may be written to the store: present and not
    /// the null marker.
    pub fn dispatchable(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| *value != NULL_MARKER)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&str>)> {
        self.values.iter().map(|(key, value)| (*key, value.as_deref()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Projection {
    /// Not every document was fetched; nothing is projected this cycle.
    Skipped,
    Complete(SensorValues),
}

pub fn project(set: &TelemetrySet) -> Projection {
    project_with(set, SENSORS)
}

pub fn project_with(set: &TelemetrySet, catalog: &[SensorDef]) -> Projection {
    if !set.all_succeeded() {
        return Projection::Skipped;
    }

    let mut values = SensorValues::default();
    for sensor in catalog {
        if let Source::Field(domain, expression) = sensor.source {
            let value = match FieldPath::parse(expression) {
                Ok(path) => set
                    .document(domain)
                    .and_then(|document| path.resolve(document))
                    .and_then(scalar),
                Err(reason) => {
                    warn!("skipping {}: {reason}", sensor.key);
                    None
                }
            };
            values.insert(sensor.key, value);
        }
    }
    for sensor in catalog {
        if let Source::Alias(target) = sensor.source {
            let value = values.get(target).map(str::to_string);
            values.insert(sensor.key, value);
        }
    }

    for (key, value) in values.iter() {
        debug!("{key} = {}", value.unwrap_or("<absent>"));
    }
    Projection::Complete(values)
}
