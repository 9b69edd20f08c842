use std::iter::FromIterator;
use std::ops::{Deref, DerefMut};

use serde_derive::{Deserialize, Serialize};
use serde_json::{self, Value};

/// A free-form JSON object, as used by `ResourceProperties` and `Data`.
#[derive(Default, Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Map(serde_json::Map<String, Value>);

impl Map {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn deserialize_into<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }

    /// Fails unless `t` serializes to a JSON object.
    pub fn serialize_from<T: serde::Serialize>(t: T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(t).and_then(serde_json::from_value)
    }
}

impl Deref for Map {
    type Target = serde_json::Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Map {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<serde_json::Map<String, Value>> for Map {
    fn from(m: serde_json::Map<String, Value>) -> Self {
        Map(m)
    }
}

impl FromIterator<(String, Value)> for Map {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        serde_json::Map::from_iter(iter).into()
    }
}

impl Extend<(String, Value)> for Map {
    fn extend<T: IntoIterator<Item = (String, Value)>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

impl<'a> IntoIterator for &'a Map {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
