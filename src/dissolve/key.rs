use std::{collections::HashMap, fmt};

use crate::{error::PipelineError, geofile::feature::Feature};

/// Value of the grouping property of a feature.
///
/// Numbers compare as JSON numbers, so `6` and `"06"` are different keys, as are `1` and `1.0`. A missing
/// property and an explicit `null` are both `Null`, which gives one bucket for all unkeyed features.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    String(String),
    Number(serde_json::Number),
    Null,
}

impl GroupKey {
    /// Extract the key of `feature`. `feature_index` is only used for error reporting.
    pub fn from_feature(
        feature: &Feature,
        property_name: &str,
        feature_index: usize,
    ) -> Result<Self, PipelineError> {
        match feature.attributes.get(property_name) {
            None | Some(serde_json::Value::Null) => Ok(GroupKey::Null),
            Some(serde_json::Value::String(value)) => Ok(GroupKey::String(value.clone())),
            Some(serde_json::Value::Number(value)) => Ok(GroupKey::Number(value.clone())),
            Some(value) => Err(PipelineError::UnsupportedKey {
                feature_index,
                property_name: property_name.to_string(),
                value: value.clone(),
            }),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        match self {
            GroupKey::String(value) => serde_json::Value::String(value.clone()),
            GroupKey::Number(value) => serde_json::Value::Number(value.clone()),
            GroupKey::Null => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::String(value) => write!(f, "{:?}", value),
            GroupKey::Number(value) => write!(f, "{}", value),
            GroupKey::Null => write!(f, "null"),
        }
    }
}

/// Ordered multimap from key to items. Keys iterate in the order they were first inserted, items within a
/// key in insertion order.
#[derive(Debug, Clone)]
pub struct KeyedGroups<T> {
    key_index: HashMap<GroupKey, usize>,
    groups: Vec<(GroupKey, Vec<T>)>,
}

impl<T> KeyedGroups<T> {
    pub fn new() -> Self {
        Self {
            key_index: HashMap::new(),
            groups: Vec::new(),
        }
    }

    pub fn insert(&mut self, key: GroupKey, item: T) {
        if let Some(&index) = self.key_index.get(&key) {
            self.groups[index].1.push(item);
            return;
        }
        self.key_index.insert(key.clone(), self.groups.len());
        self.groups.push((key, vec![item]));
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (GroupKey, Vec<T>)> {
        self.groups.iter()
    }
}

impl<T> Default for KeyedGroups<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntoIterator for KeyedGroups<T> {
    type Item = (GroupKey, Vec<T>);
    type IntoIter = std::vec::IntoIter<(GroupKey, Vec<T>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

/// A feature paired with its index in the collection it was grouped from.
pub type IndexedFeature<'a> = (usize, &'a Feature);

/// Partition `features` by the value of `property_name`, keeping first-seen key order.
pub fn group_by_key<'a, I>(
    features: I,
    property_name: &str,
) -> Result<KeyedGroups<IndexedFeature<'a>>, PipelineError>
where
    I: IntoIterator<Item = &'a Feature>,
{
    let mut groups = KeyedGroups::new();
    for (index, feature) in features.into_iter().enumerate() {
        let key = GroupKey::from_feature(feature, property_name, index)?;
        groups.insert(key, (index, feature));
    }
    Ok(groups)
}
