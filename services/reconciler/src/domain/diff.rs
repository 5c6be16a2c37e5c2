//! Symmetric difference between an expected-inventory list and the live asset store.

use std::collections::HashMap;

use serde_json::Value;

use stockroom_domain::asset::AssetSnapshot;

use crate::domain::types::{Discrepancy, ExpectedItem};

/// Key of an expected row: `assetId`, falling back to `serial`.
pub fn expected_key(item: &ExpectedItem) -> Option<String> {
    key_value(item.get("assetId")).or_else(|| key_value(item.get("serial")))
}

/// Key of a stored asset: business key, then serial, then the internal numeric key.
pub fn current_key(asset: &AssetSnapshot) -> Option<String> {
    asset.display_key()
}

/// Strings are used as is and numbers in decimal form. Empty strings, nulls and anything else
/// count as absent.
fn key_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Every expected key missing from the store, then every stored key that was not expected.
///
/// Items without a key are skipped. When a key repeats, the last item carrying it is the one
/// reported; each key is reported at most once.
pub fn diff_inventory(expected: &[ExpectedItem], current: &[AssetSnapshot]) -> Vec<Discrepancy> {
    let expected = KeyedItems::index(expected, expected_key);
    let current = KeyedItems::index(current, current_key);

    let missing = expected
        .iter()
        .filter(|(key, _)| !current.contains(key))
        .map(|(key, item)| Discrepancy::MissingInStore {
            key: key.to_owned(),
            expected: item.clone(),
        });
    let unexpected = current
        .iter()
        .filter(|(key, _)| !expected.contains(key))
        .map(|(key, asset)| Discrepancy::UnexpectedInStore {
            key: key.to_owned(),
            current: asset.clone(),
        });
    missing.chain(unexpected).collect()
}

/// Key -> item map that remembers first-seen key order.
struct KeyedItems<'a, T> {
    order: Vec<String>,
    by_key: HashMap<String, &'a T>,
}

impl<'a, T> KeyedItems<'a, T> {
    fn index(items: &'a [T], key_of: impl Fn(&T) -> Option<String>) -> Self {
        let mut order = Vec::with_capacity(items.len());
        let mut by_key = HashMap::with_capacity(items.len());
        for item in items {
            let Some(key) = key_of(item) else {
                continue;
            };
            if by_key.insert(key.clone(), item).is_none() {
                order.push(key);
            }
        }
        Self { order, by_key }
    }

    fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &'a T)> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.by_key.get(key).map(|item| (key.as_str(), *item)))
    }
}
