use std::collections::HashMap;
use std::path::Path;

/// One entry of the bridged collection. `token_id` is the item's index in
/// the collection file, which is also the token id minted on the contract
/// side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionItem {
    pub inscription_id: String,
    pub token_id: u64,
    pub meta: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawCollectionItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    meta: serde_json::Value,
}

/// Immutable registry loaded once at startup, with O(1) lookup by
/// inscription id and by token id.
#[derive(Debug, Clone)]
pub struct CollectionRegistry {
    items: Vec<CollectionItem>,
    by_id: HashMap<String, usize>,
    by_token_id: HashMap<u64, usize>,
}

impl CollectionRegistry {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let file = std::fs::read(path)
            .map_err(|e| format!("unable to read collection file {}: {e}", path.display()))?;
        let raw_items: Vec<RawCollectionItem> = serde_json::from_slice(&file)
            .map_err(|e| format!("invalid collection file {}: {e}", path.display()))?;
        Ok(Self::from_raw_items(raw_items))
    }

    pub(crate) fn from_raw_items(raw_items: Vec<RawCollectionItem>) -> Self {
        let mut registry = CollectionRegistry {
            items: vec![],
            by_id: HashMap::new(),
            by_token_id: HashMap::new(),
        };
        for (index, raw) in raw_items.into_iter().enumerate() {
            if raw.id.is_empty() || registry.by_id.contains_key(&raw.id) {
                continue;
            }
            let item = CollectionItem {
                inscription_id: raw.id,
                token_id: index as u64,
                meta: raw.meta,
            };
            registry.by_id.insert(item.inscription_id.clone(), registry.items.len());
            registry.by_token_id.insert(item.token_id, registry.items.len());
            registry.items.push(item);
        }
        registry
    }

    pub fn token_id_for(&self, inscription_id: &str) -> Option<u64> {
        self.by_id
            .get(inscription_id)
            .map(|index| self.items[*index].token_id)
    }

    pub fn item_by_token_id(&self, token_id: u64) -> Option<&CollectionItem> {
        self.by_token_id.get(&token_id).map(|index| &self.items[*index])
    }

    pub fn contains(&self, inscription_id: &str) -> bool {
        self.by_id.contains_key(inscription_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[CollectionItem] {
        &self.items
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn registry_from_json(json: &str) -> CollectionRegistry {
        CollectionRegistry::from_raw_items(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn token_id_matches_the_file_index() {
        let registry = registry_from_json(
            r#"[
                {"id": "aaai0", "meta": {"name": "Ape #0"}},
                {"id": "bbbi0", "meta": {"name": "Ape #1"}},
                {"id": "ccci0", "meta": {"name": "Ape #2"}}
            ]"#,
        );
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.token_id_for("aaai0"), Some(0));
        assert_eq!(registry.token_id_for("ccci0"), Some(2));
        assert_eq!(
            registry.item_by_token_id(1).unwrap().inscription_id,
            "bbbi0"
        );
        assert_eq!(registry.token_id_for("unknowni0"), None);
    }

    #[test]
    fn skips_empty_and_duplicate_ids() {
        let registry = registry_from_json(
            r#"[
                {"id": "aaai0", "meta": {}},
                {"id": "", "meta": {}},
                {"id": "aaai0", "meta": {"dup": true}},
                {"id": "bbbi0", "meta": {}}
            ]"#,
        );
        assert_eq!(registry.len(), 2);
        // Surviving items keep the index they had in the file.
        assert_eq!(registry.token_id_for("aaai0"), Some(0));
        assert_eq!(registry.token_id_for("bbbi0"), Some(3));
        assert_eq!(registry.item_by_token_id(1), None);
        assert_eq!(registry.item_by_token_id(2), None);
        // The duplicate did not overwrite the first occurrence's metadata.
        assert_eq!(
            registry.item_by_token_id(0).unwrap().meta,
            serde_json::json!({})
        );
    }

    #[test]
    fn loads_items_with_missing_meta() {
        let registry = registry_from_json(r#"[{"id": "aaai0"}]"#);
        assert_eq!(
            registry.item_by_token_id(0).unwrap().meta,
            serde_json::Value::Null
        );
    }
}
