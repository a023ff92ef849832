use anyhow::{anyhow, Result};
use serde_json::{Map, Value};
use stac::Item;
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::TaskError;
use crate::selection::Partition;
use crate::transfer::{self, AssetTransfer};

/// Builds a structural copy of `item` whose asset mapping is restricted to
/// `keys`.
///
/// The transfer collaborators operate on whole items and cannot target
/// individual assets, so the item handed to them must already be reduced to
/// the assets being copied.
pub fn reduced_item(item: &Item, keys: &BTreeSet<String>) -> Result<Item> {
    let mut value = serde_json::to_value(item)?;
    let assets = take_assets(&mut value)?;
    let reduced: Map<String, Value> = assets
        .into_iter()
        .filter(|(key, _)| keys.contains(key))
        .collect();
    value["assets"] = Value::Object(reduced);
    let item = serde_json::from_value(value)?;
    Ok(item)
}

/// Builds the new item: assets in `partition.copied` are relocated by the
/// transfer collaborator, assets in `partition.kept` are carried over
/// untouched, and every other item field is preserved unchanged.
///
/// The transfer is skipped entirely when there is nothing to copy.
pub async fn reconcile<T: AssetTransfer>(
    item: &Item,
    partition: &Partition,
    transfer: &T,
) -> Result<Item> {
    let mut value = serde_json::to_value(item)?;
    let original_assets = take_assets(&mut value)?;

    let transferred = if partition.copied.is_empty() {
        debug!("No assets selected for copy, skipping transfer");
        Map::new()
    } else {
        let reduced = reduced_item(item, &partition.copied)?;
        let transferred_item = transfer::copy_item_assets(transfer, reduced).await?;
        let mut transferred_value = serde_json::to_value(&transferred_item)?;
        take_assets(&mut transferred_value)?
    };

    let merged = merge_assets(transferred, &original_assets, &partition.kept)?;
    value["assets"] = Value::Object(merged);
    let item = serde_json::from_value(value)?;
    Ok(item)
}

fn take_assets(value: &mut Value) -> Result<Map<String, Value>> {
    match value.get_mut("assets").map(Value::take) {
        Some(Value::Object(assets)) => Ok(assets),
        None => Ok(Map::new()),
        Some(_) => Err(anyhow!("item 'assets' is not an object")),
    }
}

/// Merges the transferred assets with the kept originals. The two key sets
/// are disjoint by construction; an overlap means the selection invariant was
/// violated upstream and is reported rather than resolved.
fn merge_assets(
    transferred: Map<String, Value>,
    original: &Map<String, Value>,
    kept: &BTreeSet<String>,
) -> Result<Map<String, Value>> {
    let mut merged = transferred;
    for key in kept {
        let asset = original
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("kept asset '{}' missing from the original item", key))?;
        if merged.insert(key.clone(), asset).is_some() {
            return Err(TaskError::AssetCollision(key.clone()).into());
        }
    }
    Ok(merged)
}
