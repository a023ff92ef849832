use std::collections::BTreeSet;

use tracing::{error, info};

use crate::error::TaskError;
use crate::payload::Payload;
use crate::reconcile;
use crate::selection;
use crate::transfer::AssetTransfer;
use crate::validate::SchemaValidator;

pub const TASK_NAME: &str = "copy-assets";

/// Runs the copy-assets task over `payload`: partition the item's assets per
/// the task options, relocate the copied subset through `transfer`, merge the
/// result with the untouched assets, and gate the reconciled item on
/// `validator` before handing the payload back.
pub async fn run<T, V>(
    mut payload: Payload,
    transfer: &T,
    validator: &V,
) -> Result<Payload, TaskError>
where
    T: AssetTransfer,
    V: SchemaValidator,
{
    let options = payload.task_options()?;
    let item = payload.item()?;
    let item_id = item.id.clone();

    let original_keys: BTreeSet<String> = item.assets.keys().cloned().collect();
    let partition = selection::partition(&original_keys, &options);
    info!(
        "Copying {} assets of item {}, keeping {} as-is",
        partition.copied.len(),
        item_id,
        partition.kept.len()
    );

    let item = reconcile::reconcile(item, &partition, transfer)
        .await
        .map_err(|cause| {
            let err = TaskError::Processing {
                item_id: item_id.clone(),
                cause,
            };
            error!("{}", err);
            err
        })?;

    validator.validate(&item).map_err(|failure| {
        let err = TaskError::Validation {
            item_id: item_id.clone(),
            message: failure.first_message().to_string(),
        };
        error!("{}", err);
        err
    })?;

    payload.replace_item(item);
    Ok(payload)
}
