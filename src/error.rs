use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("copy-assets: failed processing {item_id} ({cause})")]
    Processing {
        item_id: String,
        cause: anyhow::Error,
    },

    #[error("copied and kept asset sets overlap on key '{0}'")]
    AssetCollision(String),

    #[error("item {item_id} failed validation: {message}")]
    Validation { item_id: String, message: String },
}
