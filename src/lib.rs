#![allow(async_fn_in_trait)]
pub mod error;
pub mod payload;
pub mod reconcile;
pub mod s3;
pub mod selection;
pub mod task;
pub mod transfer;
pub mod validate;
