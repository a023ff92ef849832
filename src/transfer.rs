use anyhow::{anyhow, Result};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use futures_util::{stream, StreamExt, TryStreamExt};
use stac::Item;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;
use url::Url;

use crate::s3::{self, S3Location};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// The collaborators that move asset bytes around. Both operate on a whole
/// item and return it with every asset href rewritten to the new location.
pub trait AssetTransfer {
    /// Resolves each asset into `work_dir`, rewriting hrefs to point at the
    /// local copies.
    async fn download(&self, item: Item, work_dir: &Path) -> Result<Item>;

    /// Relocates each locally resolved asset to the destination, rewriting
    /// hrefs to point at the persisted objects.
    async fn upload(&self, item: Item) -> Result<Item>;
}

/// Runs the full relocation sequence for `item`: resolve every asset locally,
/// normalize the local hrefs to absolute paths, then relocate to the
/// destination. The staging directory lives for the duration of the call and
/// is removed on every exit path.
pub async fn copy_item_assets<T: AssetTransfer>(transfer: &T, item: Item) -> Result<Item> {
    let staging = tempfile::tempdir()?;
    let item = transfer.download(item, staging.path()).await?;
    let item = make_asset_hrefs_absolute(item, staging.path());
    let item = transfer.upload(item).await?;
    Ok(item)
}

/// Downloading leaves hrefs relative to the staging directory; the upload
/// step needs absolute paths to find the files.
pub fn make_asset_hrefs_absolute(mut item: Item, base: &Path) -> Item {
    for asset in item.assets.values_mut() {
        if Url::parse(&asset.href).is_ok() {
            continue;
        }
        let path = Path::new(&asset.href);
        if path.is_relative() {
            asset.href = base.join(path).to_string_lossy().into_owned();
        }
    }
    item
}

#[derive(Clone, Debug)]
pub struct Destination {
    pub bucket: String,
    pub prefix: String,
}

/// Production transfer: downloads assets from s3 or http(s) into the staging
/// directory and uploads them to the destination bucket.
pub struct S3Transfer {
    client: Client,
    http: reqwest::Client,
    destination: Destination,
    concurrency: usize,
}

impl S3Transfer {
    pub fn new(client: Client, destination: Destination) -> Self {
        Self {
            client,
            http: reqwest::Client::new(),
            destination,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub async fn from_env(destination: Destination) -> Self {
        let client = s3::client_from_env().await;
        Self::new(client, destination)
    }

    pub async fn from_profile(profile_name: &str, destination: Destination) -> Self {
        let client = s3::client_from_profile(profile_name).await;
        Self::new(client, destination)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn fetch_asset(&self, href: &str, dst: &Path) -> Result<()> {
        match S3Location::from_href(href) {
            Some(location) => match &location.region {
                // Virtual-hosted urls name their region; read them with an
                // anonymous regional client.
                Some(region) => {
                    let client = s3::anon_client(region).await;
                    s3::get_object(&client, &location, dst).await
                }
                None => s3::get_object(&self.client, &location, dst).await,
            },
            None => self.fetch_http(href, dst).await,
        }
    }

    async fn fetch_http(&self, href: &str, dst: &Path) -> Result<()> {
        let mut file = tokio::fs::File::create(dst).await?;
        let mut response = self.http.get(href).send().await?.error_for_status()?;
        while let Some(bytes) = response.chunk().await? {
            file.write_all(&bytes).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

impl AssetTransfer for S3Transfer {
    async fn download(&self, mut item: Item, work_dir: &Path) -> Result<Item> {
        let downloads = item.assets.iter().map(|(key, asset)| {
            let key = key.clone();
            let href = asset.href.clone();
            async move {
                let filename = href_file_name(&href)?;
                // Stage each asset under its own key to avoid filename
                // collisions between assets.
                let dir = work_dir.join(&key);
                tokio::fs::create_dir_all(&dir).await?;
                let dst = dir.join(filename);
                info!("Downloading asset {} from {}", key, href);
                self.fetch_asset(&href, &dst).await?;
                Ok::<_, anyhow::Error>((key, dst))
            }
        });
        let resolved: Vec<(String, PathBuf)> = stream::iter(downloads)
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        for (key, path) in resolved {
            if let Some(asset) = item.assets.get_mut(&key) {
                asset.href = path.to_string_lossy().into_owned();
            }
        }
        Ok(item)
    }

    async fn upload(&self, mut item: Item) -> Result<Item> {
        let item_id = item.id.clone();
        let uploads = item.assets.iter().map(|(key, asset)| {
            let key = key.clone();
            let src = PathBuf::from(&asset.href);
            let item_id = item_id.clone();
            async move {
                let filename = src
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| {
                        anyhow!("asset '{}' has no usable local path: {}", key, src.display())
                    })?;
                let object_key = object_key(&self.destination.prefix, &item_id, filename);
                info!(
                    "Uploading asset {} to s3://{}/{}",
                    key, self.destination.bucket, object_key
                );
                let body = ByteStream::from_path(&src).await?;
                self.client
                    .put_object()
                    .bucket(&self.destination.bucket)
                    .key(&object_key)
                    .body(body)
                    .send()
                    .await?;
                let href = format!("s3://{}/{}", self.destination.bucket, object_key);
                Ok::<_, anyhow::Error>((key, href))
            }
        });
        let uploaded: Vec<(String, String)> = stream::iter(uploads)
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        for (key, href) in uploaded {
            if let Some(asset) = item.assets.get_mut(&key) {
                asset.href = href;
            }
        }
        Ok(item)
    }
}

fn href_file_name(href: &str) -> Result<String> {
    if let Ok(url) = Url::parse(href) {
        let name = url
            .path_segments()
            .and_then(|segments| segments.last())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| anyhow!("no file name in href: {}", href))?;
        return Ok(name.to_string());
    }
    let name = Path::new(href)
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("no file name in href: {}", href))?;
    Ok(name.to_string())
}

fn object_key(prefix: &str, item_id: &str, filename: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}", item_id, filename)
    } else {
        format!("{}/{}/{}", prefix, item_id, filename)
    }
}
