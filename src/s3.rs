//! Utility functions for creating s3 clients and locating s3-hosted assets
use anyhow::Result;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::Client;
use regex::Regex;
use std::path::Path;
use tokio::io::AsyncWriteExt;

const DEFAULT_REGION: &str = "us-east-1";

pub async fn client_from_env() -> Client {
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    Client::new(&config)
}

pub async fn client_from_profile(profile_name: &str) -> Client {
    let base_config = aws_config::from_env()
        .profile_name(profile_name)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&base_config)
        .region(Region::new(DEFAULT_REGION))
        .force_path_style(true)
        .build();

    Client::from_conf(s3_config)
}

pub async fn anon_client(region: &str) -> Client {
    let region = Region::new(region.to_string());
    let config = aws_config::defaults(BehaviorVersion::latest())
        .no_credentials()
        .region(region)
        .load()
        .await;
    Client::new(&config)
}

#[derive(Debug, PartialEq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
    pub region: Option<String>,
}

impl S3Location {
    /// Parses `s3://bucket/key` URIs and virtual-hosted-style https URLs.
    /// Returns `None` for hrefs that do not point at an s3 object.
    pub fn from_href(href: &str) -> Option<Self> {
        if let Some(rest) = href.strip_prefix("s3://") {
            let (bucket, key) = rest.split_once('/')?;
            if bucket.is_empty() || key.is_empty() {
                return None;
            }
            return Some(Self {
                bucket: bucket.to_string(),
                key: key.to_string(),
                region: None,
            });
        }

        let re = Regex::new(
            r"https:\/\/(?<bucket>[\d\w-]+)\.s3\.(?<region>[\d\w-]+)\.amazonaws.com\/(?<key>.+)",
        )
        .expect("Regex pattern should always compile");

        let captures = re.captures(href)?;
        let (_, [bucket, region, key]) = captures.extract();

        Some(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            region: Some(region.to_string()),
        })
    }
}

pub async fn get_object(client: &Client, location: &S3Location, dst: &Path) -> Result<()> {
    let mut file = tokio::fs::File::create(dst).await?;

    let mut object = client
        .get_object()
        .bucket(&location.bucket)
        .key(&location.key)
        .send()
        .await?;

    while let Some(bytes) = object.body.try_next().await? {
        file.write_all(&bytes).await?;
    }
    file.flush().await?;

    Ok(())
}
