//! S3 buckets and object versions
//!
//! Object-level calls must go to the bucket's own region, so the client
//! resolves each bucket's location once and keeps a client per region.

use anyhow::{Context, Result};
use aws_sdk_s3::Client;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use super::context::AwsContext;
use super::error::from_sdk;
use crate::provider::{ObjectVersion, Page, VersionMarker};

/// Upper bound accepted by `ListBuckets`
const LIST_BUCKETS_PAGE_SIZE: i32 = 10_000;

/// Map a `GetBucketLocation` constraint onto a region name.
///
/// Buckets in us-east-1 report an empty constraint; `EU` is the legacy
/// name of eu-west-1.
pub fn location_to_region(constraint: Option<&str>) -> String {
    match constraint {
        None | Some("") => "us-east-1".to_string(),
        Some("EU") => "eu-west-1".to_string(),
        Some(region) => region.to_string(),
    }
}

/// S3 client that routes bucket operations to the bucket's region
#[derive(Debug)]
pub struct S3Client {
    home: AwsContext,
    clients: Mutex<HashMap<String, Client>>,
    bucket_regions: Mutex<HashMap<String, String>>,
}

impl S3Client {
    pub fn from_context(ctx: &AwsContext) -> Self {
        let mut clients = HashMap::new();
        clients.insert(ctx.region().to_string(), ctx.s3_client());
        Self {
            home: ctx.clone(),
            clients: Mutex::new(clients),
            bucket_regions: Mutex::new(HashMap::new()),
        }
    }

    fn home_client(&self) -> Client {
        self.client_for(self.home.region())
    }

    fn client_for(&self, region: &str) -> Client {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients
            .entry(region.to_string())
            .or_insert_with(|| self.home.for_region(region).s3_client())
            .clone()
    }

    /// Client for the bucket's region, falling back to the home region
    /// when the location cannot be read.
    async fn bucket_client(&self, bucket: &str) -> Client {
        let cached = self
            .bucket_regions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(bucket)
            .cloned();

        let region = match cached {
            Some(region) => region,
            None => {
                let region = match self
                    .home_client()
                    .get_bucket_location()
                    .bucket(bucket)
                    .send()
                    .await
                {
                    Ok(response) => {
                        location_to_region(response.location_constraint().map(|c| c.as_str()))
                    }
                    Err(e) => {
                        debug!(bucket = %bucket, error = %from_sdk(e), "Bucket location unavailable, using home region");
                        self.home.region().to_string()
                    }
                };
                self.bucket_regions
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(bucket.to_string(), region.clone());
                region
            }
        };

        self.client_for(&region)
    }

    pub async fn list_buckets(&self, next: Option<String>) -> Result<Page<String>> {
        let response = self
            .home_client()
            .list_buckets()
            .max_buckets(LIST_BUCKETS_PAGE_SIZE)
            .set_continuation_token(next)
            .send()
            .await
            .map_err(from_sdk)
            .context("Failed to list buckets")?;

        let items = response
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect();

        Ok(Page {
            items,
            next: response.continuation_token().map(str::to_string),
        })
    }

    /// One page of object versions and delete markers
    pub async fn list_object_versions(
        &self,
        bucket: &str,
        next: Option<VersionMarker>,
    ) -> Result<Page<ObjectVersion, VersionMarker>> {
        let (key_marker, version_id_marker) = match next {
            Some(m) => (Some(m.key_marker), m.version_id_marker),
            None => (None, None),
        };

        let response = self
            .bucket_client(bucket)
            .await
            .list_object_versions()
            .bucket(bucket)
            .set_key_marker(key_marker)
            .set_version_id_marker(version_id_marker)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to list object versions in {bucket}"))?;

        let versions = response.versions().iter().filter_map(|v| {
            Some(ObjectVersion {
                key: v.key()?.to_string(),
                version_id: v.version_id()?.to_string(),
                is_delete_marker: false,
            })
        });
        let markers = response.delete_markers().iter().filter_map(|m| {
            Some(ObjectVersion {
                key: m.key()?.to_string(),
                version_id: m.version_id()?.to_string(),
                is_delete_marker: true,
            })
        });
        let items = versions.chain(markers).collect();

        let next = match (response.is_truncated(), response.next_key_marker()) {
            (Some(true), Some(key)) => Some(VersionMarker {
                key_marker: key.to_string(),
                version_id_marker: response.next_version_id_marker().map(str::to_string),
            }),
            _ => None,
        };

        Ok(Page { items, next })
    }

    pub async fn delete_object_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> Result<()> {
        self.bucket_client(bucket)
            .await
            .delete_object()
            .bucket(bucket)
            .key(key)
            .version_id(version_id)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to delete {key} (version {version_id}) from {bucket}"))?;
        Ok(())
    }

    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.bucket_client(bucket)
            .await
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to delete bucket {bucket}"))?;
        Ok(())
    }
}
