// src/cloud.rs

//! Cloud instance metadata enrichment
//!
//! Probes the AWS, Azure, and GCP link-local metadata services in that
//! order and folds the first hit's instance tags into the template scope.
//! Each probe is bounded to five seconds; any failure falls through to the
//! next provider and ultimately to `unknown` with no tags.

use crate::template::Scope;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const METADATA_HOST: &str = "http://169.254.169.254";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// What the metadata services told us
#[derive(Debug, Clone, PartialEq)]
pub struct CloudMeta {
    /// `aws`, `azure`, `gcp`, or `unknown`
    pub provider: String,
    pub tags: BTreeMap<String, String>,
}

impl CloudMeta {
    pub fn unknown() -> Self {
        Self {
            provider: "unknown".to_string(),
            tags: BTreeMap::new(),
        }
    }

    /// Fold this metadata into a template scope under `cloud.`
    pub fn into_scope(self, scope: &mut Scope) {
        scope.set("cloud.provider", &self.provider);
        for (key, value) in &self.tags {
            scope.set(&format!("cloud.tags.{}", key), value);
        }
    }
}

/// Probe the metadata services
pub fn fetch() -> CloudMeta {
    let Ok(client) = Client::builder().timeout(PROBE_TIMEOUT).build() else {
        return CloudMeta::unknown();
    };

    for probe in [probe_aws, probe_azure, probe_gcp] {
        if let Some(meta) = probe(&client) {
            debug!("cloud metadata provider: {}", meta.provider);
            return meta;
        }
    }

    CloudMeta::unknown()
}

/// AWS IMDSv2: token, then the instance tag listing
fn probe_aws(client: &Client) -> Option<CloudMeta> {
    let token = client
        .put(format!("{}/latest/api/token", METADATA_HOST))
        .header("X-aws-ec2-metadata-token-ttl-seconds", "60")
        .send()
        .ok()?
        .error_for_status()
        .ok()?
        .text()
        .ok()?;

    let keys = client
        .get(format!("{}/latest/meta-data/tags/instance", METADATA_HOST))
        .header("X-aws-ec2-metadata-token", &token)
        .send()
        .ok()?
        .error_for_status()
        .ok()?
        .text()
        .ok()?;

    let mut tags = BTreeMap::new();
    for key in keys.lines().filter(|k| !k.is_empty()) {
        let value = client
            .get(format!(
                "{}/latest/meta-data/tags/instance/{}",
                METADATA_HOST, key
            ))
            .header("X-aws-ec2-metadata-token", &token)
            .send()
            .ok()?
            .text()
            .ok()?;
        tags.insert(key.to_string(), value);
    }

    Some(CloudMeta {
        provider: "aws".to_string(),
        tags,
    })
}

#[derive(Deserialize)]
struct AzureMeta {
    compute: AzureCompute,
}

#[derive(Deserialize)]
struct AzureCompute {
    #[serde(default)]
    tags: String,
}

/// Azure IMDS: tags come back as one `key:value;key:value` string
fn probe_azure(client: &Client) -> Option<CloudMeta> {
    let meta: AzureMeta = client
        .get(format!(
            "{}/metadata/instance?api-version=2021-02-01",
            METADATA_HOST
        ))
        .header("Metadata", "true")
        .send()
        .ok()?
        .error_for_status()
        .ok()?
        .json()
        .ok()?;

    let mut tags = BTreeMap::new();
    for pair in meta.compute.tags.split(';').filter(|p| !p.is_empty()) {
        if let Some((key, value)) = pair.split_once(':') {
            tags.insert(key.to_string(), value.to_string());
        }
    }

    Some(CloudMeta {
        provider: "azure".to_string(),
        tags,
    })
}

/// GCP metadata: instance attributes as a recursive JSON map
fn probe_gcp(client: &Client) -> Option<CloudMeta> {
    let attrs: BTreeMap<String, String> = client
        .get(format!(
            "{}/computeMetadata/v1/instance/attributes/?recursive=true",
            METADATA_HOST
        ))
        .header("Metadata-Flavor", "Google")
        .send()
        .ok()?
        .error_for_status()
        .ok()?
        .json()
        .ok()?;

    Some(CloudMeta {
        provider: "gcp".to_string(),
        tags: attrs,
    })
}
