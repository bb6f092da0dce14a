//! # Kubernetes Write-Back
//!
//! Writes renewed credentials into the Secret with a JSON merge patch on
//! `stringData`. The API server folds `stringData` into `data`, so only the four
//! credential keys change.

use super::{CredentialWriter, WriteBackError};
use crate::constants::FIELD_MANAGER;
use crate::credential::{CredentialPatch, RecordKey};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use std::time::Duration;
use tracing::debug;

/// Patches Secrets through the Kubernetes API
#[derive(Clone)]
pub struct KubeCredentialWriter {
    client: Client,
    timeout: Duration,
}

impl KubeCredentialWriter {
    /// `timeout` bounds a single patch round-trip
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl std::fmt::Debug for KubeCredentialWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCredentialWriter")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialWriter for KubeCredentialWriter {
    async fn patch_credentials(
        &self,
        key: &RecordKey,
        patch: &CredentialPatch,
    ) -> Result<(), WriteBackError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &key.namespace);
        let body = patch.to_merge_patch();
        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PatchParams::default()
        };

        debug!(
            resource.namespace = %key.namespace,
            resource.name = %key.name,
            "Sending merge patch"
        );

        match tokio::time::timeout(self.timeout, api.patch(&key.name, &params, &Patch::Merge(&body)))
            .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(source)) => Err(WriteBackError::Kube {
                key: key.clone(),
                source,
            }),
            Err(_elapsed) => Err(WriteBackError::Timeout {
                key: key.clone(),
                timeout: self.timeout,
            }),
        }
    }
}
