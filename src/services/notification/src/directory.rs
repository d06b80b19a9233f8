//! User directory
//!
//! Resolves opaque recipient ids to contact profiles. The service ships an
//! in-memory implementation that can be seeded from a JSON file; anything
//! implementing [`UserDirectory`] can be handed to the manager instead.

use crate::error::{NotificationError, Result};
use fanout_shared::{DeviceInfo, Platform, RecipientProfile};

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Profiles for the given ids, in input order. Unknown ids are omitted.
    async fn resolve_by_ids(&self, ids: &[String]) -> Result<Vec<RecipientProfile>>;

    async fn resolve_by_id(&self, id: &str) -> Result<RecipientProfile>;
}

/// Read-mostly directory held behind a read-write lock
#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    profiles: Arc<RwLock<HashMap<String, RecipientProfile>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = RecipientProfile>) -> Self {
        let map = profiles
            .into_iter()
            .map(|profile| (profile.id.clone(), profile))
            .collect();
        Self {
            profiles: Arc::new(RwLock::new(map)),
        }
    }

    /// Directory pre-populated with the demo users
    pub fn with_seed_data() -> Self {
        Self::from_profiles(seed_profiles())
    }

    /// Load profiles from a JSON array on disk
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            NotificationError::config(format!(
                "Failed to read directory seed file {}: {}",
                path.display(),
                e
            ))
        })?;
        let profiles: Vec<RecipientProfile> = serde_json::from_str(&raw)?;

        info!(
            "Loaded {} recipient profiles from {}",
            profiles.len(),
            path.display()
        );
        Ok(Self::from_profiles(profiles))
    }

    pub async fn upsert(&self, profile: RecipientProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.id.clone(), profile);
    }

    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn resolve_by_ids(&self, ids: &[String]) -> Result<Vec<RecipientProfile>> {
        let profiles = self.profiles.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| profiles.get(id).cloned())
            .collect())
    }

    async fn resolve_by_id(&self, id: &str) -> Result<RecipientProfile> {
        self.profiles
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| NotificationError::not_found(format!("recipient {}", id)))
    }
}

fn seed_profiles() -> Vec<RecipientProfile> {
    vec![
        RecipientProfile {
            id: "user-001".to_string(),
            name: Some("John Doe".to_string()),
            email: "john.doe@company.com".to_string(),
            chat_handle: "@john.doe".to_string(),
            chat_channel: "C-JOHN-DOE".to_string(),
            devices: vec![
                DeviceInfo {
                    token: "ios-token-john-1".to_string(),
                    platform: Platform::Ios,
                    is_active: true,
                },
                DeviceInfo {
                    token: "ios-token-john-old".to_string(),
                    platform: Platform::Ios,
                    is_active: false,
                },
                DeviceInfo {
                    token: "android-token-john-1".to_string(),
                    platform: Platform::Android,
                    is_active: true,
                },
            ],
        },
        RecipientProfile {
            id: "user-002".to_string(),
            name: Some("Jane Smith".to_string()),
            email: "jane.smith@company.com".to_string(),
            chat_handle: "@jane.smith".to_string(),
            chat_channel: "C-JANE-SMITH".to_string(),
            devices: vec![DeviceInfo {
                token: "android-token-jane-1".to_string(),
                platform: Platform::Android,
                is_active: true,
            }],
        },
        RecipientProfile {
            id: "user-003".to_string(),
            name: Some("Alex Chen".to_string()),
            email: String::new(),
            chat_handle: "@alex.chen".to_string(),
            chat_channel: String::new(),
            devices: vec![DeviceInfo {
                token: "web-token-alex".to_string(),
                platform: Platform::Web,
                is_active: true,
            }],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_resolve_by_ids_omits_unknown_and_keeps_order() {
        let directory = InMemoryDirectory::with_seed_data();
        let ids = vec![
            "user-002".to_string(),
            "ghost".to_string(),
            "user-001".to_string(),
        ];

        let profiles = directory.resolve_by_ids(&ids).await.unwrap();
        let resolved: Vec<_> = profiles.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(resolved, vec!["user-002", "user-001"]);
    }

    #[tokio::test]
    async fn test_resolve_by_id_not_found() {
        let directory = InMemoryDirectory::with_seed_data();
        assert_eq!(
            directory.resolve_by_id("user-001").await.unwrap().email,
            "john.doe@company.com"
        );
        assert!(matches!(
            directory.resolve_by_id("ghost").await,
            Err(NotificationError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_upsert_replaces_profile() {
        let directory = InMemoryDirectory::new();
        assert!(directory.is_empty().await);

        let mut profile = seed_profiles().remove(0);
        directory.upsert(profile.clone()).await;
        profile.email = "new@company.com".to_string();
        directory.upsert(profile).await;

        assert_eq!(directory.len().await, 1);
        assert_eq!(
            directory.resolve_by_id("user-001").await.unwrap().email,
            "new@company.com"
        );
    }

    #[tokio::test]
    async fn test_load_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "ops-1", "email": "ops@company.com", "devices": []}}]"#
        )
        .unwrap();

        let directory = InMemoryDirectory::from_json_file(file.path()).await.unwrap();
        let profile = directory.resolve_by_id("ops-1").await.unwrap();
        assert_eq!(profile.email, "ops@company.com");
        assert!(profile.chat_channel.is_empty());
    }
}
