//! Template store
//!
//! Versioned, immutable templates held in memory. Creating a template always
//! yields a fresh id at version 1; publishing adds version n+1 next to the
//! existing versions without touching them. A version can be archived, after
//! which it still resolves but no longer renders. Reads take a shared lock so
//! many requests can resolve templates concurrently.

use crate::error::Result;
use crate::renderer::{validate_content_shape, TemplateError};
use fanout_shared::{
    CreateTemplateRequest, PublishTemplateVersionRequest, Template, TemplateStatus,
};

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// In-memory template store keyed by template id, versions kept in order
#[derive(Clone, Default)]
pub struct TemplateStore {
    templates: Arc<RwLock<HashMap<String, Vec<Template>>>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new template at version 1
    pub async fn create_template(&self, request: CreateTemplateRequest) -> Result<Template> {
        request.validate()?;
        validate_content_shape(request.notification_type, &request.content)?;

        let template = Template {
            id: Uuid::new_v4().to_string(),
            name: request.name,
            version: 1,
            notification_type: request.notification_type,
            content: request.content,
            required_variables: request.required_variables,
            description: request.description,
            status: TemplateStatus::Active,
            created_at: Utc::now(),
        };

        self.templates
            .write()
            .await
            .insert(template.id.clone(), vec![template.clone()]);

        info!(
            template_id = %template.id,
            name = %template.name,
            notification_type = %template.notification_type,
            "Template created"
        );
        Ok(template)
    }

    /// Publish the next version of an existing template
    pub async fn publish_version(
        &self,
        id: &str,
        request: PublishTemplateVersionRequest,
    ) -> Result<Template> {
        let mut templates = self.templates.write().await;
        let versions = templates.get_mut(id).ok_or_else(|| TemplateError::NotFound {
            id: id.to_string(),
            version: 0,
        })?;

        let latest = versions.last().ok_or_else(|| TemplateError::NotFound {
            id: id.to_string(),
            version: 0,
        })?;

        validate_content_shape(latest.notification_type, &request.content)?;

        let template = Template {
            id: latest.id.clone(),
            name: latest.name.clone(),
            version: latest.version + 1,
            notification_type: latest.notification_type,
            content: request.content,
            required_variables: request.required_variables,
            description: latest.description.clone(),
            status: TemplateStatus::Active,
            created_at: Utc::now(),
        };
        versions.push(template.clone());

        info!(
            template_id = %template.id,
            version = template.version,
            "Template version published"
        );
        Ok(template)
    }

    /// Look up one exact version
    pub async fn get_by_id_and_version(
        &self,
        id: &str,
        version: u32,
    ) -> std::result::Result<Template, TemplateError> {
        self.templates
            .read()
            .await
            .get(id)
            .and_then(|versions| versions.iter().find(|t| t.version == version))
            .cloned()
            .ok_or_else(|| TemplateError::NotFound {
                id: id.to_string(),
                version,
            })
    }

    /// Mark one version archived. Its content is left as published.
    pub async fn archive_version(&self, id: &str, version: u32) -> Result<Template> {
        let mut templates = self.templates.write().await;
        let template = templates
            .get_mut(id)
            .and_then(|versions| versions.iter_mut().find(|t| t.version == version))
            .ok_or_else(|| TemplateError::NotFound {
                id: id.to_string(),
                version,
            })?;

        template.status = TemplateStatus::Archived;

        info!(template_id = %id, version, "Template version archived");
        Ok(template.clone())
    }

    /// All versions of a template, oldest first
    pub async fn list_versions(&self, id: &str) -> Vec<Template> {
        self.templates
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.templates.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.templates.read().await.is_empty()
    }
}
