//! Shared type definitions for the notification fan-out service
//!
//! `core` holds the domain values that flow through the pipeline (channels,
//! recipient profiles, lifecycle states); `api` holds the request and response
//! shapes exchanged with callers and the template model.

pub mod api;
pub mod core;

pub use api::{
    ContentMap, CreateTemplateRequest, NotificationRequest, NotificationResponse,
    NotificationStatusResponse, PublishTemplateVersionRequest, SenderAddress, Template,
    TemplateReference, TemplateStatus,
};
pub use core::{
    DeliveryChannel, DeviceInfo, NotificationStatus, NotificationType, Platform,
    RecipientProfile, StatusEntry,
};
