//! Attachments known to the host site

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A locally stored media file as the host tracks it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: u64,
    /// Canonical URL of the original upload
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Looks attachments up by id
pub trait AttachmentResolver {
    fn attachment(&self, id: u64) -> Option<Attachment>;
}

impl AttachmentResolver for HashMap<u64, Attachment> {
    fn attachment(&self, id: u64) -> Option<Attachment> {
        self.get(&id).cloned()
    }
}

/// A request that carries the one attachment it is about
impl AttachmentResolver for Option<Attachment> {
    fn attachment(&self, id: u64) -> Option<Attachment> {
        self.as_ref().filter(|a| a.id == id).cloned()
    }
}
