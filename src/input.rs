//! Input device handles owned by a page
//!
//! Only identity lives here; dispatching input events is left to callers.

use uuid::Uuid;

/// Pointer device
#[derive(Debug, Clone)]
pub struct Mouse {
    id: String,
}

impl Mouse {
    pub fn new() -> Self {
        Self {
            id: format!("mouse-{}", Uuid::new_v4().simple()),
        }
    }

    /// DOM id of this pointer's tracer element
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Default for Mouse {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyboard device
#[derive(Debug, Clone, Default)]
pub struct Keyboard {}
