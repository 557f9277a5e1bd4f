use uuid::Uuid;

/// A validated generation request; lives only for the duration of one call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub request_id: Uuid,
    pub diff_text: String,
    /// Set when the oversize policy cut the diff down to the input limit.
    pub truncated: bool,
}

impl GenerationRequest {
    pub fn new(diff_text: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            diff_text: diff_text.into(),
            truncated: false,
        }
    }

    pub fn truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    pub fn char_len(&self) -> usize {
        self.diff_text.chars().count()
    }
}
