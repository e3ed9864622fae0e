use serde::Deserialize;
use validator::Validate;

/// Writable post fields.
///
/// Author fields are not accepted: the author is always the caller.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PostData {
    #[serde(default)]
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub is_published: Option<bool>,
}

impl PostData {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: Some(content.into()),
            is_published: None,
        }
    }
}
