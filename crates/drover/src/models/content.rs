use serde::{Deserialize, Serialize};

/// Prompt-caching boundary marker. Attached transiently to content blocks by
/// the retention policy; caching-capable providers serialize it onto the wire,
/// everyone else ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheControl {
    Ephemeral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    pub media_type: String,
    /// Base64-encoded image bytes, kept encoded end to end.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub source: ImageSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

/// Content passed to or from a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text(TextContent),
    Image(ImageContent),
}

impl Content {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Content::Text(TextContent {
            text: text.into(),
            cache_control: None,
        })
    }

    pub fn image<S: Into<String>, T: Into<String>>(data: S, media_type: T) -> Self {
        Content::Image(ImageContent {
            source: ImageSource {
                media_type: media_type.into(),
                data: data.into(),
            },
            cache_control: None,
        })
    }

    /// Get the text if this is a Text variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    /// Get (data, media_type) if this is an Image variant
    pub fn as_image(&self) -> Option<(&str, &str)> {
        match self {
            Content::Image(image) => Some((&image.source.data, &image.source.media_type)),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Content::Image(_))
    }

    pub fn set_cache_control(&mut self, marker: Option<CacheControl>) {
        match self {
            Content::Text(text) => text.cache_control = marker,
            Content::Image(image) => image.cache_control = marker,
        }
    }

    pub fn cache_control(&self) -> Option<CacheControl> {
        match self {
            Content::Text(text) => text.cache_control,
            Content::Image(image) => image.cache_control,
        }
    }
}
