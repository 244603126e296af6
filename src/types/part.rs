//! Message and artifact part types.
//!
//! Parts are the content fragments that make up messages and artifacts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A discriminated union representing a part of a message or artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    /// A text content part.
    Text(TextPart),
    /// A file content part.
    File(FilePart),
    /// A structured data part.
    Data(DataPart),
}

impl Part {
    /// Creates a new text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(TextPart::new(text))
    }

    /// Creates a new file part with base64-encoded bytes.
    pub fn file_bytes(bytes: impl Into<String>, mime_type: Option<String>) -> Self {
        Part::File(FilePart {
            file: FileContent::Bytes(FileWithBytes {
                bytes: bytes.into(),
                mime_type,
                name: None,
            }),
            metadata: None,
        })
    }

    /// Creates a new file part referencing a URI.
    pub fn file_uri(uri: impl Into<String>, mime_type: Option<String>) -> Self {
        Part::File(FilePart {
            file: FileContent::Uri(FileWithUri {
                uri: uri.into(),
                mime_type,
                name: None,
            }),
            metadata: None,
        })
    }

    /// Creates a new data part.
    pub fn data(data: HashMap<String, serde_json::Value>) -> Self {
        Part::Data(DataPart {
            data,
            metadata: None,
        })
    }

    /// Returns the text content if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(p) => Some(&p.text),
            _ => None,
        }
    }

    /// Returns true if this is a text part.
    pub fn is_text(&self) -> bool {
        matches!(self, Part::Text(_))
    }
}

/// Represents a text segment within a message or artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextPart {
    /// The string content of the text part.
    pub text: String,
    /// Optional metadata associated with this part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl TextPart {
    /// Creates a new text part.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: None,
        }
    }
}

/// Represents a file segment within a message or artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilePart {
    /// The file content, either inline bytes or a URI.
    pub file: FileContent,
    /// Optional metadata associated with this part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// File content, provided either inline or by reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FileContent {
    /// File content provided as base64-encoded bytes.
    Bytes(FileWithBytes),
    /// File content located at a URI.
    Uri(FileWithUri),
}

/// A file with its content provided as base64-encoded bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileWithBytes {
    /// The base64-encoded content of the file.
    pub bytes: String,
    /// The MIME type of the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// An optional name for the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A file with its content located at a URI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileWithUri {
    /// A URL pointing to the file's content.
    pub uri: String,
    /// The MIME type of the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// An optional name for the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Represents a structured data segment within a message or artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataPart {
    /// The structured data content.
    pub data: HashMap<String, serde_json::Value>,
    /// Optional metadata associated with this part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_part_serialization() {
        let part = Part::text("Hello, world!");
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains("\"kind\":\"text\""));
        assert!(json.contains("Hello, world!"));
    }

    #[test]
    fn test_file_part_untagged_content() {
        let part = Part::file_uri("https://example.com/f.bin", Some("application/octet-stream".into()));
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains("\"kind\":\"file\""));
        assert!(json.contains("\"uri\""));

        let parsed: Part = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, part);
    }

    #[test]
    fn test_part_as_text() {
        assert_eq!(Part::text("t").as_text(), Some("t"));
        assert_eq!(Part::data(HashMap::new()).as_text(), None);
    }
}
