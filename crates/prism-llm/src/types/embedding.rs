use serde::{Deserialize, Serialize};

/// Input text for an embedding request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbedInput {
    /// A single text
    Single(String),
    /// A batch of texts
    Multiple(Vec<String>),
}

impl EmbedInput {
    /// View the input as a slice of texts
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::Single(text) => std::slice::from_ref(text),
            Self::Multiple(texts) => texts,
        }
    }

    /// Number of texts in the input
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the input contains no texts
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

fn default_encoding_format() -> String {
    "float".to_owned()
}

/// Canonical embedding request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Model identifier
    pub model: String,
    /// Text(s) to embed
    pub input: EmbedInput,
    /// Vector encoding ("float" or "base64")
    #[serde(default = "default_encoding_format")]
    pub encoding_format: String,
    /// Opaque end-user identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// A single embedding vector in a response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingData {
    /// Object type (always "embedding")
    pub object: String,
    /// The embedding vector
    pub embedding: Vec<f32>,
    /// Position of the source text in the input batch
    pub index: usize,
}

/// Token usage for an embedding request
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    /// Tokens consumed by the input
    pub prompt_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

/// Canonical embedding response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// Object type (always "list")
    pub object: String,
    /// Embeddings, one per input text, in input order
    pub data: Vec<EmbeddingData>,
    /// Model that produced the embeddings
    pub model: String,
    /// Token usage
    pub usage: EmbeddingUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_and_batch_inputs_deserialize() {
        let single: EmbedInput = serde_json::from_str(r#""hello""#).unwrap();
        assert_eq!(single.len(), 1);

        let batch: EmbedInput = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn encoding_format_defaults_to_float() {
        let req: EmbeddingRequest =
            serde_json::from_str(r#"{"model": "text-embedding-3-small", "input": "hi"}"#).unwrap();
        assert_eq!(req.encoding_format, "float");
    }
}
