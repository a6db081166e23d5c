//! Receipt extraction prompt
//!
//! The instruction is the whole contract with the model: the keys below are
//! what callers should expect in the output, but nothing enforces them.

use image::DynamicImage;
use uuid::Uuid;

use crate::types::InferenceRequest;

/// Keys the model is asked to fill in.
pub const RECEIPT_KEYS: [&str; 4] = ["comercio", "fecha", "total", "items"];

/// Greedy decoding: extraction wants the same answer every time.
pub const EXTRACTION_TEMPERATURE: f32 = 0.0;

pub const RECEIPT_PROMPT: &str = "Eres un experto contable. Analiza este recibo y extrae la información en formato JSON:
{ \"comercio\": \"\", \"fecha\": \"\", \"total\": 0.00, \"items\": [] }
No añadas texto adicional. Responde solo con el JSON.";

/// Build the request for one receipt image.
pub fn receipt_request(image: DynamicImage) -> InferenceRequest {
    InferenceRequest {
        id: Uuid::new_v4(),
        image,
        prompt: RECEIPT_PROMPT.to_string(),
        temperature: EXTRACTION_TEMPERATURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_every_key() {
        for key in RECEIPT_KEYS {
            assert!(RECEIPT_PROMPT.contains(&format!("\"{}\"", key)), "missing {key}");
        }
    }

    #[test]
    fn test_prompt_forbids_extra_text() {
        assert!(RECEIPT_PROMPT.contains("Responde solo con el JSON"));
    }

    #[test]
    fn test_request_is_greedy() {
        let request = receipt_request(DynamicImage::new_rgb8(8, 8));
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.prompt, RECEIPT_PROMPT);

        let other = receipt_request(DynamicImage::new_rgb8(8, 8));
        assert_ne!(request.id, other.id);
    }
}
