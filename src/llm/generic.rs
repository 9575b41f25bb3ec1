//! Minimal `{prompt, image}` body — last resort for relays that accept
//! neither vendor contract. It has no output-length parameter.

use serde_json::{json, Value};

use super::dialect::encode_image;
use super::types::ImageInput;

pub fn build_body(model: &str, image: &ImageInput, prompt: &str) -> Value {
    json!({
        "model": model,
        "prompt": prompt,
        "image": encode_image(image),
        "mime_type": image.mime_type
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_fields() {
        let image = ImageInput::from_bytes(vec![1, 2, 3]).with_mime_type("image/png");
        let body = build_body("llava", &image, "read");
        assert_eq!(body["prompt"], "read");
        assert_eq!(body["image"], "AQID");
        assert_eq!(body["mime_type"], "image/png");
        assert!(body.get("max_tokens").is_none());
    }
}
