//! DTOs for decoding OpenAI-compatible image edit responses.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub(super) struct ImageEditResponseDto {
    pub(super) created: Option<i64>,
    #[serde(default)]
    pub(super) data: Vec<ImageDataDto>,
    pub(super) usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ImageDataDto {
    pub(super) b64_json: Option<String>,
}

impl ImageEditResponseDto {
    /// Take the first non-empty encoded image, if the provider returned one.
    pub(super) fn take_first_image(&mut self) -> Option<String> {
        self.data
            .first_mut()
            .and_then(|entry| entry.b64_json.take())
            .filter(|encoded| !encoded.is_empty())
    }
}

/// Error envelope returned alongside non-success statuses.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ProviderErrorEnvelopeDto {
    #[serde(default)]
    pub(super) error: ProviderErrorDto,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ProviderErrorDto {
    #[serde(rename = "type")]
    pub(super) kind: Option<String>,
    pub(super) code: Option<String>,
}

impl ProviderErrorEnvelopeDto {
    /// Best-effort decode; unknown or malformed bodies yield an empty envelope.
    pub(super) fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    pub(super) fn is_insufficient_quota(&self) -> bool {
        self.error.code.as_deref() == Some("insufficient_quota")
            || self.error.kind.as_deref() == Some("insufficient_quota")
    }

    pub(super) fn signals_overload(&self) -> bool {
        matches!(
            self.error.kind.as_deref(),
            Some("overloaded" | "server_overloaded")
        ) || matches!(
            self.error.code.as_deref(),
            Some("overloaded" | "server_overloaded")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn takes_first_encoded_image() {
        let mut dto: ImageEditResponseDto = serde_json::from_str(
            r#"{"created": 1713833628, "data": [{"b64_json": "Zmlyc3Q="}, {"b64_json": "c2Vjb25k"}]}"#,
        )
        .expect("valid payload");
        assert_eq!(dto.take_first_image().as_deref(), Some("Zmlyc3Q="));
        assert_eq!(dto.created, Some(1_713_833_628));
    }

    #[rstest]
    #[case::no_data(r#"{"created": 1}"#)]
    #[case::empty_data(r#"{"data": []}"#)]
    #[case::url_only(r#"{"data": [{"url": "https://example.invalid/a.png"}]}"#)]
    #[case::blank(r#"{"data": [{"b64_json": ""}]}"#)]
    fn missing_image_yields_none(#[case] body: &str) {
        let mut dto: ImageEditResponseDto = serde_json::from_str(body).expect("valid payload");
        assert!(dto.take_first_image().is_none());
    }

    #[rstest]
    #[case::quota_code(r#"{"error": {"type": "insufficient_quota", "code": "insufficient_quota"}}"#, true, false)]
    #[case::overloaded(r#"{"error": {"type": "server_overloaded"}}"#, false, true)]
    #[case::rate_limit(r#"{"error": {"type": "requests", "code": "rate_limit_exceeded"}}"#, false, false)]
    #[case::not_json("upstream connect error", false, false)]
    fn classifies_error_envelopes(
        #[case] body: &str,
        #[case] quota: bool,
        #[case] overload: bool,
    ) {
        let envelope = ProviderErrorEnvelopeDto::parse(body.as_bytes());
        assert_eq!(envelope.is_insufficient_quota(), quota);
        assert_eq!(envelope.signals_overload(), overload);
    }
}
