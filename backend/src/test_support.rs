//! Test utilities for the backend crate.
//!
//! This module provides shared helpers for both unit tests (in `src/`) and
//! integration tests (in `tests/`). It is only compiled when running tests or
//! with the `test-support` feature.

pub mod edit_pipeline;

pub mod multipart {
    //! Hand-built `multipart/form-data` bodies for handler tests.

    /// Boundary used by [`MultipartBody`].
    pub const BOUNDARY: &str = "restyle-test-boundary";

    /// Incrementally assembled multipart payload.
    #[derive(Debug, Default, Clone)]
    pub struct MultipartBody {
        bytes: Vec<u8>,
    }

    impl MultipartBody {
        /// Start an empty body.
        pub fn new() -> Self {
            Self::default()
        }

        /// Append a text field.
        #[must_use]
        pub fn text(mut self, name: &str, value: &str) -> Self {
            self.bytes.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
            self
        }

        /// Append a file field.
        #[must_use]
        pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
            self.bytes.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            self.bytes.extend_from_slice(data);
            self.bytes.extend_from_slice(b"\r\n");
            self
        }

        /// `Content-Type` header value for this body.
        pub fn content_type() -> String {
            format!("multipart/form-data; boundary={BOUNDARY}")
        }

        /// Close the body and return its bytes.
        pub fn finish(mut self) -> Vec<u8> {
            self.bytes
                .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
            self.bytes
        }
    }
}
