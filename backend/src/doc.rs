//! OpenAPI documentation configuration.
//!
//! This module defines the [`ApiDoc`] struct which generates the OpenAPI
//! specification for the HTTP API. It registers:
//!
//! - **Paths**: the image edit endpoint and the health probes
//! - **Schemas**: domain type wrappers ([`ErrorSchema`], [`ErrorCodeSchema`])
//!   that provide OpenAPI definitions without coupling domain types to the
//!   utoipa framework, plus the edit request and response payloads
//!
//! The generated specification is used by Swagger UI (debug builds) and
//! exported via `cargo run --bin openapi-dump` for external tooling.

use crate::inbound::http::image_edit::{
    EditedImagePayload, ImageEditFormSchema, ImageEditResponse,
};
use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};
use utoipa::OpenApi;

/// OpenAPI document for the HTTP API.
/// Swagger UI is enabled in debug builds only and used by tooling.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Restyle backend API",
        description = "Image restyling through a remote edit provider, with bounded retries and client cancellation."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::image_edit::edit_image,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        ImageEditFormSchema,
        ImageEditResponse,
        EditedImagePayload
    )),
    tags(
        (name = "image-edit", description = "Submit images for restyling"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    //! Tests verifying OpenAPI schema field structure.

    use super::*;
    use utoipa::openapi::RefOr;
    use utoipa::openapi::schema::Schema;

    // Note: utoipa replaces :: with . in schema names
    const ERROR_SCHEMA_NAME: &str = "crate.domain.Error";

    /// Assert that an Object schema contains a field with the given name.
    fn assert_object_schema_has_field(schema: &RefOr<Schema>, field: &str) {
        match schema {
            RefOr::T(Schema::Object(obj)) => {
                assert!(
                    obj.properties.contains_key(field),
                    "schema should have field '{field}'"
                );
            }
            _ => panic!("expected Object schema"),
        }
    }

    #[test]
    fn openapi_error_schema_uses_wire_field_names() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        let error_schema = schemas.get(ERROR_SCHEMA_NAME).expect("Error schema");

        assert_object_schema_has_field(error_schema, "code");
        assert_object_schema_has_field(error_schema, "error");
        assert_object_schema_has_field(error_schema, "traceId");
    }

    #[test]
    fn openapi_edit_response_schema_is_camel_case() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        let response = schemas
            .get("ImageEditResponse")
            .expect("ImageEditResponse schema");

        for field in ["success", "image", "usage", "style", "prompt", "createdAt"] {
            assert_object_schema_has_field(response, field);
        }
    }

    #[test]
    fn openapi_lists_edit_endpoint() {
        let doc = ApiDoc::openapi();
        let path = doc
            .paths
            .paths
            .get("/api/image-edit")
            .expect("image edit path");
        assert!(path.post.is_some(), "edit endpoint should be a POST");
        assert!(doc.paths.paths.contains_key("/health/ready"));
        assert!(doc.paths.paths.contains_key("/health/live"));
    }
}
