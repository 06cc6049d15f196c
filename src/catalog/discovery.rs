//! Attributes derived from host metadata
//!
//! The host describes fields with backend storage tags (`int`, `decimal`,
//! `varchar`, ...). Fields whose tag has no scalar counterpart are dropped.

use tracing::debug;

use super::definition::{AttributeDefinition, EntityDefinition, ScalarKind};

/// Product fields reported by the host platform, as `(code, backend type)`.
pub const PRODUCT_METADATA: &[(&str, &str)] = &[
    ("name", "varchar"),
    ("attributeSetId", "int"),
    ("price", "decimal"),
    ("status", "int"),
    ("visibility", "int"),
    ("typeId", "static"),
    ("createdAt", "datetime"),
    ("updatedAt", "datetime"),
    ("weight", "decimal"),
    ("material", "varchar"),
    ("cust_attr", "text"),
    ("websiteIds", "int[]"),
    ("mediaGalleryEntries", "gallery"),
];

/// Map a backend storage tag to a scalar.
pub fn scalar_for_backend_type(backend_type: &str) -> Option<ScalarKind> {
    match backend_type {
        "int" => Some(ScalarKind::Int),
        "decimal" => Some(ScalarKind::Float),
        "varchar" | "text" | "datetime" | "static" => Some(ScalarKind::String),
        _ => None,
    }
}

/// Nullable scalar attributes for every field with a known backend type.
pub fn discover_attributes(fields: &[(&str, &str)]) -> Vec<AttributeDefinition> {
    fields
        .iter()
        .filter_map(|(code, backend_type)| match scalar_for_backend_type(backend_type) {
            Some(kind) => Some(AttributeDefinition::scalar(
                *code,
                format!("{code} ({backend_type})"),
                kind,
                true,
            )),
            None => {
                debug!(field = code, backend_type, "Skipping field with unmapped backend type");
                None
            }
        })
        .collect()
}

/// Add discovered attributes to a definition without overriding declared ones.
pub fn with_discovered(mut definition: EntityDefinition, fields: &[(&str, &str)]) -> EntityDefinition {
    definition.extend_missing(discover_attributes(fields));
    definition
}
