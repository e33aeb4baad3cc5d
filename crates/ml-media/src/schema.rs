//! Field schema collaborator
//!
//! Which extra custom-property keys a media field declares. The registry never
//! consults this; only the boundary (replace carry-over, edit forms) does.

use ml_core::config::SchemaConfig;

use crate::model::SlotKey;

pub trait SchemaProvider: Send + Sync {
    /// Extra property keys declared for the slot's field, beyond `title` and `alt`
    fn extra_fields(&self, slot: &SlotKey) -> Vec<String>;
}

/// Schema declarations read from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    config: SchemaConfig,
}

impl StaticSchema {
    pub fn new(config: SchemaConfig) -> Self {
        Self { config }
    }

    pub fn declare(
        mut self,
        record_type: &str,
        field: &str,
        extra_fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.config.declare(record_type, field, extra_fields);
        self
    }
}

impl SchemaProvider for StaticSchema {
    fn extra_fields(&self, slot: &SlotKey) -> Vec<String> {
        self.config
            .extra_fields(&slot.record_type, &slot.field)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_fields_apply_to_every_record() {
        let schema = StaticSchema::default().declare("posts", "gallery", ["caption"]);

        assert_eq!(
            schema.extra_fields(&SlotKey::new("posts", "1", "gallery")),
            vec!["caption".to_string()]
        );
        assert_eq!(
            schema.extra_fields(&SlotKey::new("posts", "99", "gallery")),
            vec!["caption".to_string()]
        );
        assert!(schema
            .extra_fields(&SlotKey::new("pages", "1", "gallery"))
            .is_empty());
    }
}
