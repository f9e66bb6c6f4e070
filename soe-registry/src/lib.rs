//! ABOUTME: Workflow document loading, validated before the kernel ever dispatches a signal
//! ABOUTME: soe-core owns the data model; this crate owns turning YAML into a checked RegistryDocument

mod loader;
mod validate;

pub use loader::RegistryDocument;
pub use validate::validate_registry;

use soe_core::Result;
use std::path::Path;

impl RegistryDocument {
    /// Parse and fully validate a workflow document in one step
    /// (spec.md §7: configuration errors are "rejected before dispatch").
    pub fn load_and_validate(content: &str) -> Result<Self> {
        let doc = Self::from_yaml(content)?;
        validate_registry(&doc.registry)?;
        Ok(doc)
    }

    pub async fn load_and_validate_file(path: &Path) -> Result<Self> {
        let doc = Self::load_from_file(path).await?;
        validate_registry(&doc.registry)?;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_workflows_section_is_rejected() {
        let err = RegistryDocument::load_and_validate("context_schema: {}").unwrap_err();
        assert!(err.to_string().contains("workflows"));
    }

    #[test]
    fn unknown_node_field_is_rejected() {
        let yaml = r#"
workflows:
  main:
    nodes:
      n:
        node_type: router
        event_triggers: [START]
        mystery_field: true
"#;
        let err = RegistryDocument::load_and_validate(yaml).unwrap_err();
        assert!(err.to_string().contains("mystery_field"));
    }

    #[test]
    fn node_order_survives_parsing() {
        let yaml = r#"
workflows:
  main:
    nodes:
      c:
        node_type: router
        event_triggers: [START]
      a:
        node_type: router
        event_triggers: [START]
      b:
        node_type: router
        event_triggers: [START]
"#;
        let doc = RegistryDocument::load_and_validate(yaml).unwrap();
        let names: Vec<&str> = doc
            .registry
            .get("main")
            .unwrap()
            .nodes
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
