//! Typed name definitions for CI cluster resources.

use crate::define_name;

// =============================================================================
// Build queue
// =============================================================================

define_name!(JobName, "job");

// =============================================================================
// Worker fleet
// =============================================================================

define_name!(NodeName, "node");
define_name!(Label, "label");
define_name!(TemplateId, "template");

impl NodeName {
    /// Derives the provisioning template from a node name.
    ///
    /// Cloud-launched nodes are named `<template> (<instance>)`, so the
    /// template is the text before the first whitespace.
    #[must_use]
    pub fn template(&self) -> TemplateId {
        let token = self.0.split_whitespace().next().unwrap_or(self.0.as_str());
        TemplateId(token.to_string())
    }

    /// Returns true if this is the controller's built-in node.
    #[must_use]
    pub fn is_built_in(&self) -> bool {
        matches!(self.0.as_str(), "master" | "Built-In Node" | "(built-in)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_job_name_roundtrip() {
        let job: JobName = "build-42".parse().unwrap();
        assert_eq!(job.as_str(), "build-42");
        assert_eq!(job.to_string(), "build-42");
    }

    #[test]
    fn test_empty_name_rejected() {
        let result: Result<NodeName, _> = "   ".parse();
        assert!(matches!(
            result.unwrap_err(),
            crate::NameError::Empty { kind: "node" }
        ));
    }

    #[test]
    fn test_control_character_rejected() {
        let result: Result<Label, _> = "linux\nlarge".parse();
        assert!(matches!(
            result.unwrap_err(),
            crate::NameError::ControlCharacter { .. }
        ));
    }

    #[test]
    fn test_node_name_preserves_spaces() {
        let node = NodeName::parse("linux-builder (i-0abc123)").unwrap();
        assert_eq!(node.as_str(), "linux-builder (i-0abc123)");
    }

    #[test]
    fn test_template_from_cloud_node() {
        let node = NodeName::parse("linux-builder (i-0abc123)").unwrap();
        assert_eq!(node.template().as_str(), "linux-builder");
    }

    #[test]
    fn test_template_from_plain_node() {
        let node = NodeName::parse("slave-3").unwrap();
        assert_eq!(node.template().as_str(), "slave-3");
    }

    #[test]
    fn test_built_in_node() {
        assert!(NodeName::parse("master").unwrap().is_built_in());
        assert!(!NodeName::parse("slave-3").unwrap().is_built_in());
    }

    #[test]
    fn test_json_rejects_blank_name() {
        let result: Result<JobName, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let label = Label::parse("linux_large").unwrap();
        let json = serde_json::to_string(&label).unwrap();
        assert_eq!(json, "\"linux_large\"");
        let parsed: Label = serde_json::from_str(&json).unwrap();
        assert_eq!(label, parsed);
    }

    proptest! {
        #[test]
        fn template_is_prefix_of_node_name(name in "[a-z][a-z0-9-]{0,12}( \\([a-z0-9-]{1,8}\\))?") {
            let node = NodeName::parse(&name).unwrap();
            let template = node.template();
            prop_assert!(name.starts_with(template.as_str()));
            prop_assert!(!template.as_str().contains(' '));
        }
    }
}
