use serde::{Deserialize, Serialize};

use crate::enums::WorkflowParameterType;

/// A workflow-level parameter, tagged by where its value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "parameter_type", rename_all = "snake_case")]
pub enum ParameterDescriptor {
  /// A plain value supplied when the workflow is run.
  Workflow {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    workflow_parameter_type: WorkflowParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_value: Option<serde_json::Value>,
  },
  /// A credential held in the backend's secret store.
  Credential {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    credential_id: String,
  },
  /// A value derived at run time from another parameter.
  Context {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    source_parameter_key: String,
  },
  /// A login credential read from an external password vault.
  ///
  /// Reading the vault needs access parameters of its own; the serializer
  /// injects them when a block references this parameter.
  VaultLoginCredential {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    collection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url_parameter_key: Option<String>,
  },
  /// A secret read from the cloud secret manager under `aws_key`.
  AwsSecret {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    aws_key: String,
  },
}

impl ParameterDescriptor {
  pub fn key(&self) -> &str {
    match self {
      Self::Workflow { key, .. }
      | Self::Credential { key, .. }
      | Self::Context { key, .. }
      | Self::VaultLoginCredential { key, .. }
      | Self::AwsSecret { key, .. } => key,
    }
  }

  pub fn is_vault_credential(&self) -> bool {
    matches!(self, Self::VaultLoginCredential { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parameter_tagging() {
    let param: ParameterDescriptor = serde_json::from_value(json!({
      "parameter_type": "workflow",
      "key": "start_url",
      "workflow_parameter_type": "string",
      "default_value": "https://example.com"
    }))
    .unwrap();

    assert_eq!(param.key(), "start_url");
    assert!(!param.is_vault_credential());
  }

  #[test]
  fn test_vault_parameter_optional_fields() {
    let param: ParameterDescriptor = serde_json::from_value(json!({
      "parameter_type": "vault_login_credential",
      "key": "portal_login"
    }))
    .unwrap();

    assert!(param.is_vault_credential());
    assert_eq!(
      serde_json::to_value(&param).unwrap(),
      json!({ "parameter_type": "vault_login_credential", "key": "portal_login" })
    );
  }
}
