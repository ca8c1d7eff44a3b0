use std::collections::HashSet;

use blockflow_config::ParameterDescriptor;
use blockflow_graph::{BlockGraph, KeyRef};

/// Access parameters a vault login credential needs, as (key, secret name).
pub const VAULT_ACCESS_PARAMETERS: [(&str, &str); 3] = [
  ("vault_client_id", "VAULT_CLIENT_ID"),
  ("vault_client_secret", "VAULT_CLIENT_SECRET"),
  ("vault_master_password", "VAULT_MASTER_PASSWORD"),
];

/// The parameter list a definition is exported with.
///
/// Explicit parameters come first in their original order, followed by the
/// parameters implied by what the blocks reference. Keys are unique; the
/// first occurrence wins.
pub fn reconcile_parameters(
  graph: &BlockGraph,
  explicit: &[ParameterDescriptor],
) -> Vec<ParameterDescriptor> {
  let mut seen = HashSet::new();
  let mut parameters: Vec<ParameterDescriptor> = explicit
    .iter()
    .filter(|p| seen.insert(p.key().to_string()))
    .cloned()
    .collect();

  if references_vault_credential(graph, &parameters) {
    for (key, aws_key) in VAULT_ACCESS_PARAMETERS {
      if seen.insert(key.to_string()) {
        parameters.push(ParameterDescriptor::AwsSecret {
          key: key.to_string(),
          description: None,
          aws_key: aws_key.to_string(),
        });
      }
    }
  }

  parameters
}

fn references_vault_credential(graph: &BlockGraph, parameters: &[ParameterDescriptor]) -> bool {
  let vault_keys: HashSet<&str> = parameters
    .iter()
    .filter(|p| p.is_vault_credential())
    .map(|p| p.key())
    .collect();
  if vault_keys.is_empty() {
    return false;
  }

  graph
    .nodes()
    .iter()
    .filter_map(|n| n.as_block())
    .flat_map(|b| b.block.references())
    .any(|(_, key)| matches!(key, KeyRef::Parameter(k) if vault_keys.contains(k)))
}
