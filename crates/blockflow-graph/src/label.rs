use std::collections::HashSet;

const DEFAULT_PREFIX: &str = "block";

/// Generates unique, human-legible block labels of the form `<prefix>_<n>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelAllocator {
  prefix: String,
}

impl Default for LabelAllocator {
  fn default() -> Self {
    Self::new(DEFAULT_PREFIX)
  }
}

impl LabelAllocator {
  pub fn new(prefix: impl Into<String>) -> Self {
    Self {
      prefix: prefix.into(),
    }
  }

  /// The label with the smallest ordinal not present in `existing`.
  pub fn generate(&self, existing: &HashSet<String>) -> String {
    let mut ordinal = 1usize;
    loop {
      let candidate = format!("{}_{}", self.prefix, ordinal);
      if !existing.contains(&candidate) {
        return candidate;
      }
      ordinal += 1;
    }
  }

  /// Start a batch that remembers every label it hands out.
  pub fn batch(&self, existing: HashSet<String>) -> LabelBatch<'_> {
    LabelBatch {
      allocator: self,
      taken: existing,
    }
  }
}

/// Label allocation scoped to one edit.
///
/// Labels generated earlier in the batch count as taken, even though they are
/// not in the graph yet.
#[derive(Debug)]
pub struct LabelBatch<'a> {
  allocator: &'a LabelAllocator,
  taken: HashSet<String>,
}

impl LabelBatch<'_> {
  pub fn allocate(&mut self) -> String {
    let label = self.allocator.generate(&self.taken);
    self.taken.insert(label.clone());
    label
  }

  pub fn is_taken(&self, label: &str) -> bool {
    self.taken.contains(label)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn labels(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn test_generate_on_empty_set() {
    assert_eq!(LabelAllocator::default().generate(&HashSet::new()), "block_1");
  }

  #[test]
  fn test_generate_fills_smallest_gap() {
    let existing = labels(&["block_1", "block_2", "block_4"]);
    assert_eq!(LabelAllocator::default().generate(&existing), "block_3");
  }

  #[test]
  fn test_generate_is_deterministic() {
    let existing = labels(&["block_1", "fetch"]);
    let allocator = LabelAllocator::default();
    assert_eq!(allocator.generate(&existing), allocator.generate(&existing));
  }

  #[test]
  fn test_batch_accounts_for_earlier_allocations() {
    let allocator = LabelAllocator::default();
    let mut batch = allocator.batch(labels(&["block_2"]));

    let allocated: Vec<String> = (0..3).map(|_| batch.allocate()).collect();
    assert_eq!(allocated, vec!["block_1", "block_3", "block_4"]);
    assert!(batch.is_taken("block_2"));
  }

  #[test]
  fn test_custom_prefix() {
    let allocator = LabelAllocator::new("step");
    assert_eq!(allocator.generate(&labels(&["step_1"])), "step_2");
  }
}
