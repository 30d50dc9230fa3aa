//! Policy chunker for splitting permission lists across managed policies
//!
//! IAM caps a managed policy document at 6144 characters (whitespace
//! excluded), so a long permission list has to be spread over several
//! policies. Chunking is greedy and order-preserving: the same input and
//! budget always produce the same chunks.

use serde::Serialize;

use crate::errors::{Error, Result};

/// Maximum characters in an AWS managed policy document
pub const DEFAULT_MAX_POLICY_SIZE: usize = 6144;

const POLICY_VERSION: &str = "2012-10-17";

/// Single-statement `Allow` document over `Resource: "*"`
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument<'a> {
    version: &'static str,
    statement: [Statement<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Statement<'a> {
    effect: &'static str,
    action: &'a [String],
    resource: &'static str,
}

impl<'a> PolicyDocument<'a> {
    pub fn allow(actions: &'a [String]) -> Self {
        Self {
            version: POLICY_VERSION,
            statement: [Statement {
                effect: "Allow",
                action: actions,
                resource: "*",
            }],
        }
    }

    /// Compact JSON, the form whose length counts against the budget
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Splits permission lists into policy-sized chunks
pub struct PolicyChunker {
    max_policy_size: usize,
    /// Length of the document with an empty `Action` list
    overhead: usize,
}

impl PolicyChunker {
    /// Create a chunker for the given byte budget
    pub fn new(max_policy_size: usize) -> Self {
        let overhead = PolicyDocument::allow(&[])
            .to_json()
            .map(|json| json.len())
            .unwrap_or_default();
        Self {
            max_policy_size,
            overhead,
        }
    }

    pub fn max_policy_size(&self) -> usize {
        self.max_policy_size
    }

    /// Serialized size of the document holding exactly `actions`
    pub fn document_size(&self, actions: &[String]) -> usize {
        let separators = actions.len().saturating_sub(1);
        self.overhead + separators + actions.iter().map(|a| encoded_len(a)).sum::<usize>()
    }

    /// Partition `permissions` into ordered, non-empty chunks
    ///
    /// Fails when a single permission cannot fit even on its own.
    pub fn chunk(&self, permissions: &[String]) -> Result<Vec<Vec<String>>> {
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_size = self.overhead;

        for permission in permissions {
            let encoded = encoded_len(permission);

            let alone = self.overhead + encoded;
            if alone > self.max_policy_size {
                return Err(Error::PermissionTooLarge {
                    permission: permission.clone(),
                    size: alone,
                    budget: self.max_policy_size,
                });
            }

            let separator = usize::from(!current.is_empty());
            if current_size + separator + encoded > self.max_policy_size {
                chunks.push(std::mem::take(&mut current));
                current_size = alone;
            } else {
                current_size += separator + encoded;
            }
            current.push(permission.clone());
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        Ok(chunks)
    }
}

impl Default for PolicyChunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POLICY_SIZE)
    }
}

/// Split `permissions` into consecutive runs of at most `per_policy` entries
///
/// The older templates chunk by count rather than by size. A zero count is
/// treated as one.
pub fn chunk_by_count(permissions: &[String], per_policy: usize) -> Vec<Vec<String>> {
    permissions
        .chunks(per_policy.max(1))
        .map(<[String]>::to_vec)
        .collect()
}

/// Length of a string once JSON-encoded, quotes and escapes included
fn encoded_len(value: &str) -> usize {
    serde_json::to_string(value)
        .map(|s| s.len())
        .unwrap_or(value.len() + 2)
}
