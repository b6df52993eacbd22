//! Post-sync verification
//!
//! Re-runs the comparison after statements were applied and reports the
//! residual drift.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::schema::comparator::Comparator;
use crate::schema::diff::Difference;

/// Result of a verification pass
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub passed: bool,
    pub message: String,
    /// What is still different, empty when `passed`
    pub difference: Difference,
}

/// Checks that the target matches the source
pub struct Verifier<'a> {
    comparator: Comparator<'a>,
}

impl<'a> Verifier<'a> {
    pub fn new(comparator: Comparator<'a>) -> Self {
        Self { comparator }
    }

    /// Compare once more and pass iff nothing is left to change
    pub async fn verify(&self, data_sync_tables: &[String]) -> Result<Verification> {
        let difference = self
            .comparator
            .compare(data_sync_tables)
            .await
            .map_err(|e| Error::VerificationQuery(Box::new(e)))?;

        if difference.is_empty() {
            tracing::info!("Sync verification passed");
            return Ok(Verification {
                passed: true,
                message: "Sync verification passed! No differences found.".to_string(),
                difference,
            });
        }

        let message = format!(
            "Sync verification failed! Still have differences:\n\
             Structure differences: {}\n\
             Data differences: {}\n\
             View differences: {}",
            difference.structure_differences.len(),
            difference.data_differences.len(),
            difference.view_differences.len()
        );
        tracing::warn!(
            structure = difference.structure_differences.len(),
            data = difference.data_differences.len(),
            views = difference.view_differences.len(),
            "Sync verification failed"
        );

        Ok(Verification {
            passed: false,
            message,
            difference,
        })
    }
}
