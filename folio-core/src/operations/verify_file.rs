use crate::{ContentStore, Digests, FileExpectation, Identifier, Result, StoredFile};
use std::sync::Arc;

/// Recomputes a stored file's size and digests and compares them with what
/// the caller expects.
#[derive(Clone)]
pub struct VerifyFileOperation {
    content: Arc<dyn ContentStore>,
}

#[derive(Debug, Clone)]
pub struct VerifyFileOperationRequest {
    pub file_id: Identifier,
    pub expectation: FileExpectation,
}

#[derive(Debug, Clone)]
pub struct VerifyFileOperationResult {
    pub file: StoredFile,
    pub actual_size: u64,
    pub actual_digests: Digests,
}

#[derive(Debug, Clone)]
pub enum VerifyFileOperationOutcome {
    Valid(VerifyFileOperationResult),
    Invalid(VerifyFileOperationResult),
    NotFound,
}

impl VerifyFileOperationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

impl VerifyFileOperation {
    pub fn new(content: Arc<dyn ContentStore>) -> Self {
        Self { content }
    }

    pub async fn run(
        &self,
        request: VerifyFileOperationRequest,
    ) -> Result<VerifyFileOperationOutcome> {
        let VerifyFileOperationRequest {
            file_id,
            expectation,
        } = request;

        let Some(file) = self.content.find_by(&file_id).await? else {
            return Ok(VerifyFileOperationOutcome::NotFound);
        };
        let Some((actual_size, actual_digests)) = self.content.measure(&file_id).await? else {
            return Ok(VerifyFileOperationOutcome::NotFound);
        };

        let valid = expectation.matches(actual_size, &actual_digests);
        if !valid {
            tracing::warn!(
                "File failed verification. file={} expected_size={:?} actual_size={}",
                file_id,
                expectation.size,
                actual_size
            );
        }

        let result = VerifyFileOperationResult {
            file,
            actual_size,
            actual_digests,
        };
        Ok(if valid {
            VerifyFileOperationOutcome::Valid(result)
        } else {
            VerifyFileOperationOutcome::Invalid(result)
        })
    }
}
