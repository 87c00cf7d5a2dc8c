use crate::envelope::{Operation, Params};
use crate::error::Result;
use crate::job::JobStatus;
use crate::report::Report;
use crate::retrieve::RetrieveRequest;

impl super::MetadataClient {
    /// Retrieve metadata and wait for the job to finish.
    ///
    /// The report's `zip_file` holds the base64 archive exactly as the
    /// server sent it.
    pub async fn retrieve(&self, request: &RetrieveRequest) -> Result<Report> {
        let handle = self.submit_retrieve(request).await?;
        Ok(self.wait_for(handle).await)
    }

    /// Check a retrieve job once.
    pub async fn check_retrieve_status(
        &self,
        async_process_id: &str,
        include_zip: bool,
    ) -> Result<JobStatus> {
        let params = Params::new()
            .with("asyncProcessId", async_process_id)
            .with("includeZip", include_zip);
        let envelope = self.invoke(Operation::CheckRetrieveStatus, &params).await?;
        Ok(JobStatus::from_envelope(
            &envelope,
            Operation::CheckRetrieveStatus.name(),
        )?)
    }
}
