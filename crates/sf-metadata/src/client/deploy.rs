use tracing::info;

use crate::deploy::DeployOptions;
use crate::envelope::{Operation, Params};
use crate::error::Result;
use crate::job::JobStatus;
use crate::report::Report;
use crate::types::CancelDeployResult;

impl super::MetadataClient {
    /// Deploy a zip archive and wait for the job to finish.
    ///
    /// The archive must hold `package.xml` and the components in their
    /// metadata directories (e.g. `classes/MyClass.cls`). Set
    /// `options.check_only` to validate without saving.
    pub async fn deploy(&self, package_zip: &[u8], options: &DeployOptions) -> Result<Report> {
        let handle = self.submit_deploy(package_zip, options).await?;
        Ok(self.wait_for(handle).await)
    }

    /// [`deploy`](Self::deploy) for an archive that is already base64.
    pub async fn deploy_base64(&self, zip_base64: String, options: &DeployOptions) -> Result<Report> {
        let handle = self.submit_deploy_base64(zip_base64, options).await?;
        Ok(self.wait_for(handle).await)
    }

    /// Deploy a recent successful validation without running tests again.
    pub async fn deploy_recent_validation(&self, validation_id: &str) -> Result<Report> {
        let handle = self.submit_recent_validation(validation_id).await?;
        Ok(self.wait_for(handle).await)
    }

    /// Check a deploy job once.
    pub async fn check_deploy_status(
        &self,
        async_process_id: &str,
        include_details: bool,
    ) -> Result<JobStatus> {
        let params = Params::new()
            .with("asyncProcessId", async_process_id)
            .with("includeDetails", include_details);
        let envelope = self.invoke(Operation::CheckDeployStatus, &params).await?;
        Ok(JobStatus::from_envelope(
            &envelope,
            Operation::CheckDeployStatus.name(),
        )?)
    }

    /// Request cancellation of a deploy.
    pub async fn cancel_deploy(&self, async_process_id: &str) -> Result<CancelDeployResult> {
        let params = Params::new().with("String", async_process_id);
        let envelope = self.invoke(Operation::CancelDeploy, &params).await?;
        let result = CancelDeployResult::from_node(envelope.result(Operation::CancelDeploy.name())?)?;
        info!(job_id = %result.id, done = result.done, "Cancel requested");
        Ok(result)
    }
}
