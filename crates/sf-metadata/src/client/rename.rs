use crate::envelope::{Operation, Params};
use crate::error::Result;
use crate::job::JobStatus;
use crate::types::SaveResult;

impl super::MetadataClient {
    /// Rename a metadata component.
    pub async fn rename_metadata(
        &self,
        metadata_type: &str,
        old_full_name: &str,
        new_full_name: &str,
    ) -> Result<SaveResult> {
        let params = Params::new()
            .with("type", metadata_type)
            .with("oldFullName", old_full_name)
            .with("newFullName", new_full_name);
        let envelope = self.invoke(Operation::RenameMetadata, &params).await?;
        Ok(SaveResult::from_node(
            envelope.result(Operation::RenameMetadata.name())?,
        ))
    }

    /// Check any async process through the generic `checkStatus` call.
    pub async fn check_status(&self, async_process_id: &str) -> Result<JobStatus> {
        let params = Params::new().with("asyncProcessId", async_process_id);
        let envelope = self.invoke(Operation::CheckStatus, &params).await?;
        Ok(JobStatus::from_envelope(
            &envelope,
            Operation::CheckStatus.name(),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::{BoxFuture, FutureExt};
    use sforge_auth::{Authenticator, Session, SessionManager};
    use sforge_client::HttpTransport;
    use wiremock::matchers::{body_string_contains, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::MetadataClient;
    use crate::job::JobState;

    struct Seeded;

    impl Authenticator for Seeded {
        fn authenticate(&self) -> BoxFuture<'_, sforge_auth::Result<Session>> {
            async { Ok(Session::new("http://unused.invalid", "fresh")) }.boxed()
        }

        fn cache_key(&self) -> String {
            "seeded".to_string()
        }
    }

    fn client_for(server: &MockServer) -> MetadataClient {
        let sessions =
            SessionManager::new(Seeded).with_session_seed(Session::new(server.uri(), "sid"));
        MetadataClient::new(
            Arc::new(sessions),
            Arc::new(HttpTransport::default_transport().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_rename_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("soapaction", "renameMetadata"))
            .and(body_string_contains("<met:oldFullName>Old__c</met:oldFullName>"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body><renameMetadataResponse><result><fullName>New__c</fullName><success>true</success></result></renameMetadataResponse></soapenv:Body></soapenv:Envelope>"#,
            ))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .rename_metadata("CustomObject", "Old__c", "New__c")
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.full_name, "New__c");
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_check_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("soapaction", "checkStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body><checkStatusResponse><result><id>04s1</id><done>false</done><state>InProgress</state></result></checkStatusResponse></soapenv:Body></soapenv:Envelope>"#,
            ))
            .mount(&server)
            .await;

        let status = client_for(&server).check_status("04s1").await.unwrap();
        assert_eq!(status.id, "04s1");
        assert_eq!(status.state, JobState::InProgress);
        assert!(!status.done);
    }
}
