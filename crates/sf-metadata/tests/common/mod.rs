//! Shared fixtures for job flow tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt};
use sforge_auth::{Authenticator, Session, SessionManager};
use sforge_client::{SoapRequest, SoapResponse, Transport};
use sforge_metadata::{MetadataClient, PollPolicy};

pub const INSTANCE_URL: &str = "https://na1.example.com";

/// Transport that answers from a fixed script and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<SoapResponse>>,
    requests: Mutex<Vec<SoapRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<SoapResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<SoapRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.action).collect()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: SoapRequest) -> BoxFuture<'_, sforge_client::Result<SoapResponse>> {
        self.requests.lock().unwrap().push(request);
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("script ran out of responses");
        async move { Ok(response) }.boxed()
    }
}

/// Authenticator that hands out `session-1`, `session-2`, ...
#[derive(Clone, Default)]
pub struct CountingLogin {
    logins: Arc<AtomicUsize>,
}

impl CountingLogin {
    pub fn count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

impl Authenticator for CountingLogin {
    fn authenticate(&self) -> BoxFuture<'_, sforge_auth::Result<Session>> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Ok(Session::new(INSTANCE_URL, format!("session-{n}"))) }.boxed()
    }

    fn cache_key(&self) -> String {
        "counting".to_string()
    }
}

/// Client over `transport` that never sleeps between polls and collects
/// progress lines.
pub fn client(
    transport: Arc<ScriptedTransport>,
    login: CountingLogin,
) -> (MetadataClient, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let captured = lines.clone();
    let client = MetadataClient::new(Arc::new(SessionManager::new(login)), transport)
        .with_poll_policy(PollPolicy::immediate())
        .with_progress(move |line: &str| captured.lock().unwrap().push(line.to_string()));
    (client, lines)
}

pub fn ok(body: String) -> SoapResponse {
    SoapResponse::new(200, body)
}

pub fn envelope(operation: &str, result: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns="http://soap.sforce.com/2006/04/metadata"><soapenv:Body><{operation}Response><result>{result}</result></{operation}Response></soapenv:Body></soapenv:Envelope>"#
    )
}

pub fn submitted(operation: &str, id: &str) -> SoapResponse {
    ok(envelope(operation, &format!("<done>false</done><id>{id}</id><state>Queued</state>")))
}

pub fn deploy_status(id: &str, status: &str, details: &str) -> SoapResponse {
    let done = matches!(status, "Succeeded" | "SucceededPartial" | "Failed" | "Canceled");
    ok(envelope(
        "checkDeployStatus",
        &format!(
            "<checkOnly>false</checkOnly><details>{details}</details><done>{done}</done><id>{id}</id>\
             <numberComponentErrors>0</numberComponentErrors><numberComponentsDeployed>3</numberComponentsDeployed>\
             <numberComponentsTotal>10</numberComponentsTotal><numberTestErrors>0</numberTestErrors>\
             <numberTestsCompleted>0</numberTestsCompleted><numberTestsTotal>0</numberTestsTotal>\
             <stateDetail>Deploying</stateDetail><status>{status}</status><success>{done}</success>"
        ),
    ))
}

pub fn retrieve_status(id: &str, status: &str, extra: &str) -> SoapResponse {
    let done = matches!(status, "Succeeded" | "Failed");
    ok(envelope(
        "checkRetrieveStatus",
        &format!("<done>{done}</done><id>{id}</id><status>{status}</status><success>{done}</success>{extra}"),
    ))
}

pub fn component_failure(file: &str, line: u32, problem: &str) -> String {
    format!(
        "<componentFailures><changed>false</changed><columnNumber>5</columnNumber><componentType>ApexClass</componentType>\
         <created>false</created><deleted>false</deleted><fileName>{file}</fileName><fullName>Foo</fullName>\
         <lineNumber>{line}</lineNumber><problem>{problem}</problem><problemType>Error</problemType><success>false</success></componentFailures>"
    )
}

pub fn expired_session() -> SoapResponse {
    SoapResponse::new(
        500,
        r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body><soapenv:Fault><faultcode>sf:INVALID_SESSION_ID</faultcode><faultstring>INVALID_SESSION_ID: Invalid Session ID found in SessionHeader: Illegal Session</faultstring></soapenv:Fault></soapenv:Body></soapenv:Envelope>"#,
    )
}
