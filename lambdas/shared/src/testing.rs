//! Test doubles for the outbound seams

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::errors::{Error, Result};
use crate::iam::IamApi;
use crate::models::{LifecycleEvent, RequestType, ResourceProperties, ResponseEnvelope};
use crate::registry::TypeRegistry;
use crate::secrets::SecretStore;
use crate::stacks::{RegionalClients, StackApi, StackRequest};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

pub const RESPONSE_URL: &str =
    "https://cloudformation-custom-resource-response-useast1.s3.amazonaws.com/test";

/// Build a lifecycle event with the given properties
pub fn event(request_type: RequestType, properties: Value) -> LifecycleEvent {
    let properties = match properties {
        Value::Object(map) => ResourceProperties::new(map),
        _ => ResourceProperties::default(),
    };
    LifecycleEvent {
        request_type,
        resource_properties: properties,
        old_resource_properties: None,
        stack_id: "arn:aws:cloudformation:us-east-1:123456789012:stack/test/guid".into(),
        request_id: "test-request-id".into(),
        logical_resource_id: "DatadogResource".into(),
        response_url: RESPONSE_URL.into(),
        physical_resource_id: None,
        resource_type: None,
    }
}

/// Answers API calls from a script, in order, and records every request
///
/// Requests to [`RESPONSE_URL`] are callbacks: they never consume the script.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
    callback_response: HttpResponse,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<HttpResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<HttpResponse>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
            callback_response: HttpResponse::new(200, ""),
        }
    }

    pub fn with_callback_response(mut self, response: HttpResponse) -> Self {
        self.callback_response = response;
        self
    }

    /// Every request, callbacks included
    pub fn all_requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// API requests only
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.all_requests()
            .into_iter()
            .filter(|r| r.url != RESPONSE_URL)
            .collect()
    }

    pub fn callbacks(&self) -> Vec<HttpRequest> {
        self.all_requests()
            .into_iter()
            .filter(|r| r.url == RESPONSE_URL)
            .collect()
    }

    pub fn envelopes(&self) -> Vec<ResponseEnvelope> {
        self.callbacks()
            .iter()
            .map(|r| serde_json::from_str(r.body.as_deref().unwrap_or_default()).unwrap())
            .collect()
    }

    pub fn methods(&self) -> Vec<Method> {
        self.requests().iter().map(|r| r.method).collect()
    }

    pub fn body_json(request: &HttpRequest) -> Value {
        serde_json::from_str(request.body.as_deref().unwrap_or("null")).unwrap()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let is_callback = request.url == RESPONSE_URL;
        self.requests.lock().unwrap().push(request);
        if is_callback {
            return Ok(self.callback_response.clone());
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Transport("no scripted response left".into())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IamCall {
    PutRolePolicy { role: String, name: String },
    CreatePolicy { name: String },
    AttachRolePolicy { role: String, arn: String },
    DetachRolePolicy { role: String, arn: String },
    DeletePolicy { arn: String },
}

#[derive(Default)]
struct IamState {
    calls: Vec<IamCall>,
    inline: BTreeMap<(String, String), String>,
    managed: BTreeMap<String, String>,
    attachments: BTreeSet<(String, String)>,
    delete_failure: Option<String>,
    attach_failure: Option<String>,
}

/// IAM with NoSuchEntity semantics for missing policies
pub struct InMemoryIam {
    state: Mutex<IamState>,
}

impl InMemoryIam {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IamState::default()),
        }
    }

    pub fn fail_deletes_with(&self, message: &str) {
        self.state.lock().unwrap().delete_failure = Some(message.to_string());
    }

    pub fn fail_attaches_with(&self, message: &str) {
        self.state.lock().unwrap().attach_failure = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<IamCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Managed policy name → document
    pub fn managed_policies(&self) -> BTreeMap<String, String> {
        self.state
            .lock()
            .unwrap()
            .managed
            .iter()
            .map(|(arn, doc)| (arn.rsplit('/').next().unwrap_or(arn).to_string(), doc.clone()))
            .collect()
    }

    pub fn inline_policy(&self, role: &str, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .inline
            .get(&(role.to_string(), name.to_string()))
            .cloned()
    }

    /// ARNs attached to `role`
    pub fn attached(&self, role: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .attachments
            .iter()
            .filter(|(r, _)| r == role)
            .map(|(_, arn)| arn.clone())
            .collect()
    }
}

#[async_trait]
impl IamApi for InMemoryIam {
    async fn put_role_policy(&self, role_name: &str, policy_name: &str, document: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(IamCall::PutRolePolicy {
            role: role_name.into(),
            name: policy_name.into(),
        });
        state
            .inline
            .insert((role_name.into(), policy_name.into()), document.into());
        Ok(())
    }

    async fn create_policy(&self, policy_name: &str, document: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(IamCall::CreatePolicy {
            name: policy_name.into(),
        });
        let arn = format!("arn:aws:iam::123456789012:policy/{}", policy_name);
        if state.managed.contains_key(&arn) {
            return Err(Error::Aws(format!("EntityAlreadyExists: {}", policy_name)));
        }
        state.managed.insert(arn.clone(), document.into());
        Ok(arn)
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(IamCall::AttachRolePolicy {
            role: role_name.into(),
            arn: policy_arn.into(),
        });
        if let Some(message) = state.attach_failure.clone() {
            return Err(Error::Aws(message));
        }
        state
            .attachments
            .insert((role_name.into(), policy_arn.into()));
        Ok(())
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(IamCall::DetachRolePolicy {
            role: role_name.into(),
            arn: policy_arn.into(),
        });
        if state
            .attachments
            .remove(&(role_name.to_string(), policy_arn.to_string()))
        {
            Ok(())
        } else {
            Err(Error::NoSuchEntity(policy_arn.into()))
        }
    }

    async fn delete_policy(&self, policy_arn: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(IamCall::DeletePolicy {
            arn: policy_arn.into(),
        });
        if !state.managed.contains_key(policy_arn) {
            return Err(Error::NoSuchEntity(policy_arn.into()));
        }
        if let Some(message) = state.delete_failure.clone() {
            return Err(Error::Aws(message));
        }
        if state.attachments.iter().any(|(_, arn)| arn == policy_arn) {
            return Err(Error::DeleteConflict(policy_arn.into()));
        }
        state.managed.remove(policy_arn);
        Ok(())
    }
}

/// Secrets keyed by id
pub struct MapSecretStore {
    secrets: HashMap<String, String>,
}

impl MapSecretStore {
    pub fn new(secrets: &[(&str, Value)]) -> Self {
        Self {
            secrets: secrets
                .iter()
                .map(|(id, value)| (id.to_string(), value.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl SecretStore for MapSecretStore {
    async fn secret_string(&self, secret_id: &str) -> Result<String> {
        self.secrets
            .get(secret_id)
            .cloned()
            .ok_or_else(|| Error::Secret(format!("{}: ResourceNotFoundException", secret_id)))
    }
}

/// Remembers every configuration written
pub struct RecordingRegistry {
    configurations: Mutex<Vec<(String, String)>>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self {
            configurations: Mutex::new(Vec::new()),
        }
    }

    pub fn configurations(&self) -> Vec<(String, String)> {
        self.configurations.lock().unwrap().clone()
    }
}

#[async_trait]
impl TypeRegistry for RecordingRegistry {
    async fn set_type_configuration(&self, type_arn: &str, configuration: &str) -> Result<()> {
        self.configurations
            .lock()
            .unwrap()
            .push((type_arn.to_string(), configuration.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackCall {
    Create { region: String, request: StackRequest },
    Delete { region: String, stack_name: String },
}

/// Stack operations recorded per region, with one secret store for all regions
pub struct FakeRegions {
    calls: Arc<Mutex<Vec<StackCall>>>,
    secret_regions: Mutex<Vec<String>>,
    secrets: Arc<MapSecretStore>,
    create_failure: Option<String>,
}

impl FakeRegions {
    pub fn new(secrets: MapSecretStore) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            secret_regions: Mutex::new(Vec::new()),
            secrets: Arc::new(secrets),
            create_failure: None,
        }
    }

    pub fn failing_creates_with(mut self, message: &str) -> Self {
        self.create_failure = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<StackCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Regions a secret store was requested for
    pub fn secret_regions(&self) -> Vec<String> {
        self.secret_regions.lock().unwrap().clone()
    }
}

impl RegionalClients for FakeRegions {
    fn stacks(&self, region: &str) -> Arc<dyn StackApi> {
        Arc::new(RegionStacks {
            region: region.to_string(),
            calls: self.calls.clone(),
            create_failure: self.create_failure.clone(),
        })
    }

    fn secrets(&self, region: &str) -> Arc<dyn SecretStore> {
        self.secret_regions.lock().unwrap().push(region.to_string());
        self.secrets.clone()
    }
}

struct RegionStacks {
    region: String,
    calls: Arc<Mutex<Vec<StackCall>>>,
    create_failure: Option<String>,
}

#[async_trait]
impl StackApi for RegionStacks {
    async fn create_stack(&self, request: &StackRequest) -> Result<()> {
        self.calls.lock().unwrap().push(StackCall::Create {
            region: self.region.clone(),
            request: request.clone(),
        });
        match &self.create_failure {
            Some(message) => Err(Error::Aws(message.clone())),
            None => Ok(()),
        }
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<()> {
        self.calls.lock().unwrap().push(StackCall::Delete {
            region: self.region.clone(),
            stack_name: stack_name.to_string(),
        });
        Ok(())
    }
}
