use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::{Endpoint, EndpointFetcher, EndpointPayload, FetchError};

/// Fetcher for tests. Each endpoint replays a script of outcomes; the last
/// outcome repeats once the script runs out.
pub struct ScriptedFetcher {
    label: String,
    endpoints: Vec<Endpoint>,
    scripts: Mutex<HashMap<String, VecDeque<Result<EndpointPayload, FetchError>>>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedFetcher {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            endpoints: Vec::new(),
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Register an endpoint with its outcomes, in call order.
    pub fn script(
        mut self,
        endpoint: Endpoint,
        outcomes: Vec<Result<EndpointPayload, FetchError>>,
    ) -> Self {
        self.scripts
            .get_mut()
            .unwrap()
            .insert(endpoint.to_string(), outcomes.into());
        self.endpoints.push(endpoint);
        self
    }

    /// Register an endpoint that always returns `payload`.
    pub fn always(self, endpoint: Endpoint, payload: EndpointPayload) -> Self {
        self.script(endpoint, vec![Ok(payload)])
    }

    /// How many times `endpoint` has been fetched.
    pub fn calls(&self, endpoint: &Endpoint) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&endpoint.to_string())
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl EndpointFetcher for ScriptedFetcher {
    fn label(&self) -> &str {
        &self.label
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.clone()
    }

    async fn fetch(&self, endpoint: &Endpoint) -> Result<EndpointPayload, FetchError> {
        let key = endpoint.to_string();
        *self.calls.lock().unwrap().entry(key.clone()).or_insert(0) += 1;

        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts
            .get_mut(&key)
            .ok_or_else(|| FetchError::Unavailable(key.clone()))?;

        match script.len() {
            0 => Err(FetchError::Unavailable(key)),
            1 => script[0].clone(),
            _ => script
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Unavailable(key))),
        }
    }
}
