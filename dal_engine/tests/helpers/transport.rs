//! In-memory transport: canned bodies per URL, every request recorded.

use dal_engine::{DalError, Result, Transport};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct StaticTransport {
    bodies: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fallback: Option<Arc<Vec<u8>>>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every URL with `body`.
    pub fn serving(body: impl Into<Vec<u8>>) -> Self {
        Self {
            fallback: Some(Arc::new(body.into())),
            ..Self::default()
        }
    }

    pub fn with_body(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), body.into());
        self
    }

    /// Replaces the body served for every URL without a specific entry.
    pub fn set_fallback(&mut self, body: impl Into<Vec<u8>>) {
        self.fallback = Some(Arc::new(body.into()));
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl Transport for StaticTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.requested.lock().unwrap().push(url.to_string());
        if let Some(body) = self.bodies.lock().unwrap().get(url) {
            return Ok(body.clone());
        }
        match &self.fallback {
            Some(body) => Ok(body.as_ref().clone()),
            None => Err(DalError::HttpError {
                status: 404,
                url: url.to_string(),
            }),
        }
    }

    fn get_to_file(&self, url: &str, path: &Path) -> Result<u64> {
        let body = self.get(url)?;
        std::fs::write(path, &body)?;
        Ok(body.len() as u64)
    }

    fn name(&self) -> &'static str {
        "StaticTransport"
    }
}
