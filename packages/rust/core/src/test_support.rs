//! Shared test doubles for this crate's unit tests.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::clone::{CloneError, Cloner};

/// A [`Cloner`] that creates an empty directory instead of cloning.
///
/// URLs listed in `fail` produce a simulated git failure.
#[derive(Default)]
pub struct FakeCloner {
    fail: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeCloner {
    pub fn failing(urls: &[&str]) -> Self {
        Self {
            fail: urls.iter().map(|u| u.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Cloner for FakeCloner {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), CloneError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.fail.iter().any(|f| f == url) {
            return Err(CloneError::GitFailed {
                code: Some(128),
                stderr: "simulated failure".into(),
            });
        }
        std::fs::create_dir_all(dest).map_err(|source| CloneError::Io {
            path: dest.to_path_buf(),
            source,
        })
    }
}
