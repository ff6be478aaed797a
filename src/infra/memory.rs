//! In-process parameter storage.
//!
//! Backs single-process hosts that keep no database, and tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::application::repos::{ParamsRepo, RepoError};
use crate::cache::lock::mutex_lock;
use crate::domain::params::{PageId, ParameterSet};

const SOURCE: &str = "infra::memory";

#[derive(Default)]
pub struct MemoryParamsRepo {
    rows: Mutex<HashMap<PageId, ParameterSet>>,
    load_calls: AtomicUsize,
    replace_calls: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl MemoryParamsRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert rows directly, bypassing call accounting.
    pub fn seed(&self, page_id: PageId, params: ParameterSet) {
        mutex_lock(&self.rows, SOURCE, "seed").insert(page_id, params);
    }

    /// Stored names of a page; `None` when it has no rows.
    pub fn stored(&self, page_id: PageId) -> Option<ParameterSet> {
        mutex_lock(&self.rows, SOURCE, "stored")
            .get(&page_id)
            .cloned()
    }

    /// Make the next storage call fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        *mutex_lock(&self.failure, SOURCE, "fail_next") = Some(message.into());
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn replace_calls(&self) -> usize {
        self.replace_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Result<(), RepoError> {
        match mutex_lock(&self.failure, SOURCE, "take_failure").take() {
            Some(message) => Err(RepoError::from_persistence(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ParamsRepo for MemoryParamsRepo {
    async fn load_params(&self, page_id: PageId) -> Result<ParameterSet, RepoError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        Ok(self.stored(page_id).unwrap_or_default())
    }

    async fn replace_params(
        &self,
        page_id: PageId,
        params: &ParameterSet,
    ) -> Result<(), RepoError> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        let mut rows = mutex_lock(&self.rows, SOURCE, "replace_params");
        if params.is_empty() {
            rows.remove(&page_id);
        } else {
            rows.insert(page_id, params.clone());
        }
        Ok(())
    }
}
