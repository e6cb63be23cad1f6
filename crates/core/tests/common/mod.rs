//! Shared helpers for the dedup-core integration tests.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use dedup_core::CandidateRecord;
use emr_client::{
    ClientRecord, ClientUpdate, DataRichness, EmrClient, EmrError, EmrResult, RichnessDetails,
    UserMetadata,
};
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;

/// What the stub EMR knows about one client.
#[derive(Clone, Debug)]
pub struct StubClient {
    pub active: bool,
    pub group: Option<String>,
    pub payment_link: Option<String>,
    pub richness: RichnessDetails,
}

impl Default for StubClient {
    fn default() -> Self {
        Self {
            active: true,
            group: None,
            payment_link: None,
            richness: RichnessDetails::default(),
        }
    }
}

/// In-memory EMR. Unknown ids answer as active, ungrouped, unlinked and empty.
#[derive(Default)]
pub struct StubEmrClient {
    clients: HashMap<String, StubClient>,
    lookup_failures: HashMap<String, String>,
    update_failures: HashMap<String, String>,
    pub lookups: RefCell<Vec<String>>,
    pub updates: RefCell<Vec<String>>,
}

impl StubEmrClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, id: &str, client: StubClient) -> Self {
        self.clients.insert(id.to_string(), client);
        self
    }

    /// Every lookup for `id` fails with a network-style error.
    pub fn failing_lookup(mut self, id: &str) -> Self {
        self.lookup_failures
            .insert(id.to_string(), "connection reset by peer".to_string());
        self
    }

    pub fn failing_update(mut self, id: &str) -> Self {
        self.update_failures
            .insert(id.to_string(), "internal error".to_string());
        self
    }

    pub fn updated_ids(&self) -> Vec<String> {
        self.updates.borrow().clone()
    }

    fn client(&self, id: &str) -> EmrResult<StubClient> {
        self.lookups.borrow_mut().push(id.to_string());
        if let Some(body) = self.lookup_failures.get(id) {
            return Err(EmrError::UnexpectedStatus {
                status: 503,
                body: body.clone(),
            });
        }
        Ok(self.clients.get(id).cloned().unwrap_or_default())
    }
}

impl EmrClient for StubEmrClient {
    fn get_client(&self, external_id: &str) -> EmrResult<ClientRecord> {
        let client = self.client(external_id)?;
        Ok(ClientRecord {
            id: external_id.to_string(),
            active: client.active,
            user_group_id: client.group,
        })
    }

    fn get_user_metadata(&self, external_id: &str) -> EmrResult<UserMetadata> {
        let client = self.client(external_id)?;
        let mut metadata = UserMetadata::new();
        metadata.insert("signup_source".into(), json!("import"));
        if let Some(link) = client.payment_link {
            metadata.insert("stripe_customer_id".into(), json!(link));
        }
        Ok(metadata)
    }

    fn get_data_richness(&self, external_id: &str) -> EmrResult<DataRichness> {
        let client = self.client(external_id)?;
        Ok(DataRichness {
            score: 0.0,
            details: client.richness,
        })
    }

    fn update_client(&self, external_id: &str, update: &ClientUpdate) -> EmrResult<()> {
        assert!(!update.active, "the engine only ever deactivates");
        self.updates.borrow_mut().push(external_id.to_string());
        if let Some(body) = self.update_failures.get(external_id) {
            return Err(EmrError::UnexpectedStatus {
                status: 500,
                body: body.clone(),
            });
        }
        Ok(())
    }
}

pub fn patient(
    id: &str,
    first: &str,
    last: &str,
    email: Option<&str>,
    dob: Option<&str>,
    created_year: i32,
) -> CandidateRecord {
    CandidateRecord::new(
        id,
        first,
        last,
        email.map(str::to_string),
        dob.map(str::to_string),
        Utc.with_ymd_and_hms(created_year, 1, 1, 0, 0, 0).unwrap(),
    )
}
