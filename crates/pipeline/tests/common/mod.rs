//! Shared fixtures for pipeline integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use sheetport_core::imports::job::{ImportLane, SourceType};
use sheetport_core::types::{DbId, JsonRecord};
use sheetport_db::models::import_job::{CreateImportJob, ImportJob};
use sheetport_pipeline::adapters::memory::{
    MemoryAuditSink, MemoryImportStore, MemoryObjectStorage, StaticAccessGuard,
};
use sheetport_pipeline::adapters::queue::QueueDispatcher;
use sheetport_pipeline::jobs::create_job;
use sheetport_pipeline::{Actor, ImportContext, PipelineSettings};

pub const ORG: DbId = 10;
pub const OTHER_ORG: DbId = 20;

pub const MEMBER: Actor = Actor { user_id: 1 };
pub const OUTSIDER: Actor = Actor { user_id: 2 };
pub const ADMIN: Actor = Actor { user_id: 3 };

pub const HASH: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

pub struct Harness {
    pub ctx: ImportContext,
    pub store: Arc<MemoryImportStore>,
    pub storage: Arc<MemoryObjectStorage>,
    pub audit: Arc<MemoryAuditSink>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryImportStore::new());
        let storage = Arc::new(MemoryObjectStorage::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let access = StaticAccessGuard::new()
            .with_member(MEMBER.user_id, ORG)
            .with_member(OUTSIDER.user_id, OTHER_ORG)
            .with_admin(ADMIN.user_id);
        let ctx = ImportContext {
            store: store.clone(),
            access: Arc::new(access),
            storage: storage.clone(),
            audit: audit.clone(),
            dispatcher: Arc::new(QueueDispatcher),
            settings: PipelineSettings::default(),
        };
        Self {
            ctx,
            store,
            storage,
            audit,
        }
    }

    /// Seed the membership form in `organization_id` and return its id.
    pub async fn member_form(&self, organization_id: DbId) -> DbId {
        let (form, _) = self
            .store
            .insert_form(organization_id, "Membership", member_definition())
            .await;
        form.id
    }

    pub async fn interactive_job(&self, form_id: DbId) -> ImportJob {
        create_job(
            &self.ctx,
            &MEMBER,
            CreateImportJob {
                organization_id: ORG,
                source_type: SourceType::Csv,
                lane: ImportLane::Interactive,
                source_file_key: "members.csv".into(),
                source_file_hash: HASH.into(),
                source_row_count: Some(3),
                target_form_id: Some(form_id),
                mapping_template_id: None,
            },
        )
        .await
        .expect("create interactive job")
    }
}

pub fn member_definition() -> Value {
    json!({
        "fields": [
            { "key": "fullName", "label": "Full Name", "type": "text", "required": true },
            { "key": "email", "label": "Email", "type": "email" },
            { "key": "amountPaid", "label": "Dues Paid", "type": "number" },
            { "key": "waiver", "label": "Signed Waiver", "type": "file" }
        ]
    })
}

pub fn headers() -> Vec<String> {
    ["Full Name", "Email", "Dues Paid"]
        .iter()
        .map(|h| h.to_string())
        .collect()
}

pub fn row(name: &str, email: &str, paid: &str) -> JsonRecord {
    let mut record = JsonRecord::new();
    record.insert("Full Name".into(), json!(name));
    record.insert("Email".into(), json!(email));
    record.insert("Dues Paid".into(), json!(paid));
    record
}

/// Three rows; the third has a non-numeric dues amount.
pub fn member_rows() -> Vec<JsonRecord> {
    vec![
        row("Ada Lovelace", "ada@club.test", "120"),
        row("Grace Hopper", "grace@club.test", "1,200.50"),
        row("Alan Turing", "alan@club.test", "abc"),
    ]
}

pub fn member_mapping() -> sheetport_core::imports::mapping::ColumnMapping {
    let mut mapping = sheetport_core::imports::mapping::ColumnMapping::new();
    mapping.insert("Full Name".into(), "fullName".into());
    mapping.insert("Email".into(), "email".into());
    mapping.insert("Dues Paid".into(), "amountPaid".into());
    mapping
}
