//! Repository-level import job behaviour against a real database.
//!
//! Needs `DATABASE_URL`; run with `cargo test -p sheetport-db -- --ignored`.

use chrono::{Duration, Utc};
use sheetport_core::imports::job::{ImportJobStatus, ImportLane, SourceType};
use sheetport_core::types::DbId;
use sheetport_db::models::import_job::{JobChanges, NewImportJob};
use sheetport_db::models::import_job_error::CreateImportJobError;
use sheetport_db::models::submission::CreateFormSubmission;
use sheetport_db::repositories::{ImportJobErrorRepo, ImportJobRepo, SubmissionRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Fixture {
    organization_id: DbId,
    user_id: DbId,
    form_id: DbId,
    form_version_id: DbId,
}

async fn seed(pool: &PgPool) -> Fixture {
    let (organization_id,): (DbId,) =
        sqlx::query_as("INSERT INTO organizations (name) VALUES ('Rowing Club') RETURNING id")
            .fetch_one(pool)
            .await
            .unwrap();
    let (user_id,): (DbId,) =
        sqlx::query_as("INSERT INTO users (email) VALUES ('sec@club.test') RETURNING id")
            .fetch_one(pool)
            .await
            .unwrap();
    let (form_id,): (DbId,) = sqlx::query_as(
        "INSERT INTO forms (organization_id, name) VALUES ($1, 'Members') RETURNING id",
    )
    .bind(organization_id)
    .fetch_one(pool)
    .await
    .unwrap();
    let (form_version_id,): (DbId,) = sqlx::query_as(
        "INSERT INTO form_versions (form_id, version_number, published_at)
         VALUES ($1, 1, NOW()) RETURNING id",
    )
    .bind(form_id)
    .fetch_one(pool)
    .await
    .unwrap();
    Fixture {
        organization_id,
        user_id,
        form_id,
        form_version_id,
    }
}

fn new_job(fixture: &Fixture, window: Duration) -> NewImportJob {
    NewImportJob {
        organization_id: fixture.organization_id,
        source_type: SourceType::Csv,
        lane: ImportLane::Interactive,
        source_file_key: format!("imports/{}/abc-members.csv", fixture.organization_id),
        source_file_hash: "a".repeat(64),
        source_row_count: Some(2),
        target_form_id: Some(fixture.form_id),
        mapping_template_id: None,
        created_by: fixture.user_id,
        rollback_before: Utc::now() + window,
    }
}

async fn complete(pool: &PgPool, id: DbId) {
    use ImportJobStatus::*;
    let mut job = ImportJobRepo::find_by_id(pool, id).await.unwrap().unwrap();
    for (from, to) in [
        (Pending, Validating),
        (Validating, Validated),
        (Validated, Importing),
        (Importing, Completed),
    ] {
        job = ImportJobRepo::transition(pool, id, job.version, from, to, &JobChanges::default())
            .await
            .unwrap()
            .unwrap();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn stale_version_loses_the_transition(pool: PgPool) {
    let fixture = seed(&pool).await;
    let job = ImportJobRepo::create(&pool, &new_job(&fixture, Duration::days(7)))
        .await
        .unwrap();

    let moved = ImportJobRepo::transition(
        &pool,
        job.id,
        job.version,
        ImportJobStatus::Pending,
        ImportJobStatus::Validating,
        &JobChanges::started(),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(moved.version, job.version + 1);
    assert!(moved.started_at.is_some());

    let stale = ImportJobRepo::transition(
        &pool,
        job.id,
        job.version,
        ImportJobStatus::Pending,
        ImportJobStatus::Cancelled,
        &JobChanges::default(),
    )
    .await
    .unwrap();
    assert!(stale.is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn rollback_removes_only_the_jobs_submissions(pool: PgPool) {
    let fixture = seed(&pool).await;
    let job = ImportJobRepo::create(&pool, &new_job(&fixture, Duration::days(7)))
        .await
        .unwrap();
    complete(&pool, job.id).await;

    for import_job_id in [Some(job.id), Some(job.id), None] {
        SubmissionRepo::create_with_version(
            &pool,
            &CreateFormSubmission {
                form_id: fixture.form_id,
                form_version_id: fixture.form_version_id,
                organization_id: fixture.organization_id,
                import_job_id,
                payload: serde_json::json!({"name": "Ada"}),
                completeness: 1.0,
                submitted_by: Some(fixture.user_id),
            },
        )
        .await
        .unwrap();
    }
    ImportJobErrorRepo::batch_insert(
        &pool,
        job.id,
        &[CreateImportJobError {
            row_number: 3,
            field_key: Some("amountPaid".into()),
            error_type: "validation".into(),
            error_message: "Invalid number".into(),
            raw_value: Some("abc".into()),
        }],
    )
    .await
    .unwrap();

    let rolled = ImportJobRepo::rollback(&pool, job.id, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rolled.deleted_count, 2);
    assert_eq!(rolled.job.status, "rolled_back");
    assert!(!rolled.job.can_rollback);
    assert_eq!(SubmissionRepo::count_by_job(&pool, job.id).await.unwrap(), 0);

    let remaining: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM form_submissions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining.0, 1);

    let errors = ImportJobErrorRepo::list_by_job(&pool, job.id, None, None)
        .await
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].raw_value, None);

    let again = ImportJobRepo::rollback(&pool, job.id, Utc::now()).await.unwrap();
    assert!(again.is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn expired_window_rolls_back_nothing(pool: PgPool) {
    let fixture = seed(&pool).await;
    let job = ImportJobRepo::create(&pool, &new_job(&fixture, Duration::days(-1)))
        .await
        .unwrap();
    complete(&pool, job.id).await;

    let result = ImportJobRepo::rollback(&pool, job.id, Utc::now()).await.unwrap();
    assert!(result.is_none());
    let job = ImportJobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status, "completed");
}
