//! Source and destination queries for the commencement-notice job.

use crate::data::models::{CommencementRecord, CommencementRow};
use sqlx::PgPool;

/// Candidates not yet present in the notices table. Resumability is this
/// anti-join; no other state is persisted between runs.
const PENDING_SQL: &str = r#"
SELECT DISTINCT unique_application_number,
       planning_authority,
       ncbo_link
FROM commencement_candidates
WHERE unique_application_number <> ''
  AND unique_application_number NOT IN (
      SELECT unique_application_number FROM commencement_notices)
ORDER BY unique_application_number
"#;

const INSERT_SQL: &str = r#"
INSERT INTO commencement_notices (
    unique_application_number, planning_authority, extracted_authority,
    notice_type, commencement_date, owner_company, development_location,
    builder_name, notice_description, notice_name, details_link,
    planning_permission_number
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
"#;

pub async fn pending_rows(pool: &PgPool) -> Result<Vec<CommencementRow>, sqlx::Error> {
    sqlx::query_as::<_, CommencementRow>(PENDING_SQL)
        .fetch_all(pool)
        .await
}

/// Append a batch of records in one transaction.
pub async fn append_records(
    pool: &PgPool,
    records: &[CommencementRecord],
) -> Result<(), sqlx::Error> {
    if records.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for record in records {
        sqlx::query(INSERT_SQL)
            .bind(&record.unique_application_number)
            .bind(&record.planning_authority)
            .bind(&record.extracted_authority)
            .bind(&record.notice_type)
            .bind(record.commencement_date)
            .bind(&record.owner_company)
            .bind(&record.development_location)
            .bind(&record.builder_name)
            .bind(&record.notice_description)
            .bind(&record.notice_name)
            .bind(&record.details_link)
            .bind(&record.planning_permission_number)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await
}
