//! Source and destination queries for the raw-applications job.

use crate::data::models::{ExtractedRecord, SourceRow};
use sqlx::PgPool;

/// Pending applications, with stored links cleaned of stray newlines and
/// Mayo links rewritten onto the ePlanning detail route. An Bord Pleanála
/// references and the Cork authorities are out of scope for this job.
/// Resumability is the anti-join against the scraped table.
const PENDING_SQL: &str = r#"
SELECT DISTINCT
       unique_application_number,
       application_number,
       planning_authority,
       CASE
           WHEN planning_authority = 'Mayo County Council' THEN
               'https://www.eplanning.ie/MayoCC/AppFileRefDetails/'
                   || substring(replace(replace(link_app_details, chr(10), ''), chr(13), '')
                                from 'filenum=(\d+)')
                   || '/0'
           ELSE replace(replace(link_app_details, chr(10), ''), chr(13), '')
       END AS link_app_details
FROM applications_pending
WHERE unique_application_number NOT LIKE 'REF%'
  AND unique_application_number NOT LIKE '%ABP%'
  AND unique_application_number NOT IN (
      SELECT unique_application_number FROM applications_scraped)
  AND planning_authority NOT IN ('Cork County Council', 'Cork City Council')
ORDER BY planning_authority
"#;

const INSERT_SQL: &str = r#"
INSERT INTO applications_scraped (
    unique_application_number, application_number, application_status,
    development_description, application_type, decision, appeal_decision,
    appeal_type, decision_date, received_date, appeal_decision_date,
    grant_date, applicant, url, created_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
"#;

pub async fn pending_rows(pool: &PgPool) -> Result<Vec<SourceRow>, sqlx::Error> {
    sqlx::query_as::<_, SourceRow>(PENDING_SQL)
        .fetch_all(pool)
        .await
}

/// Append a batch of records in one transaction.
pub async fn append_records(pool: &PgPool, records: &[ExtractedRecord]) -> Result<(), sqlx::Error> {
    if records.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for record in records {
        sqlx::query(INSERT_SQL)
            .bind(&record.unique_application_number)
            .bind(&record.application_number)
            .bind(&record.application_status)
            .bind(&record.development_description)
            .bind(&record.application_type)
            .bind(&record.decision)
            .bind(&record.appeal_decision)
            .bind(&record.appeal_type)
            .bind(record.decision_date)
            .bind(record.received_date)
            .bind(record.appeal_decision_date)
            .bind(record.grant_date)
            .bind(&record.applicant)
            .bind(&record.url)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await
}
