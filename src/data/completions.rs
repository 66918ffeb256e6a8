//! Source and destination queries for the completion-certificate job.

use crate::data::models::{CompletionRecord, CompletionRow};
use sqlx::PgPool;

/// Notice pages worth revisiting for certificates: matched notices with a
/// details link, minus those already processed.
const PENDING_SQL: &str = r#"
SELECT DISTINCT unique_application_number,
       details_link
FROM commencement_notices
WHERE details_link <> ''
  AND notice_type <> 'no match'
  AND unique_application_number NOT IN (
      SELECT unique_application_number FROM completion_certificates)
ORDER BY unique_application_number
"#;

const INSERT_SQL: &str = r#"
INSERT INTO completion_certificates (
    unique_application_number, title, certificate_number, total_units,
    address, ncbo_link
) VALUES ($1, $2, $3, $4, $5, $6)
"#;

pub async fn pending_rows(pool: &PgPool) -> Result<Vec<CompletionRow>, sqlx::Error> {
    sqlx::query_as::<_, CompletionRow>(PENDING_SQL)
        .fetch_all(pool)
        .await
}

/// Append a batch of records in one transaction.
pub async fn append_records(
    pool: &PgPool,
    records: &[CompletionRecord],
) -> Result<(), sqlx::Error> {
    if records.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for record in records {
        sqlx::query(INSERT_SQL)
            .bind(&record.unique_application_number)
            .bind(&record.title)
            .bind(&record.certificate_number)
            .bind(record.total_units)
            .bind(&record.address)
            .bind(&record.ncbo_link)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await
}
