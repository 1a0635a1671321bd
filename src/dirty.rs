//! Staleness flags and stale-set snapshots on the source-of-record tables.
//!
//! The flag column is tri-state: NULL is treated as stale so rows that
//! predate the column are picked up on the next run. Every operation here
//! is idempotent; the pipeline may repeat any of them after a partial
//! failure.

use tokio_postgres::GenericClient;

use crate::error::{Result, SyncError};
use crate::records::{
    CommentRecord, CourseRecord, EntityKind, InstructorRecord, RatingRecord, StaleRecord,
};
use crate::store::quote_ident;

/// Staleness flag column carried by every source table.
pub const STALE_COLUMN: &str = "embedding_needed";

/// Predicate selecting stale rows (unset counts as stale).
const STALE_FILTER: &str = "embedding_needed IS NULL OR embedding_needed = TRUE";

/// Source-schema location of the four entity tables.
#[derive(Debug, Clone)]
pub struct SourceTables {
    schema: String,
}

impl SourceTables {
    /// Builds the source-table locator for the given schema.
    pub fn new<S: Into<String>>(schema: S) -> Result<Self> {
        let schema = schema.into();
        if schema.trim().is_empty() {
            return Err(SyncError::Config("source schema name is required".to_string()));
        }
        Ok(Self { schema })
    }

    /// Returns the raw schema string.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Fully-qualified table reference for one entity kind.
    pub fn table(&self, kind: EntityKind) -> String {
        self.qualified(kind.source_table())
    }

    /// Fully-qualified reference to the course/instructor join table.
    pub fn join_table(&self) -> String {
        self.qualified("course_instructors")
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(table))
    }
}

/// Snapshots the stale set for one kind, fields included, ordered by id.
///
/// Rows that turn stale after the snapshot are picked up by the next run,
/// not retroactively by this one.
pub async fn list_stale(
    client: &impl GenericClient,
    tables: &SourceTables,
    kind: EntityKind,
) -> Result<Vec<StaleRecord>> {
    let sql = list_stale_sql(tables, kind);
    let rows = client.query(&sql, &[]).await?;
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let record = match kind {
            EntityKind::Comment => StaleRecord::Comment(CommentRecord {
                id: row.get("id"),
                question_text: row.get("question_text"),
                comment_text: row.get("comment_text"),
                category: row.get("category"),
            }),
            EntityKind::Rating => StaleRecord::Rating(RatingRecord {
                id: row.get("id"),
                question_text: row.get("question_text"),
                category: row.get("category"),
                course_mean: row.get("course_mean"),
            }),
            EntityKind::Instructor => StaleRecord::Instructor(InstructorRecord {
                id: row.get("id"),
                name: row.get("name"),
                courses: row.get("courses"),
            }),
            EntityKind::Course => StaleRecord::Course(CourseRecord {
                id: row.get("id"),
                course_code: row.get("course_id"),
                course_name: row.get("course_name"),
                subject: row.get("subject"),
                catalog_section: row.get("catalog_section"),
                semester: row.get("semester"),
                year: row.get("year"),
                enrollment: row.get("enrollment"),
                responses: row.get("responses"),
                instructors: row.get("instructors"),
            }),
        };
        records.push(record);
    }
    Ok(records)
}

/// Marks every row of `kind` stale; used for full rebuilds.
pub async fn mark_all_stale(
    client: &impl GenericClient,
    tables: &SourceTables,
    kind: EntityKind,
) -> Result<()> {
    let sql = format!(
        "UPDATE {table} SET {flag} = TRUE",
        table = tables.table(kind),
        flag = STALE_COLUMN,
    );
    client.execute(&sql, &[]).await?;
    Ok(())
}

/// Marks one row fresh.
///
/// Must run inside the same transaction as the vector upsert so the flag
/// never clears without a stored vector.
pub async fn clear_stale(
    client: &impl GenericClient,
    tables: &SourceTables,
    kind: EntityKind,
    id: i64,
) -> Result<()> {
    let sql = format!(
        "UPDATE {table} SET {flag} = FALSE WHERE id = $1",
        table = tables.table(kind),
        flag = STALE_COLUMN,
    );
    client.execute(&sql, &[&id]).await?;
    Ok(())
}

fn list_stale_sql(tables: &SourceTables, kind: EntityKind) -> String {
    match kind {
        EntityKind::Comment => format!(
            "SELECT id, question_text, comment_text, category \
             FROM {table} \
             WHERE {filter} \
             ORDER BY id",
            table = tables.table(kind),
            filter = STALE_FILTER,
        ),
        EntityKind::Rating => format!(
            "SELECT id, question_text, category, course_mean \
             FROM {table} \
             WHERE {filter} \
             ORDER BY id",
            table = tables.table(kind),
            filter = STALE_FILTER,
        ),
        EntityKind::Instructor => format!(
            "SELECT i.id, i.name, \
                    string_agg(DISTINCT c.course_id || ': ' || c.course_name || \
                               ' (' || c.semester || ' ' || c.year || ')', ' | ') AS courses \
             FROM {instructors} i \
             LEFT JOIN {join} ci ON i.id = ci.instructor_id \
             LEFT JOIN {courses} c ON ci.course_id = c.id \
             WHERE i.embedding_needed IS NULL OR i.embedding_needed = TRUE \
             GROUP BY i.id, i.name \
             ORDER BY i.id",
            instructors = tables.table(EntityKind::Instructor),
            join = tables.join_table(),
            courses = tables.table(EntityKind::Course),
        ),
        EntityKind::Course => format!(
            "SELECT c.id, c.course_id, c.course_name, c.subject, c.catalog_section, \
                    c.semester, c.year, c.enrollment, c.responses, \
                    string_agg(DISTINCT i.name, ', ') AS instructors \
             FROM {courses} c \
             LEFT JOIN {join} ci ON c.id = ci.course_id \
             LEFT JOIN {instructors} i ON ci.instructor_id = i.id \
             WHERE c.embedding_needed IS NULL OR c.embedding_needed = TRUE \
             GROUP BY c.id, c.course_id, c.course_name, c.subject, c.catalog_section, \
                      c.semester, c.year, c.enrollment, c.responses \
             ORDER BY c.id",
            courses = tables.table(EntityKind::Course),
            join = tables.join_table(),
            instructors = tables.table(EntityKind::Instructor),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> SourceTables {
        SourceTables::new("trace").expect("valid schema")
    }

    #[test]
    fn unset_flags_count_as_stale() {
        for kind in EntityKind::ALL {
            let sql = list_stale_sql(&tables(), kind);
            assert!(
                sql.contains("embedding_needed IS NULL"),
                "{kind:?} snapshot must treat unset flags as stale"
            );
            assert!(sql.contains("ORDER BY"), "{kind:?} snapshot must be ordered");
        }
    }

    #[test]
    fn joined_kinds_aggregate_their_related_names() {
        let instructor_sql = list_stale_sql(&tables(), EntityKind::Instructor);
        assert!(instructor_sql.contains("string_agg"));
        assert!(instructor_sql.contains("\"trace\".\"course_instructors\""));

        let course_sql = list_stale_sql(&tables(), EntityKind::Course);
        assert!(course_sql.contains("string_agg(DISTINCT i.name, ', ')"));
        assert!(course_sql.contains("GROUP BY c.id"));
    }

    #[test]
    fn blank_schema_is_rejected() {
        assert!(SourceTables::new("  ").is_err());
    }
}
