//! Typed source records for the four embedded entity kinds.

/// Entity kinds whose embeddings are kept in sync with the source schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Free-text evaluation comments.
    Comment,
    /// Numeric question ratings.
    Rating,
    /// Instructors with their aggregated course lists.
    Instructor,
    /// Course offerings with enrollment figures and instructor lists.
    Course,
}

impl EntityKind {
    /// Every kind in the fixed processing order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Comment,
        EntityKind::Rating,
        EntityKind::Instructor,
        EntityKind::Course,
    ];

    /// Lowercase name used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Comment => "comment",
            EntityKind::Rating => "rating",
            EntityKind::Instructor => "instructor",
            EntityKind::Course => "course",
        }
    }

    /// Table holding this kind's rows inside the source schema.
    pub fn source_table(&self) -> &'static str {
        match self {
            EntityKind::Comment => "comments",
            EntityKind::Rating => "ratings",
            EntityKind::Instructor => "instructors",
            EntityKind::Course => "courses",
        }
    }

    /// Key column of this kind's vector table.
    pub fn key_column(&self) -> &'static str {
        match self {
            EntityKind::Comment => "comment_id",
            EntityKind::Rating => "rating_id",
            EntityKind::Instructor => "instructor_id",
            EntityKind::Course => "course_id",
        }
    }
}

/// One stale comment row.
#[derive(Clone, Debug)]
pub struct CommentRecord {
    /// Source-row identity.
    pub id: i64,
    /// Question the comment answers.
    pub question_text: Option<String>,
    /// Free-text comment body.
    pub comment_text: Option<String>,
    /// Evaluation category.
    pub category: Option<String>,
}

/// One stale rating row.
#[derive(Clone, Debug)]
pub struct RatingRecord {
    /// Source-row identity.
    pub id: i64,
    /// Question the rating answers.
    pub question_text: Option<String>,
    /// Evaluation category.
    pub category: Option<String>,
    /// Mean score on the 5-point scale.
    pub course_mean: Option<f64>,
}

/// One stale instructor row with its aggregated course list.
#[derive(Clone, Debug)]
pub struct InstructorRecord {
    /// Source-row identity.
    pub id: i64,
    /// Instructor name.
    pub name: Option<String>,
    /// `code: name (term)` entries joined with ` | `, absent when the
    /// instructor has no linked courses.
    pub courses: Option<String>,
}

/// One stale course row with its aggregated instructor list.
#[derive(Clone, Debug)]
pub struct CourseRecord {
    /// Source-row identity.
    pub id: i64,
    /// Catalog course code (e.g. `CS101`).
    pub course_code: Option<String>,
    /// Course title.
    pub course_name: Option<String>,
    /// Subject area.
    pub subject: Option<String>,
    /// Catalog section.
    pub catalog_section: Option<String>,
    /// Term name (e.g. `Fall`).
    pub semester: Option<String>,
    /// Term year.
    pub year: Option<i32>,
    /// Enrolled student count.
    pub enrollment: Option<i32>,
    /// Evaluation response count.
    pub responses: Option<i32>,
    /// Instructor names joined with `, `, absent when none are linked.
    pub instructors: Option<String>,
}

/// A stale source row of any kind, as returned by the dirty tracker.
#[derive(Clone, Debug)]
pub enum StaleRecord {
    /// A comment awaiting re-embedding.
    Comment(CommentRecord),
    /// A rating awaiting re-embedding.
    Rating(RatingRecord),
    /// An instructor awaiting re-embedding.
    Instructor(InstructorRecord),
    /// A course awaiting re-embedding.
    Course(CourseRecord),
}

impl StaleRecord {
    /// Identity of the underlying source row.
    pub fn id(&self) -> i64 {
        match self {
            StaleRecord::Comment(record) => record.id,
            StaleRecord::Rating(record) => record.id,
            StaleRecord::Instructor(record) => record.id,
            StaleRecord::Course(record) => record.id,
        }
    }

    /// Entity kind of the underlying source row.
    pub fn kind(&self) -> EntityKind {
        match self {
            StaleRecord::Comment(_) => EntityKind::Comment,
            StaleRecord::Rating(_) => EntityKind::Rating,
            StaleRecord::Instructor(_) => EntityKind::Instructor,
            StaleRecord::Course(_) => EntityKind::Course,
        }
    }
}
