//! Deterministic text projection fed to the embedding model.
//!
//! The field order inside each template is part of the contract: it shapes
//! the semantic content of the resulting embedding, so it must stay
//! byte-reproducible across runs. Absent optional fields render as the
//! literal token `None` instead of being dropped.

use std::fmt;

use crate::records::{CommentRecord, CourseRecord, InstructorRecord, RatingRecord, StaleRecord};

/// Builds the canonical embedding text for one stale record.
///
/// Pure and total: no I/O, and any well-formed record projects to a
/// non-empty deterministic string.
pub fn project(record: &StaleRecord) -> String {
    match record {
        StaleRecord::Comment(record) => project_comment(record),
        StaleRecord::Rating(record) => project_rating(record),
        StaleRecord::Instructor(record) => project_instructor(record),
        StaleRecord::Course(record) => project_course(record),
    }
}

fn project_comment(record: &CommentRecord) -> String {
    format!(
        "Question: {}. Comment: {}. Category: {}",
        text_or_none(record.question_text.as_deref()),
        text_or_none(record.comment_text.as_deref()),
        text_or_none(record.category.as_deref()),
    )
}

fn project_rating(record: &RatingRecord) -> String {
    format!(
        "Question: {}. Category: {}. Score: {}/5.0",
        text_or_none(record.question_text.as_deref()),
        text_or_none(record.category.as_deref()),
        display_or_none(record.course_mean),
    )
}

fn project_instructor(record: &InstructorRecord) -> String {
    format!(
        "Instructor: {}. Teaches courses: {}",
        text_or_none(record.name.as_deref()),
        text_or_none(record.courses.as_deref()),
    )
}

fn project_course(record: &CourseRecord) -> String {
    format!(
        "Course code: {} Course name: {}. Subject: {}. Section: {}. \
         Term: {} {}. Enrollment: {} students, {} responses. Instructors: {}",
        text_or_none(record.course_code.as_deref()),
        text_or_none(record.course_name.as_deref()),
        text_or_none(record.subject.as_deref()),
        text_or_none(record.catalog_section.as_deref()),
        text_or_none(record.semester.as_deref()),
        display_or_none(record.year),
        display_or_none(record.enrollment),
        display_or_none(record.responses),
        text_or_none(record.instructors.as_deref()),
    )
}

fn text_or_none(value: Option<&str>) -> &str {
    value.unwrap_or("None")
}

fn display_or_none<T: fmt::Display>(value: Option<T>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "None".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_course() -> CourseRecord {
        CourseRecord {
            id: 7,
            course_code: Some("CS101".to_string()),
            course_name: Some("Intro to CS".to_string()),
            subject: Some("CS".to_string()),
            catalog_section: Some("A".to_string()),
            semester: Some("Fall".to_string()),
            year: Some(2023),
            enrollment: Some(100),
            responses: Some(80),
            instructors: Some("Jane Doe".to_string()),
        }
    }

    #[test]
    fn course_projection_carries_code_and_term() {
        let text = project(&StaleRecord::Course(sample_course()));
        assert!(text.contains("CS101"));
        assert!(text.contains("Fall 2023"));
        assert!(text.contains("100 students, 80 responses"));
        assert!(text.contains("Instructors: Jane Doe"));
    }

    #[test]
    fn projection_is_deterministic() {
        let record = StaleRecord::Course(sample_course());
        assert_eq!(project(&record), project(&record));

        let comment = StaleRecord::Comment(CommentRecord {
            id: 1,
            question_text: Some("What did you like?".to_string()),
            comment_text: Some("Great pacing.".to_string()),
            category: Some("overall".to_string()),
        });
        assert_eq!(project(&comment), project(&comment));
    }

    #[test]
    fn absent_fields_render_as_placeholder() {
        let instructor = StaleRecord::Instructor(InstructorRecord {
            id: 3,
            name: Some("Jane Doe".to_string()),
            courses: None,
        });
        assert_eq!(
            project(&instructor),
            "Instructor: Jane Doe. Teaches courses: None"
        );

        let rating = StaleRecord::Rating(RatingRecord {
            id: 4,
            question_text: None,
            category: None,
            course_mean: None,
        });
        assert_eq!(project(&rating), "Question: None. Category: None. Score: None/5.0");
    }

    #[test]
    fn rating_projection_renders_mean_on_five_point_scale() {
        let rating = StaleRecord::Rating(RatingRecord {
            id: 9,
            question_text: Some("Course organization".to_string()),
            category: Some("structure".to_string()),
            course_mean: Some(4.2),
        });
        assert_eq!(
            project(&rating),
            "Question: Course organization. Category: structure. Score: 4.2/5.0"
        );
    }
}
