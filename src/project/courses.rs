use anyhow::Result;
use serde_json::Value;

use super::{derive, sections, tree, RecordSet, SubjectKeys};
use crate::db::CourseRow;

/// Project every course under a subject's cascade element, then recurse into
/// sections. The compound id ("CS 411") must split into a numeric course id;
/// anything else is a shape violation that aborts the term.
pub fn project(keys: &SubjectKeys, subject_el: &Value, out: &mut RecordSet) -> Result<()> {
    for course in tree::children(subject_el, &["cascadingCourses", "cascadingCourse"]) {
        tree::require_object(course, "cascadingCourse")?;
        let compound = tree::require_text(course, &["id"], "course id")?;
        let course_keys = keys.course(derive::course_numeric_id(&compound)?);

        // Gen-ed categories are themselves a collapsed one-or-many.
        let codes: Vec<String> = tree::children(course, &["genEdCategories", "category"])
            .iter()
            .filter_map(|cat| tree::text(cat, &["genEdAttributes", "genEdAttribute", "code"]))
            .collect();

        out.courses.push(CourseRow {
            subject_id: course_keys.subject_id.clone(),
            term_id: course_keys.term_id,
            course_id: course_keys.course_id,
            course_name: tree::text(course, &["label"]),
            credit_hours: tree::text(course, &["creditHours"]),
            description: tree::text(course, &["description"]),
            section_info: tree::text(course, &["courseSectionInformation"]),
            degree_attributes: tree::text(course, &["sectionDegreeAttributes"]),
            registration_notes: tree::text(course, &["sectionRegistrationNotes"]),
            schedule_info: tree::text(course, &["classScheduleInformation"]),
            gen_ed_categories: derive::gen_ed_string(&codes),
        });

        sections::project(&course_keys, course, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TermRow;
    use crate::project::TermKeys;
    use serde_json::json;

    fn empty_set() -> RecordSet {
        RecordSet::new(TermRow {
            term_id: 120208,
            term_name: None,
            term_detail_url: None,
            calendar_year: None,
            public_indicator: false,
            archive_indicator: false,
            attending_term: None,
            default_term: None,
            enrolling_term: None,
        })
    }

    #[test]
    fn single_gen_ed_category_still_concatenates() {
        let keys = TermKeys { term_id: 120208 }.subject("AAS");
        let el = json!({
            "cascadingCourses": {
                "cascadingCourse": {
                    "id": "AAS 100",
                    "label": "Intro Asian American Studies",
                    "genEdCategories": {
                        "category": {"genEdAttributes": {"genEdAttribute": {"code": "US"}}}
                    }
                }
            }
        });
        let mut set = empty_set();
        project(&keys, &el, &mut set).unwrap();
        assert_eq!(set.courses.len(), 1);
        assert_eq!(set.courses[0].course_id, 100);
        assert_eq!(set.courses[0].gen_ed_categories.as_deref(), Some("US:"));
    }

    #[test]
    fn course_without_sections_emits_only_the_course() {
        let keys = TermKeys { term_id: 120208 }.subject("CS");
        let el = json!({
            "cascadingCourses": {
                "cascadingCourse": {"id": "CS 591", "label": "Seminar"}
            }
        });
        let mut set = empty_set();
        project(&keys, &el, &mut set).unwrap();
        assert_eq!(set.courses.len(), 1);
        assert!(set.sections.is_empty());
        assert_eq!(set.courses[0].gen_ed_categories, None);
    }
}
