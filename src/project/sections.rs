use anyhow::Result;
use serde_json::Value;

use super::{derive, meetings, tree, CourseKeys, RecordSet};
use crate::db::SectionRow;

/// Project a course's detailed sections, then recurse into meetings. The
/// section's own `id` attribute is the CRN; a section without one cannot be
/// keyed and aborts the term.
pub fn project(keys: &CourseKeys, course: &Value, out: &mut RecordSet) -> Result<()> {
    for section in tree::children(course, &["detailedSections", "detailedSection"]) {
        tree::require_object(section, "detailedSection")?;
        let section_keys = keys.section(tree::require_int(section, &["id"], "CRN")?);

        out.sections.push(SectionRow {
            crn: section_keys.crn,
            term_id: keys.term_id,
            course_id: keys.course_id,
            subject_id: keys.subject_id.clone(),
            section_number: tree::text(section, &["sectionNumber"]),
            credits: derive::parse_credits(tree::text(section, &["creditHours"]).as_deref()),
            status_code: tree::text(section, &["statusCode"]),
            part_of_term: tree::text(section, &["partOfTerm"]),
            enrollment_status: tree::text(section, &["enrollmentStatus"]),
            section_text: tree::text(section, &["sectionText"]),
            section_notes: tree::text(section, &["sectionNotes"]),
            capp_area: tree::text(section, &["sectionCappArea"]),
            start_date: derive::parse_date(tree::text(section, &["startDate"]).as_deref()),
            end_date: derive::parse_date(tree::text(section, &["endDate"]).as_deref()),
        });

        meetings::project(&section_keys, section, out)?;
    }
    Ok(())
}
