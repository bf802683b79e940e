use serde_json::Value;

use super::{tree, MeetingKeys, RecordSet};
use crate::db::InstructorRow;

/// Project a meeting's instructors. All name parts are optional; a staffed
/// meeting with no instructor element yields nothing. Some documents carry
/// the instructor as a bare text element ("Evans, G") with no name-part
/// attributes, which still makes a row with only the full name.
pub fn project(keys: &MeetingKeys, meeting: &Value, out: &mut RecordSet) {
    for node in tree::children(meeting, &["instructors", "instructor"]) {
        let (full_name, last_name, first_name) = match node {
            Value::String(s) if s.trim().is_empty() => continue,
            Value::String(s) => (Some(s.trim().to_string()), None, None),
            _ => (
                tree::text(node, &["text"]),
                tree::text(node, &["lastName"]),
                tree::text(node, &["firstName"]),
            ),
        };
        out.instructors.push(InstructorRow {
            crn: keys.crn,
            term_id: keys.term_id,
            meeting_id: keys.meeting_id,
            full_name,
            last_name,
            first_name,
        });
    }
}
