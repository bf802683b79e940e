use anyhow::Result;
use serde_json::Value;

use super::{derive, instructors, tree, RecordSet, SectionKeys};
use crate::db::MeetingRow;

/// Project a section's meetings, converting clock times to 24-hour form,
/// then recurse into instructors.
pub fn project(keys: &SectionKeys, section: &Value, out: &mut RecordSet) -> Result<()> {
    for meeting in tree::children(section, &["meetings", "meeting"]) {
        tree::require_object(meeting, "meeting")?;
        let meeting_keys = keys.meeting(tree::require_int(meeting, &["id"], "meeting id")?);

        out.meetings.push(MeetingRow {
            crn: meeting_keys.crn,
            term_id: meeting_keys.term_id,
            meeting_id: meeting_keys.meeting_id,
            type_code: tree::text(meeting, &["type", "code"]),
            type_name: tree::text(meeting, &["type", "text"]),
            start_time: derive::to_24_hour(tree::text(meeting, &["start"]).as_deref()),
            end_time: derive::to_24_hour(tree::text(meeting, &["end"]).as_deref()),
            days_of_week: tree::text(meeting, &["daysOfTheWeek"]),
            building_name: tree::text(meeting, &["buildingName"]),
            room_number: tree::text(meeting, &["roomNumber"]),
        });

        instructors::project(&meeting_keys, meeting, out);
    }
    Ok(())
}
