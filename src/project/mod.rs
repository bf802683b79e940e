pub mod courses;
pub mod derive;
pub mod instructors;
pub mod meetings;
pub mod sections;
pub mod subjects;
pub mod terms;
pub mod tree;

use anyhow::{bail, Result};
use serde_json::Value;

use crate::db::*;

// ── Key propagation ──
//
// Each level's keys are the parent's keys plus one local discriminator,
// assembled here and only here. Values always come from the node actually
// visited on the way down; the catalog's redundant `parents` lineage fields
// are never read.

#[derive(Debug, Clone)]
pub struct TermKeys {
    pub term_id: i64,
}

impl TermKeys {
    pub fn subject(&self, subject_id: &str) -> SubjectKeys {
        SubjectKeys {
            term_id: self.term_id,
            subject_id: subject_id.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubjectKeys {
    pub term_id: i64,
    pub subject_id: String,
}

impl SubjectKeys {
    pub fn course(&self, course_id: i64) -> CourseKeys {
        CourseKeys {
            term_id: self.term_id,
            subject_id: self.subject_id.clone(),
            course_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CourseKeys {
    pub term_id: i64,
    pub subject_id: String,
    pub course_id: i64,
}

impl CourseKeys {
    pub fn section(&self, crn: i64) -> SectionKeys {
        SectionKeys {
            term_id: self.term_id,
            crn,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SectionKeys {
    pub term_id: i64,
    pub crn: i64,
}

impl SectionKeys {
    pub fn meeting(&self, meeting_id: i64) -> MeetingKeys {
        MeetingKeys {
            term_id: self.term_id,
            crn: self.crn,
            meeting_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeetingKeys {
    pub term_id: i64,
    pub crn: i64,
    pub meeting_id: i64,
}

// ── Record set ──

/// Everything projected from one term's root tree. Written to the sink as a
/// single transaction; discarded wholesale on a shape violation.
pub struct RecordSet {
    pub term: TermRow,
    pub subjects: Vec<SubjectRow>,
    pub departments: Vec<DepartmentRow>,
    pub courses: Vec<CourseRow>,
    pub sections: Vec<SectionRow>,
    pub meetings: Vec<MeetingRow>,
    pub instructors: Vec<InstructorRow>,
}

impl RecordSet {
    pub fn new(term: TermRow) -> Self {
        RecordSet {
            term,
            subjects: Vec::new(),
            departments: Vec::new(),
            courses: Vec::new(),
            sections: Vec::new(),
            meetings: Vec::new(),
            instructors: Vec::new(),
        }
    }

    pub fn total_records(&self) -> usize {
        self.subjects.len()
            + self.departments.len()
            + self.courses.len()
            + self.sections.len()
            + self.meetings.len()
            + self.instructors.len()
    }
}

/// A subject entry from the term root: what we need to fetch and project its
/// cascade document.
#[derive(Debug, Clone)]
pub struct SubjectStub {
    pub id: String,
    pub name: Option<String>,
    pub href: Option<String>,
}

/// Read the term id, a minimal term row, and the subject list out of a term
/// root document.
pub fn subject_stubs(term_root: &Value) -> Result<(TermRow, Vec<SubjectStub>)> {
    let term = match tree::walk(term_root, &["term"]) {
        Some(node) => tree::require_object(node, "term root")?,
        None => bail!("document has no term element"),
    };
    let term_id = tree::require_int(term, &["id"], "term id")?;
    let label = tree::text(term, &["label"]);
    let term_row = TermRow {
        term_id,
        term_name: label.clone(),
        term_detail_url: None,
        calendar_year: terms::calendar_year(label.as_deref()),
        public_indicator: false,
        archive_indicator: false,
        attending_term: None,
        default_term: None,
        enrolling_term: None,
    };

    let mut stubs = Vec::new();
    for subject in tree::children(term, &["subjects", "subject"]) {
        tree::require_object(subject, "subject")?;
        stubs.push(SubjectStub {
            id: tree::require_text(subject, &["id"], "subject id")?,
            name: tree::text(subject, &["text"]),
            href: tree::text(subject, &["href"]),
        });
    }
    Ok((term_row, stubs))
}

/// Project one term's fetched cascade documents into a full record set.
///
/// Pure: the caller fetches; a `None` document means that subject's fetch
/// failed and its whole branch is excluded (the rest of the term proceeds).
/// A cascade document carries its subject's entire branch, so exclusion can
/// never strand a section without its meetings. Shape violations abort the
/// whole term instead.
pub fn project_subject_docs(
    term: TermRow,
    docs: &[(SubjectStub, Option<Value>)],
) -> Result<RecordSet> {
    let keys = TermKeys {
        term_id: term.term_id,
    };
    let mut set = RecordSet::new(term);

    for (stub, doc) in docs {
        let doc = match doc {
            Some(doc) => doc,
            None => continue,
        };
        let subject_el = match tree::walk(doc, &["subject"]) {
            Some(node) => tree::require_object(node, "subject document")?,
            None => bail!("cascade document for {} has no subject element", stub.id),
        };
        let subject_keys = keys.subject(&stub.id);
        set.subjects.push(subjects::subject_row(&subject_keys, stub, subject_el));
        set.departments.push(subjects::department_row(&subject_keys, subject_el));
        courses::project(&subject_keys, subject_el, &mut set)?;
    }
    Ok(set)
}
