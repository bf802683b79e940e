use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::Connection;

use crate::project::RecordSet;

const DB_PATH: &str = "data/catalog.sqlite";

pub fn connect() -> Result<Connection> {
    if let Some(dir) = std::path::Path::new(DB_PATH).parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS Terms (
            TermID           INTEGER PRIMARY KEY,
            TermName         TEXT,
            TermDetailUrl    TEXT,
            CalendarYear     INTEGER,
            PublicIndicator  BOOLEAN NOT NULL DEFAULT 0,
            ArchiveIndicator BOOLEAN NOT NULL DEFAULT 0,
            AttendingTerm    BOOLEAN,
            DefaultTerm      BOOLEAN,
            EnrollingTerm    BOOLEAN
        );

        CREATE TABLE IF NOT EXISTS Subjects (
            SubjectID      TEXT NOT NULL,
            SubjectName    TEXT,
            DepartmentCode TEXT,
            TermID         INTEGER NOT NULL REFERENCES Terms(TermID),
            PRIMARY KEY (TermID, SubjectID)
        );

        CREATE TABLE IF NOT EXISTS Departments (
            TermID                INTEGER NOT NULL,
            SubjectID             TEXT NOT NULL,
            DepartmentName        TEXT,
            CollegeCode           TEXT,
            DepartmentCode        TEXT,
            ContactName           TEXT,
            ContactTitle          TEXT,
            AddressLine1          TEXT,
            AddressLine2          TEXT,
            PhoneNumber           TEXT,
            Url                   TEXT,
            DepartmentDescription TEXT,
            PRIMARY KEY (TermID, SubjectID),
            FOREIGN KEY (TermID, SubjectID) REFERENCES Subjects(TermID, SubjectID)
        );

        CREATE TABLE IF NOT EXISTS Courses (
            SubjectID                TEXT NOT NULL,
            TermID                   INTEGER NOT NULL,
            CourseID                 INTEGER NOT NULL,
            CourseName               TEXT,
            CreditHours              TEXT,
            CourseDescription        TEXT,
            CourseSectionInformation TEXT,
            SectionDegreeAttributes  TEXT,
            SectionRegistrationNotes TEXT,
            ClassScheduleInformation TEXT,
            GenEdCategories          TEXT,
            PRIMARY KEY (TermID, SubjectID, CourseID),
            FOREIGN KEY (TermID, SubjectID) REFERENCES Subjects(TermID, SubjectID)
        );
        CREATE INDEX IF NOT EXISTS idx_courses_term ON Courses(TermID);

        CREATE TABLE IF NOT EXISTS Sections (
            CRN              INTEGER NOT NULL,
            TermID           INTEGER NOT NULL,
            CourseID         INTEGER NOT NULL,
            SubjectID        TEXT NOT NULL,
            SectionNumber    TEXT,
            Credits          INTEGER,
            StatusCode       TEXT,
            PartOfTerm       TEXT,
            EnrollmentStatus TEXT,
            SectionText      TEXT,
            SectionNotes     TEXT,
            SectionCappArea  TEXT,
            StartDate        TEXT,
            EndDate          TEXT,
            PRIMARY KEY (TermID, CRN),
            FOREIGN KEY (TermID, SubjectID, CourseID)
                REFERENCES Courses(TermID, SubjectID, CourseID)
        );
        CREATE INDEX IF NOT EXISTS idx_sections_course ON Sections(TermID, SubjectID, CourseID);

        CREATE TABLE IF NOT EXISTS Meetings (
            CRN          INTEGER NOT NULL,
            TermID       INTEGER NOT NULL,
            MeetingID    INTEGER NOT NULL,
            TypeCode     TEXT,
            TypeName     TEXT,
            StartTime    TEXT,
            EndTime      TEXT,
            DaysOfWeek   TEXT,
            BuildingName TEXT,
            RoomNumber   TEXT,
            PRIMARY KEY (TermID, CRN, MeetingID),
            FOREIGN KEY (TermID, CRN) REFERENCES Sections(TermID, CRN)
        );

        CREATE TABLE IF NOT EXISTS Instructors (
            id        INTEGER PRIMARY KEY,
            CRN       INTEGER NOT NULL,
            TermID    INTEGER NOT NULL,
            MeetingID INTEGER NOT NULL,
            FullName  TEXT,
            LastName  TEXT,
            FirstName TEXT,
            FOREIGN KEY (TermID, CRN, MeetingID)
                REFERENCES Meetings(TermID, CRN, MeetingID)
        );
        CREATE INDEX IF NOT EXISTS idx_instructors_meeting
            ON Instructors(TermID, CRN, MeetingID);
        ",
    )?;
    Ok(())
}

// ── Flat rows ──
//
// One struct per entity. `FlatRecord` is the single authoritative mapping
// from entity to sink column order: `values()` must line up with `COLUMNS`,
// and every INSERT in this crate is generated from them.

pub trait FlatRecord {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
    fn values(&self) -> Vec<Box<dyn ToSql>>;
}

pub struct TermRow {
    pub term_id: i64,
    pub term_name: Option<String>,
    pub term_detail_url: Option<String>,
    pub calendar_year: Option<i64>,
    pub public_indicator: bool,
    pub archive_indicator: bool,
    pub attending_term: Option<bool>,
    pub default_term: Option<bool>,
    pub enrolling_term: Option<bool>,
}

impl FlatRecord for TermRow {
    const TABLE: &'static str = "Terms";
    const COLUMNS: &'static [&'static str] = &[
        "TermID", "TermName", "TermDetailUrl", "CalendarYear", "PublicIndicator",
        "ArchiveIndicator", "AttendingTerm", "DefaultTerm", "EnrollingTerm",
    ];
    fn values(&self) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(self.term_id),
            Box::new(self.term_name.clone()),
            Box::new(self.term_detail_url.clone()),
            Box::new(self.calendar_year),
            Box::new(self.public_indicator),
            Box::new(self.archive_indicator),
            Box::new(self.attending_term),
            Box::new(self.default_term),
            Box::new(self.enrolling_term),
        ]
    }
}

pub struct SubjectRow {
    pub subject_id: String,
    pub subject_name: Option<String>,
    pub department_code: Option<String>,
    pub term_id: i64,
}

impl FlatRecord for SubjectRow {
    const TABLE: &'static str = "Subjects";
    const COLUMNS: &'static [&'static str] =
        &["SubjectID", "SubjectName", "DepartmentCode", "TermID"];
    fn values(&self) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(self.subject_id.clone()),
            Box::new(self.subject_name.clone()),
            Box::new(self.department_code.clone()),
            Box::new(self.term_id),
        ]
    }
}

pub struct DepartmentRow {
    pub term_id: i64,
    pub subject_id: String,
    pub department_name: Option<String>,
    pub college_code: Option<String>,
    pub department_code: Option<String>,
    pub contact_name: Option<String>,
    pub contact_title: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub phone_number: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
}

impl FlatRecord for DepartmentRow {
    const TABLE: &'static str = "Departments";
    const COLUMNS: &'static [&'static str] = &[
        "TermID", "SubjectID", "DepartmentName", "CollegeCode", "DepartmentCode",
        "ContactName", "ContactTitle", "AddressLine1", "AddressLine2",
        "PhoneNumber", "Url", "DepartmentDescription",
    ];
    fn values(&self) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(self.term_id),
            Box::new(self.subject_id.clone()),
            Box::new(self.department_name.clone()),
            Box::new(self.college_code.clone()),
            Box::new(self.department_code.clone()),
            Box::new(self.contact_name.clone()),
            Box::new(self.contact_title.clone()),
            Box::new(self.address_line1.clone()),
            Box::new(self.address_line2.clone()),
            Box::new(self.phone_number.clone()),
            Box::new(self.url.clone()),
            Box::new(self.description.clone()),
        ]
    }
}

pub struct CourseRow {
    pub subject_id: String,
    pub term_id: i64,
    pub course_id: i64,
    pub course_name: Option<String>,
    pub credit_hours: Option<String>,
    pub description: Option<String>,
    pub section_info: Option<String>,
    pub degree_attributes: Option<String>,
    pub registration_notes: Option<String>,
    pub schedule_info: Option<String>,
    pub gen_ed_categories: Option<String>,
}

impl FlatRecord for CourseRow {
    const TABLE: &'static str = "Courses";
    const COLUMNS: &'static [&'static str] = &[
        "SubjectID", "TermID", "CourseID", "CourseName", "CreditHours",
        "CourseDescription", "CourseSectionInformation", "SectionDegreeAttributes",
        "SectionRegistrationNotes", "ClassScheduleInformation", "GenEdCategories",
    ];
    fn values(&self) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(self.subject_id.clone()),
            Box::new(self.term_id),
            Box::new(self.course_id),
            Box::new(self.course_name.clone()),
            Box::new(self.credit_hours.clone()),
            Box::new(self.description.clone()),
            Box::new(self.section_info.clone()),
            Box::new(self.degree_attributes.clone()),
            Box::new(self.registration_notes.clone()),
            Box::new(self.schedule_info.clone()),
            Box::new(self.gen_ed_categories.clone()),
        ]
    }
}

pub struct SectionRow {
    pub crn: i64,
    pub term_id: i64,
    pub course_id: i64,
    pub subject_id: String,
    pub section_number: Option<String>,
    pub credits: Option<i64>,
    pub status_code: Option<String>,
    pub part_of_term: Option<String>,
    pub enrollment_status: Option<String>,
    pub section_text: Option<String>,
    pub section_notes: Option<String>,
    pub capp_area: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl FlatRecord for SectionRow {
    const TABLE: &'static str = "Sections";
    const COLUMNS: &'static [&'static str] = &[
        "CRN", "TermID", "CourseID", "SubjectID", "SectionNumber", "Credits",
        "StatusCode", "PartOfTerm", "EnrollmentStatus", "SectionText",
        "SectionNotes", "SectionCappArea", "StartDate", "EndDate",
    ];
    fn values(&self) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(self.crn),
            Box::new(self.term_id),
            Box::new(self.course_id),
            Box::new(self.subject_id.clone()),
            Box::new(self.section_number.clone()),
            Box::new(self.credits),
            Box::new(self.status_code.clone()),
            Box::new(self.part_of_term.clone()),
            Box::new(self.enrollment_status.clone()),
            Box::new(self.section_text.clone()),
            Box::new(self.section_notes.clone()),
            Box::new(self.capp_area.clone()),
            Box::new(self.start_date.clone()),
            Box::new(self.end_date.clone()),
        ]
    }
}

pub struct MeetingRow {
    pub crn: i64,
    pub term_id: i64,
    pub meeting_id: i64,
    pub type_code: Option<String>,
    pub type_name: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub days_of_week: Option<String>,
    pub building_name: Option<String>,
    pub room_number: Option<String>,
}

impl FlatRecord for MeetingRow {
    const TABLE: &'static str = "Meetings";
    const COLUMNS: &'static [&'static str] = &[
        "CRN", "TermID", "MeetingID", "TypeCode", "TypeName", "StartTime",
        "EndTime", "DaysOfWeek", "BuildingName", "RoomNumber",
    ];
    fn values(&self) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(self.crn),
            Box::new(self.term_id),
            Box::new(self.meeting_id),
            Box::new(self.type_code.clone()),
            Box::new(self.type_name.clone()),
            Box::new(self.start_time.clone()),
            Box::new(self.end_time.clone()),
            Box::new(self.days_of_week.clone()),
            Box::new(self.building_name.clone()),
            Box::new(self.room_number.clone()),
        ]
    }
}

pub struct InstructorRow {
    pub crn: i64,
    pub term_id: i64,
    pub meeting_id: i64,
    pub full_name: Option<String>,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
}

impl FlatRecord for InstructorRow {
    const TABLE: &'static str = "Instructors";
    const COLUMNS: &'static [&'static str] = &[
        "CRN", "TermID", "MeetingID", "FullName", "LastName", "FirstName",
    ];
    fn values(&self) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(self.crn),
            Box::new(self.term_id),
            Box::new(self.meeting_id),
            Box::new(self.full_name.clone()),
            Box::new(self.last_name.clone()),
            Box::new(self.first_name.clone()),
        ]
    }
}

// ── Bulk writes ──

fn insert_sql<R: FlatRecord>(or_replace: bool) -> String {
    let placeholders: Vec<String> = (1..=R::COLUMNS.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT{} INTO {} ({}) VALUES ({})",
        if or_replace { " OR REPLACE" } else { "" },
        R::TABLE,
        R::COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

fn bulk_insert<R: FlatRecord>(conn: &Connection, rows: &[R]) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    let mut stmt = conn.prepare(&insert_sql::<R>(false))?;
    for row in rows {
        let values = row.values();
        let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        stmt.execute(params.as_slice())?;
    }
    Ok(rows.len())
}

/// Upsert the terms discovered from the years root (idempotent `init`).
pub fn upsert_terms(conn: &Connection, terms: &[TermRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(&insert_sql::<TermRow>(true))?;
        for term in terms {
            let values = term.values();
            let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
            stmt.execute(params.as_slice())?;
        }
    }
    tx.commit()?;
    Ok(terms.len())
}

/// Write one term's full record set as a single transaction: the six entity
/// batches commit together or not at all. Prior rows for the term are removed
/// inside the same transaction so a re-run replaces the term atomically.
pub fn save_record_set(conn: &Connection, set: &RecordSet) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    delete_term(&tx, set.term.term_id)?;
    tx.execute(
        "INSERT OR IGNORE INTO Terms (TermID, TermName, TermDetailUrl, CalendarYear)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            set.term.term_id,
            set.term.term_name,
            set.term.term_detail_url,
            set.term.calendar_year
        ],
    )?;
    bulk_insert(&tx, &set.subjects)?;
    bulk_insert(&tx, &set.departments)?;
    bulk_insert(&tx, &set.courses)?;
    bulk_insert(&tx, &set.sections)?;
    bulk_insert(&tx, &set.meetings)?;
    bulk_insert(&tx, &set.instructors)?;
    tx.commit()?;
    Ok(())
}

fn delete_term(conn: &Connection, term_id: i64) -> Result<()> {
    // Children first so the FK chain holds mid-transaction.
    for table in ["Instructors", "Meetings", "Sections", "Courses", "Departments", "Subjects"] {
        conn.execute(&format!("DELETE FROM {} WHERE TermID = ?1", table), [term_id])?;
    }
    Ok(())
}

// ── Harvest targets ──

pub struct HarvestTarget {
    pub term_id: i64,
    pub term_name: String,
    pub url: String,
}

/// Terms to harvest: the explicitly requested ids, or every public term with
/// a detail URL when none are given.
pub fn fetch_harvest_targets(
    conn: &Connection,
    term_ids: &[i64],
    limit: Option<usize>,
) -> Result<Vec<HarvestTarget>> {
    let mut sql = String::from(
        "SELECT TermID, COALESCE(TermName, ''), TermDetailUrl FROM Terms
         WHERE TermDetailUrl IS NOT NULL",
    );
    if !term_ids.is_empty() {
        let ids: Vec<String> = term_ids.iter().map(|id| id.to_string()).collect();
        sql.push_str(&format!(" AND TermID IN ({})", ids.join(", ")));
    } else {
        sql.push_str(" AND PublicIndicator = 1");
    }
    sql.push_str(" ORDER BY TermID DESC");
    if let Some(n) = limit {
        sql.push_str(&format!(" LIMIT {}", n));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(HarvestTarget {
                term_id: row.get(0)?,
                term_name: row.get(1)?,
                url: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Overview / stats ──

pub struct TermOverviewRow {
    pub term_id: i64,
    pub term_name: String,
    pub subjects: usize,
    pub courses: usize,
    pub sections: usize,
}

pub fn fetch_term_overview(conn: &Connection, limit: usize) -> Result<Vec<TermOverviewRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT t.TermID, COALESCE(t.TermName, ''),
                (SELECT COUNT(*) FROM Subjects s WHERE s.TermID = t.TermID),
                (SELECT COUNT(*) FROM Courses c WHERE c.TermID = t.TermID),
                (SELECT COUNT(*) FROM Sections x WHERE x.TermID = t.TermID)
         FROM Terms t
         ORDER BY t.TermID DESC
         LIMIT {}",
        limit
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TermOverviewRow {
                term_id: row.get(0)?,
                term_name: row.get(1)?,
                subjects: row.get(2)?,
                courses: row.get(3)?,
                sections: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct Stats {
    pub terms: usize,
    pub subjects: usize,
    pub departments: usize,
    pub courses: usize,
    pub sections: usize,
    pub meetings: usize,
    pub instructors: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |table: &str| -> Result<usize> {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?)
    };
    Ok(Stats {
        terms: count("Terms")?,
        subjects: count("Subjects")?,
        departments: count("Departments")?,
        courses: count("Courses")?,
        sections: count("Sections")?,
        meetings: count("Meetings")?,
        instructors: count("Instructors")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::RecordSet;

    fn mem() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn term_row(id: i64) -> TermRow {
        TermRow {
            term_id: id,
            term_name: Some("Fall 2020".into()),
            term_detail_url: None,
            calendar_year: Some(2020),
            public_indicator: true,
            archive_indicator: false,
            attending_term: None,
            default_term: None,
            enrolling_term: None,
        }
    }

    fn blank_section(crn: i64) -> SectionRow {
        SectionRow {
            crn,
            term_id: 120208,
            course_id: 411,
            subject_id: "CS".into(),
            section_number: None,
            credits: None,
            status_code: None,
            part_of_term: None,
            enrollment_status: None,
            section_text: None,
            section_notes: None,
            capp_area: None,
            start_date: None,
            end_date: None,
        }
    }

    fn small_set() -> RecordSet {
        let mut set = RecordSet::new(term_row(120208));
        set.subjects.push(SubjectRow {
            subject_id: "CS".into(),
            subject_name: Some("Computer Science".into()),
            department_code: Some("1434".into()),
            term_id: 120208,
        });
        set.courses.push(CourseRow {
            subject_id: "CS".into(),
            term_id: 120208,
            course_id: 411,
            course_name: Some("Database Systems".into()),
            credit_hours: Some("3 OR 4 hours.".into()),
            description: None,
            section_info: None,
            degree_attributes: None,
            registration_notes: None,
            schedule_info: None,
            gen_ed_categories: None,
        });
        let mut section = blank_section(30107);
        section.section_number = Some("AL1".into());
        section.credits = Some(3);
        section.start_date = Some("2020-08-24".into());
        section.end_date = Some("2020-12-11".into());
        set.sections.push(section);
        set
    }

    #[test]
    fn record_set_round_trips() {
        let conn = mem();
        save_record_set(&conn, &small_set()).unwrap();
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.subjects, 1);
        assert_eq!(stats.courses, 1);
        assert_eq!(stats.sections, 1);
    }

    #[test]
    fn rerun_replaces_term_instead_of_duplicating() {
        let conn = mem();
        save_record_set(&conn, &small_set()).unwrap();
        save_record_set(&conn, &small_set()).unwrap();
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.sections, 1);
        assert_eq!(stats.courses, 1);
    }

    #[test]
    fn failed_batch_rolls_back_whole_term() {
        let conn = mem();
        let mut set = small_set();
        // Duplicate section primary key forces the insert to fail.
        set.sections.push(blank_section(30107));
        assert!(save_record_set(&conn, &set).is_err());
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.subjects, 0);
        assert_eq!(stats.courses, 0);
        assert_eq!(stats.sections, 0);
    }

    #[test]
    fn column_orders_match_values() {
        let set = small_set();
        assert_eq!(TermRow::COLUMNS.len(), set.term.values().len());
        assert_eq!(SubjectRow::COLUMNS.len(), set.subjects[0].values().len());
        assert_eq!(CourseRow::COLUMNS.len(), set.courses[0].values().len());
        assert_eq!(SectionRow::COLUMNS.len(), set.sections[0].values().len());
    }

    #[test]
    fn upsert_terms_is_idempotent() {
        let conn = mem();
        upsert_terms(&conn, &[term_row(1), term_row(2)]).unwrap();
        upsert_terms(&conn, &[term_row(2)]).unwrap();
        assert_eq!(get_stats(&conn).unwrap().terms, 2);
    }
}
