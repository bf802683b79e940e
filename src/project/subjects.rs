use serde_json::Value;

use super::{tree, SubjectKeys, SubjectStub};
use crate::db::{DepartmentRow, SubjectRow};

/// One subject row per term-root subject entry. The department code comes
/// from the cascade document's subject element; the name prefers the term
/// root's text (the cascade `label` is the fallback).
pub fn subject_row(keys: &SubjectKeys, stub: &SubjectStub, subject_el: &Value) -> SubjectRow {
    SubjectRow {
        subject_id: keys.subject_id.clone(),
        subject_name: stub
            .name
            .clone()
            .or_else(|| tree::text(subject_el, &["label"])),
        department_code: tree::text(subject_el, &["departmentCode"]),
        term_id: keys.term_id,
    }
}

/// Departments are 1:1 with subjects per term; all fields live as attributes
/// on the cascade document's subject element.
pub fn department_row(keys: &SubjectKeys, subject_el: &Value) -> DepartmentRow {
    DepartmentRow {
        term_id: keys.term_id,
        subject_id: keys.subject_id.clone(),
        department_name: tree::text(subject_el, &["label"]),
        college_code: tree::text(subject_el, &["collegeCode"]),
        department_code: tree::text(subject_el, &["departmentCode"]),
        contact_name: tree::text(subject_el, &["contactName"]),
        contact_title: tree::text(subject_el, &["contactTitle"]),
        address_line1: tree::text(subject_el, &["addressLine1"]),
        address_line2: tree::text(subject_el, &["addressLine2"]),
        phone_number: tree::text(subject_el, &["phoneNumber"]),
        url: tree::text(subject_el, &["webSiteURL"]),
        description: tree::text(subject_el, &["collegeDepartmentDescription"]),
    }
}
