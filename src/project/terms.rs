use anyhow::Result;
use serde_json::Value;

use super::tree;
use crate::db::TermRow;

/// Project the years root (the whole catalog's schedule document) into term
/// rows. Years hold one or many `termDetail` children; the resolver evens
/// that out like every other boundary.
pub fn project(years_root: &Value) -> Result<Vec<TermRow>> {
    let mut rows = Vec::new();
    for year in tree::children(years_root, &["schedule", "calendarYears", "calendarYearSummary"]) {
        for term in tree::children(year, &["terms", "termDetail"]) {
            tree::require_object(term, "termDetail")?;
            let label = tree::text(term, &["label"]);
            let yes_no = |path: &[&str]| tree::text(term, path).map(|v| v == "Y");
            rows.push(TermRow {
                term_id: tree::require_int(term, &["id"], "term id")?,
                term_name: label.clone(),
                term_detail_url: tree::text(term, &["href"]),
                calendar_year: calendar_year(label.as_deref()),
                public_indicator: yes_no(&["publicIndicator"]).unwrap_or(false),
                archive_indicator: yes_no(&["archiveIndicator"]).unwrap_or(false),
                attending_term: yes_no(&["attendingTerm"]),
                default_term: yes_no(&["defaultTerm"]),
                enrolling_term: yes_no(&["enrollingTerm"]),
            });
        }
    }
    Ok(rows)
}

/// "Fall 2020" → 2020. The label's second token is the calendar year.
pub fn calendar_year(label: Option<&str>) -> Option<i64> {
    label?.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn years_root_projects_terms_across_years() {
        let root = json!({
            "schedule": {
                "label": "Calendar Years",
                "calendarYears": {
                    "calendarYearSummary": [
                        {
                            "id": 2019,
                            "terms": {
                                "termDetail": {
                                    "id": 120198,
                                    "label": "Fall 2019",
                                    "href": "http://x/2019/fall.xml",
                                    "publicIndicator": "Y",
                                    "archiveIndicator": "N"
                                }
                            }
                        },
                        {
                            "id": 2020,
                            "terms": {
                                "termDetail": [
                                    {
                                        "id": 120201,
                                        "label": "Spring 2020",
                                        "href": "http://x/2020/spring.xml",
                                        "publicIndicator": "Y",
                                        "archiveIndicator": "N",
                                        "defaultTerm": "N"
                                    },
                                    {
                                        "id": 120208,
                                        "label": "Fall 2020",
                                        "href": "http://x/2020/fall.xml",
                                        "publicIndicator": "Y",
                                        "archiveIndicator": "N",
                                        "attendingTerm": "Y",
                                        "defaultTerm": "Y",
                                        "enrollingTerm": "Y"
                                    }
                                ]
                            }
                        }
                    ]
                }
            }
        });

        let rows = project(&root).unwrap();
        assert_eq!(rows.len(), 3);

        let fall = rows.iter().find(|t| t.term_id == 120208).unwrap();
        assert_eq!(fall.term_name.as_deref(), Some("Fall 2020"));
        assert_eq!(fall.calendar_year, Some(2020));
        assert!(fall.public_indicator);
        assert_eq!(fall.enrolling_term, Some(true));

        // Indicators absent in the source stay unknown, not false.
        let fall19 = rows.iter().find(|t| t.term_id == 120198).unwrap();
        assert_eq!(fall19.attending_term, None);
        assert_eq!(fall19.default_term, None);

        let spring = rows.iter().find(|t| t.term_id == 120201).unwrap();
        assert_eq!(spring.default_term, Some(false));
    }

    #[test]
    fn term_without_id_is_a_shape_error() {
        let root = json!({
            "schedule": {
                "calendarYears": {
                    "calendarYearSummary": {
                        "terms": {"termDetail": {"label": "Fall 2020"}}
                    }
                }
            }
        });
        assert!(project(&root).is_err());
    }

    #[test]
    fn calendar_year_comes_from_the_label() {
        assert_eq!(calendar_year(Some("Fall 2020")), Some(2020));
        assert_eq!(calendar_year(Some("Winter 2020-2021")), None);
        assert_eq!(calendar_year(Some("Fall")), None);
        assert_eq!(calendar_year(None), None);
    }
}
