use chrono::NaiveDate;
use serde::Serialize;

use crate::directory::{Contact, ContactType};
use crate::hierarchy::{HierarchyStore, LEVEL_COLLEGE, LEVEL_DEPARTMENT};

/// Association category understood by the downstream reporting tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetType {
    #[serde(rename = "C4")]
    College,
    #[serde(rename = "D3")]
    Department,
    #[serde(rename = "CRS1")]
    Course,
}

impl TargetType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::College => "C4",
            Self::Department => "D3",
            Self::Course => "CRS1",
        }
    }
}

/// One export record linking a hierarchy node to a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub target_type: TargetType,
}

impl Edge {
    fn new(source: &str, target: &str, target_type: TargetType) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            target_type,
        }
    }
}

/// Maps a contact to the hierarchy nodes it authorizes. Nodes that fail to
/// resolve are silent omissions, never errors, so a single stale record can
/// not abort an export.
pub fn resolve_contact(hierarchy: &HierarchyStore, contact: &Contact) -> Vec<Edge> {
    match contact.contact_type {
        ContactType::College => hierarchy
            .find_by_caption(&contact.college, LEVEL_COLLEGE, None)
            .map(|node| vec![Edge::new(&node.node_id, &contact.linkblue, TargetType::College)])
            .unwrap_or_default(),
        ContactType::Department => hierarchy
            .find_by_caption(&contact.department, LEVEL_DEPARTMENT, Some(&contact.college))
            .map(|node| {
                vec![Edge::new(
                    &node.node_id,
                    &contact.linkblue,
                    TargetType::Department,
                )]
            })
            .unwrap_or_default(),
        ContactType::CourseCoordinator => {
            let Some(department) = hierarchy.find_by_caption(
                &contact.department,
                LEVEL_DEPARTMENT,
                Some(&contact.college),
            ) else {
                return Vec::new();
            };

            if contact.course.is_empty() {
                // Prefix scope: one edge per matching course, in the
                // hierarchy's insertion order.
                hierarchy
                    .courses_with_prefix(&contact.prefix, &department.node_id)
                    .into_iter()
                    .map(|node| Edge::new(&node.node_id, &contact.linkblue, TargetType::Course))
                    .collect()
            } else {
                hierarchy
                    .find_course_node(&contact.prefix, &contact.course, &department.node_id)
                    .map(|node| {
                        vec![Edge::new(&node.node_id, &contact.linkblue, TargetType::Course)]
                    })
                    .unwrap_or_default()
            }
        }
    }
}

/// Resolves every contact in directory order (ascending id).
pub fn resolve_directory(hierarchy: &HierarchyStore, contacts: &[Contact]) -> Vec<Edge> {
    contacts
        .iter()
        .flat_map(|contact| resolve_contact(hierarchy, contact))
        .collect()
}

/// Flat association document: a header then plain comma joins. Identifiers
/// containing commas are a known limitation of the downstream format.
pub fn encode_edges(edges: &[Edge]) -> String {
    let mut document = String::from("source,target,targetType\n");
    let lines: Vec<String> = edges
        .iter()
        .map(|edge| format!("{},{},{}", edge.source, edge.target, edge.target_type.label()))
        .collect();
    document.push_str(&lines.join("\n"));
    document
}

/// Download name stamped with the export's generation date.
pub fn export_filename(date: NaiveDate) -> String {
    format!("ReportViewers_export_{}.csv", date.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn filename_uses_generation_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).expect("valid date");
        assert_eq!(export_filename(date), "ReportViewers_export_20260307.csv");
    }

    #[test]
    fn encoder_emits_header_and_plain_joins() {
        let edges = vec![
            Edge::new("N1", "abc123", TargetType::College),
            Edge::new("N2", "def456", TargetType::Course),
        ];
        assert_eq!(
            encode_edges(&edges),
            "source,target,targetType\nN1,abc123,C4\nN2,def456,CRS1"
        );
    }

    #[test]
    fn encoder_with_no_edges_is_header_only() {
        assert_eq!(encode_edges(&[]), "source,target,targetType\n");
    }
}
