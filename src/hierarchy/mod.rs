use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

pub mod prefix;

pub const LEVEL_UNIVERSITY: u8 = 1;
pub const LEVEL_COLLEGE: u8 = 2;
pub const LEVEL_DEPARTMENT: u8 = 3;
pub const LEVEL_COURSE: u8 = 4;

/// One entry in the University -> College -> Department -> Course tree.
///
/// `node_id` is the identity key; `caption` is a display/lookup key that is
/// only unique within (level, parent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    pub node_id: String,
    pub caption: String,
    pub parent_id: String,
    pub level: u8,
    pub course_prefix: String,
    pub course_number: String,
}

/// Splits a course caption into (prefix, number) on the first whitespace run.
///
/// "CS 315" -> ("CS", "315"). Captions without whitespace keep an empty
/// prefix and the whole caption as the number.
pub fn split_course_caption(caption: &str) -> (String, String) {
    match caption.split_once(char::is_whitespace) {
        Some((prefix, rest)) => (prefix.to_string(), rest.trim_start().to_string()),
        None => (String::new(), caption.to_string()),
    }
}

/// Error raised while loading the hierarchy table. The table is foundational,
/// so any malformed row aborts startup rather than loading a partial tree.
#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    #[error("malformed hierarchy row for node '{node_id}': level '{value}' is not an integer")]
    MalformedRow { node_id: String, value: String },
    #[error("failed to read hierarchy data: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to open hierarchy file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct HierarchyRow {
    #[serde(rename = "Node Id")]
    node_id: String,
    #[serde(rename = "Node Caption")]
    caption: String,
    #[serde(rename = "Parent Node Id", default)]
    parent_id: String,
    #[serde(rename = "Level")]
    level: String,
    // The CourseNo column duplicates the caption for level-4 rows; the
    // prefix/number pair is derived from the caption instead.
}

/// Indexed view of the organizational tree, built once at startup.
///
/// Rows must be presented parent-before-child for the derived
/// college -> departments index to be complete; that ordering is a
/// precondition of the input table, not enforced here.
#[derive(Debug, Default)]
pub struct HierarchyStore {
    nodes: Vec<HierarchyNode>,
    by_id: HashMap<String, usize>,
    children: HashMap<String, Vec<usize>>,
    by_prefix: HashMap<String, Vec<usize>>,
    college_departments: HashMap<String, Vec<String>>,
}

impl HierarchyStore {
    pub fn from_path(path: &Path) -> Result<Self, HierarchyError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, HierarchyError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut store = Self::default();
        for record in csv_reader.deserialize::<HierarchyRow>() {
            let row = record?;
            let level =
                row.level
                    .parse::<u8>()
                    .map_err(|_| HierarchyError::MalformedRow {
                        node_id: row.node_id.clone(),
                        value: row.level.clone(),
                    })?;

            let (course_prefix, course_number) = if level == LEVEL_COURSE {
                split_course_caption(&row.caption)
            } else {
                (String::new(), String::new())
            };

            store.insert(HierarchyNode {
                node_id: row.node_id,
                caption: row.caption,
                parent_id: row.parent_id,
                level,
                course_prefix,
                course_number,
            });
        }

        Ok(store)
    }

    fn insert(&mut self, node: HierarchyNode) {
        let index = self.nodes.len();

        if node.level == LEVEL_DEPARTMENT {
            // Depends on the college row having been inserted already.
            if let Some(college) = self.node(&node.parent_id) {
                self.college_departments
                    .entry(college.caption.clone())
                    .or_default()
                    .push(node.caption.clone());
            }
        }

        if node.level == LEVEL_COURSE {
            self.by_prefix
                .entry(node.course_prefix.clone())
                .or_default()
                .push(index);
        }

        self.children
            .entry(node.parent_id.clone())
            .or_default()
            .push(index);
        self.by_id.insert(node.node_id.clone(), index);
        self.nodes.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, node_id: &str) -> Option<&HierarchyNode> {
        self.by_id.get(node_id).map(|&index| &self.nodes[index])
    }

    /// Direct children of `parent_id` in insertion order.
    pub fn children_of(&self, parent_id: &str) -> Vec<&HierarchyNode> {
        self.children
            .get(parent_id)
            .map(|indexes| indexes.iter().map(|&index| &self.nodes[index]).collect())
            .unwrap_or_default()
    }

    /// First node (insertion order) matching caption and level, optionally
    /// filtered by the parent's caption.
    ///
    /// Captions can collide across parents at the same level; without a
    /// parent filter the first match wins, so callers in ambiguous domains
    /// must scope the lookup themselves.
    pub fn find_by_caption(
        &self,
        caption: &str,
        level: u8,
        parent_caption: Option<&str>,
    ) -> Option<&HierarchyNode> {
        for node in &self.nodes {
            if node.caption != caption || node.level != level {
                continue;
            }
            match parent_caption {
                Some(expected) => {
                    if let Some(parent) = self.node(&node.parent_id) {
                        if parent.caption == expected {
                            return Some(node);
                        }
                    }
                }
                None => return Some(node),
            }
        }
        None
    }

    /// The single course node captioned `"{prefix} {number}"` under the
    /// given department, if present.
    pub fn find_course_node(
        &self,
        prefix: &str,
        number: &str,
        department_id: &str,
    ) -> Option<&HierarchyNode> {
        let full_code = format!("{prefix} {number}");
        self.children_of(department_id)
            .into_iter()
            .find(|node| node.level == LEVEL_COURSE && node.caption == full_code)
    }

    /// Course nodes carrying `prefix` under the given department, in
    /// insertion order. Backed by the prefix index built at load.
    pub fn courses_with_prefix(&self, prefix: &str, department_id: &str) -> Vec<&HierarchyNode> {
        self.by_prefix
            .get(prefix)
            .map(|indexes| {
                indexes
                    .iter()
                    .map(|&index| &self.nodes[index])
                    .filter(|node| node.parent_id == department_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Distinct course prefixes among the department's course children.
    pub fn prefixes_under(&self, department_id: &str) -> BTreeSet<String> {
        self.children_of(department_id)
            .into_iter()
            .filter(|node| node.level == LEVEL_COURSE && !node.course_prefix.is_empty())
            .map(|node| node.course_prefix.clone())
            .collect()
    }

    /// College nodes (level 2) in insertion order, for selection surfaces.
    pub fn colleges(&self) -> Vec<&HierarchyNode> {
        self.nodes
            .iter()
            .filter(|node| node.level == LEVEL_COLLEGE)
            .collect()
    }

    /// Derived department captions for a college caption. This is a cache
    /// built during load; the parent/child links stay authoritative.
    pub fn departments_of(&self, college_caption: &str) -> &[String] {
        self.college_departments
            .get(college_caption)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
