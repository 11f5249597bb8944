use serde::{Deserialize, Serialize};

use crate::hierarchy::{prefix, HierarchyStore, LEVEL_DEPARTMENT};

pub mod storage;

pub use storage::{ContactStore, CsvContactStore, MemoryContactStore, StorageError};

/// Scope of a report-viewer contact within the hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactType {
    #[default]
    College,
    Department,
    #[serde(rename = "Course Coordinator")]
    CourseCoordinator,
}

impl ContactType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::College => "College",
            Self::Department => "Department",
            Self::CourseCoordinator => "Course Coordinator",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "College" => Some(Self::College),
            "Department" => Some(Self::Department),
            "Course Coordinator" => Some(Self::CourseCoordinator),
            _ => None,
        }
    }
}

/// Recomputes the contact type from field presence. The stored type is a
/// serialization convenience, never trusted over this derivation on edit.
pub fn derive_contact_type(department: &str, course: &str) -> ContactType {
    if department == "All" {
        ContactType::College
    } else if course.is_empty() {
        ContactType::Department
    } else {
        ContactType::CourseCoordinator
    }
}

/// One report-viewer record. `id` is a dense 1..N display ordinal that is
/// reassigned after deletions, not a durable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: u32,
    pub linkblue: String,
    pub first_name: String,
    pub last_name: String,
    pub primary_contact: bool,
    pub contact_type: ContactType,
    pub college: String,
    pub department: String,
    pub course: String,
    pub prefix: String,
    pub level_type: String,
}

/// Caller-supplied fields for an insert or update. `contact_type` is the
/// claimed scope checked on insert and may be omitted from update payloads,
/// which recompute the scope from department/course presence instead.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactDraft {
    pub linkblue: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub primary_contact: bool,
    #[serde(default)]
    pub contact_type: ContactType,
    #[serde(default)]
    pub course_coordinator: bool,
    pub college: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub level_type: String,
}

/// Validation and persistence failures for directory mutations. All are
/// caller-recoverable; the attempted mutation is rejected with no state
/// change and the message is meant for re-presentation to the user.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("department is required for department contacts")]
    MissingDepartment,
    #[error("college contacts cannot have a department selected")]
    DepartmentNotAllowed,
    #[error("only one primary contact allowed per college")]
    DuplicatePrimary,
    #[error("department '{department}' not found under college '{college}'")]
    DepartmentNotFound { college: String, department: String },
    #[error("invalid prefix {prefix} for department {department}")]
    InvalidPrefix { prefix: String, department: String },
    #[error("course number must be 3 digits")]
    InvalidCourseNumber,
    #[error("course {prefix} {course} not found in department")]
    CourseNotFound { prefix: String, course: String },
    #[error("contact {id} not found")]
    ContactNotFound { id: u32 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DirectoryError {
    /// Machine-readable kind for API payloads.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingDepartment => "missing_department",
            Self::DepartmentNotAllowed => "department_not_allowed",
            Self::DuplicatePrimary => "duplicate_primary",
            Self::DepartmentNotFound { .. } => "department_not_found",
            Self::InvalidPrefix { .. } => "invalid_prefix",
            Self::InvalidCourseNumber => "invalid_course_number",
            Self::CourseNotFound { .. } => "course_not_found",
            Self::ContactNotFound { .. } => "contact_not_found",
            Self::Storage(_) => "storage",
        }
    }
}

/// In-memory contact collection with validated mutations. Every successful
/// mutation re-persists the full directory through the backing store.
pub struct ContactDirectory<S: ContactStore> {
    contacts: Vec<Contact>,
    store: S,
}

impl<S: ContactStore> ContactDirectory<S> {
    /// Loads the persisted directory once at startup.
    pub fn load(store: S) -> Result<Self, StorageError> {
        let contacts = store.load()?;
        Ok(Self { contacts, store })
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn get(&self, id: u32) -> Option<&Contact> {
        self.contacts.iter().find(|contact| contact.id == id)
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Validates and appends a new contact, assigning the next dense id.
    pub fn insert(
        &mut self,
        hierarchy: &HierarchyStore,
        draft: ContactDraft,
    ) -> Result<&Contact, DirectoryError> {
        if draft.contact_type == ContactType::Department && draft.department.is_empty() {
            return Err(DirectoryError::MissingDepartment);
        }
        if draft.contact_type == ContactType::College && !draft.department.is_empty() {
            return Err(DirectoryError::DepartmentNotAllowed);
        }
        if draft.contact_type == ContactType::College && draft.primary_contact {
            self.check_primary_unique(&draft.college, None)?;
        }

        let mut contact_type = draft.contact_type;
        let mut normalized_prefix = draft.prefix.trim().to_string();
        let course = draft.course.trim().to_string();

        if draft.contact_type == ContactType::Department && draft.course_coordinator {
            normalized_prefix = normalized_prefix.to_ascii_uppercase();
            let department = hierarchy
                .find_by_caption(&draft.department, LEVEL_DEPARTMENT, Some(&draft.college))
                .ok_or_else(|| DirectoryError::DepartmentNotFound {
                    college: draft.college.clone(),
                    department: draft.department.clone(),
                })?;

            if !prefix::validate_prefix(hierarchy, &normalized_prefix, &department.node_id) {
                return Err(DirectoryError::InvalidPrefix {
                    prefix: normalized_prefix,
                    department: draft.department.clone(),
                });
            }

            if !course.is_empty() {
                if !prefix::validate_course_number(&course) {
                    return Err(DirectoryError::InvalidCourseNumber);
                }
                if hierarchy
                    .find_course_node(&normalized_prefix, &course, &department.node_id)
                    .is_none()
                {
                    return Err(DirectoryError::CourseNotFound {
                        prefix: normalized_prefix,
                        course,
                    });
                }
            }

            contact_type = ContactType::CourseCoordinator;
        }

        let index = self.contacts.len();
        let contact = Contact {
            id: index as u32 + 1,
            linkblue: draft.linkblue,
            first_name: draft.first_name,
            last_name: draft.last_name,
            primary_contact: draft.primary_contact,
            contact_type,
            college: draft.college,
            department: draft.department,
            course,
            prefix: normalized_prefix,
            level_type: draft.level_type,
        };

        self.contacts.push(contact);
        self.store.save(&self.contacts)?;
        Ok(&self.contacts[index])
    }

    /// Replaces a contact's mutable fields, recomputing the contact type
    /// from the new department/course values. Rejects without persisting
    /// when the primary-contact invariant would break.
    pub fn update(
        &mut self,
        id: u32,
        draft: ContactDraft,
    ) -> Result<&Contact, DirectoryError> {
        let index = self
            .contacts
            .iter()
            .position(|contact| contact.id == id)
            .ok_or(DirectoryError::ContactNotFound { id })?;

        let department = if draft.department.is_empty() {
            "All".to_string()
        } else {
            draft.department
        };
        let contact_type = derive_contact_type(&department, &draft.course);

        if draft.primary_contact && contact_type == ContactType::College {
            self.check_primary_unique(&draft.college, Some(id))?;
        }

        self.contacts[index] = Contact {
            id,
            linkblue: draft.linkblue,
            first_name: draft.first_name,
            last_name: draft.last_name,
            primary_contact: draft.primary_contact,
            contact_type,
            college: draft.college,
            department,
            course: draft.course,
            prefix: draft.prefix,
            level_type: draft.level_type,
        };
        self.store.save(&self.contacts)?;
        Ok(&self.contacts[index])
    }

    /// Removes a contact (absent id is a no-op) and renumbers the survivors
    /// densely from 1 in their current order.
    pub fn delete(&mut self, id: u32) -> Result<(), DirectoryError> {
        self.contacts.retain(|contact| contact.id != id);
        for (index, contact) in self.contacts.iter_mut().enumerate() {
            contact.id = index as u32 + 1;
        }
        self.store.save(&self.contacts)?;
        Ok(())
    }

    fn check_primary_unique(
        &self,
        college: &str,
        exclude_id: Option<u32>,
    ) -> Result<(), DirectoryError> {
        let conflict = self.contacts.iter().any(|contact| {
            exclude_id != Some(contact.id)
                && contact.college == college
                && contact.primary_contact
                && contact.contact_type == ContactType::College
        });
        if conflict {
            return Err(DirectoryError::DuplicatePrimary);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_hierarchy() -> HierarchyStore {
        let rows = "\
Node Id,Node Caption,Parent Node Id,Level,CourseNo
U1,State University,,1,
C1,Engineering,U1,2,
D1,Computer Science,C1,3,
CRS1,CS 101,D1,4,CS 101
CRS2,CS 201,D1,4,CS 201
";
        HierarchyStore::from_reader(Cursor::new(rows)).expect("hierarchy loads")
    }

    fn empty_directory() -> ContactDirectory<MemoryContactStore> {
        ContactDirectory::load(MemoryContactStore::default()).expect("empty store loads")
    }

    fn college_draft(linkblue: &str, primary: bool) -> ContactDraft {
        ContactDraft {
            linkblue: linkblue.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            primary_contact: primary,
            contact_type: ContactType::College,
            course_coordinator: false,
            college: "Engineering".to_string(),
            department: String::new(),
            course: String::new(),
            prefix: String::new(),
            level_type: "college".to_string(),
        }
    }

    fn coordinator_draft(prefix: &str, course: &str) -> ContactDraft {
        ContactDraft {
            linkblue: "coord1".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            primary_contact: false,
            contact_type: ContactType::Department,
            course_coordinator: true,
            college: "Engineering".to_string(),
            department: "Computer Science".to_string(),
            course: course.to_string(),
            prefix: prefix.to_string(),
            level_type: "department".to_string(),
        }
    }

    #[test]
    fn draft_payload_may_omit_contact_type() {
        let draft: ContactDraft = serde_json::from_str(
            r#"{"linkblue":"abc123","first_name":"Ada","last_name":"Lovelace","college":"Engineering"}"#,
        )
        .expect("draft parses without contact_type");
        assert_eq!(draft.contact_type, ContactType::College);
        assert!(!draft.primary_contact);
    }

    #[test]
    fn department_contact_requires_department() {
        let hierarchy = sample_hierarchy();
        let mut directory = empty_directory();
        let draft = ContactDraft {
            contact_type: ContactType::Department,
            department: String::new(),
            course_coordinator: false,
            ..coordinator_draft("CS", "")
        };
        let err = directory.insert(&hierarchy, draft).expect_err("rejected");
        assert!(matches!(err, DirectoryError::MissingDepartment));
        assert!(directory.is_empty());
    }

    #[test]
    fn college_contact_rejects_department() {
        let hierarchy = sample_hierarchy();
        let mut directory = empty_directory();
        let draft = ContactDraft {
            department: "Computer Science".to_string(),
            ..college_draft("abc123", false)
        };
        let err = directory.insert(&hierarchy, draft).expect_err("rejected");
        assert!(matches!(err, DirectoryError::DepartmentNotAllowed));
    }

    #[test]
    fn second_primary_for_same_college_is_rejected() {
        let hierarchy = sample_hierarchy();
        let mut directory = empty_directory();
        directory
            .insert(&hierarchy, college_draft("abc123", true))
            .expect("first primary accepted");
        let err = directory
            .insert(&hierarchy, college_draft("def456", true))
            .expect_err("second primary rejected");
        assert!(matches!(err, DirectoryError::DuplicatePrimary));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn coordinator_prefix_is_normalized_and_validated() {
        let hierarchy = sample_hierarchy();
        let mut directory = empty_directory();
        let contact = directory
            .insert(&hierarchy, coordinator_draft(" cs ", ""))
            .expect("coordinator accepted");
        assert_eq!(contact.prefix, "CS");
        assert_eq!(contact.contact_type, ContactType::CourseCoordinator);

        let err = directory
            .insert(&hierarchy, coordinator_draft("MA", ""))
            .expect_err("unknown prefix rejected");
        assert!(matches!(err, DirectoryError::InvalidPrefix { .. }));
    }

    #[test]
    fn coordinator_department_must_resolve() {
        let hierarchy = sample_hierarchy();
        let mut directory = empty_directory();
        let draft = ContactDraft {
            department: "Philosophy".to_string(),
            ..coordinator_draft("CS", "")
        };
        let err = directory.insert(&hierarchy, draft).expect_err("rejected");
        assert!(matches!(err, DirectoryError::DepartmentNotFound { .. }));
    }

    #[test]
    fn coordinator_course_number_checks_run_in_order() {
        let hierarchy = sample_hierarchy();
        let mut directory = empty_directory();

        let err = directory
            .insert(&hierarchy, coordinator_draft("CS", "31"))
            .expect_err("short number rejected");
        assert!(matches!(err, DirectoryError::InvalidCourseNumber));

        let err = directory
            .insert(&hierarchy, coordinator_draft("CS", "999"))
            .expect_err("missing course rejected");
        assert!(matches!(err, DirectoryError::CourseNotFound { .. }));

        let contact = directory
            .insert(&hierarchy, coordinator_draft("CS", "101"))
            .expect("known course accepted");
        assert_eq!(contact.course, "101");
    }

    #[test]
    fn delete_renumbers_survivors_densely() {
        let hierarchy = sample_hierarchy();
        let mut directory = empty_directory();
        directory
            .insert(&hierarchy, college_draft("a", false))
            .expect("insert a");
        directory
            .insert(&hierarchy, coordinator_draft("CS", ""))
            .expect("insert b");
        directory
            .insert(&hierarchy, college_draft("c", false))
            .expect("insert c");

        directory.delete(2).expect("delete persists");
        let ids: Vec<u32> = directory.contacts().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(directory.contacts()[1].linkblue, "c");

        // Deleting an absent id is a quiet no-op.
        directory.delete(99).expect("no-op delete persists");
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn update_recomputes_contact_type() {
        let hierarchy = sample_hierarchy();
        let mut directory = empty_directory();
        directory
            .insert(&hierarchy, coordinator_draft("CS", "101"))
            .expect("coordinator inserted");

        // Clearing the course demotes the record to a department contact.
        let draft = ContactDraft {
            course: String::new(),
            ..coordinator_draft("CS", "")
        };
        let updated = directory.update(1, draft).expect("update persists");
        assert_eq!(updated.contact_type, ContactType::Department);

        // An empty department reads as "All", i.e. a college contact.
        let draft = ContactDraft {
            department: String::new(),
            course: String::new(),
            ..coordinator_draft("CS", "")
        };
        let updated = directory.update(1, draft).expect("update persists");
        assert_eq!(updated.contact_type, ContactType::College);
        assert_eq!(updated.department, "All");
    }

    #[test]
    fn update_rejects_duplicate_primary_without_saving() {
        let hierarchy = sample_hierarchy();
        let mut directory = empty_directory();
        directory
            .insert(&hierarchy, college_draft("first", true))
            .expect("primary inserted");
        directory
            .insert(&hierarchy, college_draft("second", false))
            .expect("secondary inserted");

        let draft = ContactDraft {
            department: String::new(),
            ..college_draft("second", true)
        };
        let err = directory.update(2, draft).expect_err("promotion rejected");
        assert!(matches!(err, DirectoryError::DuplicatePrimary));
        assert!(!directory.get(2).expect("record intact").primary_contact);
    }

    #[test]
    fn update_unknown_id_reports_not_found() {
        let mut directory = empty_directory();
        let err = directory
            .update(7, college_draft("ghost", false))
            .expect_err("missing contact");
        assert!(matches!(err, DirectoryError::ContactNotFound { id: 7 }));
    }

    #[test]
    fn end_to_end_primary_lifecycle() {
        let hierarchy = sample_hierarchy();
        let mut directory = empty_directory();

        let first = directory
            .insert(&hierarchy, college_draft("abc123", true))
            .expect("first primary accepted");
        assert_eq!(first.id, 1);

        let err = directory
            .insert(&hierarchy, college_draft("def456", true))
            .expect_err("second primary rejected");
        assert!(matches!(err, DirectoryError::DuplicatePrimary));
        assert_eq!(directory.len(), 1);

        directory.delete(1).expect("delete persists");
        assert!(directory.is_empty());

        let reinserted = directory
            .insert(&hierarchy, college_draft("def456", true))
            .expect("reinsert succeeds after delete");
        assert_eq!(reinserted.id, 1);
    }
}
