use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::{Contact, ContactType};

/// Persistence seam for the directory so the mutation logic can be
/// exercised in isolation. Stores always write the whole snapshot; there
/// are no incremental updates.
pub trait ContactStore {
    fn load(&self) -> Result<Vec<Contact>, StorageError>;
    fn save(&self, contacts: &[Contact]) -> Result<(), StorageError>;
}

/// Error enumeration for snapshot load/save failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to read contact data: {0}")]
    Csv(#[from] csv::Error),
    #[error("contact snapshot unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("contact row {id} has unrecognized contact type '{value}'")]
    UnknownContactType { id: u32, value: String },
}

const CONTACT_FIELDS: [&str; 11] = [
    "id",
    "linkblue",
    "first_name",
    "last_name",
    "primary_contact",
    "contact_type",
    "college",
    "department",
    "course",
    "prefix",
    "level_type",
];

/// On-disk row. Field order is the persisted column order and must not
/// change; `primary_contact` travels as the literal strings yes/no.
#[derive(Debug, Serialize, Deserialize)]
struct ContactRow {
    id: u32,
    linkblue: String,
    first_name: String,
    last_name: String,
    primary_contact: String,
    contact_type: String,
    college: String,
    department: String,
    course: String,
    prefix: String,
    level_type: String,
}

impl ContactRow {
    fn from_contact(contact: &Contact) -> Self {
        Self {
            id: contact.id,
            linkblue: contact.linkblue.clone(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            primary_contact: if contact.primary_contact { "yes" } else { "no" }.to_string(),
            contact_type: contact.contact_type.label().to_string(),
            college: contact.college.clone(),
            department: contact.department.clone(),
            course: contact.course.clone(),
            prefix: contact.prefix.clone(),
            level_type: contact.level_type.clone(),
        }
    }

    fn into_contact(self) -> Result<Contact, StorageError> {
        let contact_type = ContactType::parse(&self.contact_type).ok_or_else(|| {
            StorageError::UnknownContactType {
                id: self.id,
                value: self.contact_type.clone(),
            }
        })?;

        Ok(Contact {
            id: self.id,
            linkblue: self.linkblue,
            first_name: self.first_name,
            last_name: self.last_name,
            primary_contact: self.primary_contact.eq_ignore_ascii_case("yes"),
            contact_type,
            college: self.college,
            department: self.department,
            course: self.course,
            prefix: self.prefix,
            level_type: self.level_type,
        })
    }
}

/// Flat-file snapshot of the directory. A missing file reads as an empty
/// directory; the first save creates it.
pub struct CsvContactStore {
    path: PathBuf,
}

impl CsvContactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContactStore for CsvContactStore {
    fn load(&self) -> Result<Vec<Contact>, StorageError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut reader = csv::Reader::from_reader(file);
        let mut contacts = Vec::new();
        for record in reader.deserialize::<ContactRow>() {
            contacts.push(record?.into_contact()?);
        }
        Ok(contacts)
    }

    fn save(&self, contacts: &[Contact]) -> Result<(), StorageError> {
        let mut writer = csv::Writer::from_path(&self.path)?;
        if contacts.is_empty() {
            // serialize() only emits the header alongside a first record.
            writer.write_record(CONTACT_FIELDS)?;
        }
        for contact in contacts {
            writer.serialize(ContactRow::from_contact(contact))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Keeps the snapshot in memory; used by tests and demos in place of the
/// CSV store.
#[derive(Default)]
pub struct MemoryContactStore {
    contacts: Mutex<Vec<Contact>>,
}

impl MemoryContactStore {
    pub fn with_contacts(contacts: Vec<Contact>) -> Self {
        Self {
            contacts: Mutex::new(contacts),
        }
    }

    pub fn snapshot(&self) -> Vec<Contact> {
        self.contacts.lock().expect("store mutex poisoned").clone()
    }
}

impl ContactStore for MemoryContactStore {
    fn load(&self) -> Result<Vec<Contact>, StorageError> {
        Ok(self.snapshot())
    }

    fn save(&self, contacts: &[Contact]) -> Result<(), StorageError> {
        *self.contacts.lock().expect("store mutex poisoned") = contacts.to_vec();
        Ok(())
    }
}
