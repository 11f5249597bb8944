use super::HierarchyStore;

/// True when `prefix` is 2-3 ASCII letters and, upper-cased, names a subject
/// that actually exists among the department's courses. Case-insensitive on
/// input; the stored prefixes are compared upper-case.
pub fn validate_prefix(store: &HierarchyStore, prefix: &str, department_id: &str) -> bool {
    if !prefix_is_well_formed(prefix) {
        return false;
    }
    let normalized = prefix.to_ascii_uppercase();
    store.prefixes_under(department_id).contains(&normalized)
}

/// Lexical half of the prefix rule: 2-3 ASCII letters, nothing else.
pub fn prefix_is_well_formed(prefix: &str) -> bool {
    let len = prefix.chars().count();
    (2..=3).contains(&len) && prefix.chars().all(|c| c.is_ascii_alphabetic())
}

/// Course numbers are exactly three ASCII digits.
pub fn validate_course_number(number: &str) -> bool {
    number.len() == 3 && number.bytes().all(|b| b.is_ascii_digit())
}
