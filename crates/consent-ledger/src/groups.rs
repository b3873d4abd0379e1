//! Data-group and request-group names

/// Data groups every student starts with
pub const DEFAULT_DATA_GROUPS: [&str; 3] = ["Academics", "Portfolio", "Personal"];

/// Receiver groups every student starts with
pub const DEFAULT_REQUEST_GROUPS: [&str; 2] = ["College", "Recruiters"];

/// Normalised form used to compare data-group names
pub fn normalize_group_name(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Canonical spelling of a default data group, matched case-insensitively
pub fn canonical_default_group(value: &str) -> Option<&'static str> {
    find_default(&DEFAULT_DATA_GROUPS, &normalize_group_name(value))
}

/// Normalised form used to compare request-group names
pub fn normalize_request_group_name(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Canonical spelling of a default request group, matched case-insensitively
pub fn canonical_default_request_group(value: &str) -> Option<&'static str> {
    find_default(&DEFAULT_REQUEST_GROUPS, &normalize_request_group_name(value))
}

fn find_default(defaults: &[&'static str], normalized: &str) -> Option<&'static str> {
    defaults
        .iter()
        .copied()
        .find(|group| group.to_lowercase() == normalized)
}
