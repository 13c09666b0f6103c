//! Destination key derivation

/// Extension every converted object is written with
pub const TARGET_EXTENSION: &str = ".jpeg";

/// Replace the final extension of `source_key` with [`TARGET_EXTENSION`]
///
/// The extension is the suffix starting at the last `.` of the last path
/// segment. Keys without one get the extension appended.
pub fn derive_destination_key(source_key: &str) -> String {
    format!("{}{}", trim_extension(source_key), TARGET_EXTENSION)
}

fn trim_extension(key: &str) -> &str {
    let name_start = key.rfind('/').map(|i| i + 1).unwrap_or(0);
    match key[name_start..].rfind('.') {
        Some(dot) => &key[..name_start + dot],
        None => key,
    }
}
