//! Output file names.
//!
//! Every tool names its output `<base>_<suffix>.<ext>`, where `base` is the
//! source file name with its last extension removed:
//! - `holiday.jpg` + `compressed` + `jpg` → `holiday_compressed.jpg`
//! - `scan.final.png` + `300dpi` + `jpg` → `scan.final_300dpi.jpg`
//! - `README` + `resized` + `png` → `README_resized.png`
//!
//! Within one batch names are made unique with [`UniqueNames`]: the second
//! `photo_compressed.jpg` becomes `photo_compressed_2.jpg`.

use std::collections::HashSet;

/// Strip the last `.ext` from a file name. Leading-dot names keep their dot.
///
/// - `"photo.jpg"` → `"photo"`
/// - `"archive.tar.gz"` → `"archive.tar"`
/// - `".hidden"` → `".hidden"`
/// - `"noext"` → `"noext"`
pub fn remove_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) if name[dot + 1..].contains('/') => name,
        Some(dot) => &name[..dot],
    }
}

/// Lower-cased extension after the last dot, or `""`.
pub fn extension(name: &str) -> String {
    let base = remove_extension(name);
    if base.len() == name.len() {
        return String::new();
    }
    name[base.len() + 1..].to_ascii_lowercase()
}

/// Derive `<base>_<suffix>.<ext>` from a source name.
pub fn output_name(source: &str, suffix: &str, ext: &str) -> String {
    output_name_from_base(remove_extension(source), suffix, ext)
}

/// Same as [`output_name`] but with an explicit base (no extension stripping).
pub fn output_name_from_base(base: &str, suffix: &str, ext: &str) -> String {
    let base = if base.is_empty() { "image" } else { base };
    if suffix.is_empty() {
        format!("{base}.{ext}")
    } else {
        format!("{base}_{suffix}.{ext}")
    }
}

/// Names already handed out in one batch.
#[derive(Debug, Default)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `name` if unused, else the first free `<stem>_<n>.<ext>`
    /// counting from 2. The returned name is marked as taken.
    pub fn claim(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_string()) {
            return name.to_string();
        }
        let stem = remove_extension(name);
        let ext = &name[stem.len()..];
        let mut n = 2u32;
        loop {
            let candidate = format!("{stem}_{n}{ext}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
