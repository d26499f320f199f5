use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
    pub language: String,
    /// Derived against the persisted default version id; never stored.
    #[serde(default, skip_serializing)]
    pub is_default: bool,
}

impl VersionDescriptor {
    pub fn new(id: &str, name: &str, abbreviation: &str, language: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            abbreviation: abbreviation.to_string(),
            language: language.to_string(),
            is_default: false,
        }
    }

    pub fn display_name(&self) -> String {
        if self.abbreviation.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.abbreviation)
        }
    }
}

/// Versions offered when the provider cannot be reached, so there is always
/// something selectable.
pub fn fallback_versions(language: &str) -> Vec<VersionDescriptor> {
    match language {
        "es" => vec![
            VersionDescriptor::new("rvr1960", "Reina-Valera 1960", "RVR1960", "es"),
            VersionDescriptor::new("kjv", "King James Version", "KJV", "en"),
        ],
        "pt" => vec![
            VersionDescriptor::new("arc", "Almeida Revista e Corrigida", "ARC", "pt"),
            VersionDescriptor::new("kjv", "King James Version", "KJV", "en"),
        ],
        _ => vec![
            VersionDescriptor::new("kjv", "King James Version", "KJV", "en"),
            VersionDescriptor::new("web", "World English Bible", "WEB", "en"),
        ],
    }
}
