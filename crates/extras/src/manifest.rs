use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::{ExtrasError, Requirement, Result};

const BUNDLED: &str = include_str!("../extras.toml");

#[derive(Deserialize)]
struct PyProject {
    project: Option<Project>,
}

#[derive(Deserialize)]
struct Project {
    #[serde(rename = "optional-dependencies")]
    optional_dependencies: Option<BTreeMap<String, Vec<String>>>,
}

/// Extra name to the single plugin package it pulls in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtrasManifest {
    extras: BTreeMap<String, Requirement>,
}

impl ExtrasManifest {
    /// The manifest shipped with this crate.
    pub fn bundled() -> Result<Self> {
        Self::from_toml_str(BUNDLED)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let manifest = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), extras = manifest.len(), "Loaded extras manifest");
        Ok(manifest)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let raw: PyProject = toml::from_str(s)?;
        let table = raw
            .project
            .and_then(|p| p.optional_dependencies)
            .ok_or(ExtrasError::MissingTable)?;

        let mut extras = BTreeMap::new();
        let mut original: BTreeMap<String, String> = BTreeMap::new();
        for (name, deps) in table {
            let key = normalize_name(&name).ok_or_else(|| ExtrasError::InvalidName(name.clone()))?;
            if let Some(existing) = original.get(&key) {
                return Err(ExtrasError::Duplicate {
                    name,
                    existing: existing.clone(),
                });
            }

            let [specifier] = deps.as_slice() else {
                return Err(ExtrasError::DependencyCount {
                    extra: name,
                    count: deps.len(),
                });
            };
            let requirement =
                Requirement::parse(specifier).map_err(|reason| ExtrasError::InvalidSpecifier {
                    extra: name.clone(),
                    specifier: specifier.clone(),
                    reason,
                })?;

            original.insert(key.clone(), name);
            extras.insert(key, requirement);
        }

        Ok(Self { extras })
    }

    /// Look up an extra by any spelling that normalizes to its name.
    pub fn get(&self, name: &str) -> Option<&Requirement> {
        normalize_name(name).and_then(|key| self.extras.get(&key))
    }

    /// Requirements for the requested extras, in request order.
    pub fn resolve<'a, I>(&self, names: I) -> Result<Vec<&Requirement>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(|name| {
                self.get(name)
                    .ok_or_else(|| ExtrasError::UnknownExtra(name.to_string()))
            })
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.extras.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Requirement)> {
        self.extras.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.extras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extras.is_empty()
    }
}

/// Lowercase, with every run of `-`, `_` and `.` collapsed to one `-`.
/// Returns `None` for names that do not start and end alphanumerically.
pub fn normalize_name(name: &str) -> Option<String> {
    let name = name.trim();
    let bytes = name.as_bytes();
    let valid_ends = matches!(
        (bytes.first(), bytes.last()),
        (Some(a), Some(b)) if a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric()
    );
    if !valid_ends {
        return None;
    }

    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        match c {
            '-' | '_' | '.' => {
                if !in_separator {
                    out.push('-');
                }
                in_separator = true;
            }
            c if c.is_ascii_alphanumeric() => {
                out.push(c.to_ascii_lowercase());
                in_separator = false;
            }
            _ => return None,
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Version;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Turn_Detector").as_deref(), Some("turn-detector"));
        assert_eq!(normalize_name("a.-_b").as_deref(), Some("a-b"));
        assert_eq!(normalize_name("silero").as_deref(), Some("silero"));
        assert_eq!(normalize_name("-silero"), None);
        assert_eq!(normalize_name("sil ero"), None);
        assert_eq!(normalize_name(""), None);
    }

    #[test]
    fn test_parse_table() {
        let manifest = ExtrasManifest::from_toml_str(
            r#"
            [project]
            name = "agents"

            [project.optional-dependencies]
            silero = ["livekit-plugins-silero>=1.2.9,<2"]
            Turn_Detector = ["livekit-plugins-turn-detector>=1.2,<2"]
            "#,
        )
        .unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.names().collect::<Vec<_>>(), vec!["silero", "turn-detector"]);
        let r = manifest.get("turn.detector").unwrap();
        assert_eq!(r.package, "livekit-plugins-turn-detector");
        assert_eq!(r.minimum, Version::new(1, 2, 0));
    }

    #[test]
    fn test_normalized_duplicates_rejected() {
        let err = ExtrasManifest::from_toml_str(
            r#"
            [project.optional-dependencies]
            turn-detector = ["a>=1,<2"]
            turn_detector = ["b>=1,<2"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ExtrasError::Duplicate { .. }));
    }

    #[test]
    fn test_exactly_one_specifier() {
        let err = ExtrasManifest::from_toml_str(
            r#"
            [project.optional-dependencies]
            both = ["a>=1,<2", "b>=1,<2"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ExtrasError::DependencyCount { count: 2, .. }));

        let err = ExtrasManifest::from_toml_str(
            r#"
            [project.optional-dependencies]
            none = []
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ExtrasError::DependencyCount { count: 0, .. }));
    }

    #[test]
    fn test_missing_table() {
        let err = ExtrasManifest::from_toml_str("[project]\nname = \"x\"\n").unwrap_err();
        assert!(matches!(err, ExtrasError::MissingTable));
    }

    #[test]
    fn test_bad_specifier_names_extra() {
        let err = ExtrasManifest::from_toml_str(
            r#"
            [project.optional-dependencies]
            deepgram = ["livekit-plugins-deepgram>=1.2"]
            "#,
        )
        .unwrap_err();
        match err {
            ExtrasError::InvalidSpecifier { extra, .. } => assert_eq!(extra, "deepgram"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_unknown_extra() {
        let manifest = ExtrasManifest::from_toml_str(
            "[project.optional-dependencies]\nsilero = [\"s>=1,<2\"]\n",
        )
        .unwrap();
        assert_eq!(manifest.resolve(["silero"]).unwrap().len(), 1);
        assert!(matches!(
            manifest.resolve(["silero", "nope"]),
            Err(ExtrasError::UnknownExtra(name)) if name == "nope"
        ));
    }
}
