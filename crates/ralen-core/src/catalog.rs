//! Static catalog of the languages ralen knows how to install.

use crate::errors::{RalenError, RalenResult};
use crate::installation::types::OwnerRepo;
use regex::{Regex, RegexBuilder};
use std::collections::{BTreeMap, HashSet};

/// One installable language: where its runtime is published and how to recognize it.
#[derive(Debug, Clone)]
pub struct LanguageDefinition {
    /// Lowercase catalog key, also used as the directory name under `versions/`
    pub key: String,
    pub display_name: String,
    /// Acceptable runtime file names, in preference order
    pub runtime_executables: Vec<String>,
    pub repo_owner: Option<String>,
    pub repo_name: Option<String>,
    pub asset_pattern: Option<Regex>,
    pub fallback_asset_name: Option<String>,
    /// Argument passed to the runtime by the smoke test; empty means none
    pub version_arg: String,
    pub known_bad_versions: HashSet<String>,
    pub default_entry: String,
    pub entry_template: String,
}

impl LanguageDefinition {
    pub fn new(key: &str, runtime_executables: &[&str]) -> Self {
        Self {
            key: key.to_lowercase(),
            display_name: key.to_string(),
            runtime_executables: runtime_executables.iter().map(|s| s.to_string()).collect(),
            repo_owner: None,
            repo_name: None,
            asset_pattern: None,
            fallback_asset_name: None,
            version_arg: "--version".to_string(),
            known_bad_versions: HashSet::new(),
            default_entry: "main.txt".to_string(),
            entry_template: String::new(),
        }
    }

    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = name.to_string();
        self
    }

    pub fn with_repository(mut self, owner: &str, repo: &str) -> Self {
        self.repo_owner = Some(owner.to_string());
        self.repo_name = Some(repo.to_string());
        self
    }

    /// Set the asset-name pattern. Matching is case-insensitive.
    pub fn with_asset_pattern(mut self, pattern: &str) -> RalenResult<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| RalenError::Config {
                message: format!("invalid asset pattern for '{}': {}", self.key, e),
            })?;
        self.asset_pattern = Some(regex);
        Ok(self)
    }

    pub fn with_fallback_asset_name(mut self, name: &str) -> Self {
        self.fallback_asset_name = Some(name.to_string());
        self
    }

    pub fn with_version_arg(mut self, arg: &str) -> Self {
        self.version_arg = arg.to_string();
        self
    }

    pub fn with_known_bad_version(mut self, tag: &str) -> Self {
        self.known_bad_versions.insert(tag.to_string());
        self
    }

    pub fn with_entry(mut self, file_name: &str, template: &str) -> Self {
        self.default_entry = file_name.to_string();
        self.entry_template = template.to_string();
        self
    }

    /// File name the installed runtime is stored under inside `bin/`
    pub fn canonical_executable_name(&self) -> String {
        format!("{}{}", self.key, std::env::consts::EXE_SUFFIX)
    }

    /// Catalog repository, with `default_owner` filling in a missing owner
    pub fn repository(&self, default_owner: Option<&str>) -> Option<OwnerRepo> {
        let repo = self.repo_name.as_deref().filter(|r| !r.is_empty())?;
        let owner = self
            .repo_owner
            .as_deref()
            .filter(|o| !o.is_empty())
            .or(default_owner.filter(|o| !o.is_empty()))?;
        Some(OwnerRepo::new(owner, repo))
    }

    pub fn is_known_bad(&self, tag: &str) -> bool {
        self.known_bad_versions.contains(tag)
    }

    /// Whether `file_name` is one of the recognized runtime names
    pub fn is_runtime_name(&self, file_name: &str) -> bool {
        self.runtime_executables
            .iter()
            .any(|name| name.eq_ignore_ascii_case(file_name))
    }
}

/// Immutable, case-insensitive mapping of language keys to definitions.
///
/// Built once at startup and shared behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct LanguageCatalog {
    languages: BTreeMap<String, LanguageDefinition>,
}

impl LanguageCatalog {
    pub fn from_definitions(definitions: Vec<LanguageDefinition>) -> Self {
        let languages = definitions
            .into_iter()
            .map(|def| (def.key.clone(), def))
            .collect();
        Self { languages }
    }

    /// The catalog shipped with ralen
    pub fn builtin() -> RalenResult<Self> {
        let salang = LanguageDefinition::new("salang", &["salang", "salang.exe", "SaLang"])
            .with_display_name("SaLang")
            .with_repository("serene1491", "SaLang")
            .with_asset_pattern(r"^SaLang(|\.exe|\.zip|\.tar\.gz)$")?
            .with_fallback_asset_name("SaLang")
            .with_version_arg("--version")
            .with_entry(
                "main.sr",
                "// example entry for salang\nstd.print(\"hello ralen\")\n",
            );

        Ok(Self::from_definitions(vec![salang]))
    }

    pub fn get(&self, language: &str) -> Option<&LanguageDefinition> {
        self.languages.get(&language.to_lowercase())
    }

    /// Like [`get`](Self::get) but fails with `UnknownLanguage`
    pub fn require(&self, language: &str) -> RalenResult<&LanguageDefinition> {
        self.get(language).ok_or_else(|| RalenError::UnknownLanguage {
            language: language.to_string(),
        })
    }

    pub fn contains(&self, language: &str) -> bool {
        self.get(language).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LanguageDefinition> {
        self.languages.values()
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}
