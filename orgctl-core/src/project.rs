//! `sfdx-project.json` model.
//!
//! Only the slice that dependency installation needs: package directories
//! with their declared dependencies, and the alias table mapping versioned
//! package names to package-version ids.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{OrgError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct SfdxProject {
    #[serde(rename = "packageDirectories", default)]
    pub package_directories: Vec<PackageDirectory>,
    #[serde(rename = "packageAliases", default)]
    pub package_aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageDirectory {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<PackageDependency>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageDependency {
    pub package: String,
}

impl SfdxProject {
    /// Read `sfdx-project.json` from a project directory.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join("sfdx-project.json");
        if !path.exists() {
            return Err(OrgError::validation(format!(
                "No sfdx-project.json found in {}",
                project_dir.display()
            )));
        }

        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|err| OrgError::json(path.display().to_string(), err))
    }

    /// Resolve declared dependencies to package-version ids via the alias
    /// table. Keys are the package names (the text before `@` in the
    /// dependency entry); aliases without an entry are skipped.
    pub fn dependency_versions(&self) -> BTreeMap<String, String> {
        let mut versions = BTreeMap::new();
        for directory in &self.package_directories {
            for dependency in &directory.dependencies {
                let name = dependency
                    .package
                    .split('@')
                    .next()
                    .unwrap_or(&dependency.package)
                    .to_string();
                if let Some(version_id) = self.package_aliases.get(&dependency.package) {
                    versions.insert(name, version_id.clone());
                }
            }
        }
        versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PROJECT_JSON: &str = r#"{
        "packageDirectories": [
            {
                "path": "force-app",
                "default": true,
                "dependencies": [
                    { "package": "package1@1.0.0.LATEST" },
                    { "package": "package2@2.1.0.LATEST" }
                ]
            }
        ],
        "namespace": "",
        "packageAliases": {
            "package1@1.0.0.LATEST": "04t000000000001",
            "package2@2.1.0.LATEST": "04t000000000002"
        }
    }"#;

    #[test]
    fn resolves_dependency_versions() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("sfdx-project.json"), PROJECT_JSON).unwrap();

        let project = SfdxProject::load(temp.path()).unwrap();
        let versions = project.dependency_versions();

        assert_eq!(versions.len(), 2);
        assert_eq!(versions["package1"], "04t000000000001");
        assert_eq!(versions["package2"], "04t000000000002");
    }

    #[test]
    fn missing_project_file_is_validation_error() {
        let temp = TempDir::new().unwrap();
        let err = SfdxProject::load(temp.path()).unwrap_err();
        assert!(err.to_string().contains("No sfdx-project.json"));
    }

    #[test]
    fn unaliased_dependency_is_skipped() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("sfdx-project.json"),
            r#"{
                "packageDirectories": [
                    { "dependencies": [{ "package": "orphan@1.0.0.LATEST" }] }
                ],
                "packageAliases": {}
            }"#,
        )
        .unwrap();

        let project = SfdxProject::load(temp.path()).unwrap();
        assert!(project.dependency_versions().is_empty());
    }
}
