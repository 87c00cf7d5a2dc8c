//! Retrieve requests.

use serde::{Deserialize, Serialize};

use crate::envelope::Params;

/// Package manifest (package.xml).
///
/// Values are escaped when the envelope is rendered, so member names can
/// hold any text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub types: Vec<PackageTypeMembers>,
    pub version: String,
}

impl PackageManifest {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            types: Vec::new(),
            version: version.into(),
        }
    }

    /// Add a metadata type with its members.
    pub fn add_type(mut self, name: impl Into<String>, members: Vec<String>) -> Self {
        self.types.push(PackageTypeMembers {
            name: name.into(),
            members,
        });
        self
    }

    fn to_params(&self) -> Params {
        let types: Vec<Params> = self
            .types
            .iter()
            .map(|t| {
                Params::new()
                    .with("members", t.members.clone())
                    .with("name", t.name.clone())
            })
            .collect();

        let mut params = Params::new();
        if !types.is_empty() {
            params.insert("types", types);
        }
        params.insert("version", self.version.clone());
        params
    }
}

/// Type members in a package manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageTypeMembers {
    pub name: String,
    pub members: Vec<String>,
}

/// A `retrieve` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrieveRequest {
    pub api_version: String,
    pub package_names: Vec<String>,
    pub single_package: bool,
    pub specific_files: Vec<String>,
    pub unpackaged: Option<PackageManifest>,
}

impl RetrieveRequest {
    pub fn new(api_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            ..Default::default()
        }
    }

    /// Retrieve the components listed in `manifest`.
    ///
    /// The archive keeps them under `unpackaged/`, next to any named
    /// packages.
    pub fn unpackaged(manifest: PackageManifest) -> Self {
        Self {
            api_version: manifest.version.clone(),
            single_package: false,
            unpackaged: Some(manifest),
            ..Default::default()
        }
    }

    pub fn with_package_names(mut self, names: Vec<String>) -> Self {
        self.package_names = names;
        self
    }

    pub fn with_single_package(mut self, single_package: bool) -> Self {
        self.single_package = single_package;
        self
    }

    pub fn with_specific_files(mut self, files: Vec<String>) -> Self {
        self.specific_files = files;
        self
    }

    /// Parameters of the `retrieve` call, in schema order.
    pub fn to_params(&self) -> Params {
        let mut request = Params::new().with("apiVersion", self.api_version.clone());
        if !self.package_names.is_empty() {
            request.insert("packageNames", self.package_names.clone());
        }
        request.insert("singlePackage", self.single_package);
        if !self.specific_files.is_empty() {
            request.insert("specificFiles", self.specific_files.clone());
        }
        if let Some(manifest) = &self.unpackaged {
            request.insert("unpackaged", manifest.to_params());
        }

        Params::new().with("retrieveRequest", request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{EnvelopeBuilder, Operation};

    #[test]
    fn test_unpackaged_request_envelope() {
        let manifest = PackageManifest::new("62.0")
            .add_type(
                "ApexClass",
                vec!["MyClass".to_string(), "OtherClass".to_string()],
            )
            .add_type("ApexTrigger", vec!["*".to_string()]);

        let xml = EnvelopeBuilder::new("sid")
            .build(Operation::Retrieve, &RetrieveRequest::unpackaged(manifest).to_params())
            .unwrap();

        assert!(xml.contains("<met:apiVersion>62.0</met:apiVersion>"));
        assert!(xml.contains("<met:singlePackage>false</met:singlePackage>"));
        assert!(xml.contains("<met:name>ApexClass</met:name>"));
        assert!(xml.contains("<met:members>MyClass</met:members>"));
        assert!(xml.contains("<met:members>OtherClass</met:members>"));
        assert!(xml.contains("<met:members>*</met:members>"));
        assert!(xml.contains("<met:version>62.0</met:version>"));
    }

    #[test]
    fn test_package_names_request() {
        let request = RetrieveRequest::new("62.0")
            .with_package_names(vec!["MyPackage".to_string(), "Other".to_string()]);

        let xml = EnvelopeBuilder::new("sid")
            .build(Operation::Retrieve, &request.to_params())
            .unwrap();

        assert!(xml.contains("<met:packageNames>MyPackage</met:packageNames>"));
        assert!(xml.contains("<met:packageNames>Other</met:packageNames>"));
        assert!(xml.contains("<met:singlePackage>false</met:singlePackage>"));
        assert!(!xml.contains("unpackaged"));
    }

    #[test]
    fn test_member_names_are_escaped() {
        let manifest = PackageManifest::new("62.0").add_type(
            "ApexClass",
            vec!["</members><malicious>attack</malicious><members>".to_string()],
        );

        let xml = EnvelopeBuilder::new("sid")
            .build(Operation::Retrieve, &RetrieveRequest::unpackaged(manifest).to_params())
            .unwrap();

        assert!(xml.contains("&lt;malicious&gt;"));
        assert!(!xml.contains("<malicious>"));
    }

    #[test]
    fn test_missing_api_version_is_rejected() {
        let err = EnvelopeBuilder::new("sid")
            .build(Operation::Retrieve, &RetrieveRequest::default().to_params())
            .unwrap_err();
        assert!(err.to_string().contains("retrieveRequest/apiVersion"));
    }
}
