//! Views of what the CA knows: the identities and affiliations a registrar
//! can see (or has just changed), and the CA's own info.

use crate::{ca::request::Attribute, error::Result};
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An identity registered with the CA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, getset::Getters)]
#[getset(get = "pub")]
pub struct Identity {
    #[serde(rename = "id")]
    enrollment_id: String,
    #[serde(rename = "type", default)]
    identity_type: String,
    #[serde(default)]
    affiliation: String,
    #[serde(default)]
    attrs: Vec<Attribute>,
    #[serde(default)]
    max_enrollments: Option<i64>,
    #[serde(default)]
    caname: Option<String>,
    /// Any fields we don't model, as the CA sent them.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Identity {
    pub(crate) fn from_value(val: Value) -> Result<Self> {
        Ok(serde_json::from_value(val)?)
    }

    /// The enrollment secret. The CA only sends this back when it creates an
    /// identity or changes its secret.
    pub fn secret(&self) -> Option<&str> {
        self.extra.get("secret").and_then(|v| v.as_str())
    }

    /// Look up an attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|a| a.name() == name).map(|a| a.value().as_str())
    }
}

/// A node in the affiliation tree (`org1`, `org1.department1`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, getset::Getters)]
#[getset(get = "pub")]
pub struct Affiliation {
    /// The full dotted name. Empty for the root of a listing.
    #[serde(default)]
    name: String,
    #[serde(default)]
    affiliations: Vec<Affiliation>,
    #[serde(default)]
    identities: Vec<Identity>,
}

impl Affiliation {
    pub(crate) fn from_result(result: Map<String, Value>) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(result))?)
    }

    /// Find an affiliation anywhere under (and including) this one by its
    /// full dotted name.
    pub fn find(&self, name: &str) -> Option<&Affiliation> {
        if self.name == name {
            return Some(self);
        }
        self.affiliations.iter().find_map(|a| a.find(name))
    }

    /// All affiliation names in this tree, depth first, skipping an unnamed
    /// root.
    pub fn names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if !self.name.is_empty() {
            out.push(self.name.as_str());
        }
        for child in &self.affiliations {
            out.extend(child.names());
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.affiliations.is_empty() && self.identities.is_empty()
    }
}

/// What the CA says about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, getset::Getters)]
#[getset(get = "pub")]
pub struct CaInfo {
    #[serde(rename = "CAName")]
    ca_name: String,
    /// Base64 of the PEM chain, as sent.
    #[serde(rename = "CAChain")]
    ca_chain: String,
    #[serde(rename = "Version", default)]
    version: Option<String>,
}

impl CaInfo {
    pub(crate) fn from_result(result: Map<String, Value>) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(result))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_from_json() {
        let identity = Identity::from_value(json!({
            "id": "alice",
            "type": "client",
            "affiliation": "org1",
            "attrs": [{"name": "hf.Revoker", "value": "true"}],
            "max_enrollments": -1,
            "caname": "ca-org1",
            "state": 0,
        }))
        .unwrap();
        assert_eq!(identity.enrollment_id(), "alice");
        assert_eq!(identity.identity_type(), "client");
        assert_eq!(identity.attr("hf.Revoker"), Some("true"));
        assert_eq!(identity.attr("hf.GenCRL"), None);
        assert_eq!(identity.max_enrollments(), &Some(-1));
        assert_eq!(identity.extra().get("state"), Some(&json!(0)));
        assert_eq!(identity.secret(), None);
        assert!(Identity::from_value(json!({"type": "client"})).is_err());
    }

    #[test]
    fn affiliation_tree() {
        let result = json!({
            "name": "org1",
            "affiliations": [
                {"name": "org1.department1", "affiliations": [{"name": "org1.department1.team1"}]},
                {"name": "org1.department2", "identities": [{"id": "bob", "type": "peer"}]},
            ],
            "statusCode": 200,
        });
        let tree = match result {
            Value::Object(map) => Affiliation::from_result(map).unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(tree.names(), vec!["org1", "org1.department1", "org1.department1.team1", "org1.department2"]);
        let dept2 = tree.find("org1.department2").unwrap();
        assert_eq!(dept2.identities()[0].enrollment_id(), "bob");
        assert!(tree.find("org2").is_none());
        assert!(Affiliation::default().is_empty());
    }
}
