use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A named link scraped out of an index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedLink {
    pub name: String,
    pub link: String,
}

impl NamedLink {
    pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: link.into(),
        }
    }
}

/// Everything crawled for one brand. Model names map in page order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandRecord {
    pub link: String,
    pub models: IndexMap<String, ModelRecord>,
}

impl BrandRecord {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            models: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub link: String,
    pub submodels: Vec<SubmodelRecord>,
}

impl ModelRecord {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            submodels: Vec::new(),
        }
    }
}

/// One submodel row. The site's spec table is free-form, so its label/value
/// pairs flatten straight into the record next to `link` and `parts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmodelRecord {
    #[serde(flatten)]
    pub fields: IndexMap<String, String>,
    pub link: String,
    pub parts: Vec<CategoryNode>,
}

impl SubmodelRecord {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            fields: IndexMap::new(),
            link: link.into(),
            parts: Vec::new(),
        }
    }
}

/// One node of the click-to-expand category tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub name: String,
    pub links: Vec<PartLink>,
    pub subcategories: Vec<CategoryNode>,
}

impl CategoryNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            links: Vec::new(),
            subcategories: Vec::new(),
        }
    }
}

/// A part page linked directly under a category node.
///
/// `parts` stays absent when the detail fetch for this link failed, so a
/// partially crawled tree is distinguishable from a part with no offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartLink {
    pub name: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<PartDetail>>,
}

impl PartLink {
    pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: link.into(),
            parts: None,
        }
    }
}

/// One offer block on a part page. Missing markup reads as explicit nulls,
/// exactly as the page showed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartDetail {
    pub name: Option<String>,
    pub parameters: Vec<PartParameter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartParameter {
    pub key: Option<String>,
    pub value: Option<String>,
}
