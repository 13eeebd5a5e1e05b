use std::path::Path;

use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};

use crate::error::{CrawlError, Result};

/// CSS selectors for every piece of the catalog site we touch.
///
/// The defaults match the storefront's current class names. Sites like this
/// rebuild their CSS module hashes on deploy, so the whole table can be
/// swapped out from a JSON file without recompiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSelectors {
    /// Brand links on the catalog landing page.
    pub brand_link: String,
    /// Model links on a brand page.
    pub model_link: String,
    /// One submodel row in the mobile table.
    pub submodel_row: String,
    /// Label/value cell inside a submodel row.
    pub submodel_item: String,
    pub submodel_item_title: String,
    pub submodel_item_value: String,
    /// Arrow icon whose enclosing anchor carries the submodel link.
    pub submodel_link_marker: String,
    /// One node of the category tree.
    pub tree_node: String,
    /// The clickable label that expands and collapses a node.
    pub tree_toggle: String,
    /// The node's display name.
    pub tree_title: String,
    /// Part links inside an expanded node.
    pub item_link: String,
    /// One offer block on a part page.
    pub detail_block: String,
    pub detail_name: String,
    /// Parameter rows inside an offer block.
    pub parameter_item: String,
    pub parameter_key: String,
    pub parameter_value: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            brand_link: ".AlphabetList__content___2spqv a".to_string(),
            model_link: ".AlphabetList__content___2spqv a".to_string(),
            submodel_row: ".MobileTable__items___19_GW".to_string(),
            submodel_item: ".MobileTable__item___318Jx".to_string(),
            submodel_item_title: ".MobileTable__itemTitle___11AHD".to_string(),
            submodel_item_value: ".MobileTable__itemValue___hcia7".to_string(),
            submodel_link_marker: ".MobileTable__arrowIcon___1mNw2".to_string(),
            tree_node: ".TreeNode__wrapper___8AFSc".to_string(),
            tree_toggle: ".TreeNode__label___28j8R".to_string(),
            tree_title: ".TreeNode__title___2rsvp".to_string(),
            item_link: ".ItemLink__itemLink___2g1RR".to_string(),
            detail_block: ".MobileTable__items___19_GW".to_string(),
            detail_name: ".CatalogMobileTable__name___3grBb > .CatalogMobileTable__value___2lue8"
                .to_string(),
            parameter_item: ".NonOriginalPartsTable__parameters___z8AHR li".to_string(),
            parameter_key: ".tcTxt".to_string(),
            parameter_value: ".tcVal".to_string(),
        }
    }
}

impl SiteSelectors {
    /// Load a selector table from a JSON file. Missing keys fall back to the
    /// built-in defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Compile a CSS selector, surfacing the selector text on failure.
pub(crate) fn parse(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| CrawlError::ParseError(format!("bad selector '{selector}': {e}")))
}

/// Collapse an element's text nodes into one trimmed string.
pub(crate) fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}
