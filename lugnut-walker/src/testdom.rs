//! Scripted in-memory catalog for tests.
//!
//! Models just enough of the real site to exercise the walker: pages with
//! static markup, a click-to-expand tree whose links and children only
//! render while their node is expanded, and per-URL failures and delays.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{Browser, Document, IsolatedSession, NodeRef, QueryScope};
use crate::error::{CrawlError, Result};
use crate::selectors::SiteSelectors;

/// One scripted tree node. Toggling tracks how often it was clicked so tests
/// can assert the expand/collapse discipline.
#[derive(Debug, Clone, Default)]
pub struct MockNode {
    pub title: Option<String>,
    pub has_toggle: bool,
    pub links: Vec<(String, String)>,
    pub children: Vec<MockNode>,
    pub expanded: bool,
    pub toggle_count: u32,
}

impl MockNode {
    pub fn new(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            has_toggle: true,
            ..Default::default()
        }
    }

    pub fn untitled() -> Self {
        Self {
            title: None,
            has_toggle: true,
            ..Default::default()
        }
    }

    pub fn without_toggle(mut self) -> Self {
        self.has_toggle = false;
        self
    }

    pub fn with_link(mut self, name: &str, href: &str) -> Self {
        self.links.push((name.to_string(), href.to_string()));
        self
    }

    pub fn with_child(mut self, child: MockNode) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Clone, Default)]
struct PageFixture {
    html: String,
    tree: Vec<MockNode>,
}

#[derive(Default)]
struct WorldState {
    pages: HashMap<String, PageFixture>,
    failing_urls: HashSet<String>,
    delays: HashMap<String, Duration>,
    sessions_opened: u32,
    sessions_closed: u32,
}

/// Shared world behind every mock document and session.
#[derive(Clone, Default)]
pub struct MockCatalog {
    state: Arc<Mutex<WorldState>>,
    selectors: SiteSelectors,
}

enum SelectorKind {
    TreeNode,
    TreeToggle,
    TreeTitle,
    ItemLink,
    Other,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, url: &str, html: &str) {
        self.state.lock().unwrap().pages.insert(
            url.to_string(),
            PageFixture {
                html: html.to_string(),
                tree: Vec::new(),
            },
        );
    }

    pub fn add_tree_page(&self, url: &str, tree: Vec<MockNode>) {
        self.state.lock().unwrap().pages.insert(
            url.to_string(),
            PageFixture {
                html: String::new(),
                tree,
            },
        );
    }

    pub fn fail_url(&self, url: &str) {
        self.state.lock().unwrap().failing_urls.insert(url.to_string());
    }

    pub fn delay_url(&self, url: &str, delay: Duration) {
        self.state.lock().unwrap().delays.insert(url.to_string(), delay);
    }

    pub fn document(&self) -> MockDocument {
        MockDocument {
            catalog: self.clone(),
            current: Mutex::new(String::new()),
        }
    }

    pub fn browser(&self) -> Arc<dyn Browser> {
        Arc::new(MockBrowser {
            catalog: self.clone(),
        })
    }

    /// (opened, closed) isolated session counts.
    pub fn sessions(&self) -> (u32, u32) {
        let state = self.state.lock().unwrap();
        (state.sessions_opened, state.sessions_closed)
    }

    /// Toggle counts for the tree at `url`, flattened depth-first.
    pub fn toggle_counts(&self, url: &str) -> Vec<u32> {
        let state = self.state.lock().unwrap();
        let mut counts = Vec::new();
        if let Some(page) = state.pages.get(url) {
            flatten(&page.tree, &mut |node| counts.push(node.toggle_count));
        }
        counts
    }

    pub fn all_collapsed(&self, url: &str) -> bool {
        let state = self.state.lock().unwrap();
        let mut collapsed = true;
        if let Some(page) = state.pages.get(url) {
            flatten(&page.tree, &mut |node| collapsed &= !node.expanded);
        }
        collapsed
    }

    fn classify(&self, selector: &str) -> SelectorKind {
        if selector == self.selectors.tree_node {
            SelectorKind::TreeNode
        } else if selector == self.selectors.tree_toggle {
            SelectorKind::TreeToggle
        } else if selector == self.selectors.tree_title {
            SelectorKind::TreeTitle
        } else if selector == self.selectors.item_link {
            SelectorKind::ItemLink
        } else {
            SelectorKind::Other
        }
    }
}

fn flatten(tree: &[MockNode], visit: &mut impl FnMut(&MockNode)) {
    for node in tree {
        visit(node);
        flatten(&node.children, visit);
    }
}

fn join_path(path: &[usize]) -> String {
    path.iter()
        .map(|index| index.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

fn parse_path(raw: &str) -> Vec<usize> {
    raw.split('.').filter_map(|part| part.parse().ok()).collect()
}

fn node_at<'t>(tree: &'t [MockNode], path: &[usize]) -> Option<&'t MockNode> {
    let (&first, rest) = path.split_first()?;
    let mut node = tree.get(first)?;
    for &index in rest {
        node = node.children.get(index)?;
    }
    Some(node)
}

fn node_at_mut<'t>(tree: &'t mut [MockNode], path: &[usize]) -> Option<&'t mut MockNode> {
    let (&first, rest) = path.split_first()?;
    let mut node = tree.get_mut(first)?;
    for &index in rest {
        node = node.children.get_mut(index)?;
    }
    Some(node)
}

/// Rendered tree nodes strictly inside `node`, depth-first. Collapsed nodes
/// render nothing inside themselves, like the real tree.
fn collect_nodes(node: &MockNode, path: &mut Vec<usize>, out: &mut Vec<NodeRef>) {
    if !node.expanded {
        return;
    }
    for (index, child) in node.children.iter().enumerate() {
        path.push(index);
        out.push(NodeRef::new(format!("n:{}", join_path(path))));
        collect_nodes(child, path, out);
        path.pop();
    }
}

/// Rendered part links inside `node`, depth-first.
fn collect_links(node: &MockNode, path: &mut Vec<usize>, out: &mut Vec<NodeRef>) {
    if !node.expanded {
        return;
    }
    let here = join_path(path);
    for index in 0..node.links.len() {
        out.push(NodeRef::new(format!("l:{here}:{index}")));
    }
    for (index, child) in node.children.iter().enumerate() {
        path.push(index);
        collect_links(child, path, out);
        path.pop();
    }
}

pub struct MockDocument {
    catalog: MockCatalog,
    current: Mutex<String>,
}

impl MockDocument {
    fn current_url(&self) -> String {
        self.current.lock().unwrap().clone()
    }
}

#[async_trait]
impl Document for MockDocument {
    async fn navigate(&self, url: &str) -> Result<()> {
        let (delay, failing) = {
            let state = self.catalog.state.lock().unwrap();
            (
                state.delays.get(url).copied(),
                state.failing_urls.contains(url),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(CrawlError::Other(format!(
                "mock navigation to {url} refused"
            )));
        }
        *self.current.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn html(&self) -> Result<String> {
        let current = self.current_url();
        let state = self.catalog.state.lock().unwrap();
        Ok(state
            .pages
            .get(&current)
            .map(|page| page.html.clone())
            .unwrap_or_default())
    }

    async fn query(&self, scope: QueryScope<'_>, selector: &str) -> Result<Vec<NodeRef>> {
        let current = self.current_url();
        let state = self.catalog.state.lock().unwrap();
        let Some(page) = state.pages.get(&current) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        match scope {
            QueryScope::Page => {
                if let SelectorKind::TreeNode = self.catalog.classify(selector) {
                    for (index, root) in page.tree.iter().enumerate() {
                        let mut path = vec![index];
                        out.push(NodeRef::new(format!("n:{}", join_path(&path))));
                        collect_nodes(root, &mut path, &mut out);
                    }
                }
            }
            QueryScope::Node(node) => {
                let Some(raw) = node.id().strip_prefix("n:") else {
                    return Ok(Vec::new());
                };
                let mut path = parse_path(raw);
                let Some(target) = node_at(&page.tree, &path) else {
                    return Ok(Vec::new());
                };
                match self.catalog.classify(selector) {
                    SelectorKind::TreeNode => collect_nodes(target, &mut path, &mut out),
                    SelectorKind::ItemLink => collect_links(target, &mut path, &mut out),
                    SelectorKind::TreeToggle => {
                        if target.has_toggle {
                            out.push(NodeRef::new(format!("t:{}", join_path(&path))));
                        }
                    }
                    SelectorKind::TreeTitle => {
                        if target.title.is_some() {
                            out.push(NodeRef::new(format!("g:{}", join_path(&path))));
                        }
                    }
                    SelectorKind::Other => {}
                }
            }
        }
        Ok(out)
    }

    async fn text(&self, node: &NodeRef) -> Result<Option<String>> {
        let current = self.current_url();
        let state = self.catalog.state.lock().unwrap();
        let Some(page) = state.pages.get(&current) else {
            return Ok(None);
        };

        let id = node.id();
        if let Some(raw) = id.strip_prefix("g:") {
            return Ok(node_at(&page.tree, &parse_path(raw)).and_then(|n| n.title.clone()));
        }
        if let Some(raw) = id.strip_prefix("l:")
            && let Some((path, index)) = parse_link_ref(raw)
        {
            return Ok(node_at(&page.tree, &path)
                .and_then(|n| n.links.get(index))
                .map(|(name, _)| name.clone()));
        }
        Ok(None)
    }

    async fn attr(&self, node: &NodeRef, name: &str) -> Result<Option<String>> {
        if name != "href" {
            return Ok(None);
        }
        let current = self.current_url();
        let state = self.catalog.state.lock().unwrap();
        let Some(page) = state.pages.get(&current) else {
            return Ok(None);
        };
        if let Some(raw) = node.id().strip_prefix("l:")
            && let Some((path, index)) = parse_link_ref(raw)
        {
            return Ok(node_at(&page.tree, &path)
                .and_then(|n| n.links.get(index))
                .map(|(_, href)| href.clone()));
        }
        Ok(None)
    }

    async fn click(&self, node: &NodeRef) -> Result<()> {
        let Some(raw) = node.id().strip_prefix("t:") else {
            return Ok(());
        };
        let path = parse_path(raw);
        let current = self.current_url();
        let mut state = self.catalog.state.lock().unwrap();
        let Some(page) = state.pages.get_mut(&current) else {
            return Err(CrawlError::Other("no page loaded".to_string()));
        };
        match node_at_mut(&mut page.tree, &path) {
            Some(target) => {
                target.expanded = !target.expanded;
                target.toggle_count += 1;
                Ok(())
            }
            None => Err(CrawlError::Other("stale element handle".to_string())),
        }
    }
}

fn parse_link_ref(raw: &str) -> Option<(Vec<usize>, usize)> {
    let (path, index) = raw.rsplit_once(':')?;
    Some((parse_path(path), index.parse().ok()?))
}

struct MockBrowser {
    catalog: MockCatalog,
}

#[async_trait]
impl Browser for MockBrowser {
    async fn isolated_session(&self) -> Result<Box<dyn IsolatedSession>> {
        self.catalog.state.lock().unwrap().sessions_opened += 1;
        Ok(Box::new(MockSession {
            doc: self.catalog.document(),
        }))
    }
}

struct MockSession {
    doc: MockDocument,
}

#[async_trait]
impl Document for MockSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.doc.navigate(url).await
    }

    async fn html(&self) -> Result<String> {
        self.doc.html().await
    }

    async fn query(&self, scope: QueryScope<'_>, selector: &str) -> Result<Vec<NodeRef>> {
        self.doc.query(scope, selector).await
    }

    async fn text(&self, node: &NodeRef) -> Result<Option<String>> {
        self.doc.text(node).await
    }

    async fn attr(&self, node: &NodeRef, name: &str) -> Result<Option<String>> {
        self.doc.attr(node, name).await
    }

    async fn click(&self, node: &NodeRef) -> Result<()> {
        self.doc.click(node).await
    }
}

#[async_trait]
impl IsolatedSession for MockSession {
    async fn close(self: Box<Self>) -> Result<()> {
        self.doc.catalog.state.lock().unwrap().sessions_closed += 1;
        Ok(())
    }
}

/// Markup for one part page with a single offer block, in the shape the
/// default selector table expects.
pub fn detail_html(name: Option<&str>, parameters: &[(Option<&str>, Option<&str>)]) -> String {
    let mut html = String::from(r#"<div class="MobileTable__items___19_GW">"#);
    if let Some(name) = name {
        html.push_str(&format!(
            r#"<div class="CatalogMobileTable__name___3grBb"><span class="CatalogMobileTable__value___2lue8">{name}</span></div>"#
        ));
    }
    html.push_str(r#"<ul class="NonOriginalPartsTable__parameters___z8AHR">"#);
    for (key, value) in parameters {
        html.push_str("<li>");
        if let Some(key) = key {
            html.push_str(&format!(r#"<span class="tcTxt">{key}</span>"#));
        }
        if let Some(value) = value {
            html.push_str(&format!(r#"<span class="tcVal">{value}</span>"#));
        }
        html.push_str("</li>");
    }
    html.push_str("</ul></div>");
    html
}
