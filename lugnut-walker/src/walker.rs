use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};
use url::Url;

use crate::browser::{Document, NodeRef, QueryScope};
use crate::detail::DetailFetcher;
use crate::error::{CrawlError, Result};
use crate::hierarchy::resolve_link;
use crate::record::{CategoryNode, PartLink};
use crate::selectors::SiteSelectors;

/// How a walker decides an expanded subtree has finished rendering.
///
/// The tree re-renders asynchronously after a toggle, so instead of sleeping
/// a fixed amount the walker polls the subtree's shape and moves on once two
/// consecutive polls agree.
#[derive(Debug, Clone, Copy)]
pub struct SettlePolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Depth-first walker for a click-to-expand category tree.
///
/// Each node goes through the same cycle: expand, read the name, collect the
/// node's own part links, fetch their detail pages, walk the children, then
/// collapse again so the sibling after it sees the tree exactly as this node
/// found it. Nothing in the cycle is fatal; whatever a node managed to
/// extract before an error is what it returns.
pub struct TreeWalker<'a> {
    doc: &'a dyn Document,
    fetcher: &'a DetailFetcher,
    selectors: &'a SiteSelectors,
    page_url: Url,
    settle: SettlePolicy,
    detail_workers: usize,
}

impl<'a> TreeWalker<'a> {
    pub fn new(
        doc: &'a dyn Document,
        fetcher: &'a DetailFetcher,
        selectors: &'a SiteSelectors,
        page_url: Url,
    ) -> Self {
        Self {
            doc,
            fetcher,
            selectors,
            page_url,
            settle: SettlePolicy::default(),
            detail_workers: 8,
        }
    }

    pub fn with_settle(mut self, settle: SettlePolicy) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_detail_workers(mut self, workers: usize) -> Self {
        self.detail_workers = workers.max(1);
        self
    }

    /// Walk every top-level node of the tree on the current page, in page
    /// order, one node at a time.
    pub async fn walk_page(&self) -> Result<Vec<CategoryNode>> {
        let roots = self
            .doc
            .query(QueryScope::Page, &self.selectors.tree_node)
            .await?;
        debug!("category tree has {} top-level nodes", roots.len());

        let mut nodes = Vec::with_capacity(roots.len());
        for root in &roots {
            nodes.push(self.walk(root).await);
        }
        Ok(nodes)
    }

    /// Walk a single node and everything under it.
    pub async fn walk(&self, node: &NodeRef) -> CategoryNode {
        self.walk_node(node, 0).await
    }

    async fn walk_node(&self, node: &NodeRef, depth: usize) -> CategoryNode {
        let expansion =
            match Expansion::open(self.doc, self.selectors, self.settle, node).await {
                Ok(expansion) => expansion,
                Err(e) => {
                    warn!("could not expand category node: {}", e);
                    return CategoryNode::new(String::new());
                }
            };

        let name = self.node_title(node).await;
        debug!("{}walking category '{}'", "  ".repeat(depth), name);
        let mut category = CategoryNode::new(name);

        category.links = self.direct_links(node).await;
        self.fetch_details(&mut category.links).await;

        // Children only after this node's own links are in, so a failure
        // below a child still leaves the node's direct results intact.
        match self
            .doc
            .query(QueryScope::Node(node), &self.selectors.tree_node)
            .await
        {
            Ok(children) => {
                for child in &children {
                    let walked = Box::pin(self.walk_node(child, depth + 1)).await;
                    category.subcategories.push(walked);
                }
            }
            Err(e) => warn!(
                "could not list child categories of '{}': {}",
                category.name, e
            ),
        }

        expansion.close().await;
        category
    }

    /// The node's display name, or an empty string when the title element is
    /// missing or unreadable. A nameless node is still worth walking.
    async fn node_title(&self, node: &NodeRef) -> String {
        let title = match self
            .doc
            .query(QueryScope::Node(node), &self.selectors.tree_title)
            .await
        {
            Ok(titles) => titles.into_iter().next(),
            Err(e) => {
                warn!("could not find category title: {}", e);
                None
            }
        };
        let Some(title) = title else {
            return String::new();
        };
        match self.doc.text(&title).await {
            Ok(Some(text)) => text.trim().to_string(),
            Ok(None) => String::new(),
            Err(e) => {
                warn!("could not read category title: {}", e);
                String::new()
            }
        }
    }

    async fn direct_links(&self, node: &NodeRef) -> Vec<PartLink> {
        let anchors = match self
            .doc
            .query(QueryScope::Node(node), &self.selectors.item_link)
            .await
        {
            Ok(anchors) => anchors,
            Err(e) => {
                warn!("could not list part links: {}", e);
                return Vec::new();
            }
        };

        let mut links = Vec::new();
        for anchor in &anchors {
            let href = match self.doc.attr(anchor, "href").await {
                Ok(Some(href)) => href,
                Ok(None) => continue,
                Err(e) => {
                    warn!("could not read part link target: {}", e);
                    continue;
                }
            };
            let Some(link) = resolve_link(&self.page_url, &href) else {
                continue;
            };
            let name = match self.doc.text(anchor).await {
                Ok(Some(text)) => text.trim().to_string(),
                _ => String::new(),
            };
            links.push(PartLink::new(name, link));
        }
        links
    }

    /// Fetch detail pages for every link, a bounded number in flight at
    /// once. Each result lands back at its link's index, so output order
    /// matches page order no matter which fetch finishes first. A failed
    /// fetch is logged and leaves that one link without details.
    async fn fetch_details(&self, links: &mut [PartLink]) {
        if links.is_empty() {
            return;
        }
        let targets: Vec<(usize, String)> = links
            .iter()
            .enumerate()
            .map(|(index, link)| (index, link.link.clone()))
            .collect();

        let mut outcomes = stream::iter(targets)
            .map(|(index, url)| async move { (index, self.fetcher.fetch(&url).await) })
            .buffer_unordered(self.detail_workers);

        while let Some((index, outcome)) = outcomes.next().await {
            match outcome {
                Ok(details) => links[index].parts = Some(details),
                Err(e) => warn!(
                    "detail fetch for '{}' ({}) failed: {}",
                    links[index].name, links[index].link, e
                ),
            }
        }
    }
}

/// Scope guard for one expanded tree node.
///
/// Opening clicks the node's toggle and waits for the subtree to settle;
/// closing clicks it again so the next sibling sees a collapsed tree. A
/// guard dropped without closing means the node was left open.
struct Expansion<'w> {
    doc: &'w dyn Document,
    selectors: &'w SiteSelectors,
    settle: SettlePolicy,
    node: NodeRef,
    toggle: NodeRef,
    closed: bool,
}

impl<'w> Expansion<'w> {
    async fn open(
        doc: &'w dyn Document,
        selectors: &'w SiteSelectors,
        settle: SettlePolicy,
        node: &NodeRef,
    ) -> Result<Expansion<'w>> {
        let toggles = doc
            .query(QueryScope::Node(node), &selectors.tree_toggle)
            .await?;
        let Some(toggle) = toggles.into_iter().next() else {
            return Err(CrawlError::ParseError(
                "category node has no toggle".to_string(),
            ));
        };
        doc.click(&toggle).await?;
        settle_subtree(doc, selectors, settle, node).await;
        Ok(Self {
            doc,
            selectors,
            settle,
            node: node.clone(),
            toggle,
            closed: false,
        })
    }

    async fn close(mut self) {
        self.closed = true;
        if let Err(e) = self.doc.click(&self.toggle).await {
            warn!("could not collapse category node: {}", e);
            return;
        }
        settle_subtree(self.doc, self.selectors, self.settle, &self.node).await;
    }
}

impl Drop for Expansion<'_> {
    fn drop(&mut self) {
        if !self.closed {
            warn!("category node was left expanded");
        }
    }
}

/// Poll the subtree until two consecutive polls see the same shape. Gives up
/// at the policy timeout and walks on with whatever is rendered.
async fn settle_subtree(
    doc: &dyn Document,
    selectors: &SiteSelectors,
    settle: SettlePolicy,
    node: &NodeRef,
) {
    let deadline = Instant::now() + settle.timeout;
    let mut last: Option<(usize, usize)> = None;
    loop {
        sleep(settle.poll_interval).await;
        let shape = subtree_shape(doc, selectors, node).await;
        if let Some(previous) = last
            && previous == shape
        {
            return;
        }
        if Instant::now() >= deadline {
            debug!("subtree never settled, continuing anyway");
            return;
        }
        last = Some(shape);
    }
}

async fn subtree_shape(
    doc: &dyn Document,
    selectors: &SiteSelectors,
    node: &NodeRef,
) -> (usize, usize) {
    let links = doc
        .query(QueryScope::Node(node), &selectors.item_link)
        .await
        .map(|nodes| nodes.len())
        .unwrap_or(0);
    let children = doc
        .query(QueryScope::Node(node), &selectors.tree_node)
        .await
        .map(|nodes| nodes.len())
        .unwrap_or(0);
    (links, children)
}
