use async_trait::async_trait;

use crate::error::Result;

/// Opaque handle to an element living in the rendered page.
///
/// The driver that produced the handle is the only one that can interpret it,
/// so the walker passes these around without looking inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef(String);

impl NodeRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Where a selector query starts from.
#[derive(Debug, Clone, Copy)]
pub enum QueryScope<'a> {
    /// The whole document.
    Page,
    /// The subtree rooted at the given element, the element itself excluded.
    Node(&'a NodeRef),
}

/// A live, scriptable document inside the rendering engine.
///
/// Everything above this trait works against it, which keeps the catalog
/// logic testable without a browser on the other end.
#[async_trait]
pub trait Document: Send + Sync {
    /// Navigate the document and wait until the page content is ready.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Serialized markup of the current page.
    async fn html(&self) -> Result<String>;

    /// All elements matching `selector` inside `scope`, in document order.
    async fn query(&self, scope: QueryScope<'_>, selector: &str) -> Result<Vec<NodeRef>>;

    /// Text content of an element, `None` when the handle is stale.
    async fn text(&self, node: &NodeRef) -> Result<Option<String>>;

    /// Attribute value of an element, `None` when the attribute is missing.
    async fn attr(&self, node: &NodeRef, name: &str) -> Result<Option<String>>;

    /// Dispatch a click on an element.
    async fn click(&self, node: &NodeRef) -> Result<()>;
}

/// Factory for short-lived sessions with their own cookies and storage.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn isolated_session(&self) -> Result<Box<dyn IsolatedSession>>;
}

/// A document in its own private storage partition. Must be closed once done;
/// the partition and everything in it is discarded on close.
#[async_trait]
pub trait IsolatedSession: Document {
    async fn close(self: Box<Self>) -> Result<()>;
}
