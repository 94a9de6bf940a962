//! Annotation link reader.
//!
//! Recovers the URI targets of link annotations by walking the document's
//! object graph from the catalog: page-tree nodes lead to pages, pages to
//! their `/Annots`, annotations to their `/A` (or `/S`) action, and actions
//! to the `/URI` they carry (plus any `/Next` chained actions).
//!
//! The walk is an explicit work-list over typed [`Node`]s rather than
//! recursion. Every indirect object is dereferenced at most once, so
//! reference cycles and shared subgraphs cannot cause non-termination.

use std::collections::{BTreeSet, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::canonical::Canonicalizer;

/// A typed position in the object graph.
#[derive(Debug, Clone, Copy)]
enum Node<'a> {
    /// `/Pages` intermediate node or `/Page` leaf.
    PageTree(&'a Object),
    Annotation(&'a Object),
    Action(&'a Object),
}

/// Walks a loaded document and collects raw `/URI` strings.
struct AnnotationWalker<'a> {
    doc: &'a Document,
    visited: HashSet<ObjectId>,
    stack: Vec<Node<'a>>,
    raw_uris: Vec<String>,
}

impl<'a> AnnotationWalker<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            visited: HashSet::new(),
            stack: Vec::new(),
            raw_uris: Vec::new(),
        }
    }

    /// Follow references until a direct object. Returns `None` for dangling
    /// references and for references already visited.
    fn resolve(&mut self, mut obj: &'a Object) -> Option<&'a Object> {
        while let Object::Reference(id) = obj {
            if !self.visited.insert(*id) {
                return None;
            }
            obj = self.doc.get_object(*id).ok()?;
        }
        Some(obj)
    }

    fn resolve_dict(&mut self, obj: &'a Object) -> Option<&'a Dictionary> {
        match self.resolve(obj)? {
            Object::Dictionary(dict) => Some(dict),
            Object::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    /// Push every element of an array (or a single object) as `make(obj)`.
    fn push_all(&mut self, obj: &'a Object, make: fn(&'a Object) -> Node<'a>) {
        let Some(resolved) = self.resolve(obj) else {
            return;
        };
        match resolved {
            Object::Array(items) => {
                // Reverse so the work-list pops in document order.
                for item in items.iter().rev() {
                    self.stack.push(make(item));
                }
            }
            other => self.stack.push(make(other)),
        }
    }

    fn run(mut self, root: &'a Object) -> Vec<String> {
        self.stack.push(Node::PageTree(root));
        while let Some(node) = self.stack.pop() {
            match node {
                Node::PageTree(obj) => self.visit_page_tree(obj),
                Node::Annotation(obj) => self.visit_annotation(obj),
                Node::Action(obj) => self.visit_action(obj),
            }
        }
        self.raw_uris
    }

    fn visit_page_tree(&mut self, obj: &'a Object) {
        let Some(dict) = self.resolve_dict(obj) else {
            return;
        };
        if let Ok(kids) = dict.get(b"Kids") {
            self.push_all(kids, Node::PageTree);
        }
        if let Ok(annots) = dict.get(b"Annots") {
            self.push_all(annots, Node::Annotation);
        }
    }

    fn visit_annotation(&mut self, obj: &'a Object) {
        let Some(dict) = self.resolve_dict(obj) else {
            return;
        };
        let target = dict.get(b"A").or_else(|_| dict.get(b"S"));
        if let Ok(action) = target {
            self.stack.push(Node::Action(action));
        }
    }

    fn visit_action(&mut self, obj: &'a Object) {
        let Some(dict) = self.resolve_dict(obj) else {
            return;
        };
        if let Ok(uri) = dict.get(b"URI") {
            if let Some(text) = self.resolve(uri).and_then(decode_text) {
                self.raw_uris.push(text);
            }
        }
        if let Ok(next) = dict.get(b"Next") {
            self.push_all(next, Node::Action);
        }
    }
}

/// Decode a PDF text value. UTF-16BE when it carries a byte-order mark,
/// otherwise bytes are taken as (lossy) UTF-8.
fn decode_text(obj: &Object) -> Option<String> {
    let bytes = match obj {
        Object::String(bytes, _) => bytes,
        Object::Name(name) => name,
        _ => return None,
    };
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// Raw `/URI` strings reachable from the catalog's page tree, in walk order.
pub fn raw_annotation_uris(doc: &Document) -> Vec<String> {
    let Ok(root) = doc.trailer.get(b"Root") else {
        return Vec::new();
    };
    let mut walker = AnnotationWalker::new(doc);
    let pages = match walker.resolve_dict(root) {
        Some(catalog) => match catalog.get(b"Pages") {
            Ok(pages) => pages,
            Err(_) => return Vec::new(),
        },
        None => return Vec::new(),
    };
    walker.run(pages)
}

/// Canonicalized annotation URIs, deduplicated by equality.
///
/// Candidates that fail canonicalization are logged and dropped.
pub fn annotation_links(doc: &Document, canonicalizer: &Canonicalizer) -> BTreeSet<String> {
    let mut links = BTreeSet::new();
    for raw in raw_annotation_uris(doc) {
        match canonicalizer.canonicalize(&raw) {
            Ok(url) => {
                links.insert(url);
            }
            Err(e) => tracing::debug!(source = "annotation", "{}", e),
        }
    }
    links
}
