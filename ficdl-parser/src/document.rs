use {
    html5ever::{
        driver::ParseOpts,
        parse_document,
        serialize::{self, TraversalScope},
        tendril::TendrilSink,
        tree_builder::TreeBuilderOpts,
    },
    markup5ever_arcdom::{ArcDom, Handle, NodeData, SerializableHandle},
    std::{convert::TryFrom, sync::Arc},
};

use crate::selector::{get_attr, Selector};

/// A parsed markup document.
///
/// This type exists to be an interface between the HTML parsing code and the
/// rest of ficdl, allowing behind-the-scene changes.
pub struct Document {
    dom: ArcDom,
}

fn default_parse_opts() -> ParseOpts {
    ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    }
}

impl TryFrom<&str> for Document {
    type Error = ficdl_common::Report;

    fn try_from(input: &str) -> Result<Self, Self::Error> {
        let dom = parse_document(ArcDom::default(), default_parse_opts())
            .from_utf8()
            .read_from(&mut input.as_bytes())?;

        Ok(Self { dom })
    }
}

impl Document {
    /// Attempts to parse the given markup.
    ///
    /// The parser repairs incomplete markup the way browsers do, so a
    /// well-formed result always carries `html`, `head` and `body` elements.
    pub fn parse(input: &str) -> Result<Self, ficdl_common::Report> {
        Self::try_from(input)
    }

    /// All elements matching the query, in document order.
    ///
    /// An empty, malformed or unmatched query yields no elements, never an
    /// error.
    pub fn select(&self, query: &str) -> Vec<Element> {
        match Selector::parse(query) {
            Some(sel) => {
                let roots: Vec<_> = self
                    .dom
                    .document
                    .children
                    .borrow()
                    .iter()
                    .map(Arc::clone)
                    .collect();

                sel.find(roots).iter().map(Element::from).collect()
            }
            None => Vec::new(),
        }
    }

    /// The first element matching the query, if any.
    pub fn select_first(&self, query: &str) -> Option<Element> {
        self.select(query).into_iter().next()
    }

    /// The `<head>` element.
    pub fn head(&self) -> Option<Element> {
        self.named_root_child("head")
    }

    /// The `<body>` element.
    pub fn body(&self) -> Option<Element> {
        self.named_root_child("body")
    }

    /// Serialization of the whole document.
    pub fn html(&self) -> String {
        serialize_handle(&self.dom.document, TraversalScope::ChildrenOnly(None))
    }

    /// All text in the document, in document order.
    pub fn full_text(&self) -> String {
        let mut text = String::new();
        collect_text(&self.dom.document, &mut text);
        text
    }

    fn named_root_child(&self, name: &str) -> Option<Element> {
        let document = self.dom.document.children.borrow();
        let html = document.iter().find(|node| element_name_is(node, "html"))?;

        let children = html.children.borrow();
        children
            .iter()
            .find(|node| element_name_is(node, name))
            .map(Element::from)
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.html() == other.html()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document").field("html", &self.html()).finish()
    }
}

/// A single element of a document.
///
/// Equality compares the serialized markup of both sides, not node identity.
#[derive(Clone)]
pub struct Element {
    handle: Handle,
}

impl From<Handle> for Element {
    fn from(handle: Handle) -> Self {
        Self::from(&handle)
    }
}

impl From<&Handle> for Element {
    fn from(handle: &Handle) -> Self {
        Element {
            handle: Arc::clone(handle),
        }
    }
}

impl Element {
    /// All matching elements below this one, in document order.
    pub fn select(&self, query: &str) -> Vec<Element> {
        match Selector::parse(query) {
            Some(sel) => {
                let roots: Vec<_> = self.handle.children.borrow().iter().map(Arc::clone).collect();

                sel.find(roots).iter().map(Element::from).collect()
            }
            None => Vec::new(),
        }
    }

    /// The first matching element below this one, if any.
    pub fn select_first(&self, query: &str) -> Option<Element> {
        self.select(query).into_iter().next()
    }

    /// Whether the attribute is declared on this element.
    ///
    /// The key is case-insensitive.
    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// The value of the attribute, if declared.
    ///
    /// The key is case-insensitive; when an attribute is declared several
    /// times, the last declaration wins.
    pub fn attr(&self, name: &str) -> Option<String> {
        match self.handle.data {
            NodeData::Element { ref attrs, .. } => get_attr(&attrs.borrow(), name),
            _ => None,
        }
    }

    /// The tag name of this element.
    pub fn name(&self) -> Option<String> {
        match self.handle.data {
            NodeData::Element { ref name, .. } => Some(name.local.to_string()),
            _ => None,
        }
    }

    /// All text within this element and its descendants, in document order.
    pub fn full_text(&self) -> String {
        let mut text = String::new();
        collect_text(&self.handle, &mut text);
        text
    }

    /// The text directly owned by this element, excluding descendants.
    ///
    /// Equals `full_text` when the element has no element children.
    pub fn own_text(&self) -> String {
        let mut text = String::new();
        for child in self.handle.children.borrow().iter() {
            if let NodeData::Text { ref contents } = child.data {
                text.push_str(&contents.borrow());
            }
        }
        text
    }

    /// The encompassing markup of this element.
    pub fn html(&self) -> String {
        serialize_handle(&self.handle, TraversalScope::IncludeNode)
    }

    /// The markup inside this element.
    pub fn inner_html(&self) -> String {
        serialize_handle(&self.handle, TraversalScope::ChildrenOnly(None))
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.html() == other.html()
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element").field("html", &self.html()).finish()
    }
}

fn element_name_is(node: &Handle, expected: &str) -> bool {
    match node.data {
        NodeData::Element { ref name, .. } => name.local.as_ref() == expected,
        _ => false,
    }
}

fn serialize_handle(handle: &Handle, scope: TraversalScope) -> String {
    let mut buf = Vec::new();

    let res = serialize::serialize(
        &mut buf,
        &SerializableHandle::from(Arc::clone(handle)),
        serialize::SerializeOpts {
            traversal_scope: scope,
            scripting_enabled: false,
            ..Default::default()
        },
    );

    match res {
        Ok(()) => String::from_utf8(buf).unwrap_or_default(),
        Err(_) => String::new(),
    }
}

fn collect_text(node: &Handle, out: &mut String) {
    for child in node.children.borrow().iter() {
        match child.data {
            NodeData::Text { ref contents } => out.push_str(&contents.borrow()),
            _ => collect_text(child, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use {
        markup5ever::{Attribute, LocalName, Namespace, QualName},
        markup5ever_arcdom::Node,
        std::cell::RefCell,
    };

    fn doc(input: &str) -> Document {
        Document::parse(input).expect("markup should parse")
    }

    #[test]
    fn select_returns_matches_in_document_order() {
        let doc = doc(
            "<html><body>\
             <div class=\"a\"><p>one</p><div class=\"a\"><p>two</p></div></div>\
             <p>three</p>\
             </body></html>",
        );

        let texts: Vec<_> = doc.select("p").iter().map(|p| p.full_text()).collect();

        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn select_reports_nested_matches_independently() {
        let doc = doc("<div class=\"a\"><div class=\"a\"></div></div>");

        assert_eq!(doc.select("div.a").len(), 2);
    }

    #[test]
    fn select_with_child_combinator() {
        let doc = doc(
            "<div id=\"outer\"><span>direct</span>\
             <div><span>nested</span></div></div>",
        );

        let direct = doc.select("div#outer > span");

        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].full_text(), "direct");
    }

    #[test]
    fn select_with_sibling_combinator() {
        let doc = doc(
            "<body><img align=\"absmiddle\">ignored text\
             <a href=\"/crossover\">Crossover</a><a href=\"/other\">Other</a></body>",
        );

        let link = doc.select_first("img[align=\"absmiddle\"]+a");

        assert_eq!(
            link.and_then(|l| l.attr("href")),
            Some("/crossover".to_string())
        );
    }

    #[test]
    fn malformed_unmatched_and_empty_queries_are_no_match() {
        let doc = doc("<div><p>text</p></div>");

        assert!(doc.select("").is_empty());
        assert!(doc.select("a[href").is_empty());
        assert!(doc.select("span").is_empty());
        assert_eq!(doc.select_first(""), None);
        assert_eq!(doc.select_first("a[href"), None);
        assert_eq!(doc.select_first("span"), None);
    }

    #[test]
    fn head_and_body_are_synthesized_when_absent() {
        let doc = doc("<p>bare fragment</p>");

        assert!(doc.head().is_some());
        let body = doc.body().expect("body should be synthesized");
        assert_eq!(body.full_text(), "bare fragment");
    }

    #[test]
    fn attr_key_lookup_is_case_insensitive() {
        let doc = doc("<div ID=\"story\" Data-Kind=\"fic\"></div>");
        let div = doc.select_first("div").expect("div should match");

        // The parser lowercases declared names; lookup must not care either way.
        assert_eq!(div.attr("id"), Some("story".to_string()));
        assert_eq!(div.attr("ID"), Some("story".to_string()));
        assert_eq!(div.attr("data-kind"), Some("fic".to_string()));
        assert!(div.has_attr("DATA-KIND"));
        assert!(!div.has_attr("class"));
    }

    #[test]
    fn attr_last_declaration_wins() {
        // The tree builder refuses duplicate declarations, so build the node
        // by hand the way a permissive parser would keep them.
        let attr = |key: &str, value: &str| Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(key)),
            value: value.into(),
        };
        let node = Node::new(NodeData::Element {
            name: QualName::new(
                None,
                Namespace::from("http://www.w3.org/1999/xhtml"),
                LocalName::from("div"),
            ),
            attrs: RefCell::new(vec![attr("id", "a"), attr("ID", "b")]),
            template_contents: None,
            mathml_annotation_xml_integration_point: false,
        });

        let element = Element::from(node);

        assert_eq!(element.attr("id"), Some("b".to_string()));
    }

    #[test]
    fn full_text_and_own_text() {
        let doc = doc("<div>own <span>nested</span> tail</div>");
        let div = doc.select_first("div").expect("div should match");

        assert_eq!(div.full_text(), "own nested tail");
        assert_eq!(div.own_text(), "own  tail");

        let span = doc.select_first("span").expect("span should match");
        assert_eq!(span.full_text(), span.own_text());
    }

    #[test]
    fn document_full_text_spans_head_and_body() {
        let doc = doc(
            "<html><head><title>t</title></head>\
             <body><p>one</p><div>two</div></body></html>",
        );

        assert_eq!(doc.full_text(), "tonetwo");
    }

    #[test]
    fn full_text_is_empty_without_text() {
        let doc = doc("<div><img src=\"x\"></div>");
        let div = doc.select_first("div").expect("div should match");

        assert_eq!(div.full_text(), "");
    }

    #[test]
    fn inner_and_outer_html() {
        let doc = doc("<div><p>Text</p></div>");
        let div = doc.select_first("div").expect("div should match");

        assert_eq!(div.html(), "<div><p>Text</p></div>");
        assert_eq!(div.inner_html(), "<p>Text</p>");

        let p = doc.select_first("p").expect("p should match");
        assert_eq!(p.inner_html(), "Text");
    }

    #[test]
    fn element_round_trips_through_serialization() {
        let doc = doc("<div class=\"a\"><p>Text <b>bold</b></p></div>");
        let div = doc.select_first("div.a").expect("div should match");

        let reparsed = Document::parse(&div.html()).expect("serialized markup should parse");
        let again = reparsed.select_first("div.a").expect("div should match again");

        assert_eq!(again, div);
    }

    #[test]
    fn document_round_trips_through_serialization() {
        let original = doc("<html><head><title>t</title></head><body><p>x</p></body></html>");
        let reparsed = Document::parse(&original.html()).expect("should reparse");

        assert_eq!(reparsed, original);
    }

    #[test]
    fn equality_is_content_based() {
        let left = doc("<div><p>same</p></div>");
        let right = doc("<div><p>same</p></div>");
        let other = doc("<div><p>different</p></div>");

        assert_eq!(
            left.select_first("div").expect("div"),
            right.select_first("div").expect("div"),
        );
        assert_ne!(
            left.select_first("div").expect("div"),
            other.select_first("div").expect("div"),
        );
    }
}
