// Selector engine modeled on crabquery, reduced to the subset of CSS the
// site adapters actually use.

use {
    markup5ever::{Attribute, QualName},
    markup5ever_arcdom::{Handle, NodeData},
    std::sync::Arc,
};

/// Returns the value of the attribute `name`, if declared.
///
/// The key lookup is case-insensitive and the last declaration wins.
pub(crate) fn get_attr(attrs: &[Attribute], name: &str) -> Option<String> {
    attrs
        .iter()
        .filter(|attr| attr.name.local.as_ref().eq_ignore_ascii_case(name))
        .last()
        .map(|attr| attr.value.to_string())
}

#[derive(Debug, PartialEq, Clone)]
enum AttributeSpec {
    Present,
    Exact(String),
    Starts(String),
    Ends(String),
    Contains(String),
}

impl AttributeSpec {
    fn matches(&self, other: &str) -> bool {
        use AttributeSpec::*;

        match self {
            Present => true,
            Exact(v) => other == v,
            Starts(v) => other.starts_with(v),
            Ends(v) => other.ends_with(v),
            Contains(v) => other.contains(v),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
struct Matcher {
    tag: Vec<String>,
    class: Vec<String>,
    id: Vec<String>,
    attribute: Vec<(String, AttributeSpec)>,
}

impl Matcher {
    /// Parses one compound selector (`tag#id.class[attr=value]`).
    ///
    /// Returns `None` when the compound is malformed; an unmatched query
    /// must read as "no match", never as an error.
    fn parse(input: &str) -> Option<Self> {
        let mut res = Self::default();
        let mut buf = String::new();
        let mut kind = Segment::Tag;
        let mut chars = input.chars();

        while let Some(c) = chars.next() {
            match c {
                '#' | '.' => {
                    res.push_segment(kind, &buf)?;
                    buf.clear();
                    kind = if c == '#' { Segment::Id } else { Segment::Class };
                }
                '[' => {
                    res.push_segment(kind, &buf)?;
                    buf.clear();
                    kind = Segment::Tag;

                    let mut spec = String::new();
                    let mut closed = false;
                    let mut in_quotes = false;
                    for c in chars.by_ref() {
                        match c {
                            '"' | '\'' => in_quotes = !in_quotes,
                            ']' if !in_quotes => {
                                closed = true;
                                break;
                            }
                            _ => {}
                        }
                        spec.push(c);
                    }
                    if !closed {
                        return None;
                    }
                    res.add_attribute(&spec)?;
                }
                _ => buf.push(c),
            }
        }
        res.push_segment(kind, &buf)?;

        if res == Self::default() {
            return None;
        }

        Some(res)
    }

    fn push_segment(&mut self, kind: Segment, buf: &str) -> Option<()> {
        match kind {
            // A bare tag segment may legitimately be empty (`.class`, `#id`).
            Segment::Tag => {
                if !buf.is_empty() {
                    self.tag.push(buf.to_string());
                }
            }
            Segment::Id => {
                if buf.is_empty() {
                    return None;
                }
                self.id.push(buf.to_string());
            }
            Segment::Class => {
                if buf.is_empty() {
                    return None;
                }
                self.class.push(buf.to_string());
            }
        }
        Some(())
    }

    fn add_attribute(&mut self, spec: &str) -> Option<()> {
        use AttributeSpec::*;

        let spec = spec.trim();
        match spec.split_once('=') {
            None => {
                if spec.is_empty() {
                    return None;
                }
                self.attribute.push((spec.to_string(), Present));
            }
            Some((key, value)) => {
                let value = value.trim_matches(|c| c == '"' || c == '\'').to_string();
                let (key, spec) = match key.chars().last()? {
                    '^' => (&key[..key.len() - 1], Starts(value)),
                    '$' => (&key[..key.len() - 1], Ends(value)),
                    '*' => (&key[..key.len() - 1], Contains(value)),
                    _ => (key, Exact(value)),
                };
                if key.is_empty() {
                    return None;
                }
                self.attribute.push((key.to_string(), spec));
            }
        }

        Some(())
    }

    fn matches(&self, name: &QualName, attrs: &[Attribute]) -> bool {
        let mut id_match = self.id.is_empty();
        if let Some(el_id) = get_attr(attrs, "id") {
            let el_ids: Vec<_> = el_id.split_whitespace().collect();
            id_match = self.id.iter().all(|id| el_ids.iter().any(|eid| eid == id));
        }

        let mut class_match = self.class.is_empty();
        if let Some(el_class) = get_attr(attrs, "class") {
            let el_classes: Vec<_> = el_class.split_whitespace().collect();

            class_match = self
                .class
                .iter()
                .all(|class| el_classes.iter().any(|eclass| eclass == class));
        }

        let mut attr_match = true;
        for (k, v) in &self.attribute {
            match get_attr(attrs, k) {
                Some(value) if v.matches(&value) => {}
                _ => {
                    attr_match = false;
                    break;
                }
            }
        }

        let name = name.local.to_string();
        let tag_match = self.tag.is_empty() || self.tag.iter().any(|tag| &name == tag);

        tag_match && id_match && class_match && attr_match
    }
}

#[derive(Debug, Clone, Copy)]
enum Segment {
    Tag,
    Id,
    Class,
}

#[derive(Debug, PartialEq, Clone, Copy)]
enum Combinator {
    Descendant,
    Child,
    Sibling,
}

#[derive(Debug, PartialEq)]
pub struct Selector {
    steps: Vec<(Combinator, Matcher)>,
}

impl Selector {
    /// Parses a selector, returning `None` for empty or malformed input.
    pub fn parse(input: &str) -> Option<Self> {
        let mut steps = Vec::new();
        let mut pending: Option<Combinator> = None;

        for token in lex(input)? {
            match token {
                Token::Combinator(comb) => {
                    // Two combinators in a row is malformed, as is a leading one.
                    if pending.is_some() || steps.is_empty() {
                        return None;
                    }
                    pending = Some(comb);
                }
                Token::Compound(compound) => {
                    let matcher = Matcher::parse(&compound)?;
                    steps.push((pending.take().unwrap_or(Combinator::Descendant), matcher));
                }
            }
        }

        // A trailing combinator has no right-hand side.
        if pending.is_some() || steps.is_empty() {
            return None;
        }

        Some(Self { steps })
    }

    /// Runs the selector over the subtrees rooted at `roots`.
    ///
    /// The roots themselves are candidates for the first step; later steps
    /// only consider strict descendants, children or siblings.
    pub(crate) fn find(&self, roots: Vec<Handle>) -> Vec<Handle> {
        let mut current = roots;

        for (idx, (combinator, matcher)) in self.steps.iter().enumerate() {
            let mut next = Vec::new();

            for el in &current {
                match combinator {
                    Combinator::Descendant if idx == 0 => {
                        collect_subtree(el, matcher, &mut next);
                    }
                    Combinator::Descendant => {
                        for child in el.children.borrow().iter() {
                            collect_subtree(child, matcher, &mut next);
                        }
                    }
                    Combinator::Child => {
                        for child in el.children.borrow().iter() {
                            if is_match(child, matcher) {
                                next.push(Arc::clone(child));
                            }
                        }
                    }
                    Combinator::Sibling => {
                        if let Some(sibling) = next_element_sibling(el) {
                            if is_match(&sibling, matcher) {
                                next.push(sibling);
                            }
                        }
                    }
                }
            }

            current = dedup(next);
            if current.is_empty() {
                break;
            }
        }

        current
    }
}

fn is_match(node: &Handle, matcher: &Matcher) -> bool {
    match node.data {
        NodeData::Element {
            ref name,
            ref attrs,
            ..
        } => matcher.matches(name, &attrs.borrow()),
        _ => false,
    }
}

/// Pre-order walk, so results come out in document order.
fn collect_subtree(node: &Handle, matcher: &Matcher, acc: &mut Vec<Handle>) {
    if is_match(node, matcher) {
        acc.push(Arc::clone(node));
    }
    for child in node.children.borrow().iter() {
        collect_subtree(child, matcher, acc);
    }
}

fn next_element_sibling(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    node.parent.set(weak.clone());

    let parent = weak.and_then(|w| w.upgrade())?;
    let children = parent.children.borrow();
    let pos = children.iter().position(|c| Arc::ptr_eq(c, node))?;

    children[pos + 1..]
        .iter()
        .find(|c| matches!(c.data, NodeData::Element { .. }))
        .map(Arc::clone)
}

/// Keeps the first occurrence of every node; nested matches from
/// overlapping subtrees would otherwise repeat.
fn dedup(handles: Vec<Handle>) -> Vec<Handle> {
    let mut out: Vec<Handle> = Vec::new();
    for handle in handles {
        if !out.iter().any(|seen| Arc::ptr_eq(seen, &handle)) {
            out.push(handle);
        }
    }
    out
}

enum Token {
    Combinator(Combinator),
    Compound(String),
}

fn lex(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut in_brackets = false;
    let mut in_quotes = false;

    let mut flush = |buf: &mut String, tokens: &mut Vec<Token>| {
        if !buf.is_empty() {
            tokens.push(Token::Compound(std::mem::take(buf)));
        }
    };

    for c in input.chars() {
        match c {
            '"' | '\'' if in_brackets => {
                in_quotes = !in_quotes;
                buf.push(c);
            }
            '[' if !in_quotes => {
                if in_brackets {
                    return None;
                }
                in_brackets = true;
                buf.push(c);
            }
            ']' if !in_quotes => {
                if !in_brackets {
                    return None;
                }
                in_brackets = false;
                buf.push(c);
            }
            _ if in_brackets => buf.push(c),
            c if c.is_whitespace() => flush(&mut buf, &mut tokens),
            '>' => {
                flush(&mut buf, &mut tokens);
                tokens.push(Token::Combinator(Combinator::Child));
            }
            '+' => {
                flush(&mut buf, &mut tokens);
                tokens.push(Token::Combinator(Combinator::Sibling));
            }
            _ => buf.push(c),
        }
    }

    if in_brackets || in_quotes {
        return None;
    }
    flush(&mut buf, &mut tokens);

    Some(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(input: &str) -> Matcher {
        Matcher::parse(input).expect("compound should parse")
    }

    #[test]
    fn compound_with_tag_id_class_and_attribute() {
        let m = matcher("div#storytext.xcontrast_txt[align=\"center\"]");

        assert_eq!(m.tag, vec!["div".to_string()]);
        assert_eq!(m.id, vec!["storytext".to_string()]);
        assert_eq!(m.class, vec!["xcontrast_txt".to_string()]);
        assert_eq!(
            m.attribute,
            vec![(
                "align".to_string(),
                AttributeSpec::Exact("center".to_string())
            )]
        );
    }

    #[test]
    fn attribute_operators() {
        assert_eq!(
            matcher("a[href^=\"/u/\"]").attribute,
            vec![("href".to_string(), AttributeSpec::Starts("/u/".to_string()))]
        );
        assert_eq!(
            matcher("a[href$=.html]").attribute,
            vec![("href".to_string(), AttributeSpec::Ends(".html".to_string()))]
        );
        assert_eq!(
            matcher("a[href*=story]").attribute,
            vec![(
                "href".to_string(),
                AttributeSpec::Contains("story".to_string())
            )]
        );
        assert_eq!(
            matcher("option[selected]").attribute,
            vec![("selected".to_string(), AttributeSpec::Present)]
        );
    }

    #[test]
    fn combinators() {
        let sel = Selector::parse("div > span + a b").expect("selector should parse");

        let combinators: Vec<_> = sel.steps.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            combinators,
            vec![
                Combinator::Descendant,
                Combinator::Child,
                Combinator::Sibling,
                Combinator::Descendant,
            ]
        );
    }

    #[test]
    fn inline_sibling_combinator() {
        let sel = Selector::parse("img[align=\"absmiddle\"]+a").expect("selector should parse");

        assert_eq!(sel.steps.len(), 2);
        assert_eq!(sel.steps[1].0, Combinator::Sibling);
    }

    #[test]
    fn malformed_selectors_do_not_parse() {
        assert_eq!(Selector::parse(""), None);
        assert_eq!(Selector::parse("   "), None);
        assert_eq!(Selector::parse("> div"), None);
        assert_eq!(Selector::parse("div >"), None);
        assert_eq!(Selector::parse("div > > a"), None);
        assert_eq!(Selector::parse("a[href"), None);
        assert_eq!(Selector::parse("div."), None);
        assert_eq!(Selector::parse("#"), None);
    }
}
