//! Minimal element tree and locator resolution for the fake application
//!
//! Nodes are stored in document (pre-order) order, so the descendants of a
//! node are the contiguous range `index + 1 .. end`.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PageError, PageResult};
use crate::locator::{Locator, LocatorStep};

/// What clicking an element does to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    ToggleSubjects,
    PickSubject(String),
    Create,
    Join(u64),
    Leave(u64),
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub tag: &'static str,
    pub classes: Vec<&'static str>,
    pub attrs: Vec<(&'static str, String)>,
    pub text: String,
    pub action: Option<Action>,
    parent: Option<usize>,
    end: usize,
}

impl Element {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            classes: Vec::new(),
            attrs: Vec::new(),
            text: String::new(),
            action: None,
            parent: None,
            end: 0,
        }
    }

    pub fn class(mut self, class: &'static str) -> Self {
        self.classes.push(class);
        self
    }

    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Explicit `role` attribute, falling back to the implicit role of the tag
    fn role(&self) -> Option<&str> {
        self.get_attr("role").or(match self.tag {
            "button" => Some("button"),
            "select" => Some("combobox"),
            "option" => Some("option"),
            "input" => Some("textbox"),
            "tr" => Some("row"),
            "td" => Some("cell"),
            _ => None,
        })
    }
}

/// Builds a [`Document`] by opening and closing elements
pub(crate) struct DocumentBuilder {
    nodes: Vec<Element>,
    open: Vec<usize>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            nodes: Vec::new(),
            open: Vec::new(),
        };
        builder.open(Element::new("html"));
        builder
    }

    pub fn open(&mut self, mut element: Element) -> &mut Self {
        element.parent = self.open.last().copied();
        self.nodes.push(element);
        self.open.push(self.nodes.len() - 1);
        self
    }

    pub fn leaf(&mut self, element: Element) -> &mut Self {
        self.open(element).close()
    }

    pub fn close(&mut self) -> &mut Self {
        if let Some(index) = self.open.pop() {
            self.nodes[index].end = self.nodes.len();
        }
        self
    }

    pub fn finish(mut self) -> Document {
        while !self.open.is_empty() {
            self.close();
        }
        Document { nodes: self.nodes }
    }
}

pub(crate) struct Document {
    nodes: Vec<Element>,
}

impl Document {
    pub fn element(&self, index: usize) -> &Element {
        &self.nodes[index]
    }

    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        (index + 1..self.nodes[index].end).filter(move |&i| self.nodes[i].parent == Some(index))
    }

    /// Text of the element and its descendants, whitespace-joined
    pub fn text_content(&self, index: usize) -> String {
        (index..self.nodes[index].end)
            .map(|i| self.nodes[i].text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn accessible_name(&self, index: usize) -> String {
        match self.nodes[index].get_attr("aria-label") {
            Some(label) => label.trim().to_string(),
            None => self.text_content(index),
        }
    }

    /// All elements matching `locator`, in document order
    pub fn resolve(&self, locator: &Locator) -> PageResult<Vec<usize>> {
        self.resolve_from(locator, vec![0])
    }

    fn resolve_from(&self, locator: &Locator, scope: Vec<usize>) -> PageResult<Vec<usize>> {
        let mut current = scope;
        for step in locator.steps() {
            current = match step {
                LocatorStep::Css { selector } => {
                    let selector = CssSelector::parse(selector)?;
                    self.descendants_where(&current, |i| selector.matches(self, i))
                }
                LocatorStep::Role { role, name } => self.descendants_where(&current, |i| {
                    self.nodes[i].role() == Some(role.as_str())
                        && self.accessible_name(i) == name.trim()
                }),
                LocatorStep::Has { inner } => {
                    let mut kept = Vec::new();
                    for i in current {
                        if !self.resolve_from(inner, vec![i])?.is_empty() {
                            kept.push(i);
                        }
                    }
                    kept
                }
                LocatorStep::HasText { text, exact } => current
                    .into_iter()
                    .filter(|&i| {
                        let content = self.text_content(i);
                        if *exact {
                            content == text.trim()
                        } else {
                            content.to_lowercase().contains(&text.to_lowercase())
                        }
                    })
                    .collect(),
            };
        }
        Ok(current)
    }

    fn descendants_where(&self, scope: &[usize], pred: impl Fn(usize) -> bool) -> Vec<usize> {
        let mut found = BTreeSet::new();
        for &s in scope {
            for i in s + 1..self.nodes[s].end {
                if pred(i) {
                    found.insert(i);
                }
            }
        }
        found.into_iter().collect()
    }
}

static COMPOUND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^([a-zA-Z][\w-]*)?((?:\.[\w-]+|\[[\w-]+(?:=(?:'[^']*'|"[^"]*"|[\w-]+))?\])*)$"#)
        .expect("valid compound selector regex")
});

static PART_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\.([\w-]+)|\[([\w-]+)(?:=(?:'([^']*)'|"([^"]*)"|([\w-]+)))?\]"#)
        .expect("valid selector part regex")
});

#[derive(Debug, Default)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches(&self, element: &Element) -> bool {
        self.tag.as_deref().map_or(true, |t| t.eq_ignore_ascii_case(element.tag))
            && self
                .classes
                .iter()
                .all(|c| element.classes.iter().any(|ec| *ec == c.as_str()))
            && self.attrs.iter().all(|(name, value)| match value {
                Some(v) => element.get_attr(name) == Some(v.as_str()),
                None => element.get_attr(name).is_some(),
            })
    }
}

/// Compound selectors (`tag.class[attr='v']`) joined by whitespace
#[derive(Debug)]
struct CssSelector {
    parts: Vec<Compound>,
}

impl CssSelector {
    fn parse(selector: &str) -> PageResult<Self> {
        let parts = split_compounds(selector)
            .into_iter()
            .map(|token| parse_compound(&token).ok_or_else(|| PageError::InvalidSelector(selector.to_string())))
            .collect::<PageResult<Vec<_>>>()?;

        if parts.is_empty() {
            return Err(PageError::InvalidSelector(selector.to_string()));
        }
        Ok(Self { parts })
    }

    fn matches(&self, doc: &Document, index: usize) -> bool {
        let Some((last, ancestors)) = self.parts.split_last() else {
            return false;
        };
        if !last.matches(&doc.nodes[index]) {
            return false;
        }

        // Right to left: each remaining compound must match some ancestor
        // above the one matched before it.
        let mut cursor = doc.nodes[index].parent;
        for compound in ancestors.iter().rev() {
            loop {
                match cursor {
                    Some(i) if compound.matches(&doc.nodes[i]) => {
                        cursor = doc.nodes[i].parent;
                        break;
                    }
                    Some(i) => cursor = doc.nodes[i].parent,
                    None => return false,
                }
            }
        }
        true
    }
}

/// Split on whitespace that sits outside attribute brackets
fn split_compounds(selector: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in selector.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_compound(token: &str) -> Option<Compound> {
    let caps = COMPOUND_RE.captures(token)?;
    let mut compound = Compound {
        tag: caps.get(1).map(|m| m.as_str().to_string()),
        ..Default::default()
    };

    let rest = caps.get(2).map_or("", |m| m.as_str());
    for part in PART_RE.captures_iter(rest) {
        if let Some(class) = part.get(1) {
            compound.classes.push(class.as_str().to_string());
        } else if let Some(name) = part.get(2) {
            let value = part
                .get(3)
                .or_else(|| part.get(4))
                .or_else(|| part.get(5))
                .map(|m| m.as_str().to_string());
            compound.attrs.push((name.as_str().to_string(), value));
        }
    }

    if compound.tag.is_none() && compound.classes.is_empty() && compound.attrs.is_empty() {
        return None;
    }
    Some(compound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::AriaRole;

    fn table() -> Document {
        let mut b = DocumentBuilder::new();
        b.open(Element::new("table"));
        for (id, name, subject) in [(1, "Alpha Team", "Physics"), (2, "Beta Team", "Math")] {
            b.open(
                Element::new("tr")
                    .class("study-group-row")
                    .attr("data-group-id", id.to_string()),
            )
            .leaf(Element::new("td").class("name").text(name))
            .leaf(Element::new("td").class("subject").text(subject))
            .open(Element::new("td").class("actions"))
            .leaf(Element::new("button").text("Join").action(Action::Join(id)))
            .close()
            .close();
        }
        b.close();
        b.leaf(Element::new("input").attr("name", "name"));
        b.finish()
    }

    #[test]
    fn test_descendant_css_selector() {
        let doc = table();
        let cells = doc.resolve(&Locator::css(".study-group-row .subject")).unwrap();
        let texts: Vec<_> = cells.iter().map(|&i| doc.text_content(i)).collect();
        assert_eq!(texts, vec!["Physics", "Math"]);

        assert_eq!(doc.resolve(&Locator::css("table td.name")).unwrap().len(), 2);
        assert!(doc.resolve(&Locator::css("form .name")).unwrap().is_empty());
    }

    #[test]
    fn test_attribute_selectors() {
        let doc = table();
        assert_eq!(doc.resolve(&Locator::css("input[name='name']")).unwrap().len(), 1);
        assert_eq!(
            doc.resolve(&Locator::css(".study-group-row[data-group-id=\"2\"]")).unwrap().len(),
            1
        );
        assert_eq!(doc.resolve(&Locator::css("[data-group-id]")).unwrap().len(), 2);
    }

    #[test]
    fn test_has_filter_scopes_role_lookup_to_row() {
        let doc = table();
        let join = Locator::css(".study-group-row")
            .filter_has(Locator::css(".name").filter_exact_text("Beta Team"))
            .get_by_role(AriaRole::Button, "Join");

        let matches = doc.resolve(&join).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(doc.element(matches[0]).action, Some(Action::Join(2)));
    }

    #[test]
    fn test_exact_text_does_not_match_substrings() {
        let doc = table();
        let rows = Locator::css(".study-group-row");
        assert!(doc
            .resolve(&rows.clone().filter_has(Locator::css(".name").filter_exact_text("Beta")))
            .unwrap()
            .is_empty());
        assert_eq!(doc.resolve(&rows.filter_text("team")).unwrap().len(), 2);
    }

    #[test]
    fn test_rejects_unsupported_selector() {
        let doc = table();
        let err = doc.resolve(&Locator::css("tr > td")).unwrap_err();
        assert!(matches!(err, PageError::InvalidSelector(_)));
    }
}
