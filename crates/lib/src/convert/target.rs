//! Target-system declarations produced by conversion.

use std::collections::BTreeMap;
use std::fmt::{self, Write};

use serde::Serialize;

use crate::label::{Label, LabelList};

/// An attribute value of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
  Bool(bool),
  String(String),
  StringList(Vec<String>),
  Label(Label),
  LabelList(Vec<Label>),
}

/// One rule invocation in a target-system build file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
  pub name: String,
  pub rule_class: String,

  /// Package the target is written to; empty for the top level.
  pub package: String,

  pub attrs: BTreeMap<String, AttrValue>,
}

impl Target {
  pub fn new(rule_class: impl Into<String>, name: impl Into<String>, package: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      rule_class: rule_class.into(),
      package: package.into(),
      attrs: BTreeMap::new(),
    }
  }

  pub fn with_attr(mut self, name: impl Into<String>, value: AttrValue) -> Self {
    self.attrs.insert(name.into(), value);
    self
  }

  /// Set a label-list attribute from the resolved includes of `list`.
  ///
  /// Empty lists are left out.
  pub fn with_labels(self, name: impl Into<String>, list: &LabelList) -> Self {
    if list.is_empty() {
      return self;
    }
    self.with_attr(name, AttrValue::LabelList(list.includes.clone()))
  }

  /// Absolute label of this target.
  pub fn label(&self) -> Label {
    Label::new(format!("//{}:{}", self.package, self.name))
  }
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "{}(", self.rule_class)?;
    writeln!(f, "    name = {},", quote(&self.name))?;
    for (name, value) in &self.attrs {
      writeln!(f, "    {} = {},", name, render(value))?;
    }
    write!(f, ")")
  }
}

fn render(value: &AttrValue) -> String {
  match value {
    AttrValue::Bool(true) => "True".to_string(),
    AttrValue::Bool(false) => "False".to_string(),
    AttrValue::String(s) => quote(s),
    AttrValue::Label(label) => quote(&label.address),
    AttrValue::StringList(items) => render_list(items.iter().map(String::as_str)),
    AttrValue::LabelList(labels) => render_list(labels.iter().map(|l| l.address.as_str())),
  }
}

fn render_list<'a>(items: impl ExactSizeIterator<Item = &'a str>) -> String {
  match items.len() {
    0 => "[]".to_string(),
    1 => format!("[{}]", items.map(quote).collect::<String>()),
    _ => {
      let mut out = String::from("[\n");
      for item in items {
        let _ = writeln!(out, "        {},", quote(item));
      }
      out.push_str("    ]");
      out
    }
  }
}

fn quote(s: &str) -> String {
  let mut out = String::with_capacity(s.len() + 2);
  out.push('"');
  for c in s.chars() {
    match c {
      '"' => out.push_str("\\\""),
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      _ => out.push(c),
    }
  }
  out.push('"');
  out
}
