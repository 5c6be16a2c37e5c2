//! Message templates with `{{field}}` placeholders.
//!
//! A template is parsed once into literal and placeholder segments. Rendering walks the
//! segments, so substituted values are never scanned for placeholders again.

use std::collections::HashMap;

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Split `source` into segments. An unterminated `{{` or an empty `{{ }}` is literal text.
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            let after_open = &rest[open + 2..];
            let Some(close) = after_open.find("}}") else {
                break;
            };
            let name = after_open[..close].trim();
            literal.push_str(&rest[..open]);
            if name.is_empty() {
                literal.push_str(&rest[open..open + 2 + close + 2]);
            } else {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name.to_owned()));
            }
            rest = &after_open[close + 2..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self { segments }
    }

    /// Substitute each placeholder with the same-named field of `context`.
    ///
    /// Missing and null fields render as the empty string.
    pub fn render(&self, context: &Map<String, Value>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    if let Some(value) = context.get(name) {
                        push_value(&mut out, value);
                    }
                }
            }
        }
        out
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        other => out.push_str(&other.to_string()),
    }
}

/// Subject, plain-text body and HTML body for one notification type.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub subject: Template,
    pub text_body: Template,
    pub html_body: Template,
}

impl MessageTemplate {
    pub fn new(subject: &str, text_body: &str, html_body: &str) -> Self {
        Self {
            subject: Template::parse(subject),
            text_body: Template::parse(text_body),
            html_body: Template::parse(html_body),
        }
    }
}

pub const LOW_STOCK_ALERT: &str = "low_stock_alert";

/// Templates keyed by event type.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, MessageTemplate>,
}

impl TemplateRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The five built-in templates.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.insert(
            "asset_created",
            MessageTemplate::new(
                "New asset created",
                "Asset created: {{name}} ({{assetId}}) in category {{category}}",
                "<h2>Asset created</h2>\
                 <ul>\
                 <li><strong>Name:</strong> {{name}}</li>\
                 <li><strong>ID:</strong> {{assetId}}</li>\
                 <li><strong>Category:</strong> {{category}}</li>\
                 <li><strong>Location:</strong> {{locationX}}, {{locationY}}</li>\
                 </ul>\
                 <p>Created at {{timestamp}}</p>",
            ),
        );
        registry.insert(
            "asset_updated",
            MessageTemplate::new(
                "Asset updated",
                "Asset {{name}} ({{assetId}}) was updated",
                "<h2>Asset updated</h2>\
                 <p>Asset {{name}} ({{assetId}}) was modified.</p>\
                 <p>Updated at {{timestamp}}</p>",
            ),
        );
        registry.insert(
            "asset_deleted",
            MessageTemplate::new(
                "Asset deleted",
                "Asset {{name}} ({{assetId}}) was deleted",
                "<h2>Asset deleted</h2>\
                 <p>Asset {{name}} ({{assetId}}) was removed from the inventory.</p>\
                 <p>Deleted at {{timestamp}}</p>",
            ),
        );
        registry.insert(
            "warehouse_updated",
            MessageTemplate::new(
                "Warehouse updated",
                "Warehouse {{name}} was updated. Utilization: {{utilizationPercent}}%",
                "<h2>Warehouse updated</h2>\
                 <ul>\
                 <li><strong>Capacity:</strong> {{maxCapacity}}</li>\
                 <li><strong>Current count:</strong> {{currentCount}}</li>\
                 <li><strong>Utilization:</strong> {{utilizationPercent}}%</li>\
                 </ul>",
            ),
        );
        registry.insert(
            LOW_STOCK_ALERT,
            MessageTemplate::new(
                "Warehouse capacity warning",
                "WARNING: warehouse {{warehouseName}} is at {{utilizationPercent}}% capacity",
                "<h2>Warehouse capacity warning</h2>\
                 <p>Warehouse {{warehouseName}} crossed the warning threshold:</p>\
                 <ul>\
                 <li><strong>Current count:</strong> {{currentCount}}</li>\
                 <li><strong>Capacity:</strong> {{maxCapacity}}</li>\
                 <li><strong>Utilization:</strong> {{utilizationPercent}}%</li>\
                 </ul>\
                 <p>Check free space in the warehouse.</p>",
            ),
        );
        registry
    }

    pub fn insert(&mut self, event_type: &str, template: MessageTemplate) {
        self.templates.insert(event_type.to_owned(), template);
    }

    pub fn get(&self, event_type: &str) -> Option<&MessageTemplate> {
        self.templates.get(event_type)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
