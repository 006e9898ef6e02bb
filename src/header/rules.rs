// src/header/rules.rs

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Which field a physical column belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey {
    /// Numeric field id encoded in the column name.
    Id(String),
    /// Column named after the field's title.
    Name(String),
}

/// Decoded column name: base field plus optional instance / array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnKey {
    pub field: FieldKey,
    pub instance: Option<u32>,
    pub array: Option<u32>,
}

/// One naming convention for field columns.
pub trait ColumnRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decode `column`, or `None` if it does not follow this convention.
    fn parse(&self, column: &str) -> Option<ColumnKey>;
}

/// A convention expressed as a regex with named groups `id`, `instance` and `array`.
pub struct PatternRule {
    name: &'static str,
    pattern: &'static Lazy<Regex>,
}

impl PatternRule {
    pub const fn new(name: &'static str, pattern: &'static Lazy<Regex>) -> Self {
        Self { name, pattern }
    }
}

fn group_u32(caps: &regex::Captures<'_>, group: &str) -> Option<u32> {
    caps.name(group).and_then(|m| m.as_str().parse().ok())
}

impl ColumnRule for PatternRule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn parse(&self, column: &str) -> Option<ColumnKey> {
        let caps = self.pattern.captures(column.trim())?;
        let id = caps.name("id")?.as_str().to_string();
        Some(ColumnKey {
            field: FieldKey::Id(id),
            instance: group_u32(&caps, "instance"),
            array: group_u32(&caps, "array"),
        })
    }
}

// Every pattern is anchored at both ends and takes the whole digit run as the id,
// so `220_0_0` decodes to 220 and can never match 22.

/// `participant.p21022`, `p21022_i0`, `participant.p41270_i0_a3`
static DNANEXUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:participant\.)?p(?P<id>\d+)(?:_i(?P<instance>\d+))?(?:_a(?P<array>\d+))?$")
        .unwrap()
});

/// `21022`, `21022-0.0`, `21022-2`
static SHOWCASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<id>\d+)(?:-(?P<instance>\d+)(?:\.(?P<array>\d+))?)?$").unwrap()
});

/// `21022_0_0`, `21022_1`
static UNDERSCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<id>\d+)_(?P<instance>\d+)(?:_(?P<array>\d+))?$").unwrap()
});

/// `f.21022.0.0`, `f21022_0_0`
static UKBTOOLS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^f\.?(?P<id>\d+)(?:[._](?P<instance>\d+)(?:[._](?P<array>\d+))?)?$").unwrap()
});

/// `Sex | Instance 0 | Array 1` as exported with field titles.
static LABELLED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>[^|]+?)\s*(?:\|\s*Instance\s+(?P<instance>\d+))?\s*(?:\|\s*Array\s+(?P<array>\d+))?$")
        .unwrap()
});

/// Title-based columns. Only consulted when no id-based rule matches a field.
pub struct LabelledRule;

impl ColumnRule for LabelledRule {
    fn name(&self) -> &'static str {
        "labelled"
    }

    fn parse(&self, column: &str) -> Option<ColumnKey> {
        let caps = LABELLED.captures(column.trim())?;
        let name = caps.name("name")?.as_str().trim().to_string();
        if name.is_empty() {
            return None;
        }
        Some(ColumnKey {
            field: FieldKey::Name(name),
            instance: group_u32(&caps, "instance"),
            array: group_u32(&caps, "array"),
        })
    }
}

/// Ordered list of naming conventions; the first rule that decodes a column wins.
pub struct RuleSet {
    rules: Vec<Box<dyn ColumnRule>>,
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|r| r.name()))
            .finish()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::empty()
            .with_rule(PatternRule::new("dnanexus", &DNANEXUS))
            .with_rule(PatternRule::new("showcase", &SHOWCASE))
            .with_rule(PatternRule::new("underscore", &UNDERSCORE))
            .with_rule(PatternRule::new("ukbtools", &UKBTOOLS))
            .with_rule(LabelledRule)
    }
}

impl RuleSet {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule with the lowest priority so far.
    pub fn with_rule<R: ColumnRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Decode `column` with the first rule that accepts it.
    pub fn parse(&self, column: &str) -> Option<(&'static str, ColumnKey)> {
        self.rules
            .iter()
            .find_map(|rule| rule.parse(column).map(|key| (rule.name(), key)))
    }
}
