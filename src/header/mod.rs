pub mod id_column;
pub mod matcher;
pub mod rules;

pub use id_column::{DetectedBy, DetectedId, IdColumnDetector};
pub use matcher::{ColumnMatcher, DecodedHeader, MatchedColumn};
pub use rules::{ColumnKey, ColumnRule, FieldKey, LabelledRule, PatternRule, RuleSet};
