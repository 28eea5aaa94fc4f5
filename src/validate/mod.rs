//! Validation engine — composable rules over option maps.
//!
//! A rule never aborts anything by itself. It inspects the options, produces
//! report items and leaves the severity decision visible in the item; the
//! caller decides what an error means by checking the report processor
//! afterwards. Rules compose through [`ValidatorAll`] and
//! [`ValidatorFirstError`].

mod combinators;
mod pair;
mod value;

pub use combinators::{
    DependsOnOption, IsRequiredAll, IsRequiredSome, MutuallyExclusive, NamesIn, ValidatorAll,
    ValidatorFirstError,
};
pub use pair::{normalize, options_from, OptionMap, ValuePair};
pub use value::{
    canonical_boolean, ValueBoolean, ValueId, ValueIn, ValueIntegerInRange, ValueNotEmpty,
    ValuePortNumber,
};

use crate::reports::{ReportContext, ReportItem};

/// Ambient facts a rule may need besides the options themselves. Currently
/// just the default node context stamped onto produced items.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    target: Option<ReportContext>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// All items produced under this context are about `node`, unless a rule
    /// set a more specific context itself.
    pub fn for_node(label: impl Into<String>) -> Self {
        Self {
            target: Some(ReportContext::node(label)),
        }
    }

    fn localize(&self, mut item: ReportItem) -> ReportItem {
        if item.context.is_none() {
            item.context = self.target.clone();
        }
        item
    }
}

/// A single validation rule.
pub trait Validate {
    fn validate(&self, options: &OptionMap, ctx: &ValidationContext) -> Vec<ReportItem>;
}

/// Run one rule with an empty context. Convenience for operations that
/// validate a small fixed set in one go.
pub fn run<V: Validate>(rule: &V, options: &OptionMap) -> Vec<ReportItem> {
    rule.validate(options, &ValidationContext::new())
}
