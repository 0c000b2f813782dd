use crate::model::{ImportPlan, RuleSet};

/// Rule set returned for types without configured properties.
pub static EMPTY_RULES: RuleSet = RuleSet::new();

/// Per-type rules, dependencies and formats consumed by the importer.
pub trait SchemaProvider {
    /// Property rules of `type_name`; empty when none are configured.
    fn property_rules(&self, type_name: &str) -> &RuleSet;

    /// Types that must be fully generated before `type_name`, in order.
    fn dependencies(&self, type_name: &str) -> &[String];

    fn date_format(&self) -> &str;

    fn date_time_format(&self) -> &str;

    /// Saves between opportunistic flushes; `None` keeps the importer default.
    fn flush_interval(&self) -> Option<usize> {
        None
    }
}

impl SchemaProvider for ImportPlan {
    fn property_rules(&self, type_name: &str) -> &RuleSet {
        self.type_plan(type_name)
            .map(|type_plan| &type_plan.properties)
            .unwrap_or(&EMPTY_RULES)
    }

    fn dependencies(&self, type_name: &str) -> &[String] {
        self.type_plan(type_name)
            .map(|type_plan| type_plan.depends_on.as_slice())
            .unwrap_or(&[])
    }

    fn date_format(&self) -> &str {
        &self.date_format
    }

    fn date_time_format(&self) -> &str {
        &self.date_time_format
    }

    fn flush_interval(&self) -> Option<usize> {
        self.flush_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_types_have_no_rules_or_dependencies() {
        let plan = ImportPlan::default();
        assert!(plan.property_rules("Country").is_empty());
        assert!(plan.dependencies("Country").is_empty());
        assert_eq!(plan.date_format(), "%d.%m.%Y");
    }
}
