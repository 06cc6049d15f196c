//! In-memory evaluation of filter groups
//!
//! Used for nested list filters and by data sources without a native search.
//! Dot paths descend into entity attributes; a path through a repeating
//! attribute holds when it holds for any of its records.

use std::cmp::Ordering;
use std::sync::Arc;

use regex::Regex;

use crate::catalog::{AttributeValue, EntityCatalog, EntityValue, Record};

use super::{Condition, Constraint, FilterGroup, Operand};

#[derive(Debug, Clone, Copy)]
pub struct FilterMatcher<'a> {
    catalog: &'a EntityCatalog,
}

impl<'a> FilterMatcher<'a> {
    pub fn new(catalog: &'a EntityCatalog) -> Self {
        Self { catalog }
    }

    /// True when every group has at least one constraint that holds.
    pub fn matches(&self, value: EntityValue<'_>, groups: &[FilterGroup]) -> bool {
        groups.iter().all(|group| {
            group
                .constraints
                .iter()
                .any(|constraint| self.holds(value, constraint))
        })
    }

    /// Same as [`Self::matches`] for a bare scalar (constraints with an empty path).
    pub fn matches_scalar(&self, value: &AttributeValue, groups: &[FilterGroup]) -> bool {
        groups.iter().all(|group| {
            group
                .constraints
                .iter()
                .any(|constraint| value_holds(value, &constraint.condition))
        })
    }

    fn holds(&self, value: EntityValue<'_>, constraint: &Constraint) -> bool {
        self.path_holds(value, &constraint.field, &constraint.condition)
    }

    fn path_holds(&self, entity: EntityValue<'_>, path: &str, condition: &Condition) -> bool {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let Ok(value) = entity.get_attribute(head) else {
            return false;
        };
        let Some(rest) = rest else {
            return value_holds(&value, condition);
        };

        let target = entity
            .definition()
            .attribute(head)
            .and_then(|attribute| self.catalog.definition(attribute.type_name()));
        let Some(target) = target else {
            return false;
        };

        let records: Vec<&Arc<dyn Record>> = match &value {
            AttributeValue::Record(record) => vec![record],
            AttributeValue::List(items) => items.iter().filter_map(AttributeValue::as_record).collect(),
            _ => Vec::new(),
        };
        if records.is_empty() {
            return value_holds(&AttributeValue::Null, condition);
        }
        records
            .into_iter()
            .any(|record| self.path_holds(EntityValue::new(target, &**record), rest, condition))
    }
}

fn value_holds(value: &AttributeValue, condition: &Condition) -> bool {
    if let AttributeValue::List(items) = value {
        return match condition {
            Condition::Null => items.is_empty(),
            Condition::NotNull => !items.is_empty(),
            Condition::Neq(_) | Condition::Nin(_) => items.iter().all(|item| value_holds(item, condition)),
            _ => items.iter().any(|item| value_holds(item, condition)),
        };
    }

    match condition {
        Condition::Null => value.is_null(),
        Condition::NotNull => !value.is_null(),
        Condition::Eq(operand) => compare(value, operand) == Some(Ordering::Equal),
        Condition::Neq(operand) => matches!(compare(value, operand), Some(o) if o != Ordering::Equal),
        Condition::Lt(operand) => compare(value, operand) == Some(Ordering::Less),
        Condition::Lteq(operand) => {
            matches!(compare(value, operand), Some(Ordering::Less | Ordering::Equal))
        }
        Condition::Gt(operand) => compare(value, operand) == Some(Ordering::Greater),
        Condition::Gteq(operand) => {
            matches!(compare(value, operand), Some(Ordering::Greater | Ordering::Equal))
        }
        Condition::In(operands) => operands
            .iter()
            .any(|operand| compare(value, operand) == Some(Ordering::Equal)),
        Condition::Nin(operands) => {
            !value.is_null()
                && operands
                    .iter()
                    .all(|operand| compare(value, operand) != Some(Ordering::Equal))
        }
        Condition::Like(pattern) => match (text(value), like_regex(pattern)) {
            (Some(text), Some(regex)) => regex.is_match(&text),
            _ => false,
        },
        Condition::FindInSet(needle) => text(value)
            .is_some_and(|text| text.split(',').any(|part| part.trim() == needle)),
        Condition::Range { from, to } => {
            matches!(compare(value, from), Some(Ordering::Greater | Ordering::Equal))
                && matches!(compare(value, to), Some(Ordering::Less | Ordering::Equal))
        }
    }
}

fn compare(value: &AttributeValue, operand: &Operand) -> Option<Ordering> {
    match (value, operand) {
        (AttributeValue::Int(a), Operand::Int(b)) => Some(a.cmp(b)),
        (AttributeValue::Int(a), Operand::Float(b)) => (*a as f64).partial_cmp(b),
        (AttributeValue::Float(a), Operand::Int(b)) => a.partial_cmp(&(*b as f64)),
        (AttributeValue::Float(a), Operand::Float(b)) => a.partial_cmp(b),
        (AttributeValue::String(a), Operand::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (AttributeValue::Boolean(a), Operand::Boolean(b)) => Some(a.cmp(b)),
        // ID operands arrive as text
        (AttributeValue::Int(a), Operand::String(b)) => Some(a.to_string().as_str().cmp(b.as_str())),
        (AttributeValue::String(a), Operand::Int(b)) => a.parse::<i64>().ok().map(|a| a.cmp(b)),
        (AttributeValue::String(a), Operand::Float(b)) => {
            a.parse::<f64>().ok().and_then(|a| a.partial_cmp(b))
        }
        _ => None,
    }
}

fn text(value: &AttributeValue) -> Option<String> {
    match value {
        AttributeValue::String(s) => Some(s.clone()),
        AttributeValue::Int(i) => Some(i.to_string()),
        AttributeValue::Float(x) => Some(x.to_string()),
        _ => None,
    }
}

/// SQL `LIKE` as a case-insensitive anchored regex: `%` is any run, `_` any
/// single character.
fn like_regex(pattern: &str) -> Option<Regex> {
    let mut source = String::from("(?is)^");
    let mut buffer = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            c => source.push_str(&regex::escape(c.encode_utf8(&mut buffer))),
        }
    }
    source.push('$');
    Regex::new(&source).ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::catalog::DocumentRecord;

    fn constraint(field: &str, condition: Condition) -> FilterGroup {
        FilterGroup::new(vec![Constraint::new(field, condition)])
    }

    fn string(s: &str) -> Operand {
        Operand::String(s.to_string())
    }

    fn order() -> DocumentRecord {
        DocumentRecord::from_json(json!({
            "id": 7,
            "shippingMethod": "flatrate_flatrate",
            "billingAddress": { "id": 1, "city": "Paris", "country": "FR" },
            "items": [
                { "id": 1, "qty": 2.0, "product": { "id": 1, "sku": "24-MB01", "description": "Bag" } },
                { "id": 2, "qty": 1.0, "product": { "id": 2, "sku": "24-WG085", "description": "Band" } }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_groups_are_anded_constraints_ored() {
        let catalog = EntityCatalog::storefront().unwrap();
        let matcher = FilterMatcher::new(&catalog);
        let definition = catalog.definition("Order").unwrap();
        let record = order();
        let value = EntityValue::new(definition, &record);

        let either = FilterGroup::new(vec![
            Constraint::new("shippingMethod", Condition::Eq(string("tablerate"))),
            Constraint::new("shippingMethod", Condition::Like("flat%".into())),
        ]);
        assert!(matcher.matches(value, &[either.clone()]));
        assert!(!matcher.matches(
            value,
            &[either, constraint("id", Condition::Eq(string("8")))]
        ));
        assert!(matcher.matches(value, &[]));
    }

    #[test]
    fn test_dot_paths() {
        let catalog = EntityCatalog::storefront().unwrap();
        let matcher = FilterMatcher::new(&catalog);
        let definition = catalog.definition("Order").unwrap();
        let record = order();
        let value = EntityValue::new(definition, &record);

        assert!(matcher.matches(value, &[constraint("billingAddress.city", Condition::Eq(string("Paris")))]));
        assert!(matcher.matches(value, &[constraint("items.product.sku", Condition::Eq(string("24-WG085")))]));
        assert!(!matcher.matches(value, &[constraint("items.product.sku", Condition::Eq(string("MJ01")))]));
        assert!(matcher.matches(value, &[constraint("shippingAddress.city", Condition::Null)]));
    }

    #[test]
    fn test_scalar_conditions() {
        assert!(value_holds(&AttributeValue::Float(45.0), &Condition::Range {
            from: Operand::Int(40),
            to: Operand::Float(50.0),
        }));
        assert!(value_holds(&"red,blue".into(), &Condition::FindInSet("blue".into())));
        assert!(value_holds(&"24-MB01".into(), &Condition::Like("24-mb__".into())));
        assert!(!value_holds(&"24-MB01".into(), &Condition::Like("24.MB01".into())));
        assert!(value_holds(&AttributeValue::Int(3), &Condition::In(vec![string("3")])));
        assert!(!value_holds(&AttributeValue::Null, &Condition::Nin(vec![string("3")])));
    }

    #[test]
    fn test_scalar_list_elements() {
        let catalog = EntityCatalog::default();
        let matcher = FilterMatcher::new(&catalog);
        let groups = [constraint("", Condition::Gt(Operand::Int(2)))];
        assert!(matcher.matches_scalar(&AttributeValue::Int(3), &groups));
        assert!(!matcher.matches_scalar(&AttributeValue::Int(1), &groups));
    }
}
