//! Type strings: a named type plus list and non-null decorations
//!
//! The accepted forms are `T`, `T!`, `[T]`, `[T]!`, `[T!]` and `[T!]!`.
//! Parsing strips the outer `!`, then the brackets, then the inner `!`;
//! rendering applies them in the reverse order.

use std::fmt;

use crate::catalog::AttributeDefinition;
use crate::error::SchemaError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeString {
    name: String,
    list: bool,
    element_non_null: bool,
    non_null: bool,
}

impl TypeString {
    /// Plain nullable named type.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            list: false,
            element_non_null: false,
            non_null: false,
        }
    }

    /// `[T!]!`
    pub fn non_null_list_of(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            list: true,
            element_non_null: true,
            non_null: true,
        }
    }

    /// `[T!]`
    pub fn list_of(name: impl Into<String>) -> Self {
        Self {
            non_null: false,
            ..Self::non_null_list_of(name)
        }
    }

    pub fn non_null(mut self) -> Self {
        self.non_null = true;
        self
    }

    /// Output wrapping for an attribute: repeating attributes are `[T!]!`,
    /// single ones are `T!` unless nullable.
    pub fn for_attribute(attribute: &AttributeDefinition) -> Self {
        if attribute.is_repeating() {
            Self::non_null_list_of(attribute.type_name())
        } else if attribute.is_nullable() {
            Self::named(attribute.type_name())
        } else {
            Self::named(attribute.type_name()).non_null()
        }
    }

    pub fn parse(input: &str) -> Result<Self, SchemaError> {
        let invalid = || SchemaError::InvalidTypeString {
            type_string: input.to_string(),
        };

        let rest = input.trim();
        let (rest, non_null) = match rest.strip_suffix('!') {
            Some(inner) => (inner, true),
            None => (rest, false),
        };
        let (rest, list) = match rest.strip_prefix('[') {
            Some(inner) => (inner.strip_suffix(']').ok_or_else(invalid)?, true),
            None => (rest, false),
        };
        let (name, element_non_null) = match rest.strip_suffix('!') {
            Some(inner) if list => (inner, true),
            Some(_) => return Err(invalid()),
            None => (rest, false),
        };

        let well_formed = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !well_formed {
            return Err(invalid());
        }

        Ok(Self {
            name: name.to_string(),
            list,
            element_non_null,
            non_null,
        })
    }

    /// The named type with every decoration stripped.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_list(&self) -> bool {
        self.list
    }

    /// The value itself can not be null.
    pub fn is_non_null(&self) -> bool {
        self.non_null
    }

    /// List elements can not be null. Always false for non-list types.
    pub fn is_element_non_null(&self) -> bool {
        self.element_non_null
    }
}

impl fmt::Display for TypeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let element_bang = if self.element_non_null { "!" } else { "" };
        let bang = if self.non_null { "!" } else { "" };
        if self.list {
            write!(f, "[{}{element_bang}]{bang}", self.name)
        } else {
            write!(f, "{}{bang}", self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::ScalarKind;

    #[test]
    fn test_decoration_flags() {
        let cases = [
            ("T", false, false, false),
            ("T!", false, false, true),
            ("[T]", true, false, false),
            ("[T]!", true, false, true),
            ("[T!]", true, true, false),
            ("[T!]!", true, true, true),
        ];
        for (input, list, element_non_null, non_null) in cases {
            let ty = TypeString::parse(input).unwrap();
            assert_eq!(ty.name(), "T", "{input}");
            assert_eq!(ty.is_list(), list, "{input}");
            assert_eq!(ty.is_element_non_null(), element_non_null, "{input}");
            assert_eq!(ty.is_non_null(), non_null, "{input}");
            assert_eq!(ty.to_string(), input);
        }
    }

    #[test]
    fn test_malformed_type_strings() {
        for input in ["", "!", "[]", "[T", "T]", "[[T]]", "T!!", "Foo Bar"] {
            assert_matches!(
                TypeString::parse(input),
                Err(SchemaError::InvalidTypeString { .. }),
                "{input}"
            );
        }
    }

    #[test]
    fn test_attribute_wrapping() {
        let sku = AttributeDefinition::scalar("sku", "", ScalarKind::String, false);
        let weight = AttributeDefinition::scalar("weight", "", ScalarKind::Float, true);
        let items = AttributeDefinition::entity("items", "", "OrderItem", true, true);
        assert_eq!(TypeString::for_attribute(&sku).to_string(), "String!");
        assert_eq!(TypeString::for_attribute(&weight).to_string(), "Float");
        assert_eq!(TypeString::for_attribute(&items).to_string(), "[OrderItem!]!");
    }
}
