//! The argument list of a single call, in source order.

use crate::ast::{ArgumentCategory, ExpressionNode, TextRange};
use crate::name::Name;
use crate::types::Type;

/// One argument at a call site: its syntactic category, keyword name if any,
/// the expression it came from (absent for synthesized arguments such as a
/// decorated function), and its evaluated type.
#[derive(Clone, Debug)]
pub struct FunctionArgument<'a> {
    pub category: ArgumentCategory,
    pub name: Option<Name>,
    pub value_expression: Option<&'a ExpressionNode>,
    pub ty: Type,
}

impl<'a> FunctionArgument<'a> {
    pub fn positional(ty: Type) -> Self {
        Self {
            category: ArgumentCategory::Simple,
            name: None,
            value_expression: None,
            ty,
        }
    }

    pub fn keyword(name: impl Into<Name>, ty: Type) -> Self {
        Self {
            category: ArgumentCategory::Simple,
            name: Some(name.into()),
            value_expression: None,
            ty,
        }
    }

    /// The range diagnostics for this argument attach to; falls back to the
    /// call node's range for synthesized arguments.
    pub fn range_or(&self, fallback: TextRange) -> TextRange {
        self.value_expression
            .map(ExpressionNode::range)
            .unwrap_or(fallback)
    }
}

#[derive(Clone, Debug, Default)]
pub struct CallArguments<'a> {
    arguments: Vec<FunctionArgument<'a>>,
}

impl<'a> CallArguments<'a> {
    pub fn new(arguments: Vec<FunctionArgument<'a>>) -> Self {
        Self { arguments }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FunctionArgument<'a>> {
        self.arguments.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FunctionArgument<'a>> {
        self.arguments.iter()
    }
}

impl<'a> FromIterator<FunctionArgument<'a>> for CallArguments<'a> {
    fn from_iter<T: IntoIterator<Item = FunctionArgument<'a>>>(iter: T) -> Self {
        Self {
            arguments: iter.into_iter().collect(),
        }
    }
}
