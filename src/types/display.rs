//! Display implementations for types, used when composing diagnostics.

use std::fmt::{self, Display, Formatter};

use itertools::Itertools;

use crate::types::{ClassType, FunctionType, Type};

impl Type {
    pub fn display(&self) -> DisplayType<'_> {
        DisplayType { ty: self }
    }
}

#[derive(Copy, Clone)]
pub struct DisplayType<'a> {
    ty: &'a Type,
}

impl Display for DisplayType<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.ty {
            Type::Unknown => f.write_str("Unknown"),
            Type::Any { is_ellipsis: true } => f.write_str("..."),
            Type::Any { is_ellipsis: false } => f.write_str("Any"),
            Type::None => f.write_str("None"),
            Type::Never => f.write_str("Never"),
            Type::Class(class) => {
                f.write_str("Type[")?;
                write_class(f, class)?;
                f.write_str("]")
            }
            Type::Object(object) => write_class(f, &object.class),
            Type::Function(function) => write_function(f, function),
            Type::Overloaded(overloaded) => {
                f.write_str("Overload[")?;
                for (index, overload) in overloaded.overloads().iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write_function(f, overload)?;
                }
                f.write_str("]")
            }
            Type::Module(module) => write!(f, "<module '{}'>", module.name()),
            Type::Union(union) => {
                let rendered = union
                    .subtypes()
                    .iter()
                    .map(|subtype| subtype.display().to_string())
                    .join(" | ");
                f.write_str(&rendered)
            }
            Type::TypeVar(type_var) => f.write_str(&type_var.name),
            Type::Property(_) => f.write_str("property"),
        }
    }
}

impl fmt::Debug for DisplayType<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

fn write_class(f: &mut Formatter<'_>, class: &ClassType) -> fmt::Result {
    f.write_str(class.name())?;
    if let Some(args) = class.type_args() {
        if !args.is_empty() {
            let rendered = args.iter().map(|arg| arg.display().to_string()).join(", ");
            write!(f, "[{rendered}]")?;
        }
    }
    Ok(())
}

fn write_function(f: &mut Formatter<'_>, function: &FunctionType) -> fmt::Result {
    f.write_str("(")?;
    let rendered = function
        .parameters()
        .iter()
        .map(|param| match &param.name {
            Some(name) => name.as_str().to_string(),
            None => "*".to_string(),
        })
        .join(", ");
    f.write_str(&rendered)?;
    write!(f, ") -> {}", function.effective_return_type().display())
}
