//! Predicate to SQL translation.

use super::ast::{CompareOp, MethodKind, Operand, Predicate, PropertyRef};
use crate::error::{CoreError, CoreResult};
use entimap_codec::Value;
use entimap_driver::Parameters;
use std::collections::HashSet;
use std::fmt::Write as _;

/// Where a property lives in the statement being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    /// Alias of the table the column belongs to.
    pub table_alias: String,
    /// Column name in that table.
    pub column: String,
    /// Alias the column is selected as; base of parameter names.
    pub column_alias: String,
}

/// Alias callbacks supplied by the statement builder.
pub trait AliasResolver {
    /// Alias of the table for `owner` (`None` is the queried entity).
    fn table_alias(&self, owner: Option<&str>) -> CoreResult<String>;

    /// Resolves a property to its aliased column.
    fn column(&self, property: &PropertyRef) -> CoreResult<ResolvedColumn>;

    /// Quotes an identifier.
    fn quote(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }
}

/// A translated predicate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translation {
    /// SQL boolean fragment.
    pub sql: String,
    /// Parameters referenced by the fragment.
    pub parameters: Parameters,
}

/// Translates a predicate into a SQL boolean fragment and its parameters.
///
/// Parameters are named `@<columnAlias>`; repeated aliases get numeric
/// suffixes (`@Id`, `@Id1`, ...). Constants compared without any column use
/// the base name `p`.
///
/// # Errors
///
/// [`CoreError::UnsupportedExpression`] for `NOT` and unknown methods, and
/// whatever the resolver reports for unknown properties.
pub fn translate(predicate: &Predicate, resolver: &dyn AliasResolver) -> CoreResult<Translation> {
    let mut translator = Translator {
        resolver,
        sql: String::new(),
        parameters: Parameters::new(),
        names: ParameterNamer::default(),
    };
    translator.visit(predicate, 0)?;
    Ok(Translation {
        sql: translator.sql,
        parameters: translator.parameters,
    })
}

/// Turns a column alias into a valid parameter identifier.
pub(crate) fn parameter_base(alias: &str) -> String {
    let base: String = alias
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if base.is_empty() {
        "p".to_string()
    } else {
        base
    }
}

/// Hands out `@name` tokens, suffixing repeats (`@Id`, `@Id1`, ...).
#[derive(Debug, Default)]
pub(crate) struct ParameterNamer {
    used: HashSet<String>,
}

impl ParameterNamer {
    pub(crate) fn next(&mut self, alias: &str) -> String {
        let base = parameter_base(alias);
        let mut name = format!("@{base}");
        let mut suffix = 1;
        while self.used.contains(&name) {
            name = format!("@{base}{suffix}");
            suffix += 1;
        }
        self.used.insert(name.clone());
        name
    }
}

struct Translator<'r> {
    resolver: &'r dyn AliasResolver,
    sql: String,
    parameters: Parameters,
    names: ParameterNamer,
}

impl Translator<'_> {
    fn visit(&mut self, predicate: &Predicate, parent: u8) -> CoreResult<()> {
        let precedence = predicate.precedence();
        let wrap = precedence < parent;
        if wrap {
            self.sql.push('(');
        }
        match predicate {
            Predicate::And(left, right) => self.binary(left, "AND", right, precedence)?,
            Predicate::Or(left, right) => self.binary(left, "OR", right, precedence)?,
            Predicate::Not(_) => return Err(CoreError::unsupported("NOT")),
            Predicate::Literal(true) => self.sql.push_str("1 = 1"),
            Predicate::Literal(false) => self.sql.push_str("1 = 0"),
            Predicate::Compare { op, left, right } => self.compare(*op, left, right)?,
            Predicate::Method {
                kind,
                target,
                literal,
            } => self.method(kind, target, literal)?,
        }
        if wrap {
            self.sql.push(')');
        }
        Ok(())
    }

    fn binary(
        &mut self,
        left: &Predicate,
        keyword: &str,
        right: &Predicate,
        precedence: u8,
    ) -> CoreResult<()> {
        self.visit(left, precedence)?;
        let _ = write!(self.sql, " {keyword} ");
        self.visit(right, precedence)
    }

    fn compare(&mut self, op: CompareOp, left: &Operand, right: &Operand) -> CoreResult<()> {
        let null_test = matches!(op, CompareOp::Eq | CompareOp::Ne);
        match (left, right) {
            (operand, Operand::Constant(Value::Null)) | (Operand::Constant(Value::Null), operand)
                if null_test =>
            {
                let rendered = self.operand(operand, None)?;
                let keyword = if op == CompareOp::Eq { "IS" } else { "IS NOT" };
                let _ = write!(self.sql, "{rendered} {keyword} NULL");
            }
            _ => {
                // A constant takes its parameter name from the column on the other side.
                let left_column = self.column_of(left)?;
                let right_column = self.column_of(right)?;
                let lhs = self.operand_with(left, left_column.as_ref(), right_column.as_ref())?;
                let rhs = self.operand_with(right, right_column.as_ref(), left_column.as_ref())?;
                let _ = write!(self.sql, "{lhs} {} {rhs}", op.sql());
            }
        }
        Ok(())
    }

    fn method(&mut self, kind: &MethodKind, target: &PropertyRef, literal: &Value) -> CoreResult<()> {
        let column = self.resolver.column(target)?;
        let rendered = self.render_column(&column);
        let pattern = |text: &str| -> Value {
            match kind {
                MethodKind::StartsWith => Value::Text(format!("{text}%")),
                MethodKind::EndsWith => Value::Text(format!("%{text}")),
                _ => Value::Text(format!("%{text}%")),
            }
        };
        match kind {
            MethodKind::Equals if literal.is_null() => {
                let _ = write!(self.sql, "{rendered} IS NULL");
            }
            MethodKind::Equals => {
                let name = self.bind(&column.column_alias, literal.clone());
                let _ = write!(self.sql, "{rendered} = {name}");
            }
            MethodKind::StartsWith | MethodKind::EndsWith | MethodKind::Contains => {
                if literal.is_null() {
                    return Err(CoreError::unsupported(format!("{kind}(null)")));
                }
                let text = literal.to_string();
                let escaped = escape_like(&text);
                let name = self.bind(&column.column_alias, pattern(&escaped));
                let _ = write!(self.sql, "{rendered} LIKE {name}");
                if escaped.len() != text.len() {
                    let _ = write!(self.sql, " ESCAPE '{LIKE_ESCAPE}'");
                }
            }
            MethodKind::Other(name) => return Err(CoreError::unsupported(name.clone())),
        }
        Ok(())
    }

    fn column_of(&self, operand: &Operand) -> CoreResult<Option<ResolvedColumn>> {
        match operand {
            Operand::Property(property) => self.resolver.column(property).map(Some),
            Operand::Constant(_) => Ok(None),
        }
    }

    fn operand(&mut self, operand: &Operand, partner: Option<&ResolvedColumn>) -> CoreResult<String> {
        let own = self.column_of(operand)?;
        self.operand_with(operand, own.as_ref(), partner)
    }

    fn operand_with(
        &mut self,
        operand: &Operand,
        own: Option<&ResolvedColumn>,
        partner: Option<&ResolvedColumn>,
    ) -> CoreResult<String> {
        match (operand, own) {
            (Operand::Property(_), Some(column)) => Ok(self.render_column(column)),
            (Operand::Property(property), None) => Err(CoreError::unknown_property(
                property.owner.clone().unwrap_or_default(),
                property.name.clone(),
            )),
            (Operand::Constant(value), _) => {
                let base = partner.map_or("p", |c| c.column_alias.as_str()).to_string();
                Ok(self.bind(&base, value.clone()))
            }
        }
    }

    fn render_column(&self, column: &ResolvedColumn) -> String {
        format!(
            "{}.{}",
            self.resolver.quote(&column.table_alias),
            self.resolver.quote(&column.column)
        )
    }

    fn bind(&mut self, alias: &str, value: Value) -> String {
        let name = self.names.next(alias);
        self.parameters.bind(name.clone(), value);
        name
    }
}

const LIKE_ESCAPE: char = '\\';

/// Escapes the characters LIKE treats as wildcards so `text` matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '[' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}
