//! Size expressions for derived fields.
//!
//! A [SizeExpr] is a signed sum of operands: constants, sibling values, array
//! counts and the byte span of a sibling field range. Expressions without a
//! [Operand::SizeOf] term can be evaluated as soon as the builder holds the
//! referenced values; the others need the measured region to be written first
//! and are resolved by reserving the slot and patching it afterwards.

use crate::{
    compiled::{CompiledField, CompiledKind, CompiledLen},
    errors::CompileError,
    field::{Field, FieldKind},
};

/// Sum of signed terms.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SizeExpr {
    pub terms: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub sign: Sign,
    pub operand: Operand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

/// A value the expression can refer to. Names are siblings in the same struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Const(u64),
    /// Value of an integer, enum or constant sibling.
    ValueOf(String),
    /// Element count of an array sibling.
    CountOf(String),
    /// Encoded byte length of the siblings `from..=to`.
    SizeOf { from: String, to: String },
}

impl Operand {
    /// Encoded byte length of a single sibling.
    pub fn size_of(field: impl Into<String>) -> Self {
        let field = field.into();
        Operand::SizeOf {
            from: field.clone(),
            to: field,
        }
    }

    /// Encoded byte length of the siblings `from..=to`.
    pub fn size_of_range(from: impl Into<String>, to: impl Into<String>) -> Self {
        Operand::SizeOf {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn value_of(field: impl Into<String>) -> Self {
        Operand::ValueOf(field.into())
    }

    pub fn count_of(field: impl Into<String>) -> Self {
        Operand::CountOf(field.into())
    }
}

impl SizeExpr {
    pub fn new() -> Self {
        SizeExpr::default()
    }

    pub fn plus(mut self, operand: Operand) -> Self {
        self.terms.push(Term {
            sign: Sign::Plus,
            operand,
        });
        self
    }

    pub fn minus(mut self, operand: Operand) -> Self {
        self.terms.push(Term {
            sign: Sign::Minus,
            operand,
        });
        self
    }
}

/// [Operand] with sibling names resolved to field indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompiledOperand {
    Const(u64),
    ValueOf(usize),
    CountOf(usize),
    SizeOf { from: usize, to: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledTerm {
    pub negate: bool,
    pub operand: CompiledOperand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledExpr {
    pub terms: Vec<CompiledTerm>,
}

impl CompiledExpr {
    /// Resolves names against `siblings`, the descriptor of the enclosing struct.
    pub fn compile(expr: &SizeExpr, siblings: &[Field]) -> Result<Self, CompileError> {
        let index_of = |name: &str| {
            siblings
                .iter()
                .position(|f| f.name == name)
                .ok_or_else(|| CompileError::UnknownReference(name.to_string()))
        };

        let mut terms = Vec::with_capacity(expr.terms.len());
        for term in &expr.terms {
            let operand = match &term.operand {
                Operand::Const(value) => CompiledOperand::Const(*value),
                Operand::ValueOf(name) => {
                    let index = index_of(name)?;
                    match siblings[index].kind {
                        FieldKind::Primitive(_) | FieldKind::Enum(_) | FieldKind::Constant(_) => {}
                        _ => return Err(CompileError::InvalidReference(name.clone())),
                    }
                    CompiledOperand::ValueOf(index)
                }
                Operand::CountOf(name) => {
                    let index = index_of(name)?;
                    if !matches!(siblings[index].kind, FieldKind::Array(_)) {
                        return Err(CompileError::InvalidReference(name.clone()));
                    }
                    CompiledOperand::CountOf(index)
                }
                Operand::SizeOf { from, to } => {
                    let from_index = index_of(from)?;
                    let to_index = index_of(to)?;
                    if from_index > to_index {
                        return Err(CompileError::ReversedRange {
                            from: from.clone(),
                            to: to.clone(),
                        });
                    }
                    CompiledOperand::SizeOf {
                        from: from_index,
                        to: to_index,
                    }
                }
            };

            terms.push(CompiledTerm {
                negate: term.sign == Sign::Minus,
                operand,
            });
        }

        Ok(CompiledExpr { terms })
    }

    /// Whether the expression needs the byte span of written fields.
    pub fn measures_region(&self) -> bool {
        self.terms
            .iter()
            .any(|t| matches!(t.operand, CompiledOperand::SizeOf { .. }))
    }

    /// Sums the terms, resolving each operand with `resolve`.
    pub fn evaluate<E>(
        &self,
        mut resolve: impl FnMut(CompiledOperand) -> Result<i128, E>,
    ) -> Result<i128, E> {
        let mut total = 0i128;
        for term in &self.terms {
            let value = resolve(term.operand)?;
            if term.negate {
                total -= value;
            } else {
                total += value;
            }
        }

        Ok(total)
    }

    /// Value of the expression if it depends on nothing but the schema.
    pub fn static_value(&self, siblings: &[CompiledField]) -> Option<i128> {
        self.evaluate(|operand| match operand {
            CompiledOperand::Const(value) => Ok(value as i128),
            CompiledOperand::ValueOf(index) => match &siblings[index].kind {
                CompiledKind::Constant(constant) => Ok(constant.value as i128),
                _ => Err(()),
            },
            CompiledOperand::CountOf(index) => match &siblings[index].kind {
                CompiledKind::Array(array) => match array.len {
                    CompiledLen::Fixed(count) => Ok(count as i128),
                    CompiledLen::Bounded { .. } => Err(()),
                },
                _ => Err(()),
            },
            CompiledOperand::SizeOf { from, to } => siblings[from..=to]
                .iter()
                .try_fold(0i128, |acc, f| {
                    f.kind.fixed_width().map(|w| acc + w as i128).ok_or(())
                }),
        })
        .ok()
    }
}

#[cfg(feature = "serde")]
impl From<Vec<crate::serde::TermDef>> for SizeExpr {
    fn from(value: Vec<crate::serde::TermDef>) -> Self {
        use crate::serde::OperandDef;

        let terms = value
            .into_iter()
            .map(|term| Term {
                sign: if term.negate { Sign::Minus } else { Sign::Plus },
                operand: match term.operand {
                    OperandDef::Const(value) => Operand::Const(value),
                    OperandDef::ValueOf(name) => Operand::ValueOf(name),
                    OperandDef::CountOf(name) => Operand::CountOf(name),
                    OperandDef::SizeOf { from, to } => Operand::SizeOf { from, to },
                },
            })
            .collect();

        SizeExpr { terms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn siblings() -> Vec<Field> {
        vec![
            Field::uint("size", 1),
            Field::uint("a", 2),
            Field::new(
                "items",
                FieldKind::Array(crate::field::ArraySpec::fixed(
                    FieldKind::Primitive(crate::field::PrimitiveSpec::unsigned(1)),
                    4,
                )),
            ),
        ]
    }

    #[test]
    fn test_compile_resolves_names() {
        let expr = SizeExpr::new()
            .plus(Operand::Const(10))
            .minus(Operand::value_of("a"))
            .plus(Operand::count_of("items"))
            .plus(Operand::size_of_range("a", "items"));

        let compiled = CompiledExpr::compile(&expr, &siblings()).unwrap();
        assert_eq!(
            compiled.terms,
            vec![
                CompiledTerm {
                    negate: false,
                    operand: CompiledOperand::Const(10)
                },
                CompiledTerm {
                    negate: true,
                    operand: CompiledOperand::ValueOf(1)
                },
                CompiledTerm {
                    negate: false,
                    operand: CompiledOperand::CountOf(2)
                },
                CompiledTerm {
                    negate: false,
                    operand: CompiledOperand::SizeOf { from: 1, to: 2 }
                },
            ]
        );
        assert!(compiled.measures_region());
    }

    #[test]
    fn test_compile_rejects_bad_references() {
        let unknown = SizeExpr::new().plus(Operand::value_of("missing"));
        assert_eq!(
            CompiledExpr::compile(&unknown, &siblings()).unwrap_err(),
            CompileError::UnknownReference("missing".to_string())
        );

        let count_of_int = SizeExpr::new().plus(Operand::count_of("a"));
        assert_eq!(
            CompiledExpr::compile(&count_of_int, &siblings()).unwrap_err(),
            CompileError::InvalidReference("a".to_string())
        );

        let reversed = SizeExpr::new().plus(Operand::size_of_range("items", "a"));
        assert_eq!(
            CompiledExpr::compile(&reversed, &siblings()).unwrap_err(),
            CompileError::ReversedRange {
                from: "items".to_string(),
                to: "a".to_string()
            }
        );
    }

    #[test]
    fn test_evaluate() {
        let expr = SizeExpr::new()
            .plus(Operand::Const(100))
            .minus(Operand::Const(50))
            .plus(Operand::value_of("a"));
        let compiled = CompiledExpr::compile(&expr, &siblings()).unwrap();
        assert!(!compiled.measures_region());

        let value = compiled.evaluate::<()>(|operand| match operand {
            CompiledOperand::Const(v) => Ok(v as i128),
            CompiledOperand::ValueOf(_) => Ok(6),
            _ => Err(()),
        });
        assert_eq!(value, Ok(56));
    }
}
