//! Boundary layout of a call.
//!
//! Both emitters lay out entry points from the same [`CallPlan`], so every
//! ctypes `argtypes` list matches the cgo prototype it binds to, and a
//! symbol one emitter cannot express is dropped by both.

use gobridge_ir::{ParsedParam, ParsedType, Signature};
use thiserror::Error;

use crate::mapping::{classify, CompositeKind, MappingError, StructRegistry, Transfer};
use crate::naming::{c_param_name, capitalize};

/// How one parameter or result is spelled in the C prototype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A single C value: primitive, string or handle
    Scalar,
    /// Pointer plus a `C.int` element count
    Buffer,
    /// Pointer to exactly n elements
    Fixed(usize),
    /// Nullable pointer to one primitive, written back after the call
    Pointer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// C parameter name. For results this is the out-parameter name.
    pub name: String,
    pub ty: ParsedType,
    pub transfer: Transfer,
    pub shape: Shape,
}

impl Slot {
    /// Element strategy of a buffer or fixed array.
    pub fn elem(&self) -> Option<(&ParsedType, &Transfer)> {
        match &self.transfer {
            Transfer::Composite { elem, .. } => self.ty.elem().map(|ty| (ty, elem.as_ref())),
            _ => None,
        }
    }

    pub fn is_bytes(&self) -> bool {
        matches!(
            self.transfer,
            Transfer::Composite {
                kind: CompositeKind::Bytes,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPlan {
    pub params: Vec<Slot>,
    /// Non-error results, in declaration order
    pub results: Vec<Slot>,
    /// Position of the error among the declared results
    pub error_position: Option<usize>,
    /// The single result is the C return value rather than an out-parameter
    pub direct: bool,
}

impl CallPlan {
    pub fn has_error(&self) -> bool {
        self.error_position.is_some()
    }

    /// The directly returned result, if any.
    pub fn returned(&self) -> Option<&Slot> {
        if self.direct {
            self.results.first()
        } else {
            None
        }
    }

    /// Total number of results the Go callee declares.
    pub fn arity(&self) -> usize {
        self.results.len() + usize::from(self.has_error())
    }
}

/// Why a callable has no C entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("variadic functions are not supported")]
    Variadic,

    #[error("error-typed parameter {0} is not supported")]
    ErrorParam(String),

    #[error("nested composite {0} is not supported")]
    Nested(String),

    #[error("pointer result {0} is not supported")]
    PointerResult(String),

    #[error("more than one error result")]
    MultipleErrors,

    #[error("array length of {0} is not a literal")]
    UnknownLength(String),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// Lay out a function or method signature.
pub fn plan(sig: Signature<'_>, structs: &StructRegistry) -> Result<CallPlan, PlanError> {
    if sig.is_variadic {
        return Err(PlanError::Variadic);
    }

    let mut params = Vec::with_capacity(sig.params.len());
    if let Some(p) = sig
        .params
        .iter()
        .chain(sig.results)
        .find(|p| p.ty.has_unknown_len())
    {
        return Err(PlanError::UnknownLength(p.ty.name.clone()));
    }

    for (i, param) in sig.params.iter().enumerate() {
        let transfer = classify(&param.ty, structs)?;
        if transfer == Transfer::ErrorOut {
            return Err(PlanError::ErrorParam(c_param_name(&param.name, i)));
        }
        let shape = shape_of(&param.ty, &transfer)?;
        params.push(Slot {
            name: c_param_name(&param.name, i),
            ty: param.ty.clone(),
            transfer,
            shape,
        });
    }

    let mut results: Vec<Slot> = Vec::new();
    let mut error_position = None;
    for (i, result) in sig.results.iter().enumerate() {
        let transfer = classify(&result.ty, structs)?;
        if transfer == Transfer::ErrorOut {
            if error_position.replace(i).is_some() {
                return Err(PlanError::MultipleErrors);
            }
            continue;
        }
        let shape = shape_of(&result.ty, &transfer)?;
        if shape == Shape::Pointer {
            return Err(PlanError::PointerResult(result.ty.name.clone()));
        }
        results.push(Slot {
            name: out_name(result, results.len()),
            ty: result.ty.clone(),
            transfer,
            shape,
        });
    }

    let direct = error_position.is_none() && results.len() == 1;
    Ok(CallPlan {
        params,
        results,
        error_position,
        direct,
    })
}

/// Layout of a field getter: no parameters, the field as the only result.
pub fn plan_getter(ty: &ParsedType, structs: &StructRegistry) -> Result<CallPlan, PlanError> {
    let results = [ParsedParam::unnamed(ty.clone())];
    plan(
        Signature {
            params: &[],
            results: &results,
            is_variadic: false,
        },
        structs,
    )
}

/// Layout of a field setter: the new value as the only parameter.
pub fn plan_setter(ty: &ParsedType, structs: &StructRegistry) -> Result<CallPlan, PlanError> {
    let params = [ParsedParam::new("value", ty.clone())];
    let mut plan = plan(
        Signature {
            params: &params,
            results: &[],
            is_variadic: false,
        },
        structs,
    )?;
    // "value" is reserved for exactly this slot
    plan.params[0].name = "value".to_string();
    Ok(plan)
}

fn shape_of(ty: &ParsedType, transfer: &Transfer) -> Result<Shape, PlanError> {
    match transfer {
        Transfer::Composite { kind, elem, len } => {
            let nested = match kind {
                CompositeKind::Pointer => !matches!(elem.as_ref(), Transfer::Value(_)),
                _ => !matches!(
                    elem.as_ref(),
                    Transfer::Value(_) | Transfer::OwnedString | Transfer::Handle { .. }
                ),
            };
            if nested {
                return Err(PlanError::Nested(ty.name.clone()));
            }
            Ok(match kind {
                CompositeKind::Bytes | CompositeKind::Slice => Shape::Buffer,
                CompositeKind::Array => Shape::Fixed(*len),
                CompositeKind::Pointer => Shape::Pointer,
            })
        }
        _ => Ok(Shape::Scalar),
    }
}

fn out_name(result: &ParsedParam, index: usize) -> String {
    if result.name.is_empty() || result.name == "_" {
        format!("out{index}")
    } else {
        format!("out{}", capitalize(&result.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobridge_ir::{ParsedFunc, TypeKind};
    use pretty_assertions::assert_eq;

    fn registry() -> StructRegistry {
        StructRegistry::new(["Point"])
    }

    fn func(params: Vec<ParsedParam>, results: Vec<ParsedParam>) -> ParsedFunc {
        let mut f = ParsedFunc::new("F");
        f.params = params;
        f.results = results;
        f
    }

    fn int() -> ParsedType {
        ParsedType::primitive("int")
    }

    #[test]
    fn test_single_result_is_direct() {
        let f = func(
            vec![ParsedParam::new("a", int()), ParsedParam::new("b", int())],
            vec![ParsedParam::unnamed(int())],
        );
        let plan = plan(f.signature(), &registry()).unwrap();
        assert!(plan.direct);
        assert_eq!(plan.returned().unwrap().shape, Shape::Scalar);
        let names: Vec<_> = plan.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_error_forces_out_params() {
        let f = func(
            vec![ParsedParam::new("a", ParsedType::primitive("float64"))],
            vec![
                ParsedParam::unnamed(ParsedType::primitive("float64")),
                ParsedParam::unnamed(ParsedType::error()),
            ],
        );
        let plan = plan(f.signature(), &registry()).unwrap();
        assert!(!plan.direct);
        assert_eq!(plan.error_position, Some(1));
        assert_eq!(plan.results[0].name, "out0");
        assert_eq!(plan.arity(), 2);
    }

    #[test]
    fn test_named_results() {
        let f = func(
            vec![],
            vec![
                ParsedParam::new("head", ParsedType::string()),
                ParsedParam::new("tail", ParsedType::string()),
            ],
        );
        let plan = plan(f.signature(), &registry()).unwrap();
        let names: Vec<_> = plan.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["outHead", "outTail"]);
    }

    #[test]
    fn test_shapes() {
        let f = func(
            vec![
                ParsedParam::new("data", ParsedType::slice(ParsedType::primitive("byte"))),
                ParsedParam::new("nums", ParsedType::array(int(), 4)),
                ParsedParam::new("n", ParsedType::pointer(int())),
                ParsedParam::new("p", ParsedType::pointer(ParsedType::structure("Point"))),
            ],
            vec![],
        );
        let plan = plan(f.signature(), &registry()).unwrap();
        let shapes: Vec<_> = plan.params.iter().map(|p| p.shape).collect();
        assert_eq!(
            shapes,
            vec![Shape::Buffer, Shape::Fixed(4), Shape::Pointer, Shape::Scalar]
        );
        assert!(plan.params[0].is_bytes());
    }

    #[test]
    fn test_drop_rules() {
        let reg = registry();

        let mut variadic = func(vec![ParsedParam::new("xs", ParsedType::variadic(int()))], vec![]);
        variadic.is_variadic = true;
        assert_eq!(plan(variadic.signature(), &reg), Err(PlanError::Variadic));

        let error_param = func(vec![ParsedParam::new("err", ParsedType::error())], vec![]);
        assert!(matches!(
            plan(error_param.signature(), &reg),
            Err(PlanError::ErrorParam(_))
        ));

        let nested = func(
            vec![ParsedParam::new("grid", ParsedType::slice(ParsedType::slice(int())))],
            vec![],
        );
        assert_eq!(
            plan(nested.signature(), &reg),
            Err(PlanError::Nested("[][]int".into()))
        );

        let pointer_result = func(vec![], vec![ParsedParam::unnamed(ParsedType::pointer(int()))]);
        assert!(matches!(
            plan(pointer_result.signature(), &reg),
            Err(PlanError::PointerResult(_))
        ));

        let two_errors = func(
            vec![],
            vec![
                ParsedParam::unnamed(ParsedType::error()),
                ParsedParam::unnamed(ParsedType::error()),
            ],
        );
        assert_eq!(plan(two_errors.signature(), &reg), Err(PlanError::MultipleErrors));

        let unknown_len = func(
            vec![ParsedParam::new("xs", ParsedType::array_of_unknown_len(int()))],
            vec![ParsedParam::unnamed(int())],
        );
        assert_eq!(
            plan(unknown_len.signature(), &reg),
            Err(PlanError::UnknownLength("[?]int".into()))
        );
        let unknown_in_map = func(
            vec![],
            vec![ParsedParam::unnamed(ParsedType::map(
                ParsedType::string(),
                ParsedType::array_of_unknown_len(int()),
            ))],
        );
        assert!(matches!(
            plan(unknown_in_map.signature(), &reg),
            Err(PlanError::UnknownLength(_))
        ));

        let mut chan = ParsedType::primitive("chan int");
        chan.kind = TypeKind::Chan;
        let chan_param = func(vec![ParsedParam::new("ch", chan)], vec![]);
        assert!(matches!(
            plan(chan_param.signature(), &reg),
            Err(PlanError::Mapping(_))
        ));
    }

    #[test]
    fn test_keyword_params_are_renamed() {
        let f = func(
            vec![
                ParsedParam::new("int", int()),
                ParsedParam::unnamed(int()),
                ParsedParam::new("handle", int()),
            ],
            vec![],
        );
        let plan = plan(f.signature(), &registry()).unwrap();
        let names: Vec<_> = plan.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["int_", "arg1", "handle_"]);
    }

    #[test]
    fn test_accessor_plans() {
        let reg = registry();
        let getter = plan_getter(&ParsedType::string(), &reg).unwrap();
        assert!(getter.direct && getter.params.is_empty());

        let setter = plan_setter(&int(), &reg).unwrap();
        assert_eq!(setter.params[0].name, "value");
        assert!(setter.results.is_empty());

        assert!(plan_getter(&ParsedType::pointer(int()), &reg).is_err());
    }
}
