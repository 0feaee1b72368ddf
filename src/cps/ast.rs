//! Node shapes of the CPS tree. Shapes only ever hold handles, the nodes they
//! point to live in the [`Program`](super::Program) arena.

use super::{
    error::CaseError,
    id::{ContOccur, ContVar, Definition, Expression, Occur, Var},
    primitive::Primitive,
};
use crate::intern::InternedSymbol;

/// Tag of a case branch or of an allocated block
pub type Tag = u32;

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// Binds `var` to `value` for the rest of the term (`body`)
    Let {
        var: Var,
        value: Value,
        body: Expression,
    },
    /// A group of mutually recursive functions
    LetFunctions {
        definitions: Vec<Definition>,
        body: Expression,
    },
    /// A group of mutually recursive local continuations
    LetContinuations {
        definitions: Vec<Definition>,
        body: Expression,
    },
    /// `continuation(primitive(arguments...))`
    Primitive {
        primitive: Primitive,
        arguments: Vec<Occur>,
        continuation: ContOccur,
    },
    /// A call. There is no implicit return, the callee jumps to `continuation`
    Apply {
        function: Occur,
        arguments: Vec<Occur>,
        continuation: ContOccur,
    },
    /// A jump to a continuation
    Continue {
        continuation: ContOccur,
        arguments: Vec<Occur>,
    },
    /// Multi-way dispatch on the tag of `scrutinee`
    Case {
        scrutinee: Occur,
        branches: CaseMap,
        default: Option<Expression>,
    },
    Unreachable,
}

impl ExpressionKind {
    pub fn definitions(&self) -> &[Definition] {
        match self {
            ExpressionKind::LetFunctions { definitions, .. }
            | ExpressionKind::LetContinuations { definitions, .. } => definitions,
            _ => &[],
        }
    }

    /// Value occurrences held directly by this node
    pub fn occurrences(&self) -> Vec<Occur> {
        match self {
            ExpressionKind::Let { value, .. } => value.occurrences(),
            ExpressionKind::Primitive { arguments, .. }
            | ExpressionKind::Continue { arguments, .. } => arguments.clone(),
            ExpressionKind::Apply {
                function,
                arguments,
                ..
            } => std::iter::once(*function)
                .chain(arguments.iter().copied())
                .collect(),
            ExpressionKind::Case { scrutinee, .. } => vec![*scrutinee],
            ExpressionKind::LetFunctions { .. }
            | ExpressionKind::LetContinuations { .. }
            | ExpressionKind::Unreachable => Vec::new(),
        }
    }

    /// Swaps the child `old` for `new`, returns false if `old` is not a child
    pub(super) fn replace_child(&mut self, old: Expression, new: Expression) -> bool {
        match self {
            ExpressionKind::Let { body, .. }
            | ExpressionKind::LetFunctions { body, .. }
            | ExpressionKind::LetContinuations { body, .. } => {
                if *body == old {
                    *body = new;
                    return true;
                }
                false
            }
            ExpressionKind::Case {
                branches, default, ..
            } => {
                for (_, branch) in branches.0.iter_mut() {
                    if *branch == old {
                        *branch = new;
                        return true;
                    }
                }

                match default {
                    Some(d) if *d == old => {
                        *d = new;
                        true
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

/// A value bound by [`ExpressionKind::Let`]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Constant(Constant),
    /// A reference to another variable
    Var(Occur),
    /// Allocation of a tagged block
    Block { tag: Tag, fields: Vec<Occur> },
}

impl Value {
    pub fn occurrences(&self) -> Vec<Occur> {
        match self {
            Value::Constant(_) => Vec::new(),
            Value::Var(occ) => vec![*occ],
            Value::Block { fields, .. } => fields.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Unit,
    Int(i64),
    Bool(bool),
    String(InternedSymbol),
}

impl Constant {
    pub fn kind(&self) -> ValueKind {
        match self {
            Constant::Int(_) => ValueKind::Int,
            Constant::Bool(_) => ValueKind::Bool,
            Constant::Unit | Constant::String(_) => ValueKind::Any,
        }
    }
}

/// Branches of a case dispatch. Tags are unique and kept in ascending order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaseMap(pub(super) Vec<(Tag, Expression)>);

impl CaseMap {
    /// Sorts the branches by tag, rejecting tags that appear more than once
    pub fn from_branches(mut branches: Vec<(Tag, Expression)>) -> Result<Self, CaseError> {
        branches.sort_by_key(|(tag, _)| *tag);

        if let Some(pair) = branches.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(CaseError::DuplicateTag { tag: pair[0].0 });
        }

        Ok(Self(branches))
    }

    /// Checks the tags against the kind of the scrutinee. Tagged scrutinees
    /// need every tag in range and, without a default, every constructor
    /// covered.
    pub fn validate(&self, scrutinee: ValueKind, has_default: bool) -> Result<(), CaseError> {
        let ValueKind::Tagged { constructors } = scrutinee else {
            return Ok(());
        };

        if let Some(tag) = self.tags().find(|tag| *tag >= constructors) {
            return Err(CaseError::TagOutOfRange { tag, constructors });
        }

        if !has_default {
            let missing = (0..constructors)
                .filter(|tag| self.get(*tag).is_none())
                .collect::<Vec<_>>();

            if !missing.is_empty() {
                return Err(CaseError::NonExhaustive { missing });
            }
        }

        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tag, Expression)> + '_ {
        self.0.iter().copied()
    }

    pub fn get(&self, tag: Tag) -> Option<Expression> {
        self.0
            .binary_search_by_key(&tag, |(t, _)| *t)
            .ok()
            .map(|i| self.0[i].1)
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.0.iter().map(|(tag, _)| *tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The kind of value a variable holds, fixed when the variable is bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Any,
    Int,
    Bool,
    /// A block whose tag is one of `0..constructors`
    Tagged { constructors: Tag },
}

impl ValueKind {
    /// Whether a variable of this kind may be bound to `constant`
    pub fn admits_constant(self, constant: &Constant) -> bool {
        self == ValueKind::Any || constant.kind() == self
    }

    /// Whether a variable of this kind may hold a block tagged `tag`
    pub fn admits_block(self, tag: Tag) -> bool {
        match self {
            ValueKind::Any => true,
            ValueKind::Tagged { constructors } => tag < constructors,
            ValueKind::Int | ValueKind::Bool => false,
        }
    }

    /// Whether a variable of this kind may alias a variable of kind `source`.
    /// Values of kind `Any` are only known at run time and fit anywhere.
    pub fn admits_var(self, source: ValueKind) -> bool {
        self == ValueKind::Any || source == ValueKind::Any || source == self
    }
}

/// Calling convention of a function: kinds of its parameters and of the value
/// passed to its return continuation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionType {
    pub parameters: Vec<ValueKind>,
    pub result: ValueKind,
}

impl FunctionType {
    pub fn new(parameters: Vec<ValueKind>, result: ValueKind) -> Self {
        Self { parameters, result }
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionType {
    Function(FunctionType),
    Continuation { parameters: Vec<ValueKind> },
}

impl DefinitionType {
    pub fn parameters(&self) -> &[ValueKind] {
        match self {
            DefinitionType::Function(function_type) => &function_type.parameters,
            DefinitionType::Continuation { parameters } => parameters,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Visible outside of the compilation unit, never considered dead
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionKind {
    /// Entry point of the program. The only node without an enclosing node.
    Root { return_continuation: ContVar },
    Function {
        name: Var,
        return_continuation: ContVar,
        visibility: Visibility,
    },
    Continuation { name: ContVar },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionData {
    pub kind: DefinitionKind,
    pub parameters: Vec<Var>,
    pub definition_type: DefinitionType,
    pub body: Expression,
}

impl DefinitionData {
    /// The continuation a function (or the root) returns through
    pub fn return_continuation(&self) -> Option<ContVar> {
        match &self.kind {
            DefinitionKind::Root {
                return_continuation,
            }
            | DefinitionKind::Function {
                return_continuation,
                ..
            } => Some(*return_continuation),
            DefinitionKind::Continuation { .. } => None,
        }
    }

    /// Function definitions (and the root) delimit the reach of continuations
    pub fn is_function_boundary(&self) -> bool {
        !matches!(self.kind, DefinitionKind::Continuation { .. })
    }
}
