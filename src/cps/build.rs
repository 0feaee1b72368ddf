//! Factory operations for CPS trees.
//!
//! Trees are built bottom-up: variables are created fresh first, leaves mint
//! occurrences of them through [`Maker`]s, and binding forms bind them once
//! the subtree they scope over exists. Every operation validates all of its
//! inputs before touching the program, so a failed call leaves no trace.
//!
//! Subtrees stay *pending* (without an enclosing node) until they are used as
//! a child, handed to [`Builder::finish`] as the program root, or spliced in
//! by a change operation. Scoping of occurrences can only be judged once the
//! binders above them exist, so it is verified when a tree is finished or
//! spliced rather than leaf by leaf.

use hashbrown::HashSet;
use log::{debug, trace};

use super::{
    Program,
    ast::{
        CaseMap, Constant, DefinitionData, DefinitionKind, DefinitionType, ExpressionKind,
        FunctionType, Tag, Value, ValueKind, Visibility,
    },
    binders::{BinderRole, Binding, ContOccurMaker, Maker, OccurMaker, Occurrence, Variable},
    error::BuildError,
    id::{AnyVar, ContVar, Definition, Enclosing, Expression, Var},
    primitive::Primitive,
    program::{DefinitionNode, ExpressionNode},
};
use crate::intern::InternedSymbol;

/// The value bound by a `let`, with makers standing in for the occurrences
/// the value will hold
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSpec {
    Constant(Constant),
    Var(OccurMaker),
    Block { tag: Tag, fields: Vec<OccurMaker> },
}

impl ValueSpec {
    fn makers(&self) -> &[OccurMaker] {
        match self {
            ValueSpec::Constant(_) => &[],
            ValueSpec::Var(maker) => std::slice::from_ref(maker),
            ValueSpec::Block { fields, .. } => fields,
        }
    }
}

impl From<Constant> for ValueSpec {
    fn from(value: Constant) -> Self {
        ValueSpec::Constant(value)
    }
}

pub struct Builder<'p> {
    program: &'p mut Program,
}

impl Program {
    pub fn builder(&mut self) -> Builder<'_> {
        Builder { program: self }
    }
}

impl Builder<'_> {
    pub fn program(&self) -> &Program {
        &*self.program
    }

    pub fn fresh_var(&mut self, name: &str, kind: ValueKind) -> Var {
        self.program.vars.fresh(InternedSymbol::new(name), kind)
    }

    pub fn fresh_cont_var(&mut self, name: &str) -> ContVar {
        self.program
            .cont_vars
            .fresh(InternedSymbol::new(name), ValueKind::Any)
    }

    /* Expressions */

    pub fn let_(
        &mut self,
        var: Var,
        value: ValueSpec,
        body: Expression,
    ) -> Result<Expression, BuildError> {
        self.check_binders([var.any()])?;
        self.check_makers(value.makers())?;
        self.check_value_kind(var, &value)?;
        self.check_children(&[body.into()])?;

        let id = self.program.expressions.next_index();

        let value = match value {
            ValueSpec::Constant(constant) => Value::Constant(constant),
            ValueSpec::Var(maker) => Value::Var(self.mint(maker, id)),
            ValueSpec::Block { tag, fields } => Value::Block {
                tag,
                fields: self.mint_all(&fields, id),
            },
        };

        self.bind(var, id.into(), BinderRole::Let);
        self.attach(&[body.into()], id);

        Ok(self.push(id, ExpressionKind::Let { var, value, body }))
    }

    pub fn let_functions(
        &mut self,
        definitions: Vec<Definition>,
        body: Expression,
    ) -> Result<Expression, BuildError> {
        let names = self.group_names(&definitions, "function", |kind| match kind {
            DefinitionKind::Function { name, .. } => Some(name.any()),
            _ => None,
        })?;
        self.check_group_children(&definitions, body)?;

        let id = self.program.expressions.next_index();

        for name in names {
            if let AnyVar::Var(name) = name {
                self.bind(name, id.into(), BinderRole::GroupName);
            }
        }
        self.attach_group(&definitions, body, id);

        Ok(self.push(id, ExpressionKind::LetFunctions { definitions, body }))
    }

    pub fn let_continuations(
        &mut self,
        definitions: Vec<Definition>,
        body: Expression,
    ) -> Result<Expression, BuildError> {
        let names = self.group_names(&definitions, "continuation", |kind| match kind {
            DefinitionKind::Continuation { name } => Some(name.any()),
            _ => None,
        })?;
        self.check_group_children(&definitions, body)?;

        let id = self.program.expressions.next_index();

        for name in names {
            if let AnyVar::Cont(name) = name {
                self.bind(name, id.into(), BinderRole::GroupName);
            }
        }
        self.attach_group(&definitions, body, id);

        Ok(self.push(id, ExpressionKind::LetContinuations { definitions, body }))
    }

    pub fn primitive(
        &mut self,
        primitive: Primitive,
        arguments: Vec<OccurMaker>,
        continuation: ContOccurMaker,
    ) -> Result<Expression, BuildError> {
        if arguments.len() != primitive.arity() {
            return Err(BuildError::ArityMismatch {
                expected: primitive.arity(),
                found: arguments.len(),
            });
        }
        self.check_makers(&arguments)?;
        self.check_makers(&[continuation])?;

        let id = self.program.expressions.next_index();
        let arguments = self.mint_all(&arguments, id);
        let continuation = self.mint(continuation, id);

        Ok(self.push(
            id,
            ExpressionKind::Primitive {
                primitive,
                arguments,
                continuation,
            },
        ))
    }

    pub fn apply(
        &mut self,
        function: OccurMaker,
        arguments: Vec<OccurMaker>,
        continuation: ContOccurMaker,
    ) -> Result<Expression, BuildError> {
        self.check_makers(&[function])?;
        self.check_makers(&arguments)?;
        self.check_makers(&[continuation])?;

        let id = self.program.expressions.next_index();
        let function = self.mint(function, id);
        let arguments = self.mint_all(&arguments, id);
        let continuation = self.mint(continuation, id);

        Ok(self.push(
            id,
            ExpressionKind::Apply {
                function,
                arguments,
                continuation,
            },
        ))
    }

    pub fn continue_(
        &mut self,
        continuation: ContOccurMaker,
        arguments: Vec<OccurMaker>,
    ) -> Result<Expression, BuildError> {
        self.check_makers(&[continuation])?;
        self.check_makers(&arguments)?;

        let id = self.program.expressions.next_index();
        let continuation = self.mint(continuation, id);
        let arguments = self.mint_all(&arguments, id);

        Ok(self.push(
            id,
            ExpressionKind::Continue {
                continuation,
                arguments,
            },
        ))
    }

    /// A dispatch on the tag of `scrutinee`. Tags must be unique; when the
    /// scrutinee is of a tagged kind they must also be in range and, without a
    /// default branch, cover every constructor.
    pub fn case(
        &mut self,
        scrutinee: OccurMaker,
        branches: Vec<(Tag, Expression)>,
        default: Option<Expression>,
    ) -> Result<Expression, BuildError> {
        self.check_makers(&[scrutinee])?;

        let children = branches
            .iter()
            .map(|(_, branch)| Enclosing::Expression(*branch))
            .chain(default.map(Enclosing::Expression))
            .collect::<Vec<_>>();
        self.check_children(&children)?;

        let branches = CaseMap::from_branches(branches)?;
        branches.validate(self.program.kind(scrutinee.var), default.is_some())?;

        let id = self.program.expressions.next_index();
        let scrutinee = self.mint(scrutinee, id);
        self.attach(&children, id);

        Ok(self.push(
            id,
            ExpressionKind::Case {
                scrutinee,
                branches,
                default,
            },
        ))
    }

    pub fn unreachable(&mut self) -> Expression {
        let id = self.program.expressions.next_index();
        self.push(id, ExpressionKind::Unreachable)
    }

    /* Definitions */

    /// A function to be placed in a [`let_functions`](Self::let_functions)
    /// group, which is what binds `name`
    pub fn function(
        &mut self,
        name: Var,
        return_continuation: ContVar,
        parameters: Vec<Var>,
        function_type: FunctionType,
        visibility: Visibility,
        body: Expression,
    ) -> Result<Definition, BuildError> {
        let binders = std::iter::once(name.any())
            .chain(std::iter::once(return_continuation.any()))
            .chain(parameters.iter().map(|p| p.any()));
        self.check_binders(binders)?;
        self.check_parameter_kinds(&parameters, &function_type.parameters)?;
        self.check_children(&[body.into()])?;

        Ok(self.push_definition(
            DefinitionKind::Function {
                name,
                return_continuation,
                visibility,
            },
            parameters,
            DefinitionType::Function(function_type),
            body,
        ))
    }

    /// A continuation to be placed in a
    /// [`let_continuations`](Self::let_continuations) group. Its type is given
    /// by the kinds of its parameters.
    pub fn continuation(
        &mut self,
        name: ContVar,
        parameters: Vec<Var>,
        body: Expression,
    ) -> Result<Definition, BuildError> {
        let binders = std::iter::once(name.any()).chain(parameters.iter().map(|p| p.any()));
        self.check_binders(binders)?;
        self.check_children(&[body.into()])?;

        let kinds = parameters.iter().map(|p| self.program.kind(*p)).collect();

        Ok(self.push_definition(
            DefinitionKind::Continuation { name },
            parameters,
            DefinitionType::Continuation { parameters: kinds },
            body,
        ))
    }

    /// The entry point of the program, see [`finish`](Self::finish)
    pub fn root(
        &mut self,
        return_continuation: ContVar,
        parameters: Vec<Var>,
        function_type: FunctionType,
        body: Expression,
    ) -> Result<Definition, BuildError> {
        let binders =
            std::iter::once(return_continuation.any()).chain(parameters.iter().map(|p| p.any()));
        self.check_binders(binders)?;
        self.check_parameter_kinds(&parameters, &function_type.parameters)?;
        self.check_children(&[body.into()])?;

        Ok(self.push_definition(
            DefinitionKind::Root {
                return_continuation,
            },
            parameters,
            DefinitionType::Function(function_type),
            body,
        ))
    }

    /// Installs `root` as the program root after verifying that every
    /// occurrence in the tree is in scope and carries the right recursivity
    pub fn finish(&mut self, root: Definition) -> Result<(), BuildError> {
        if self.program.root.is_some() {
            return Err(BuildError::RootAlreadyInstalled);
        }

        if !self.program.is_live_definition(root) {
            return Err(BuildError::UnknownNode(root.into()));
        }

        if !matches!(
            self.program.definition(root).kind,
            DefinitionKind::Root { .. }
        ) {
            return Err(BuildError::WrongDefinitionKind {
                definition: root,
                expected: "root",
            });
        }

        let resolution = self.program.resolve_subtree(root.into(), None)?;

        for (occurrence, expected) in resolution.occurrences {
            if self.program.recursivity(occurrence) != expected {
                return Err(BuildError::WrongRecursivity {
                    occurrence: occurrence.any(),
                    expected,
                });
            }
        }

        for (occurrence, expected) in resolution.cont_occurrences {
            if self.program.recursivity(occurrence) != expected {
                return Err(BuildError::WrongRecursivity {
                    occurrence: occurrence.any(),
                    expected,
                });
            }
        }

        debug!("installed {root} as program root");
        self.program.root = Some(root);

        Ok(())
    }

    /* Validation */

    fn check_var<V: Variable>(&self, var: V) -> Result<(), BuildError> {
        if self.program.is_live_var(var) {
            Ok(())
        } else {
            Err(BuildError::UnknownVariable(var.any()))
        }
    }

    fn check_makers<V: Variable>(&self, makers: &[Maker<V>]) -> Result<(), BuildError> {
        makers.iter().try_for_each(|maker| self.check_var(maker.var))
    }

    /// Binders must exist, be fresh and be distinct
    fn check_binders(&self, binders: impl IntoIterator<Item = AnyVar>) -> Result<(), BuildError> {
        let mut seen = HashSet::new();

        for binder in binders {
            let binding = match binder {
                AnyVar::Var(var) => {
                    self.check_var(var)?;
                    self.program.vars.var(var).binding
                }
                AnyVar::Cont(var) => {
                    self.check_var(var)?;
                    self.program.cont_vars.var(var).binding
                }
            };

            if binding.is_some() {
                return Err(BuildError::AlreadyBound(binder));
            }

            if !seen.insert(binder) {
                return Err(BuildError::DuplicateBinder(binder));
            }
        }

        Ok(())
    }

    /// Children must exist, be pending and be distinct
    fn check_children(&self, children: &[Enclosing]) -> Result<(), BuildError> {
        let mut seen = HashSet::new();

        for child in children {
            if !self.program.is_live_node(*child) {
                return Err(BuildError::UnknownNode(*child));
            }

            if self.program.root.map(Enclosing::Definition) == Some(*child) {
                return Err(BuildError::IsRoot(*child));
            }

            if self.program.enclosing(*child).is_some() {
                return Err(BuildError::AlreadyAttached(*child));
            }

            if !seen.insert(*child) {
                return Err(BuildError::DuplicateChild(*child));
            }
        }

        Ok(())
    }

    fn check_value_kind(&self, var: Var, value: &ValueSpec) -> Result<(), BuildError> {
        let kind = self.program.kind(var);

        let admitted = match value {
            ValueSpec::Constant(constant) => kind.admits_constant(constant),
            ValueSpec::Var(maker) => kind.admits_var(self.program.kind(maker.var)),
            ValueSpec::Block { tag, .. } => kind.admits_block(*tag),
        };

        if admitted {
            Ok(())
        } else {
            Err(BuildError::IncompatibleValue {
                variable: var,
                kind,
            })
        }
    }

    fn check_parameter_kinds(
        &self,
        parameters: &[Var],
        expected: &[ValueKind],
    ) -> Result<(), BuildError> {
        if parameters.len() != expected.len() {
            return Err(BuildError::ArityMismatch {
                expected: expected.len(),
                found: parameters.len(),
            });
        }

        for (parameter, expected) in parameters.iter().zip(expected) {
            let found = self.program.kind(*parameter);

            if found != *expected {
                return Err(BuildError::KindMismatch {
                    variable: *parameter,
                    expected: *expected,
                    found,
                });
            }
        }

        Ok(())
    }

    /// Checks that every definition has the expected kind and that the names
    /// it binds are fresh, returning them
    fn group_names(
        &self,
        definitions: &[Definition],
        expected: &'static str,
        name: impl Fn(&DefinitionKind) -> Option<AnyVar>,
    ) -> Result<Vec<AnyVar>, BuildError> {
        if definitions.is_empty() {
            return Err(BuildError::EmptyGroup);
        }

        let mut names = Vec::with_capacity(definitions.len());

        for definition in definitions {
            if !self.program.is_live_definition(*definition) {
                return Err(BuildError::UnknownNode((*definition).into()));
            }

            match name(&self.program.definition(*definition).kind) {
                Some(name) => names.push(name),
                None => {
                    return Err(BuildError::WrongDefinitionKind {
                        definition: *definition,
                        expected,
                    });
                }
            }
        }

        self.check_binders(names.iter().copied())?;

        Ok(names)
    }

    fn check_group_children(
        &self,
        definitions: &[Definition],
        body: Expression,
    ) -> Result<(), BuildError> {
        let children = definitions
            .iter()
            .map(|d| Enclosing::Definition(*d))
            .chain(std::iter::once(Enclosing::Expression(body)))
            .collect::<Vec<_>>();

        self.check_children(&children)
    }

    /* Mutation, only reached once everything is validated */

    fn mint<V: Variable>(&mut self, maker: Maker<V>, holder: Expression) -> V::Occurrence {
        V::table_mut(self.program).mint(maker.var, maker.recursivity, holder)
    }

    fn mint_all<V: Variable>(
        &mut self,
        makers: &[Maker<V>],
        holder: Expression,
    ) -> Vec<V::Occurrence> {
        makers.iter().map(|maker| self.mint(*maker, holder)).collect()
    }

    fn bind<V: Variable>(&mut self, var: V, site: Enclosing, role: BinderRole) {
        V::table_mut(self.program).bind(var, Binding { site, role });
    }

    fn attach(&mut self, children: &[Enclosing], parent: Expression) {
        for child in children {
            match child {
                Enclosing::Expression(expression) => {
                    self.program.expressions[*expression].enclosing = Some(parent.into());
                }
                Enclosing::Definition(definition) => {
                    self.program.definitions[*definition].enclosing = Some(parent);
                }
            }
        }
    }

    fn attach_group(&mut self, definitions: &[Definition], body: Expression, parent: Expression) {
        for definition in definitions {
            self.program.definitions[*definition].enclosing = Some(parent);
        }
        self.program.expressions[body].enclosing = Some(parent.into());
    }

    fn push(&mut self, id: Expression, kind: ExpressionKind) -> Expression {
        trace!("built {id}: {kind:?}");

        let pushed = self.program.expressions.push(ExpressionNode {
            kind,
            enclosing: None,
        });
        debug_assert_eq!(pushed, id);

        pushed
    }

    fn push_definition(
        &mut self,
        kind: DefinitionKind,
        parameters: Vec<Var>,
        definition_type: DefinitionType,
        body: Expression,
    ) -> Definition {
        let id = self.program.definitions.next_index();
        let site = Enclosing::Definition(id);

        if let Some(return_continuation) = match &kind {
            DefinitionKind::Root {
                return_continuation,
            }
            | DefinitionKind::Function {
                return_continuation,
                ..
            } => Some(*return_continuation),
            DefinitionKind::Continuation { .. } => None,
        } {
            self.bind(return_continuation, site, BinderRole::ReturnContinuation);
        }

        for parameter in &parameters {
            self.bind(*parameter, site, BinderRole::Parameter);
        }

        self.program.expressions[body].enclosing = Some(site);

        trace!("built {id}: {kind:?}");

        self.program.definitions.push(DefinitionNode {
            data: DefinitionData {
                kind,
                parameters,
                definition_type,
                body,
            },
            enclosing: None,
        })
    }
}
