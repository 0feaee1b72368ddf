//! Free variable analysis, as needed by closure conversion and by passes
//! moving code across binders.

use std::collections::BTreeMap;

use super::{
    Program,
    ast::DefinitionKind,
    id::{ContOccur, ContVar, ContVarSet, Definition, Enclosing, Expression, Occur, Var, VarSet},
    visit::{Visitor, walk_node, walk_program},
};

/// Variables used below a node but bound above it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeVariables {
    pub vars: VarSet,
    pub cont_vars: ContVarSet,
}

impl FreeVariables {
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty() && self.cont_vars.is_empty()
    }
}

/// Free variables of the subtree headed by `node`. The name of a definition
/// counts as bound inside of it, so self-recursion does not make a function
/// capture itself.
pub fn free_variables(program: &Program, node: impl Into<Enclosing>) -> FreeVariables {
    let node = node.into();
    let mut collector = Collector::default();

    walk_node(&mut collector, program, node);

    if let Enclosing::Definition(definition) = node {
        match program.definition(definition).kind {
            DefinitionKind::Function { name, .. } => {
                collector.bound_vars.insert(name);
            }
            DefinitionKind::Continuation { name } => {
                collector.bound_conts.insert(name);
            }
            DefinitionKind::Root { .. } => {}
        }
    }

    collector.free()
}

/// Free variables of every function definition of the program
pub fn function_free_variables(program: &Program) -> BTreeMap<Definition, FreeVariables> {
    let mut functions = Functions::default();
    walk_program(&mut functions, program);

    functions
        .definitions
        .into_iter()
        .map(|definition| (definition, free_variables(program, definition)))
        .collect()
}

#[derive(Default)]
struct Collector {
    used_vars: VarSet,
    used_conts: ContVarSet,
    bound_vars: VarSet,
    bound_conts: ContVarSet,
}

impl Collector {
    fn free(self) -> FreeVariables {
        FreeVariables {
            vars: &self.used_vars - &self.bound_vars,
            cont_vars: &self.used_conts - &self.bound_conts,
        }
    }
}

impl Visitor for Collector {
    fn visit_var_binder(&mut self, _program: &Program, var: Var, _site: Enclosing) {
        self.bound_vars.insert(var);
    }

    fn visit_cont_binder(&mut self, _program: &Program, var: ContVar, _site: Enclosing) {
        self.bound_conts.insert(var);
    }

    fn visit_occurrence(&mut self, program: &Program, occurrence: Occur, _holder: Expression) {
        self.used_vars.insert(program.binding_variable(occurrence));
    }

    fn visit_cont_occurrence(
        &mut self,
        program: &Program,
        occurrence: ContOccur,
        _holder: Expression,
    ) {
        self.used_conts.insert(program.binding_variable(occurrence));
    }
}

#[derive(Default)]
struct Functions {
    definitions: Vec<Definition>,
}

impl Visitor for Functions {
    fn visit_definition(&mut self, program: &Program, definition: Definition) {
        if let DefinitionKind::Function { .. } = program.definition(definition).kind {
            self.definitions.push(definition);
        }

        super::visit::walk_definition(self, program, definition)
    }
}
