use std::fmt::Write;

use colored::Colorize;
use itertools::Itertools;

use super::{
    Program,
    ast::{Constant, DefinitionKind, ExpressionKind, Tag, Value, Visibility},
    binders::{Occurrence, Variable},
    id::{Definition, Expression, Occur, Recursivity},
    visit::{Visitor, walk_program},
};

/// Renders the whole program, coloured for a terminal
pub fn pretty_print(program: &Program) -> String {
    let mut printer = Printer::default();
    walk_program(&mut printer, program);
    printer.out
}

/// Same as [`pretty_print`] without the colours
pub fn pretty_print_plain(program: &Program) -> String {
    strip_ansi_escapes::strip_str(pretty_print(program))
}

/// Renders the subtree headed by `expression`, attached or not
pub fn render_expression(program: &Program, expression: Expression) -> String {
    let mut printer = Printer::default();
    printer.visit_expression(program, expression);
    strip_ansi_escapes::strip_str(printer.out)
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line(&mut self, text: impl core::fmt::Display) {
        let _ = writeln!(self.out, "{}{text}", "    ".repeat(self.indent));
    }

    fn indented(&mut self, f: impl FnOnce(&mut Self)) {
        self.indent += 1;
        f(self);
        self.indent -= 1;
    }
}

fn var<V: Variable>(program: &Program, var: V) -> String {
    let text = format!("{}/{}", program.name(var), var.index());

    if V::IS_CONTINUATION {
        text.blue().to_string()
    } else {
        text.yellow().to_string()
    }
}

fn occurrence<O: Occurrence>(program: &Program, occurrence: O) -> String {
    let name = var(program, program.binding_variable(occurrence));

    match program.recursivity(occurrence) {
        Recursivity::Recursive => format!("{name}{}", "*".red()),
        Recursivity::NonRecursive => name,
    }
}

fn arguments(program: &Program, arguments: &[Occur]) -> String {
    arguments
        .iter()
        .map(|argument| occurrence(program, *argument))
        .join(", ")
}

fn value(program: &Program, value: &Value) -> String {
    match value {
        Value::Constant(Constant::Unit) => "()".purple().to_string(),
        Value::Constant(Constant::Int(n)) => n.to_string().purple().to_string(),
        Value::Constant(Constant::Bool(b)) => b.to_string().purple().to_string(),
        Value::Constant(Constant::String(s)) => format!("{:?}", s.value()).green().to_string(),
        Value::Var(o) => occurrence(program, *o),
        Value::Block { tag, fields } => format!(
            "{} {}({})",
            "block".cyan(),
            tag.to_string().purple(),
            arguments(program, fields)
        ),
    }
}

impl Visitor for Printer {
    fn visit_definition(&mut self, program: &Program, definition: Definition) {
        let data = program.definition(definition);
        let parameters = data
            .parameters
            .iter()
            .map(|parameter| var(program, *parameter))
            .join(", ");

        let header = match data.kind {
            DefinitionKind::Root {
                return_continuation,
            } => format!(
                "{}({parameters}) -> {} {{",
                "root".magenta(),
                var(program, return_continuation)
            ),
            DefinitionKind::Function {
                name,
                return_continuation,
                visibility,
            } => format!(
                "{} {}({parameters}) -> {} {} {{",
                "fun".magenta(),
                var(program, name),
                var(program, return_continuation),
                match visibility {
                    Visibility::Public => "public",
                    Visibility::Private => "private",
                }
            ),
            DefinitionKind::Continuation { name } => format!(
                "{} {}({parameters}) {{",
                "cont".magenta(),
                var(program, name)
            ),
        };

        self.line(header);
        self.indented(|printer| printer.visit_expression(program, data.body));
        self.line("}");
    }

    fn visit_expression(&mut self, program: &Program, expression: Expression) {
        match program.get(expression) {
            ExpressionKind::Let {
                var: binder,
                value: bound,
                body,
            } => {
                self.line(format!(
                    "{} {} = {} {}",
                    "let".magenta(),
                    var(program, *binder),
                    value(program, bound),
                    "in".magenta()
                ));
                self.visit_expression(program, *body);
            }
            ExpressionKind::LetFunctions { definitions, body }
            | ExpressionKind::LetContinuations { definitions, body } => {
                let keyword = match program.get(expression) {
                    ExpressionKind::LetFunctions { .. } => "letfun",
                    _ => "letcont",
                };

                self.line(keyword.magenta());
                self.indented(|printer| {
                    for definition in definitions {
                        printer.visit_definition(program, *definition);
                    }
                });
                self.line("in".magenta());
                self.visit_expression(program, *body);
            }
            ExpressionKind::Primitive {
                primitive,
                arguments: operands,
                continuation,
            } => self.line(format!(
                "{}({}) -> {}",
                primitive.name().cyan(),
                arguments(program, operands),
                occurrence(program, *continuation)
            )),
            ExpressionKind::Apply {
                function,
                arguments: operands,
                continuation,
            } => self.line(format!(
                "{} {}({}) -> {}",
                "apply".cyan(),
                occurrence(program, *function),
                arguments(program, operands),
                occurrence(program, *continuation)
            )),
            ExpressionKind::Continue {
                continuation,
                arguments: operands,
            } => self.line(format!(
                "{} {}({})",
                "continue".cyan(),
                occurrence(program, *continuation),
                arguments(program, operands)
            )),
            ExpressionKind::Case { scrutinee, .. } => {
                self.line(format!(
                    "{} {} {{",
                    "case".magenta(),
                    occurrence(program, *scrutinee)
                ));
                self.indented(|printer| {
                    super::visit::walk_expression(printer, program, expression)
                });
                self.line("}");
            }
            ExpressionKind::Unreachable => self.line("unreachable".red()),
        }
    }

    fn visit_case_branch(&mut self, program: &Program, tag: Option<Tag>, branch: Expression) {
        let label = tag.map_or_else(|| "_".to_string(), |tag| tag.to_string());

        self.line(format!("{} ->", label.purple()));
        self.indented(|printer| printer.visit_expression(program, branch));
    }
}
