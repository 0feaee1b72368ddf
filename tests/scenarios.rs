//! End to end scenarios: lowering-style construction, optimization-style
//! rewrites, then a full consistency check.

use drip_cps::{
    config::ProgramConfig,
    cps::{
        BinderRole, BuildError, CaseError, ChangeError, Constant, ContOccur, DefinitionKind,
        Enclosing, ExpressionKind, FunctionType, Occur, Occurrences, Primitive, Program,
        Recursivity, ValueKind, ValueSpec, Visibility, free_vars::free_variables,
        pretty_print::pretty_print_plain,
    },
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn substitution_keeps_both_occurrence_sets_exact() {
    init_logging();

    let mut program = Program::with_config(ProgramConfig::verified());
    let mut b = program.builder();

    let k = b.fresh_cont_var("k");
    let x = b.fresh_var("x", ValueKind::Int);
    let y = b.fresh_var("y", ValueKind::Int);

    let multiply = b
        .primitive(
            Primitive::Multiply,
            vec![Occur::maker(x), Occur::maker(x)],
            ContOccur::maker(k),
        )
        .unwrap();
    let root = b
        .root(
            k,
            vec![x, y],
            FunctionType::new(vec![ValueKind::Int, ValueKind::Int], ValueKind::Int),
            multiply,
        )
        .unwrap();
    b.finish(root).unwrap();

    assert_eq!(program.number_of_occurrences(x), Occurrences::SeveralOccurrences);
    assert_eq!(program.number_of_occurrences(y), Occurrences::NoOccurrence);

    let second = program.occurrences(x).nth(1).unwrap();
    program.substitute(second, y).unwrap();

    let first = program.occurrences(x).next().unwrap();
    assert_eq!(program.number_of_occurrences(x), Occurrences::OneOccurrence(first));
    assert_eq!(program.number_of_occurrences(y), Occurrences::OneOccurrence(second));
    assert_eq!(program.check(), Ok(()));
}

#[test]
fn case_tags_are_validated_when_built() {
    init_logging();

    let mut program = Program::new();
    let mut b = program.builder();

    let k = b.fresh_cont_var("k");
    let t = b.fresh_var("t", ValueKind::Tagged { constructors: 3 });

    let branches = (0..3)
        .map(|_| b.continue_(ContOccur::maker(k), vec![]).unwrap())
        .collect::<Vec<_>>();

    assert_eq!(
        b.case(
            Occur::maker(t),
            vec![(0, branches[0]), (1, branches[1]), (1, branches[2])],
            None,
        ),
        Err(BuildError::Case(CaseError::DuplicateTag { tag: 1 }))
    );

    let case = b
        .case(
            Occur::maker(t),
            vec![(2, branches[2]), (0, branches[0]), (1, branches[1])],
            None,
        )
        .unwrap();
    let root = b
        .root(
            k,
            vec![t],
            FunctionType::new(vec![ValueKind::Tagged { constructors: 3 }], ValueKind::Any),
            case,
        )
        .unwrap();
    b.finish(root).unwrap();

    let ExpressionKind::Case { branches: map, .. } = program.get(case) else {
        panic!("expected a case");
    };
    assert_eq!(map.tags().collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(map.get(2), Some(branches[2]));
    assert_eq!(program.check(), Ok(()));
}

#[test]
fn dead_binder_is_removed_atomically() {
    init_logging();

    let mut program = Program::with_config(ProgramConfig::verified());
    let mut b = program.builder();

    let k = b.fresh_cont_var("k");
    let x = b.fresh_var("x", ValueKind::Int);
    let z = b.fresh_var("z", ValueKind::Int);

    let exit = b
        .continue_(ContOccur::maker(k), vec![Occur::maker(x)])
        .unwrap();
    let dead = b.let_(z, ValueSpec::Var(Occur::maker(x)), exit).unwrap();
    let root = b
        .root(
            k,
            vec![x],
            FunctionType::new(vec![ValueKind::Int], ValueKind::Int),
            dead,
        )
        .unwrap();
    b.finish(root).unwrap();

    assert_eq!(program.number_of_occurrences(z), Occurrences::NoOccurrence);
    assert_eq!(program.remove_dead_let(dead), Ok(exit));

    assert!(!program.is_live_var(z));
    assert!(!program.is_live_expression(dead));
    assert_eq!(program.enclosing(exit), Some(Enclosing::Definition(root)));
    assert_eq!(program.check(), Ok(()));
}

#[test]
fn enclosing_matches_the_tree_after_building() {
    init_logging();

    let mut program = Program::new();
    let mut b = program.builder();

    let k = b.fresh_cont_var("k");
    let j = b.fresh_cont_var("j");
    let n = b.fresh_var("n", ValueKind::Int);
    let m = b.fresh_var("m", ValueKind::Int);

    let back = b
        .continue_(ContOccur::maker(k), vec![Occur::maker(m)])
        .unwrap();
    let join = b.continuation(j, vec![m], back).unwrap();
    let step = b
        .primitive(
            Primitive::Negate,
            vec![Occur::maker(n)],
            ContOccur::maker(j),
        )
        .unwrap();
    let group = b.let_continuations(vec![join], step).unwrap();
    let root = b
        .root(
            k,
            vec![n],
            FunctionType::new(vec![ValueKind::Int], ValueKind::Int),
            group,
        )
        .unwrap();
    b.finish(root).unwrap();

    assert_eq!(program.enclosing(back), Some(join.into()));
    assert_eq!(program.enclosing(join), Some(group.into()));
    assert_eq!(program.enclosing(step), Some(group.into()));
    assert_eq!(program.enclosing(group), Some(root.into()));
    assert_eq!(program.enclosing(root), None);
    assert_eq!(
        program.ancestors(back).collect::<Vec<_>>(),
        vec![
            Enclosing::Definition(join),
            Enclosing::Expression(group),
            Enclosing::Definition(root)
        ]
    );
    assert!(program.is_attached(back));
    assert_eq!(program.check(), Ok(()));
}

#[test]
fn recursive_functions_survive_a_rewrite_pipeline() {
    init_logging();

    let mut program = Program::with_config(ProgramConfig::verified());
    let mut b = program.builder();

    let k = b.fresh_cont_var("k");
    let ret = b.fresh_cont_var("ret");
    let count = b.fresh_var("count", ValueKind::Any);
    let n = b.fresh_var("n", ValueKind::Int);
    let unused = b.fresh_var("unused", ValueKind::Bool);
    let start = b.fresh_var("start", ValueKind::Int);

    let again = b
        .apply(
            Occur::rec_maker(count),
            vec![Occur::maker(n)],
            ContOccur::maker(ret),
        )
        .unwrap();
    let done = b
        .continue_(ContOccur::maker(ret), vec![Occur::maker(n)])
        .unwrap();
    let test = b
        .case(Occur::maker(n), vec![(0, done)], Some(again))
        .unwrap();
    let function = b
        .function(
            count,
            ret,
            vec![n],
            FunctionType::new(vec![ValueKind::Int], ValueKind::Int),
            Visibility::Private,
            test,
        )
        .unwrap();
    let call = b
        .apply(
            Occur::maker(count),
            vec![Occur::maker(start)],
            ContOccur::maker(k),
        )
        .unwrap();
    let flag = b
        .let_(unused, ValueSpec::Constant(Constant::Bool(true)), call)
        .unwrap();
    let group = b.let_functions(vec![function], flag).unwrap();
    let root = b
        .root(
            k,
            vec![start],
            FunctionType::new(vec![ValueKind::Int], ValueKind::Int),
            group,
        )
        .unwrap();
    b.finish(root).unwrap();

    let recursive_call = program
        .occurrences(count)
        .find(|o| program.holder(*o) == again)
        .unwrap();
    assert_eq!(program.recursivity(recursive_call), Recursivity::Recursive);
    assert_eq!(program.binder_role(count), Some(BinderRole::GroupName));

    assert!(free_variables(&program, function).is_empty());

    program.remove_dead_let(flag).unwrap();
    assert!(matches!(
        program.remove_dead_definition(function),
        Err(ChangeError::BinderStillUsed { occurrences: 1, .. })
    ));

    assert!(matches!(
        program.definition(function).kind,
        DefinitionKind::Function { .. }
    ));

    let printed = pretty_print_plain(&program);
    assert!(printed.contains("apply count/0*(n/1) -> ret/1"));
    assert!(printed.contains("apply count/0(start/3) -> k/0"));
    assert!(!printed.contains("unused"));
}
