//! End-to-end interpreter scenarios over hand-built IL
//!
//! Each test assembles a small specification tree and drives it through the
//! public interpreter surface, checking results, errors, the phantom log,
//! and the value graph.

use spectec_il::{
    BinOp, Case, CmpOp, Def, DefTyp, Exp, ExpKind, Guard, Id, Instr, InstrKind, Iter, IterExp,
    MixOp, NotExp, Num, NumKind, OpTyp, Param, Pattern, Phantom, Region, Spec, TypCase, Typ,
};
use spectec_interp::{
    call_rel, invoke_function, invoke_relation, Ctx, EvalError, SpecEnv, Value, ValueKind,
};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Tree builders
// ============================================================================

fn nat_e(n: u64) -> Exp {
    Exp::dummy(ExpKind::NumE(Num::nat(n)), Typ::nat())
}

fn bool_e(b: bool) -> Exp {
    Exp::dummy(ExpKind::BoolE(b), Typ::BoolT)
}

fn var_e(name: &str, typ: Typ) -> Exp {
    Exp::dummy(ExpKind::VarE(Id::dummy(name)), typ)
}

fn list_e(items: Vec<Exp>, elem: Typ) -> Exp {
    Exp::dummy(ExpKind::ListE(items), Typ::list(elem))
}

fn add_e(l: Exp, r: Exp) -> Exp {
    Exp::dummy(
        ExpKind::BinE(BinOp::AddOp, OpTyp::NumT(NumKind::Nat), Box::new(l), Box::new(r)),
        Typ::nat(),
    )
}

fn ret(e: Exp) -> Instr {
    Instr::dummy(InstrKind::ReturnI(e))
}

fn result(es: Vec<Exp>) -> Instr {
    Instr::dummy(InstrKind::ResultI(es))
}

fn phantom(pid: u32) -> Phantom {
    Phantom { pid, conds: vec![] }
}

fn param(name: &str, typ: Typ) -> Param {
    Param {
        id: Id::dummy(name),
        typ,
    }
}

fn decd(name: &str, params: Vec<Param>, body: Vec<Instr>) -> Def {
    Def::DecD {
        id: Id::dummy(name),
        tparams: vec![],
        params,
        body,
        region: Region::dummy(),
    }
}

fn reld(name: &str, args: Vec<Exp>, input_indices: Vec<usize>, body: Vec<Instr>) -> Def {
    Def::RelD {
        id: Id::dummy(name),
        mixop: MixOp::prefix(name, args.len()),
        input_indices,
        args,
        body,
        region: Region::dummy(),
    }
}

fn rule(name: &str, args: Vec<Exp>) -> Instr {
    Instr::dummy(InstrKind::RuleI {
        id: Id::dummy(name),
        notation: NotExp {
            mixop: MixOp::prefix(name, args.len()),
            args,
        },
        iters: vec![],
    })
}

fn new_ctx(spec: &Spec) -> Ctx {
    Ctx::new(Arc::new(SpecEnv::new(spec)))
}

fn nat_v(ctx: &mut Ctx, n: u64) -> Value {
    ctx.make(ValueKind::Num(Num::nat(n)), Typ::nat())
}

fn nat_list_v(ctx: &mut Ctx, ns: &[u64]) -> Value {
    let elems: Vec<_> = ns.iter().map(|&n| nat_v(ctx, n)).collect();
    ctx.make(ValueKind::List(elems), Typ::list(Typ::nat()))
}

// ============================================================================
// Builtins through the evaluator
// ============================================================================

#[test]
fn sum_builtin_through_a_function() {
    let body = vec![ret(Exp::dummy(
        ExpKind::CallE(
            Id::dummy("$sum"),
            vec![list_e(vec![nat_e(1), nat_e(2), nat_e(3)], Typ::nat())],
        ),
        Typ::nat(),
    ))];
    let spec = Spec {
        defs: vec![decd("total", vec![], body)],
    };
    let mut ctx = new_ctx(&spec);
    let v = invoke_function(&mut ctx, "total", vec![]).unwrap();
    assert_eq!(v.as_num().unwrap(), &Num::nat(6));
}

#[test]
fn min_of_empty_list_is_a_builtin_error() {
    let body = vec![ret(Exp::dummy(
        ExpKind::CallE(Id::dummy("$min"), vec![list_e(vec![], Typ::nat())]),
        Typ::nat(),
    ))];
    let spec = Spec {
        defs: vec![decd("lowest", vec![], body)],
    };
    let mut ctx = new_ctx(&spec);
    let err = invoke_function(&mut ctx, "lowest", vec![]).unwrap_err();
    assert_eq!(err.kind(), "BuiltinError");
    assert_eq!(err.to_string(), "min of empty list");
}

// ============================================================================
// Phantoms and rule failure
// ============================================================================

#[test]
fn false_if_logs_phantom_and_relation_fails() {
    // relation with a single guarded result; the guard is never true
    let body = vec![Instr::dummy(InstrKind::IfI {
        cond: bool_e(false),
        iters: vec![],
        then: vec![result(vec![nat_e(1)])],
        phantom: Some(phantom(7)),
    })];
    let spec = Spec {
        defs: vec![reld(
            "Step",
            vec![var_e("x", Typ::nat()), var_e("y", Typ::nat())],
            vec![0],
            body,
        )],
    };
    let mut ctx = new_ctx(&spec);
    let input = nat_v(&mut ctx, 0);
    let err = invoke_relation(&mut ctx, "Step", vec![input]).unwrap_err();
    assert_eq!(err.kind(), "RelFailed");
    assert!(err.to_string().contains("Step"));
    assert_eq!(ctx.phantoms.pids(), vec![7]);
}

#[test]
fn matched_case_does_not_log_the_phantom() {
    // first pattern fails, second succeeds: nothing may be logged
    let cases = vec![
        Case {
            guard: Guard::MatchG(Pattern::NumP(Num::nat(3))),
            body: vec![ret(nat_e(1))],
        },
        Case {
            guard: Guard::MatchG(Pattern::VarP(Id::dummy("x"))),
            body: vec![ret(var_e("x", Typ::nat()))],
        },
    ];
    let body = vec![Instr::dummy(InstrKind::CaseI {
        scrut: nat_e(5),
        cases,
        phantom: Some(phantom(9)),
    })];
    let spec = Spec {
        defs: vec![decd("pick", vec![], body)],
    };
    let mut ctx = new_ctx(&spec);
    let v = invoke_function(&mut ctx, "pick", vec![]).unwrap();
    assert_eq!(v.as_num().unwrap(), &Num::nat(5));
    assert!(ctx.phantoms.is_empty());
}

#[test]
fn unmatched_case_logs_phantom_and_falls_through() {
    let cases = vec![Case {
        guard: Guard::MatchG(Pattern::NumP(Num::nat(3))),
        body: vec![result(vec![nat_e(1)])],
    }];
    let body = vec![Instr::dummy(InstrKind::CaseI {
        scrut: var_e("n", Typ::nat()),
        cases,
        phantom: Some(phantom(11)),
    })];
    let spec = Spec {
        defs: vec![reld(
            "Classify",
            vec![var_e("n", Typ::nat()), var_e("out", Typ::nat())],
            vec![0],
            body,
        )],
    };
    let mut ctx = new_ctx(&spec);
    let input = nat_v(&mut ctx, 5);
    let err = invoke_relation(&mut ctx, "Classify", vec![input]).unwrap_err();
    assert_eq!(err.kind(), "RelFailed");
    assert_eq!(ctx.phantoms.pids(), vec![11]);
}

#[test]
fn phantom_path_records_enclosing_guards() {
    // outer if is entered, inner if is missed: the hit carries one conjunct
    let inner = Instr::dummy(InstrKind::IfI {
        cond: bool_e(false),
        iters: vec![],
        then: vec![ret(nat_e(1))],
        phantom: Some(phantom(4)),
    });
    let outer = Instr::dummy(InstrKind::IfI {
        cond: bool_e(true),
        iters: vec![],
        then: vec![inner],
        phantom: Some(phantom(5)),
    });
    let spec = Spec {
        defs: vec![decd("guarded", vec![], vec![outer, ret(nat_e(0))])],
    };
    let mut ctx = new_ctx(&spec);
    let v = invoke_function(&mut ctx, "guarded", vec![]).unwrap();
    assert_eq!(v.as_num().unwrap(), &Num::nat(0));
    let hits = ctx.phantoms.hits();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].pid, 4);
    assert_eq!(hits[0].path.len(), 1);
    assert_eq!(hits[0].path[0].to_string(), "true");
}

#[test]
fn otherwise_arm_runs_when_all_cases_fail() {
    let cases = vec![
        Case {
            guard: Guard::MatchG(Pattern::NumP(Num::nat(1))),
            body: vec![ret(nat_e(10))],
        },
        Case {
            guard: Guard::BoolG(true),
            body: vec![Instr::dummy(InstrKind::OtherwiseI(Box::new(ret(nat_e(
                99,
            )))))],
        },
    ];
    let body = vec![Instr::dummy(InstrKind::CaseI {
        scrut: nat_e(5),
        cases,
        phantom: Some(phantom(2)),
    })];
    let spec = Spec {
        defs: vec![decd("fallback", vec![], body)],
    };
    let mut ctx = new_ctx(&spec);
    let v = invoke_function(&mut ctx, "fallback", vec![]).unwrap();
    assert_eq!(v.as_num().unwrap(), &Num::nat(99));
    assert!(ctx.phantoms.is_empty());
}

// ============================================================================
// Let bindings
// ============================================================================

#[test]
fn let_mismatch_on_absent_option() {
    let lhs = Exp::dummy(
        ExpKind::OptE(Some(Box::new(var_e("x", Typ::nat())))),
        Typ::opt(Typ::nat()),
    );
    let rhs = Exp::dummy(ExpKind::OptE(None), Typ::opt(Typ::nat()));
    let body = vec![
        Instr::dummy(InstrKind::LetI {
            lhs,
            rhs,
            iters: vec![],
        }),
        ret(nat_e(0)),
    ];
    let spec = Spec {
        defs: vec![decd("unwrap", vec![], body)],
    };
    let mut ctx = new_ctx(&spec);
    let err = invoke_function(&mut ctx, "unwrap", vec![]).unwrap_err();
    assert_eq!(err.kind(), "LetMismatch");
}

#[test]
fn let_destructures_tuples() {
    let lhs = Exp::dummy(
        ExpKind::TupleE(vec![var_e("a", Typ::nat()), var_e("b", Typ::nat())]),
        Typ::TupleT(vec![Typ::nat(), Typ::nat()]),
    );
    let rhs = Exp::dummy(
        ExpKind::TupleE(vec![nat_e(4), nat_e(9)]),
        Typ::TupleT(vec![Typ::nat(), Typ::nat()]),
    );
    let body = vec![
        Instr::dummy(InstrKind::LetI {
            lhs,
            rhs,
            iters: vec![],
        }),
        ret(add_e(var_e("a", Typ::nat()), var_e("b", Typ::nat()))),
    ];
    let spec = Spec {
        defs: vec![decd("pair_sum", vec![], body)],
    };
    let mut ctx = new_ctx(&spec);
    let v = invoke_function(&mut ctx, "pair_sum", vec![]).unwrap();
    assert_eq!(v.as_num().unwrap(), &Num::nat(13));
}

// ============================================================================
// Arithmetic errors
// ============================================================================

#[test]
fn division_by_zero() {
    let body = vec![ret(Exp::dummy(
        ExpKind::BinE(
            BinOp::DivOp,
            OpTyp::NumT(NumKind::Nat),
            Box::new(nat_e(5)),
            Box::new(nat_e(0)),
        ),
        Typ::nat(),
    ))];
    let spec = Spec {
        defs: vec![decd("ratio", vec![], body)],
    };
    let mut ctx = new_ctx(&spec);
    let err = invoke_function(&mut ctx, "ratio", vec![]).unwrap_err();
    assert_eq!(err.kind(), "DivByZero");
}

// ============================================================================
// Iteration
// ============================================================================

fn pointwise_sum_spec() -> Spec {
    // zip(x*, y*) with x + y per position
    let body = vec![ret(Exp::dummy(
        ExpKind::IterE(
            Box::new(add_e(var_e("x", Typ::nat()), var_e("y", Typ::nat()))),
            Iter::List,
            vec![Id::dummy("x"), Id::dummy("y")],
        ),
        Typ::list(Typ::nat()),
    ))];
    Spec {
        defs: vec![decd(
            "pointwise",
            vec![
                param("x", Typ::list(Typ::nat())),
                param("y", Typ::list(Typ::nat())),
            ],
            body,
        )],
    }
}

#[test]
fn list_iteration_is_pointwise_and_ordered() {
    let spec = pointwise_sum_spec();
    let mut ctx = new_ctx(&spec);
    let xs = nat_list_v(&mut ctx, &[1, 2, 3]);
    let ys = nat_list_v(&mut ctx, &[10, 20, 30]);
    let v = invoke_function(&mut ctx, "pointwise", vec![xs, ys]).unwrap();
    let expected = nat_list_v(&mut ctx, &[11, 22, 33]);
    assert_eq!(v, expected);
}

#[test]
fn iteration_length_mismatch_is_never_truncated() {
    let spec = pointwise_sum_spec();
    let mut ctx = new_ctx(&spec);
    let xs = nat_list_v(&mut ctx, &[1, 2, 3]);
    let ys = nat_list_v(&mut ctx, &[10, 20]);
    let err = invoke_function(&mut ctx, "pointwise", vec![xs, ys]).unwrap_err();
    assert_eq!(err.kind(), "IterLengthMismatch");
}

#[test]
fn iterated_let_introduces_lifted_bindings() {
    // let d = x + 1 per element, then return d*
    let let_instr = Instr::dummy(InstrKind::LetI {
        lhs: var_e("d", Typ::nat()),
        rhs: add_e(var_e("x", Typ::nat()), nat_e(1)),
        iters: vec![IterExp {
            iter: Iter::List,
            vars: vec![Id::dummy("x")],
        }],
    });
    let body = vec![let_instr, ret(var_e("d", Typ::list(Typ::nat())))];
    let spec = Spec {
        defs: vec![decd("bump", vec![param("x", Typ::list(Typ::nat()))], body)],
    };
    let mut ctx = new_ctx(&spec);
    let xs = nat_list_v(&mut ctx, &[5, 7]);
    let v = invoke_function(&mut ctx, "bump", vec![xs]).unwrap();
    let expected = nat_list_v(&mut ctx, &[6, 8]);
    assert_eq!(v, expected);
}

// ============================================================================
// Relations: outputs, recursion, depth
// ============================================================================

fn list_sum_spec() -> Spec {
    // SumL(xs, total): structural recursion on the list
    let empty_case = Case {
        guard: Guard::MatchG(Pattern::ListP {
            prefix: vec![],
            rest: None,
            suffix: vec![],
        }),
        body: vec![result(vec![nat_e(0)])],
    };
    let cons_case = Case {
        guard: Guard::MatchG(Pattern::ListP {
            prefix: vec![Pattern::VarP(Id::dummy("h"))],
            rest: Some(Id::dummy("t")),
            suffix: vec![],
        }),
        body: vec![
            rule(
                "SumL",
                vec![
                    var_e("t", Typ::list(Typ::nat())),
                    var_e("rest", Typ::nat()),
                ],
            ),
            result(vec![add_e(var_e("h", Typ::nat()), var_e("rest", Typ::nat()))]),
        ],
    };
    let body = vec![Instr::dummy(InstrKind::CaseI {
        scrut: var_e("xs", Typ::list(Typ::nat())),
        cases: vec![empty_case, cons_case],
        phantom: None,
    })];
    Spec {
        defs: vec![reld(
            "SumL",
            vec![
                var_e("xs", Typ::list(Typ::nat())),
                var_e("total", Typ::nat()),
            ],
            vec![0],
            body,
        )],
    }
}

#[test]
fn recursive_relation_produces_outputs() {
    let spec = list_sum_spec();
    let mut ctx = new_ctx(&spec);
    let xs = nat_list_v(&mut ctx, &[1, 2, 3, 4]);
    let outputs = invoke_relation(&mut ctx, "SumL", vec![xs]).unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].as_num().unwrap(), &Num::nat(10));
    assert!(ctx.graph.edges_point_backwards());
}

#[test]
fn relation_outputs_bind_at_the_call_site() {
    let mut defs = list_sum_spec().defs;
    // wrap the relation in a function that binds its output
    defs.push(decd(
        "total",
        vec![param("xs", Typ::list(Typ::nat()))],
        vec![
            rule(
                "SumL",
                vec![var_e("xs", Typ::list(Typ::nat())), var_e("s", Typ::nat())],
            ),
            ret(var_e("s", Typ::nat())),
        ],
    ));
    let spec = Spec { defs };
    let mut ctx = new_ctx(&spec);
    let xs = nat_list_v(&mut ctx, &[2, 3]);
    let v = invoke_function(&mut ctx, "total", vec![xs]).unwrap();
    assert_eq!(v.as_num().unwrap(), &Num::nat(5));
}

#[test]
fn recursion_depth_is_bounded() {
    let spec = list_sum_spec();
    let mut ctx = new_ctx(&spec);
    ctx.set_max_depth(3);
    let xs = nat_list_v(&mut ctx, &[1, 2, 3, 4, 5, 6]);
    let err = invoke_relation(&mut ctx, "SumL", vec![xs]).unwrap_err();
    assert_eq!(err.kind(), "StackOverflow");
}

#[test]
fn deadline_fails_cooperatively() {
    let spec = list_sum_spec();
    let mut ctx = new_ctx(&spec);
    ctx.set_timeout(Duration::from_secs(0));
    let xs = nat_list_v(&mut ctx, &[1, 2, 3]);
    let err = invoke_relation(&mut ctx, "SumL", vec![xs]).unwrap_err();
    assert_eq!(err.kind(), "Deadline");
}

// ============================================================================
// Guards beyond pattern matching
// ============================================================================

#[test]
fn cmp_and_mem_guards_select_cases() {
    let cases = vec![
        Case {
            guard: Guard::CmpG(CmpOp::LtOp, OpTyp::NumT(NumKind::Nat), nat_e(3)),
            body: vec![ret(nat_e(1))],
        },
        Case {
            guard: Guard::MemG(list_e(vec![nat_e(5), nat_e(6)], Typ::nat())),
            body: vec![ret(nat_e(2))],
        },
    ];
    let body = vec![
        Instr::dummy(InstrKind::CaseI {
            scrut: var_e("n", Typ::nat()),
            cases,
            phantom: None,
        }),
        ret(nat_e(0)),
    ];
    let spec = Spec {
        defs: vec![decd("bucket", vec![param("n", Typ::nat())], body)],
    };

    let mut ctx = new_ctx(&spec);
    let small = nat_v(&mut ctx, 2);
    let v = invoke_function(&mut ctx, "bucket", vec![small]).unwrap();
    assert_eq!(v.as_num().unwrap(), &Num::nat(1));

    let mut ctx = new_ctx(&spec);
    let member = nat_v(&mut ctx, 5);
    let v = invoke_function(&mut ctx, "bucket", vec![member]).unwrap();
    assert_eq!(v.as_num().unwrap(), &Num::nat(2));

    let mut ctx = new_ctx(&spec);
    let neither = nat_v(&mut ctx, 9);
    let v = invoke_function(&mut ctx, "bucket", vec![neither]).unwrap();
    assert_eq!(v.as_num().unwrap(), &Num::nat(0));
}

#[test]
fn subtype_guard_is_nominal_for_constructors() {
    let val_typ = Def::TypD {
        id: Id::dummy("val"),
        tparams: vec![],
        deftyp: DefTyp::VariantT(vec![
            TypCase {
                mixop: MixOp::prefix("NumV", 1),
                args: vec![Typ::nat()],
            },
            TypCase {
                mixop: MixOp::prefix("NullV", 0),
                args: vec![],
            },
        ]),
        region: Region::dummy(),
    };
    let cases = vec![Case {
        guard: Guard::SubG(Typ::var("val")),
        body: vec![ret(nat_e(1))],
    }];
    let body = vec![
        Instr::dummy(InstrKind::CaseI {
            scrut: var_e("v", Typ::var("val")),
            cases,
            phantom: None,
        }),
        ret(nat_e(0)),
    ];
    let spec = Spec {
        defs: vec![
            val_typ,
            decd("is_val", vec![param("v", Typ::var("val"))], body),
        ],
    };
    let mut ctx = new_ctx(&spec);
    let inner = nat_v(&mut ctx, 3);
    let v = ctx.make(
        ValueKind::Case(MixOp::prefix("NumV", 1), vec![inner]),
        Typ::var("val"),
    );
    let out = invoke_function(&mut ctx, "is_val", vec![v]).unwrap();
    assert_eq!(out.as_num().unwrap(), &Num::nat(1));
}

// ============================================================================
// Engine invariants
// ============================================================================

#[test]
fn evaluation_is_deterministic() {
    let spec = list_sum_spec();
    let run = || {
        let mut ctx = new_ctx(&spec);
        let xs = nat_list_v(&mut ctx, &[3, 1, 4]);
        let out = invoke_relation(&mut ctx, "SumL", vec![xs]).unwrap();
        (out, ctx.phantoms.pids())
    };
    let (a_out, a_pids) = run();
    let (b_out, b_pids) = run();
    assert_eq!(a_out, b_out);
    assert_eq!(a_pids, b_pids);
}

#[test]
fn scope_depth_is_restored_after_failure() {
    let spec = list_sum_spec();
    let mut ctx = new_ctx(&spec);
    ctx.set_max_depth(1);
    let depth = ctx.scope_depth();
    let xs = nat_list_v(&mut ctx, &[1, 2, 3]);
    let _ = invoke_relation(&mut ctx, "SumL", vec![xs]).unwrap_err();
    assert_eq!(ctx.scope_depth(), depth);
}

#[test]
fn rel_failed_when_input_pattern_rejects() {
    // the relation only covers the empty list in its input pattern
    let body = vec![result(vec![nat_e(1)])];
    let spec = Spec {
        defs: vec![reld(
            "OnlyEmpty",
            vec![
                Exp::dummy(ExpKind::ListE(vec![]), Typ::list(Typ::nat())),
                var_e("out", Typ::nat()),
            ],
            vec![0],
            body,
        )],
    };
    let mut ctx = new_ctx(&spec);
    let xs = nat_list_v(&mut ctx, &[1]);
    let err = invoke_relation(&mut ctx, "OnlyEmpty", vec![xs]).unwrap_err();
    assert_eq!(err.kind(), "RelFailed");

    let mut ctx = new_ctx(&spec);
    let empty = nat_list_v(&mut ctx, &[]);
    let out = invoke_relation(&mut ctx, "OnlyEmpty", vec![empty]).unwrap();
    assert_eq!(out[0].as_num().unwrap(), &Num::nat(1));
}

#[test]
fn relation_outputs_depend_on_inputs() {
    let spec = list_sum_spec();
    let mut ctx = new_ctx(&spec);
    let xs = nat_list_v(&mut ctx, &[1, 2]);
    let xs_vid = xs.vid();
    let outputs = {
        let rel = ctx.env().rel("SumL").cloned().unwrap();
        call_rel(&mut ctx, &rel, vec![xs], &Region::dummy()).unwrap()
    };
    let deps = ctx.graph.deps(outputs[0].vid());
    assert!(deps.contains(&xs_vid));
}

#[test]
fn unknown_invocation_is_unbound() {
    let spec = Spec { defs: vec![] };
    let mut ctx = new_ctx(&spec);
    let err = invoke_function(&mut ctx, "nope", vec![]).unwrap_err();
    assert_eq!(err.kind(), "Unbound");
    assert!(matches!(err, EvalError::Unbound { .. }));
}
