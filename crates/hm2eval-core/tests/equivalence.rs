//! End-to-end behaviour of the public entry points.

use hm2eval_core::checker::Tolerance;
use hm2eval_core::extract::{clean_candidate, ExtractionConfig, ExtractionStrategy};
use hm2eval_core::{
    evaluate_functional_solution, evaluate_numeric_solution, evaluate_solution,
    evaluate_symbolic_solution, parse_numeric_solution, AnswerKind, EvalConfig,
    EvaluationResult, Evaluator, FailureKind, ParsedAnswer,
};
use proptest::prelude::*;

fn equivalent() -> EvaluationResult {
    EvaluationResult::equivalence(true)
}

fn not_equivalent() -> EvaluationResult {
    EvaluationResult::equivalence(false)
}

#[test]
fn identical_numeric_answers() {
    assert_eq!(evaluate_numeric_solution("42", "42", ""), equivalent());
    assert_eq!(
        evaluate_numeric_solution(r"The final answer is $3.0 \times 10^{8}$ m/s.", "3e8", ""),
        equivalent()
    );
}

#[test]
fn commuted_sum_with_parameter() {
    assert_eq!(
        evaluate_symbolic_solution(r"\boxed{x+1}", "1+x", "x=3"),
        equivalent()
    );
}

#[test]
fn tolerance_boundary() {
    let evaluator = Evaluator::new(EvalConfig {
        tolerance: Tolerance {
            relative: 1e-3,
            absolute: 0.0,
        },
        ..EvalConfig::default()
    });
    assert_eq!(
        evaluator.evaluate_numeric_solution(r"\boxed{100.09}", "100", ""),
        equivalent()
    );
    assert_eq!(
        evaluator.evaluate_numeric_solution(r"\boxed{100.2}", "100", ""),
        not_equivalent()
    );
    assert_eq!(
        evaluator.evaluate_numeric_solution(r"\boxed{99.95}", "100", ""),
        equivalent()
    );
}

#[test]
fn unusable_answer_is_not_a_wrong_answer() {
    let r = evaluate_solution("the answer is somewhere around blah", "42", "");
    assert!(!r.success());
    assert_eq!(r.is_equivalent(), None);
    assert!(matches!(
        r.failure_kind(),
        Some(FailureKind::ParseFailure | FailureKind::ExtractionFailure)
    ));
    let message = r.error_message().unwrap();
    assert!(message.contains("failure"), "{message}");

    let json = serde_json::to_value(&r).unwrap();
    assert!(json["is_equivalent"].is_null());
}

#[test]
fn functional_square() {
    assert_eq!(
        evaluate_functional_solution(r"\boxed{f(x)=x*x}", "f(x)=x^2", ""),
        equivalent()
    );
    assert_eq!(
        evaluate_solution(r"Hence $f(x) = x \cdot x$.", "f(x)=x^2", ""),
        equivalent()
    );
}

#[test]
fn singular_candidate_is_a_domain_failure() {
    let r = evaluate_symbolic_solution(r"\boxed{\frac{1}{x-2}}", "1", "x=2");
    assert_eq!(r.failure_kind(), Some(FailureKind::DomainFailure));
    assert!(r.error_message().unwrap().starts_with("domain failure"));
}

#[test]
fn repeated_evaluation_is_identical() {
    let triple = (
        r"Thus the period is $T = 2\pi\sqrt{\frac{L}{g}}$.",
        r"2\pi \sqrt{L/g}",
        "L = 2, g = 9.81",
    );
    let first = evaluate_solution(triple.0, triple.1, triple.2);
    let second = evaluate_solution(triple.0, triple.1, triple.2);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(first, equivalent());
}

#[test]
fn physics_style_answers() {
    // Parameters may reference each other.
    assert_eq!(
        evaluate_symbolic_solution(r"\boxed{\frac{1}{2} k A^2}", "E", "k = 20, A = 0.1, E = k A^2 / 2"),
        equivalent()
    );
    // Greek and subscripted parameter names.
    assert_eq!(
        evaluate_symbolic_solution(
            r"The final answer is $\omega_0 t$",
            r"t \omega_0",
            r"$\omega_0 = 3$, $t = 2$"
        ),
        equivalent()
    );
    // Units on the candidate are ignored by the numeric rule.
    assert_eq!(
        evaluate_numeric_solution(r"\boxed{19.62 \text{ N}}", "m g", "m = 2, g = 9.81"),
        equivalent()
    );
}

#[test]
fn undeclared_candidate_identifier_is_a_parse_failure() {
    let r = evaluate_symbolic_solution(r"\boxed{q + 2}", "2 m", "m = 1");
    assert_eq!(r.failure_kind(), Some(FailureKind::ParseFailure));
    assert!(r.error_message().unwrap().contains("(candidate)"));
}

#[test]
fn extraction_chain_is_configurable() {
    let only_boxed = Evaluator::new(EvalConfig {
        extraction: ExtractionConfig {
            strategies: vec![ExtractionStrategy::Boxed],
        },
        ..EvalConfig::default()
    });
    let r = only_boxed.evaluate_solution("The answer is 4.", "4", "");
    assert_eq!(r.failure_kind(), Some(FailureKind::ExtractionFailure));
    assert_eq!(
        Evaluator::default().evaluate_solution("The answer is 4.", "4", ""),
        equivalent()
    );
}

#[test]
fn forced_kind_through_evaluate() {
    let evaluator = Evaluator::default();
    assert_eq!(
        evaluator.evaluate(Some(AnswerKind::Numeric), r"\boxed{0.5}", r"\frac{1}{2}", ""),
        equivalent()
    );
}

#[test]
fn constants_after_a_numeral_are_factors() {
    assert_eq!(evaluate_solution(r"\boxed{2}", "2 pi", ""), not_equivalent());
    assert_eq!(evaluate_solution(r"\boxed{2\pi}", "2 pi", ""), equivalent());
    assert_eq!(evaluate_solution(r"\boxed{5}", "5 e", ""), not_equivalent());
    assert_eq!(evaluate_numeric_solution("The answer is 3 pi", "3", ""), not_equivalent());
    assert_eq!(evaluate_numeric_solution(r"\boxed{1/2e3}", "0.0005", ""), equivalent());
}

#[test]
fn numeric_grammar() {
    let ParsedAnswer::Numeric(n) = parse_numeric_solution(r"-1.5 \times 10^{-3} kg").unwrap() else {
        panic!("expected a numeric answer");
    };
    assert!((n.value + 1.5e-3).abs() < 1e-15);
    assert_eq!(n.unit.as_deref(), Some("kg"));
    assert!(parse_numeric_solution("not a number").is_err());
}

proptest! {
    #[test]
    fn integers_are_self_equivalent(a in -100_000i64..100_000) {
        let response = format!(r"\boxed{{{a}}}");
        prop_assert_eq!(evaluate_solution(&response, &a.to_string(), ""), equivalent());
    }

    #[test]
    fn expanded_polynomials_match_factored(
        c0 in -20i64..20, c1 in -20i64..20, c2 in -20i64..20, x in -9i64..9,
    ) {
        let candidate = format!(r"\boxed{{{c2} x^2 + ({c1}) x + ({c0})}}");
        let reference = format!("({c0}) + x (({c1}) + ({c2}) x)");
        let parameters = format!("x = {x}");
        prop_assert_eq!(
            evaluate_symbolic_solution(&candidate, &reference, &parameters),
            equivalent()
        );
    }

    #[test]
    fn evaluation_is_deterministic(
        response in "[0-9x+*/^(). -]{1,24}",
        solution in "[0-9x+*/^ -]{1,12}",
    ) {
        let first = evaluate_solution(&response, &solution, "x = 2");
        let second = evaluate_solution(&response, &solution, "x = 2");
        prop_assert_eq!(first.success(), first.is_equivalent().is_some());
        prop_assert_eq!(first.success(), first.error_message().is_none());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn cleaning_is_idempotent(raw in r"[a-z0-9 $\\{}.,;:*]{0,40}") {
        let once = clean_candidate(&raw);
        prop_assert_eq!(clean_candidate(&once), once.clone());
    }
}
