//! Scripts the importer must refuse, and how it reports them.

use dgsc::{
    import_script, import_script_with_options, CompileError, CompilerOptions, ImportWarning,
    NodeImportError, ScriptParseError, ValidationError,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn node_error(text: &str) -> NodeImportError {
    match import_script(text) {
        Err(CompileError::NodeImport(e)) => e,
        other => panic!("expected a node import error, got {:?}", other),
    }
}

fn parse_error(text: &str) -> ScriptParseError {
    match import_script(text) {
        Err(CompileError::ScriptParse(e)) => e,
        other => panic!("expected a script parse error, got {:?}", other),
    }
}

#[test]
fn block_structure_errors_carry_line_numbers() {
    init_tracing();
    assert_eq!(parse_error("title: a\n---\nBob: hi\n").line, 3);
    assert_eq!(parse_error("title: a\n---\n===\n\ntitle: a\n---\n===\n").line, 5);
    assert_eq!(parse_error("title: bad id\n---\n===\n").line, 1);
    assert_eq!(parse_error("title: a\n---\n===\nloose text\n").line, 4);
}

#[test]
fn unknown_body_shape_names_node_and_line() {
    init_tracing();
    let err = node_error("title: a\n---\nBob: hi\n===\ntitle: b\n---\n<<wait 2>>\n===\n");
    assert_eq!(err.node_id, "b");
    assert_eq!(err.line, 7);
}

#[test]
fn malformed_jump_target_is_always_an_error() {
    init_tracing();
    let err = node_error("title: a\n---\nBob: hi\n<<jump two words>>\n===\n");
    assert_eq!(err.line, 4);
    assert!(err.reason.contains("malformed jump target"));
}

#[test]
fn player_state_machine_errors() {
    init_tracing();
    let nested = node_error("title: p\n---\n<<if $a>>\n<<if $b>>\n-> Go\n<<endif>>\n<<endif>>\n===\n");
    assert_eq!(nested.line, 4);

    let stray_endif = node_error("title: p\n---\n-> Go\n<<endif>>\n===\n");
    assert!(stray_endif.reason.contains("without <<if>>"));

    let double_jump = node_error("title: p\n---\n-> Go\n<<jump a>>\n<<jump b>>\n===\ntitle: a\n---\nBob: a\n===\n");
    assert_eq!(double_jump.line, 5);
}

#[test]
fn dangling_reference_policy_is_configurable() {
    init_tracing();
    let text = "title: a\n---\n-> Onwards #line:go\n    <<jump missing>>\n===\n";

    let graph = import_script(text).unwrap();
    assert_eq!(graph.edges[0].target, "missing");

    let outcome = import_script_with_options(text, &CompilerOptions::default()).unwrap();
    assert_eq!(
        outcome.validation.errors,
        vec![ValidationError::DanglingReference { from: "a".into(), to: "missing".into() }]
    );

    let strict = CompilerOptions::default().with_strict_references(true);
    match import_script_with_options(text, &strict) {
        Err(CompileError::NodeImport(e)) => {
            assert_eq!(e.node_id, "a");
            assert!(e.reason.contains("missing"));
        }
        other => panic!("expected a node import error, got {:?}", other),
    }
}

#[test]
fn condition_strictness_is_configurable() {
    init_tracing();
    let text = "title: a\n---\n<<if $gold >= 5 and $mood ~ sunny>>\nBob: Rich and happy.\n<<endif>>\n===\n";

    let outcome = import_script_with_options(text, &CompilerOptions::default()).unwrap();
    assert_eq!(
        outcome.warnings,
        vec![ImportWarning::DroppedCondition {
            node_id: "a".into(),
            line: 3,
            clause: "$mood ~ sunny".into(),
        }]
    );

    let strict = CompilerOptions::default().with_strict_conditions(true);
    match import_script_with_options(text, &strict) {
        Err(CompileError::NodeImport(e)) => assert_eq!(e.line, 3),
        other => panic!("expected a node import error, got {:?}", other),
    }
}

#[test]
fn set_values_other_than_true_are_rejected() {
    init_tracing();
    let err = node_error("title: a\n---\nBob: hi\n<<set $gold = 10>>\n===\n");
    assert_eq!(err.line, 4);
}
