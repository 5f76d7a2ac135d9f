//! Export → import round trips over graphs using every node kind.

use dgsc::{
    export_graph, export_graph_with_options, import_script, import_script_with_options,
    validate_graph, BlockKind, CharacterNode, Choice, CompilerOptions, Condition,
    ConditionOperator, ConditionValue, ConditionalBlock, ConditionalNode, DialogueGraph,
    DialogueNode, EndNode, EntryPolicy, FlagSchema, FlagType, NodeData, PlayerNode, PoolMember,
    ReturnPolicy, SelectionMode, StoryletNode, StoryletPoolNode, ValidationWarning,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn npc(speaker: &str, content: &str, next: Option<&str>) -> NodeData {
    NodeData::Character(CharacterNode {
        speaker: speaker.to_string(),
        content: content.to_string(),
        next_node_id: next.map(str::to_string),
        set_flags: Vec::new(),
    })
}

fn tavern() -> DialogueGraph {
    DialogueGraph::new("tavern", "The Rusty Tankard")
        .with_node(
            DialogueNode::new(
                "greet",
                NodeData::Character(CharacterNode {
                    speaker: "Barkeep".to_string(),
                    content: "Welcome, stranger.\nSit down, the stew is {almost} warm.".to_string(),
                    next_node_id: Some("menu".to_string()),
                    set_flags: vec!["met_barkeep".to_string()],
                }),
            )
            .at(0.0, 0.0),
        )
        .with_node(
            DialogueNode::new(
                "menu",
                NodeData::Player(PlayerNode {
                    choices: vec![
                        Choice::new("ask", "Heard any rumours?")
                            .with_condition(Condition::compare(
                                "reputation",
                                ConditionOperator::GreaterEqual,
                                10,
                            ))
                            .with_next("rumours"),
                        Choice::new("brawl", "Start a fight").with_next("fight"),
                        Choice::new("leave", "Leave")
                            .with_next("leave")
                            .with_set_flag("left_early"),
                    ],
                }),
            )
            .at(250.0, 0.0),
        )
        .with_node(DialogueNode::new(
            "rumours",
            NodeData::Conditional(ConditionalNode {
                blocks: vec![
                    ConditionalBlock::new(
                        "rich",
                        BlockKind::If,
                        Some(vec![Condition::compare("gold", ConditionOperator::GreaterThan, 100)]),
                        "For a coin, maybe.",
                    )
                    .unwrap()
                    .with_speaker("Barkeep")
                    .with_next("pool"),
                    ConditionalBlock::new(
                        "guild",
                        BlockKind::ElseIf,
                        Some(vec![Condition::compare(
                            "faction",
                            ConditionOperator::Equals,
                            "thieves",
                        )]),
                        "You know I can't talk here.",
                    )
                    .unwrap()
                    .with_speaker("Barkeep"),
                    ConditionalBlock::new("broke", BlockKind::Else, None, "The barkeep shrugs.")
                        .unwrap()
                        .with_next("leave"),
                ],
            }),
        ))
        .with_node(DialogueNode::new(
            "pool",
            NodeData::StoryletPool(StoryletPoolNode {
                pool_id: "tavern_rumours".to_string(),
                selection_mode: SelectionMode::Weighted,
                members: vec![
                    PoolMember { template_id: "dragon_sighting".to_string(), weight: 3 },
                    PoolMember { template_id: "tax_collector".to_string(), weight: 1 },
                ],
                next_node_id: Some("leave".to_string()),
                attributes: BTreeMap::new(),
            }),
        ))
        .with_node(DialogueNode::new(
            "fight",
            NodeData::Storylet(StoryletNode {
                template_id: "bar_brawl".to_string(),
                entry_policy: EntryPolicy::Start,
                entry_node_id: None,
                return_policy: ReturnPolicy::Node,
                return_node_id: Some("leave".to_string()),
                attributes: BTreeMap::from([("mood".to_string(), "rowdy crowd".to_string())]),
            }),
        ))
        .with_node(DialogueNode::new("leave", npc("Barkeep", "Safe travels.", None)).at(500.0, 120.5))
        .with_node(DialogueNode::new("orphan", npc("Ghost", "Nobody ever visits.", None)))
        .with_start("greet")
        .with_end(EndNode::new("leave").with_exit("street"))
        .with_derived_edges()
}

#[test]
fn every_node_kind_survives_export_and_import() {
    init_tracing();
    let graph = tavern();
    let script = export_graph(&graph).unwrap();
    let imported = import_script(&script).unwrap();
    assert_eq!(imported, graph);
}

#[test]
fn export_is_idempotent_through_import() {
    init_tracing();
    let first = export_graph(&tavern()).unwrap();
    let second = export_graph(&import_script(&first).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn guarded_choice_exports_two_choice_lines_each_with_a_jump() {
    init_tracing();
    let graph = DialogueGraph::new("g", "")
        .with_node(DialogueNode::new(
            "menu",
            NodeData::Player(PlayerNode {
                choices: vec![
                    Choice::new("c1", "Ask about the rumours")
                        .with_condition(Condition::compare(
                            "reputation",
                            ConditionOperator::GreaterEqual,
                            10,
                        ))
                        .with_next("rumours"),
                    Choice::new("c2", "Leave").with_next("street"),
                ],
            }),
        ))
        .with_node(DialogueNode::new("rumours", npc("Barkeep", "Dragons.", None)))
        .with_node(DialogueNode::new("street", npc("Guard", "Move along.", None)));

    let script = export_graph(&graph).unwrap();
    let menu = script
        .split("title: ")
        .find(|block| block.starts_with("menu"))
        .unwrap();
    assert_eq!(menu.matches("->").count(), 2);
    assert_eq!(menu.matches("<<jump").count(), 2);
    assert!(menu.contains("<<if $reputation >= 10>>"));

    let imported = import_script(&script).unwrap();
    assert_eq!(imported.nodes["menu"].data, graph.nodes["menu"].data);
}

#[test]
fn conditional_chain_has_a_single_endif() {
    init_tracing();
    let script = export_graph(&tavern()).unwrap();
    assert_eq!(script.matches("<<endif>>").count(), 2);

    let rumours = script
        .split("title: ")
        .find(|block| block.starts_with("rumours"))
        .unwrap();
    assert_eq!(rumours.matches("<<if ").count(), 1);
    assert_eq!(rumours.matches("<<elseif ").count(), 1);
    assert_eq!(rumours.matches("<<else>>").count(), 1);
    assert_eq!(rumours.matches("<<endif>>").count(), 1);
}

#[test]
fn unreferenced_node_is_exported() {
    init_tracing();
    let script = export_graph(&tavern()).unwrap();
    assert_eq!(script.matches("title: orphan").count(), 1);
    assert!(script.contains("Ghost: Nobody ever visits."));
}

#[test]
fn hand_written_script_without_preamble() {
    init_tracing();
    let script = "\
title: start
---
// the barkeep looks up
Barkeep: What'll it be?
<<jump order>>
===

title: order
---
<<if not $broke>>
    -> Ale
        <<set $drunk to true>>
        <<jump done>>
<<endif>>
-> Water
    <<jump done>>
===

title: done
---
Barkeep: Coming right up.
===
";
    let graph = import_script(script).unwrap();
    assert_eq!(graph.start_node_id, "start");
    assert_eq!(graph.end_node_ids().collect::<Vec<_>>(), vec!["done"]);

    let NodeData::Player(order) = &graph.nodes["order"].data else {
        panic!("expected a player node");
    };
    assert_eq!(order.choices[0].id, "order-choice-1");
    assert_eq!(order.choices[0].conditions, vec![Condition::is_not_set("broke")]);
    assert_eq!(order.choices[0].set_flags, vec!["drunk".to_string()]);
    assert_eq!(order.choices[1].next_node_id.as_deref(), Some("done"));
    assert_eq!(graph.edges.len(), 3);
}

#[test]
fn flag_schema_reports_mismatches_on_import() {
    init_tracing();
    let script = export_graph(&tavern()).unwrap();
    let schema = FlagSchema::new()
        .with_flag("reputation", FlagType::Number)
        .with_flag("gold", FlagType::String);
    let options = CompilerOptions::default().with_flag_schema(schema);

    let outcome = import_script_with_options(&script, &options).unwrap();
    assert!(outcome.validation.is_valid());
    assert!(outcome.validation.warnings.iter().any(|w| matches!(
        w,
        ValidationWarning::FlagTypeMismatch { flag, .. } if flag == "gold"
    )));
    assert!(outcome.validation.warnings.iter().any(|w| matches!(
        w,
        ValidationWarning::UnreachableNode { node_id } if node_id == "orphan"
    )));
}

#[test]
fn positions_can_be_left_out() {
    init_tracing();
    let options = CompilerOptions::default().with_positions(false).with_banner(false);
    let script = export_graph_with_options(&tavern(), &options).unwrap();
    assert!(!script.contains("position:"));
    assert!(script.starts_with("// @graph"));

    let imported = import_script(&script).unwrap();
    assert!(imported.nodes.values().all(|node| node.position.is_none()));
}

#[test]
fn edge_whitespace_in_text_survives_import() {
    init_tracing();
    let graph = DialogueGraph::new("g", "")
        .with_node(DialogueNode::new("wait", npc("Barkeep", "Wait... \n  and see", Some("menu"))))
        .with_node(DialogueNode::new(
            "menu",
            NodeData::Player(PlayerNode {
                choices: vec![Choice::new("c1", " Leave ").with_next("shrug")],
            }),
        ))
        .with_node(DialogueNode::new(
            "shrug",
            NodeData::Conditional(ConditionalNode {
                blocks: vec![ConditionalBlock::new(
                    "b1",
                    BlockKind::If,
                    Some(vec![Condition::is_set("x")]),
                    " shrugs ",
                )
                .unwrap()],
            }),
        ))
        .with_derived_edges();
    assert!(validate_graph(&graph, None).is_valid());

    let imported = import_script(&export_graph(&graph).unwrap()).unwrap();
    assert_eq!(imported, graph);
}

const NODE_COUNT: std::ops::Range<usize> = 1..6;

fn node_id(index: usize) -> String {
    format!("n{}", index)
}

fn target(nodes: usize) -> impl Strategy<Value = Option<String>> {
    prop::option::of((0..nodes).prop_map(node_id))
}

fn flag() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,8}"
}

fn speaker() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{0,6}"
}

/// One or more text lines, including characters the dialect escapes
fn content() -> impl Strategy<Value = String> {
    prop::collection::vec("[A-Za-z0-9 ,.!?:#<>{}/=\\\\-]{0,12}", 1..3).prop_map(|lines| lines.join("\n"))
}

fn choice_text() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ,.!?#<>{}\\\\-]{1,12}".prop_filter("choice needs text", |text| !text.trim().is_empty())
}

fn condition() -> impl Strategy<Value = Condition> {
    let operators = prop_oneof![
        Just(ConditionOperator::Equals),
        Just(ConditionOperator::NotEquals),
        Just(ConditionOperator::GreaterThan),
        Just(ConditionOperator::LessThan),
        Just(ConditionOperator::GreaterEqual),
        Just(ConditionOperator::LessEqual),
    ];
    let values = prop_oneof![
        any::<bool>().prop_map(ConditionValue::Bool),
        (-1000i32..1000).prop_map(|n| ConditionValue::Number(f64::from(n) / 4.0)),
        "[a-z]{1,6}".prop_map(ConditionValue::String),
    ];
    prop_oneof![
        flag().prop_map(Condition::is_set),
        flag().prop_map(Condition::is_not_set),
        (flag(), operators, values).prop_map(|(flag, op, value)| Condition::compare(flag, op, value)),
    ]
}

fn attributes() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("x_[a-z]{1,5}", "[A-Za-z0-9 =.\"\\\\]{0,10}", 0..3)
}

fn character(nodes: usize) -> impl Strategy<Value = NodeData> {
    (speaker(), content(), target(nodes), prop::collection::vec(flag(), 0..3)).prop_map(
        |(speaker, content, next_node_id, set_flags)| {
            NodeData::Character(CharacterNode {
                speaker,
                content,
                next_node_id,
                set_flags,
            })
        },
    )
}

fn player(nodes: usize) -> impl Strategy<Value = NodeData> {
    let choice = (
        choice_text(),
        prop::collection::vec(condition(), 0..3),
        target(nodes),
        prop::collection::vec(flag(), 0..2),
    );
    prop::collection::vec(choice, 1..4).prop_map(|choices| {
        NodeData::Player(PlayerNode {
            choices: choices
                .into_iter()
                .enumerate()
                .map(|(i, (text, conditions, next_node_id, set_flags))| Choice {
                    id: format!("c{}", i),
                    text,
                    next_node_id,
                    conditions,
                    set_flags,
                })
                .collect(),
        })
    })
}

fn conditional(nodes: usize) -> impl Strategy<Value = NodeData> {
    let branch = move || {
        (
            prop::collection::vec(condition(), 1..3),
            prop::option::of(speaker()),
            content(),
            target(nodes),
        )
    };
    (
        branch(),
        prop::collection::vec(branch(), 0..3),
        prop::option::of(branch()),
    )
        .prop_map(|(first, middle, last)| {
            let kinds = std::iter::once(BlockKind::If)
                .chain(std::iter::repeat(BlockKind::ElseIf).take(middle.len()))
                .chain(last.is_some().then_some(BlockKind::Else))
                .collect::<Vec<_>>();
            let branches = std::iter::once(first).chain(middle).chain(last);
            let blocks = kinds
                .into_iter()
                .zip(branches)
                .enumerate()
                .map(|(i, (kind, (conditions, speaker, content, next_node_id)))| ConditionalBlock {
                    id: format!("b{}", i),
                    kind,
                    condition: (kind != BlockKind::Else).then_some(conditions),
                    content,
                    speaker,
                    next_node_id,
                })
                .collect();
            NodeData::Conditional(ConditionalNode { blocks })
        })
}

fn storylet(nodes: usize) -> impl Strategy<Value = NodeData> {
    (
        "[a-z_]{1,8}",
        prop::option::of("[a-z]{1,6}"),
        0..nodes,
        any::<bool>(),
        attributes(),
    )
        .prop_map(|(template_id, entry_node_id, ret, returns, attributes)| {
            NodeData::Storylet(StoryletNode {
                template_id,
                entry_policy: if entry_node_id.is_some() {
                    EntryPolicy::Node
                } else {
                    EntryPolicy::Start
                },
                entry_node_id,
                return_policy: if returns { ReturnPolicy::Node } else { ReturnPolicy::End },
                return_node_id: returns.then(|| node_id(ret)),
                attributes,
            })
        })
}

fn storylet_pool(nodes: usize) -> impl Strategy<Value = NodeData> {
    let modes = prop_oneof![
        Just(SelectionMode::Random),
        Just(SelectionMode::Weighted),
        Just(SelectionMode::Sequential),
        Just(SelectionMode::FirstAvailable),
    ];
    (
        "[a-z_]{1,8}",
        modes,
        prop::collection::vec(("[a-z_]{1,8}", 1u32..5), 1..4),
        target(nodes),
        attributes(),
    )
        .prop_map(|(pool_id, selection_mode, members, next_node_id, attributes)| {
            NodeData::StoryletPool(StoryletPoolNode {
                pool_id,
                selection_mode,
                members: members
                    .into_iter()
                    .map(|(template_id, weight)| PoolMember { template_id, weight })
                    .collect(),
                next_node_id,
                attributes,
            })
        })
}

fn node_data(nodes: usize) -> impl Strategy<Value = NodeData> {
    prop_oneof![
        character(nodes),
        player(nodes),
        conditional(nodes),
        storylet(nodes),
        storylet_pool(nodes),
    ]
}

/// Graphs the validator accepts, built from every node kind
fn graph() -> impl Strategy<Value = DialogueGraph> {
    NODE_COUNT
        .prop_flat_map(|nodes| {
            (
                "[a-z][a-z0-9_]{0,8}",
                "[A-Za-z ]{0,12}",
                prop::collection::vec(
                    (node_data(nodes), prop::option::of((-400i32..400, -400i32..400))),
                    nodes,
                ),
                0..nodes,
                prop::collection::vec((0..nodes, prop::option::of("[a-z]{1,6}")), 0..3),
            )
        })
        .prop_map(|(id, title, payloads, start, ends)| {
            let mut graph = DialogueGraph::new(id, title);
            for (i, (data, position)) in payloads.into_iter().enumerate() {
                let mut node = DialogueNode::new(node_id(i), data);
                if let Some((x, y)) = position {
                    node = node.at(f64::from(x) / 2.0, f64::from(y) / 2.0);
                }
                graph.add_node(node);
            }
            graph.start_node_id = node_id(start);
            for (index, exit_key) in ends {
                let mut end = EndNode::new(node_id(index));
                end.exit_key = exit_key;
                graph.end_nodes.push(end);
            }
            graph.with_derived_edges()
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn generated_graphs_round_trip(graph in graph()) {
        prop_assert!(validate_graph(&graph, None).is_valid());

        let script = export_graph(&graph).unwrap();
        let imported = import_script(&script).unwrap();
        prop_assert_eq!(&imported, &graph);

        let again = export_graph(&imported).unwrap();
        prop_assert_eq!(again, script);
    }
}
