use eframe::egui;
use notchkit::connection::{ConnectionRole, workspace_reporter_connections, workspace_stack_connections};
use notchkit::transfer::CarrierAnchors;
use notchkit::{
    BlockDescriptor, Catalog, DropOutcome, Editor, EditorConfig, FixedAdvance, NodeId, ParamValue,
    ScriptDescriptor, Value, WorkspaceDescriptor,
};

fn editor() -> Editor {
    Editor::new(
        Catalog::builtin("en").unwrap(),
        EditorConfig::default(),
        Box::new(FixedAdvance::default()),
    )
}

fn blocks(opcodes: &[&str]) -> Vec<BlockDescriptor> {
    opcodes.iter().map(|o| BlockDescriptor::new(*o)).collect()
}

fn load(ed: &mut Editor, scripts: Vec<ScriptDescriptor>) {
    ed.load_document(&WorkspaceDescriptor { scripts });
}

fn script_blocks(ed: &Editor, index: usize) -> Vec<NodeId> {
    let script = ed.tree().script_at(ed.scripts(), index).unwrap();
    ed.tree().children(script).to_vec()
}

fn opcodes(script: &ScriptDescriptor) -> Vec<&str> {
    script.blocks.iter().map(|b| b.opcode.as_str()).collect()
}

#[test]
fn move_block_appends_to_a_stack_it_is_dropped_under() {
    let mut ed = editor();
    load(
        &mut ed,
        vec![ScriptDescriptor {
            x: 10.0,
            y: 0.0,
            blocks: blocks(&["motion.turn_right"]),
        }],
    );
    let height = ed.tree().size(ed.tree().script_at(ed.scripts(), 0).unwrap()).y;
    load(
        &mut ed,
        vec![
            ScriptDescriptor {
                x: 10.0,
                y: 40.0 - height,
                blocks: blocks(&["motion.turn_right"]),
            },
            ScriptDescriptor {
                x: 200.0,
                y: 200.0,
                blocks: blocks(&["motion.move"]),
            },
        ],
    );
    let target = ed.tree().script_at(ed.scripts(), 0).unwrap();
    let after = workspace_stack_connections(ed.tree(), ed.scripts())
        .into_iter()
        .find(|c| c.role == ConnectionRole::After(target))
        .unwrap();
    assert_eq!(after.pos, egui::pos2(10.0, 40.0));

    let mover = script_blocks(&ed, 1)[0];
    assert!(ed.start_drag(mover, egui::pos2(203.0, 203.0)));
    // Top notch lands at (13, 44): five units from the end of the stack.
    let snap = ed.drag_to(Some(ed.scripts()), egui::pos2(16.0, 47.0)).unwrap();
    assert_eq!(snap.connection.role, ConnectionRole::After(target));
    assert_eq!(snap.distance_sq, 25.0);
    assert_eq!(ed.drop_drag(), Some(DropOutcome::Snapped));

    let doc = ed.to_document();
    assert_eq!(doc.scripts.len(), 1);
    assert_eq!(opcodes(&doc.scripts[0]), ["motion.turn_right", "motion.move"]);
    assert_eq!((doc.scripts[0].x, doc.scripts[0].y), (10.0, 40.0 - height));
}

#[test]
fn number_inputs_coerce_typed_text() {
    let mut ed = editor();
    load(
        &mut ed,
        vec![ScriptDescriptor {
            x: 0.0,
            y: 0.0,
            blocks: blocks(&["motion.move"]),
        }],
    );
    let steps = ed.tree().param(script_blocks(&ed, 0)[0], "STEPS").unwrap();
    ed.set_input_text(steps, "3,14");
    assert_eq!(ed.tree().input(steps).unwrap().value(), &Value::Number(3.14));
    ed.set_input_text(steps, "abc");
    assert_eq!(ed.tree().input(steps).unwrap().value(), &Value::Number(0.0));
}

#[test]
fn inserting_into_an_occupied_input_displaces_the_occupant() {
    let mut ed = editor();
    load(
        &mut ed,
        vec![
            ScriptDescriptor {
                x: 0.0,
                y: 0.0,
                blocks: vec![BlockDescriptor::new("looks.say").with(
                    "MESSAGE",
                    ParamValue::Block(Box::new(BlockDescriptor::new("motion.x_position"))),
                )],
            },
            ScriptDescriptor {
                x: 300.0,
                y: 300.0,
                blocks: blocks(&["motion.y_position"]),
            },
        ],
    );
    let before = ed.to_document();
    let say = script_blocks(&ed, 0)[0];
    let message = ed.tree().param(say, "MESSAGE").unwrap();
    let a = ed.tree().input(message).unwrap().block().unwrap();
    let b = script_blocks(&ed, 1)[0];
    let socket = ed.tree().offset_in_root(message);
    assert!(
        workspace_reporter_connections(ed.tree(), ed.scripts(), b)
            .iter()
            .any(|c| c.role == ConnectionRole::InputSlot(message) && c.pos == socket)
    );

    assert!(ed.start_drag(b, egui::pos2(300.0, 300.0)));
    ed.drag_to(Some(ed.scripts()), socket);
    assert_eq!(ed.drop_drag(), Some(DropOutcome::Displaced));

    assert_eq!(ed.tree().input(message).unwrap().block(), Some(b));
    let doc = ed.to_document();
    assert_eq!(doc.scripts.len(), 2);
    let moved = &doc.scripts[1];
    assert_eq!(opcodes(moved), ["motion.x_position"]);
    assert_eq!((moved.x, moved.y), (socket.x + 20.0, socket.y + 20.0));
    assert_eq!(script_blocks(&ed, 1), [a]);

    // The whole displacement is one undo step.
    assert!(ed.undo());
    assert_eq!(ed.to_document(), before);
    assert!(!ed.history().can_undo());
    assert!(ed.redo());
    assert_eq!(ed.to_document(), doc);
}

/// Loads `when flag / move / say / turn right` and a lone `repeat`, then
/// drops the repeat so its empty branch meets the move block's notch.
fn wrap_fixture() -> (Editor, WorkspaceDescriptor) {
    let mut ed = editor();
    load(
        &mut ed,
        vec![
            ScriptDescriptor {
                x: 20.0,
                y: 20.0,
                blocks: blocks(&[
                    "events.when_flag",
                    "motion.move",
                    "looks.say",
                    "motion.turn_right",
                ]),
            },
            ScriptDescriptor {
                x: 400.0,
                y: 400.0,
                blocks: blocks(&["control.repeat"]),
            },
        ],
    );
    let before = ed.to_document();
    let mover = script_blocks(&ed, 0)[1];
    let insert = workspace_stack_connections(ed.tree(), ed.scripts())
        .into_iter()
        .find(|c| c.role == ConnectionRole::InsertBefore(mover))
        .unwrap();

    let repeat = script_blocks(&ed, 1)[0];
    assert!(ed.start_drag(repeat, egui::pos2(400.0, 400.0)));
    let carrier = ed.drag().unwrap().carrier();
    let at = ed.tree().position(carrier);
    let wrap = CarrierAnchors::of(ed.tree(), carrier, at).wrap.unwrap() - at;
    ed.drag_to(Some(ed.scripts()), insert.pos - wrap);
    assert_eq!(ed.drop_drag(), Some(DropOutcome::Wrapped));
    (ed, before)
}

#[test]
fn c_block_wraps_the_blocks_below_its_drop_point() {
    let (ed, _) = wrap_fixture();
    let doc = ed.to_document();
    assert_eq!(doc.scripts.len(), 1);
    let script = &doc.scripts[0];
    assert_eq!((script.x, script.y), (20.0, 20.0));
    assert_eq!(opcodes(script), ["events.when_flag", "control.repeat"]);
    let Some(ParamValue::Branch(inner)) = script.blocks[1].params.get("SUBSTACK") else {
        panic!("repeat lost its branch");
    };
    let inner: Vec<&str> = inner.iter().map(|b| b.opcode.as_str()).collect();
    assert_eq!(inner, ["motion.move", "looks.say", "motion.turn_right"]);
}

#[test]
fn undoing_a_wrap_restores_both_scripts() {
    let (mut ed, before) = wrap_fixture();
    let wrapped = ed.to_document();
    assert!(ed.undo());
    assert_eq!(ed.to_document(), before);
    assert!(ed.redo());
    assert_eq!(ed.to_document(), wrapped);
    assert!(!ed.redo());
}

#[test]
fn new_edits_clear_the_redo_stack() {
    let mut ed = editor();
    ed.spawn_block("motion.move", egui::pos2(0.0, 0.0));
    ed.spawn_block("looks.say", egui::pos2(200.0, 0.0));
    assert!(ed.undo());
    assert!(ed.history().can_redo());
    ed.spawn_block("control.wait", egui::pos2(0.0, 200.0));
    assert!(!ed.history().can_redo());
    assert_eq!(ed.to_document().scripts.len(), 2);
}

#[test]
fn undoing_a_reporter_drop_brings_back_the_typed_value() {
    let mut ed = editor();
    load(
        &mut ed,
        vec![
            ScriptDescriptor {
                x: 0.0,
                y: 0.0,
                blocks: vec![
                    BlockDescriptor::new("motion.move")
                        .with("STEPS", ParamValue::Value(Value::Number(10.0))),
                ],
            },
            ScriptDescriptor {
                x: 300.0,
                y: 300.0,
                blocks: blocks(&["motion.x_position"]),
            },
        ],
    );
    let before = ed.to_document();
    let steps = ed.tree().param(script_blocks(&ed, 0)[0], "STEPS").unwrap();
    let label = ed.tree().input(steps).unwrap().text_node();
    let reporter = script_blocks(&ed, 1)[0];
    let socket = ed.tree().offset_in_root(steps);

    assert!(ed.start_drag(reporter, egui::pos2(300.0, 300.0)));
    let snap = ed.drag_to(Some(ed.scripts()), socket).unwrap();
    assert_eq!(snap.connection.role, ConnectionRole::InputSlot(steps));
    assert_eq!(ed.drop_drag(), Some(DropOutcome::Snapped));
    assert_eq!(ed.tree().input(steps).unwrap().block(), Some(reporter));
    assert_eq!(ed.tree().text(label), Some(""));

    assert!(ed.undo());
    assert_eq!(ed.tree().input(steps).unwrap().value(), &Value::Number(10.0));
    assert_eq!(ed.tree().text(label), Some("10"));
    assert_eq!(ed.to_document(), before);
}

#[test]
fn wrapping_a_script_head_leaves_the_wrapped_blocks_in_place() {
    let mut ed = editor();
    load(
        &mut ed,
        vec![
            ScriptDescriptor {
                x: 0.0,
                y: 100.0,
                blocks: blocks(&["motion.move", "looks.say", "control.wait"]),
            },
            ScriptDescriptor {
                x: 400.0,
                y: 400.0,
                blocks: blocks(&["control.repeat"]),
            },
        ],
    );
    let before = ed.to_document();
    let target = ed.tree().script_at(ed.scripts(), 0).unwrap();
    let followers = script_blocks(&ed, 0);
    let drawn: Vec<egui::Pos2> = followers.iter().map(|b| ed.tree().offset_in_root(*b)).collect();
    let head = workspace_stack_connections(ed.tree(), ed.scripts())
        .into_iter()
        .find(|c| c.role == ConnectionRole::BeforeScript(target))
        .unwrap();

    let repeat = script_blocks(&ed, 1)[0];
    assert!(ed.start_drag(repeat, egui::pos2(400.0, 400.0)));
    let carrier = ed.drag().unwrap().carrier();
    let at = ed.tree().position(carrier);
    let wrap = CarrierAnchors::of(ed.tree(), carrier, at).wrap.unwrap() - at;
    ed.drag_to(Some(ed.scripts()), head.pos - wrap);
    assert_eq!(ed.drop_drag(), Some(DropOutcome::Wrapped));

    let doc = ed.to_document();
    assert_eq!(doc.scripts.len(), 1);
    assert_eq!(opcodes(&doc.scripts[0]), ["control.repeat"]);
    let moved: Vec<egui::Pos2> = followers.iter().map(|b| ed.tree().offset_in_root(*b)).collect();
    assert_eq!(moved, drawn);
    assert_eq!(moved[0], egui::pos2(0.0, 100.0));

    assert!(ed.undo());
    assert_eq!(ed.to_document(), before);
    assert!(ed.redo());
    assert_eq!(ed.to_document(), doc);
    let redone: Vec<egui::Pos2> = followers.iter().map(|b| ed.tree().offset_in_root(*b)).collect();
    assert_eq!(redone, drawn);
}
