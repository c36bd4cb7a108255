use eframe::egui;
use notchkit::location::location_of_block;
use notchkit::transfer::{CarrierAnchors, grab, nearest, shove};
use notchkit::connection::{Connection, ConnectionRole};
use notchkit::{
    BlockDescriptor, Catalog, Editor, EditorConfig, FixedAdvance, KindTag, NodeId, ParamValue,
    ScriptDescriptor, Tree, Value, WorkspaceDescriptor, WorkspaceRole,
};
use proptest::prelude::*;

fn reporter() -> BoxedStrategy<BlockDescriptor> {
    prop_oneof![
        Just(BlockDescriptor::new("motion.x_position")),
        Just(BlockDescriptor::new("motion.y_position")),
        (0..100i32).prop_map(|n| {
            BlockDescriptor::new("operators.add")
                .with("A", ParamValue::Value(Value::Number(f64::from(n))))
        }),
    ]
    .boxed()
}

fn command(depth: u32) -> BoxedStrategy<BlockDescriptor> {
    let leaf = prop_oneof![
        (0..50i32).prop_map(|n| {
            BlockDescriptor::new("motion.move").with("STEPS", ParamValue::Value(Value::Number(f64::from(n))))
        }),
        reporter().prop_map(|r| BlockDescriptor::new("motion.move").with("STEPS", ParamValue::Block(Box::new(r)))),
        "[a-z ]{0,8}".prop_map(|s| BlockDescriptor::new("looks.say").with("MESSAGE", ParamValue::Value(Value::Text(s)))),
        Just(BlockDescriptor::new("control.wait")),
        Just(BlockDescriptor::new("motion.turn_left")),
    ]
    .boxed();
    if depth == 0 {
        return leaf;
    }
    prop_oneof![
        3 => leaf,
        1 => prop::collection::vec(command(depth - 1), 0..3).prop_map(|inner| {
            BlockDescriptor::new("control.repeat").with("SUBSTACK", ParamValue::Branch(inner))
        }),
    ]
    .boxed()
}

fn workspace() -> impl Strategy<Value = WorkspaceDescriptor> {
    prop::collection::vec(
        (0..8i32, 0..8i32, prop::collection::vec(command(2), 1..4)).prop_map(|(x, y, blocks)| {
            ScriptDescriptor {
                x: x as f32 * 150.0,
                y: y as f32 * 120.0,
                blocks,
            }
        }),
        1..4,
    )
    .prop_map(|scripts| WorkspaceDescriptor { scripts })
}

fn built(desc: &WorkspaceDescriptor, catalog: &Catalog) -> (Tree, NodeId) {
    let mut tree = Tree::default();
    let ws = tree.create_workspace(WorkspaceRole::Scripts);
    tree.load_workspace(ws, desc, catalog);
    tree.resize(ws, &FixedAdvance::default());
    (tree, ws)
}

fn snapshot(tree: &Tree, ws: NodeId) -> Vec<(Option<egui::Vec2>, egui::Pos2)> {
    tree.descendants(ws)
        .into_iter()
        .map(|n| (tree.measurements(n), tree.position(n)))
        .collect()
}

fn editor_with(desc: &WorkspaceDescriptor) -> Editor {
    let mut ed = Editor::new(
        Catalog::builtin("en").unwrap(),
        EditorConfig::default(),
        Box::new(FixedAdvance::default()),
    );
    ed.load_document(desc);
    ed
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn serialized_trees_rebuild_identically(desc in workspace()) {
        let catalog = Catalog::builtin("en").unwrap();
        let (tree, ws) = built(&desc, &catalog);
        let first = tree.serialize_workspace(ws);
        let (again, ws2) = built(&first, &catalog);
        prop_assert_eq!(again.serialize_workspace(ws2), first);
    }

    #[test]
    fn resizing_twice_changes_nothing(desc in workspace()) {
        let catalog = Catalog::builtin("en").unwrap();
        let (mut tree, ws) = built(&desc, &catalog);
        let once = snapshot(&tree, ws);
        tree.force_resize(ws, &FixedAdvance::default());
        prop_assert_eq!(snapshot(&tree, ws), once.clone());
        tree.resize(ws, &FixedAdvance::default());
        prop_assert_eq!(snapshot(&tree, ws), once);
    }

    #[test]
    fn shoving_back_undoes_a_grab(desc in workspace(), pick in any::<prop::sample::Index>(), cap in 0usize..4) {
        let catalog = Catalog::builtin("en").unwrap();
        let measure = FixedAdvance::default();
        let (mut tree, ws) = built(&desc, &catalog);
        let before = tree.serialize_workspace(ws);
        let blocks = tree.blocks_below(ws);
        let block = blocks[pick.index(blocks.len())];
        let location = location_of_block(&tree, block).unwrap();
        let in_input = tree.parent(block).is_some_and(|p| tree.tag(p) == KindTag::Input);
        let max = if in_input || !tree.is_stackable(block) {
            Some(1)
        } else {
            (cap > 0).then_some(cap)
        };
        let grabbed = grab(&mut tree, &location, max, &catalog, &measure);
        prop_assert!(grabbed.count >= 1);
        shove(&mut tree, &grabbed.origin, grabbed.carrier, &measure);
        prop_assert_eq!(tree.serialize_workspace(ws), before);
    }

    #[test]
    fn undo_all_then_redo_all_round_trips(
        desc in workspace(),
        moves in prop::collection::vec((any::<prop::sample::Index>(), 0..60i32, 0..60i32, 0..10u8), 1..6),
    ) {
        let mut ed = editor_with(&desc);
        let initial = ed.to_document();
        let mut performed = 0;
        for (pick, x, y, mode) in moves {
            let blocks = ed.tree().blocks_below(ed.scripts());
            if blocks.is_empty() {
                break;
            }
            let block = blocks[pick.index(blocks.len())];
            let at = ed.tree().offset_in_root(block);
            if !ed.start_drag(block, at) {
                continue;
            }
            // Coarse coordinates land on connections often enough to snap.
            let target = if mode == 0 { ed.palette() } else { ed.scripts() };
            ed.drag_to(Some(target), egui::pos2(x as f32 * 20.0, y as f32 * 16.0));
            ed.drop_drag();
            performed += 1;
        }
        let edited = ed.to_document();
        let mut undone = 0;
        while ed.undo() {
            undone += 1;
        }
        prop_assert!(undone <= performed);
        prop_assert_eq!(ed.to_document(), initial);
        while ed.redo() {}
        prop_assert_eq!(ed.to_document(), edited);
    }

    #[test]
    fn out_of_range_candidates_never_win(
        points in prop::collection::vec((-100.0f32..100.0, -100.0f32..100.0), 1..12),
        max in 1.0f32..40.0,
    ) {
        let anchors = CarrierAnchors {
            top: Some(egui::Pos2::ZERO),
            ..CarrierAnchors::default()
        };
        let stack: NodeId = serde_json::from_str("1").unwrap();
        let connections: Vec<Connection> = points
            .iter()
            .map(|(x, y)| Connection { pos: egui::pos2(*x, *y), role: ConnectionRole::After(stack) })
            .collect();
        match nearest(&connections, &anchors, max) {
            Some(best) => {
                prop_assert!(best.distance_sq <= max * max);
                for c in &connections {
                    let d = c.pos.to_vec2().length_sq();
                    prop_assert!(d > max * max || d >= best.distance_sq);
                }
            }
            None => {
                for c in &connections {
                    prop_assert!(c.pos.to_vec2().length_sq() > max * max);
                }
            }
        }
    }
}
