//! 编辑会话的端到端行为

use zseq_core::elements::FORBIDDEN_END_MARGIN;
use zseq_core::math::approx_eq;
use zseq_core::prelude::*;
use zseq_core::serialize;

fn part_value(objects: &[PropertyBag], id: EntityId, part: &str, key: &str) -> f64 {
    objects
        .iter()
        .find(|b| b["id"] == id.0 && b["elementPart"] == part)
        .and_then(|b| b[key].as_f64())
        .unwrap()
}

#[test]
fn test_class_scenario_undo_redo() {
    let mut diagram = Diagram::default();
    let id = diagram.create_entity(
        ElementKind::ClassWithLifeline,
        Point2::new(100.0, 100.0),
        Some("System"),
    );
    let shape = diagram.part(id, PartRole::Shape).unwrap();
    diagram.move_part(shape, Vector2::new(50.0, 0.0));

    diagram.undo();
    let objects = diagram.export_objects();
    assert!(approx_eq(part_value(&objects, id, "shape", "left"), 100.0));

    diagram.redo();
    let objects = diagram.export_objects();
    assert!(approx_eq(part_value(&objects, id, "shape", "left"), 150.0));
}

#[test]
fn test_activation_box_follows_lifeline() {
    let mut diagram = Diagram::default();
    let id = diagram.create_entity(ElementKind::ClassWithLifeline, Point2::new(100.0, 100.0), None);
    let activation = diagram.add_activation_box(id, 300.0).unwrap().unwrap();
    let before = diagram.surface().get(activation).unwrap().clone();

    let shape = diagram.part(id, PartRole::Shape).unwrap();
    diagram.move_part(shape, Vector2::new(0.0, 40.0));

    let after = diagram.surface().get(activation).unwrap();
    assert!(approx_eq(after.top - before.top, 40.0));
    assert!(approx_eq(after.left, before.left));
    assert_eq!(after.line_start_distance, before.line_start_distance);
    assert_eq!(before.line_start_distance, Some(150.0));
}

#[test]
fn test_forbidden_zone_rejects_box() {
    let mut diagram = Diagram::default();
    let id = diagram.create_entity(ElementKind::ActorWithLifeline, Point2::new(100.0, 50.0), Some("User"));
    let end = diagram
        .entity(id)
        .and_then(|e| e.composite().lifeline())
        .and_then(|l| l.rendered_end(diagram.surface()))
        .unwrap();
    let captures = diagram.history().len();

    assert_eq!(diagram.add_activation_box(id, end - 10.0).unwrap(), None);
    assert!(diagram.entity(id).unwrap().activation_boxes().is_empty());
    assert_eq!(diagram.history().len(), captures);

    assert!(diagram
        .add_activation_box(id, end - FORBIDDEN_END_MARGIN - 1.0)
        .unwrap()
        .is_some());
}

#[test]
fn test_note_grows_with_long_text() {
    let mut diagram = Diagram::default();
    let id = diagram.create_entity(ElementKind::Note, Point2::new(20.0, 20.0), None);
    let text = diagram.part(id, PartRole::Text).unwrap();
    let body = diagram.part(id, PartRole::Body).unwrap();

    let typed = "x".repeat(80);
    assert!(diagram.edit_text(text, &typed));

    let text_width = diagram.surface().measure_text(&typed, 15.0);
    let width = diagram.surface().get(body).unwrap().scaled_width();
    assert!(width >= text_width + 20.0);
    assert!(width >= 75.0);
}

#[test]
fn test_note_never_shrinks_below_minimum() {
    let mut diagram = Diagram::default();
    let id = diagram.create_entity(ElementKind::Note, Point2::new(20.0, 20.0), None);
    let body = diagram.part(id, PartRole::Body).unwrap();

    diagram.scale_part(body, 0.1, 0.1);

    let body = diagram.surface().get(body).unwrap();
    assert!(approx_eq(body.scaled_width(), 75.0));
    assert!(approx_eq(body.scaled_height(), 50.0));
}

#[test]
fn test_round_trip_keeps_boxes_and_destroy() {
    let mut diagram = Diagram::default();
    let actor = diagram.create_entity(ElementKind::ActorWithLifeline, Point2::new(50.0, 20.0), Some("User"));
    let class = diagram.create_entity(ElementKind::ClassWithLifeline, Point2::new(300.0, 20.0), Some("Server"));
    let message = diagram.create_entity(ElementKind::Message, Point2::new(90.0, 250.0), Some("login()"));
    diagram.create_entity(ElementKind::CombinedFragment, Point2::new(30.0, 200.0), None);
    diagram.create_entity(ElementKind::Note, Point2::new(600.0, 40.0), Some("remember"));

    diagram.add_activation_box(actor, 240.0).unwrap();
    diagram.add_activation_box(class, 260.0).unwrap();
    diagram.add_activation_box(class, 400.0).unwrap();
    diagram.set_property(class, "destroy", true).unwrap();
    diagram.set_property(message, "type", "asynchronous").unwrap();
    diagram.set_property(message, "orientation", "left").unwrap();

    let objects = diagram.export_objects();

    let mut restored = Diagram::default();
    let summary = restored.import_objects(&objects).unwrap();
    assert_eq!(summary.entities, 5);
    assert_eq!(summary.skipped_groups, 0);
    assert_eq!(restored.export_objects(), objects);

    let class_entity = restored.entity(class).unwrap();
    assert_eq!(class_entity.kind(), ElementKind::ClassWithLifeline);
    assert_eq!(class_entity.activation_boxes().len(), 2);
    assert!(class_entity.is_destroyed_marked());
    assert!(!restored.entity(actor).unwrap().is_destroyed_marked());

    let properties = restored.editable_properties(message).unwrap();
    let kind = properties.iter().find(|p| p.key == "type").unwrap();
    assert_eq!(kind.value, PropertyValue::from("asynchronous"));
}

#[test]
fn test_layout_is_idempotent() {
    let mut registry = Registry::new();
    let mut canvas = Canvas::default();
    for (x, kind) in ElementKind::ALL.iter().enumerate() {
        let id = registry.allocate_id();
        let element = DiagramElement::create(*kind, id, &mut canvas, Point2::new(x as f64 * 220.0, 60.0), Some("A"));
        registry.register(element);
    }

    for id in registry.ids() {
        let main = registry.get(id).unwrap().composite().main_part();
        let role = registry
            .get(id)
            .unwrap()
            .parts()
            .into_iter()
            .find(|(_, p)| *p == main)
            .map(|(r, _)| r)
            .unwrap();
        registry.get_mut(id).unwrap().update_layout(&mut canvas, role);
        let first = serialize::flatten(&registry, &mut canvas);
        registry.get_mut(id).unwrap().update_layout(&mut canvas, role);
        assert_eq!(serialize::flatten(&registry, &mut canvas), first);
    }
}

#[test]
fn test_failed_import_leaves_diagram_unchanged() {
    let mut diagram = Diagram::default();
    diagram.create_entity(ElementKind::ClassWithLifeline, Point2::new(10.0, 10.0), None);
    let before = diagram.export_objects();
    let captures = diagram.history().len();

    let mut broken = PropertyBag::new();
    broken.insert("left".into(), "nowhere".into());
    assert!(matches!(
        diagram.import_objects(&[broken]),
        Err(CoreError::MalformedPrimitive { index: 0, .. })
    ));
    assert_eq!(diagram.export_objects(), before);
    assert_eq!(diagram.history().len(), captures);
}

#[test]
fn test_deleted_entity_is_not_exported() {
    let mut diagram = Diagram::default();
    let a = diagram.create_entity(ElementKind::Note, Point2::new(0.0, 0.0), None);
    let b = diagram.create_entity(ElementKind::Message, Point2::new(300.0, 300.0), None);
    diagram.delete_entity(a).unwrap();

    let objects = diagram.export_objects();
    assert_eq!(objects.len(), 3);
    assert!(objects.iter().all(|o| o["id"] == b.0));
    assert!(matches!(diagram.delete_entity(a), Err(CoreError::EntityNotFound(_))));

    diagram.undo();
    assert!(diagram.entity(a).is_some());
}

fn lifeline_dash(diagram: &Diagram, id: EntityId) -> Option<Vec<f64>> {
    let line = diagram.part(id, PartRole::Lifeline).unwrap();
    diagram.surface().get(line).unwrap().style.stroke_dash_array.clone()
}

#[test]
fn test_scaled_lifeline_survives_round_trip() {
    for kind in [ElementKind::ActorWithLifeline, ElementKind::ClassWithLifeline] {
        let mut diagram = Diagram::default();
        let id = diagram.create_entity(kind, Point2::new(80.0, 40.0), Some("Peer"));
        let line = diagram.part(id, PartRole::Lifeline).unwrap();

        assert!(diagram.scale_part(line, 1.0, 2.0));
        assert_eq!(lifeline_dash(&diagram, id), LineType::Dashed.scaled_pattern(2.0));
        assert_eq!(diagram.history().len(), 2);
        let scaled = diagram.export_objects();

        let mut restored = Diagram::default();
        let summary = restored.import_objects(&scaled).unwrap();
        assert_eq!(summary.entities, 1);
        assert_eq!(restored.export_objects(), scaled);
        assert_eq!(lifeline_dash(&restored, id), LineType::Dashed.scaled_pattern(2.0));

        assert!(diagram.undo());
        assert_eq!(lifeline_dash(&diagram, id), LineType::Dashed.scaled_pattern(1.0));
        assert!(diagram.redo());
        assert_eq!(lifeline_dash(&diagram, id), LineType::Dashed.scaled_pattern(2.0));
        assert_eq!(diagram.export_objects(), scaled);
    }
}

#[test]
fn test_import_with_maximum_id_does_not_panic() {
    let mut source = Diagram::default();
    source.create_entity(ElementKind::Note, Point2::new(0.0, 0.0), Some("overflow"));
    let mut objects = source.export_objects();
    for bag in &mut objects {
        bag.insert("id".into(), u64::MAX.into());
    }

    let mut diagram = Diagram::default();
    let summary = diagram.import_objects(&objects).unwrap();
    assert_eq!(summary.entities, 0);
    assert_eq!(summary.skipped_groups, 1);
    assert!(diagram.export_objects().is_empty());

    let id = diagram.create_entity(ElementKind::Note, Point2::new(10.0, 10.0), None);
    assert_eq!(id, EntityId(1));
}
