//! 类（矩形 + 标签 + 生命线）

use super::lifeline::{box_fill, Lifeline};
use super::{
    expect_text, Composite, EditableProperty, ElementCore, ElementKind, PartRole, PartSet,
    PropertyValue,
};
use crate::entity::EntityId;
use crate::error::CoreError;
use crate::math::Point2;
use crate::primitive::{Primitive, PrimitiveId, TextAlign, DEFAULT_FONT_SIZE};
use crate::properties::{is_palette_color, Style, DEFAULT_FILL};
use crate::surface::{Surface, SurfaceEvent};
use tracing::debug;

const CLASS_WIDTH: f64 = 200.0;
const CLASS_HEIGHT: f64 = 50.0;

/// 标签相对矩形顶边的内边距
const LABEL_INSET: f64 = 2.0;

#[derive(Debug)]
pub struct ClassWithLifeline {
    core: ElementCore,
    shape: PrimitiveId,
    label: PrimitiveId,
    lifeline: Lifeline,
}

impl ClassWithLifeline {
    pub fn new(id: EntityId, surface: &mut dyn Surface, position: Point2, label: Option<&str>) -> Self {
        let rect = Primitive::rect(
            position.x,
            position.y,
            CLASS_WIDTH,
            CLASS_HEIGHT,
            Style::filled(DEFAULT_FILL, 2.0),
        )
        .lock_scaling();

        let mut caption = Primitive::textbox(
            label.unwrap_or_default(),
            position.x,
            position.y + LABEL_INSET,
            CLASS_WIDTH,
            DEFAULT_FONT_SIZE,
        )
        .lock_scaling();
        caption.set_underline(true);
        caption.set_text_align(TextAlign::Center);

        let center_x = position.x + CLASS_WIDTH / 2.0;
        let start_y = position.y + CLASS_HEIGHT;

        let shape = surface.add(rect);
        let label = surface.add(caption);
        let end_y = surface.height();
        let line = Lifeline::draw(surface, center_x, start_y, end_y);

        let mut class = Self {
            core: ElementCore::new(id, ElementKind::ClassWithLifeline, position),
            shape,
            label,
            lifeline: Lifeline::drawn(line, end_y - start_y),
        };
        class.go_live(surface);
        class
    }

    /// 由已有部件重建
    pub fn from_parts(
        id: EntityId,
        surface: &mut dyn Surface,
        position: Point2,
        parts: &PartSet,
    ) -> Result<Self, CoreError> {
        let kind = ElementKind::ClassWithLifeline;
        let shape = parts.require(kind, PartRole::Shape)?;
        let label = parts.require(kind, PartRole::Label)?;
        let mut lifeline = Lifeline::attach(surface, kind, parts.require(kind, PartRole::Lifeline)?)?;
        if let Some(marker) = parts.get(PartRole::DestroyMarker) {
            lifeline.adopt_destroy_marker(marker);
        }

        let mut class = Self {
            core: ElementCore::new(id, kind, position),
            shape,
            label,
            lifeline,
        };
        class.go_live(surface);
        Ok(class)
    }

    pub fn shape(&self) -> PrimitiveId {
        self.shape
    }

    pub fn label(&self) -> PrimitiveId {
        self.label
    }
}

impl Composite for ClassWithLifeline {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn parts(&self) -> Vec<(PartRole, PrimitiveId)> {
        let mut parts = vec![(PartRole::Shape, self.shape), (PartRole::Label, self.label)];
        parts.extend(self.lifeline.parts());
        parts
    }

    fn attach_events(&self, surface: &mut dyn Surface) {
        surface.on(self.shape, SurfaceEvent::Moving, self.core.listener(PartRole::Shape));
        surface.on(self.label, SurfaceEvent::Moving, self.core.listener(PartRole::Label));
        self.lifeline.attach_events(surface, &self.core);
    }

    fn update_layout(&mut self, surface: &mut dyn Surface, source: PartRole) {
        let (Some(rect), Some(caption)) = (surface.get(self.shape), surface.get(self.label)) else {
            return;
        };
        let (rect, caption) = (rect.bounds(), caption.bounds());

        if source == PartRole::Label {
            // 矩形反向跟随标签
            if let Some(shape) = surface.get_mut(self.shape) {
                shape.left = caption.center().x - rect.width() / 2.0;
                shape.top = caption.min.y - LABEL_INSET;
            }
        } else {
            if source == PartRole::Lifeline {
                self.lifeline.on_scaled(surface);
            }
            if let Some(label) = surface.get_mut(self.label) {
                label.left = rect.center().x - caption.width() / 2.0;
                label.top = rect.min.y + LABEL_INSET;
            }
        }

        let Some(rect) = surface.get(self.shape).map(|p| p.bounds()) else {
            return;
        };
        self.lifeline.layout(surface, rect.center().x, rect.max.y);
    }

    fn editable_properties(&self, surface: &dyn Surface) -> Vec<EditableProperty> {
        let text = surface
            .get(self.label)
            .and_then(|p| p.text())
            .unwrap_or_default();
        vec![
            EditableProperty::text("text", "Class Label", text),
            EditableProperty::color("fill", "Fill Color", box_fill(surface, self.shape)),
            EditableProperty::boolean("destroy", "Destroy Marker", self.lifeline.destroy()),
        ]
    }

    fn set_property(
        &mut self,
        surface: &mut dyn Surface,
        key: &str,
        value: &PropertyValue,
    ) -> Result<(), CoreError> {
        match key {
            "text" => {
                let text = expect_text(key, value)?;
                if let Some(caption) = surface.get_mut(self.label) {
                    caption.set_text(text);
                }
            }
            "fill" => {
                let color = expect_text(key, value)?;
                if !is_palette_color(color) {
                    debug!("Class {} uses off-palette color {}", self.core.id, color);
                }
                if let Some(rect) = surface.get_mut(self.shape) {
                    rect.set_fill(color);
                }
                self.lifeline.recolor_boxes(surface, color);
            }
            "destroy" => {
                let destroy = value.as_bool().ok_or_else(|| CoreError::InvalidPropertyValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                self.lifeline.set_destroy(surface, &self.core, destroy);
            }
            _ => {
                return Err(CoreError::UnknownProperty {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    fn main_part(&self) -> PrimitiveId {
        self.shape
    }

    fn lifeline(&self) -> Option<&Lifeline> {
        Some(&self.lifeline)
    }

    fn lifeline_mut(&mut self) -> Option<&mut Lifeline> {
        Some(&mut self.lifeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{approx_eq, Vector2};
    use crate::surface::Canvas;

    #[test]
    fn test_shape_drag_moves_label_lifeline_and_boxes() {
        let mut canvas = Canvas::default();
        let mut class =
            ClassWithLifeline::new(EntityId(1), &mut canvas, Point2::new(100.0, 100.0), Some("System"));
        let core = class.core.clone();
        let activation = class
            .lifeline
            .create_activation_box(&mut canvas, &core, 250.0, DEFAULT_FILL)
            .unwrap();

        canvas.drag(class.shape(), Vector2::new(50.0, 30.0));
        class.update_layout(&mut canvas, PartRole::Shape);

        let label = canvas.get(class.label()).unwrap();
        assert!(approx_eq(label.left, 150.0));
        assert!(approx_eq(label.top, 132.0));

        let (start, _) = class.lifeline.endpoints(&canvas).unwrap();
        assert!(approx_eq(start.x, 250.0));
        assert!(approx_eq(start.y, 180.0));

        let activation = canvas.get(activation).unwrap();
        assert!(approx_eq(activation.top, 280.0));
        assert_eq!(activation.line_start_distance, Some(100.0));
    }

    #[test]
    fn test_label_drag_pulls_shape() {
        let mut canvas = Canvas::default();
        let mut class = ClassWithLifeline::new(EntityId(1), &mut canvas, Point2::new(0.0, 0.0), None);

        canvas.drag(class.label(), Vector2::new(10.0, 20.0));
        class.update_layout(&mut canvas, PartRole::Label);

        let rect = canvas.get(class.shape()).unwrap();
        assert!(approx_eq(rect.left, 10.0));
        assert!(approx_eq(rect.top, 20.0));
    }

    #[test]
    fn test_layout_is_idempotent() {
        let mut canvas = Canvas::default();
        let mut class = ClassWithLifeline::new(EntityId(1), &mut canvas, Point2::new(40.0, 60.0), None);
        canvas.drag(class.shape(), Vector2::new(7.0, 3.0));

        class.update_layout(&mut canvas, PartRole::Shape);
        let first: Vec<_> = canvas.primitives().iter().map(|id| canvas.get(*id).cloned()).collect();
        class.update_layout(&mut canvas, PartRole::Shape);
        let second: Vec<_> = canvas.primitives().iter().map(|id| canvas.get(*id).cloned()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_destroy_flag_round_trips_through_properties() {
        let mut canvas = Canvas::default();
        let mut class = ClassWithLifeline::new(EntityId(1), &mut canvas, Point2::new(0.0, 0.0), None);

        class
            .set_property(&mut canvas, "destroy", &PropertyValue::from("true"))
            .unwrap();
        let props = class.editable_properties(&canvas);
        assert_eq!(props[2].value, PropertyValue::Bool(true));
        assert_eq!(class.parts().len(), 4);

        assert!(matches!(
            class.set_property(&mut canvas, "destroy", &PropertyValue::from("sometimes")),
            Err(CoreError::InvalidPropertyValue { .. })
        ));
    }
}
