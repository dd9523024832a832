//! 参与者（小人 + 标签 + 生命线）

use super::lifeline::{box_fill, Lifeline};
use super::{
    expect_text, Composite, EditableProperty, ElementCore, ElementKind, PartRole, PartSet,
    PropertyValue,
};
use crate::entity::EntityId;
use crate::error::CoreError;
use crate::math::Point2;
use crate::primitive::{Primitive, PrimitiveId, TextAlign, DEFAULT_FONT_SIZE};
use crate::properties::is_palette_color;
use crate::surface::{Surface, SurfaceEvent};
use tracing::debug;

/// 标签与小人之间的间距
const LABEL_GAP: f64 = 5.0;

/// 生命线与标签之间的间距
const LIFELINE_GAP: f64 = 10.0;

#[derive(Debug)]
pub struct ActorWithLifeline {
    core: ElementCore,
    shape: PrimitiveId,
    label: PrimitiveId,
    lifeline: Lifeline,
}

impl ActorWithLifeline {
    pub fn new(id: EntityId, surface: &mut dyn Surface, position: Point2, label: Option<&str>) -> Self {
        let figure = Primitive::figure(position.x, position.y).lock_scaling();
        let center_x = figure.center().x;
        let text = label.unwrap_or_default();

        let width = label_width(surface, text, figure.width);
        let mut caption = Primitive::textbox(
            text,
            center_x - width / 2.0,
            figure.top + figure.scaled_height() + LABEL_GAP,
            width,
            DEFAULT_FONT_SIZE,
        )
        .lock_scaling();
        caption.set_underline(true);
        caption.set_text_align(TextAlign::Center);
        let start_y = caption.top + caption.height + LIFELINE_GAP;

        let shape = surface.add(figure);
        let label = surface.add(caption);
        let end_y = surface.height();
        let line = Lifeline::draw(surface, center_x, start_y, end_y);

        let mut actor = Self {
            core: ElementCore::new(id, ElementKind::ActorWithLifeline, position),
            shape,
            label,
            lifeline: Lifeline::drawn(line, end_y - start_y),
        };
        actor.go_live(surface);
        actor
    }

    /// 由已有部件重建
    pub fn from_parts(
        id: EntityId,
        surface: &mut dyn Surface,
        position: Point2,
        parts: &PartSet,
    ) -> Result<Self, CoreError> {
        let kind = ElementKind::ActorWithLifeline;
        let shape = parts.require(kind, PartRole::Shape)?;
        let label = parts.require(kind, PartRole::Label)?;
        let mut lifeline = Lifeline::attach(surface, kind, parts.require(kind, PartRole::Lifeline)?)?;
        if let Some(marker) = parts.get(PartRole::DestroyMarker) {
            lifeline.adopt_destroy_marker(marker);
        }

        let mut actor = Self {
            core: ElementCore::new(id, kind, position),
            shape,
            label,
            lifeline,
        };
        actor.go_live(surface);
        Ok(actor)
    }

    pub fn shape(&self) -> PrimitiveId {
        self.shape
    }

    pub fn label(&self) -> PrimitiveId {
        self.label
    }

    fn set_label_text(&mut self, surface: &mut dyn Surface, text: &str) {
        let min_width = surface.get(self.shape).map(|s| s.scaled_width()).unwrap_or_default();
        let width = label_width(surface, text, min_width);
        if let Some(caption) = surface.get_mut(self.label) {
            caption.set_text(text);
            caption.width = width;
        }
        self.update_layout(surface, PartRole::Shape);
    }
}

/// 标签宽度：不窄于小人，容纳最长一行
fn label_width(surface: &dyn Surface, text: &str, min_width: f64) -> f64 {
    text.split('\n')
        .map(|line| surface.measure_text(line, DEFAULT_FONT_SIZE))
        .fold(min_width, f64::max)
}

impl Composite for ActorWithLifeline {
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
        surface.on(self.label, SurfaceEvent::TextChanged, self.core.listener(PartRole::Label));
        self.lifeline.attach_events(surface, &self.core);
    }

    fn update_layout(&mut self, surface: &mut dyn Surface, source: PartRole) {
        let (Some(figure), Some(caption)) = (surface.get(self.shape), surface.get(self.label)) else {
            return;
        };
        let (figure, caption) = (figure.bounds(), caption.bounds());

        if source == PartRole::Label {
            if let Some(shape) = surface.get_mut(self.shape) {
                shape.left = caption.center().x - figure.width() / 2.0;
                shape.top = caption.min.y - figure.height() - LABEL_GAP;
            }
        } else {
            if source == PartRole::Lifeline {
                self.lifeline.on_scaled(surface);
            }
            if let Some(label) = surface.get_mut(self.label) {
                label.left = figure.center().x - caption.width() / 2.0;
                label.top = figure.max.y + LABEL_GAP;
            }
        }

        let (Some(figure), Some(caption)) = (surface.get(self.shape), surface.get(self.label)) else {
            return;
        };
        let center_x = figure.center().x;
        let start_y = caption.bounds().max.y + LIFELINE_GAP;
        self.lifeline.layout(surface, center_x, start_y);
    }

    fn handle_event(
        &mut self,
        surface: &mut dyn Surface,
        role: PartRole,
        _primitive: PrimitiveId,
        event: SurfaceEvent,
    ) {
        match event {
            SurfaceEvent::Moving | SurfaceEvent::Scaling => self.update_layout(surface, role),
            // 文本变化只改变标签宽高，小人保持不动
            SurfaceEvent::TextChanged => {
                let text = surface
                    .get(self.label)
                    .and_then(|p| p.text())
                    .unwrap_or_default()
                    .to_string();
                self.set_label_text(surface, &text);
            }
            SurfaceEvent::Modified => {}
        }
    }

    fn editable_properties(&self, surface: &dyn Surface) -> Vec<EditableProperty> {
        let text = surface
            .get(self.label)
            .and_then(|p| p.text())
            .unwrap_or_default();
        vec![
            EditableProperty::text("text", "Actor Label", text),
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
                self.set_label_text(surface, text);
            }
            "fill" => {
                let color = expect_text(key, value)?;
                if !is_palette_color(color) {
                    debug!("Actor {} uses off-palette color {}", self.core.id, color);
                }
                if let Some(figure) = surface.get_mut(self.shape) {
                    figure.set_fill(color);
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
