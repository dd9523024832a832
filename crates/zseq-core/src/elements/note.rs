//! 便签
//!
//! 主体是右上角折起的多边形，折角单独绘制。编辑文本时便签随最长一行自动增大，
//! 缩放时把缩放系数折算进轮廓尺寸，因此折角大小始终不变。

use super::{
    expect_text, Composite, EditableProperty, ElementCore, ElementKind, PartRole, PartSet,
    PropertyValue,
};
use crate::entity::EntityId;
use crate::error::CoreError;
use crate::math::Point2;
use crate::primitive::{ControlsVisibility, Handle, Outline, Primitive, PrimitiveId, DEFAULT_FONT_SIZE};
use crate::properties::{is_palette_color, Style, DEFAULT_FILL};
use crate::surface::{Surface, SurfaceEvent};
use tracing::debug;

const DEFAULT_WIDTH: f64 = 150.0;
const DEFAULT_HEIGHT: f64 = 100.0;
const FOLD_SIZE: f64 = 20.0;

/// 任何情况下的最小尺寸
pub const NOTE_MIN_WIDTH: f64 = 75.0;
pub const NOTE_MIN_HEIGHT: f64 = 50.0;

/// 文本相对主体的内边距
const TEXT_INSET: f64 = 5.0;

/// 自动增大时文本框的最小宽度与额外宽度
const TEXT_MIN_WIDTH: f64 = 80.0;
const TEXT_PADDING: f64 = 10.0;

/// 主体比文本框宽 20、高 10
const BODY_EXTRA_WIDTH: f64 = 20.0;
const BODY_EXTRA_HEIGHT: f64 = 10.0;

const DEFAULT_TEXT: &str = "Note";

#[derive(Debug)]
pub struct Note {
    core: ElementCore,
    body: PrimitiveId,
    corner: PrimitiveId,
    text: PrimitiveId,
}

fn body_outline(width: f64, height: f64) -> Outline {
    Outline::FoldedRect {
        width,
        height,
        fold: FOLD_SIZE,
    }
}

impl Note {
    pub fn new(id: EntityId, surface: &mut dyn Surface, position: Point2, label: Option<&str>) -> Self {
        let body = Primitive::path(
            body_outline(DEFAULT_WIDTH, DEFAULT_HEIGHT),
            position.x,
            position.y,
            Style::filled(DEFAULT_FILL, 1.0).uniform(),
        )
        .with_controls(ControlsVisibility::without(&[Handle::Mtr]));

        let mut corner = Primitive::path(
            Outline::FoldedCorner { fold: FOLD_SIZE },
            position.x + DEFAULT_WIDTH - FOLD_SIZE,
            position.y,
            Style::filled("white", 1.0),
        );
        corner.has_controls = false;
        corner.selectable = false;

        let mut text = Primitive::textbox(
            label.unwrap_or(DEFAULT_TEXT),
            position.x + TEXT_INSET,
            position.y + TEXT_INSET,
            DEFAULT_WIDTH - 30.0,
            DEFAULT_FONT_SIZE,
        );
        text.has_controls = false;

        let body = surface.add(body);
        let corner = surface.add(corner);
        let text = surface.add(text);

        let mut note = Self {
            core: ElementCore::new(id, ElementKind::Note, position),
            body,
            corner,
            text,
        };
        note.go_live(surface);
        note
    }

    /// 由已有部件重建
    pub fn from_parts(
        id: EntityId,
        surface: &mut dyn Surface,
        position: Point2,
        parts: &PartSet,
    ) -> Result<Self, CoreError> {
        let kind = ElementKind::Note;
        let body = parts.require(kind, PartRole::Body)?;
        if surface.get(body).and_then(|p| p.outline()).is_none() {
            return Err(CoreError::InvalidPart {
                element: kind.type_tag().to_string(),
                part: PartRole::Body.name().to_string(),
            });
        }

        let mut note = Self {
            core: ElementCore::new(id, kind, position),
            body,
            corner: parts.require(kind, PartRole::FoldedCorner)?,
            text: parts.require(kind, PartRole::Text)?,
        };
        note.go_live(surface);
        Ok(note)
    }

    pub fn body(&self) -> PrimitiveId {
        self.body
    }

    pub fn corner(&self) -> PrimitiveId {
        self.corner
    }

    pub fn text(&self) -> PrimitiveId {
        self.text
    }

    /// 主体渲染尺寸
    pub fn size(&self, surface: &dyn Surface) -> Option<(f64, f64)> {
        surface
            .get(self.body)
            .map(|p| (p.scaled_width(), p.scaled_height()))
    }

    /// 按最长一行重新计算文本框与主体尺寸
    fn grow_to_text(&mut self, surface: &mut dyn Surface) {
        let Some(text) = surface.get(self.text).and_then(|p| p.text()) else {
            return;
        };
        let longest = text
            .trim()
            .split('\n')
            .map(|line| surface.measure_text(line, DEFAULT_FONT_SIZE))
            .fold(0.0, f64::max);
        let width = (longest + TEXT_PADDING).max(TEXT_MIN_WIDTH);

        let Some(text) = surface.get_mut(self.text) else {
            return;
        };
        text.width = width;
        text.relayout_text();
        let text_height = text.height;

        if let Some(body) = surface.get_mut(self.body) {
            body.scale_x = 1.0;
            body.scale_y = 1.0;
            body.set_outline(body_outline(
                width + BODY_EXTRA_WIDTH,
                text_height + BODY_EXTRA_HEIGHT,
            ));
        }
        self.update_layout(surface, PartRole::Text);
    }
}

impl Composite for Note {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn parts(&self) -> Vec<(PartRole, PrimitiveId)> {
        vec![
            (PartRole::Body, self.body),
            (PartRole::FoldedCorner, self.corner),
            (PartRole::Text, self.text),
        ]
    }

    fn attach_events(&self, surface: &mut dyn Surface) {
        let body = self.core.listener(PartRole::Body);
        surface.on(self.body, SurfaceEvent::Moving, body);
        surface.on(self.body, SurfaceEvent::Scaling, body);

        let text = self.core.listener(PartRole::Text);
        surface.on(self.text, SurfaceEvent::Moving, text);
        surface.on(self.text, SurfaceEvent::TextChanged, text);
    }

    fn update_layout(&mut self, surface: &mut dyn Surface, source: PartRole) {
        // 缩放折算进轮廓，并执行最小尺寸保护
        if let Some(body) = surface.get_mut(self.body) {
            let width = body.scaled_width().max(NOTE_MIN_WIDTH);
            let height = body.scaled_height().max(NOTE_MIN_HEIGHT);
            body.scale_x = 1.0;
            body.scale_y = 1.0;
            body.set_outline(body_outline(width, height));
        }

        if source == PartRole::Text {
            let Some(text) = surface.get(self.text).map(|p| p.origin()) else {
                return;
            };
            if let Some(body) = surface.get_mut(self.body) {
                body.left = text.x - TEXT_INSET;
                body.top = text.y - TEXT_INSET;
            }
        } else {
            let Some(body) = surface.get(self.body).map(|p| p.origin()) else {
                return;
            };
            if let Some(text) = surface.get_mut(self.text) {
                text.left = body.x + TEXT_INSET;
                text.top = body.y + TEXT_INSET;
            }
        }

        let Some(fold_start) = surface.get(self.body).and_then(|body| {
            body.outline()
                .and_then(|o| o.fold_start())
                .map(|p| Point2::new(body.left + p.x, body.top + p.y))
        }) else {
            return;
        };
        if let Some(corner) = surface.get_mut(self.corner) {
            corner.left = fold_start.x;
            corner.top = fold_start.y;
        }
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
            SurfaceEvent::TextChanged => self.grow_to_text(surface),
            SurfaceEvent::Modified => {}
        }
    }

    fn editable_properties(&self, surface: &dyn Surface) -> Vec<EditableProperty> {
        let text = surface
            .get(self.text)
            .and_then(|p| p.text())
            .unwrap_or_default();
        let fill = surface
            .get(self.body)
            .and_then(|p| p.fill())
            .unwrap_or(DEFAULT_FILL);
        vec![
            EditableProperty::text("text", "Note Text", text),
            EditableProperty::color("fill", "Fill Color", fill),
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
                let value = expect_text(key, value)?;
                if let Some(text) = surface.get_mut(self.text) {
                    text.set_text(value);
                }
                self.grow_to_text(surface);
            }
            "fill" => {
                let color = expect_text(key, value)?;
                if !is_palette_color(color) {
                    debug!("Note {} uses off-palette color {}", self.core.id, color);
                }
                if let Some(body) = surface.get_mut(self.body) {
                    body.set_fill(color);
                }
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
        self.body
    }

    /// 便签不参与吸附
    fn snap_center(&self, _surface: &dyn Surface) -> Option<Point2> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{approx_eq, Vector2};
    use crate::surface::Canvas;

    #[test]
    fn test_long_text_grows_body() {
        let mut canvas = Canvas::default();
        let mut note = Note::new(EntityId(1), &mut canvas, Point2::new(0.0, 0.0), None);

        let text = "x".repeat(80);
        note.set_property(&mut canvas, "text", &PropertyValue::from(text.as_str()))
            .unwrap();

        let measured = canvas.measure_text(&text, DEFAULT_FONT_SIZE);
        let (width, height) = note.size(&canvas).unwrap();
        assert!(width >= measured + BODY_EXTRA_WIDTH);
        assert!(width >= NOTE_MIN_WIDTH);
        assert!(height >= NOTE_MIN_HEIGHT);

        let corner = canvas.get(note.corner()).unwrap();
        assert!(approx_eq(corner.left, width - FOLD_SIZE));
    }

    #[test]
    fn test_short_text_respects_minimum_size() {
        let mut canvas = Canvas::default();
        let mut note = Note::new(EntityId(1), &mut canvas, Point2::new(0.0, 0.0), None);

        note.set_property(&mut canvas, "text", &PropertyValue::from("hi"))
            .unwrap();
        let (width, height) = note.size(&canvas).unwrap();
        assert!(approx_eq(width, TEXT_MIN_WIDTH + BODY_EXTRA_WIDTH));
        assert!(approx_eq(height, NOTE_MIN_HEIGHT));
    }

    #[test]
    fn test_scaling_folds_into_outline() {
        let mut canvas = Canvas::default();
        let mut note = Note::new(EntityId(1), &mut canvas, Point2::new(10.0, 10.0), None);

        canvas.scale(note.body(), 2.0, 0.1);
        note.update_layout(&mut canvas, PartRole::Body);

        let body = canvas.get(note.body()).unwrap();
        assert!(approx_eq(body.scale_x, 1.0));
        assert!(approx_eq(body.width, 300.0));
        assert!(approx_eq(body.height, NOTE_MIN_HEIGHT));
        assert_eq!(
            body.outline(),
            Some(&Outline::FoldedRect {
                width: 300.0,
                height: NOTE_MIN_HEIGHT,
                fold: FOLD_SIZE
            })
        );
        let corner = canvas.get(note.corner()).unwrap();
        assert!(approx_eq(corner.left, 290.0));
    }

    #[test]
    fn test_text_drag_pulls_body() {
        let mut canvas = Canvas::default();
        let mut note = Note::new(EntityId(1), &mut canvas, Point2::new(0.0, 0.0), None);

        canvas.drag(note.text(), Vector2::new(30.0, 15.0));
        note.update_layout(&mut canvas, PartRole::Text);

        let body = canvas.get(note.body()).unwrap();
        assert!(approx_eq(body.left, 30.0));
        assert!(approx_eq(body.top, 15.0));
        assert!(note.snap_center(&canvas).is_none());
    }
}
