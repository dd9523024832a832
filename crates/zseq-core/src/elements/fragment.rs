//! 组合片段（框 + 操作符标签 + 操作符文本）
//!
//! 操作符标签是右下角切角的多边形，宽度随操作符文本变化，
//! 且在绘制顺序上始终位于文本之下。

use super::{
    expect_text, Composite, EditableProperty, ElementCore, ElementKind, PartRole, PartSet,
    PropertyValue,
};
use crate::entity::EntityId;
use crate::error::CoreError;
use crate::math::Point2;
use crate::primitive::{ControlsVisibility, Handle, Outline, Primitive, PrimitiveId, DEFAULT_FONT_SIZE};
use crate::properties::Style;
use crate::surface::{Surface, SurfaceEvent};
use tracing::debug;

/// UML 组合片段操作符
pub const FRAGMENT_OPERATORS: [&str; 8] = ["opt", "alt", "sd", "neg", "par", "loop", "critical", "ref"];

const FRAME_WIDTH: f64 = 300.0;
const FRAME_HEIGHT: f64 = 200.0;

const BADGE_WIDTH: f64 = 60.0;
const BADGE_HEIGHT: f64 = 20.0;

/// 标签相对框的偏移（对齐描边中线）
const BADGE_INSET: f64 = 0.5;

/// 文本相对标签的偏移
const TEXT_OFFSET_X: f64 = 5.0;
const TEXT_OFFSET_Y: f64 = 2.0;

/// 文本框宽度 = 文本宽度 + 15，标签宽度 = 文本宽度 + 25
const TEXT_MARGIN: f64 = 15.0;
const BADGE_MARGIN: f64 = 25.0;

#[derive(Debug)]
pub struct CombinedFragment {
    core: ElementCore,
    frame: PrimitiveId,
    badge: PrimitiveId,
    text: PrimitiveId,
}

fn badge_outline(width: f64) -> Outline {
    Outline::ChamferedTag {
        width,
        height: BADGE_HEIGHT,
        chamfer: BADGE_HEIGHT / 2.0,
    }
}

impl CombinedFragment {
    pub fn new(id: EntityId, surface: &mut dyn Surface, position: Point2, operator: Option<&str>) -> Self {
        let frame = Primitive::rect(
            position.x,
            position.y,
            FRAME_WIDTH,
            FRAME_HEIGHT,
            Style::outline(1.0).uniform(),
        )
        .with_padding(5.0)
        .with_controls(ControlsVisibility::without(&[Handle::Mtr]));

        let badge_left = position.x + BADGE_INSET;
        let badge_top = position.y + BADGE_INSET;
        let badge = Primitive::path(badge_outline(BADGE_WIDTH), badge_left, badge_top, Style::outline(1.0))
            .locked()
            .inert();

        let text = Primitive::textbox(
            operator.unwrap_or(FRAGMENT_OPERATORS[0]),
            badge_left + TEXT_OFFSET_X,
            badge_top + TEXT_OFFSET_Y,
            BADGE_WIDTH,
            DEFAULT_FONT_SIZE,
        )
        .locked();

        let frame = surface.add(frame);
        let badge = surface.add(badge);
        let text = surface.add(text);

        let mut fragment = Self {
            core: ElementCore::new(id, ElementKind::CombinedFragment, position),
            frame,
            badge,
            text,
        };
        fragment.go_live(surface);
        fragment
    }

    /// 由已有部件重建
    pub fn from_parts(
        id: EntityId,
        surface: &mut dyn Surface,
        position: Point2,
        parts: &PartSet,
    ) -> Result<Self, CoreError> {
        let kind = ElementKind::CombinedFragment;
        let mut fragment = Self {
            core: ElementCore::new(id, kind, position),
            frame: parts.require(kind, PartRole::Frame)?,
            badge: parts.require(kind, PartRole::OperatorBadge)?,
            text: parts.require(kind, PartRole::OperatorText)?,
        };
        fragment.go_live(surface);
        Ok(fragment)
    }

    pub fn frame(&self) -> PrimitiveId {
        self.frame
    }

    pub fn badge(&self) -> PrimitiveId {
        self.badge
    }

    pub fn text(&self) -> PrimitiveId {
        self.text
    }

    pub fn operator<'a>(&self, surface: &'a dyn Surface) -> &'a str {
        surface
            .get(self.text)
            .and_then(|p| p.text())
            .unwrap_or_default()
    }

    /// 操作符文本变化后：折叠换行、按字形宽度调整文本框与标签、把文本放回标签之上
    fn fit_operator(&mut self, surface: &mut dyn Surface) {
        let folded = self.operator(surface).replace('\n', " ");
        if !FRAGMENT_OPERATORS.contains(&folded.as_str()) {
            debug!("Fragment {} uses non-standard operator '{}'", self.core.id, folded);
        }
        let width = surface.measure_text(&folded, DEFAULT_FONT_SIZE);

        if let Some(text) = surface.get_mut(self.text) {
            text.set_text(folded);
            text.width = width + TEXT_MARGIN;
        }
        if let Some(badge) = surface.get_mut(self.badge) {
            badge.set_outline(badge_outline(width + BADGE_MARGIN));
        }

        if let (Some(badge), Some(text)) = (surface.index_of(self.badge), surface.index_of(self.text)) {
            let target = if text < badge { badge } else { badge + 1 };
            surface.move_to(self.text, target);
        }
    }
}

impl Composite for CombinedFragment {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn parts(&self) -> Vec<(PartRole, PrimitiveId)> {
        vec![
            (PartRole::Frame, self.frame),
            (PartRole::OperatorBadge, self.badge),
            (PartRole::OperatorText, self.text),
        ]
    }

    fn attach_events(&self, surface: &mut dyn Surface) {
        let frame = self.core.listener(PartRole::Frame);
        surface.on(self.frame, SurfaceEvent::Moving, frame);
        surface.on(self.frame, SurfaceEvent::Scaling, frame);

        let text = self.core.listener(PartRole::OperatorText);
        surface.on(self.text, SurfaceEvent::Moving, text);
        surface.on(self.text, SurfaceEvent::TextChanged, text);
    }

    fn update_layout(&mut self, surface: &mut dyn Surface, source: PartRole) {
        if source == PartRole::OperatorText {
            let Some(text) = surface.get(self.text).map(|p| p.origin()) else {
                return;
            };
            if let Some(frame) = surface.get_mut(self.frame) {
                frame.left = text.x - TEXT_OFFSET_X - BADGE_INSET;
                frame.top = text.y - TEXT_OFFSET_Y - BADGE_INSET;
            }
        }

        let Some(frame) = surface.get(self.frame).map(|p| p.origin()) else {
            return;
        };
        let badge_left = frame.x + BADGE_INSET;
        let badge_top = frame.y + BADGE_INSET;
        if let Some(badge) = surface.get_mut(self.badge) {
            badge.left = badge_left;
            badge.top = badge_top;
        }
        if source != PartRole::OperatorText {
            if let Some(text) = surface.get_mut(self.text) {
                text.left = badge_left + TEXT_OFFSET_X;
                text.top = badge_top + TEXT_OFFSET_Y;
            }
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
            SurfaceEvent::TextChanged => self.fit_operator(surface),
            SurfaceEvent::Modified => {}
        }
    }

    fn editable_properties(&self, surface: &dyn Surface) -> Vec<EditableProperty> {
        vec![EditableProperty::text("text", "Operator", self.operator(surface))]
    }

    fn set_property(
        &mut self,
        surface: &mut dyn Surface,
        key: &str,
        value: &PropertyValue,
    ) -> Result<(), CoreError> {
        match key {
            "text" => {
                let operator = expect_text(key, value)?;
                if let Some(text) = surface.get_mut(self.text) {
                    text.set_text(operator);
                }
                self.fit_operator(surface);
                Ok(())
            }
            _ => Err(CoreError::UnknownProperty {
                key: key.to_string(),
            }),
        }
    }

    fn main_part(&self) -> PrimitiveId {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{approx_eq, Vector2};
    use crate::surface::Canvas;

    #[test]
    fn test_text_edit_resizes_badge_and_restacks() {
        let mut canvas = Canvas::default();
        let mut fragment = CombinedFragment::new(EntityId(1), &mut canvas, Point2::new(10.0, 10.0), None);

        // 把文本压到标签下面，编辑后应重新回到标签之上
        canvas.send_to_back(fragment.text());
        canvas.edit_text(fragment.text(), "critical\nregion");
        fragment.handle_event(
            &mut canvas,
            PartRole::OperatorText,
            fragment.text(),
            SurfaceEvent::TextChanged,
        );

        assert_eq!(fragment.operator(&canvas), "critical region");
        let measured = canvas.measure_text("critical region", DEFAULT_FONT_SIZE);
        assert!(approx_eq(canvas.get(fragment.badge()).unwrap().width, measured + BADGE_MARGIN));
        assert!(approx_eq(canvas.get(fragment.text()).unwrap().width, measured + TEXT_MARGIN));

        let badge = canvas.index_of(fragment.badge()).unwrap();
        assert_eq!(canvas.index_of(fragment.text()), Some(badge + 1));
    }

    #[test]
    fn test_frame_drag_carries_badge_and_text() {
        let mut canvas = Canvas::default();
        let mut fragment =
            CombinedFragment::new(EntityId(1), &mut canvas, Point2::new(0.0, 0.0), Some("loop"));

        canvas.drag(fragment.frame(), Vector2::new(100.0, 40.0));
        fragment.update_layout(&mut canvas, PartRole::Frame);

        let badge = canvas.get(fragment.badge()).unwrap();
        assert!(approx_eq(badge.left, 100.5));
        assert!(approx_eq(badge.top, 40.5));
        let text = canvas.get(fragment.text()).unwrap();
        assert!(approx_eq(text.left, 105.5));
        assert!(approx_eq(text.top, 42.5));
    }

    #[test]
    fn test_text_source_pulls_frame() {
        let mut canvas = Canvas::default();
        let mut fragment = CombinedFragment::new(EntityId(1), &mut canvas, Point2::new(0.0, 0.0), None);

        canvas.get_mut(fragment.text()).unwrap().translate(&Vector2::new(20.0, 20.0));
        fragment.update_layout(&mut canvas, PartRole::OperatorText);

        let frame = canvas.get(fragment.frame()).unwrap();
        assert!(approx_eq(frame.left, 20.0));
        assert!(approx_eq(frame.top, 20.0));
    }
}
