//! 消息（箭杆 + 箭头 + 文本）
//!
//! 消息类型决定箭杆线型，方向决定箭头位于哪一端。
//! 两者作为附加字段随箭杆一起持久化。

use super::{
    expect_text, Composite, EditableProperty, ElementCore, ElementKind, PartRole, PartSet,
    PropertyValue,
};
use crate::entity::EntityId;
use crate::error::CoreError;
use crate::math::Point2;
use crate::primitive::{
    ControlsVisibility, Handle, Primitive, PrimitiveId, PropertyBag, TextAlign, DEFAULT_FONT_SIZE,
};
use crate::properties::{LineType, Style, DEFAULT_STROKE};
use crate::surface::{Surface, SurfaceEvent};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

const SHAFT_LENGTH: f64 = 200.0;
const ARROWHEAD_SIZE: f64 = 20.0;
const TEXT_WIDTH: f64 = 100.0;

/// 文本位于箭杆下方的距离
const TEXT_OFFSET: f64 = 10.0;

const DEFAULT_TEXT: &str = "text";

/// 持久化字段名
const MESSAGE_TYPE_FIELD: &str = "messageType";
const ORIENTATION_FIELD: &str = "orientation";

/// 消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    #[default]
    Synchronous,
    Asynchronous,
    Return,
    Create,
    Destroy,
    SelfCall,
}

impl MessageKind {
    pub const ALL: [MessageKind; 6] = [
        MessageKind::Synchronous,
        MessageKind::Asynchronous,
        MessageKind::Return,
        MessageKind::Create,
        MessageKind::Destroy,
        MessageKind::SelfCall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Synchronous => "synchronous",
            MessageKind::Asynchronous => "asynchronous",
            MessageKind::Return => "return",
            MessageKind::Create => "create",
            MessageKind::Destroy => "destroy",
            MessageKind::SelfCall => "self",
        }
    }

    /// 箭杆线型
    pub fn line_type(&self) -> LineType {
        match self {
            MessageKind::Asynchronous => LineType::Dashed,
            MessageKind::Return => LineType::Dotted,
            _ => LineType::Continuous,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::InvalidPropertyValue {
                key: "type".to_string(),
                value: s.to_string(),
            })
    }
}

/// 箭头方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Right,
    Left,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Right => "right",
            Direction::Left => "left",
        }
    }

    /// 箭头旋转角度
    fn arrow_angle(&self) -> f64 {
        match self {
            Direction::Right => 90.0,
            Direction::Left => 270.0,
        }
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "right" => Ok(Direction::Right),
            "left" => Ok(Direction::Left),
            _ => Err(CoreError::InvalidPropertyValue {
                key: ORIENTATION_FIELD.to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug)]
pub struct Message {
    core: ElementCore,
    shaft: PrimitiveId,
    arrowhead: PrimitiveId,
    text: PrimitiveId,
    kind: MessageKind,
    direction: Direction,
}

impl Message {
    pub fn new(id: EntityId, surface: &mut dyn Surface, position: Point2, label: Option<&str>) -> Self {
        let end = Point2::new(position.x + SHAFT_LENGTH, position.y);

        let mut text = Primitive::textbox(
            label.unwrap_or(DEFAULT_TEXT),
            position.x + (SHAFT_LENGTH - TEXT_WIDTH) / 2.0,
            position.y + TEXT_OFFSET,
            TEXT_WIDTH,
            DEFAULT_FONT_SIZE,
        )
        .locked();
        text.set_text_align(TextAlign::Center);

        let shaft = Primitive::line(position, end, Style::outline(2.0))
            .with_padding(10.0)
            .with_controls(ControlsVisibility::only(&[Handle::Ml, Handle::Mr]));

        let arrowhead = Primitive::triangle(
            end,
            ARROWHEAD_SIZE,
            Direction::Right.arrow_angle(),
            DEFAULT_STROKE,
        )
        .locked()
        .inert();

        let text = surface.add(text);
        let shaft = surface.add(shaft);
        let arrowhead = surface.add(arrowhead);

        let mut message = Self {
            core: ElementCore::new(id, ElementKind::Message, position),
            shaft,
            arrowhead,
            text,
            kind: MessageKind::default(),
            direction: Direction::default(),
        };
        message.go_live(surface);
        message.update_layout(surface, PartRole::Shaft);
        message
    }

    /// 由已有部件重建，类型与方向从箭杆的附加字段恢复
    pub fn from_parts(
        id: EntityId,
        surface: &mut dyn Surface,
        position: Point2,
        parts: &PartSet,
    ) -> Result<Self, CoreError> {
        let kind = ElementKind::Message;
        let message_kind: MessageKind = parts
            .extra(PartRole::Shaft, MESSAGE_TYPE_FIELD)
            .and_then(|v| v.as_str())
            .map(str::parse::<MessageKind>)
            .transpose()
            .unwrap_or_else(|e| {
                warn!("Message {}: {}, falling back to synchronous", id, e);
                None
            })
            .unwrap_or_default();
        let direction: Direction = parts
            .extra(PartRole::Shaft, ORIENTATION_FIELD)
            .and_then(|v| v.as_str())
            .map(str::parse::<Direction>)
            .transpose()
            .unwrap_or_else(|e| {
                warn!("Message {}: {}, falling back to right", id, e);
                None
            })
            .unwrap_or_default();

        let mut message = Self {
            core: ElementCore::new(id, kind, position),
            shaft: parts.require(kind, PartRole::Shaft)?,
            arrowhead: parts.require(kind, PartRole::Arrowhead)?,
            text: parts.require(kind, PartRole::Text)?,
            kind: message_kind,
            direction,
        };
        message.go_live(surface);
        Ok(message)
    }

    pub fn shaft(&self) -> PrimitiveId {
        self.shaft
    }

    pub fn arrowhead(&self) -> PrimitiveId {
        self.arrowhead
    }

    pub fn text(&self) -> PrimitiveId {
        self.text
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// 按消息类型设置箭杆虚线（随横向缩放修正）
    fn apply_line_style(&self, surface: &mut dyn Surface) {
        if let Some(shaft) = surface.get_mut(self.shaft) {
            shaft.style.stroke_dash_array = self.kind.line_type().scaled_pattern(shaft.scale_x);
        }
    }
}

impl Composite for Message {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn parts(&self) -> Vec<(PartRole, PrimitiveId)> {
        vec![
            (PartRole::Shaft, self.shaft),
            (PartRole::Arrowhead, self.arrowhead),
            (PartRole::Text, self.text),
        ]
    }

    fn attach_events(&self, surface: &mut dyn Surface) {
        let shaft = self.core.listener(PartRole::Shaft);
        surface.on(self.shaft, SurfaceEvent::Moving, shaft);
        surface.on(self.shaft, SurfaceEvent::Scaling, shaft);
    }

    fn update_layout(&mut self, surface: &mut dyn Surface, source: PartRole) {
        match source {
            PartRole::Text => {
                // 箭杆跟随文本，保持文本居中于箭杆上方
                let Some(text) = surface.get(self.text).map(|p| p.bounds()) else {
                    return;
                };
                let Some((start, end)) = surface.get(self.shaft).and_then(|p| p.line_points()) else {
                    return;
                };
                let half = (end.x - start.x) / 2.0;
                let origin = Point2::new(text.center().x - half, text.min.y - TEXT_OFFSET);
                if let Some(shaft) = surface.get_mut(self.shaft) {
                    let delta = origin - start;
                    shaft.translate(&delta);
                }
            }
            PartRole::Shaft | PartRole::Arrowhead => {}
            other => {
                warn!("Message {} has no '{}' part", self.core.id, other);
                return;
            }
        }

        let Some((start, end)) = surface.get(self.shaft).and_then(|p| p.line_points()) else {
            return;
        };
        if let Some(text) = surface.get_mut(self.text) {
            text.left = (start.x + end.x) / 2.0 - text.width / 2.0;
            text.top = start.y + TEXT_OFFSET;
        }
        if let Some(arrowhead) = surface.get_mut(self.arrowhead) {
            let tip = match self.direction {
                Direction::Right => end,
                Direction::Left => start,
            };
            arrowhead.left = tip.x;
            arrowhead.top = tip.y;
            arrowhead.angle = self.direction.arrow_angle();
        }
        self.apply_line_style(surface);
    }

    fn editable_properties(&self, surface: &dyn Surface) -> Vec<EditableProperty> {
        let text = surface
            .get(self.text)
            .and_then(|p| p.text())
            .unwrap_or_default();
        let kinds: Vec<&str> = MessageKind::ALL.iter().map(|k| k.as_str()).collect();
        vec![
            EditableProperty::text("text", "Message Text", text),
            EditableProperty::select("type", "Message Type", self.kind.as_str(), &kinds),
            EditableProperty::select(
                ORIENTATION_FIELD,
                "Orientation",
                self.direction.as_str(),
                &["right", "left"],
            ),
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
            }
            "type" => {
                self.kind = expect_text(key, value)?.parse()?;
                self.apply_line_style(surface);
            }
            ORIENTATION_FIELD => {
                self.direction = expect_text(key, value)?.parse()?;
                self.update_layout(surface, PartRole::Shaft);
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
        self.shaft
    }

    fn extra_fields(&self, role: PartRole) -> PropertyBag {
        let mut extra = PropertyBag::new();
        if role == PartRole::Shaft {
            extra.insert(MESSAGE_TYPE_FIELD.into(), self.kind.as_str().into());
            extra.insert(ORIENTATION_FIELD.into(), self.direction.as_str().into());
        }
        extra
    }
}
