//! 复合图元
//!
//! 每个复合图元把若干独立图元以命名角色组合成一个逻辑实体，
//! 并在任一部件变化时按几何传播协议重新推导其余部件的位置。
//!
//! 五种变体构成封闭集合 [`DiagramElement`]，按类型标签分派重建函数，
//! 新增类型只需新增一个变体和一项分派表条目。

mod actor;
mod class;
mod fragment;
mod lifeline;
mod message;
mod note;

pub use actor::ActorWithLifeline;
pub use class::ClassWithLifeline;
pub use fragment::{CombinedFragment, FRAGMENT_OPERATORS};
pub use lifeline::{Lifeline, ACTIVATION_BOX_HEIGHT, ACTIVATION_BOX_WIDTH, FORBIDDEN_END_MARGIN};
pub use message::{Direction, Message, MessageKind};
pub use note::{Note, NOTE_MIN_HEIGHT, NOTE_MIN_WIDTH};

use crate::entity::EntityId;
use crate::error::CoreError;
use crate::math::Point2;
use crate::primitive::{PrimitiveId, PropertyBag};
use crate::surface::{Listener, Surface, SurfaceEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// 复合图元类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    ActorWithLifeline,
    ClassWithLifeline,
    CombinedFragment,
    Note,
    Message,
}

impl ElementKind {
    pub const ALL: [ElementKind; 5] = [
        ElementKind::ActorWithLifeline,
        ElementKind::ClassWithLifeline,
        ElementKind::CombinedFragment,
        ElementKind::Note,
        ElementKind::Message,
    ];

    /// 持久化使用的类型标签
    pub fn type_tag(&self) -> &'static str {
        match self {
            ElementKind::ActorWithLifeline => "ActorWithLifeline",
            ElementKind::ClassWithLifeline => "ClassWithLifeline",
            ElementKind::CombinedFragment => "CombinedFragment",
            ElementKind::Note => "Note",
            ElementKind::Message => "Message",
        }
    }

    /// 固定部件角色（不含激活框与销毁标记）
    pub fn roles(&self) -> &'static [PartRole] {
        match self {
            ElementKind::ActorWithLifeline | ElementKind::ClassWithLifeline => {
                &[PartRole::Shape, PartRole::Label, PartRole::Lifeline]
            }
            ElementKind::CombinedFragment => &[
                PartRole::Frame,
                PartRole::OperatorBadge,
                PartRole::OperatorText,
            ],
            ElementKind::Note => &[PartRole::Body, PartRole::FoldedCorner, PartRole::Text],
            ElementKind::Message => &[PartRole::Shaft, PartRole::Arrowhead, PartRole::Text],
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

impl FromStr for ElementKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementKind::ALL
            .into_iter()
            .find(|kind| kind.type_tag() == s)
            .ok_or_else(|| CoreError::UnknownElementType(s.to_string()))
    }
}

/// 部件角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartRole {
    Shape,
    Label,
    Lifeline,
    ActivationBox,
    DestroyMarker,
    Frame,
    OperatorBadge,
    OperatorText,
    Body,
    FoldedCorner,
    Text,
    Shaft,
    Arrowhead,
}

impl PartRole {
    const ALL: [PartRole; 13] = [
        PartRole::Shape,
        PartRole::Label,
        PartRole::Lifeline,
        PartRole::ActivationBox,
        PartRole::DestroyMarker,
        PartRole::Frame,
        PartRole::OperatorBadge,
        PartRole::OperatorText,
        PartRole::Body,
        PartRole::FoldedCorner,
        PartRole::Text,
        PartRole::Shaft,
        PartRole::Arrowhead,
    ];

    /// 持久化使用的角色名
    pub fn name(&self) -> &'static str {
        match self {
            PartRole::Shape => "shape",
            PartRole::Label => "label",
            PartRole::Lifeline => "lifeline",
            PartRole::ActivationBox => "activeBox",
            PartRole::DestroyMarker => "destroyMarker",
            PartRole::Frame => "frame",
            PartRole::OperatorBadge => "operatorBadge",
            PartRole::OperatorText => "operatorText",
            PartRole::Body => "body",
            PartRole::FoldedCorner => "foldedCorner",
            PartRole::Text => "text",
            PartRole::Shaft => "shaft",
            PartRole::Arrowhead => "arrowhead",
        }
    }
}

impl fmt::Display for PartRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PartRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PartRole::ALL
            .into_iter()
            .find(|role| role.name() == s)
            .ok_or_else(|| CoreError::UnknownPart(s.to_string()))
    }
}

/// 生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Constructing,
    Live,
    Destroyed,
}

/// 所有复合图元共有的状态
#[derive(Debug, Clone)]
pub struct ElementCore {
    pub id: EntityId,
    pub kind: ElementKind,
    /// 创建或重建时的锚点
    pub position: Point2,
    pub state: Lifecycle,
}

impl ElementCore {
    pub fn new(id: EntityId, kind: ElementKind, position: Point2) -> Self {
        Self {
            id,
            kind,
            position,
            state: Lifecycle::Constructing,
        }
    }

    pub fn listener(&self, role: PartRole) -> Listener {
        Listener {
            entity: self.id,
            role,
        }
    }

    pub fn is_live(&self) -> bool {
        self.state == Lifecycle::Live
    }
}

/// 重建时交给构造函数的已有部件
#[derive(Debug, Default)]
pub struct PartSet {
    parts: HashMap<PartRole, (PrimitiveId, PropertyBag)>,
}

impl PartSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: PartRole, primitive: PrimitiveId, bag: PropertyBag) {
        self.parts.insert(role, (primitive, bag));
    }

    pub fn get(&self, role: PartRole) -> Option<PrimitiveId> {
        self.parts.get(&role).map(|(primitive, _)| *primitive)
    }

    /// 必需部件
    pub fn require(&self, kind: ElementKind, role: PartRole) -> Result<PrimitiveId, CoreError> {
        self.get(role).ok_or_else(|| CoreError::MissingPart {
            element: kind.type_tag().to_string(),
            part: role.name().to_string(),
        })
    }

    /// 部件属性包中的附加字段
    pub fn extra(&self, role: PartRole, key: &str) -> Option<&serde_json::Value> {
        self.parts.get(&role).and_then(|(_, bag)| bag.get(key))
    }

    pub fn primitives(&self) -> impl Iterator<Item = PrimitiveId> + '_ {
        self.parts.values().map(|(primitive, _)| *primitive)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// 属性面板中的输入类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PropertyType {
    Text,
    Color { options: Vec<String> },
    Boolean,
    Select { options: Vec<String> },
}

/// 属性值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Text(String),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            PropertyValue::Bool(_) => None,
        }
    }

    /// 布尔值，接受字符串 "true"/"false"
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(value) => Some(*value),
            PropertyValue::Text(text) => match text.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(value) => write!(f, "{}", value),
            PropertyValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

/// 可编辑属性
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditableProperty {
    pub key: String,
    pub label: String,
    #[serde(flatten)]
    pub property_type: PropertyType,
    pub value: PropertyValue,
}

impl EditableProperty {
    pub fn text(key: &str, label: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            property_type: PropertyType::Text,
            value: PropertyValue::Text(value.into()),
        }
    }

    pub fn color(key: &str, label: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            property_type: PropertyType::Color {
                options: crate::properties::LIGHT_COLOR_PALETTE
                    .iter()
                    .map(|(_, css)| css.to_string())
                    .collect(),
            },
            value: PropertyValue::Text(value.into()),
        }
    }

    pub fn boolean(key: &str, label: &str, value: bool) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            property_type: PropertyType::Boolean,
            value: PropertyValue::Bool(value),
        }
    }

    pub fn select(key: &str, label: &str, value: &str, options: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            property_type: PropertyType::Select {
                options: options.iter().map(|o| o.to_string()).collect(),
            },
            value: PropertyValue::Text(value.to_string()),
        }
    }
}

/// 文本类属性值
pub(crate) fn expect_text<'a>(key: &str, value: &'a PropertyValue) -> Result<&'a str, CoreError> {
    value.as_text().ok_or_else(|| CoreError::InvalidPropertyValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// 复合图元的几何传播协议
pub trait Composite {
    fn core(&self) -> &ElementCore;

    fn core_mut(&mut self) -> &mut ElementCore;

    /// 当前拥有的全部部件（含激活框与销毁标记）
    fn parts(&self) -> Vec<(PartRole, PrimitiveId)>;

    /// 为每个部件登记 拖动/缩放/编辑 监听者
    fn attach_events(&self, surface: &mut dyn Surface);

    /// 以 `source` 为驱动部件重新推导其余部件的几何
    fn update_layout(&mut self, surface: &mut dyn Surface, source: PartRole);

    fn editable_properties(&self, surface: &dyn Surface) -> Vec<EditableProperty>;

    fn set_property(
        &mut self,
        surface: &mut dyn Surface,
        key: &str,
        value: &PropertyValue,
    ) -> Result<(), CoreError>;

    /// 被拖动时参与吸附的主体部件
    fn main_part(&self) -> PrimitiveId;

    /// 吸附使用的中心点；None 表示不参与吸附
    fn snap_center(&self, surface: &dyn Surface) -> Option<Point2> {
        surface.get(self.main_part()).map(|p| p.center())
    }

    /// 序列化某个部件时附加的实体级字段
    fn extra_fields(&self, _role: PartRole) -> PropertyBag {
        PropertyBag::new()
    }

    fn lifeline(&self) -> Option<&Lifeline> {
        None
    }

    fn lifeline_mut(&mut self) -> Option<&mut Lifeline> {
        None
    }

    /// 处理画布通知；默认拖动与缩放都触发布局更新
    fn handle_event(
        &mut self,
        surface: &mut dyn Surface,
        role: PartRole,
        _primitive: PrimitiveId,
        event: SurfaceEvent,
    ) {
        match event {
            SurfaceEvent::Moving | SurfaceEvent::Scaling => self.update_layout(surface, role),
            SurfaceEvent::TextChanged | SurfaceEvent::Modified => {}
        }
    }

    /// 为全部部件写入归属标识
    fn apply_identification(&self, surface: &mut dyn Surface) {
        let core = self.core();
        let tag = core.kind.type_tag();
        for (role, id) in self.parts() {
            if let Some(primitive) = surface.get_mut(id) {
                primitive.stamp(core.id, tag, role.name());
            }
        }
    }

    /// 部件齐全后进入存活状态
    fn go_live(&mut self, surface: &mut dyn Surface) {
        self.attach_events(surface);
        self.apply_identification(surface);
        self.core_mut().state = Lifecycle::Live;
    }

    /// 删除全部部件
    fn delete(&mut self, surface: &mut dyn Surface) {
        for (_, id) in self.parts() {
            surface.remove(id);
        }
        self.core_mut().state = Lifecycle::Destroyed;
        debug!("Deleted entity {}", self.core().id);
    }
}

/// 重建函数：已有部件 → 复合图元
type Reconstructor =
    fn(EntityId, &mut dyn Surface, Point2, &PartSet) -> Result<DiagramElement, CoreError>;

/// 类型标签 → 重建函数
const RECONSTRUCTORS: [(ElementKind, Reconstructor); 5] = [
    (ElementKind::ActorWithLifeline, |id, s, p, parts| {
        ActorWithLifeline::from_parts(id, s, p, parts).map(DiagramElement::Actor)
    }),
    (ElementKind::ClassWithLifeline, |id, s, p, parts| {
        ClassWithLifeline::from_parts(id, s, p, parts).map(DiagramElement::Class)
    }),
    (ElementKind::CombinedFragment, |id, s, p, parts| {
        CombinedFragment::from_parts(id, s, p, parts).map(DiagramElement::Fragment)
    }),
    (ElementKind::Note, |id, s, p, parts| {
        Note::from_parts(id, s, p, parts).map(DiagramElement::Note)
    }),
    (ElementKind::Message, |id, s, p, parts| {
        Message::from_parts(id, s, p, parts).map(DiagramElement::Message)
    }),
];

/// 复合图元的封闭集合
#[derive(Debug)]
pub enum DiagramElement {
    Actor(ActorWithLifeline),
    Class(ClassWithLifeline),
    Fragment(CombinedFragment),
    Note(Note),
    Message(Message),
}

impl DiagramElement {
    /// 新建复合图元并绘制其部件
    pub fn create(
        kind: ElementKind,
        id: EntityId,
        surface: &mut dyn Surface,
        position: Point2,
        label: Option<&str>,
    ) -> Self {
        match kind {
            ElementKind::ActorWithLifeline => {
                DiagramElement::Actor(ActorWithLifeline::new(id, surface, position, label))
            }
            ElementKind::ClassWithLifeline => {
                DiagramElement::Class(ClassWithLifeline::new(id, surface, position, label))
            }
            ElementKind::CombinedFragment => {
                DiagramElement::Fragment(CombinedFragment::new(id, surface, position, label))
            }
            ElementKind::Note => DiagramElement::Note(Note::new(id, surface, position, label)),
            ElementKind::Message => {
                DiagramElement::Message(Message::new(id, surface, position, label))
            }
        }
    }

    /// 由已有部件重建，按类型标签分派
    pub fn reconstruct(
        kind: ElementKind,
        id: EntityId,
        surface: &mut dyn Surface,
        position: Point2,
        parts: &PartSet,
    ) -> Result<Self, CoreError> {
        let (_, reconstructor) = RECONSTRUCTORS
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .ok_or_else(|| CoreError::UnknownElementType(kind.type_tag().to_string()))?;
        reconstructor(id, surface, position, parts)
    }

    pub fn composite(&self) -> &dyn Composite {
        match self {
            DiagramElement::Actor(e) => e,
            DiagramElement::Class(e) => e,
            DiagramElement::Fragment(e) => e,
            DiagramElement::Note(e) => e,
            DiagramElement::Message(e) => e,
        }
    }

    pub fn composite_mut(&mut self) -> &mut dyn Composite {
        match self {
            DiagramElement::Actor(e) => e,
            DiagramElement::Class(e) => e,
            DiagramElement::Fragment(e) => e,
            DiagramElement::Note(e) => e,
            DiagramElement::Message(e) => e,
        }
    }

    pub fn id(&self) -> EntityId {
        self.composite().core().id
    }

    pub fn kind(&self) -> ElementKind {
        self.composite().core().kind
    }

    pub fn state(&self) -> Lifecycle {
        self.composite().core().state
    }

    pub fn parts(&self) -> Vec<(PartRole, PrimitiveId)> {
        self.composite().parts()
    }

    /// 指定角色的第一个部件
    pub fn part(&self, role: PartRole) -> Option<PrimitiveId> {
        self.parts()
            .into_iter()
            .find(|(candidate, _)| *candidate == role)
            .map(|(_, id)| id)
    }

    /// 激活框（按创建顺序）
    pub fn activation_boxes(&self) -> Vec<PrimitiveId> {
        self.composite()
            .lifeline()
            .map(|l| l.active_boxes().to_vec())
            .unwrap_or_default()
    }

    /// 是否显示销毁标记
    pub fn is_destroyed_marked(&self) -> bool {
        self.composite().lifeline().is_some_and(|l| l.destroy())
    }

    /// 分派画布通知；激活框的拖动只重新记录其偏移
    pub fn handle_event(
        &mut self,
        surface: &mut dyn Surface,
        role: PartRole,
        primitive: PrimitiveId,
        event: SurfaceEvent,
    ) {
        let composite = self.composite_mut();
        if !composite.core().is_live() {
            return;
        }
        if role == PartRole::ActivationBox {
            if let Some(lifeline) = composite.lifeline() {
                lifeline.box_moved(surface, primitive);
            }
            return;
        }
        composite.handle_event(surface, role, primitive, event);
    }

    /// 在生命线上指定纵坐标处添加激活框
    pub fn add_activation_box(&mut self, surface: &mut dyn Surface, y: f64) -> Option<PrimitiveId> {
        let composite = self.composite_mut();
        let core = composite.core().clone();
        let fill = lifeline::box_fill(surface, composite.main_part());
        let Some(lifeline) = composite.lifeline_mut() else {
            warn!("Entity {} ({}) has no lifeline", core.id, core.kind);
            return None;
        };
        lifeline.create_activation_box(surface, &core, y, &fill)
    }

    /// 接管重建得到的激活框并重新布局
    pub fn adopt_activation_boxes(&mut self, surface: &mut dyn Surface, boxes: &[PrimitiveId]) {
        if boxes.is_empty() {
            return;
        }
        let composite = self.composite_mut();
        let core = composite.core().clone();
        let main_part = composite.main_part();
        let fill = lifeline::box_fill(surface, main_part);
        let Some(lifeline) = composite.lifeline_mut() else {
            warn!(
                "Entity {} ({}) cannot own activation boxes, dropping {} of them",
                core.id,
                core.kind,
                boxes.len()
            );
            for id in boxes {
                surface.remove(*id);
            }
            return;
        };
        lifeline.adopt_boxes(surface, &core, boxes, &fill);
        composite.update_layout(surface, PartRole::Shape);
    }

    /// 删除单个激活框
    pub fn remove_activation_box(&mut self, surface: &mut dyn Surface, id: PrimitiveId) -> bool {
        self.composite_mut()
            .lifeline_mut()
            .is_some_and(|lifeline| lifeline.remove_box(surface, id))
    }

    pub fn update_layout(&mut self, surface: &mut dyn Surface, source: PartRole) {
        let composite = self.composite_mut();
        if !composite.core().is_live() {
            debug!(
                "Ignoring layout update on entity {} in state {:?}",
                composite.core().id,
                composite.core().state
            );
            return;
        }
        composite.update_layout(surface, source);
    }
}
