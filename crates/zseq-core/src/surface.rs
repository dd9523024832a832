//! 图元画布
//!
//! [`Surface`] 是文档模型依赖的外部绘图协作者：保存图元、维护绘制顺序、
//! 在图元被拖动/缩放/编辑时产生通知，并负责单个图元与属性包之间的转换。
//! [`Canvas`] 是无渲染的内存实现，供会话、测试与命令行前端使用。
//!
//! 事件不是回调：监听者以 (实体, 角色) 的形式登记，画布把通知排入队列，
//! 由会话统一取出并分派，从而保证一次编辑的全部布局更新先于快照捕获完成。

use crate::elements::PartRole;
use crate::entity::EntityId;
use crate::error::CoreError;
use crate::math::Vector2;
use crate::primitive::{Primitive, PrimitiveId, PropertyBag};
use std::collections::HashMap;
use tracing::warn;
use unicode_width::UnicodeWidthStr;

/// 画布事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceEvent {
    /// 拖动中
    Moving,
    /// 缩放中
    Scaling,
    /// 文本被编辑
    TextChanged,
    /// 一次交互结束，图元已修改
    Modified,
}

/// 事件监听者：所属实体与图元角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Listener {
    pub entity: EntityId,
    pub role: PartRole,
}

/// 排队中的通知
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Notification {
    pub primitive: PrimitiveId,
    pub event: SurfaceEvent,
    /// `Modified` 为画布级事件，没有图元监听者
    pub listener: Option<Listener>,
}

/// 把属性包解析为图元；任何一个失败则整体失败
pub fn parse_document(bags: &[PropertyBag]) -> Result<Vec<Primitive>, CoreError> {
    bags.iter()
        .enumerate()
        .map(|(index, bag)| {
            serde_json::from_value(serde_json::Value::Object(bag.clone()))
                .map_err(|source| CoreError::MalformedPrimitive { index, source })
        })
        .collect()
}

/// 图元画布
pub trait Surface {
    /// 添加图元到绘制顺序末尾
    fn add(&mut self, primitive: Primitive) -> PrimitiveId;

    /// 移除图元及其监听者
    fn remove(&mut self, id: PrimitiveId) -> Option<Primitive>;

    fn get(&self, id: PrimitiveId) -> Option<&Primitive>;

    fn get_mut(&mut self, id: PrimitiveId) -> Option<&mut Primitive>;

    /// 按绘制顺序返回所有图元
    fn primitives(&self) -> Vec<PrimitiveId>;

    /// 图元在绘制顺序中的位置
    fn index_of(&self, id: PrimitiveId) -> Option<usize>;

    /// 调整图元在绘制顺序中的位置
    fn move_to(&mut self, id: PrimitiveId, index: usize);

    /// 移除全部图元、监听者与待处理通知
    fn clear(&mut self);

    /// 登记监听者
    fn on(&mut self, id: PrimitiveId, event: SurfaceEvent, listener: Listener);

    /// 移除图元的全部监听者
    fn off(&mut self, id: PrimitiveId);

    /// 产生通知
    fn emit(&mut self, id: PrimitiveId, event: SurfaceEvent);

    /// 取出全部待处理通知
    fn take_notifications(&mut self) -> Vec<Notification>;

    /// 单行文本的渲染宽度
    fn measure_text(&self, text: &str, font_size: f64) -> f64;

    fn width(&self) -> f64;

    fn height(&self) -> f64;

    fn send_to_back(&mut self, id: PrimitiveId) {
        self.move_to(id, 0);
    }

    /// 序列化单个图元，附加字段覆盖同名属性
    fn serialize_primitive(&self, id: PrimitiveId, extra: PropertyBag) -> Option<PropertyBag> {
        let primitive = self.get(id)?;
        match serde_json::to_value(primitive) {
            Ok(serde_json::Value::Object(mut bag)) => {
                bag.extend(extra);
                Some(bag)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to serialize primitive {}: {}", id, e);
                None
            }
        }
    }

    /// 用属性包替换画布内容，返回与输入顺序一致的句柄。
    /// 解析失败时画布保持不变。
    fn load_document(&mut self, bags: &[PropertyBag]) -> Result<Vec<PrimitiveId>, CoreError> {
        let primitives = parse_document(bags)?;
        self.clear();
        Ok(primitives.into_iter().map(|p| self.add(p)).collect())
    }

    // ====================================================================
    // 用户交互（遵守锁定标志，产生通知）
    // ====================================================================

    /// 拖动图元
    fn drag(&mut self, id: PrimitiveId, delta: Vector2) -> bool {
        let Some(primitive) = self.get_mut(id) else {
            return false;
        };
        let delta = Vector2::new(
            if primitive.lock_movement_x { 0.0 } else { delta.x },
            if primitive.lock_movement_y { 0.0 } else { delta.y },
        );
        if delta.x == 0.0 && delta.y == 0.0 {
            return false;
        }
        primitive.translate(&delta);
        self.emit(id, SurfaceEvent::Moving);
        self.emit(id, SurfaceEvent::Modified);
        true
    }

    /// 缩放图元（设置绝对缩放系数）
    fn scale(&mut self, id: PrimitiveId, scale_x: f64, scale_y: f64) -> bool {
        let Some(primitive) = self.get_mut(id) else {
            return false;
        };
        let mut changed = false;
        if !primitive.lock_scaling_x && primitive.scale_x != scale_x {
            primitive.scale_x = scale_x;
            changed = true;
        }
        if !primitive.lock_scaling_y && primitive.scale_y != scale_y {
            primitive.scale_y = scale_y;
            changed = true;
        }
        if changed {
            self.emit(id, SurfaceEvent::Scaling);
            self.emit(id, SurfaceEvent::Modified);
        }
        changed
    }

    /// 编辑文本框内容
    fn edit_text(&mut self, id: PrimitiveId, text: &str) -> bool {
        let Some(primitive) = self.get_mut(id) else {
            return false;
        };
        if primitive.text().is_none() {
            return false;
        }
        primitive.set_text(text);
        self.emit(id, SurfaceEvent::TextChanged);
        self.emit(id, SurfaceEvent::Modified);
        true
    }
}

/// 平均字宽与字号之比
const GLYPH_ADVANCE: f64 = 0.55;

/// 内存画布
#[derive(Debug)]
pub struct Canvas {
    width: f64,
    height: f64,
    next_handle: u64,
    order: Vec<PrimitiveId>,
    primitives: HashMap<PrimitiveId, Primitive>,
    listeners: HashMap<(PrimitiveId, SurfaceEvent), Listener>,
    pending: Vec<Notification>,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            next_handle: 1,
            order: Vec::new(),
            primitives: HashMap::new(),
            listeners: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 图元是否登记了指定事件的监听者
    pub fn has_listener(&self, id: PrimitiveId, event: SurfaceEvent) -> bool {
        self.listeners.contains_key(&(id, event))
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(1200.0, 800.0)
    }
}

impl Surface for Canvas {
    fn add(&mut self, primitive: Primitive) -> PrimitiveId {
        let id = PrimitiveId(self.next_handle);
        self.next_handle += 1;
        self.primitives.insert(id, primitive);
        self.order.push(id);
        id
    }

    fn remove(&mut self, id: PrimitiveId) -> Option<Primitive> {
        let primitive = self.primitives.remove(&id)?;
        self.order.retain(|p| *p != id);
        self.off(id);
        self.pending.retain(|n| n.primitive != id);
        Some(primitive)
    }

    fn get(&self, id: PrimitiveId) -> Option<&Primitive> {
        self.primitives.get(&id)
    }

    fn get_mut(&mut self, id: PrimitiveId) -> Option<&mut Primitive> {
        self.primitives.get_mut(&id)
    }

    fn primitives(&self) -> Vec<PrimitiveId> {
        self.order.clone()
    }

    fn index_of(&self, id: PrimitiveId) -> Option<usize> {
        self.order.iter().position(|p| *p == id)
    }

    fn move_to(&mut self, id: PrimitiveId, index: usize) {
        if let Some(current) = self.index_of(id) {
            self.order.remove(current);
            let index = index.min(self.order.len());
            self.order.insert(index, id);
        }
    }

    fn clear(&mut self) {
        self.order.clear();
        self.primitives.clear();
        self.listeners.clear();
        self.pending.clear();
    }

    fn on(&mut self, id: PrimitiveId, event: SurfaceEvent, listener: Listener) {
        self.listeners.insert((id, event), listener);
    }

    fn off(&mut self, id: PrimitiveId) {
        self.listeners.retain(|(primitive, _), _| *primitive != id);
    }

    fn emit(&mut self, id: PrimitiveId, event: SurfaceEvent) {
        let listener = self.listeners.get(&(id, event)).copied();
        if listener.is_some() || event == SurfaceEvent::Modified {
            self.pending.push(Notification {
                primitive: id,
                event,
                listener,
            });
        }
    }

    fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.pending)
    }

    fn measure_text(&self, text: &str, font_size: f64) -> f64 {
        text.width() as f64 * font_size * GLYPH_ADVANCE
    }

    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }
}
