//! 编辑会话
//!
//! [`Diagram`] 持有画布、实体注册表与快照历史，对界面层暴露全部编辑命令。
//!
//! 画布通知在每条命令结束时统一处理：先分派拖动/缩放/编辑通知完成布局，
//! 再处理 `Modified` 并捕获快照，因此快照总是看到布局已稳定的文档。
//! 恢复快照期间捕获被关闭，避免撤销本身产生新的快照。

use crate::elements::{DiagramElement, EditableProperty, ElementKind, PartRole, PropertyValue};
use crate::entity::{EntityId, Registry};
use crate::error::CoreError;
use crate::history::{SnapshotStore, DEFAULT_HISTORY_DEPTH};
use crate::math::{Point2, Vector2};
use crate::primitive::{PrimitiveId, PropertyBag};
use crate::serialize::{self, RestoreSummary};
use crate::snap::{self, DEFAULT_SNAP_THRESHOLD};
use crate::surface::{Canvas, Notification, Surface, SurfaceEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 会话配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
    /// 画布宽度
    pub canvas_width: f64,
    /// 画布高度，新建生命线默认延伸到此处
    pub canvas_height: f64,
    /// 最大历史深度
    pub history_depth: usize,
    /// 吸附阈值
    pub snap_threshold: f64,
    /// 是否启用中心吸附
    pub snapping: bool,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1200.0,
            canvas_height: 800.0,
            history_depth: DEFAULT_HISTORY_DEPTH,
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
            snapping: true,
        }
    }
}

/// 编辑会话
#[derive(Debug)]
pub struct Diagram<S: Surface = Canvas> {
    config: DiagramConfig,
    surface: S,
    registry: Registry,
    history: SnapshotStore,
    /// 恢复快照期间为 false
    capture_enabled: bool,
}

impl Diagram<Canvas> {
    pub fn new(config: DiagramConfig) -> Self {
        let canvas = Canvas::new(config.canvas_width, config.canvas_height);
        Self::with_surface(canvas, config)
    }
}

impl Default for Diagram<Canvas> {
    fn default() -> Self {
        Self::new(DiagramConfig::default())
    }
}

impl<S: Surface> Diagram<S> {
    pub fn with_surface(surface: S, config: DiagramConfig) -> Self {
        Self {
            history: SnapshotStore::new(config.history_depth),
            config,
            surface,
            registry: Registry::new(),
            capture_enabled: true,
        }
    }

    pub fn config(&self) -> &DiagramConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn history(&self) -> &SnapshotStore {
        &self.history
    }

    pub fn entity(&self, id: EntityId) -> Option<&DiagramElement> {
        self.registry.get(id)
    }

    /// 查找图元所属实体
    pub fn owner_of(&self, primitive: PrimitiveId) -> Option<EntityId> {
        self.registry.find_by_primitive(primitive)
    }

    pub fn is_capture_enabled(&self) -> bool {
        self.capture_enabled
    }

    // ====================================================================
    // 实体命令
    // ====================================================================

    /// 新建实体并捕获快照
    pub fn create_entity(&mut self, kind: ElementKind, position: Point2, label: Option<&str>) -> EntityId {
        let id = self.registry.allocate_id();
        let element = DiagramElement::create(kind, id, &mut self.surface, position, label);
        self.registry.register(element);
        info!("Created {} {} at ({}, {})", kind, id, position.x, position.y);
        self.capture();
        id
    }

    /// 删除实体及其全部部件
    pub fn delete_entity(&mut self, id: EntityId) -> Result<(), CoreError> {
        let mut element = self
            .registry
            .unregister(id)
            .ok_or(CoreError::EntityNotFound(id.0))?;
        element.composite_mut().delete(&mut self.surface);
        info!("Deleted {} {}", element.kind(), id);
        self.capture();
        Ok(())
    }

    /// 在实体的生命线上添加激活框；落在末端禁区时返回 `Ok(None)`
    pub fn add_activation_box(&mut self, id: EntityId, y: f64) -> Result<Option<PrimitiveId>, CoreError> {
        let element = self
            .registry
            .get_mut(id)
            .ok_or(CoreError::EntityNotFound(id.0))?;
        let created = element.add_activation_box(&mut self.surface, y);
        if created.is_some() {
            self.registry.reindex(id);
            self.capture();
        }
        Ok(created)
    }

    /// 删除实体的单个激活框
    pub fn delete_activation_box(&mut self, id: EntityId, activation: PrimitiveId) -> Result<bool, CoreError> {
        let element = self
            .registry
            .get_mut(id)
            .ok_or(CoreError::EntityNotFound(id.0))?;
        let removed = element.remove_activation_box(&mut self.surface, activation);
        if removed {
            self.registry.reindex(id);
            self.capture();
        } else {
            debug!("Entity {} does not own activation box {}", id, activation);
        }
        Ok(removed)
    }

    /// 删除键：激活框只删除自身，其它部件删除整个实体。孤立图元不做处理。
    pub fn delete_primitive(&mut self, primitive: PrimitiveId) -> Result<(), CoreError> {
        let Some(id) = self.registry.find_by_primitive(primitive) else {
            debug!("Primitive {} has no owner, ignoring delete", primitive);
            return Ok(());
        };
        let is_box = self
            .registry
            .get(id)
            .is_some_and(|e| e.activation_boxes().contains(&primitive));
        if is_box {
            self.delete_activation_box(id, primitive).map(|_| ())
        } else {
            self.delete_entity(id)
        }
    }

    pub fn editable_properties(&self, id: EntityId) -> Result<Vec<EditableProperty>, CoreError> {
        let element = self.registry.get(id).ok_or(CoreError::EntityNotFound(id.0))?;
        Ok(element.composite().editable_properties(&self.surface))
    }

    /// 修改属性并捕获快照
    pub fn set_property(
        &mut self,
        id: EntityId,
        key: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), CoreError> {
        let value = value.into();
        let element = self
            .registry
            .get_mut(id)
            .ok_or(CoreError::EntityNotFound(id.0))?;
        element
            .composite_mut()
            .set_property(&mut self.surface, key, &value)?;
        self.registry.reindex(id);
        debug!("Set {} = {} on entity {}", key, value, id);
        self.capture();
        Ok(())
    }

    // ====================================================================
    // 用户交互
    // ====================================================================

    /// 拖动图元
    pub fn move_part(&mut self, primitive: PrimitiveId, delta: Vector2) -> bool {
        let moved = self.surface.drag(primitive, delta);
        self.process_events();
        moved
    }

    /// 缩放图元
    pub fn scale_part(&mut self, primitive: PrimitiveId, scale_x: f64, scale_y: f64) -> bool {
        let scaled = self.surface.scale(primitive, scale_x, scale_y);
        self.process_events();
        scaled
    }

    /// 直接编辑文本框
    pub fn edit_text(&mut self, primitive: PrimitiveId, text: &str) -> bool {
        let edited = self.surface.edit_text(primitive, text);
        self.process_events();
        edited
    }

    /// 处理待处理的画布通知；`Modified` 最后处理并触发一次捕获
    pub fn process_events(&mut self) {
        let notifications = self.surface.take_notifications();
        if notifications.is_empty() {
            return;
        }
        let (modified, changes): (Vec<Notification>, Vec<Notification>) = notifications
            .into_iter()
            .partition(|n| n.event == SurfaceEvent::Modified);

        for notification in changes.iter().chain(modified.iter()) {
            self.dispatch(notification);
        }
        if !modified.is_empty() {
            self.capture();
        }
    }

    fn dispatch(&mut self, notification: &Notification) {
        let Some(listener) = notification.listener else {
            return;
        };
        if notification.event == SurfaceEvent::Moving {
            self.apply_snap(listener.entity, notification.primitive);
        }
        match self.registry.get_mut(listener.entity) {
            Some(element) => element.handle_event(
                &mut self.surface,
                listener.role,
                notification.primitive,
                notification.event,
            ),
            None => debug!(
                "Dropping {:?} for missing entity {}",
                notification.event, listener.entity
            ),
        }
    }

    /// 拖动主体部件时对齐到其它实体的中心
    fn apply_snap(&mut self, id: EntityId, primitive: PrimitiveId) {
        if !self.config.snapping {
            return;
        }
        let Some(element) = self.registry.get(id) else {
            return;
        };
        let composite = element.composite();
        if composite.main_part() != primitive {
            return;
        }
        let Some(center) = composite.snap_center(&self.surface) else {
            return;
        };
        let targets: Vec<Point2> = self
            .registry
            .all()
            .filter(|other| other.id() != id)
            .filter_map(|other| other.composite().snap_center(&self.surface))
            .collect();

        if let Some(snap) = snap::snap_center(center, targets, self.config.snap_threshold) {
            if let Some(part) = self.surface.get_mut(primitive) {
                part.translate(&snap.offset);
            }
            debug!(
                "Snapped entity {} by ({}, {}) guides {:?}/{:?}",
                id, snap.offset.x, snap.offset.y, snap.guide_x, snap.guide_y
            );
        }
    }

    // ====================================================================
    // 快照与持久化
    // ====================================================================

    /// 捕获当前文档；恢复期间不做任何事
    pub fn capture(&mut self) {
        if !self.capture_enabled {
            debug!("Capture suppressed during restore");
            return;
        }
        let objects = serialize::flatten(&self.registry, &mut self.surface);
        self.history.capture(objects);
    }

    /// 撤销；已在最早快照时不做任何事
    pub fn undo(&mut self) -> bool {
        let from = self.history.cursor();
        let Some(snapshot) = self.history.undo() else {
            return false;
        };
        let objects = snapshot.objects.clone();
        self.restore(&objects, from)
    }

    /// 重做；已在最新快照时不做任何事
    pub fn redo(&mut self) -> bool {
        let from = self.history.cursor();
        let Some(snapshot) = self.history.redo() else {
            return false;
        };
        let objects = snapshot.objects.clone();
        self.restore(&objects, from)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// 恢复快照；失败时文档未被改动，游标退回 `from`
    fn restore(&mut self, objects: &[PropertyBag], from: isize) -> bool {
        let previous = std::mem::replace(&mut self.capture_enabled, false);
        let result = serialize::reconstruct(&mut self.registry, &mut self.surface, objects);
        self.surface.take_notifications();
        self.capture_enabled = previous;

        match result {
            Ok(_) => {
                debug!("Restored snapshot at cursor {}", self.history.cursor());
                true
            }
            Err(e) => {
                warn!("Failed to restore snapshot: {}", e);
                if let Ok(index) = usize::try_from(from) {
                    self.history.seek(index);
                }
                false
            }
        }
    }

    /// 导出当前文档
    pub fn export_objects(&mut self) -> Vec<PropertyBag> {
        serialize::flatten(&self.registry, &mut self.surface)
    }

    /// 导入文档。属性包无法解析时返回错误且会话保持不变；成功后捕获快照。
    pub fn import_objects(&mut self, objects: &[PropertyBag]) -> Result<RestoreSummary, CoreError> {
        let previous = std::mem::replace(&mut self.capture_enabled, false);
        let result = serialize::reconstruct(&mut self.registry, &mut self.surface, objects);
        self.surface.take_notifications();
        self.capture_enabled = previous;

        let summary = result?;
        info!(
            "Imported {} entities ({} skipped)",
            summary.entities, summary.skipped_groups
        );
        self.capture();
        Ok(summary)
    }

    /// 清空文档并捕获快照
    pub fn clear(&mut self) {
        self.surface.clear();
        self.registry.clear();
        self.capture();
    }

    /// 实体的指定部件
    pub fn part(&self, id: EntityId, role: PartRole) -> Option<PrimitiveId> {
        self.registry.get(id).and_then(|e| e.part(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;

    fn shape_left(diagram: &mut Diagram) -> f64 {
        diagram
            .export_objects()
            .iter()
            .find(|b| b["elementPart"] == "shape")
            .and_then(|b| b["left"].as_f64())
            .unwrap()
    }

    #[test]
    fn test_class_move_undo_redo() {
        let mut diagram = Diagram::default();
        let id = diagram.create_entity(
            ElementKind::ClassWithLifeline,
            Point2::new(100.0, 100.0),
            Some("System"),
        );
        let shape = diagram.part(id, PartRole::Shape).unwrap();

        assert!(diagram.move_part(shape, Vector2::new(50.0, 0.0)));
        assert_eq!(diagram.history().len(), 2);

        assert!(diagram.undo());
        assert!(approx_eq(shape_left(&mut diagram), 100.0));
        assert!(diagram.redo());
        assert!(approx_eq(shape_left(&mut diagram), 150.0));
        assert_eq!(diagram.history().len(), 2);
    }

    #[test]
    fn test_restore_does_not_capture() {
        let mut diagram = Diagram::default();
        diagram.create_entity(ElementKind::Note, Point2::new(0.0, 0.0), None);
        diagram.create_entity(ElementKind::Note, Point2::new(300.0, 0.0), None);

        diagram.undo();
        diagram.undo();
        assert_eq!(diagram.history().len(), 2);
        assert_eq!(diagram.history().cursor(), 0);
        assert!(diagram.is_capture_enabled());
    }

    #[test]
    fn test_failed_restore_keeps_cursor() {
        let mut diagram = Diagram::default();
        let id = diagram.create_entity(ElementKind::Note, Point2::new(0.0, 0.0), None);

        let mut broken = PropertyBag::new();
        broken.insert("type".into(), "hexagon".into());
        diagram.history.capture(vec![broken]);
        diagram.capture();
        let before = diagram.export_objects();

        assert!(!diagram.undo());
        assert_eq!(diagram.history().cursor(), 2);
        assert_eq!(diagram.export_objects(), before);
        assert!(diagram.entity(id).is_some());
        assert!(diagram.is_capture_enabled());
    }

    #[test]
    fn test_delete_key_semantics() {
        let mut diagram = Diagram::default();
        let id = diagram.create_entity(ElementKind::ActorWithLifeline, Point2::new(50.0, 20.0), Some("A"));
        let activation = diagram.add_activation_box(id, 300.0).unwrap().unwrap();
        assert_eq!(diagram.owner_of(activation), Some(id));

        diagram.delete_primitive(activation).unwrap();
        assert!(diagram.entity(id).unwrap().activation_boxes().is_empty());
        assert!(diagram.surface().get(activation).is_none());

        let label = diagram.part(id, PartRole::Label).unwrap();
        diagram.delete_primitive(label).unwrap();
        assert!(diagram.entity(id).is_none());
        assert!(diagram.surface().is_empty());

        // 孤立图元
        diagram.delete_primitive(PrimitiveId(9999)).unwrap();
    }

    #[test]
    fn test_snapping_aligns_centers() {
        let mut diagram = Diagram::default();
        let a = diagram.create_entity(ElementKind::ClassWithLifeline, Point2::new(0.0, 0.0), None);
        diagram.create_entity(ElementKind::ClassWithLifeline, Point2::new(400.0, 100.0), None);

        let shape = diagram.part(a, PartRole::Shape).unwrap();
        diagram.move_part(shape, Vector2::new(0.0, 90.0));

        let rect = diagram.surface().get(shape).unwrap();
        assert!(approx_eq(rect.top, 100.0));
        let label = diagram.part(a, PartRole::Label).unwrap();
        assert!(approx_eq(diagram.surface().get(label).unwrap().top, 102.0));
    }

    #[test]
    fn test_set_property_captures() {
        let mut diagram = Diagram::default();
        let id = diagram.create_entity(ElementKind::Message, Point2::new(0.0, 0.0), None);
        diagram.set_property(id, "type", "return").unwrap();
        assert_eq!(diagram.history().len(), 2);

        assert!(matches!(
            diagram.set_property(id, "colour", "red"),
            Err(CoreError::UnknownProperty { .. })
        ));
        assert_eq!(diagram.history().len(), 2);
        assert!(matches!(
            diagram.set_property(EntityId(42), "text", "x"),
            Err(CoreError::EntityNotFound(42))
        ));
    }
}
