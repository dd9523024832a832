//! 生命线
//!
//! 参与者与类共用的生命线部件：虚线、激活框列表与可选的销毁标记。
//! 激活框保存相对生命线起点的偏移 `lineStartDistance`，布局时按偏移重新定位。

use super::{ElementCore, ElementKind, PartRole};
use crate::error::CoreError;
use crate::math::Point2;
use crate::primitive::{ControlsVisibility, Handle, Primitive, PrimitiveId, PrimitiveKind};
use crate::properties::{LineType, Style, DEFAULT_FILL};
use crate::surface::{Surface, SurfaceEvent};
use tracing::{debug, warn};

/// 激活框宽度
pub const ACTIVATION_BOX_WIDTH: f64 = 18.0;

/// 激活框默认高度
pub const ACTIVATION_BOX_HEIGHT: f64 = 25.0;

/// 生命线末端禁止放置激活框的区域
pub const FORBIDDEN_END_MARGIN: f64 = 30.0;

/// 销毁标记尺寸
const DESTROY_MARKER_SIZE: f64 = 10.0;

/// 销毁标记相对生命线末端的偏移
const DESTROY_MARKER_OFFSET: f64 = 5.0;

/// 生命线
#[derive(Debug, Clone)]
pub struct Lifeline {
    line: PrimitiveId,
    /// 未缩放的线长 (y2 - y1)
    line_height: f64,
    destroy: bool,
    destroy_marker: Option<PrimitiveId>,
    active_boxes: Vec<PrimitiveId>,
}

impl Lifeline {
    /// 绘制竖直虚线，返回图元句柄
    pub fn draw(surface: &mut dyn Surface, center_x: f64, start_y: f64, end_y: f64) -> PrimitiveId {
        let mut line = Primitive::line(
            Point2::new(center_x, start_y),
            Point2::new(center_x, end_y),
            Style::outline(2.0).with_line_type(LineType::Dashed, 1.0),
        )
        .with_padding(10.0)
        .with_controls(ControlsVisibility::only(&[Handle::Mb]));
        line.lock_movement_x = true;
        line.lock_movement_y = true;
        surface.add(line)
    }

    /// 新绘制的生命线
    pub fn drawn(line: PrimitiveId, line_height: f64) -> Self {
        Self {
            line,
            line_height,
            destroy: false,
            destroy_marker: None,
            active_boxes: Vec::new(),
        }
    }

    /// 接管已有的线段图元
    pub fn attach(surface: &dyn Surface, kind: ElementKind, line: PrimitiveId) -> Result<Self, CoreError> {
        let primitive = surface
            .get(line)
            .ok_or(CoreError::PrimitiveNotFound(line.0))?;
        let PrimitiveKind::Line { y1, y2, .. } = primitive.kind else {
            return Err(CoreError::InvalidPart {
                element: kind.type_tag().to_string(),
                part: PartRole::Lifeline.name().to_string(),
            });
        };
        Ok(Self::drawn(line, y2 - y1))
    }

    pub fn line(&self) -> PrimitiveId {
        self.line
    }

    pub fn line_height(&self) -> f64 {
        self.line_height
    }

    pub fn destroy(&self) -> bool {
        self.destroy
    }

    pub fn destroy_marker(&self) -> Option<PrimitiveId> {
        self.destroy_marker
    }

    pub fn active_boxes(&self) -> &[PrimitiveId] {
        &self.active_boxes
    }

    /// 生命线、激活框与销毁标记
    pub fn parts(&self) -> Vec<(PartRole, PrimitiveId)> {
        let mut parts = vec![(PartRole::Lifeline, self.line)];
        parts.extend(
            self.active_boxes
                .iter()
                .map(|id| (PartRole::ActivationBox, *id)),
        );
        if let Some(marker) = self.destroy_marker {
            parts.push((PartRole::DestroyMarker, marker));
        }
        parts
    }

    /// 渲染后的起点与终点
    pub fn endpoints(&self, surface: &dyn Surface) -> Option<(Point2, Point2)> {
        surface.get(self.line).and_then(|p| p.line_points())
    }

    /// 渲染后的末端纵坐标
    pub fn rendered_end(&self, surface: &dyn Surface) -> Option<f64> {
        self.endpoints(surface).map(|(_, end)| end.y)
    }

    /// 登记生命线与激活框的监听者
    pub fn attach_events(&self, surface: &mut dyn Surface, core: &ElementCore) {
        surface.on(self.line, SurfaceEvent::Scaling, core.listener(PartRole::Lifeline));
        for id in &self.active_boxes {
            bind_box(surface, core, *id);
        }
    }

    /// 重新定位整条生命线，保持线长与缩放不变
    pub fn layout(&self, surface: &mut dyn Surface, center_x: f64, start_y: f64) {
        if let Some(line) = surface.get_mut(self.line) {
            line.set_line(
                Point2::new(center_x, start_y),
                Point2::new(center_x, start_y + self.line_height),
            );
        }

        for id in &self.active_boxes {
            if let Some(activation) = surface.get_mut(*id) {
                let offset = activation.line_start_distance.unwrap_or_default();
                activation.left = center_x - ACTIVATION_BOX_WIDTH / 2.0;
                activation.top = start_y + offset;
            }
        }

        self.place_marker(surface);
    }

    /// 生命线被拉伸后修正虚线间隔，使渲染长度不变
    pub fn on_scaled(&self, surface: &mut dyn Surface) {
        if let Some(line) = surface.get_mut(self.line) {
            line.style.stroke_dash_array = LineType::Dashed.scaled_pattern(line.scale_y);
        }
        self.place_marker(surface);
    }

    /// 检查激活框位置是否落在末端禁区之前
    pub fn check_placement(&self, surface: &dyn Surface, y: f64) -> Result<(), CoreError> {
        let end = self
            .rendered_end(surface)
            .ok_or(CoreError::PrimitiveNotFound(self.line.0))?;
        let limit = end - FORBIDDEN_END_MARGIN;
        if y >= limit {
            return Err(CoreError::InvalidPlacement { y, limit });
        }
        Ok(())
    }

    /// 在指定纵坐标创建激活框；落在禁区内时不做任何修改
    pub fn create_activation_box(
        &mut self,
        surface: &mut dyn Surface,
        core: &ElementCore,
        y: f64,
        fill: &str,
    ) -> Option<PrimitiveId> {
        if let Err(e) = self.check_placement(surface, y) {
            warn!("Cannot create activation box on entity {}: {}", core.id, e);
            return None;
        }
        let (start, _) = self.endpoints(surface)?;

        let mut activation = Primitive::rect(
            start.x - ACTIVATION_BOX_WIDTH / 2.0,
            y,
            ACTIVATION_BOX_WIDTH,
            ACTIVATION_BOX_HEIGHT,
            Style::filled(fill, 1.5).uniform(),
        )
        .with_controls(ControlsVisibility::only(&[Handle::Mt, Handle::Mb]));
        activation.lock_movement_x = true;
        activation.line_start_distance = Some(y - start.y);
        activation.stamp(core.id, core.kind.type_tag(), PartRole::ActivationBox.name());

        let id = surface.add(activation);
        bind_box(surface, core, id);
        self.active_boxes.push(id);
        debug!("Created activation box {} on entity {} at y={}", id, core.id, y);
        Some(id)
    }

    /// 接管重建得到的激活框，恢复（或补算）各自的偏移
    pub fn adopt_boxes(
        &mut self,
        surface: &mut dyn Surface,
        core: &ElementCore,
        boxes: &[PrimitiveId],
        fill: &str,
    ) {
        let start_y = self.endpoints(surface).map(|(start, _)| start.y).unwrap_or_default();
        for id in boxes {
            let Some(activation) = surface.get_mut(*id) else {
                continue;
            };
            if activation.line_start_distance.is_none() {
                activation.line_start_distance = Some(activation.top - start_y);
            }
            activation.stamp(core.id, core.kind.type_tag(), PartRole::ActivationBox.name());
            bind_box(surface, core, *id);
            self.active_boxes.push(*id);
        }
        self.recolor_boxes(surface, fill);
    }

    /// 激活框被拖动后重新记录偏移
    pub fn box_moved(&self, surface: &mut dyn Surface, id: PrimitiveId) {
        if !self.active_boxes.contains(&id) {
            return;
        }
        let Some((start, _)) = self.endpoints(surface) else {
            return;
        };
        if let Some(activation) = surface.get_mut(id) {
            activation.line_start_distance = Some(activation.top - start.y);
        }
    }

    /// 删除单个激活框
    pub fn remove_box(&mut self, surface: &mut dyn Surface, id: PrimitiveId) -> bool {
        let Some(index) = self.active_boxes.iter().position(|b| *b == id) else {
            return false;
        };
        self.active_boxes.remove(index);
        surface.remove(id);
        true
    }

    pub fn recolor_boxes(&self, surface: &mut dyn Surface, fill: &str) {
        for id in &self.active_boxes {
            if let Some(activation) = surface.get_mut(*id) {
                activation.set_fill(fill);
            }
        }
    }

    /// 切换销毁标记
    pub fn set_destroy(&mut self, surface: &mut dyn Surface, core: &ElementCore, destroy: bool) {
        self.destroy = destroy;
        match (destroy, self.destroy_marker) {
            (true, None) => {
                let mut marker =
                    Primitive::cross(0.0, 0.0, DESTROY_MARKER_SIZE).locked().inert();
                marker.stamp(core.id, core.kind.type_tag(), PartRole::DestroyMarker.name());
                let id = surface.add(marker);
                surface.send_to_back(id);
                self.destroy_marker = Some(id);
            }
            (false, Some(marker)) => {
                surface.remove(marker);
                self.destroy_marker = None;
            }
            _ => {}
        }
        self.place_marker(surface);
    }

    /// 接管重建得到的销毁标记
    pub fn adopt_destroy_marker(&mut self, marker: PrimitiveId) {
        self.destroy = true;
        self.destroy_marker = Some(marker);
    }

    /// 把销毁标记钉在生命线渲染末端
    fn place_marker(&self, surface: &mut dyn Surface) {
        let Some(marker) = self.destroy_marker else {
            return;
        };
        let Some((_, end)) = self.endpoints(surface) else {
            return;
        };
        if let Some(primitive) = surface.get_mut(marker) {
            let half = primitive.width / 2.0;
            primitive.left = end.x - half;
            primitive.top = end.y + DESTROY_MARKER_OFFSET - half;
        }
    }
}

/// 激活框监听拖动与修改，以便重新记录偏移
fn bind_box(surface: &mut dyn Surface, core: &ElementCore, id: PrimitiveId) {
    let listener = core.listener(PartRole::ActivationBox);
    surface.on(id, SurfaceEvent::Moving, listener);
    surface.on(id, SurfaceEvent::Modified, listener);
}

/// 激活框与主体同色
pub(crate) fn box_fill(surface: &dyn Surface, main_part: PrimitiveId) -> String {
    surface
        .get(main_part)
        .and_then(|p| p.fill())
        .unwrap_or(DEFAULT_FILL)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use crate::math::{approx_eq, Vector2};
    use crate::surface::Canvas;

    fn setup() -> (Canvas, ElementCore, Lifeline) {
        let mut canvas = Canvas::new(800.0, 600.0);
        let line = Lifeline::draw(&mut canvas, 100.0, 100.0, 500.0);
        let lifeline = Lifeline::attach(&canvas, ElementKind::ClassWithLifeline, line).unwrap();
        let core = ElementCore::new(EntityId(1), ElementKind::ClassWithLifeline, Point2::new(0.0, 50.0));
        (canvas, core, lifeline)
    }

    #[test]
    fn test_forbidden_zone_rejects_box() {
        let (mut canvas, core, mut lifeline) = setup();
        assert!(lifeline
            .create_activation_box(&mut canvas, &core, 490.0, DEFAULT_FILL)
            .is_none());
        assert!(lifeline
            .create_activation_box(&mut canvas, &core, 470.0, DEFAULT_FILL)
            .is_none());
        assert!(lifeline.active_boxes().is_empty());

        assert!(lifeline
            .create_activation_box(&mut canvas, &core, 469.0, DEFAULT_FILL)
            .is_some());
    }

    #[test]
    fn test_layout_keeps_box_offsets() {
        let (mut canvas, core, mut lifeline) = setup();
        let id = lifeline
            .create_activation_box(&mut canvas, &core, 180.0, DEFAULT_FILL)
            .unwrap();
        assert_eq!(canvas.get(id).unwrap().line_start_distance, Some(80.0));

        lifeline.layout(&mut canvas, 140.0, 130.0);
        let activation = canvas.get(id).unwrap();
        assert!(approx_eq(activation.top, 210.0));
        assert!(approx_eq(activation.left, 131.0));
        assert_eq!(activation.line_start_distance, Some(80.0));
    }

    #[test]
    fn test_box_drag_updates_offset() {
        let (mut canvas, core, mut lifeline) = setup();
        let id = lifeline
            .create_activation_box(&mut canvas, &core, 150.0, DEFAULT_FILL)
            .unwrap();

        canvas.drag(id, Vector2::new(30.0, 40.0));
        lifeline.box_moved(&mut canvas, id);

        let activation = canvas.get(id).unwrap();
        assert!(approx_eq(activation.left, 91.0));
        assert_eq!(activation.line_start_distance, Some(90.0));
    }

    #[test]
    fn test_scaling_rescales_dash_and_pins_marker() {
        let (mut canvas, core, mut lifeline) = setup();
        lifeline.set_destroy(&mut canvas, &core, true);
        let marker = lifeline.destroy_marker().unwrap();
        assert_eq!(canvas.index_of(marker), Some(0));

        canvas.get_mut(lifeline.line()).unwrap().scale_y = 0.5;
        lifeline.on_scaled(&mut canvas);

        let line = canvas.get(lifeline.line()).unwrap();
        assert_eq!(line.style.stroke_dash_array, Some(vec![10.0, 10.0]));
        let marker = canvas.get(marker).unwrap();
        assert!(approx_eq(marker.top, 300.0));
        assert!(approx_eq(marker.left, 95.0));

        lifeline.set_destroy(&mut canvas, &core, false);
        assert!(lifeline.destroy_marker().is_none());
        assert_eq!(canvas.len(), 1);
    }

    #[test]
    fn test_adopt_computes_missing_offset() {
        let (mut canvas, core, mut lifeline) = setup();
        let orphan = canvas.add(Primitive::rect(91.0, 220.0, 18.0, 25.0, Style::default()));

        lifeline.adopt_boxes(&mut canvas, &core, &[orphan], "lavender");

        let activation = canvas.get(orphan).unwrap();
        assert_eq!(activation.line_start_distance, Some(120.0));
        assert_eq!(activation.fill(), Some("lavender"));
        assert_eq!(activation.tag.element_part.as_deref(), Some("activeBox"));
        assert!(canvas.has_listener(orphan, SurfaceEvent::Moving));
    }
}
