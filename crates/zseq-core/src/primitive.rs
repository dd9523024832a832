//! 绘图图元定义
//!
//! 图元是画布上可独立绘制的最小单元（矩形、线段、文本框、路径等）。
//! 复合图元由若干图元组成，每个图元以一个角色（role）归属于唯一的复合图元。
//!
//! 图元序列化为扁平的属性包（property bag），字段命名与画布状态 JSON 保持一致。

use crate::entity::EntityId;
use crate::math::{BoundingBox2, Point2, Vector2};
use crate::properties::{Style, DEFAULT_FILL, DEFAULT_STROKE};
use serde::{Deserialize, Serialize};

/// 文本框行高系数
pub const TEXT_LINE_HEIGHT: f64 = 1.16;

/// 默认字号
pub const DEFAULT_FONT_SIZE: f64 = 15.0;

/// 小人图形的缩放系数
pub const FIGURE_SCALE: f64 = 0.7;

/// 画布分配的图元句柄（不参与持久化，重新加载时重新分配）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveId(pub u64);

impl std::fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 扁平属性包
pub type PropertyBag = serde_json::Map<String, serde_json::Value>;

/// 文本对齐方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
}

/// 结构化多边形轮廓
///
/// 顶点由宽、高与折角尺寸重新生成，不按下标修补。
/// 顶点坐标相对于图元左上角。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Outline {
    /// 右上角折起的便签轮廓
    FoldedRect { width: f64, height: f64, fold: f64 },
    /// 便签折角三角形
    FoldedCorner { fold: f64 },
    /// 右下角切角的操作符标签
    ChamferedTag { width: f64, height: f64, chamfer: f64 },
}

impl Outline {
    /// 按绘制顺序生成顶点
    pub fn vertices(&self) -> Vec<Point2> {
        match *self {
            Outline::FoldedRect { width, height, fold } => vec![
                Point2::new(0.0, 0.0),
                Point2::new(width - fold, 0.0),
                Point2::new(width, fold),
                Point2::new(width, height),
                Point2::new(0.0, height),
            ],
            Outline::FoldedCorner { fold } => vec![
                Point2::new(0.0, 0.0),
                Point2::new(0.0, fold),
                Point2::new(fold, fold),
            ],
            Outline::ChamferedTag {
                width,
                height,
                chamfer,
            } => vec![
                Point2::new(0.0, 0.0),
                Point2::new(width, 0.0),
                Point2::new(width, chamfer),
                Point2::new(width - chamfer, height),
                Point2::new(0.0, height),
            ],
        }
    }

    /// 轮廓尺寸
    pub fn size(&self) -> Vector2 {
        match *self {
            Outline::FoldedRect { width, height, .. } => Vector2::new(width, height),
            Outline::FoldedCorner { fold } => Vector2::new(fold, fold),
            Outline::ChamferedTag { width, height, .. } => Vector2::new(width, height),
        }
    }

    /// 折角起点（便签轮廓的第二个顶点）
    pub fn fold_start(&self) -> Option<Point2> {
        match *self {
            Outline::FoldedRect { width, fold, .. } => Some(Point2::new(width - fold, 0.0)),
            _ => None,
        }
    }
}

/// 图元类型及其专有几何数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PrimitiveKind {
    Rect,
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    Textbox {
        text: String,
        font_size: f64,
        #[serde(default)]
        text_align: TextAlign,
        #[serde(default)]
        underline: bool,
    },
    Path {
        outline: Outline,
    },
    /// 参与者小人（头部圆形 + 躯干四肢）
    Figure {
        head_fill: String,
    },
    /// 箭头三角形，以中心为原点
    Triangle,
    /// 销毁标记 X
    Cross {
        size: f64,
    },
}

/// 控制手柄
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Mt,
    Mb,
    Ml,
    Mr,
    Bl,
    Br,
    Tl,
    Tr,
    Mtr,
}

/// 控制手柄可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlsVisibility {
    pub mt: bool,
    pub mb: bool,
    pub ml: bool,
    pub mr: bool,
    pub bl: bool,
    pub br: bool,
    pub tl: bool,
    pub tr: bool,
    pub mtr: bool,
}

impl ControlsVisibility {
    const fn uniform(visible: bool) -> Self {
        Self {
            mt: visible,
            mb: visible,
            ml: visible,
            mr: visible,
            bl: visible,
            br: visible,
            tl: visible,
            tr: visible,
            mtr: visible,
        }
    }

    /// 仅显示指定手柄
    pub fn only(handles: &[Handle]) -> Self {
        let mut controls = Self::uniform(false);
        for handle in handles {
            controls.set(*handle, true);
        }
        controls
    }

    /// 隐藏指定手柄
    pub fn without(handles: &[Handle]) -> Self {
        let mut controls = Self::uniform(true);
        for handle in handles {
            controls.set(*handle, false);
        }
        controls
    }

    fn set(&mut self, handle: Handle, visible: bool) {
        let slot = match handle {
            Handle::Mt => &mut self.mt,
            Handle::Mb => &mut self.mb,
            Handle::Ml => &mut self.ml,
            Handle::Mr => &mut self.mr,
            Handle::Bl => &mut self.bl,
            Handle::Br => &mut self.br,
            Handle::Tl => &mut self.tl,
            Handle::Tr => &mut self.tr,
            Handle::Mtr => &mut self.mtr,
        };
        *slot = visible;
    }
}

impl Default for ControlsVisibility {
    fn default() -> Self {
        Self::uniform(true)
    }
}

/// 持久化用的归属标识：所属复合图元ID、类型标签、角色名
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_part: Option<String>,
}

impl PartTag {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.diagram_element.is_none() && self.element_part.is_none()
    }
}

fn unit_scale() -> f64 {
    1.0
}

fn enabled() -> bool {
    true
}

/// 图元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Primitive {
    #[serde(flatten)]
    pub kind: PrimitiveKind,

    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default = "unit_scale")]
    pub scale_x: f64,
    #[serde(default = "unit_scale")]
    pub scale_y: f64,
    #[serde(default)]
    pub angle: f64,

    #[serde(flatten)]
    pub style: Style,

    #[serde(default)]
    pub lock_movement_x: bool,
    #[serde(default)]
    pub lock_movement_y: bool,
    #[serde(default)]
    pub lock_scaling_x: bool,
    #[serde(default)]
    pub lock_scaling_y: bool,
    #[serde(default = "enabled")]
    pub has_controls: bool,
    #[serde(default = "enabled")]
    pub selectable: bool,
    #[serde(default = "enabled")]
    pub evented: bool,
    #[serde(default)]
    pub padding: f64,
    #[serde(default)]
    pub controls_visibility: ControlsVisibility,

    /// 激活框相对生命线起点的偏移
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_start_distance: Option<f64>,

    #[serde(flatten)]
    pub tag: PartTag,
}

impl Primitive {
    fn base(kind: PrimitiveKind, left: f64, top: f64, width: f64, height: f64, style: Style) -> Self {
        Self {
            kind,
            left,
            top,
            width,
            height,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            style,
            lock_movement_x: false,
            lock_movement_y: false,
            lock_scaling_x: false,
            lock_scaling_y: false,
            has_controls: true,
            selectable: true,
            evented: true,
            padding: 0.0,
            controls_visibility: ControlsVisibility::default(),
            line_start_distance: None,
            tag: PartTag::default(),
        }
    }

    /// 矩形
    pub fn rect(left: f64, top: f64, width: f64, height: f64, style: Style) -> Self {
        Self::base(PrimitiveKind::Rect, left, top, width, height, style)
    }

    /// 线段
    pub fn line(start: Point2, end: Point2, style: Style) -> Self {
        let mut primitive = Self::base(
            PrimitiveKind::Line {
                x1: start.x,
                y1: start.y,
                x2: end.x,
                y2: end.y,
            },
            0.0,
            0.0,
            0.0,
            0.0,
            style,
        );
        primitive.sync_line_bounds();
        primitive
    }

    /// 文本框，高度由行数与字号决定
    pub fn textbox(text: impl Into<String>, left: f64, top: f64, width: f64, font_size: f64) -> Self {
        let mut primitive = Self::base(
            PrimitiveKind::Textbox {
                text: text.into(),
                font_size,
                text_align: TextAlign::Left,
                underline: false,
            },
            left,
            top,
            width,
            0.0,
            Style {
                fill: Some(DEFAULT_STROKE.to_string()),
                ..Style::default()
            },
        );
        primitive.relayout_text();
        primitive
    }

    /// 多边形路径
    pub fn path(outline: Outline, left: f64, top: f64, style: Style) -> Self {
        let size = outline.size();
        Self::base(PrimitiveKind::Path { outline }, left, top, size.x, size.y, style)
    }

    /// 参与者小人
    pub fn figure(left: f64, top: f64) -> Self {
        Self::base(
            PrimitiveKind::Figure {
                head_fill: DEFAULT_FILL.to_string(),
            },
            left,
            top,
            50.0 * FIGURE_SCALE,
            150.0 * FIGURE_SCALE,
            Style {
                stroke: Some(DEFAULT_STROKE.to_string()),
                stroke_width: 3.5,
                ..Style::default()
            },
        )
    }

    /// 以中心为原点的三角形
    pub fn triangle(center: Point2, size: f64, angle: f64, fill: &str) -> Self {
        let mut primitive = Self::base(
            PrimitiveKind::Triangle,
            center.x,
            center.y,
            size,
            size,
            Style {
                fill: Some(fill.to_string()),
                ..Style::default()
            },
        );
        primitive.angle = angle;
        primitive
    }

    /// 销毁标记
    pub fn cross(left: f64, top: f64, size: f64) -> Self {
        Self::base(
            PrimitiveKind::Cross { size },
            left,
            top,
            size,
            size,
            Style {
                stroke: Some("red".to_string()),
                stroke_width: 2.0,
                ..Style::default()
            },
        )
    }

    /// 禁止移动与缩放
    pub fn locked(mut self) -> Self {
        self.lock_movement_x = true;
        self.lock_movement_y = true;
        self.has_controls = false;
        self
    }

    /// 禁止缩放
    pub fn lock_scaling(mut self) -> Self {
        self.lock_scaling_x = true;
        self.lock_scaling_y = true;
        self.has_controls = false;
        self
    }

    /// 不可选中、不响应事件
    pub fn inert(mut self) -> Self {
        self.selectable = false;
        self.evented = false;
        self
    }

    pub fn with_controls(mut self, controls: ControlsVisibility) -> Self {
        self.controls_visibility = controls;
        self
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }

    // ====================================================================
    // 几何
    // ====================================================================

    /// 左上角（三角形为中心）
    pub fn origin(&self) -> Point2 {
        Point2::new(self.left, self.top)
    }

    pub fn scaled_width(&self) -> f64 {
        self.width * self.scale_x
    }

    pub fn scaled_height(&self) -> f64 {
        self.height * self.scale_y
    }

    /// 渲染后的包围盒
    pub fn bounds(&self) -> BoundingBox2 {
        match self.kind {
            PrimitiveKind::Triangle => BoundingBox2::from_origin_size(
                self.left - self.scaled_width() / 2.0,
                self.top - self.scaled_height() / 2.0,
                self.scaled_width(),
                self.scaled_height(),
            ),
            PrimitiveKind::Line { .. } => match self.line_points() {
                Some((start, end)) => BoundingBox2::from_points([start, end]),
                None => BoundingBox2::empty(),
            },
            _ => BoundingBox2::from_origin_size(
                self.left,
                self.top,
                self.scaled_width(),
                self.scaled_height(),
            ),
        }
    }

    pub fn center(&self) -> Point2 {
        self.bounds().center()
    }

    /// 移动到指定位置（线段整体平移）
    pub fn set_origin(&mut self, origin: Point2) {
        let delta = origin - self.origin();
        self.translate(&delta);
    }

    /// 平移
    pub fn translate(&mut self, delta: &Vector2) {
        if let PrimitiveKind::Line { x1, y1, x2, y2 } = &mut self.kind {
            *x1 += delta.x;
            *y1 += delta.y;
            *x2 += delta.x;
            *y2 += delta.y;
        }
        self.left += delta.x;
        self.top += delta.y;
    }

    /// 线段渲染后的端点（终点按缩放系数拉伸）
    pub fn line_points(&self) -> Option<(Point2, Point2)> {
        match self.kind {
            PrimitiveKind::Line { x1, y1, x2, y2 } => {
                let start = Point2::new(x1, y1);
                let end = Point2::new(
                    x1 + (x2 - x1) * self.scale_x,
                    y1 + (y2 - y1) * self.scale_y,
                );
                Some((start, end))
            }
            _ => None,
        }
    }

    /// 设置线段端点（未缩放坐标）
    pub fn set_line(&mut self, start: Point2, end: Point2) {
        if let PrimitiveKind::Line { x1, y1, x2, y2 } = &mut self.kind {
            *x1 = start.x;
            *y1 = start.y;
            *x2 = end.x;
            *y2 = end.y;
            self.sync_line_bounds();
        }
    }

    fn sync_line_bounds(&mut self) {
        if let PrimitiveKind::Line { x1, y1, x2, y2 } = self.kind {
            self.left = x1.min(x2);
            self.top = y1.min(y2);
            self.width = (x2 - x1).abs();
            self.height = (y2 - y1).abs();
        }
    }

    // ====================================================================
    // 文本
    // ====================================================================

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            PrimitiveKind::Textbox { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn font_size(&self) -> f64 {
        match self.kind {
            PrimitiveKind::Textbox { font_size, .. } => font_size,
            _ => DEFAULT_FONT_SIZE,
        }
    }

    /// 替换文本并重新计算高度
    pub fn set_text(&mut self, value: impl Into<String>) {
        if let PrimitiveKind::Textbox { text, .. } = &mut self.kind {
            *text = value.into();
            self.relayout_text();
        }
    }

    pub fn set_text_align(&mut self, align: TextAlign) {
        if let PrimitiveKind::Textbox { text_align, .. } = &mut self.kind {
            *text_align = align;
        }
    }

    pub fn set_underline(&mut self, value: bool) {
        if let PrimitiveKind::Textbox { underline, .. } = &mut self.kind {
            *underline = value;
        }
    }

    /// 按行数重新计算文本框高度
    pub fn relayout_text(&mut self) {
        if let PrimitiveKind::Textbox {
            text, font_size, ..
        } = &self.kind
        {
            let lines = text.split('\n').count().max(1) as f64;
            self.height = lines * font_size * TEXT_LINE_HEIGHT;
        }
    }

    // ====================================================================
    // 路径与填充
    // ====================================================================

    pub fn outline(&self) -> Option<&Outline> {
        match &self.kind {
            PrimitiveKind::Path { outline } => Some(outline),
            _ => None,
        }
    }

    /// 替换轮廓，尺寸随之更新
    pub fn set_outline(&mut self, value: Outline) {
        if let PrimitiveKind::Path { outline } = &mut self.kind {
            let size = value.size();
            *outline = value;
            self.width = size.x;
            self.height = size.y;
        }
    }

    /// 绝对坐标下的路径顶点
    pub fn path_vertices(&self) -> Vec<Point2> {
        let origin = self.origin();
        self.outline()
            .map(|outline| {
                outline
                    .vertices()
                    .into_iter()
                    .map(|v| Point2::new(origin.x + v.x * self.scale_x, origin.y + v.y * self.scale_y))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 主体填充色（小人取头部颜色）
    pub fn fill(&self) -> Option<&str> {
        match &self.kind {
            PrimitiveKind::Figure { head_fill } => Some(head_fill),
            _ => self.style.fill.as_deref(),
        }
    }

    pub fn set_fill(&mut self, color: impl Into<String>) {
        let color = color.into();
        match &mut self.kind {
            PrimitiveKind::Figure { head_fill } => *head_fill = color,
            _ => self.style.fill = Some(color),
        }
    }

    // ====================================================================
    // 归属标识
    // ====================================================================

    /// 写入归属标识，覆盖先前所有者留下的标识
    pub fn stamp(&mut self, id: EntityId, element: &str, part: &str) {
        self.clear_tag();
        self.tag = PartTag {
            id: Some(id),
            diagram_element: Some(element.to_string()),
            element_part: Some(part.to_string()),
        };
    }

    pub fn clear_tag(&mut self) {
        self.tag = PartTag::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;

    #[test]
    fn test_line_translate_moves_endpoints_and_bounds() {
        let mut line = Primitive::line(
            Point2::new(10.0, 20.0),
            Point2::new(10.0, 220.0),
            Style::outline(2.0),
        );
        line.translate(&Vector2::new(5.0, -10.0));

        let (start, end) = line.line_points().unwrap();
        assert!(approx_eq(start.x, 15.0));
        assert!(approx_eq(start.y, 10.0));
        assert!(approx_eq(end.y, 210.0));
        assert!(approx_eq(line.top, 10.0));
        assert!(approx_eq(line.height, 200.0));
    }

    #[test]
    fn test_scaled_line_end() {
        let mut line = Primitive::line(
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 100.0),
            Style::outline(2.0),
        );
        line.scale_y = 1.5;
        let (_, end) = line.line_points().unwrap();
        assert!(approx_eq(end.y, 150.0));
    }

    #[test]
    fn test_folded_rect_vertices_regenerate_from_size() {
        let mut body = Primitive::path(
            Outline::FoldedRect {
                width: 150.0,
                height: 100.0,
                fold: 20.0,
            },
            0.0,
            0.0,
            Style::filled(DEFAULT_FILL, 1.0),
        );
        body.set_outline(Outline::FoldedRect {
            width: 200.0,
            height: 80.0,
            fold: 20.0,
        });

        let vertices = body.path_vertices();
        assert_eq!(vertices.len(), 5);
        assert!(approx_eq(vertices[1].x, 180.0));
        assert!(approx_eq(vertices[3].y, 80.0));
        assert!(approx_eq(body.width, 200.0));
    }

    #[test]
    fn test_textbox_height_follows_line_count() {
        let mut text = Primitive::textbox("one", 0.0, 0.0, 100.0, 15.0);
        let single = text.height;
        text.set_text("one\ntwo");
        assert!(approx_eq(text.height, single * 2.0));
    }

    #[test]
    fn test_stamp_replaces_previous_owner() {
        let mut rect = Primitive::rect(0.0, 0.0, 10.0, 10.0, Style::default());
        rect.stamp(EntityId(1), "Note", "body");
        rect.stamp(EntityId(7), "ClassWithLifeline", "shape");
        assert_eq!(rect.tag.id, Some(EntityId(7)));
        assert_eq!(rect.tag.element_part.as_deref(), Some("shape"));
    }

    #[test]
    fn test_serialized_bag_is_flat() {
        let mut rect = Primitive::rect(1.0, 2.0, 3.0, 4.0, Style::filled("lavender", 2.0));
        rect.stamp(EntityId(3), "ClassWithLifeline", "shape");
        let value = serde_json::to_value(&rect).unwrap();

        assert_eq!(value["type"], "rect");
        assert_eq!(value["id"], 3);
        assert_eq!(value["diagramElement"], "ClassWithLifeline");
        assert_eq!(value["elementPart"], "shape");
        assert_eq!(value["fill"], "lavender");

        let restored: Primitive = serde_json::from_value(value).unwrap();
        assert_eq!(restored, rect);
    }
}
