//! 中心吸附
//!
//! 拖动实体主体时，若其中心在某一坐标轴上与其它实体中心的距离小于阈值，
//! 则在该轴上对齐到最近的那个中心。两个坐标轴相互独立。

use crate::math::{Point2, Vector2};

/// 默认吸附阈值
pub const DEFAULT_SNAP_THRESHOLD: f64 = 15.0;

/// 吸附结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snap {
    /// 需要施加到被拖动部件上的位移
    pub offset: Vector2,
    /// 竖直参考线的横坐标
    pub guide_x: Option<f64>,
    /// 水平参考线的纵坐标
    pub guide_y: Option<f64>,
}

impl Snap {
    pub fn is_snapped(&self) -> bool {
        self.guide_x.is_some() || self.guide_y.is_some()
    }
}

/// 计算吸附位移；任一轴都未吸附时返回 None
pub fn snap_center(
    moving: Point2,
    targets: impl IntoIterator<Item = Point2>,
    threshold: f64,
) -> Option<Snap> {
    let mut closest_x: Option<(f64, f64)> = None;
    let mut closest_y: Option<(f64, f64)> = None;

    for target in targets {
        let dx = target.x - moving.x;
        let dy = target.y - moving.y;
        if dx.abs() < threshold && closest_x.map_or(true, |(d, _)| dx.abs() < d.abs()) {
            closest_x = Some((dx, target.x));
        }
        if dy.abs() < threshold && closest_y.map_or(true, |(d, _)| dy.abs() < d.abs()) {
            closest_y = Some((dy, target.y));
        }
    }

    let snap = Snap {
        offset: Vector2::new(
            closest_x.map_or(0.0, |(d, _)| d),
            closest_y.map_or(0.0, |(d, _)| d),
        ),
        guide_x: closest_x.map(|(_, x)| x),
        guide_y: closest_y.map(|(_, y)| y),
    };
    snap.is_snapped().then_some(snap)
}
