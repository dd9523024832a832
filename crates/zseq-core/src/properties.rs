//! 图元视觉属性
//!
//! 包含填充、描边、线型等样式，以及属性面板使用的浅色调色板。

use serde::{Deserialize, Serialize};

/// 默认填充色
pub const DEFAULT_FILL: &str = "lightblue";

/// 默认描边色
pub const DEFAULT_STROKE: &str = "black";

/// 属性面板可选的浅色调色板（显示名, CSS颜色名）
pub const LIGHT_COLOR_PALETTE: [(&str, &str); 8] = [
    ("Light Blue", "lightblue"),
    ("Light Yellow", "lightyellow"),
    ("Lavender", "lavender"),
    ("Honeydew", "honeydew"),
    ("Misty Rose", "mistyrose"),
    ("Light Cyan", "lightcyan"),
    ("Peach Puff", "peachpuff"),
    ("Lemon Chiffon", "lemonchiffon"),
];

/// 线型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineType {
    /// 实线
    Continuous,
    /// 虚线（生命线、异步消息）
    Dashed,
    /// 点线（返回消息）
    Dotted,
}

impl LineType {
    /// 获取线型的模式数据（画线长度, 空白长度）
    pub fn pattern(&self) -> Option<[f64; 2]> {
        match self {
            LineType::Continuous => None,
            LineType::Dashed => Some([5.0, 5.0]),
            LineType::Dotted => Some([2.0, 4.0]),
        }
    }

    /// 按图元缩放系数修正的模式，使渲染后的虚线长度保持不变
    pub fn scaled_pattern(&self, scale: f64) -> Option<Vec<f64>> {
        let scale = if scale.abs() < f64::EPSILON { 1.0 } else { scale };
        self.pattern()
            .map(|[on, off]| vec![on / scale, off / scale])
    }
}

/// 图元的视觉属性
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    /// 填充色（None 表示透明）
    #[serde(default)]
    pub fill: Option<String>,
    /// 描边色
    #[serde(default)]
    pub stroke: Option<String>,
    /// 描边宽度
    #[serde(default = "Style::default_stroke_width")]
    pub stroke_width: f64,
    /// 虚线模式
    #[serde(default)]
    pub stroke_dash_array: Option<Vec<f64>>,
    /// 描边宽度是否不随缩放变化
    #[serde(default)]
    pub stroke_uniform: bool,
}

impl Style {
    fn default_stroke_width() -> f64 {
        1.0
    }

    /// 带填充与黑色描边的样式
    pub fn filled(fill: impl Into<String>, stroke_width: f64) -> Self {
        Self {
            fill: Some(fill.into()),
            stroke: Some(DEFAULT_STROKE.to_string()),
            stroke_width,
            ..Default::default()
        }
    }

    /// 透明填充、仅描边的样式
    pub fn outline(stroke_width: f64) -> Self {
        Self {
            fill: None,
            stroke: Some(DEFAULT_STROKE.to_string()),
            stroke_width,
            ..Default::default()
        }
    }

    /// 设置线型
    pub fn with_line_type(mut self, line_type: LineType, scale: f64) -> Self {
        self.stroke_dash_array = line_type.scaled_pattern(scale);
        self
    }

    /// 设置描边宽度不随缩放变化
    pub fn uniform(mut self) -> Self {
        self.stroke_uniform = true;
        self
    }
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            stroke_width: Self::default_stroke_width(),
            stroke_dash_array: None,
            stroke_uniform: false,
        }
    }
}

/// 检查颜色是否属于调色板
pub fn is_palette_color(value: &str) -> bool {
    LIGHT_COLOR_PALETTE.iter().any(|(_, css)| *css == value)
}
