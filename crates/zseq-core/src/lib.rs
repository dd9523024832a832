//! ZSEQ 核心文档模型
//!
//! 交互式时序图编辑器的文档层：由若干画布图元组成的复合实体、
//! 部件之间的几何联动、文档展平/重建以及基于快照的撤销重做。
//!
//! # 架构设计
//!
//! - `Surface`: 外部绘图协作者，保存图元并产生交互通知
//! - `Registry`: 实体注册表，实体 id 即持久化标识
//! - `DiagramElement`: 五种复合实体（参与者、类、组合片段、注释、消息）
//! - `SnapshotStore`: 线性快照历史
//! - `Diagram`: 把以上部分组合为一个编辑会话
//!
//! # 示例
//!
//! ```rust
//! use zseq_core::prelude::*;
//!
//! let mut diagram = Diagram::default();
//! let id = diagram.create_entity(
//!     ElementKind::ClassWithLifeline,
//!     Point2::new(100.0, 100.0),
//!     Some("System"),
//! );
//! let shape = diagram.part(id, PartRole::Shape).unwrap();
//! diagram.move_part(shape, Vector2::new(50.0, 0.0));
//! assert!(diagram.undo());
//! ```

pub mod diagram;
pub mod elements;
pub mod entity;
pub mod error;
pub mod history;
pub mod math;
pub mod primitive;
pub mod properties;
pub mod serialize;
pub mod snap;
pub mod surface;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::diagram::{Diagram, DiagramConfig};
    pub use crate::elements::{
        Composite, DiagramElement, EditableProperty, ElementKind, MessageKind, PartRole,
        PropertyType, PropertyValue,
    };
    pub use crate::entity::{EntityId, Registry};
    pub use crate::error::CoreError;
    pub use crate::history::{Snapshot, SnapshotStore};
    pub use crate::math::{Point2, Vector2};
    pub use crate::primitive::{Primitive, PrimitiveId, PropertyBag};
    pub use crate::properties::{LineType, Style};
    pub use crate::surface::{Canvas, Surface, SurfaceEvent};
}
