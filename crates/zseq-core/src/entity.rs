//! 实体标识与注册表
//!
//! 注册表保存当前会话中所有存活的复合图元，按插入顺序排列，
//! 并维护 图元句柄 → 所属实体 的反向索引。

use crate::elements::DiagramElement;
use crate::primitive::PrimitiveId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// 可持久化的最大实体ID
pub const MAX_ENTITY_ID: u64 = i64::MAX as u64;

/// 实体唯一标识符（单调递增，不复用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl EntityId {
    /// 导入的ID必须落在 1..=MAX_ENTITY_ID 之内
    pub fn is_valid(&self) -> bool {
        (1..=MAX_ENTITY_ID).contains(&self.0)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 实体注册表
#[derive(Debug)]
pub struct Registry {
    /// 下一个可分配的ID
    next_id: u64,

    /// 存活实体（插入顺序）
    entities: Vec<DiagramElement>,

    /// 图元 → 所属实体
    owners: HashMap<PrimitiveId, EntityId>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entities: Vec::new(),
            owners: HashMap::new(),
        }
    }

    /// 分配下一个ID
    pub fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// 保留一个已有ID（重建时沿用持久化的ID），保证之后分配的ID更大
    pub fn reserve_id(&mut self, id: EntityId) {
        self.next_id = self.next_id.max(id.0.saturating_add(1));
    }

    /// 注册实体并索引其全部图元
    pub fn register(&mut self, element: DiagramElement) -> EntityId {
        let id = element.id();
        self.reserve_id(id);

        if let Some(index) = self.position(id) {
            warn!("Entity {} registered twice, replacing previous instance", id);
            self.entities.remove(index);
            self.owners.retain(|_, owner| *owner != id);
        }

        for (_, primitive) in element.parts() {
            self.owners.insert(primitive, id);
        }
        self.entities.push(element);
        debug!("Registered entity {}", id);
        id
    }

    /// 注销实体
    pub fn unregister(&mut self, id: EntityId) -> Option<DiagramElement> {
        let index = self.position(id)?;
        self.owners.retain(|_, owner| *owner != id);
        Some(self.entities.remove(index))
    }

    /// 实体的图元集合发生变化后重建索引
    pub fn reindex(&mut self, id: EntityId) {
        self.owners.retain(|_, owner| *owner != id);
        if let Some(index) = self.position(id) {
            for (_, primitive) in self.entities[index].parts() {
                self.owners.insert(primitive, id);
            }
        }
    }

    /// 按插入顺序返回所有实体
    pub fn all(&self) -> impl Iterator<Item = &DiagramElement> {
        self.entities.iter()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|e| e.id()).collect()
    }

    pub fn get(&self, id: EntityId) -> Option<&DiagramElement> {
        self.entities.iter().find(|e| e.id() == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut DiagramElement> {
        self.entities.iter_mut().find(|e| e.id() == id)
    }

    /// 查找图元所属实体；孤立图元返回 None
    pub fn find_by_primitive(&self, primitive: PrimitiveId) -> Option<EntityId> {
        self.owners.get(&primitive).copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// 清空所有实体（ID计数器不回退）
    pub fn clear(&mut self) {
        self.entities.clear();
        self.owners.clear();
    }

    fn position(&self, id: EntityId) -> Option<usize> {
        self.entities.iter().position(|e| e.id() == id)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
