//! 文档序列化
//!
//! - [`flatten`]: 把所有存活复合图元的部件展平为带归属标识的属性包列表
//! - [`reconstruct`]: 按 `id` 分组属性包，依类型标签分派重建函数
//!
//! 除三个归属字段（`id`、`diagramElement`、`elementPart`）与图元自身属性外，
//! 重建不依赖任何其它信息。

use crate::elements::{DiagramElement, ElementKind, PartRole, PartSet};
use crate::entity::{EntityId, Registry};
use crate::error::CoreError;
use crate::primitive::{PrimitiveId, PropertyBag};
use crate::surface::Surface;
use std::collections::HashMap;
use tracing::{debug, warn};

/// 重建结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// 成功重建的实体数
    pub entities: usize,
    /// 被跳过的分组数（未知类型、缺少部件等）
    pub skipped_groups: usize,
    /// 没有归属标识、原样保留在画布上的图元数
    pub free_primitives: usize,
}

/// 展平全部存活实体，按绘制顺序输出
pub fn flatten(registry: &Registry, surface: &mut dyn Surface) -> Vec<PropertyBag> {
    let mut owners: HashMap<PrimitiveId, (EntityId, PartRole)> = HashMap::new();
    for element in registry.all() {
        element.composite().apply_identification(surface);
        for (role, primitive) in element.parts() {
            owners.insert(primitive, (element.id(), role));
        }
    }

    let mut bags = Vec::with_capacity(owners.len());
    for primitive in surface.primitives() {
        let Some((entity, role)) = owners.get(&primitive).copied() else {
            warn!("Skipping orphaned primitive {} during flatten", primitive);
            continue;
        };
        let extra = registry
            .get(entity)
            .map(|element| element.composite().extra_fields(role))
            .unwrap_or_default();
        if let Some(bag) = surface.serialize_primitive(primitive, extra) {
            bags.push(bag);
        }
    }
    bags
}

/// 一个 `id` 分组中的图元
#[derive(Debug, Default)]
struct Group {
    boxes: Vec<PrimitiveId>,
    /// (句柄, 原始属性包下标)
    others: Vec<(PrimitiveId, usize)>,
}

impl Group {
    fn all(&self) -> impl Iterator<Item = PrimitiveId> + '_ {
        self.boxes
            .iter()
            .copied()
            .chain(self.others.iter().map(|(id, _)| *id))
    }
}

/// 用属性包替换画布与注册表的内容并重建实体。
///
/// 只有属性包本身无法解析时才返回错误，此时画布与注册表都保持不变。
/// 单个分组的问题（未知类型、缺少部件）只记录诊断并跳过该分组。
pub fn reconstruct(
    registry: &mut Registry,
    surface: &mut dyn Surface,
    bags: &[PropertyBag],
) -> Result<RestoreSummary, CoreError> {
    let handles = surface.load_document(bags)?;
    registry.clear();

    let mut summary = RestoreSummary::default();
    let mut order: Vec<EntityId> = Vec::new();
    let mut groups: HashMap<EntityId, Group> = HashMap::new();

    for (index, handle) in handles.iter().enumerate() {
        let Some(tag) = surface.get(*handle).map(|p| p.tag.clone()) else {
            continue;
        };
        let Some(id) = tag.id else {
            summary.free_primitives += 1;
            continue;
        };
        let group = groups.entry(id).or_insert_with(|| {
            order.push(id);
            Group::default()
        });
        if tag.element_part.as_deref() == Some(PartRole::ActivationBox.name()) {
            group.boxes.push(*handle);
        } else {
            group.others.push((*handle, index));
        }
    }

    for id in order {
        let Some(group) = groups.remove(&id) else {
            continue;
        };
        match rebuild_group(surface, id, &group, bags) {
            Ok(element) => {
                registry.register(element);
                summary.entities += 1;
            }
            Err(e) => {
                warn!("Skipping entity {} during reconstruction: {}", id, e);
                for primitive in group.all() {
                    surface.remove(primitive);
                }
                summary.skipped_groups += 1;
            }
        }
    }

    debug!(
        "Reconstructed {} entities ({} skipped, {} free primitives)",
        summary.entities, summary.skipped_groups, summary.free_primitives
    );
    Ok(summary)
}

fn rebuild_group(
    surface: &mut dyn Surface,
    id: EntityId,
    group: &Group,
    bags: &[PropertyBag],
) -> Result<DiagramElement, CoreError> {
    if !id.is_valid() {
        return Err(CoreError::InvalidEntityId(id.0));
    }
    let (anchor_handle, _) = group.others.first().ok_or_else(|| CoreError::MissingPart {
        element: format!("entity {}", id),
        part: "anchor".to_string(),
    })?;
    let anchor = surface
        .get(*anchor_handle)
        .ok_or(CoreError::PrimitiveNotFound(anchor_handle.0))?;
    let position = anchor.origin();
    let kind: ElementKind = anchor
        .tag
        .diagram_element
        .as_deref()
        .unwrap_or_default()
        .parse()?;

    let mut parts = PartSet::new();
    for (handle, index) in &group.others {
        let role = surface
            .get(*handle)
            .and_then(|p| p.tag.element_part.clone())
            .unwrap_or_default();
        match role.parse::<PartRole>() {
            Ok(role) => parts.insert(role, *handle, bags[*index].clone()),
            Err(e) => warn!("Entity {}: {}", id, e),
        }
    }

    let mut element = DiagramElement::reconstruct(kind, id, surface, position, &parts)?;
    element.adopt_activation_boxes(surface, &group.boxes);

    // 不属于该类型的部件不会被任何实体认领
    let owned: Vec<PrimitiveId> = element.parts().into_iter().map(|(_, p)| p).collect();
    for primitive in group.all() {
        if !owned.contains(&primitive) {
            warn!("Entity {} ({}) does not own primitive {}, removing it", id, kind, primitive);
            surface.remove(primitive);
        }
    }
    Ok(element)
}
