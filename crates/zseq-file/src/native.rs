//! ZSEQ 画布状态格式（.json）
//!
//! 单个 JSON 对象：
//! - `version`: 格式版本
//! - `metadata`: 文档元数据（可选，旧文件没有）
//! - `objects`: 按绘制顺序排列的图元属性包，带归属标识

use crate::document::{Document, DocumentMetadata};
use crate::error::FileError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use zseq_core::diagram::DiagramConfig;
use zseq_core::primitive::PropertyBag;
use zseq_core::surface::parse_document;

/// 当前文件格式版本
pub const FORMAT_VERSION: u32 = 1;

/// 持久化的画布状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasState {
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,

    pub objects: Vec<PropertyBag>,
}

impl CanvasState {
    /// 解析并校验画布状态；任何图元无法解析都视为格式错误
    pub fn parse(json: &str) -> Result<Self, FileError> {
        let state: CanvasState = serde_json::from_str(json)
            .map_err(|e| FileError::InvalidFormat(format!("Malformed canvas state: {}", e)))?;

        if state.version > FORMAT_VERSION {
            return Err(FileError::UnsupportedVersion(format!(
                "File version {} is newer than supported version {}",
                state.version, FORMAT_VERSION
            )));
        }

        parse_document(&state.objects).map_err(|e| FileError::InvalidFormat(e.to_string()))?;
        Ok(state)
    }
}

/// 把文档编码为 JSON 字符串
pub fn to_string(document: &mut Document) -> Result<String, FileError> {
    let state = CanvasState {
        version: FORMAT_VERSION,
        metadata: Some(document.metadata.clone()),
        objects: document.diagram_mut().export_objects(),
    };
    Ok(serde_json::to_string_pretty(&state)?)
}

/// 保存文档到文件
pub fn save(document: &mut Document, path: &Path) -> Result<(), FileError> {
    let json = to_string(document)?;
    std::fs::write(path, json)?;
    info!("Saved document to {}", path.display());
    Ok(())
}

/// 从文件加载文档
pub fn load(path: &Path, config: DiagramConfig) -> Result<Document, FileError> {
    let json = std::fs::read_to_string(path)?;
    let state = CanvasState::parse(&json)?;

    let mut document = Document::new(config);
    if let Some(metadata) = state.metadata {
        document.metadata = metadata;
    }
    let summary = document.diagram_mut().import_objects(&state.objects)?;
    debug!(
        "Loaded {} entities from {} ({} skipped)",
        summary.entities,
        path.display(),
        summary.skipped_groups
    );
    document.mark_saved();
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zseq_core::elements::ElementKind;
    use zseq_core::math::Point2;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("login.json");

        let mut doc = Document::default();
        doc.metadata.title = "Login flow".to_string();
        let user = doc.diagram_mut().create_entity(
            ElementKind::ActorWithLifeline,
            Point2::new(40.0, 20.0),
            Some("User"),
        );
        doc.diagram_mut().add_activation_box(user, 200.0).unwrap();
        doc.diagram_mut()
            .create_entity(ElementKind::Message, Point2::new(60.0, 190.0), Some("login()"));

        save(&mut doc, &file_path).unwrap();
        let mut loaded = load(&file_path, DiagramConfig::default()).unwrap();

        assert!(!loaded.is_modified());
        assert_eq!(loaded.metadata.title, "Login flow");
        assert_eq!(loaded.metadata.id, doc.metadata.id);
        assert_eq!(loaded.diagram().registry().len(), 2);
        assert_eq!(
            loaded.diagram_mut().export_objects(),
            doc.diagram_mut().export_objects()
        );
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let json = r#"{ "version": 99, "objects": [] }"#;
        assert!(matches!(
            CanvasState::parse(json),
            Err(FileError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_missing_metadata_is_accepted() {
        let state = CanvasState::parse(r#"{ "version": 1, "objects": [] }"#).unwrap();
        assert!(state.metadata.is_none());
        assert!(state.objects.is_empty());
    }

    #[test]
    fn test_malformed_object_is_invalid_format() {
        let json = r#"{ "version": 1, "objects": [ { "type": "hexagon" } ] }"#;
        assert!(matches!(
            CanvasState::parse(json),
            Err(FileError::InvalidFormat(_))
        ));
        assert!(matches!(
            CanvasState::parse("not json"),
            Err(FileError::InvalidFormat(_))
        ));
    }
}
