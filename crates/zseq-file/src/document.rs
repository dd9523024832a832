//! 时序图文档
//!
//! 在编辑会话之外附带元数据、文件路径与修改标记。

use crate::error::FileError;
use crate::native::{self, CanvasState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;
use zseq_core::diagram::{Diagram, DiagramConfig};
use zseq_core::serialize::RestoreSummary;

/// 文档元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// 文档唯一标识
    pub id: Uuid,

    /// 文档标题
    pub title: String,

    /// 作者
    #[serde(default)]
    pub author: String,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 最后修改时间
    pub modified_at: DateTime<Utc>,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: "Untitled".to_string(),
            author: String::new(),
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }
}

/// 时序图文档
#[derive(Debug)]
pub struct Document {
    /// 元数据
    pub metadata: DocumentMetadata,

    diagram: Diagram,

    /// 是否已修改
    modified: bool,

    /// 文件路径（如果已保存）
    file_path: Option<PathBuf>,
}

impl Document {
    /// 创建新文档
    pub fn new(config: DiagramConfig) -> Self {
        Self {
            metadata: DocumentMetadata::default(),
            diagram: Diagram::new(config),
            modified: false,
            file_path: None,
        }
    }

    /// 从文件加载
    pub fn open(path: impl AsRef<Path>, config: DiagramConfig) -> Result<Self, FileError> {
        let path = path.as_ref();
        check_extension(path)?;

        let mut document = native::load(path, config)?;
        document.file_path = Some(path.to_path_buf());
        info!("Opened {}", path.display());
        Ok(document)
    }

    /// 保存文件
    pub fn save(&mut self) -> Result<(), FileError> {
        if let Some(path) = self.file_path.clone() {
            self.save_as(path)
        } else {
            Err(FileError::InvalidFormat("No file path set".to_string()))
        }
    }

    /// 另存为
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let path = path.as_ref();
        check_extension(path)?;

        self.metadata.modified_at = Utc::now();
        native::save(self, path)?;

        self.file_path = Some(path.to_path_buf());
        self.modified = false;
        Ok(())
    }

    /// 导出为 JSON 字符串
    pub fn export_string(&mut self) -> Result<String, FileError> {
        native::to_string(self)
    }

    /// 用 JSON 字符串替换当前内容。
    ///
    /// 整个字符串先被校验，失败时文档保持不变。
    pub fn import_str(&mut self, json: &str) -> Result<RestoreSummary, FileError> {
        let state = CanvasState::parse(json)?;
        let summary = self.diagram.import_objects(&state.objects)?;
        if let Some(metadata) = state.metadata {
            self.metadata = metadata;
        }
        self.modified = true;
        Ok(summary)
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    /// 获取可变会话（标记为已修改）
    pub fn diagram_mut(&mut self) -> &mut Diagram {
        self.modified = true;
        &mut self.diagram
    }

    /// 是否已修改
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// 标记为已保存
    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    /// 获取文件路径
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// 设置文件路径
    pub fn set_file_path(&mut self, path: impl AsRef<Path>) {
        self.file_path = Some(path.as_ref().to_path_buf());
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(DiagramConfig::default())
    }
}

fn check_extension(path: &Path) -> Result<(), FileError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(()),
        _ => Err(FileError::InvalidFormat(
            "Unknown file extension".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zseq_core::elements::ElementKind;
    use zseq_core::math::Point2;

    #[test]
    fn test_export_import_string() {
        let mut doc = Document::default();
        doc.diagram_mut()
            .create_entity(ElementKind::ClassWithLifeline, Point2::new(10.0, 10.0), Some("Server"));
        doc.diagram_mut()
            .create_entity(ElementKind::CombinedFragment, Point2::new(0.0, 200.0), None);
        let json = doc.export_string().unwrap();

        let mut other = Document::default();
        let summary = other.import_str(&json).unwrap();
        assert_eq!(summary.entities, 2);
        assert_eq!(other.metadata.id, doc.metadata.id);
        assert!(other.is_modified());
        assert_eq!(other.export_string().unwrap(), json);
    }

    #[test]
    fn test_failed_import_keeps_document() {
        let mut doc = Document::default();
        doc.diagram_mut()
            .create_entity(ElementKind::Note, Point2::new(10.0, 10.0), None);
        let before = doc.export_string().unwrap();

        let broken = r#"{ "version": 1, "objects": [ { "left": "x" } ] }"#;
        assert!(matches!(doc.import_str(broken), Err(FileError::InvalidFormat(_))));
        assert_eq!(doc.export_string().unwrap(), before);
    }

    #[test]
    fn test_save_requires_path_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = Document::default();
        assert!(matches!(doc.save(), Err(FileError::InvalidFormat(_))));
        assert!(matches!(
            doc.save_as(dir.path().join("diagram.zcad")),
            Err(FileError::InvalidFormat(_))
        ));

        let path = dir.path().join("diagram.json");
        doc.save_as(&path).unwrap();
        assert_eq!(doc.file_path(), Some(path.as_path()));
        assert!(!doc.is_modified());

        let reopened = Document::open(&path, DiagramConfig::default()).unwrap();
        assert_eq!(reopened.file_path(), Some(path.as_path()));
        assert_eq!(reopened.metadata.title, "Untitled");
    }

    #[test]
    fn test_open_leaves_document_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.json");
        let mut doc = Document::default();
        doc.diagram_mut()
            .create_entity(ElementKind::ActorWithLifeline, Point2::new(20.0, 20.0), Some("Buyer"));
        doc.save_as(&path).unwrap();

        let mut opened = Document::open(&path, DiagramConfig::default()).unwrap();
        assert!(!opened.is_modified());
        assert_eq!(opened.diagram().registry().len(), 1);

        opened.diagram_mut().undo();
        assert!(opened.is_modified());
    }
}
