//! ZSEQ 文件格式处理
//!
//! 支持：
//! - `.json` 画布状态格式（`{ "version", "metadata", "objects" }`）
//! - 字符串形式的导出/导入，供剪贴板与前端使用

pub mod document;
pub mod error;
pub mod native;

pub use document::{Document, DocumentMetadata};
pub use error::FileError;
pub use native::{CanvasState, FORMAT_VERSION};
