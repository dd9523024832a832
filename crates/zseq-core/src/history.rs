//! 快照历史
//!
//! 线性的撤销/重做历史，每个快照是一份完整的序列化文档：
//! - 在游标不在末尾时捕获新快照，会丢弃游标之后的重做分支
//! - 撤销/重做越界时只记录诊断，不返回错误
//! - 超过最大深度时淘汰最旧的快照，游标随之前移

use crate::primitive::PropertyBag;
use std::time::SystemTime;
use tracing::{debug, warn};

/// 默认最大历史深度
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

/// 快照：一份序列化文档
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub objects: Vec<PropertyBag>,
    pub captured_at: SystemTime,
}

impl Snapshot {
    pub fn new(objects: Vec<PropertyBag>) -> Self {
        Self {
            objects,
            captured_at: SystemTime::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct HistoryStats {
    /// 累计捕获次数
    pub total_captures: usize,

    /// 被新编辑丢弃的重做快照数
    pub discarded_redo: usize,

    /// 因深度限制淘汰的快照数
    pub evicted: usize,

    /// 最后捕获时间
    pub last_capture_time: Option<SystemTime>,
}

/// 快照存储
#[derive(Debug)]
pub struct SnapshotStore {
    snapshots: Vec<Snapshot>,

    /// 当前快照下标；None 表示历史为空
    cursor: Option<usize>,

    /// 最大历史深度
    max_depth: usize,

    stats: HistoryStats,
}

impl SnapshotStore {
    pub fn new(max_depth: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: None,
            max_depth: max_depth.max(1),
            stats: HistoryStats::default(),
        }
    }

    /// 追加快照，先丢弃游标之后的重做分支
    pub fn capture(&mut self, objects: Vec<PropertyBag>) {
        let keep = self.cursor.map_or(0, |c| c + 1);
        if keep < self.snapshots.len() {
            let discarded = self.snapshots.len() - keep;
            self.snapshots.truncate(keep);
            self.stats.discarded_redo += discarded;
            debug!("Discarded {} redo snapshots", discarded);
        }

        let snapshot = Snapshot::new(objects);
        self.stats.last_capture_time = Some(snapshot.captured_at);
        self.snapshots.push(snapshot);
        self.stats.total_captures += 1;

        while self.snapshots.len() > self.max_depth {
            self.snapshots.remove(0);
            self.stats.evicted += 1;
        }
        self.cursor = Some(self.snapshots.len() - 1);
        debug!(
            "Captured snapshot {} of {}",
            self.snapshots.len(),
            self.max_depth
        );
    }

    /// 游标后退一步，返回需要恢复的快照
    pub fn undo(&mut self) -> Option<&Snapshot> {
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                self.snapshots.get(c - 1)
            }
            _ => {
                warn!("Cannot undo further.");
                None
            }
        }
    }

    /// 游标前进一步，返回需要恢复的快照
    pub fn redo(&mut self) -> Option<&Snapshot> {
        match self.cursor {
            Some(c) if c + 1 < self.snapshots.len() => {
                self.cursor = Some(c + 1);
                self.snapshots.get(c + 1)
            }
            _ => {
                warn!("Cannot redo further.");
                None
            }
        }
    }

    /// 把游标移到指定快照；下标越界时不做任何事
    pub fn seek(&mut self, index: usize) -> bool {
        if index >= self.snapshots.len() {
            return false;
        }
        self.cursor = Some(index);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.snapshots.len())
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.cursor.and_then(|c| self.snapshots.get(c))
    }

    /// 游标位置，空历史为 -1
    pub fn cursor(&self) -> isize {
        self.cursor.map_or(-1, |c| c as isize)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn stats(&self) -> &HistoryStats {
        &self.stats
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = None;
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(marker: i64) -> Vec<PropertyBag> {
        let mut bag = PropertyBag::new();
        bag.insert("left".into(), json!(marker));
        vec![bag]
    }

    fn marker(snapshot: Option<&Snapshot>) -> Option<i64> {
        snapshot.and_then(|s| s.objects.first()).and_then(|b| b["left"].as_i64())
    }

    #[test]
    fn test_empty_history_boundaries() {
        let mut store = SnapshotStore::default();
        assert_eq!(store.cursor(), -1);
        assert!(store.undo().is_none());
        assert!(store.redo().is_none());

        store.capture(Vec::new());
        assert_eq!(store.cursor(), 0);
        assert!(store.current().unwrap().is_empty());
        assert!(!store.can_undo());
    }

    #[test]
    fn test_undo_redo_walks_cursor() {
        let mut store = SnapshotStore::default();
        for i in 0..3 {
            store.capture(doc(i));
        }

        assert_eq!(marker(store.undo()), Some(1));
        assert_eq!(marker(store.undo()), Some(0));
        assert!(store.undo().is_none());
        assert_eq!(store.cursor(), 0);

        assert_eq!(marker(store.redo()), Some(1));
        assert_eq!(marker(store.redo()), Some(2));
        assert!(store.redo().is_none());
    }

    #[test]
    fn test_capture_truncates_redo_branch() {
        let mut store = SnapshotStore::default();
        for i in 0..4 {
            store.capture(doc(i));
        }
        store.undo();
        store.undo();
        store.capture(doc(9));

        assert_eq!(store.len(), 3);
        assert!(!store.can_redo());
        assert!(store.redo().is_none());
        assert_eq!(marker(store.current()), Some(9));
        assert_eq!(store.stats().discarded_redo, 2);
    }

    #[test]
    fn test_seek_moves_cursor_within_bounds() {
        let mut store = SnapshotStore::default();
        for i in 0..3 {
            store.capture(doc(i));
        }
        store.undo();
        assert!(store.seek(2));
        assert_eq!(marker(store.current()), Some(2));
        assert!(!store.seek(3));
        assert_eq!(store.cursor(), 2);
    }

    #[test]
    fn test_depth_limit_evicts_oldest() {
        let mut store = SnapshotStore::new(3);
        for i in 0..5 {
            store.capture(doc(i));
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.cursor(), 2);
        assert_eq!(store.stats().evicted, 2);

        assert_eq!(marker(store.undo()), Some(3));
        assert_eq!(marker(store.undo()), Some(2));
        assert!(store.undo().is_none());
    }
}
