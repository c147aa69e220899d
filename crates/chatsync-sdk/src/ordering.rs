//! 时间排序工具
//!
//! 只在拉取历史时对整批消息排序一次；单条追加不重排。

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

/// 带时间戳的条目
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// 比较两个条目的先后顺序（早的在前）
pub fn compare_chronological<T: Timestamped>(a: &T, b: &T) -> Ordering {
    a.timestamp().cmp(&b.timestamp())
}

/// 稳定排序：时间相同的条目保持原有相对顺序
pub fn sort_chronological<T: Timestamped>(items: &mut [T]) {
    items.sort_by(compare_chronological);
}

/// `later` 是否不早于 `earlier`
pub fn is_not_older<T: Timestamped>(earlier: &T, later: &T) -> bool {
    compare_chronological(earlier, later) != Ordering::Greater
}
