//! 產能排程器介面
//!
//! 資源產能排程屬於外部協作者；本核心只透過這個窄介面
//! 驗證儲區資源的轉移窗口，以及由物料可得日期回推活動開始日期。

use chrono::Duration;

use crate::ids::{ResourceId, Timestamp};

/// 正向產能查詢結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityResult {
    /// 請求的窗口是否可行
    pub success: bool,

    /// 不可行時，下一個可行的開始時間
    pub next_start: Option<Timestamp>,
}

/// 反向產能查詢結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReverseCapacityResult {
    /// 是否找到可行的開始時間
    pub success: bool,

    /// 使指定時段恰於目標時間前完成的開始時間
    pub start: Option<Timestamp>,
}

/// 產能排程器
pub trait CapacityScheduler {
    /// 檢查資源自 `start` 起 `duration` 的產能；
    /// 不可行時回報下一個可行起點。
    fn find_capacity(
        &self,
        resource_id: ResourceId,
        start: Timestamp,
        duration: Duration,
    ) -> CapacityResult;

    /// 反向搜尋：找出不早於 `clock_floor` 的最晚開始時間，
    /// 使 `required_span` 的時段於 `target_end` 前完成。
    fn find_capacity_reverse(
        &self,
        resource_id: ResourceId,
        clock_floor: Timestamp,
        target_end: Timestamp,
        required_span: Duration,
    ) -> ReverseCapacityResult;
}

/// 無限產能：任何窗口皆可行
///
/// 測試與未綁定資源的儲區使用。
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconstrainedCapacity;

impl CapacityScheduler for UnconstrainedCapacity {
    fn find_capacity(
        &self,
        _resource_id: ResourceId,
        start: Timestamp,
        _duration: Duration,
    ) -> CapacityResult {
        CapacityResult {
            success: true,
            next_start: Some(start),
        }
    }

    fn find_capacity_reverse(
        &self,
        _resource_id: ResourceId,
        clock_floor: Timestamp,
        target_end: Timestamp,
        required_span: Duration,
    ) -> ReverseCapacityResult {
        let start = target_end - required_span;
        if start < clock_floor {
            return ReverseCapacityResult {
                success: false,
                start: None,
            };
        }
        ReverseCapacityResult {
            success: true,
            start: Some(start),
        }
    }
}
