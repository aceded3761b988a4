//! # APS Calculation Engine
//!
//! 物料可用性判定引擎：需求/供應剖面、配置計劃、最小位移匹配與
//! 判定主流程

pub mod allocation;
pub mod backward;
pub mod demand_profile;
pub mod matching;
pub mod resolution;
pub mod supply_profile;

// Re-export 主要類型
pub use allocation::{AllocationPlanner, MaterialAllocationPlan};
pub use backward::BackwardCalculator;
pub use demand_profile::{Allocation, AllocationSource, DemandNode, MaterialDemandProfile};
pub use matching::ShiftCalculator;
pub use resolution::{resolve_scenarios, MaterialResolver, ScenarioJob};
pub use supply_profile::{SupplyNode, SupplyProfile, SupplySource};

use aps_core::{Timestamp, WarehouseId};
use rust_decimal::Decimal;

/// 缺料記錄：非約束需求接受的供應缺口
#[derive(Debug, Clone)]
pub struct MaterialShortage {
    /// 物料ID
    pub item_id: String,

    /// 缺料歸屬倉庫（None 表示對所有倉庫記錄）
    pub warehouse_id: Option<WarehouseId>,

    /// 缺口數量
    pub qty: Decimal,

    /// 記錄時間
    pub at: Timestamp,
}

/// 物料可用性判定結果
///
/// 可行性結果是一般的資料值而非錯誤：排程驅動端據此決定
/// 繼續排程、接受缺料或延後重試。
#[derive(Debug, Clone)]
pub enum FindMaterialResult {
    /// 全部需求已滿足（可能含接受的缺料）
    Satisfied {
        /// 各需求的需求剖面（含配置記錄）
        profiles: Vec<MaterialDemandProfile>,

        /// 接受的缺料
        shortages: Vec<MaterialShortage>,
    },

    /// 第一個無法滿足的需求；呼叫端不早於 `retry_date` 重試整個活動
    Deferred {
        /// 無法滿足的物料
        item_id: String,

        /// 需求釘選的倉庫
        warehouse_id: Option<WarehouseId>,

        /// 最早可能可行的重試時間（None 表示目前無可計算的重試點）
        retry_date: Option<Timestamp>,
    },
}

impl FindMaterialResult {
    /// 是否全部滿足
    pub fn is_satisfied(&self) -> bool {
        matches!(self, FindMaterialResult::Satisfied { .. })
    }

    /// 重試時間（僅延後結果有值）
    pub fn retry_date(&self) -> Option<Timestamp> {
        match self {
            FindMaterialResult::Deferred { retry_date, .. } => *retry_date,
            FindMaterialResult::Satisfied { .. } => None,
        }
    }
}

/// 合併兩個重試時間候選：取非空者的最小值
///
/// 連接器與物料是彼此獨立的阻擋約束，較近者決定重試時間。
pub fn merge_retry(a: Option<Timestamp>, b: Option<Timestamp>) -> Option<Timestamp> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (Some(x), None) => Some(x),
        (None, y) => y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2025, 11, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_merge_retry() {
        assert_eq!(merge_retry(None, None), None);
        assert_eq!(merge_retry(Some(ts(5)), None), Some(ts(5)));
        assert_eq!(merge_retry(None, Some(ts(3))), Some(ts(3)));
        assert_eq!(merge_retry(Some(ts(5)), Some(ts(3))), Some(ts(3)));
    }
}
