//! # APS Core
//!
//! 核心資料模型與類型定義：批次帳、儲區圖、庫存、需求與場景

pub mod activity;
pub mod capacity;
pub mod ids;
pub mod inventory;
pub mod ledger;
pub mod lot;
pub mod requirement;
pub mod scenario;
pub mod storage;

// Re-export 主要類型
pub use activity::Activity;
pub use capacity::{CapacityResult, CapacityScheduler, ReverseCapacityResult, UnconstrainedCapacity};
pub use ids::{
    ConnectorId, InventoryId, LotId, ResourceId, StorageAreaId, Timestamp, WarehouseId,
};
pub use inventory::{Inventory, ReceiptKind, ScheduledReceipt};
pub use ledger::{LinkMode, LotManager};
pub use lot::{Lot, LotAdjustment, LotAdjustmentKind, LotSource, LotStorage, LotStorageProfile, ShelfLife};
pub use requirement::{MaterialRequirement, MaterialUsedTiming};
pub use scenario::{Scenario, ScenarioOptions};
pub use storage::{FlowUsage, ItemStorage, StorageArea, StorageAreaConnector, Warehouse};

use rust_decimal::Decimal;

/// APS 錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum ApsError {
    #[error("找不到倉庫: {0}")]
    WarehouseNotFound(WarehouseId),

    #[error("找不到儲區: {0}")]
    StorageAreaNotFound(StorageAreaId),

    #[error("找不到庫存記錄: 物料 {item_id}, 倉庫 {warehouse_id}")]
    InventoryNotFound {
        item_id: String,
        warehouse_id: WarehouseId,
    },

    #[error("找不到批次: {0}")]
    LotNotFound(LotId),

    #[error("儲區 {storage_area} 仍被批次 {lot} 引用，無法刪除")]
    StorageAreaInUse { lot: String, storage_area: String },

    #[error("批次 {lot} 啟用合格批次限制但未設定批次代碼")]
    EligibleLotCodeMissing { lot: String },

    #[error("分配數量超過可用庫存: 物料 {item_id}, 需要 {requested}, 可用 {available}")]
    AllocationExceedsAvailable {
        item_id: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("引用解析失敗: {entity} 引用了不存在的 {referenced}")]
    DanglingReference { entity: String, referenced: String },

    #[error("供應總量不足以覆蓋需求，呼叫端必須先以 max_available_qty 預檢")]
    InsufficientSupply,

    #[error("無效的日期: {0}")]
    InvalidDate(String),

    #[error("其他錯誤: {0}")]
    Other(String),
}

impl ApsError {
    /// 穩定錯誤代碼（驗證失敗回報給上層時使用）
    pub fn code(&self) -> &'static str {
        match self {
            ApsError::WarehouseNotFound(_) => "E_WAREHOUSE_NOT_FOUND",
            ApsError::StorageAreaNotFound(_) => "E_STORAGE_AREA_NOT_FOUND",
            ApsError::InventoryNotFound { .. } => "E_INVENTORY_NOT_FOUND",
            ApsError::LotNotFound(_) => "E_LOT_NOT_FOUND",
            ApsError::StorageAreaInUse { .. } => "E_STORAGE_AREA_IN_USE",
            ApsError::EligibleLotCodeMissing { .. } => "E_ELIGIBLE_LOT_CODE_MISSING",
            ApsError::AllocationExceedsAvailable { .. } => "E_ALLOCATION_EXCEEDS_AVAILABLE",
            ApsError::DanglingReference { .. } => "E_DANGLING_REFERENCE",
            ApsError::InsufficientSupply => "E_INSUFFICIENT_SUPPLY",
            ApsError::InvalidDate(_) => "E_INVALID_DATE",
            ApsError::Other(_) => "E_OTHER",
        }
    }
}

pub type Result<T> = std::result::Result<T, ApsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_stable() {
        let err = ApsError::StorageAreaInUse {
            lot: "LOT-001".to_string(),
            storage_area: "SA-01".to_string(),
        };
        assert_eq!(err.code(), "E_STORAGE_AREA_IN_USE");

        let msg = err.to_string();
        assert!(msg.contains("LOT-001"));
        assert!(msg.contains("SA-01"));
    }
}
