//! 物料需求模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{StorageAreaId, WarehouseId};

/// 物料耗用時點
///
/// 決定需求節點在活動時間軸上的位置，以及回推開始日期時
/// 需在耗用點之前完成的活動時段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialUsedTiming {
    /// 整備開始時
    SetupStart,
    /// 整備期間（取中點）
    DuringSetup,
    /// 生產開始時
    ProductionStart,
    /// 逐生產週期
    PerCycle,
    /// 第一個週期
    FirstCycle,
    /// 最後一個週期
    LastCycle,
    /// 後處理開始時
    PostProcessingStart,
    /// 後處理結束時
    PostProcessingEnd,
}

/// 物料需求
///
/// 活動對一種物料的宣告需求，可釘選倉庫/儲區，
/// 並攜帶耗用時點與合格批次代碼等政策。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialRequirement {
    /// 需求ID
    pub id: Uuid,

    /// 物料ID
    pub item_id: String,

    /// 需求數量
    pub qty: Decimal,

    /// 釘選倉庫
    pub warehouse_id: Option<WarehouseId>,

    /// 釘選儲區
    pub storage_area_id: Option<StorageAreaId>,

    /// 直接採購（不做庫存規劃）
    pub buy_direct: bool,

    /// 是否為約束需求（非約束需求可接受缺料）
    pub is_constraint: bool,

    /// 合格批次代碼過濾
    pub allowed_lot_code: Option<String>,

    /// 耗用時點
    pub timing: MaterialUsedTiming,

    /// 是否允許提前期後援
    pub allow_lead_time_fallback: bool,
}

impl MaterialRequirement {
    /// 創建新的物料需求
    pub fn new(item_id: String, qty: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            qty,
            warehouse_id: None,
            storage_area_id: None,
            buy_direct: false,
            is_constraint: true,
            allowed_lot_code: None,
            timing: MaterialUsedTiming::ProductionStart,
            allow_lead_time_fallback: true,
        }
    }

    /// 建構器模式：釘選倉庫
    pub fn with_warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    /// 建構器模式：釘選儲區
    pub fn with_storage_area(mut self, storage_area_id: StorageAreaId) -> Self {
        self.storage_area_id = Some(storage_area_id);
        self
    }

    /// 建構器模式：標記為直接採購
    pub fn as_buy_direct(mut self) -> Self {
        self.buy_direct = true;
        self
    }

    /// 建構器模式：標記為非約束需求
    pub fn as_non_constraint(mut self) -> Self {
        self.is_constraint = false;
        self
    }

    /// 建構器模式：設置合格批次代碼
    pub fn with_allowed_lot_code(mut self, code: String) -> Self {
        self.allowed_lot_code = Some(code);
        self
    }

    /// 建構器模式：設置耗用時點
    pub fn with_timing(mut self, timing: MaterialUsedTiming) -> Self {
        self.timing = timing;
        self
    }

    /// 建構器模式：禁止提前期後援
    pub fn without_lead_time_fallback(mut self) -> Self {
        self.allow_lead_time_fallback = false;
        self
    }
}
