//! 庫存模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{InventoryId, StorageAreaId, Timestamp, WarehouseId};
use crate::{ApsError, Result};

/// 庫存記錄：一個物料在一個倉庫的庫存位置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    /// 庫存記錄ID
    pub id: InventoryId,

    /// 物料ID
    pub item_id: String,

    /// 所屬倉庫
    pub warehouse_id: WarehouseId,

    /// 提前期（天）：無約束的未來供應在此延遲後視為可得
    pub lead_time_days: u32,

    /// 現有庫存
    pub on_hand_qty: Decimal,

    /// 安全庫存
    pub safety_stock: Decimal,

    /// 已分配數量（鎖定）
    pub allocated_qty: Decimal,

    /// 可用庫存（現有 - 已分配）
    pub available_qty: Decimal,
}

impl Inventory {
    /// 創建新的庫存記錄
    pub fn new(id: InventoryId, item_id: String, warehouse_id: WarehouseId) -> Self {
        Self {
            id,
            item_id,
            warehouse_id,
            lead_time_days: 0,
            on_hand_qty: Decimal::ZERO,
            safety_stock: Decimal::ZERO,
            allocated_qty: Decimal::ZERO,
            available_qty: Decimal::ZERO,
        }
    }

    /// 建構器模式：設置提前期
    pub fn with_lead_time_days(mut self, days: u32) -> Self {
        self.lead_time_days = days;
        self
    }

    /// 建構器模式：設置現有庫存
    pub fn with_on_hand_qty(mut self, qty: Decimal) -> Self {
        self.on_hand_qty = qty;
        self.available_qty = qty - self.allocated_qty;
        self
    }

    /// 建構器模式：設置安全庫存
    pub fn with_safety_stock(mut self, qty: Decimal) -> Self {
        self.safety_stock = qty;
        self
    }

    /// 提前期時距
    pub fn lead_time(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.lead_time_days))
    }

    /// 計算可用庫存
    pub fn calculate_available(&mut self) {
        self.available_qty = self.on_hand_qty - self.allocated_qty;
    }

    /// 檢查庫存是否低於安全庫存
    pub fn is_below_safety_stock(&self) -> bool {
        self.available_qty < self.safety_stock
    }

    /// 分配庫存
    pub fn allocate(&mut self, quantity: Decimal) -> Result<()> {
        if quantity > self.available_qty {
            return Err(ApsError::AllocationExceedsAvailable {
                item_id: self.item_id.clone(),
                requested: quantity,
                available: self.available_qty,
            });
        }
        self.allocated_qty += quantity;
        self.calculate_available();
        Ok(())
    }

    /// 釋放已分配的庫存
    pub fn deallocate(&mut self, quantity: Decimal) -> Result<()> {
        if quantity > self.allocated_qty {
            return Err(ApsError::AllocationExceedsAvailable {
                item_id: self.item_id.clone(),
                requested: quantity,
                available: self.allocated_qty,
            });
        }
        self.allocated_qty -= quantity;
        self.calculate_available();
        Ok(())
    }
}

/// 預計收貨類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptKind {
    /// 採購到貨
    Purchase,
    /// 調撥在途
    Transfer,
    /// 已排程的生產完工
    Production,
}

/// 預計收貨：已在排程上的未來供應事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledReceipt {
    /// 收貨ID
    pub id: Uuid,

    /// 目標庫存記錄
    pub inventory_id: InventoryId,

    /// 入庫儲區
    pub storage_area_id: StorageAreaId,

    /// 可用時間
    pub available_at: Timestamp,

    /// 數量
    pub qty: Decimal,

    /// 收貨類型
    pub kind: ReceiptKind,
}

impl ScheduledReceipt {
    /// 創建新的預計收貨
    pub fn new(
        inventory_id: InventoryId,
        storage_area_id: StorageAreaId,
        available_at: Timestamp,
        qty: Decimal,
        kind: ReceiptKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            inventory_id,
            storage_area_id,
            available_at,
            qty,
            kind,
        }
    }
}
