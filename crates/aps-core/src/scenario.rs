//! 排程場景
//!
//! 場景是一個獨立的可變物件圖：倉儲結構、庫存、批次帳、預計收貨與
//! 模擬時鐘。場景之間不共享可變狀態；場景內的模擬為單一寫入者、
//! 同步執行。所有跨實體引用以ID儲存，`resolve_references` 為載入後
//! 的重建引用檢查。

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::{ConnectorId, InventoryId, ResourceId, StorageAreaId, Timestamp, WarehouseId};
use crate::inventory::{Inventory, ScheduledReceipt};
use crate::ledger::LotManager;
use crate::storage::{ItemStorage, StorageArea, StorageAreaConnector, Warehouse};
use crate::{ApsError, Result};

/// 場景選項
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOptions {
    /// 是否保留過期物料（false 時過期批次不登錄至儲區）
    pub save_expired_material: bool,

    /// 是否對已優化活動恢復物料約束（恢復時以缺料取代硬性失敗）
    pub restore_material_constraints: bool,

    /// 數量捨入位數（None 表示不捨入）
    pub qty_scale: Option<u32>,

    /// 計劃時界（天）
    pub planning_horizon_days: u32,
}

impl ScenarioOptions {
    /// 建構器模式：設置是否保留過期物料
    pub fn with_save_expired_material(mut self, save: bool) -> Self {
        self.save_expired_material = save;
        self
    }

    /// 建構器模式：設置恢復物料約束
    pub fn with_restore_material_constraints(mut self, restore: bool) -> Self {
        self.restore_material_constraints = restore;
        self
    }

    /// 建構器模式：設置數量捨入位數
    pub fn with_qty_scale(mut self, scale: u32) -> Self {
        self.qty_scale = Some(scale);
        self
    }

    /// 建構器模式：設置計劃時界
    pub fn with_planning_horizon(mut self, days: u32) -> Self {
        self.planning_horizon_days = days;
        self
    }

    /// 依場景捨入規則捨入數量
    pub fn round_qty(&self, qty: Decimal) -> Decimal {
        match self.qty_scale {
            Some(scale) => qty.round_dp(scale),
            None => qty,
        }
    }
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            save_expired_material: true,
            restore_material_constraints: false,
            qty_scale: None,
            planning_horizon_days: 90,
        }
    }
}

/// 排程場景
#[derive(Debug, Clone)]
pub struct Scenario {
    /// 模擬時鐘
    pub clock: Timestamp,

    /// 計劃時界結束時間
    pub horizon_end: Timestamp,

    /// 場景選項
    pub options: ScenarioOptions,

    /// 批次帳
    pub lots: LotManager,

    warehouses: BTreeMap<WarehouseId, Warehouse>,
    storage_areas: BTreeMap<StorageAreaId, StorageArea>,
    inventories: BTreeMap<InventoryId, Inventory>,
    connectors: BTreeMap<ConnectorId, StorageAreaConnector>,
    item_storages: Vec<ItemStorage>,
    receipts: Vec<ScheduledReceipt>,
}

impl Scenario {
    /// 創建新的場景
    pub fn new(clock: Timestamp, options: ScenarioOptions) -> Self {
        let horizon_end = clock + Duration::days(i64::from(options.planning_horizon_days));
        Self {
            clock,
            horizon_end,
            options,
            lots: LotManager::new(),
            warehouses: BTreeMap::new(),
            storage_areas: BTreeMap::new(),
            inventories: BTreeMap::new(),
            connectors: BTreeMap::new(),
            item_storages: Vec::new(),
            receipts: Vec::new(),
        }
    }

    /// 時間是否在計劃時界內
    pub fn within_horizon(&self, at: Timestamp) -> bool {
        at <= self.horizon_end
    }

    /// 登錄倉庫
    pub fn add_warehouse(&mut self, warehouse: Warehouse) {
        self.warehouses.insert(warehouse.id, warehouse);
    }

    /// 登錄儲區
    pub fn add_storage_area(&mut self, area: StorageArea) {
        self.storage_areas.insert(area.id, area);
    }

    /// 登錄庫存記錄
    pub fn add_inventory(&mut self, inventory: Inventory) {
        self.inventories.insert(inventory.id, inventory);
    }

    /// 登錄連接器
    pub fn add_connector(&mut self, connector: StorageAreaConnector) {
        self.connectors.insert(connector.id, connector);
    }

    /// 登錄物料儲位
    pub fn add_item_storage(&mut self, item_storage: ItemStorage) {
        self.item_storages.push(item_storage);
    }

    /// 登錄預計收貨
    pub fn add_receipt(&mut self, receipt: ScheduledReceipt) {
        self.receipts.push(receipt);
    }

    /// 查找倉庫
    pub fn warehouse(&self, id: WarehouseId) -> Option<&Warehouse> {
        self.warehouses.get(&id)
    }

    /// 查找儲區
    pub fn storage_area(&self, id: StorageAreaId) -> Option<&StorageArea> {
        self.storage_areas.get(&id)
    }

    /// 查找庫存記錄
    pub fn inventory(&self, id: InventoryId) -> Option<&Inventory> {
        self.inventories.get(&id)
    }

    /// 查找庫存記錄（可變）
    pub fn inventory_mut(&mut self, id: InventoryId) -> Option<&mut Inventory> {
        self.inventories.get_mut(&id)
    }

    /// 查找連接器
    pub fn connector(&self, id: ConnectorId) -> Option<&StorageAreaConnector> {
        self.connectors.get(&id)
    }

    /// 查找連接器（可變）
    pub fn connector_mut(&mut self, id: ConnectorId) -> Option<&mut StorageAreaConnector> {
        self.connectors.get_mut(&id)
    }

    /// 查找物料在指定倉庫的庫存記錄
    pub fn inventory_for_item(&self, item_id: &str, warehouse_id: WarehouseId) -> Option<&Inventory> {
        self.inventories
            .values()
            .find(|inv| inv.item_id == item_id && inv.warehouse_id == warehouse_id)
    }

    /// 物料在所有倉庫的庫存記錄（依提前期遞增排序）
    pub fn inventories_for_item(&self, item_id: &str) -> Vec<&Inventory> {
        let mut result: Vec<&Inventory> = self
            .inventories
            .values()
            .filter(|inv| inv.item_id == item_id)
            .collect();
        result.sort_by_key(|inv| (inv.lead_time_days, inv.id));
        result
    }

    /// 指定倉庫的所有儲區（依ID排序）
    pub fn areas_in_warehouse(&self, warehouse_id: WarehouseId) -> Vec<&StorageArea> {
        self.storage_areas
            .values()
            .filter(|area| area.warehouse_id == warehouse_id)
            .collect()
    }

    /// 消耗資源可用的連接器（依ID排序）
    pub fn connectors_for_consumer(&self, resource_id: ResourceId) -> Vec<&StorageAreaConnector> {
        self.connectors
            .values()
            .filter(|conn| conn.serves_consumer(resource_id))
            .collect()
    }

    /// 儲區是否可存放指定物料
    pub fn area_stores_item(&self, storage_area_id: StorageAreaId, item_id: &str) -> bool {
        self.item_storages
            .iter()
            .any(|s| s.storage_area_id == storage_area_id && s.item_id == item_id)
    }

    /// 可存放指定物料的倉庫（依ID排序）
    pub fn warehouses_storing_item(&self, item_id: &str) -> Vec<WarehouseId> {
        let mut result: Vec<WarehouseId> = self
            .item_storages
            .iter()
            .filter(|s| s.item_id == item_id)
            .filter_map(|s| self.storage_areas.get(&s.storage_area_id))
            .map(|area| area.warehouse_id)
            .collect();
        result.sort();
        result.dedup();
        result
    }

    /// 指定庫存記錄的預計收貨
    pub fn receipts_for(&self, inventory_id: InventoryId) -> impl Iterator<Item = &ScheduledReceipt> {
        self.receipts
            .iter()
            .filter(move |r| r.inventory_id == inventory_id)
    }

    /// 刪除儲區
    ///
    /// 儲區仍被任一批次分佈引用時拒絕刪除並回報驗證失敗。
    pub fn delete_storage_area(&mut self, id: StorageAreaId) -> Result<()> {
        let area = self
            .storage_areas
            .get(&id)
            .ok_or(ApsError::StorageAreaNotFound(id))?;
        self.lots.validate_storage_area_delete(area)?;

        self.storage_areas.remove(&id);
        self.item_storages.retain(|s| s.storage_area_id != id);
        Ok(())
    }

    /// 載入後的重建引用檢查：所有跨實體ID必須可解析
    pub fn resolve_references(&self) -> Result<()> {
        for area in self.storage_areas.values() {
            if !self.warehouses.contains_key(&area.warehouse_id) {
                return Err(ApsError::DanglingReference {
                    entity: format!("儲區 {}", area.external_id),
                    referenced: format!("倉庫 {}", area.warehouse_id),
                });
            }
        }

        for inv in self.inventories.values() {
            if !self.warehouses.contains_key(&inv.warehouse_id) {
                return Err(ApsError::DanglingReference {
                    entity: format!("庫存 {}", inv.item_id),
                    referenced: format!("倉庫 {}", inv.warehouse_id),
                });
            }
        }

        for item_storage in &self.item_storages {
            if !self.storage_areas.contains_key(&item_storage.storage_area_id) {
                return Err(ApsError::DanglingReference {
                    entity: format!("物料儲位 {}", item_storage.item_id),
                    referenced: format!("儲區 {}", item_storage.storage_area_id),
                });
            }
        }

        for conn in self.connectors.values() {
            for area_id in conn.in_areas.iter().chain(conn.out_areas.iter()) {
                if !self.storage_areas.contains_key(area_id) {
                    return Err(ApsError::DanglingReference {
                        entity: format!("連接器 {}", conn.external_id),
                        referenced: format!("儲區 {}", area_id),
                    });
                }
            }
        }

        for lot in self.lots.lots() {
            if !self.inventories.contains_key(&lot.inventory_id) {
                return Err(ApsError::DanglingReference {
                    entity: format!("批次 {}", lot.external_id),
                    referenced: format!("庫存 {}", lot.inventory_id),
                });
            }
            for entry in lot.storages().entries() {
                if !self.storage_areas.contains_key(&entry.storage_area_id) {
                    return Err(ApsError::DanglingReference {
                        entity: format!("批次 {}", lot.external_id),
                        referenced: format!("儲區 {}", entry.storage_area_id),
                    });
                }
            }
        }

        for receipt in &self.receipts {
            if !self.inventories.contains_key(&receipt.inventory_id) {
                return Err(ApsError::DanglingReference {
                    entity: format!("預計收貨 {}", receipt.id),
                    referenced: format!("庫存 {}", receipt.inventory_id),
                });
            }
            if !self.storage_areas.contains_key(&receipt.storage_area_id) {
                return Err(ApsError::DanglingReference {
                    entity: format!("預計收貨 {}", receipt.id),
                    referenced: format!("儲區 {}", receipt.storage_area_id),
                });
            }
        }

        Ok(())
    }
}
