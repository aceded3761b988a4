//! 批次帳管理
//!
//! `LotManager` 擁有場景內所有批次：負責發號、每個庫存記錄惟一的
//! 合成「現有庫存」批次、耗用與轉庫存入口，以及刪除驗證。

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::ids::{InventoryId, LotId, StorageAreaId, Timestamp};
use crate::lot::{Lot, LotSource, LotStorage};
use crate::storage::StorageArea;
use crate::{ApsError, Result};

/// 儲區數量連結語意
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// 覆寫（匯入/更新流程）
    Set,
    /// 累加（生產流程）
    Accumulate,
}

/// 批次帳管理器
#[derive(Debug, Clone, Default)]
pub struct LotManager {
    /// 批次集合（BTreeMap 保證走訪順序確定）
    lots: BTreeMap<LotId, Lot>,

    /// 每個庫存記錄的合成現有庫存批次
    on_hand: BTreeMap<InventoryId, LotId>,

    next_id: u64,
}

impl LotManager {
    /// 創建空的批次帳
    pub fn new() -> Self {
        Self::default()
    }

    fn next_lot_id(&mut self) -> LotId {
        self.next_id += 1;
        LotId(self.next_id)
    }

    /// 創建新批次並發號
    pub fn create_lot(
        &mut self,
        external_id: String,
        inventory_id: InventoryId,
        source: LotSource,
    ) -> LotId {
        let id = self.next_lot_id();
        self.lots
            .insert(id, Lot::new(id, external_id, inventory_id, source));
        id
    }

    /// 以建構完成的批次登錄（匯入流程）
    pub fn import_lot(&mut self, build: impl FnOnce(LotId) -> Lot) -> LotId {
        let id = self.next_lot_id();
        let lot = build(id);
        self.lots.insert(id, lot);
        id
    }

    /// 查找批次
    pub fn lot(&self, id: LotId) -> Option<&Lot> {
        self.lots.get(&id)
    }

    /// 查找批次（可變）
    pub fn lot_mut(&mut self, id: LotId) -> Option<&mut Lot> {
        self.lots.get_mut(&id)
    }

    fn get_mut(&mut self, id: LotId) -> Result<&mut Lot> {
        self.lots.get_mut(&id).ok_or(ApsError::LotNotFound(id))
    }

    /// 所有批次（依ID排序）
    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.values()
    }

    /// 指定庫存記錄的批次
    pub fn lots_for_inventory(&self, inventory_id: InventoryId) -> impl Iterator<Item = &Lot> {
        self.lots
            .values()
            .filter(move |lot| lot.inventory_id == inventory_id)
    }

    /// 指定庫存記錄的批次總量
    pub fn total_qty(&self, inventory_id: InventoryId) -> Decimal {
        self.lots_for_inventory(inventory_id)
            .map(|lot| lot.qty())
            .sum()
    }

    /// 取得（必要時延遲創建）庫存記錄的合成現有庫存批次
    pub fn on_hand_lot(&mut self, inventory_id: InventoryId) -> LotId {
        if let Some(&id) = self.on_hand.get(&inventory_id) {
            return id;
        }
        let id = self.create_lot(
            format!("ONHAND-{}", inventory_id),
            inventory_id,
            LotSource::OnHand,
        );
        self.on_hand.insert(inventory_id, id);
        id
    }

    /// 設定現有庫存批次在指定儲區的數量
    pub fn set_on_hand_qty(
        &mut self,
        inventory_id: InventoryId,
        storage_area_id: StorageAreaId,
        qty: Decimal,
    ) {
        let id = self.on_hand_lot(inventory_id);
        if let Some(lot) = self.lots.get_mut(&id) {
            lot.set_storage_qty(storage_area_id, qty);
        }
    }

    /// 自現有庫存批次依序扣減數量，回傳實際扣減量
    pub fn subtract_on_hand_qty(
        &mut self,
        at: Timestamp,
        inventory_id: InventoryId,
        qty: Decimal,
    ) -> Decimal {
        let id = self.on_hand_lot(inventory_id);
        match self.lots.get_mut(&id) {
            Some(lot) => lot.issue(at, qty),
            None => Decimal::ZERO,
        }
    }

    /// 耗用批次數量（依儲區順序抽取），回傳實際耗用量
    ///
    /// 呼叫端必須先以 `Lot::qty()` 預檢；超量時抽乾即止。
    pub fn issue_material(&mut self, at: Timestamp, lot_id: LotId, qty: Decimal) -> Result<Decimal> {
        Ok(self.get_mut(lot_id)?.issue(at, qty))
    }

    /// 從指定儲區耗用批次數量，回傳實際耗用量
    pub fn issue_from_storage(
        &mut self,
        at: Timestamp,
        lot_id: LotId,
        storage_area_id: StorageAreaId,
        qty: Decimal,
    ) -> Result<Decimal> {
        Ok(self.get_mut(lot_id)?.take_from(at, storage_area_id, qty))
    }

    /// 新增或更新批次的儲區數量
    pub fn link_on_hand_storage(
        &mut self,
        lot_id: LotId,
        storage_area_id: StorageAreaId,
        qty: Decimal,
        mode: LinkMode,
    ) -> Result<()> {
        let lot = self.get_mut(lot_id)?;
        match mode {
            LinkMode::Set => lot.set_storage_qty(storage_area_id, qty),
            LinkMode::Accumulate => lot.add_storage_qty(storage_area_id, qty),
        }
        Ok(())
    }

    /// 完工轉庫存：重播批次調整歷史，將生產淨額移入現有庫存批次
    pub fn convert_to_inventory(&mut self, at: Timestamp, lot_id: LotId) -> Result<Decimal> {
        let (inventory_id, dist) = {
            let lot = self.lots.get(&lot_id).ok_or(ApsError::LotNotFound(lot_id))?;
            (lot.inventory_id, lot.convert_to_inventory(at))
        };

        let mut moved = Decimal::ZERO;
        for (storage_area_id, qty) in dist {
            let taken = self.get_mut(lot_id)?.take_from(at, storage_area_id, qty);
            if taken > Decimal::ZERO {
                let on_hand = self.on_hand_lot(inventory_id);
                self.get_mut(on_hand)?.add_storage_qty(storage_area_id, taken);
                moved += taken;
            }
        }
        Ok(moved)
    }

    /// 部分完工轉庫存：依調整順序分配至請求數量為止
    pub fn store_partial_in_inventory(
        &mut self,
        at: Timestamp,
        lot_id: LotId,
        qty_moving: Decimal,
    ) -> Result<Decimal> {
        let (inventory_id, dist) = {
            let lot = self.lots.get(&lot_id).ok_or(ApsError::LotNotFound(lot_id))?;
            (lot.inventory_id, lot.store_partial_in_inventory(at, qty_moving))
        };

        let mut moved = Decimal::ZERO;
        for (storage_area_id, qty) in dist {
            let taken = self.get_mut(lot_id)?.take_from(at, storage_area_id, qty);
            if taken > Decimal::ZERO {
                let on_hand = self.on_hand_lot(inventory_id);
                self.get_mut(on_hand)?.add_storage_qty(storage_area_id, taken);
                moved += taken;
            }
        }

        self.get_mut(lot_id)?.clear_partial_qty(moved);
        Ok(moved)
    }

    /// 刪除驗證：儲區仍被任一批次分佈引用時拒絕刪除
    pub fn validate_storage_area_delete(&self, storage_area: &StorageArea) -> Result<()> {
        for lot in self.lots.values() {
            if lot.storages().references(storage_area.id) {
                return Err(ApsError::StorageAreaInUse {
                    lot: lot.external_id.clone(),
                    storage_area: storage_area.external_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// 清除指定庫存記錄的所有批次（庫存位置被清除時）
    pub fn clear_inventory(&mut self, inventory_id: InventoryId) {
        self.lots.retain(|_, lot| lot.inventory_id != inventory_id);
        self.on_hand.remove(&inventory_id);
    }

    /// 模擬初始化時可登錄的批次儲區
    ///
    /// 過期且未保留的物料不登錄（視同不存在於儲區）。
    pub fn active_storages(
        &self,
        clock: Timestamp,
        save_expired_material: bool,
    ) -> impl Iterator<Item = (&Lot, &LotStorage)> {
        self.lots
            .values()
            .filter(move |lot| save_expired_material || !lot.shelf_life.is_expired(clock))
            .flat_map(|lot| lot.storages().entries().iter().map(move |s| (lot, s)))
    }

    /// 模擬初始化：將批次分佈登錄至儲區，回傳登錄筆數
    pub fn register_lots(&self, clock: Timestamp, save_expired_material: bool) -> usize {
        let mut registered = 0;
        for lot in self.lots.values() {
            if !save_expired_material && lot.shelf_life.is_expired(clock) {
                tracing::debug!("批次 {} 已過期且未保留，略過登錄", lot.external_id);
                continue;
            }
            registered += lot.storages().entries().len();
        }
        registered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::WarehouseId;
    use crate::lot::ShelfLife;
    use chrono::NaiveDate;

    fn ts(day: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2025, 11, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_on_hand_lot_is_lazy_and_unique() {
        let mut mgr = LotManager::new();
        let a = mgr.on_hand_lot(InventoryId(1));
        let b = mgr.on_hand_lot(InventoryId(1));
        let c = mgr.on_hand_lot(InventoryId(2));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(mgr.lot(a).unwrap().source(), LotSource::OnHand);
    }

    #[test]
    fn test_set_and_subtract_on_hand() {
        let mut mgr = LotManager::new();
        mgr.set_on_hand_qty(InventoryId(1), StorageAreaId(1), Decimal::from(100));
        assert_eq!(mgr.total_qty(InventoryId(1)), Decimal::from(100));

        let issued = mgr.subtract_on_hand_qty(ts(1), InventoryId(1), Decimal::from(60));
        assert_eq!(issued, Decimal::from(60));
        assert_eq!(mgr.total_qty(InventoryId(1)), Decimal::from(40));

        // 超量扣減抽乾即止
        let issued = mgr.subtract_on_hand_qty(ts(2), InventoryId(1), Decimal::from(999));
        assert_eq!(issued, Decimal::from(40));
        assert_eq!(mgr.total_qty(InventoryId(1)), Decimal::ZERO);
    }

    #[test]
    fn test_link_on_hand_storage_modes() {
        let mut mgr = LotManager::new();
        let lot_id = mgr.create_lot("LOT-L1".to_string(), InventoryId(1), LotSource::Purchase);

        // 匯入/更新流程覆寫
        mgr.link_on_hand_storage(lot_id, StorageAreaId(1), Decimal::from(50), LinkMode::Set)
            .unwrap();
        mgr.link_on_hand_storage(lot_id, StorageAreaId(1), Decimal::from(30), LinkMode::Set)
            .unwrap();
        assert_eq!(mgr.lot(lot_id).unwrap().qty(), Decimal::from(30));

        // 生產流程累加
        mgr.link_on_hand_storage(
            lot_id,
            StorageAreaId(1),
            Decimal::from(30),
            LinkMode::Accumulate,
        )
        .unwrap();
        assert_eq!(mgr.lot(lot_id).unwrap().qty(), Decimal::from(60));

        // 不存在的批次回報驗證失敗
        let err = mgr
            .link_on_hand_storage(LotId(99), StorageAreaId(1), Decimal::ONE, LinkMode::Set)
            .unwrap_err();
        assert_eq!(err.code(), "E_LOT_NOT_FOUND");
    }

    #[test]
    fn test_clear_inventory_removes_lots() {
        let mut mgr = LotManager::new();
        mgr.set_on_hand_qty(InventoryId(1), StorageAreaId(1), Decimal::from(10));
        mgr.set_on_hand_qty(InventoryId(2), StorageAreaId(1), Decimal::from(20));

        mgr.clear_inventory(InventoryId(1));
        assert_eq!(mgr.total_qty(InventoryId(1)), Decimal::ZERO);
        assert_eq!(mgr.total_qty(InventoryId(2)), Decimal::from(20));

        // 清除後重新取得會建立新的合成批次
        let id = mgr.on_hand_lot(InventoryId(1));
        assert_eq!(mgr.lot(id).unwrap().qty(), Decimal::ZERO);
    }

    #[test]
    fn test_convert_to_inventory_moves_production() {
        let mut mgr = LotManager::new();
        let lot_id = mgr.create_lot("LOT-P1".to_string(), InventoryId(1), LotSource::Production);
        mgr.lot_mut(lot_id)
            .unwrap()
            .record_production(ts(1), StorageAreaId(1), Decimal::from(50));

        let moved = mgr.convert_to_inventory(ts(2), lot_id).unwrap();
        assert_eq!(moved, Decimal::from(50));
        assert_eq!(mgr.lot(lot_id).unwrap().qty(), Decimal::ZERO);

        let on_hand = mgr.on_hand_lot(InventoryId(1));
        assert_eq!(mgr.lot(on_hand).unwrap().qty(), Decimal::from(50));
        // 總量守恆
        assert_eq!(mgr.total_qty(InventoryId(1)), Decimal::from(50));
    }

    #[test]
    fn test_store_partial_caps_and_clears_partial_qty() {
        let mut mgr = LotManager::new();
        let lot_id = mgr.create_lot(
            "LOT-P2".to_string(),
            InventoryId(1),
            LotSource::PartialProduction,
        );
        let lot = mgr.lot_mut(lot_id).unwrap();
        lot.record_production(ts(1), StorageAreaId(1), Decimal::from(30));
        lot.record_production(ts(2), StorageAreaId(2), Decimal::from(30));
        assert_eq!(lot.partial_qty(), Decimal::from(60));

        let moved = mgr.store_partial_in_inventory(ts(3), lot_id, Decimal::from(40)).unwrap();
        assert_eq!(moved, Decimal::from(40));
        assert_eq!(mgr.lot(lot_id).unwrap().partial_qty(), Decimal::from(20));
        assert_eq!(mgr.lot(lot_id).unwrap().qty(), Decimal::from(20));
    }

    #[test]
    fn test_validate_storage_area_delete() {
        let mut mgr = LotManager::new();
        let lot_id = mgr.create_lot("LOT-X".to_string(), InventoryId(1), LotSource::Purchase);
        mgr.lot_mut(lot_id)
            .unwrap()
            .set_storage_qty(StorageAreaId(7), Decimal::from(5));

        let area = StorageArea::new(StorageAreaId(7), "SA-07".to_string(), WarehouseId(1));
        let err = mgr.validate_storage_area_delete(&area).unwrap_err();
        assert_eq!(err.code(), "E_STORAGE_AREA_IN_USE");
        assert!(err.to_string().contains("LOT-X"));
        assert!(err.to_string().contains("SA-07"));

        // 抽乾後即可刪除
        mgr.issue_material(ts(1), lot_id, Decimal::from(5)).unwrap();
        assert!(mgr.validate_storage_area_delete(&area).is_ok());
    }

    #[test]
    fn test_register_skips_expired_material() {
        let mut mgr = LotManager::new();
        let fresh = mgr.create_lot("LOT-F".to_string(), InventoryId(1), LotSource::Purchase);
        mgr.lot_mut(fresh)
            .unwrap()
            .set_storage_qty(StorageAreaId(1), Decimal::from(10));

        let expired = mgr.import_lot(|id| {
            let mut lot = Lot::new(id, "LOT-E".to_string(), InventoryId(1), LotSource::Purchase)
                .with_shelf_life(ShelfLife::expiring_at(ts(3)));
            lot.set_storage_qty(StorageAreaId(1), Decimal::from(10));
            lot
        });
        assert!(mgr.lot(expired).unwrap().shelf_life.is_expired(ts(5)));

        assert_eq!(mgr.register_lots(ts(5), false), 1);
        assert_eq!(mgr.register_lots(ts(5), true), 2);

        let active: Vec<_> = mgr.active_storages(ts(5), false).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].0.external_id, "LOT-F");
    }
}
