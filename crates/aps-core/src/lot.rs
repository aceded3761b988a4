//! 批次模型
//!
//! 批次（Lot）是可追溯的離散物料批量：記錄其來源、保存期限/損耗屬性、
//! 在各儲區的分佈，以及僅追加的調整歷史。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{InventoryId, LotId, StorageAreaId, Timestamp};
use crate::{ApsError, Result};

/// 批次來源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotSource {
    /// 現有庫存（每個庫存記錄一個合成批次）
    OnHand,
    /// 生產完工
    Production,
    /// 部分完工（逐步累積數量）
    PartialProduction,
    /// 採購入庫
    Purchase,
    /// 調撥入庫
    Transfer,
}

/// 保存期限與損耗屬性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfLife {
    /// 到期時間（設定後批次即為可過期批次）
    pub expires_at: Option<Timestamp>,

    /// 損耗預算（None 表示不追蹤損耗）
    pub wear_budget: Option<Decimal>,
}

impl ShelfLife {
    /// 無保存期限
    pub fn none() -> Self {
        Self {
            expires_at: None,
            wear_budget: None,
        }
    }

    /// 建構器模式：設置到期時間
    pub fn expiring_at(expires_at: Timestamp) -> Self {
        Self {
            expires_at: Some(expires_at),
            wear_budget: None,
        }
    }

    /// 建構器模式：設置損耗預算
    pub fn with_wear_budget(mut self, budget: Decimal) -> Self {
        self.wear_budget = Some(budget);
        self
    }

    /// 是否為可過期批次
    pub fn is_expirable(&self) -> bool {
        self.expires_at.is_some()
    }

    /// 在指定時間是否已過期
    pub fn is_expired(&self, now: Timestamp) -> bool {
        matches!(self.expires_at, Some(t) if t <= now)
    }
}

impl Default for ShelfLife {
    fn default() -> Self {
        Self::none()
    }
}

/// 單一儲區內的批次數量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotStorage {
    /// 儲區ID
    pub storage_area_id: StorageAreaId,

    /// 數量（恆 ≥ 0）
    pub qty: Decimal,
}

/// 批次的儲區分佈
///
/// 有序集合；耗用時依序抽取，每個儲區在集合中至多出現一次。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LotStorageProfile {
    entries: Vec<LotStorage>,
}

impl LotStorageProfile {
    /// 創建空的分佈
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有分佈項目（依耗用順序）
    pub fn entries(&self) -> &[LotStorage] {
        &self.entries
    }

    /// 總數量 = 各儲區數量之和
    pub fn total_qty(&self) -> Decimal {
        self.entries.iter().map(|e| e.qty).sum()
    }

    /// 指定儲區內的數量
    pub fn qty_in(&self, storage_area_id: StorageAreaId) -> Decimal {
        self.entries
            .iter()
            .find(|e| e.storage_area_id == storage_area_id)
            .map(|e| e.qty)
            .unwrap_or(Decimal::ZERO)
    }

    /// 覆寫儲區數量（匯入/更新流程）
    pub fn set_qty(&mut self, storage_area_id: StorageAreaId, qty: Decimal) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.storage_area_id == storage_area_id)
        {
            Some(entry) => entry.qty = qty,
            None => self.entries.push(LotStorage {
                storage_area_id,
                qty,
            }),
        }
        self.entries.retain(|e| e.qty > Decimal::ZERO);
    }

    /// 累加儲區數量（生產流程）
    pub fn add_qty(&mut self, storage_area_id: StorageAreaId, qty: Decimal) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.storage_area_id == storage_area_id)
        {
            Some(entry) => entry.qty += qty,
            None => self.entries.push(LotStorage {
                storage_area_id,
                qty,
            }),
        }
        self.entries.retain(|e| e.qty > Decimal::ZERO);
    }

    /// 依序耗用數量，回傳實際耗用量與各儲區耗用明細
    ///
    /// 超過總量時抽乾所有項目即停止，總量不會為負。
    pub fn issue(&mut self, qty: Decimal) -> (Decimal, Vec<(StorageAreaId, Decimal)>) {
        let mut remaining = qty;
        let mut drained = Vec::new();

        for entry in &mut self.entries {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = entry.qty.min(remaining);
            if take > Decimal::ZERO {
                entry.qty -= take;
                remaining -= take;
                drained.push((entry.storage_area_id, take));
            }
        }

        self.entries.retain(|e| e.qty > Decimal::ZERO);
        (qty - remaining, drained)
    }

    /// 從指定儲區耗用數量，回傳實際耗用量
    pub fn take_from(&mut self, storage_area_id: StorageAreaId, qty: Decimal) -> Decimal {
        let taken = match self
            .entries
            .iter_mut()
            .find(|e| e.storage_area_id == storage_area_id)
        {
            Some(entry) => {
                let take = entry.qty.min(qty);
                entry.qty -= take;
                take
            }
            None => Decimal::ZERO,
        };
        self.entries.retain(|e| e.qty > Decimal::ZERO);
        taken
    }

    /// 是否引用指定儲區
    pub fn references(&self, storage_area_id: StorageAreaId) -> bool {
        self.entries
            .iter()
            .any(|e| e.storage_area_id == storage_area_id)
    }

    /// 分佈是否為空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 批次調整類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotAdjustmentKind {
    /// 生產入庫
    Production,
    /// 耗用出庫
    Consumption,
    /// 調撥入庫
    Transfer,
}

/// 批次調整記錄（僅追加）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotAdjustment {
    /// 調整ID
    pub id: Uuid,

    /// 調整類型
    pub kind: LotAdjustmentKind,

    /// 調整時間
    pub at: Timestamp,

    /// 儲區
    pub storage_area_id: StorageAreaId,

    /// 數量（恆為正值；方向由類型決定）
    pub qty: Decimal,
}

/// 批次
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    /// 批次ID
    pub id: LotId,

    /// 外部識別碼（驗證訊息與追溯使用）
    pub external_id: String,

    /// 所屬庫存記錄
    pub inventory_id: InventoryId,

    /// 批次來源
    source: LotSource,

    /// 生產時間
    pub produced_at: Option<Timestamp>,

    /// 保存期限與損耗
    pub shelf_life: ShelfLife,

    /// 批次代碼（合格批次限制使用）
    code: Option<String>,

    /// 啟用後，未用數量僅供指定此代碼的需求使用
    limit_to_eligible_lots: bool,

    /// 部分完工累積數量
    partial_qty: Decimal,

    /// 儲區分佈
    storages: LotStorageProfile,

    /// 調整歷史
    adjustments: Vec<LotAdjustment>,
}

impl Lot {
    /// 創建新的批次
    pub fn new(id: LotId, external_id: String, inventory_id: InventoryId, source: LotSource) -> Self {
        Self {
            id,
            external_id,
            inventory_id,
            source,
            produced_at: None,
            shelf_life: ShelfLife::none(),
            code: None,
            limit_to_eligible_lots: false,
            partial_qty: Decimal::ZERO,
            storages: LotStorageProfile::new(),
            adjustments: Vec::new(),
        }
    }

    /// 建構器模式：設置批次代碼
    pub fn with_code(mut self, code: String) -> Self {
        self.code = Some(code);
        self
    }

    /// 建構器模式：設置保存期限
    pub fn with_shelf_life(mut self, shelf_life: ShelfLife) -> Self {
        self.shelf_life = shelf_life;
        self
    }

    /// 建構器模式：設置生產時間
    pub fn with_produced_at(mut self, produced_at: Timestamp) -> Self {
        self.produced_at = Some(produced_at);
        self
    }

    /// 批次總數量 = 儲區分佈之和
    pub fn qty(&self) -> Decimal {
        self.storages.total_qty()
    }

    /// 批次來源
    pub fn source(&self) -> LotSource {
        self.source
    }

    /// 變更批次來源
    ///
    /// 離開部分完工狀態時清除已累積的部分完工數量。
    pub fn set_source(&mut self, source: LotSource) {
        if self.source == LotSource::PartialProduction && source != LotSource::PartialProduction {
            self.partial_qty = Decimal::ZERO;
        }
        self.source = source;
    }

    /// 批次代碼
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// 是否啟用合格批次限制
    pub fn limit_to_eligible_lots(&self) -> bool {
        self.limit_to_eligible_lots
    }

    /// 啟用/停用合格批次限制（啟用時必須已設定批次代碼）
    pub fn set_limit_to_eligible_lots(&mut self, limit: bool) -> Result<()> {
        if limit && self.code.is_none() {
            return Err(ApsError::EligibleLotCodeMissing {
                lot: self.external_id.clone(),
            });
        }
        self.limit_to_eligible_lots = limit;
        Ok(())
    }

    /// 檢查批次是否可供指定批次代碼的需求使用
    ///
    /// 需求指定代碼時批次代碼必須相符；批次啟用合格批次限制而
    /// 需求未指定相符代碼時，該批次不可用。
    pub fn is_eligible_for(&self, allowed_code: Option<&str>) -> bool {
        match allowed_code {
            Some(code) => self.code.as_deref() == Some(code),
            None => !self.limit_to_eligible_lots,
        }
    }

    /// 部分完工累積數量
    pub fn partial_qty(&self) -> Decimal {
        self.partial_qty
    }

    /// 儲區分佈
    pub fn storages(&self) -> &LotStorageProfile {
        &self.storages
    }

    /// 覆寫儲區數量（匯入/更新流程）
    pub fn set_storage_qty(&mut self, storage_area_id: StorageAreaId, qty: Decimal) {
        self.storages.set_qty(storage_area_id, qty);
    }

    /// 累加儲區數量（不記錄調整；生產入庫請用 `record_production`）
    pub fn add_storage_qty(&mut self, storage_area_id: StorageAreaId, qty: Decimal) {
        self.storages.add_qty(storage_area_id, qty);
    }

    /// 調整歷史
    pub fn adjustments(&self) -> &[LotAdjustment] {
        &self.adjustments
    }

    /// 記錄生產入庫：累加儲區數量並追加調整記錄
    pub fn record_production(&mut self, at: Timestamp, storage_area_id: StorageAreaId, qty: Decimal) {
        self.storages.add_qty(storage_area_id, qty);
        if self.source == LotSource::PartialProduction {
            self.partial_qty += qty;
        }
        self.adjustments.push(LotAdjustment {
            id: Uuid::new_v4(),
            kind: LotAdjustmentKind::Production,
            at,
            storage_area_id,
            qty,
        });
    }

    /// 記錄調撥入庫
    pub fn record_transfer(&mut self, at: Timestamp, storage_area_id: StorageAreaId, qty: Decimal) {
        self.storages.add_qty(storage_area_id, qty);
        self.adjustments.push(LotAdjustment {
            id: Uuid::new_v4(),
            kind: LotAdjustmentKind::Transfer,
            at,
            storage_area_id,
            qty,
        });
    }

    /// 依序耗用數量並記錄調整，回傳實際耗用量
    ///
    /// 呼叫端必須先以 `qty()` 預檢；超量時抽乾即止，不會為負。
    pub fn issue(&mut self, at: Timestamp, qty: Decimal) -> Decimal {
        let (issued, drained) = self.storages.issue(qty);
        for (storage_area_id, taken) in drained {
            self.adjustments.push(LotAdjustment {
                id: Uuid::new_v4(),
                kind: LotAdjustmentKind::Consumption,
                at,
                storage_area_id,
                qty: taken,
            });
        }
        issued
    }

    /// 從指定儲區耗用數量並記錄調整，回傳實際耗用量
    pub fn take_from(&mut self, at: Timestamp, storage_area_id: StorageAreaId, qty: Decimal) -> Decimal {
        let taken = self.storages.take_from(storage_area_id, qty);
        if taken > Decimal::ZERO {
            self.adjustments.push(LotAdjustment {
                id: Uuid::new_v4(),
                kind: LotAdjustmentKind::Consumption,
                at,
                storage_area_id,
                qty: taken,
            });
        }
        taken
    }

    /// 重播調整歷史，計算截至指定時間各儲區的生產淨額
    ///
    /// 生產與調撥入庫累加、耗用出庫扣減（下限為零）；
    /// 儲區順序為調整歷史中首次出現的順序。
    pub fn production_distribution(&self, up_to: Timestamp) -> Vec<(StorageAreaId, Decimal)> {
        let mut dist: Vec<(StorageAreaId, Decimal)> = Vec::new();

        for adj in self.adjustments.iter().filter(|a| a.at <= up_to) {
            match dist.iter_mut().find(|(area, _)| *area == adj.storage_area_id) {
                Some((_, qty)) => match adj.kind {
                    LotAdjustmentKind::Production | LotAdjustmentKind::Transfer => *qty += adj.qty,
                    LotAdjustmentKind::Consumption => *qty = (*qty - adj.qty).max(Decimal::ZERO),
                },
                None => {
                    let qty = match adj.kind {
                        LotAdjustmentKind::Production | LotAdjustmentKind::Transfer => adj.qty,
                        LotAdjustmentKind::Consumption => Decimal::ZERO,
                    };
                    dist.push((adj.storage_area_id, qty));
                }
            }
        }

        dist.retain(|(_, qty)| *qty > Decimal::ZERO);
        dist
    }

    /// 計算完工轉庫存的分佈（全部生產淨額）
    pub fn convert_to_inventory(&self, produced_at: Timestamp) -> Vec<(StorageAreaId, Decimal)> {
        self.production_distribution(produced_at)
    }

    /// 計算部分完工轉庫存的分佈
    ///
    /// 依調整歷史順序走訪生產入庫記錄，分配達到請求數量即停止。
    pub fn store_partial_in_inventory(
        &self,
        produced_at: Timestamp,
        qty_moving: Decimal,
    ) -> Vec<(StorageAreaId, Decimal)> {
        let mut dist: Vec<(StorageAreaId, Decimal)> = Vec::new();
        let mut remaining = qty_moving;

        for adj in self
            .adjustments
            .iter()
            .filter(|a| a.at <= produced_at && a.kind == LotAdjustmentKind::Production)
        {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = adj.qty.min(remaining);
            remaining -= take;
            match dist.iter_mut().find(|(area, _)| *area == adj.storage_area_id) {
                Some((_, qty)) => *qty += take,
                None => dist.push((adj.storage_area_id, take)),
            }
        }

        dist
    }

    /// 清除部分完工累積數量（部分轉庫存後呼叫）
    pub fn clear_partial_qty(&mut self, moved: Decimal) {
        self.partial_qty = (self.partial_qty - moved).max(Decimal::ZERO);
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

    fn make_lot() -> Lot {
        Lot::new(LotId(1), "LOT-001".to_string(), InventoryId(1), LotSource::Production)
    }

    #[test]
    fn test_qty_is_sum_of_storages() {
        let mut lot = make_lot();
        lot.set_storage_qty(StorageAreaId(1), Decimal::from(60));
        lot.set_storage_qty(StorageAreaId(2), Decimal::from(40));

        assert_eq!(lot.qty(), Decimal::from(100));
        assert_eq!(lot.storages().qty_in(StorageAreaId(1)), Decimal::from(60));
    }

    #[test]
    fn test_issue_drains_in_order_and_conserves() {
        let mut lot = make_lot();
        lot.set_storage_qty(StorageAreaId(1), Decimal::from(30));
        lot.set_storage_qty(StorageAreaId(2), Decimal::from(20));

        let before = lot.qty();
        let issued = lot.issue(ts(1), Decimal::from(40));

        // 先抽乾第一個儲區，再從第二個儲區抽取
        assert_eq!(issued, Decimal::from(40));
        assert_eq!(lot.storages().qty_in(StorageAreaId(1)), Decimal::ZERO);
        assert_eq!(lot.storages().qty_in(StorageAreaId(2)), Decimal::from(10));
        assert_eq!(lot.qty(), before - issued);
    }

    #[test]
    fn test_issue_never_goes_negative() {
        let mut lot = make_lot();
        lot.set_storage_qty(StorageAreaId(1), Decimal::from(25));

        let before = lot.qty();
        let issued = lot.issue(ts(1), Decimal::from(100));

        assert_eq!(issued, Decimal::from(25));
        assert_eq!(lot.qty(), before - before.min(Decimal::from(100)));
        assert_eq!(lot.qty(), Decimal::ZERO);
    }

    #[test]
    fn test_set_vs_add_semantics() {
        let mut lot = make_lot();

        // 匯入流程覆寫
        lot.set_storage_qty(StorageAreaId(1), Decimal::from(50));
        lot.set_storage_qty(StorageAreaId(1), Decimal::from(30));
        assert_eq!(lot.qty(), Decimal::from(30));

        // 生產流程累加
        lot.add_storage_qty(StorageAreaId(1), Decimal::from(30));
        assert_eq!(lot.qty(), Decimal::from(60));
    }

    #[test]
    fn test_source_change_clears_partial_qty() {
        let mut lot = Lot::new(
            LotId(2),
            "LOT-002".to_string(),
            InventoryId(1),
            LotSource::PartialProduction,
        );
        lot.record_production(ts(1), StorageAreaId(1), Decimal::from(15));
        assert_eq!(lot.partial_qty(), Decimal::from(15));

        lot.set_source(LotSource::Production);
        assert_eq!(lot.partial_qty(), Decimal::ZERO);
    }

    #[test]
    fn test_limit_requires_code() {
        let mut lot = make_lot();
        let err = lot.set_limit_to_eligible_lots(true).unwrap_err();
        assert_eq!(err.code(), "E_ELIGIBLE_LOT_CODE_MISSING");

        let mut coded = make_lot().with_code("A".to_string());
        coded.set_limit_to_eligible_lots(true).unwrap();
        assert!(coded.limit_to_eligible_lots());
    }

    #[test]
    fn test_eligibility() {
        let mut lot = make_lot().with_code("A".to_string());
        assert!(lot.is_eligible_for(Some("A")));
        assert!(!lot.is_eligible_for(Some("B")));
        assert!(lot.is_eligible_for(None));

        lot.set_limit_to_eligible_lots(true).unwrap();
        assert!(lot.is_eligible_for(Some("A")));
        assert!(!lot.is_eligible_for(None));
    }

    #[test]
    fn test_convert_replays_adjustments() {
        let mut lot = make_lot();
        lot.record_production(ts(1), StorageAreaId(1), Decimal::from(40));
        lot.record_production(ts(2), StorageAreaId(2), Decimal::from(20));
        lot.take_from(ts(3), StorageAreaId(1), Decimal::from(10));

        let dist = lot.convert_to_inventory(ts(5));
        assert_eq!(dist.len(), 2);
        assert_eq!(dist[0], (StorageAreaId(1), Decimal::from(30)));
        assert_eq!(dist[1], (StorageAreaId(2), Decimal::from(20)));

        // 截止時間之後的調整不計入
        let early = lot.convert_to_inventory(ts(1));
        assert_eq!(early, vec![(StorageAreaId(1), Decimal::from(40))]);
    }

    #[test]
    fn test_store_partial_stops_at_requested_qty() {
        let mut lot = Lot::new(
            LotId(3),
            "LOT-003".to_string(),
            InventoryId(1),
            LotSource::PartialProduction,
        );
        lot.record_production(ts(1), StorageAreaId(1), Decimal::from(30));
        lot.record_production(ts(2), StorageAreaId(2), Decimal::from(30));

        let dist = lot.store_partial_in_inventory(ts(5), Decimal::from(40));
        assert_eq!(dist[0], (StorageAreaId(1), Decimal::from(30)));
        assert_eq!(dist[1], (StorageAreaId(2), Decimal::from(10)));

        let total: Decimal = dist.iter().map(|(_, q)| *q).sum();
        assert_eq!(total, Decimal::from(40));
    }

    #[test]
    fn test_shelf_life() {
        let fresh = ShelfLife::none();
        assert!(!fresh.is_expirable());
        assert!(!fresh.is_expired(ts(10)));

        let expiring = ShelfLife::expiring_at(ts(3));
        assert!(expiring.is_expirable());
        assert!(!expiring.is_expired(ts(2)));
        assert!(expiring.is_expired(ts(3)));
        assert!(expiring.is_expired(ts(5)));

        let worn = ShelfLife::expiring_at(ts(3)).with_wear_budget(Decimal::from(12));
        assert_eq!(worn.wear_budget, Some(Decimal::from(12)));
    }
}
