//! 供應剖面
//!
//! 每個庫存記錄的時間序可用數量：來自批次帳的現有批次
//! （經合格批次代碼、儲區可達性與過期過濾）以及已排程的預計收貨。

use rust_decimal::Decimal;

use aps_core::{InventoryId, LotId, ReceiptKind, Scenario, StorageAreaId, Timestamp};

/// 供應來源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplySource {
    /// 批次在某儲區的現有數量
    Lot {
        lot_id: LotId,
        storage_area_id: StorageAreaId,
    },
    /// 預計收貨
    Receipt {
        kind: ReceiptKind,
        storage_area_id: StorageAreaId,
    },
}

/// 供應節點
#[derive(Debug, Clone)]
pub struct SupplyNode {
    /// 供應可得時間
    pub available_at: Timestamp,

    /// 數量（恆 ≥ 0）
    pub qty: Decimal,

    /// 供應來源
    pub source: SupplySource,
}

/// 供應剖面
///
/// 節點依可得時間非遞減排列；同一場景狀態重建必得相同節點序列。
#[derive(Debug, Clone)]
pub struct SupplyProfile {
    /// 所屬庫存記錄
    pub inventory_id: InventoryId,

    nodes: Vec<SupplyNode>,
}

impl SupplyProfile {
    /// 自批次帳與預計收貨建立供應剖面
    ///
    /// 只納入指定儲區集合內、合格且（依場景選項）未過期的批次數量，
    /// 以及計劃時界內落在指定儲區的預計收貨。
    pub fn build(
        scenario: &Scenario,
        inventory_id: InventoryId,
        storage_areas: &[StorageAreaId],
        allowed_lot_code: Option<&str>,
    ) -> Self {
        let mut nodes = Vec::new();

        for (lot, entry) in scenario
            .lots
            .active_storages(scenario.clock, scenario.options.save_expired_material)
        {
            if lot.inventory_id != inventory_id {
                continue;
            }
            if !storage_areas.contains(&entry.storage_area_id) {
                continue;
            }
            if !lot.is_eligible_for(allowed_lot_code) {
                continue;
            }
            if entry.qty > Decimal::ZERO {
                nodes.push(SupplyNode {
                    available_at: scenario.clock,
                    qty: entry.qty,
                    source: SupplySource::Lot {
                        lot_id: lot.id,
                        storage_area_id: entry.storage_area_id,
                    },
                });
            }
        }

        for receipt in scenario.receipts_for(inventory_id) {
            if !storage_areas.contains(&receipt.storage_area_id) {
                continue;
            }
            if !scenario.within_horizon(receipt.available_at) {
                continue;
            }
            if receipt.qty > Decimal::ZERO {
                nodes.push(SupplyNode {
                    available_at: receipt.available_at.max(scenario.clock),
                    qty: receipt.qty,
                    source: SupplySource::Receipt {
                        kind: receipt.kind,
                        storage_area_id: receipt.storage_area_id,
                    },
                });
            }
        }

        // 穩定排序維持建構順序的確定性
        nodes.sort_by_key(|n| n.available_at);

        Self {
            inventory_id,
            nodes,
        }
    }

    /// 供應節點
    pub fn nodes(&self) -> &[SupplyNode] {
        &self.nodes
    }

    /// 供應總量
    pub fn total_qty(&self) -> Decimal {
        self.nodes.iter().map(|n| n.qty).sum()
    }

    /// 截至指定時間的最大可用量
    ///
    /// 呼叫最小位移匹配前必須以此預檢供應充足性。
    pub fn max_available_qty(&self, until: Timestamp) -> Decimal {
        self.nodes
            .iter()
            .filter(|n| n.available_at <= until)
            .map(|n| n.qty)
            .sum()
    }

    /// 剖面是否為空
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
