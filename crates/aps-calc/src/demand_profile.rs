//! 需求剖面
//!
//! 依活動排程與耗用時點政策，將需求數量分解為時間序上的需求節點；
//! 配置記錄寫回節點，剖面為每次判定重建的暫時結構。

use rust_decimal::Decimal;
use uuid::Uuid;

use aps_core::{
    Activity, Inventory, InventoryId, MaterialRequirement, ScenarioOptions, StorageAreaId,
    Timestamp,
};

/// 配置來源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationSource {
    /// 自儲區供應
    Storage(StorageAreaId),
    /// 提前期後援（供應於 時鐘+提前期 可得）
    LeadTime(InventoryId),
    /// 超出計劃時界的最後手段配置
    PastHorizon,
    /// 接受的缺料
    Shortage,
}

/// 一筆配置記錄
#[derive(Debug, Clone)]
pub struct Allocation {
    /// 供應可得時間
    pub available_at: Timestamp,

    /// 配置數量
    pub qty: Decimal,

    /// 配置來源
    pub source: AllocationSource,
}

/// 需求節點
#[derive(Debug, Clone)]
pub struct DemandNode {
    /// 需求時間
    pub at: Timestamp,

    /// 需求數量
    pub qty: Decimal,

    allocations: Vec<Allocation>,
}

impl DemandNode {
    fn new(at: Timestamp, qty: Decimal) -> Self {
        Self {
            at,
            qty,
            allocations: Vec::new(),
        }
    }

    /// 已配置數量
    pub fn allocated_qty(&self) -> Decimal {
        self.allocations.iter().map(|a| a.qty).sum()
    }

    /// 未滿足數量
    pub fn remaining(&self) -> Decimal {
        (self.qty - self.allocated_qty()).max(Decimal::ZERO)
    }

    /// 配置記錄
    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    /// 配置數量（以未滿足數量為上限），回傳實際接受量
    fn allocate(&mut self, available_at: Timestamp, qty: Decimal, source: AllocationSource) -> Decimal {
        let accepted = qty.min(self.remaining());
        if accepted > Decimal::ZERO {
            self.allocations.push(Allocation {
                available_at,
                qty: accepted,
                source,
            });
        }
        accepted
    }
}

/// 物料需求剖面
///
/// 節點依日期非遞減排列；同一輸入重建必得相同節點序列。
#[derive(Debug, Clone)]
pub struct MaterialDemandProfile {
    /// 來源需求ID
    pub requirement_id: Uuid,

    /// 物料ID
    pub item_id: String,

    /// 合格批次代碼過濾
    pub allowed_lot_code: Option<String>,

    nodes: Vec<DemandNode>,
}

impl MaterialDemandProfile {
    /// 依（需求、活動、場景選項）建立需求剖面
    pub fn build(
        requirement: &MaterialRequirement,
        activity: &Activity,
        options: &ScenarioOptions,
    ) -> Self {
        let times = activity.consumption_times(requirement.timing);

        let mut nodes = Vec::with_capacity(times.len());
        if times.len() <= 1 {
            let at = times.first().copied().unwrap_or(activity.scheduled_start);
            nodes.push(DemandNode::new(at, requirement.qty));
        } else {
            // 逐週期平均分解；捨入差額由最後一個節點吸收
            let count = Decimal::from(times.len() as u64);
            let per_node = options.round_qty(requirement.qty / count);
            let mut assigned = Decimal::ZERO;
            for (i, &at) in times.iter().enumerate() {
                let qty = if i + 1 == times.len() {
                    requirement.qty - assigned
                } else {
                    per_node
                };
                assigned += qty;
                nodes.push(DemandNode::new(at, qty));
            }
        }

        Self {
            requirement_id: requirement.id,
            item_id: requirement.item_id.clone(),
            allowed_lot_code: requirement.allowed_lot_code.clone(),
            nodes,
        }
    }

    /// 需求節點
    pub fn nodes(&self) -> &[DemandNode] {
        &self.nodes
    }

    /// 第一個需求時間
    pub fn first_demand_at(&self) -> Option<Timestamp> {
        self.nodes.first().map(|n| n.at)
    }

    /// 最後一個需求時間
    pub fn last_demand_at(&self) -> Option<Timestamp> {
        self.nodes.last().map(|n| n.at)
    }

    /// 總需求量
    pub fn total_qty(&self) -> Decimal {
        self.nodes.iter().map(|n| n.qty).sum()
    }

    /// 已配置總量
    pub fn allocated_qty(&self) -> Decimal {
        self.nodes.iter().map(|n| n.allocated_qty()).sum()
    }

    /// 未滿足總量
    pub fn remaining_qty(&self) -> Decimal {
        self.nodes.iter().map(|n| n.remaining()).sum()
    }

    /// 是否已滿足：每個節點的累積配置都覆蓋累積需求
    pub fn is_satisfied(&self) -> bool {
        self.nodes.iter().all(|n| n.remaining() == Decimal::ZERO)
    }

    /// 全部配置中最晚的供應可得時間
    ///
    /// 提前期後援會使可得時間晚於需求時間；活動開始日期據此回推。
    pub fn available_date(&self) -> Option<Timestamp> {
        self.nodes
            .iter()
            .flat_map(|n| n.allocations.iter())
            .map(|a| a.available_at)
            .max()
    }

    /// 清除所有配置（換下一個計劃重試前呼叫）
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.allocations.clear();
        }
    }

    /// 對指定節點配置數量，回傳實際接受量
    pub fn allocate_to(
        &mut self,
        node_index: usize,
        available_at: Timestamp,
        qty: Decimal,
        source: AllocationSource,
    ) -> Decimal {
        match self.nodes.get_mut(node_index) {
            Some(node) => node.allocate(available_at, qty, source),
            None => Decimal::ZERO,
        }
    }

    /// 提前期後援：以 時鐘+提前期 的無約束供應補足所有未滿足節點
    pub fn allocate_remaining_from_lead_time(&mut self, inventory: &Inventory, clock: Timestamp) {
        let available_at = clock + inventory.lead_time();
        for node in &mut self.nodes {
            let remaining = node.remaining();
            if remaining > Decimal::ZERO {
                node.allocate(available_at, remaining, AllocationSource::LeadTime(inventory.id));
            }
        }
    }

    /// 超出計劃時界的需求節點允許最後手段配置
    pub fn allocate_past_horizon(&mut self, horizon_end: Timestamp) {
        for node in &mut self.nodes {
            if node.at > horizon_end {
                let remaining = node.remaining();
                if remaining > Decimal::ZERO {
                    node.allocate(node.at, remaining, AllocationSource::PastHorizon);
                }
            }
        }
    }

    /// 以缺料配置補足所有未滿足節點，回傳缺料總量
    pub fn allocate_shortage(&mut self, at: Timestamp) -> Decimal {
        let mut total = Decimal::ZERO;
        for node in &mut self.nodes {
            let remaining = node.remaining();
            if remaining > Decimal::ZERO {
                node.allocate(at, remaining, AllocationSource::Shortage);
                total += remaining;
            }
        }
        total
    }

    /// 缺料配置總量
    pub fn shortage_qty(&self) -> Decimal {
        self.nodes
            .iter()
            .flat_map(|n| n.allocations.iter())
            .filter(|a| a.source == AllocationSource::Shortage)
            .map(|a| a.qty)
            .sum()
    }
}
