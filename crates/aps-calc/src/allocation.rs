//! 配置計劃
//!
//! 為一筆需求列舉可行的供應路徑：經連接器可達的儲區集合，或
//! 無連接器時直接可用的倉庫儲區。流量/產能不可行時記錄最近的
//! 重試時間而非直接丟棄。

use chrono::Duration;
use rust_decimal::Decimal;

use aps_core::{
    Activity, CapacityScheduler, ConnectorId, MaterialRequirement, Scenario, StorageArea,
    StorageAreaConnector, StorageAreaId, Timestamp, WarehouseId,
};

use crate::demand_profile::MaterialDemandProfile;
use crate::merge_retry;
use crate::supply_profile::SupplyProfile;

/// 配置計劃：一條候選供應路徑
#[derive(Debug, Clone)]
pub struct MaterialAllocationPlan {
    /// 供應倉庫
    pub warehouse_id: WarehouseId,

    /// 經過的連接器（None 表示無約束直接取用）
    pub connector_id: Option<ConnectorId>,

    /// 依序可用的儲區
    pub storage_areas: Vec<StorageAreaId>,

    /// 重試時間（None 表示目前可用）
    pub retry_date: Option<Timestamp>,

    /// 計劃時界內的最大可用量
    pub max_available_qty: Decimal,

    /// 是否精確命中需求釘選的供應來源
    pub exact_source_match: bool,
}

impl MaterialAllocationPlan {
    /// 計劃目前是否可用
    pub fn is_currently_valid(&self) -> bool {
        self.retry_date.is_none()
    }

    /// 空計劃沒有儲區、無法供應
    pub fn is_empty(&self) -> bool {
        self.storage_areas.is_empty()
    }
}

/// 配置計劃建構器
pub struct AllocationPlanner;

impl AllocationPlanner {
    /// 為需求建立全部候選計劃
    pub fn build_plans<C: CapacityScheduler>(
        scenario: &Scenario,
        requirement: &MaterialRequirement,
        activity: &Activity,
        capacity: &C,
        demand: &MaterialDemandProfile,
    ) -> Vec<MaterialAllocationPlan> {
        let window_from = demand.first_demand_at().unwrap_or(scenario.clock);
        let window_to = demand.last_demand_at().unwrap_or(scenario.clock);
        let qty = demand.remaining_qty();

        let warehouses: Vec<WarehouseId> = match requirement.warehouse_id {
            Some(id) => vec![id],
            None => scenario.warehouses_storing_item(&requirement.item_id),
        };

        let mut plans = Vec::new();
        for warehouse_id in warehouses {
            if scenario.inventory_for_item(&requirement.item_id, warehouse_id).is_none() {
                continue;
            }

            let connectors: Vec<&StorageAreaConnector> = scenario
                .connectors_for_consumer(activity.resource_id)
                .into_iter()
                .filter(|conn| {
                    conn.out_areas.iter().any(|area_id| {
                        scenario
                            .storage_area(*area_id)
                            .is_some_and(|area| area.warehouse_id == warehouse_id)
                    })
                })
                .collect();

            if connectors.is_empty() {
                // 無連接器 → 儲區直接可用（無約束計劃）
                if let Some(plan) = Self::build_plan(
                    scenario,
                    requirement,
                    capacity,
                    warehouse_id,
                    None,
                    &scenario
                        .areas_in_warehouse(warehouse_id)
                        .into_iter()
                        .map(|a| a.id)
                        .collect::<Vec<_>>(),
                    (window_from, window_to),
                    qty,
                ) {
                    plans.push(plan);
                }
            } else {
                for conn in connectors {
                    // 連接器流量不可行時記錄重試時間而非丟棄
                    let connector_retry = if conn.admits(window_from, window_to, qty) {
                        None
                    } else {
                        match conn.next_admission(window_from, window_to, qty) {
                            Some(at) => Some(at),
                            // 流量需求超過上限：永遠不可行
                            None => continue,
                        }
                    };

                    if let Some(mut plan) = Self::build_plan(
                        scenario,
                        requirement,
                        capacity,
                        warehouse_id,
                        Some(conn.id),
                        &conn.out_areas,
                        (window_from, window_to),
                        qty,
                    ) {
                        // 連接器與儲區是獨立的阻擋約束，較近者決定重試時間
                        plan.retry_date = merge_retry(connector_retry, plan.retry_date);
                        plans.push(plan);
                    }
                }
            }
        }

        plans
    }

    /// 建立單一計劃：逐儲區驗證並收斂重試時間
    #[allow(clippy::too_many_arguments)]
    fn build_plan<C: CapacityScheduler>(
        scenario: &Scenario,
        requirement: &MaterialRequirement,
        capacity: &C,
        warehouse_id: WarehouseId,
        connector_id: Option<ConnectorId>,
        candidate_areas: &[StorageAreaId],
        window: (Timestamp, Timestamp),
        qty: Decimal,
    ) -> Option<MaterialAllocationPlan> {
        let mut storage_areas = Vec::new();
        let mut area_retry: Option<Timestamp> = None;

        for &area_id in candidate_areas {
            let Some(area) = scenario.storage_area(area_id) else {
                continue;
            };
            if area.warehouse_id != warehouse_id {
                continue;
            }
            if !scenario.area_stores_item(area_id, &requirement.item_id) {
                continue;
            }
            if let Some(pinned) = requirement.storage_area_id {
                if pinned != area_id {
                    continue;
                }
            }
            if !area.admits_outflow(qty) {
                continue;
            }

            match Self::check_area_resource(capacity, area, window) {
                Ok(()) => storage_areas.push(area_id),
                // 資源窗口不可行：記錄最早重試時間而非硬性失敗
                Err(retry) => area_retry = merge_retry(area_retry, retry),
            }
        }

        let retry_date = if storage_areas.is_empty() {
            // 沒有可用儲區：計劃受阻，重試時間取儲區候選的最早值
            area_retry?;
            area_retry
        } else {
            None
        };

        let inventory = scenario.inventory_for_item(&requirement.item_id, warehouse_id)?;
        let supply = SupplyProfile::build(
            scenario,
            inventory.id,
            &storage_areas,
            requirement.allowed_lot_code.as_deref(),
        );

        let exact_source_match = requirement
            .storage_area_id
            .map(|pinned| storage_areas.contains(&pinned))
            .unwrap_or(false);

        Some(MaterialAllocationPlan {
            warehouse_id,
            connector_id,
            storage_areas,
            retry_date,
            max_available_qty: supply.max_available_qty(scenario.horizon_end),
            exact_source_match,
        })
    }

    /// 資源綁定儲區的轉移窗口檢查
    fn check_area_resource<C: CapacityScheduler>(
        capacity: &C,
        area: &StorageArea,
        window: (Timestamp, Timestamp),
    ) -> std::result::Result<(), Option<Timestamp>> {
        let Some(resource_id) = area.resource_id else {
            return Ok(());
        };

        let duration = (window.1 - window.0).max(Duration::zero());
        let result = capacity.find_capacity(resource_id, window.0, duration);
        if result.success {
            Ok(())
        } else {
            Err(result.next_start)
        }
    }

    /// 排序計劃：精確來源優先，其次最大可用量遞減；
    /// 等值時以（連接器、倉庫、儲區）穩定決定順序
    pub fn order_plans(plans: &mut [MaterialAllocationPlan]) {
        plans.sort_by(|a, b| {
            b.exact_source_match
                .cmp(&a.exact_source_match)
                .then(b.max_available_qty.cmp(&a.max_available_qty))
                .then(a.connector_id.cmp(&b.connector_id))
                .then(a.warehouse_id.cmp(&b.warehouse_id))
                .then(a.storage_areas.cmp(&b.storage_areas))
        });
    }

    /// 全部計劃中最早的阻擋重試時間
    pub fn earliest_retry(plans: &[MaterialAllocationPlan]) -> Option<Timestamp> {
        plans
            .iter()
            .filter_map(|p| p.retry_date)
            .min()
    }
}
