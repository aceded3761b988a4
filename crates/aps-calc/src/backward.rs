//! 回推日期計算
//!
//! 將「物料可得時間」換算為對應的活動開始時間：耗用時點之前必須
//! 完成的活動時段，經外部產能排程器的反向搜尋自可得時間回推。

use aps_core::{
    Activity, CapacityScheduler, MaterialRequirement, Result, Scenario, Timestamp,
};

use crate::allocation::MaterialAllocationPlan;
use crate::demand_profile::MaterialDemandProfile;
use crate::matching::ShiftCalculator;
use crate::merge_retry;
use crate::supply_profile::SupplyProfile;

/// 回推日期計算器
pub struct BackwardCalculator;

impl BackwardCalculator {
    /// 由物料可得時間回推活動開始時間
    ///
    /// 傳給反向搜尋的必要產能形狀取決於耗用時點：例如後處理結束時
    /// 耗用，整備+生產+後處理的完整時段都必須在物料需要前排入。
    pub fn activity_start_for<C: CapacityScheduler>(
        capacity: &C,
        activity: &Activity,
        requirement: &MaterialRequirement,
        available_at: Timestamp,
        clock_floor: Timestamp,
    ) -> Option<Timestamp> {
        let span = activity.pre_consumption_span(requirement.timing);
        let result =
            capacity.find_capacity_reverse(activity.resource_id, clock_floor, available_at, span);
        if result.success {
            result.start
        } else {
            None
        }
    }

    /// 需求的重試時間：各計劃的物料可得時間取最小後回推
    ///
    /// 只考慮目前可用的計劃：受阻計劃的可行時間由其自身的重試時間
    /// 決定，呼叫端再以較近者合併。每個計劃的可得時間來自最小位移
    /// 匹配（供應總量不足以覆蓋未滿足需求的計劃先被預檢濾除）。
    pub fn requirement_retry_date<C: CapacityScheduler>(
        capacity: &C,
        scenario: &Scenario,
        activity: &Activity,
        requirement: &MaterialRequirement,
        plans: &[MaterialAllocationPlan],
        demand: &MaterialDemandProfile,
    ) -> Result<Option<Timestamp>> {
        let Some(first_demand) = demand.first_demand_at() else {
            return Ok(None);
        };

        let mut best: Option<Timestamp> = None;
        for plan in plans.iter().filter(|p| p.is_currently_valid() && !p.is_empty()) {
            let Some(inventory) =
                scenario.inventory_for_item(&requirement.item_id, plan.warehouse_id)
            else {
                continue;
            };
            let supply = SupplyProfile::build(
                scenario,
                inventory.id,
                &plan.storage_areas,
                requirement.allowed_lot_code.as_deref(),
            );

            // 最小位移匹配的前置契約：供應總量必須覆蓋需求
            if supply.total_qty() < demand.remaining_qty() {
                continue;
            }

            let shift = ShiftCalculator::earliest_start(&supply, demand)?;
            let available_at = first_demand + shift;
            let start =
                Self::activity_start_for(capacity, activity, requirement, available_at, scenario.clock);
            best = merge_retry(best, start);
        }

        Ok(best)
    }
}
