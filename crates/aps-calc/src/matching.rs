//! 最小位移供需匹配
//!
//! 給定時間序的供應與需求，計算最小位移 S，使每個需求前綴的
//! 累積供應在 `需求時間 + S` 前到位。單次正向串流掃描，O(n+m)。

use chrono::Duration;
use rust_decimal::Decimal;

use aps_core::{ApsError, Result, Timestamp};

use crate::demand_profile::MaterialDemandProfile;
use crate::supply_profile::SupplyProfile;

/// 最小位移計算器
pub struct ShiftCalculator;

impl ShiftCalculator {
    /// 計算最小位移
    ///
    /// 兩個序列都必須依時間非遞減排列。對每個需求節點推進供應游標
    /// 累積供應至覆蓋累積需求；該前綴的候選位移為
    /// `供應到位時間 - 需求時間`，答案為所有前綴候選位移的最大值
    /// （永不為負）。
    ///
    /// 供應總量耗盡仍未覆蓋累積需求屬於呼叫端契約違反
    /// （必須先以 `max_available_qty` 預檢），回報為不可恢復的
    /// 內部錯誤而非可重試結果。
    pub fn earliest_demand_start(
        supply: &[(Timestamp, Decimal)],
        demand: &[(Timestamp, Decimal)],
    ) -> Result<Duration> {
        let mut shift = Duration::zero();
        let mut supply_cursor = 0;
        let mut cum_supply = Decimal::ZERO;
        let mut cum_demand = Decimal::ZERO;
        let mut reached_at: Option<Timestamp> = None;

        for &(demand_at, demand_qty) in demand {
            cum_demand += demand_qty;

            while cum_supply < cum_demand {
                match supply.get(supply_cursor) {
                    Some(&(supply_at, supply_qty)) => {
                        cum_supply += supply_qty;
                        reached_at = Some(supply_at);
                        supply_cursor += 1;
                    }
                    None => return Err(ApsError::InsufficientSupply),
                }
            }

            if cum_demand > Decimal::ZERO {
                if let Some(reached) = reached_at {
                    let candidate = reached - demand_at;
                    if candidate > shift {
                        shift = candidate;
                    }
                }
            }
        }

        Ok(shift)
    }

    /// 剖面包裝：以需求節點的未滿足量對供應剖面計算最小位移
    pub fn earliest_start(
        supply: &SupplyProfile,
        demand: &MaterialDemandProfile,
    ) -> Result<Duration> {
        let supply_nodes: Vec<(Timestamp, Decimal)> = supply
            .nodes()
            .iter()
            .map(|n| (n.available_at, n.qty))
            .collect();
        let demand_nodes: Vec<(Timestamp, Decimal)> = demand
            .nodes()
            .iter()
            .map(|n| (n.at, n.remaining()))
            .collect();
        Self::earliest_demand_start(&supply_nodes, &demand_nodes)
    }
}
