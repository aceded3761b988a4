//! 物料可用性判定主流程
//!
//! 對活動的每筆物料需求：建立需求剖面、嘗試各配置計劃的全量配置，
//! 不足時依序套用提前期、時界外與缺料政策；全部失敗時計算重試時間。
//! 可行性結果以資料值傳遞，不是錯誤。
//!
//! 批次耗用與連接器流量在整組需求全部滿足後才提交：任一需求失敗
//! 即短路，場景狀態保持不變，呼叫端不早於重試時間重試整個活動。

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use aps_core::{
    Activity, CapacityScheduler, LotId, MaterialRequirement, Result, Scenario, StorageAreaId,
    Timestamp,
};

use crate::allocation::{AllocationPlanner, MaterialAllocationPlan};
use crate::backward::BackwardCalculator;
use crate::demand_profile::{AllocationSource, MaterialDemandProfile};
use crate::supply_profile::{SupplyProfile, SupplySource};
use crate::{merge_retry, FindMaterialResult, MaterialShortage};

/// 批次抽取記錄（提交時寫回批次帳）
#[derive(Debug, Clone)]
struct LotDraw {
    lot_id: LotId,
    storage_area_id: StorageAreaId,
    qty: Decimal,
}

/// 同一次判定中已抽取但尚未提交的批次數量
type DrawOverlay = BTreeMap<(LotId, StorageAreaId), Decimal>;

/// 待提交的配置：計劃、抽取明細與連接器流量窗口
struct PendingCommit {
    plan: MaterialAllocationPlan,
    draws: Vec<LotDraw>,
    window: (Timestamp, Timestamp),
}

/// 單筆需求的判定結果
enum RequirementOutcome {
    Satisfied {
        profile: MaterialDemandProfile,
        shortage: Option<MaterialShortage>,
        commit: Option<PendingCommit>,
    },
    Deferred {
        retry_date: Option<Timestamp>,
    },
}

/// 物料可用性判定器
pub struct MaterialResolver<'a, C: CapacityScheduler> {
    capacity: &'a C,
}

impl<'a, C: CapacityScheduler> MaterialResolver<'a, C> {
    /// 創建新的判定器
    pub fn new(capacity: &'a C) -> Self {
        Self { capacity }
    }

    /// 物料可用性判定主入口
    ///
    /// 逐筆處理活動的物料需求；任一需求失敗即短路整組需求，
    /// 回傳第一個失敗的物料與重試時間，呼叫端稍後重試整個活動。
    pub fn find_available_material(
        &self,
        scenario: &mut Scenario,
        activity: &Activity,
        requirements: &[MaterialRequirement],
        originates_from_import: bool,
    ) -> Result<FindMaterialResult> {
        tracing::info!(
            activity = %activity.id,
            requirements = requirements.len(),
            "開始物料可用性判定"
        );

        let mut profiles = Vec::new();
        let mut shortages = Vec::new();
        let mut pending = Vec::new();
        let mut overlay = DrawOverlay::new();

        if activity.in_process {
            tracing::debug!(activity = %activity.id, "活動已開工，略過物料判定");
            return Ok(FindMaterialResult::Satisfied {
                profiles,
                shortages,
            });
        }

        for requirement in requirements {
            if requirement.buy_direct {
                tracing::debug!(item = %requirement.item_id, "直接採購需求，不做庫存規劃");
                continue;
            }

            let outcome = self.resolve_requirement(
                scenario,
                activity,
                requirement,
                originates_from_import,
                &mut overlay,
            )?;
            match outcome {
                RequirementOutcome::Satisfied {
                    profile,
                    shortage,
                    commit,
                } => {
                    if let Some(shortage) = shortage {
                        tracing::debug!(
                            item = %shortage.item_id,
                            qty = %shortage.qty,
                            "接受缺料"
                        );
                        shortages.push(shortage);
                    }
                    if let Some(commit) = commit {
                        pending.push(commit);
                    }
                    profiles.push(profile);
                }
                RequirementOutcome::Deferred { retry_date } => {
                    tracing::debug!(
                        item = %requirement.item_id,
                        ?retry_date,
                        "需求無法滿足，延後重試"
                    );
                    return Ok(FindMaterialResult::Deferred {
                        item_id: requirement.item_id.clone(),
                        warehouse_id: requirement.warehouse_id,
                        retry_date,
                    });
                }
            }
        }

        self.apply_commits(scenario, pending)?;

        tracing::info!(
            activity = %activity.id,
            satisfied = profiles.len(),
            shortages = shortages.len(),
            "物料可用性判定完成"
        );
        Ok(FindMaterialResult::Satisfied {
            profiles,
            shortages,
        })
    }

    /// 單筆需求的判定
    fn resolve_requirement(
        &self,
        scenario: &Scenario,
        activity: &Activity,
        requirement: &MaterialRequirement,
        originates_from_import: bool,
        overlay: &mut DrawOverlay,
    ) -> Result<RequirementOutcome> {
        let mut profile = MaterialDemandProfile::build(requirement, activity, &scenario.options);
        if profile.is_satisfied() {
            return Ok(RequirementOutcome::Satisfied {
                profile,
                shortage: None,
                commit: None,
            });
        }

        let plans =
            AllocationPlanner::build_plans(scenario, requirement, activity, self.capacity, &profile);
        let blocked_retry = AllocationPlanner::earliest_retry(&plans);
        let mut usable: Vec<MaterialAllocationPlan> = plans
            .iter()
            .filter(|p| p.is_currently_valid() && !p.is_empty())
            .cloned()
            .collect();
        AllocationPlanner::order_plans(&mut usable);

        let allow_lead_time = requirement.allow_lead_time_fallback && !originates_from_import;
        let accepts_shortage =
            !requirement.is_constraint || scenario.options.restore_material_constraints;
        let first_demand = profile.first_demand_at().unwrap_or(scenario.clock);
        let within_horizon = scenario.within_horizon(first_demand);
        let demand_total = profile.total_qty();

        // 沒有計劃能供應全量、又不能後援時，時界內直接延後
        let can_fully_supply = usable.iter().any(|p| p.max_available_qty >= demand_total);
        if !can_fully_supply && !allow_lead_time && !accepts_shortage && within_horizon {
            let material_retry = BackwardCalculator::requirement_retry_date(
                self.capacity,
                scenario,
                activity,
                requirement,
                &plans,
                &profile,
            )?;
            return Ok(RequirementOutcome::Deferred {
                retry_date: merge_retry(material_retry, blocked_retry),
            });
        }

        // 依序嘗試計劃：每次重設剖面後做全量配置
        for plan in &usable {
            profile.reset();
            let draws = Self::allocate_from_plan(scenario, &mut profile, plan, overlay);
            if profile.is_satisfied() {
                let commit = Self::stage_commit(plan, draws, &profile, scenario.clock, overlay);
                return Ok(RequirementOutcome::Satisfied {
                    profile,
                    shortage: None,
                    commit,
                });
            }
        }

        // 沒有計劃可全量滿足：以最佳計劃的部分配置為基礎進入遞增後援
        profile.reset();
        let best_plan = usable.first().cloned();
        let draws = match &best_plan {
            Some(plan) => Self::allocate_from_plan(scenario, &mut profile, plan, overlay),
            None => Vec::new(),
        };

        if !profile.is_satisfied() && allow_lead_time {
            // 後援1：此計劃觸及的庫存
            if let Some(plan) = &best_plan {
                if let Some(inventory) =
                    scenario.inventory_for_item(&requirement.item_id, plan.warehouse_id)
                {
                    tracing::debug!(
                        item = %requirement.item_id,
                        lead_time_days = inventory.lead_time_days,
                        "以提前期後援補足"
                    );
                    profile.allocate_remaining_from_lead_time(inventory, scenario.clock);
                }
            }

            // 後援2：所有可儲放此物料的倉庫，提前期遞增
            if !profile.is_satisfied() {
                for inventory in scenario.inventories_for_item(&requirement.item_id) {
                    profile.allocate_remaining_from_lead_time(inventory, scenario.clock);
                    if profile.is_satisfied() {
                        break;
                    }
                }
            }
        }

        // 後援3：超出計劃時界的需求節點允許最後手段配置
        if !profile.is_satisfied() {
            profile.allocate_past_horizon(scenario.horizon_end);
        }

        if profile.is_satisfied() {
            let commit = match &best_plan {
                Some(plan) => Self::stage_commit(plan, draws, &profile, scenario.clock, overlay),
                None => None,
            };
            return Ok(RequirementOutcome::Satisfied {
                profile,
                shortage: None,
                commit,
            });
        }

        // 非約束需求接受缺料；時界外的失敗亦直接接受缺料
        if accepts_shortage || !within_horizon {
            let qty = profile.allocate_shortage(scenario.clock);
            let commit = match &best_plan {
                Some(plan) => Self::stage_commit(plan, draws, &profile, scenario.clock, overlay),
                None => None,
            };
            let shortage = MaterialShortage {
                item_id: requirement.item_id.clone(),
                warehouse_id: None,
                qty,
                at: scenario.clock,
            };
            return Ok(RequirementOutcome::Satisfied {
                profile,
                shortage: Some(shortage),
                commit,
            });
        }

        // 時界內失敗：計算重試時間
        profile.reset();
        let material_retry = BackwardCalculator::requirement_retry_date(
            self.capacity,
            scenario,
            activity,
            requirement,
            &plans,
            &profile,
        )?;
        Ok(RequirementOutcome::Deferred {
            retry_date: merge_retry(material_retry, blocked_retry),
        })
    }

    /// 對單一計劃做全量配置：依需求節點推進供應游標，先到先用
    ///
    /// 同一次判定中前面需求已抽取的數量（overlay）自供應扣除，
    /// 避免同批供應被重複配置。
    fn allocate_from_plan(
        scenario: &Scenario,
        profile: &mut MaterialDemandProfile,
        plan: &MaterialAllocationPlan,
        overlay: &DrawOverlay,
    ) -> Vec<LotDraw> {
        let Some(inventory) = scenario.inventory_for_item(&profile.item_id, plan.warehouse_id)
        else {
            return Vec::new();
        };
        let supply = SupplyProfile::build(
            scenario,
            inventory.id,
            &plan.storage_areas,
            profile.allowed_lot_code.as_deref(),
        );

        let mut draws: Vec<LotDraw> = Vec::new();
        let mut pool: Vec<(SupplySource, Timestamp, Decimal)> = Vec::new();
        let mut cursor = 0;

        for node_index in 0..profile.nodes().len() {
            let node_at = profile.nodes()[node_index].at;

            while cursor < supply.nodes().len() && supply.nodes()[cursor].available_at <= node_at {
                let node = &supply.nodes()[cursor];
                let qty = match node.source {
                    SupplySource::Lot {
                        lot_id,
                        storage_area_id,
                    } => {
                        let drawn = overlay
                            .get(&(lot_id, storage_area_id))
                            .copied()
                            .unwrap_or(Decimal::ZERO);
                        (node.qty - drawn).max(Decimal::ZERO)
                    }
                    SupplySource::Receipt { .. } => node.qty,
                };
                if qty > Decimal::ZERO {
                    pool.push((node.source, node.available_at, qty));
                }
                cursor += 1;
            }

            let mut need = profile.nodes()[node_index].remaining();
            for entry in pool.iter_mut() {
                if need <= Decimal::ZERO {
                    break;
                }
                let take = entry.2.min(need);
                if take <= Decimal::ZERO {
                    continue;
                }
                entry.2 -= take;
                need -= take;

                let storage_area_id = match entry.0 {
                    SupplySource::Lot {
                        storage_area_id, ..
                    }
                    | SupplySource::Receipt {
                        storage_area_id, ..
                    } => storage_area_id,
                };
                profile.allocate_to(
                    node_index,
                    entry.1,
                    take,
                    AllocationSource::Storage(storage_area_id),
                );

                if let SupplySource::Lot {
                    lot_id,
                    storage_area_id,
                } = entry.0
                {
                    draws.push(LotDraw {
                        lot_id,
                        storage_area_id,
                        qty: take,
                    });
                }
            }
        }

        draws
    }

    /// 暫存提交：抽取量記入 overlay，提交延後至整組需求滿足
    fn stage_commit(
        plan: &MaterialAllocationPlan,
        draws: Vec<LotDraw>,
        profile: &MaterialDemandProfile,
        clock: Timestamp,
        overlay: &mut DrawOverlay,
    ) -> Option<PendingCommit> {
        if draws.is_empty() {
            return None;
        }

        for draw in &draws {
            *overlay
                .entry((draw.lot_id, draw.storage_area_id))
                .or_insert(Decimal::ZERO) += draw.qty;
        }

        let window_from = profile.first_demand_at().unwrap_or(clock);
        let window_to = profile.last_demand_at().unwrap_or(window_from);
        Some(PendingCommit {
            plan: plan.clone(),
            draws,
            window: (window_from, window_to),
        })
    }

    /// 提交全部配置：耗用批次並承諾連接器流量
    fn apply_commits(&self, scenario: &mut Scenario, pending: Vec<PendingCommit>) -> Result<()> {
        for commit in pending {
            let mut drawn_total = Decimal::ZERO;
            for draw in &commit.draws {
                let issued = scenario.lots.issue_from_storage(
                    scenario.clock,
                    draw.lot_id,
                    draw.storage_area_id,
                    draw.qty,
                )?;
                drawn_total += issued;
            }

            if drawn_total > Decimal::ZERO {
                if let Some(connector_id) = commit.plan.connector_id {
                    if let Some(connector) = scenario.connector_mut(connector_id) {
                        connector.commit(commit.window.0, commit.window.1, drawn_total);
                    }
                }
            }
        }

        Ok(())
    }
}

/// 場景平行模擬工作項
///
/// 場景是彼此獨立的可變物件圖；平行化只存在於場景層級。
pub struct ScenarioJob {
    /// 場景
    pub scenario: Scenario,

    /// 活動
    pub activity: Activity,

    /// 物料需求
    pub requirements: Vec<MaterialRequirement>,
}

/// 平行判定多個獨立場景
pub fn resolve_scenarios<C>(capacity: &C, jobs: &mut [ScenarioJob]) -> Vec<Result<FindMaterialResult>>
where
    C: CapacityScheduler + Sync,
{
    use rayon::prelude::*;

    jobs.par_iter_mut()
        .map(|job| {
            MaterialResolver::new(capacity).find_available_material(
                &mut job.scenario,
                &job.activity,
                &job.requirements,
                false,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aps_core::{
        Inventory, InventoryId, ItemStorage, ResourceId, ScenarioOptions, StorageArea,
        UnconstrainedCapacity, Warehouse, WarehouseId,
    };
    use chrono::NaiveDate;

    fn ts(day: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2025, 11, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn scenario(on_hand: i64, lead_time_days: u32) -> Scenario {
        let mut sc = Scenario::new(ts(1), ScenarioOptions::default());
        sc.add_warehouse(Warehouse::new(WarehouseId(1), "WH-01".to_string()));
        sc.add_storage_area(StorageArea::new(
            StorageAreaId(1),
            "SA-01".to_string(),
            WarehouseId(1),
        ));
        sc.add_inventory(
            Inventory::new(InventoryId(1), "ITEM-001".to_string(), WarehouseId(1))
                .with_lead_time_days(lead_time_days)
                .with_on_hand_qty(Decimal::from(on_hand)),
        );
        sc.add_item_storage(ItemStorage::new(StorageAreaId(1), "ITEM-001".to_string()));
        if on_hand > 0 {
            sc.lots
                .set_on_hand_qty(InventoryId(1), StorageAreaId(1), Decimal::from(on_hand));
        }
        sc
    }

    fn activity() -> Activity {
        Activity::new(ResourceId(1), ts(2))
    }

    #[test]
    fn test_in_process_activity_skips_resolution() {
        let mut sc = scenario(0, 0);
        let act = activity().as_in_process();
        let reqs = vec![MaterialRequirement::new(
            "ITEM-001".to_string(),
            Decimal::from(999),
        )];

        let result = MaterialResolver::new(&UnconstrainedCapacity)
            .find_available_material(&mut sc, &act, &reqs, false)
            .unwrap();
        assert!(result.is_satisfied());
    }

    #[test]
    fn test_buy_direct_requirement_skipped() {
        let mut sc = scenario(0, 0);
        let act = activity();
        let reqs = vec![
            MaterialRequirement::new("ITEM-001".to_string(), Decimal::from(999)).as_buy_direct(),
        ];

        let result = MaterialResolver::new(&UnconstrainedCapacity)
            .find_available_material(&mut sc, &act, &reqs, false)
            .unwrap();
        match result {
            FindMaterialResult::Satisfied { profiles, .. } => assert!(profiles.is_empty()),
            FindMaterialResult::Deferred { .. } => panic!("直接採購需求不應延後"),
        }
    }

    #[test]
    fn test_direct_supply_commits_ledger() {
        let mut sc = scenario(100, 0);
        let act = activity();
        let reqs = vec![MaterialRequirement::new(
            "ITEM-001".to_string(),
            Decimal::from(60),
        )
        .with_warehouse(WarehouseId(1))];

        let result = MaterialResolver::new(&UnconstrainedCapacity)
            .find_available_material(&mut sc, &act, &reqs, false)
            .unwrap();

        match result {
            FindMaterialResult::Satisfied { profiles, shortages } => {
                assert_eq!(profiles.len(), 1);
                assert!(profiles[0].is_satisfied());
                assert_eq!(profiles[0].allocated_qty(), Decimal::from(60));
                assert!(shortages.is_empty());
            }
            FindMaterialResult::Deferred { .. } => panic!("供應充足不應延後"),
        }

        // 批次帳已扣減
        assert_eq!(sc.lots.total_qty(InventoryId(1)), Decimal::from(40));
    }

    #[test]
    fn test_lead_time_fallback_allocates_shortfall() {
        let mut sc = scenario(100, 5);
        let act = activity();
        let reqs = vec![MaterialRequirement::new(
            "ITEM-001".to_string(),
            Decimal::from(150),
        )
        .with_warehouse(WarehouseId(1))];

        let result = MaterialResolver::new(&UnconstrainedCapacity)
            .find_available_material(&mut sc, &act, &reqs, false)
            .unwrap();

        match result {
            FindMaterialResult::Satisfied { profiles, shortages } => {
                assert!(profiles[0].is_satisfied());
                assert!(shortages.is_empty());
                // 不足的 50 於 時鐘+提前期 可得
                assert_eq!(
                    profiles[0].available_date(),
                    Some(ts(1) + chrono::Duration::days(5))
                );
            }
            FindMaterialResult::Deferred { .. } => panic!("提前期後援應可滿足"),
        }
    }

    #[test]
    fn test_non_constraint_accepts_shortage() {
        let mut sc = scenario(30, 0);
        let act = activity();
        let reqs = vec![MaterialRequirement::new(
            "ITEM-001".to_string(),
            Decimal::from(100),
        )
        .with_warehouse(WarehouseId(1))
        .as_non_constraint()
        .without_lead_time_fallback()];

        let result = MaterialResolver::new(&UnconstrainedCapacity)
            .find_available_material(&mut sc, &act, &reqs, false)
            .unwrap();

        match result {
            FindMaterialResult::Satisfied { profiles, shortages } => {
                assert!(profiles[0].is_satisfied());
                assert_eq!(shortages.len(), 1);
                assert_eq!(shortages[0].qty, Decimal::from(70));
                assert_eq!(shortages[0].warehouse_id, None);
                // 缺料配置不超過可得供應：實配 30、缺 70
                assert_eq!(profiles[0].shortage_qty(), Decimal::from(70));
            }
            FindMaterialResult::Deferred { .. } => panic!("非約束需求不應硬性失敗"),
        }
    }

    #[test]
    fn test_constraint_without_fallback_defers() {
        let mut sc = scenario(30, 0);
        let act = activity();
        let reqs = vec![MaterialRequirement::new(
            "ITEM-001".to_string(),
            Decimal::from(100),
        )
        .with_warehouse(WarehouseId(1))
        .without_lead_time_fallback()];

        let result = MaterialResolver::new(&UnconstrainedCapacity)
            .find_available_material(&mut sc, &act, &reqs, false)
            .unwrap();

        match result {
            FindMaterialResult::Deferred { item_id, .. } => {
                assert_eq!(item_id, "ITEM-001");
            }
            FindMaterialResult::Satisfied { .. } => panic!("供應不足且無後援應延後"),
        }
        // 失敗路徑不得耗用批次帳
        assert_eq!(sc.lots.total_qty(InventoryId(1)), Decimal::from(30));
    }

    #[test]
    fn test_failure_rolls_back_earlier_requirements() {
        // 第一筆需求可滿足、第二筆失敗 → 整組短路，批次帳不變
        let mut sc = scenario(100, 0);
        sc.add_inventory(Inventory::new(
            InventoryId(2),
            "ITEM-002".to_string(),
            WarehouseId(1),
        ));
        sc.add_item_storage(ItemStorage::new(StorageAreaId(1), "ITEM-002".to_string()));

        let act = activity();
        let reqs = vec![
            MaterialRequirement::new("ITEM-001".to_string(), Decimal::from(60))
                .with_warehouse(WarehouseId(1)),
            MaterialRequirement::new("ITEM-002".to_string(), Decimal::from(10))
                .with_warehouse(WarehouseId(1))
                .without_lead_time_fallback(),
        ];

        let result = MaterialResolver::new(&UnconstrainedCapacity)
            .find_available_material(&mut sc, &act, &reqs, false)
            .unwrap();

        match result {
            FindMaterialResult::Deferred { item_id, .. } => assert_eq!(item_id, "ITEM-002"),
            FindMaterialResult::Satisfied { .. } => panic!("第二筆需求應失敗"),
        }
        assert_eq!(sc.lots.total_qty(InventoryId(1)), Decimal::from(100));
    }

    #[test]
    fn test_same_supply_not_allocated_twice() {
        // 兩筆需求共用同一批供應：第二筆只能用第一筆剩下的量
        let mut sc = scenario(100, 5);
        let act = activity();
        let reqs = vec![
            MaterialRequirement::new("ITEM-001".to_string(), Decimal::from(80))
                .with_warehouse(WarehouseId(1)),
            MaterialRequirement::new("ITEM-001".to_string(), Decimal::from(80))
                .with_warehouse(WarehouseId(1)),
        ];

        let result = MaterialResolver::new(&UnconstrainedCapacity)
            .find_available_material(&mut sc, &act, &reqs, false)
            .unwrap();

        match result {
            FindMaterialResult::Satisfied { profiles, .. } => {
                assert_eq!(profiles.len(), 2);
                assert!(profiles.iter().all(|p| p.is_satisfied()));
                // 第二筆需求只拿到 20 現貨，其餘走提前期後援
                assert_eq!(
                    profiles[1].available_date(),
                    Some(ts(1) + chrono::Duration::days(5))
                );
            }
            FindMaterialResult::Deferred { .. } => panic!("提前期後援應可滿足"),
        }

        // 批次帳總共被抽取 100，不會超抽
        assert_eq!(sc.lots.total_qty(InventoryId(1)), Decimal::ZERO);
    }

    #[test]
    fn test_parallel_scenarios_are_independent() {
        let mut jobs: Vec<ScenarioJob> = (0..4)
            .map(|_| ScenarioJob {
                scenario: scenario(100, 0),
                activity: activity(),
                requirements: vec![MaterialRequirement::new(
                    "ITEM-001".to_string(),
                    Decimal::from(60),
                )
                .with_warehouse(WarehouseId(1))],
            })
            .collect();

        let results = resolve_scenarios(&UnconstrainedCapacity, &mut jobs);
        assert_eq!(results.len(), 4);
        for (result, job) in results.iter().zip(jobs.iter()) {
            assert!(result.as_ref().unwrap().is_satisfied());
            assert_eq!(job.scenario.lots.total_qty(InventoryId(1)), Decimal::from(40));
        }
    }
}
