//! # APS Engine
//!
//! 物料可用性判定與批次庫存帳：
//! - `aps-core` — 批次帳、倉儲圖、庫存、需求與場景模型
//! - `aps-calc` — 需求/供應剖面、配置計劃、最小位移匹配與判定主流程

pub use aps_calc::{
    resolve_scenarios, Allocation, AllocationPlanner, AllocationSource, BackwardCalculator,
    DemandNode, FindMaterialResult, MaterialAllocationPlan, MaterialDemandProfile,
    MaterialResolver, MaterialShortage, ScenarioJob, ShiftCalculator, SupplyNode, SupplyProfile,
    SupplySource,
};
pub use aps_core::{
    Activity, ApsError, CapacityResult, CapacityScheduler, ConnectorId, FlowUsage, Inventory,
    InventoryId, ItemStorage, LinkMode, Lot, LotAdjustment, LotAdjustmentKind, LotId, LotManager,
    LotSource, LotStorage, LotStorageProfile, MaterialRequirement, MaterialUsedTiming, ReceiptKind,
    ResourceId, Result, ReverseCapacityResult, Scenario, ScenarioOptions, ScheduledReceipt,
    ShelfLife, StorageArea, StorageAreaConnector, StorageAreaId, Timestamp, UnconstrainedCapacity,
    Warehouse, WarehouseId,
};
