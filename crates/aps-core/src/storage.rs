//! 倉儲模型
//!
//! 倉庫、儲區、物料儲位，以及資源與儲區之間的流量約束（儲區連接器）。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{ConnectorId, ResourceId, StorageAreaId, Timestamp, WarehouseId};

/// 倉庫
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warehouse {
    /// 倉庫ID
    pub id: WarehouseId,

    /// 外部識別碼
    pub external_id: String,

    /// 名稱
    pub name: String,
}

impl Warehouse {
    /// 創建新的倉庫
    pub fn new(id: WarehouseId, external_id: String) -> Self {
        Self {
            id,
            name: external_id.clone(),
            external_id,
        }
    }

    /// 建構器模式：設置名稱
    pub fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }
}

/// 儲區
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageArea {
    /// 儲區ID
    pub id: StorageAreaId,

    /// 外部識別碼
    pub external_id: String,

    /// 所屬倉庫
    pub warehouse_id: WarehouseId,

    /// 綁定資源（設定後自此儲區轉出需檢查資源產能）
    pub resource_id: Option<ResourceId>,

    /// 單次轉出量上限
    pub max_outflow_qty: Option<Decimal>,
}

impl StorageArea {
    /// 創建新的儲區
    pub fn new(id: StorageAreaId, external_id: String, warehouse_id: WarehouseId) -> Self {
        Self {
            id,
            external_id,
            warehouse_id,
            resource_id: None,
            max_outflow_qty: None,
        }
    }

    /// 建構器模式：綁定資源
    pub fn with_resource(mut self, resource_id: ResourceId) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    /// 建構器模式：設置單次轉出量上限
    pub fn with_max_outflow(mut self, qty: Decimal) -> Self {
        self.max_outflow_qty = Some(qty);
        self
    }

    /// 檢查轉出量是否在上限內
    pub fn admits_outflow(&self, qty: Decimal) -> bool {
        match self.max_outflow_qty {
            Some(limit) => qty <= limit,
            None => true,
        }
    }
}

/// 物料儲位：一個儲區可存放一種物料的宣告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemStorage {
    /// 儲區ID
    pub storage_area_id: StorageAreaId,

    /// 物料ID
    pub item_id: String,
}

impl ItemStorage {
    /// 創建新的物料儲位
    pub fn new(storage_area_id: StorageAreaId, item_id: String) -> Self {
        Self {
            storage_area_id,
            item_id,
        }
    }
}

/// 已承諾的連接器流量區間
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowUsage {
    /// 區間開始
    pub from: Timestamp,

    /// 區間結束
    pub to: Timestamp,

    /// 流量
    pub qty: Decimal,
}

impl FlowUsage {
    fn overlaps(&self, from: Timestamp, to: Timestamp) -> bool {
        self.from < to && from < self.to
    }
}

/// 儲區連接器
///
/// 資源與儲區之間的有向流量約束：`in_*` 為存入方向（生產資源存入儲區），
/// `out_*` 為取用方向（消耗資源自儲區取料）。空的資源清單表示不限資源。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageAreaConnector {
    /// 連接器ID
    pub id: ConnectorId,

    /// 外部識別碼
    pub external_id: String,

    /// 可存入的資源
    pub in_resources: Vec<ResourceId>,

    /// 可取用的資源
    pub out_resources: Vec<ResourceId>,

    /// 存入方向可達的儲區
    pub in_areas: Vec<StorageAreaId>,

    /// 取用方向可達的儲區
    pub out_areas: Vec<StorageAreaId>,

    /// 任一重疊區間內的流量上限（None 表示不限）
    pub flow_limit: Option<Decimal>,

    /// 已承諾的流量
    usage: Vec<FlowUsage>,
}

impl StorageAreaConnector {
    /// 創建新的連接器
    pub fn new(id: ConnectorId, external_id: String) -> Self {
        Self {
            id,
            external_id,
            in_resources: Vec::new(),
            out_resources: Vec::new(),
            in_areas: Vec::new(),
            out_areas: Vec::new(),
            flow_limit: None,
            usage: Vec::new(),
        }
    }

    /// 建構器模式：設置取用方向
    pub fn with_outbound(mut self, resources: Vec<ResourceId>, areas: Vec<StorageAreaId>) -> Self {
        self.out_resources = resources;
        self.out_areas = areas;
        self
    }

    /// 建構器模式：設置存入方向
    pub fn with_inbound(mut self, resources: Vec<ResourceId>, areas: Vec<StorageAreaId>) -> Self {
        self.in_resources = resources;
        self.in_areas = areas;
        self
    }

    /// 建構器模式：設置流量上限
    pub fn with_flow_limit(mut self, limit: Decimal) -> Self {
        self.flow_limit = Some(limit);
        self
    }

    /// 消耗資源是否可經此連接器取料
    pub fn serves_consumer(&self, resource_id: ResourceId) -> bool {
        self.out_resources.is_empty() || self.out_resources.contains(&resource_id)
    }

    /// 生產資源是否可經此連接器存入
    pub fn serves_producer(&self, resource_id: ResourceId) -> bool {
        self.in_resources.is_empty() || self.in_resources.contains(&resource_id)
    }

    /// 已承諾的流量
    pub fn usage(&self) -> &[FlowUsage] {
        &self.usage
    }

    /// 與指定區間重疊的已承諾流量總和
    pub fn committed_in(&self, from: Timestamp, to: Timestamp) -> Decimal {
        self.usage
            .iter()
            .filter(|u| u.overlaps(from, to))
            .map(|u| u.qty)
            .sum()
    }

    /// 指定區間是否可再承諾指定流量
    pub fn admits(&self, from: Timestamp, to: Timestamp, qty: Decimal) -> bool {
        match self.flow_limit {
            Some(limit) => self.committed_in(from, to) + qty <= limit,
            None => true,
        }
    }

    /// 不可承諾時，計算最近的未來可承諾起點
    ///
    /// 流量需求本身超過上限時回傳 None（永遠不可行，而非可重試）。
    pub fn next_admission(&self, from: Timestamp, to: Timestamp, qty: Decimal) -> Option<Timestamp> {
        let limit = self.flow_limit?;
        if qty > limit {
            return None;
        }

        let duration = to - from;
        let mut candidates: Vec<Timestamp> = self
            .usage
            .iter()
            .filter(|u| u.to > from)
            .map(|u| u.to)
            .collect();
        candidates.sort();
        candidates.dedup();

        candidates
            .into_iter()
            .find(|&start| self.admits(start, start + duration, qty))
    }

    /// 承諾流量
    pub fn commit(&mut self, from: Timestamp, to: Timestamp, qty: Decimal) {
        if qty > Decimal::ZERO {
            self.usage.push(FlowUsage { from, to, qty });
        }
    }
}
