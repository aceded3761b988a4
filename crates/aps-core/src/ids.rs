//! 識別碼與時間型別
//!
//! 批次、倉庫、儲區等實體之間一律以不透明識別碼互相引用，
//! 由場景的查找表（arena + index）負責解析，避免指標循環。

use serde::{Deserialize, Serialize};

/// 模擬時鐘使用的時間戳
pub type Timestamp = chrono::NaiveDateTime;

/// 批次ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LotId(pub u64);

/// 庫存記錄ID（一個物料在一個倉庫的庫存位置）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InventoryId(pub u64);

/// 倉庫ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WarehouseId(pub u64);

/// 儲區ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageAreaId(pub u64);

/// 資源ID（產能排程器所管理的資源）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

/// 儲區連接器ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectorId(pub u64);

macro_rules! impl_id_display {
    ($($name:ident),*) => {
        $(
            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

impl_id_display!(LotId, InventoryId, WarehouseId, StorageAreaId, ResourceId, ConnectorId);
