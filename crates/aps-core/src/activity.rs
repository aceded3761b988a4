//! 生產活動模型
//!
//! 活動只攜帶物料判定所需的排程資訊：整備/生產/後處理時段、
//! 生產週期數與主資源。活動網路的建構屬於外部排程器。

use chrono::Duration;
use uuid::Uuid;

use crate::ids::{ResourceId, Timestamp};
use crate::requirement::MaterialUsedTiming;

/// 生產活動
#[derive(Debug, Clone)]
pub struct Activity {
    /// 活動ID
    pub id: Uuid,

    /// 主資源
    pub resource_id: ResourceId,

    /// 排定開始時間（整備開始）
    pub scheduled_start: Timestamp,

    /// 整備時段
    pub setup: Duration,

    /// 生產時段
    pub production: Duration,

    /// 後處理時段
    pub post_processing: Duration,

    /// 生產週期數
    pub cycles: u32,

    /// 已開工/逾期（不再做物料判定）
    pub in_process: bool,
}

impl Activity {
    /// 創建新的活動
    pub fn new(resource_id: ResourceId, scheduled_start: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource_id,
            scheduled_start,
            setup: Duration::zero(),
            production: Duration::zero(),
            post_processing: Duration::zero(),
            cycles: 1,
            in_process: false,
        }
    }

    /// 建構器模式：設置整備時段
    pub fn with_setup(mut self, setup: Duration) -> Self {
        self.setup = setup;
        self
    }

    /// 建構器模式：設置生產時段
    pub fn with_production(mut self, production: Duration) -> Self {
        self.production = production;
        self
    }

    /// 建構器模式：設置後處理時段
    pub fn with_post_processing(mut self, post_processing: Duration) -> Self {
        self.post_processing = post_processing;
        self
    }

    /// 建構器模式：設置生產週期數（至少 1）
    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.cycles = cycles.max(1);
        self
    }

    /// 建構器模式：標記為已開工
    pub fn as_in_process(mut self) -> Self {
        self.in_process = true;
        self
    }

    /// 生產開始時間
    pub fn production_start(&self) -> Timestamp {
        self.scheduled_start + self.setup
    }

    /// 生產結束時間
    pub fn production_end(&self) -> Timestamp {
        self.production_start() + self.production
    }

    /// 後處理結束時間
    pub fn post_processing_end(&self) -> Timestamp {
        self.production_end() + self.post_processing
    }

    /// 單一生產週期的長度
    pub fn cycle_len(&self) -> Duration {
        self.production / (self.cycles.max(1) as i32)
    }

    /// 第 i 個生產週期的開始時間（0 起算）
    pub fn cycle_start(&self, index: u32) -> Timestamp {
        self.production_start() + self.cycle_len() * (index as i32)
    }

    /// 依耗用時點計算物料實際被消耗的時間序列
    pub fn consumption_times(&self, timing: MaterialUsedTiming) -> Vec<Timestamp> {
        match timing {
            MaterialUsedTiming::SetupStart => vec![self.scheduled_start],
            MaterialUsedTiming::DuringSetup => vec![self.scheduled_start + self.setup / 2],
            MaterialUsedTiming::ProductionStart | MaterialUsedTiming::FirstCycle => {
                vec![self.production_start()]
            }
            MaterialUsedTiming::PerCycle => {
                (0..self.cycles.max(1)).map(|i| self.cycle_start(i)).collect()
            }
            MaterialUsedTiming::LastCycle => vec![self.cycle_start(self.cycles.max(1) - 1)],
            MaterialUsedTiming::PostProcessingStart => vec![self.production_end()],
            MaterialUsedTiming::PostProcessingEnd => vec![self.post_processing_end()],
        }
    }

    /// 耗用點之前必須完成的活動時段（回推開始日期使用）
    pub fn pre_consumption_span(&self, timing: MaterialUsedTiming) -> Duration {
        match timing {
            MaterialUsedTiming::SetupStart => Duration::zero(),
            MaterialUsedTiming::DuringSetup => self.setup / 2,
            MaterialUsedTiming::ProductionStart
            | MaterialUsedTiming::FirstCycle
            | MaterialUsedTiming::PerCycle => self.setup,
            MaterialUsedTiming::LastCycle => {
                self.setup + self.cycle_len() * (self.cycles.max(1) as i32 - 1)
            }
            MaterialUsedTiming::PostProcessingStart => self.setup + self.production,
            MaterialUsedTiming::PostProcessingEnd => {
                self.setup + self.production + self.post_processing
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2025, 11, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn activity() -> Activity {
        Activity::new(ResourceId(1), ts(1, 0))
            .with_setup(Duration::hours(2))
            .with_production(Duration::hours(8))
            .with_post_processing(Duration::hours(2))
            .with_cycles(4)
    }

    #[test]
    fn test_schedule_spans() {
        let act = activity();
        assert_eq!(act.production_start(), ts(1, 2));
        assert_eq!(act.production_end(), ts(1, 10));
        assert_eq!(act.post_processing_end(), ts(1, 12));
        assert_eq!(act.cycle_len(), Duration::hours(2));
    }

    #[test]
    fn test_consumption_times_per_cycle() {
        let act = activity();
        let times = act.consumption_times(MaterialUsedTiming::PerCycle);
        assert_eq!(times, vec![ts(1, 2), ts(1, 4), ts(1, 6), ts(1, 8)]);

        // 序列恆為非遞減
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_consumption_times_single_node() {
        let act = activity();
        assert_eq!(
            act.consumption_times(MaterialUsedTiming::SetupStart),
            vec![ts(1, 0)]
        );
        assert_eq!(
            act.consumption_times(MaterialUsedTiming::DuringSetup),
            vec![ts(1, 1)]
        );
        assert_eq!(
            act.consumption_times(MaterialUsedTiming::LastCycle),
            vec![ts(1, 8)]
        );
        assert_eq!(
            act.consumption_times(MaterialUsedTiming::PostProcessingEnd),
            vec![ts(1, 12)]
        );
    }

    #[test]
    fn test_pre_consumption_span() {
        let act = activity();
        assert_eq!(
            act.pre_consumption_span(MaterialUsedTiming::SetupStart),
            Duration::zero()
        );
        assert_eq!(
            act.pre_consumption_span(MaterialUsedTiming::ProductionStart),
            Duration::hours(2)
        );
        assert_eq!(
            act.pre_consumption_span(MaterialUsedTiming::LastCycle),
            Duration::hours(8)
        );
        assert_eq!(
            act.pre_consumption_span(MaterialUsedTiming::PostProcessingEnd),
            Duration::hours(12)
        );
    }
}
