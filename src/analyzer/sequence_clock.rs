//! セッションごとの動画クロック
//!
//! 検出器は連続動画モードで動作するため、単調増加するタイムスタンプを要求します。
//! 接続ごとに1つ作成し、プロセス全体で共有してはいけません。

/// 1フレームの間隔（約30fps）
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceClock {
    timestamp_ms: u64,
    step_ms: u64,
}

impl SequenceClock {
    /// 0msから開始するクロックを作成
    pub fn new(step_ms: u64) -> Self {
        Self {
            timestamp_ms: 0,
            step_ms: step_ms.max(1),
        }
    }

    /// 次に検出器へ渡すタイムスタンプ
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn step_ms(&self) -> u64 {
        self.step_ms
    }

    /// 1フレーム分進める
    pub fn advance(&mut self) -> u64 {
        self.timestamp_ms = self.timestamp_ms.saturating_add(self.step_ms);
        self.timestamp_ms
    }
}

impl Default for SequenceClock {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL_MS)
    }
}
