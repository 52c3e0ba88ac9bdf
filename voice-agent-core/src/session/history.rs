//! ローリング会話履歴
//!
//! `user`/`assistant` のペアでのみ追記される。取り消された(バージイン
//! された)ターンの内容が混入することはない(I3)。
use parking_lot::Mutex;

use crate::llm::ChatMessage;

pub struct History {
    messages: Mutex<Vec<ChatMessage>>,
}

impl History {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    /// 直近 `max` 件(ペア境界は問わない、呼び出し側が偶数個を維持する)の
    /// スナップショットを返す。
    pub fn snapshot(&self, max: usize) -> Vec<ChatMessage> {
        let guard = self.messages.lock();
        let start = guard.len().saturating_sub(max);
        guard[start..].to_vec()
    }

    /// ユーザー発話とアシスタント応答のペアを原子的に追記し、`max` 件に
    /// トリムする。成功裏に終わったターンでのみ呼ぶこと。
    pub fn commit(&self, user_text: String, assistant_text: String, max: usize) {
        let mut guard = self.messages.lock();
        guard.push(ChatMessage::user(user_text));
        guard.push(ChatMessage::assistant(assistant_text));
        let len = guard.len();
        if len > max {
            guard.drain(0..len - max);
        }
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_appends_pair_and_trims() {
        let history = History::new();
        history.commit("one".into(), "reply one".into(), 4);
        history.commit("two".into(), "reply two".into(), 4);
        assert_eq!(history.len(), 4);
        history.commit("three".into(), "reply three".into(), 4);
        assert_eq!(history.len(), 4);
        let snapshot = history.snapshot(4);
        assert_eq!(snapshot[0].content, "two");
        assert_eq!(snapshot[1].content, "reply two");
        assert_eq!(snapshot[2].content, "three");
        assert_eq!(snapshot[3].content, "reply three");
    }

    #[test]
    fn snapshot_bounds_to_max() {
        let history = History::new();
        for i in 0..5 {
            history.commit(format!("u{i}"), format!("a{i}"), 100);
        }
        let snapshot = history.snapshot(2);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].content, "u4");
        assert_eq!(snapshot[1].content, "a4");
    }
}
