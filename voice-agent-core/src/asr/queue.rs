//! 最古要素破棄(drop-oldest)方式の有界キュー
//!
//! ASR送信キュー・最終結果キューの両方で使う。`push` は常に成功し、
//! 容量超過時は先頭(最も古い)要素を捨てる。遅延よりも取りこぼしを
//! 許容する対話システムのバックプレッシャー方針。
use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

pub struct DropOldestQueue<T> {
    capacity: usize,
    inner: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> DropOldestQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            notify: Notify::new(),
        }
    }

    /// 要素を投入する。満杯なら最も古い要素を破棄する。戻り値は破棄の有無。
    pub fn push(&self, item: T) -> bool {
        let mut guard = self.inner.lock();
        let dropped = if guard.len() >= self.capacity {
            guard.pop_front();
            true
        } else {
            false
        };
        guard.push_back(item);
        drop(guard);
        self.notify.notify_one();
        dropped
    }

    /// 要素が投入されるまで待機して取り出す。
    pub async fn pop(&self) -> T {
        loop {
            if let Some(item) = self.inner.lock().pop_front() {
                return item;
            }
            self.notify.notified().await;
        }
    }
}
