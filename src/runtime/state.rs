// 运行时全局状态：安装状态机、最近一次报告、安装记录
use crate::api::{InstallReport, InstallState};
use once_cell::sync::Lazy;
use std::sync::{Mutex, MutexGuard};

// Mutex poison 恢复扩展，避免持锁线程 panic 后引发连锁 panic
pub(crate) trait MutexPoisonRecover<T> {
    fn lock_or_poison(&self) -> MutexGuard<'_, T>;
}

impl<T> MutexPoisonRecover<T> for Mutex<T> {
    fn lock_or_poison(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// 安装操作类型，用于记录
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum RecordOp {
    Native,
    Objc,
}

// 单条安装记录
#[derive(Clone, Debug)]
pub(super) struct RecordEntry {
    pub(super) op: RecordOp,
    pub(super) ts_ms: u64,
    pub(super) name: String,
    pub(super) target_addr: usize,
    pub(super) new_addr: usize,
    pub(super) outcome: &'static str,
    pub(super) status_code: i32,
}

// 核心可变状态，由 GlobalState::state 互斥锁保护
pub(super) struct CoreState {
    pub(super) install_state: InstallState,
    // 延迟安装是否已调度，保证定时器只启动一次
    pub(super) scheduled: bool,
    pub(super) report: Option<InstallReport>,
    pub(super) debug: bool,
    pub(super) recordable: bool,
    pub(super) records: Vec<RecordEntry>,
}

impl Default for CoreState {
    fn default() -> Self {
        Self {
            install_state: InstallState::Pending,
            scheduled: false,
            report: None,
            debug: false,
            recordable: true,
            records: Vec::new(),
        }
    }
}

// state 保护核心状态，install_mutex 串行化安装过程
// 安装过程中不持有 state 锁，查询接口不会被补丁写入阻塞
pub(super) struct GlobalState {
    pub(super) state: Mutex<CoreState>,
    pub(super) install_mutex: Mutex<()>,
}

pub(super) static GLOBAL: Lazy<GlobalState> = Lazy::new(|| GlobalState {
    state: Mutex::new(CoreState::default()),
    install_mutex: Mutex::new(()),
});
