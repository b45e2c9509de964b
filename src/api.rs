use crate::errno::Errno;
use crate::runtime;
use std::ffi::{CStr, c_int, c_void};
use std::time::Duration;

pub use crate::runtime::{DlsymResolver, DynamicObjcRuntime, InlinePatcher};

// 被替换函数的参数/返回值形态，决定替换体必须遵守的 C ABI
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CallingConvention {
    VoidTakesInt,
    VoidTakesNothing,
    IntTakesTwoInts,
    IntTakesOneInt,
}

// 替换体：每个变体携带与调用约定严格对应的函数指针类型
#[derive(Copy, Clone, Debug)]
pub enum Replacement {
    VoidTakesInt(unsafe extern "C" fn(c_int)),
    VoidTakesNothing(unsafe extern "C" fn()),
    IntTakesTwoInts(unsafe extern "C" fn(c_int, c_int) -> c_int),
    IntTakesOneInt(unsafe extern "C" fn(c_int) -> c_int),
}

impl Replacement {
    pub fn convention(&self) -> CallingConvention {
        match self {
            Self::VoidTakesInt(_) => CallingConvention::VoidTakesInt,
            Self::VoidTakesNothing(_) => CallingConvention::VoidTakesNothing,
            Self::IntTakesTwoInts(_) => CallingConvention::IntTakesTwoInts,
            Self::IntTakesOneInt(_) => CallingConvention::IntTakesOneInt,
        }
    }

    pub fn addr(&self) -> usize {
        match *self {
            Self::VoidTakesInt(func) => func as usize,
            Self::VoidTakesNothing(func) => func as usize,
            Self::IntTakesTwoInts(func) => func as usize,
            Self::IntTakesOneInt(func) => func as usize,
        }
    }
}

// 拦截目录中的一项：导出符号名 + 替换体
#[derive(Copy, Clone, Debug)]
pub struct OverrideEntry {
    pub name: &'static CStr,
    pub replacement: Replacement,
}

// 单项安装结果，只用于日志和记录，不参与控制流
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InstallationOutcome {
    Installed,
    NotFound,
    InstallError(Errno),
}

impl InstallationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "INSTALLED",
            Self::NotFound => "NOT_FOUND",
            Self::InstallError(_) => "ERROR",
        }
    }

    pub fn errno(&self) -> Errno {
        match self {
            Self::Installed => Errno::Ok,
            Self::NotFound => Errno::NoSym,
            Self::InstallError(errno) => *errno,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HookKind {
    Native,
    Objc,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntryReport {
    pub name: String,
    pub kind: HookKind,
    pub target_addr: usize,
    pub new_addr: usize,
    pub outcome: InstallationOutcome,
}

// ObjC 补丁阶段的整体状态
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RuntimeStatus {
    NotAttempted,
    Unavailable,
    ClassMissing,
    Probed,
}

impl RuntimeStatus {
    pub fn errno(&self) -> Errno {
        match self {
            Self::Unavailable => Errno::RuntimeUnavailable,
            Self::ClassMissing => Errno::NoClass,
            Self::NotAttempted | Self::Probed => Errno::Ok,
        }
    }
}

// 一次安装过程的汇总结果
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstallReport {
    pub entries: Vec<EntryReport>,
    pub runtime: RuntimeStatus,
    // 被故障边界捕获的组件名
    pub faults: Vec<&'static str>,
}

impl InstallReport {
    pub fn outcome_of(&self, name: &str) -> Option<InstallationOutcome> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.outcome)
    }

    pub fn installed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome == InstallationOutcome::Installed)
            .count()
    }
}

// Pending -> Installed 单向状态机，Installed 表示“已尝试安装”而非“全部成功”
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InstallState {
    Pending,
    Installed,
}

// 安装选项，可由环境变量 EXIT_GUARD_DELAY_MS / EXIT_GUARD_DEBUG / EXIT_GUARD_RECORD 覆盖
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InstallOptions {
    pub delay: Duration,
    pub debug: bool,
    pub recordable: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            delay: runtime::DEFAULT_INSTALL_DELAY,
            debug: false,
            recordable: true,
        }
    }
}

impl InstallOptions {
    pub fn from_env() -> Self {
        runtime::options_from_env()
    }
}

// 符号解析：在所有已加载模块中查找导出符号，找不到返回 None
pub trait SymbolResolver {
    fn resolve(&self, name: &CStr) -> Option<usize>;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Redirect {
    Patched,
    AlreadyRedirected,
}

// 代码补丁：把 target 处的函数入口整体重定向到 replacement
pub trait CodePatcher {
    fn redirect(&self, target: usize, replacement: usize) -> Result<Redirect, Errno>;
}

// ObjC 类句柄（Class 指针的数值形式）
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClassHandle(pub usize);

// 方法替换体，遵守 ObjC 隐式参数约定 (self, _cmd)
pub type NoopImp = unsafe extern "C" fn(receiver: *mut c_void, selector: *const c_void);

// 能力探测三态
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Capability {
    Present,
    Absent,
    RuntimeUnavailable,
}

// 动态对象运行时的内省与方法替换能力
pub trait ObjcRuntime {
    fn is_available(&self) -> bool;
    fn lookup_class(&self, name: &CStr) -> Option<ClassHandle>;
    fn instances_respond_to(&self, class: ClassHandle, selector: &CStr) -> bool;
    fn replace_method(&self, class: ClassHandle, selector: &CStr, imp: NoopImp)
    -> Result<(), Errno>;
}

// 一次安装所需的全部外部能力
#[derive(Copy, Clone)]
pub struct InstallEnv<'a> {
    pub resolver: &'a dyn SymbolResolver,
    pub patcher: &'a dyn CodePatcher,
    pub objc: &'a dyn ObjcRuntime,
}

// RPC 导出表项，目前没有任何导出
#[derive(Copy, Clone, Debug)]
pub struct RpcExport {
    pub name: &'static str,
    pub handler: fn(&[u8]) -> Vec<u8>,
}

// 记录字段掩码
pub const RECORD_ITEM_ALL: u32 = 0x7F;
pub const RECORD_ITEM_TIMESTAMP: u32 = 1 << 0;
pub const RECORD_ITEM_OP: u32 = 1 << 1;
pub const RECORD_ITEM_NAME: u32 = 1 << 2;
pub const RECORD_ITEM_TARGET_ADDR: u32 = 1 << 3;
pub const RECORD_ITEM_NEW_ADDR: u32 = 1 << 4;
pub const RECORD_ITEM_OUTCOME: u32 = 1 << 5;
pub const RECORD_ITEM_ERRNO: u32 = 1 << 6;

pub fn get_version() -> String {
    runtime::get_version()
}

// 调度一次性延迟安装，重复调用不会再次调度
pub fn init(options: InstallOptions) -> Errno {
    runtime::init(options)
}

// 立即在当前线程执行安装；已安装时直接返回上次的报告
pub fn install_now() -> InstallReport {
    runtime::install_now()
}

// 使用调用方提供的外部能力执行一次无状态安装，可重复调用
pub fn install_with(env: &InstallEnv<'_>) -> InstallReport {
    runtime::install_with(env)
}

pub fn get_state() -> InstallState {
    runtime::get_state()
}

pub fn get_report() -> Option<InstallReport> {
    runtime::get_report()
}

pub fn override_catalog() -> &'static [OverrideEntry] {
    runtime::override_catalog()
}

pub fn get_debug() -> bool {
    runtime::get_debug()
}

pub fn set_debug(debug: bool) {
    runtime::set_debug(debug)
}

pub fn get_recordable() -> bool {
    runtime::get_recordable()
}

pub fn set_recordable(recordable: bool) {
    runtime::set_recordable(recordable)
}

// 按字段掩码导出安装记录文本
pub fn get_records(item_flags: u32) -> Option<String> {
    runtime::get_records(item_flags)
}

// 按字段掩码将安装记录写入文件描述符
pub fn dump_records(fd: i32, item_flags: u32) -> Errno {
    runtime::dump_records(fd, item_flags)
}

pub fn rpc_exports() -> &'static [RpcExport] {
    runtime::rpc_exports()
}
