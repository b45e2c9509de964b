// 符号解析：先 RTLD_DEFAULT 全局查找，失败后逐个已加载模块以 RTLD_NOLOAD 查找
// 不持有任何可变状态，可并发调用
use crate::api::SymbolResolver;
use crate::log;
use std::ffi::{CStr, CString, c_void};

mod modules;

pub(crate) use modules::{loaded_module_paths, path_match};

#[derive(Clone, Debug, Default)]
pub struct DlsymResolver {
    module_scope: Option<String>,
}

impl DlsymResolver {
    pub fn new() -> Self {
        Self::default()
    }

    // 仅在路径匹配 scope 的模块中查找
    // 绝对路径要求完全相等，相对路径使用后缀匹配
    pub fn with_module(scope: &str) -> Self {
        Self {
            module_scope: Some(scope.to_string()),
        }
    }

    pub fn module_scope(&self) -> Option<&str> {
        self.module_scope.as_deref()
    }

    fn resolve_in_modules(&self, name: &CStr) -> Option<usize> {
        for pathname in loaded_module_paths() {
            if let Some(scope) = self.module_scope.as_deref()
                && !path_match(&pathname, scope)
            {
                continue;
            }
            if let Some(addr) = resolve_symbol_from_library(&pathname, name) {
                log::debug(format_args!(
                    "{} resolved in {} @ 0x{:x}",
                    name.to_string_lossy(),
                    pathname,
                    addr
                ));
                return Some(addr);
            }
        }
        None
    }
}

impl SymbolResolver for DlsymResolver {
    fn resolve(&self, name: &CStr) -> Option<usize> {
        if self.module_scope.is_none()
            && let Some(addr) = resolve_symbol_from_handle(libc::RTLD_DEFAULT, name)
        {
            return Some(addr);
        }
        self.resolve_in_modules(name)
    }
}

fn resolve_symbol_from_handle(handle: *mut c_void, symbol: &CStr) -> Option<usize> {
    let addr = unsafe { libc::dlsym(handle, symbol.as_ptr()) } as usize;
    if addr == 0 {
        None
    } else {
        Some(strip_code_ptr(addr))
    }
}

fn resolve_symbol_from_library(pathname: &str, symbol: &CStr) -> Option<usize> {
    let lib_name = CString::new(pathname).ok()?;
    let handle = unsafe { libc::dlopen(lib_name.as_ptr(), libc::RTLD_NOW | libc::RTLD_NOLOAD) };
    if handle.is_null() {
        return None;
    }
    let addr = resolve_symbol_from_handle(handle, symbol);
    unsafe {
        libc::dlclose(handle);
    }
    addr
}

// arm64e 上 dlsym 返回的函数指针带 PAC 签名，补丁前需要还原为裸地址
#[cfg(all(target_arch = "aarch64", any(target_os = "macos", target_os = "ios")))]
#[inline]
pub(crate) fn strip_code_ptr(ptr: usize) -> usize {
    let mut x = ptr as u64;
    unsafe {
        core::arch::asm!("xpaci {0}", inout(reg) x, options(nostack, preserves_flags));
    }
    x as usize
}

#[cfg(not(all(target_arch = "aarch64", any(target_os = "macos", target_os = "ios"))))]
#[inline]
pub(crate) fn strip_code_ptr(ptr: usize) -> usize {
    ptr
}
