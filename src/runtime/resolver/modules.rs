// 已加载模块枚举：Linux/Android 解析 /proc/self/maps，Darwin 使用 dyld 镜像列表
use std::collections::BTreeSet;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) fn loaded_module_paths() -> Vec<String> {
    let Ok(content) = std::fs::read_to_string("/proc/self/maps") else {
        return Vec::new();
    };
    module_paths_from_maps(&content)
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub(crate) fn loaded_module_paths() -> Vec<String> {
    use std::ffi::CStr;

    let count = unsafe { libc::_dyld_image_count() };
    let mut paths = Vec::with_capacity(count as usize);
    for index in 0..count {
        let name = unsafe { libc::_dyld_get_image_name(index) };
        if name.is_null() {
            continue;
        }
        if let Ok(path) = unsafe { CStr::from_ptr(name) }.to_str() {
            paths.push(path.to_string());
        }
    }
    paths
}

// 按出现顺序去重，保证查找顺序与加载顺序一致
pub(crate) fn module_paths_from_maps(content: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut paths = Vec::new();
    for line in content.lines() {
        let Some(pathname) = parse_maps_line(line) else {
            continue;
        };
        if seen.insert(pathname.to_string()) {
            paths.push(pathname.to_string());
        }
    }
    paths
}

// 解析单行 maps 记录，仅保留 offset=0 的可读共享库/linker 映射
fn parse_maps_line(line: &str) -> Option<&str> {
    let mut fields = line.split_whitespace();
    let _range = fields.next()?;
    let perms = fields.next()?;
    let offset = fields.next()?;
    let _dev = fields.next()?;
    let _inode = fields.next()?;
    let pathname = fields.next()?;

    if !pathname.starts_with('/') || !is_probable_elf_path(pathname) {
        return None;
    }
    if !perms.starts_with('r') {
        return None;
    }
    let offset = usize::from_str_radix(offset, 16).ok()?;
    if offset != 0 {
        return None;
    }
    Some(pathname)
}

// glibc 的库名带版本后缀（libc.so.6），因此按 ".so" 子串判断
fn is_probable_elf_path(pathname: &str) -> bool {
    pathname.ends_with(".so")
        || pathname.contains(".so.")
        || pathname.ends_with("/linker")
        || pathname.ends_with("/linker64")
}

// 纯路径匹配：绝对路径要求完全相等，相对路径使用后缀匹配
pub(crate) fn path_match(module_path: &str, scope: &str) -> bool {
    if scope.is_empty() {
        return false;
    }
    if scope.starts_with('/') {
        module_path == scope
    } else {
        module_path.ends_with(scope)
    }
}
