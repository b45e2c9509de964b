// 内存页面保护属性的读取、代码写入与指令缓存刷新
// Linux/Android 解析 /proc/self/maps，Darwin 通过 mach_vm_region 查询

use crate::errno::Errno;
use crate::log;
use std::ptr;
#[cfg(target_arch = "x86_64")]
use std::sync::atomic::fence;
use std::sync::atomic::{Ordering, compiler_fence};

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod darwin;

pub const PROT_READ_FLAG: u32 = 0x1;
pub const PROT_WRITE_FLAG: u32 = 0x2;
pub const PROT_EXEC_FLAG: u32 = 0x4;
pub const PROT_RWX_FLAGS: u32 = PROT_READ_FLAG | PROT_WRITE_FLAG | PROT_EXEC_FLAG;

// 首条指令最后写入，其余线程要么看到旧入口，要么看到完整的跳转
const HEAD_LEN: usize = 4;

// 单页写入前的保护属性，写入结束后逐页恢复
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageProtect {
    pub start: usize,
    pub prot: u32,
}

// 查询 [addr, addr+len) 覆盖的每一页的保护属性
// 任一页未映射或不可访问时返回 Err，调用方据此拒绝写入
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn get_page_protects(addr: usize, len: usize) -> Result<Vec<PageProtect>, Errno> {
    let content = std::fs::read_to_string("/proc/self/maps").map_err(|_| Errno::BadMaps)?;
    page_protects_from_maps(&content, addr, len, page_size())
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub fn get_page_protects(addr: usize, len: usize) -> Result<Vec<PageProtect>, Errno> {
    darwin::get_page_protects(addr, len)
}

// 按页查找覆盖它的私有映射，共享映射和 ---p 保护页都不接受
pub(crate) fn page_protects_from_maps(
    content: &str,
    addr: usize,
    len: usize,
    page_size: usize,
) -> Result<Vec<PageProtect>, Errno> {
    if addr == 0 || len == 0 {
        return Err(Errno::InvalidArg);
    }
    let segments: Vec<(usize, usize, u32)> =
        content.lines().filter_map(parse_private_segment).collect();
    let (first, span) = page_bounds_with(addr, len, page_size);

    (0..span / page_size)
        .map(|index| {
            let start = first + index * page_size;
            segments
                .iter()
                .find(|(seg_start, seg_end, _)| *seg_start <= start && start < *seg_end)
                .map(|(_, _, prot)| *prot)
                .filter(|prot| *prot != 0)
                .map(|prot| PageProtect { start, prot })
                .ok_or(Errno::GetProt)
        })
        .collect()
}

fn parse_private_segment(line: &str) -> Option<(usize, usize, u32)> {
    let mut parts = line.split_whitespace();
    let range = parts.next()?;
    let perm = parts.next()?.as_bytes();
    if perm.len() < 4 || perm[3] != b'p' {
        return None;
    }
    let (start_str, end_str) = range.split_once('-')?;
    let start = usize::from_str_radix(start_str, 16).ok()?;
    let end = usize::from_str_radix(end_str, 16).ok()?;
    Some((start, end, perm_flags(perm)))
}

fn perm_flags(perm: &[u8]) -> u32 {
    let mut prot = 0;
    if perm[0] == b'r' {
        prot |= PROT_READ_FLAG;
    }
    if perm[1] == b'w' {
        prot |= PROT_WRITE_FLAG;
    }
    if perm[2] == b'x' {
        prot |= PROT_EXEC_FLAG;
    }
    prot
}

// 修改 [addr, addr+len) 所覆盖页面的保护属性
pub fn set_mem_protect(addr: usize, len: usize, prot: u32) -> Result<(), Errno> {
    let (start, size) = page_bounds(addr, len);
    let result = unsafe { libc::mprotect(start as *mut libc::c_void, size, prot as i32) };
    if result != 0 {
        let err = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        log::warn(format_args!(
            "mprotect failed addr=0x{:x} len=0x{:x} prot={} errno={}",
            start, size, prot, err
        ));
        return Err(Errno::SetProt);
    }
    Ok(())
}

// 把 bytes 写到 addr 处的代码，pages 为写入前查询到的逐页属性
// 调用方负责写入后的指令缓存刷新与回读校验
pub unsafe fn patch_code(addr: usize, bytes: &[u8], pages: &[PageProtect]) -> Result<(), Errno> {
    if addr == 0 || bytes.is_empty() || pages.is_empty() {
        return Err(Errno::InvalidArg);
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        darwin::patch_code(addr, bytes, pages)
    }
    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    {
        patch_via_mprotect(addr, bytes, pages)
    }
}

// 覆盖的页面临时改为 rwx，写完后每页恢复各自原来的属性
pub(crate) unsafe fn patch_via_mprotect(
    addr: usize,
    bytes: &[u8],
    pages: &[PageProtect],
) -> Result<(), Errno> {
    let need_change = pages.iter().any(|page| page.prot != PROT_RWX_FLAGS);
    if need_change {
        set_mem_protect(addr, bytes.len(), PROT_RWX_FLAGS)?;
    }

    write_code(addr, bytes);

    if need_change {
        restore_page_protects(pages);
    }
    Ok(())
}

fn restore_page_protects(pages: &[PageProtect]) {
    let size = page_size();
    for page in pages {
        if set_mem_protect(page.start, size, page.prot).is_err() {
            log::warn(format_args!(
                "restore protection failed page=0x{:x} prot={}",
                page.start, page.prot
            ));
        }
    }
}

// 先写尾部，再以一次对齐的 32 位写入首条指令
pub(crate) unsafe fn write_code(addr: usize, bytes: &[u8]) {
    let head = bytes.len().min(HEAD_LEN);
    for (offset, byte) in bytes.iter().enumerate().skip(head) {
        ptr::write_volatile((addr + offset) as *mut u8, *byte);
    }
    compiler_fence(Ordering::SeqCst);

    if head == HEAD_LEN && addr % HEAD_LEN == 0 {
        let mut word = [0u8; HEAD_LEN];
        word.copy_from_slice(&bytes[..HEAD_LEN]);
        ptr::write_volatile(addr as *mut u32, u32::from_le_bytes(word));
    } else {
        for (offset, byte) in bytes.iter().enumerate().take(head) {
            ptr::write_volatile((addr + offset) as *mut u8, *byte);
        }
    }
}

pub unsafe fn code_matches(addr: usize, bytes: &[u8]) -> bool {
    bytes
        .iter()
        .enumerate()
        .all(|(offset, byte)| unsafe { ptr::read_volatile((addr + offset) as *const u8) } == *byte)
}

// 刷新指定地址范围的指令缓存
pub fn flush_instruction_cache_range(start: usize, end: usize) {
    if start == 0 || start >= end {
        return;
    }
    flush_instruction_cache_impl(start, end);
}

// aarch64: 逐行清理 dcache 再逐行无效化 icache，最后 dsb+isb 同步
// x86_64: 硬件保证缓存一致性，仅需内存屏障
fn flush_instruction_cache_impl(start: usize, end: usize) {
    #[cfg(target_arch = "aarch64")]
    {
        let (dcache_line, icache_line) = cache_line_size();
        let mut dcache_addr = align_down(start, dcache_line);
        while dcache_addr < end {
            unsafe {
                core::arch::asm!("dc cvau, {}", in(reg) dcache_addr, options(nostack, preserves_flags));
            }
            dcache_addr = dcache_addr.saturating_add(dcache_line);
        }
        unsafe {
            core::arch::asm!("dsb ish", options(nostack, preserves_flags));
        }

        let mut icache_addr = align_down(start, icache_line);
        while icache_addr < end {
            unsafe {
                core::arch::asm!("ic ivau, {}", in(reg) icache_addr, options(nostack, preserves_flags));
            }
            icache_addr = icache_addr.saturating_add(icache_line);
        }
        unsafe {
            core::arch::asm!("dsb ish", options(nostack, preserves_flags));
            core::arch::asm!("isb", options(nostack, preserves_flags));
        }
    }

    #[cfg(target_arch = "x86_64")]
    {
        let _ = (start, end);
        fence(Ordering::SeqCst);
    }
}

pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 { 4096 } else { size as usize }
}

// 计算 [addr, addr+len) 覆盖的页对齐起点和长度
pub(crate) fn page_bounds(addr: usize, len: usize) -> (usize, usize) {
    page_bounds_with(addr, len, page_size())
}

fn page_bounds_with(addr: usize, len: usize, page_size: usize) -> (usize, usize) {
    let page_mask = !(page_size - 1);
    let start = addr & page_mask;
    let last = addr.saturating_add(len.max(1) - 1) & page_mask;
    let end = last.saturating_add(page_size);
    (start, end - start)
}

// 读取 CTR_EL0 寄存器，返回 (dcache_line_size, icache_line_size)
#[cfg(target_arch = "aarch64")]
fn cache_line_size() -> (usize, usize) {
    let ctr_el0: usize;
    unsafe {
        core::arch::asm!("mrs {}, ctr_el0", out(reg) ctr_el0, options(nomem, nostack, preserves_flags));
    }

    let dcache_line = 4usize << ((ctr_el0 >> 16) & 0x0f);
    let icache_line = 4usize << (ctr_el0 & 0x0f);
    (dcache_line.max(4), icache_line.max(4))
}

#[cfg(target_arch = "aarch64")]
fn align_down(addr: usize, align: usize) -> usize {
    let mask = !(align.saturating_sub(1));
    addr & mask
}
