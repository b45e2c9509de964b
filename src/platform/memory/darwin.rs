// Darwin 代码页写入
// 签名页和 dyld 共享缓存页的最大权限通常只有 r-x，直接 mprotect 加写权限会失败
// 依次尝试：可写别名映射、内核写入、整页替换，最后才退回 mprotect
use super::{
    PROT_RWX_FLAGS, PROT_READ_FLAG, PageProtect, code_matches, page_bounds, page_size,
    patch_via_mprotect, write_code,
};
use crate::errno::Errno;
use crate::log;
use mach2::boolean::boolean_t;
use mach2::kern_return::{KERN_SUCCESS, kern_return_t};
use mach2::message::mach_msg_type_number_t;
use mach2::traps::mach_task_self;
use mach2::vm::{
    mach_vm_allocate, mach_vm_deallocate, mach_vm_protect, mach_vm_region, mach_vm_write,
};
use mach2::vm_inherit::{VM_INHERIT_COPY, VM_INHERIT_NONE, vm_inherit_t};
use mach2::vm_prot::{VM_PROT_READ, VM_PROT_WRITE, vm_prot_t};
use mach2::vm_region::{VM_REGION_BASIC_INFO_64, vm_region_basic_info_64, vm_region_info_t};
use mach2::vm_statistics::{VM_FLAGS_ANYWHERE, VM_FLAGS_FIXED};
use mach2::vm_types::{
    mach_vm_address_t, mach_vm_size_t, vm_address_t, vm_map_t, vm_offset_t, vm_size_t,
};
use std::ptr;

const FALSE: boolean_t = 0;
const TRUE: boolean_t = 1;
const VM_FLAGS_OVERWRITE: libc::c_int = 0x4000;

unsafe extern "C" {
    fn vm_remap(
        target_task: vm_map_t,
        target_address: *mut vm_address_t,
        size: vm_size_t,
        mask: vm_address_t,
        flags: libc::c_int,
        src_task: vm_map_t,
        src_address: vm_address_t,
        copy: boolean_t,
        cur_protection: *mut vm_prot_t,
        max_protection: *mut vm_prot_t,
        inheritance: vm_inherit_t,
    ) -> kern_return_t;
}

pub(super) fn get_page_protects(addr: usize, len: usize) -> Result<Vec<PageProtect>, Errno> {
    if addr == 0 || len == 0 {
        return Err(Errno::InvalidArg);
    }
    let size = page_size();
    let (first, span) = page_bounds(addr, len);
    (0..span / size)
        .map(|index| region_protect(first + index * size))
        .collect()
}

// mach_vm_region 找不到包含 page 的区域时会返回下一个区域，起点越过 page 即未映射
fn region_protect(page: usize) -> Result<PageProtect, Errno> {
    let mut region_addr = page as mach_vm_address_t;
    let mut region_size: mach_vm_size_t = 0;
    let mut info: vm_region_basic_info_64 = unsafe { std::mem::zeroed() };
    let mut info_count = vm_region_basic_info_64::count();
    let mut object_name: u32 = 0;

    let kr = unsafe {
        mach_vm_region(
            mach_task_self(),
            &mut region_addr,
            &mut region_size,
            VM_REGION_BASIC_INFO_64,
            (&mut info as *mut vm_region_basic_info_64) as vm_region_info_t,
            &mut info_count,
            &mut object_name,
        )
    };
    if kr != KERN_SUCCESS || region_addr > page as mach_vm_address_t {
        return Err(Errno::GetProt);
    }

    // __PAGEZERO 之类的区域存在但不可访问
    let prot = info.protection as u32 & PROT_RWX_FLAGS;
    if prot == 0 {
        return Err(Errno::GetProt);
    }
    Ok(PageProtect { start: page, prot })
}

pub(super) unsafe fn patch_code(
    addr: usize,
    bytes: &[u8],
    pages: &[PageProtect],
) -> Result<(), Errno> {
    let Some(first) = pages.first() else {
        return Err(Errno::InvalidArg);
    };
    let page_start = first.start;
    let map_size = pages.len() * page_size();

    if patch_via_alias(page_start, map_size, addr, bytes) {
        return Ok(());
    }
    if patch_via_mach_write(addr, bytes) {
        return Ok(());
    }
    if patch_via_remap_overwrite(page_start, map_size, addr, bytes, pages) {
        return Ok(());
    }
    log::debug(format_args!(
        "mach paths failed @ 0x{:x}, falling back to mprotect",
        addr
    ));
    patch_via_mprotect(addr, bytes, pages)
}

// 把原页面再映射一份，只给别名加写权限，原映射的属性和签名状态不变
unsafe fn patch_via_alias(page_start: usize, map_size: usize, addr: usize, bytes: &[u8]) -> bool {
    let task = mach_task_self();
    let mut alias: vm_address_t = 0;
    let mut cur_prot: vm_prot_t = 0;
    let mut max_prot: vm_prot_t = 0;

    let kr = vm_remap(
        task,
        &mut alias,
        map_size as vm_size_t,
        0,
        VM_FLAGS_ANYWHERE,
        task,
        page_start as vm_address_t,
        FALSE,
        &mut cur_prot,
        &mut max_prot,
        VM_INHERIT_NONE,
    );
    if kr != KERN_SUCCESS {
        log::debug(format_args!(
            "vm_remap alias failed kr={} page=0x{:x}",
            kr, page_start
        ));
        return false;
    }

    let kr = mach_vm_protect(
        task,
        alias as mach_vm_address_t,
        map_size as mach_vm_size_t,
        FALSE,
        VM_PROT_READ | VM_PROT_WRITE,
    );
    let written = kr == KERN_SUCCESS;
    if written {
        write_code(alias as usize + (addr - page_start), bytes);
    } else {
        log::debug(format_args!(
            "alias protect failed kr={} max_prot=0x{:x}",
            kr, max_prot
        ));
    }
    let _ = mach_vm_deallocate(task, alias as mach_vm_address_t, map_size as mach_vm_size_t);

    // 写时复制会让别名上的写入落到私有副本，原地址看不到
    written && code_matches(addr, bytes)
}

unsafe fn patch_via_mach_write(addr: usize, bytes: &[u8]) -> bool {
    let kr = mach_vm_write(
        mach_task_self(),
        addr as mach_vm_address_t,
        bytes.as_ptr() as vm_offset_t,
        bytes.len() as mach_msg_type_number_t,
    );
    if kr != KERN_SUCCESS {
        log::debug(format_args!("mach_vm_write failed kr={} addr=0x{:x}", kr, addr));
        return false;
    }
    code_matches(addr, bytes)
}

// 复制整页、改好后用 FIXED|OVERWRITE 映射回原地址
unsafe fn patch_via_remap_overwrite(
    page_start: usize,
    map_size: usize,
    addr: usize,
    bytes: &[u8],
    pages: &[PageProtect],
) -> bool {
    if pages.iter().any(|page| page.prot & PROT_READ_FLAG == 0) {
        return false;
    }

    let task = mach_task_self();
    let mut scratch: mach_vm_address_t = 0;
    let kr = mach_vm_allocate(
        task,
        &mut scratch,
        map_size as mach_vm_size_t,
        VM_FLAGS_ANYWHERE,
    );
    if kr != KERN_SUCCESS {
        log::debug(format_args!("mach_vm_allocate failed kr={}", kr));
        return false;
    }

    let scratch_addr = scratch as usize;
    ptr::copy_nonoverlapping(page_start as *const u8, scratch_addr as *mut u8, map_size);
    ptr::copy_nonoverlapping(
        bytes.as_ptr(),
        (scratch_addr + (addr - page_start)) as *mut u8,
        bytes.len(),
    );

    // 覆盖后的映射继承副本的属性，先把副本逐页设回原始属性
    let size = page_size();
    for (index, page) in pages.iter().enumerate() {
        let _ = mach_vm_protect(
            task,
            (scratch_addr + index * size) as mach_vm_address_t,
            size as mach_vm_size_t,
            FALSE,
            page.prot as vm_prot_t,
        );
    }

    let mut target = page_start as vm_address_t;
    let mut cur_prot: vm_prot_t = 0;
    let mut max_prot: vm_prot_t = 0;
    let kr = vm_remap(
        task,
        &mut target,
        map_size as vm_size_t,
        0,
        VM_FLAGS_FIXED | VM_FLAGS_OVERWRITE,
        task,
        scratch_addr as vm_address_t,
        TRUE,
        &mut cur_prot,
        &mut max_prot,
        VM_INHERIT_COPY,
    );
    let _ = mach_vm_deallocate(task, scratch, map_size as mach_vm_size_t);

    if kr != KERN_SUCCESS {
        log::debug(format_args!(
            "vm_remap overwrite failed kr={} page=0x{:x}",
            kr, page_start
        ));
        return false;
    }
    code_matches(addr, bytes)
}

#[cfg(test)]
mod tests {
    use super::get_page_protects;
    use crate::errno::Errno;
    use crate::platform::memory::{PROT_EXEC_FLAG, PROT_READ_FLAG};

    #[test]
    fn libc_text_is_readable_and_executable() {
        let addr = libc::getpid as *const () as usize;
        let pages = get_page_protects(addr, 16).unwrap();
        assert!(!pages.is_empty());
        for page in pages {
            assert_eq!(page.prot & (PROT_READ_FLAG | PROT_EXEC_FLAG), PROT_READ_FLAG | PROT_EXEC_FLAG);
        }
    }

    #[test]
    fn page_zero_is_rejected() {
        assert_eq!(get_page_protects(0x1000, 16), Err(Errno::GetProt));
    }
}
