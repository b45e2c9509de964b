// 函数入口重定向：把目标函数开头改写为跳往替换体的跳转指令
// 所有失败都以 Errno 返回，不会在未确认映射的地址上写入
use crate::api::{CodePatcher, InstallationOutcome, Redirect, Replacement};
use crate::errno::Errno;
use crate::log;
use crate::platform::memory::{
    PROT_READ_FLAG, code_matches, flush_instruction_cache_range, get_page_protects, patch_code,
};

mod encode;

pub(crate) use encode::encode_redirect;

#[derive(Clone, Copy, Debug, Default)]
pub struct InlinePatcher;

impl InlinePatcher {
    pub fn new() -> Self {
        Self
    }
}

impl CodePatcher for InlinePatcher {
    fn redirect(&self, target: usize, replacement: usize) -> Result<Redirect, Errno> {
        if target == 0 || replacement == 0 {
            return Err(Errno::InvalidArg);
        }
        let stub = encode_redirect(target, replacement);
        let bytes = stub.as_bytes();

        // 同时校验映射存在，未映射的地址在这里被拒绝
        let pages = get_page_protects(target, stub.len())?;
        let readable = pages.iter().all(|page| page.prot & PROT_READ_FLAG != 0);
        if readable && unsafe { code_matches(target, bytes) } {
            return Ok(Redirect::AlreadyRedirected);
        }

        // 跨页时每页按各自原来的属性恢复
        unsafe {
            patch_code(target, bytes, &pages)?;
        }
        flush_instruction_cache_range(target, target + stub.len());

        if readable && !unsafe { code_matches(target, bytes) } {
            return Err(Errno::PatchVerify);
        }
        Ok(Redirect::Patched)
    }
}

// 单个入口的安装：补丁失败只影响本项结果
pub(super) fn install(
    patcher: &dyn CodePatcher,
    name: &str,
    address: usize,
    replacement: Replacement,
) -> InstallationOutcome {
    match patcher.redirect(address, replacement.addr()) {
        Ok(Redirect::Patched) => {
            log::info(format_args!(
                "{} redirected 0x{:x} -> 0x{:x}",
                name,
                address,
                replacement.addr()
            ));
            InstallationOutcome::Installed
        }
        Ok(Redirect::AlreadyRedirected) => {
            log::debug(format_args!("{} already redirected @ 0x{:x}", name, address));
            InstallationOutcome::Installed
        }
        Err(errno) => {
            log::warn(format_args!(
                "{} redirect failed @ 0x{:x} errno={}",
                name,
                address,
                errno.as_i32()
            ));
            InstallationOutcome::InstallError(errno)
        }
    }
}
