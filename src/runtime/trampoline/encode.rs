// 重定向指令编码：近跳优先，超出范围时使用绝对地址跳转
// 两个架构的编码器都是纯函数，宿主架构只决定使用哪一个

pub(crate) const MAX_STUB_LEN: usize = 16;

// x86_64 E9 rel32
const X86_JMP_REL32: u8 = 0xE9;
const X86_JMP_REL32_SIZE: usize = 5;
// x86_64 FF 25 00000000: jmp qword ptr [rip+0]，紧跟 8 字节目标地址
const X86_JMP_ABS_PREFIX: [u8; 6] = [0xFF, 0x25, 0x00, 0x00, 0x00, 0x00];
const X86_JMP_ABS_SIZE: usize = 14;

// ARM64 B imm26，范围 ±128MB
const ARM64_B: u32 = 0x1400_0000;
const ARM64_B_RANGE: i64 = 1 << 27;
// ARM64 LDR X16, #8 / BR X16，紧跟 8 字节目标地址
const ARM64_LDR_X16_LITERAL8: u32 = 0x5800_0050;
const ARM64_BR_X16: u32 = 0xd61f_0200;
const ARM64_JMP_ABS_SIZE: usize = 16;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct RedirectStub {
    bytes: [u8; MAX_STUB_LEN],
    len: usize,
}

impl RedirectStub {
    fn from_slice(slice: &[u8]) -> Self {
        let mut bytes = [0u8; MAX_STUB_LEN];
        bytes[..slice.len()].copy_from_slice(slice);
        Self {
            bytes,
            len: slice.len(),
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

// 宿主架构的重定向编码
pub(crate) fn encode_redirect(from: usize, to: usize) -> RedirectStub {
    #[cfg(target_arch = "x86_64")]
    {
        encode_x86_64(from, to)
    }
    #[cfg(target_arch = "aarch64")]
    {
        encode_aarch64(from, to)
    }
}

pub(crate) fn encode_x86_64(from: usize, to: usize) -> RedirectStub {
    let next = (from as i64).wrapping_add(X86_JMP_REL32_SIZE as i64);
    let delta = (to as i64).wrapping_sub(next);
    if let Ok(rel32) = i32::try_from(delta) {
        let mut stub = [0u8; X86_JMP_REL32_SIZE];
        stub[0] = X86_JMP_REL32;
        stub[1..].copy_from_slice(&rel32.to_le_bytes());
        return RedirectStub::from_slice(&stub);
    }

    let mut stub = [0u8; X86_JMP_ABS_SIZE];
    stub[..6].copy_from_slice(&X86_JMP_ABS_PREFIX);
    stub[6..].copy_from_slice(&(to as u64).to_le_bytes());
    RedirectStub::from_slice(&stub)
}

pub(crate) fn encode_aarch64(from: usize, to: usize) -> RedirectStub {
    let delta = (to as i64).wrapping_sub(from as i64);
    if delta % 4 == 0 && (-ARM64_B_RANGE..ARM64_B_RANGE).contains(&delta) {
        let imm26 = ((delta >> 2) as u32) & 0x03ff_ffff;
        return RedirectStub::from_slice(&(ARM64_B | imm26).to_le_bytes());
    }

    let mut stub = [0u8; ARM64_JMP_ABS_SIZE];
    stub[..4].copy_from_slice(&ARM64_LDR_X16_LITERAL8.to_le_bytes());
    stub[4..8].copy_from_slice(&ARM64_BR_X16.to_le_bytes());
    stub[8..].copy_from_slice(&(to as u64).to_le_bytes());
    RedirectStub::from_slice(&stub)
}
