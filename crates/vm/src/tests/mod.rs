// Unit tests for the vm crate.
//
// Physical memory is a leaked, page-aligned heap buffer; `test_support::mock::mm::MOCK_MM_OPS`
// maps it 1:1, so a frame's Ppn is simply its heap address divided by PAGE_SIZE.

extern crate std;

use std::boxed::Box;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread;
use std::vec;
use std::vec::Vec;

use crate::{
    AddressSpace, BackingFile, FrameAllocator, PageFault, PageTable, Pid, Ppn, PteFlags,
    SwapDevice, SwapTable, UsizeConvert, Vaddr, Vm, VmError, VmResult, Vpn, PAGE_SIZE,
};

mod backend;
mod fork;

// ---------------------------------------------------------------------------
// sync::ArchOps
// ---------------------------------------------------------------------------

struct TestArch;

impl sync::ArchOps for TestArch {
    unsafe fn read_and_disable_interrupts(&self) -> usize {
        0
    }

    unsafe fn restore_interrupts(&self, _flags: usize) {}

    fn sstatus_sie(&self) -> usize {
        0x2
    }

    fn yield_now(&self) {
        thread::yield_now();
    }
}

static TEST_ARCH: TestArch = TestArch;
static REGISTER: Once = Once::new();

/// The `sync` crate is built without `cfg(test)` here, so its mock fallback is not available.
fn setup() {
    REGISTER.call_once(|| unsafe { sync::register_arch_ops(&TEST_ARCH) });
}

// ---------------------------------------------------------------------------
// Hardware page table
// ---------------------------------------------------------------------------

pub(crate) struct MockPageTable {
    entries: Mutex<BTreeMap<Vpn, (Ppn, PteFlags)>>,
    fail_map: AtomicBool,
}

impl MockPageTable {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(BTreeMap::new()),
            fail_map: AtomicBool::new(false),
        })
    }

    pub(crate) fn fail_maps(&self) {
        self.fail_map.store(true, Ordering::SeqCst);
    }

    pub(crate) fn translate(&self, va: usize) -> Option<Ppn> {
        self.walk(Vpn::from_usize(va / PAGE_SIZE)).map(|(ppn, _)| ppn)
    }

    pub(crate) fn flags(&self, va: usize) -> Option<PteFlags> {
        self.walk(Vpn::from_usize(va / PAGE_SIZE)).map(|(_, flags)| flags)
    }

    pub(crate) fn mapped_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl PageTable for MockPageTable {
    fn map(&self, vpn: Vpn, ppn: Ppn, writable: bool) -> VmResult<()> {
        if self.fail_map.load(Ordering::SeqCst) {
            return Err(VmError::MappingFailed);
        }
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(&vpn) {
            return Err(VmError::AlreadyMapped);
        }
        let mut flags = PteFlags::VALID | PteFlags::USER;
        flags.set(PteFlags::WRITABLE, writable);
        entries.insert(vpn, (ppn, flags));
        Ok(())
    }

    fn unmap(&self, vpn: Vpn) {
        self.entries.lock().unwrap().remove(&vpn);
    }

    fn walk(&self, vpn: Vpn) -> Option<(Ppn, PteFlags)> {
        self.entries.lock().unwrap().get(&vpn).copied()
    }

    fn update_flags(&self, vpn: Vpn, flags: PteFlags) -> VmResult<()> {
        match self.entries.lock().unwrap().get_mut(&vpn) {
            Some(entry) => {
                entry.1 = flags;
                Ok(())
            }
            None => Err(VmError::NotMapped),
        }
    }
}

// ---------------------------------------------------------------------------
// File and swap device
// ---------------------------------------------------------------------------

pub(crate) struct MemFile {
    data: Mutex<Vec<u8>>,
    writes: AtomicUsize,
}

impl MemFile {
    pub(crate) fn new(data: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(data),
            writes: AtomicUsize::new(0),
        })
    }

    pub(crate) fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl BackingFile for MemFile {
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> VmResult<usize> {
        let data = self.data.lock().unwrap();
        if offset >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    fn write_at(&self, offset: usize, buf: &[u8]) -> VmResult<usize> {
        let mut data = self.data.lock().unwrap();
        if data.len() < offset + buf.len() {
            data.resize(offset + buf.len(), 0);
        }
        data[offset..offset + buf.len()].copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(buf.len())
    }
}

pub(crate) struct MemSwap {
    slots: Mutex<Vec<Vec<u8>>>,
}

impl MemSwap {
    pub(crate) fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(vec![vec![0u8; PAGE_SIZE]; count]),
        })
    }
}

impl SwapDevice for MemSwap {
    fn slot_count(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    fn read_slot(&self, slot: usize, buf: &mut [u8]) -> VmResult<()> {
        let slots = self.slots.lock().unwrap();
        buf.copy_from_slice(slots.get(slot).ok_or(VmError::Io)?);
        Ok(())
    }

    fn write_slot(&self, slot: usize, buf: &[u8]) -> VmResult<()> {
        let mut slots = self.slots.lock().unwrap();
        slots.get_mut(slot).ok_or(VmError::Io)?.copy_from_slice(buf);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Clone)]
#[repr(C, align(4096))]
struct PageBuf([u8; PAGE_SIZE]);

/// Carve out `frames` physical frames from leaked heap memory.
fn leak_pool(frames: usize) -> (usize, usize) {
    let pool: &'static mut [PageBuf] =
        Box::leak(vec![PageBuf([0; PAGE_SIZE]); frames].into_boxed_slice());
    let start = pool.as_ptr() as usize;
    (start, start + frames * PAGE_SIZE)
}

/// A VM manager over `frames` frames and `swap_slots` swap slots (no swap device when 0).
pub(crate) fn test_vm(frames: usize, swap_slots: usize) -> Arc<Vm> {
    setup();
    let (start, end) = leak_pool(frames);
    let swap = if swap_slots == 0 {
        SwapTable::empty()
    } else {
        SwapTable::new(MemSwap::new(swap_slots))
    };
    Arc::new(Vm::new(FrameAllocator::from_addr_range(start, end), swap))
}

pub(crate) fn new_space(vm: &Arc<Vm>, pid: Pid) -> (AddressSpace, Arc<MockPageTable>) {
    let pt = MockPageTable::new();
    (AddressSpace::new(vm.clone(), pid, pt.clone()), pt)
}

pub(crate) fn va(addr: usize) -> Vaddr {
    Vaddr::from_usize(addr)
}

/// Claims the page at `addr` and returns its full contents.
pub(crate) fn claim_and_read(space: &mut AddressSpace, addr: usize) -> Vec<u8> {
    space.claim_page(va(addr)).unwrap();
    let mut buf = vec![0u8; PAGE_SIZE];
    space.read_bytes_at(va(addr), &mut buf).unwrap();
    buf
}

pub(crate) fn user_fault(addr: usize, write: bool, rsp: usize) -> PageFault {
    PageFault {
        addr: va(addr),
        user: true,
        write,
        not_present: true,
        rsp,
    }
}

pub(crate) const STACK_TOP: usize = 0x4748_0000;
pub(crate) const MAX_STACK: usize = 1024 * 1024;
