use super::*;
use crate::{BackingFile, LazyLoad, PageKind};

const HEAP: usize = 0x2000_0000;
const MAP: usize = 0x3000_0000;

fn pattern(seed: u8) -> Vec<u8> {
    (0..PAGE_SIZE).map(|i| (i as u8).wrapping_mul(31) ^ seed).collect()
}

fn map_file(space: &mut AddressSpace, file: &Arc<MemFile>, addr: usize) {
    let backing: Arc<dyn BackingFile> = file.clone();
    space
        .alloc_page_with_initializer(
            PageKind::File,
            va(addr),
            true,
            Some(LazyLoad::new(backing, 0, PAGE_SIZE)),
        )
        .unwrap();
}

#[test]
fn test_eviction_round_trips_through_swap() {
    let vm = test_vm(2, 4);
    let (mut space, pt) = new_space(&vm, 1);
    for i in 0..3 {
        space.alloc_page(PageKind::Anon, va(HEAP + i * PAGE_SIZE), true).unwrap();
    }
    space.claim_page(va(HEAP)).unwrap();
    space.write_bytes_at(va(HEAP), &pattern(0x5a)).unwrap();
    space.claim_page(va(HEAP + PAGE_SIZE)).unwrap();
    assert_eq!(vm.swap().in_use(), 0);

    space.claim_page(va(HEAP + 2 * PAGE_SIZE)).unwrap();
    let evicted: Vec<usize> = (0..3)
        .filter(|i| !space.find_page(va(HEAP + i * PAGE_SIZE)).unwrap().is_resident())
        .collect();
    assert_eq!(evicted, vec![0]);

    let page0 = space.find_page(va(HEAP)).unwrap();
    assert_eq!(page0.frame(), None);
    assert!(page0.swap_slot().is_some());
    assert_eq!(pt.translate(HEAP), None);
    assert_eq!(vm.swap().in_use(), 1);

    // Bringing page 0 back evicts page 1 and frees page 0's slot.
    assert_eq!(claim_and_read(&mut space, HEAP), pattern(0x5a));
    assert_eq!(page0.swap_slot(), None);
    assert!(!space.find_page(va(HEAP + PAGE_SIZE)).unwrap().is_resident());
    assert_eq!(vm.swap().in_use(), 1);
}

#[test]
fn test_never_swapped_anon_page_is_zero() {
    let vm = test_vm(1, 0);
    let (mut space, _pt) = new_space(&vm, 1);
    space.alloc_page(PageKind::Anon, va(HEAP), true).unwrap();
    assert!(claim_and_read(&mut space, HEAP).iter().all(|&b| b == 0));
}

#[test]
#[should_panic(expected = "eviction failed")]
fn test_swap_exhaustion_is_fatal() {
    let vm = test_vm(1, 0);
    let (mut space, _pt) = new_space(&vm, 1);
    space.alloc_page(PageKind::Anon, va(HEAP), true).unwrap();
    space.alloc_page(PageKind::Anon, va(HEAP + PAGE_SIZE), true).unwrap();
    space.claim_page(va(HEAP)).unwrap();
    let _ = space.claim_page(va(HEAP + PAGE_SIZE));
}

#[test]
fn test_kill_frees_swap_slots() {
    let vm = test_vm(1, 4);
    let (mut space, _pt) = new_space(&vm, 1);
    for i in 0..3 {
        space.alloc_page(PageKind::Anon, va(HEAP + i * PAGE_SIZE), true).unwrap();
        space.claim_page(va(HEAP + i * PAGE_SIZE)).unwrap();
    }
    assert_eq!(vm.swap().in_use(), 2);

    space.kill();
    assert_eq!(vm.swap().in_use(), 0);
    assert!(vm.frames().is_empty());
}

#[test]
fn test_dirty_file_page_written_back_on_eviction() {
    let vm = test_vm(1, 4);
    let (mut space, _pt) = new_space(&vm, 1);
    let file = MemFile::new(vec![0u8; PAGE_SIZE]);
    map_file(&mut space, &file, MAP);
    space.alloc_page(PageKind::Anon, va(HEAP), true).unwrap();

    space.claim_page(va(MAP)).unwrap();
    space.write_bytes_at(va(MAP + 16), b"hello").unwrap();
    assert_eq!(file.writes(), 0);

    space.claim_page(va(HEAP)).unwrap();
    let page = space.find_page(va(MAP)).unwrap();
    assert!(!page.is_resident());
    assert_eq!(page.swap_slot(), None);
    assert_eq!(file.writes(), 1);
    assert_eq!(&file.contents()[16..21], b"hello");

    // Re-read from the file; the page is clean again so a second eviction writes nothing.
    let content = claim_and_read(&mut space, MAP);
    assert_eq!(&content[16..21], b"hello");
    space.claim_page(va(HEAP)).unwrap();
    assert_eq!(file.writes(), 1);
}

#[test]
fn test_clean_file_page_is_not_written_back() {
    let vm = test_vm(1, 4);
    let (mut space, _pt) = new_space(&vm, 1);
    let file = MemFile::new(pattern(3));
    map_file(&mut space, &file, MAP);
    space.alloc_page(PageKind::Anon, va(HEAP), true).unwrap();

    assert_eq!(claim_and_read(&mut space, MAP), pattern(3));
    space.claim_page(va(HEAP)).unwrap();
    assert_eq!(file.writes(), 0);

    space.kill();
    assert_eq!(file.writes(), 0);
}

#[test]
fn test_dirty_file_page_flushed_on_teardown() {
    let vm = test_vm(4, 0);
    let (mut space, _pt) = new_space(&vm, 1);
    let file = MemFile::new(vec![0u8; PAGE_SIZE]);
    let other = MemFile::new(vec![0u8; PAGE_SIZE]);
    map_file(&mut space, &file, MAP);
    map_file(&mut space, &other, MAP + PAGE_SIZE);

    space.claim_page(va(MAP)).unwrap();
    space.claim_page(va(MAP + PAGE_SIZE)).unwrap();
    space.write_bytes_at(va(MAP), b"bye").unwrap();
    space.write_bytes_at(va(MAP + PAGE_SIZE), b"gone").unwrap();

    space.remove_page(va(MAP + PAGE_SIZE)).unwrap();
    assert_eq!(&other.contents()[..4], b"gone");

    drop(space);
    assert_eq!(file.writes(), 1);
    assert_eq!(&file.contents()[..3], b"bye");
    assert!(vm.frames().len() <= 1);
}
