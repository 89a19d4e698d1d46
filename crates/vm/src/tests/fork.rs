use super::*;
use crate::{supplemental_page_table_copy, BackingFile, ForkHandshake, LazyLoad, PageKind};

const CODE: usize = 0x40_0000;
const HEAP: usize = 0x2000_0000;

fn parent_with_pages(vm: &Arc<Vm>) -> (AddressSpace, Arc<MockPageTable>, Arc<MemFile>) {
    let (mut parent, pt) = new_space(vm, 1);
    let file = MemFile::new(vec![0x11u8; 300]);
    let backing: Arc<dyn BackingFile> = file.clone();
    parent
        .load_segment(&backing, 0, va(CODE), 300, PAGE_SIZE - 300, false)
        .unwrap();
    parent.alloc_page(PageKind::Anon, va(HEAP), true).unwrap();
    parent.claim_page(va(HEAP)).unwrap();
    parent.write_bytes_at(va(HEAP), b"parent").unwrap();
    parent.setup_stack().unwrap();
    (parent, pt, file)
}

#[test]
fn test_child_gets_same_layout_and_private_copies() {
    let vm = test_vm(8, 0);
    let (parent, parent_pt, _file) = parent_with_pages(&vm);
    let child_pt = MockPageTable::new();
    let mut child = parent.duplicate(2, child_pt.clone()).unwrap();

    assert_eq!(child.pid(), 2);
    assert_eq!(child.spt().len(), parent.spt().len());
    for page in parent.spt().iter() {
        let copy = child.find_page(page.va()).unwrap();
        assert_eq!(copy.writable(), page.writable());
        assert_eq!(copy.kind(), page.kind());
        assert_eq!(copy.is_stack(), page.is_stack());
        assert_eq!(copy.pid(), 2);
    }
    assert_eq!(child.stack_bottom(), parent.stack_bottom());

    // The lazily loaded page stays lazy in both processes.
    assert!(child.find_page(va(CODE)).unwrap().is_uninit());

    // Resident pages are copied into distinct frames.
    assert_ne!(child_pt.translate(HEAP), parent_pt.translate(HEAP));
    let mut buf = [0u8; 6];
    child.read_bytes_at(va(HEAP), &mut buf).unwrap();
    assert_eq!(&buf, b"parent");

    parent.write_bytes_at(va(HEAP), b"PARENT").unwrap();
    child.read_bytes_at(va(HEAP), &mut buf).unwrap();
    assert_eq!(&buf, b"parent");

    child.write_bytes_at(va(HEAP), b"child!").unwrap();
    parent.read_bytes_at(va(HEAP), &mut buf).unwrap();
    assert_eq!(&buf, b"PARENT");

    let code = claim_and_read(&mut child, CODE);
    assert!(code[..300].iter().all(|&b| b == 0x11));
    assert!(code[300..].iter().all(|&b| b == 0));
    assert!(parent.find_page(va(CODE)).unwrap().is_uninit());
}

#[test]
fn test_fork_copies_swapped_out_page() {
    let vm = test_vm(2, 16);
    let (mut parent, _pt) = new_space(&vm, 1);
    for i in 0..3 {
        parent.alloc_page(PageKind::Anon, va(HEAP + i * PAGE_SIZE), true).unwrap();
        parent.claim_page(va(HEAP + i * PAGE_SIZE)).unwrap();
        parent
            .write_bytes_at(va(HEAP + i * PAGE_SIZE), &[i as u8 + 1; 8])
            .unwrap();
    }
    let swapped = parent.find_page(va(HEAP)).unwrap();
    let slot = swapped.swap_slot();
    assert!(slot.is_some());

    let (mut child, _child_pt) = new_space(&vm, 2);
    assert!(supplemental_page_table_copy(&mut child, &parent));

    // The parent's slot is untouched by the copy.
    assert!(!swapped.is_resident());
    assert_eq!(swapped.swap_slot(), slot);

    for i in 0..3 {
        let content = claim_and_read(&mut child, HEAP + i * PAGE_SIZE);
        assert_eq!(&content[..8], &[i as u8 + 1; 8]);
    }
    assert_eq!(&claim_and_read(&mut parent, HEAP)[..8], &[1u8; 8]);
}

#[test]
fn test_failed_fork_leaves_nothing_behind() {
    let vm = test_vm(8, 4);
    let (parent, _pt, _file) = parent_with_pages(&vm);
    let frames_before = vm.frames().len();
    let slots_before = vm.swap().in_use();

    let child_pt = MockPageTable::new();
    child_pt.fail_maps();
    assert_eq!(
        parent.duplicate(2, child_pt.clone()).err(),
        Some(VmError::MappingFailed)
    );

    assert_eq!(vm.frames().len(), frames_before);
    assert_eq!(vm.swap().in_use(), slots_before);
    assert_eq!(child_pt.mapped_count(), 0);
    assert_eq!(parent.spt().len(), 3);
}

#[test]
fn test_handshake_reports_success() {
    let vm = test_vm(8, 0);
    let (parent, _pt, _file) = parent_with_pages(&vm);
    let handshake = ForkHandshake::new();
    let child_pt = MockPageTable::new();

    let child = thread::scope(|s| {
        let worker = s.spawn(|| {
            let mut child = AddressSpace::new(vm.clone(), 2, child_pt.clone());
            handshake.run_child(&parent, &mut child).map(|()| child)
        });
        assert_eq!(handshake.wait(), Ok(()));
        worker.join().unwrap()
    });

    let child = child.unwrap();
    assert_eq!(child.spt().len(), parent.spt().len());
}

#[test]
fn test_handshake_reports_failure() {
    let vm = test_vm(8, 0);
    let (parent, _pt, _file) = parent_with_pages(&vm);
    let handshake = ForkHandshake::new();
    let child_pt = MockPageTable::new();
    child_pt.fail_maps();
    let frames_before = vm.frames().len();

    thread::scope(|s| {
        s.spawn(|| {
            let mut child = AddressSpace::new(vm.clone(), 2, child_pt.clone());
            let _ = handshake.run_child(&parent, &mut child);
            assert!(child.spt().is_empty());
        });
        assert_eq!(handshake.wait(), Err(VmError::MappingFailed));
    });
    assert_eq!(vm.frames().len(), frames_before);
}

#[test]
fn test_uninit_descriptor_is_shared() {
    let vm = test_vm(4, 0);
    let (mut parent, _pt) = new_space(&vm, 1);
    let file: Arc<dyn BackingFile> = MemFile::new(vec![9u8; PAGE_SIZE]);
    parent
        .alloc_page_with_initializer(PageKind::File, va(CODE), false, Some(LazyLoad::new(file.clone(), 0, PAGE_SIZE)))
        .unwrap();

    let child = parent.duplicate(2, MockPageTable::new()).unwrap();
    let page = child.find_page(va(CODE)).unwrap();
    assert!(page.is_uninit());
    assert_eq!(page.kind(), PageKind::File);
    assert_eq!(vm.frames().len(), 0);
    // Parent, child and this test hold the file.
    assert_eq!(Arc::strong_count(&file), 3);
}

#[test]
fn test_child_keeps_unwritten_file_changes_across_eviction() {
    const MAP: usize = 0x3000_0000;
    let vm = test_vm(2, 0);
    let (mut parent, _pt) = new_space(&vm, 1);
    let file = MemFile::new(vec![0u8; PAGE_SIZE]);
    let backing: Arc<dyn BackingFile> = file.clone();
    parent
        .alloc_page_with_initializer(PageKind::File, va(MAP), true, Some(LazyLoad::new(backing, 0, PAGE_SIZE)))
        .unwrap();
    parent.claim_page(va(MAP)).unwrap();
    parent.write_bytes_at(va(MAP), b"dirty").unwrap();

    let (mut child, child_pt) = new_space(&vm, 2);
    assert!(supplemental_page_table_copy(&mut child, &parent));
    assert!(child_pt.flags(MAP).unwrap().contains(PteFlags::DIRTY));

    // Only the child's copy is a clock candidate; the parent page keeps its frame.
    let copy = child.find_page(va(MAP)).unwrap();
    copy.set_accessed(false);
    child.alloc_page(PageKind::Anon, va(HEAP), true).unwrap();
    child.claim_page(va(HEAP)).unwrap();
    assert!(!copy.is_resident());
    assert!(parent.find_page(va(MAP)).unwrap().is_resident());
    assert_eq!(file.writes(), 1);
    assert_eq!(&file.contents()[..5], b"dirty");

    assert_eq!(&claim_and_read(&mut child, MAP)[..5], b"dirty");
}
