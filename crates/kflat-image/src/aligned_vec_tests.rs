use crate::aligned_vec::{ALIGN, AlignedVec};

fn is_aligned(vec: &AlignedVec) -> bool {
    vec.address().is_multiple_of(ALIGN as u64)
}

#[test]
fn copy_from_slice_is_aligned() {
    let data: Vec<u8> = (0..100).collect();
    let vec = AlignedVec::copy_from_slice(&data);

    assert!(is_aligned(&vec));
    assert_eq!(&*vec, &data[..]);
}

#[test]
fn empty_slice() {
    let vec = AlignedVec::copy_from_slice(&[]);
    assert!(vec.is_empty());
    assert_eq!(vec.as_slice(), &[] as &[u8]);
}

#[test]
fn zeroed_has_exact_len() {
    let vec = AlignedVec::zeroed(65);
    assert_eq!(vec.len(), 65);
    assert!(vec.iter().all(|&b| b == 0));
}

#[test]
fn mutation_through_deref_mut() {
    let mut vec = AlignedVec::zeroed(16);
    vec[3] = 7;
    vec.as_mut_slice()[15] = 9;

    assert_eq!(vec[3], 7);
    assert_eq!(vec[15], 9);
}

#[test]
fn clone_preserves_alignment() {
    let vec = AlignedVec::copy_from_slice(&[1, 2, 3]);
    let cloned = vec.clone();

    assert!(is_aligned(&cloned));
    assert_eq!(&*cloned, &*vec);
}
